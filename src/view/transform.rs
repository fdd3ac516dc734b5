//! Camera state for the viewport: zoom, pan, 90° rotation steps, and the
//! cover scale, plus the conversions between screen and texture space.
//!
//! Screen coordinates are device pixels with the origin at the viewport's
//! top-left; pan is stored relative to the viewport center with +y up.
//! "Image" coordinates are texture pixels in the rotation-invariant frame.

use crate::geometry::Vec2;

pub const DEFAULT_MIN_ZOOM: f32 = 0.1;
pub const DEFAULT_MAX_ZOOM: f32 = 16.0;
/// Zoom deltas below this are treated as no change.
const ZOOM_EPS: f32 = 1e-6;
/// Cover-scale deltas below this do not trigger a redraw.
const COVER_EPS: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct ViewTransform {
    zoom_factor: f32,
    /// Device pixels, origin at viewport center, +y up.
    pan: Vec2,
    rotation_steps: u8,
    cover_scale: f32,
    /// Viewport size in device pixels.
    viewport: Vec2,
    device_pixel_ratio: f32,
    /// Texture size in pixels, rotation-invariant.
    texture_size: Vec2,
    min_zoom: f32,
    max_zoom: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom_factor: 1.0,
            pan: Vec2::ZERO,
            rotation_steps: 0,
            cover_scale: 1.0,
            viewport: Vec2::ZERO,
            device_pixel_ratio: 1.0,
            texture_size: Vec2::ZERO,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

impl ViewTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn rotation_steps(&self) -> u8 {
        self.rotation_steps
    }

    pub fn cover_scale(&self) -> f32 {
        self.cover_scale
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn texture_size(&self) -> Vec2 {
        self.texture_size
    }

    pub fn set_texture_size(&mut self, width: f32, height: f32) {
        self.texture_size = Vec2::new(width.max(0.0), height.max(0.0));
    }

    pub fn set_viewport(&mut self, size_device_px: Vec2, device_pixel_ratio: f32) {
        self.viewport = size_device_px;
        self.device_pixel_ratio = device_pixel_ratio.max(0.1);
    }

    pub fn set_rotation_steps(&mut self, steps: i32) -> bool {
        let steps = steps.rem_euclid(4) as u8;
        if steps == self.rotation_steps {
            return false;
        }
        self.rotation_steps = steps;
        true
    }

    /// Texture size as displayed: width/height swap when the rotation step
    /// is odd.
    pub fn logical_size(&self) -> Vec2 {
        if self.rotation_steps % 2 == 1 {
            Vec2::new(self.texture_size.y, self.texture_size.x)
        } else {
            self.texture_size
        }
    }

    /// Scale that fits the logical image exactly inside the viewport.
    /// Falls back to 1.0 when either size is degenerate.
    pub fn fit_to_view_scale(&self) -> f32 {
        let l = self.logical_size();
        if l.x <= 0.0 || l.y <= 0.0 || self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return 1.0;
        }
        (self.viewport.x / l.x).min(self.viewport.y / l.y)
    }

    /// Device pixels per texture pixel actually used for rendering.
    /// Always positive.
    pub fn effective_scale(&self) -> f32 {
        self.fit_to_view_scale() * self.cover_scale * self.zoom_factor
    }

    /// Sets the zoom factor, keeping `anchor` (a screen point in device
    /// pixels) over the same texture coordinate when provided. Returns false
    /// without touching any state when the clamped factor is unchanged.
    pub fn set_zoom(&mut self, factor: f32, anchor: Option<Vec2>) -> bool {
        let clamped = factor.clamp(self.min_zoom, self.max_zoom);
        if (clamped - self.zoom_factor).abs() < ZOOM_EPS {
            return false;
        }
        match anchor {
            Some(screen) => {
                let fixed = self.viewport_to_image(screen);
                self.zoom_factor = clamped;
                self.pin_image_point(fixed, screen);
            }
            None => self.zoom_factor = clamped,
        }
        true
    }

    pub fn reset_zoom(&mut self) {
        self.zoom_factor = 1.0;
        self.pan = Vec2::ZERO;
    }

    /// Zoom and pan that frame a texture-pixel rectangle (center/size) with
    /// `padding_px` of device pixels on the tighter axis. Pure companion to
    /// [`Self::frame_texture_rect`].
    pub fn framing_for_rect(&self, center: Vec2, size: Vec2, padding_px: f32) -> (f32, Vec2) {
        let rect_logical = if self.rotation_steps % 2 == 1 {
            Vec2::new(size.y, size.x)
        } else {
            size
        };
        let base = self.fit_to_view_scale() * self.cover_scale;
        let avail = Vec2::new(
            (self.viewport.x - 2.0 * padding_px).max(1.0),
            (self.viewport.y - 2.0 * padding_px).max(1.0),
        );
        let zoom = if rect_logical.x <= 0.0 || rect_logical.y <= 0.0 || base <= 0.0 {
            1.0
        } else {
            (avail.x / (rect_logical.x * base)).min(avail.y / (rect_logical.y * base))
        };
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);

        let scale = base * zoom;
        let l = self.texture_to_logical(center);
        let half = self.logical_size() * 0.5;
        let pan = Vec2::new(-(l.x - half.x) * scale, (l.y - half.y) * scale);
        (zoom, pan)
    }

    /// Frames `rect` (texture pixels, center/size) so it exactly fills the
    /// viewport: zoom set directly, pan centered on the rect.
    pub fn frame_texture_rect(&mut self, center: Vec2, size: Vec2) {
        let (zoom, pan) = self.framing_for_rect(center, size, 0.0);
        self.zoom_factor = zoom;
        self.pan = pan;
    }

    /// Applies an animated camera pose; zoom is clamped to the valid range.
    pub fn apply_camera(&mut self, zoom: f32, pan: Vec2) {
        self.zoom_factor = zoom.clamp(self.min_zoom, self.max_zoom);
        self.pan = pan;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan = self.pan + delta;
    }

    /// Cover-scale supplier hook for the straighten logic. Returns whether
    /// the change is large enough to warrant a redraw.
    pub fn set_image_cover_scale(&mut self, scale: f32) -> bool {
        let scale = scale.max(1.0);
        if (scale - self.cover_scale).abs() <= COVER_EPS {
            return false;
        }
        self.cover_scale = scale;
        true
    }

    /// Rotation-aware remap from texture pixels to logical pixels.
    /// Step 1 turns the image a quarter turn so the texture origin lands at
    /// the logical bottom-left; step 3 is the opposite quarter turn.
    pub fn texture_to_logical(&self, p: Vec2) -> Vec2 {
        let w = self.texture_size.x;
        let h = self.texture_size.y;
        match self.rotation_steps {
            1 => Vec2::new(p.y, w - p.x),
            2 => Vec2::new(w - p.x, h - p.y),
            3 => Vec2::new(h - p.y, p.x),
            _ => p,
        }
    }

    /// Exact inverse of [`Self::texture_to_logical`].
    pub fn logical_to_texture(&self, p: Vec2) -> Vec2 {
        let w = self.texture_size.x;
        let h = self.texture_size.y;
        match self.rotation_steps {
            1 => Vec2::new(w - p.y, p.x),
            2 => Vec2::new(w - p.x, h - p.y),
            3 => Vec2::new(p.y, h - p.x),
            _ => p,
        }
    }

    /// Screen point (device px, top-left origin) for a texture point.
    pub fn image_to_viewport(&self, p: Vec2) -> Vec2 {
        let l = self.texture_to_logical(p);
        let half = self.logical_size() * 0.5;
        let s = self.effective_scale();
        Vec2::new(
            self.viewport.x * 0.5 + (l.x - half.x) * s + self.pan.x,
            self.viewport.y * 0.5 + (l.y - half.y) * s - self.pan.y,
        )
    }

    /// Texture point under a screen point; exact inverse of
    /// [`Self::image_to_viewport`].
    pub fn viewport_to_image(&self, p: Vec2) -> Vec2 {
        let half = self.logical_size() * 0.5;
        let s = self.effective_scale();
        let l = Vec2::new(
            (p.x - self.viewport.x * 0.5 - self.pan.x) / s + half.x,
            (p.y - self.viewport.y * 0.5 + self.pan.y) / s + half.y,
        );
        self.logical_to_texture(l)
    }

    /// Screen point to the center-origin, +y-up frame pan lives in.
    pub fn screen_to_world(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x - self.viewport.x * 0.5,
            self.viewport.y * 0.5 - p.y,
        )
    }

    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x + self.viewport.x * 0.5,
            self.viewport.y * 0.5 - p.y,
        )
    }

    /// Recomputes pan so that texture point `fixed` renders at `screen`.
    fn pin_image_point(&mut self, fixed: Vec2, screen: Vec2) {
        let l = self.texture_to_logical(fixed);
        let half = self.logical_size() * 0.5;
        let s = self.effective_scale();
        self.pan = Vec2::new(
            screen.x - self.viewport.x * 0.5 - (l.x - half.x) * s,
            self.viewport.y * 0.5 + (l.y - half.y) * s - screen.y,
        );
    }
}

/// Extra magnification needed so a frame rotated by `angle_deg` still covers
/// the full `width`×`height` viewport without exposing empty corners.
pub fn cover_scale_for_angle(angle_deg: f32, width: f32, height: f32) -> f32 {
    if width <= 0.0 || height <= 0.0 {
        return 1.0;
    }
    let a = angle_deg.to_radians().abs();
    if a < 1e-6 {
        return 1.0;
    }
    let aspect = (width / height).max(height / width);
    (a.cos() + aspect * a.sin()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landscape_view() -> ViewTransform {
        let mut v = ViewTransform::new();
        v.set_viewport(Vec2::new(800.0, 600.0), 1.0);
        v.set_texture_size(400.0, 300.0);
        v
    }

    fn assert_near(a: Vec2, b: Vec2, eps: f32) {
        assert!(
            (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn logical_size_swaps_on_odd_steps() {
        let mut v = landscape_view();
        assert_eq!(v.logical_size(), Vec2::new(400.0, 300.0));
        v.set_rotation_steps(1);
        assert_eq!(v.logical_size(), Vec2::new(300.0, 400.0));
        v.set_rotation_steps(2);
        assert_eq!(v.logical_size(), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn texture_logical_round_trip_all_steps() {
        let mut v = landscape_view();
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(400.0, 300.0),
            Vec2::new(123.0, 45.0),
            Vec2::new(200.0, 150.0),
        ];
        for step in 0..4 {
            v.set_rotation_steps(step);
            for &p in &points {
                assert_near(v.logical_to_texture(v.texture_to_logical(p)), p, 1e-3);
            }
        }
    }

    #[test]
    fn viewport_image_round_trip_all_steps() {
        let mut v = landscape_view();
        v.set_zoom(1.7, None);
        v.pan_by(Vec2::new(31.0, -12.0));
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(400.0, 600.0),
            Vec2::new(517.0, 230.5),
        ];
        for step in 0..4 {
            v.set_rotation_steps(step);
            for &p in &points {
                assert_near(v.image_to_viewport(v.viewport_to_image(p)), p, 1e-2);
            }
        }
    }

    #[test]
    fn rotation_step_one_maps_origin_to_lower_left_quadrant() {
        let mut v = landscape_view();
        v.set_rotation_steps(1);
        let s = v.image_to_viewport(Vec2::new(0.0, 0.0));
        assert!(s.x < 400.0 && s.y > 300.0, "got {s:?}");
    }

    #[test]
    fn rotation_step_three_maps_origin_to_upper_right_quadrant() {
        let mut v = landscape_view();
        v.set_rotation_steps(3);
        let s = v.image_to_viewport(Vec2::new(0.0, 0.0));
        assert!(s.x > 400.0 && s.y < 300.0, "got {s:?}");
    }

    #[test]
    fn texture_center_maps_to_viewport_center_for_all_steps() {
        let mut v = landscape_view();
        for step in 0..4 {
            v.set_rotation_steps(step);
            let s = v.image_to_viewport(Vec2::new(200.0, 150.0));
            assert!(
                (s.x - 400.0).abs() <= 5.0 && (s.y - 300.0).abs() <= 5.0,
                "step {step}: got {s:?}"
            );
        }
    }

    #[test]
    fn unchanged_clamped_zoom_is_a_no_op() {
        let mut v = landscape_view();
        v.pan_by(Vec2::new(10.0, 5.0));
        let pan = v.pan();
        assert!(!v.set_zoom(1.0, Some(Vec2::new(100.0, 100.0))));
        assert!(!v.set_zoom(1.0 + 5e-7, None));
        // Over-range values clamp; asking twice for the same clamp is also a
        // no-op.
        assert!(v.set_zoom(100.0, None));
        assert!(!v.set_zoom(50.0, None));
        assert_eq!(v.pan(), pan);
    }

    #[test]
    fn anchored_zoom_keeps_texture_point_under_cursor() {
        let mut v = landscape_view();
        let anchor = Vec2::new(560.0, 180.0);
        let before = v.viewport_to_image(anchor);
        assert!(v.set_zoom(3.0, Some(anchor)));
        let after = v.viewport_to_image(anchor);
        assert_near(before, after, 1e-2);
    }

    #[test]
    fn reset_zoom_restores_defaults() {
        let mut v = landscape_view();
        v.set_zoom(4.0, Some(Vec2::new(10.0, 10.0)));
        v.reset_zoom();
        assert_eq!(v.zoom_factor(), 1.0);
        assert_eq!(v.pan(), Vec2::ZERO);
    }

    #[test]
    fn frame_texture_rect_centers_and_fills() {
        let mut v = landscape_view();
        let center = Vec2::new(100.0, 100.0);
        v.frame_texture_rect(center, Vec2::new(100.0, 75.0));
        let s = v.image_to_viewport(center);
        assert_near(s, Vec2::new(400.0, 300.0), 1e-2);
        // 100×75 shares the viewport aspect, so it fills exactly.
        let corner = v.image_to_viewport(Vec2::new(50.0, 62.5));
        assert_near(corner, Vec2::new(0.0, 0.0), 1e-1);
    }

    #[test]
    fn cover_scale_change_below_threshold_is_ignored() {
        let mut v = landscape_view();
        assert!(!v.set_image_cover_scale(1.00005));
        assert!(v.set_image_cover_scale(1.2));
        assert!(!v.set_image_cover_scale(1.2000099));
        // Values below 1.0 clamp up.
        assert!(v.set_image_cover_scale(0.5));
        assert_eq!(v.cover_scale(), 1.0);
    }

    #[test]
    fn degenerate_sizes_fall_back_to_unit_scale() {
        let v = ViewTransform::new();
        assert_eq!(v.fit_to_view_scale(), 1.0);
        assert!(v.effective_scale() > 0.0);
    }

    #[test]
    fn cover_scale_for_angle_matches_known_values() {
        assert_eq!(cover_scale_for_angle(0.0, 400.0, 300.0), 1.0);
        let s = cover_scale_for_angle(90.0, 400.0, 300.0);
        assert!((s - 400.0 / 300.0).abs() < 1e-3);
        assert!(cover_scale_for_angle(5.0, 400.0, 300.0) > 1.0);
        assert_eq!(cover_scale_for_angle(10.0, 0.0, 10.0), 1.0);
    }

    #[test]
    fn screen_world_round_trip() {
        let v = landscape_view();
        let p = Vec2::new(123.0, 456.0);
        assert_near(v.world_to_screen(v.screen_to_world(p)), p, 1e-4);
        assert_eq!(v.screen_to_world(Vec2::new(400.0, 300.0)), Vec2::ZERO);
    }
}
