//! Crop session state: the normalized crop rectangle, the perspective quad
//! it must stay inside, and the baseline snapshot used during live
//! perspective drags.

use serde::{Deserialize, Serialize};

use crate::geometry::perspective::{
    self, DEFAULT_UV_PADDING_PX, build_perspective_matrix, compute_projected_quad,
};
use crate::geometry::{Mat3, Quad, Vec2, unit_quad};

/// Smallest allowed crop width/height in normalized units.
pub const MIN_CROP_SIZE: f32 = 0.02;

/// Center-based normalized crop rectangle over the image frame.
/// Stored rotation-invariant; [`CropRect::to_logical`] converts into the
/// rotation-aware frame used by on-screen interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self::full()
    }
}

impl CropRect {
    pub fn new(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
        }
    }

    /// The whole frame.
    pub fn full() -> Self {
        Self::new(0.5, 0.5, 1.0, 1.0)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.cx, self.cy)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.cx - self.width * 0.5, self.cy - self.height * 0.5)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.cx + self.width * 0.5, self.cy + self.height * 0.5)
    }

    /// Corners in TL, TR, BR, BL order.
    pub fn corners(&self) -> Quad {
        let min = self.min();
        let max = self.max();
        [
            Vec2::new(min.x, min.y),
            Vec2::new(max.x, min.y),
            Vec2::new(max.x, max.y),
            Vec2::new(min.x, max.y),
        ]
    }

    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self::new(center.x, center.y, size.x, size.y)
    }

    /// Scales width/height about the center, flooring both dimensions.
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.cx,
            self.cy,
            (self.width * factor).max(MIN_CROP_SIZE),
            (self.height * factor).max(MIN_CROP_SIZE),
        )
    }

    /// Enforces the minimum dimensions and keeps the rect inside the unit
    /// square.
    pub fn clamped(&self) -> Self {
        let w = self.width.clamp(MIN_CROP_SIZE, 1.0);
        let h = self.height.clamp(MIN_CROP_SIZE, 1.0);
        let cx = self.cx.clamp(w * 0.5, 1.0 - w * 0.5);
        let cy = self.cy.clamp(h * 0.5, 1.0 - h * 0.5);
        Self::new(cx, cy, w, h)
    }

    /// Remaps into the rotation-aware logical frame for the given step.
    pub fn to_logical(&self, steps: u8) -> Self {
        match steps % 4 {
            1 => Self::new(self.cy, 1.0 - self.cx, self.height, self.width),
            2 => Self::new(1.0 - self.cx, 1.0 - self.cy, self.width, self.height),
            3 => Self::new(1.0 - self.cy, self.cx, self.height, self.width),
            _ => *self,
        }
    }

    /// Exact inverse of [`Self::to_logical`].
    pub fn to_texture(&self, steps: u8) -> Self {
        match steps % 4 {
            1 => Self::new(1.0 - self.cy, self.cx, self.height, self.width),
            2 => Self::new(1.0 - self.cx, 1.0 - self.cy, self.width, self.height),
            3 => Self::new(self.cy, 1.0 - self.cx, self.height, self.width),
            _ => *self,
        }
    }

    pub fn is_full(&self) -> bool {
        (self.cx - 0.5).abs() < 1e-4
            && (self.cy - 0.5).abs() < 1e-4
            && (self.width - 1.0).abs() < 1e-4
            && (self.height - 1.0).abs() < 1e-4
    }
}

/// Warp parameters the quad depends on. Equality-checked so unchanged
/// adjustments never recompute the quad.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerspectiveParams {
    pub vertical: f32,
    pub horizontal: f32,
    pub straighten_deg: f32,
    pub flip_h: bool,
}

/// Owns the crop rectangle, the projected quad, and the optional baseline
/// snapshot captured while a perspective slider is being dragged.
#[derive(Debug, Clone)]
pub struct CropSession {
    rect: CropRect,
    params: PerspectiveParams,
    /// Crop-plane point -> texture UV; consumed by the renderer.
    sampling: Mat3,
    quad: Quad,
    baseline: Option<CropRect>,
    texture_size: Vec2,
}

impl Default for CropSession {
    fn default() -> Self {
        Self {
            rect: CropRect::full(),
            params: PerspectiveParams::default(),
            sampling: Mat3::IDENTITY,
            quad: unit_quad(),
            baseline: None,
            texture_size: Vec2::ZERO,
        }
    }
}

impl CropSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rect(&self) -> CropRect {
        self.rect
    }

    pub fn set_rect(&mut self, rect: CropRect) {
        self.rect = rect.clamped();
    }

    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    pub fn sampling_matrix(&self) -> &Mat3 {
        &self.sampling
    }

    pub fn params(&self) -> PerspectiveParams {
        self.params
    }

    pub fn set_texture_size(&mut self, width: f32, height: f32) {
        self.texture_size = Vec2::new(width, height);
    }

    /// Recomputes the warp and quad when the parameters actually change.
    /// Returns whether anything was rebuilt.
    pub fn set_params(&mut self, params: PerspectiveParams) -> bool {
        if params == self.params {
            return false;
        }
        self.params = params;
        self.rebuild_warp();
        true
    }

    /// The straighten rotation and tilt projection composed into one
    /// texture->crop-plane map; the stored sampling matrix is its inverse and
    /// the quad is that inverse projected back over the texture corners.
    fn rebuild_warp(&mut self) {
        let tilt = build_perspective_matrix(self.params.vertical, self.params.horizontal);
        let projection = tilt.invert().unwrap_or(Mat3::IDENTITY);
        let center = Vec2::new(0.5, 0.5);
        let rotate = Mat3::rotation_about(center, self.params.straighten_deg.to_radians());
        let mut forward = projection * rotate;
        if self.params.flip_h {
            forward = Mat3::mirror_x_unit() * forward;
        }
        self.sampling = forward.invert().unwrap_or(Mat3::IDENTITY);
        self.quad = compute_projected_quad(&self.sampling);
    }

    /// Moves the crop center to the quad centroid when tilt changes pushed
    /// it outside. Returns whether a change occurred.
    pub fn ensure_crop_center_inside_quad(&mut self) -> bool {
        if perspective::point_in_convex_polygon(self.rect.center(), &self.quad) {
            return false;
        }
        let centroid = self
            .quad
            .iter()
            .fold(Vec2::ZERO, |acc, &p| acc + p)
            * 0.25;
        self.rect = CropRect::from_center_size(centroid, self.rect.size());
        true
    }

    /// Uniformly shrinks the rect by the min-zoom-to-fit factor when it is
    /// not fully inside the quad. Returns whether a change occurred.
    pub fn auto_scale_crop_to_quad(&mut self) -> bool {
        if perspective::rect_inside_quad(&self.rect.corners(), &self.quad) {
            return false;
        }
        let zoom = perspective::calculate_min_zoom_to_fit(
            self.rect.center(),
            &self.rect.corners(),
            &self.quad,
        );
        if zoom <= 1.0 {
            return false;
        }
        self.rect = self.rect.scaled(1.0 / zoom);
        true
    }

    pub fn begin_perspective_drag(&mut self) {
        self.baseline = Some(self.rect);
    }

    pub fn end_perspective_drag(&mut self) {
        self.baseline = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// While a perspective drag is live, every parameter change re-derives
    /// the crop from the pre-drag baseline fitted into the current quad, so
    /// intermediate frames never compound shrinkage.
    pub fn apply_baseline_perspective_fit(&mut self) -> bool {
        let Some(baseline) = self.baseline else {
            return false;
        };
        self.rect = baseline;
        let moved = self.ensure_crop_center_inside_quad();
        let scaled = self.auto_scale_crop_to_quad();
        self.constrain_to_uv_padding();
        moved || scaled || self.rect != baseline
    }

    /// Standard guard after an interactive edit: keep the rect if valid,
    /// otherwise shrink it into place (when allowed) or roll back to
    /// `snapshot`. Returns false when the edit was rolled back.
    pub fn ensure_valid_or_revert(&mut self, snapshot: CropRect, allow_shrink: bool) -> bool {
        if perspective::rect_inside_quad(&self.rect.corners(), &self.quad) {
            return true;
        }
        if allow_shrink {
            self.ensure_crop_center_inside_quad();
            self.auto_scale_crop_to_quad();
            if perspective::rect_inside_quad(&self.rect.corners(), &self.quad) {
                return true;
            }
        }
        self.rect = snapshot;
        false
    }

    /// Pads the crop away from the texture edge in UV space to avoid
    /// bilinear bleed; no-op until a texture size is known.
    pub fn constrain_to_uv_padding(&mut self) {
        if self.texture_size.x <= 0.0 || self.texture_size.y <= 0.0 {
            return;
        }
        let (center, size) = perspective::constrain_rect_to_uv_bounds(
            self.rect.center(),
            self.rect.size(),
            &self.sampling,
            self.texture_size.x,
            self.texture_size.y,
            DEFAULT_UV_PADDING_PX,
        );
        self.rect = CropRect::from_center_size(
            center,
            Vec2::new(size.x.max(MIN_CROP_SIZE), size.y.max(MIN_CROP_SIZE)),
        );
    }

    pub fn reset(&mut self) {
        self.rect = CropRect::full();
        self.baseline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_rect_round_trips_through_logical_space() {
        let rect = CropRect::new(0.3, 0.6, 0.25, 0.4);
        for steps in 0..4u8 {
            let back = rect.to_logical(steps).to_texture(steps);
            assert!(
                (back.cx - rect.cx).abs() < 1e-6
                    && (back.cy - rect.cy).abs() < 1e-6
                    && (back.width - rect.width).abs() < 1e-6
                    && (back.height - rect.height).abs() < 1e-6,
                "steps {steps}: {back:?}"
            );
        }
    }

    #[test]
    fn logical_mapping_swaps_dimensions_on_odd_steps() {
        let rect = CropRect::new(0.5, 0.5, 0.6, 0.2);
        let l = rect.to_logical(1);
        assert_eq!(l.width, 0.2);
        assert_eq!(l.height, 0.6);
    }

    #[test]
    fn clamped_enforces_floor_and_unit_bounds() {
        let r = CropRect::new(0.01, 0.99, 0.001, 3.0).clamped();
        assert!(r.width >= MIN_CROP_SIZE && r.height <= 1.0);
        assert!(r.min().x >= 0.0 && r.max().y <= 1.0);
    }

    #[test]
    fn quad_is_cached_until_params_change() {
        let mut s = CropSession::new();
        let p = PerspectiveParams {
            vertical: 0.4,
            ..Default::default()
        };
        assert!(s.set_params(p));
        let quad = *s.quad();
        assert!(!s.set_params(p));
        assert_eq!(*s.quad(), quad);
        assert!(s.set_params(PerspectiveParams {
            vertical: 0.5,
            ..Default::default()
        }));
        assert_ne!(*s.quad(), quad);
    }

    #[test]
    fn zero_params_keep_the_unit_quad() {
        let mut s = CropSession::new();
        s.set_params(PerspectiveParams {
            vertical: 0.3,
            ..Default::default()
        });
        s.set_params(PerspectiveParams::default());
        for (got, want) in s.quad().iter().zip(unit_quad().iter()) {
            assert!((got.x - want.x).abs() < 1e-5 && (got.y - want.y).abs() < 1e-5);
        }
    }

    #[test]
    fn center_relocates_to_centroid_when_outside() {
        let mut s = CropSession::new();
        s.set_params(PerspectiveParams {
            vertical: 1.0,
            horizontal: 1.0,
            ..Default::default()
        });
        s.set_rect(CropRect::new(0.02, 0.98, 0.02, 0.02));
        if !perspective::point_in_convex_polygon(s.rect().center(), s.quad()) {
            assert!(s.ensure_crop_center_inside_quad());
            assert!(perspective::point_in_convex_polygon(
                s.rect().center(),
                s.quad()
            ));
        }
    }

    #[test]
    fn auto_scale_shrinks_only_when_needed() {
        let mut s = CropSession::new();
        s.set_rect(CropRect::new(0.5, 0.5, 0.5, 0.5));
        assert!(!s.auto_scale_crop_to_quad());

        s.set_params(PerspectiveParams {
            vertical: 1.0,
            ..Default::default()
        });
        s.set_rect(CropRect::full());
        let before = s.rect();
        if s.auto_scale_crop_to_quad() {
            let after = s.rect();
            assert!(after.width <= before.width && after.height <= before.height);
            assert!(perspective::rect_inside_quad(&after.corners(), s.quad()));
        }
    }

    #[test]
    fn baseline_fit_never_compounds() {
        let mut s = CropSession::new();
        s.set_rect(CropRect::new(0.5, 0.5, 0.9, 0.9));
        s.begin_perspective_drag();

        // Sweep the slider out and back; the crop must return to (almost)
        // the baseline rather than shrinking a little on every frame.
        for v in [0.2f32, 0.5, 0.9, 0.5, 0.2, 0.0] {
            s.set_params(PerspectiveParams {
                vertical: v,
                ..Default::default()
            });
            s.apply_baseline_perspective_fit();
        }
        let r = s.rect();
        assert!((r.width - 0.9).abs() < 1e-3, "width drifted: {}", r.width);
        assert!((r.height - 0.9).abs() < 1e-3, "height drifted: {}", r.height);
        s.end_perspective_drag();
        assert!(!s.has_baseline());
    }

    #[test]
    fn revert_guard_restores_snapshot() {
        let mut s = CropSession::new();
        s.set_params(PerspectiveParams {
            vertical: 1.0,
            horizontal: 0.8,
            ..Default::default()
        });
        let snapshot = CropRect::new(0.5, 0.5, 0.1, 0.1);
        s.set_rect(snapshot);
        s.set_rect(CropRect::new(0.5, 0.5, 1.0, 1.0));
        if !perspective::rect_inside_quad(&s.rect().corners(), s.quad()) {
            assert!(!s.ensure_valid_or_revert(snapshot, false));
            assert_eq!(s.rect(), snapshot);
        }
    }

    #[test]
    fn revert_guard_prefers_shrink_when_allowed() {
        let mut s = CropSession::new();
        s.set_params(PerspectiveParams {
            vertical: 1.0,
            ..Default::default()
        });
        let snapshot = CropRect::new(0.5, 0.5, 0.1, 0.1);
        s.set_rect(CropRect::full());
        assert!(s.ensure_valid_or_revert(snapshot, true));
        assert_ne!(s.rect(), snapshot);
    }
}
