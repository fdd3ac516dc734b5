//! Orchestrates the crop session, drag strategies, and animator, turning raw
//! pointer/wheel events into state changes and a response the host applies.
//!
//! The controller never owns the view transform; the viewer owns both and
//! lends the transform to each call.

use std::time::Instant;

use crate::crop::animator::{AnimatorTick, CameraPose, CropAnimator, FRAME_PADDING_PX};
use crate::crop::drag::DragStrategy;
use crate::crop::hit::{self, HIT_PADDING, HitRegion};
use crate::crop::model::{CropRect, CropSession, PerspectiveParams};
use crate::geometry::{Quad, Vec2};
use crate::view::ViewTransform;

/// Multiplier applied per wheel notch.
const WHEEL_ZOOM_STEP: f32 = 1.0015;

/// Everything a single event asks the host to do. Fields left at their
/// defaults mean "nothing to report".
#[derive(Debug, Clone, Default)]
pub struct ControllerResponse {
    pub repaint: bool,
    pub cursor: Option<egui::CursorIcon>,
    pub crop_changed: Option<CropRect>,
    pub zoom_changed: Option<f32>,
}

impl ControllerResponse {
    fn repaint() -> Self {
        Self {
            repaint: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct CropController {
    session: CropSession,
    drag: Option<DragStrategy>,
    animator: CropAnimator,
    enabled: bool,
}

impl CropController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &CropSession {
        &self.session
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the overlay should currently be drawn.
    pub fn overlay_visible(&self) -> bool {
        self.enabled && !self.animator.is_faded()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn set_texture_size(&mut self, width: f32, height: f32) {
        self.session.set_texture_size(width, height);
    }

    /// Enters or leaves crop mode. Entering arms the idle timer; leaving
    /// deterministically stops the drag, the animation, and the idle timer.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) -> ControllerResponse {
        if enabled == self.enabled {
            return ControllerResponse::default();
        }
        self.enabled = enabled;
        self.drag = None;
        if enabled {
            self.animator.arm(now);
        } else {
            self.animator.cancel();
        }
        ControllerResponse::repaint()
    }

    /// Pushes adjustment-derived state into the session: the crop rect and
    /// the perspective/straighten/flip parameters. While a perspective drag
    /// is live the crop is refit from its baseline on every change.
    pub fn sync_perspective(
        &mut self,
        params: PerspectiveParams,
        view: &mut ViewTransform,
    ) -> ControllerResponse {
        let mut resp = ControllerResponse::default();
        if !self.session.set_params(params) {
            return resp;
        }
        resp.repaint = true;

        let logical = view.logical_size();
        let cover =
            crate::view::transform::cover_scale_for_angle(params.straighten_deg, logical.x, logical.y);
        view.set_image_cover_scale(cover);

        let before = self.session.rect();
        if self.session.has_baseline() {
            self.session.apply_baseline_perspective_fit();
        } else {
            let snapshot = self.session.rect();
            self.session.ensure_crop_center_inside_quad();
            self.session.ensure_valid_or_revert(snapshot, true);
        }
        if self.session.rect() != before {
            resp.crop_changed = Some(self.session.rect());
        }
        resp
    }

    /// Marks the start of a continuous perspective-slider drag; the current
    /// crop becomes the refit baseline.
    pub fn begin_perspective_adjust(&mut self) {
        self.session.begin_perspective_drag();
    }

    pub fn end_perspective_adjust(&mut self) {
        self.session.end_perspective_drag();
        self.session.constrain_to_uv_padding();
    }

    pub fn set_crop_rect(&mut self, rect: CropRect) {
        self.session.set_rect(rect);
    }

    pub fn reset_crop(&mut self) {
        self.session.reset();
    }

    /// Screen-space corners of the crop rectangle, axis-ordered TL, TR, BR,
    /// BL regardless of the rotation step.
    pub fn overlay_corners(&self, view: &ViewTransform) -> Quad {
        let tex = view.texture_size();
        let rect = self.session.rect();
        let min = rect.min();
        let max = rect.max();
        let a = view.image_to_viewport(Vec2::new(min.x * tex.x, min.y * tex.y));
        let b = view.image_to_viewport(Vec2::new(max.x * tex.x, max.y * tex.y));
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        [
            Vec2::new(min_x, min_y),
            Vec2::new(max_x, min_y),
            Vec2::new(max_x, max_y),
            Vec2::new(min_x, max_y),
        ]
    }

    pub fn pointer_pressed(&mut self, pos: Vec2, view: &mut ViewTransform) -> ControllerResponse {
        if !self.enabled {
            return ControllerResponse::default();
        }
        let now = Instant::now();
        self.animator.arm(now);

        let corners = self.overlay_corners(view);
        let Some(region) = hit::hit_test(pos, &corners, HIT_PADDING) else {
            return ControllerResponse::repaint();
        };
        self.drag = Some(DragStrategy::from_hit(region, self.session.rect(), pos));
        let mut resp = ControllerResponse::repaint();
        resp.cursor = Some(cursor_for_region(region));
        resp
    }

    pub fn pointer_moved(&mut self, pos: Vec2, view: &mut ViewTransform) -> ControllerResponse {
        if !self.enabled {
            return ControllerResponse::default();
        }
        let mut resp = ControllerResponse::default();
        if let Some(drag) = self.drag.as_mut() {
            self.animator.arm(Instant::now());
            let outcome = drag.update(pos, &mut self.session, view);
            resp.repaint = true;
            if outcome.crop_changed {
                resp.crop_changed = Some(self.session.rect());
            }
            if outcome.zoom_changed {
                resp.zoom_changed = Some(view.zoom_factor());
            }
        } else {
            // Hover: only the cursor shape changes.
            let corners = self.overlay_corners(view);
            resp.cursor = Some(
                hit::hit_test(pos, &corners, HIT_PADDING)
                    .map(cursor_for_region)
                    .unwrap_or(egui::CursorIcon::Default),
            );
            if self.animator.is_faded() {
                // Pointer activity over the viewport unfades the overlay.
                self.animator.arm(Instant::now());
                resp.repaint = true;
            }
        }
        resp
    }

    pub fn pointer_released(&mut self, _view: &mut ViewTransform) -> ControllerResponse {
        if !self.enabled {
            return ControllerResponse::default();
        }
        let mut resp = ControllerResponse::default();
        if self.drag.take().is_some() {
            let snapshot = self.session.rect();
            self.session.ensure_valid_or_revert(snapshot, true);
            self.session.constrain_to_uv_padding();
            self.animator.arm(Instant::now());
            resp.repaint = true;
            resp.crop_changed = Some(self.session.rect());
        }
        resp
    }

    /// Wheel zoom anchored at the pointer. Emits a zoom notification only
    /// when the clamped factor actually changed.
    pub fn wheel(&mut self, delta: f32, pos: Vec2, view: &mut ViewTransform) -> ControllerResponse {
        let factor = view.zoom_factor() * WHEEL_ZOOM_STEP.powf(delta);
        let mut resp = ControllerResponse::default();
        if view.set_zoom(factor, Some(pos)) {
            resp.repaint = true;
            resp.zoom_changed = Some(view.zoom_factor());
            if self.enabled {
                self.animator.arm(Instant::now());
            }
        }
        resp
    }

    /// Advances the animator; applies interpolation frames to the camera.
    pub fn tick(&mut self, now: Instant, view: &mut ViewTransform) -> ControllerResponse {
        if !self.enabled {
            return ControllerResponse::default();
        }
        let current = CameraPose {
            zoom: view.zoom_factor(),
            pan: view.pan(),
        };
        let target = self.framing_target(view);
        let AnimatorTick {
            pose,
            animating,
            faded_now,
        } = self.animator.tick(now, current, target);

        let mut resp = ControllerResponse::default();
        if let Some(pose) = pose {
            view.apply_camera(pose.zoom, pose.pan);
            resp.repaint = true;
        }
        resp.repaint |= animating || faded_now;
        resp
    }

    /// Camera pose that frames the crop rect with the standard padding.
    fn framing_target(&self, view: &ViewTransform) -> CameraPose {
        let tex = view.texture_size();
        let rect = self.session.rect();
        let center = Vec2::new(rect.cx * tex.x, rect.cy * tex.y);
        let size = Vec2::new(rect.width * tex.x, rect.height * tex.y);
        let (zoom, pan) = view.framing_for_rect(center, size, FRAME_PADDING_PX);
        CameraPose { zoom, pan }
    }
}

fn cursor_for_region(region: HitRegion) -> egui::CursorIcon {
    match region {
        HitRegion::TopLeft | HitRegion::BottomRight => egui::CursorIcon::ResizeNwSe,
        HitRegion::TopRight | HitRegion::BottomLeft => egui::CursorIcon::ResizeNeSw,
        HitRegion::Top | HitRegion::Bottom => egui::CursorIcon::ResizeVertical,
        HitRegion::Left | HitRegion::Right => egui::CursorIcon::ResizeHorizontal,
        HitRegion::Interior => egui::CursorIcon::Grab,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (CropController, ViewTransform) {
        let mut view = ViewTransform::new();
        view.set_viewport(Vec2::new(800.0, 600.0), 1.0);
        view.set_texture_size(400.0, 300.0);
        let mut ctrl = CropController::new();
        ctrl.set_texture_size(400.0, 300.0);
        ctrl.set_enabled(true, Instant::now());
        ctrl.set_crop_rect(CropRect::new(0.5, 0.5, 0.5, 0.5));
        (ctrl, view)
    }

    #[test]
    fn overlay_corners_are_axis_ordered_for_all_steps() {
        let (ctrl, mut view) = setup();
        for step in 0..4 {
            view.set_rotation_steps(step);
            let c = ctrl.overlay_corners(&view);
            assert!(c[0].x < c[1].x && c[0].y < c[3].y, "step {step}: {c:?}");
            assert!(c[2].x > c[3].x && c[2].y > c[1].y);
        }
    }

    #[test]
    fn press_inside_starts_a_drag_and_reports_a_cursor() {
        let (mut ctrl, mut view) = setup();
        let resp = ctrl.pointer_pressed(Vec2::new(400.0, 300.0), &mut view);
        assert!(ctrl.is_dragging());
        assert_eq!(resp.cursor, Some(egui::CursorIcon::Grab));
        let resp = ctrl.pointer_released(&mut view);
        assert!(!ctrl.is_dragging());
        assert!(resp.crop_changed.is_some());
    }

    #[test]
    fn press_outside_does_not_start_a_drag() {
        let (mut ctrl, mut view) = setup();
        // Crop covers the middle half; far corner is outside its bbox.
        ctrl.pointer_pressed(Vec2::new(5.0, 5.0), &mut view);
        assert!(!ctrl.is_dragging());
    }

    #[test]
    fn drag_moves_the_crop_and_notifies() {
        let (mut ctrl, mut view) = setup();
        ctrl.pointer_pressed(Vec2::new(400.0, 300.0), &mut view);
        let resp = ctrl.pointer_moved(Vec2::new(440.0, 300.0), &mut view);
        let rect = resp.crop_changed.expect("crop should move");
        assert!(rect.cx > 0.5);
    }

    #[test]
    fn wheel_zoom_notifies_once_and_not_on_clamped_repeat() {
        let (mut ctrl, mut view) = setup();
        let resp = ctrl.wheel(300.0, Vec2::new(400.0, 300.0), &mut view);
        assert!(resp.zoom_changed.is_some());

        // Drive the zoom to the max, then keep pushing: no notification.
        for _ in 0..100 {
            ctrl.wheel(5000.0, Vec2::new(400.0, 300.0), &mut view);
        }
        let resp = ctrl.wheel(5000.0, Vec2::new(400.0, 300.0), &mut view);
        assert!(resp.zoom_changed.is_none());
        assert!(!resp.repaint);
    }

    #[test]
    fn idle_timeout_fades_overlay_and_pointer_unfades_it() {
        let (mut ctrl, mut view) = setup();
        let t0 = Instant::now();
        ctrl.set_enabled(false, t0);
        ctrl.set_enabled(true, t0);
        assert!(ctrl.overlay_visible());

        // Let the idle timer fire, then run the animation to completion.
        ctrl.tick(t0 + Duration::from_millis(1100), &mut view);
        let resp = ctrl.tick(t0 + Duration::from_millis(1500), &mut view);
        assert!(resp.repaint);
        assert!(!ctrl.overlay_visible(), "overlay should be faded");

        // Once faded, ticks stop asking for frames.
        let resp = ctrl.tick(t0 + Duration::from_secs(10), &mut view);
        assert!(!resp.repaint);

        // Pointer movement clears the fade before the next paint.
        let resp = ctrl.pointer_moved(Vec2::new(400.0, 300.0), &mut view);
        assert!(resp.repaint);
        assert!(ctrl.overlay_visible());
    }

    #[test]
    fn animation_frames_move_the_camera_toward_the_crop() {
        let (mut ctrl, mut view) = setup();
        let t0 = Instant::now();
        ctrl.set_enabled(false, t0);
        ctrl.set_enabled(true, t0);
        ctrl.set_crop_rect(CropRect::new(0.5, 0.5, 0.25, 0.25));
        let zoom_before = view.zoom_factor();
        ctrl.tick(t0 + Duration::from_millis(1100), &mut view);
        ctrl.tick(t0 + Duration::from_millis(1500), &mut view);
        assert!(view.zoom_factor() > zoom_before, "camera should zoom in");
    }

    #[test]
    fn disabling_cancels_animation_and_drag() {
        let (mut ctrl, mut view) = setup();
        let t0 = Instant::now();
        ctrl.pointer_pressed(Vec2::new(400.0, 300.0), &mut view);
        assert!(ctrl.is_dragging());
        ctrl.set_enabled(false, t0);
        assert!(!ctrl.is_dragging());
        // A stale tick after teardown is a no-op.
        let resp = ctrl.tick(t0 + Duration::from_secs(5), &mut view);
        assert!(!resp.repaint);
    }

    #[test]
    fn perspective_sync_refits_from_baseline_during_drag() {
        let (mut ctrl, mut view) = setup();
        ctrl.set_crop_rect(CropRect::new(0.5, 0.5, 0.9, 0.9));
        ctrl.begin_perspective_adjust();
        for v in [0.3f32, 0.8, 0.3, 0.0] {
            ctrl.sync_perspective(
                PerspectiveParams {
                    vertical: v,
                    ..Default::default()
                },
                &mut view,
            );
        }
        ctrl.end_perspective_adjust();
        let r = ctrl.session().rect();
        assert!((r.width - 0.9).abs() < 5e-2, "width drifted: {}", r.width);
    }

    #[test]
    fn straighten_sets_cover_scale() {
        let (mut ctrl, mut view) = setup();
        ctrl.sync_perspective(
            PerspectiveParams {
                straighten_deg: 5.0,
                ..Default::default()
            },
            &mut view,
        );
        assert!(view.cover_scale() > 1.0);
        ctrl.sync_perspective(PerspectiveParams::default(), &mut view);
        assert_eq!(view.cover_scale(), 1.0);
    }
}
