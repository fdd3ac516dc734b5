//! Per-frame math for dragging the crop body or a crop handle.
//!
//! A strategy is selected from the hit-test result when the pointer goes
//! down and discarded on release. Both strategies derive each frame's
//! candidate rect from the pre-drag snapshot plus the accumulated pointer
//! delta, so rejected frames never contaminate later ones.

use crate::crop::hit::HitRegion;
use crate::crop::model::{CropRect, CropSession, MIN_CROP_SIZE};
use crate::geometry::Vec2;
use crate::geometry::perspective::rect_inside_quad;
use crate::view::ViewTransform;

/// Distance from the viewport boundary, in device pixels, at which resizing
/// starts zooming the camera out.
pub const EDGE_SENSITIVITY_PX: f32 = 48.0;
/// Largest per-frame zoom-out applied by the edge push.
const MAX_EDGE_PUSH_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, Default)]
pub struct DragOutcome {
    pub crop_changed: bool,
    pub zoom_changed: bool,
}

#[derive(Debug, Clone)]
pub enum DragStrategy {
    Pan(PanDrag),
    Resize(ResizeDrag),
}

impl DragStrategy {
    /// Picks the strategy for a press that hit `region`.
    pub fn from_hit(region: HitRegion, rect: CropRect, screen: Vec2) -> DragStrategy {
        match region {
            HitRegion::Interior => DragStrategy::Pan(PanDrag {
                start_rect: rect,
                start_screen: screen,
            }),
            _ => DragStrategy::Resize(ResizeDrag {
                start_rect: rect,
                region,
                start_screen: screen,
                last_screen: screen,
            }),
        }
    }

    pub fn update(
        &mut self,
        screen: Vec2,
        session: &mut CropSession,
        view: &mut ViewTransform,
    ) -> DragOutcome {
        match self {
            DragStrategy::Pan(drag) => drag.update(screen, session, view),
            DragStrategy::Resize(drag) => drag.update(screen, session, view),
        }
    }
}

/// Translates the crop body; the candidate is always the pre-drag rect moved
/// by the full accumulated delta.
#[derive(Debug, Clone)]
pub struct PanDrag {
    start_rect: CropRect,
    start_screen: Vec2,
}

impl PanDrag {
    fn update(
        &mut self,
        screen: Vec2,
        session: &mut CropSession,
        view: &mut ViewTransform,
    ) -> DragOutcome {
        let delta = screen - self.start_screen;
        let norm = screen_delta_to_logical_norm(delta, view);

        let steps = view.rotation_steps();
        let logical = self.start_rect.to_logical(steps);
        let candidate = CropRect::new(
            logical.cx + norm.x,
            logical.cy + norm.y,
            logical.width,
            logical.height,
        )
        .to_texture(steps);

        let previous = session.rect();
        if rect_inside_quad(&candidate.corners(), session.quad()) {
            session.set_rect(candidate);
        }
        DragOutcome {
            crop_changed: session.rect() != previous,
            zoom_changed: false,
        }
    }
}

/// Moves the edges implied by the grabbed handle while the opposite edges
/// stay fixed, then feeds the edge-push auto-zoom.
#[derive(Debug, Clone)]
pub struct ResizeDrag {
    start_rect: CropRect,
    region: HitRegion,
    start_screen: Vec2,
    last_screen: Vec2,
}

impl ResizeDrag {
    fn update(
        &mut self,
        screen: Vec2,
        session: &mut CropSession,
        view: &mut ViewTransform,
    ) -> DragOutcome {
        let frame_delta = screen - self.last_screen;
        self.last_screen = screen;

        let total = screen_delta_to_logical_norm(screen - self.start_screen, view);
        let steps = view.rotation_steps();
        let start = self.start_rect.to_logical(steps);
        let (top, bottom, left, right) = self.region.moved_edges();

        let mut min = start.min();
        let mut max = start.max();
        if top {
            min.y = (min.y + total.y).min(max.y - MIN_CROP_SIZE);
        }
        if bottom {
            max.y = (max.y + total.y).max(min.y + MIN_CROP_SIZE);
        }
        if left {
            min.x = (min.x + total.x).min(max.x - MIN_CROP_SIZE);
        }
        if right {
            max.x = (max.x + total.x).max(min.x + MIN_CROP_SIZE);
        }

        let candidate = CropRect::from_center_size(
            (min + max) * 0.5,
            Vec2::new(max.x - min.x, max.y - min.y),
        )
        .to_texture(steps);

        let snapshot = session.rect();
        session.set_rect(candidate);
        let valid = session.ensure_valid_or_revert(snapshot, false);

        let mut outcome = DragOutcome {
            crop_changed: valid && session.rect() != snapshot,
            zoom_changed: false,
        };
        if valid {
            outcome.zoom_changed = self.edge_push_auto_zoom(frame_delta, session, view);
        }
        outcome
    }

    /// When the dragged edge nears the viewport boundary and the pointer is
    /// still pushing outward, zoom out a little (eased by proximity) anchored
    /// on the opposite edge so the crop can keep growing.
    fn edge_push_auto_zoom(
        &self,
        frame_delta: Vec2,
        session: &CropSession,
        view: &mut ViewTransform,
    ) -> bool {
        let viewport = view.viewport();
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return false;
        }
        let steps = view.rotation_steps();
        let rect = session.rect().to_logical(steps);
        let (top, bottom, left, right) = self.region.moved_edges();

        let tex = view.texture_size();
        let to_screen = |norm: Vec2| {
            let l = if steps % 2 == 1 {
                Vec2::new(norm.x * tex.y, norm.y * tex.x)
            } else {
                Vec2::new(norm.x * tex.x, norm.y * tex.y)
            };
            view.image_to_viewport(view.logical_to_texture(l))
        };

        let min = rect.min();
        let max = rect.max();
        let center = rect.center();

        let mut proximity: Option<(f32, Vec2)> = None;
        let mut consider = |dist: f32, pushing: bool, anchor: Vec2| {
            if pushing && dist < EDGE_SENSITIVITY_PX && proximity.is_none_or(|(d, _)| dist < d) {
                proximity = Some((dist, anchor));
            }
        };

        if top {
            let mid = to_screen(Vec2::new(center.x, min.y));
            let anchor = to_screen(Vec2::new(center.x, max.y));
            consider(mid.y, frame_delta.y < 0.0, anchor);
        }
        if bottom {
            let mid = to_screen(Vec2::new(center.x, max.y));
            let anchor = to_screen(Vec2::new(center.x, min.y));
            consider(viewport.y - mid.y, frame_delta.y > 0.0, anchor);
        }
        if left {
            let mid = to_screen(Vec2::new(min.x, center.y));
            let anchor = to_screen(Vec2::new(max.x, center.y));
            consider(mid.x, frame_delta.x < 0.0, anchor);
        }
        if right {
            let mid = to_screen(Vec2::new(max.x, center.y));
            let anchor = to_screen(Vec2::new(min.x, center.y));
            consider(viewport.x - mid.x, frame_delta.x > 0.0, anchor);
        }

        let Some((dist, anchor)) = proximity else {
            return false;
        };
        let t = 1.0 - (dist.max(0.0) / EDGE_SENSITIVITY_PX);
        let step = MAX_EDGE_PUSH_STEP * t * t;
        view.set_zoom(view.zoom_factor() * (1.0 - step), Some(anchor))
    }
}

/// Screen-pixel delta expressed in normalized logical units at the current
/// effective scale.
fn screen_delta_to_logical_norm(delta: Vec2, view: &ViewTransform) -> Vec2 {
    let logical = view.logical_size();
    if logical.x <= 0.0 || logical.y <= 0.0 {
        return Vec2::ZERO;
    }
    let s = view.effective_scale();
    Vec2::new(delta.x / s / logical.x, delta.y / s / logical.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::model::PerspectiveParams;

    fn setup() -> (CropSession, ViewTransform) {
        let mut view = ViewTransform::new();
        view.set_viewport(Vec2::new(800.0, 600.0), 1.0);
        view.set_texture_size(400.0, 300.0);
        let mut session = CropSession::new();
        session.set_rect(CropRect::new(0.5, 0.5, 0.5, 0.5));
        (session, view)
    }

    #[test]
    fn interior_hit_selects_pan() {
        let (session, _) = setup();
        let s = DragStrategy::from_hit(HitRegion::Interior, session.rect(), Vec2::ZERO);
        assert!(matches!(s, DragStrategy::Pan(_)));
        let s = DragStrategy::from_hit(HitRegion::Right, session.rect(), Vec2::ZERO);
        assert!(matches!(s, DragStrategy::Resize(_)));
    }

    #[test]
    fn pan_translates_center_by_screen_delta() {
        let (mut session, mut view) = setup();
        let mut drag =
            DragStrategy::from_hit(HitRegion::Interior, session.rect(), Vec2::new(400.0, 300.0));
        // Effective scale is 2.0, so 80 screen px = 40 texture px = 0.1 of
        // the 400 px width.
        let out = drag.update(Vec2::new(480.0, 300.0), &mut session, &mut view);
        assert!(out.crop_changed);
        let r = session.rect();
        assert!((r.cx - 0.6).abs() < 1e-4, "cx = {}", r.cx);
        assert!((r.cy - 0.5).abs() < 1e-4);
    }

    #[test]
    fn pan_rejects_moves_that_leave_the_quad() {
        let (mut session, mut view) = setup();
        let mut drag =
            DragStrategy::from_hit(HitRegion::Interior, session.rect(), Vec2::new(400.0, 300.0));
        // A huge drag would push the rect far outside the unit quad.
        let out = drag.update(Vec2::new(4000.0, 300.0), &mut session, &mut view);
        assert!(!out.crop_changed);
        assert!((session.rect().cx - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pan_recovers_when_pointer_returns() {
        let (mut session, mut view) = setup();
        let mut drag =
            DragStrategy::from_hit(HitRegion::Interior, session.rect(), Vec2::new(400.0, 300.0));
        drag.update(Vec2::new(4000.0, 300.0), &mut session, &mut view);
        let out = drag.update(Vec2::new(480.0, 300.0), &mut session, &mut view);
        assert!(out.crop_changed);
        assert!((session.rect().cx - 0.6).abs() < 1e-4);
    }

    #[test]
    fn resize_moves_only_the_grabbed_edge() {
        let (mut session, mut view) = setup();
        let mut drag =
            DragStrategy::from_hit(HitRegion::Right, session.rect(), Vec2::new(600.0, 300.0));
        let out = drag.update(Vec2::new(640.0, 300.0), &mut session, &mut view);
        assert!(out.crop_changed);
        let r = session.rect();
        // Left edge stays at 0.25; right edge grew by 0.05.
        assert!((r.min().x - 0.25).abs() < 1e-4);
        assert!((r.max().x - 0.80).abs() < 1e-4, "max.x = {}", r.max().x);
        assert!((r.height - 0.5).abs() < 1e-4);
    }

    #[test]
    fn resize_enforces_minimum_size() {
        let (mut session, mut view) = setup();
        let mut drag =
            DragStrategy::from_hit(HitRegion::Right, session.rect(), Vec2::new(600.0, 300.0));
        // Drag the right edge far past the left edge.
        drag.update(Vec2::new(-2000.0, 300.0), &mut session, &mut view);
        let r = session.rect();
        assert!(r.width >= MIN_CROP_SIZE - 1e-6);
    }

    #[test]
    fn resize_reverts_when_candidate_leaves_quad() {
        let (mut session, mut view) = setup();
        session.set_params(PerspectiveParams {
            vertical: 1.0,
            horizontal: 0.9,
            ..Default::default()
        });
        session.set_rect(CropRect::new(0.5, 0.5, 0.1, 0.1));
        let before = session.rect();
        let mut drag =
            DragStrategy::from_hit(HitRegion::Right, session.rect(), Vec2::new(440.0, 300.0));
        drag.update(Vec2::new(2400.0, 300.0), &mut session, &mut view);
        // Either the rect is still valid, or the frame was rejected wholesale.
        assert!(rect_inside_quad(&session.rect().corners(), session.quad()));
        assert!(session.rect().width <= 1.0);
        let _ = before;
    }

    #[test]
    fn edge_push_zooms_out_near_the_boundary() {
        let (mut session, mut view) = setup();
        // Zoom in so the crop's right edge sits near the viewport edge.
        view.set_zoom(3.0, None);
        let mut drag = DragStrategy::from_hit(
            HitRegion::Right,
            session.rect(),
            view.image_to_viewport(Vec2::new(300.0, 150.0)),
        );
        let zoom_before = view.zoom_factor();
        let edge_screen = view.image_to_viewport(Vec2::new(300.0, 150.0));
        // Push outward a little; the edge is within the sensitivity band.
        let out = drag.update(edge_screen + Vec2::new(6.0, 0.0), &mut session, &mut view);
        if edge_screen.x > view.viewport().x - EDGE_SENSITIVITY_PX {
            assert!(out.zoom_changed);
            assert!(view.zoom_factor() < zoom_before);
        }
    }

    #[test]
    fn edge_push_does_not_fire_away_from_the_boundary() {
        let (mut session, mut view) = setup();
        let start = view.image_to_viewport(Vec2::new(300.0, 150.0));
        let mut drag = DragStrategy::from_hit(HitRegion::Right, session.rect(), start);
        let out = drag.update(start + Vec2::new(5.0, 0.0), &mut session, &mut view);
        assert!(!out.zoom_changed);
    }
}
