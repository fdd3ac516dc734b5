//! Projective geometry for the tilt correction: homography construction,
//! quad projection, containment tests, and the iterative crop-fitting solver.

use super::{Mat3, Quad, Vec2, unit_quad};

/// Maximum tilt in degrees reached when a tilt parameter hits ±1.
const MAX_TILT_DEG: f32 = 20.0;
/// Tilt magnitudes below this build the identity matrix.
const TILT_EPS: f32 = 1e-5;
/// Slack for the containment tests so points on a boundary count as inside.
const CONTAINMENT_EPS: f32 = 1e-5;

/// Default distance in texture pixels kept between a crop corner and the
/// texture edge; guards against bilinear bleed at crop boundaries.
pub const DEFAULT_UV_PADDING_PX: f32 = 3.0;
const MAX_CONSTRAIN_ITERATIONS: usize = 20;

/// Builds the sampling homography for the given tilt parameters, each clamped
/// to `[-1, 1]` and scaled to a maximum 20° rotation about the image X axis
/// (`vertical`) and Y axis (`horizontal`).
///
/// The returned matrix maps display unit-square coordinates to texture UV
/// coordinates; its inverse projects texture corners onto the display plane.
pub fn build_perspective_matrix(vertical: f32, horizontal: f32) -> Mat3 {
    let v = vertical.clamp(-1.0, 1.0);
    let h = horizontal.clamp(-1.0, 1.0);
    if v.abs() < TILT_EPS && h.abs() < TILT_EPS {
        return Mat3::IDENTITY;
    }

    let (sv, cv) = (v * MAX_TILT_DEG.to_radians()).sin_cos();
    let (sh, ch) = (h * MAX_TILT_DEG.to_radians()).sin_cos();

    // Tilt about the X axis moves the top/bottom edges in depth, tilt about
    // the Y axis the left/right edges; both projected from unit distance.
    let tilt_x = Mat3::from_rows([1.0, 0.0, 0.0], [0.0, cv, 0.0], [0.0, sv, 1.0]);
    let tilt_y = Mat3::from_rows([ch, 0.0, 0.0], [0.0, 1.0, 0.0], [sh, 0.0, 1.0]);

    let center = Vec2::new(0.5, 0.5);
    let forward = Mat3::translation(center) * tilt_x * tilt_y * Mat3::translation(-center);
    forward.invert().unwrap_or(Mat3::IDENTITY)
}

/// Projects the texture unit square's corners through the numerical inverse
/// of `matrix`, yielding the quadrilateral that is still valid to crop from.
pub fn compute_projected_quad(matrix: &Mat3) -> Quad {
    let inv = matrix.invert().unwrap_or(Mat3::IDENTITY);
    unit_quad().map(|corner| inv.project(corner))
}

/// Consistent-orientation cross-product test for convex polygons. Boundary
/// points count as inside.
pub fn point_in_convex_polygon(point: Vec2, polygon: &Quad) -> bool {
    let mut sign = 0.0f32;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let cross = (b - a).cross(point - a);
        if cross.abs() <= CONTAINMENT_EPS {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// A rectangle given by its four corners is inside the quad only when every
/// corner passes the polygon test.
pub fn rect_inside_quad(rect_corners: &Quad, quad: &Quad) -> bool {
    rect_corners
        .iter()
        .all(|&c| point_in_convex_polygon(c, quad))
}

/// Scale the rectangle must shrink by so it fits inside `quad`, computed by
/// casting rays from `center` through each corner and finding the nearest
/// quad-edge intersection along the ray. Returns 1.0 when no corner escapes
/// or when the inputs are degenerate.
pub fn calculate_min_zoom_to_fit(center: Vec2, rect_corners: &Quad, quad: &Quad) -> f32 {
    let mut min_t = f32::INFINITY;
    for &corner in rect_corners {
        let dir = corner - center;
        if dir.length() < 1e-9 {
            continue;
        }
        let mut nearest = f32::INFINITY;
        for i in 0..quad.len() {
            let a = quad[i];
            let b = quad[(i + 1) % quad.len()];
            if let Some((t, s)) = ray_segment_intersection(center, dir, a, b) {
                if (0.0..=1.0).contains(&s) && t > 1e-6 {
                    nearest = nearest.min(t);
                }
            }
        }
        if nearest < 1.0 {
            min_t = min_t.min(nearest);
        }
    }
    if min_t.is_finite() && min_t > 1e-6 {
        1.0 / min_t
    } else {
        1.0
    }
}

/// Solves `center + t*dir == a + s*(b - a)`. Returns `None` when the ray and
/// segment are parallel.
fn ray_segment_intersection(center: Vec2, dir: Vec2, a: Vec2, b: Vec2) -> Option<(f32, f32)> {
    let edge = b - a;
    let denom = dir.cross(edge);
    if denom.abs() < 1e-12 {
        return None;
    }
    let diff = a - center;
    let t = diff.cross(edge) / denom;
    let s = diff.cross(dir) / denom;
    Some((t, s))
}

/// True when every corner of the rectangle, projected through `matrix` into
/// texture pixel coordinates, sits at least `padding_px` away from the
/// texture edge.
pub fn crop_corners_within_uv_bounds(
    rect_corners: &Quad,
    matrix: &Mat3,
    tex_w: f32,
    tex_h: f32,
    padding_px: f32,
) -> bool {
    if tex_w <= 0.0 || tex_h <= 0.0 {
        return true;
    }
    rect_corners.iter().all(|&corner| {
        let uv = matrix.project(corner);
        let px = uv.x * tex_w;
        let py = uv.y * tex_h;
        px >= padding_px && px <= tex_w - padding_px && py >= padding_px && py <= tex_h - padding_px
    })
}

/// Shrinks a center/size rectangle until all four corners, projected through
/// `matrix` into texture space, respect `padding_px` from the texture edge.
///
/// Iterative with a hard cap; the per-step shrink is 2–10% depending on how
/// far out the worst corner is. If the cap is hit the result is still no
/// larger than the input.
pub fn constrain_rect_to_uv_bounds(
    center: Vec2,
    size: Vec2,
    matrix: &Mat3,
    tex_w: f32,
    tex_h: f32,
    padding_px: f32,
) -> (Vec2, Vec2) {
    if tex_w <= 0.0 || tex_h <= 0.0 || size.x <= 0.0 || size.y <= 0.0 {
        return (center, size);
    }
    let mut size = size;
    for _ in 0..MAX_CONSTRAIN_ITERATIONS {
        let corners = corners_of(center, size);
        let worst = worst_uv_overshoot_px(&corners, matrix, tex_w, tex_h, padding_px);
        if worst <= 0.0 {
            break;
        }
        let frac = worst / tex_w.min(tex_h);
        let step = (0.02 + frac * 0.2).min(0.10);
        size = size * (1.0 - step);
    }
    (center, size)
}

fn corners_of(center: Vec2, size: Vec2) -> Quad {
    let hx = size.x * 0.5;
    let hy = size.y * 0.5;
    [
        Vec2::new(center.x - hx, center.y - hy),
        Vec2::new(center.x + hx, center.y - hy),
        Vec2::new(center.x + hx, center.y + hy),
        Vec2::new(center.x - hx, center.y + hy),
    ]
}

/// Largest distance in texture pixels by which any projected corner violates
/// the padded bounds; zero or negative when all corners are inside.
fn worst_uv_overshoot_px(
    corners: &Quad,
    matrix: &Mat3,
    tex_w: f32,
    tex_h: f32,
    padding_px: f32,
) -> f32 {
    let mut worst = 0.0f32;
    for &corner in corners {
        let uv = matrix.project(corner);
        let px = uv.x * tex_w;
        let py = uv.y * tex_h;
        worst = worst
            .max(padding_px - px)
            .max(px - (tex_w - padding_px))
            .max(padding_px - py)
            .max(py - (tex_h - padding_px));
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered_rect(half: f32) -> Quad {
        corners_of(Vec2::new(0.5, 0.5), Vec2::splat(half * 2.0))
    }

    #[test]
    fn zero_tilt_builds_identity() {
        let m = build_perspective_matrix(0.0, 0.0);
        assert!(m.is_identity(1e-6));
        let m = build_perspective_matrix(1e-6, -1e-6);
        assert!(m.is_identity(1e-6));
    }

    #[test]
    fn identity_quad_is_unit_quad() {
        let quad = compute_projected_quad(&Mat3::IDENTITY);
        for (got, want) in quad.iter().zip(unit_quad().iter()) {
            assert!((got.x - want.x).abs() < 1e-6 && (got.y - want.y).abs() < 1e-6);
        }
    }

    #[test]
    fn tilt_inputs_are_clamped() {
        let a = build_perspective_matrix(5.0, 0.0);
        let b = build_perspective_matrix(1.0, 0.0);
        for (x, y) in a.m.iter().zip(b.m.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn sampling_matrix_round_trips_quad_corners() {
        let m = build_perspective_matrix(0.4, -0.25);
        let quad = compute_projected_quad(&m);
        // Each quad corner samples back to its texture corner.
        for (corner, tex) in quad.iter().zip(unit_quad().iter()) {
            let uv = m.project(*corner);
            assert!((uv.x - tex.x).abs() < 1e-3 && (uv.y - tex.y).abs() < 1e-3);
        }
    }

    #[test]
    fn vertical_tilt_produces_a_trapezoid() {
        let m = build_perspective_matrix(0.8, 0.0);
        let quad = compute_projected_quad(&m);
        let top = (quad[1].x - quad[0].x).abs();
        let bottom = (quad[2].x - quad[3].x).abs();
        assert!((top - bottom).abs() > 1e-3, "tilt should change edge widths");
    }

    #[test]
    fn point_in_polygon_handles_boundary_and_outside() {
        let quad = unit_quad();
        assert!(point_in_convex_polygon(Vec2::new(0.5, 0.5), &quad));
        assert!(point_in_convex_polygon(Vec2::new(0.0, 0.5), &quad));
        assert!(!point_in_convex_polygon(Vec2::new(1.2, 0.5), &quad));
        assert!(!point_in_convex_polygon(Vec2::new(0.5, -0.01), &quad));
    }

    #[test]
    fn rect_inside_quad_requires_all_corners() {
        let quad = unit_quad();
        assert!(rect_inside_quad(&centered_rect(0.4), &quad));
        assert!(!rect_inside_quad(&centered_rect(0.6), &quad));
    }

    #[test]
    fn min_zoom_is_one_for_contained_rect() {
        let quad = unit_quad();
        let rect = centered_rect(0.3);
        let z = calculate_min_zoom_to_fit(Vec2::new(0.5, 0.5), &rect, &quad);
        assert!((z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn min_zoom_exceeds_one_for_oversized_rect() {
        let quad = unit_quad();
        let rect = centered_rect(0.8);
        let z = calculate_min_zoom_to_fit(Vec2::new(0.5, 0.5), &rect, &quad);
        assert!(z > 1.0);
        // Shrinking by the reported factor brings the rect back inside.
        let fitted = corners_of(Vec2::new(0.5, 0.5), Vec2::splat(1.6 / z));
        assert!(rect_inside_quad(&fitted, &quad));
    }

    #[test]
    fn min_zoom_degenerate_inputs_return_one() {
        let quad = unit_quad();
        let point_rect = [Vec2::new(0.5, 0.5); 4];
        let z = calculate_min_zoom_to_fit(Vec2::new(0.5, 0.5), &point_rect, &quad);
        assert!((z - 1.0).abs() < 1e-6);

        let flat_quad = [Vec2::ZERO; 4];
        let rect = centered_rect(0.3);
        let z = calculate_min_zoom_to_fit(Vec2::new(0.5, 0.5), &rect, &flat_quad);
        assert!((z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn constrain_converges_to_padded_bounds() {
        let tex = (800.0, 600.0);
        let m = build_perspective_matrix(0.6, 0.3);
        let (center, size) = constrain_rect_to_uv_bounds(
            Vec2::new(0.5, 0.5),
            Vec2::splat(1.0),
            &m,
            tex.0,
            tex.1,
            DEFAULT_UV_PADDING_PX,
        );
        let corners = corners_of(center, size);
        assert!(crop_corners_within_uv_bounds(
            &corners,
            &m,
            tex.0,
            tex.1,
            DEFAULT_UV_PADDING_PX
        ));
    }

    #[test]
    fn constrain_never_grows_the_rect() {
        let m = build_perspective_matrix(1.0, 1.0);
        let input = Vec2::splat(1.4);
        let (_, size) = constrain_rect_to_uv_bounds(
            Vec2::new(0.5, 0.5),
            input,
            &m,
            100.0,
            100.0,
            DEFAULT_UV_PADDING_PX,
        );
        assert!(size.x <= input.x && size.y <= input.y);
    }

    #[test]
    fn constrain_leaves_valid_rect_untouched() {
        let m = Mat3::IDENTITY;
        let input = Vec2::splat(0.5);
        let (center, size) = constrain_rect_to_uv_bounds(
            Vec2::new(0.5, 0.5),
            input,
            &m,
            1000.0,
            1000.0,
            DEFAULT_UV_PADDING_PX,
        );
        assert_eq!(center, Vec2::new(0.5, 0.5));
        assert_eq!(size, input);
    }
}
