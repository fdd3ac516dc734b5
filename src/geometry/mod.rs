pub mod perspective;

use std::ops::{Add, Mul, Neg, Sub};

/// 2D point/vector in whichever space the caller is working in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product; sign gives winding.
    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Ordered quadrilateral, corners in top-left, top-right,
/// bottom-right, bottom-left order.
pub type Quad = [Vec2; 4];

/// Corners of the unit square in quad order.
pub fn unit_quad() -> Quad {
    [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ]
}

/// Row-major 3×3 matrix used as a 2D homography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [f32; 9],
}

/// Divisors smaller than this are clamped before the homogeneous divide.
const HOMOGENEOUS_EPS: f32 = 1e-6;

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    pub fn from_rows(r0: [f32; 3], r1: [f32; 3], r2: [f32; 3]) -> Self {
        Self {
            m: [
                r0[0], r0[1], r0[2], r1[0], r1[1], r1[2], r2[0], r2[1], r2[2],
            ],
        }
    }

    pub fn row(&self, i: usize) -> [f32; 3] {
        [self.m[i * 3], self.m[i * 3 + 1], self.m[i * 3 + 2]]
    }

    pub fn translation(t: Vec2) -> Self {
        Self::from_rows([1.0, 0.0, t.x], [0.0, 1.0, t.y], [0.0, 0.0, 1.0])
    }

    /// Rotation by `angle` radians about `center`.
    pub fn rotation_about(center: Vec2, angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let rot = Self::from_rows([c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]);
        Self::translation(center) * rot * Self::translation(-center)
    }

    /// Horizontal mirror of the unit square (x -> 1 - x).
    pub fn mirror_x_unit() -> Self {
        Self::from_rows([-1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0])
    }

    pub fn is_identity(&self, eps: f32) -> bool {
        self.m
            .iter()
            .zip(Self::IDENTITY.m.iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Numerical inverse via the adjugate, computed in f64.
    /// Returns `None` for singular input.
    pub fn invert(&self) -> Option<Mat3> {
        let m: [f64; 9] = std::array::from_fn(|i| self.m[i] as f64);
        let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6]);
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let adj = [
            m[4] * m[8] - m[5] * m[7],
            m[2] * m[7] - m[1] * m[8],
            m[1] * m[5] - m[2] * m[4],
            m[5] * m[6] - m[3] * m[8],
            m[0] * m[8] - m[2] * m[6],
            m[2] * m[3] - m[0] * m[5],
            m[3] * m[7] - m[4] * m[6],
            m[1] * m[6] - m[0] * m[7],
            m[0] * m[4] - m[1] * m[3],
        ];
        Some(Mat3 {
            m: std::array::from_fn(|i| (adj[i] * inv_det) as f32),
        })
    }

    /// Apply the homography to `p` with a homogeneous divide. The divisor is
    /// clamped away from zero so singular configurations degrade instead of
    /// producing NaN/Inf.
    pub fn project(&self, p: Vec2) -> Vec2 {
        let m = &self.m;
        let x = m[0] * p.x + m[1] * p.y + m[2];
        let y = m[3] * p.x + m[4] * p.y + m[5];
        let mut w = m[6] * p.x + m[7] * p.y + m[8];
        if w.abs() < HOMOGENEOUS_EPS {
            w = if w < 0.0 {
                -HOMOGENEOUS_EPS
            } else {
                HOMOGENEOUS_EPS
            };
        }
        Vec2::new(x / w, y / w)
    }
}

impl Mul for Mat3 {
    type Output = Mat3;
    fn mul(self, rhs: Mat3) -> Mat3 {
        let mut out = [0.0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                let mut acc = 0.0f64;
                for k in 0..3 {
                    acc += self.m[r * 3 + k] as f64 * rhs.m[k * 3 + c] as f64;
                }
                out[r * 3 + c] = acc as f32;
            }
        }
        Mat3 { m: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec2_near(a: Vec2, b: Vec2, eps: f32) {
        assert!(
            (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn identity_projects_points_unchanged() {
        let p = Vec2::new(0.3, -1.7);
        assert_vec2_near(Mat3::IDENTITY.project(p), p, 1e-7);
    }

    #[test]
    fn inverse_round_trips_projection() {
        let m = Mat3::from_rows([1.1, 0.2, 0.05], [0.1, 0.9, -0.02], [0.3, -0.1, 1.0]);
        let inv = m.invert().expect("matrix should be invertible");
        let p = Vec2::new(0.25, 0.75);
        assert_vec2_near(inv.project(m.project(p)), p, 1e-4);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = Mat3::from_rows([1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]);
        assert!(m.invert().is_none());
    }

    #[test]
    fn rotation_about_center_keeps_center_fixed() {
        let c = Vec2::new(0.5, 0.5);
        let m = Mat3::rotation_about(c, 1.25);
        assert_vec2_near(m.project(c), c, 1e-6);
    }

    #[test]
    fn mirror_flips_unit_square_horizontally() {
        let m = Mat3::mirror_x_unit();
        assert_vec2_near(m.project(Vec2::new(0.0, 0.3)), Vec2::new(1.0, 0.3), 1e-6);
        assert_vec2_near(m.project(Vec2::new(1.0, 0.3)), Vec2::new(0.0, 0.3), 1e-6);
    }
}
