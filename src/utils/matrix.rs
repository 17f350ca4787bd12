use crate::utils::vector::Vec2;

/// 2x3 affine matrix mapping canvas-space points.
///
/// Column layout: `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`. Transform
/// snapshots store one of these per gesture so a live transform can be
/// replayed from temp history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

const IDENTITY_EPS: f32 = 1e-6;

impl Mat {
    pub const IDENTITY: Mat = Mat {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translation(dx: f32, dy: f32) -> Self {
        Mat {
            tx: dx,
            ty: dy,
            ..Mat::IDENTITY
        }
    }

    pub fn rotation(rad: f32) -> Self {
        let (sin_r, cos_r) = rad.sin_cos();
        Mat {
            a: cos_r,
            b: sin_r,
            c: -sin_r,
            d: cos_r,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Mat {
            a: sx,
            d: sy,
            ..Mat::IDENTITY
        }
    }

    /// Rotation about an arbitrary pivot point.
    pub fn rotation_about(center: Vec2, rad: f32) -> Self {
        Mat::translation(center.x, center.y)
            .then(&Mat::rotation(rad))
            .then(&Mat::translation(-center.x, -center.y))
    }

    /// Mirror about a vertical (`horizontal == true`) or horizontal axis
    /// through the pivot point.
    pub fn flip_about(center: Vec2, horizontal: bool) -> Self {
        let (sx, sy) = if horizontal { (-1.0, 1.0) } else { (1.0, -1.0) };
        Mat::translation(center.x, center.y)
            .then(&Mat::scaling(sx, sy))
            .then(&Mat::translation(-center.x, -center.y))
    }

    /// `self * other`: apply `other` first, then `self`.
    pub fn then(&self, other: &Mat) -> Mat {
        Mat {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            tx: self.a * other.tx + self.c * other.ty + self.tx,
            ty: self.b * other.tx + self.d * other.ty + self.ty,
        }
    }

    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2 {
            x: self.a * p.x + self.c * p.y + self.tx,
            y: self.b * p.x + self.d * p.y + self.ty,
        }
    }

    /// Inverse matrix, or `None` when degenerate.
    pub fn inverse(&self) -> Option<Mat> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < IDENTITY_EPS {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = self.d * inv_det;
        let b = -self.b * inv_det;
        let c = -self.c * inv_det;
        let d = self.a * inv_det;
        Some(Mat {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }

    pub fn is_identity(&self) -> bool {
        (self.a - 1.0).abs() < IDENTITY_EPS
            && self.b.abs() < IDENTITY_EPS
            && self.c.abs() < IDENTITY_EPS
            && (self.d - 1.0).abs() < IDENTITY_EPS
            && self.tx.abs() < IDENTITY_EPS
            && self.ty.abs() < IDENTITY_EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) {
        assert!((a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4, "{a:?} vs {b:?}");
    }

    #[test]
    fn identity_maps_points_unchanged() {
        let p = Vec2::new(3.5, -2.0);
        close(Mat::IDENTITY.apply(p), p);
        assert!(Mat::IDENTITY.is_identity());
    }

    #[test]
    fn rotation_about_pivot_keeps_pivot_fixed() {
        let pivot = Vec2::new(10.0, 20.0);
        let m = Mat::rotation_about(pivot, std::f32::consts::FRAC_PI_2);
        close(m.apply(pivot), pivot);
        close(m.apply(Vec2::new(11.0, 20.0)), Vec2::new(10.0, 21.0));
    }

    #[test]
    fn inverse_round_trips() {
        let m = Mat::translation(4.0, -7.0)
            .then(&Mat::rotation_about(Vec2::new(2.0, 2.0), 0.7))
            .then(&Mat::flip_about(Vec2::new(1.0, 1.0), true));
        let inv = m.inverse().unwrap();
        let p = Vec2::new(13.0, 5.0);
        close(inv.apply(m.apply(p)), p);
        assert!(m.then(&inv).is_identity());
    }

    #[test]
    fn flip_twice_is_identity() {
        let m = Mat::flip_about(Vec2::new(50.0, 50.0), false);
        assert!(m.then(&m).is_identity());
        assert!(!m.is_identity());
    }
}
