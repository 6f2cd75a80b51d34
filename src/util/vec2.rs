use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// 2D vector for world-space positions and movement intents
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    #[inline]
    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    pub fn lerp(&self, other: Vec2, t: f32) -> Self {
        *self + (other - *self) * t
    }

    /// Returns angle in radians
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Normalize each component into `[0, bound)` on a wrapping axis pair
    pub fn wrap(&self, bounds: Vec2) -> Self {
        Self {
            x: wrap_coord(self.x, bounds.x),
            y: wrap_coord(self.y, bounds.y),
        }
    }

    /// Shortest-path delta from `self` to `other` on a torus of the given bounds.
    /// Each component's magnitude is at most half the axis size.
    pub fn wrapped_delta_to(&self, other: Vec2, bounds: Vec2) -> Self {
        Self {
            x: wrapped_axis_delta(self.x, other.x, bounds.x),
            y: wrapped_axis_delta(self.y, other.y, bounds.y),
        }
    }

    /// Check if vector is approximately equal to another
    pub fn approx_eq(&self, other: Vec2, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon
    }
}

/// Normalize a scalar coordinate into `[0, size)` on a wrapping axis
#[inline]
pub fn wrap_coord(value: f32, size: f32) -> f32 {
    if size <= 0.0 {
        return value;
    }
    let mut v = value % size;
    if v < 0.0 {
        v += size;
    }
    v
}

/// Shortest signed distance from `from` to `to` on a wrapping axis of the
/// given size; magnitude is at most `size / 2`.
#[inline]
pub fn wrapped_axis_delta(from: f32, to: f32, size: f32) -> f32 {
    let mut delta = to - from;
    if delta.abs() > size / 2.0 {
        if delta > 0.0 {
            delta -= size;
        } else {
            delta += size;
        }
    }
    delta
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self * rhs.x,
            y: self * rhs.y,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_length() {
        let v = Vec2::new(3.0, 4.0);
        assert!(approx_eq(v.length(), 5.0));
        assert!(approx_eq(v.length_sq(), 25.0));
    }

    #[test]
    fn test_normalize() {
        let n = Vec2::new(3.0, 4.0).normalize();
        assert!(approx_eq(n.length(), 1.0));
        assert!(approx_eq(n.x, 0.6));
        assert!(approx_eq(n.y, 0.8));
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_lerp() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 10.0);
        let mid = a.lerp(b, 0.5);
        assert!(approx_eq(mid.x, 5.0));
        assert!(approx_eq(mid.y, 5.0));
    }

    #[test]
    fn test_from_angle() {
        let v = Vec2::from_angle(PI / 2.0);
        assert!(approx_eq(v.x, 0.0));
        assert!(approx_eq(v.y, 1.0));
    }

    #[test]
    fn test_operators() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a + b, Vec2::new(4.0, 6.0));
        assert_eq!(b - a, Vec2::new(2.0, 2.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(2.0 * a, Vec2::new(2.0, 4.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));
    }

    #[test]
    fn test_wrap_coord() {
        assert!(approx_eq(wrap_coord(1050.0, 1000.0), 50.0));
        assert!(approx_eq(wrap_coord(-50.0, 1000.0), 950.0));
        assert!(approx_eq(wrap_coord(500.0, 1000.0), 500.0));
        assert!(approx_eq(wrap_coord(1000.0, 1000.0), 0.0));
    }

    #[test]
    fn test_wrapped_axis_delta_direct() {
        assert!(approx_eq(wrapped_axis_delta(100.0, 300.0, 1000.0), 200.0));
        assert!(approx_eq(wrapped_axis_delta(300.0, 100.0, 1000.0), -200.0));
    }

    #[test]
    fn test_wrapped_axis_delta_across_seam() {
        // 990 -> 10 is 20 forward through the seam, not 980 backward
        assert!(approx_eq(wrapped_axis_delta(990.0, 10.0, 1000.0), 20.0));
        assert!(approx_eq(wrapped_axis_delta(10.0, 990.0, 1000.0), -20.0));
    }

    #[test]
    fn test_wrapped_delta_to() {
        let bounds = Vec2::new(1000.0, 500.0);
        let a = Vec2::new(990.0, 10.0);
        let b = Vec2::new(10.0, 490.0);
        let d = a.wrapped_delta_to(b, bounds);
        assert!(approx_eq(d.x, 20.0));
        assert!(approx_eq(d.y, -20.0));
    }

    #[test]
    fn test_vec_wrap() {
        let bounds = Vec2::new(1000.0, 1000.0);
        let v = Vec2::new(-10.0, 1010.0).wrap(bounds);
        assert!(approx_eq(v.x, 990.0));
        assert!(approx_eq(v.y, 10.0));
    }

    #[test]
    fn test_serde() {
        let v = Vec2::new(1.5, 2.5);
        let encoded = bincode::serde::encode_to_vec(&v, bincode::config::standard()).unwrap();
        let (decoded, _): (Vec2, usize) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(v, decoded);
    }
}
