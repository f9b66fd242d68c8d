//! Plane geometry primitives.
//!
//! `Point` is a location, `Vector` a displacement. Subtracting two points
//! yields a vector; adding a vector to a point yields a point.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// A location in the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn sq_dist(self, other: Point) -> f64 {
        (self - other).sq_norm()
    }

    #[inline]
    pub fn dist(self, other: Point) -> f64 {
        self.sq_dist(other).sqrt()
    }

    /// Point at parameter `t` on the segment from `self` to `other`.
    #[inline]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        self + (other - self) * t
    }

    /// Pixel-grid adjacency: both coordinates differ by at most one unit.
    #[inline]
    pub fn is_connected_to(self, other: Point) -> bool {
        (self.x - other.x).abs() <= 1.0 && (self.y - other.y).abs() <= 1.0
    }

    #[inline]
    pub fn to_vector(self) -> Vector {
        Vector::new(self.x, self.y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// A displacement in the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3-D cross product.
    #[inline]
    pub fn cross(self, other: Vector) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn sq_norm(self) -> f64 {
        self.dot(self)
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.sq_norm().sqrt()
    }

    /// Unit vector in the same direction, or `None` for a null vector.
    #[inline]
    pub fn normalized(self) -> Option<Vector> {
        let n = self.norm();
        if n > f64::EPSILON {
            Some(Vector::new(self.x / n, self.y / n))
        } else {
            None
        }
    }

    /// Counter-clockwise rotation by `angle` radians.
    #[inline]
    pub fn rotate(self, angle: f64) -> Vector {
        let (s, c) = angle.sin_cos();
        Vector::new(c * self.x - s * self.y, s * self.x + c * self.y)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add<Vector> for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub<Vector> for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Vector) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Sub for Point {
    type Output = Vector;
    #[inline]
    fn sub(self, rhs: Point) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add for Vector {
    type Output = Vector;
    #[inline]
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;
    #[inline]
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    #[inline]
    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    #[inline]
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_vector_arithmetic() {
        let p = Point::new(1.0, 2.0);
        let q = Point::new(4.0, 6.0);
        let v = q - p;
        assert_eq!(v, Vector::new(3.0, 4.0));
        assert_eq!(p + v, q);
        assert!((v.norm() - 5.0).abs() < 1e-12);
        assert!((p.dist(q) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_rejects_null_vector() {
        assert!(Vector::new(0.0, 0.0).normalized().is_none());
        let n = Vector::new(0.0, 3.0).normalized().unwrap();
        assert!((n.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotate_quarter_turn() {
        let r = Vector::new(1.0, 0.0).rotate(std::f64::consts::FRAC_PI_2);
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cross_sign_gives_orientation() {
        let a = Vector::new(1.0, 0.0);
        assert!(a.cross(Vector::new(0.0, 1.0)) > 0.0);
        assert!(a.cross(Vector::new(0.0, -1.0)) < 0.0);
    }

    #[test]
    fn pixel_connectivity() {
        let p = Point::new(10.0, 10.0);
        assert!(p.is_connected_to(Point::new(11.0, 9.0)));
        assert!(!p.is_connected_to(Point::new(12.0, 10.0)));
    }
}
