//! Cubic Bézier curves used to bridge skeletal gaps.

use serde::{Deserialize, Serialize};

use crate::model::{Point, Vector};

/// Number of samples used when searching for the curvature maximum.
pub const CURVATURE_SAMPLES: usize = 200;

/// Consecutive raster points closer than this (squared) are collapsed.
const MIN_RASTER_SQ_STEP: f64 = 0.01;

/// Cubic Bézier `B(u) = (1-u)^3 p0 + 3u(1-u)^2 p1 + 3u^2(1-u) p2 + u^3 p3`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CubicBezier {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

/// A curve sampled at increasing parameters.
#[derive(Debug, Clone, Default)]
pub struct Raster {
    pub points: Vec<Point>,
    pub params: Vec<f64>,
}

impl CubicBezier {
    pub fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self { p0, p1, p2, p3 }
    }

    pub fn point_at(&self, u: f64) -> Point {
        let v = 1.0 - u;
        let (b0, b1, b2, b3) = (v * v * v, 3.0 * u * v * v, 3.0 * u * u * v, u * u * u);
        Point::new(
            b0 * self.p0.x + b1 * self.p1.x + b2 * self.p2.x + b3 * self.p3.x,
            b0 * self.p0.y + b1 * self.p1.y + b2 * self.p2.y + b3 * self.p3.y,
        )
    }

    /// First derivative `B'(u)`.
    pub fn tangent_at(&self, u: f64) -> Vector {
        let v = 1.0 - u;
        let d0 = self.p1 - self.p0;
        let d1 = self.p2 - self.p1;
        let d2 = self.p3 - self.p2;
        d0 * (3.0 * v * v) + d1 * (6.0 * u * v) + d2 * (3.0 * u * u)
    }

    /// Second derivative `B''(u)`.
    pub fn second_derivative_at(&self, u: f64) -> Vector {
        let a = (self.p2 - self.p1) - (self.p1 - self.p0);
        let b = (self.p3 - self.p2) - (self.p2 - self.p1);
        a * (6.0 * (1.0 - u)) + b * (6.0 * u)
    }

    /// Unsigned curvature `|x'y'' - y'x''| / |B'|^3`.
    ///
    /// Returns 1 where the first derivative vanishes.
    pub fn curvature_at(&self, u: f64) -> f64 {
        let d1 = self.tangent_at(u);
        let d2 = self.second_derivative_at(u);
        let den = d1.norm().powi(3);
        if den == 0.0 {
            return 1.0;
        }
        d1.cross(d2).abs() / den
    }

    /// Sampled curvature maximum as `(curvature, parameter)`.
    pub fn max_curvature(&self, samples: usize) -> (f64, f64) {
        let n = samples.max(1);
        let mut best = (f64::NEG_INFINITY, 0.0);
        for i in 0..=n {
            let u = i as f64 / n as f64;
            let k = self.curvature_at(u);
            if k > best.0 {
                best = (k, u);
            }
        }
        best
    }

    /// Length of the control polygon, an upper bound of the arc length.
    pub fn control_length(&self) -> f64 {
        self.p0.dist(self.p1) + self.p1.dist(self.p2) + self.p2.dist(self.p3)
    }

    /// Samples the curve into at most `max_points` points, roughly one per
    /// unit of arc length.
    ///
    /// The result always holds between 2 and `max(max_points, 2)` points,
    /// starts at `p0` and ends at `p3`. Interior samples closer than 0.1
    /// units to their predecessor are dropped.
    pub fn rasterize(&self, max_points: usize) -> Raster {
        let max_points = max_points.max(2);
        let approx_len = 0.5 * (self.control_length() + self.p0.dist(self.p3));
        let wanted = if approx_len.is_finite() { approx_len.ceil() as usize + 1 } else { 2 };
        let n = wanted.clamp(2, max_points);

        let mut raster = Raster {
            points: Vec::with_capacity(n),
            params: Vec::with_capacity(n),
        };
        for i in 0..n {
            let u = i as f64 / (n - 1) as f64;
            let p = self.point_at(u);
            let near_prev = raster
                .points
                .last()
                .is_some_and(|prev| prev.sq_dist(p) <= MIN_RASTER_SQ_STEP);
            if near_prev && i + 1 < n {
                continue;
            }
            if near_prev && raster.points.len() >= 2 {
                // the exact endpoint replaces its near duplicate
                raster.points.pop();
                raster.params.pop();
            }
            raster.points.push(p);
            raster.params.push(u);
        }
        raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn straight() -> CubicBezier {
        CubicBezier::new(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 0.0),
        )
    }

    #[test]
    fn endpoints_are_interpolated() {
        let c = CubicBezier::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 5.0),
            Point::new(4.0, 5.0),
            Point::new(5.0, 0.0),
        );
        assert_eq!(c.point_at(0.0), c.p0);
        assert_eq!(c.point_at(1.0), c.p3);
    }

    #[test]
    fn straight_curve_has_no_curvature() {
        let (k, _) = straight().max_curvature(CURVATURE_SAMPLES);
        assert!(k.abs() < 1e-12);
    }

    #[test]
    fn null_derivative_reports_unit_curvature() {
        let p = Point::new(3.0, 3.0);
        let c = CubicBezier::new(p, p, p, p);
        assert_eq!(c.curvature_at(0.5), 1.0);
    }

    #[test]
    fn rasterize_respects_bound_and_endpoints() {
        let r = straight().rasterize(8);
        assert_eq!(r.points.len(), 8);
        assert_eq!(r.points[0], Point::new(0.0, 0.0));
        assert_eq!(*r.points.last().unwrap(), Point::new(30.0, 0.0));
        assert_eq!(r.params.len(), r.points.len());
    }

    #[test]
    fn rasterize_zero_length_curve_keeps_two_points() {
        let p = Point::new(1.0, 1.0);
        let r = CubicBezier::new(p, p, p, p).rasterize(10);
        assert_eq!(r.points.len(), 2);
    }

    proptest! {
        #[test]
        fn raster_count_is_bounded(
            x0 in -100.0f64..100.0, y0 in -100.0f64..100.0,
            x1 in -100.0f64..100.0, y1 in -100.0f64..100.0,
            x2 in -100.0f64..100.0, y2 in -100.0f64..100.0,
            x3 in -100.0f64..100.0, y3 in -100.0f64..100.0,
            max in 0usize..64,
        ) {
            let c = CubicBezier::new(
                Point::new(x0, y0), Point::new(x1, y1),
                Point::new(x2, y2), Point::new(x3, y3),
            );
            let r = c.rasterize(max);
            prop_assert!(r.points.len() >= 2);
            prop_assert!(r.points.len() <= max.max(2));
            prop_assert_eq!(r.points[0], c.p0);
            prop_assert_eq!(*r.points.last().unwrap(), c.point_at(1.0));
        }
    }
}
