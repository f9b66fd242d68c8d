//! Total-least-squares line fitting.

use crate::model::{Point, Vector};

/// An infinite line through `origin` with unit `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub origin: Point,
    pub direction: Vector,
}

impl Line {
    /// Orthogonal projection of `p` onto the line.
    pub fn closest_point(&self, p: Point) -> Point {
        self.origin + self.direction * (p - self.origin).dot(self.direction)
    }
}

/// Fits the line minimising the sum of squared orthogonal distances.
///
/// The direction is the principal eigenvector of the point covariance.
/// Returns `None` for fewer than two distinct points.
pub fn fit_line(points: &[Point]) -> Option<Line> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let mean = Point::new(sx / n, sy / n);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = *p - mean;
        sxx += d.x * d.x;
        syy += d.y * d.y;
        sxy += d.x * d.y;
    }
    if sxx + syy <= f64::EPSILON {
        return None;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(Line {
        origin: mean,
        direction: Vector::new(theta.cos(), theta.sin()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_diagonal_points() {
        let pts: Vec<Point> = (0..5).map(|i| Point::new(i as f64, i as f64)).collect();
        let line = fit_line(&pts).unwrap();
        assert!((line.direction.x.abs() - line.direction.y.abs()).abs() < 1e-12);
        let q = line.closest_point(Point::new(0.0, 2.0));
        assert!((q.x - 1.0).abs() < 1e-9 && (q.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn vertical_points_give_vertical_direction() {
        let pts = [Point::new(3.0, 0.0), Point::new(3.0, 1.0), Point::new(3.0, 5.0)];
        let line = fit_line(&pts).unwrap();
        assert!(line.direction.x.abs() < 1e-12);
    }

    #[test]
    fn coincident_points_do_not_fit() {
        let p = Point::new(1.0, 1.0);
        assert!(fit_line(&[p, p, p]).is_none());
        assert!(fit_line(&[p]).is_none());
    }
}
