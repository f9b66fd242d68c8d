//! Segment/line intersection and signed angles.

use crate::model::{Point, Vector};

const SMALL_NUM: f64 = 1e-8;

/// Outcome of intersecting two finite segments `S1 = [a0, a1]` and
/// `S2 = [b0, b1]`.
///
/// | Variant | Meaning |
/// |---------|---------|
/// | `Disjoint` | no common point, lines parallel or non-intersecting |
/// | `Point` | unique point inside both segments |
/// | `Overlap` | collinear segments sharing a sub-interval |
/// | `FirstSegment` | the second *line* crosses the first segment |
/// | `SecondSegment` | the first *line* crosses the second segment |
/// | `LinesOnly` | the supporting lines meet outside both segments |
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    Disjoint,
    Point(Point),
    Overlap(Point, Point),
    FirstSegment(Point),
    SecondSegment(Point),
    LinesOnly(Point),
}

impl Intersection {
    /// Numeric classification code, 0 through 5, in variant order.
    pub fn code(&self) -> u8 {
        match self {
            Self::Disjoint => 0,
            Self::Point(_) => 1,
            Self::Overlap(..) => 2,
            Self::FirstSegment(_) => 3,
            Self::SecondSegment(_) => 4,
            Self::LinesOnly(_) => 5,
        }
    }

    /// The (first) intersection point, if any.
    pub fn point(&self) -> Option<Point> {
        match *self {
            Self::Disjoint => None,
            Self::Point(p)
            | Self::Overlap(p, _)
            | Self::FirstSegment(p)
            | Self::SecondSegment(p)
            | Self::LinesOnly(p) => Some(p),
        }
    }
}

/// Intersects segment `[a0, a1]` with segment `[b0, b1]`.
pub fn intersect_segments(a0: Point, a1: Point, b0: Point, b1: Point) -> Intersection {
    let u = a1 - a0;
    let v = b1 - b0;
    let w = a0 - b0;
    let d = u.cross(v);

    if d.abs() < SMALL_NUM {
        if u.cross(w) != 0.0 || v.cross(w) != 0.0 {
            return Intersection::Disjoint;
        }
        let du = u.sq_norm();
        let dv = v.sq_norm();
        if du == 0.0 && dv == 0.0 {
            return if a0 == b0 { Intersection::Point(a0) } else { Intersection::Disjoint };
        }
        if du == 0.0 {
            return if in_collinear_segment(a0, b0, b1) {
                Intersection::Point(a0)
            } else {
                Intersection::Disjoint
            };
        }
        if dv == 0.0 {
            return if in_collinear_segment(b0, a0, a1) {
                Intersection::Point(b0)
            } else {
                Intersection::Disjoint
            };
        }

        let w2 = a1 - b0;
        let (mut t0, mut t1) = if v.x != 0.0 {
            (w.x / v.x, w2.x / v.x)
        } else {
            (w.y / v.y, w2.y / v.y)
        };
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > 1.0 || t1 < 0.0 {
            return Intersection::Disjoint;
        }
        let t0 = t0.max(0.0);
        let t1 = t1.min(1.0);
        if t0 == t1 {
            return Intersection::Point(b0 + v * t0);
        }
        return Intersection::Overlap(b0 + v * t0, b0 + v * t1);
    }

    let s = v.cross(w) / d;
    let t = u.cross(w) / d;
    let p = a0 + u * s;
    let on_first = (0.0..=1.0).contains(&s);
    let on_second = (0.0..=1.0).contains(&t);

    match (on_first, on_second) {
        (true, true) => Intersection::Point(p),
        (true, false) => Intersection::FirstSegment(p),
        (false, true) => Intersection::SecondSegment(p),
        (false, false) => Intersection::LinesOnly(p),
    }
}

/// True iff the two finite segments cross at a single interior point.
pub fn segments_intersect(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    matches!(intersect_segments(a0, a1, b0, b1), Intersection::Point(_))
}

fn in_collinear_segment(p: Point, s0: Point, s1: Point) -> bool {
    if s0.x != s1.x {
        (s0.x <= p.x && p.x <= s1.x) || (s0.x >= p.x && p.x >= s1.x)
    } else {
        (s0.y <= p.y && p.y <= s1.y) || (s0.y >= p.y && p.y >= s1.y)
    }
}

/// `acos` with its argument clamped to `[-1, 1]`.
#[inline]
pub fn safe_acos(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).acos()
}

/// Signed angle that rotates `a` onto `b`, in `[-pi, pi]`.
///
/// Returns `None` when either vector is null.
pub fn signed_angle(a: Vector, b: Vector) -> Option<f64> {
    let na = a.norm();
    let nb = b.norm();
    if na <= 0.0 || nb <= 0.0 {
        return None;
    }
    let cosine = safe_acos(a.dot(b) / (na * nb));
    Some(if a.cross(b) < 0.0 { -cosine } else { cosine })
}

/// Angle of the boundary spoke `v` measured from the axis tangent `t`.
///
/// Positive angles lie on side one (to the left of the tangent). Null
/// vectors yield zero.
pub fn object_angle(t: Vector, v: Vector) -> f64 {
    signed_angle(t, v).unwrap_or(0.0)
}
