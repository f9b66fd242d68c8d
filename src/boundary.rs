//! Boundary-point lookup for reconstructed axis points.
//!
//! The GSG asks this collaborator for spoke end points whenever it
//! invents new medial-axis points while bridging a gap.

use crate::model::{BoundaryInfo, BoundaryPoint, FluxPoint, Point, Side, Vector};

/// Maps medial-axis points to points on the object boundary.
pub trait BoundaryPointFinder {
    /// Fills `out[i]` with a boundary point per side for `points[i]`.
    ///
    /// `first_known` and `last_known` are the spoke data of the two axis
    /// points that bracket `points`. Cumulative axis distance starts at
    /// zero; cumulative boundary distance continues from `first_known`.
    fn assign_boundary_points(
        &self,
        points: &[FluxPoint],
        out: &mut [BoundaryInfo],
        first_known: &BoundaryInfo,
        last_known: &BoundaryInfo,
    );

    /// Sets each point's radius from the spokes in `info`.
    fn assign_radius_values(&self, info: &[BoundaryInfo], points: &mut [FluxPoint]);

    /// The closed boundary contour, in order.
    fn contour(&self) -> &[Point];
}

/// Brute-force nearest contour point per side.
///
/// A contour point lies on side one of an axis point when it is to the left
/// of the local axis tangent. When both bracketing spokes of a side carry
/// contour indices, the search for that side is restricted to the shorter
/// contour arc between them.
#[derive(Debug, Clone, Default)]
pub struct NearestBoundaryFinder {
    contour: Vec<Point>,
}

impl NearestBoundaryFinder {
    pub fn new(contour: Vec<Point>) -> Self {
        Self { contour }
    }

    /// `(start, len)` of the shorter forward arc joining contour indices `a` and `b`.
    fn arc(&self, a: i32, b: i32) -> (usize, usize) {
        let n = self.contour.len();
        if a < 0 || b < 0 || n == 0 {
            return (0, n);
        }
        let (a, b) = (a as usize % n, b as usize % n);
        let fwd = (b + n - a) % n;
        let bwd = n - fwd;
        if fwd <= bwd { (a, fwd + 1) } else { (b, bwd + 1) }
    }

    fn nearest_on_side(&self, p: Point, t: Vector, side: Side, arc: (usize, usize)) -> Option<(usize, Point)> {
        let n = self.contour.len();
        let mut best: Option<(usize, Point, f64)> = None;
        for k in 0..arc.1 {
            let idx = (arc.0 + k) % n;
            let c = self.contour[idx];
            let is_side_one = t.cross(c - p) >= 0.0;
            if is_side_one != (side == Side::One) {
                continue;
            }
            let d = p.sq_dist(c);
            if best.is_none_or(|(_, _, bd)| d < bd) {
                best = Some((idx, c, d));
            }
        }
        best.map(|(idx, c, _)| (idx, c))
    }
}

fn local_tangent(points: &[FluxPoint], i: usize) -> Vector {
    let n = points.len();
    let prev = points[i.saturating_sub(1)].p;
    let next = points[(i + 1).min(n - 1)].p;
    let t = next - prev;
    if t.is_null() { Vector::new(1.0, 0.0) } else { t }
}

impl BoundaryPointFinder for NearestBoundaryFinder {
    fn assign_boundary_points(
        &self,
        points: &[FluxPoint],
        out: &mut [BoundaryInfo],
        first_known: &BoundaryInfo,
        last_known: &BoundaryInfo,
    ) {
        let n = points.len().min(out.len());
        if n == 0 {
            return;
        }
        let arcs = Side::BOTH.map(|s| self.arc(first_known.side(s).index, last_known.side(s).index));
        let mut axis = 0.0;
        let mut bndry = Side::BOTH.map(|s| first_known.side(s).cum_bndry_dist);

        for i in 0..n {
            let p = points[i].p;
            if i > 0 {
                axis += p.dist(points[i - 1].p);
            }
            let t = local_tangent(&points[..n], i);
            let mut bi = BoundaryInfo { cum_axis_dist: axis, ..BoundaryInfo::default() };
            for s in Side::BOTH {
                let fallback = first_known.side(s).pt - points[0].p;
                let bp = match self.nearest_on_side(p, t, s, arcs[s.index()]) {
                    Some((idx, c)) => BoundaryPoint::new(c, idx as i32),
                    None => BoundaryPoint::new(p + fallback, -1),
                };
                *bi.side_mut(s) = bp;
            }
            for s in Side::BOTH {
                if i > 0 {
                    bndry[s.index()] += bi.side(s).pt.dist(out[i - 1].side(s).pt);
                }
                bi.side_mut(s).cum_bndry_dist = bndry[s.index()];
            }
            out[i] = bi;
        }
    }

    fn assign_radius_values(&self, info: &[BoundaryInfo], points: &mut [FluxPoint]) {
        for (fp, bi) in points.iter_mut().zip(info) {
            let r1 = fp.p.dist(bi.first.pt);
            let r2 = fp.p.dist(bi.second.pt);
            fp.dist = r1.min(r2);
        }
    }

    fn contour(&self) -> &[Point] {
        &self.contour
    }
}
