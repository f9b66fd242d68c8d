//! Concave boundary corners.
//!
//! A corner is the boundary point at which an inscribed triangle has its
//! smallest angle. Arms are chosen among boundary points at least
//! `sqrt(MIN_SQ_DISTANCE)` away from the corner and at most the search
//! scale away. A corner only counts when it is concave with respect to a
//! reference skeletal point, usually the joint the ligature is rooted at.

use serde::{Deserialize, Serialize};

use crate::geometry::{Intersection, intersect_segments};
use crate::model::{Branch, Point, Side, Vector};

/// Squared minimum arm length.
pub const MIN_SQ_DISTANCE: f64 = 4.0;

/// Cap on the boundary points visited when extending the search chain.
pub const MAX_NUM_POINTS_TO_TEST: usize = 50;

/// Result of a corner search.
///
/// A corner that was never searched is *null*: its `cos_angle` is
/// infinite, outside the codomain of the cosine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCorner {
    /// Cosine of the smallest angle at `pt`.
    pub cos_angle: f64,
    pub valid: bool,
    pub pt: Point,
    pub left_arm: Vector,
    pub right_arm: Vector,
    /// Shortest arms that already make a valid concave corner.
    pub min_left_arm: Vector,
    pub min_right_arm: Vector,
}

impl Default for BoundaryCorner {
    fn default() -> Self {
        Self {
            cos_angle: f64::INFINITY,
            valid: false,
            pt: Point::default(),
            left_arm: Vector::default(),
            right_arm: Vector::default(),
            min_left_arm: Vector::default(),
            min_right_arm: Vector::default(),
        }
    }
}

impl BoundaryCorner {
    pub fn is_null(&self) -> bool {
        self.cos_angle == f64::INFINITY
    }

    pub fn left_endpoint(&self) -> Point {
        self.pt + self.left_arm
    }

    pub fn right_endpoint(&self) -> Point {
        self.pt + self.right_arm
    }

    /// Whether this corner is concave seen from `skel_pt`.
    pub fn is_concave_from(&self, skel_pt: Point) -> bool {
        is_concave_corner(skel_pt, self.pt, self.left_arm, self.right_arm)
    }

    fn searched() -> Self {
        Self { cos_angle: -1.0, ..Self::default() }
    }
}

/// Concavity of the corner at `cor` with arms `left`/`right`, seen from `skel`.
///
/// The segment from `skel` to `cor` is intersected with the chord between
/// the arm tips. Crossing the chord inside both segments means the corner
/// points away from `skel`. When only the skel-corner *line* meets the
/// chord, the corner is concave iff the crossing is closer to the corner.
pub fn is_concave_corner(skel: Point, cor: Point, left: Vector, right: Vector) -> bool {
    match intersect_segments(skel, cor, cor + left, cor + right) {
        Intersection::SecondSegment(p) => p.sq_dist(cor) < p.sq_dist(skel),
        Intersection::Point(_) => false,
        _ => true,
    }
}

// ============================================================================
// Chain construction
// ============================================================================

/// Boundary points of a search plus the sub-range holding corner candidates.
#[derive(Debug, Clone, Default)]
pub(crate) struct CornerChain {
    pub pts: Vec<Point>,
    pub left: usize,
    pub right: usize,
    pub max_sq: f64,
}

/// One ligature interval feeding a corner search.
///
/// `toward_joint` lists branch indices from the ligature target to the
/// joint; `beyond` lists the branch indices past the target, walking away
/// from the joint.
pub(crate) struct ChainArm<'b> {
    pub branch: &'b Branch,
    pub side: Side,
    pub toward_joint: Vec<usize>,
    pub beyond: Vec<usize>,
}

impl ChainArm<'_> {
    fn index_at(&self, i: usize) -> i32 {
        self.branch.boundary_info[i].side(self.side).index
    }

    fn pt_at(&self, i: usize) -> Point {
        self.branch.boundary_info[i].side(self.side).pt
    }
}

fn push_distinct(pts: &mut Vec<Point>, p: Point) {
    if pts.last() != Some(&p) {
        pts.push(p);
    }
}

/// Walks outward over `cands` until the chain reaches the minimum distance,
/// then stops at `max_pts` points, past `max_sq`, or at a limit point.
fn extend_chain(
    cands: impl Iterator<Item = (Point, bool)>,
    anchor: Point,
    max_pts: usize,
    max_sq: &mut f64,
) -> Vec<Point> {
    let mut out = Vec::new();
    let mut enough = false;
    for (n, (pt, is_limit)) in cands.enumerate() {
        out.push(pt);
        let d = pt.sq_dist(anchor);
        if !enough && d >= MIN_SQ_DISTANCE {
            enough = true;
            if d > *max_sq {
                *max_sq = d;
            }
        }
        if enough && (n >= max_pts || d >= *max_sq || is_limit) {
            break;
        }
    }
    out
}

/// Builds the boundary chain running from the target of `arm0`, through
/// the joint, to the target of `arm1`, then pads it on both ends.
///
/// Contour points are used when all spoke ends involved carry contour
/// indices; otherwise the spoke end points themselves form the chain.
pub(crate) fn build_chain(contour: &[Point], arm0: &ChainArm<'_>, arm1: &ChainArm<'_>) -> Option<CornerChain> {
    let (&t0, &j0) = (arm0.toward_joint.first()?, arm0.toward_joint.last()?);
    let &t1 = arm1.toward_joint.first()?;
    let n = contour.len();
    let (a, m, b) = (arm0.index_at(t0), arm0.index_at(j0), arm1.index_at(t1));
    let indexed = n > 0 && [a, m, b].iter().all(|&i| i >= 0 && (i as usize) < n);

    let mut core = Vec::new();
    let (left_cands, right_cands): (Vec<(Point, bool)>, Vec<(Point, bool)>);

    if indexed {
        let (a, m, b) = (a as usize, m as usize, b as usize);
        let fwd = |x: usize, y: usize| (y + n - x) % n;
        let total_fwd = fwd(a, m) + fwd(m, b);
        let total_bwd = fwd(m, a) + fwd(b, m);
        let (dir, steps) = if total_fwd <= total_bwd { (1, total_fwd) } else { (n - 1, total_bwd) };
        let steps = steps.min(n - 1);
        for k in 0..=steps {
            push_distinct(&mut core, contour[(a + k * dir) % n]);
        }

        let back = n - dir;
        let limit0 = arm0.beyond.last().map(|&i| arm0.index_at(i)).unwrap_or(-1);
        let limit1 = arm1.beyond.last().map(|&i| arm1.index_at(i)).unwrap_or(-1);
        let room = n.saturating_sub(steps + 1);
        left_cands = (1..=room)
            .map(|k| {
                let idx = (a + k * back) % n;
                (contour[idx], idx as i32 == limit0)
            })
            .collect();
        right_cands = (1..=room)
            .map(|k| {
                let idx = (b + k * dir) % n;
                (contour[idx], idx as i32 == limit1)
            })
            .collect();
    } else {
        for &i in &arm0.toward_joint {
            push_distinct(&mut core, arm0.pt_at(i));
        }
        for &i in arm1.toward_joint.iter().rev() {
            push_distinct(&mut core, arm1.pt_at(i));
        }
        let cands = |arm: &ChainArm<'_>| -> Vec<(Point, bool)> {
            let last = arm.beyond.len().saturating_sub(1);
            arm.beyond.iter().enumerate().map(|(k, &i)| (arm.pt_at(i), k == last)).collect()
        };
        left_cands = cands(arm0);
        right_cands = cands(arm1);
    }

    let (&first, &last) = (core.first()?, core.last()?);
    let max_pts = core.len().min(MAX_NUM_POINTS_TO_TEST);
    let mut max_sq = (core.len() * core.len()) as f64;

    let mut left_ext = extend_chain(left_cands.into_iter(), first, max_pts, &mut max_sq);
    let right_ext = extend_chain(right_cands.into_iter(), last, max_pts, &mut max_sq);

    left_ext.reverse();
    let left = left_ext.len();
    let right = left + core.len() - 1;
    let mut pts = left_ext;
    pts.extend(core);
    pts.extend(right_ext);
    Some(CornerChain { pts, left, right, max_sq })
}

// ============================================================================
// Search
// ============================================================================

/// Smallest concave angle among the candidates `pts[left..=right]`.
///
/// Margin corners sharper than `min_cos` cut the chain first so that no arm
/// reaches over them.
pub fn find_corner(
    pts: &[Point],
    left: usize,
    right: usize,
    max_sq: f64,
    min_cos: f64,
    ref_pt: Option<Point>,
) -> BoundaryCorner {
    let mut best = BoundaryCorner::searched();
    if pts.is_empty() || left > right || right >= pts.len() {
        return best;
    }
    let (mut lo, mut hi) = (0, pts.len());

    for it in (0..left).rev() {
        if pts[left].sq_dist(pts[it]) >= MIN_SQ_DISTANCE {
            let bc = compute_minimum_angle(&pts[lo..hi], it - lo, MIN_SQ_DISTANCE, max_sq, min_cos, None);
            if bc.cos_angle >= min_cos {
                lo = it;
                break;
            }
        }
    }
    for it in right + 1..hi {
        if pts[right].sq_dist(pts[it]) >= MIN_SQ_DISTANCE {
            let bc = compute_minimum_angle(&pts[lo..hi], it - lo, MIN_SQ_DISTANCE, max_sq, min_cos, None);
            if bc.cos_angle >= min_cos {
                hi = it + 1;
                break;
            }
        }
    }

    for it in left..=right {
        let bc = compute_minimum_angle(&pts[lo..hi], it - lo, MIN_SQ_DISTANCE, max_sq, min_cos, ref_pt);
        if bc.cos_angle >= best.cos_angle {
            best = bc;
        }
    }
    best
}

/// Inscribes triangles at `pts[it]` and keeps the sharpest concave one.
pub fn compute_minimum_angle(
    pts: &[Point],
    it: usize,
    min_sq: f64,
    max_sq: f64,
    min_cos: f64,
    ref_pt: Option<Point>,
) -> BoundaryCorner {
    let mut bc = BoundaryCorner::searched();
    if it == 0 || it >= pts.len() {
        return bc;
    }
    bc.pt = pts[it];

    let mut right_arms = Vec::new();
    for &p in &pts[it + 1..] {
        let v = p - bc.pt;
        let n2 = v.sq_norm();
        if n2 < min_sq {
            continue;
        }
        if n2 > max_sq {
            break;
        }
        right_arms.push((v, n2.sqrt()));
    }

    let concave = |l: Vector, r: Vector| ref_pt.is_none_or(|s| is_concave_corner(s, bc.pt, l, r));
    let mut enough = false;
    for &p in pts[..it].iter().rev() {
        let v = p - bc.pt;
        let n2 = v.sq_norm();
        if n2 < min_sq {
            continue;
        }
        if enough && n2 > max_sq {
            break;
        }
        enough = true;
        let n = n2.sqrt();
        for &(r, rn) in &right_arms {
            let cos = v.dot(r) / (n * rn);
            if cos >= bc.cos_angle && concave(v, r) {
                bc.cos_angle = cos;
                bc.left_arm = v;
                bc.right_arm = r;
            }
            if !bc.valid && cos >= min_cos && concave(v, r) {
                bc.min_left_arm = v;
                bc.min_right_arm = r;
                bc.valid = true;
            }
        }
    }
    bc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    /// A right-angle notch: down the y axis, then along the x axis.
    fn notch() -> Vec<Point> {
        let mut pts: Vec<Point> = (0..=6).rev().map(|y| p(0.0, y as f64)).collect();
        pts.extend((1..=6).map(|x| p(x as f64, 0.0)));
        pts
    }

    #[test]
    fn right_angle_is_found_at_the_notch() {
        let pts = notch();
        let bc = find_corner(&pts, 3, 9, 36.0, -0.5, None);
        assert_eq!(bc.pt, p(0.0, 0.0));
        assert!(bc.cos_angle.abs() < 1e-12);
        assert!(bc.valid);
    }

    #[test]
    fn concavity_depends_on_the_viewpoint() {
        let (l, r) = (Vector::new(0.0, 3.0), Vector::new(3.0, 0.0));
        // seen from inside the wedge the notch points away: not concave
        assert!(!is_concave_corner(p(5.0, 5.0), p(0.0, 0.0), l, r));
        // seen from behind the corner it is
        assert!(is_concave_corner(p(-2.0, -2.0), p(0.0, 0.0), l, r));
        // from close to the chord, on its far side
        assert!(!is_concave_corner(p(1.0, 1.0), p(0.0, 0.0), l, r));
    }

    #[test]
    fn straight_boundary_has_no_valid_corner() {
        let pts: Vec<Point> = (0..12).map(|x| p(x as f64, 0.0)).collect();
        let bc = find_corner(&pts, 3, 8, 36.0, -0.5, None);
        assert!(!bc.valid);
        assert!((bc.cos_angle + 1.0).abs() < 1e-12);
    }

    #[test]
    fn end_points_cannot_be_corners() {
        let pts = notch();
        let bc = compute_minimum_angle(&pts, 0, MIN_SQ_DISTANCE, 36.0, -0.5, None);
        assert_eq!(bc.cos_angle, -1.0);
        assert!(!bc.valid);
        assert!(BoundaryCorner::default().is_null());
    }
}
