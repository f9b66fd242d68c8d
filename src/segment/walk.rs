//! Directed walks along a branch.

use serde::{Deserialize, Serialize};

use super::BranchSegment;
use crate::model::{BoundaryInfo, Branch, FluxPoint, Point, Side};

/// Boundary-to-axis ratio of one side over an axis interval.
///
/// `normal` divides the boundary arc length by the axis arc length,
/// `straight` by the chord between the interval's end points. A zero
/// denominator yields infinity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CumulativeBar {
    pub normal: f64,
    pub straight: f64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { f64::INFINITY }
}

/// Walks the points of a branch between two indices, forward or backward.
///
/// Indices are always branch indices; `inc` only tells which way `next`
/// moves. The walk borrows the branch, which must not change meanwhile.
#[derive(Debug, Clone, Copy)]
pub struct BranchWalk<'b> {
    fps: &'b [FluxPoint],
    bis: &'b [BoundaryInfo],
    first: usize,
    last: usize,
    forward: bool,
}

impl<'b> BranchWalk<'b> {
    /// Walk over the whole branch.
    pub fn new(b: &'b Branch, forward: bool) -> Self {
        let n = b.len().saturating_sub(1);
        let (first, last) = if forward { (0, n) } else { (n, 0) };
        Self { fps: &b.flux_points, bis: &b.boundary_info, first, last, forward }
    }

    /// Walk over the branch-order limits of `seg`.
    pub fn over_segment(b: &'b Branch, seg: &BranchSegment, forward: bool) -> Self {
        let (first, last) =
            if forward { (seg.start(), seg.end()) } else { (seg.end(), seg.start()) };
        Self { fps: &b.flux_points, bis: &b.boundary_info, first, last, forward }
    }

    #[inline]
    pub fn first(&self) -> usize {
        self.first
    }

    #[inline]
    pub fn last(&self) -> usize {
        self.last
    }

    #[inline]
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// Index after `i` in walking direction. Never call it on `last()`.
    #[inline]
    pub fn next(&self, i: usize) -> usize {
        if self.forward { i + 1 } else { i - 1 }
    }

    /// Index before `i` in walking direction.
    #[inline]
    pub fn prev(&self, i: usize) -> usize {
        if self.forward { i - 1 } else { i + 1 }
    }

    pub fn size(&self) -> usize {
        self.first.abs_diff(self.last) + 1
    }

    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.first, &mut self.last);
        self.forward = !self.forward;
    }

    #[inline]
    pub fn radius(&self, i: usize) -> f64 {
        self.fps[i].radius()
    }

    #[inline]
    pub fn pt(&self, i: usize) -> Point {
        self.fps[i].p
    }

    pub fn boundary_pt(&self, i: usize, side: Side) -> Point {
        self.bis[i].side(side).pt
    }

    pub fn sq_distance(&self, i: usize, j: usize) -> f64 {
        self.fps[i].p.sq_dist(self.fps[j].p)
    }

    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.sq_distance(i, j).sqrt()
    }

    pub fn cum_axis_dist(&self, i: usize, j: usize) -> f64 {
        let (lo, hi) = (i.min(j), i.max(j));
        self.bis[hi].cum_axis_dist - self.bis[lo].cum_axis_dist
    }

    pub fn cum_bndry_dist(&self, i: usize, j: usize, side: Side) -> f64 {
        let (lo, hi) = (i.min(j), i.max(j));
        self.bis[hi].side(side).cum_bndry_dist - self.bis[lo].side(side).cum_bndry_dist
    }

    /// Both kinds of BAR on both sides over `[i, j]`, indexed by [`Side::index`].
    pub fn compute_bar(&self, i: usize, j: usize) -> [CumulativeBar; 2] {
        let cad = self.cum_axis_dist(i, j);
        let sad = self.distance(i, j);
        Side::BOTH.map(|s| {
            let cbd = self.cum_bndry_dist(i, j, s);
            CumulativeBar { normal: ratio(cbd, cad), straight: ratio(cbd, sad) }
        })
    }

    /// Normal BAR of one side over `[i, j]`.
    pub fn bar(&self, i: usize, j: usize, side: Side) -> f64 {
        ratio(self.cum_bndry_dist(i, j, side), self.cum_axis_dist(i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundaryPoint, JointId};

    fn branch() -> Branch {
        // side one runs twice as long as the axis, side two matches it
        let fps: Vec<FluxPoint> =
            (0..5).map(|i| FluxPoint::new(Point::new(i as f64, 0.0), 5.0 - i as f64)).collect();
        let bis = (0..5)
            .map(|i| BoundaryInfo {
                cum_axis_dist: i as f64,
                first: BoundaryPoint { cum_bndry_dist: 2.0 * i as f64, ..Default::default() },
                second: BoundaryPoint { cum_bndry_dist: i as f64, ..Default::default() },
            })
            .collect();
        Branch::new(JointId(0), JointId(1), fps, bis)
    }

    #[test]
    fn backward_walk_steps_down() {
        let b = branch();
        let w = BranchWalk::new(&b, false);
        assert_eq!((w.first(), w.last(), w.size()), (4, 0, 5));
        assert_eq!(w.next(4), 3);
        assert_eq!(w.radius(w.first()), 1.0);
    }

    #[test]
    fn bar_is_symmetric_in_its_arguments() {
        let b = branch();
        let w = BranchWalk::new(&b, true);
        let [one, two] = w.compute_bar(3, 1);
        assert_eq!(one.normal, 2.0);
        assert_eq!(two.normal, 1.0);
        assert_eq!(one.straight, 2.0);
        assert_eq!(w.bar(1, 3, Side::One), 2.0);
    }

    #[test]
    fn zero_axis_length_gives_infinite_bar() {
        let b = branch();
        let w = BranchWalk::new(&b, true);
        let [one, _] = w.compute_bar(2, 2);
        assert!(one.normal.is_infinite());
    }

    #[test]
    fn segment_walk_reverses() {
        let b = branch();
        let seg = BranchSegment::new(crate::segment::BranchKey::Synthetic(0), 5, 1, 3);
        let mut w = BranchWalk::over_segment(&b, &seg, true);
        assert_eq!((w.first(), w.last()), (1, 3));
        w.reverse();
        assert_eq!((w.first(), w.last(), w.is_forward()), (3, 1, false));
    }
}
