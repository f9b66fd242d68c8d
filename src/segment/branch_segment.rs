//! A sub-interval of one branch, read in either flow direction.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::BranchKey;
use crate::geometry::fit_line;
use crate::model::{BoundaryInfo, Branch, FluxPoint, JointId, Point, Side};
use crate::{Error, Result};

/// The points `[first, last]` of a branch.
///
/// Limits are stored in branch order. An *inverted* segment reads the
/// branch backwards: flow index `f` maps to branch index `len - 1 - f`,
/// and the boundary sides are swapped because the flow tangent flips.
/// All accessors that take a point index use flow indices; [`start`] and
/// [`end`] expose the raw branch-order limits.
///
/// A segment is empty when `first == len`.
///
/// [`start`]: BranchSegment::start
/// [`end`]: BranchSegment::end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSegment {
    pub branch: BranchKey,
    first: usize,
    last: usize,
    len: usize,
    inverted: bool,
}

impl BranchSegment {
    pub fn new(branch: BranchKey, len: usize, first: usize, last: usize) -> Self {
        Self { branch, first, last, len, inverted: false }
    }

    pub fn whole(branch: BranchKey, len: usize) -> Self {
        Self::new(branch, len, 0, len.saturating_sub(1))
    }

    pub fn empty(branch: BranchKey, len: usize) -> Self {
        Self::new(branch, len, len, len.saturating_sub(1))
    }

    /// Lower limit in branch order.
    #[inline]
    pub fn start(&self) -> usize {
        self.first
    }

    /// Upper limit in branch order.
    #[inline]
    pub fn end(&self) -> usize {
        self.last
    }

    #[inline]
    pub fn branch_len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub(crate) fn toggle_inverted(&mut self) {
        self.inverted = !self.inverted;
    }

    /// Sets the limits in branch order.
    pub fn set_limits(&mut self, first: usize, last: usize) {
        debug_assert!(first <= last && last < self.len);
        self.first = first;
        self.last = last;
    }

    pub fn set_empty(&mut self) {
        self.first = self.len;
    }

    /// Re-targets the segment to another branch of the same length.
    pub fn rebind(&mut self, branch: BranchKey, len: usize) {
        self.branch = branch;
        self.len = len;
    }

    // ========================================================================
    // Flow indices
    // ========================================================================

    #[inline]
    pub fn first(&self) -> usize {
        if self.inverted { self.len - 1 - self.last } else { self.first }
    }

    #[inline]
    pub fn last(&self) -> usize {
        if self.inverted { self.len - 1 - self.first } else { self.last }
    }

    #[inline]
    pub fn branch_first(&self) -> usize {
        0
    }

    #[inline]
    pub fn branch_last(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// Branch index of flow index `f`.
    #[inline]
    pub fn to_branch_index(&self, f: usize) -> usize {
        if self.inverted { self.len - 1 - f } else { f }
    }

    pub fn size(&self) -> usize {
        if self.first >= self.len { 0 } else { self.last + 1 - self.first }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_whole_branch(&self) -> bool {
        self.size() == self.len
    }

    /// Whether branch index `i` lies inside the segment.
    pub fn is_inside(&self, i: usize) -> bool {
        !self.is_empty() && i >= self.first && i <= self.last
    }

    /// Number of branch points before the segment, in flow order.
    pub fn left_margin_size(&self) -> usize {
        if self.inverted { self.len - self.last - 1 } else { self.first }
    }

    /// Number of branch points after the segment, in flow order.
    pub fn right_margin_size(&self) -> usize {
        if self.inverted { self.first } else { self.len - self.last - 1 }
    }

    /// Joint at flow index 0.
    pub fn first_joint(&self, b: &Branch) -> JointId {
        if self.inverted { b.n2 } else { b.n1 }
    }

    /// Joint at the last flow index.
    pub fn last_joint(&self, b: &Branch) -> JointId {
        if self.inverted { b.n1 } else { b.n2 }
    }

    // ========================================================================
    // Point access
    // ========================================================================

    pub fn point(&self, b: &Branch, f: usize) -> FluxPoint {
        b.flux_points[self.to_branch_index(f)]
    }

    pub fn pt(&self, b: &Branch, f: usize) -> Point {
        self.point(b, f).p
    }

    /// Boundary info at flow index `f`, with cumulative values and sides
    /// expressed in flow direction.
    pub fn info(&self, b: &Branch, f: usize) -> BoundaryInfo {
        if !self.inverted {
            return b.boundary_info[f];
        }
        let bn = b.last_info();
        let mut bi = b.boundary_info[self.to_branch_index(f)];
        bi.cum_axis_dist = bn.cum_axis_dist - bi.cum_axis_dist;
        bi.first.cum_bndry_dist = bn.first.cum_bndry_dist - bi.first.cum_bndry_dist;
        bi.second.cum_bndry_dist = bn.second.cum_bndry_dist - bi.second.cum_bndry_dist;
        bi.swap_sides();
        bi
    }

    pub fn boundary_pt(&self, b: &Branch, f: usize, side: Side) -> Point {
        self.info(b, f).side(side).pt
    }

    pub fn first_pt(&self, b: &Branch) -> Point {
        self.pt(b, self.first())
    }

    pub fn last_pt(&self, b: &Branch) -> Point {
        self.pt(b, self.last())
    }

    /// Flow index of the segment point closest to `p`.
    pub fn find_closest_point(&self, b: &Branch, p: Point) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        (self.first()..=self.last()).min_by(|&i, &j| {
            self.pt(b, i).sq_dist(p).total_cmp(&self.pt(b, j).sq_dist(p))
        })
    }

    /// Two points spanning the axis tangent at flow index `f`.
    ///
    /// Inside a segment of two or more points only segment points are
    /// used: up to five at an end point (least-squares fit), three
    /// elsewhere. Outside the segment the immediate branch neighbours of
    /// `f` are connected.
    pub fn compute_tangent(&self, b: &Branch, f: usize) -> Result<(Point, Point)> {
        if self.len < 2 || f > self.branch_last() {
            return Err(Error::DegenerateGeometry(format!(
                "tangent at {f} of {} with {} points",
                self.branch, self.len
            )));
        }
        let size = self.size();
        let (j, n) = if size > 1 && f >= self.first() && f <= self.last() {
            if f == self.first() {
                (f, size.min(5))
            } else if f == self.last() {
                let n = size.min(5);
                (f + 1 - n, n)
            } else {
                (f - 1, 3)
            }
        } else {
            let j = if f > 0 { f - 1 } else { f };
            (j, if j < f && f < self.branch_last() { 3 } else { 2 })
        };

        let p0 = self.pt(b, j);
        let p1 = self.pt(b, j + n - 1);
        if n <= 3 {
            return Ok((p0, p1));
        }
        let pts: Vec<Point> = (j..j + n).map(|i| self.pt(b, i)).collect();
        Ok(match fit_line(&pts) {
            Some(line) => (line.closest_point(p0), line.closest_point(p1)),
            None => (p0, p1),
        })
    }

    // ========================================================================
    // Interval arithmetic
    // ========================================================================

    /// Removes the leading or trailing interval `ls` from the segment.
    ///
    /// `ls` must share one limit with the segment. Removing the whole
    /// segment leaves it empty.
    pub fn subtract_interval(&mut self, ls: &BranchSegment) -> Result<()> {
        if self.branch != ls.branch {
            return Err(Error::StructuralInvariantViolation {
                context: self.branch.to_string(),
                message: format!("cannot subtract an interval of {}", ls.branch),
            });
        }
        if ls.is_empty() || self.is_empty() {
            return Ok(());
        }
        if self.first == ls.first && ls.last < self.last {
            self.first = ls.last + 1;
        } else if self.first == ls.first {
            self.set_empty();
        } else if self.last == ls.last && ls.first > self.first {
            self.last = ls.first - 1;
        } else if self.last == ls.last {
            self.set_empty();
        } else {
            tracing::warn!(segment = %self, interval = %ls, "unexpected case of ligature subtraction");
        }
        Ok(())
    }

    /// Grows the segment by an adjacent interval of the same branch.
    pub fn extend(&mut self, other: &BranchSegment) {
        if self.last + 1 == other.first {
            self.last = other.last;
        } else if self.first == other.last + 1 {
            self.first = other.first;
        } else if self.first == other.first && self.last == other.last {
            tracing::warn!(segment = %self, "branch segments are equal");
        } else {
            tracing::warn!(segment = %self, other = %other, "branch segments are not adjacent");
        }
    }

    /// Orders by lower limit, then upper limit.
    pub fn cmp_limits(&self, other: &BranchSegment) -> Ordering {
        (self.first, self.last).cmp(&(other.first, other.last))
    }
}

impl std::fmt::Display for BranchSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:[{}--{}]", self.branch, self.first, self.last)?;
        if self.inverted {
            write!(f, "~")?;
        }
        Ok(())
    }
}
