//! Ligature intervals rooted at a joint.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::corner::{BoundaryCorner, ChainArm};
use crate::model::{Branch, JointId, LigatureParams, Point, Side};
use crate::segment::{
    BranchKey, BranchSegment, BranchStore, BranchWalk, CumulativeBar, endpoint_index,
    shared_boundary_sides,
};
use crate::{Error, Result};

/// Normal BAR at which the fallback walk gives up on a ligature.
const FALLBACK_MAX_BAR: f64 = 0.9;

/// BAR on the shared side beyond which a lone gap ligature stops.
const GAP_MAX_BAR: f64 = 1.5;

/// A branch interval that starts at `joint` and looks like the blend of an
/// attached part into its parent.
///
/// Limits are in branch order and the segment is never inverted. The
/// *source* end lies at the joint, the *target* end away from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LigatureSegment {
    pub seg: BranchSegment,
    pub joint: JointId,
    /// Indexed by [`Side::index`], sides in branch order.
    pub cum_bar: [CumulativeBar; 2],
    pub corner: [BoundaryCorner; 2],
    pub source_radius: f64,
    pub target_radius: f64,
    pub radius_ratio: f64,
    /// Whether the source is the lower limit.
    pub decreasing: bool,
}

impl LigatureSegment {
    fn blank(key: BranchKey, len: usize, joint: JointId) -> Self {
        Self {
            seg: BranchSegment::empty(key, len),
            joint,
            cum_bar: [CumulativeBar::default(); 2],
            corner: [BoundaryCorner::default(); 2],
            source_radius: 0.0,
            target_radius: 0.0,
            radius_ratio: 0.0,
            decreasing: false,
        }
    }

    fn joint_walk<'b>(b: &'b Branch, joint: JointId) -> Result<BranchWalk<'b>> {
        if b.len() < 2 {
            return Err(Error::DegenerateGeometry(format!(
                "ligature walk over a branch of {} points",
                b.len()
            )));
        }
        let i = endpoint_index(b, joint)
            .ok_or_else(|| Error::NotFound(format!("{joint} is not an endpoint of {}-{}", b.n1, b.n2)))?;
        Ok(BranchWalk::new(b, i == 0))
    }

    /// The ligature of `key` rooted at `joint`, with no corner information.
    pub fn rooted(store: &BranchStore<'_>, key: BranchKey, joint: JointId, lp: &LigatureParams) -> Result<Self> {
        let b = store.get(key);
        let w = Self::joint_walk(b, joint)?;
        let mut ls = Self::blank(key, b.len(), joint);
        ls.set_ligature_endpoint(&w, w.first(), lp);
        Ok(ls)
    }

    /// The part of `key` near `joint` swallowed by the gap that the
    /// ligatures `lig` leave when they are removed.
    pub fn gap(store: &BranchStore<'_>, key: BranchKey, joint: JointId, lig: &[LigatureSegment]) -> Result<Self> {
        let front = lig.first().ok_or_else(|| Error::StructuralInvariantViolation {
            context: joint.to_string(),
            message: "gap ligature without attached segments".into(),
        })?;
        let b = store.get(key);
        let (side, _) = shared_boundary_sides(b, store.get(front.seg.branch), joint)?;
        let max_r = lig.iter().map(|l| l.target_radius).fold(0.0, f64::max);
        let max_sq = max_r * max_r;

        let w = Self::joint_walk(b, joint)?;
        let i = w.first();
        let last = if w.size() > 2 { w.prev(w.last()) } else { w.last() };
        let mut j = w.next(i);
        while j != last {
            let jn = w.next(j);
            if w.sq_distance(i, jn) > max_sq {
                break;
            }
            if lig.len() == 1 && w.bar(i, jn, side) > GAP_MAX_BAR {
                break;
            }
            j = jn;
        }

        let mut ls = Self::blank(key, b.len(), joint);
        ls.set_attributes(&w, i, j);
        Ok(ls)
    }

    /// All of `key`, rooted at `joint`.
    pub fn whole(store: &BranchStore<'_>, key: BranchKey, joint: JointId) -> Result<Self> {
        let b = store.get(key);
        let w = Self::joint_walk(b, joint)?;
        let mut ls = Self::blank(key, b.len(), joint);
        ls.set_attributes(&w, w.first(), w.last());
        ls.seg = BranchSegment::whole(key, b.len());
        Ok(ls)
    }

    /// Measures the interval `[first, last]` of the walk, `first` being the
    /// joint end. A target that falls on the far branch end is pulled back
    /// by one point.
    pub fn set_attributes(&mut self, w: &BranchWalk<'_>, first: usize, last: usize) {
        self.cum_bar = w.compute_bar(first, last);
        self.source_radius = w.radius(first);
        self.target_radius = w.radius(last);
        self.radius_ratio = if self.source_radius > 0.0 {
            self.target_radius / self.source_radius
        } else {
            f64::INFINITY
        };
        self.corner = [BoundaryCorner::default(); 2];

        let len = self.seg.branch_len();
        if first < last {
            let last = if last + 1 == len && len > 1 { last - 1 } else { last };
            self.seg.set_limits(first.min(last), last.max(first));
            self.decreasing = true;
        } else {
            let last = if last == 0 && len > 1 { 1 } else { last };
            self.seg.set_limits(last.min(first), first.max(last));
            self.decreasing = false;
        }
    }

    /// Walks away from `i` while the branch keeps shrinking into the
    /// joint's disc, then measures the interval found.
    pub fn set_ligature_endpoint(&mut self, w: &BranchWalk<'_>, i: usize, lp: &LigatureParams) {
        let r0 = w.radius(i);
        let r0_sq = r0 * r0;
        let mut j = w.next(i);
        while j != w.last() {
            let jn = w.next(j);
            let r1 = w.radius(jn);
            let d2 = w.sq_distance(i, jn);
            let shrinks = r1 < r0 && r1 * r1 + d2 >= r0_sq && w.radius(j) / r0 <= lp.max_radius_ratio.loose;
            if shrinks || d2 >= r0_sq {
                break;
            }
            j = jn;
        }
        self.set_attributes(w, i, j);

        if self.has_ligature_like_attributes(Side::One, lp) || self.has_ligature_like_attributes(Side::Two, lp) {
            return;
        }
        let mut prev = i;
        let mut k = w.next(i);
        while k != j {
            let [one, two] = w.compute_bar(i, k);
            if one.normal >= FALLBACK_MAX_BAR || two.normal >= FALLBACK_MAX_BAR || w.radius(prev) < w.radius(k) {
                self.set_attributes(w, i, k);
                break;
            }
            prev = k;
            k = w.next(k);
        }
    }

    // ========================================================================
    // Limits
    // ========================================================================

    #[inline]
    pub fn branch(&self) -> BranchKey {
        self.seg.branch
    }

    /// Branch index of the joint end.
    pub fn source(&self) -> usize {
        if self.decreasing { self.seg.start() } else { self.seg.end() }
    }

    /// Branch index of the end away from the joint.
    pub fn target(&self) -> usize {
        if self.decreasing { self.seg.end() } else { self.seg.start() }
    }

    pub fn target_point(&self, b: &Branch) -> Point {
        b.flux_points[self.target()].p
    }

    pub fn size(&self) -> usize {
        self.seg.size()
    }

    pub fn is_empty(&self) -> bool {
        self.seg.is_empty()
    }

    pub fn is_whole_branch(&self) -> bool {
        self.seg.is_whole_branch()
    }

    /// Degree of the branch end that is not the root joint.
    pub fn target_joint_degree(&self, store: &BranchStore<'_>) -> usize {
        let b = store.get(self.seg.branch);
        store.joint(b.other_endpoint(self.joint)).degree()
    }

    /// Ascending target radius.
    pub fn cmp_by_target_radius(&self, other: &Self) -> Ordering {
        self.target_radius.total_cmp(&other.target_radius)
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    /// Radius ratio and straight BAR within the loose bounds.
    pub fn has_ligature_like_attributes(&self, side: Side, lp: &LigatureParams) -> bool {
        self.radius_ratio <= lp.max_radius_ratio.loose
            && self.cum_bar[side.index()].straight <= lp.max_cumulative_bar.loose
    }

    pub fn is_ligature_on(&self, side: Side, lp: &LigatureParams) -> bool {
        let bc = &self.corner[side.index()];
        self.radius_ratio <= lp.max_radius_ratio.loose
            && self.cum_bar[side.index()].normal <= lp.max_cumulative_bar.loose
            && bc.valid
            && (self.radius_ratio <= lp.max_radius_ratio.tight || bc.cos_angle >= lp.min_corner_cos.tight)
    }

    pub fn is_full_ligature(&self, lp: &LigatureParams) -> bool {
        if self.is_ligature_on(Side::One, lp) && self.is_ligature_on(Side::Two, lp) {
            return true;
        }
        self.corner[0].valid
            && self.corner[1].valid
            && self.has_ligature_like_attributes(Side::One, lp)
            && self.has_ligature_like_attributes(Side::Two, lp)
    }

    /// Exactly one side passes [`is_ligature_on`](Self::is_ligature_on).
    /// A segment that is full through its corners alone can be semi too.
    pub fn is_semi_ligature(&self, lp: &LigatureParams) -> bool {
        self.is_ligature_on(Side::One, lp) != self.is_ligature_on(Side::Two, lp)
    }

    pub fn is_ligature(&self, lp: &LigatureParams) -> bool {
        self.is_full_ligature(lp) || self.is_semi_ligature(lp)
    }

    /// The first side on which the segment is a ligature.
    pub fn ligature_side(&self, lp: &LigatureParams) -> Option<Side> {
        Side::BOTH.into_iter().find(|&s| self.is_ligature_on(s, lp))
    }

    // ========================================================================
    // Corners
    // ========================================================================

    /// Distance from `pt` to the closest point of the interval.
    pub fn distance_to_corner(&self, b: &Branch, pt: Point) -> f64 {
        if self.seg.is_empty() {
            return f64::INFINITY;
        }
        (self.seg.start()..=self.seg.end())
            .map(|i| b.flux_points[i].p.sq_dist(pt))
            .fold(f64::INFINITY, f64::min)
            .sqrt()
    }

    pub fn is_valid_corner_distance(&self, b: &Branch, bc: &BoundaryCorner, lp: &LigatureParams) -> bool {
        self.distance_to_corner(b, bc.pt) / self.source_radius <= lp.max_radius_ratio.loose
    }

    /// Stores the corner of `side`, invalidating it when it lies too far
    /// from the interval.
    pub fn set_corner_info(&mut self, side: Side, mut bc: BoundaryCorner, b: &Branch, lp: &LigatureParams) {
        if bc.valid && !self.is_valid_corner_distance(b, &bc, lp) {
            bc.valid = false;
        }
        self.corner[side.index()] = bc;
    }

    /// Corner search arm over `side`, from the target towards the joint.
    pub(crate) fn chain_arm<'b>(&self, b: &'b Branch, side: Side) -> ChainArm<'b> {
        let t = self.target();
        let (toward_joint, beyond): (Vec<usize>, Vec<usize>) = if self.decreasing {
            ((0..=t).rev().collect(), (t + 1..b.len()).collect())
        } else {
            ((t..b.len()).collect(), (0..t).rev().collect())
        };
        ChainArm { branch: b, side, toward_joint, beyond }
    }
}

impl std::fmt::Display for LigatureSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} r={:.2}", self.seg, self.joint, self.radius_ratio)
    }
}
