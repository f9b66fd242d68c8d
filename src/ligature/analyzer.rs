//! Per-joint ligature extraction.

use super::corner::{build_chain, find_corner, BoundaryCorner};
use super::segment::LigatureSegment;
use crate::model::{JointId, LigatureParams, Point};
use crate::segment::{BranchKey, BranchStore, endpoint_index, shared_boundary_sides};
use crate::Result;

/// Read-only inputs of a ligature analysis.
#[derive(Debug, Clone, Copy)]
pub struct LigatureContext<'a> {
    pub params: LigatureParams,
    pub contour: &'a [Point],
}

/// Finds the ligature rooted at a joint on each of a set of branches.
///
/// Implementations return one segment per entry of `branches`, in the same
/// order, each rooted at `joint`.
pub trait LigatureAnalyzer {
    fn rooted_ligature(
        &self,
        ctx: &LigatureContext<'_>,
        store: &BranchStore<'_>,
        joint: JointId,
        branches: &[BranchKey],
    ) -> Result<Vec<LigatureSegment>>;
}

/// Default analyzer: radius/BAR walk per branch, then a concave corner
/// search between every pair of branches adjacent around the joint.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpokeLigatureAnalyzer;

impl SpokeLigatureAnalyzer {
    /// Direction of `key` as it leaves `joint`.
    fn leaving_angle(store: &BranchStore<'_>, key: BranchKey, joint: JointId) -> f64 {
        let b = store.get(key);
        let jp = store.joint(joint).fp.p;
        let next = match endpoint_index(b, joint) {
            Some(0) => 1.min(b.len().saturating_sub(1)),
            Some(i) => i.saturating_sub(1),
            None => return 0.0,
        };
        let v = b.flux_points[next].p - jp;
        v.y.atan2(v.x)
    }

    /// Searches the corner between `segs[i0]` and `segs[i1]` on the sides
    /// whose spokes meet at the joint, and hands it to both segments.
    fn set_concave_corner_info(
        ctx: &LigatureContext<'_>,
        store: &BranchStore<'_>,
        segs: &mut [LigatureSegment],
        i0: usize,
        i1: usize,
    ) -> Result<()> {
        let lp = &ctx.params;
        let joint = segs[i0].joint;
        let (b0, b1) = (store.get(segs[i0].branch()), store.get(segs[i1].branch()));
        let (s0, s1) = shared_boundary_sides(b0, b1, joint)?;
        if !segs[i0].has_ligature_like_attributes(s0, lp) && !segs[i1].has_ligature_like_attributes(s1, lp) {
            return Ok(());
        }

        let arm0 = segs[i0].chain_arm(b0, s0);
        let arm1 = segs[i1].chain_arm(b1, s1);
        let ref_pt = store.joint(joint).fp.p;
        let bc = match build_chain(ctx.contour, &arm0, &arm1) {
            Some(c) => find_corner(&c.pts, c.left, c.right, c.max_sq, lp.min_corner_cos.loose, Some(ref_pt)),
            None => BoundaryCorner::default(),
        };
        tracing::trace!(%joint, corner = %bc.pt, cos = bc.cos_angle, valid = bc.valid, "corner search");

        segs[i0].set_corner_info(s0, bc, b0, lp);
        segs[i1].set_corner_info(s1, bc, b1, lp);
        Ok(())
    }
}

impl LigatureAnalyzer for SpokeLigatureAnalyzer {
    fn rooted_ligature(
        &self,
        ctx: &LigatureContext<'_>,
        store: &BranchStore<'_>,
        joint: JointId,
        branches: &[BranchKey],
    ) -> Result<Vec<LigatureSegment>> {
        let mut segs = branches
            .iter()
            .map(|&k| LigatureSegment::rooted(store, k, joint, &ctx.params))
            .collect::<Result<Vec<_>>>()?;
        if segs.len() < 2 {
            return Ok(segs);
        }

        let angles: Vec<f64> = branches.iter().map(|&k| Self::leaving_angle(store, k, joint)).collect();
        let mut order: Vec<usize> = (0..segs.len()).collect();
        order.sort_by(|&a, &b| angles[a].total_cmp(&angles[b]));

        let n = order.len();
        Self::set_concave_corner_info(ctx, store, &mut segs, order[n - 1], order[0])?;
        for k in 0..n - 1 {
            Self::set_concave_corner_info(ctx, store, &mut segs, order[k], order[k + 1])?;
        }
        Ok(segs)
    }
}
