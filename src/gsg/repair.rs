//! Repair of broken branch nodes into one continuous fixed branch.

use super::{Gsg, NodeKind};
use crate::geometry::{CubicBezier, segments_intersect};
use crate::graph::NodeIx;
use crate::model::{BoundaryInfo, BoundarySegment, Branch, FluxPoint, JointId, Side};
use crate::segment::{AttachEdges, BranchSegment};
use crate::{Error, Result};

/// Squared distance under which two axis points are the same point.
const SAME_POINT_SQ_DIST: f64 = 0.01;

/// Greatest distance between a repaired end point and its joint.
const MAX_ENDPOINT_DRIFT: f64 = 1.0;

impl Gsg<'_> {
    /// Replaces the segments of broken node `v` by a new branch that runs
    /// through every gap, and makes it the node's fixed branch.
    ///
    /// A repair that is reached again while in progress, through the
    /// ligature of an attachment edge, is skipped and leaves the node
    /// broken; the outer call completes it.
    pub fn fix_broken_branch(&mut self, v: NodeIx) -> Result<()> {
        let node = self.graph.node(v)?;
        if node.kind != NodeKind::Branch {
            return Err(Error::StructuralInvariantViolation {
                context: v.to_string(),
                message: format!("cannot repair a {} node", node.kind),
            });
        }
        if !node.is_broken() {
            return Ok(());
        }
        if !self.repairing.insert(v) {
            tracing::debug!(node = %v, "branch repair already in progress");
            return Ok(());
        }
        let result = self.repair(v);
        self.repairing.remove(&v);
        result
    }

    fn repair(&mut self, v: NodeIx) -> Result<()> {
        let segments = self.graph.node(v)?.segments.clone();
        let (n1, n2) = segments.endpoints(&self.store)?;
        let (fps, bis, axes) = self.restore_axis_function(segments.segments(), segments.gaps(), n1, n2)?;

        let mut b = Branch::new(n1, n2, fps, bis);
        remove_crossing_spokes(&b.flux_points, &mut b.boundary_info);
        b.boundary_segments = restore_derived_values(&b.flux_points, &mut b.boundary_info);
        let len = b.len();
        let key = self.store.push(b);

        let node = self.graph.node_mut(v)?;
        node.gap_axes = axes;
        node.set_fixed(key);
        self.branch_nodes.insert(key, v);
        tracing::debug!(node = %v, branch = %key, points = len, "repaired broken branch");
        Ok(())
    }

    /// Concatenates the segment points and the interpolated gap points in
    /// flow order, with no repeated point where two chunks meet.
    ///
    /// The end points are snapped onto `n1` and `n2`. Attachment edges get
    /// their position in the result.
    fn restore_axis_function(
        &mut self,
        segs: &[BranchSegment],
        gaps: &[AttachEdges],
        n1: JointId,
        n2: JointId,
    ) -> Result<(Vec<FluxPoint>, Vec<BoundaryInfo>, Vec<CubicBezier>)> {
        let n_gaps = segs.len().saturating_sub(1);
        let mut fills = Vec::with_capacity(n_gaps);
        for i in 0..n_gaps {
            let edges = gaps.get(i).map_or(&[][..], |g| g.as_slice());
            fills.push(self.interpolate_skeletal_gap(&segs[i], i == 0, &segs[i + 1], i + 1 == n_gaps, edges)?);
        }

        let reserve = segs.iter().map(BranchSegment::size).sum::<usize>()
            + fills.iter().map(|f| f.points.len()).sum::<usize>();
        let mut fps: Vec<FluxPoint> = Vec::with_capacity(reserve);
        let mut bis: Vec<BoundaryInfo> = Vec::with_capacity(reserve);

        for (i, seg) in segs.iter().enumerate() {
            let b = self.store.get(seg.branch);
            if !seg.is_empty() {
                for f in first_connected_in_segment(&fps, seg, b)..=seg.last() {
                    fps.push(seg.point(b, f));
                    bis.push(seg.info(b, f));
                }
            }
            let Some(fill) = fills.get(i) else {
                continue;
            };
            let k = first_connected_in_gap(&fps, &fill.points);
            // a skipped point is the one already at the end of `fps`
            let position = if fill.position >= k {
                fps.len() + fill.position - k
            } else {
                fps.len().saturating_sub(1)
            };
            for &e in gaps.get(i).map_or(&[][..], |g| g.as_slice()) {
                self.graph.edge_mut(e)?.position = Some(position);
            }
            fps.extend_from_slice(&fill.points[k.min(fill.points.len())..]);
            bis.extend_from_slice(&fill.info[k.min(fill.info.len())..]);
        }
        if fps.len() > reserve {
            tracing::warn!(points = fps.len(), reserve, "repaired branch exceeds its reservation");
        }

        let (p1, p2) = (self.store.joint(n1).fp.p, self.store.joint(n2).fp.p);
        let (Some(first), Some(last)) = (fps.first().map(|fp| fp.p), fps.last().map(|fp| fp.p)) else {
            return Err(Error::StructuralInvariantViolation {
                context: format!("{n1}-{n2}"),
                message: "repaired branch has no points".into(),
            });
        };
        if first.dist(p1) >= MAX_ENDPOINT_DRIFT || last.dist(p2) >= MAX_ENDPOINT_DRIFT {
            return Err(Error::StructuralInvariantViolation {
                context: format!("{n1}-{n2}"),
                message: format!("repaired ends {first} and {last} are away from the joints {p1} and {p2}"),
            });
        }
        let n = fps.len();
        fps[0].p = p1;
        fps[n - 1].p = p2;

        Ok((fps, bis, fills.into_iter().map(|f| f.curve).collect()))
    }
}

/// First flow index of `seg` to append after `fps`.
fn first_connected_in_segment(fps: &[FluxPoint], seg: &BranchSegment, b: &Branch) -> usize {
    let first = seg.first();
    let Some(last) = fps.last() else {
        return first;
    };
    if last.p.sq_dist(seg.pt(b, first)) <= SAME_POINT_SQ_DIST {
        first + 1
    } else if seg.size() == 1 {
        first
    } else if last.p.is_connected_to(seg.pt(b, first + 1)) {
        first + 1
    } else {
        first
    }
}

/// First index of `gap` to append after `fps`.
///
/// Leading gap points that repeat the last point are skipped, which covers
/// a curve collapsed onto a single point.
fn first_connected_in_gap(fps: &[FluxPoint], gap: &[FluxPoint]) -> usize {
    let Some(last) = fps.last() else {
        return 0;
    };
    let repeats = gap.iter().take_while(|fp| last.p.sq_dist(fp.p) < SAME_POINT_SQ_DIST).count();
    if repeats > 0 {
        repeats
    } else if gap.len() <= 1 {
        0
    } else if last.p.is_connected_to(gap[1].p) {
        1
    } else {
        0
    }
}

/// Turns reconstructed spokes that cross their neighbour onto the
/// neighbour's boundary point, forward then backward.
fn remove_crossing_spokes(fps: &[FluxPoint], bis: &mut [BoundaryInfo]) {
    let n = bis.len().min(fps.len());
    for i in 1..n {
        for s in Side::BOTH {
            let prev = bis[i - 1].side(s).pt;
            let bp = bis[i].side_mut(s);
            if bp.index < 0 && segments_intersect(fps[i].p, bp.pt, fps[i - 1].p, prev) {
                bp.pt = prev;
            }
        }
    }
    for j in (1..n).rev() {
        for s in Side::BOTH {
            let next = bis[j].side(s).pt;
            let bp = bis[j - 1].side_mut(s);
            if bp.index < 0 && segments_intersect(fps[j - 1].p, bp.pt, fps[j].p, next) {
                bp.pt = next;
            }
        }
    }
}

/// Recomputes the cumulative distances of a repaired branch and groups
/// the boundary points of each side into runs.
///
/// Contour indices form runs of standard points. Points without a contour
/// index are chained pixel by pixel into the `gap_pts` of the run before
/// them, and their index becomes `-k` for `gap_pts[k - 1]`. `subindex`
/// is the run a point belongs to.
fn restore_derived_values(fps: &[FluxPoint], bis: &mut [BoundaryInfo]) -> [Vec<BoundarySegment>; 2] {
    let mut runs: [Vec<BoundarySegment>; 2] = [Vec::new(), Vec::new()];
    let n = bis.len().min(fps.len());
    if n == 0 {
        return runs;
    }

    let mut current = [BoundarySegment::default(), BoundarySegment::default()];
    let mut cbd = [0.0; 2];
    let mut prev_cbd = [0.0; 2];

    bis[0].cum_axis_dist = 0.0;
    for s in Side::BOTH {
        let j = s.index();
        let bp = bis[0].side_mut(s);
        prev_cbd[j] = bp.cum_bndry_dist;
        bp.cum_bndry_dist = 0.0;
        bp.subindex = 0;
        current[j] = BoundarySegment::new(bp.index, bp.index);
        if bp.index < 0 {
            bp.index = -1;
            let mut run = current[j].clone();
            run.add_gap_point(bp.pt);
            runs[j].push(run);
        }
    }

    for i in 1..n {
        let prev = bis[i - 1];
        let at_gap = !prev.is_indexed() || !bis[i].is_indexed();
        bis[i].cum_axis_dist = prev.cum_axis_dist + fps[i].p.dist(fps[i - 1].p);

        for s in Side::BOTH {
            let j = s.index();
            let bp0 = *prev.side(s);
            let bp = bis[i].side_mut(s);

            let step = bp.cum_bndry_dist - prev_cbd[j];
            cbd[j] += if at_gap || step < 0.0 { bp.pt.dist(bp0.pt) } else { step };
            prev_cbd[j] = bp.cum_bndry_dist;
            bp.cum_bndry_dist = cbd[j];

            if bp0.index >= 0 && bp.index < 0 {
                runs[j].push(current[j].clone());
            } else if bp0.index < 0 && bp.index >= 0 {
                if let Some(run) = runs[j].last_mut() {
                    run.add_gap_points(bp0.pt, bp.pt, false);
                }
                current[j] = BoundarySegment::new(bp.index, bp.index);
            }

            if bp.index < 0 {
                if runs[j].is_empty() {
                    runs[j].push(BoundarySegment::new(-1, -1));
                }
                let count = runs[j].len();
                let run = &mut runs[j][count - 1];
                run.add_gap_points(bp0.pt, bp.pt, true);
                bp.index = -(run.gap_pts.len() as i32);
                bp.subindex = count as i32 - 1;
            } else {
                current[j].end = bp.index;
                bp.subindex = runs[j].len() as i32;
            }
        }
    }

    for s in Side::BOTH {
        if bis[n - 1].side(s).index >= 0 {
            runs[s.index()].push(current[s.index()].clone());
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gsg::tests::star;
    use crate::ligature::analyzer::tests::tee;
    use crate::model::{BoundaryPoint, BranchId, GsgParams, Point};
    use crate::segment::BranchKey;
    use pretty_assertions::assert_eq;

    /// Spokes of axis point `k`, with both cumulative boundary distances at `k`.
    fn info(k: usize, first: (f64, f64, i32), second: (f64, f64, i32)) -> BoundaryInfo {
        let mut bi = BoundaryInfo {
            cum_axis_dist: 0.0,
            first: BoundaryPoint::new(Point::new(first.0, first.1), first.2),
            second: BoundaryPoint::new(Point::new(second.0, second.1), second.2),
        };
        bi.first.cum_bndry_dist = k as f64;
        bi.second.cum_bndry_dist = k as f64;
        bi
    }

    fn axis(n: usize) -> Vec<FluxPoint> {
        (0..n).map(|k| FluxPoint::new(Point::new(k as f64, 0.0), 2.0)).collect()
    }

    #[test]
    fn derived_values_split_runs_at_gap_points() {
        let fps = axis(5);
        let mut bis = vec![
            info(0, (0.0, 2.0, 10), (0.0, -2.0, 40)),
            info(1, (1.0, 2.0, 11), (1.0, -2.0, 39)),
            info(2, (2.0, 4.0, -1), (2.0, -2.0, 38)),
            info(3, (3.0, 2.0, 13), (3.0, -2.0, 37)),
            info(4, (4.0, 2.0, 14), (4.0, -2.0, 36)),
        ];
        let runs = restore_derived_values(&fps, &mut bis);

        assert_eq!(runs[1], vec![BoundarySegment::new(40, 36)]);
        assert_eq!(runs[0].len(), 2);
        assert_eq!((runs[0][0].start, runs[0][0].end), (10, 11));
        assert_eq!((runs[0][1].start, runs[0][1].end), (13, 14));
        // (1,2) -> (2,4) -> (3,2): one interior pixel on each leg plus the gap point
        assert_eq!(
            runs[0][0].gap_pts,
            vec![Point::new(2.0, 3.0), Point::new(2.0, 4.0), Point::new(3.0, 3.0)]
        );

        assert_eq!(bis[2].first.index, -2);
        assert_eq!(bis[2].first.subindex, 0);
        assert_eq!(bis[3].first.subindex, 1);
        assert_eq!(bis[4].cum_axis_dist, 4.0);
        assert_eq!(bis[1].second.cum_bndry_dist, 1.0);
        assert_eq!(bis[4].second.cum_bndry_dist, 4.0);
        assert!(bis[4].first.cum_bndry_dist > 4.0);
    }

    #[test]
    fn derived_values_of_an_unindexed_branch() {
        let fps = axis(3);
        let mut bis: Vec<BoundaryInfo> =
            (0..3).map(|k| info(k, (k as f64, 2.0, -1), (k as f64, -2.0, -1))).collect();
        let runs = restore_derived_values(&fps, &mut bis);
        for s in Side::BOTH {
            assert_eq!(runs[s.index()].len(), 1);
            assert_eq!(runs[s.index()][0].gap_pts.len(), 3);
        }
        assert_eq!(bis[2].second.index, -3);
        assert_eq!(bis[2].second.cum_bndry_dist, 2.0);
    }

    #[test]
    fn crossing_spoke_is_turned_onto_its_neighbour() {
        let fps = axis(3);
        let mut bis = vec![
            info(0, (0.0, 2.0, 5), (0.0, -2.0, 9)),
            info(1, (-1.0, 2.0, -1), (1.0, -2.0, 8)),
            info(2, (2.0, 2.0, 7), (2.0, -2.0, 7)),
        ];
        remove_crossing_spokes(&fps, &mut bis);
        assert_eq!(bis[1].first.pt, Point::new(0.0, 2.0));
        assert_eq!(bis[1].second.pt, Point::new(1.0, -2.0));
    }

    #[test]
    fn connection_skips_repeated_points() {
        let fps = axis(3);
        let gap = vec![
            FluxPoint::new(Point::new(2.0, 0.0), 2.0),
            FluxPoint::new(Point::new(3.0, 0.0), 2.0),
        ];
        assert_eq!(first_connected_in_gap(&fps, &gap), 1);
        assert_eq!(first_connected_in_gap(&[], &gap), 0);
        let far = vec![
            FluxPoint::new(Point::new(5.0, 0.0), 2.0),
            FluxPoint::new(Point::new(6.0, 0.0), 2.0),
        ];
        assert_eq!(first_connected_in_gap(&fps, &far), 0);
        let collapsed = vec![FluxPoint::new(Point::new(2.0, 0.0), 2.0); 2];
        assert_eq!(first_connected_in_gap(&fps, &collapsed), 2);
    }

    #[test]
    fn repaired_tee_bar_is_continuous() {
        let g = tee();
        let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let bar = gsg.node_for_branch(BranchKey::Skeletal(BranchId(0))).unwrap();
        let node = gsg.node(bar).unwrap();
        let b = gsg.branch(node.fixed_branch().unwrap());

        let (n1, n2) = (b.n1, b.n2);
        assert_eq!(b.first_point(), g.joint(n1).fp.p);
        assert_eq!(b.last_point(), g.joint(n2).fp.p);
        assert_eq!(b.len(), b.boundary_info.len());
        for w in b.flux_points.windows(2) {
            assert!(w[0].p.dist(w[1].p) <= 1.5, "{} and {} are apart", w[0].p, w[1].p);
            assert!(w[0].p.sq_dist(w[1].p) > 0.0);
        }
        for w in b.boundary_info.windows(2) {
            assert!(w[1].cum_axis_dist > w[0].cum_axis_dist);
        }

        let e = node.segments.gaps()[0][0];
        let pos = gsg.edge(e).unwrap().position.unwrap();
        assert!(b.flux_points[pos].p.dist(g.joint(crate::model::JointId(0)).fp.p) <= 1.0);
    }

    #[test]
    fn repairing_a_sound_node_is_a_no_op() {
        let g = star();
        let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let v = gsg.node_for_branch(BranchKey::Skeletal(BranchId(2))).unwrap();
        gsg.fix_broken_branch(v).unwrap();
        assert_eq!(gsg.store().synthetic_count(), 0);
        let j = gsg.nodes_of_kind(NodeKind::Junction)[0];
        assert!(gsg.fix_broken_branch(j).is_err());
    }

    #[test]
    fn repair_in_progress_is_left_to_the_outer_call() {
        let g = star();
        let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let u = gsg.node_for_branch(BranchKey::Skeletal(BranchId(0))).unwrap();
        let v = gsg.node_for_branch(BranchKey::Skeletal(BranchId(1))).unwrap();
        gsg.merge_branch_nodes(u, v, crate::model::JointId(0)).unwrap();

        gsg.repairing.insert(u);
        gsg.fix_broken_branch(u).unwrap();
        assert!(gsg.node(u).unwrap().is_broken());
        assert_eq!(gsg.store().synthetic_count(), 0);

        gsg.repairing.remove(&u);
        gsg.fix_broken_branch(u).unwrap();
        assert!(!gsg.node(u).unwrap().is_broken());
        assert!(gsg.repairing.is_empty());
    }
}
