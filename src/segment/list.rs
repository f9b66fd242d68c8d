//! Ordered branch segments of one GSG branch node.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{common_joint, BranchSegment, BranchStore};
use crate::graph::EdgeIx;
use crate::model::{JointId, Point};
use crate::{Error, Result};

/// Attachment edges of one gap. A gap between two spliced segments is
/// formed at an attachment joint, and every ligature edge hanging off it
/// is recorded here.
pub type AttachEdges = SmallVec<[EdgeIx; 2]>;

/// Segments whose points all flow in the same direction, plus one
/// [`AttachEdges`] per gap between consecutive segments.
///
/// Invariant: `gaps().len() + 1 == len()` for a non-empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchSegmentList {
    segments: Vec<BranchSegment>,
    gaps: Vec<AttachEdges>,
}

impl BranchSegmentList {
    pub fn new(seg: BranchSegment) -> Self {
        Self { segments: vec![seg], gaps: Vec::new() }
    }

    pub fn segments(&self) -> &[BranchSegment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [BranchSegment] {
        &mut self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn front(&self) -> Option<&BranchSegment> {
        self.segments.first()
    }

    pub fn back(&self) -> Option<&BranchSegment> {
        self.segments.last()
    }

    pub fn gaps(&self) -> &[AttachEdges] {
        &self.gaps
    }

    pub fn gaps_mut(&mut self) -> &mut [AttachEdges] {
        &mut self.gaps
    }

    pub fn gap_mut(&mut self, i: usize) -> Option<&mut AttachEdges> {
        self.gaps.get_mut(i)
    }

    /// Total number of points over all segments.
    pub fn size(&self) -> usize {
        self.segments.iter().map(BranchSegment::size).sum()
    }

    /// First point of the *branch* under the first segment, in flow order.
    pub fn first_xy(&self, store: &BranchStore<'_>) -> Option<Point> {
        self.front().map(|s| {
            let b = store.get(s.branch);
            if s.is_inverted() { b.last_point() } else { b.first_point() }
        })
    }

    /// Last point of the *branch* under the last segment, in flow order.
    pub fn last_xy(&self, store: &BranchStore<'_>) -> Option<Point> {
        self.back().map(|s| {
            let b = store.get(s.branch);
            if s.is_inverted() { b.first_point() } else { b.last_point() }
        })
    }

    fn invert_flow(&mut self) {
        for s in &mut self.segments {
            s.toggle_inverted();
        }
        self.segments.reverse();
        self.gaps.reverse();
    }

    /// Moves the segments of `other` to the front or back of this list.
    ///
    /// The flow direction of `self` is kept; `other` is inverted when its
    /// branches meet ours end-to-end in the opposite direction. A new empty
    /// gap is created between the two runs and its index is returned.
    pub fn splice(&mut self, mut other: BranchSegmentList, store: &BranchStore<'_>) -> Result<usize> {
        let (Some(b0p0), Some(b0pn), Some(b1p0), Some(b1pn)) = (
            self.first_xy(store),
            self.last_xy(store),
            other.first_xy(store),
            other.last_xy(store),
        ) else {
            return Err(Error::StructuralInvariantViolation {
                context: "segment list".into(),
                message: "cannot splice an empty segment list".into(),
            });
        };

        let at_front = if b0p0 == b1pn {
            true
        } else if b0p0 == b1p0 {
            other.invert_flow();
            true
        } else if b0pn == b1p0 {
            false
        } else if b0pn == b1pn {
            other.invert_flow();
            false
        } else {
            return Err(Error::StructuralInvariantViolation {
                context: self.segments[0].branch.to_string(),
                message: format!(
                    "segment lists share no end point: [{b0p0}, {b0pn}] and [{b1p0}, {b1pn}]"
                ),
            });
        };

        let gap = if at_front {
            let mut segments = std::mem::take(&mut other.segments);
            segments.append(&mut self.segments);
            self.segments = segments;

            let mut gaps = std::mem::take(&mut other.gaps);
            let gap = gaps.len();
            gaps.push(AttachEdges::new());
            gaps.append(&mut self.gaps);
            self.gaps = gaps;
            gap
        } else {
            self.segments.append(&mut other.segments);
            self.gaps.push(AttachEdges::new());
            let gap = self.gaps.len() - 1;
            self.gaps.append(&mut other.gaps);
            gap
        };

        if self.gaps.len() + 1 != self.segments.len() {
            return Err(Error::StructuralInvariantViolation {
                context: self.segments[0].branch.to_string(),
                message: format!("{} gaps for {} segments", self.gaps.len(), self.segments.len()),
            });
        }
        Ok(gap)
    }

    /// Joints at the flow start of the first segment and the flow end of
    /// the last one.
    pub fn endpoints(&self, store: &BranchStore<'_>) -> Result<(JointId, JointId)> {
        let no_joint = |msg: &str| Error::StructuralInvariantViolation {
            context: "segment list".into(),
            message: msg.into(),
        };
        let segs = &self.segments;
        match segs.len() {
            0 => Err(no_joint("empty segment list has no end points")),
            1 => {
                let s = &segs[0];
                let b = store.get(s.branch);
                if s.pt(b, s.branch_first()) == store.joint(b.n1).fp.p {
                    Ok((b.n1, b.n2))
                } else {
                    Ok((b.n2, b.n1))
                }
            }
            n => {
                let (b0, b1) = (store.get(segs[0].branch), store.get(segs[1].branch));
                let (bm, bn) = (store.get(segs[n - 2].branch), store.get(segs[n - 1].branch));
                let j1 = common_joint(b0, b1).ok_or_else(|| no_joint("first segments are not adjacent"))?;
                let j2 = common_joint(bn, bm).ok_or_else(|| no_joint("last segments are not adjacent"))?;
                Ok((b0.other_endpoint(j1), bn.other_endpoint(j2)))
            }
        }
    }

    /// Subtracts a rooted interval from the first segment when it shares
    /// its branch, else from the last.
    pub fn subtract_interval(&mut self, ls: &BranchSegment) -> Result<()> {
        let Some(front) = self.segments.first() else {
            return Ok(());
        };
        if front.branch == ls.branch {
            self.segments[0].subtract_interval(ls)
        } else if let Some(back) = self.segments.last_mut() {
            back.subtract_interval(ls)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundaryInfo, BranchId, FluxPoint, SkeletalGraph};
    use crate::segment::BranchKey;
    use pretty_assertions::assert_eq;

    /// Three collinear branches A-B, C-B and C-D with joints at x = 0, 4, 8, 12.
    fn chain() -> SkeletalGraph {
        let mut g = SkeletalGraph::new(Vec::new());
        let xs = [0.0, 4.0, 8.0, 12.0];
        let js: Vec<JointId> = xs.iter().map(|&x| g.add_joint(Point::new(x, 0.0), 2.0)).collect();
        let mut add = |a: usize, b: usize| {
            let (x0, x1) = (xs[a], xs[b]);
            let fps: Vec<FluxPoint> = (0..5)
                .map(|k| FluxPoint::new(Point::new(x0 + (x1 - x0) * k as f64 / 4.0, 0.0), 2.0))
                .collect();
            let bis = vec![BoundaryInfo::default(); 5];
            g.add_branch(js[a], js[b], fps, bis).unwrap();
        };
        add(0, 1);
        add(2, 1);
        add(2, 3);
        g
    }

    fn list(store: &BranchStore<'_>, i: usize) -> BranchSegmentList {
        BranchSegmentList::new(store.whole(BranchKey::Skeletal(BranchId(i))))
    }

    #[test]
    fn splice_back_inverts_opposed_flow() {
        let g = chain();
        let store = BranchStore::new(&g);
        let mut l = list(&store, 0);
        let gap = l.splice(list(&store, 1), &store).unwrap();
        assert_eq!(gap, 0);
        assert_eq!(l.len(), 2);
        assert!(l.segments()[1].is_inverted());
        assert_eq!(l.last_xy(&store), Some(Point::new(8.0, 0.0)));
        assert_eq!(l.endpoints(&store).unwrap(), (JointId(0), JointId(2)));

        let gap = l.splice(list(&store, 2), &store).unwrap();
        assert_eq!(gap, 1);
        assert_eq!(l.gaps().len(), 2);
        assert_eq!(l.endpoints(&store).unwrap(), (JointId(0), JointId(3)));
        assert_eq!(l.size(), 15);
    }

    fn some_edge() -> EdgeIx {
        let mut g = crate::graph::Graph::<(), ()>::new();
        let (a, b) = (g.add_node(()), g.add_node(()));
        g.add_edge(a, b, ()).unwrap()
    }

    #[test]
    fn splice_front_keeps_gap_order() {
        let g = chain();
        let store = BranchStore::new(&g);
        let mut head = list(&store, 0);
        head.splice(list(&store, 1), &store).unwrap();
        head.gap_mut(0).unwrap().push(some_edge());

        let mut l = list(&store, 2);
        let gap = l.splice(head, &store).unwrap();
        assert_eq!(l.len(), 3);
        assert_eq!(gap, 1);
        assert_eq!(l.gaps()[0].len(), 1);
        assert!(l.gaps()[1].is_empty());
        assert_eq!(l.segments()[2].branch, BranchKey::Skeletal(BranchId(2)));
        assert_eq!(l.endpoints(&store).unwrap(), (JointId(0), JointId(3)));
    }

    #[test]
    fn single_segment_endpoints_follow_flow() {
        let g = chain();
        let store = BranchStore::new(&g);
        let mut l = list(&store, 1);
        assert_eq!(l.endpoints(&store).unwrap(), (JointId(2), JointId(1)));
        l.invert_flow();
        assert_eq!(l.endpoints(&store).unwrap(), (JointId(1), JointId(2)));
    }

    #[test]
    fn disjoint_lists_do_not_splice() {
        let g = chain();
        let store = BranchStore::new(&g);
        let mut l = list(&store, 0);
        assert!(matches!(
            l.splice(list(&store, 2), &store),
            Err(Error::StructuralInvariantViolation { .. })
        ));
    }
}
