//! In-place merge of two branch nodes that continue each other.

use super::{EdgeKind, Gsg, NodeKind};
use crate::graph::NodeIx;
use crate::model::JointId;
use crate::{Error, Result};

impl Gsg<'_> {
    /// Merges `v` into `u` at `joint`.
    ///
    /// `v` is deleted. Its in-edges, its edges towards junctions and its
    /// segments move to `u`, whose attachment node absorbs `v`'s. `u` is
    /// left broken. Returns the attachment node of `u` and the index of the
    /// gap opened between the two segment runs.
    pub fn merge_branch_nodes(&mut self, u: NodeIx, v: NodeIx, joint: JointId) -> Result<(NodeIx, usize)> {
        for w in [u, v] {
            if self.graph.node(w)?.kind != NodeKind::Branch {
                return Err(Error::StructuralInvariantViolation {
                    context: w.to_string(),
                    message: format!("cannot merge a {} node", self.graph.node(w)?.kind),
                });
            }
        }

        for e in self.graph.in_edges(v)?.to_vec() {
            let s = self.graph.source(e)?;
            self.graph.move_edge(e, s, u)?;
        }
        for e in self.graph.out_edges(v)?.to_vec() {
            let t = self.graph.target(e)?;
            if self.graph.node(t)?.kind == NodeKind::Junction {
                self.graph.move_edge(e, u, t)?;
            }
        }

        let (out_u, out_v) = (self.graph.out_degree(u)?, self.graph.out_degree(v)?);
        if out_v > 1 || out_u > 3 {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("merging {v} into {u} with out-degrees {out_v} and {out_u}"),
            });
        }

        let a = match (self.out_edge_to(u, NodeKind::Attachment)?, self.out_edge_to(v, NodeKind::Attachment)?) {
            (Some(ua), Some(va)) => {
                let (a1, a2) = (self.graph.target(ua)?, self.graph.target(va)?);
                if a1 != a2 {
                    for e in self.graph.out_edges(a2)?.to_vec() {
                        let t = self.graph.target(e)?;
                        self.graph.move_edge(e, a1, t)?;
                    }
                    self.graph.delete_node(a2)?;
                }
                a1
            }
            (None, Some(va)) => {
                let a1 = self.graph.target(va)?;
                self.graph.move_edge(va, u, a1)?;
                a1
            }
            (Some(ua), None) => self.graph.target(ua)?,
            (None, None) => {
                let a1 = self.new_joint_node(NodeKind::Attachment, joint);
                self.new_edge(u, a1, EdgeKind::Empty, Some(joint), None)?;
                a1
            }
        };

        for owner in self.branch_nodes.values_mut() {
            if *owner == v {
                *owner = u;
            }
        }

        let segments = std::mem::take(&mut self.graph.node_mut(v)?.segments);
        let gap = self.graph.node_mut(u)?.segments.splice(segments, &self.store)?;
        self.graph.delete_node(v)?;
        self.graph.node_mut(u)?.set_broken();

        tracing::debug!(joint = %joint, survivor = %u, removed = %v, attachment = %a, gap, "merged branch nodes");
        Ok((a, gap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gsg::tests::star;
    use crate::model::{BranchId, GsgParams, JointId};
    use crate::segment::BranchKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_takes_over_the_attachment_of_the_removed_node() {
        let g = star();
        let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let u = gsg.node_for_branch(BranchKey::Skeletal(BranchId(0))).unwrap();
        let v = gsg.node_for_branch(BranchKey::Skeletal(BranchId(1))).unwrap();
        let before_u = gsg.node(u).unwrap().segments.segments().to_vec();
        let before_v = gsg.node(v).unwrap().segments.segments().to_vec();

        let a = gsg.new_joint_node(NodeKind::Attachment, JointId(0));
        gsg.new_edge(v, a, EdgeKind::Empty, Some(JointId(0)), None).unwrap();
        assert_eq!(gsg.graph().out_degree(u).unwrap(), 0);

        let (att, gap) = gsg.merge_branch_nodes(u, v, JointId(0)).unwrap();
        assert_eq!(att, a);
        assert_eq!(gap, 0);
        assert!(!gsg.graph().contains_node(v));
        assert!(gsg.node(u).unwrap().is_broken());

        let out = gsg.graph().out_edges(u).unwrap().to_vec();
        let targets: Vec<NodeIx> = out.iter().map(|&e| gsg.graph().target(e).unwrap()).collect();
        assert_eq!(targets, vec![a]);
        assert_eq!(gsg.node_for_branch(BranchKey::Skeletal(BranchId(1))), Some(u));

        // v's run is inverted and placed in front so that the flow runs
        // from one free end to the other.
        let segs = gsg.node(u).unwrap().segments.segments().to_vec();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].branch, before_v[0].branch);
        assert!(segs[0].is_inverted());
        assert_eq!(segs[1], before_u[0]);
    }

    #[test]
    fn repaired_merge_spans_both_free_ends() {
        let g = star();
        let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let u = gsg.node_for_branch(BranchKey::Skeletal(BranchId(0))).unwrap();
        let v = gsg.node_for_branch(BranchKey::Skeletal(BranchId(1))).unwrap();
        gsg.merge_branch_nodes(u, v, JointId(0)).unwrap();
        gsg.fix_broken_branch(u).unwrap();

        let node = gsg.node(u).unwrap();
        assert!(node.has_fixed_branch());
        let b = gsg.branch(node.fixed_branch().unwrap());
        let ends = [b.first_point(), b.last_point()];
        assert!(ends.contains(&g.joint(JointId(1)).fp.p));
        assert!(ends.contains(&g.joint(JointId(2)).fp.p));
        assert_eq!(node.gap_axes().len(), 1);
    }

    #[test]
    fn merging_a_junction_fails() {
        let g = star();
        let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let j = gsg.nodes_of_kind(NodeKind::Junction)[0];
        let u = gsg.node_for_branch(BranchKey::Skeletal(BranchId(0))).unwrap();
        assert!(matches!(
            gsg.merge_branch_nodes(u, j, JointId(0)),
            Err(Error::StructuralInvariantViolation { .. })
        ));
    }
}
