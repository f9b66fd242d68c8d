//! The dependency-ordered sweep over the joints.

use std::sync::atomic::{AtomicBool, Ordering};

use super::dependency::DependencyNode;
use super::{EdgeKind, Gsg, JointLabel, NodeKind};
use crate::graph::NodeIx;
use crate::ligature::LigatureSegment;
use crate::model::JointId;
use crate::segment::BranchKey;
use crate::{Error, Result};

impl Gsg<'_> {
    /// Builds the graph: one node per input branch, then every joint in
    /// dependency order, then a repair of whatever is still broken.
    pub(super) fn run(&mut self, cancel: Option<&AtomicBool>) -> Result<()> {
        let mut dg = self.dependency_graph()?;
        tracing::debug!(
            joints = dg.len(),
            dependencies = dg.dependency_count(),
            "dependency graph built"
        );
        if self.params.dump_dependency_graph {
            let mut buf = Vec::new();
            crate::export::write_dependency_dump(&dg, &mut buf)?;
            tracing::debug!(dump = %String::from_utf8_lossy(&buf), "dependency graph");
        }

        for id in self.store.skeleton().branch_ids() {
            self.new_branch_node(BranchKey::Skeletal(id));
        }

        while !dg.is_empty() {
            if cancel.is_some_and(|c| c.load(Ordering::SeqCst)) {
                tracing::debug!(pending = dg.len(), "construction cancelled");
                return Err(Error::Cancelled);
            }
            let ready = dg.ready()?;
            if ready.is_empty() {
                dg.break_cycle()?;
                continue;
            }
            for &v in &ready {
                let node = dg.node(v)?.clone();
                self.fix_incident_branches(&node)?;
                self.process_joint(node.joint)?;
            }
            for v in ready {
                dg.remove(v)?;
            }
        }

        for v in self.nodes_of_kind(NodeKind::Branch) {
            if self.graph.contains_node(v) && self.graph.node(v)?.is_broken() {
                self.fix_broken_branch(v)?;
            }
        }
        if let Some((v, _)) = self.graph.nodes().find(|(_, n)| n.is_broken()) {
            return Err(Error::StructuralInvariantViolation {
                context: v.to_string(),
                message: "branch node left broken after construction".into(),
            });
        }

        tracing::debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            forced_removals = dg.forced_removals(),
            "generalized skeletal graph built"
        );
        if self.params.dump_gsg {
            let mut buf = Vec::new();
            crate::export::write_text_dump(self, &mut buf)?;
            tracing::debug!(dump = %String::from_utf8_lossy(&buf), "generalized skeletal graph");
        }
        Ok(())
    }

    /// Repairs the broken branches a joint is about to look at, as far as
    /// that is safe before the joint itself is processed.
    fn fix_incident_branches(&mut self, node: &DependencyNode) -> Result<()> {
        let j = node.joint;
        let keys: Vec<BranchKey> = match node.kind {
            NodeKind::Attachment | NodeKind::Crossing => node
                .lig
                .iter()
                .copied()
                .chain(node.non_lig.iter().copied().filter(|&b| self.has_potential_nested_endpoint(j, b)))
                .collect(),
            NodeKind::Junction => node.non_lig.clone(),
            NodeKind::Branch | NodeKind::Endpoint => Vec::new(),
        };
        for key in keys {
            let v = self.node_of(key)?;
            if self.graph.node(v)?.is_broken() {
                self.fix_broken_branch(v)?;
            }
        }
        Ok(())
    }

    /// Labels `joint` on the current branches and rewires the graph around it.
    pub fn process_joint(&mut self, joint: JointId) -> Result<()> {
        let label = self.label_joint(joint, true, None)?;
        match label.kind {
            NodeKind::Junction => self.process_junction(label).map(|_| ()),
            NodeKind::Attachment => self.process_attachment(label),
            NodeKind::Crossing => self.process_crossing(label).map(|_| ()),
            kind => Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("joint labelled {kind}"),
            }),
        }
    }

    fn process_junction(&mut self, label: JointLabel) -> Result<NodeIx> {
        let joint = label.joint;
        let r = self.new_joint_node(NodeKind::Junction, joint);
        for ls in &label.non_lig {
            let v = self.node_of(ls.branch())?;
            self.new_edge(r, v, EdgeKind::Junction, Some(joint), None)?;
        }
        for ls in label.lig {
            let v = self.node_of(ls.branch())?;
            self.new_edge(r, v, EdgeKind::Ligature, Some(joint), Some(ls))?;
        }
        Ok(r)
    }

    /// Merges the two pieces of the broken branch and hangs the attached
    /// branches off the gap between them.
    fn process_attachment(&mut self, label: JointLabel) -> Result<()> {
        let joint = label.joint;
        let [nl0, nl1] = &label.non_lig[..] else {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("attachment with {} broken pieces", label.non_lig.len()),
            });
        };
        let u = self.node_of(nl0.branch())?;
        let v = self.node_of(nl1.branch())?;
        if u == v {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("both broken pieces belong to {u}"),
            });
        }

        // Segments hold original branches, so the gap must be measured on them.
        for (w, nl) in [(u, nl0), (v, nl1)] {
            let original = self.original_branch(nl.branch(), joint)?;
            let ls = LigatureSegment::gap(&self.store, original, joint, &label.lig)?;
            self.graph.node_mut(w)?.subtract_gap_ligature(&ls)?;
        }

        let (a, gap) = self.merge_branch_nodes(u, v, joint)?;
        for ls in label.lig {
            let t = self.node_of(ls.branch())?;
            let e = self.new_edge(a, t, EdgeKind::Ligature, Some(joint), Some(ls))?;
            self.graph
                .node_mut(u)?
                .segments
                .gap_mut(gap)
                .ok_or_else(|| Error::StructuralInvariantViolation {
                    context: u.to_string(),
                    message: format!("no gap {gap} after merge"),
                })?
                .push(e);
        }
        Ok(())
    }

    fn process_crossing(&mut self, label: JointLabel) -> Result<NodeIx> {
        let joint = label.joint;
        let (v, existing) = match label.non_lig.first() {
            Some(ls) => {
                let v = self.node_of(ls.branch())?;
                (v, self.target_of_kind(v, NodeKind::Crossing)?)
            }
            None => {
                let key = self.new_branch_from_joint(joint)?;
                (self.new_branch_node(key), None)
            }
        };
        let c = match existing {
            Some(c) => c,
            None => {
                let c = self.new_joint_node(NodeKind::Crossing, joint);
                self.new_edge(v, c, EdgeKind::Empty, Some(joint), None)?;
                c
            }
        };

        let subtract = self.params.subtract_ligature_from_crossings;
        for ls in label.lig {
            let t = self.node_of(ls.branch())?;
            let at = if subtract && ls.is_ligature(&self.lig_params) { ls.joint } else { joint };
            self.new_edge(c, t, EdgeKind::Ligature, Some(at), Some(ls))?;
        }
        Ok(c)
    }

    /// The input branch at `joint` that the node owning `key` was built from.
    pub(crate) fn original_branch(&self, key: BranchKey, joint: JointId) -> Result<BranchKey> {
        let v = self.node_of(key)?;
        self.store
            .joint(joint)
            .branches
            .iter()
            .map(|&id| BranchKey::Skeletal(id))
            .find(|&k| self.node_for_branch(k) == Some(v))
            .ok_or_else(|| Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("no incident branch belongs to the node of {key}"),
            })
    }
}
