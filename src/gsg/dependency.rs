//! Processing order of the joints.
//!
//! An edge `a -> b` means joint `a` can only be processed once `b` has
//! been, because `b` is an attachment whose merge changes a branch that
//! `a` needs to see repaired.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::{Gsg, NodeKind};
use crate::graph::{Graph, NodeIx};
use crate::ligature::LigatureSegment;
use crate::model::JointId;
use crate::segment::BranchKey;
use crate::{Error, Result};

/// A nested attachment is closer than this many radii of the outer joint.
const NESTED_ENDPOINT_DIST_RATIO: f64 = 1.2;

/// Classification of one joint, recorded before any merge happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub joint: JointId,
    pub kind: NodeKind,
    pub lig: Vec<BranchKey>,
    pub non_lig: Vec<BranchKey>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: Graph<DependencyNode, ()>,
    by_joint: HashMap<JointId, NodeIx>,
    forced_removals: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: DependencyNode) -> NodeIx {
        let joint = node.joint;
        let v = self.graph.add_node(node);
        self.by_joint.insert(joint, v);
        v
    }

    pub fn node(&self, v: NodeIx) -> Result<&DependencyNode> {
        self.graph.node(v)
    }

    pub fn node_for_joint(&self, joint: JointId) -> Option<&DependencyNode> {
        self.by_joint.get(&joint).and_then(|&v| self.graph.node(v).ok())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIx, &DependencyNode)> + '_ {
        self.graph.nodes()
    }

    /// `(dependent, dependency)` joint pairs in insertion order.
    pub fn dependencies(&self) -> impl Iterator<Item = (JointId, JointId)> + '_ {
        self.graph.edges().filter_map(|(_, s, t, _)| {
            let s = self.graph.node(s).ok()?.joint;
            let t = self.graph.node(t).ok()?.joint;
            Some((s, t))
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of edges deleted to break cycles so far.
    pub fn forced_removals(&self) -> usize {
        self.forced_removals
    }

    /// Records that `joint` waits for `on`. Returns false when the edge
    /// already exists or either joint has no node.
    pub fn add_dependency(&mut self, joint: JointId, on: JointId) -> Result<bool> {
        let (Some(&s), Some(&t)) = (self.by_joint.get(&joint), self.by_joint.get(&on)) else {
            return Ok(false);
        };
        if s == t {
            return Ok(false);
        }
        for &e in self.graph.out_edges(s)? {
            if self.graph.target(e)? == t {
                return Ok(false);
            }
        }
        self.graph.add_edge(s, t, ())?;
        Ok(true)
    }

    /// Nodes that wait for nothing, in insertion order.
    pub fn ready(&self) -> Result<Vec<NodeIx>> {
        let mut out = Vec::new();
        for v in self.graph.node_indices() {
            if self.graph.out_degree(v)? == 0 {
                out.push(v);
            }
        }
        Ok(out)
    }

    pub fn remove(&mut self, v: NodeIx) -> Result<DependencyNode> {
        let node = self.graph.delete_node(v)?;
        self.by_joint.remove(&node.joint);
        Ok(node)
    }

    /// Deletes the back edge of the first mutual dependency found; without
    /// one, deletes the first edge of the first node that has any.
    pub fn break_cycle(&mut self) -> Result<()> {
        let edges: Vec<_> = self.graph.edges().map(|(e, s, t, _)| (e, s, t)).collect();
        for (e0, s, t) in edges {
            let mut back = None;
            for &e1 in self.graph.out_edges(t)? {
                if self.graph.target(e1)? == s {
                    back = Some(e1);
                    break;
                }
            }
            if let Some(e1) = back {
                let (js, jt) = (self.graph.node(s)?.joint, self.graph.node(t)?.joint);
                tracing::warn!(dependency = %e0, from = %jt, to = %js, "breaking mutual dependency");
                self.graph.delete_edge(e1)?;
                self.forced_removals += 1;
                return Ok(());
            }
        }
        for v in self.graph.node_indices() {
            let first = self.graph.out_edges(v)?.first().copied();
            if let Some(e) = first {
                let j = self.graph.node(v)?.joint;
                tracing::warn!(joint = %j, "breaking dependency cycle without a mutual pair");
                self.graph.delete_edge(e)?;
                self.forced_removals += 1;
                return Ok(());
            }
        }
        Err(Error::UnresolvedDependencyCycle(format!(
            "{} joints wait with no dependency left to remove",
            self.graph.node_count()
        )))
    }
}

// ============================================================================
// Construction from the skeleton
// ============================================================================

impl Gsg<'_> {
    /// Classifies every joint of degree three or more on the input
    /// branches and links each one to the attachments it waits for.
    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        let skeleton = self.store.skeleton();
        let mut dg = DependencyGraph::new();
        for j in skeleton.joint_ids() {
            if skeleton.joint(j).degree() < 3 {
                continue;
            }
            let label = self.label_joint(j, false, None)?;
            let keys = |segs: &[LigatureSegment]| segs.iter().map(LigatureSegment::branch).collect();
            dg.add_node(DependencyNode {
                joint: j,
                kind: label.kind,
                lig: keys(&label.lig),
                non_lig: keys(&label.non_lig),
            });
        }

        let nodes: Vec<DependencyNode> = dg.nodes().map(|(_, n)| n.clone()).collect();
        for n in &nodes {
            let j = n.joint;
            match n.kind {
                NodeKind::Attachment => {
                    for &b in &n.lig {
                        self.add_node_dependencies(&mut dg, j, b, j, &mut HashSet::new())?;
                    }
                    for &b in &n.non_lig {
                        if self.has_potential_nested_endpoint(j, b) {
                            self.add_node_dependencies(&mut dg, j, b, j, &mut HashSet::new())?;
                        }
                    }
                }
                NodeKind::Junction => {
                    for &b in &n.non_lig {
                        self.add_node_dependencies(&mut dg, j, b, j, &mut HashSet::new())?;
                    }
                }
                NodeKind::Crossing => {
                    for &b in &n.lig {
                        let from = if self.store.get(b).is_endpoint(j) {
                            j
                        } else {
                            let front = n.non_lig.first().ok_or_else(|| Error::StructuralInvariantViolation {
                                context: j.to_string(),
                                message: format!("crossing branch {b} does not end at the joint"),
                            })?;
                            self.store.get(*front).other_endpoint(j)
                        };
                        self.add_node_dependencies(&mut dg, j, b, from, &mut HashSet::new())?;
                    }
                }
                NodeKind::Branch | NodeKind::Endpoint => {}
            }
        }
        Ok(dg)
    }

    /// Kind used for dependency typing; joints of degree one are endpoints.
    fn dependency_kind(&self, dg: &DependencyGraph, j: JointId) -> Option<NodeKind> {
        if self.store.joint(j).degree() <= 1 {
            return Some(NodeKind::Endpoint);
        }
        dg.node_for_joint(j).map(|n| n.kind)
    }

    /// Follows `src` away from `src_joint` through any chain of
    /// attachments, making `j0` wait for each of them.
    fn add_node_dependencies(
        &self,
        dg: &mut DependencyGraph,
        j0: JointId,
        src: BranchKey,
        src_joint: JointId,
        visited: &mut HashSet<JointId>,
    ) -> Result<()> {
        let j1 = self.store.get(src).other_endpoint(src_joint);
        if j1 == j0 || !visited.insert(j1) {
            return Ok(());
        }
        if self.dependency_kind(dg, j1) != Some(NodeKind::Attachment) {
            return Ok(());
        }
        let Some(n1) = dg.node_for_joint(j1).cloned() else {
            return Ok(());
        };
        // An H-shape: the branch is attached at the far joint, not broken there.
        if n1.lig.contains(&src) {
            return Ok(());
        }
        dg.add_dependency(j0, j1)?;
        for &b in n1.non_lig.iter().filter(|&&b| b != src) {
            self.add_node_dependencies(dg, j0, b, j1, visited)?;
        }
        Ok(())
    }

    /// Whether the far end of `b` is a smaller joint close enough to `j`
    /// to be an attachment nested inside its ligature.
    pub(crate) fn has_potential_nested_endpoint(&self, j: JointId, b: BranchKey) -> bool {
        let branch = self.store.get(b);
        if !branch.is_endpoint(j) {
            return false;
        }
        let (outer, inner) = (self.store.joint(j), self.store.joint(branch.other_endpoint(j)));
        let r = outer.fp.radius();
        inner.degree() > 1
            && inner.fp.radius() < r
            && inner.fp.p.dist(outer.fp.p) <= NESTED_ENDPOINT_DIST_RATIO * r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dg_node(j: usize) -> DependencyNode {
        DependencyNode { joint: JointId(j), kind: NodeKind::Attachment, lig: Vec::new(), non_lig: Vec::new() }
    }

    #[test]
    fn duplicate_dependencies_are_ignored() {
        let mut dg = DependencyGraph::new();
        dg.add_node(dg_node(0));
        dg.add_node(dg_node(1));
        assert!(dg.add_dependency(JointId(0), JointId(1)).unwrap());
        assert!(!dg.add_dependency(JointId(0), JointId(1)).unwrap());
        assert!(!dg.add_dependency(JointId(0), JointId(0)).unwrap());
        assert!(!dg.add_dependency(JointId(0), JointId(7)).unwrap());
        assert_eq!(dg.dependency_count(), 1);
        assert_eq!(dg.dependencies().collect::<Vec<_>>(), vec![(JointId(0), JointId(1))]);
    }

    #[test]
    fn ready_nodes_follow_removals() {
        let mut dg = DependencyGraph::new();
        let a = dg.add_node(dg_node(0));
        let b = dg.add_node(dg_node(1));
        dg.add_dependency(JointId(0), JointId(1)).unwrap();
        assert_eq!(dg.ready().unwrap(), vec![b]);
        assert_eq!(dg.remove(b).unwrap().joint, JointId(1));
        assert_eq!(dg.ready().unwrap(), vec![a]);
        assert!(dg.node_for_joint(JointId(1)).is_none());
    }

    #[test]
    fn mutual_pair_needs_one_forced_removal() {
        let mut dg = DependencyGraph::new();
        dg.add_node(dg_node(0));
        dg.add_node(dg_node(1));
        dg.add_dependency(JointId(0), JointId(1)).unwrap();
        dg.add_dependency(JointId(1), JointId(0)).unwrap();

        let mut order = Vec::new();
        while !dg.is_empty() {
            let ready = dg.ready().unwrap();
            if ready.is_empty() {
                dg.break_cycle().unwrap();
                continue;
            }
            for v in ready {
                order.push(dg.remove(v).unwrap().joint);
            }
        }
        assert_eq!(dg.forced_removals(), 1);
        assert_eq!(order, vec![JointId(1), JointId(0)]);
    }

    #[test]
    fn three_cycle_is_broken_without_a_mutual_pair() {
        let mut dg = DependencyGraph::new();
        for j in 0..3 {
            dg.add_node(dg_node(j));
        }
        for j in 0..3 {
            dg.add_dependency(JointId(j), JointId((j + 1) % 3)).unwrap();
        }
        assert!(dg.ready().unwrap().is_empty());
        dg.break_cycle().unwrap();
        assert_eq!(dg.forced_removals(), 1);
        assert_eq!(dg.ready().unwrap().len(), 1);
    }

    #[test]
    fn edgeless_stall_is_an_error() {
        let mut dg = DependencyGraph::new();
        assert!(matches!(dg.break_cycle(), Err(Error::UnresolvedDependencyCycle(_))));
    }
}
