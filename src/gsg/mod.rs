//! # Generalized Skeletal Graph
//!
//! Groups the branches of a medial-axis graph into the parts they belong
//! to. Every joint of degree three or more is labelled:
//!
//! | Kind | Meaning | Effect |
//! |------|---------|--------|
//! | `Junction` | real meeting of parts | one node, edges to every branch |
//! | `Attachment` | a part blended into a continuing parent | the two parent pieces are merged |
//! | `Crossing` | no two branches continue each other | one node, every branch attaches |
//!
//! Merged branch nodes are *broken* until their pieces are rejoined by a
//! *fixed* branch whose gaps are bridged with cubic Bézier curves.
//!
//! ## Construction
//!
//! 1. Label every joint and build the [`DependencyGraph`].
//! 2. Create one `Branch` node per skeletal branch.
//! 3. Repeatedly process the joints with no pending dependency, breaking
//!    one mutual dependency whenever no joint is ready.
//! 4. Repair every node that is still broken.
//!
//! ## Edges
//!
//! | Kind | Shown | From → To |
//! |------|-------|-----------|
//! | `Empty` | `N` | branch → attachment/crossing |
//! | `Junction` | `J` | junction → branch |
//! | `Ligature` | `A` | junction/attachment/crossing → attached branch |
//!
//! ## Limitations
//!
//! - **No crossing detection through a middle branch**: a joint is a
//!   crossing only when its degree exceeds three and fewer than two of its
//!   branches are non-ligature.
//! - **Single-threaded**: a `Gsg` borrows its skeleton and is built in place.

mod classify;
mod dependency;
mod interpolate;
mod merge;
mod process;
mod repair;

pub use classify::JointLabel;
pub use dependency::{DependencyGraph, DependencyNode};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::boundary::{BoundaryPointFinder, NearestBoundaryFinder};
use crate::geometry::CubicBezier;
use crate::graph::{EdgeIx, Graph, NodeIx};
use crate::ligature::{LigatureAnalyzer, LigatureContext, LigatureSegment, SpokeLigatureAnalyzer};
use crate::model::{Branch, GsgParams, JointId, LigatureParams, Side, SkeletalGraph};
use crate::segment::{BranchKey, BranchSegment, BranchSegmentList, BranchStore, endpoint_info};
use crate::{Error, Result};

// ============================================================================
// Node and edge payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Branch,
    Junction,
    Attachment,
    Crossing,
    /// Only used to type degree-one joints in the dependency graph.
    Endpoint,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeKind::Branch => "BRANCH",
            NodeKind::Junction => "JUNCTION",
            NodeKind::Attachment => "ATTACHMENT",
            NodeKind::Crossing => "CROSSING",
            NodeKind::Endpoint => "ENDPOINT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Empty,
    Junction,
    Ligature,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeKind::Empty => "N",
            EdgeKind::Junction => "J",
            EdgeKind::Ligature => "A",
        };
        f.write_str(s)
    }
}

/// A GSG node.
///
/// `Branch` nodes own an ordered [`BranchSegmentList`]; the other kinds
/// only record their joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsgNode {
    pub kind: NodeKind,
    pub joint: Option<JointId>,
    pub segments: BranchSegmentList,
    gap_axes: Vec<CubicBezier>,
    broken: bool,
    fixed: Option<BranchKey>,
}

impl GsgNode {
    pub fn branch(seg: BranchSegment) -> Self {
        Self {
            kind: NodeKind::Branch,
            joint: None,
            segments: BranchSegmentList::new(seg),
            gap_axes: Vec::new(),
            broken: false,
            fixed: None,
        }
    }

    pub fn at_joint(kind: NodeKind, joint: JointId) -> Self {
        Self {
            kind,
            joint: Some(joint),
            segments: BranchSegmentList::default(),
            gap_axes: Vec::new(),
            broken: false,
            fixed: None,
        }
    }

    /// Curves that bridged each gap in the last repair.
    pub fn gap_axes(&self) -> &[CubicBezier] {
        &self.gap_axes
    }

    #[inline]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// The last fixed branch, even if the node broke again since.
    pub fn fixed_branch(&self) -> Option<BranchKey> {
        self.fixed
    }

    pub fn has_fixed_branch(&self) -> bool {
        !self.broken && self.fixed.is_some()
    }

    /// The fixed branch if there is a valid one, else the branch of the
    /// first segment.
    pub fn current_branch(&self) -> Option<BranchKey> {
        if self.has_fixed_branch() {
            self.fixed
        } else {
            self.segments.front().map(|s| s.branch)
        }
    }

    pub fn set_broken(&mut self) {
        self.broken = true;
    }

    pub fn set_fixed(&mut self, key: BranchKey) {
        self.fixed = Some(key);
        self.broken = false;
    }

    /// Removes the part of a segment swallowed by an attachment gap.
    ///
    /// `ls` is expressed over an original branch, so a fixed branch can no
    /// longer describe the node and it becomes broken.
    pub fn subtract_gap_ligature(&mut self, ls: &LigatureSegment) -> Result<()> {
        if self.has_fixed_branch() {
            self.set_broken();
        }
        self.segments.subtract_interval(&ls.seg)
    }
}

/// A GSG edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsgEdge {
    pub kind: EdgeKind,
    /// Joint the edge was created at.
    pub joint: Option<JointId>,
    /// Side of the attachment with respect to the source branch.
    pub side: Option<Side>,
    /// Index of the attachment point in the source's fixed branch.
    pub position: Option<usize>,
    ligature: Option<LigatureSegment>,
}

impl GsgEdge {
    pub fn new(kind: EdgeKind, joint: Option<JointId>, ligature: Option<LigatureSegment>) -> Self {
        Self { kind, joint, side: None, position: None, ligature }
    }

    /// The ligature as last stored. It may refer to a branch the target
    /// node has replaced since; [`Gsg::ligature_info`] refreshes it first.
    pub fn ligature(&self) -> Option<&LigatureSegment> {
        self.ligature.as_ref()
    }
}

// ============================================================================
// Gsg
// ============================================================================

/// A generalized skeletal graph over a borrowed [`SkeletalGraph`].
pub struct Gsg<'s> {
    params: GsgParams,
    lig_params: LigatureParams,
    store: BranchStore<'s>,
    graph: Graph<GsgNode, GsgEdge>,
    branch_nodes: HashMap<BranchKey, NodeIx>,
    /// Nodes whose repair is in progress.
    repairing: HashSet<NodeIx>,
    analyzer: Box<dyn LigatureAnalyzer + 's>,
    finder: Box<dyn BoundaryPointFinder + 's>,
}

impl std::fmt::Debug for Gsg<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gsg")
            .field("params", &self.params)
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("synthetic_branches", &self.store.synthetic_count())
            .finish()
    }
}

impl<'s> Gsg<'s> {
    /// Builds the GSG of `skeleton` with the default collaborators.
    pub fn create(skeleton: &'s SkeletalGraph, params: GsgParams) -> Result<Self> {
        GsgBuilder::new(skeleton).params(params).build()
    }

    pub fn builder(skeleton: &'s SkeletalGraph) -> GsgBuilder<'s> {
        GsgBuilder::new(skeleton)
    }

    pub fn params(&self) -> &GsgParams {
        &self.params
    }

    pub fn ligature_params(&self) -> &LigatureParams {
        &self.lig_params
    }

    pub fn store(&self) -> &BranchStore<'s> {
        &self.store
    }

    pub fn skeleton(&self) -> &'s SkeletalGraph {
        self.store.skeleton()
    }

    pub fn graph(&self) -> &Graph<GsgNode, GsgEdge> {
        &self.graph
    }

    pub fn branch(&self, key: BranchKey) -> &Branch {
        self.store.get(key)
    }

    pub fn node(&self, v: NodeIx) -> Result<&GsgNode> {
        self.graph.node(v)
    }

    pub fn edge(&self, e: EdgeIx) -> Result<&GsgEdge> {
        self.graph.edge(e)
    }

    /// The branch node that currently owns `key`.
    pub fn node_for_branch(&self, key: BranchKey) -> Option<NodeIx> {
        self.branch_nodes.get(&key).copied()
    }

    /// Nodes of one kind, in insertion order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeIx> {
        self.graph.nodes().filter(|(_, n)| n.kind == kind).map(|(v, _)| v).collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeIx, NodeIx, NodeIx, &GsgEdge)> + '_ {
        self.graph.edges()
    }

    // ========================================================================
    // Adjacency queries
    // ========================================================================

    /// First out-edge of `v` whose target is a node of `kind`.
    pub fn out_edge_to(&self, v: NodeIx, kind: NodeKind) -> Result<Option<EdgeIx>> {
        for &e in self.graph.out_edges(v)? {
            if self.graph.node(self.graph.target(e)?)?.kind == kind {
                return Ok(Some(e));
            }
        }
        Ok(None)
    }

    pub fn target_of_kind(&self, v: NodeIx, kind: NodeKind) -> Result<Option<NodeIx>> {
        match self.out_edge_to(v, kind)? {
            Some(e) => Ok(Some(self.graph.target(e)?)),
            None => Ok(None),
        }
    }

    /// In-edges of `v` coming from attachment nodes; a branch is attached
    /// at most at its two ends.
    pub fn source_attachments(&self, v: NodeIx) -> Result<SmallVec<[EdgeIx; 2]>> {
        let mut out = SmallVec::new();
        for &e in self.graph.in_edges(v)? {
            if self.graph.node(self.graph.source(e)?)?.kind == NodeKind::Attachment {
                out.push(e);
            }
        }
        if out.len() > 2 {
            return Err(Error::StructuralInvariantViolation {
                context: v.to_string(),
                message: format!("{} source attachments", out.len()),
            });
        }
        Ok(out)
    }

    // ========================================================================
    // Node and edge factories
    // ========================================================================

    pub(crate) fn node_of(&self, key: BranchKey) -> Result<NodeIx> {
        self.node_for_branch(key)
            .ok_or_else(|| Error::NotFound(format!("no branch node owns {key}")))
    }

    pub(crate) fn new_branch_node(&mut self, key: BranchKey) -> NodeIx {
        let v = self.graph.add_node(GsgNode::branch(self.store.whole(key)));
        self.branch_nodes.insert(key, v);
        v
    }

    pub(crate) fn new_joint_node(&mut self, kind: NodeKind, joint: JointId) -> NodeIx {
        self.graph.add_node(GsgNode::at_joint(kind, joint))
    }

    pub(crate) fn new_edge(
        &mut self,
        source: NodeIx,
        target: NodeIx,
        kind: EdgeKind,
        joint: Option<JointId>,
        ligature: Option<LigatureSegment>,
    ) -> Result<EdgeIx> {
        self.graph.add_edge(source, target, GsgEdge::new(kind, joint, ligature))
    }

    /// A two-point branch sitting on `joint`, with the spokes of the first
    /// incident branch at that joint.
    pub(crate) fn new_branch_from_joint(&mut self, joint: JointId) -> Result<BranchKey> {
        let j = self.store.joint(joint);
        let first = *j
            .branches
            .first()
            .ok_or_else(|| Error::InvalidInput(format!("joint {joint} has no branches")))?;
        let fp = j.fp;
        let bi = endpoint_info(self.store.get(BranchKey::Skeletal(first)), joint)?;
        let b = Branch::new(joint, joint, vec![fp, fp], vec![bi, bi]);
        Ok(self.store.push(b))
    }

    pub(crate) fn ligature_context(&self) -> LigatureContext<'s> {
        LigatureContext { params: self.lig_params, contour: self.store.skeleton().contour() }
    }

    // ========================================================================
    // Bones and ligature maintenance
    // ========================================================================

    /// The ligature-free core of a repaired branch node.
    ///
    /// Every ligature that reaches the node is subtracted from its current
    /// branch. When a subtraction leaves nothing, the bone keeps the target
    /// point of that ligature, so the result is never empty.
    pub fn bone_part(&mut self, v: NodeIx) -> Result<BranchSegment> {
        let node = self.graph.node(v)?;
        if node.kind != NodeKind::Branch || node.is_broken() {
            return Err(Error::StructuralInvariantViolation {
                context: v.to_string(),
                message: format!("no bone for a {} node (broken: {})", node.kind, node.is_broken()),
            });
        }
        let mut bs = match (node.has_fixed_branch(), node.fixed_branch()) {
            (true, Some(key)) => self.store.whole(key),
            _ => match node.segments.segments() {
                [seg] => *seg,
                segs => {
                    return Err(Error::StructuralInvariantViolation {
                        context: v.to_string(),
                        message: format!("unfixed branch node with {} segments", segs.len()),
                    });
                }
            },
        };

        let in_edges = self.graph.in_edges(v)?.to_vec();
        for e in in_edges {
            let Some(ls) = self.ligature_info(e)? else {
                continue;
            };
            if ls.is_empty() {
                continue;
            }
            bs.subtract_interval(&ls.seg)?;
            if bs.is_empty() {
                tracing::debug!(node = %v, bone = %bs, "keeping the ligature target of an empty bone");
                let t = ls.target();
                bs.set_limits(t, t);
                break;
            }
        }
        Ok(bs)
    }

    /// The ligature of `e`, re-expressed over the current branch of its
    /// target node.
    pub fn ligature_info(&mut self, e: EdgeIx) -> Result<Option<LigatureSegment>> {
        self.update_ligature(e)?;
        Ok(self.graph.edge(e)?.ligature.clone())
    }

    /// Re-targets the ligature of `e` to the current branch of its target
    /// node, repairing that node first if it is broken.
    ///
    /// The ligature keeps its length and stays anchored at its joint.
    pub fn update_ligature(&mut self, e: EdgeIx) -> Result<()> {
        let target = self.graph.target(e)?;
        let Some(ls) = self.graph.edge(e)?.ligature.clone() else {
            return Ok(());
        };
        if self.graph.node(target)?.is_broken() {
            self.fix_broken_branch(target)?;
        }
        let Some(current) = self.graph.node(target)?.current_branch() else {
            return Ok(());
        };
        if current == ls.branch() {
            return Ok(());
        }

        let b = self.store.get(current);
        let jp = self.store.joint(ls.joint).fp.p;
        let (size, len) = (ls.size(), b.len());
        let mut updated = ls.clone();
        updated.seg.rebind(current, len);
        if size == 0 {
            updated.seg.set_empty();
        } else if size > len {
            return Err(Error::StructuralInvariantViolation {
                context: current.to_string(),
                message: format!("ligature of {size} points on a branch of {len}"),
            });
        } else if b.first_point() == jp {
            updated.seg.set_limits(0, size - 1);
            updated.decreasing = true;
        } else if b.last_point() == jp {
            updated.seg.set_limits(len - size, len - 1);
            updated.decreasing = false;
        } else {
            return Err(Error::StructuralInvariantViolation {
                context: current.to_string(),
                message: format!("ligature joint {} is not an end of the branch", ls.joint),
            });
        }
        self.graph.edge_mut(e)?.ligature = Some(updated);
        Ok(())
    }

    /// Grows the ligature of `e` by the adjacent segment `ls`.
    pub fn extend_ligature(&mut self, e: EdgeIx, ls: &LigatureSegment) -> Result<()> {
        self.update_ligature(e)?;
        let edge = self.graph.edge_mut(e)?;
        match edge.ligature.as_mut() {
            Some(cur) if !cur.is_empty() => {
                if cur.branch() != ls.branch() {
                    return Err(Error::StructuralInvariantViolation {
                        context: cur.branch().to_string(),
                        message: format!("cannot extend with a ligature of {}", ls.branch()),
                    });
                }
                cur.seg.extend(&ls.seg);
            }
            _ => {
                if ls.seg.start() != 0 && ls.seg.end() != ls.seg.branch_last() {
                    tracing::warn!(ligature = %ls, "ligature does not start at a branch end");
                }
                edge.ligature = Some(ls.clone());
            }
        }
        Ok(())
    }

    /// Extends the in-edge of `v` rooted at the joint of `ls`. Returns
    /// false when there is no such edge.
    pub fn extend_rooted_ligature(&mut self, v: NodeIx, ls: &LigatureSegment) -> Result<bool> {
        let in_edges = self.graph.in_edges(v)?.to_vec();
        for e in in_edges {
            if self.graph.edge(e)?.joint == Some(ls.joint) {
                self.extend_ligature(e, ls)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn remove_ligature(&mut self, e: EdgeIx) -> Result<()> {
        self.update_ligature(e)?;
        if let Some(ls) = self.graph.edge_mut(e)?.ligature.as_mut() {
            ls.seg.set_empty();
        }
        Ok(())
    }

    /// Gives a parentless junction a zero-length branch node as parent.
    pub fn add_root_branch_node_to_junction(&mut self, v: NodeIx) -> Result<NodeIx> {
        let node = self.graph.node(v)?;
        let joint = match (node.kind, node.joint) {
            (NodeKind::Junction, Some(j)) if self.graph.in_degree(v)? == 0 => j,
            _ => {
                return Err(Error::StructuralInvariantViolation {
                    context: v.to_string(),
                    message: format!("{} node with in-degree {} cannot get a root", node.kind, self.graph.in_degree(v)?),
                });
            }
        };
        let key = self.new_branch_from_joint(joint)?;
        let r = self.new_branch_node(key);
        self.new_edge(r, v, EdgeKind::Junction, Some(joint), None)?;
        Ok(r)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Configures and runs a GSG construction.
///
/// ```
/// use shock_gsg::{Gsg, GsgParams, SkeletalGraph};
///
/// let skeleton = SkeletalGraph::default();
/// let gsg = Gsg::builder(&skeleton).params(GsgParams::default()).build().unwrap();
/// assert_eq!(gsg.graph().node_count(), 0);
/// ```
pub struct GsgBuilder<'s> {
    skeleton: &'s SkeletalGraph,
    params: GsgParams,
    analyzer: Option<Box<dyn LigatureAnalyzer + 's>>,
    finder: Option<Box<dyn BoundaryPointFinder + 's>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'s> GsgBuilder<'s> {
    pub fn new(skeleton: &'s SkeletalGraph) -> Self {
        Self { skeleton, params: GsgParams::default(), analyzer: None, finder: None, cancel: None }
    }

    pub fn params(mut self, params: GsgParams) -> Self {
        self.params = params;
        self
    }

    /// Replaces the [`SpokeLigatureAnalyzer`].
    pub fn analyzer(mut self, analyzer: impl LigatureAnalyzer + 's) -> Self {
        self.analyzer = Some(Box::new(analyzer));
        self
    }

    /// Replaces the [`NearestBoundaryFinder`] over the skeleton's contour.
    pub fn boundary_finder(mut self, finder: impl BoundaryPointFinder + 's) -> Self {
        self.finder = Some(Box::new(finder));
        self
    }

    /// Construction stops with [`Error::Cancelled`] at the next dependency
    /// pass once `flag` is set.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn build(self) -> Result<Gsg<'s>> {
        self.skeleton.validate()?;
        let finder = self
            .finder
            .unwrap_or_else(|| Box::new(NearestBoundaryFinder::new(self.skeleton.contour().to_vec())));
        let mut gsg = Gsg {
            lig_params: self.params.ligature_params(),
            params: self.params,
            store: BranchStore::new(self.skeleton),
            graph: Graph::new(),
            branch_nodes: HashMap::new(),
            repairing: HashSet::new(),
            analyzer: self.analyzer.unwrap_or_else(|| Box::new(SpokeLigatureAnalyzer)),
            finder,
        };
        gsg.run(self.cancel.as_deref())?;
        Ok(gsg)
    }
}
