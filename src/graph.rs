//! Arena-backed directed multigraph.
//!
//! Nodes and edges are addressed by generational handles. Deleting an
//! element bumps its slot generation and returns the slot to a free list,
//! so a stale handle is detected instead of aliasing a newer element.
//!
//! Iteration over nodes, edges and adjacency lists follows insertion order.
//! `move_edge` appends the edge to the adjacency list it moves into, the
//! same as deleting and re-inserting it.
//!
//! ## Limitations
//!
//! - **No parallel-edge merging**: duplicate edges are kept as distinct edges.
//! - **Linear adjacency removal**: removing an edge from an adjacency list
//!   scans the list. Degrees in a GSG are small, so this is not indexed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Handle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIx {
    index: u32,
    generation: u32,
}

/// Handle of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeIx {
    index: u32,
    generation: u32,
}

impl NodeIx {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl EdgeIx {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for NodeIx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.index)
    }
}

impl std::fmt::Display for EdgeIx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.index)
    }
}

#[derive(Debug, Clone)]
struct NodeEntry<N> {
    weight: N,
    seq: u64,
    out: Vec<EdgeIx>,
    inc: Vec<EdgeIx>,
}

#[derive(Debug, Clone)]
struct EdgeEntry<E> {
    weight: E,
    seq: u64,
    source: NodeIx,
    target: NodeIx,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

/// Directed multigraph with node weights `N` and edge weights `E`.
#[derive(Debug, Clone)]
pub struct Graph<N, E> {
    nodes: Vec<Slot<NodeEntry<N>>>,
    edges: Vec<Slot<EdgeEntry<E>>>,
    free_nodes: Vec<u32>,
    free_edges: Vec<u32>,
    node_order: BTreeMap<u64, NodeIx>,
    edge_order: BTreeMap<u64, EdgeIx>,
    next_seq: u64,
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> Graph<N, E> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            free_nodes: Vec::new(),
            free_edges: Vec::new(),
            node_order: BTreeMap::new(),
            edge_order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let s = self.next_seq;
        self.next_seq += 1;
        s
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn add_node(&mut self, weight: N) -> NodeIx {
        let seq = self.bump_seq();
        let entry = NodeEntry { weight, seq, out: Vec::new(), inc: Vec::new() };
        let v = match self.free_nodes.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                slot.entry = Some(entry);
                NodeIx { index, generation: slot.generation }
            }
            None => {
                let index = self.nodes.len() as u32;
                self.nodes.push(Slot { generation: 0, entry: Some(entry) });
                NodeIx { index, generation: 0 }
            }
        };
        self.node_order.insert(seq, v);
        v
    }

    fn node_entry(&self, v: NodeIx) -> Result<&NodeEntry<N>> {
        self.nodes
            .get(v.index())
            .filter(|s| s.generation == v.generation)
            .and_then(|s| s.entry.as_ref())
            .ok_or_else(|| Error::NotFound(format!("node {v}")))
    }

    fn node_entry_mut(&mut self, v: NodeIx) -> Result<&mut NodeEntry<N>> {
        self.nodes
            .get_mut(v.index())
            .filter(|s| s.generation == v.generation)
            .and_then(|s| s.entry.as_mut())
            .ok_or_else(|| Error::NotFound(format!("node {v}")))
    }

    pub fn contains_node(&self, v: NodeIx) -> bool {
        self.node_entry(v).is_ok()
    }

    pub fn node(&self, v: NodeIx) -> Result<&N> {
        self.node_entry(v).map(|e| &e.weight)
    }

    pub fn node_mut(&mut self, v: NodeIx) -> Result<&mut N> {
        self.node_entry_mut(v).map(|e| &mut e.weight)
    }

    pub fn out_edges(&self, v: NodeIx) -> Result<&[EdgeIx]> {
        self.node_entry(v).map(|e| e.out.as_slice())
    }

    pub fn in_edges(&self, v: NodeIx) -> Result<&[EdgeIx]> {
        self.node_entry(v).map(|e| e.inc.as_slice())
    }

    pub fn out_degree(&self, v: NodeIx) -> Result<usize> {
        self.out_edges(v).map(<[EdgeIx]>::len)
    }

    pub fn in_degree(&self, v: NodeIx) -> Result<usize> {
        self.in_edges(v).map(<[EdgeIx]>::len)
    }

    /// Removes `v` together with every incident edge.
    pub fn delete_node(&mut self, v: NodeIx) -> Result<N> {
        let (out, inc) = {
            let e = self.node_entry(v)?;
            (e.out.clone(), e.inc.clone())
        };
        for e in out.into_iter().chain(inc) {
            // self-loops appear in both lists
            if self.contains_edge(e) {
                self.delete_edge(e)?;
            }
        }
        let slot = &mut self.nodes[v.index()];
        let entry = slot
            .entry
            .take()
            .ok_or_else(|| Error::NotFound(format!("node {v}")))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_nodes.push(v.index);
        self.node_order.remove(&entry.seq);
        Ok(entry.weight)
    }

    /// Node handles in insertion order.
    pub fn node_indices(&self) -> Vec<NodeIx> {
        self.node_order.values().copied().collect()
    }

    /// Nodes with their weights, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIx, &N)> + '_ {
        self.node_order
            .values()
            .filter_map(move |&v| self.node(v).ok().map(|w| (v, w)))
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_order.is_empty()
    }

    // ========================================================================
    // Edges
    // ========================================================================

    pub fn add_edge(&mut self, source: NodeIx, target: NodeIx, weight: E) -> Result<EdgeIx> {
        self.node_entry(source)?;
        self.node_entry(target)?;
        let seq = self.bump_seq();
        let entry = EdgeEntry { weight, seq, source, target };
        let e = match self.free_edges.pop() {
            Some(index) => {
                let slot = &mut self.edges[index as usize];
                slot.entry = Some(entry);
                EdgeIx { index, generation: slot.generation }
            }
            None => {
                let index = self.edges.len() as u32;
                self.edges.push(Slot { generation: 0, entry: Some(entry) });
                EdgeIx { index, generation: 0 }
            }
        };
        self.node_entry_mut(source)?.out.push(e);
        self.node_entry_mut(target)?.inc.push(e);
        self.edge_order.insert(seq, e);
        Ok(e)
    }

    fn edge_entry(&self, e: EdgeIx) -> Result<&EdgeEntry<E>> {
        self.edges
            .get(e.index())
            .filter(|s| s.generation == e.generation)
            .and_then(|s| s.entry.as_ref())
            .ok_or_else(|| Error::NotFound(format!("edge {e}")))
    }

    pub fn contains_edge(&self, e: EdgeIx) -> bool {
        self.edge_entry(e).is_ok()
    }

    pub fn edge(&self, e: EdgeIx) -> Result<&E> {
        self.edge_entry(e).map(|x| &x.weight)
    }

    pub fn edge_mut(&mut self, e: EdgeIx) -> Result<&mut E> {
        self.edges
            .get_mut(e.index())
            .filter(|s| s.generation == e.generation)
            .and_then(|s| s.entry.as_mut())
            .map(|x| &mut x.weight)
            .ok_or_else(|| Error::NotFound(format!("edge {e}")))
    }

    pub fn source(&self, e: EdgeIx) -> Result<NodeIx> {
        self.edge_entry(e).map(|x| x.source)
    }

    pub fn target(&self, e: EdgeIx) -> Result<NodeIx> {
        self.edge_entry(e).map(|x| x.target)
    }

    /// Re-attaches `e` so that it runs from `source` to `target`.
    pub fn move_edge(&mut self, e: EdgeIx, source: NodeIx, target: NodeIx) -> Result<()> {
        self.node_entry(source)?;
        self.node_entry(target)?;
        let (old_source, old_target) = {
            let x = self.edge_entry(e)?;
            (x.source, x.target)
        };
        if old_source != source {
            self.node_entry_mut(old_source)?.out.retain(|&x| x != e);
            self.node_entry_mut(source)?.out.push(e);
        }
        if old_target != target {
            self.node_entry_mut(old_target)?.inc.retain(|&x| x != e);
            self.node_entry_mut(target)?.inc.push(e);
        }
        let slot = &mut self.edges[e.index()];
        if let Some(x) = slot.entry.as_mut() {
            x.source = source;
            x.target = target;
        }
        Ok(())
    }

    pub fn delete_edge(&mut self, e: EdgeIx) -> Result<E> {
        let (source, target) = {
            let x = self.edge_entry(e)?;
            (x.source, x.target)
        };
        self.node_entry_mut(source)?.out.retain(|&x| x != e);
        self.node_entry_mut(target)?.inc.retain(|&x| x != e);
        let slot = &mut self.edges[e.index()];
        let entry = slot
            .entry
            .take()
            .ok_or_else(|| Error::NotFound(format!("edge {e}")))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_edges.push(e.index);
        self.edge_order.remove(&entry.seq);
        Ok(entry.weight)
    }

    /// Edge handles in insertion order.
    pub fn edge_indices(&self) -> Vec<EdgeIx> {
        self.edge_order.values().copied().collect()
    }

    /// Edges with their endpoints and weights, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIx, NodeIx, NodeIx, &E)> + '_ {
        self.edge_order.values().filter_map(move |&e| {
            self.edge_entry(e).ok().map(|x| (e, x.source, x.target, &x.weight))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edge_order.len()
    }
}
