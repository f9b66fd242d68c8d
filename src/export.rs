//! Text and JSON dumps of a GSG and of its dependency graph.
//!
//! The text format is line oriented, one line per node and per edge, with
//! `//` header lines:
//!
//! ```text
//! // GSG dump
//! // Nodes: 4
//! // Edges: 3
//! n0 BRANCH segments=[B0:[0--12]] gaps=[] fixed=S0
//! n3 ATTACHMENT joint=J0
//! e2 n3 -> n2 A joint=J0 ligature=B2:[0--3]@J0 r=0.25 side=2 position=14
//! ```
//!
//! Construction emits both dumps at `debug` level when
//! `GsgParams::dump_gsg` / `dump_dependency_graph` are set.

use std::io::Write;

use serde_json::{Value, json};

use crate::Result;
use crate::gsg::{DependencyGraph, Gsg, GsgEdge, GsgNode};
use crate::segment::BranchSegmentList;

/// Writes the nodes and edges of `gsg`, in insertion order.
pub fn write_text_dump(gsg: &Gsg<'_>, writer: &mut dyn Write) -> Result<()> {
    let graph = gsg.graph();
    writeln!(writer, "// GSG dump")?;
    writeln!(writer, "// Nodes: {}", graph.node_count())?;
    writeln!(writer, "// Edges: {}", graph.edge_count())?;

    for (v, node) in graph.nodes() {
        writeln!(writer, "{v} {}", format_node(node))?;
    }
    for (e, s, t, edge) in graph.edges() {
        writeln!(writer, "{e} {s} -> {t} {}", format_edge(edge))?;
    }
    Ok(())
}

/// Writes every joint of `dg` with its partition, then every pending
/// dependency as `joint -> prerequisite`.
pub fn write_dependency_dump(dg: &DependencyGraph, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "// GSG dependency graph")?;
    writeln!(writer, "// Joints: {}", dg.len())?;
    writeln!(writer, "// Dependencies: {}", dg.dependency_count())?;

    for (_, n) in dg.nodes() {
        writeln!(
            writer,
            "{} {} lig=[{}] non_lig=[{}]",
            n.joint,
            n.kind,
            join(n.lig.iter()),
            join(n.non_lig.iter())
        )?;
    }
    for (joint, on) in dg.dependencies() {
        writeln!(writer, "{joint} -> {on}")?;
    }
    Ok(())
}

/// The GSG as `{"nodes": [...], "edges": [...]}`.
pub fn to_json(gsg: &Gsg<'_>) -> Result<Value> {
    let graph = gsg.graph();
    let mut nodes = Vec::with_capacity(graph.node_count());
    for (v, node) in graph.nodes() {
        nodes.push(json!({
            "id": v.to_string(),
            "kind": node.kind.to_string(),
            "joint": node.joint.map(|j| j.to_string()),
            "segments": serde_json::to_value(&node.segments)?,
            "broken": node.is_broken(),
            "fixed": node.fixed_branch().map(|k| k.to_string()),
        }));
    }

    let mut edges = Vec::with_capacity(graph.edge_count());
    for (e, s, t, edge) in graph.edges() {
        let ligature = match edge.ligature() {
            Some(ls) => json!({
                "branch": ls.branch().to_string(),
                "first": ls.seg.start(),
                "last": ls.seg.end(),
                "empty": ls.is_empty(),
                "radius_ratio": ls.radius_ratio,
            }),
            None => Value::Null,
        };
        edges.push(json!({
            "id": e.to_string(),
            "source": s.to_string(),
            "target": t.to_string(),
            "kind": edge.kind.to_string(),
            "joint": edge.joint.map(|j| j.to_string()),
            "side": edge.side.map(|s| s.number()),
            "position": edge.position,
            "ligature": ligature,
        }));
    }
    Ok(json!({ "nodes": nodes, "edges": edges }))
}

fn format_node(node: &GsgNode) -> String {
    let mut out = node.kind.to_string();
    if let Some(j) = node.joint {
        out.push_str(&format!(" joint={j}"));
    }
    if !node.segments.is_empty() {
        out.push_str(&format!(" {}", format_segments(&node.segments)));
    }
    if node.is_broken() {
        out.push_str(" broken");
    }
    if let Some(key) = node.fixed_branch() {
        out.push_str(&format!(" fixed={key}"));
    }
    out
}

fn format_segments(list: &BranchSegmentList) -> String {
    let gaps: Vec<String> = list.gaps().iter().map(|g| format!("[{}]", join(g.iter()))).collect();
    format!("segments=[{}] gaps=[{}]", join(list.segments().iter()), gaps.join(", "))
}

fn format_edge(edge: &GsgEdge) -> String {
    let mut out = edge.kind.to_string();
    if let Some(j) = edge.joint {
        out.push_str(&format!(" joint={j}"));
    }
    if let Some(ls) = edge.ligature() {
        out.push_str(&format!(" ligature={ls}"));
    }
    if let Some(s) = edge.side {
        out.push_str(&format!(" side={}", s.number()));
    }
    if let Some(p) = edge.position {
        out.push_str(&format!(" position={p}"));
    }
    out
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|x| x.to_string()).collect::<Vec<_>>().join(", ")
}
