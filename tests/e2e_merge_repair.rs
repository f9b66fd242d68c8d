//! End-to-end tests for branch merging and branch repair.
//!
//! Merges are driven both by construction (the tee) and by hand on a
//! finished junction graph; repairs are checked through the fixed branch
//! they leave on the node.

mod common;

use pretty_assertions::assert_eq;
use shock_gsg::model::{BranchId, JointId, Point};
use shock_gsg::{BranchKey, EdgeKind, Error, Gsg, GsgParams, NodeKind, Side};

fn key(i: usize) -> BranchKey {
    BranchKey::Skeletal(BranchId(i))
}

// ============================================================================
// 1. Merge: two branch nodes become one broken node
// ============================================================================

#[test]
fn test_merge_creates_an_attachment_node() {
    let g = common::star();
    let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
    let u = gsg.node_for_branch(key(0)).unwrap();
    let v = gsg.node_for_branch(key(1)).unwrap();
    let w = gsg.node_for_branch(key(2)).unwrap();
    let j = gsg.nodes_of_kind(NodeKind::Junction)[0];
    assert_eq!(gsg.graph().out_degree(u).unwrap(), 0);
    assert_eq!(gsg.graph().out_degree(v).unwrap(), 0);

    let (a, gap) = gsg.merge_branch_nodes(u, v, JointId(0)).unwrap();
    assert_eq!(gap, 0);
    assert!(!gsg.graph().contains_node(v));
    assert!(gsg.node(u).unwrap().is_broken());
    assert_eq!(gsg.node(a).unwrap().kind, NodeKind::Attachment);
    assert_eq!(gsg.node(a).unwrap().joint, Some(JointId(0)));

    let out = gsg.graph().out_edges(u).unwrap().to_vec();
    assert_eq!(out.len(), 1);
    assert_eq!(gsg.graph().target(out[0]).unwrap(), a);
    assert_eq!(gsg.edge(out[0]).unwrap().kind, EdgeKind::Empty);

    // The junction edge of v now ends at u.
    let targets: Vec<_> = gsg
        .graph()
        .out_edges(j)
        .unwrap()
        .iter()
        .map(|&e| gsg.graph().target(e).unwrap())
        .collect();
    assert_eq!(targets.iter().filter(|&&t| t == u).count(), 2);
    assert!(targets.contains(&w));
    assert_eq!(gsg.node_for_branch(key(1)), Some(u));
}

#[test]
fn test_merge_keeps_the_flow_continuous() {
    let g = common::star();
    let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
    let u = gsg.node_for_branch(key(0)).unwrap();
    let v = gsg.node_for_branch(key(1)).unwrap();
    gsg.merge_branch_nodes(u, v, JointId(0)).unwrap();

    let node = gsg.node(u).unwrap();
    assert_eq!(node.segments.len(), 2);
    assert_eq!(node.segments.gaps().len(), 1);
    let first = node.segments.first_xy(gsg.store()).unwrap();
    let last = node.segments.last_xy(gsg.store()).unwrap();
    let mut ends = [first, last];
    ends.sort_by(|p, q| p.x.total_cmp(&q.x));
    assert_eq!(ends, [Point::new(-10.0, 0.0), Point::new(10.0, 0.0)]);
    assert_eq!(
        node.segments.endpoints(gsg.store()).map(|(a, b)| {
            let mut e = [a, b];
            e.sort();
            e
        }).unwrap(),
        [JointId(1), JointId(2)]
    );
}

#[test]
fn test_merge_refuses_non_branch_nodes() {
    let g = common::star();
    let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
    let j = gsg.nodes_of_kind(NodeKind::Junction)[0];
    let u = gsg.node_for_branch(key(0)).unwrap();
    assert!(matches!(
        gsg.merge_branch_nodes(j, u, JointId(0)),
        Err(Error::StructuralInvariantViolation { .. })
    ));
}

// ============================================================================
// 2. Repair: the fixed branch runs from joint to joint
// ============================================================================

#[test]
fn test_repair_after_manual_merge() {
    let g = common::star();
    let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
    let u = gsg.node_for_branch(key(0)).unwrap();
    let v = gsg.node_for_branch(key(1)).unwrap();
    gsg.merge_branch_nodes(u, v, JointId(0)).unwrap();
    gsg.fix_broken_branch(u).unwrap();

    let node = gsg.node(u).unwrap();
    assert!(!node.is_broken());
    assert!(node.has_fixed_branch());
    assert_eq!(node.gap_axes().len(), 1);
    assert_eq!(gsg.store().synthetic_count(), 1);

    let b = gsg.branch(node.fixed_branch().unwrap());
    let ends = [b.first_point(), b.last_point()];
    assert!(ends.contains(&Point::new(-10.0, 0.0)));
    assert!(ends.contains(&Point::new(10.0, 0.0)));
    for fp in &b.flux_points {
        assert!(fp.p.y.abs() < 1e-6, "{} left the axis", fp.p);
    }

    // A second repair has nothing to do.
    gsg.fix_broken_branch(u).unwrap();
    assert_eq!(gsg.store().synthetic_count(), 1);
}

#[test]
fn test_tee_bar_is_repaired_across_the_stem() {
    let g = common::tee();
    let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
    let bar = gsg.node_for_branch(key(0)).unwrap();
    let node = gsg.node(bar).unwrap();
    let b = gsg.branch(node.fixed_branch().unwrap());

    assert_eq!(b.first_point(), g.joint(b.n1).fp.p);
    assert_eq!(b.last_point(), g.joint(b.n2).fp.p);
    let mut ends = [b.n1, b.n2];
    ends.sort();
    assert_eq!(ends, [JointId(1), JointId(2)]);

    assert_eq!(b.flux_points.len(), b.boundary_info.len());
    for w in b.flux_points.windows(2) {
        assert!(w[0].p.dist(w[1].p) <= 1.5);
    }
    for w in b.boundary_info.windows(2) {
        assert!(w[1].cum_axis_dist > w[0].cum_axis_dist);
    }
    let e = node.segments.gaps()[0][0];
    let edge = gsg.edge(e).unwrap();
    let pos = edge.position.unwrap();
    assert!(pos < b.flux_points.len());
    assert!(b.flux_points[pos].p.dist(Point::new(0.0, 0.0)) <= 1.0);
}

#[test]
fn test_stem_side_matches_the_flow() {
    let g = common::tee();
    let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
    let bar = gsg.node_for_branch(key(0)).unwrap();
    let node = gsg.node(bar).unwrap();
    let b = gsg.branch(node.fixed_branch().unwrap());

    let e = node.segments.gaps()[0][0];
    let side = gsg.edge(e).unwrap().side.unwrap();
    // The stem rises along +y; it is on the left of the flow when the
    // repaired bar runs towards +x.
    let expected = if b.last_point().x > b.first_point().x { Side::One } else { Side::Two };
    assert_eq!(side, expected);
}

// ============================================================================
// 3. Known-side boundary restoration
// ============================================================================

#[test]
fn test_known_points_restoration_keeps_the_repair_sound() {
    let g = common::tee();
    let params = GsgParams { use_known_pts_to_restore_boundary: true, ..GsgParams::default() };
    let gsg = Gsg::create(&g, params).unwrap();
    let bar = gsg.node_for_branch(key(0)).unwrap();
    let b = gsg.branch(gsg.node(bar).unwrap().fixed_branch().unwrap());
    assert_eq!(b.first_point(), g.joint(b.n1).fp.p);
    assert_eq!(b.last_point(), g.joint(b.n2).fp.p);
    for bi in &b.boundary_info {
        for side in Side::BOTH {
            let p = bi.side(side).pt;
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }
}
