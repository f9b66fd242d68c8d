//! Shape fixtures shared by the end-to-end tests.

#![allow(dead_code)]

use shock_gsg::model::{BoundaryInfo, BoundaryPoint, FluxPoint, Point, Vector};
use shock_gsg::SkeletalGraph;

/// Straight branch from `a` to `b` sampled every unit with radius `r`.
/// Side one is on the left of the flow.
pub fn straight(a: Point, b: Point, r: f64) -> (Vec<FluxPoint>, Vec<BoundaryInfo>) {
    let n = (a.dist(b).round() as usize).max(1) + 1;
    let dir = (b - a).normalized().unwrap_or(Vector::new(1.0, 0.0));
    let left = dir.rotate(std::f64::consts::FRAC_PI_2);
    let mut fps = Vec::with_capacity(n);
    let mut bis: Vec<BoundaryInfo> = Vec::with_capacity(n);
    for k in 0..n {
        let p = a.lerp(b, k as f64 / (n - 1) as f64);
        fps.push(FluxPoint::new(p, r));
        let mut bi = BoundaryInfo {
            first: BoundaryPoint::new(p + left * r, -1),
            second: BoundaryPoint::new(p - left * r, -1),
            ..Default::default()
        };
        if let Some(prev) = bis.last() {
            let d = p.dist(fps[k - 1].p);
            bi.cum_axis_dist = prev.cum_axis_dist + d;
            bi.first.cum_bndry_dist = prev.first.cum_bndry_dist + d;
            bi.second.cum_bndry_dist = prev.second.cum_bndry_dist + d;
        }
        bis.push(bi);
    }
    (fps, bis)
}

/// One branch between two free ends.
pub fn bar(len: f64) -> SkeletalGraph {
    let mut g = SkeletalGraph::new(Vec::new());
    let a = g.add_joint(Point::new(0.0, 0.0), 2.0);
    let b = g.add_joint(Point::new(len, 0.0), 2.0);
    let (fps, bis) = straight(Point::new(0.0, 0.0), Point::new(len, 0.0), 2.0);
    g.add_branch(a, b, fps, bis).unwrap();
    g
}

/// Three equally thick arms of length ten leaving `J0` at the origin:
/// `B0` towards -x, `B1` towards +x, `B2` towards +y.
pub fn star() -> SkeletalGraph {
    let mut g = SkeletalGraph::new(Vec::new());
    let c = g.add_joint(Point::new(0.0, 0.0), 3.0);
    for end in [Point::new(-10.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)] {
        let j = g.add_joint(end, 3.0);
        let (fps, bis) = straight(Point::new(0.0, 0.0), end, 3.0);
        g.add_branch(c, j, fps, bis).unwrap();
    }
    g
}

/// Spoke data from explicit spoke end points, with cumulative distances.
fn infos(fps: &[FluxPoint], spokes: &[(Point, Point)]) -> Vec<BoundaryInfo> {
    let mut out: Vec<BoundaryInfo> = Vec::new();
    for (i, (fp, &(one, two))) in fps.iter().zip(spokes).enumerate() {
        let mut bi = BoundaryInfo {
            first: BoundaryPoint::new(one, -1),
            second: BoundaryPoint::new(two, -1),
            ..Default::default()
        };
        if let Some(prev) = out.last() {
            bi.cum_axis_dist = prev.cum_axis_dist + fp.p.dist(fps[i - 1].p);
            bi.first.cum_bndry_dist = prev.first.cum_bndry_dist + one.dist(prev.first.pt);
            bi.second.cum_bndry_dist = prev.second.cum_bndry_dist + two.dist(prev.second.pt);
        }
        out.push(bi);
    }
    out
}

/// A bar of radius four along the x axis, from `J1` at (-12, 0) to `J2`
/// at (12, 0), with a thin stem rising from `J0` at the origin to `J3`.
/// The stem is a ligature at `J0`, so the bar is merged through it.
pub fn tee() -> SkeletalGraph {
    let mut g = SkeletalGraph::new(Vec::new());
    let c = g.add_joint(Point::new(0.0, 0.0), 4.0);
    let l = g.add_joint(Point::new(-12.0, 0.0), 4.0);
    let r = g.add_joint(Point::new(12.0, 0.0), 4.0);
    let t = g.add_joint(Point::new(0.0, 12.0), 1.0);

    let fps: Vec<FluxPoint> = (0..13).map(|k| FluxPoint::new(Point::new(-(k as f64), 0.0), 4.0)).collect();
    let spokes: Vec<(Point, Point)> = (0..13)
        .map(|k| {
            let x = -(k as f64);
            (Point::new(x, -4.0), Point::new(if k == 0 { -1.0 } else { x }, 4.0))
        })
        .collect();
    let bis = infos(&fps, &spokes);
    g.add_branch(c, l, fps, bis).unwrap();

    let fps: Vec<FluxPoint> = (0..13).map(|k| FluxPoint::new(Point::new(k as f64, 0.0), 4.0)).collect();
    let spokes: Vec<(Point, Point)> = (0..13)
        .map(|k| {
            let x = k as f64;
            (Point::new(if k == 0 { 1.0 } else { x }, 4.0), Point::new(x, -4.0))
        })
        .collect();
    let bis = infos(&fps, &spokes);
    g.add_branch(c, r, fps, bis).unwrap();

    let radius = |k: usize| match k {
        0 => 4.0,
        1 => 3.0,
        2 => 2.0,
        3 => 1.5,
        _ => 1.0,
    };
    let fps: Vec<FluxPoint> = (0..13).map(|k| FluxPoint::new(Point::new(0.0, k as f64), radius(k))).collect();
    let spokes: Vec<(Point, Point)> = (0..13)
        .map(|k| {
            let y = (k as f64).max(4.0);
            (Point::new(-1.0, y), Point::new(1.0, y))
        })
        .collect();
    let bis = infos(&fps, &spokes);
    g.add_branch(c, t, fps, bis).unwrap();
    g
}
