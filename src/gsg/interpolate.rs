//! Gap interpolation: the Bézier bridge of a skeletal gap and the boundary
//! points its new axis points lost.

use std::f64::consts::FRAC_PI_2;

use super::Gsg;
use crate::geometry::{CubicBezier, Intersection, intersect_segments, object_angle, safe_acos};
use crate::graph::EdgeIx;
use crate::ligature::LigatureSegment;
use crate::model::{BoundaryInfo, Branch, FluxPoint, Point, Side, Vector};
use crate::segment::{BranchSegment, common_joint};
use crate::{Error, Result};

/// Joint radius multiple used as the initial radius of new gap points.
const UNKNOWN_RADIUS_FACTOR: f64 = 2.0;

/// Axis and boundary points that fill one gap.
#[derive(Debug, Clone)]
pub(crate) struct GapFill {
    pub points: Vec<FluxPoint>,
    pub info: Vec<BoundaryInfo>,
    pub curve: CubicBezier,
    /// Index of the point closest to the joint of the gap.
    pub position: usize,
}

impl Gsg<'_> {
    /// The cubic that bridges `s0` and `s1`, with the flow indices of its
    /// end points on each segment.
    ///
    /// The inner control points lie where the end tangents meet the
    /// ligature line, extended up to the chord of the gap. Without a usable
    /// ligature, or when a tangent misses that line, they fall back to the
    /// middle of the chord.
    pub(crate) fn interpolation_curve(
        &self,
        s0: &BranchSegment,
        is_first: bool,
        s1: &BranchSegment,
        is_last: bool,
        lig: Option<&LigatureSegment>,
    ) -> Result<(CubicBezier, usize, usize)> {
        let (b0, b1) = (self.store.get(s0.branch), self.store.get(s1.branch));
        let joint = common_joint(b0, b1).ok_or_else(|| Error::StructuralInvariantViolation {
            context: format!("{}/{}", s0.branch, s1.branch),
            message: "gap between branches with no common joint".into(),
        })?;

        let idx0 = if !s0.is_empty() {
            s0.last()
        } else if is_first {
            s0.branch_first()
        } else {
            s0.branch_len() / 2
        };
        let idx1 = if !s1.is_empty() {
            s1.first()
        } else if is_last {
            s1.branch_last()
        } else {
            s1.branch_len() / 2
        };

        let p0 = s0.pt(b0, idx0);
        let p3 = s1.pt(b1, idx1);
        let tangent = |s: &BranchSegment, b: &Branch, f: usize, p: Point| {
            s.compute_tangent(b, f).unwrap_or_else(|err| {
                tracing::warn!(segment = %s, %err, "no tangent at gap end point");
                (p, p)
            })
        };
        let tan0 = tangent(s0, b0, idx0, p0);
        let tan1 = tangent(s1, b1, idx1, p3);
        let mid = p0 + (p3 - p0) * 0.5;

        let Some(ls) = lig.filter(|ls| !ls.is_empty()) else {
            return Ok((CubicBezier::new(p0, mid, mid, p3), idx0, idx1));
        };

        let lb = self.store.get(ls.branch());
        let (mut lp0, mut lp1) = (lb.flux_points[ls.seg.start()].p, lb.flux_points[ls.seg.end()].p);
        let lp2 = intersect_segments(p0, p3, lp0, lp1).point().unwrap_or_else(|| {
            tracing::warn!(%joint, "ligature line misses the gap chord");
            self.store.joint(joint).fp.p
        });
        if lp0.sq_dist(lp2) < lp1.sq_dist(lp2) {
            lp0 = lp2;
        } else {
            lp1 = lp2;
        }

        let control = |(a, b): (Point, Point), end: Point| match intersect_segments(a, b, lp0, lp1) {
            Intersection::Point(p) | Intersection::SecondSegment(p) if p != end => p,
            _ => mid,
        };
        let curve = CubicBezier::new(p0, control(tan0, p0), control(tan1, p3), p3);
        Ok((curve, idx0, idx1))
    }

    /// Rasterizes the bridge of the gap between `s0` and `s1` and gives
    /// every new axis point its spokes and radius.
    ///
    /// `edges` are the attachment edges hanging off the gap. Each gets the
    /// side its branch attaches on. The boundary of the attachment side is
    /// then reconstructed.
    pub(crate) fn interpolate_skeletal_gap(
        &mut self,
        s0: &BranchSegment,
        is_first: bool,
        s1: &BranchSegment,
        is_last: bool,
        edges: &[EdgeIx],
    ) -> Result<GapFill> {
        let ligs = edges.iter().map(|&e| self.ligature_info(e)).collect::<Result<Vec<_>>>()?;
        let (curve, idx0, idx1) =
            self.interpolation_curve(s0, is_first, s1, is_last, ligs.first().and_then(Option::as_ref))?;

        let max_size = 2 * (s0.right_margin_size() + s1.left_margin_size() + 2);
        let raster = curve.rasterize(max_size);

        let (b0, b1) = (self.store.get(s0.branch), self.store.get(s1.branch));
        let joint = common_joint(b0, b1).ok_or_else(|| Error::StructuralInvariantViolation {
            context: format!("{}/{}", s0.branch, s1.branch),
            message: "gap between branches with no common joint".into(),
        })?;
        let jfp = self.store.joint(joint).fp;
        let r = jfp.dist.abs() * UNKNOWN_RADIUS_FACTOR;

        let mut points: Vec<FluxPoint> = raster.points.iter().map(|&p| FluxPoint::new(p, r)).collect();
        let mut info = vec![BoundaryInfo::default(); points.len()];
        self.finder
            .assign_boundary_points(&points, &mut info, &s0.info(b0, idx0), &s1.info(b1, idx1));
        self.finder.assign_radius_values(&info, &mut points);

        let position = points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.p.sq_dist(jfp.p).total_cmp(&b.p.sq_dist(jfp.p)))
            .map_or(0, |(i, _)| i);

        let chord = curve.p3 - curve.p0;
        let mut sides = Vec::with_capacity(edges.len());
        for ls in &ligs {
            let side = ls.as_ref().map(|ls| {
                let lb = self.store.get(ls.branch());
                let away = if ls.is_empty() {
                    self.store.joint(lb.other_endpoint(ls.joint)).fp.p
                } else {
                    ls.target_point(lb)
                };
                if chord.cross(away - jfp.p) >= 0.0 { Side::One } else { Side::Two }
            });
            sides.push(side);
        }
        for (&e, &side) in edges.iter().zip(&sides) {
            self.graph.edge_mut(e)?.side = side;
        }
        let side = match sides[..] {
            [side] => side,
            _ => None,
        };

        tracing::trace!(
            %joint,
            points = points.len(),
            max_size,
            position,
            side = ?side,
            "interpolated skeletal gap"
        );
        self.interpolate_boundary_gap(side, &curve, &raster.params, &points, &mut info);
        Ok(GapFill { points, info, curve, position })
    }

    /// Places the boundary points of the attachment side of a gap.
    ///
    /// With `side` unknown both sides are attachment sides and are placed
    /// symmetrically. The radius is interpolated linearly between the two
    /// ends of the gap, and its slope gives the object angle.
    pub(crate) fn interpolate_boundary_gap(
        &self,
        side: Option<Side>,
        curve: &CubicBezier,
        params: &[f64],
        points: &[FluxPoint],
        info: &mut [BoundaryInfo],
    ) {
        let n = params.len().min(points.len()).min(info.len());
        if n < 2 {
            return;
        }
        let attach = if side == Some(Side::One) { Side::One } else { Side::Two };
        let known = attach.opposite();
        let chord = (curve.p3 - curve.p0).normalized().unwrap_or(Vector::new(1.0, 0.0));
        let unit_tangent = |u: f64| {
            curve.tangent_at(u).normalized().unwrap_or_else(|| {
                tracing::warn!(u, "null curve tangent, using the chord");
                chord
            })
        };

        if side.is_some() && self.params.use_known_pts_to_restore_boundary {
            for i in 0..n {
                let t = unit_tangent(params[i]);
                let alpha = object_angle(t, info[i].side(known).pt - points[i].p);
                let bp = info[i].side_mut(attach);
                bp.pt = points[i].p + t.rotate(-alpha) * points[i].dist;
                bp.index = -1;
            }
            return;
        }

        let (r0, rn) = (points[0].dist.abs(), points[n - 1].dist.abs());
        let (x0, xn) = (info[0].cum_axis_dist, info[n - 1].cum_axis_dist);
        let m = if x0 < xn {
            (rn - r0) / (xn - x0)
        } else {
            tracing::warn!(x0, xn, "gap has no axis length, using a flat radius");
            0.0
        };
        if !(-1.0..=1.0).contains(&m) {
            tracing::warn!(m, "slope of the radius function is too steep");
        }

        for i in 0..n {
            let mut t = unit_tangent(params[i]);
            let p = points[i].p;
            let tip = p + t;
            let forward = if i == 0 {
                tip.dist(points[1].p) < 1.0
            } else if i == n - 1 {
                tip.dist(points[n - 2].p) > 1.0
            } else {
                tip.sq_dist(points[i - 1].p) > tip.sq_dist(points[i + 1].p)
            };

            // the tangent must point towards decreasing radius
            if (forward && m > 0.0) || (!forward && m < 0.0) {
                t = -t;
            }
            let mut alpha = safe_acos(m);
            if alpha > FRAC_PI_2 {
                t = -t;
            }

            let mut v = info[i].side(known).pt - p;
            if v.is_null() {
                tracing::warn!(point = %p, "null spoke, using (1, 0)");
                v = Vector::new(1.0, 0.0);
            }
            if object_angle(t, v) > 0.0 {
                alpha = -alpha;
            }

            let radius = m * info[i].cum_axis_dist + r0;
            let bp = info[i].side_mut(attach);
            bp.pt = p + t.rotate(alpha) * radius;
            bp.index = -1;
            if side.is_none() {
                let bp = info[i].side_mut(known);
                bp.pt = p + t.rotate(-alpha) * radius;
                bp.index = -1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gsg::tests::star;
    use crate::ligature::analyzer::tests::tee;
    use crate::model::{BoundaryPoint, BranchId, GsgParams, JointId};
    use crate::segment::BranchKey;

    fn approx(a: Point, b: Point) -> bool {
        a.dist(b) < 1e-9
    }

    #[test]
    fn curve_without_ligature_is_the_chord() {
        let g = star();
        let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let mut s0 = gsg.store().whole(BranchKey::Skeletal(BranchId(1)));
        s0.toggle_inverted();
        s0.set_limits(4, 10);
        let mut s1 = gsg.store().whole(BranchKey::Skeletal(BranchId(0)));
        s1.set_limits(4, 10);

        let (c, i0, i1) = gsg.interpolation_curve(&s0, true, &s1, true, None).unwrap();
        assert_eq!((i0, i1), (s0.last(), s1.first()));
        assert!(approx(c.p0, Point::new(4.0, 0.0)));
        assert!(approx(c.p3, Point::new(-4.0, 0.0)));
        assert!(approx(c.p1, Point::new(0.0, 0.0)));
        assert_eq!(c.p1, c.p2);
    }

    #[test]
    fn empty_end_segment_starts_at_the_branch_end() {
        let g = star();
        let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let s0 = BranchSegment::empty(BranchKey::Skeletal(BranchId(1)), 11);
        let s1 = gsg.store().whole(BranchKey::Skeletal(BranchId(0)));
        let (c, i0, _) = gsg.interpolation_curve(&s0, true, &s1, true, None).unwrap();
        assert_eq!(i0, 0);
        assert!(approx(c.p0, Point::new(0.0, 0.0)));
        let (_, i0, _) = gsg.interpolation_curve(&s0, false, &s1, true, None).unwrap();
        assert_eq!(i0, 5);
    }

    #[test]
    fn tee_bridge_stays_on_the_bar() {
        let g = tee();
        let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let bar = gsg.node_for_branch(BranchKey::Skeletal(BranchId(0))).unwrap();
        let node = gsg.node(bar).unwrap();
        let c = node.gap_axes()[0];
        for p in [c.p0, c.p1, c.p2, c.p3] {
            assert!(p.y.abs() < 1e-9, "{p} is off the bar");
        }
        assert!(c.p0.x > 0.0 && c.p3.x < 0.0);
        // the flow runs towards -x, so the stem is on the right
        let e = node.segments.gaps()[0][0];
        assert_eq!(gsg.edge(e).unwrap().side, Some(Side::Two));
        assert!(gsg.edge(e).unwrap().position.is_some());
    }

    #[test]
    fn flat_radius_gives_perpendicular_spokes() {
        let g = star();
        let gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let curve = CubicBezier::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        );
        let params = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
        let points: Vec<FluxPoint> =
            (0..4).map(|k| FluxPoint::new(Point::new(k as f64, 0.0), 2.0)).collect();
        let mut info: Vec<BoundaryInfo> = (0..4)
            .map(|k| BoundaryInfo {
                cum_axis_dist: k as f64,
                first: BoundaryPoint::new(Point::new(k as f64, 2.0), 7),
                second: BoundaryPoint::new(Point::new(k as f64, -5.0), 9),
            })
            .collect();

        gsg.interpolate_boundary_gap(Some(Side::Two), &curve, &params, &points, &mut info);
        for (k, bi) in info.iter().enumerate() {
            assert!(approx(bi.second.pt, Point::new(k as f64, -2.0)), "{}", bi.second.pt);
            assert_eq!(bi.second.index, -1);
            assert_eq!(bi.first.index, 7);
        }

        gsg.interpolate_boundary_gap(None, &curve, &params, &points, &mut info);
        assert!(approx(info[1].first.pt, Point::new(1.0, 2.0)));
        assert!(approx(info[1].second.pt, Point::new(1.0, -2.0)));
        assert_eq!(info[1].first.index, -1);
    }

    #[test]
    fn gap_fill_spans_the_bridge() {
        let g = star();
        let mut gsg = Gsg::create(&g, GsgParams::default()).unwrap();
        let mut s0 = gsg.store().whole(BranchKey::Skeletal(BranchId(1)));
        s0.toggle_inverted();
        s0.set_limits(3, 10);
        let mut s1 = gsg.store().whole(BranchKey::Skeletal(BranchId(0)));
        s1.set_limits(3, 10);

        let fill = gsg.interpolate_skeletal_gap(&s0, true, &s1, true, &[]).unwrap();
        let bound = 2 * (s0.right_margin_size() + s1.left_margin_size() + 2);
        assert!(fill.points.len() >= 2 && fill.points.len() <= bound);
        assert_eq!(fill.points.len(), fill.info.len());
        assert!(approx(fill.points[0].p, Point::new(3.0, 0.0)));
        assert!(approx(fill.points[fill.points.len() - 1].p, Point::new(-3.0, 0.0)));
        assert!(fill.points[fill.position].p.dist(g.joint(JointId(0)).fp.p) <= 0.5);
    }
}
