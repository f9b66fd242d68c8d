//! Medial-axis input: joints, branches, flux points and boundary info.
//!
//! A [`SkeletalGraph`] is read-only once construction starts. Branches
//! created while building a GSG (merged or synthetic) use the same
//! [`Branch`] type but live in the GSG's own store.
//!
//! ## Conventions
//!
//! - A branch runs from joint `n1` (first flux point) to joint `n2`
//!   (last flux point).
//! - Side one is the boundary side at a non-negative object angle from
//!   the flow tangent, i.e. to the left when walking from `n1` to `n2`.
//! - A boundary index `>= 0` points into the contour; `-1` marks a
//!   reconstructed point with no contour counterpart.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Point, Vector};
use crate::{Error, Result};

/// Index of a joint in its [`SkeletalGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointId(pub usize);

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "J{}", self.0)
    }
}

/// Index of a branch in its [`SkeletalGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub usize);

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A medial-axis sample: position plus signed distance to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FluxPoint {
    pub p: Point,
    pub dist: f64,
}

impl FluxPoint {
    pub fn new(p: Point, dist: f64) -> Self {
        Self { p, dist }
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.dist.abs()
    }
}

/// Boundary side of a spoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::One, Side::Two];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
        }
    }

    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    /// 1 or 2, the numbering used in dumps.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

/// Contact point of a spoke with the object boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundaryPoint {
    pub pt: Point,
    /// Contour index, or negative for a reconstructed point.
    pub index: i32,
    /// Boundary segment the point belongs to, after derived values are restored.
    pub subindex: i32,
    pub cum_bndry_dist: f64,
}

impl BoundaryPoint {
    pub fn new(pt: Point, index: i32) -> Self {
        Self { pt, index, subindex: 0, cum_bndry_dist: 0.0 }
    }
}

/// Spoke data of one flux point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundaryInfo {
    pub cum_axis_dist: f64,
    pub first: BoundaryPoint,
    pub second: BoundaryPoint,
}

impl BoundaryInfo {
    #[inline]
    pub fn side(&self, s: Side) -> &BoundaryPoint {
        match s {
            Side::One => &self.first,
            Side::Two => &self.second,
        }
    }

    #[inline]
    pub fn side_mut(&mut self, s: Side) -> &mut BoundaryPoint {
        match s {
            Side::One => &mut self.first,
            Side::Two => &mut self.second,
        }
    }

    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.first, &mut self.second);
    }

    /// True when both spokes reference contour points.
    pub fn is_indexed(&self) -> bool {
        self.first.index >= 0 && self.second.index >= 0
    }
}

/// A run of contiguous contour indices along one side of a branch.
///
/// Reconstructed spoke ends that do not hit the contour are chained into
/// `gap_pts`; a point with `index == -k` is `gap_pts[k - 1]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundarySegment {
    pub start: i32,
    pub end: i32,
    pub gap_pts: Vec<Point>,
}

impl BoundarySegment {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end, gap_pts: Vec::new() }
    }

    pub fn add_gap_point(&mut self, p: Point) {
        self.gap_pts.push(p);
    }

    /// Appends the pixel chain from `p0` (exclusive) towards `p1`.
    ///
    /// `p1` itself is appended only when `include_last` is set.
    pub fn add_gap_points(&mut self, p0: Point, p1: Point, include_last: bool) {
        if p0.is_connected_to(p1) {
            if include_last {
                self.gap_pts.push(p1);
            }
            return;
        }

        let (x0, y0) = (p0.x.round() as i64, p0.y.round() as i64);
        let (x1, y1) = (p1.x.round() as i64, p1.y.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);

        while (x, y) != (x1, y1) {
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
            if (x, y) != (x1, y1) {
                self.gap_pts.push(Point::new(x as f64, y as f64));
            }
        }
        if include_last {
            self.gap_pts.push(p1);
        }
    }
}

/// A run of flux points between two joints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub n1: JointId,
    pub n2: JointId,
    pub flux_points: Vec<FluxPoint>,
    pub boundary_info: Vec<BoundaryInfo>,
    /// Per-side runs of boundary indices, filled for repaired branches.
    pub boundary_segments: [Vec<BoundarySegment>; 2],
}

impl Branch {
    pub fn new(
        n1: JointId,
        n2: JointId,
        flux_points: Vec<FluxPoint>,
        boundary_info: Vec<BoundaryInfo>,
    ) -> Self {
        Self {
            n1,
            n2,
            flux_points,
            boundary_info,
            boundary_segments: [Vec::new(), Vec::new()],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.flux_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flux_points.is_empty()
    }

    pub fn first_point(&self) -> Point {
        self.flux_points.first().map(|fp| fp.p).unwrap_or_default()
    }

    pub fn last_point(&self) -> Point {
        self.flux_points.last().map(|fp| fp.p).unwrap_or_default()
    }

    pub fn first_info(&self) -> BoundaryInfo {
        self.boundary_info.first().copied().unwrap_or_default()
    }

    pub fn last_info(&self) -> BoundaryInfo {
        self.boundary_info.last().copied().unwrap_or_default()
    }

    pub fn is_endpoint(&self, j: JointId) -> bool {
        self.n1 == j || self.n2 == j
    }

    /// The endpoint that is not `j`.
    pub fn other_endpoint(&self, j: JointId) -> JointId {
        if self.n1 == j { self.n2 } else { self.n1 }
    }

    /// Spoke vector from flux point `i` to its boundary point on side `s`.
    pub fn spoke(&self, i: usize, s: Side) -> Vector {
        self.boundary_info[i].side(s).pt - self.flux_points[i].p
    }
}

/// A point where branches meet, or a terminal point of degree one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub fp: FluxPoint,
    pub branches: SmallVec<[BranchId; 4]>,
}

impl Joint {
    #[inline]
    pub fn degree(&self) -> usize {
        self.branches.len()
    }
}

/// Input medial-axis graph plus the boundary contour it was computed from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkeletalGraph {
    joints: Vec<Joint>,
    branches: Vec<Branch>,
    contour: Vec<Point>,
}

impl SkeletalGraph {
    /// Creates an empty graph over a closed boundary contour.
    pub fn new(contour: Vec<Point>) -> Self {
        Self { joints: Vec::new(), branches: Vec::new(), contour }
    }

    pub fn add_joint(&mut self, p: Point, dist: f64) -> JointId {
        let id = JointId(self.joints.len());
        self.joints.push(Joint { fp: FluxPoint::new(p, dist), branches: SmallVec::new() });
        id
    }

    /// Adds a branch from `n1` to `n2` and registers it on both joints.
    pub fn add_branch(
        &mut self,
        n1: JointId,
        n2: JointId,
        flux_points: Vec<FluxPoint>,
        boundary_info: Vec<BoundaryInfo>,
    ) -> Result<BranchId> {
        for j in [n1, n2] {
            if j.0 >= self.joints.len() {
                return Err(Error::InvalidInput(format!("unknown joint {j}")));
            }
        }
        if n1 == n2 {
            return Err(Error::InvalidInput(format!("loop branch at {n1}")));
        }
        if flux_points.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "branch {n1}-{n2} has {} flux points",
                flux_points.len()
            )));
        }
        if flux_points.len() != boundary_info.len() {
            return Err(Error::InvalidInput(format!(
                "branch {n1}-{n2}: {} flux points but {} boundary infos",
                flux_points.len(),
                boundary_info.len()
            )));
        }
        let id = BranchId(self.branches.len());
        self.branches.push(Branch::new(n1, n2, flux_points, boundary_info));
        self.joints[n1.0].branches.push(id);
        self.joints[n2.0].branches.push(id);
        Ok(id)
    }

    #[inline]
    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.0]
    }

    #[inline]
    pub fn branch(&self, id: BranchId) -> &Branch {
        &self.branches[id.0]
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn joint_ids(&self) -> impl Iterator<Item = JointId> + '_ {
        (0..self.joints.len()).map(JointId)
    }

    pub fn branch_ids(&self) -> impl Iterator<Item = BranchId> + '_ {
        (0..self.branches.len()).map(BranchId)
    }

    pub fn contour(&self) -> &[Point] {
        &self.contour
    }

    /// Checks the structural assumptions construction relies on.
    ///
    /// Every branch must start exactly at `n1` and end at `n2`, and no
    /// joint may have degree two.
    pub fn validate(&self) -> Result<()> {
        for (i, b) in self.branches.iter().enumerate() {
            if b.first_point() != self.joint(b.n1).fp.p || b.last_point() != self.joint(b.n2).fp.p {
                return Err(Error::InvalidInput(format!(
                    "branch B{i} endpoints do not match joints {} and {}",
                    b.n1, b.n2
                )));
            }
        }
        for (i, j) in self.joints.iter().enumerate() {
            if j.degree() == 2 {
                return Err(Error::InvalidInput(format!("joint J{i} has degree 2")));
            }
        }
        Ok(())
    }
}
