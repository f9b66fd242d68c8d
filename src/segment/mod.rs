//! # Branch Segments
//!
//! Views over sub-intervals of skeletal branches, the ordered lists of
//! such views that make up a GSG branch node, and a walker that measures
//! boundary-to-axis ratios along a branch.
//!
//! Branches are addressed through a [`BranchKey`], which names either a
//! branch of the input [`SkeletalGraph`] or a branch created during
//! construction and kept in the [`BranchStore`]. Segments never hold a
//! reference to their branch, so they can be moved between nodes freely;
//! every geometric query takes the branch from the store.
//!
//! | Type | Role |
//! |------|------|
//! | [`BranchSegment`] | `[first, last]` of one branch, possibly flow-inverted |
//! | [`BranchSegmentList`] | segments of a node plus the attachment edges of each gap |
//! | [`BranchWalk`] | forward/backward walk computing cumulative BAR |

pub mod branch_segment;
pub mod list;
pub mod walk;

pub use branch_segment::BranchSegment;
pub use list::{AttachEdges, BranchSegmentList};
pub use walk::{BranchWalk, CumulativeBar};

use serde::{Deserialize, Serialize};

use crate::model::{BoundaryInfo, Branch, BranchId, Joint, JointId, Side, SkeletalGraph};
use crate::{Error, Result};

/// Identity of a branch, skeletal or constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BranchKey {
    Skeletal(BranchId),
    Synthetic(usize),
}

impl std::fmt::Display for BranchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchKey::Skeletal(id) => write!(f, "{id}"),
            BranchKey::Synthetic(i) => write!(f, "S{i}"),
        }
    }
}

impl From<BranchId> for BranchKey {
    fn from(id: BranchId) -> Self {
        BranchKey::Skeletal(id)
    }
}

/// Input branches plus the append-only set of constructed branches.
///
/// Constructed branches are never removed, so a [`BranchKey`] stays valid
/// for the lifetime of the store.
#[derive(Debug, Clone)]
pub struct BranchStore<'s> {
    skeleton: &'s SkeletalGraph,
    synthetic: Vec<Branch>,
}

impl<'s> BranchStore<'s> {
    pub fn new(skeleton: &'s SkeletalGraph) -> Self {
        Self { skeleton, synthetic: Vec::new() }
    }

    pub fn skeleton(&self) -> &'s SkeletalGraph {
        self.skeleton
    }

    pub fn get(&self, key: BranchKey) -> &Branch {
        match key {
            BranchKey::Skeletal(id) => self.skeleton.branch(id),
            BranchKey::Synthetic(i) => &self.synthetic[i],
        }
    }

    pub fn push(&mut self, branch: Branch) -> BranchKey {
        self.synthetic.push(branch);
        BranchKey::Synthetic(self.synthetic.len() - 1)
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        self.skeleton.joint(id)
    }

    pub fn synthetic_count(&self) -> usize {
        self.synthetic.len()
    }

    /// A segment covering the whole of `key`.
    pub fn whole(&self, key: BranchKey) -> BranchSegment {
        BranchSegment::whole(key, self.get(key).len())
    }
}

// ============================================================================
// Branch/joint incidence helpers
// ============================================================================

/// The joint shared by two branches, if any.
pub fn common_joint(b0: &Branch, b1: &Branch) -> Option<JointId> {
    if b0.n1 == b1.n1 || b0.n1 == b1.n2 {
        Some(b0.n1)
    } else if b0.n2 == b1.n1 || b0.n2 == b1.n2 {
        Some(b0.n2)
    } else {
        None
    }
}

/// Index of the flux point of `b` that lies at joint `j`.
pub fn endpoint_index(b: &Branch, j: JointId) -> Option<usize> {
    if b.n1 == j {
        Some(0)
    } else if b.n2 == j {
        Some(b.len().saturating_sub(1))
    } else {
        None
    }
}

/// Boundary info of the end of `b` that lies at joint `j`.
pub fn endpoint_info(b: &Branch, j: JointId) -> Result<BoundaryInfo> {
    let i = endpoint_index(b, j)
        .ok_or_else(|| Error::NotFound(format!("joint {j} is not an endpoint of {}-{}", b.n1, b.n2)))?;
    Ok(b.boundary_info[i])
}

/// Sides of `b0` and `b1` whose spokes at `j` end at the same boundary point.
///
/// When no spoke pair coincides, the closest pair is used.
pub fn shared_boundary_sides(b0: &Branch, b1: &Branch, j: JointId) -> Result<(Side, Side)> {
    let bi0 = endpoint_info(b0, j)?;
    let bi1 = endpoint_info(b1, j)?;
    let mut best = (Side::One, Side::One, f64::INFINITY);
    for s0 in Side::BOTH {
        for s1 in Side::BOTH {
            let d = bi0.side(s0).pt.sq_dist(bi1.side(s1).pt);
            if d == 0.0 {
                return Ok((s0, s1));
            }
            if d < best.2 {
                best = (s0, s1, d);
            }
        }
    }
    tracing::trace!(joint = %j, dist = best.2.sqrt(), "no spokes end at the same boundary point");
    Ok((best.0, best.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundaryPoint, FluxPoint, Point};

    fn tee() -> SkeletalGraph {
        let mut g = SkeletalGraph::new(Vec::new());
        let c = g.add_joint(Point::new(0.0, 0.0), 2.0);
        let ends = [Point::new(-3.0, 0.0), Point::new(3.0, 0.0), Point::new(0.0, 3.0)];
        for e in ends {
            let j = g.add_joint(e, 1.0);
            let fps: Vec<FluxPoint> = (0..4)
                .map(|k| FluxPoint::new(Point::default().lerp(e, k as f64 / 3.0), 2.0))
                .collect();
            let bis = fps
                .iter()
                .map(|fp| BoundaryInfo {
                    cum_axis_dist: fp.p.dist(Point::default()),
                    first: BoundaryPoint::new(fp.p + crate::model::Vector::new(0.0, 2.0), 1),
                    second: BoundaryPoint::new(fp.p + crate::model::Vector::new(0.0, -2.0), 2),
                })
                .collect();
            g.add_branch(c, j, fps, bis).unwrap();
        }
        g
    }

    #[test]
    fn store_resolves_both_kinds() {
        let g = tee();
        let mut store = BranchStore::new(&g);
        let k0 = BranchKey::from(BranchId(0));
        assert_eq!(store.get(k0).len(), 4);
        let k1 = store.push(store.get(k0).clone());
        assert_eq!(k1, BranchKey::Synthetic(0));
        assert_eq!(store.synthetic_count(), 1);
        assert_eq!(k1.to_string(), "S0");
        assert_eq!(store.whole(k1).size(), 4);
    }

    #[test]
    fn incidence_helpers() {
        let g = tee();
        let (b0, b1) = (g.branch(BranchId(0)), g.branch(BranchId(1)));
        assert_eq!(common_joint(b0, b1), Some(JointId(0)));
        assert_eq!(endpoint_index(b0, JointId(1)), Some(3));
        assert_eq!(endpoint_index(b0, JointId(2)), None);
        assert!(endpoint_info(b0, JointId(3)).is_err());

        let (s0, s1) = shared_boundary_sides(b0, b1, JointId(0)).unwrap();
        assert_eq!((s0, s1), (Side::One, Side::One));
    }
}
