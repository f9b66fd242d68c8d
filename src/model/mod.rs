//! # Skeletal Model
//!
//! Plain DTOs shared by every stage: plane geometry, the medial-axis
//! input graph, and construction parameters.
//!
//! Design rule: this module is pure data. No graph rewriting, no
//! collaborator traits, no logging.

pub mod geom;
pub mod params;
pub mod skeleton;

pub use geom::{Point, Vector};
pub use params::{GsgParams, LigatureParams, Threshold};
pub use skeleton::{
    BoundaryInfo, BoundaryPoint, BoundarySegment, Branch, BranchId, FluxPoint, Joint, JointId,
    Side, SkeletalGraph,
};
