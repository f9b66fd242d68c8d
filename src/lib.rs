//! # shock-gsg: Generalized Skeletal Graphs over 2-D Medial Axes
//!
//! Turns a medial-axis graph (joints joined by sampled branches, each
//! sample carrying a radius and a spoke to either side of the boundary)
//! into a *generalized skeletal graph*: branches that continue each other
//! through a blended joint are merged into one node, and the parts hanging
//! off them are recorded as attachments with a side and a position.
//!
//! ## Design Principles
//!
//! 1. **Pure DTOs in**: [`SkeletalGraph`] is plain data; nothing in it
//!    knows about the GSG.
//! 2. **Collaborators behind traits**: ligature analysis and boundary
//!    lookup are [`ligature::LigatureAnalyzer`] and
//!    [`boundary::BoundaryPointFinder`]; the defaults work from the spokes
//!    and the contour alone.
//! 3. **Index-based graph**: [`graph::Graph`] hands out stable indices, so
//!    nodes and edges can be moved and deleted during construction.
//! 4. **Errors, not panics**: every structural surprise is an [`Error`].
//!
//! ## Quick Start
//!
//! ```rust
//! use shock_gsg::model::{BoundaryInfo, BoundaryPoint, FluxPoint, Point};
//! use shock_gsg::{Gsg, GsgParams, SkeletalGraph};
//!
//! # fn main() -> shock_gsg::Result<()> {
//! let mut g = SkeletalGraph::new(Vec::new());
//! let a = g.add_joint(Point::new(0.0, 0.0), 1.0);
//! let b = g.add_joint(Point::new(4.0, 0.0), 1.0);
//! let fps: Vec<FluxPoint> = (0..5).map(|k| FluxPoint::new(Point::new(k as f64, 0.0), 1.0)).collect();
//! let bis: Vec<BoundaryInfo> = (0..5)
//!     .map(|k| BoundaryInfo {
//!         first: BoundaryPoint::new(Point::new(k as f64, 1.0), -1),
//!         second: BoundaryPoint::new(Point::new(k as f64, -1.0), -1),
//!         ..Default::default()
//!     })
//!     .collect();
//! g.add_branch(a, b, fps, bis)?;
//!
//! let gsg = Gsg::create(&g, GsgParams::default())?;
//! assert_eq!(gsg.graph().node_count(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`model`] | points, skeletal graph, parameters |
//! | [`geometry`] | intersections, line fit, cubic Bézier |
//! | [`graph`] | directed multigraph with stable indices |
//! | [`segment`] | branch segments, segment lists, branch store |
//! | [`ligature`] | ligature segments, concave corners, analyzer |
//! | [`boundary`] | boundary-point finder |
//! | [`gsg`] | joint labelling, dependency order, merge and repair |
//! | [`export`] | text and JSON dumps |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod geometry;
pub mod graph;
pub mod segment;
pub mod ligature;
pub mod boundary;
pub mod gsg;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    BoundaryInfo, Branch, BranchId, FluxPoint, GsgParams, JointId, LigatureParams, Point, Side,
    SkeletalGraph,
};

// ============================================================================
// Re-exports: Construction
// ============================================================================

pub use boundary::{BoundaryPointFinder, NearestBoundaryFinder};
pub use gsg::{DependencyGraph, EdgeKind, Gsg, GsgBuilder, GsgEdge, GsgNode, NodeKind};
pub use ligature::{LigatureAnalyzer, LigatureSegment, SpokeLigatureAnalyzer};
pub use segment::{BranchKey, BranchSegment, BranchSegmentList};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The graph reached a state construction cannot continue from.
    #[error("Structural invariant violated at {context}: {message}")]
    StructuralInvariantViolation { context: String, message: String },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Unresolved dependency cycle: {0}")]
    UnresolvedDependencyCycle(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Construction cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
