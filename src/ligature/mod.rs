//! # Ligature Analysis
//!
//! A *ligature* is the stretch of medial axis that only exists because two
//! parts of a shape blend into each other. Near an attachment joint the
//! attached part's branch shrinks quickly into the joint's disc while its
//! spokes stay pinned at a concave boundary corner. This module finds such
//! stretches.
//!
//! | Type | Role |
//! |------|------|
//! | [`LigatureSegment`] | interval of a branch rooted at a joint, with its BAR, radii and corners |
//! | [`BoundaryCorner`] | sharpest concave boundary angle near a joint |
//! | [`LigatureAnalyzer`] | per-joint extraction, swappable |
//! | [`SpokeLigatureAnalyzer`] | default analyzer |
//!
//! ## Criteria
//!
//! A segment is a ligature on one side when its target/source radius ratio
//! and its cumulative boundary-to-axis ratio are small, and a concave corner
//! with a small enough angle lies close to it. It is a *full* ligature on
//! both sides, a *semi* ligature on exactly one.
//!
//! ## Limitations
//!
//! - Corner search over the contour needs contour indices on the spokes
//!   around the joint. Otherwise it falls back to the spoke end points of
//!   the two branches, which only sees the boundary the branches cover.

pub mod analyzer;
pub mod corner;
pub mod segment;

pub use analyzer::{LigatureAnalyzer, LigatureContext, SpokeLigatureAnalyzer};
pub use corner::BoundaryCorner;
pub use segment::LigatureSegment;
