//! Numeric geometry used by the ligature analysis and the gap interpolation.

pub mod bezier;
pub mod fit;
pub mod intersect;

pub use bezier::{CubicBezier, Raster, CURVATURE_SAMPLES};
pub use fit::{fit_line, Line};
pub use intersect::{
    intersect_segments, object_angle, safe_acos, segments_intersect, signed_angle,
    Intersection,
};
