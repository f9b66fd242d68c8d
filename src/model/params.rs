//! Construction parameters.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Parameters of [`Gsg::create`](crate::Gsg::create).
///
/// Missing JSON fields fall back to the defaults:
///
/// ```
/// use shock_gsg::GsgParams;
///
/// let p = GsgParams::from_json(r#"{ "max_corner_angle": 110.0 }"#).unwrap();
/// assert_eq!(p.max_corner_angle, 110.0);
/// assert_eq!(p.max_radius_ratio, 0.9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsgParams {
    pub max_radius_ratio: f64,
    pub max_cumulative_bar: f64,
    /// Degrees.
    pub max_corner_angle: f64,
    /// Treat every segment as non-ligature; every joint becomes a junction.
    pub ignore_ligature: bool,
    pub subtract_ligature_from_crossings: bool,
    pub use_known_pts_to_restore_boundary: bool,
    /// Emit the dependency graph dump at `debug` level.
    pub dump_dependency_graph: bool,
    /// Emit the finished graph dump at `debug` level.
    pub dump_gsg: bool,
}

impl Default for GsgParams {
    fn default() -> Self {
        Self {
            max_radius_ratio: 0.9,
            max_cumulative_bar: 0.75,
            max_corner_angle: 120.0,
            ignore_ligature: false,
            subtract_ligature_from_crossings: true,
            use_known_pts_to_restore_boundary: false,
            dump_dependency_graph: false,
            dump_gsg: false,
        }
    }
}

impl GsgParams {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn ligature_params(&self) -> LigatureParams {
        LigatureParams::from(self)
    }
}

/// A bound with a permissive and a strict variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub loose: f64,
    pub tight: f64,
}

impl Threshold {
    pub const fn both(v: f64) -> Self {
        Self { loose: v, tight: v }
    }
}

/// Thresholds consulted by the ligature predicates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LigatureParams {
    pub max_radius_ratio: Threshold,
    pub max_cumulative_bar: Threshold,
    /// Cosine of the widest corner angle still accepted.
    pub min_corner_cos: Threshold,
    pub ignore_ligature: bool,
}

impl From<&GsgParams> for LigatureParams {
    fn from(p: &GsgParams) -> Self {
        Self {
            max_radius_ratio: Threshold::both(p.max_radius_ratio),
            max_cumulative_bar: Threshold::both(p.max_cumulative_bar),
            min_corner_cos: Threshold::both(p.max_corner_angle.to_radians().cos()),
            ignore_ligature: p.ignore_ligature,
        }
    }
}

impl Default for LigatureParams {
    fn default() -> Self {
        Self::from(&GsgParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let p = GsgParams::default();
        assert_eq!(p.max_radius_ratio, 0.9);
        assert_eq!(p.max_cumulative_bar, 0.75);
        assert_eq!(p.max_corner_angle, 120.0);
        assert!(p.subtract_ligature_from_crossings);
        assert!(!p.ignore_ligature);
    }

    #[test]
    fn corner_angle_becomes_cosine() {
        let lp = GsgParams::default().ligature_params();
        assert!((lp.min_corner_cos.loose + 0.5).abs() < 1e-12);
        assert_eq!(lp.min_corner_cos.loose, lp.min_corner_cos.tight);
    }

    #[test]
    fn from_json_rejects_bad_types() {
        assert!(GsgParams::from_json(r#"{ "ignore_ligature": "yes" }"#).is_err());
        let p = GsgParams::from_json("{}").unwrap();
        assert_eq!(p, GsgParams::default());
    }
}
