//! Joint labelling and branch-merge validation.

use std::f64::consts::{FRAC_PI_4, PI};

use serde::{Deserialize, Serialize};

use super::{Gsg, NodeKind};
use crate::geometry::{CURVATURE_SAMPLES, signed_angle};
use crate::ligature::LigatureSegment;
use crate::model::{JointId, Side};
use crate::segment::{BranchKey, BranchSegmentList, endpoint_index};
use crate::{Error, Result};

/// Sharpest bend, in radians, allowed between two merged branches.
const MIN_MERGE_ANGLE: f64 = 2.0;

/// Curvature above which a gap curve counts as folded back on itself.
const MAX_GAP_CURVATURE: f64 = 2.0;

/// Largest boundary gap, in radii of the gap ends, a merge may leave.
const MAX_BOUNDARY_GAP_FACTOR: f64 = 2.2;

/// Target radius ratio under which one of two semi-ligatures is clearly
/// the attached one.
const CLEAR_ATTACHMENT_RATIO: f64 = 0.5;

const MAX_SPOKE_ANGLE_RATIO: f64 = 2.0;

/// Outcome of [`Gsg::label_joint`].
///
/// `non_lig` holds every branch for a junction, or the two pieces of the
/// broken branch for an attachment. `lig` holds the attached branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLabel {
    pub joint: JointId,
    pub kind: NodeKind,
    pub non_lig: Vec<LigatureSegment>,
    pub lig: Vec<LigatureSegment>,
}

/// Rooted segments of one joint split by the ligature test. `semi` is the
/// subset of `lig` that is a ligature on one side only.
#[derive(Debug, Clone, Default)]
pub(crate) struct Partition {
    pub non_lig: Vec<LigatureSegment>,
    pub lig: Vec<LigatureSegment>,
    pub semi: Vec<LigatureSegment>,
}

impl Gsg<'_> {
    /// The branch analysed in place of skeletal branch `key`: the fixed
    /// branch of its node when there is a valid one.
    pub(crate) fn analysis_branch(&self, key: BranchKey) -> BranchKey {
        self.node_for_branch(key)
            .and_then(|v| self.graph.node(v).ok())
            .filter(|n| n.has_fixed_branch())
            .and_then(|n| n.fixed_branch())
            .unwrap_or(key)
    }

    pub(crate) fn ligature_at_joint(
        &self,
        joint: JointId,
        use_fixed: bool,
        exclude: Option<BranchKey>,
    ) -> Result<Partition> {
        let j = self.store.joint(joint);
        let keys: Vec<BranchKey> = j
            .branches
            .iter()
            .map(|&id| {
                let key = BranchKey::Skeletal(id);
                if use_fixed && Some(key) != exclude { self.analysis_branch(key) } else { key }
            })
            .collect();

        let segs = self.analyzer.rooted_ligature(&self.ligature_context(), &self.store, joint, &keys)?;
        if segs.len() != keys.len() {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("{} rooted segments for {} branches", segs.len(), keys.len()),
            });
        }

        let lp = &self.lig_params;
        let mut p = Partition::default();
        let mut excluded = 0;
        for (key, ls) in keys.iter().zip(segs) {
            if Some(*key) == exclude {
                excluded += 1;
            } else if !lp.ignore_ligature && ls.is_ligature(lp) {
                if ls.is_semi_ligature(lp) {
                    p.semi.push(ls.clone());
                }
                p.lig.push(ls);
            } else {
                p.non_lig.push(ls);
            }
        }

        if p.non_lig.len() + p.lig.len() + excluded != j.degree() {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!(
                    "{} non-ligature and {} ligature segments at a joint of degree {}",
                    p.non_lig.len(),
                    p.lig.len(),
                    j.degree()
                ),
            });
        }
        Ok(p)
    }

    /// Labels `joint` as a junction, an attachment or a crossing.
    ///
    /// With `use_fixed`, incident branches whose node was already repaired
    /// are analysed through their fixed branch. `exclude` leaves one
    /// incident branch out of the partition.
    pub fn label_joint(&self, joint: JointId, use_fixed: bool, exclude: Option<BranchKey>) -> Result<JointLabel> {
        let degree = self.store.joint(joint).degree();
        let mut p = self.ligature_at_joint(joint, use_fixed, exclude)?;
        let n = p.non_lig.len() + p.lig.len();
        let label = |kind: NodeKind, p: Partition| -> Result<JointLabel> {
            tracing::debug!(%joint, %kind, degree, non_lig = p.non_lig.len(), lig = p.lig.len(), "joint labelled");
            Ok(JointLabel { joint, kind, non_lig: p.non_lig, lig: p.lig })
        };

        if degree > 3 && p.non_lig.len() < 2 {
            p.lig.append(&mut p.non_lig);
            return label(NodeKind::Crossing, p);
        }

        if degree == 3 && self.is_end_to_end_attachment(joint, &mut p) {
            return label(NodeKind::Junction, p);
        }

        if p.non_lig.len() < 2 {
            let mut final_non = p.non_lig.clone();
            let mut final_lig = Vec::new();
            for it in &p.lig {
                let mut test_non = p.non_lig.clone();
                if test_non.is_empty() {
                    if let Some(other) = p.lig.iter().find(|l| l.branch() != it.branch()) {
                        test_non.push(other.clone());
                    }
                }
                let front = test_non.first().map(LigatureSegment::branch);
                let second = p
                    .lig
                    .iter()
                    .find(|l| l.branch() != it.branch() && Some(l.branch()) != front);
                let valid = match (front, second) {
                    (Some(_), Some(second)) => {
                        test_non.push(second.clone());
                        self.validate_branch_merge(joint, &test_non, std::slice::from_ref(it))?
                    }
                    _ => false,
                };
                if valid {
                    final_lig.push(it.clone());
                } else {
                    final_non.push(it.clone());
                }
            }
            p.lig = final_lig;
            p.non_lig = final_non;
        }

        if p.non_lig.len() < 2 {
            p.lig.sort_by(LigatureSegment::cmp_by_target_radius);
            while p.non_lig.len() < 2 {
                let ls = p.lig.pop().ok_or_else(|| Error::StructuralInvariantViolation {
                    context: joint.to_string(),
                    message: "not enough branches to form a gap".into(),
                })?;
                p.non_lig.push(ls);
            }
        } else if degree > 3 && p.non_lig.len() > 2 {
            p.non_lig.append(&mut p.lig);
        }

        if p.non_lig.len() != n && !self.validate_branch_merge(joint, &p.non_lig, &p.lig)? {
            tracing::debug!(%joint, "invalid branch merge");
            return label(NodeKind::Junction, p);
        }

        let all_non = p.non_lig.len() == n && p.lig.is_empty();
        let generic = p.non_lig.len() == 2 && p.lig.len() + 2 == n;
        if !all_non && !generic {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!(
                    "{} non-ligature and {} ligature branches at a joint of degree {degree}",
                    p.non_lig.len(),
                    p.lig.len()
                ),
            });
        }

        if all_non { label(NodeKind::Junction, p) } else { label(NodeKind::Attachment, p) }
    }

    /// End-to-end attachment: two parts meeting tip to tip with a third
    /// branch continuing one of them.
    ///
    /// May move a clearly non-attached semi-ligature into `non_lig`.
    fn is_end_to_end_attachment(&self, joint: JointId, p: &mut Partition) -> bool {
        let lp = &self.lig_params;
        if p.non_lig.len() == 1 && p.semi.len() == p.lig.len() {
            if p.lig.len() != 2 {
                return false;
            }
            let (ls0, ls1) = (&p.lig[0], &p.lig[1]);
            let s0 = ls0.ligature_side(lp).unwrap_or(Side::One);
            let s1 = ls1.ligature_side(lp).unwrap_or(Side::One);
            let (tr0, tr1) = (ls0.target_radius, ls1.target_radius);

            if ls0.corner[s0.index()].pt != ls1.corner[s1.index()].pt {
                tracing::debug!(%joint, "end-to-end attachment: corners are not shared");
                true
            } else if tr0 < tr1 && tr0 / tr1 <= CLEAR_ATTACHMENT_RATIO {
                let ls = p.lig.remove(1);
                p.non_lig.push(ls);
                p.semi.pop();
                false
            } else if tr1 < tr0 && tr1 / tr0 <= CLEAR_ATTACHMENT_RATIO {
                let ls = p.lig.remove(0);
                p.non_lig.push(ls);
                p.semi.remove(0);
                false
            } else {
                let a0 = self.spoke_angle_at_joint(ls0.branch(), joint);
                let a1 = self.spoke_angle_at_joint(ls1.branch(), joint);
                let ratio = a0.max(a1) / a0.min(a1);
                let ee = ratio < MAX_SPOKE_ANGLE_RATIO && a0 > FRAC_PI_4 && a1 > FRAC_PI_4;
                if ee {
                    tracing::debug!(%joint, a0 = a0.to_degrees(), a1 = a1.to_degrees(), "end-to-end attachment");
                }
                ee
            }
        } else if p.semi.len() == 3 {
            tracing::debug!(%joint, "end-to-end attachment: three semi-ligatures");
            true
        } else {
            false
        }
    }

    /// Unsigned angle between the two spokes of `key` at `joint`.
    pub(crate) fn spoke_angle_at_joint(&self, key: BranchKey, joint: JointId) -> f64 {
        let b = self.store.get(key);
        let Some(i) = endpoint_index(b, joint) else {
            return 0.0;
        };
        signed_angle(b.spoke(i, Side::One), b.spoke(i, Side::Two)).map_or(0.0, f64::abs)
    }

    // ========================================================================
    // Merge validation
    // ========================================================================

    /// Whether joining the two branches of `non_lig` across the gap left by
    /// `lig` yields a smooth axis and a small boundary gap.
    pub(crate) fn validate_branch_merge(
        &self,
        joint: JointId,
        non_lig: &[LigatureSegment],
        lig: &[LigatureSegment],
    ) -> Result<bool> {
        let [nl0, nl1] = non_lig else {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: format!("merge of {} branches", non_lig.len()),
            });
        };
        if lig.is_empty() {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: "merge without attached branches".into(),
            });
        }
        if let Some(ls) = lig.iter().find(|ls| ls.is_whole_branch() && ls.target_joint_degree(&self.store) > 1) {
            tracing::debug!(%joint, ligature = %ls, "cannot merge across a whole-branch ligature");
            return Ok(false);
        }

        let angle = self.max_gap_curvature_angle(joint, nl0.branch(), nl1.branch(), lig)?;
        if angle <= MIN_MERGE_ANGLE {
            tracing::debug!(%joint, angle, "merge bends too sharply");
            return Ok(false);
        }

        let ls0 = LigatureSegment::gap(&self.store, nl0.branch(), joint, lig)?;
        let ls1 = LigatureSegment::gap(&self.store, nl1.branch(), joint, lig)?;
        let (b0, b1) = (self.store.get(ls0.branch()), self.store.get(ls1.branch()));
        let (t0, t1) = (ls0.target(), ls1.target());
        let max_valid = MAX_BOUNDARY_GAP_FACTOR * b0.flux_points[t0].radius().max(b1.flux_points[t1].radius());
        let (bi0, bi1) = (b0.boundary_info[t0], b1.boundary_info[t1]);

        let mut max_gap: f64 = 0.0;
        for ls in lig {
            let pt = ls.target_point(self.store.get(ls.branch()));
            let near = |a: crate::model::Point, b: crate::model::Point| {
                if pt.sq_dist(a) < pt.sq_dist(b) { a } else { b }
            };
            let pt0 = near(bi0.first.pt, bi0.second.pt);
            let pt1 = near(bi1.first.pt, bi1.second.pt);
            max_gap = max_gap.max(pt0.dist(pt1));
        }
        tracing::debug!(%joint, max_gap, max_valid, "boundary gap of merge");
        Ok(max_gap <= max_valid)
    }

    /// Angle at the point of maximum curvature of the curve that would
    /// bridge `key0` and `key1`. Near `PI` is flat; zero is folded.
    pub(crate) fn max_gap_curvature_angle(
        &self,
        joint: JointId,
        key0: BranchKey,
        key1: BranchKey,
        lig: &[LigatureSegment],
    ) -> Result<f64> {
        let trimmed = |key: BranchKey| -> Result<BranchSegmentList> {
            let gap = LigatureSegment::gap(&self.store, key, joint, lig)?;
            let mut bs = self.store.whole(key);
            bs.subtract_interval(&gap.seg)?;
            Ok(BranchSegmentList::new(bs))
        };
        let mut list = trimmed(key0)?;
        list.splice(trimmed(key1)?, &self.store)?;
        let (Some(&front), Some(&back)) = (list.front(), list.back()) else {
            return Err(Error::StructuralInvariantViolation {
                context: joint.to_string(),
                message: "empty merge candidate".into(),
            });
        };

        let (curve, idx0, idx1) = self.interpolation_curve(&front, true, &back, true, lig.first())?;
        let (k, u) = curve.max_curvature(CURVATURE_SAMPLES);
        if k.abs() > MAX_GAP_CURVATURE {
            tracing::debug!(%joint, k, "extreme gap curvature");
            return Ok(0.0);
        }
        let pt = curve.point_at(u);
        let v0 = front.pt(self.store.get(front.branch), idx0) - pt;
        let v1 = back.pt(self.store.get(back.branch), idx1) - pt;
        if v0.norm() <= 1.0 || v1.norm() <= 1.0 {
            return Ok(PI);
        }
        Ok(signed_angle(v0, v1).map_or(PI, f64::abs))
    }
}
