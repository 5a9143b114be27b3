//! Punch classification
//!
//! Maps a completed motion segment to a punch type using the thresholds of the
//! calibration in effect. Candidates are chosen in three passes:
//!
//! 1. Every type eligible for the arm whose velocity, extension and angle
//!    tests pass. None passing rejects the segment as motion only.
//! 2. Of those, the types whose confidence threshold the segment meets. None
//!    left rejects the segment as low confidence.
//! 3. When the arm extension ratio is known, types whose arm posture agrees
//!    with it are preferred: straights land on an extended arm, hooks on a
//!    bent one.
//!
//! The remaining candidate whose angle range center is closest to the segment
//! angle wins, ties going to the earlier type in [`PunchType::ALL`] order.

use crate::calibration::{CalibrationProfile, PunchThresholds};
use crate::types::{MotionSegment, PunchEvent, PunchType, RejectReason};
use tracing::debug;

const VELOCITY_WEIGHT: f64 = 0.4;
const EXTENSION_WEIGHT: f64 = 0.3;
const ANGLE_WEIGHT: f64 = 0.3;

/// Arm extension ratio at or above which the arm counts as straight
pub const EXTENDED_REACH: f64 = 0.8;

/// Outcome of classifying one segment
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Punch(PunchEvent),
    Rejected(RejectReason),
}

/// Stateless segment classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct PunchClassifier;

impl PunchClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, segment: &MotionSegment, profile: &CalibrationProfile) -> Classification {
        let angle = segment.angle_deg();
        let extension = segment.extension();

        let matching: Vec<(PunchType, &PunchThresholds)> = profile
            .thresholds
            .iter()
            .filter(|(punch_type, _)| {
                !punch_type.is_straight() || profile.stance.straight_for(segment.arm) == **punch_type
            })
            .filter(|(_, t)| {
                segment.peak_velocity >= t.min_peak_velocity
                    && extension >= t.min_extension
                    && t.contains_angle(angle)
            })
            .map(|(&punch_type, t)| (punch_type, t))
            .collect();

        if matching.is_empty() {
            debug!(
                arm = segment.arm.as_str(),
                angle_deg = angle,
                extension,
                peak_velocity = segment.peak_velocity,
                "segment matched no punch type"
            );
            return Classification::Rejected(RejectReason::MotionOnly);
        }

        let confident: Vec<_> = matching
            .into_iter()
            .filter(|(_, t)| segment.confidence_floor >= t.confidence_threshold)
            .collect();
        if confident.is_empty() {
            debug!(
                arm = segment.arm.as_str(),
                floor = segment.confidence_floor,
                "segment below confidence threshold"
            );
            return Classification::Rejected(RejectReason::LowConfidence {
                floor: segment.confidence_floor,
            });
        }

        let agreeing: Vec<_> = match segment.peak_reach {
            Some(reach) => confident
                .iter()
                .copied()
                .filter(|(punch_type, _)| posture_agrees(*punch_type, reach))
                .collect(),
            None => Vec::new(),
        };
        let pool = if agreeing.is_empty() { confident } else { agreeing };

        let best = pool.into_iter().min_by(|(_, a), (_, b)| {
            let da = (angle - a.angle_center()).abs();
            let db = (angle - b.angle_center()).abs();
            da.total_cmp(&db)
        });
        let Some((punch_type, thresholds)) = best else {
            return Classification::Rejected(RejectReason::MotionOnly);
        };

        Classification::Punch(PunchEvent {
            arm: segment.arm,
            punch_type,
            timestamp_ms: segment.peak_ms,
            peak_velocity: segment.peak_velocity,
            confidence: score(segment, thresholds, angle, extension),
            extension,
            angle_deg: angle,
        })
    }
}

/// Whether the arm extension ratio fits how `punch_type` is thrown.
/// Uppercuts are thrown either way.
fn posture_agrees(punch_type: PunchType, reach: f64) -> bool {
    match punch_type {
        PunchType::Jab | PunchType::Cross => reach >= EXTENDED_REACH,
        PunchType::Hook => reach < EXTENDED_REACH,
        PunchType::Uppercut => true,
    }
}

/// Informational confidence from threshold margins and angle closeness
fn score(segment: &MotionSegment, t: &PunchThresholds, angle: f64, extension: f64) -> f64 {
    let velocity_margin = margin(segment.peak_velocity, t.min_peak_velocity);
    let extension_margin = margin(extension, t.min_extension);
    let half_width = t.angle_half_width();
    let closeness = if half_width > 0.0 {
        (1.0 - (angle - t.angle_center()).abs() / half_width).clamp(0.0, 1.0)
    } else {
        1.0
    };

    (VELOCITY_WEIGHT * velocity_margin + EXTENSION_WEIGHT * extension_margin + ANGLE_WEIGHT * closeness)
        .clamp(0.0, 1.0)
}

/// Relative excess over a minimum, saturating at double the minimum
fn margin(value: f64, minimum: f64) -> f64 {
    if minimum <= 0.0 {
        return 1.0;
    }
    ((value - minimum) / minimum).clamp(0.0, 1.0)
}

/// Classify against a profile in one call
pub fn classify_segment(segment: &MotionSegment, profile: &CalibrationProfile) -> Classification {
    PunchClassifier::new().classify(segment, profile)
}
