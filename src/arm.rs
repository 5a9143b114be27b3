//! Per-arm punch state machine
//!
//! Each arm owns one [`ArmStateMachine`]. It is driven once per frame by that
//! arm's wrist reading and walks Idle → Winding → Extending → Peaked →
//! Retracting → Idle, emitting a [`MotionSegment`] when a cycle completes.
//!
//! Within one frame the transitions are evaluated in a fixed order against the
//! same reading: the peak check runs before the reversal check, which runs
//! before the return-to-idle check. A single frame may therefore cascade
//! through more than one transition.
//!
//! Onset direction is judged against the guard position, the last place the
//! wrist rested before a punch. After a punch the guard is held until the
//! wrist settles back near it, so the return stroke never counts as a new
//! motion away from the guard.

use crate::types::{AbortReason, Arm, ArmState, MotionSegment, Vec2, VelocityEstimate};
use tracing::{debug, trace};

/// Wrist observation for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WristReading {
    pub position: Vec2,
    pub confidence: f64,
    /// Undefined until the track holds two samples
    pub velocity: Option<VelocityEstimate>,
    /// The wrist track was just re-acquired after a gap
    pub track_reset: bool,
    /// Arm extension ratio this frame, when shoulder and elbow are visible
    pub reach: Option<f64>,
}

/// Motion thresholds shared by both arms for the duration of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// Units per second
    pub onset_threshold: f64,
    pub direction_consistency: f64,
    pub retract_fraction: f64,
    pub max_gap_ms: f64,
    pub max_segment_ms: f64,
    pub idle_timeout_ms: f64,
}

/// Result of a state machine step that ended a segment
#[derive(Debug, Clone, PartialEq)]
pub enum ArmOutcome {
    Completed(MotionSegment),
    Aborted { reason: AbortReason, at_ms: f64 },
}

/// Frames of consistent motion needed before Winding becomes Extending
const SUSTAINED_FRAMES: u32 = 2;

/// A returning wrist is back on guard within this fraction of the last extension
const GUARD_RETURN_FRACTION: f64 = 0.5;

#[derive(Debug, Clone)]
struct SegmentProgress {
    start_pos: Vec2,
    start_ms: f64,
    peak_ms: f64,
    peak_velocity: f64,
    peak_direction: Vec2,
    prev_magnitude: f64,
    last_direction: Vec2,
    consistent_frames: u32,
    farthest: Vec2,
    confidence_floor: f64,
    retract_since_ms: f64,
    peak_reach: Option<f64>,
}

impl SegmentProgress {
    fn observe(&mut self, reading: &WristReading) {
        let offset = reading.position - self.start_pos;
        if offset.length() > self.farthest.length() {
            self.farthest = offset;
        }
        self.confidence_floor = self.confidence_floor.min(reading.confidence);
        if let Some(reach) = reading.reach {
            self.peak_reach = Some(self.peak_reach.map_or(reach, |r| r.max(reach)));
        }
    }
}

/// State machine for a single arm
#[derive(Debug, Clone)]
pub struct ArmStateMachine {
    arm: Arm,
    state: ArmState,
    progress: Option<SegmentProgress>,
    /// Reference position for the away-from-guard onset test
    guard: Option<Vec2>,
    /// Most recent rest position and time; a new segment starts here
    last_rest: Option<(Vec2, f64)>,
    rest_since_ms: Option<f64>,
    /// Extension of the last punch while the wrist has not yet returned to guard
    returning: Option<f64>,
    last_valid_ms: Option<f64>,
    /// Motion began during cooldown; ignored until the wrist is back at rest
    suppressed: bool,
}

impl ArmStateMachine {
    pub fn new(arm: Arm) -> Self {
        Self {
            arm,
            state: ArmState::Idle,
            progress: None,
            guard: None,
            last_rest: None,
            rest_since_ms: None,
            returning: None,
            last_valid_ms: None,
            suppressed: false,
        }
    }

    pub fn arm(&self) -> Arm {
        self.arm
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    /// Return to Idle, forgetting any segment in progress
    pub fn reset(&mut self) {
        *self = Self::new(self.arm);
    }

    /// Advance one frame.
    ///
    /// `reading` is `None` when the wrist was missing or invalid this frame.
    /// `cooling` blocks new onsets while the arm's cooldown is running.
    pub fn step(
        &mut self,
        timestamp_ms: f64,
        reading: Option<&WristReading>,
        params: &MotionParams,
        cooling: bool,
    ) -> Option<ArmOutcome> {
        let Some(reading) = reading else {
            return self.step_missing(timestamp_ms, params);
        };
        self.last_valid_ms = Some(timestamp_ms);

        if reading.track_reset {
            self.forget_guard();
            if self.state != ArmState::Idle {
                return Some(self.abort(AbortReason::TrackReset, timestamp_ms));
            }
        }

        let too_long = self
            .progress
            .as_ref()
            .is_some_and(|p| timestamp_ms - p.start_ms > params.max_segment_ms);
        if too_long {
            self.suppressed = true;
            return Some(self.abort(AbortReason::DurationCeiling, timestamp_ms));
        }

        let Some(velocity) = reading.velocity else {
            if self.state == ArmState::Idle {
                self.note_rest(reading.position, timestamp_ms, params);
            }
            return None;
        };

        if let Some(progress) = self.progress.as_mut() {
            progress.observe(reading);
        }

        match self.state {
            ArmState::Idle => {
                self.step_idle(timestamp_ms, reading, &velocity, params, cooling);
                None
            }
            ArmState::Winding => self.step_winding(timestamp_ms, reading, &velocity, params),
            _ => self.step_active(timestamp_ms, reading, &velocity, params),
        }
    }

    fn step_missing(&mut self, timestamp_ms: f64, params: &MotionParams) -> Option<ArmOutcome> {
        if self.state == ArmState::Idle {
            return None;
        }
        let gap_exceeded = self
            .last_valid_ms
            .map_or(true, |last| timestamp_ms - last > params.max_gap_ms);
        if gap_exceeded {
            self.forget_guard();
            return Some(self.abort(AbortReason::ConfidenceGap, timestamp_ms));
        }
        let too_long = self
            .progress
            .as_ref()
            .is_some_and(|p| timestamp_ms - p.start_ms > params.max_segment_ms);
        if too_long {
            self.forget_guard();
            return Some(self.abort(AbortReason::DurationCeiling, timestamp_ms));
        }
        None
    }

    fn step_idle(
        &mut self,
        timestamp_ms: f64,
        reading: &WristReading,
        velocity: &VelocityEstimate,
        params: &MotionParams,
        cooling: bool,
    ) {
        if velocity.magnitude < params.onset_threshold {
            self.suppressed = false;
            self.note_rest(reading.position, timestamp_ms, params);
            return;
        }
        self.rest_since_ms = None;
        if self.suppressed {
            return;
        }
        let (Some(guard), Some((start_pos, start_ms))) = (self.guard, self.last_rest) else {
            // Moving without a known guard position: wait for rest
            self.suppressed = true;
            return;
        };

        let away_from_guard = (reading.position - guard).dot(velocity.direction) > 0.0;
        if !away_from_guard {
            return;
        }
        if cooling {
            trace!(arm = self.arm.as_str(), at_ms = timestamp_ms, "onset ignored during cooldown");
            self.suppressed = true;
            return;
        }

        let mut progress = SegmentProgress {
            start_pos,
            start_ms,
            peak_ms: timestamp_ms,
            peak_velocity: velocity.magnitude,
            peak_direction: velocity.direction,
            prev_magnitude: velocity.magnitude,
            last_direction: velocity.direction,
            consistent_frames: 1,
            farthest: Vec2::ZERO,
            confidence_floor: reading.confidence,
            retract_since_ms: timestamp_ms,
            peak_reach: None,
        };
        progress.observe(reading);
        self.progress = Some(progress);
        self.transition(ArmState::Winding, timestamp_ms);
    }

    fn step_winding(
        &mut self,
        timestamp_ms: f64,
        reading: &WristReading,
        velocity: &VelocityEstimate,
        params: &MotionParams,
    ) -> Option<ArmOutcome> {
        let progress = self.progress.as_mut()?;
        let consistent = velocity.magnitude >= params.onset_threshold
            && velocity.direction.dot(progress.last_direction) >= params.direction_consistency;

        if !consistent {
            let outcome = self.abort(AbortReason::NotSustained, timestamp_ms);
            if velocity.magnitude < params.onset_threshold {
                self.note_rest(reading.position, timestamp_ms, params);
            } else {
                self.suppressed = true;
            }
            return Some(outcome);
        }

        progress.consistent_frames += 1;
        progress.last_direction = velocity.direction;
        progress.prev_magnitude = velocity.magnitude;
        if velocity.magnitude >= progress.peak_velocity {
            progress.peak_velocity = velocity.magnitude;
            progress.peak_ms = timestamp_ms;
            progress.peak_direction = velocity.direction;
        }

        if progress.consistent_frames >= SUSTAINED_FRAMES {
            self.transition(ArmState::Extending, timestamp_ms);
        }
        None
    }

    fn step_active(
        &mut self,
        timestamp_ms: f64,
        reading: &WristReading,
        velocity: &VelocityEstimate,
        params: &MotionParams,
    ) -> Option<ArmOutcome> {
        if self.state == ArmState::Extending {
            let progress = self.progress.as_mut()?;
            if velocity.magnitude < progress.prev_magnitude {
                self.transition(ArmState::Peaked, timestamp_ms);
            } else {
                progress.prev_magnitude = velocity.magnitude;
                if velocity.magnitude > progress.peak_velocity {
                    progress.peak_velocity = velocity.magnitude;
                    progress.peak_ms = timestamp_ms;
                    progress.peak_direction = velocity.direction;
                }
                return None;
            }
        }

        if self.state == ArmState::Peaked {
            let progress = self.progress.as_mut()?;
            let reversed = velocity.direction.dot(progress.peak_direction) < 0.0;
            let slowed = velocity.magnitude < params.retract_fraction * progress.peak_velocity;
            if !(reversed || slowed) {
                return None;
            }
            progress.retract_since_ms = timestamp_ms;
            self.transition(ArmState::Retracting, timestamp_ms);
        }

        let progress = self.progress.take()?;
        let at_rest = velocity.magnitude < params.onset_threshold;
        let timed_out = timestamp_ms - progress.retract_since_ms >= params.idle_timeout_ms;
        if !(at_rest || timed_out) {
            self.progress = Some(progress);
            return None;
        }

        let segment = MotionSegment {
            arm: self.arm,
            start_ms: progress.start_ms,
            peak_ms: progress.peak_ms,
            end_ms: timestamp_ms,
            displacement: progress.farthest,
            peak_velocity: progress.peak_velocity,
            confidence_floor: progress.confidence_floor,
            peak_reach: progress.peak_reach,
        };
        self.guard = Some(progress.start_pos);
        self.returning = Some(segment.extension());
        self.last_rest = Some((reading.position, timestamp_ms));
        self.rest_since_ms = at_rest.then_some(timestamp_ms);
        self.suppressed = !at_rest;
        self.transition(ArmState::Idle, timestamp_ms);
        Some(ArmOutcome::Completed(segment))
    }

    /// Record a resting wrist, moving the guard unless a return is pending
    fn note_rest(&mut self, position: Vec2, timestamp_ms: f64, params: &MotionParams) {
        let rest_since = *self.rest_since_ms.get_or_insert(timestamp_ms);
        if let Some(extension) = self.returning {
            let back_on_guard = self
                .guard
                .map_or(true, |g| g.distance(position) <= GUARD_RETURN_FRACTION * extension);
            if back_on_guard || timestamp_ms - rest_since >= params.idle_timeout_ms {
                self.returning = None;
            }
        }
        if self.returning.is_none() {
            self.guard = Some(position);
        }
        self.last_rest = Some((position, timestamp_ms));
    }

    fn forget_guard(&mut self) {
        self.guard = None;
        self.last_rest = None;
        self.rest_since_ms = None;
        self.returning = None;
    }

    fn abort(&mut self, reason: AbortReason, at_ms: f64) -> ArmOutcome {
        debug!(
            arm = self.arm.as_str(),
            from = self.state.as_str(),
            ?reason,
            at_ms,
            "segment aborted"
        );
        self.progress = None;
        self.state = ArmState::Idle;
        ArmOutcome::Aborted { reason, at_ms }
    }

    fn transition(&mut self, next: ArmState, at_ms: f64) {
        debug!(
            arm = self.arm.as_str(),
            from = self.state.as_str(),
            to = next.as_str(),
            at_ms,
            "arm transition"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{jitter, rest, right_punch, stroke, Trajectory};
    use crate::types::{Joint, KeypointSample};
    use crate::velocity::VelocityEstimator;

    fn params() -> MotionParams {
        MotionParams {
            onset_threshold: 0.6,
            direction_consistency: 0.7,
            retract_fraction: 0.3,
            max_gap_ms: 150.0,
            max_segment_ms: 1500.0,
            idle_timeout_ms: 400.0,
        }
    }

    struct Harness {
        machine: ArmStateMachine,
        estimator: VelocityEstimator,
        outcomes: Vec<ArmOutcome>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                machine: ArmStateMachine::new(Arm::Right),
                estimator: VelocityEstimator::new(10, 3, 150.0),
                outcomes: Vec::new(),
            }
        }

        fn feed(&mut self, path: &Trajectory) {
            for &(t, position) in path {
                let update = self.estimator.update(KeypointSample {
                    joint: Joint::RightWrist,
                    position,
                    confidence: 0.9,
                    timestamp_ms: t,
                });
                let reading = WristReading {
                    position,
                    confidence: 0.9,
                    velocity: update.velocity,
                    track_reset: update.reset,
                    reach: None,
                };
                if let Some(o) = self.machine.step(t, Some(&reading), &params(), false) {
                    self.outcomes.push(o);
                }
            }
        }

        fn miss(&mut self, t: f64) {
            if let Some(o) = self.machine.step(t, None, &params(), false) {
                self.outcomes.push(o);
            }
        }

        fn completed(&self) -> Vec<&MotionSegment> {
            self.outcomes
                .iter()
                .filter_map(|o| match o {
                    ArmOutcome::Completed(s) => Some(s),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_rest_stays_idle() {
        let mut h = Harness::new();
        h.feed(&rest(Vec2::new(0.3, 0.5), 0.0, 10, 33.0));
        assert_eq!(h.machine.state(), ArmState::Idle);
        assert!(h.outcomes.is_empty());
    }

    #[test]
    fn test_jitter_never_leaves_idle() {
        let mut h = Harness::new();
        h.feed(&jitter(Vec2::new(0.3, 0.5), 0.0, 90, 33.0, 0.003));
        assert!(h.outcomes.is_empty());
        assert_eq!(h.machine.state(), ArmState::Idle);
    }

    #[test]
    fn test_punch_emits_one_segment() {
        let mut h = Harness::new();
        h.feed(&right_punch(0.0, 15.0));

        let segments = h.completed();
        assert_eq!(segments.len(), 1);
        let segment = segments[0];
        assert_eq!(segment.arm, Arm::Right);
        assert!((segment.extension() - 0.3).abs() < 0.02);
        assert!((segment.peak_velocity - 4.0).abs() < 0.6);
        assert!(segment.peak_ms > segment.start_ms && segment.end_ms > segment.peak_ms);
        assert!(segment.angle_deg().abs() < 1.0);
        assert_eq!(h.machine.state(), ArmState::Idle);
    }

    #[test]
    fn test_passes_through_every_phase() {
        let mut h = Harness::new();
        let guard = Vec2::new(0.3, 0.5);
        let mut path = rest(guard, 0.0, 10, 15.0);
        path.extend(stroke(guard, Vec2::new(0.3, 0.0), 135.0, 150.0, 15.0));

        let mut seen = vec![h.machine.state()];
        for point in path {
            h.feed(&vec![point]);
            if seen.last() != Some(&h.machine.state()) {
                seen.push(h.machine.state());
            }
        }
        assert_eq!(
            seen,
            vec![
                ArmState::Idle,
                ArmState::Winding,
                ArmState::Extending,
                ArmState::Peaked,
                ArmState::Retracting,
            ]
        );
    }

    #[test]
    fn test_gap_aborts_segment() {
        let mut h = Harness::new();
        let guard = Vec2::new(0.3, 0.5);
        h.feed(&rest(guard, 0.0, 10, 15.0));
        let out = stroke(guard, Vec2::new(0.3, 0.0), 135.0, 150.0, 15.0);
        // First half of the punch, then the wrist drops out
        h.feed(&out[..5].to_vec());
        assert_ne!(h.machine.state(), ArmState::Idle);

        for i in 1..=12 {
            h.miss(210.0 + 15.0 * i as f64);
        }
        assert_eq!(h.machine.state(), ArmState::Idle);
        assert!(h.completed().is_empty());
        assert!(matches!(
            h.outcomes.last(),
            Some(ArmOutcome::Aborted {
                reason: AbortReason::ConfidenceGap,
                ..
            })
        ));
    }

    #[test]
    fn test_short_gap_is_tolerated() {
        let mut h = Harness::new();
        let guard = Vec2::new(0.3, 0.5);
        h.feed(&rest(guard, 0.0, 10, 15.0));
        let out = stroke(guard, Vec2::new(0.3, 0.0), 135.0, 150.0, 15.0);
        h.feed(&out[..4].to_vec());
        h.miss(out[4].0);
        assert_ne!(h.machine.state(), ArmState::Idle);
    }

    #[test]
    fn test_slow_drift_hits_duration_ceiling() {
        let mut h = Harness::new();
        let guard = Vec2::new(0.2, 0.5);
        h.feed(&rest(guard, 0.0, 10, 20.0));
        // Constant 0.8 units/s drift that never slows down
        let drift: Trajectory = (1..=80)
            .map(|i| (180.0 + 20.0 * i as f64, guard + Vec2::new(0.016 * i as f64, 0.0)))
            .collect();
        h.feed(&drift);
        assert!(h.completed().is_empty());
        assert!(h.outcomes.iter().any(|o| matches!(
            o,
            ArmOutcome::Aborted {
                reason: AbortReason::DurationCeiling,
                ..
            }
        )));
    }

    #[test]
    fn test_cooling_suppresses_onset() {
        let mut machine = ArmStateMachine::new(Arm::Right);
        let mut estimator = VelocityEstimator::new(10, 3, 150.0);
        let mut outcomes = Vec::new();
        for (t, position) in right_punch(0.0, 15.0) {
            let update = estimator.update(KeypointSample {
                joint: Joint::RightWrist,
                position,
                confidence: 0.9,
                timestamp_ms: t,
            });
            let reading = WristReading {
                position,
                confidence: 0.9,
                velocity: update.velocity,
                track_reset: update.reset,
                reach: None,
            };
            outcomes.extend(machine.step(t, Some(&reading), &params(), true));
        }
        assert!(outcomes.is_empty());
        assert_eq!(machine.state(), ArmState::Idle);
    }

    fn forward(t: f64, x: f64, magnitude: f64, reach: f64) -> (f64, WristReading) {
        let position = Vec2::new(x, 0.5);
        let reading = WristReading {
            position,
            confidence: 0.9,
            velocity: Some(VelocityEstimate {
                magnitude,
                direction: Vec2::new(1.0, 0.0),
                position,
                timestamp_ms: t,
            }),
            track_reset: false,
            reach: Some(reach),
        };
        (t, reading)
    }

    #[test]
    fn test_peak_kept_across_uneven_acceleration() {
        let mut machine = ArmStateMachine::new(Arm::Right);
        let readings = [
            forward(0.0, 0.30, 0.0, 0.5),
            forward(20.0, 0.30, 0.0, 0.5),
            forward(40.0, 0.36, 3.0, 0.6),
            forward(60.0, 0.40, 2.0, 0.7),
            forward(80.0, 0.45, 2.5, 0.95),
            forward(100.0, 0.47, 1.0, 0.9),
            forward(120.0, 0.47, 0.1, 0.8),
        ];

        let mut outcomes = Vec::new();
        for (t, reading) in &readings {
            outcomes.extend(machine.step(*t, Some(reading), &params(), false));
        }

        match outcomes.as_slice() {
            [ArmOutcome::Completed(segment)] => {
                assert_eq!(segment.peak_velocity, 3.0);
                assert_eq!(segment.peak_ms, 40.0);
                assert_eq!(segment.peak_reach, Some(0.95));
                assert!((segment.extension() - 0.17).abs() < 1e-9);
            }
            other => panic!("expected one completed segment, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut h = Harness::new();
        let guard = Vec2::new(0.3, 0.5);
        h.feed(&rest(guard, 0.0, 10, 15.0));
        h.feed(&stroke(guard, Vec2::new(0.3, 0.0), 135.0, 150.0, 15.0)[..5].to_vec());
        assert_ne!(h.machine.state(), ArmState::Idle);

        h.machine.reset();
        assert_eq!(h.machine.state(), ArmState::Idle);
        h.machine.reset();
        assert_eq!(h.machine.state(), ArmState::Idle);
    }
}
