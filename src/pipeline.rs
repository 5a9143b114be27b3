//! Pipeline orchestration
//!
//! This module provides the public API for Punch Flux. [`PunchTracker`] runs
//! the frame-synchronous pipeline and owns every piece of mutable state:
//!
//! 1. KeypointIngestor - validate joints against the confidence floor
//! 2. VelocityEstimator - smoothed wrist velocity, plus the arm extension
//!    ratio from shoulder, elbow and wrist
//! 3. ArmStateMachine - one per arm, emits motion segments
//! 4. PunchClassifier - segment to punch type
//! 5. CooldownGuard - per-arm debounce
//! 6. SessionStats - counters and punches-per-minute

use crate::adapters::PoseFrameAdapter;
use crate::arm::{ArmOutcome, ArmStateMachine, MotionParams, WristReading};
use crate::calibration::{Calibration, CalibrationProfile, CalibrationRecorder};
use crate::classifier::{Classification, PunchClassifier};
use crate::config::{TrackerConfig, SENSITIVITY_STEP};
use crate::cooldown::{CooldownGuard, DebounceOutcome};
use crate::error::TrackerError;
use crate::ingest::KeypointIngestor;
use crate::stats::{SessionStats, SessionSummary, StatsSnapshot};
use crate::types::{AbortReason, Arm, ArmState, MotionSegment, PoseFrame, PunchEvent, PunchType};
use crate::velocity::VelocityEstimator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Detect punches in a finished recording.
///
/// Runs a fresh tracker with default configuration over `frames` inside a
/// single session.
///
/// # Example
/// ```ignore
/// let frames = MoveNetAdapter.parse_ndjson(&recording)?;
/// let events = frames_to_events(&frames)?;
/// ```
pub fn frames_to_events(frames: &[PoseFrame]) -> Result<Vec<PunchEvent>, TrackerError> {
    let mut tracker = PunchTracker::new();
    tracker.start_session()?;
    tracker.process_frames(frames)
}

/// Parse NDJSON pose frames with `adapter` and detect punches in them
pub fn ndjson_to_events(
    adapter: &dyn PoseFrameAdapter,
    input: &str,
) -> Result<Vec<PunchEvent>, TrackerError> {
    let frames = adapter.parse_ndjson(input)?;
    frames_to_events(&frames)
}

/// What the tracker does with incoming frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    /// No session: frames are checked for ordering and otherwise ignored
    Standby,
    /// Session running: punches are classified, debounced and counted
    Tracking,
    /// Session held open: frames are skipped and counters kept
    Paused,
    /// Segments are recorded as calibration samples, never counted
    Calibrating,
}

/// Stateful punch tracker.
///
/// Feed it one [`PoseFrame`] per camera frame, in strictly increasing
/// timestamp order.
pub struct PunchTracker {
    config: TrackerConfig,
    calibration: Calibration,
    mode: TrackerMode,
    ingestor: KeypointIngestor,
    estimator: VelocityEstimator,
    arms: BTreeMap<Arm, ArmStateMachine>,
    classifier: PunchClassifier,
    cooldown: CooldownGuard,
    stats: SessionStats,
    recorder: CalibrationRecorder,
    last_timestamp_ms: Option<f64>,
}

impl Default for PunchTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PunchTracker {
    /// Create a tracker with default configuration and built-in thresholds
    pub fn new() -> Self {
        Self::build(TrackerConfig::default(), Calibration::Defaults)
    }

    /// Create a tracker with custom configuration
    pub fn with_config(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self::build(config, Calibration::Defaults))
    }

    /// Create a tracker with a personal calibration profile
    pub fn with_profile(profile: CalibrationProfile) -> Result<Self, TrackerError> {
        profile.validate()?;
        Ok(Self::build(TrackerConfig::default(), Calibration::Personal(profile)))
    }

    fn build(config: TrackerConfig, calibration: Calibration) -> Self {
        let cooldown = CooldownGuard::new(calibration.profile().cooldown_ms);
        Self {
            ingestor: KeypointIngestor::new(config.confidence_floor),
            estimator: VelocityEstimator::new(
                config.track_capacity,
                config.smoothing_window,
                config.max_gap_ms,
            ),
            arms: Arm::ALL
                .iter()
                .map(|&arm| (arm, ArmStateMachine::new(arm)))
                .collect(),
            classifier: PunchClassifier::new(),
            cooldown,
            stats: SessionStats::new(config.stats_window_ms),
            recorder: CalibrationRecorder::new(),
            last_timestamp_ms: None,
            mode: TrackerMode::Standby,
            calibration,
            config,
        }
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn arm_state(&self, arm: Arm) -> ArmState {
        self.arms.get(&arm).map_or(ArmState::Idle, |m| m.state())
    }

    /// Process one frame, returning the punches accepted on it.
    ///
    /// Fails only on a non-finite or non-increasing timestamp; invalid joints
    /// are dropped from the frame.
    pub fn process_frame(&mut self, frame: &PoseFrame) -> Result<Vec<PunchEvent>, TrackerError> {
        let t = frame.timestamp_ms;
        if !t.is_finite() {
            return Err(TrackerError::InvalidTimestamp(t));
        }
        if let Some(previous_ms) = self.last_timestamp_ms {
            if t <= previous_ms {
                warn!(previous_ms, current_ms = t, "rejecting out-of-order frame");
                return Err(TrackerError::NonMonotonicTimestamp {
                    previous_ms,
                    current_ms: t,
                });
            }
        }
        self.last_timestamp_ms = Some(t);

        match self.mode {
            TrackerMode::Standby => return Ok(Vec::new()),
            TrackerMode::Paused => {
                self.stats.skip_to(t);
                return Ok(Vec::new());
            }
            TrackerMode::Tracking => self.stats.observe(t),
            TrackerMode::Calibrating => {}
        }

        let ingested = self.ingestor.ingest(frame)?;
        let params = self.motion_params();
        let mut events = Vec::new();
        for arm in Arm::ALL {
            let reading = ingested.sample(arm.wrist()).map(|sample| {
                let update = self.estimator.update(*sample);
                WristReading {
                    position: sample.position,
                    confidence: sample.confidence,
                    velocity: update.velocity,
                    track_reset: update.reset,
                    reach: ingested.arm_reach(arm),
                }
            });
            let cooling = self.cooldown.is_cooling(arm, t);

            let outcome = match self.arms.get_mut(&arm) {
                Some(machine) => machine.step(t, reading.as_ref(), &params, cooling),
                None => None,
            };
            match outcome {
                Some(ArmOutcome::Completed(segment)) => {
                    events.extend(self.handle_segment(&segment));
                }
                Some(ArmOutcome::Aborted { reason, at_ms }) => log_abort(arm, reason, at_ms),
                None => {}
            }
        }

        Ok(events)
    }

    /// Process frames in order, collecting every accepted punch
    pub fn process_frames(&mut self, frames: &[PoseFrame]) -> Result<Vec<PunchEvent>, TrackerError> {
        let mut events = Vec::new();
        for frame in frames {
            events.extend(self.process_frame(frame)?);
        }
        Ok(events)
    }

    fn handle_segment(&mut self, segment: &MotionSegment) -> Option<PunchEvent> {
        if self.mode == TrackerMode::Calibrating {
            let stance = self.calibration.profile().stance;
            self.recorder.record(segment, stance);
            return None;
        }

        match self.classifier.classify(segment, self.calibration.profile()) {
            Classification::Punch(event) => {
                match self.cooldown.try_accept(event.arm, segment.end_ms) {
                    DebounceOutcome::Accepted => {
                        self.stats.record(&event);
                        info!(
                            arm = event.arm.as_str(),
                            punch_type = event.punch_type.as_str(),
                            at_ms = event.timestamp_ms,
                            peak_velocity = event.peak_velocity,
                            confidence = event.confidence,
                            "punch"
                        );
                        Some(event)
                    }
                    DebounceOutcome::Debounced { until_ms } => {
                        debug!(arm = event.arm.as_str(), until_ms, "punch debounced");
                        None
                    }
                }
            }
            Classification::Rejected(reason) => {
                debug!(arm = segment.arm.as_str(), ?reason, "segment rejected");
                None
            }
        }
    }

    fn motion_params(&self) -> MotionParams {
        MotionParams {
            onset_threshold: self.config.effective_onset(),
            direction_consistency: self.config.direction_consistency,
            retract_fraction: self.config.retract_fraction,
            max_gap_ms: self.config.max_gap_ms,
            max_segment_ms: self.config.max_segment_ms,
            idle_timeout_ms: self.calibration.profile().idle_timeout_ms,
        }
    }

    /// Current session counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Begin a tracking session with fresh counters
    pub fn start_session(&mut self) -> Result<(), TrackerError> {
        if self.mode == TrackerMode::Calibrating {
            return Err(TrackerError::CalibrationActive);
        }
        self.reset_motion();
        self.stats = SessionStats::new(self.config.stats_window_ms);
        self.mode = TrackerMode::Tracking;
        info!(session_id = %self.stats.session_id(), "session started");
        Ok(())
    }

    /// Hold the running session open without counting.
    ///
    /// Frames keep their ordering check but are otherwise skipped, and the
    /// paused time is left out of the session duration. Any punch in
    /// progress is discarded.
    pub fn pause_session(&mut self) -> Result<(), TrackerError> {
        match self.mode {
            TrackerMode::Tracking => {
                self.restart_tracks();
                self.mode = TrackerMode::Paused;
                info!(session_id = %self.stats.session_id(), "session paused");
                Ok(())
            }
            TrackerMode::Paused => Ok(()),
            _ => Err(TrackerError::SessionInactive),
        }
    }

    /// Continue a paused session with its counters intact.
    ///
    /// Wrist tracks start over, so the pause never reads as a tracking gap.
    pub fn resume_session(&mut self) -> Result<(), TrackerError> {
        match self.mode {
            TrackerMode::Paused => {
                self.restart_tracks();
                self.mode = TrackerMode::Tracking;
                info!(session_id = %self.stats.session_id(), "session resumed");
                Ok(())
            }
            TrackerMode::Tracking => Ok(()),
            _ => Err(TrackerError::SessionInactive),
        }
    }

    /// End the running or paused session and return its totals
    pub fn stop_session(&mut self) -> Result<SessionSummary, TrackerError> {
        if !matches!(self.mode, TrackerMode::Tracking | TrackerMode::Paused) {
            return Err(TrackerError::SessionInactive);
        }
        let summary = self.stats.summary();
        self.reset_motion();
        self.mode = TrackerMode::Standby;
        info!(
            session_id = %summary.session_id,
            total = summary.total,
            average_ppm = summary.average_punches_per_minute,
            "session stopped"
        );
        Ok(summary)
    }

    /// Zero the counters and return both arms to Idle.
    ///
    /// The calibration, configuration and mode are kept. The timestamp
    /// ordering check restarts, so a new stream may begin at any time.
    pub fn reset(&mut self) {
        self.reset_motion();
        self.stats.reset();
        debug!("tracker reset");
    }

    fn reset_motion(&mut self) {
        self.restart_tracks();
        self.cooldown.reset();
        self.last_timestamp_ms = None;
    }

    fn restart_tracks(&mut self) {
        self.estimator.reset();
        for machine in self.arms.values_mut() {
            machine.reset();
        }
    }

    /// Switch to calibration mode, discarding any running session
    pub fn enter_calibration(&mut self) {
        if matches!(self.mode, TrackerMode::Tracking | TrackerMode::Paused) {
            warn!("entering calibration ends the running session");
        }
        self.reset();
        self.recorder.clear();
        self.mode = TrackerMode::Calibrating;
        info!("calibration started");
    }

    /// Label subsequent calibration motions as `punch_type`
    pub fn set_calibration_target(&mut self, punch_type: PunchType) -> Result<(), TrackerError> {
        if self.mode != TrackerMode::Calibrating {
            return Err(TrackerError::NotCalibrating);
        }
        self.recorder.set_target(punch_type);
        debug!(punch_type = punch_type.as_str(), "calibration target set");
        Ok(())
    }

    pub fn calibration_sample_count(&self, punch_type: PunchType) -> usize {
        self.recorder.sample_count(punch_type)
    }

    /// Derive and install a profile from the recorded samples.
    ///
    /// Without enough samples the tracker stays in calibration mode so more
    /// can be recorded.
    pub fn exit_calibration(&mut self) -> Result<CalibrationProfile, TrackerError> {
        if self.mode != TrackerMode::Calibrating {
            return Err(TrackerError::NotCalibrating);
        }
        let profile = self.recorder.derive(self.calibration.profile())?;
        self.install(profile.clone());
        self.recorder.clear();
        self.reset();
        self.mode = TrackerMode::Standby;
        Ok(profile)
    }

    /// Leave calibration mode without changing the profile
    pub fn cancel_calibration(&mut self) -> Result<(), TrackerError> {
        if self.mode != TrackerMode::Calibrating {
            return Err(TrackerError::NotCalibrating);
        }
        self.recorder.clear();
        self.reset();
        self.mode = TrackerMode::Standby;
        info!("calibration cancelled");
        Ok(())
    }

    /// Lower the onset threshold one step; returns the new sensitivity
    pub fn increase_sensitivity(&mut self) -> f64 {
        let sensitivity = self.config.adjust_sensitivity(SENSITIVITY_STEP);
        info!(sensitivity, onset = self.config.effective_onset(), "sensitivity increased");
        sensitivity
    }

    /// Raise the onset threshold one step; returns the new sensitivity
    pub fn decrease_sensitivity(&mut self) -> f64 {
        let sensitivity = self.config.adjust_sensitivity(-SENSITIVITY_STEP);
        info!(sensitivity, onset = self.config.effective_onset(), "sensitivity decreased");
        sensitivity
    }

    /// Serialize the thresholds in effect
    pub fn save_profile(&self) -> Result<String, TrackerError> {
        self.calibration
            .profile()
            .to_json()
            .map_err(TrackerError::JsonError)
    }

    /// Install a profile from JSON
    pub fn load_profile(&mut self, json: &str) -> Result<(), TrackerError> {
        let profile = CalibrationProfile::from_json(json)?;
        self.install(profile);
        Ok(())
    }

    /// Install a personal profile
    pub fn set_profile(&mut self, profile: CalibrationProfile) -> Result<(), TrackerError> {
        profile.validate()?;
        self.install(profile);
        Ok(())
    }

    /// Fall back to built-in thresholds
    pub fn clear_profile(&mut self) {
        self.calibration = Calibration::Defaults;
        self.cooldown
            .set_cooldown_ms(self.calibration.profile().cooldown_ms);
        info!("using built-in thresholds");
    }

    fn install(&mut self, profile: CalibrationProfile) {
        self.cooldown.set_cooldown_ms(profile.cooldown_ms);
        info!(
            stance = ?profile.stance,
            cooldown_ms = profile.cooldown_ms,
            calibrated = profile.calibrated_at.is_some(),
            "calibration profile installed"
        );
        self.calibration = Calibration::Personal(profile);
    }
}

fn log_abort(arm: Arm, reason: AbortReason, at_ms: f64) {
    match reason {
        AbortReason::NotSustained => {
            debug!(arm = arm.as_str(), ?reason, at_ms, "motion discarded")
        }
        _ => warn!(arm = arm.as_str(), ?reason, at_ms, "segment discarded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NamedJointAdapter;
    use crate::test_support::{jitter, rest, right_punch, stroke, wrist_frames, Trajectory};
    use crate::types::{Joint, Stance, Vec2};
    use pretty_assertions::assert_eq;

    fn tracking() -> PunchTracker {
        let mut tracker = PunchTracker::new();
        tracker.start_session().unwrap();
        tracker
    }

    /// Two forward strokes of the right wrist starting 100 ms apart
    fn double_punch() -> Trajectory {
        let guard = Vec2::new(0.3, 0.5);
        let reach = Vec2::new(0.2, 0.0);
        let mut path = rest(guard, 0.0, 10, 10.0);
        path.extend(stroke(guard, reach, 90.0, 60.0, 10.0));
        path.extend(rest(guard + reach, 160.0, 3, 10.0));
        path.extend(stroke(guard + reach, reach, 190.0, 60.0, 10.0));
        path.extend(rest(guard + reach * 2.0, 260.0, 10, 10.0));
        path
    }

    #[test]
    fn test_rest_stays_idle() {
        let mut tracker = tracking();
        let frames = wrist_frames(&rest(Vec2::new(0.3, 0.5), 0.0, 10, 33.0), Arm::Right, 0.9);
        let events = tracker.process_frames(&frames).unwrap();

        assert!(events.is_empty());
        assert_eq!(tracker.arm_state(Arm::Left), ArmState::Idle);
        assert_eq!(tracker.arm_state(Arm::Right), ArmState::Idle);
    }

    #[test]
    fn test_forward_punch_yields_one_event() {
        let mut tracker = tracking();
        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        let events = tracker.process_frames(&frames).unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.arm, Arm::Right);
        assert_eq!(event.punch_type, PunchType::Cross);
        // 0.3 units over 150 ms peaks near 0.3 / 0.075 units/s
        assert!((event.peak_velocity - 0.3 / 0.075).abs() < 0.6);
        assert!((event.extension - 0.3).abs() < 0.02);
        assert!(event.angle_deg.abs() < 1.0);

        let stats = tracker.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_type[&PunchType::Cross], 1);
        assert_eq!(stats.by_arm[&Arm::Right], 1);
    }

    #[test]
    fn test_forward_punch_with_stricter_extension() {
        let mut profile = CalibrationProfile::builtin();
        if let Some(cross) = profile.thresholds.get_mut(&PunchType::Cross) {
            cross.min_extension = 0.2;
        }
        let mut tracker = PunchTracker::with_profile(profile).unwrap();
        tracker.start_session().unwrap();

        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        let events = tracker.process_frames(&frames).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].punch_type, PunchType::Cross);
        assert!(events[0].extension >= 0.2);
    }

    #[test]
    fn test_lead_arm_punch_is_jab() {
        let mut tracker = tracking();
        // Mirror the right-arm punch onto the left wrist
        let path: Trajectory = right_punch(0.0, 15.0)
            .into_iter()
            .map(|(t, p)| (t, Vec2::new(1.0 - p.x, p.y)))
            .collect();
        let events = tracker
            .process_frames(&wrist_frames(&path, Arm::Left, 0.9))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].punch_type, PunchType::Jab);
        assert_eq!(events[0].arm, Arm::Left);
    }

    #[test]
    fn test_jitter_yields_nothing() {
        let mut tracker = tracking();
        let path = jitter(Vec2::new(0.3, 0.5), 0.0, 300, 33.0, 0.004);
        let events = tracker
            .process_frames(&wrist_frames(&path, Arm::Right, 0.9))
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(tracker.stats().total, 0);
    }

    #[test]
    fn test_second_punch_inside_cooldown_is_dropped() {
        let mut tracker = tracking();
        let frames = wrist_frames(&double_punch(), Arm::Right, 0.9);
        let events = tracker.process_frames(&frames).unwrap();
        assert_eq!(events.len(), 1);

        // Same motion with a cooldown shorter than the spacing counts twice
        let mut profile = CalibrationProfile::builtin();
        profile.cooldown_ms = 40.0;
        let mut tracker = PunchTracker::with_profile(profile).unwrap();
        tracker.start_session().unwrap();
        let events = tracker.process_frames(&frames).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.punch_type == PunchType::Cross));
    }

    #[test]
    fn test_confidence_gap_discards_punch() {
        let mut tracker = tracking();
        let mut frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        for frame in frames
            .iter_mut()
            .filter(|f| (195.0..=400.0).contains(&f.timestamp_ms))
        {
            if let Some(kp) = frame.keypoints.get_mut(&Joint::RightWrist) {
                kp.confidence = 0.1;
            }
        }

        let events = tracker.process_frames(&frames).unwrap();
        assert!(events.is_empty());
        assert_eq!(tracker.arm_state(Arm::Right), ArmState::Idle);
    }

    #[test]
    fn test_low_confidence_throughout_yields_nothing() {
        let mut tracker = tracking();
        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.2);
        assert!(tracker.process_frames(&frames).unwrap().is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut tracker = tracking();
        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        tracker.process_frames(&frames[..25]).unwrap();
        tracker.process_frames(&frames[25..]).unwrap();
        assert_eq!(tracker.stats().total, 1);

        tracker.reset();
        let once = tracker.stats();
        tracker.reset();
        assert_eq!(tracker.stats(), once);
        assert_eq!(once.total, 0);
        assert_eq!(tracker.arm_state(Arm::Right), ArmState::Idle);
        assert_eq!(tracker.mode(), TrackerMode::Tracking);

        // Counting resumes on a fresh stream
        let events = tracker.process_frames(&frames).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_reset_mid_punch_returns_arm_to_idle() {
        let mut tracker = tracking();
        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        tracker.process_frames(&frames[..15]).unwrap();
        assert_ne!(tracker.arm_state(Arm::Right), ArmState::Idle);

        tracker.reset();
        assert_eq!(tracker.arm_state(Arm::Right), ArmState::Idle);
    }

    #[test]
    fn test_non_monotonic_timestamp_is_fatal() {
        let mut tracker = tracking();
        tracker.process_frame(&PoseFrame::new(100.0)).unwrap();

        let err = tracker.process_frame(&PoseFrame::new(100.0)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::NonMonotonicTimestamp {
                previous_ms,
                current_ms
            } if previous_ms == 100.0 && current_ms == 100.0
        ));
        assert!(tracker.process_frame(&PoseFrame::new(50.0)).is_err());
        assert!(tracker.process_frame(&PoseFrame::new(f64::NAN)).is_err());
        assert!(tracker.process_frame(&PoseFrame::new(133.0)).is_ok());
    }

    #[test]
    fn test_standby_ignores_frames() {
        let mut tracker = PunchTracker::new();
        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        assert!(tracker.process_frames(&frames).unwrap().is_empty());
        assert_eq!(tracker.stats().total, 0);
    }

    #[test]
    fn test_session_lifecycle() {
        let mut tracker = tracking();
        let frames = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        tracker.process_frames(&frames).unwrap();

        let summary = tracker.stop_session().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.by_type[&PunchType::Cross], 1);
        assert!(summary.duration_ms > 0.0);
        assert_eq!(tracker.mode(), TrackerMode::Standby);
        assert!(matches!(
            tracker.stop_session(),
            Err(TrackerError::SessionInactive)
        ));

        tracker.start_session().unwrap();
        assert_eq!(tracker.stats().total, 0);
        assert_ne!(tracker.stop_session().unwrap().session_id, summary.session_id);
    }

    #[test]
    fn test_pause_skips_frames_and_keeps_counters() {
        let mut tracker = tracking();
        assert!(matches!(
            PunchTracker::new().pause_session(),
            Err(TrackerError::SessionInactive)
        ));

        let first = wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9);
        assert_eq!(tracker.process_frames(&first).unwrap().len(), 1);

        tracker.pause_session().unwrap();
        assert_eq!(tracker.mode(), TrackerMode::Paused);
        let paused = wrist_frames(&right_punch(1000.0, 15.0), Arm::Right, 0.9);
        assert!(tracker.process_frames(&paused).unwrap().is_empty());
        assert_eq!(tracker.stats().total, 1);
        // Ordering is still enforced while paused
        assert!(tracker.process_frame(&PoseFrame::new(1000.0)).is_err());

        tracker.resume_session().unwrap();
        assert_eq!(tracker.mode(), TrackerMode::Tracking);
        let resumed = wrist_frames(&right_punch(3000.0, 15.0), Arm::Right, 0.9);
        assert_eq!(tracker.process_frames(&resumed).unwrap().len(), 1);

        let summary = tracker.stop_session().unwrap();
        assert_eq!(summary.total, 2);
        let active_ms = resumed[resumed.len() - 1].timestamp_ms
            - (paused[paused.len() - 1].timestamp_ms - first[first.len() - 1].timestamp_ms);
        assert!((summary.duration_ms - active_ms).abs() < 1e-6);
    }

    #[test]
    fn test_straight_arm_turns_rising_punch_into_cross() {
        // Right wrist punching 20 degrees upward, inside both cross and hook ranges
        let guard = Vec2::new(0.3, 0.5);
        let direction = Vec2::new(20f64.to_radians().cos(), -20f64.to_radians().sin());
        let reach = direction * 0.3;
        let mut path = rest(guard, 0.0, 10, 15.0);
        path.extend(stroke(guard, reach, 135.0, 150.0, 15.0));
        path.extend(stroke(guard + reach, reach * -1.0, 285.0, 150.0, 15.0));
        path.extend(rest(guard, 450.0, 10, 15.0));

        // Without elbows the closer hook range wins
        let mut tracker = tracking();
        let events = tracker
            .process_frames(&wrist_frames(&path, Arm::Right, 0.9))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].punch_type, PunchType::Hook);

        // Shoulder and elbow in line behind the wrist: a straight arm
        let elbow = guard - direction * 0.05;
        let shoulder = guard - direction * 0.1;
        let frames: Vec<PoseFrame> = path
            .iter()
            .map(|&(t, p)| {
                PoseFrame::new(t)
                    .with_joint(Joint::RightWrist, p.x, p.y, 0.9)
                    .with_joint(Joint::RightElbow, elbow.x, elbow.y, 0.9)
                    .with_joint(Joint::RightShoulder, shoulder.x, shoulder.y, 0.9)
            })
            .collect();
        let mut tracker = tracking();
        let events = tracker.process_frames(&frames).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].punch_type, PunchType::Cross);
        assert!((events[0].angle_deg - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_calibration_produces_profile() {
        let mut tracker = tracking();
        assert!(matches!(
            tracker.set_calibration_target(PunchType::Cross),
            Err(TrackerError::NotCalibrating)
        ));

        tracker.enter_calibration();
        assert!(matches!(
            tracker.start_session(),
            Err(TrackerError::CalibrationActive)
        ));
        tracker.set_calibration_target(PunchType::Cross).unwrap();
        for start in [0.0, 1000.0, 2000.0] {
            let frames = wrist_frames(&right_punch(start, 15.0), Arm::Right, 0.9);
            assert!(tracker.process_frames(&frames).unwrap().is_empty());
        }
        assert_eq!(tracker.calibration_sample_count(PunchType::Cross), 3);
        assert_eq!(tracker.stats().total, 0);

        let profile = tracker.exit_calibration().unwrap();
        assert!(profile.calibrated_at.is_some());
        let cross = profile.thresholds(PunchType::Cross).unwrap();
        assert!(cross.min_peak_velocity > 2.0 && cross.min_peak_velocity < 3.0);
        assert!(cross.min_extension > 0.18 && cross.min_extension < 0.22);
        // Untouched types keep built-in thresholds
        assert_eq!(
            profile.thresholds(PunchType::Hook),
            CalibrationProfile::builtin().thresholds(PunchType::Hook)
        );
        assert!(tracker.calibration().is_personal());
        assert_eq!(tracker.mode(), TrackerMode::Standby);
    }

    #[test]
    fn test_calibration_without_samples_stays_open() {
        let mut tracker = PunchTracker::new();
        tracker.enter_calibration();
        assert!(matches!(
            tracker.exit_calibration(),
            Err(TrackerError::InsufficientCalibrationData(_))
        ));
        assert_eq!(tracker.mode(), TrackerMode::Calibrating);
        tracker.cancel_calibration().unwrap();
        assert!(!tracker.calibration().is_personal());
    }

    #[test]
    fn test_sensitivity_steps_are_clamped() {
        let mut tracker = PunchTracker::new();
        let raised = tracker.increase_sensitivity();
        assert!(raised > 1.0);
        for _ in 0..50 {
            tracker.decrease_sensitivity();
        }
        assert_eq!(tracker.config().sensitivity, crate::config::MIN_SENSITIVITY);
    }

    #[test]
    fn test_profile_round_trip() {
        let mut profile = CalibrationProfile::builtin();
        profile.stance = Stance::Southpaw;
        profile.cooldown_ms = 300.0;
        let source = PunchTracker::with_profile(profile.clone()).unwrap();
        let json = source.save_profile().unwrap();

        let mut tracker = PunchTracker::new();
        tracker.load_profile(&json).unwrap();
        assert_eq!(tracker.calibration(), &Calibration::Personal(profile));

        assert!(tracker.load_profile("{\"thresholds\": 3}").is_err());
        tracker.clear_profile();
        assert_eq!(tracker.calibration(), &Calibration::Defaults);
    }

    #[test]
    fn test_southpaw_rear_hand_is_cross_for_left() {
        let mut profile = CalibrationProfile::builtin();
        profile.stance = Stance::Southpaw;
        let mut tracker = PunchTracker::with_profile(profile).unwrap();
        tracker.start_session().unwrap();

        let events = tracker
            .process_frames(&wrist_frames(&right_punch(0.0, 15.0), Arm::Right, 0.9))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].punch_type, PunchType::Jab);
    }

    #[test]
    fn test_ndjson_to_events() {
        let input: String = right_punch(0.0, 15.0)
            .iter()
            .map(|(t, p)| {
                format!(
                    "{{\"timestamp_ms\":{},\"keypoints\":{{\"right_wrist\":{{\"x\":{},\"y\":{},\"confidence\":0.9}}}}}}\n",
                    t, p.x, p.y
                )
            })
            .collect();

        let events = ndjson_to_events(&NamedJointAdapter, &input).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].punch_type, PunchType::Cross);
    }

    #[test]
    fn test_frames_to_events_rejects_bad_order() {
        let frames = vec![PoseFrame::new(10.0), PoseFrame::new(5.0)];
        assert!(matches!(
            frames_to_events(&frames),
            Err(TrackerError::NonMonotonicTimestamp { .. })
        ));
    }
}
