//! Tracker configuration
//!
//! Session-independent tracking knobs. Per-user thresholds live in the
//! calibration profile instead.

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// Default minimum joint confidence
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.3;

/// Default number of samples kept per joint
pub const DEFAULT_TRACK_CAPACITY: usize = 10;

/// Default number of samples spanned by the velocity estimate
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Default widest tolerated gap between valid samples (ms)
pub const DEFAULT_MAX_GAP_MS: f64 = 150.0;

/// Default rest/motion boundary (units per second)
pub const DEFAULT_ONSET_THRESHOLD: f64 = 0.6;

/// Sensitivity multiplier bounds
pub const MIN_SENSITIVITY: f64 = 0.5;
pub const MAX_SENSITIVITY: f64 = 2.0;

/// Change applied by one sensitivity adjustment
pub const SENSITIVITY_STEP: f64 = 0.1;

/// Configuration for the tracking pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Joints below this confidence are excluded from the frame
    pub confidence_floor: f64,
    /// Samples kept per joint track
    pub track_capacity: usize,
    /// Valid samples spanned by one velocity estimate (K)
    pub smoothing_window: usize,
    /// A wider gap between valid samples resets the track (ms)
    pub max_gap_ms: f64,
    /// Speed separating intentional motion from rest jitter (units/s)
    pub onset_threshold: f64,
    /// Minimum cosine between consecutive directions to count as consistent
    pub direction_consistency: f64,
    /// Retraction starts once speed falls below this fraction of peak
    pub retract_fraction: f64,
    /// Segments lasting longer than this are treated as non-punch motion (ms)
    pub max_segment_ms: f64,
    /// Trailing window for punches-per-minute (ms)
    pub stats_window_ms: f64,
    /// Divides the onset threshold; higher is more sensitive
    pub sensitivity: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            track_capacity: DEFAULT_TRACK_CAPACITY,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            max_gap_ms: DEFAULT_MAX_GAP_MS,
            onset_threshold: DEFAULT_ONSET_THRESHOLD,
            direction_consistency: 0.7,
            retract_fraction: 0.3,
            max_segment_ms: 1500.0,
            stats_window_ms: 60_000.0,
            sensitivity: 1.0,
        }
    }
}

impl TrackerConfig {
    /// Onset threshold after applying sensitivity
    pub fn effective_onset(&self) -> f64 {
        self.onset_threshold / self.sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    }

    /// Step sensitivity by `delta`, clamped to the supported range
    pub fn adjust_sensitivity(&mut self, delta: f64) -> f64 {
        self.sensitivity = (self.sensitivity + delta).clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
        self.sensitivity
    }

    /// Check that every knob is usable
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(TrackerError::InvalidConfig(format!(
                "confidence_floor must be within [0, 1], got {}",
                self.confidence_floor
            )));
        }
        if self.smoothing_window < 2 {
            return Err(TrackerError::InvalidConfig(
                "smoothing_window must span at least 2 samples".to_string(),
            ));
        }
        if self.track_capacity < self.smoothing_window {
            return Err(TrackerError::InvalidConfig(format!(
                "track_capacity ({}) must be >= smoothing_window ({})",
                self.track_capacity, self.smoothing_window
            )));
        }
        let positive = [
            ("max_gap_ms", self.max_gap_ms),
            ("onset_threshold", self.onset_threshold),
            ("max_segment_ms", self.max_segment_ms),
            ("stats_window_ms", self.stats_window_ms),
            ("sensitivity", self.sensitivity),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..1.0).contains(&self.retract_fraction) {
            return Err(TrackerError::InvalidConfig(format!(
                "retract_fraction must be within [0, 1), got {}",
                self.retract_fraction
            )));
        }
        if !(-1.0..=1.0).contains(&self.direction_consistency) {
            return Err(TrackerError::InvalidConfig(format!(
                "direction_consistency must be a cosine, got {}",
                self.direction_consistency
            )));
        }
        Ok(())
    }

    /// Load configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
