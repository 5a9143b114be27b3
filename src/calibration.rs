//! Calibration profiles
//!
//! A calibration profile holds the per-user thresholds read by the state
//! machines and the classifier. It is produced once (from recorded sample
//! punches, or loaded from JSON) and never mutated while a session runs. When
//! no profile is available the built-in defaults are used through the same
//! [`Calibration`] interface, so downstream logic never branches on absence.

use crate::error::TrackerError;
use crate::types::{MotionSegment, PunchType, Stance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Default idle timeout for a retracting arm (ms)
pub const DEFAULT_IDLE_TIMEOUT_MS: f64 = 400.0;

/// Default per-arm cooldown after an accepted punch (ms)
pub const DEFAULT_COOLDOWN_MS: f64 = 200.0;

/// Samples required before a punch type's thresholds are personalized
pub const MIN_CALIBRATION_SAMPLES: usize = 3;

/// Fraction of the weakest observed sample used as the personalized minimum
const CALIBRATION_MARGIN: f64 = 0.7;

/// Degrees added on each side of the observed angle span
const ANGLE_PADDING_DEG: f64 = 10.0;

/// Acceptance thresholds for one punch type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchThresholds {
    /// Units per second
    pub min_peak_velocity: f64,
    /// Normalized units
    pub min_extension: f64,
    /// Inclusive angle range in the arm frame (degrees)
    pub angle_min_deg: f64,
    pub angle_max_deg: f64,
    /// Minimum wrist confidence floor over the segment
    pub confidence_threshold: f64,
}

impl PunchThresholds {
    pub fn angle_center(&self) -> f64 {
        (self.angle_min_deg + self.angle_max_deg) / 2.0
    }

    pub fn angle_half_width(&self) -> f64 {
        (self.angle_max_deg - self.angle_min_deg) / 2.0
    }

    pub fn contains_angle(&self, angle_deg: f64) -> bool {
        angle_deg >= self.angle_min_deg && angle_deg <= self.angle_max_deg
    }

    fn validate(&self, punch_type: PunchType) -> Result<(), TrackerError> {
        let fields = [
            ("min_peak_velocity", self.min_peak_velocity),
            ("min_extension", self.min_extension),
            ("angle_min_deg", self.angle_min_deg),
            ("angle_max_deg", self.angle_max_deg),
            ("confidence_threshold", self.confidence_threshold),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(TrackerError::InvalidProfile(format!(
                "{}: {} is not finite",
                punch_type, name
            )));
        }
        if self.min_peak_velocity < 0.0 || self.min_extension < 0.0 {
            return Err(TrackerError::InvalidProfile(format!(
                "{}: minimums must be non-negative",
                punch_type
            )));
        }
        if self.angle_min_deg >= self.angle_max_deg {
            return Err(TrackerError::InvalidProfile(format!(
                "{}: angle range [{}, {}] is empty",
                punch_type, self.angle_min_deg, self.angle_max_deg
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(TrackerError::InvalidProfile(format!(
                "{}: confidence_threshold must be within [0, 1]",
                punch_type
            )));
        }
        Ok(())
    }
}

/// Per-user thresholds keyed by punch type, plus global timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    #[serde(default)]
    pub stance: Stance,
    pub thresholds: BTreeMap<PunchType, PunchThresholds>,
    /// Retracting arms return to Idle after this long (ms)
    pub idle_timeout_ms: f64,
    /// Per-arm cooldown after an accepted punch (ms)
    pub cooldown_ms: f64,
    /// When the profile was derived, if it came from a calibration run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated_at: Option<DateTime<Utc>>,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CalibrationProfile {
    /// Built-in thresholds used when no calibration is available
    pub fn builtin() -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert(
            PunchType::Jab,
            PunchThresholds {
                min_peak_velocity: 1.5,
                min_extension: 0.12,
                angle_min_deg: -25.0,
                angle_max_deg: 25.0,
                confidence_threshold: 0.3,
            },
        );
        thresholds.insert(
            PunchType::Cross,
            PunchThresholds {
                min_peak_velocity: 1.5,
                min_extension: 0.15,
                angle_min_deg: -25.0,
                angle_max_deg: 25.0,
                confidence_threshold: 0.3,
            },
        );
        thresholds.insert(
            PunchType::Hook,
            PunchThresholds {
                min_peak_velocity: 1.2,
                min_extension: 0.10,
                angle_min_deg: 15.0,
                angle_max_deg: 60.0,
                confidence_threshold: 0.3,
            },
        );
        thresholds.insert(
            PunchType::Uppercut,
            PunchThresholds {
                min_peak_velocity: 1.2,
                min_extension: 0.10,
                angle_min_deg: 55.0,
                angle_max_deg: 125.0,
                confidence_threshold: 0.3,
            },
        );

        Self {
            stance: Stance::default(),
            thresholds,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            calibrated_at: None,
        }
    }

    pub fn thresholds(&self, punch_type: PunchType) -> Option<&PunchThresholds> {
        self.thresholds.get(&punch_type)
    }

    /// Check that the profile is usable
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.thresholds.is_empty() {
            return Err(TrackerError::InvalidProfile(
                "profile defines no punch types".to_string(),
            ));
        }
        for (punch_type, t) in &self.thresholds {
            t.validate(*punch_type)?;
        }
        for (name, value) in [
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("cooldown_ms", self.cooldown_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackerError::InvalidProfile(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a profile from JSON
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let profile: CalibrationProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Serialize the profile to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

static BUILTIN_PROFILE: OnceLock<CalibrationProfile> = OnceLock::new();

/// Calibration in effect for a session
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Calibration {
    /// Thresholds personalized for the current user
    Personal(CalibrationProfile),
    /// No calibration available; built-in thresholds apply
    #[default]
    Defaults,
}

impl Calibration {
    /// Thresholds to apply, regardless of where they came from
    pub fn profile(&self) -> &CalibrationProfile {
        match self {
            Calibration::Personal(profile) => profile,
            Calibration::Defaults => BUILTIN_PROFILE.get_or_init(CalibrationProfile::builtin),
        }
    }

    pub fn is_personal(&self) -> bool {
        matches!(self, Calibration::Personal(_))
    }
}

impl From<Option<CalibrationProfile>> for Calibration {
    fn from(profile: Option<CalibrationProfile>) -> Self {
        match profile {
            Some(p) => Calibration::Personal(p),
            None => Calibration::Defaults,
        }
    }
}

/// Measurements of one recorded calibration punch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub peak_velocity: f64,
    pub extension: f64,
    pub angle_deg: f64,
    pub confidence_floor: f64,
}

impl From<&MotionSegment> for CalibrationSample {
    fn from(segment: &MotionSegment) -> Self {
        Self {
            peak_velocity: segment.peak_velocity,
            extension: segment.extension(),
            angle_deg: segment.angle_deg(),
            confidence_floor: segment.confidence_floor,
        }
    }
}

/// Collects labeled sample punches and derives a profile from them
#[derive(Debug, Clone, Default)]
pub struct CalibrationRecorder {
    target: Option<PunchType>,
    samples: BTreeMap<PunchType, Vec<CalibrationSample>>,
}

impl CalibrationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the punch type the user is currently asked to throw
    pub fn set_target(&mut self, target: PunchType) {
        self.target = Some(target);
    }

    pub fn target(&self) -> Option<PunchType> {
        self.target
    }

    /// Record a completed segment against the current target.
    ///
    /// Straight punches are labeled by arm, so a combined jab/cross drill
    /// fills both types. Returns the label used, or `None` without a target.
    pub fn record(&mut self, segment: &MotionSegment, stance: Stance) -> Option<PunchType> {
        let target = self.target?;
        let label = if target.is_straight() {
            stance.straight_for(segment.arm)
        } else {
            target
        };

        let sample = CalibrationSample::from(segment);
        debug!(
            punch_type = label.as_str(),
            peak_velocity = sample.peak_velocity,
            extension = sample.extension,
            angle_deg = sample.angle_deg,
            "recorded calibration sample"
        );
        self.samples.entry(label).or_default().push(sample);
        Some(label)
    }

    pub fn sample_count(&self, punch_type: PunchType) -> usize {
        self.samples.get(&punch_type).map_or(0, Vec::len)
    }

    /// Derive a profile, keeping `base` thresholds for under-sampled types
    pub fn derive(&self, base: &CalibrationProfile) -> Result<CalibrationProfile, TrackerError> {
        let mut profile = base.clone();
        let mut personalized = 0;

        for (punch_type, samples) in &self.samples {
            if samples.len() < MIN_CALIBRATION_SAMPLES {
                continue;
            }
            profile
                .thresholds
                .insert(*punch_type, thresholds_from_samples(samples));
            personalized += 1;
        }

        if personalized == 0 {
            return Err(TrackerError::InsufficientCalibrationData(format!(
                "need at least {} samples of one punch type",
                MIN_CALIBRATION_SAMPLES
            )));
        }

        profile.calibrated_at = Some(Utc::now());
        profile.validate()?;
        info!(personalized, "derived calibration profile");
        Ok(profile)
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.samples.clear();
    }
}

fn thresholds_from_samples(samples: &[CalibrationSample]) -> PunchThresholds {
    let min_of = |f: fn(&CalibrationSample) -> f64| {
        samples.iter().map(f).fold(f64::INFINITY, f64::min)
    };
    let max_of = |f: fn(&CalibrationSample) -> f64| {
        samples.iter().map(f).fold(f64::NEG_INFINITY, f64::max)
    };

    PunchThresholds {
        min_peak_velocity: min_of(|s| s.peak_velocity) * CALIBRATION_MARGIN,
        min_extension: min_of(|s| s.extension) * CALIBRATION_MARGIN,
        angle_min_deg: min_of(|s| s.angle_deg) - ANGLE_PADDING_DEG,
        angle_max_deg: max_of(|s| s.angle_deg) + ANGLE_PADDING_DEG,
        confidence_threshold: (min_of(|s| s.confidence_floor) * 0.8).clamp(0.0, 1.0),
    }
}
