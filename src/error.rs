//! Error types for Punch Flux

use thiserror::Error;

/// Errors that can occur while tracking punches
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Non-monotonic frame timestamp: {current_ms} ms does not follow {previous_ms} ms")]
    NonMonotonicTimestamp { previous_ms: f64, current_ms: f64 },

    #[error("Invalid frame timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Failed to parse pose frame: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid calibration profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("No session is active")]
    SessionInactive,

    #[error("Tracker is in calibration mode")]
    CalibrationActive,

    #[error("Tracker is not in calibration mode")]
    NotCalibrating,

    #[error("Insufficient calibration data: {0}")]
    InsufficientCalibrationData(String),
}
