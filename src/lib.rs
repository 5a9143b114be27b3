//! Punch Flux - real-time punch detection from pose keypoints
//!
//! Punch Flux turns a noisy stream of 2-D body-joint coordinates into discrete,
//! classified punch events through a frame-synchronous pipeline: keypoint
//! ingestion → velocity estimation → per-arm state machine → classification
//! → debounce → session statistics.
//!
//! ## Modules
//!
//! - **Tracking**: [`PunchTracker`] runs the pipeline one frame at a time
//! - **Calibration**: per-user thresholds with a built-in fallback
//! - **Adapters**: parse pose-model output (named joints, MoveNet) into frames

pub mod adapters;
pub mod arm;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod cooldown;
pub mod encoder;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod stats;
pub mod types;
pub mod velocity;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

#[cfg(test)]
mod test_support;

pub use adapters::{MoveNetAdapter, NamedJointAdapter, PoseFrameAdapter};
pub use calibration::{Calibration, CalibrationProfile, PunchThresholds};
pub use config::TrackerConfig;
pub use error::TrackerError;
pub use pipeline::{frames_to_events, ndjson_to_events, PunchTracker, TrackerMode};
pub use stats::{SessionSummary, StatsSnapshot};
pub use types::{Arm, ArmState, Joint, PoseFrame, PunchEvent, PunchType, Stance};

/// Punch Flux version embedded in every output record
pub const PUNCH_FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for output records
pub const PRODUCER_NAME: &str = "punch-flux";
