//! Pose source adapters
//!
//! This module provides adapters that parse raw pose-model output records and
//! map them to source-agnostic [`PoseFrame`]s.

mod movenet;
mod named;

pub use movenet::MoveNetAdapter;
pub use named::NamedJointAdapter;

use crate::error::TrackerError;
use crate::types::PoseFrame;

/// Trait for pose source adapters
pub trait PoseFrameAdapter {
    /// Parse one JSON record into a pose frame
    fn parse_frame(&self, raw_json: &str) -> Result<PoseFrame, TrackerError>;

    /// Parse newline-delimited JSON, skipping blank lines
    fn parse_ndjson(&self, input: &str) -> Result<Vec<PoseFrame>, TrackerError> {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                self.parse_frame(line.trim()).map_err(|e| {
                    TrackerError::ParseError(format!("line {}: {}", idx + 1, e))
                })
            })
            .collect()
    }
}
