//! MoveNet adapter
//!
//! Parses single-pose MoveNet output: 17 keypoints, each a `[y, x, score]`
//! triple in normalized image coordinates.

use crate::error::TrackerError;
use crate::types::{Joint, PoseFrame, RawKeypoint};
use serde::Deserialize;

use super::PoseFrameAdapter;

/// Number of keypoints in the MoveNet layout
pub const MOVENET_KEYPOINT_COUNT: usize = 17;

/// MoveNet indices of the joints used for punch tracking
const MOVENET_JOINTS: [(usize, Joint); 6] = [
    (5, Joint::LeftShoulder),
    (6, Joint::RightShoulder),
    (7, Joint::LeftElbow),
    (8, Joint::RightElbow),
    (9, Joint::LeftWrist),
    (10, Joint::RightWrist),
];

/// Adapter for MoveNet keypoint tensors
pub struct MoveNetAdapter;

#[derive(Debug, Deserialize)]
struct MoveNetFrame {
    timestamp_ms: f64,
    keypoints: Vec<[f64; 3]>,
}

impl PoseFrameAdapter for MoveNetAdapter {
    fn parse_frame(&self, raw_json: &str) -> Result<PoseFrame, TrackerError> {
        let raw: MoveNetFrame = serde_json::from_str(raw_json)?;

        if raw.keypoints.len() != MOVENET_KEYPOINT_COUNT {
            return Err(TrackerError::ParseError(format!(
                "expected {} MoveNet keypoints, got {}",
                MOVENET_KEYPOINT_COUNT,
                raw.keypoints.len()
            )));
        }

        let mut frame = PoseFrame::new(raw.timestamp_ms);
        for (idx, joint) in MOVENET_JOINTS {
            let [y, x, score] = raw.keypoints[idx];
            frame.keypoints.insert(
                joint,
                RawKeypoint {
                    x,
                    y,
                    confidence: score,
                },
            );
        }

        Ok(frame)
    }
}
