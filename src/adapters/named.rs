//! Named-joint adapter
//!
//! Parses frames where keypoints are keyed by joint name:
//!
//! ```json
//! {"timestamp_ms": 33.3, "keypoints": {"left_wrist": {"x": 0.4, "y": 0.5, "confidence": 0.9}}}
//! ```

use crate::error::TrackerError;
use crate::types::{Joint, PoseFrame, RawKeypoint};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::PoseFrameAdapter;

/// Adapter for name-keyed keypoint frames
pub struct NamedJointAdapter;

#[derive(Debug, Deserialize)]
struct NamedFrame {
    timestamp_ms: f64,
    #[serde(default)]
    keypoints: HashMap<String, NamedKeypoint>,
}

#[derive(Debug, Deserialize)]
struct NamedKeypoint {
    x: f64,
    y: f64,
    #[serde(alias = "score")]
    confidence: f64,
}

impl PoseFrameAdapter for NamedJointAdapter {
    fn parse_frame(&self, raw_json: &str) -> Result<PoseFrame, TrackerError> {
        let raw: NamedFrame = serde_json::from_str(raw_json)?;
        let mut frame = PoseFrame::new(raw.timestamp_ms);

        for (name, kp) in raw.keypoints {
            match Joint::from_name(&name) {
                Some(joint) => {
                    frame.keypoints.insert(
                        joint,
                        RawKeypoint {
                            x: kp.x,
                            y: kp.y,
                            confidence: kp.confidence,
                        },
                    );
                }
                None => debug!(joint = %name, "ignoring untracked joint"),
            }
        }

        Ok(frame)
    }
}
