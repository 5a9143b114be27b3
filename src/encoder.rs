//! Record encoding
//!
//! Wraps punch events, stats snapshots and session summaries in a versioned
//! envelope carrying producer metadata, for consumers reading NDJSON output.

use crate::error::TrackerError;
use crate::stats::{SessionSummary, StatsSnapshot};
use crate::types::PunchEvent;
use crate::{PRODUCER_NAME, PUNCH_FLUX_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current record envelope version
pub const RECORD_VERSION: &str = "1.0.0";

/// Who produced a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Record payload, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RecordBody {
    Punch(PunchEvent),
    Stats(StatsSnapshot),
    Summary(SessionSummary),
}

/// Envelope around one output record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchRecord {
    pub record_version: String,
    pub producer: Producer,
    pub encoded_at_utc: String,
    pub record: RecordBody,
}

/// Encoder for output records
pub struct EventEncoder {
    instance_id: String,
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, body: RecordBody) -> PunchRecord {
        PunchRecord {
            record_version: RECORD_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: PUNCH_FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            encoded_at_utc: Utc::now().to_rfc3339(),
            record: body,
        }
    }

    pub fn encode_event(&self, event: &PunchEvent) -> PunchRecord {
        self.encode(RecordBody::Punch(event.clone()))
    }

    pub fn encode_stats(&self, snapshot: &StatsSnapshot) -> PunchRecord {
        self.encode(RecordBody::Stats(snapshot.clone()))
    }

    pub fn encode_summary(&self, summary: &SessionSummary) -> PunchRecord {
        self.encode(RecordBody::Summary(summary.clone()))
    }

    /// Single-line JSON, suitable for NDJSON streams
    pub fn to_json_line(&self, body: RecordBody) -> Result<String, TrackerError> {
        serde_json::to_string(&self.encode(body)).map_err(TrackerError::JsonError)
    }
}
