//! Session statistics
//!
//! Counts accepted punches (total, per type, per arm) and keeps a trailing
//! window of punch timestamps for punches-per-minute. Counters only grow until
//! an explicit reset.

use crate::types::{Arm, PunchEvent, PunchType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// Default trailing window for punches-per-minute (ms)
pub const DEFAULT_STATS_WINDOW_MS: f64 = 60_000.0;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Point-in-time view of the session counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub by_type: BTreeMap<PunchType, u64>,
    pub by_arm: BTreeMap<Arm, u64>,
    /// Frame time the session counters started at (ms)
    pub session_start_ms: Option<f64>,
    /// Latest frame time seen (ms)
    pub as_of_ms: Option<f64>,
    /// Punches per minute over the trailing window
    pub punches_per_minute: f64,
    pub window_ms: f64,
}

/// Totals for a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub total: u64,
    pub by_type: BTreeMap<PunchType, u64>,
    pub by_arm: BTreeMap<Arm, u64>,
    /// Punches per minute over the whole session
    pub average_punches_per_minute: f64,
}

/// Rolling session counters
#[derive(Debug, Clone)]
pub struct SessionStats {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    start_ms: Option<f64>,
    last_ms: Option<f64>,
    total: u64,
    by_type: BTreeMap<PunchType, u64>,
    by_arm: BTreeMap<Arm, u64>,
    recent: VecDeque<f64>,
    window_ms: f64,
    /// Frame time spent paused, excluded from the session duration
    paused_ms: f64,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_WINDOW_MS)
    }
}

impl SessionStats {
    pub fn new(window_ms: f64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            start_ms: None,
            last_ms: None,
            total: 0,
            by_type: zeroed(&PunchType::ALL),
            by_arm: zeroed(&Arm::ALL),
            recent: VecDeque::new(),
            window_ms,
            paused_ms: 0.0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, punch_type: PunchType) -> u64 {
        self.by_type.get(&punch_type).copied().unwrap_or(0)
    }

    /// Advance the session clock to a frame time
    pub fn observe(&mut self, at_ms: f64) {
        self.start_ms.get_or_insert(at_ms);
        self.last_ms = Some(at_ms);
        self.evict(at_ms);
    }

    /// Advance the clock across frames seen while paused.
    ///
    /// The elapsed time is left out of the session duration.
    pub fn skip_to(&mut self, at_ms: f64) {
        if let Some(last) = self.last_ms {
            self.paused_ms += (at_ms - last).max(0.0);
            self.last_ms = Some(at_ms);
            self.evict(at_ms);
        }
    }

    /// Count an accepted punch
    pub fn record(&mut self, event: &PunchEvent) {
        self.observe(self.last_ms.map_or(event.timestamp_ms, |t| t.max(event.timestamp_ms)));
        self.total += 1;
        *self.by_type.entry(event.punch_type).or_insert(0) += 1;
        *self.by_arm.entry(event.arm).or_insert(0) += 1;
        self.recent.push_back(event.timestamp_ms);
    }

    /// Punches within the trailing window ending at the latest frame,
    /// expressed per minute.
    ///
    /// With the default 60 s window this is the plain count, so early in a
    /// session it is never extrapolated.
    pub fn punches_per_minute(&self) -> f64 {
        let Some(now) = self.last_ms else {
            return 0.0;
        };
        let in_window = self
            .recent
            .iter()
            .filter(|&&t| now - t < self.window_ms)
            .count();
        in_window as f64 * MS_PER_MINUTE / self.window_ms
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total,
            by_type: self.by_type.clone(),
            by_arm: self.by_arm.clone(),
            session_start_ms: self.start_ms,
            as_of_ms: self.last_ms,
            punches_per_minute: self.punches_per_minute(),
            window_ms: self.window_ms,
        }
    }

    /// Close the session, returning its totals
    pub fn summary(&self) -> SessionSummary {
        let duration_ms = match (self.start_ms, self.last_ms) {
            (Some(start), Some(end)) => (end - start - self.paused_ms).max(0.0),
            _ => 0.0,
        };
        let average_punches_per_minute = if duration_ms > 0.0 {
            self.total as f64 / (duration_ms / MS_PER_MINUTE)
        } else {
            0.0
        };

        SessionSummary {
            session_id: self.session_id,
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration_ms,
            total: self.total,
            by_type: self.by_type.clone(),
            by_arm: self.by_arm.clone(),
            average_punches_per_minute,
        }
    }

    /// Zero every counter; the clock restarts at the next observed frame
    pub fn reset(&mut self) {
        self.start_ms = None;
        self.last_ms = None;
        self.total = 0;
        self.by_type = zeroed(&PunchType::ALL);
        self.by_arm = zeroed(&Arm::ALL);
        self.recent.clear();
        self.paused_ms = 0.0;
    }

    fn evict(&mut self, now_ms: f64) {
        while let Some(&oldest) = self.recent.front() {
            if now_ms - oldest < self.window_ms {
                break;
            }
            self.recent.pop_front();
        }
    }
}

fn zeroed<K: Ord + Copy>(keys: &[K]) -> BTreeMap<K, u64> {
    keys.iter().map(|&k| (k, 0)).collect()
}
