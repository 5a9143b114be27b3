//! Per-arm debounce
//!
//! After an accepted punch the arm is cooling until `end + cooldown`, where
//! `end` is the accepted segment's end timestamp. The state machine consults
//! [`CooldownGuard::is_cooling`] before starting a new segment, and the guard
//! refuses any event that still lands inside the window.

use crate::types::Arm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of offering an event to the guard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceOutcome {
    Accepted,
    /// The arm is cooling until this timestamp (ms)
    Debounced { until_ms: f64 },
}

/// Cooldown windows keyed by arm
#[derive(Debug, Clone)]
pub struct CooldownGuard {
    cooldown_ms: f64,
    cooling_until: BTreeMap<Arm, f64>,
}

impl CooldownGuard {
    pub fn new(cooldown_ms: f64) -> Self {
        Self {
            cooldown_ms,
            cooling_until: BTreeMap::new(),
        }
    }

    pub fn cooldown_ms(&self) -> f64 {
        self.cooldown_ms
    }

    /// Change the window length; running windows keep their end time
    pub fn set_cooldown_ms(&mut self, cooldown_ms: f64) {
        self.cooldown_ms = cooldown_ms;
    }

    pub fn is_cooling(&self, arm: Arm, at_ms: f64) -> bool {
        self.cooling_until
            .get(&arm)
            .is_some_and(|&until| at_ms < until)
    }

    /// Accept an event for `arm` ending at `at_ms`, opening a new window
    pub fn try_accept(&mut self, arm: Arm, at_ms: f64) -> DebounceOutcome {
        if let Some(&until_ms) = self.cooling_until.get(&arm) {
            if at_ms < until_ms {
                return DebounceOutcome::Debounced { until_ms };
            }
        }
        self.cooling_until.insert(arm, at_ms + self.cooldown_ms);
        DebounceOutcome::Accepted
    }

    pub fn reset(&mut self) {
        self.cooling_until.clear();
    }
}
