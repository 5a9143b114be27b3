//! Velocity estimation
//!
//! Keeps a fixed-capacity track of recent valid samples per joint and derives a
//! smoothed velocity from the last K of them. A gap between valid samples wider
//! than the configured maximum resets the track, so re-acquiring a joint never
//! produces a velocity spike.

use crate::types::{Joint, KeypointSample, VelocityEstimate};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Rolling sample history for one joint
#[derive(Debug, Clone)]
pub struct JointTrack {
    samples: VecDeque<KeypointSample>,
    capacity: usize,
}

impl JointTrack {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning `true` if the track was reset by a gap
    pub fn push(&mut self, sample: KeypointSample, max_gap_ms: f64) -> bool {
        let reset = match self.samples.back() {
            Some(last) => sample.timestamp_ms - last.timestamp_ms > max_gap_ms,
            None => false,
        };
        if reset {
            self.samples.clear();
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        reset
    }

    /// Smoothed velocity across the last `window` samples.
    ///
    /// Returns `None` with fewer than two samples.
    pub fn velocity(&self, window: usize) -> Option<VelocityEstimate> {
        if self.samples.len() < 2 {
            return None;
        }
        let span = window.clamp(2, self.samples.len());
        let newest = self.samples.back()?;
        let oldest = self.samples.get(self.samples.len() - span)?;

        let dt_sec = (newest.timestamp_ms - oldest.timestamp_ms) / 1000.0;
        if dt_sec <= 0.0 {
            return None;
        }

        let velocity = (newest.position - oldest.position) * (1.0 / dt_sec);
        let magnitude = velocity.length();

        Some(VelocityEstimate {
            magnitude,
            direction: velocity.normalized().unwrap_or_default(),
            position: newest.position,
            timestamp_ms: newest.timestamp_ms,
        })
    }

    pub fn latest(&self) -> Option<&KeypointSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Result of feeding one sample to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackUpdate {
    /// The track was reset before this sample (re-acquisition)
    pub reset: bool,
    pub velocity: Option<VelocityEstimate>,
}

/// Per-joint velocity estimator
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    tracks: BTreeMap<Joint, JointTrack>,
    capacity: usize,
    window: usize,
    max_gap_ms: f64,
}

impl VelocityEstimator {
    pub fn new(capacity: usize, window: usize, max_gap_ms: f64) -> Self {
        Self {
            tracks: BTreeMap::new(),
            capacity,
            window,
            max_gap_ms,
        }
    }

    /// Record a valid sample and return the joint's updated velocity
    pub fn update(&mut self, sample: KeypointSample) -> TrackUpdate {
        let capacity = self.capacity;
        let track = self
            .tracks
            .entry(sample.joint)
            .or_insert_with(|| JointTrack::new(capacity));

        let reset = track.push(sample, self.max_gap_ms);
        if reset {
            debug!(
                joint = sample.joint.as_str(),
                at_ms = sample.timestamp_ms,
                "track reset after gap"
            );
        }

        TrackUpdate {
            reset,
            velocity: track.velocity(self.window),
        }
    }

    /// Current velocity of a joint without adding a sample
    pub fn velocity(&self, joint: Joint) -> Option<VelocityEstimate> {
        self.tracks.get(&joint).and_then(|t| t.velocity(self.window))
    }

    pub fn track(&self, joint: Joint) -> Option<&JointTrack> {
        self.tracks.get(&joint)
    }

    /// Drop all tracks
    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}
