//! Synthetic wrist trajectories for tests

use crate::types::{Arm, Joint, PoseFrame, Vec2};

/// Timed wrist positions (ms, image-space position)
pub type Trajectory = Vec<(f64, Vec2)>;

/// Wrist held still for `frames` frames starting at `from_ms`
pub fn rest(at: Vec2, from_ms: f64, frames: usize, dt_ms: f64) -> Trajectory {
    (0..frames)
        .map(|i| (from_ms + i as f64 * dt_ms, at))
        .collect()
}

/// Straight stroke with a triangular velocity profile.
///
/// Starts at rest at `from` at `start_ms` (that point is not emitted), peaks
/// at half duration with speed `2 * |delta| / duration`, and ends at rest at
/// `from + delta`.
pub fn stroke(from: Vec2, delta: Vec2, start_ms: f64, duration_ms: f64, dt_ms: f64) -> Trajectory {
    let steps = (duration_ms / dt_ms).round() as usize;
    (1..=steps)
        .map(|i| {
            let u = i as f64 / steps as f64;
            let s = if u <= 0.5 {
                2.0 * u * u
            } else {
                1.0 - 2.0 * (1.0 - u) * (1.0 - u)
            };
            (start_ms + i as f64 * dt_ms, from + delta * s)
        })
        .collect()
}

/// Small deterministic wobble around a rest position
pub fn jitter(at: Vec2, from_ms: f64, frames: usize, dt_ms: f64, amplitude: f64) -> Trajectory {
    const PATTERN: [f64; 7] = [0.0, 1.0, -0.6, 0.3, -1.0, 0.7, -0.2];
    (0..frames)
        .map(|i| {
            let dx = PATTERN[i % PATTERN.len()] * amplitude;
            let dy = PATTERN[(i + 3) % PATTERN.len()] * amplitude;
            (from_ms + i as f64 * dt_ms, at + Vec2::new(dx, dy))
        })
        .collect()
}

/// Forward punch and return for the right arm: rest, out, back, rest
pub fn right_punch(start_ms: f64, dt_ms: f64) -> Trajectory {
    let guard = Vec2::new(0.3, 0.5);
    let reach = Vec2::new(0.3, 0.0);
    let mut path = rest(guard, start_ms, 10, dt_ms);
    let out_start = start_ms + 9.0 * dt_ms;
    path.extend(stroke(guard, reach, out_start, 150.0, dt_ms));
    path.extend(stroke(guard + reach, reach * -1.0, out_start + 150.0, 150.0, dt_ms));
    path.extend(rest(guard, out_start + 300.0 + dt_ms, 10, dt_ms));
    path
}

/// Pose frames with `arm`'s wrist on `path` and everything else held still
pub fn wrist_frames(path: &Trajectory, arm: Arm, confidence: f64) -> Vec<PoseFrame> {
    let (other, other_x) = match arm {
        Arm::Left => (Arm::Right, 0.3),
        Arm::Right => (Arm::Left, 0.7),
    };
    path.iter()
        .map(|&(t, p)| {
            PoseFrame::new(t)
                .with_joint(arm.wrist(), p.x, p.y, confidence)
                .with_joint(other.wrist(), other_x, 0.5, 0.9)
                .with_joint(Joint::LeftShoulder, 0.6, 0.3, 0.9)
                .with_joint(Joint::RightShoulder, 0.4, 0.3, 0.9)
        })
        .collect()
}
