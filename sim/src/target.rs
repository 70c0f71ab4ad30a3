//! Thrown-object trajectories and state propagation.
//!
//! Objects are launched from below the playfield and fly a ballistic arc under
//! screen-space gravity (y grows downward). Multi-hit objects instead sit still
//! for a while in the middle of the screen. The simulator steps every object
//! forward in time and reads the true positions back as ground truth.

use serde::{Deserialize, Serialize};
use slicer_core::{
    metrics::GroundTruth,
    types::{DetectionKind, Point, Vec2},
};

/// Describes how an object moves once it has appeared.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Constant downward acceleration `gravity` in px/s².
    Ballistic { gravity: f64 },
    /// No motion at all (multi-hit objects hanging mid-screen).
    Stationary,
}

/// A simulated object with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThrownObject {
    /// Unique object ID (used for metrics)
    pub id: u64,
    pub kind: DetectionKind,
    pub position: Point,
    pub velocity: Vec2,
    pub motion: MotionSpec,
    /// Hit radius in pixels
    pub radius: f64,
    /// Detector confidence the object tends to be reported with
    pub confidence: f64,
    /// No detections before this time
    pub appear_at: f64,
    /// Optional: object vanishes at this time
    pub disappear_at: Option<f64>,
    /// Object is gone once it falls below this line while descending
    pub despawn_below: f64,
}

impl ThrownObject {
    /// Propagate the true state from `t` to `t + dt`.
    ///
    /// Only the part of the interval after `appear_at` moves the object, so a
    /// launch never depends on the frame grid.
    pub fn step(&mut self, t: f64, dt: f64) {
        let end = t + dt;
        if end <= self.appear_at {
            return;
        }
        let dt = end - t.max(self.appear_at);
        match self.motion {
            MotionSpec::Ballistic { gravity } => {
                self.position.x += self.velocity.x * dt;
                self.position.y += self.velocity.y * dt + 0.5 * gravity * dt * dt;
                self.velocity.y += gravity * dt;
            }
            MotionSpec::Stationary => {}
        }
    }

    /// True if the object exists at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if t < self.appear_at {
            return false;
        }
        if let Some(disappear) = self.disappear_at {
            if t >= disappear {
                return false;
            }
        }
        !(self.velocity.y > 0.0 && self.position.y > self.despawn_below)
    }

    pub fn ground_truth(&self) -> GroundTruth {
        GroundTruth {
            object_id: self.id,
            kind: self.kind,
            position: self.position,
            radius: self.radius,
        }
    }
}
