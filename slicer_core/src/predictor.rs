//! Trajectory prediction: finite-difference motion estimate, phase
//! classification, and latency-compensating extrapolation.
//!
//! ## Motion model
//! Horizontal motion is constant velocity, vertical motion is constant
//! acceleration (thrown objects under a gravity-like pull):
//!
//! x' = x + vx·t
//! y' = y + vy·t + ½·ay·t²
//!
//! Screen y grows downward, so gravity is a positive `ay` and rising objects
//! have negative `vy`.

use crate::{
    track::{Sample, Track},
    types::{Point, Timestamp, Vec2},
};
use serde::{Deserialize, Serialize};

/// Where a track is in its arc.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPhase {
    /// Rising and slowing down
    Ascending,
    /// Near the apex: vertically almost stationary
    Hover,
    /// Falling
    Descending,
    Unknown,
}

/// Configuration for motion estimation and extrapolation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Time (s) between frame capture and the swipe actually landing
    pub lookahead: f64,
    /// Number of recent samples spanned by the velocity estimate (clamped to 2..=4)
    pub velocity_window: usize,
    /// Upward speed (px/s) needed to call a track ascending
    pub ascend_velocity_threshold: f64,
    /// Vertical speed (px/s) below which a track hovers
    pub hover_velocity_threshold: f64,
    /// Downward speed (px/s) needed to call a track descending
    pub descend_velocity_threshold: f64,
    /// Vertical acceleration (px/s², positive = down) assumed when history is too short
    pub assumed_acceleration: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            lookahead: 0.15,
            velocity_window: 4,
            ascend_velocity_threshold: 5.0,
            hover_velocity_threshold: 15.0,
            descend_velocity_threshold: 5.0,
            assumed_acceleration: 9.8 * 50.0,
        }
    }
}

/// Per-frame kinematic estimate of one track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionEstimate {
    pub velocity: Vec2,
    pub acceleration_y: f64,
    pub phase: MotionPhase,
}

/// Output of [`Predictor::predict`] for one track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub motion: MotionEstimate,
    /// Latest observed position
    pub position: Point,
    /// Position extrapolated by the lookahead
    pub predicted_position: Point,
}

#[derive(Clone, Debug)]
pub struct Predictor {
    pub config: PredictorConfig,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    /// Estimate motion from the track history and extrapolate by `lookahead` seconds.
    ///
    /// `now` is not used by the kinematics; extrapolation always starts at the
    /// newest sample so a stale track is not pushed further than the lookahead.
    pub fn predict(&self, track: &Track, _now: Timestamp, lookahead: f64) -> Prediction {
        let samples: Vec<Sample> = track.history().iter().copied().collect();
        let motion = self.estimate(&samples);
        let position = track.position();
        let predicted_position = if samples.len() < 2 {
            position
        } else {
            extrapolate(position, &motion, lookahead)
        };
        Prediction {
            motion,
            position,
            predicted_position,
        }
    }

    /// [`predict`](Self::predict) with the configured lookahead.
    pub fn predict_default(&self, track: &Track, now: Timestamp) -> Prediction {
        self.predict(track, now, self.config.lookahead)
    }

    /// Motion estimate from a history slice (oldest first).
    pub fn estimate(&self, samples: &[Sample]) -> MotionEstimate {
        let cfg = &self.config;
        if samples.len() < 2 {
            return MotionEstimate {
                velocity: Vec2::zeros(),
                acceleration_y: 0.0,
                phase: MotionPhase::Unknown,
            };
        }

        let degenerate = MotionEstimate {
            velocity: Vec2::zeros(),
            acceleration_y: cfg.assumed_acceleration,
            phase: MotionPhase::Unknown,
        };

        let window = cfg.velocity_window.clamp(2, 4).min(samples.len());
        let recent = &samples[samples.len() - window..];
        let Some(velocity) = finite_difference(&recent[0], &recent[window - 1]) else {
            return degenerate;
        };

        let acceleration_y = if samples.len() >= 3 {
            let n = samples.len();
            let (a, b, c) = (&samples[n - 3], &samples[n - 2], &samples[n - 1]);
            match (finite_difference(a, b), finite_difference(b, c)) {
                (Some(v_prev), Some(v_last)) => {
                    // Single-interval velocities live at interval midpoints
                    let spacing = (c.time - a.time) / 2.0;
                    (v_last.y - v_prev.y) / spacing
                }
                _ => return degenerate,
            }
        } else {
            cfg.assumed_acceleration
        };

        MotionEstimate {
            velocity,
            acceleration_y,
            phase: self.classify(velocity.y, acceleration_y),
        }
    }

    /// Phase from vertical velocity and acceleration; first match wins.
    pub fn classify(&self, vy: f64, ay: f64) -> MotionPhase {
        let cfg = &self.config;
        if vy < -cfg.ascend_velocity_threshold && ay > 0.0 {
            MotionPhase::Ascending
        } else if vy.abs() < cfg.hover_velocity_threshold {
            MotionPhase::Hover
        } else if vy > cfg.descend_velocity_threshold {
            MotionPhase::Descending
        } else {
            MotionPhase::Unknown
        }
    }
}

/// Velocity between two samples, `None` if time does not move forward
/// (including a NaN interval).
fn finite_difference(from: &Sample, to: &Sample) -> Option<Vec2> {
    let dt = to.time - from.time;
    if dt.is_nan() || dt <= 0.0 {
        return None;
    }
    Some((to.position - from.position) / dt)
}

/// Constant-velocity x, constant-acceleration y.
pub fn extrapolate(position: Point, motion: &MotionEstimate, t: f64) -> Point {
    Point::new(
        position.x + motion.velocity.x * t,
        position.y + motion.velocity.y * t + 0.5 * motion.acceleration_y * t * t,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
