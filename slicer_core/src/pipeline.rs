//! Pipeline orchestrator: the full decision cycle for one detection frame.
//!
//! # Processing steps per frame
//! 1. Sanitise detections (clamp confidence, drop non-finite positions)
//! 2. Associate target detections with live tracks; birth and expire tracks
//! 3. Predict every live track forward by the lookahead
//! 4. Hand the tracks refreshed this frame, plus the hazards, to the targeting engine
//! 5. Collect timings and bookkeeping for callers and metrics

use crate::{
    error::{fraction, non_negative, positive, ConfigError},
    predictor::{Predictor, PredictorConfig},
    targeting::{ActionDecision, Decision, TargetingConfig, TargetingEngine, TrackedTarget},
    track_manager::{TrackManager, TrackManagerConfig},
    types::{Detection, DetectionFrame, Point, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the whole decision pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub track_manager: TrackManagerConfig,
    pub predictor: PredictorConfig,
    pub targeting: TargetingConfig,
}

impl PipelineConfig {
    /// Reject parameter sets the engine cannot reason about.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tm = &self.track_manager;
        positive("association_distance", tm.association_distance)?;
        positive("recency_window", tm.recency_window)?;
        positive("expiry_window", tm.expiry_window)?;
        if tm.history_capacity < 2 {
            return Err(ConfigError::TooSmall {
                name: "history_capacity",
                value: tm.history_capacity,
                min: 2,
            });
        }

        let p = &self.predictor;
        non_negative("lookahead", p.lookahead)?;
        non_negative("ascend_velocity_threshold", p.ascend_velocity_threshold)?;
        non_negative("hover_velocity_threshold", p.hover_velocity_threshold)?;
        non_negative("descend_velocity_threshold", p.descend_velocity_threshold)?;

        let t = &self.targeting;
        positive("playfield.width", t.playfield.width)?;
        positive("playfield.height", t.playfield.height)?;
        non_negative("min_action_interval", t.min_action_interval)?;
        positive("safety_distance_scale", t.safety_distance_scale)?;
        fraction("min_safety_score", t.min_safety_score)?;
        fraction("preferred_fraction", t.preferred_fraction)?;
        fraction("window_min", t.window_min)?;
        fraction("window_max", t.window_max)?;
        if t.window_min > t.window_max {
            return Err(ConfigError::InvertedWindow {
                min: t.window_min,
                max: t.window_max,
            });
        }
        non_negative("position_decay", t.position_decay)?;
        fraction("action_threshold", t.action_threshold)?;
        positive("swipe_half_length", t.swipe_half_length)?;
        positive("min_swipe_length", t.min_swipe_length)?;
        positive("fallback_half_length", t.fallback_half_length)?;
        non_negative("berth_margin", t.berth_margin)?;
        positive("swipe_duration", t.swipe_duration)?;
        positive("height_bucket", t.height_bucket)?;
        non_negative("group_margin", t.group_margin)?;

        let m = &t.mode;
        positive("fingerprint_quantum", m.fingerprint_quantum)?;
        non_negative("persistence_threshold", m.persistence_threshold)?;
        positive("mode_duration", m.mode_duration)?;
        positive("rapid_duration_factor", m.rapid_duration_factor)?;
        if m.candidate_window <= m.persistence_threshold {
            return Err(ConfigError::CandidateWindowTooShort {
                window: m.candidate_window,
                threshold: m.persistence_threshold,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Outputs of one pipeline step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameOutput {
    pub timestamp: Timestamp,
    /// The targeting decision, with debug evaluations when enabled
    pub decision: Decision,
    /// All live tracks with this frame's prediction, ascending ID
    pub tracks: Vec<TrackedTarget>,
    /// Hazard positions considered this frame
    pub hazards: Vec<Point>,
    /// Number of tracks born this step
    pub births: usize,
    /// Number of tracks expired this step
    pub expirations: usize,
    /// Detections discarded by sanitisation
    pub dropped_detections: usize,
    pub timing_associate_us: u64,
    pub timing_predict_us: u64,
    pub timing_decide_us: u64,
    pub total_time_us: u64,
}

impl FrameOutput {
    pub fn action(&self) -> &ActionDecision {
        &self.decision.action
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Owns the track table, the predictor and the targeting engine.
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub track_manager: TrackManager,
    pub predictor: Predictor,
    pub engine: TargetingEngine,
}

impl Pipeline {
    /// Create a new pipeline. Call [`PipelineConfig::validate`] first for
    /// configs that come from outside the program.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            track_manager: TrackManager::new(config.track_manager),
            predictor: Predictor::new(config.predictor),
            engine: TargetingEngine::new(config.targeting),
        }
    }

    /// Validate, then build.
    pub fn try_new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Run associate → predict → decide for one frame.
    pub fn process_frame(&mut self, frame: &DetectionFrame) -> FrameOutput {
        let start_total = Instant::now();
        let now = frame.timestamp;

        if !now.is_finite() {
            warn!(
                now,
                detections = frame.detections.len(),
                "skipping frame with non-finite timestamp"
            );
            return self.skipped_frame(frame, start_total);
        }

        // ----------------------------------------------------------------
        // Step 1: Sanitise
        // ----------------------------------------------------------------
        let detections: Vec<Detection> = frame
            .detections
            .iter()
            .filter_map(Detection::sanitized)
            .collect();
        let dropped_detections = frame.detections.len() - detections.len();
        if dropped_detections > 0 {
            warn!(
                dropped = dropped_detections,
                now, "dropped detections with non-finite positions"
            );
        }

        // ----------------------------------------------------------------
        // Step 2: Associate
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let association = self.track_manager.associate(&detections, now);
        let births = association.births.len();
        let expirations = association.expired.len();
        let timing_associate_us = t0.elapsed().as_micros() as u64;

        // ----------------------------------------------------------------
        // Step 3: Predict
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let mut tracks = Vec::with_capacity(association.tracks.len());
        let mut fresh = Vec::new();
        for track in &association.tracks {
            let tracked = TrackedTarget {
                id: track.id,
                confidence: track.confidence,
                prediction: self.predictor.predict_default(track, now),
            };
            if track.seen_at(now) {
                fresh.push(tracked.clone());
            }
            tracks.push(tracked);
        }
        let timing_predict_us = t0.elapsed().as_micros() as u64;

        // ----------------------------------------------------------------
        // Step 4: Decide
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let hazards: Vec<Point> = detections
            .iter()
            .filter(|d| d.is_hazard())
            .map(|d| d.position)
            .collect();
        let decision = self.engine.evaluate(&fresh, &hazards, now);
        let timing_decide_us = t0.elapsed().as_micros() as u64;

        FrameOutput {
            timestamp: now,
            decision,
            tracks,
            hazards,
            births,
            expirations,
            dropped_detections,
            timing_associate_us,
            timing_predict_us,
            timing_decide_us,
            total_time_us: start_total.elapsed().as_micros() as u64,
        }
    }

    /// Output for a frame that cannot be placed on the timeline. Tracks,
    /// cooldown and rapid-mode state are left untouched.
    fn skipped_frame(&self, frame: &DetectionFrame, start_total: Instant) -> FrameOutput {
        FrameOutput {
            timestamp: frame.timestamp,
            decision: Decision {
                action: ActionDecision::NoAction,
                rapid_mode: self.engine.mode().expires_at().is_some(),
                cooling_down: false,
                evaluations: Vec::new(),
            },
            tracks: Vec::new(),
            hazards: Vec::new(),
            births: 0,
            expirations: 0,
            dropped_detections: frame.detections.len(),
            timing_associate_us: 0,
            timing_predict_us: 0,
            timing_decide_us: 0,
            total_time_us: start_total.elapsed().as_micros() as u64,
        }
    }

    /// Reset: clear all tracks and decision state. Track IDs keep counting up.
    pub fn reset(&mut self) {
        self.track_manager.clear();
        self.engine = TargetingEngine::new(self.engine.config.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
