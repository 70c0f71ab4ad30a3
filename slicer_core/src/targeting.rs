//! Targeting engine: turns predicted targets and hazards into at most one
//! swipe per frame.
//!
//! # Decision steps per frame
//! 1. Rapid-mode housekeeping (expiry, candidate purge, activation)
//! 2. Cooldown gate: nothing within `min_action_interval` of the last swipe
//! 3. Safety scoring of every target against every hazard; reject unsafe ones
//! 4. Rank targets inside the vertical window by safety × confidence × position
//! 5. Shape a horizontal swipe around the winner, routing around hazards
//! 6. Without a single-target winner, try one swipe through a same-height group
//! 7. Emit, stamp the action time, feed the persistence candidates
//!
//! All geometry is evaluated at the *predicted* position of each target.

use crate::{
    mode::{ModeConfig, ModeState},
    predictor::{MotionPhase, Prediction},
    types::{Point, Timestamp, TrackId},
};
use nalgebra::distance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Size of the play area in detection coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playfield {
    pub width: f64,
    pub height: f64,
}

impl Default for Playfield {
    fn default() -> Self {
        Self {
            width: 972.0,
            height: 808.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub playfield: Playfield,
    /// Minimum time (s) between two emitted swipes
    pub min_action_interval: f64,
    /// Hazard distance (px) at which the distance-based safety saturates at 1.0
    pub safety_distance_scale: f64,
    /// Targets scoring below this are never swiped
    pub min_safety_score: f64,
    /// A hazard inside this corridor (|dx| < length, |dy| < height) zeroes safety
    pub corridor_half_length: f64,
    pub corridor_half_height: f64,
    /// Stricter obstruction check on the direct path, independent of the score
    pub path_half_length: f64,
    pub path_half_height: f64,
    /// Preferred vertical position as a fraction of playfield height
    pub preferred_fraction: f64,
    /// Acceptable vertical window (fractions of playfield height)
    pub window_min: f64,
    pub window_max: f64,
    /// Position score lost per unit of fraction away from the preferred one
    pub position_decay: f64,
    /// Composite score a selection must exceed to be emitted
    pub action_threshold: f64,
    /// Default swipe extends this far (px) on each side of the target
    pub swipe_half_length: f64,
    /// Shaped swipes shorter than this (px) are replaced by the fallback swipe
    pub min_swipe_length: f64,
    /// Half length of the minimal symmetric fallback swipe
    pub fallback_half_length: f64,
    /// Hazards closer than this (px, horizontally) shrink the swipe...
    pub avoidance_reach: f64,
    /// ...when also within this vertical distance
    pub avoidance_half_height: f64,
    /// Gap (px) kept between a shrunk swipe end and the hazard
    pub berth_margin: f64,
    /// Swipe duration (s) outside rapid mode
    pub swipe_duration: f64,
    /// Vertical bucket size (px) for grouping targets into one swipe
    pub height_bucket: f64,
    /// Extra reach (px) beyond the outermost grouped targets
    pub group_margin: f64,
    pub min_group_size: usize,
    pub mode: ModeConfig,
    /// Keep per-target evaluations in [`Decision::evaluations`]
    pub collect_debug: bool,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            playfield: Playfield::default(),
            min_action_interval: 0.1,
            safety_distance_scale: 100.0,
            min_safety_score: 0.6,
            corridor_half_length: 60.0,
            corridor_half_height: 25.0,
            path_half_length: 70.0,
            path_half_height: 30.0,
            preferred_fraction: 0.55,
            window_min: 0.4,
            window_max: 0.7,
            position_decay: 1.0,
            action_threshold: 0.5,
            swipe_half_length: 60.0,
            min_swipe_length: 40.0,
            fallback_half_length: 40.0,
            avoidance_reach: 80.0,
            avoidance_half_height: 30.0,
            berth_margin: 25.0,
            swipe_duration: 0.020,
            height_bucket: 40.0,
            group_margin: 50.0,
            min_group_size: 2,
            mode: ModeConfig::default(),
            collect_debug: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// A live track with this frame's prediction attached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackedTarget {
    pub id: TrackId,
    pub confidence: f64,
    pub prediction: Prediction,
}

impl TrackedTarget {
    /// Where the swipe should land.
    pub fn aim(&self) -> Point {
        self.prediction.predicted_position
    }

    pub fn phase(&self) -> MotionPhase {
        self.prediction.motion.phase
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeKind {
    Single,
    Group,
}

/// A swipe command in detection coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Swipe {
    pub start: Point,
    pub end: Point,
    /// Seconds
    pub duration: f64,
    pub track_ids: Vec<TrackId>,
    pub kind: SwipeKind,
    /// Composite score that justified the swipe
    pub score: f64,
}

impl Swipe {
    pub fn length(&self) -> f64 {
        distance(&self.start, &self.end)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionDecision {
    NoAction,
    Swipe(Swipe),
}

impl ActionDecision {
    pub fn swipe(&self) -> Option<&Swipe> {
        match self {
            ActionDecision::Swipe(s) => Some(s),
            ActionDecision::NoAction => None,
        }
    }

    pub fn is_swipe(&self) -> bool {
        self.swipe().is_some()
    }
}

/// What happened to one target during a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Safety score below the minimum
    Unsafe,
    /// A hazard sits on the direct swipe path
    PathBlocked,
    /// Outside the acceptable vertical window (still groupable)
    OutOfWindow,
    /// Ranked; see the composite score
    Ranked,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetEvaluation {
    pub id: TrackId,
    pub safety: f64,
    pub position_score: f64,
    pub composite: f64,
    pub verdict: Verdict,
}

/// Full result of one [`TargetingEngine::evaluate`] call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionDecision,
    /// Rapid mode state after this frame's housekeeping
    pub rapid_mode: bool,
    /// True when the cooldown gate short-circuited the decision
    pub cooling_down: bool,
    /// Per-target evaluations (only with `collect_debug`)
    pub evaluations: Vec<TargetEvaluation>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A target that survived the safety checks.
#[derive(Clone, Copy, Debug)]
struct Eligible<'a> {
    target: &'a TrackedTarget,
    safety: f64,
}

#[derive(Clone, Debug)]
pub struct TargetingEngine {
    pub config: TargetingConfig,
    mode: ModeState,
    last_action_time: Option<Timestamp>,
}

impl TargetingEngine {
    pub fn new(config: TargetingConfig) -> Self {
        Self {
            config,
            mode: ModeState::new(),
            last_action_time: None,
        }
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    pub fn last_action_time(&self) -> Option<Timestamp> {
        self.last_action_time
    }

    /// Decide this frame's action.
    pub fn decide(
        &mut self,
        targets: &[TrackedTarget],
        hazards: &[Point],
        now: Timestamp,
    ) -> ActionDecision {
        self.evaluate(targets, hazards, now).action
    }

    /// [`decide`](Self::decide) with the intermediate scoring kept.
    pub fn evaluate(
        &mut self,
        targets: &[TrackedTarget],
        hazards: &[Point],
        now: Timestamp,
    ) -> Decision {
        let rapid_mode = self.mode.refresh(&self.config.mode, now);

        if let Some(last) = self.last_action_time {
            if now - last < self.config.min_action_interval {
                return Decision {
                    action: ActionDecision::NoAction,
                    rapid_mode,
                    cooling_down: true,
                    evaluations: Vec::new(),
                };
            }
        }

        let cfg = &self.config;
        let mut ordered: Vec<&TrackedTarget> = targets.iter().collect();
        ordered.sort_by_key(|t| t.id);

        let mut evaluations = Vec::new();
        let mut eligible = Vec::new();
        // (composite, winner)
        let mut best: Option<(f64, Eligible)> = None;

        for target in ordered {
            let aim = target.aim();
            let safety = self.safety_score(&aim, hazards);
            let mut eval = TargetEvaluation {
                id: target.id,
                safety,
                position_score: 0.0,
                composite: 0.0,
                verdict: Verdict::Ranked,
            };

            if safety < cfg.min_safety_score {
                eval.verdict = Verdict::Unsafe;
            } else if self.path_blocked(&aim, hazards) {
                eval.verdict = Verdict::PathBlocked;
            } else {
                let candidate = Eligible { target, safety };
                eligible.push(candidate);

                let fraction = aim.y / cfg.playfield.height;
                if fraction < cfg.window_min || fraction > cfg.window_max {
                    eval.verdict = Verdict::OutOfWindow;
                } else {
                    eval.position_score = self.position_score(fraction);
                    eval.composite = safety * target.confidence * eval.position_score;
                    // Ascending IDs: strict comparison keeps the earliest on ties
                    if best.map_or(true, |(score, _)| eval.composite > score) {
                        best = Some((eval.composite, candidate));
                    }
                }
            }

            if cfg.collect_debug {
                evaluations.push(eval);
            }
        }

        let mut swipe = None;
        if let Some((score, chosen)) = best.filter(|(s, _)| *s > cfg.action_threshold) {
            let aim = chosen.target.aim();
            let (start_x, end_x) = self.shape_single(&aim, hazards);
            let y = aim.y.clamp(0.0, cfg.playfield.height);
            swipe = Some(Swipe {
                start: Point::new(start_x, y),
                end: Point::new(end_x, y),
                duration: 0.0,
                track_ids: vec![chosen.target.id],
                kind: SwipeKind::Single,
                score,
            });
        } else if let Some(group) = self.best_group(&eligible, hazards) {
            if group.score > cfg.action_threshold {
                swipe = Some(group);
            }
        }

        let action = match swipe {
            Some(mut s) => {
                s.duration = self.swipe_duration(rapid_mode);
                self.last_action_time = Some(now);
                for target in targets.iter().filter(|t| s.track_ids.contains(&t.id)) {
                    self.mode.observe(&self.config.mode, &target.aim(), now);
                }
                debug!(
                    kind = ?s.kind,
                    tracks = s.track_ids.len(),
                    score = s.score,
                    start_x = s.start.x,
                    end_x = s.end.x,
                    y = s.start.y,
                    rapid_mode,
                    "swipe"
                );
                ActionDecision::Swipe(s)
            }
            None => ActionDecision::NoAction,
        };

        Decision {
            action,
            rapid_mode,
            cooling_down: false,
            evaluations,
        }
    }

    /// 1.0 without hazards, otherwise the worst per-hazard distance score.
    /// A hazard inside the swipe corridor forces exactly 0.
    pub fn safety_score(&self, aim: &Point, hazards: &[Point]) -> f64 {
        let cfg = &self.config;
        let mut safety: f64 = 1.0;
        for hazard in hazards {
            let dx = (hazard.x - aim.x).abs();
            let dy = (hazard.y - aim.y).abs();
            if dx < cfg.corridor_half_length && dy < cfg.corridor_half_height {
                return 0.0;
            }
            safety = safety.min((distance(aim, hazard) / cfg.safety_distance_scale).min(1.0));
        }
        safety
    }

    /// Stricter corridor check used as a hard veto.
    pub fn path_blocked(&self, aim: &Point, hazards: &[Point]) -> bool {
        let cfg = &self.config;
        hazards.iter().any(|h| {
            (h.x - aim.x).abs() < cfg.path_half_length && (h.y - aim.y).abs() < cfg.path_half_height
        })
    }

    fn position_score(&self, fraction: f64) -> f64 {
        let cfg = &self.config;
        (1.0 - cfg.position_decay * (fraction - cfg.preferred_fraction).abs()).max(0.0)
    }

    /// Horizontal extent of a single-target swipe after hazard avoidance.
    pub fn shape_single(&self, aim: &Point, hazards: &[Point]) -> (f64, f64) {
        let cfg = &self.config;
        let mut start = aim.x - cfg.swipe_half_length;
        let mut end = aim.x + cfg.swipe_half_length;

        for hazard in hazards {
            if (hazard.y - aim.y).abs() >= cfg.avoidance_half_height {
                continue;
            }
            let dx = hazard.x - aim.x;
            if dx < 0.0 && -dx < cfg.avoidance_reach {
                start = start.max(hazard.x + cfg.berth_margin);
            } else if dx > 0.0 && dx < cfg.avoidance_reach {
                end = end.min(hazard.x - cfg.berth_margin);
            }
        }

        if end - start < cfg.min_swipe_length {
            start = aim.x - cfg.fallback_half_length;
            end = aim.x + cfg.fallback_half_length;
        }

        let width = cfg.playfield.width;
        (start.clamp(0.0, width), end.clamp(0.0, width))
    }

    /// Largest same-height group of eligible targets, shaped into one swipe.
    fn best_group(&self, eligible: &[Eligible], hazards: &[Point]) -> Option<Swipe> {
        let cfg = &self.config;
        if cfg.height_bucket <= 0.0 {
            return None;
        }

        let mut buckets: BTreeMap<i64, Vec<&Eligible>> = BTreeMap::new();
        for e in eligible {
            let key = (e.target.aim().y / cfg.height_bucket).floor() as i64;
            buckets.entry(key).or_default().push(e);
        }

        // Ascending bucket keys: strict comparison keeps the topmost on ties
        let mut group: Option<&Vec<&Eligible>> = None;
        for members in buckets.values() {
            if members.len() >= cfg.min_group_size.max(2)
                && group.map_or(true, |g| members.len() > g.len())
            {
                group = Some(members);
            }
        }
        let group = group?;

        let xs = group.iter().map(|e| e.target.aim().x);
        let min_x = xs.clone().fold(f64::INFINITY, f64::min);
        let max_x = xs.fold(f64::NEG_INFINITY, f64::max);
        let n = group.len() as f64;
        let avg_y = group.iter().map(|e| e.target.aim().y).sum::<f64>() / n;

        let start = (min_x - cfg.group_margin).max(0.0);
        let end = (max_x + cfg.group_margin).min(cfg.playfield.width);
        if end - start < cfg.min_swipe_length {
            return None;
        }
        let blocked = hazards.iter().any(|h| {
            h.x >= start && h.x <= end && (h.y - avg_y).abs() < cfg.path_half_height
        });
        if blocked {
            return None;
        }

        let score = group
            .iter()
            .map(|e| e.safety * e.target.confidence)
            .sum::<f64>()
            / n;
        let y = avg_y.clamp(0.0, cfg.playfield.height);

        Some(Swipe {
            start: Point::new(start, y),
            end: Point::new(end, y),
            duration: 0.0,
            track_ids: group.iter().map(|e| e.target.id).collect(),
            kind: SwipeKind::Group,
            score,
        })
    }

    fn swipe_duration(&self, rapid_mode: bool) -> f64 {
        if rapid_mode {
            self.config.swipe_duration * self.config.mode.rapid_duration_factor
        } else {
            self.config.swipe_duration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{MotionEstimate, MotionPhase};
    use crate::types::Vec2;

    fn target(id: u64, x: f64, y: f64, confidence: f64) -> TrackedTarget {
        TrackedTarget {
            id: TrackId(id),
            confidence,
            prediction: Prediction {
                motion: MotionEstimate {
                    velocity: Vec2::zeros(),
                    acceleration_y: 0.0,
                    phase: MotionPhase::Hover,
                },
                position: Point::new(x, y),
                predicted_position: Point::new(x, y),
            },
        }
    }

    fn engine() -> TargetingEngine {
        TargetingEngine::new(TargetingConfig::default())
    }

    /// y at the preferred vertical fraction
    fn preferred_y() -> f64 {
        let cfg = TargetingConfig::default();
        cfg.preferred_fraction * cfg.playfield.height
    }

    #[test]
    fn no_hazards_means_full_safety() {
        assert_eq!(engine().safety_score(&Point::new(100.0, 100.0), &[]), 1.0);
    }

    #[test]
    fn distant_hazard_scales_safety() {
        let e = engine();
        let s = e.safety_score(&Point::new(0.0, 0.0), &[Point::new(0.0, 80.0)]);
        assert!((s - 0.8).abs() < 1e-12);
    }

    #[test]
    fn corridor_hazard_zeroes_safety_regardless_of_distance() {
        // Corridor far longer than the distance scale: the hazard is "far"
        // by straight-line distance yet sits on the swipe path
        let cfg = TargetingConfig {
            corridor_half_length: 400.0,
            swipe_half_length: 400.0,
            ..Default::default()
        };
        let e = TargetingEngine::new(cfg);
        let aim = Point::new(500.0, 400.0);
        let hazard = Point::new(150.0, 405.0);
        assert!(distance(&aim, &hazard) > e.config.safety_distance_scale);
        assert_eq!(e.safety_score(&aim, &[hazard]), 0.0);
    }

    #[test]
    fn single_target_gets_symmetric_default_swipe() {
        let mut e = engine();
        let y = preferred_y();
        let action = e.decide(&[target(3, 480.0, y, 1.0)], &[], 1.0);
        let swipe = action.swipe().expect("should swipe");
        assert_eq!(swipe.kind, SwipeKind::Single);
        assert_eq!(swipe.track_ids, vec![TrackId(3)]);
        assert_eq!(swipe.start, Point::new(420.0, y));
        assert_eq!(swipe.end, Point::new(540.0, y));
        assert_eq!(swipe.duration, 0.020);
        assert!((swipe.score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cooldown_blocks_second_swipe() {
        let mut e = engine();
        let y = preferred_y();
        let targets = [target(0, 480.0, y, 1.0)];
        assert!(e.decide(&targets, &[], 1.0).is_swipe());
        let d = e.evaluate(&targets, &[], 1.05);
        assert!(d.cooling_down);
        assert_eq!(d.action, ActionDecision::NoAction);
        assert!(e.decide(&targets, &[], 1.1).is_swipe());
        assert_eq!(e.last_action_time(), Some(1.1));
    }

    #[test]
    fn unsafe_and_blocked_targets_are_rejected() {
        let mut e = engine();
        let y = preferred_y();
        // Hazard 50 px away vertically: distance score 0.5 < 0.6
        let d = e.evaluate(&[target(0, 300.0, y, 1.0)], &[Point::new(300.0, y + 50.0)], 0.0);
        assert_eq!(d.action, ActionDecision::NoAction);
        assert_eq!(d.evaluations[0].verdict, Verdict::Unsafe);

        // Hazard 65 px to the side at the same height: score 0.65 passes,
        // but the path check (70 px) vetoes it
        let d = e.evaluate(&[target(1, 300.0, y, 1.0)], &[Point::new(365.0, y)], 1.0);
        assert_eq!(d.action, ActionDecision::NoAction);
        assert_eq!(d.evaluations[0].verdict, Verdict::PathBlocked);
    }

    #[test]
    fn hazard_on_left_pulls_start_past_it() {
        let mut e = engine();
        let y = preferred_y();
        let hazard = Point::new(425.0, y);
        let action = e.decide(&[target(0, 500.0, y, 1.0)], &[hazard], 0.0);
        let swipe = action.swipe().expect("hazard at 75 px is passable");
        assert_eq!(swipe.start.x, hazard.x + 25.0);
        assert_eq!(swipe.end.x, 560.0);
        assert!(swipe.start.x > hazard.x);
    }

    #[test]
    fn collapsed_avoidance_falls_back_to_minimal_swipe() {
        let cfg = TargetingConfig {
            safety_distance_scale: 10.0,
            corridor_half_length: 5.0,
            path_half_length: 5.0,
            avoidance_reach: 200.0,
            ..Default::default()
        };
        let e = TargetingEngine::new(cfg);
        let aim = Point::new(500.0, 400.0);
        let hazards = [Point::new(470.0, 400.0), Point::new(530.0, 400.0)];
        // 495..505 would be only 10 px long
        assert_eq!(e.shape_single(&aim, &hazards), (460.0, 540.0));
    }

    #[test]
    fn swipe_is_clamped_to_playfield() {
        let e = engine();
        assert_eq!(e.shape_single(&Point::new(20.0, 400.0), &[]), (0.0, 80.0));
    }

    #[test]
    fn best_composite_wins_and_ties_go_to_lowest_id() {
        let mut e = engine();
        let y = preferred_y();
        let targets = [
            target(5, 200.0, y, 0.9),
            target(2, 700.0, y, 0.9),
            target(9, 450.0, y, 0.7),
        ];
        let action = e.decide(&targets, &[], 0.0);
        assert_eq!(action.swipe().unwrap().track_ids, vec![TrackId(2)]);
    }

    #[test]
    fn out_of_window_targets_are_not_single_swiped() {
        let mut e = engine();
        let d = e.evaluate(&[target(0, 480.0, 100.0, 1.0)], &[], 0.0);
        assert_eq!(d.action, ActionDecision::NoAction);
        assert_eq!(d.evaluations[0].verdict, Verdict::OutOfWindow);
    }

    #[test]
    fn clustered_targets_get_one_group_swipe() {
        let mut e = engine();
        // Too high for single swipes (fraction ~0.3) but in one 40 px bucket
        let targets = [
            target(0, 300.0, 245.0, 1.0),
            target(1, 420.0, 250.0, 0.9),
            target(2, 380.0, 255.0, 0.8),
        ];
        let action = e.decide(&targets, &[], 0.0);
        let swipe = action.swipe().expect("group swipe");
        assert_eq!(swipe.kind, SwipeKind::Group);
        assert_eq!(swipe.track_ids, vec![TrackId(0), TrackId(1), TrackId(2)]);
        assert_eq!(swipe.start, Point::new(250.0, 250.0));
        assert_eq!(swipe.end, Point::new(470.0, 250.0));
        assert!((swipe.score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn strong_single_target_beats_group() {
        let mut e = engine();
        let targets = [
            target(0, 300.0, 245.0, 1.0),
            target(1, 420.0, 250.0, 1.0),
            target(2, 700.0, preferred_y(), 1.0),
        ];
        let action = e.decide(&targets, &[], 0.0);
        let swipe = action.swipe().unwrap();
        assert_eq!(swipe.kind, SwipeKind::Single);
        assert_eq!(swipe.track_ids, vec![TrackId(2)]);
    }

    #[test]
    fn hazard_on_group_path_cancels_group() {
        let mut e = engine();
        let targets = [target(0, 200.0, 250.0, 1.0), target(1, 600.0, 250.0, 1.0)];
        // Far from both targets, but on the line between them
        let d = e.evaluate(&targets, &[Point::new(400.0, 255.0)], 0.0);
        assert_eq!(d.action, ActionDecision::NoAction);
    }

    #[test]
    fn repeated_hits_on_one_spot_enable_rapid_mode() {
        let mut e = engine();
        let y = preferred_y();
        let pomegranate = [target(0, 480.0, y, 1.0)];
        let mut rapid_swipe = None;
        for i in 0..20 {
            let now = i as f64 * 0.125;
            if let ActionDecision::Swipe(s) = e.decide(&pomegranate, &[], now) {
                if e.mode().is_active(now) {
                    rapid_swipe = Some((now, s));
                    break;
                }
            }
        }
        let (now, swipe) = rapid_swipe.expect("rapid mode should trigger");
        assert_eq!(now, 1.125);
        assert!((swipe.duration - 0.016).abs() < 1e-12);
    }
}
