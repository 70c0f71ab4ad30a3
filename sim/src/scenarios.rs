//! Scenario definitions.
//!
//! Each scenario is a named set of thrown objects plus a detector error model.
//! All scenarios are deterministic given the same seed.

use crate::{
    detector_sim::{DetectorParams, DetectorSimulator},
    replay::{GroundTruthFrame, ReplayLog},
    target::{MotionSpec, ThrownObject},
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use slicer_core::types::{DetectionKind, Point, Vec2};

/// Screen-space gravity of the game (px/s²).
pub const GRAVITY: f64 = 490.0;
/// Launch line below the bottom edge of the playfield.
const LAUNCH_Y: f64 = 850.0;
const DESPAWN_Y: f64 = 900.0;
const TARGET_RADIUS: f64 = 32.0;
const HAZARD_RADIUS: f64 = 28.0;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// One fruit, one arc, clean detector
    Single,
    /// Staggered waves of fruit across the screen
    Volley,
    /// Fruit thrown with bombs right beside them
    BombAmbush,
    /// A multi-hit fruit hanging mid-screen among passing fruit
    Pomegranate,
    /// Dense throws with bombs and a noisy detector
    Stress,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64, // seconds
    pub frame_dt: f64, // capture interval (s)
    pub objects: Vec<ThrownObject>,
    pub detector: DetectorParams,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Single => Self::single(seed),
            ScenarioKind::Volley => Self::volley(seed),
            ScenarioKind::BombAmbush => Self::bomb_ambush(seed),
            ScenarioKind::Pomegranate => Self::pomegranate(seed),
            ScenarioKind::Stress => Self::stress(seed),
        }
    }

    /// Step the objects through the whole scenario and capture every frame.
    pub fn record(&self) -> ReplayLog {
        let mut objects = self.objects.clone();
        let mut detector = DetectorSimulator::new(self.detector.clone(), self.seed);
        let n_frames = (self.duration / self.frame_dt).round() as usize;

        let mut frames = Vec::with_capacity(n_frames);
        let mut ground_truth = Vec::with_capacity(n_frames);
        for i in 0..n_frames {
            let t = i as f64 * self.frame_dt;
            frames.push(detector.detect(&objects, t));
            ground_truth.push(GroundTruthFrame {
                time: t,
                objects: objects
                    .iter()
                    .filter(|o| o.is_active(t))
                    .map(ThrownObject::ground_truth)
                    .collect(),
            });
            for obj in &mut objects {
                obj.step(t, self.frame_dt);
            }
        }

        ReplayLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            frame_dt: self.frame_dt,
            duration: self.duration,
            frames,
            ground_truth,
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 1: Single
    // -----------------------------------------------------------------------
    fn single(seed: u64) -> Self {
        let objects = vec![launch(0, DetectionKind::Target, 420.0, 20.0, 250.0, 0.2)];

        Scenario {
            name: "single".into(),
            seed,
            duration: 4.0,
            frame_dt: 1.0 / 30.0,
            objects,
            detector: DetectorParams::perfect(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: Volley
    // -----------------------------------------------------------------------
    fn volley(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));

        let objects = (0..12)
            .map(|i| {
                // Three waves of four, 1.2 s apart
                let appear_at = (i / 4) as f64 * 1.2 + rng.gen::<f64>() * 0.3;
                let x = 150.0 + rng.gen::<f64>() * 670.0;
                let vx = (rng.gen::<f64>() - 0.5) * 80.0;
                let peak = 150.0 + rng.gen::<f64>() * 200.0;
                launch(i as u64, DetectionKind::Target, x, vx, peak, appear_at)
            })
            .collect();

        Scenario {
            name: "volley".into(),
            seed,
            duration: 7.0,
            frame_dt: 1.0 / 30.0,
            objects,
            detector: DetectorParams::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: Bomb ambush
    // -----------------------------------------------------------------------
    fn bomb_ambush(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(2));

        let mut objects = Vec::new();
        for i in 0..6 {
            let appear_at = i as f64 * 0.9;
            let x = 200.0 + rng.gen::<f64>() * 570.0;
            let vx = (rng.gen::<f64>() - 0.5) * 40.0;
            let peak = 200.0 + rng.gen::<f64>() * 150.0;
            objects.push(launch(2 * i, DetectionKind::Target, x, vx, peak, appear_at));
            // The bomb shadows the fruit at a short horizontal offset
            let side = if rng.gen::<bool>() { 1.0 } else { -1.0 };
            let offset = side * (70.0 + rng.gen::<f64>() * 40.0);
            objects.push(launch(
                2 * i + 1,
                DetectionKind::Hazard,
                x + offset,
                vx,
                peak + 20.0,
                appear_at,
            ));
        }

        Scenario {
            name: "bomb_ambush".into(),
            seed,
            duration: 7.0,
            frame_dt: 1.0 / 30.0,
            objects,
            detector: DetectorParams::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 4: Pomegranate
    // -----------------------------------------------------------------------
    fn pomegranate(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(3));

        let mut objects = vec![ThrownObject {
            id: 0,
            kind: DetectionKind::Target,
            position: Point::new(486.0, 444.0),
            velocity: Vec2::zeros(),
            motion: MotionSpec::Stationary,
            radius: 60.0,
            confidence: 0.95,
            appear_at: 0.5,
            disappear_at: Some(5.0),
            despawn_below: DESPAWN_Y,
        }];
        objects.extend((1..5).map(|i| {
            let appear_at = i as f64 * 1.1;
            let base = if i % 2 == 0 { 180.0 } else { 790.0 };
            let x = base + (rng.gen::<f64>() - 0.5) * 60.0;
            let peak = 200.0 + rng.gen::<f64>() * 100.0;
            launch(i, DetectionKind::Target, x, 0.0, peak, appear_at)
        }));

        Scenario {
            name: "pomegranate".into(),
            seed,
            duration: 7.0,
            frame_dt: 1.0 / 30.0,
            objects,
            // Held still on screen, the multi-hit fruit is reported at one spot
            detector: DetectorParams {
                pixel_noise: 0.0,
                lambda_false_alarm: 0.0,
                ..DetectorParams::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 5: Stress
    // -----------------------------------------------------------------------
    fn stress(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(4));

        let objects = (0..80)
            .map(|i| {
                let kind = if rng.gen::<f64>() < 0.2 {
                    DetectionKind::Hazard
                } else {
                    DetectionKind::Target
                };
                let appear_at = rng.gen::<f64>() * 12.0;
                let x = 100.0 + rng.gen::<f64>() * 770.0;
                let vx = (rng.gen::<f64>() - 0.5) * 120.0;
                let peak = 100.0 + rng.gen::<f64>() * 300.0;
                launch(i as u64, kind, x, vx, peak, appear_at)
            })
            .collect();

        Scenario {
            name: "stress".into(),
            seed,
            duration: 15.0,
            frame_dt: 1.0 / 60.0,
            objects,
            detector: DetectorParams {
                pixel_noise: 4.0,
                p_detection: 0.85,
                lambda_false_alarm: 0.3,
                ..DetectorParams::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Builder helpers
// ---------------------------------------------------------------------------

/// An object thrown from the launch line at `x` so that its arc tops out at
/// `peak_y`.
fn launch(
    id: u64,
    kind: DetectionKind,
    x: f64,
    vx: f64,
    peak_y: f64,
    appear_at: f64,
) -> ThrownObject {
    let vy = -(2.0 * GRAVITY * (LAUNCH_Y - peak_y)).sqrt();
    let (radius, confidence) = match kind {
        DetectionKind::Target => (TARGET_RADIUS, 0.9),
        DetectionKind::Hazard => (HAZARD_RADIUS, 1.0),
    };
    ThrownObject {
        id,
        kind,
        position: Point::new(x, LAUNCH_Y),
        velocity: Vec2::new(vx, vy),
        motion: MotionSpec::Ballistic { gravity: GRAVITY },
        radius,
        confidence,
        appear_at,
        disappear_at: None,
        despawn_below: DESPAWN_Y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ScenarioKind; 5] = [
        ScenarioKind::Single,
        ScenarioKind::Volley,
        ScenarioKind::BombAmbush,
        ScenarioKind::Pomegranate,
        ScenarioKind::Stress,
    ];

    #[test]
    fn launch_peaks_at_requested_height() {
        let mut obj = launch(0, DetectionKind::Target, 400.0, 0.0, 250.0, 0.0);
        let dt = 1.0 / 240.0;
        let mut t = 0.0;
        let mut top = f64::MAX;
        while obj.is_active(t) && t < 5.0 {
            obj.step(t, dt);
            t += dt;
            top = top.min(obj.position.y);
        }
        assert!((top - 250.0).abs() < 1.0, "peak at {top}");
    }

    #[test]
    fn every_scenario_produces_detections() {
        for kind in ALL {
            let log = Scenario::build(kind, 42).record();
            assert_eq!(log.frames.len(), log.ground_truth.len());
            assert!(
                log.frames.iter().any(|f| f.targets().next().is_some()),
                "{kind:?} never shows a target"
            );
        }
    }

    #[test]
    fn scenarios_are_deterministic_per_seed() {
        for kind in ALL {
            let a = Scenario::build(kind, 9).record();
            let b = Scenario::build(kind, 9).record();
            for (fa, fb) in a.frames.iter().zip(&b.frames) {
                assert_eq!(fa.detections, fb.detections);
            }
        }
    }

    #[test]
    fn bomb_ambush_throws_hazards() {
        let scenario = Scenario::build(ScenarioKind::BombAmbush, 1);
        let hazards = scenario
            .objects
            .iter()
            .filter(|o| o.kind == DetectionKind::Hazard)
            .count();
        assert_eq!(hazards, 6);
    }

    #[test]
    fn frame_timestamps_follow_capture_interval() {
        let log = Scenario::build(ScenarioKind::Single, 0).record();
        for (i, f) in log.frames.iter().enumerate() {
            assert_eq!(f.timestamp, i as f64 * log.frame_dt);
        }
    }
}
