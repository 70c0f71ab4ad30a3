//! End-to-end frame sequences through the full pipeline.

use slicer_core::{
    pipeline::{Pipeline, PipelineConfig},
    targeting::SwipeKind,
    types::{Detection, DetectionFrame, TrackId},
    ActionDecision,
};

const FRAME_DT: f64 = 1.0 / 32.0;

fn preferred_y() -> f64 {
    let cfg = PipelineConfig::default();
    cfg.targeting.preferred_fraction * cfg.targeting.playfield.height
}

fn frame(t: f64, detections: Vec<Detection>) -> DetectionFrame {
    DetectionFrame::new(t, detections)
}

#[test]
fn lone_target_gets_symmetric_swipe_at_predicted_x() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let y = preferred_y();

    // Low confidence on first sight keeps the engine from firing on one sample
    let out = pipeline.process_frame(&frame(0.0, vec![Detection::target(400.0, y, 0.4)]));
    assert_eq!(*out.action(), ActionDecision::NoAction);

    let out = pipeline.process_frame(&frame(FRAME_DT, vec![Detection::target(404.0, y, 1.0)]));
    let track = &out.tracks[0];
    let predicted_x = track.prediction.predicted_position.x;
    assert!((predicted_x - (404.0 + 128.0 * 0.15)).abs() < 1e-9);

    let swipe = out.action().swipe().expect("confident target in the window");
    assert_eq!(swipe.kind, SwipeKind::Single);
    assert_eq!(swipe.track_ids, vec![TrackId(0)]);
    assert!(((swipe.start.x + swipe.end.x) / 2.0 - predicted_x).abs() < 1e-9);
    assert!((swipe.end.x - swipe.start.x - 120.0).abs() < 1e-9);
    assert_eq!(swipe.start.y, swipe.end.y);
}

#[test]
fn hazard_left_of_target_shifts_swipe_start() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let y = preferred_y();
    let out = pipeline.process_frame(&frame(
        0.0,
        vec![Detection::hazard(425.0, y), Detection::target(500.0, y, 1.0)],
    ));
    let swipe = out.action().swipe().expect("hazard is outside the hard corridor");
    assert_eq!(swipe.start.x, 425.0 + 25.0);
    assert_eq!(swipe.end.x, 560.0);
}

#[test]
fn cramped_hazards_fall_back_to_minimal_swipe() {
    let mut cfg = PipelineConfig::default();
    cfg.targeting.safety_distance_scale = 10.0;
    cfg.targeting.corridor_half_length = 5.0;
    cfg.targeting.path_half_length = 5.0;
    cfg.targeting.avoidance_reach = 200.0;
    let mut pipeline = Pipeline::new(cfg);
    let y = preferred_y();
    let out = pipeline.process_frame(&frame(
        0.0,
        vec![
            Detection::hazard(470.0, y),
            Detection::hazard(530.0, y),
            Detection::target(500.0, y, 1.0),
        ],
    ));
    let swipe = out.action().swipe().expect("swipe");
    assert_eq!((swipe.start.x, swipe.end.x), (460.0, 540.0));
}

#[test]
fn high_cluster_becomes_one_group_swipe() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let out = pipeline.process_frame(&frame(
        0.0,
        vec![
            Detection::target(380.0, 255.0, 0.8),
            Detection::target(300.0, 245.0, 1.0),
            Detection::target(420.0, 250.0, 0.9),
        ],
    ));
    let swipe = out.action().swipe().expect("group swipe");
    assert_eq!(swipe.kind, SwipeKind::Group);
    assert_eq!(swipe.track_ids.len(), 3);
    assert_eq!(swipe.start.x, 250.0);
    assert_eq!(swipe.end.x, 470.0);
    assert_eq!(swipe.start.y, 250.0);
}

#[test]
fn swipes_never_violate_min_interval() {
    let cfg = PipelineConfig::default();
    let interval = cfg.targeting.min_action_interval;
    let mut pipeline = Pipeline::new(cfg);
    let y = preferred_y();

    // Deterministic jitter on timestamps and positions
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % 10_000) as f64 / 10_000.0
    };

    let mut t = 0.0;
    let mut last_swipe: Option<f64> = None;
    for _ in 0..2000 {
        t += 0.005 + 0.04 * next();
        let detections = (0..3)
            .map(|i| {
                let x = 150.0 + 300.0 * i as f64 + 20.0 * next();
                Detection::target(x, y, 0.6 + 0.4 * next())
            })
            .collect();
        let out = pipeline.process_frame(&frame(t, detections));
        if out.action().is_swipe() {
            if let Some(prev) = last_swipe {
                assert!(t - prev >= interval, "swipes at {prev} and {t}");
            }
            last_swipe = Some(t);
        }
    }
    assert!(last_swipe.is_some());
}

#[test]
fn persistent_spot_triggers_rapid_mode_until_exact_expiry() {
    let cfg = PipelineConfig::default();
    let mode_duration = cfg.targeting.mode.mode_duration;
    let mut pipeline = Pipeline::new(cfg);
    let y = preferred_y();

    let mut activated_at = None;
    let mut deactivated_at = None;
    for i in 0..=48 {
        let now = i as f64 * 0.125;
        // A multi-hit target sitting still in the same spot, seen every frame
        let out = pipeline.process_frame(&frame(now, vec![Detection::target(480.0, y, 1.0)]));
        let active = out.decision.rapid_mode;
        match activated_at {
            None if active => activated_at = Some(now),
            Some(t0) if !active && deactivated_at.is_none() => {
                deactivated_at = Some(now);
                assert!(now > t0 + mode_duration);
            }
            Some(t0) if deactivated_at.is_none() => assert!(now <= t0 + mode_duration),
            _ => {}
        }
    }

    assert_eq!(activated_at, Some(1.125));
    // Still observed every frame, yet off at the first frame after expiry
    assert_eq!(deactivated_at, Some(4.25));
}

#[test]
fn rapid_mode_shortens_swipes() {
    let cfg = PipelineConfig::default();
    let base = cfg.targeting.swipe_duration;
    let factor = cfg.targeting.mode.rapid_duration_factor;
    let mut pipeline = Pipeline::new(cfg);
    let y = preferred_y();

    let mut normal = None;
    let mut rapid = None;
    for i in 0..=20 {
        let now = i as f64 * 0.125;
        let out = pipeline.process_frame(&frame(now, vec![Detection::target(480.0, y, 1.0)]));
        if let Some(s) = out.action().swipe() {
            if out.decision.rapid_mode {
                rapid.get_or_insert(s.duration);
            } else {
                normal.get_or_insert(s.duration);
            }
        }
    }
    assert_eq!(normal, Some(base));
    assert!((rapid.expect("rapid swipe") - base * factor).abs() < 1e-12);
}

#[test]
fn identical_inputs_give_identical_decisions() {
    let run = || {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let mut actions = Vec::new();
        for i in 0..60 {
            let t = i as f64 * FRAME_DT;
            let y = 700.0 - 600.0 * t + 245.0 * t * t;
            let out = pipeline.process_frame(&frame(
                t,
                vec![
                    Detection::target(300.0 + 50.0 * t, y, 0.9),
                    Detection::target(620.0 - 50.0 * t, y + 3.0, 0.9),
                    Detection::hazard(460.0, y + 200.0),
                ],
            ));
            actions.push(out.decision.action);
        }
        actions
    };
    assert_eq!(run(), run());
}
