use sim::{evaluate, load_replay, save_replay, Scenario, ScenarioKind};
use slicer_core::pipeline::{Pipeline, PipelineConfig};

const ALL: [ScenarioKind; 5] = [
    ScenarioKind::Single,
    ScenarioKind::Volley,
    ScenarioKind::BombAmbush,
    ScenarioKind::Pomegranate,
    ScenarioKind::Stress,
];

#[test]
fn saved_replay_drives_the_same_decisions() {
    let log = Scenario::build(ScenarioKind::BombAmbush, 17).record();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bomb_ambush.json");
    save_replay(&log, &path).unwrap();
    let loaded = load_replay(&path).unwrap();

    assert_eq!(loaded.scenario_name, "bomb_ambush");
    assert_eq!(loaded.frames.len(), log.frames.len());

    let mut a = Pipeline::new(PipelineConfig::default());
    let mut b = Pipeline::new(PipelineConfig::default());
    for (fa, fb) in log.frames.iter().zip(&loaded.frames) {
        assert_eq!(a.process_frame(fa).decision.action, b.process_frame(fb).decision.action);
    }
}

#[test]
fn no_scenario_breaks_the_action_interval() {
    for kind in ALL {
        for seed in [1, 2, 3] {
            let log = Scenario::build(kind, seed).record();
            let mut pipeline = Pipeline::new(PipelineConfig::default());
            let interval = pipeline.engine.config.min_action_interval;
            let mut last: Option<f64> = None;
            for frame in &log.frames {
                if pipeline.process_frame(frame).action().is_swipe() {
                    if let Some(prev) = last {
                        assert!(frame.timestamp - prev >= interval, "{kind:?} seed {seed}");
                    }
                    last = Some(frame.timestamp);
                }
            }
        }
    }
}

#[test]
fn swipes_stay_inside_the_playfield() {
    for kind in ALL {
        let log = Scenario::build(kind, 8).record();
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let field = pipeline.engine.config.playfield;
        for frame in &log.frames {
            if let Some(s) = pipeline.process_frame(frame).action().swipe() {
                for p in [s.start, s.end] {
                    assert!((0.0..=field.width).contains(&p.x), "{kind:?}: {p:?}");
                    assert!((0.0..=field.height).contains(&p.y), "{kind:?}: {p:?}");
                }
            }
        }
    }
}

#[test]
fn pomegranate_engages_rapid_mode() {
    let log = Scenario::build(ScenarioKind::Pomegranate, 42).record();
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let m = evaluate(&log, &mut pipeline);
    assert!(m.rapid_swipes > 0);
}
