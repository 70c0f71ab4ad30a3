//! `sim`: scenario simulator with thrown-object arcs, detector noise and replay.

pub mod detector_sim;
pub mod evaluate;
pub mod replay;
pub mod scenarios;
pub mod target;

pub use detector_sim::{DetectorParams, DetectorSimulator};
pub use evaluate::evaluate;
pub use replay::{load_replay, save_replay, GroundTruthFrame, ReplayLog};
pub use scenarios::{Scenario, ScenarioKind};
pub use target::{MotionSpec, ThrownObject};
