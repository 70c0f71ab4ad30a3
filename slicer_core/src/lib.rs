//! `slicer_core`: Perception-to-action core of a swipe-to-slice game agent.
//!
//! # Module layout
//! - [`types`]: Fundamental types (IDs, points, detections, frames)
//! - [`track`]: Track struct and bounded position history
//! - [`track_manager`]: Greedy association, birth and expiry
//! - [`predictor`]: Velocity / acceleration estimate, phase, extrapolation
//! - [`mode`]: Persistence-triggered rapid mode
//! - [`targeting`]: Safety scoring, ranking, swipe shaping, grouping
//! - [`pipeline`]: Per-frame orchestrator and config validation
//! - [`metrics`]: Swipe counts and hit/hazard rates
//! - [`error`]: Configuration errors

pub mod error;
pub mod metrics;
pub mod mode;
pub mod pipeline;
pub mod predictor;
pub mod targeting;
pub mod track;
pub mod track_manager;
pub mod types;

pub use error::ConfigError;
pub use pipeline::{FrameOutput, Pipeline, PipelineConfig};
pub use predictor::{MotionEstimate, MotionPhase, Prediction};
pub use targeting::{ActionDecision, Decision, Swipe, SwipeKind, TrackedTarget};
pub use track::Track;
pub use types::{Detection, DetectionFrame, DetectionKind, Point, TrackId};
