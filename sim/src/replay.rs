//! Replay: serialize/deserialize recorded detection streams for offline runs.

use serde::{Deserialize, Serialize};
use slicer_core::{metrics::GroundTruth, types::DetectionFrame};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A full recorded scenario log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub frame_dt: f64,
    pub duration: f64,
    /// All detection frames in capture order
    pub frames: Vec<DetectionFrame>,
    /// True object states, one entry per captured frame
    pub ground_truth: Vec<GroundTruthFrame>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundTruthFrame {
    pub time: f64,
    pub objects: Vec<GroundTruth>,
}

impl ReplayLog {
    /// Ground truth at the first recorded time not earlier than `t`, or the
    /// last entry when `t` is past the end of the log.
    pub fn truth_at(&self, t: f64) -> Option<&GroundTruthFrame> {
        let idx = self.ground_truth.partition_point(|g| g.time < t);
        self.ground_truth.get(idx).or_else(|| self.ground_truth.last())
    }
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    Ok(log)
}
