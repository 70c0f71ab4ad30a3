//! Session metrics: swipe counts, track turnover, and hit/hazard rates
//! against ground truth.

use crate::{
    pipeline::FrameOutput,
    targeting::{Swipe, SwipeKind},
    types::{DetectionKind, Point},
};
use serde::{Deserialize, Serialize};

/// True state of one on-screen object at the moment a swipe lands.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Object ID from the simulator
    pub object_id: u64,
    pub kind: DetectionKind,
    pub position: Point,
    /// Hit radius in pixels
    pub radius: f64,
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Number of frames processed
    pub n_frames: u64,
    pub swipes: u64,
    pub group_swipes: u64,
    /// Swipes issued while rapid mode was on
    pub rapid_swipes: u64,
    /// Frames rejected by the cooldown gate
    pub cooldown_frames: u64,
    /// Sum over swipes of the number of tracks each one aimed at
    pub targets_engaged: u64,
    pub tracks_born: u64,
    pub tracks_expired: u64,
    pub dropped_detections: u64,
    /// Swipes judged against ground truth
    pub judged_swipes: u64,
    /// Judged swipes that crossed at least one target
    pub productive_swipes: u64,
    /// Distinct targets crossed by judged swipes
    pub targets_hit: u64,
    /// Judged swipes that crossed a hazard
    pub hazard_hits: u64,
    /// Sum of per-frame processing time
    pub total_time_us: u64,
}

impl SessionMetrics {
    /// Fold one frame's bookkeeping into the totals.
    pub fn accumulate(&mut self, out: &FrameOutput) {
        self.n_frames += 1;
        self.tracks_born += out.births as u64;
        self.tracks_expired += out.expirations as u64;
        self.dropped_detections += out.dropped_detections as u64;
        self.total_time_us += out.total_time_us;
        if out.decision.cooling_down {
            self.cooldown_frames += 1;
        }
        if let Some(swipe) = out.action().swipe() {
            self.swipes += 1;
            self.targets_engaged += swipe.track_ids.len() as u64;
            if swipe.kind == SwipeKind::Group {
                self.group_swipes += 1;
            }
            if out.decision.rapid_mode {
                self.rapid_swipes += 1;
            }
        }
    }

    /// Score a swipe against the objects on screen when it lands.
    pub fn judge(&mut self, swipe: &Swipe, truth: &[GroundTruth]) {
        self.judged_swipes += 1;
        let crossed: Vec<&GroundTruth> = truth
            .iter()
            .filter(|g| segment_distance(&swipe.start, &swipe.end, &g.position) <= g.radius)
            .collect();
        let targets = crossed
            .iter()
            .filter(|g| g.kind == DetectionKind::Target)
            .count() as u64;
        if targets > 0 {
            self.productive_swipes += 1;
            self.targets_hit += targets;
        }
        if crossed.iter().any(|g| g.kind == DetectionKind::Hazard) {
            self.hazard_hits += 1;
        }
    }

    /// Productive judged swipes / judged swipes
    pub fn precision(&self) -> f64 {
        if self.judged_swipes == 0 {
            1.0
        } else {
            self.productive_swipes as f64 / self.judged_swipes as f64
        }
    }

    /// Judged swipes that touched a hazard / judged swipes
    pub fn hazard_rate(&self) -> f64 {
        if self.judged_swipes == 0 {
            0.0
        } else {
            self.hazard_hits as f64 / self.judged_swipes as f64
        }
    }

    pub fn mean_frame_time_us(&self) -> f64 {
        if self.n_frames == 0 {
            0.0
        } else {
            self.total_time_us as f64 / self.n_frames as f64
        }
    }

    /// Combine totals from independent runs.
    pub fn merge(&mut self, other: &SessionMetrics) {
        self.n_frames += other.n_frames;
        self.swipes += other.swipes;
        self.group_swipes += other.group_swipes;
        self.rapid_swipes += other.rapid_swipes;
        self.cooldown_frames += other.cooldown_frames;
        self.targets_engaged += other.targets_engaged;
        self.tracks_born += other.tracks_born;
        self.tracks_expired += other.tracks_expired;
        self.dropped_detections += other.dropped_detections;
        self.judged_swipes += other.judged_swipes;
        self.productive_swipes += other.productive_swipes;
        self.targets_hit += other.targets_hit;
        self.hazard_hits += other.hazard_hits;
        self.total_time_us += other.total_time_us;
    }
}

/// Distance from `p` to the segment `a`–`b`.
pub fn segment_distance(a: &Point, b: &Point, p: &Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}
