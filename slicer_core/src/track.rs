//! Track: identity, bounded position history, and latest observation metadata.

use crate::types::{Detection, Extent, Point, Timestamp, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One timestamped position observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: Timestamp,
    pub position: Point,
}

/// A single tracked target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier, never reused
    pub id: TrackId,
    /// Past observations (most recent last), at most `capacity` long
    history: VecDeque<Sample>,
    capacity: usize,
    /// Time of birth
    pub first_seen: Timestamp,
    /// Time of the most recent matched detection
    pub last_seen: Timestamp,
    /// Detector confidence of the latest matched detection
    pub confidence: f64,
    /// Extent of the latest matched detection, if the detector reported one
    pub extent: Option<Extent>,
    /// Number of detections absorbed (birth counts as one)
    pub total_hits: u32,
}

impl Track {
    /// Create a track from the detection that spawned it.
    pub fn new(id: TrackId, detection: &Detection, now: Timestamp, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(Sample {
            time: now,
            position: detection.position,
        });
        Self {
            id,
            history,
            capacity,
            first_seen: now,
            last_seen: now,
            confidence: detection.confidence,
            extent: detection.extent,
            total_hits: 1,
        }
    }

    /// Absorb a matched detection into the history ring-buffer.
    pub fn record(&mut self, detection: &Detection, now: Timestamp) {
        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(Sample {
            time: now,
            position: detection.position,
        });
        self.last_seen = now;
        self.confidence = detection.confidence;
        self.extent = detection.extent;
        self.total_hits = self.total_hits.saturating_add(1);
    }

    pub fn history(&self) -> &VecDeque<Sample> {
        &self.history
    }

    /// Most recent observation. A live track always has one.
    pub fn latest(&self) -> Sample {
        // `new` seeds the history and `record` only evicts when full.
        self.history[self.history.len() - 1]
    }

    pub fn position(&self) -> Point {
        self.latest().position
    }

    /// True if the track absorbed a detection at exactly `now`.
    pub fn seen_at(&self, now: Timestamp) -> bool {
        self.last_seen == now
    }

    pub fn age(&self, now: Timestamp) -> f64 {
        now - self.first_seen
    }
}
