//! Track lifecycle management: greedy association, birth, expiry.
//!
//! # Track Management Policy
//! - **Association**: tracks are visited in ascending ID order. Each track that
//!   was seen within `recency_window` claims its nearest unclaimed detection if
//!   that detection is strictly closer than `association_distance`.
//! - **Birth**: every detection left unclaimed spawns a new track.
//! - **Expiry**: a track is destroyed once it has gone unmatched for more than
//!   `expiry_window`. The sweep runs every frame, including empty ones.
//!
//! Greedy nearest-match is an approximation of optimal assignment. Two tracks
//! competing for one detection resolve in favour of the lower ID, and the loser
//! may end up unmatched even when a globally better pairing exists. This is
//! accepted because the next frame re-evaluates everything anyway.

use crate::{
    track::Track,
    types::{Detection, Timestamp, TrackId},
};
use nalgebra::distance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Configuration for association and track lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackManagerConfig {
    /// Maximum centre-to-centre distance (px) for a detection to extend a track
    pub association_distance: f64,
    /// Tracks not updated within this window (s) cannot claim detections
    pub recency_window: f64,
    /// Tracks unmatched for longer than this (s) are destroyed
    pub expiry_window: f64,
    /// Number of history samples kept per track
    pub history_capacity: usize,
}

impl Default for TrackManagerConfig {
    fn default() -> Self {
        Self {
            association_distance: 80.0, // fast fruit moves ~60 px between frames
            recency_window: 0.8,
            expiry_window: 1.5,
            history_capacity: 15,
        }
    }
}

/// Live tracks after one association pass, plus what happened to get there.
#[derive(Clone, Debug)]
pub struct Association<'a> {
    /// All live tracks, ascending ID
    pub tracks: Vec<&'a Track>,
    /// (track, detection index) pairs accepted this frame
    pub matches: Vec<(TrackId, usize)>,
    /// Tracks spawned this frame
    pub births: Vec<TrackId>,
    /// Tracks destroyed by the expiry sweep this frame
    pub expired: Vec<TrackId>,
}

/// Owns the track table.
#[derive(Clone, Debug)]
pub struct TrackManager {
    pub config: TrackManagerConfig,
    tracks: BTreeMap<TrackId, Track>,
    next_id: u64,
}

impl TrackManager {
    pub fn new(config: TrackManagerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Associate this frame's detections with the live tracks.
    ///
    /// Hazard detections are ignored; only targets are tracked.
    pub fn associate(&mut self, detections: &[Detection], now: Timestamp) -> Association<'_> {
        let cfg = &self.config;
        let mut claimed = vec![false; detections.len()];
        let mut matches = Vec::new();

        for track in self.tracks.values_mut() {
            if now - track.last_seen >= cfg.recency_window {
                continue;
            }
            let last = track.position();
            let nearest = detections
                .iter()
                .enumerate()
                .filter(|(i, d)| d.is_target() && !claimed[*i])
                .map(|(i, d)| (i, distance(&last, &d.position)))
                // min_by keeps the first of equal elements: ties go to the lowest index
                .min_by(|a, b| a.1.total_cmp(&b.1));

            if let Some((di, dist)) = nearest {
                if dist < cfg.association_distance {
                    track.record(&detections[di], now);
                    claimed[di] = true;
                    matches.push((track.id, di));
                }
            }
        }

        let mut births = Vec::new();
        for (di, det) in detections.iter().enumerate() {
            if claimed[di] || !det.is_target() {
                continue;
            }
            let id = self.next_track_id();
            let track = Track::new(id, det, now, self.config.history_capacity);
            debug!(track = %id, x = det.position.x, y = det.position.y, "track born");
            self.tracks.insert(id, track);
            births.push(id);
        }

        let expired = self.expire(now);

        Association {
            tracks: self.tracks.values().collect(),
            matches,
            births,
            expired,
        }
    }

    /// Remove every track unmatched for longer than the expiry window.
    pub fn expire(&mut self, now: Timestamp) -> Vec<TrackId> {
        let window = self.config.expiry_window;
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| now - t.last_seen > window)
            .map(|t| t.id)
            .collect();
        for id in &stale {
            if let Some(track) = self.tracks.remove(id) {
                debug!(track = %id, age = track.age(now), hits = track.total_hits, "track expired");
            }
        }
        stale
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Live tracks in ascending ID order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drop every track. IDs keep counting up.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
