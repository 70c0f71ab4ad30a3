//! Persistence-triggered rapid mode.
//!
//! Some targets survive several hits (a pomegranate keeps taking cuts in the
//! same spot). When the same screen position keeps getting swiped for long
//! enough, the engine switches to a rapid mode with shorter swipes for a fixed
//! window.
//!
//! Candidates are keyed by a quantised screen position, not by track ID. A
//! target that drifts by more than one quantum registers as a new candidate,
//! so persistence of moving targets is undercounted.

use crate::types::{Point, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Quantised screen position identifying a persistence candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint {
    pub x: i64,
    pub y: i64,
}

impl Fingerprint {
    pub fn from_position(position: &Point, quantum: f64) -> Self {
        let q = if quantum > 0.0 { quantum } else { 1.0 };
        Self {
            x: (position.x / q).round() as i64,
            y: (position.y / q).round() as i64,
        }
    }
}

/// First sighting and number of observations of one fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub first_seen: Timestamp,
    pub observations: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Pixel size of a fingerprint cell
    pub fingerprint_quantum: f64,
    /// A candidate must have persisted strictly longer than this (s) to trigger
    pub persistence_threshold: f64,
    /// ... and been observed at least this many times
    pub min_observations: u32,
    /// How long rapid mode stays on once triggered (s)
    pub mode_duration: f64,
    /// Candidates older than this (s) are forgotten. Must exceed `persistence_threshold`.
    pub candidate_window: f64,
    /// Swipe duration multiplier while rapid mode is active
    pub rapid_duration_factor: f64,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            fingerprint_quantum: 1.0,
            persistence_threshold: 1.0,
            min_observations: 2,
            mode_duration: 3.0,
            candidate_window: 2.0,
            rapid_duration_factor: 0.8,
        }
    }
}

/// Mode flag, its expiry, and the candidate table.
#[derive(Clone, Debug, Default)]
pub struct ModeState {
    active: bool,
    expires_at: Timestamp,
    candidates: BTreeMap<Fingerprint, Candidate>,
}

impl ModeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active at `now`? Stays true up to and including `expires_at`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.active && now <= self.expires_at
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.active.then_some(self.expires_at)
    }

    pub fn candidates(&self) -> &BTreeMap<Fingerprint, Candidate> {
        &self.candidates
    }

    /// Per-frame housekeeping: expiry, purge, then activation check.
    /// Returns whether the mode is active afterwards.
    ///
    /// Expiry forgets every candidate, so the frame that ends the mode can
    /// never restart it.
    pub fn refresh(&mut self, config: &ModeConfig, now: Timestamp) -> bool {
        if self.active && now > self.expires_at {
            // Persistence must be re-earned after a rapid window
            self.active = false;
            self.candidates.clear();
            info!(now, "rapid mode expired");
            return false;
        }

        let window = config.candidate_window;
        self.candidates
            .retain(|_, c| now - c.first_seen <= window);

        if !self.active {
            let trigger = self.candidates.iter().find(|(_, c)| {
                now - c.first_seen > config.persistence_threshold
                    && c.observations >= config.min_observations
            });
            if let Some((fp, c)) = trigger {
                self.active = true;
                self.expires_at = now + config.mode_duration;
                info!(
                    x = fp.x,
                    y = fp.y,
                    observations = c.observations,
                    until = self.expires_at,
                    "persistent target, entering rapid mode"
                );
            }
        }
        self.active
    }

    /// Record one observation of the target at `position`.
    pub fn observe(&mut self, config: &ModeConfig, position: &Point, now: Timestamp) {
        let fp = Fingerprint::from_position(position, config.fingerprint_quantum);
        self.candidates
            .entry(fp)
            .and_modify(|c| c.observations = c.observations.saturating_add(1))
            .or_insert(Candidate {
                first_seen: now,
                observations: 1,
            });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f64 = 0.125;

    #[test]
    fn activates_after_persistence_and_expires_exactly() {
        let cfg = ModeConfig::default();
        let mut mode = ModeState::new();
        let spot = Point::new(400.0, 300.0);

        let mut activated_at = None;
        for i in 0..=40 {
            let now = i as f64 * STEP;
            let active = mode.refresh(&cfg, now);
            if active && activated_at.is_none() {
                activated_at = Some(now);
            }
            if let Some(t0) = activated_at {
                let expiry = t0 + cfg.mode_duration;
                if now <= expiry {
                    assert!(active, "must stay active until {expiry}, failed at {now}");
                } else {
                    assert!(!active, "must be inactive after {expiry}, still on at {now}");
                    break;
                }
            }
            // The same spot keeps being observed every frame
            mode.observe(&cfg, &spot, now);
        }
        // first_seen = 0, needs strictly more than 1 s
        assert_eq!(activated_at, Some(1.125));
    }

    #[test]
    fn long_lived_candidate_cannot_restart_mode_at_expiry() {
        // Candidates outlive the mode itself
        let cfg = ModeConfig {
            candidate_window: 5.0,
            ..ModeConfig::default()
        };
        let mut mode = ModeState::new();
        let spot = Point::new(400.0, 300.0);

        let mut states = Vec::new();
        for i in 0..=60 {
            let now = i as f64 * STEP;
            states.push((now, mode.refresh(&cfg, now), mode.expires_at()));
            mode.observe(&cfg, &spot, now);
        }

        for &(now, active, expires_at) in &states {
            let expected = (1.125..=4.125).contains(&now) || now >= 5.375;
            assert_eq!(active, expected, "at {now}");
            assert_eq!(expires_at.is_some(), active, "at {now}");
        }
        // Restarted only once the spot had persisted again from scratch
        let restart = states.iter().find(|(now, _, _)| *now == 5.375).and_then(|s| s.2);
        assert_eq!(restart, Some(5.375 + cfg.mode_duration));
    }

    #[test]
    fn single_observation_never_triggers() {
        let cfg = ModeConfig::default();
        let mut mode = ModeState::new();
        mode.observe(&cfg, &Point::new(10.0, 10.0), 0.0);
        assert!(!mode.refresh(&cfg, 1.5));
    }

    #[test]
    fn candidates_are_purged_even_while_active() {
        let cfg = ModeConfig::default();
        let mut mode = ModeState::new();
        let spot = Point::new(50.0, 50.0);
        mode.observe(&cfg, &spot, 0.0);
        mode.observe(&cfg, &spot, 0.5);
        assert!(mode.refresh(&cfg, 1.25));
        mode.observe(&cfg, &Point::new(600.0, 50.0), 1.25);
        assert!(mode.refresh(&cfg, 2.25));
        // The first candidate is older than the window; the newer one survives
        assert_eq!(mode.candidates().len(), 1);
        assert!(mode.is_active(2.25));
    }

    #[test]
    fn fingerprint_is_position_keyed() {
        let cfg = ModeConfig::default();
        let mut mode = ModeState::new();
        // Same object drifting by two pixels between observations
        mode.observe(&cfg, &Point::new(200.0, 200.0), 0.0);
        mode.observe(&cfg, &Point::new(202.0, 200.0), 0.1);
        assert_eq!(mode.candidates().len(), 2);
        assert!(mode.candidates().values().all(|c| c.observations == 1));
        assert!(!mode.refresh(&cfg, 1.5));

        // Sub-quantum jitter lands on the same key
        mode.observe(&cfg, &Point::new(200.3, 199.8), 0.2);
        let fp = Fingerprint::from_position(&Point::new(200.0, 200.0), 1.0);
        assert_eq!(mode.candidates()[&fp].observations, 2);
    }
}
