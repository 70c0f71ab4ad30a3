//! Object-detector simulator.
//!
//! Turns true object states into one `DetectionFrame` per captured frame with:
//! - uniform pixel noise on positions and confidence jitter
//! - miss probability (1 - P_D)
//! - Poisson false alarms reported as low-confidence targets
//! - shuffled detection order (the detector makes no ordering promise)

use crate::target::ThrownObject;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use slicer_core::{
    targeting::Playfield,
    types::{Detection, DetectionFrame, DetectionKind, Extent, Point},
};

/// Detector error model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    pub playfield: Playfield,
    /// Half-width of the uniform position noise (pixels)
    pub pixel_noise: f64,
    /// Probability that a visible object is reported
    pub p_detection: f64,
    /// Mean number of false alarms per frame
    pub lambda_false_alarm: f64,
    /// Half-width of the uniform confidence jitter
    pub confidence_jitter: f64,
    /// Confidence range of false alarms
    pub false_alarm_confidence: (f64, f64),
    pub shuffle: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            playfield: Playfield::default(),
            pixel_noise: 2.0,
            p_detection: 0.95,
            lambda_false_alarm: 0.05,
            confidence_jitter: 0.05,
            false_alarm_confidence: (0.3, 0.6),
            shuffle: true,
        }
    }
}

impl DetectorParams {
    /// A detector that reports every visible object exactly.
    pub fn perfect() -> Self {
        Self {
            pixel_noise: 0.0,
            p_detection: 1.0,
            lambda_false_alarm: 0.0,
            confidence_jitter: 0.0,
            shuffle: false,
            ..Self::default()
        }
    }

    fn visible(&self, p: &Point) -> bool {
        p.x >= 0.0 && p.x <= self.playfield.width && p.y >= 0.0 && p.y <= self.playfield.height
    }
}

/// Generates detection frames from a set of objects.
pub struct DetectorSimulator {
    pub params: DetectorParams,
    rng: ChaCha8Rng,
}

impl DetectorSimulator {
    pub fn new(params: DetectorParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Report the objects active and on screen at time `t`.
    pub fn detect(&mut self, objects: &[ThrownObject], t: f64) -> DetectionFrame {
        let p = &self.params;
        let mut detections = Vec::new();

        for obj in objects {
            if !obj.is_active(t) || !p.visible(&obj.position) {
                continue;
            }
            // Miss detection?
            if self.rng.gen::<f64>() > p.p_detection {
                continue;
            }

            let x = obj.position.x + self.rng.gen::<f64>() * p.pixel_noise * 2.0 - p.pixel_noise;
            let y = obj.position.y + self.rng.gen::<f64>() * p.pixel_noise * 2.0 - p.pixel_noise;
            let confidence = (obj.confidence + self.rng.gen::<f64>() * p.confidence_jitter * 2.0
                - p.confidence_jitter)
                .clamp(0.0, 1.0);

            detections.push(Detection {
                kind: obj.kind,
                position: Point::new(x, y),
                confidence,
                extent: Some(Extent {
                    width: 2.0 * obj.radius,
                    height: 2.0 * obj.radius,
                }),
            });
        }

        // Poisson false alarms: multiply uniforms until the product drops below e^{-lambda}
        let lambda = p.lambda_false_alarm;
        let n_false = if lambda <= 0.0 {
            0usize
        } else {
            let mut n = 0usize;
            let threshold = (-lambda).exp();
            let mut prod = self.rng.gen::<f64>();
            while prod > threshold && n < 20 {
                prod *= self.rng.gen::<f64>();
                n += 1;
            }
            n
        };
        let (c_lo, c_hi) = p.false_alarm_confidence;
        for _ in 0..n_false {
            let x = self.rng.gen::<f64>() * p.playfield.width;
            let y = self.rng.gen::<f64>() * p.playfield.height;
            let confidence = c_lo + self.rng.gen::<f64>() * (c_hi - c_lo);
            detections.push(Detection {
                kind: DetectionKind::Target,
                position: Point::new(x, y),
                confidence,
                extent: None,
            });
        }

        if p.shuffle {
            detections.shuffle(&mut self.rng);
        }

        DetectionFrame::new(t, detections)
    }
}
