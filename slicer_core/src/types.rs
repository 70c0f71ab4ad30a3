//! Fundamental types used across the entire workspace.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Geometry: screen pixels, y axis pointing down.
// ---------------------------------------------------------------------------

/// Screen-space position in pixels. `y` grows downward.
pub type Point = Point2<f64>;

/// Screen-space displacement / velocity (pixels, pixels per second).
pub type Vec2 = Vector2<f64>;

/// Timestamps are seconds on the caller's clock.
pub type Timestamp = f64;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// What the external detector thinks an object is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Something worth slicing (fruit).
    Target,
    /// Something that must never be touched (bomb).
    Hazard,
}

/// Axis-aligned bounding extent of a detection, centred on its position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

/// A single object observation produced by the detector for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub kind: DetectionKind,
    /// Object centre in pixels
    pub position: Point,
    /// Detector confidence in [0, 1]
    pub confidence: f64,
    /// Optional bounding extent
    #[serde(default)]
    pub extent: Option<Extent>,
}

impl Detection {
    pub fn target(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            kind: DetectionKind::Target,
            position: Point::new(x, y),
            confidence,
            extent: None,
        }
    }

    pub fn hazard(x: f64, y: f64) -> Self {
        Self {
            kind: DetectionKind::Hazard,
            position: Point::new(x, y),
            confidence: 1.0,
            extent: None,
        }
    }

    pub fn is_target(&self) -> bool {
        self.kind == DetectionKind::Target
    }

    pub fn is_hazard(&self) -> bool {
        self.kind == DetectionKind::Hazard
    }

    /// Bring a raw detection into the range the core assumes.
    ///
    /// Returns `None` when the position is not finite. A non-finite confidence
    /// is treated as zero; everything else is clamped to [0, 1].
    pub fn sanitized(&self) -> Option<Detection> {
        if !(self.position.x.is_finite() && self.position.y.is_finite()) {
            return None;
        }
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(Detection {
            confidence,
            ..self.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// DetectionFrame
// ---------------------------------------------------------------------------

/// The detector's output for one captured frame. Detection order carries no meaning.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// Capture time of the frame (seconds)
    pub timestamp: Timestamp,
    pub detections: Vec<Detection>,
}

impl DetectionFrame {
    pub fn new(timestamp: Timestamp, detections: Vec<Detection>) -> Self {
        Self {
            timestamp,
            detections,
        }
    }

    pub fn hazards(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.is_hazard())
    }

    pub fn targets(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.is_target())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
