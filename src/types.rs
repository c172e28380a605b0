// src/types.rs
//
// Shared value types and the full configuration tree. Section configs live
// next to the component that consumes them and are composed here.

use crate::analysis::behavior::BehaviorConfig;
use crate::analysis::group_detector::GroupConfig;
use crate::analysis::person_tracker::TrackerConfig;
use crate::analysis::purchase_journey::JourneyConfig;
use crate::analysis::zones::ZoneSpec;
use crate::error::DetectionError;
use crate::identity::IdentityConfig;
use crate::persistence::PersistenceConfig;
use crate::pipeline::ingest::IngestConfig;
use crate::pipeline::orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub frame: FrameConfig,
    pub tracker: TrackerConfig,
    /// zone id → {name, polygon, zone_type}
    pub zones: BTreeMap<String, ZoneSpec>,
    pub behavior: BehaviorConfig,
    pub groups: GroupConfig,
    pub journey: JourneyConfig,
    pub orchestrator: OrchestratorConfig,
    pub ingest: IngestConfig,
    pub identity: IdentityConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

impl FrameConfig {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "footfall_analytics=info".to_string(),
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Frame-pixel coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Arithmetic mean of a set of points; `None` when empty.
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Point> {
        let (mut sx, mut sy, mut n) = (0.0f32, 0.0f32, 0usize);
        for p in points {
            sx += p.x;
            sy += p.y;
            n += 1;
        }
        if n == 0 {
            None
        } else {
            Some(Point::new(sx / n as f32, sy / n as f32))
        }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

// ============================================================================
// DETECTOR INPUT
// ============================================================================

/// One person detection as emitted by the external detector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Detection {
    /// [x1, y1, x2, y2] pixels
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub center: Option<Point>,
    /// Appearance embedding for the identity collaborator, when available
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Bag / basket attribute from the detector, when available
    #[serde(default)]
    pub carrying_items: Option<bool>,
}

/// A detection that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidBox {
    pub bbox: [f32; 4],
    pub center: Point,
}

impl ValidBox {
    pub fn width(&self) -> f32 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

impl Detection {
    pub fn new(bbox: [f32; 4], confidence: f32) -> Self {
        Self {
            bbox: Some(bbox),
            confidence,
            ..Default::default()
        }
    }

    /// Check the bounding box; the center falls back to the bbox midpoint.
    pub fn validate(&self) -> Result<ValidBox, DetectionError> {
        let bbox = self.bbox.ok_or(DetectionError::MissingBbox)?;
        if bbox.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::NonFinite);
        }
        let (w, h) = (bbox[2] - bbox[0], bbox[3] - bbox[1]);
        if w <= 0.0 || h <= 0.0 {
            return Err(DetectionError::DegenerateBbox {
                width: w,
                height: h,
            });
        }
        let center = match self.center {
            Some(c) if c.is_finite() => c,
            Some(_) => return Err(DetectionError::NonFinite),
            None => Point::new((bbox[0] + bbox[2]) * 0.5, (bbox[1] + bbox[3]) * 0.5),
        };
        Ok(ValidBox { bbox, center })
    }
}

/// All detections for a single camera frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub frame_id: u64,
    /// Seconds (Unix epoch) at capture time
    pub timestamp: f64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

// ============================================================================
// IDENTIFIERS AND CLASSIFICATIONS
// ============================================================================

/// Stable track identity. `seq` grows monotonically inside an epoch; the
/// tracker bumps `epoch` on reset so ids held by downstream maps can never
/// alias a newer track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId {
    pub epoch: u32,
    pub seq: u64,
}

impl TrackId {
    pub const fn new(epoch: u32, seq: u64) -> Self {
        Self { epoch, seq }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch == 0 {
            write!(f, "T{}", self.seq)
        } else {
            write!(f, "T{}.{}", self.epoch, self.seq)
        }
    }
}

/// Who a tracked person is, as far as the identity collaborator can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonKind {
    Employee,
    FrequentCustomer,
    NewCustomer,
    Unknown,
}

impl PersonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::FrequentCustomer => "frequent_customer",
            Self::NewCustomer => "new_customer",
            Self::Unknown => "unknown",
        }
    }

    /// Employees are excluded from shopper metrics; unknowns count as shoppers.
    pub fn is_shopper(&self) -> bool {
        !matches!(self, Self::Employee)
    }
}

/// Age band estimated from bbox height (and gait speed for adult heights).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Child,
    Teen,
    YoungAdult,
    Adult,
    Elder,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Teen => "teen",
            Self::YoungAdult => "young_adult",
            Self::Adult => "adult",
            Self::Elder => "elder",
        }
    }

    /// Grown-up in the family/guardian sense.
    pub fn is_grown(&self) -> bool {
        matches!(self, Self::YoungAdult | Self::Adult | Self::Elder)
    }

    /// Working-age adult (adult or young-adult band).
    pub fn is_working_age(&self) -> bool {
        matches!(self, Self::YoungAdult | Self::Adult)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Entrance,
    Product,
    Checkout,
    Service,
    Other,
}

impl ZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entrance => "entrance",
            Self::Product => "product",
            Self::Checkout => "checkout",
            Self::Service => "service",
            Self::Other => "other",
        }
    }
}

/// Ambient zone id for points outside every configured polygon.
pub const OTHER_ZONE: &str = "other";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_center_defaults_to_bbox_midpoint() {
        let d = Detection::new([10.0, 20.0, 30.0, 60.0], 0.9);
        let v = d.validate().unwrap();
        assert_eq!(v.center, Point::new(20.0, 40.0));
        assert!((v.area() - 800.0).abs() < 1e-3);
    }

    #[test]
    fn test_detection_rejects_missing_and_degenerate_boxes() {
        let missing = Detection::default();
        assert!(matches!(missing.validate(), Err(DetectionError::MissingBbox)));

        let flat = Detection::new([10.0, 20.0, 30.0, 20.0], 0.9);
        assert!(matches!(
            flat.validate(),
            Err(DetectionError::DegenerateBbox { .. })
        ));

        let nan = Detection::new([f32::NAN, 0.0, 10.0, 10.0], 0.9);
        assert!(matches!(nan.validate(), Err(DetectionError::NonFinite)));
    }

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, 2.0)).unwrap();
        assert_eq!(json, "[1.5,2.0]");
        let p: Point = serde_json::from_str("[3.0, 4.0]").unwrap();
        assert_eq!(p.distance(&Point::new(0.0, 0.0)), 5.0);
    }

    #[test]
    fn test_track_id_display() {
        assert_eq!(TrackId::new(0, 7).to_string(), "T7");
        assert_eq!(TrackId::new(2, 7).to_string(), "T2.7");
    }

    #[test]
    fn test_detection_frame_parses_partial_json() {
        let line = r#"{"timestamp": 12.5, "detections": [{"bbox": [0,0,10,20], "confidence": 0.8}, {"confidence": 0.4}]}"#;
        let frame: DetectionFrame = serde_json::from_str(line).unwrap();
        assert_eq!(frame.frame_id, 0);
        assert_eq!(frame.detections.len(), 2);
        assert!(frame.detections[1].bbox.is_none());
    }
}
