// src/analysis/mod.rs
//
// Per-frame analysis stages.
//
// Signal flow:
//   Detections → person_tracker ─┬→ behavior (zones, heatmap) ─→ group_detector
//                                └→ purchase_journey (zones)
//
// Orchestrated by pipeline::orchestrator::Orchestrator.

pub mod behavior;
pub mod clustering;
pub mod group_detector;
pub mod heatmap;
pub mod person_tracker;
pub mod purchase_journey;
pub mod zones;

pub use behavior::{BehaviorAnalyzer, BehaviorSummary, FrameAnalytics, PersonBehavior};
pub use group_detector::{Group, GroupDetector, GroupType, MemberRole};
pub use person_tracker::{CrossingDirection, LineCrossing, PersonTracker, Track};
pub use purchase_journey::{Journey, JourneyStage, PurchaseJourneyEngine};
pub use zones::{ZoneIndex, ZoneSpec};
