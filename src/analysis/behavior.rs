// src/analysis/behavior.rs
//
// Per-person kinematics and zone behaviour, plus per-frame crowd analytics.
//
// Per person (keyed by TrackId, created on first sighting):
//   - lifetime distance / max speed / stop count, folded in sample by sample
//   - window metrics (average speed, trajectory complexity) recomputed from
//     the tracker's bounded history on every update
//   - ordered first-visits per zone; each (person, zone) pair bumps the
//     zone's visit counter exactly once
//   - age band estimate from smoothed bbox height and gait speed
//
// Per frame: movement intensity, crowd density band, flow pattern with a
// time-of-day band, zone occupancy and the decaying heatmap.
//
// When the tracker evicts a track the caller invokes `finalize`, which
// hands back the summary once and forgets the person.

use crate::analysis::heatmap::{Heatmap, HeatmapConfig};
use crate::analysis::person_tracker::{Track, TrackSample};
use crate::analysis::zones::ZoneIndex;
use crate::types::{AgeGroup, PersonKind, Point, TrackId, ZoneType, OTHER_ZONE};
use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Below this speed (px/s) a sample counts as "not moving"
    pub movement_threshold: f32,
    /// Consecutive slow samples that make one stop
    pub stop_threshold: u32,
    /// Speed (px/s) that maps to movement intensity 1.0
    pub speed_normalizer: f32,
    /// Bbox height (px) of an average adult at typical camera distance
    pub reference_height_px: f32,
    /// Adult-height persons walking slower than this are banded elder
    pub elder_speed_threshold: f32,
    /// Adult-height persons walking faster than this are banded young adult
    pub young_speed_threshold: f32,
    /// Mean net displacement (px) below which the flow is stationary
    pub flow_min_displacement: f32,
    /// Local time offset for time-of-day bands
    pub utc_offset_hours: i32,
    pub heatmap: HeatmapConfig,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 15.0,
            stop_threshold: 5,
            speed_normalizer: 200.0,
            reference_height_px: 320.0,
            elder_speed_threshold: 25.0,
            young_speed_threshold: 90.0,
            flow_min_displacement: 20.0,
            utc_offset_hours: 0,
            heatmap: HeatmapConfig::default(),
        }
    }
}

const SIZE_EMA: f32 = 0.3;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl DensityLevel {
    pub fn from_density(density: f32) -> Self {
        if density < 0.1 {
            Self::Low
        } else if density < 0.3 {
            Self::Medium
        } else if density < 0.6 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// Net movement down the frame, towards the store interior
    Inbound,
    Outbound,
    Lateral,
    Stationary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBand {
    MorningRush,
    Lunch,
    EveningRush,
    Regular,
}

impl TimeBand {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            7..=8 => Self::MorningRush,
            11..=13 => Self::Lunch,
            17..=19 => Self::EveningRush,
            _ => Self::Regular,
        }
    }

    /// Band for a Unix timestamp shifted by a fixed UTC offset.
    pub fn at(timestamp: f64, utc_offset_hours: i32) -> Self {
        let secs = timestamp.floor() as i64;
        let hour = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .zip(DateTime::from_timestamp(secs, 0))
            .map(|(tz, utc)| utc.with_timezone(&tz).hour());
        hour.map(Self::from_hour).unwrap_or(Self::Regular)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowPattern {
    pub direction: FlowDirection,
    pub time_band: TimeBand,
    /// Mean net displacement over the tracked history (px)
    pub mean_displacement: (f32, f32),
}

/// Aggregate analytics for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameAnalytics {
    pub timestamp: f64,
    pub active_people: usize,
    pub movement_intensity: f32,
    pub crowd_density: f32,
    pub density_level: DensityLevel,
    pub flow: FlowPattern,
    /// zone id → persons currently inside (configured zones only)
    pub zone_occupancy: BTreeMap<String, usize>,
    /// Persons currently inside checkout zones
    pub checkout_queue: usize,
}

/// Behavioural state of one tracked person.
#[derive(Debug, Clone)]
pub struct PersonBehavior {
    pub id: TrackId,
    pub first_seen: f64,
    pub last_seen: f64,
    pub position: Point,
    /// px/s from the last two samples
    pub velocity: (f32, f32),
    pub speed: f32,
    pub avg_speed: f32,
    pub max_speed: f32,
    pub total_distance: f32,
    pub stops: u32,
    pub trajectory_complexity: f32,
    pub height_px: f32,
    pub width_px: f32,
    pub age_group: AgeGroup,
    pub carrying_items: bool,
    pub current_zone: String,
    /// First-visit order, never containing "other"
    pub zones_visited: Vec<String>,
    pub zone_dwell_secs: BTreeMap<String, f64>,
    pub kind: Option<PersonKind>,
    visited: BTreeSet<String>,
    last_sample: Option<TrackSample>,
    slow_run: u32,
}

impl PersonBehavior {
    fn new(track: &Track) -> Self {
        Self {
            id: track.id,
            first_seen: track.first_seen,
            last_seen: track.last_seen,
            position: track.position(),
            velocity: (0.0, 0.0),
            speed: 0.0,
            avg_speed: 0.0,
            max_speed: 0.0,
            total_distance: 0.0,
            stops: 0,
            trajectory_complexity: 1.0,
            height_px: track.height(),
            width_px: track.width(),
            age_group: AgeGroup::Adult,
            carrying_items: track.carrying_items,
            current_zone: OTHER_ZONE.to_string(),
            zones_visited: Vec::new(),
            zone_dwell_secs: BTreeMap::new(),
            kind: None,
            visited: BTreeSet::new(),
            last_sample: None,
            slow_run: 0,
        }
    }

    /// Minutes between first and last sighting.
    pub fn dwell_minutes(&self) -> f64 {
        ((self.last_seen - self.first_seen) / 60.0).max(0.0)
    }

    pub fn has_visited(&self, zone: &str) -> bool {
        self.visited.contains(zone)
    }

    fn ingest_sample(&mut self, sample: TrackSample, cfg: &BehaviorConfig) {
        let Some(prev) = self.last_sample else {
            self.last_sample = Some(sample);
            return;
        };
        let dt = sample.timestamp - prev.timestamp;
        if dt <= 0.0 {
            return;
        }
        let dist = prev.position.distance(&sample.position);
        let speed = dist / dt as f32;
        self.total_distance += dist;
        self.max_speed = self.max_speed.max(speed);
        self.speed = speed;
        self.velocity = (
            (sample.position.x - prev.position.x) / dt as f32,
            (sample.position.y - prev.position.y) / dt as f32,
        );

        if speed < cfg.movement_threshold {
            self.slow_run += 1;
            if self.slow_run >= cfg.stop_threshold.max(1) {
                self.stops += 1;
                self.slow_run = 0;
            }
        } else {
            self.slow_run = 0;
        }
        self.last_sample = Some(sample);
    }

    fn recompute_window(&mut self, history: &VecDeque<TrackSample>) {
        let (Some(first), Some(last)) = (history.front(), history.back()) else {
            return;
        };
        let path: f32 = history
            .iter()
            .zip(history.iter().skip(1))
            .map(|(a, b)| a.position.distance(&b.position))
            .sum();
        let straight = first.position.distance(&last.position);
        self.trajectory_complexity = trajectory_complexity(path, straight);

        let span = last.timestamp - first.timestamp;
        self.avg_speed = if span > 0.0 { path / span as f32 } else { 0.0 };
    }

    fn estimate_age(&mut self, cfg: &BehaviorConfig) {
        if cfg.reference_height_px <= 0.0 {
            return;
        }
        let ratio = self.height_px / cfg.reference_height_px;
        let lifetime = (self.last_seen - self.first_seen) as f32;
        let gait = if lifetime > 0.0 {
            self.total_distance / lifetime
        } else {
            0.0
        };
        self.age_group = if ratio < 0.55 {
            AgeGroup::Child
        } else if ratio < 0.75 {
            AgeGroup::Teen
        } else if lifetime < 1.0 {
            AgeGroup::Adult
        } else if gait > 0.0 && gait < cfg.elder_speed_threshold {
            AgeGroup::Elder
        } else if gait > cfg.young_speed_threshold {
            AgeGroup::YoungAdult
        } else {
            AgeGroup::Adult
        };
    }

    pub fn summary(&self) -> BehaviorSummary {
        BehaviorSummary {
            track_id: self.id,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            dwell_minutes: self.dwell_minutes(),
            total_distance: self.total_distance,
            avg_speed: self.avg_speed,
            max_speed: self.max_speed,
            stops: self.stops,
            trajectory_complexity: self.trajectory_complexity,
            zones_visited: self.zones_visited.clone(),
            zone_dwell_secs: self.zone_dwell_secs.clone(),
            age_group: self.age_group,
            carrying_items: self.carrying_items,
            kind: self.kind,
        }
    }
}

/// `(path - straight) / path` clamped to [0, 1]; 1.0 when there is no net
/// displacement (stationary or closed loop).
pub fn trajectory_complexity(path_length: f32, straight_line: f32) -> f32 {
    if straight_line <= f32::EPSILON || path_length <= f32::EPSILON {
        return 1.0;
    }
    ((path_length - straight_line) / path_length).clamp(0.0, 1.0)
}

/// Finalized record of one person, emitted once on eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorSummary {
    pub track_id: TrackId,
    pub first_seen: f64,
    pub last_seen: f64,
    pub dwell_minutes: f64,
    pub total_distance: f32,
    pub avg_speed: f32,
    pub max_speed: f32,
    pub stops: u32,
    pub trajectory_complexity: f32,
    pub zones_visited: Vec<String>,
    pub zone_dwell_secs: BTreeMap<String, f64>,
    pub age_group: AgeGroup,
    pub carrying_items: bool,
    pub kind: Option<PersonKind>,
}

// ============================================================================
// ANALYZER
// ============================================================================

pub struct BehaviorAnalyzer {
    pub config: BehaviorConfig,
    people: BTreeMap<TrackId, PersonBehavior>,
    heatmap: Heatmap,
    frame_area: f32,
}

impl BehaviorAnalyzer {
    pub fn new(config: BehaviorConfig, frame_w: f32, frame_h: f32) -> Self {
        let heatmap = Heatmap::new(config.heatmap.clone(), frame_w, frame_h);
        Self {
            config,
            people: BTreeMap::new(),
            heatmap,
            frame_area: (frame_w * frame_h).max(1.0),
        }
    }

    /// Fold the tracks matched at `timestamp` into per-person state and
    /// compute this frame's aggregates. Tracks not matched this frame keep
    /// their state untouched.
    pub fn update(
        &mut self,
        tracks: &BTreeMap<TrackId, Track>,
        zones: &mut ZoneIndex,
        timestamp: f64,
    ) -> FrameAnalytics {
        let cfg = &self.config;
        let mut centers = Vec::new();
        let mut bbox_area = 0.0f32;
        let mut speed_sum = 0.0f32;
        let mut displacement = (0.0f32, 0.0f32);
        let mut moving_tracks = 0usize;
        let mut zone_occupancy: BTreeMap<String, usize> = BTreeMap::new();
        let mut checkout_queue = 0usize;

        for track in tracks.values().filter(|t| t.seen_at(timestamp)) {
            let person = self
                .people
                .entry(track.id)
                .or_insert_with(|| PersonBehavior::new(track));

            if let Some(sample) = track.history.back() {
                person.ingest_sample(*sample, cfg);
            }
            person.recompute_window(&track.history);

            let prev_zone_time = person.last_seen;
            person.last_seen = track.last_seen;
            person.position = track.position();
            person.carrying_items = track.carrying_items;
            person.height_px += SIZE_EMA * (track.height() - person.height_px);
            person.width_px += SIZE_EMA * (track.width() - person.width_px);
            person.estimate_age(cfg);

            // Dwell is credited to the zone the person was in up to now
            let dt = (timestamp - prev_zone_time).max(0.0);
            if dt > 0.0 && person.current_zone != OTHER_ZONE {
                *person
                    .zone_dwell_secs
                    .entry(person.current_zone.clone())
                    .or_insert(0.0) += dt;
            }

            let zone = zones.zone_of(person.position).to_string();
            if zone != OTHER_ZONE && person.visited.insert(zone.clone()) {
                person.zones_visited.push(zone.clone());
                match zones.record_visit(&zone) {
                    Ok(count) => debug!("{} entered zone {} (visit #{})", track.id, zone, count),
                    Err(e) => warn!("Visit not recorded for {}: {}", track.id, e),
                }
            }
            if zone != OTHER_ZONE {
                if zones.zone_type(&zone) == ZoneType::Checkout {
                    checkout_queue += 1;
                }
                *zone_occupancy.entry(zone.clone()).or_insert(0) += 1;
            }
            person.current_zone = zone;

            centers.push(person.position);
            bbox_area += track.area();
            speed_sum += person.speed;

            if let (Some(first), Some(last)) = (track.history.front(), track.history.back()) {
                if track.history.len() >= 2 {
                    displacement.0 += last.position.x - first.position.x;
                    displacement.1 += last.position.y - first.position.y;
                    moving_tracks += 1;
                }
            }
        }

        self.heatmap.update(&centers);

        let active = centers.len();
        let movement_intensity = if active > 0 && cfg.speed_normalizer > 0.0 {
            (speed_sum / active as f32 / cfg.speed_normalizer).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let crowd_density = (bbox_area / self.frame_area).clamp(0.0, 1.0);

        let mean_displacement = if moving_tracks > 0 {
            (
                displacement.0 / moving_tracks as f32,
                displacement.1 / moving_tracks as f32,
            )
        } else {
            (0.0, 0.0)
        };

        FrameAnalytics {
            timestamp,
            active_people: active,
            movement_intensity,
            crowd_density,
            density_level: DensityLevel::from_density(crowd_density),
            flow: FlowPattern {
                direction: classify_flow(mean_displacement, cfg.flow_min_displacement),
                time_band: TimeBand::at(timestamp, cfg.utc_offset_hours),
                mean_displacement,
            },
            zone_occupancy,
            checkout_queue,
        }
    }

    /// Emit the summary for an evicted track and forget it. `None` when the
    /// id was never seen or has already been finalized.
    pub fn finalize(&mut self, id: TrackId) -> Option<BehaviorSummary> {
        let person = self.people.remove(&id)?;
        debug!(
            "Behaviour of {} finalized: {:.0}px, {} stops, {} zones",
            id,
            person.total_distance,
            person.stops,
            person.zones_visited.len()
        );
        Some(person.summary())
    }

    pub fn set_kind(&mut self, id: TrackId, kind: PersonKind) {
        if let Some(person) = self.people.get_mut(&id) {
            person.kind = Some(kind);
        }
    }

    pub fn person(&self, id: TrackId) -> Option<&PersonBehavior> {
        self.people.get(&id)
    }

    pub fn people(&self) -> &BTreeMap<TrackId, PersonBehavior> {
        &self.people
    }

    pub fn heatmap(&self) -> &Heatmap {
        &self.heatmap
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

fn classify_flow(mean: (f32, f32), min_displacement: f32) -> FlowDirection {
    let (dx, dy) = mean;
    if (dx * dx + dy * dy).sqrt() < min_displacement {
        FlowDirection::Stationary
    } else if dy.abs() >= dx.abs() {
        if dy > 0.0 {
            FlowDirection::Inbound
        } else {
            FlowDirection::Outbound
        }
    } else {
        FlowDirection::Lateral
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::person_tracker::{PersonTracker, TrackerConfig};
    use crate::analysis::zones::ZoneSpec;
    use crate::types::Detection;

    fn det_at(cx: f32, cy: f32) -> Detection {
        Detection::new([cx - 20.0, cy - 160.0, cx + 20.0, cy + 160.0], 0.9)
    }

    fn square_zone(name: &str, x0: f32, y0: f32, size: f32, zone_type: ZoneType) -> ZoneSpec {
        ZoneSpec {
            name: name.to_string(),
            polygon: vec![
                Point::new(x0, y0),
                Point::new(x0 + size, y0),
                Point::new(x0 + size, y0 + size),
                Point::new(x0, y0 + size),
            ],
            zone_type,
        }
    }

    fn zones() -> ZoneIndex {
        let mut specs = BTreeMap::new();
        specs.insert("a".to_string(), square_zone("A", 0.0, 0.0, 200.0, ZoneType::Product));
        specs.insert("b".to_string(), square_zone("B", 300.0, 0.0, 200.0, ZoneType::Checkout));
        ZoneIndex::from_specs(&specs)
    }

    struct Rig {
        tracker: PersonTracker,
        analyzer: BehaviorAnalyzer,
        zones: ZoneIndex,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                tracker: PersonTracker::new(TrackerConfig::default(), 720.0),
                analyzer: BehaviorAnalyzer::new(BehaviorConfig::default(), 1280.0, 720.0),
                zones: zones(),
            }
        }

        fn step(&mut self, dets: &[Detection], ts: f64) -> FrameAnalytics {
            self.tracker.update(dets, ts);
            self.analyzer.update(self.tracker.tracks(), &mut self.zones, ts)
        }
    }

    #[test]
    fn test_complexity_sentinels() {
        assert_eq!(trajectory_complexity(0.0, 0.0), 1.0);
        assert_eq!(trajectory_complexity(50.0, 0.0), 1.0);
        assert_eq!(trajectory_complexity(100.0, 100.0), 0.0);
        assert!((trajectory_complexity(200.0, 100.0) - 0.5).abs() < 1e-6);
        // Float noise where straight exceeds path must still clamp
        assert_eq!(trajectory_complexity(99.999, 100.0), 0.0);
    }

    #[test]
    fn test_stationary_person_is_bounded_and_stops() {
        let mut rig = Rig::new();
        for i in 0..12 {
            rig.step(&[det_at(100.0, 100.0)], i as f64 * 0.5);
        }
        let p = rig.analyzer.people().values().next().unwrap();
        assert_eq!(p.total_distance, 0.0);
        assert_eq!(p.trajectory_complexity, 1.0);
        // 11 slow segments with stop_threshold 5 → 2 stops
        assert_eq!(p.stops, 2);
        assert!((p.dwell_minutes() - 5.5 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_straight_walk_kinematics() {
        let mut rig = Rig::new();
        for i in 0..5 {
            rig.step(&[det_at(600.0 + i as f32 * 50.0, 600.0)], i as f64);
        }
        let p = rig.analyzer.people().values().next().unwrap();
        assert!((p.total_distance - 200.0).abs() < 1e-3);
        assert!((p.avg_speed - 50.0).abs() < 1e-3);
        assert!((p.max_speed - 50.0).abs() < 1e-3);
        assert!(p.trajectory_complexity < 1e-6);
        assert_eq!(p.stops, 0);
    }

    #[test]
    fn test_zone_visit_counted_once_per_person() {
        let mut rig = Rig::new();
        // a → b → a → b
        let path = [(100.0, 100.0), (400.0, 100.0), (150.0, 100.0), (420.0, 100.0)];
        // Tracker max_distance is 100, so step in small increments
        let mut ts = 0.0;
        for w in path.windows(2) {
            let (from, to) = (w[0], w[1]);
            for k in 0..=10 {
                let f = k as f32 / 10.0;
                rig.step(&[det_at(from.0 + (to.0 - from.0) * f, from.1)], ts);
                ts += 0.1;
            }
        }
        let counts = rig.zones.visit_counts();
        assert_eq!(counts["a"], 1);
        assert_eq!(counts["b"], 1);
        let p = rig.analyzer.people().values().next().unwrap();
        assert_eq!(p.zones_visited, vec!["a".to_string(), "b".to_string()]);
        assert!(p.zone_dwell_secs["a"] > 0.0);
    }

    #[test]
    fn test_two_people_each_count_a_visit() {
        let mut rig = Rig::new();
        rig.step(&[det_at(50.0, 50.0), det_at(400.0, 50.0)], 0.0);
        rig.step(&[det_at(55.0, 50.0), det_at(405.0, 50.0)], 0.1);
        let counts = rig.zones.visit_counts();
        assert_eq!(counts["a"], 1);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn test_frame_aggregates_are_bounded() {
        let mut rig = Rig::new();
        let empty = rig.step(&[], 0.0);
        assert_eq!(empty.active_people, 0);
        assert_eq!(empty.crowd_density, 0.0);
        assert_eq!(empty.density_level, DensityLevel::Low);
        assert_eq!(empty.flow.direction, FlowDirection::Stationary);

        // A frame-filling box saturates density
        let huge = Detection::new([0.0, 0.0, 1280.0, 720.0], 0.9);
        let mut dets = vec![huge.clone(), huge];
        dets.push(det_at(450.0, 100.0));
        let f = rig.step(&dets, 1.0);
        assert!(f.crowd_density <= 1.0);
        assert_eq!(f.density_level, DensityLevel::Critical);
        assert!(f.movement_intensity >= 0.0 && f.movement_intensity <= 1.0);
        assert_eq!(f.checkout_queue, 1);
        assert_eq!(f.zone_occupancy.get("b"), Some(&1));
    }

    #[test]
    fn test_flow_direction() {
        assert_eq!(classify_flow((0.0, 50.0), 20.0), FlowDirection::Inbound);
        assert_eq!(classify_flow((0.0, -50.0), 20.0), FlowDirection::Outbound);
        assert_eq!(classify_flow((60.0, 10.0), 20.0), FlowDirection::Lateral);
        assert_eq!(classify_flow((5.0, 5.0), 20.0), FlowDirection::Stationary);
    }

    #[test]
    fn test_time_band_uses_offset() {
        // 1_700_000_000 = 2023-11-14 22:13:20 UTC
        assert_eq!(TimeBand::at(1_700_000_000.0, 0), TimeBand::Regular);
        assert_eq!(TimeBand::at(1_700_000_000.0, -4), TimeBand::EveningRush);
        assert_eq!(TimeBand::at(1_700_000_000.0, i32::MAX), TimeBand::Regular);
        assert_eq!(TimeBand::from_hour(12), TimeBand::Lunch);
        assert_eq!(TimeBand::from_hour(7), TimeBand::MorningRush);
    }

    #[test]
    fn test_age_band_from_height() {
        let mut rig = Rig::new();
        let child = Detection::new([80.0, 400.0, 120.0, 540.0], 0.9);
        rig.step(&[child], 0.0);
        let p = rig.analyzer.people().values().next().unwrap();
        assert_eq!(p.age_group, AgeGroup::Child);
    }

    #[test]
    fn test_finalize_is_once() {
        let mut rig = Rig::new();
        rig.step(&[det_at(100.0, 100.0)], 0.0);
        let id = *rig.analyzer.people().keys().next().unwrap();
        let summary = rig.analyzer.finalize(id).unwrap();
        assert_eq!(summary.track_id, id);
        assert_eq!(summary.zones_visited, vec!["a".to_string()]);
        assert!(rig.analyzer.finalize(id).is_none());
        assert!(rig.analyzer.person(id).is_none());
    }
}
