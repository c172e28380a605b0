// src/analysis/person_tracker.rs
//
// Centroid-distance multi-person tracker with a horizontal counting line.
//
// Design:
//   - Greedy nearest-neighbour matching on detection centers: every
//     (track, detection) pair under max_distance is sorted ascending and
//     committed unless either side is already claimed
//   - Unmatched detections open new tracks with monotonically increasing ids
//   - Tracks unseen for more than max_disappeared_secs are evicted; the
//     evicted tracks are handed back so downstream state can be finalized
//   - Position history per track is a bounded ring (history_len samples)
//   - A track may cross the counting line once: moving down = ENTER,
//     moving up = EXIT

use crate::types::{Detection, Point, TrackId, ValidBox};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum center distance (px) for a detection to continue a track
    pub max_distance: f32,
    /// Seconds a track survives without a match before eviction
    pub max_disappeared_secs: f64,
    /// Position samples retained per track
    pub history_len: usize,
    /// Counting line as a fraction of frame height (0 = top)
    pub line_position: f32,
    /// Detections below this confidence are ignored
    pub min_confidence: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            max_disappeared_secs: 2.0,
            history_len: 30,
            line_position: 0.5,
            min_confidence: 0.3,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingDirection {
    /// Moving down across the line
    Enter,
    /// Moving up across the line
    Exit,
}

impl CrossingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Exit => "EXIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    pub position: Point,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineCrossing {
    pub track_id: TrackId,
    pub direction: CrossingDirection,
    pub position: Point,
    pub timestamp: f64,
}

/// One physically present person across frames.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub bbox: [f32; 4],
    pub history: VecDeque<TrackSample>,
    pub first_seen: f64,
    pub last_seen: f64,
    pub last_confidence: f32,
    pub hits: u32,
    pub crossed_line: bool,
    pub crossing_direction: Option<CrossingDirection>,
    /// Latest detector bag/basket attribute (sticky false when absent)
    pub carrying_items: bool,
    /// Latest appearance embedding from the detector, if any
    pub embedding: Option<Vec<f32>>,
}

impl Track {
    fn new(id: TrackId, det: &Detection, valid: &ValidBox, timestamp: f64, cap: usize) -> Self {
        let mut history = VecDeque::with_capacity(cap);
        history.push_back(TrackSample {
            position: valid.center,
            timestamp,
        });
        Self {
            id,
            bbox: valid.bbox,
            history,
            first_seen: timestamp,
            last_seen: timestamp,
            last_confidence: det.confidence,
            hits: 1,
            crossed_line: false,
            crossing_direction: None,
            carrying_items: det.carrying_items.unwrap_or(false),
            embedding: det.embedding.clone(),
        }
    }

    pub fn position(&self) -> Point {
        self.history
            .back()
            .map(|s| s.position)
            .unwrap_or_default()
    }

    pub fn width(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Matched on the frame stamped `timestamp`.
    pub fn seen_at(&self, timestamp: f64) -> bool {
        self.last_seen == timestamp
    }

    fn update_with_detection(
        &mut self,
        det: &Detection,
        valid: &ValidBox,
        timestamp: f64,
        cap: usize,
    ) {
        self.bbox = valid.bbox;
        self.last_seen = timestamp;
        self.last_confidence = det.confidence;
        self.hits += 1;
        if let Some(carrying) = det.carrying_items {
            self.carrying_items = carrying;
        }
        if det.embedding.is_some() {
            self.embedding = det.embedding.clone();
        }
        self.history.push_back(TrackSample {
            position: valid.center,
            timestamp,
        });
        while self.history.len() > cap {
            self.history.pop_front();
        }
    }

    /// Check the last movement against the counting line. Fires at most once
    /// per track lifetime.
    fn check_line_crossing(&mut self, line_y: f32) -> Option<CrossingDirection> {
        if self.crossed_line || self.history.len() < 2 {
            return None;
        }
        let n = self.history.len();
        let prev_y = self.history[n - 2].position.y;
        let cur_y = self.history[n - 1].position.y;

        let direction = if prev_y < line_y && cur_y >= line_y {
            CrossingDirection::Enter
        } else if prev_y >= line_y && cur_y < line_y {
            CrossingDirection::Exit
        } else {
            return None;
        };
        self.crossed_line = true;
        self.crossing_direction = Some(direction);
        Some(direction)
    }
}

/// Side results of one `update` call, drained by the caller.
#[derive(Debug, Default)]
pub struct TrackerEvents {
    pub created: Vec<TrackId>,
    pub crossings: Vec<LineCrossing>,
    /// Evicted tracks, moved out of the tracker for downstream finalization
    pub evicted: Vec<Track>,
    /// Detector entries dropped as malformed or low-confidence
    pub rejected: usize,
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct PersonTracker {
    pub config: TrackerConfig,
    tracks: BTreeMap<TrackId, Track>,
    epoch: u32,
    next_seq: u64,
    line_y: f32,
    entries: u64,
    exits: u64,
    events: TrackerEvents,
}

impl PersonTracker {
    pub fn new(config: TrackerConfig, frame_h: f32) -> Self {
        let line_y = frame_h * config.line_position;
        Self {
            config,
            tracks: BTreeMap::new(),
            epoch: 0,
            next_seq: 1,
            line_y,
            entries: 0,
            exits: 0,
            events: TrackerEvents::default(),
        }
    }

    /// Process one frame of detections. Always returns the full track map,
    /// even when the frame is empty (only eviction happens then).
    pub fn update(&mut self, detections: &[Detection], timestamp: f64) -> &BTreeMap<TrackId, Track> {
        let cap = self.config.history_len.max(1);

        let mut valid: Vec<(&Detection, ValidBox)> = Vec::with_capacity(detections.len());
        for det in detections {
            if det.confidence < self.config.min_confidence {
                self.events.rejected += 1;
                continue;
            }
            match det.validate() {
                Ok(v) => valid.push((det, v)),
                Err(e) => {
                    warn!("Dropping malformed detection: {}", e);
                    self.events.rejected += 1;
                }
            }
        }

        // ════════════════════════════════════════════════════════════════════
        // GREEDY NEAREST-NEIGHBOUR MATCHING
        // ════════════════════════════════════════════════════════════════════
        let track_ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        let mut matched_tracks = vec![false; track_ids.len()];
        let mut matched_dets = vec![false; valid.len()];

        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, id) in track_ids.iter().enumerate() {
            let last = self.tracks[id].position();
            for (di, (_, v)) in valid.iter().enumerate() {
                let dist = last.distance(&v.center);
                if dist < self.config.max_distance {
                    pairs.push((ti, di, dist));
                }
            }
        }
        pairs.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        for (ti, di, dist) in &pairs {
            if matched_tracks[*ti] || matched_dets[*di] {
                continue;
            }
            matched_tracks[*ti] = true;
            matched_dets[*di] = true;

            let (det, v) = &valid[*di];
            if let Some(track) = self.tracks.get_mut(&track_ids[*ti]) {
                track.update_with_detection(det, v, timestamp, cap);
                debug!("Track {} matched (dist={:.1}px)", track.id, dist);
                if let Some(direction) = track.check_line_crossing(self.line_y) {
                    match direction {
                        CrossingDirection::Enter => self.entries += 1,
                        CrossingDirection::Exit => self.exits += 1,
                    }
                    info!(
                        "🚪 Track {} crossed counting line: {}",
                        track.id,
                        direction.as_str()
                    );
                    self.events.crossings.push(LineCrossing {
                        track_id: track.id,
                        direction,
                        position: track.position(),
                        timestamp,
                    });
                }
            }
        }

        // ════════════════════════════════════════════════════════════════════
        // UNMATCHED DETECTIONS → NEW TRACKS
        // ════════════════════════════════════════════════════════════════════
        for (di, matched) in matched_dets.iter().enumerate() {
            if *matched {
                continue;
            }
            let (det, v) = &valid[di];
            let id = TrackId::new(self.epoch, self.next_seq);
            self.next_seq += 1;
            info!(
                "🆕 New track {} at ({:.0},{:.0})",
                id, v.center.x, v.center.y
            );
            self.tracks.insert(id, Track::new(id, det, v, timestamp, cap));
            self.events.created.push(id);
        }

        // ════════════════════════════════════════════════════════════════════
        // EVICT DISAPPEARED TRACKS
        // ════════════════════════════════════════════════════════════════════
        let max_gap = self.config.max_disappeared_secs;
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| timestamp - t.last_seen > max_gap)
            .map(|t| t.id)
            .collect();
        for id in stale {
            if let Some(track) = self.tracks.remove(&id) {
                info!(
                    "🗑️  Track {} evicted (unseen for {:.1}s)",
                    id,
                    timestamp - track.last_seen
                );
                self.events.evicted.push(track);
            }
        }

        &self.tracks
    }

    /// Drain the side results accumulated since the last call.
    pub fn take_events(&mut self) -> TrackerEvents {
        std::mem::take(&mut self.events)
    }

    /// Move every live track out, e.g. when the input stream ends.
    pub fn evict_all(&mut self) -> Vec<Track> {
        let tracks: Vec<Track> = std::mem::take(&mut self.tracks).into_values().collect();
        if !tracks.is_empty() {
            info!("🗑️  Evicting all {} live tracks", tracks.len());
        }
        tracks
    }

    pub fn tracks(&self) -> &BTreeMap<TrackId, Track> {
        &self.tracks
    }

    pub fn get_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn line_y(&self) -> f32 {
        self.line_y
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn exits(&self) -> u64 {
        self.exits
    }

    /// People inside according to the counting line alone.
    pub fn occupancy(&self) -> u64 {
        self.entries.saturating_sub(self.exits)
    }

    /// Drop every track and start a new id epoch. Ids handed out before the
    /// reset never compare equal to ids handed out after it.
    pub fn reset(&mut self) -> Vec<Track> {
        let dropped = self.evict_all();
        self.epoch += 1;
        self.next_seq = 1;
        self.events = TrackerEvents::default();
        dropped
    }
}

// ============================================================================
// TESTS
// ============================================================================
