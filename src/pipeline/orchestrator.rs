// src/pipeline/orchestrator.rs
//
// Per-frame fusion of tracker, behaviour, groups, journeys and identity.
//
// Single entry point: call process_frame() for every frame, in timestamp
// order. Stage order is fixed so every component sees the causal state of
// the previous one:
//
//   1. PersonTracker      match / create / evict tracks, line crossings
//   2. BehaviorAnalyzer   kinematics, zone visits, density, heatmap
//   3. GroupDetector      cluster tracks seen on this frame
//   4. PurchaseJourney    zone transitions, cashier time, exit finalization
//   5. Identity           optional, once per track until resolved
//   6. Finalization       evicted tracks → behaviour summary + journey
//   7. Snapshot           immutable aggregate, shared behind an Arc
//
// Lifecycle events go to the event bus; the engine drains it after each
// frame and hands the finalized records to persistence.

use crate::analysis::behavior::{BehaviorAnalyzer, FrameAnalytics};
use crate::analysis::group_detector::{
    GroupDetector, GroupLifecycle, GroupPerson, GroupType, MemberRole,
};
use crate::analysis::heatmap::Hotspot;
use crate::analysis::person_tracker::{CrossingDirection, PersonTracker, Track};
use crate::analysis::purchase_journey::{JourneyObservation, JourneyStage, PurchaseJourneyEngine};
use crate::analysis::zones::{ZoneIndex, ZoneSpec};
use crate::identity::{build_provider, IdentityMatch, IdentityProvider};
use crate::pipeline::event_bus::{EventBus, PipelineEvent};
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::metrics::PipelineMetrics;
use crate::types::{AgeGroup, Config, DetectionFrame, PersonKind, Point, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Serialized snapshot reuse window for readers
    pub snapshot_ttl_ms: u64,
    /// Frame-time interval between journey/group/identity pruning passes
    pub prune_interval_secs: f64,
    /// Frames slower than this are logged; they always complete
    pub frame_soft_deadline_ms: u64,
    /// Wall-clock period of the idle cleanup timer
    pub cleanup_interval_ms: u64,
    pub event_bus_capacity: usize,
    pub hotspot_count: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_ms: 2000,
            prune_interval_secs: 60.0,
            frame_soft_deadline_ms: 50,
            cleanup_interval_ms: 1000,
            event_bus_capacity: 1024,
            hotspot_count: 5,
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Fused view of one live track.
#[derive(Debug, Clone, Serialize)]
pub struct PersonRecord {
    pub track_id: TrackId,
    pub position: Point,
    pub zone: String,
    pub kind: Option<PersonKind>,
    pub person_id: Option<String>,
    pub age_group: Option<AgeGroup>,
    pub speed: f32,
    pub dwell_minutes: f64,
    pub group_id: Option<u64>,
    pub group_role: Option<MemberRole>,
    pub journey_stage: Option<JourneyStage>,
    pub purchase_probability: Option<f32>,
    pub carrying_items: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub active: usize,
    pub shoppers: usize,
    pub employees: usize,
    /// Unresolved tracks count as `unknown`
    pub by_kind: BTreeMap<PersonKind, usize>,
    pub entries: u64,
    pub exits: u64,
    pub occupancy: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupSummary {
    pub active: usize,
    pub people_in_groups: usize,
    pub by_type: BTreeMap<GroupType, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JourneySummary {
    pub open: usize,
    pub finalized: u64,
    pub conversion_rate: f32,
    pub customers_identified: u64,
    pub returning_customer_ratio: f32,
}

/// Immutable aggregate produced once per processed frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub frame_id: u64,
    pub timestamp: f64,
    pub people: Vec<PersonRecord>,
    pub totals: Totals,
    pub groups: GroupSummary,
    pub journeys: JourneySummary,
    pub crowd: Option<FrameAnalytics>,
    pub zone_visits: BTreeMap<String, u64>,
    pub heatmap_peak: f32,
    pub hotspots: Vec<Hotspot>,
}

impl Snapshot {
    pub fn person(&self, id: TrackId) -> Option<&PersonRecord> {
        self.people.iter().find(|p| p.track_id == id)
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[derive(Debug, Default)]
struct IdentityState {
    resolved: Option<IdentityMatch>,
    attempts: u32,
}

pub struct Orchestrator {
    pub config: OrchestratorConfig,
    tracker: PersonTracker,
    zones: ZoneIndex,
    behavior: BehaviorAnalyzer,
    groups: GroupDetector,
    journeys: PurchaseJourneyEngine,

    identity: Option<Box<dyn IdentityProvider>>,
    identity_max_attempts: u32,
    identities: BTreeMap<TrackId, IdentityState>,
    customers_identified: u64,
    returning_customers: u64,

    bus: EventBus,
    metrics: PipelineMetrics,
    latest: Arc<Snapshot>,
    snapshot_interval_secs: f64,
    last_snapshot_persist: Option<f64>,
    last_timestamp: Option<f64>,
    last_frame_at: Option<Instant>,
    last_prune: Option<f64>,
}

impl Orchestrator {
    pub fn new(config: &Config, metrics: PipelineMetrics) -> Self {
        let frame = &config.frame;
        let zones = ZoneIndex::from_specs(&config.zones);
        if zones.is_empty() {
            warn!("No valid zones configured, every position resolves to 'other'");
        }
        info!(
            "✓ Orchestrator ready: {}x{} frame, {} zones, identity {}",
            frame.width,
            frame.height,
            zones.zones().len(),
            if config.identity.enabled { "on" } else { "off" }
        );

        Self {
            config: config.orchestrator.clone(),
            tracker: PersonTracker::new(config.tracker.clone(), frame.height),
            zones,
            behavior: BehaviorAnalyzer::new(config.behavior.clone(), frame.width, frame.height),
            groups: GroupDetector::new(config.groups.clone()),
            journeys: PurchaseJourneyEngine::new(config.journey.clone()),
            identity: build_provider(&config.identity),
            identity_max_attempts: config.identity.max_attempts.max(1),
            identities: BTreeMap::new(),
            customers_identified: 0,
            returning_customers: 0,
            bus: EventBus::new(config.orchestrator.event_bus_capacity),
            metrics,
            latest: Arc::new(Snapshot::default()),
            snapshot_interval_secs: config.persistence.snapshot_interval_secs,
            last_snapshot_persist: None,
            last_timestamp: None,
            last_frame_at: None,
            last_prune: None,
        }
    }

    /// Replace the identity collaborator (or remove it with `None`).
    pub fn set_identity_provider(&mut self, provider: Option<Box<dyn IdentityProvider>>) {
        self.identity = provider;
    }

    /// Fold one frame through every stage. Frames older than the last
    /// processed one, or with a non-finite timestamp, are dropped and the
    /// previous snapshot is returned.
    pub fn process_frame(&mut self, frame: DetectionFrame) -> Arc<Snapshot> {
        let ts = frame.timestamp;
        let out_of_order = self.last_timestamp.is_some_and(|last| ts < last);
        if !ts.is_finite() || out_of_order {
            warn!(
                "Dropping frame {} with timestamp {} (last processed {:?})",
                frame.frame_id, ts, self.last_timestamp
            );
            self.metrics.inc(&self.metrics.frames_out_of_order);
            return Arc::clone(&self.latest);
        }

        let mut ctx = FrameContext::new(&frame);

        // ════════════════════════════════════════════════════════════════════
        // 1. TRACKER
        // ════════════════════════════════════════════════════════════════════
        let tracks = self.tracker.update(&frame.detections, ts);
        ctx.seen = tracks.values().filter(|t| t.seen_at(ts)).map(|t| t.id).collect();
        ctx.tracker_events = self.tracker.take_events();
        self.publish_tracker_events(&mut ctx);

        // ════════════════════════════════════════════════════════════════════
        // 2. BEHAVIOUR
        // ════════════════════════════════════════════════════════════════════
        ctx.analytics = Some(self.behavior.update(self.tracker.tracks(), &mut self.zones, ts));

        // ════════════════════════════════════════════════════════════════════
        // 3. GROUPS
        // ════════════════════════════════════════════════════════════════════
        let people: Vec<GroupPerson> = ctx
            .seen
            .iter()
            .filter_map(|id| self.behavior.person(*id))
            .map(|p| GroupPerson {
                id: p.id,
                position: p.position,
                velocity: p.velocity,
                speed: p.speed,
                age_group: p.age_group,
                carrying_items: p.carrying_items,
            })
            .collect();
        ctx.groups = self.groups.detect_groups(&people, ts);
        self.publish_group_events();

        // ════════════════════════════════════════════════════════════════════
        // 4. JOURNEYS
        // ════════════════════════════════════════════════════════════════════
        for id in &ctx.seen {
            if let Some(track) = self.tracker.get_track(*id) {
                let obs = JourneyObservation {
                    carrying_items: track.carrying_items,
                };
                self.journeys.track(*id, ts, track.position(), obs, &self.zones);
            }
        }

        // ════════════════════════════════════════════════════════════════════
        // 5. IDENTITY
        // ════════════════════════════════════════════════════════════════════
        self.resolve_identities(&ctx.seen, ts);

        // ════════════════════════════════════════════════════════════════════
        // 6. FINALIZATION
        // ════════════════════════════════════════════════════════════════════
        let evicted = std::mem::take(&mut ctx.tracker_events.evicted);
        self.finalize_tracks(evicted);
        self.publish_finalized_journeys();

        if self.last_prune.map_or(true, |at| ts - at >= self.config.prune_interval_secs) {
            if self.last_prune.is_some() {
                self.prune(ts);
            }
            self.last_prune = Some(ts);
        }

        // ════════════════════════════════════════════════════════════════════
        // 7. SNAPSHOT
        // ════════════════════════════════════════════════════════════════════
        let snapshot = Arc::new(self.build_snapshot(&ctx));
        let persist_due = self.snapshot_interval_secs > 0.0
            && self
                .last_snapshot_persist
                .map_or(true, |at| ts - at >= self.snapshot_interval_secs);
        if persist_due {
            self.last_snapshot_persist = Some(ts);
            self.bus
                .publish(PipelineEvent::SnapshotDue(Box::new(Snapshot::clone(&snapshot))));
        }
        self.latest = Arc::clone(&snapshot);
        self.last_timestamp = Some(ts);
        self.last_frame_at = Some(Instant::now());

        let elapsed_us = ctx.elapsed_us();
        self.metrics.set_timing(&self.metrics.frame_time_us, elapsed_us);
        self.metrics.inc(&self.metrics.frames_processed);
        if elapsed_us > self.config.frame_soft_deadline_ms.saturating_mul(1000) {
            self.metrics.inc(&self.metrics.slow_frames);
            warn!(
                "⏱️ Frame {} took {:.1}ms ({} detections, {} tracks), over the {}ms soft deadline",
                ctx.frame_id,
                elapsed_us as f64 / 1000.0,
                ctx.detection_count,
                ctx.seen.len(),
                self.config.frame_soft_deadline_ms
            );
        }
        debug!(
            "Frame {} processed: {} seen, {} groups, {}µs",
            ctx.frame_id,
            ctx.seen.len(),
            ctx.groups.len(),
            elapsed_us
        );

        snapshot
    }

    // ════════════════════════════════════════════════════════════════════════
    // STAGE HELPERS
    // ════════════════════════════════════════════════════════════════════════

    fn publish_tracker_events(&mut self, ctx: &mut FrameContext) {
        let events = &mut ctx.tracker_events;
        self.metrics
            .add(&self.metrics.detections_rejected, events.rejected as u64);

        for id in events.created.drain(..) {
            self.metrics.inc(&self.metrics.tracks_created);
            self.bus.publish(PipelineEvent::TrackCreated {
                track_id: id,
                timestamp: ctx.timestamp,
            });
        }
        for crossing in events.crossings.drain(..) {
            let counter = match crossing.direction {
                CrossingDirection::Enter => &self.metrics.line_entries,
                CrossingDirection::Exit => &self.metrics.line_exits,
            };
            self.metrics.inc(counter);
            self.bus.publish(PipelineEvent::LineCrossed(crossing));
        }
    }

    fn publish_group_events(&mut self) {
        for event in self.groups.take_events() {
            match event {
                GroupLifecycle::Formed { group_id, size } => {
                    self.metrics.inc(&self.metrics.groups_formed);
                    self.bus.publish(PipelineEvent::GroupFormed { group_id, size });
                }
                GroupLifecycle::Dissolved {
                    group_id,
                    lifetime_secs,
                } => {
                    self.metrics.inc(&self.metrics.groups_dissolved);
                    let group_type = self.groups.get(group_id).map(|g| g.group_type);
                    self.bus.publish(PipelineEvent::GroupDissolved {
                        group_id,
                        group_type,
                        lifetime_secs,
                    });
                }
                GroupLifecycle::Purged { group_id } => {
                    debug!("Group G{} purged", group_id);
                }
            }
        }
    }

    fn resolve_identities(&mut self, seen: &[TrackId], ts: f64) {
        let Some(provider) = self.identity.as_mut() else {
            return;
        };
        for id in seen {
            let Some(embedding) = self
                .tracker
                .get_track(*id)
                .and_then(|t| t.embedding.as_deref())
            else {
                continue;
            };
            let state = self.identities.entry(*id).or_default();
            if state.resolved.is_some() || state.attempts >= self.identity_max_attempts {
                continue;
            }
            state.attempts += 1;

            let found = match provider.identify(embedding, ts) {
                Ok(found) if found.kind != PersonKind::Unknown => found,
                Ok(_) => continue,
                Err(e) => {
                    debug!("No identity for {} (attempt {}): {}", id, state.attempts, e);
                    continue;
                }
            };

            info!(
                "🪪 {} identified as {} ({:?}, {:.2})",
                id,
                found.kind.as_str(),
                found.person_id,
                found.confidence
            );
            match found.kind {
                PersonKind::Employee => self.journeys.mark_employee(*id),
                PersonKind::FrequentCustomer => {
                    self.customers_identified += 1;
                    self.returning_customers += 1;
                }
                PersonKind::NewCustomer => self.customers_identified += 1,
                PersonKind::Unknown => {}
            }
            self.behavior.set_kind(*id, found.kind);
            self.metrics.inc(&self.metrics.identities_resolved);
            self.bus.publish(PipelineEvent::IdentityResolved {
                track_id: *id,
                kind: found.kind,
                person_id: found.person_id.clone(),
            });
            state.resolved = Some(found);
        }
    }

    /// Emit the behaviour summary and close the journey of every evicted
    /// track. Each id is finalized at most once.
    fn finalize_tracks(&mut self, evicted: Vec<Track>) {
        for track in evicted {
            self.metrics.inc(&self.metrics.tracks_evicted);
            self.bus.publish(PipelineEvent::TrackEvicted {
                track_id: track.id,
                last_seen: track.last_seen,
            });
            if let Some(summary) = self.behavior.finalize(track.id) {
                self.bus.publish(PipelineEvent::BehaviorFinalized(summary));
            }
            self.journeys.finalize(track.id, track.last_seen, &self.zones);
            self.identities.remove(&track.id);
        }
    }

    fn publish_finalized_journeys(&mut self) {
        for journey in self.journeys.take_finalized() {
            self.metrics.inc(&self.metrics.journeys_finalized);
            self.bus.publish(PipelineEvent::JourneyFinalized(journey));
        }
    }

    fn build_snapshot(&self, ctx: &FrameContext) -> Snapshot {
        let mut totals = Totals {
            entries: self.tracker.entries(),
            exits: self.tracker.exits(),
            occupancy: self.tracker.occupancy(),
            ..Totals::default()
        };

        let mut people = Vec::with_capacity(self.tracker.tracks().len());
        for track in self.tracker.tracks().values() {
            let behavior = self.behavior.person(track.id);
            let identity = self
                .identities
                .get(&track.id)
                .and_then(|s| s.resolved.as_ref());
            let kind = identity.map(|m| m.kind);
            *totals
                .by_kind
                .entry(kind.unwrap_or(PersonKind::Unknown))
                .or_insert(0) += 1;

            let group = self.groups.group_of(track.id);
            let journey = self.journeys.get(track.id);
            people.push(PersonRecord {
                track_id: track.id,
                position: track.position(),
                zone: behavior
                    .map(|b| b.current_zone.clone())
                    .unwrap_or_else(|| self.zones.zone_of(track.position()).to_string()),
                kind,
                person_id: identity.and_then(|m| m.person_id.clone()),
                age_group: behavior.map(|b| b.age_group),
                speed: behavior.map_or(0.0, |b| b.speed),
                dwell_minutes: behavior.map_or(0.0, |b| b.dwell_minutes()),
                group_id: group.map(|g| g.id),
                group_role: group.and_then(|g| g.role_of(track.id)),
                journey_stage: journey.map(|j| j.stage),
                purchase_probability: journey.map(|j| j.purchase_probability),
                carrying_items: track.carrying_items,
            });
        }

        totals.active = people.len();
        totals.employees = totals
            .by_kind
            .get(&PersonKind::Employee)
            .copied()
            .unwrap_or(0);
        totals.shoppers = totals
            .by_kind
            .iter()
            .filter(|(kind, _)| kind.is_shopper())
            .map(|(_, n)| n)
            .sum();

        let groups = GroupSummary {
            active: self.groups.active_groups().count(),
            people_in_groups: self.groups.active_groups().map(|g| g.size()).sum(),
            by_type: self.groups.type_histogram(),
        };

        let journeys = JourneySummary {
            open: self
                .journeys
                .journeys()
                .values()
                .filter(|j| !j.is_finalized())
                .count(),
            finalized: self.journeys.total_finalized(),
            conversion_rate: self.journeys.conversion_rate(),
            customers_identified: self.customers_identified,
            returning_customer_ratio: if self.customers_identified > 0 {
                self.returning_customers as f32 / self.customers_identified as f32
            } else {
                0.0
            },
        };

        let heatmap = self.behavior.heatmap();
        Snapshot {
            frame_id: ctx.frame_id,
            timestamp: ctx.timestamp,
            people,
            totals,
            groups,
            journeys,
            crowd: ctx.analytics.clone(),
            zone_visits: self.zones.visit_counts(),
            heatmap_peak: heatmap.peak(),
            hotspots: heatmap.hotspots(self.config.hotspot_count),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // MAINTENANCE
    // ════════════════════════════════════════════════════════════════════════

    /// Drop journeys and groups past retention and identity state of tracks
    /// that no longer exist. Returns the number of journeys dropped.
    pub fn prune(&mut self, now: f64) -> usize {
        let journeys = self.journeys.prune(now);
        self.groups.expire(now);
        self.publish_group_events();
        let tracker = &self.tracker;
        self.identities.retain(|id, _| tracker.get_track(*id).is_some());
        if journeys > 0 {
            info!("🧹 Pruned {} journeys at t={:.1}", journeys, now);
        }
        journeys
    }

    /// Timer-driven cleanup while the input is idle. The clock is the last
    /// frame timestamp advanced by wall time since that frame. Returns the
    /// number of tracks evicted.
    pub fn cleanup(&mut self) -> usize {
        let (Some(last), Some(at)) = (self.last_timestamp, self.last_frame_at) else {
            return 0;
        };
        let now = last + at.elapsed().as_secs_f64();
        self.tracker.update(&[], now);
        let events = self.tracker.take_events();
        let evicted = events.evicted.len();
        self.finalize_tracks(events.evicted);
        self.publish_finalized_journeys();
        self.prune(now);
        self.last_prune = Some(now);
        evicted
    }

    /// Finalize every live track, e.g. when the input stream ends.
    pub fn flush(&mut self) -> usize {
        let tracks = self.tracker.evict_all();
        let count = tracks.len();
        self.finalize_tracks(tracks);
        self.publish_finalized_journeys();
        if count > 0 {
            info!("💾 Flushed {} live tracks", count);
        }
        count
    }

    /// Swap the zone configuration at runtime. Returns the number of
    /// rejected zone specs.
    pub fn replace_zones(&mut self, specs: &BTreeMap<String, ZoneSpec>) -> usize {
        let rejected = self.zones.replace_zones(specs);
        info!(
            "🗺️ Zones replaced: {} active, {} rejected",
            self.zones.zones().len(),
            rejected
        );
        rejected
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.bus.drain()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.latest)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn tracker(&self) -> &PersonTracker {
        &self.tracker
    }

    pub fn zones(&self) -> &ZoneIndex {
        &self.zones
    }

    pub fn behavior(&self) -> &BehaviorAnalyzer {
        &self.behavior
    }

    pub fn groups(&self) -> &GroupDetector {
        &self.groups
    }

    pub fn journeys(&self) -> &PurchaseJourneyEngine {
        &self.journeys
    }
}

// ============================================================================
// TESTS
// ============================================================================
