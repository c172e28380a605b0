// src/analysis/purchase_journey.rs
//
// Per-person purchase funnel: ENTERING → BROWSING → AT_CASHIER → EXITED.
//
// Each observation appends a path point and updates zone evidence:
//   - time spent between consecutive checkout observations feeds cashier_time
//   - distinct product zones are collected
//   - leaving a product zone records an interaction (pick-up / return /
//     examine) with the time spent there
//
// The running purchase probability is a sum of indicator weights, each
// granted once its threshold is met. Finalization happens on the first
// transition into the exit zone or when the tracker evicts the person; it
// adds a bag bonus, a path-coherence term and dampening for very short or
// cashier-less visits, then classifies the shopper.

use crate::analysis::zones::ZoneIndex;
use crate::types::{Point, TrackId, ZoneType, OTHER_ZONE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyConfig {
    pub min_store_secs: f64,
    pub store_weight: f32,
    pub min_cashier_secs: f64,
    pub cashier_weight: f32,
    pub carried_weight: f32,
    pub min_interaction_secs: f64,
    pub interaction_weight: f32,
    pub min_product_zones: usize,
    pub product_zone_weight: f32,

    /// Added at finalization when the person leaves carrying items
    pub bag_bonus: f32,
    /// Share of the final score given to path coherence
    pub coherence_weight: f32,
    /// More distinct zones than this reads as indecisive wandering
    pub wandering_zone_limit: usize,
    pub short_visit_secs: f64,
    pub short_visit_factor: f32,
    pub no_cashier_factor: f32,
    pub purchase_threshold: f32,

    /// Minimum stay in a product zone to count as examining
    pub examine_secs: f64,
    pub max_path_points: usize,
    /// Finalized journeys are kept this long after exit
    pub retention_secs: f64,
    /// Zone id that ends a journey; any entrance zone when unset
    pub exit_zone: Option<String>,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            min_store_secs: 120.0,
            store_weight: 0.15,
            min_cashier_secs: 15.0,
            cashier_weight: 0.35,
            carried_weight: 0.2,
            min_interaction_secs: 30.0,
            interaction_weight: 0.15,
            min_product_zones: 2,
            product_zone_weight: 0.15,
            bag_bonus: 0.1,
            coherence_weight: 0.2,
            wandering_zone_limit: 8,
            short_visit_secs: 30.0,
            short_visit_factor: 0.3,
            no_cashier_factor: 0.4,
            purchase_threshold: 0.6,
            examine_secs: 8.0,
            max_path_points: 500,
            retention_secs: 3600.0,
            exit_zone: None,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStage {
    Entering,
    Browsing,
    AtCashier,
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    PickUp,
    Examine,
    Return,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInteraction {
    pub zone: String,
    pub kind: InteractionKind,
    pub duration_secs: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    /// Short, targeted trip ending at the till
    Objective,
    Explorer,
    /// Long visit that ends at the till
    Economic,
    /// Passed through without buying
    Tourist,
    Casual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub position: Point,
    pub timestamp: f64,
}

/// Per-call signals beyond position.
#[derive(Debug, Clone, Copy, Default)]
pub struct JourneyObservation {
    pub carrying_items: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Journey {
    pub person_id: TrackId,
    pub entry_time: f64,
    pub exit_time: Option<f64>,
    pub last_seen: f64,
    pub stage: JourneyStage,
    pub path: VecDeque<PathPoint>,
    /// First-visit order, never containing "other"
    pub zones_visited: Vec<String>,
    pub product_zones: BTreeSet<String>,
    pub interactions: Vec<ProductInteraction>,
    pub cashier_time: f64,
    pub carried_items: bool,
    pub purchase_probability: f32,
    pub purchase_score: Option<f32>,
    pub likely_purchased: Option<bool>,
    pub customer_type: Option<CustomerType>,
    /// Employees keep a journey but are left out of conversion
    pub employee: bool,

    #[serde(skip)]
    current_zone: Option<String>,
    #[serde(skip)]
    zone_entered_at: f64,
    #[serde(skip)]
    carrying_at_zone_entry: bool,
    #[serde(skip)]
    carrying_now: bool,
    #[serde(skip)]
    first_product_at: Option<f64>,
    #[serde(skip)]
    first_cashier_at: Option<f64>,
}

impl Journey {
    fn new(person_id: TrackId, timestamp: f64) -> Self {
        Self {
            person_id,
            entry_time: timestamp,
            exit_time: None,
            last_seen: timestamp,
            stage: JourneyStage::Entering,
            path: VecDeque::new(),
            zones_visited: Vec::new(),
            product_zones: BTreeSet::new(),
            interactions: Vec::new(),
            cashier_time: 0.0,
            carried_items: false,
            purchase_probability: 0.0,
            purchase_score: None,
            likely_purchased: None,
            customer_type: None,
            employee: false,
            current_zone: None,
            zone_entered_at: timestamp,
            carrying_at_zone_entry: false,
            carrying_now: false,
            first_product_at: None,
            first_cashier_at: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.exit_time.is_some()
    }

    pub fn time_in_store(&self) -> f64 {
        (self.exit_time.unwrap_or(self.last_seen) - self.entry_time).max(0.0)
    }

    pub fn visited_cashier(&self) -> bool {
        self.first_cashier_at.is_some()
    }

    pub fn current_zone(&self) -> Option<&str> {
        self.current_zone.as_deref()
    }

    fn interaction_secs(&self, now: f64, zones: &ZoneIndex) -> f64 {
        let recorded: f64 = self.interactions.iter().map(|i| i.duration_secs).sum();
        let ongoing = match self.current_zone.as_deref() {
            Some(z) if zones.zone_type(z) == ZoneType::Product => (now - self.zone_entered_at).max(0.0),
            _ => 0.0,
        };
        recorded + ongoing
    }

    fn set_stage(&mut self, stage: JourneyStage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    /// Close the stay in the current zone, recording a product interaction
    /// when there was one.
    fn leave_zone(&mut self, now: f64, zones: &ZoneIndex, cfg: &JourneyConfig) {
        let Some(zone) = self.current_zone.as_deref() else {
            return;
        };
        if zones.zone_type(zone) != ZoneType::Product {
            return;
        }
        let duration = (now - self.zone_entered_at).max(0.0);
        let kind = if !self.carrying_at_zone_entry && self.carrying_now {
            Some(InteractionKind::PickUp)
        } else if self.carrying_at_zone_entry && !self.carrying_now {
            Some(InteractionKind::Return)
        } else if duration >= cfg.examine_secs {
            Some(InteractionKind::Examine)
        } else {
            None
        };
        if let Some(kind) = kind {
            debug!("{} {:?} in {} ({:.1}s)", self.person_id, kind, zone, duration);
            self.interactions.push(ProductInteraction {
                zone: zone.to_string(),
                kind,
                duration_secs: duration,
                timestamp: now,
            });
        }
    }

    fn enter_zone(&mut self, zone: &str, now: f64, zones: &ZoneIndex) {
        self.current_zone = Some(zone.to_string());
        self.zone_entered_at = now;
        self.carrying_at_zone_entry = self.carrying_now;

        if zone != OTHER_ZONE && !self.zones_visited.iter().any(|z| z == zone) {
            self.zones_visited.push(zone.to_string());
        }
        match zones.zone_type(zone) {
            ZoneType::Product => {
                self.product_zones.insert(zone.to_string());
                self.first_product_at.get_or_insert(now);
                self.set_stage(JourneyStage::Browsing);
            }
            ZoneType::Checkout => {
                self.first_cashier_at.get_or_insert(now);
                self.set_stage(JourneyStage::AtCashier);
            }
            ZoneType::Entrance => {}
            ZoneType::Service | ZoneType::Other => self.set_stage(JourneyStage::Browsing),
        }
    }
}

/// Running evidence score from independently thresholded indicators.
pub fn purchase_probability(journey: &Journey, now: f64, zones: &ZoneIndex, cfg: &JourneyConfig) -> f32 {
    let mut p = 0.0f32;
    if now - journey.entry_time >= cfg.min_store_secs {
        p += cfg.store_weight;
    }
    if journey.cashier_time >= cfg.min_cashier_secs {
        p += cfg.cashier_weight;
    }
    if journey.carried_items {
        p += cfg.carried_weight;
    }
    if journey.interaction_secs(now, zones) >= cfg.min_interaction_secs {
        p += cfg.interaction_weight;
    }
    if journey.product_zones.len() >= cfg.min_product_zones {
        p += cfg.product_zone_weight;
    }
    p.clamp(0.0, 1.0)
}

/// Path coherence in [0, 1]: product before cashier and ending at the door
/// are rewarded, wandering through many zones is penalized.
pub fn path_coherence(journey: &Journey, ended_at_door: bool, cfg: &JourneyConfig) -> f32 {
    let product_first = matches!(
        (journey.first_product_at, journey.first_cashier_at),
        (Some(p), Some(c)) if p < c
    );
    let mut c = 0.5f32;
    if product_first {
        c += 0.3;
    }
    if ended_at_door {
        c += 0.2;
    }
    if journey.zones_visited.len() > cfg.wandering_zone_limit {
        c -= 0.3;
    }
    c.clamp(0.0, 1.0)
}

pub fn classify_customer(time_in_store: f64, visited_cashier: bool, zones: usize) -> CustomerType {
    if !visited_cashier && zones <= 2 {
        CustomerType::Tourist
    } else if visited_cashier && time_in_store < 300.0 && zones <= 3 {
        CustomerType::Objective
    } else if zones >= 6 || time_in_store > 1200.0 {
        CustomerType::Explorer
    } else if visited_cashier && time_in_store >= 600.0 {
        CustomerType::Economic
    } else {
        CustomerType::Casual
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct PurchaseJourneyEngine {
    pub config: JourneyConfig,
    journeys: BTreeMap<TrackId, Journey>,
    finalized: Vec<Journey>,
    total_finalized: u64,
    total_purchased: u64,
}

impl PurchaseJourneyEngine {
    pub fn new(config: JourneyConfig) -> Self {
        Self {
            config,
            journeys: BTreeMap::new(),
            finalized: Vec::new(),
            total_finalized: 0,
            total_purchased: 0,
        }
    }

    fn is_exit_zone(&self, zone: &str, zones: &ZoneIndex) -> bool {
        match &self.config.exit_zone {
            Some(exit) => exit == zone,
            None => zones.zone_type(zone) == ZoneType::Entrance,
        }
    }

    /// Fold one observation into the person's journey. Observations older
    /// than the last one are ignored, as are observations after exit.
    pub fn track(
        &mut self,
        person_id: TrackId,
        timestamp: f64,
        position: Point,
        obs: JourneyObservation,
        zones: &ZoneIndex,
    ) -> &Journey {
        let stale = self
            .journeys
            .get(&person_id)
            .is_some_and(|j| j.is_finalized() || timestamp < j.last_seen);
        if stale {
            return &self.journeys[&person_id];
        }

        let zone = zones.zone_of(position).to_string();
        let entering_exit = self.is_exit_zone(&zone, zones);
        let cfg = &self.config;

        let journey = self.journeys.entry(person_id).or_insert_with(|| {
            debug!("🛒 Journey started for {}", person_id);
            Journey::new(person_id, timestamp)
        });

        let dt = timestamp - journey.last_seen;
        if journey.current_zone.as_deref().map(|z| zones.zone_type(z)) == Some(ZoneType::Checkout) {
            journey.cashier_time += dt;
        }
        journey.last_seen = timestamp;

        let previous = journey.current_zone.clone();
        let transition = previous.as_deref() != Some(zone.as_str());
        // The stay being closed is judged on the carrying state seen inside it
        if transition {
            journey.leave_zone(timestamp, zones, cfg);
        }
        journey.carrying_now = obs.carrying_items;
        journey.carried_items |= obs.carrying_items;

        let mut exited = false;
        if transition {
            journey.enter_zone(&zone, timestamp, zones);
            let came_from_inside = match &previous {
                Some(prev) => match &cfg.exit_zone {
                    Some(exit) => exit != prev,
                    None => zones.zone_type(prev) != ZoneType::Entrance,
                },
                None => false,
            };
            exited = entering_exit && came_from_inside;
        }

        journey.path.push_back(PathPoint { position, timestamp });
        while journey.path.len() > cfg.max_path_points.max(1) {
            journey.path.pop_front();
        }
        journey.purchase_probability = purchase_probability(journey, timestamp, zones, cfg);

        if exited {
            self.finalize(person_id, timestamp, zones);
        }
        &self.journeys[&person_id]
    }

    /// Set the final fields exactly once. Returns false for unknown or
    /// already finalized journeys.
    pub fn finalize(&mut self, person_id: TrackId, timestamp: f64, zones: &ZoneIndex) -> bool {
        let cfg = &self.config;
        let Some(journey) = self.journeys.get_mut(&person_id) else {
            return false;
        };
        if journey.is_finalized() {
            return false;
        }
        let exit_time = timestamp.max(journey.last_seen);
        journey.purchase_probability = purchase_probability(journey, journey.last_seen, zones, cfg);
        journey.leave_zone(exit_time, zones, cfg);

        let ended_at_door = journey.current_zone.as_deref().is_some_and(|z| {
            zones.zone_type(z) == ZoneType::Entrance || cfg.exit_zone.as_deref() == Some(z)
        });

        let bag = if journey.carrying_now { cfg.bag_bonus } else { 0.0 };
        let evidence = (journey.purchase_probability + bag).clamp(0.0, 1.0);
        let coherence = path_coherence(journey, ended_at_door, cfg);
        let w = cfg.coherence_weight.clamp(0.0, 1.0);
        let mut score = (1.0 - w) * evidence + w * coherence;

        journey.exit_time = Some(exit_time);
        let time_in_store = journey.time_in_store();
        if time_in_store < cfg.short_visit_secs {
            score *= cfg.short_visit_factor;
        }
        if !journey.visited_cashier() {
            score *= cfg.no_cashier_factor;
        }
        let score = score.clamp(0.0, 1.0);
        let purchased = score > cfg.purchase_threshold;

        journey.purchase_score = Some(score);
        journey.likely_purchased = Some(purchased);
        journey.stage = JourneyStage::Exited;
        journey.customer_type = Some(classify_customer(
            time_in_store,
            journey.visited_cashier(),
            journey.zones_visited.len(),
        ));

        if !journey.employee {
            self.total_finalized += 1;
            if purchased {
                self.total_purchased += 1;
            }
        }
        info!(
            "🧾 Journey {} finalized: {:.0}s, {} zones, score {:.2} → {}",
            person_id,
            time_in_store,
            journey.zones_visited.len(),
            score,
            if purchased { "PURCHASE" } else { "no purchase" }
        );
        self.finalized.push(journey.clone());
        true
    }

    pub fn take_finalized(&mut self) -> Vec<Journey> {
        std::mem::take(&mut self.finalized)
    }

    pub fn mark_employee(&mut self, person_id: TrackId) {
        if let Some(j) = self.journeys.get_mut(&person_id) {
            j.employee = true;
        }
    }

    /// Drop finalized journeys past retention and abandoned open ones.
    pub fn prune(&mut self, now: f64) -> usize {
        let retention = self.config.retention_secs;
        let before = self.journeys.len();
        self.journeys.retain(|_, j| {
            let reference = j.exit_time.unwrap_or(j.last_seen);
            now - reference <= retention
        });
        let pruned = before - self.journeys.len();
        if pruned > 0 {
            debug!("Pruned {} journeys", pruned);
        }
        pruned
    }

    pub fn get(&self, person_id: TrackId) -> Option<&Journey> {
        self.journeys.get(&person_id)
    }

    pub fn journeys(&self) -> &BTreeMap<TrackId, Journey> {
        &self.journeys
    }

    /// Share of finalized shopper journeys judged as purchases.
    pub fn conversion_rate(&self) -> f32 {
        if self.total_finalized == 0 {
            0.0
        } else {
            self.total_purchased as f32 / self.total_finalized as f32
        }
    }

    pub fn total_finalized(&self) -> u64 {
        self.total_finalized
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::zones::ZoneSpec;

    const ZONE_W: f32 = 100.0;

    /// Zone i covers x ∈ [i*100, i*100+100), y ∈ [0, 100).
    fn strip(types: &[(&str, ZoneType)]) -> ZoneIndex {
        let mut specs = BTreeMap::new();
        for (i, (id, zone_type)) in types.iter().enumerate() {
            let x0 = i as f32 * ZONE_W;
            specs.insert(
                id.to_string(),
                ZoneSpec {
                    name: id.to_string(),
                    polygon: vec![
                        Point::new(x0, 0.0),
                        Point::new(x0 + ZONE_W, 0.0),
                        Point::new(x0 + ZONE_W, 100.0),
                        Point::new(x0, 100.0),
                    ],
                    zone_type: *zone_type,
                },
            );
        }
        ZoneIndex::from_specs(&specs)
    }

    fn store() -> ZoneIndex {
        strip(&[
            ("door", ZoneType::Entrance),
            ("dairy", ZoneType::Product),
            ("bakery", ZoneType::Product),
            ("till", ZoneType::Checkout),
        ])
    }

    fn at(zone_index: usize) -> Point {
        Point::new(zone_index as f32 * ZONE_W + 50.0, 50.0)
    }

    fn id(seq: u64) -> TrackId {
        TrackId::new(0, seq)
    }

    /// Observe `person` once per second in zone `z` for `secs` seconds
    /// starting at `*t`.
    fn dwell(
        engine: &mut PurchaseJourneyEngine,
        zones: &ZoneIndex,
        person: TrackId,
        t: &mut f64,
        z: usize,
        secs: u32,
        carrying: bool,
    ) {
        for _ in 0..secs {
            engine.track(person, *t, at(z), JourneyObservation { carrying_items: carrying }, zones);
            *t += 1.0;
        }
    }

    #[test]
    fn test_cashier_time_accumulates_and_weights() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let p = id(1);
        let mut t = 0.0;
        dwell(&mut e, &zones, p, &mut t, 0, 2, false);
        dwell(&mut e, &zones, p, &mut t, 1, 9, false);
        dwell(&mut e, &zones, p, &mut t, 2, 9, true);
        dwell(&mut e, &zones, p, &mut t, 3, 21, true);
        // 40s in, 20s between till observations
        let j = e.get(p).unwrap();
        assert!(j.cashier_time >= 20.0);
        assert_eq!(j.stage, JourneyStage::AtCashier);
        assert!(j.purchase_probability >= 0.35);
        assert_eq!(j.interactions.len(), 2);

        // Walk out through the door
        e.track(p, t, at(0), JourneyObservation { carrying_items: true }, &zones);
        let done = e.take_finalized();
        assert_eq!(done.len(), 1);
        let j = &done[0];
        assert_eq!(j.stage, JourneyStage::Exited);
        let score = j.purchase_score.unwrap();
        assert_eq!(j.likely_purchased, Some(score > 0.6));
        // cashier + carried + two product zones + bag + coherent path
        assert!(j.likely_purchased.unwrap());
    }

    #[test]
    fn test_short_cashierless_visit_is_dampened() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let p = id(2);
        let mut t = 0.0;
        dwell(&mut e, &zones, p, &mut t, 0, 2, false);
        dwell(&mut e, &zones, p, &mut t, 1, 8, false);
        e.track(p, 10.0, at(0), JourneyObservation::default(), &zones);

        let done = e.take_finalized();
        let j = &done[0];
        let coherence = path_coherence(j, true, &e.config);
        let undamped = 0.8 * j.purchase_probability + 0.2 * coherence;
        let expected = undamped * 0.3 * 0.4;
        assert!((j.purchase_score.unwrap() - expected).abs() < 1e-5);
        assert_eq!(j.likely_purchased, Some(false));
        assert_eq!(j.customer_type, Some(CustomerType::Tourist));
    }

    #[test]
    fn test_wandering_scores_lower() {
        let zones = strip(&[
            ("door", ZoneType::Entrance),
            ("p1", ZoneType::Product),
            ("p2", ZoneType::Product),
            ("s1", ZoneType::Service),
            ("s2", ZoneType::Service),
            ("s3", ZoneType::Service),
            ("s4", ZoneType::Service),
            ("s5", ZoneType::Service),
            ("till", ZoneType::Checkout),
        ]);
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());

        // Same evidence; one walks through 9 distinct zones, the other 4
        let run = |e: &mut PurchaseJourneyEngine, person: TrackId, route: &[usize]| {
            let mut t = 0.0;
            dwell(e, &zones, person, &mut t, 0, 2, false);
            for &z in route {
                dwell(e, &zones, person, &mut t, z, 5, true);
            }
            dwell(e, &zones, person, &mut t, 8, 20, true);
            dwell(e, &zones, person, &mut t, 0, 1, true);
        };
        run(&mut e, id(1), &[1, 2, 3, 4, 5, 6, 7]);
        run(&mut e, id(2), &[1, 2]);

        let done = e.take_finalized();
        let wander = done.iter().find(|j| j.person_id == id(1)).unwrap();
        let direct = done.iter().find(|j| j.person_id == id(2)).unwrap();
        assert_eq!(wander.zones_visited.len(), 9);
        assert_eq!(direct.zones_visited.len(), 4);
        assert!(wander.purchase_score.unwrap() < direct.purchase_score.unwrap());
    }

    #[test]
    fn test_finalization_happens_once() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let p = id(3);
        let mut t = 0.0;
        dwell(&mut e, &zones, p, &mut t, 1, 5, false);
        assert!(e.finalize(p, t, &zones));
        assert!(!e.finalize(p, t + 1.0, &zones));
        assert!(!e.finalize(id(99), t, &zones));

        let frozen = e.get(p).unwrap().purchase_score;
        e.track(p, t + 2.0, at(3), JourneyObservation::default(), &zones);
        assert_eq!(e.get(p).unwrap().purchase_score, frozen);
        assert_eq!(e.take_finalized().len(), 1);
    }

    #[test]
    fn test_first_sighting_in_entrance_does_not_finalize() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let mut t = 0.0;
        dwell(&mut e, &zones, id(4), &mut t, 0, 3, false);
        assert!(e.take_finalized().is_empty());
        assert_eq!(e.get(id(4)).unwrap().stage, JourneyStage::Entering);
    }

    #[test]
    fn test_configured_exit_zone() {
        let zones = strip(&[
            ("in", ZoneType::Entrance),
            ("dairy", ZoneType::Product),
            ("out", ZoneType::Service),
        ]);
        let cfg = JourneyConfig {
            exit_zone: Some("out".to_string()),
            ..JourneyConfig::default()
        };
        let mut e = PurchaseJourneyEngine::new(cfg);
        let mut t = 0.0;
        dwell(&mut e, &zones, id(5), &mut t, 0, 2, false);
        dwell(&mut e, &zones, id(5), &mut t, 1, 2, false);
        dwell(&mut e, &zones, id(5), &mut t, 0, 2, false);
        assert!(e.take_finalized().is_empty());
        dwell(&mut e, &zones, id(5), &mut t, 2, 1, false);
        assert_eq!(e.take_finalized().len(), 1);
    }

    #[test]
    fn test_interactions_recorded_on_zone_exit() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let p = id(6);
        let mut t = 0.0;
        dwell(&mut e, &zones, p, &mut t, 1, 10, false); // examine: 10s ≥ 8s
        dwell(&mut e, &zones, p, &mut t, 2, 2, false);
        dwell(&mut e, &zones, p, &mut t, 2, 1, true); // picks up in bakery
        dwell(&mut e, &zones, p, &mut t, 1, 1, true);
        dwell(&mut e, &zones, p, &mut t, 1, 1, false); // puts back in dairy
        dwell(&mut e, &zones, p, &mut t, 3, 1, false);

        let kinds: Vec<InteractionKind> = e.get(p).unwrap().interactions.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![InteractionKind::Examine, InteractionKind::PickUp, InteractionKind::Return]
        );
        assert!((e.get(p).unwrap().interactions[0].duration_secs - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_probability_bounded_and_out_of_order_ignored() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let p = id(7);
        let mut t = 0.0;
        dwell(&mut e, &zones, p, &mut t, 1, 200, true);
        let j = e.track(p, 5.0, at(3), JourneyObservation::default(), &zones);
        assert_eq!(j.current_zone(), Some("dairy"));
        assert!(j.purchase_probability >= 0.0 && j.purchase_probability <= 1.0);
        assert_eq!(j.path.len(), 200);
    }

    #[test]
    fn test_path_is_capped() {
        let zones = store();
        let cfg = JourneyConfig {
            max_path_points: 10,
            ..JourneyConfig::default()
        };
        let mut e = PurchaseJourneyEngine::new(cfg);
        let mut t = 0.0;
        dwell(&mut e, &zones, id(8), &mut t, 1, 50, false);
        assert_eq!(e.get(id(8)).unwrap().path.len(), 10);
    }

    #[test]
    fn test_customer_types() {
        assert_eq!(classify_customer(60.0, false, 1), CustomerType::Tourist);
        assert_eq!(classify_customer(120.0, true, 3), CustomerType::Objective);
        assert_eq!(classify_customer(400.0, false, 7), CustomerType::Explorer);
        assert_eq!(classify_customer(700.0, true, 4), CustomerType::Economic);
        assert_eq!(classify_customer(400.0, true, 4), CustomerType::Casual);
    }

    #[test]
    fn test_prune_and_conversion() {
        let zones = store();
        let mut e = PurchaseJourneyEngine::new(JourneyConfig::default());
        let mut t = 0.0;
        dwell(&mut e, &zones, id(1), &mut t, 1, 3, false);
        e.finalize(id(1), t, &zones);
        dwell(&mut e, &zones, id(2), &mut t, 1, 3, false);
        e.mark_employee(id(2));
        e.finalize(id(2), t, &zones);

        assert_eq!(e.total_finalized(), 1);
        assert_eq!(e.conversion_rate(), 0.0);
        assert_eq!(e.prune(t + 10.0), 0);
        assert_eq!(e.prune(t + 3601.0), 2);
        assert!(e.journeys().is_empty());
    }
}
