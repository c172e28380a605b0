// src/analysis/group_detector.rs
//
// Social group detection over one frame of positions, with continuity.
//
// Every frame:
//   1. Cluster current positions (DBSCAN: eps = proximity threshold,
//      min_samples = minimum group size)
//   2. Match each cluster to the best active group by member Jaccard
//      overlap >= continuity_threshold; unmatched clusters found new groups
//   3. Reconcile membership (joiners logged as MERGE, leavers as SPLIT)
//   4. Recompute type, roles, leader, cohesion and stability
//
// Groups not re-detected for dissolve_after_secs are marked dissolved (kept
// for reporting) and purged once retention_secs have passed since.

use crate::analysis::clustering::{jaccard, Dbscan, SpatialClustering};
use crate::types::{AgeGroup, Point, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Clustering radius in frame pixels
    pub proximity_threshold: f32,
    pub min_group_size: usize,
    /// Jaccard overlap needed to continue an existing group
    pub continuity_threshold: f32,
    pub dissolve_after_secs: f64,
    /// How long dissolved groups are kept before being purged
    pub retention_secs: f64,
    pub leader_min_score: f32,
    /// Position snapshots kept per group for stability
    pub history_len: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: 100.0,
            min_group_size: 2,
            continuity_threshold: 0.7,
            dissolve_after_secs: 30.0,
            retention_secs: 600.0,
            leader_min_score: 0.4,
            history_len: 10,
        }
    }
}

// Leader score weights
const W_AHEAD: f32 = 0.3;
const W_GUARDIAN: f32 = 0.25;
const W_BAG: f32 = 0.15;
const W_PACE: f32 = 0.15;
const W_CENTRAL: f32 = 0.15;

const SPLIT_PENALTY: f32 = 0.1;
const MERGE_REWARD: f32 = 0.02;

// ============================================================================
// TYPES
// ============================================================================

/// What the detector needs to know about one person this frame.
#[derive(Debug, Clone)]
pub struct GroupPerson {
    pub id: TrackId,
    pub position: Point,
    /// px/s
    pub velocity: (f32, f32),
    pub speed: f32,
    pub age_group: AgeGroup,
    pub carrying_items: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Family,
    Couple,
    Friends,
    Colleagues,
    Mixed,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Couple => "couple",
            Self::Friends => "friends",
            Self::Colleagues => "colleagues",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Leader,
    Follower,
    /// Children, regardless of score
    Dependent,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub id: TrackId,
    pub role: MemberRole,
    pub joined_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Merge,
    Split,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipEvent {
    pub change: MembershipChange,
    pub track_id: TrackId,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: u64,
    pub members: Vec<GroupMember>,
    pub group_type: GroupType,
    pub leader: Option<TrackId>,
    pub centroid: Point,
    pub cohesion: f32,
    pub stability: f32,
    pub formed_at: f64,
    pub last_seen: f64,
    pub dissolved_at: Option<f64>,
    /// Membership changes still inside the stability window
    pub events: Vec<MembershipEvent>,
    #[serde(skip)]
    history: VecDeque<(f64, BTreeMap<TrackId, Point>)>,
}

impl Group {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_active(&self) -> bool {
        self.dissolved_at.is_none()
    }

    pub fn member_ids(&self) -> BTreeSet<TrackId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn role_of(&self, id: TrackId) -> Option<MemberRole> {
        self.members.iter().find(|m| m.id == id).map(|m| m.role)
    }

    fn count(&self, change: MembershipChange) -> usize {
        self.events.iter().filter(|e| e.change == change).count()
    }
}

/// Lifecycle notifications drained by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupLifecycle {
    Formed { group_id: u64, size: usize },
    Dissolved { group_id: u64, lifetime_secs: f64 },
    Purged { group_id: u64 },
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct GroupDetector {
    pub config: GroupConfig,
    clustering: Box<dyn SpatialClustering>,
    groups: BTreeMap<u64, Group>,
    next_id: u64,
    events: Vec<GroupLifecycle>,
}

impl GroupDetector {
    pub fn new(config: GroupConfig) -> Self {
        let dbscan = Dbscan::new(config.proximity_threshold, config.min_group_size);
        Self::with_clustering(config, Box::new(dbscan))
    }

    pub fn with_clustering(config: GroupConfig, clustering: Box<dyn SpatialClustering>) -> Self {
        Self {
            config,
            clustering,
            groups: BTreeMap::new(),
            next_id: 1,
            events: Vec::new(),
        }
    }

    /// Cluster this frame's people and reconcile against active groups.
    /// Returns the groups detected in this frame.
    pub fn detect_groups(&mut self, people: &[GroupPerson], timestamp: f64) -> Vec<Group> {
        let positions: Vec<Point> = people.iter().map(|p| p.position).collect();
        let clusters = self.clustering.cluster(&positions);

        let mut claimed: BTreeSet<u64> = BTreeSet::new();
        let mut detected = Vec::with_capacity(clusters.len());

        for cluster in clusters {
            if cluster.len() < self.config.min_group_size {
                continue;
            }
            let members: Vec<&GroupPerson> = cluster.iter().map(|&i| &people[i]).collect();
            let ids: BTreeSet<TrackId> = members.iter().map(|p| p.id).collect();

            let best = self
                .groups
                .values()
                .filter(|g| g.is_active() && !claimed.contains(&g.id))
                .map(|g| (g.id, jaccard(&g.member_ids(), &ids)))
                .filter(|(_, overlap)| *overlap >= self.config.continuity_threshold)
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let group_id = match best {
                Some((id, overlap)) => {
                    debug!("Cluster continues group G{} (jaccard={:.2})", id, overlap);
                    if let Some(group) = self.groups.get_mut(&id) {
                        reconcile(group, &ids, timestamp);
                    }
                    id
                }
                None => self.create_group(&ids, timestamp),
            };
            claimed.insert(group_id);

            if let Some(group) = self.groups.get_mut(&group_id) {
                group.last_seen = timestamp;
                refresh(group, &members, &self.config);
                detected.push(group.clone());
            }
        }

        self.expire(timestamp);
        detected
    }

    fn create_group(&mut self, ids: &BTreeSet<TrackId>, timestamp: f64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let group = Group {
            id,
            members: ids
                .iter()
                .map(|&m| GroupMember {
                    id: m,
                    role: MemberRole::Follower,
                    joined_at: timestamp,
                })
                .collect(),
            group_type: GroupType::Mixed,
            leader: None,
            centroid: Point::default(),
            cohesion: 1.0,
            stability: 1.0,
            formed_at: timestamp,
            last_seen: timestamp,
            dissolved_at: None,
            events: Vec::new(),
            history: VecDeque::new(),
        };
        info!("👥 New group G{} formed with {} members", id, ids.len());
        self.groups.insert(id, group);
        self.events.push(GroupLifecycle::Formed {
            group_id: id,
            size: ids.len(),
        });
        id
    }

    /// Dissolve groups not seen for `dissolve_after_secs` and purge dissolved
    /// groups past retention.
    pub fn expire(&mut self, now: f64) {
        let dissolve_after = self.config.dissolve_after_secs;
        for group in self.groups.values_mut() {
            if group.is_active() && now - group.last_seen > dissolve_after {
                group.dissolved_at = Some(now);
                let lifetime_secs = group.last_seen - group.formed_at;
                info!(
                    "👋 Group G{} dissolved after {:.1}s ({} members)",
                    group.id,
                    lifetime_secs,
                    group.size()
                );
                self.events.push(GroupLifecycle::Dissolved {
                    group_id: group.id,
                    lifetime_secs,
                });
            }
        }

        let retention = self.config.retention_secs;
        let before = self.groups.len();
        let events = &mut self.events;
        self.groups.retain(|id, g| match g.dissolved_at {
            Some(at) if now - at > retention => {
                events.push(GroupLifecycle::Purged { group_id: *id });
                false
            }
            _ => true,
        });
        let purged = before - self.groups.len();
        if purged > 0 {
            debug!("Purged {} dissolved groups", purged);
        }
    }

    pub fn take_events(&mut self) -> Vec<GroupLifecycle> {
        std::mem::take(&mut self.events)
    }

    /// Most recently seen active group containing `id`.
    pub fn group_of(&self, id: TrackId) -> Option<&Group> {
        self.groups
            .values()
            .filter(|g| g.is_active() && g.role_of(id).is_some())
            .max_by(|a, b| {
                a.last_seen
                    .partial_cmp(&b.last_seen)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    pub fn get(&self, group_id: u64) -> Option<&Group> {
        self.groups.get(&group_id)
    }

    pub fn active_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values().filter(|g| g.is_active())
    }

    pub fn all_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn type_histogram(&self) -> BTreeMap<GroupType, usize> {
        let mut hist = BTreeMap::new();
        for g in self.active_groups() {
            *hist.entry(g.group_type).or_insert(0) += 1;
        }
        hist
    }
}

fn reconcile(group: &mut Group, ids: &BTreeSet<TrackId>, timestamp: f64) {
    let current = group.member_ids();
    for joined in ids.difference(&current) {
        info!("➕ {} joined group G{}", joined, group.id);
        group.members.push(GroupMember {
            id: *joined,
            role: MemberRole::Follower,
            joined_at: timestamp,
        });
        group.events.push(MembershipEvent {
            change: MembershipChange::Merge,
            track_id: *joined,
            timestamp,
        });
    }
    for left in current.difference(ids) {
        info!("➖ {} left group G{}", left, group.id);
        group.events.push(MembershipEvent {
            change: MembershipChange::Split,
            track_id: *left,
            timestamp,
        });
    }
    group.members.retain(|m| ids.contains(&m.id));
}

fn refresh(group: &mut Group, members: &[&GroupPerson], cfg: &GroupConfig) {
    let centroid = Point::centroid(members.iter().map(|p| &p.position)).unwrap_or_default();
    group.centroid = centroid;
    group.cohesion = cohesion(members, cfg.proximity_threshold);

    let snapshot: BTreeMap<TrackId, Point> = members
        .iter()
        .map(|p| (p.id, Point::new(p.position.x - centroid.x, p.position.y - centroid.y)))
        .collect();
    group.history.push_back((group.last_seen, snapshot));
    while group.history.len() > cfg.history_len.max(2) {
        group.history.pop_front();
    }
    if let Some((window_start, _)) = group.history.front() {
        let window_start = *window_start;
        group.events.retain(|e| e.timestamp >= window_start);
    }
    group.stability = stability(group, cfg.proximity_threshold);

    let ages: Vec<AgeGroup> = members.iter().map(|p| p.age_group).collect();
    group.group_type = classify_group(&ages);

    group.leader = pick_leader(members, centroid, cfg);
    for m in group.members.iter_mut() {
        let age = members.iter().find(|p| p.id == m.id).map(|p| p.age_group);
        m.role = if Some(m.id) == group.leader {
            MemberRole::Leader
        } else if age == Some(AgeGroup::Child) {
            MemberRole::Dependent
        } else {
            MemberRole::Follower
        };
    }
}

/// `1 / (1 + mean pairwise distance / threshold)`.
pub fn cohesion(members: &[&GroupPerson], threshold: f32) -> f32 {
    let n = members.len();
    if n < 2 || threshold <= 0.0 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            total += members[i].position.distance(&members[j].position);
            pairs += 1;
        }
    }
    let mean = total / pairs as f32;
    (1.0 / (1.0 + mean / threshold)).clamp(0.0, 1.0)
}

fn stability(group: &Group, threshold: f32) -> f32 {
    if group.history.len() < 2 || threshold <= 0.0 {
        return 1.0;
    }
    let mut drift = 0.0f32;
    let mut samples = 0usize;
    for ((_, prev), (_, cur)) in group.history.iter().zip(group.history.iter().skip(1)) {
        for (id, pos) in cur {
            if let Some(before) = prev.get(id) {
                drift += pos.distance(before);
                samples += 1;
            }
        }
    }
    let mean_drift = if samples > 0 { drift / samples as f32 } else { 0.0 };
    let base = 1.0 / (1.0 + mean_drift / threshold);
    let splits = group.count(MembershipChange::Split) as f32;
    let merges = group.count(MembershipChange::Merge) as f32;
    (base - SPLIT_PENALTY * splits + MERGE_REWARD * merges).clamp(0.0, 1.0)
}

/// Composition rules, first match wins.
pub fn classify_group(ages: &[AgeGroup]) -> GroupType {
    let n = ages.len();
    let has_child = ages.contains(&AgeGroup::Child);
    let has_grown = ages.iter().any(|a| a.is_grown());
    let all_working = ages.iter().all(|a| a.is_working_age());
    let bands: BTreeSet<AgeGroup> = ages.iter().copied().collect();
    let has_youth = ages
        .iter()
        .any(|a| matches!(a, AgeGroup::Teen | AgeGroup::YoungAdult));

    if has_child && has_grown {
        GroupType::Family
    } else if n == 2 && all_working {
        GroupType::Couple
    } else if n >= 3 && bands.len() <= 2 && has_youth {
        GroupType::Friends
    } else if (3..=6).contains(&n) && all_working {
        GroupType::Colleagues
    } else {
        GroupType::Mixed
    }
}

fn pick_leader(members: &[&GroupPerson], centroid: Point, cfg: &GroupConfig) -> Option<TrackId> {
    if members.is_empty() {
        return None;
    }
    let n = members.len() as f32;
    let mean_v = (
        members.iter().map(|p| p.velocity.0).sum::<f32>() / n,
        members.iter().map(|p| p.velocity.1).sum::<f32>() / n,
    );
    let heading_norm = (mean_v.0 * mean_v.0 + mean_v.1 * mean_v.1).sqrt();
    let mean_speed = members.iter().map(|p| p.speed).sum::<f32>() / n;
    let has_child = members.iter().any(|p| p.age_group == AgeGroup::Child);

    let mut best: Option<(TrackId, f32)> = None;
    for p in members {
        let mut score = 0.0;
        if heading_norm > 1.0 {
            let ahead = ((p.position.x - centroid.x) * mean_v.0
                + (p.position.y - centroid.y) * mean_v.1)
                / heading_norm;
            if ahead > 0.0 {
                score += W_AHEAD;
            }
        }
        if has_child && p.age_group.is_grown() {
            score += W_GUARDIAN;
        }
        if p.carrying_items {
            score += W_BAG;
        }
        let pace_gap = (p.speed - mean_speed).abs() / mean_speed.max(1.0);
        score += W_PACE * (1.0 - pace_gap).clamp(0.0, 1.0);
        let central = p.position.distance(&centroid) / cfg.proximity_threshold.max(1.0);
        score += W_CENTRAL * (1.0 - central).clamp(0.0, 1.0);

        if best.map_or(true, |(_, s)| score > s) {
            best = Some((p.id, score));
        }
    }
    best.filter(|(_, s)| *s >= cfg.leader_min_score)
        .map(|(id, _)| id)
}

// ============================================================================
// TESTS
// ============================================================================
