// src/pipeline/event_bus.rs
//
// Decoupled event outbox. Components publish lifecycle events instead of
// calling the persistence collaborator directly; the engine drains the bus
// after each frame, outside the state lock.

use crate::analysis::behavior::BehaviorSummary;
use crate::analysis::group_detector::GroupType;
use crate::analysis::person_tracker::LineCrossing;
use crate::analysis::purchase_journey::Journey;
use crate::persistence::PersistRecord;
use crate::pipeline::orchestrator::Snapshot;
use crate::types::{PersonKind, TrackId};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    TrackCreated {
        track_id: TrackId,
        timestamp: f64,
    },

    LineCrossed(LineCrossing),

    TrackEvicted {
        track_id: TrackId,
        last_seen: f64,
    },

    IdentityResolved {
        track_id: TrackId,
        kind: PersonKind,
        person_id: Option<String>,
    },

    GroupFormed {
        group_id: u64,
        size: usize,
    },

    GroupDissolved {
        group_id: u64,
        group_type: Option<GroupType>,
        lifetime_secs: f64,
    },

    BehaviorFinalized(BehaviorSummary),

    JourneyFinalized(Journey),

    SnapshotDue(Box<Snapshot>),
}

impl PipelineEvent {
    /// Events that persistence must receive. The bus never sheds these.
    pub fn carries_record(&self) -> bool {
        matches!(
            self,
            Self::BehaviorFinalized(_) | Self::JourneyFinalized(_) | Self::SnapshotDue(_)
        )
    }

    /// The persistence record carried by this event, if any.
    pub fn into_record(self) -> Option<PersistRecord> {
        match self {
            Self::BehaviorFinalized(summary) => Some(PersistRecord::BehaviorSummary(summary)),
            Self::JourneyFinalized(journey) => Some(PersistRecord::Journey(journey)),
            Self::SnapshotDue(snapshot) => Some(PersistRecord::Snapshot(*snapshot)),
            _ => None,
        }
    }
}

/// Per-frame outbox. When full, the oldest notification-only event is shed;
/// finalized records are always kept, so the bus may briefly exceed its
/// capacity when a frame finalizes many people at once.
pub struct EventBus {
    pending: VecDeque<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.pending.len() >= self.capacity {
            match self.pending.iter().position(|e| !e.carries_record()) {
                Some(idx) => {
                    self.pending.remove(idx);
                    warn!("Event bus full ({} events), shedding oldest notification", self.capacity);
                }
                None if !event.carries_record() => {
                    warn!("Event bus holds only records, dropping {} notification", event_name(&event));
                    return;
                }
                None => {}
            }
        }
        self.pending.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.pending.drain(..).collect()
    }
}

fn event_name(event: &PipelineEvent) -> &'static str {
    match event {
        PipelineEvent::TrackCreated { .. } => "track_created",
        PipelineEvent::LineCrossed(_) => "line_crossed",
        PipelineEvent::TrackEvicted { .. } => "track_evicted",
        PipelineEvent::IdentityResolved { .. } => "identity_resolved",
        PipelineEvent::GroupFormed { .. } => "group_formed",
        PipelineEvent::GroupDissolved { .. } => "group_dissolved",
        PipelineEvent::BehaviorFinalized(_) => "behavior_finalized",
        PipelineEvent::JourneyFinalized(_) => "journey_finalized",
        PipelineEvent::SnapshotDue(_) => "snapshot_due",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(seq: u64) -> PipelineEvent {
        PipelineEvent::TrackCreated {
            track_id: TrackId::new(0, seq),
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_sheds_oldest_notification_when_full() {
        let mut bus = EventBus::new(2);
        for seq in 1..=3 {
            bus.publish(created(seq));
        }
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            PipelineEvent::TrackCreated { track_id, .. } if track_id.seq == 2
        ));
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_records_survive_a_full_bus() {
        let mut bus = EventBus::new(2);
        bus.publish(PipelineEvent::SnapshotDue(Box::default()));
        bus.publish(created(1));
        bus.publish(PipelineEvent::SnapshotDue(Box::default()));
        // Only records left: notifications are refused, records still queue
        bus.publish(created(2));
        bus.publish(PipelineEvent::SnapshotDue(Box::default()));

        let events = bus.drain();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(PipelineEvent::carries_record));
    }

    #[test]
    fn test_only_finalizations_become_records() {
        let formed = PipelineEvent::GroupFormed { group_id: 1, size: 2 };
        assert!(!formed.carries_record());
        assert!(formed.into_record().is_none());
    }
}
