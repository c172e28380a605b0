// src/pipeline/metrics.rs
//
// Pipeline observability: counts and last-frame timing for every stage.
// Counters are shared atomics so the ingest side and the frame loop can
// both write without locking. Logged periodically and at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_received: Arc<AtomicU64>,
    pub frames_processed: Arc<AtomicU64>,
    pub frames_dropped: Arc<AtomicU64>,
    pub frames_out_of_order: Arc<AtomicU64>,
    pub slow_frames: Arc<AtomicU64>,
    pub detections_rejected: Arc<AtomicU64>,
    pub tracks_created: Arc<AtomicU64>,
    pub tracks_evicted: Arc<AtomicU64>,
    pub line_entries: Arc<AtomicU64>,
    pub line_exits: Arc<AtomicU64>,
    pub groups_formed: Arc<AtomicU64>,
    pub groups_dissolved: Arc<AtomicU64>,
    pub journeys_finalized: Arc<AtomicU64>,
    pub identities_resolved: Arc<AtomicU64>,
    pub persist_successes: Arc<AtomicU64>,
    pub persist_failures: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let counter = || Arc::new(AtomicU64::new(0));
        Self {
            frames_received: counter(),
            frames_processed: counter(),
            frames_dropped: counter(),
            frames_out_of_order: counter(),
            slow_frames: counter(),
            detections_rejected: counter(),
            tracks_created: counter(),
            tracks_evicted: counter(),
            line_entries: counter(),
            line_exits: counter(),
            groups_formed: counter(),
            groups_dissolved: counter(),
            journeys_finalized: counter(),
            identities_resolved: counter(),
            persist_successes: counter(),
            persist_failures: counter(),
            frame_time_us: counter(),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSummary {
            frames_received: get(&self.frames_received),
            frames_processed: get(&self.frames_processed),
            frames_dropped: get(&self.frames_dropped),
            frames_out_of_order: get(&self.frames_out_of_order),
            slow_frames: get(&self.slow_frames),
            fps: self.fps(),
            detections_rejected: get(&self.detections_rejected),
            tracks_created: get(&self.tracks_created),
            tracks_evicted: get(&self.tracks_evicted),
            line_entries: get(&self.line_entries),
            line_exits: get(&self.line_exits),
            groups_formed: get(&self.groups_formed),
            groups_dissolved: get(&self.groups_dissolved),
            journeys_finalized: get(&self.journeys_finalized),
            identities_resolved: get(&self.identities_resolved),
            persist_successes: get(&self.persist_successes),
            persist_failures: get(&self.persist_failures),
            last_frame_us: get(&self.frame_time_us),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_received: u64,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub frames_out_of_order: u64,
    pub slow_frames: u64,
    pub fps: f64,
    pub detections_rejected: u64,
    pub tracks_created: u64,
    pub tracks_evicted: u64,
    pub line_entries: u64,
    pub line_exits: u64,
    pub groups_formed: u64,
    pub groups_dissolved: u64,
    pub journeys_finalized: u64,
    pub identities_resolved: u64,
    pub persist_successes: u64,
    pub persist_failures: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let m = PipelineMetrics::new();
        let other = m.clone();
        other.inc(&other.frames_processed);
        m.add(&m.detections_rejected, 3);
        m.set_timing(&m.frame_time_us, 1200);
        let s = m.summary();
        assert_eq!(s.frames_processed, 1);
        assert_eq!(s.detections_rejected, 3);
        assert_eq!(s.last_frame_us, 1200);
    }
}
