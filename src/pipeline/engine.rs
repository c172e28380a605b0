// src/pipeline/engine.rs
//
// Engine context: one per camera, constructed once in main and handed out
// by clone. Owns the orchestrator behind a single write lock shared by the
// frame loop and the cleanup timer, the ingest queue, the persistence sink
// and the snapshot channel read by external layers.
//
// Readers never touch the lock: they get the latest immutable snapshot from
// a watch channel, and its JSON form from a short-TTL cache.

use crate::analysis::zones::ZoneSpec;
use crate::persistence::PersistenceSink;
use crate::pipeline::event_bus::PipelineEvent;
use crate::pipeline::ingest::FrameQueue;
use crate::pipeline::metrics::{MetricsSummary, PipelineMetrics};
use crate::pipeline::orchestrator::{Orchestrator, Snapshot};
use crate::types::{Config, DetectionFrame};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct Engine {
    orchestrator: Arc<Mutex<Orchestrator>>,
    queue: Arc<FrameQueue>,
    sink: Arc<dyn PersistenceSink>,
    metrics: PipelineMetrics,
    snapshot_tx: Arc<watch::Sender<Arc<Snapshot>>>,
    json_cache: Arc<StdMutex<Option<CachedJson>>>,
    snapshot_ttl: Duration,
    cleanup_interval: Duration,
}

impl Engine {
    pub fn new(config: &Config, sink: Arc<dyn PersistenceSink>) -> Self {
        let metrics = PipelineMetrics::new();
        let queue = FrameQueue::new(config.ingest.queue_capacity, Arc::clone(&metrics.frames_dropped));
        let orchestrator = Orchestrator::new(config, metrics.clone());
        let (snapshot_tx, _) = watch::channel(orchestrator.latest());
        info!(
            "✓ Engine ready: queue capacity {}, sink '{}'",
            config.ingest.queue_capacity,
            sink.name()
        );

        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            queue: Arc::new(queue),
            sink,
            metrics,
            snapshot_tx: Arc::new(snapshot_tx),
            json_cache: Arc::new(StdMutex::new(None)),
            snapshot_ttl: Duration::from_millis(config.orchestrator.snapshot_ttl_ms),
            cleanup_interval: Duration::from_millis(config.orchestrator.cleanup_interval_ms.max(1)),
        }
    }

    /// Hand a frame to the ingest queue. Returns false once the queue is
    /// closed.
    pub fn submit(&self, frame: DetectionFrame) -> bool {
        self.metrics.inc(&self.metrics.frames_received);
        self.queue.push(frame)
    }

    /// Signal end of input; `run` drains the queue and then returns.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Frame loop. Processes frames strictly one at a time until the queue
    /// is closed and drained, then finalizes every live track.
    pub async fn run(&self) -> MetricsSummary {
        info!("▶️  Frame loop started");
        while let Some(frame) = self.queue.pop().await {
            let (snapshot, events) = {
                let mut orch = self.orchestrator.lock().await;
                let snapshot = orch.process_frame(frame);
                (snapshot, orch.drain_events())
            };
            self.dispatch(events);
            self.snapshot_tx.send_replace(snapshot);
        }

        info!("⏹️  Input closed, flushing live tracks");
        let (snapshot, events) = {
            let mut orch = self.orchestrator.lock().await;
            orch.flush();
            (orch.latest(), orch.drain_events())
        };
        self.dispatch(events);
        self.snapshot_tx.send_replace(snapshot);
        if let Err(e) = self.sink.flush() {
            error!("💾 Sink flush failed: {}", e);
        }
        self.summary()
    }

    /// Forward the records carried by `events` to persistence. Failures are
    /// logged and counted; nothing is retried.
    fn dispatch(&self, events: Vec<PipelineEvent>) {
        for event in events {
            let Some(record) = event.into_record() else {
                continue;
            };
            let kind = record.kind();
            match self.sink.persist(record) {
                Ok(()) => {
                    self.metrics.inc(&self.metrics.persist_successes);
                    debug!("💾 {} record handed to '{}'", kind, self.sink.name());
                }
                Err(e) => {
                    self.metrics.inc(&self.metrics.persist_failures);
                    error!("💾 Failed to persist {} record: {}", kind, e);
                }
            }
        }
    }

    /// Periodic eviction and pruning while input is idle. Takes the same
    /// lock as the frame loop, so it never interleaves with a frame.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.cleanup_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let (evicted, events) = {
                    let mut orch = engine.orchestrator.lock().await;
                    (orch.cleanup(), orch.drain_events())
                };
                if evicted > 0 {
                    debug!("🧹 Cleanup evicted {} idle tracks", evicted);
                }
                engine.dispatch(events);
            }
        })
    }

    /// Admin update of the zone configuration. Returns rejected zone count.
    pub async fn replace_zones(&self, specs: &BTreeMap<String, ZoneSpec>) -> usize {
        self.orchestrator.lock().await.replace_zones(specs)
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.snapshot_tx.subscribe(),
            cache: Arc::clone(&self.json_cache),
            ttl: self.snapshot_ttl,
        }
    }

    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut summary = self.metrics.summary();
        summary.persist_failures += self.sink.deferred_failures();
        summary
    }
}

// ============================================================================
// READ SIDE
// ============================================================================

struct CachedJson {
    at: Instant,
    json: String,
}

/// Read-only handle on the latest snapshot, cheap to clone and safe to call
/// at any frequency.
#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<Snapshot>>,
    cache: Arc<StdMutex<Option<CachedJson>>>,
    ttl: Duration,
}

impl SnapshotReader {
    pub fn new(rx: watch::Receiver<Arc<Snapshot>>, ttl: Duration) -> Self {
        Self {
            rx,
            cache: Arc::new(StdMutex::new(None)),
            ttl,
        }
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.rx.borrow())
    }

    /// Serialized latest snapshot, reused for `ttl` after it was produced.
    pub fn json(&self) -> Result<String, serde_json::Error> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = cache.as_ref().filter(|c| c.at.elapsed() < self.ttl) {
            return Ok(cached.json.clone());
        }
        let json = serde_json::to_string(&*self.latest())?;
        *cache = Some(CachedJson {
            at: Instant::now(),
            json: json.clone(),
        });
        Ok(json)
    }

    /// Wait until a newer snapshot is published. False once the engine is
    /// gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

// ============================================================================
// TESTS
// ============================================================================
