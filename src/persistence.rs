// src/persistence.rs
//
// Persistence collaborator. Finalized behaviour summaries, finalized
// journeys and periodic snapshots are handed to a sink after each frame,
// outside the engine state lock. Sinks are best-effort: failures are logged
// and counted, in-memory state is never rolled back.
//
// Sinks:
//   - JsonlSink: one JSON object per line, appended to a local file
//   - HttpSink:  POST per record via reqwest, fire-and-forget on tokio
//   - NullSink:  discards

use crate::analysis::behavior::BehaviorSummary;
use crate::analysis::purchase_journey::Journey;
use crate::error::PersistenceError;
use crate::pipeline::orchestrator::Snapshot;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkBackend {
    None,
    Jsonl,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: SinkBackend,
    /// JSONL output file
    pub path: String,
    /// HTTP endpoint receiving one record per POST
    pub url: Option<String>,
    pub timeout_secs: u64,
    /// Snapshot persistence period; 0 disables snapshot records
    pub snapshot_interval_secs: f64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::None,
            path: "output/footfall_records.jsonl".to_string(),
            url: None,
            timeout_secs: 5,
            snapshot_interval_secs: 60.0,
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record_kind", rename_all = "snake_case")]
pub enum PersistRecord {
    BehaviorSummary(BehaviorSummary),
    Journey(Journey),
    Snapshot(Snapshot),
}

impl PersistRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BehaviorSummary(_) => "behavior_summary",
            Self::Journey(_) => "journey",
            Self::Snapshot(_) => "snapshot",
        }
    }
}

/// What actually goes on the wire: the record plus a unique id for
/// idempotent ingestion downstream.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub record_id: String,
    pub written_at: String,
    #[serde(flatten)]
    pub record: PersistRecord,
}

impl Envelope {
    pub fn new(record: PersistRecord) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            written_at: chrono::Utc::now().to_rfc3339(),
            record,
        }
    }
}

// ============================================================================
// SINKS
// ============================================================================

pub trait PersistenceSink: Send + Sync {
    fn persist(&self, record: PersistRecord) -> Result<(), PersistenceError>;

    fn flush(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    /// Failures that happened after `persist` returned (async sinks).
    fn deferred_failures(&self) -> u64 {
        0
    }

    fn name(&self) -> &'static str;
}

pub struct NullSink;

impl PersistenceSink for NullSink {
    fn persist(&self, record: PersistRecord) -> Result<(), PersistenceError> {
        debug!("Discarding {} record", record.kind());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<fs::File>>,
}

impl JsonlSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("💾 Records will be appended to: {}", path.display());
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BufWriter<fs::File>>, PersistenceError> {
        self.writer
            .lock()
            .map_err(|_| PersistenceError::Io(std::io::Error::other("jsonl writer lock poisoned")))
    }
}

impl PersistenceSink for JsonlSink {
    fn persist(&self, record: PersistRecord) -> Result<(), PersistenceError> {
        let kind = record.kind();
        let line = serde_json::to_string(&Envelope::new(record))?;
        let mut writer = self.lock()?;
        writeln!(writer, "{}", line)?;
        // Finalized records are rare enough to flush eagerly
        if kind != "snapshot" {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        self.lock()?.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    failures: Arc<AtomicU64>,
}

impl HttpSink {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, PersistenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        info!("🌐 Records will be posted to {}", url);
        Ok(Self {
            client,
            url: url.to_string(),
            failures: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl PersistenceSink for HttpSink {
    fn persist(&self, record: PersistRecord) -> Result<(), PersistenceError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| PersistenceError::NoRuntime)?;
        let envelope = Envelope::new(record);
        let body = serde_json::to_value(&envelope)?;
        let request = self.client.post(&self.url).json(&body);
        let failures = Arc::clone(&self.failures);
        let record_id = envelope.record_id;
        let kind = envelope.record.kind();

        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("🌐 {} record {} accepted", kind, record_id);
                }
                Ok(resp) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    error!("🌐 Sink rejected {} record {}: {}", kind, record_id, resp.status());
                }
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    error!("🌐 Failed to post {} record {}: {}", kind, record_id, e);
                }
            }
        });
        Ok(())
    }

    fn deferred_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

pub fn build_sink(config: &PersistenceConfig) -> Result<Arc<dyn PersistenceSink>, PersistenceError> {
    match config.backend {
        SinkBackend::None => Ok(Arc::new(NullSink)),
        SinkBackend::Jsonl => Ok(Arc::new(JsonlSink::open(&config.path)?)),
        SinkBackend::Http => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| PersistenceError::InvalidConfig("http backend requires persistence.url".to_string()))?;
            Ok(Arc::new(HttpSink::new(url, config.timeout_secs)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgeGroup, PersonKind, TrackId};
    use std::collections::BTreeMap;

    fn summary() -> BehaviorSummary {
        BehaviorSummary {
            track_id: TrackId::new(0, 7),
            first_seen: 0.0,
            last_seen: 60.0,
            dwell_minutes: 1.0,
            total_distance: 300.0,
            avg_speed: 5.0,
            max_speed: 40.0,
            stops: 2,
            trajectory_complexity: 0.4,
            zones_visited: vec!["dairy".to_string()],
            zone_dwell_secs: BTreeMap::new(),
            age_group: AgeGroup::Adult,
            carrying_items: true,
            kind: None,
        }
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("footfall-test-{}.jsonl", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_jsonl_sink_writes_tagged_lines() {
        let path = temp_path();
        let sink = JsonlSink::open(&path).unwrap();
        sink.persist(PersistRecord::BehaviorSummary(summary())).unwrap();
        sink.persist(PersistRecord::BehaviorSummary(summary())).unwrap();
        sink.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["record_kind"], "behavior_summary");
        assert_eq!(lines[0]["stops"], 2);
        assert_ne!(lines[0]["record_id"], lines[1]["record_id"]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_record_kind_survives_person_kind_field() {
        let mut employee = summary();
        employee.kind = Some(PersonKind::Employee);
        let line = serde_json::to_string(&Envelope::new(PersistRecord::BehaviorSummary(employee))).unwrap();

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["record_kind"], "behavior_summary");
        assert_eq!(value["kind"], "employee");
        assert_eq!(line.matches("\"kind\"").count(), 1);
    }

    #[test]
    fn test_http_sink_requires_runtime() {
        let sink = HttpSink::new("http://127.0.0.1:9/records", 1).unwrap();
        let err = sink.persist(PersistRecord::BehaviorSummary(summary()));
        assert!(matches!(err, Err(PersistenceError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_http_sink_is_fire_and_forget() {
        let sink = HttpSink::new("http://127.0.0.1:9/records", 1).unwrap();
        assert!(sink.persist(PersistRecord::BehaviorSummary(summary())).is_ok());
        for _ in 0..50 {
            if sink.deferred_failures() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(sink.deferred_failures(), 1);
    }

    #[test]
    fn test_build_sink() {
        assert_eq!(build_sink(&PersistenceConfig::default()).unwrap().name(), "null");
        let http_without_url = PersistenceConfig {
            backend: SinkBackend::Http,
            ..PersistenceConfig::default()
        };
        assert!(matches!(
            build_sink(&http_without_url),
            Err(PersistenceError::InvalidConfig(_))
        ));
    }
}
