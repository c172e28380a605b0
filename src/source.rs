// src/source.rs
//
// Detector-output reader standing in for the detector bridge. Reads one
// JSON DetectionFrame per line and submits it to the engine; malformed
// lines are skipped individually. The queue is closed at end of input.

use crate::pipeline::engine::Engine;
use crate::types::DetectionFrame;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const REPLAY_BACKOFF: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub lines: u64,
    pub submitted: u64,
    pub malformed: u64,
}

pub fn parse_frame(line: &str) -> Result<DetectionFrame, serde_json::Error> {
    serde_json::from_str(line)
}

/// Replay a JSONL file into the engine, then close its queue.
pub async fn replay_file(path: impl AsRef<Path>, engine: Engine, lossless: bool) -> Result<SourceStats> {
    let path = path.as_ref();
    let result = async {
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open detector output {}", path.display()))?;
        info!("📂 Replaying detections from {}", path.display());
        replay(BufReader::new(file), &engine, lossless).await
    }
    .await;
    engine.close();
    result
}

/// Submit every frame from `reader`. With `lossless`, waits for queue space
/// instead of letting the queue drop the oldest frame.
pub async fn replay<R>(reader: R, engine: &Engine, lossless: bool) -> Result<SourceStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SourceStats::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read detector output")? {
        stats.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame = match parse_frame(line) {
            Ok(frame) => frame,
            Err(e) => {
                stats.malformed += 1;
                warn!("Skipping malformed frame on line {}: {}", stats.lines, e);
                continue;
            }
        };

        if lossless {
            while engine.queue().is_full() && !engine.queue().is_closed() {
                tokio::time::sleep(REPLAY_BACKOFF).await;
            }
        }
        if !engine.submit(frame) {
            warn!("Engine queue closed, stopping replay at line {}", stats.lines);
            break;
        }
        stats.submitted += 1;
    }
    info!(
        "📂 Replay finished: {} frames submitted, {} malformed lines",
        stats.submitted, stats.malformed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::NullSink;
    use crate::types::Config;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_replay_skips_malformed_lines() {
        let input = concat!(
            r#"{"frame_id":1,"timestamp":0.0,"detections":[{"bbox":[0,0,40,100],"confidence":0.9}]}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"frame_id":2,"timestamp":1.0,"detections":[{"confidence":0.9}]}"#,
            "\n",
        );
        let engine = Engine::new(&Config::default(), Arc::new(NullSink));
        let stats = replay(input.as_bytes(), &engine, true).await.unwrap();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(engine.queue().depth(), 2);
    }

    #[tokio::test]
    async fn test_lossless_replay_waits_for_consumer() {
        let mut config = Config::default();
        config.ingest.queue_capacity = 2;
        let engine = Engine::new(&config, Arc::new(NullSink));
        let input: String = (0..10)
            .map(|i| format!("{{\"frame_id\":{},\"timestamp\":{}.0}}\n", i, i))
            .collect();

        let consumer = engine.clone();
        let run = tokio::spawn(async move { consumer.run().await });
        replay(input.as_bytes(), &engine, true).await.unwrap();
        engine.close();

        let summary = run.await.unwrap();
        assert_eq!(summary.frames_processed, 10);
        assert_eq!(summary.frames_dropped, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let engine = Engine::new(&Config::default(), Arc::new(NullSink));
        assert!(replay_file("/nonexistent/detections.jsonl", engine.clone(), true)
            .await
            .is_err());
        assert!(engine.queue().is_closed());
    }

    #[tokio::test]
    async fn test_missing_file_lets_engine_finish() {
        let engine = Engine::new(&Config::default(), Arc::new(NullSink));
        let consumer = engine.clone();
        let run = tokio::spawn(async move { consumer.run().await });

        let result = replay_file("/nonexistent/detections.jsonl", engine.clone(), false).await;
        assert!(result.is_err());

        let summary = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("engine should stop once the source gives up")
            .unwrap();
        assert_eq!(summary.frames_processed, 0);
    }
}
