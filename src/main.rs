// src/main.rs

use anyhow::{Context, Result};
use footfall_analytics::config::CONFIG_PATH_ENV;
use footfall_analytics::persistence::build_sink;
use footfall_analytics::pipeline::{Engine, MetricsSummary};
use footfall_analytics::source;
use footfall_analytics::types::Config;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🛒 Footfall analytics starting");
    info!("✓ Configuration loaded from {} (override with {})", config_path, CONFIG_PATH_ENV);
    info!(
        "Tracker: max_distance={:.0}px, max_disappeared={:.1}s, line at {:.0}% of frame height",
        config.tracker.max_distance,
        config.tracker.max_disappeared_secs,
        config.tracker.line_position * 100.0
    );

    let sink = build_sink(&config.persistence).context("failed to set up persistence")?;
    let engine = Engine::new(&config, sink);

    let cleanup = engine.spawn_cleanup();
    let stats = spawn_stats(engine.clone());

    let replay = {
        let engine = engine.clone();
        let path = config.ingest.input_path.clone();
        let lossless = config.ingest.lossless_replay;
        tokio::spawn(async move { source::replay_file(path, engine, lossless).await })
    };

    let summary = engine.run().await;
    cleanup.abort();
    stats.abort();

    match replay.await {
        Ok(Ok(source_stats)) => {
            if source_stats.malformed > 0 {
                warn!("⚠️  {} malformed input lines skipped", source_stats.malformed);
            }
        }
        Ok(Err(e)) => error!("Detector input failed: {:#}", e),
        Err(e) => error!("Replay task failed: {}", e),
    }

    let snapshot = engine.reader().latest();
    log_final_report(&summary);
    info!(
        "  🧾 Journeys finalized: {} (conversion {:.1}%)",
        snapshot.journeys.finalized,
        snapshot.journeys.conversion_rate * 100.0
    );
    info!(
        "  🔁 Returning customers: {:.1}% of {} identified",
        snapshot.journeys.returning_customer_ratio * 100.0,
        snapshot.journeys.customers_identified
    );
    for (zone, visits) in &snapshot.zone_visits {
        info!("  🗺️  {}: {} visits", zone, visits);
    }
    Ok(())
}

fn spawn_stats(engine: Engine) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let s = engine.summary();
            let snapshot = engine.reader().latest();
            info!(
                "📊 {} frames ({:.1} FPS, {} dropped, {} queued) | {} active, {} inside | {} groups | last frame {}µs",
                s.frames_processed,
                s.fps,
                s.frames_dropped,
                engine.queue().depth(),
                snapshot.totals.active,
                snapshot.totals.occupancy,
                snapshot.groups.active,
                s.last_frame_us
            );
        }
    })
}

fn log_final_report(s: &MetricsSummary) {
    info!("\n📊 Final Report:");
    info!("  Frames: {} received, {} processed", s.frames_received, s.frames_processed);
    if s.frames_dropped + s.frames_out_of_order > 0 {
        info!(
            "  ⚠️  Frames dropped: {} (queue), {} (out of order)",
            s.frames_dropped, s.frames_out_of_order
        );
    }
    info!("  Detections rejected: {}", s.detections_rejected);
    info!("  🆕 Tracks: {} created, {} evicted", s.tracks_created, s.tracks_evicted);
    info!("  🚪 Line: {} entries, {} exits", s.line_entries, s.line_exits);
    info!("  👥 Groups: {} formed, {} dissolved", s.groups_formed, s.groups_dissolved);
    info!("  🪪 Identities resolved: {}", s.identities_resolved);
    info!(
        "  💾 Records persisted: {} ({} failed)",
        s.persist_successes, s.persist_failures
    );
    if s.slow_frames > 0 {
        info!("  ⏱️  Slow frames: {}", s.slow_frames);
    }
    info!("  Processing Speed: {:.1} FPS over {:.1}s", s.fps, s.elapsed_secs);
}
