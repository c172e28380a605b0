// src/pipeline/mod.rs

pub mod engine;
pub mod event_bus;
pub mod frame_context;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;

pub use engine::{Engine, SnapshotReader};
pub use event_bus::{EventBus, PipelineEvent};
pub use frame_context::FrameContext;
pub use ingest::FrameQueue;
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use orchestrator::{Orchestrator, Snapshot};
