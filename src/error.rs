// src/error.rs
//
// Error types for the analytics engine. Each boundary has its own error so
// callers can tell missing data apart from invalid input.

use thiserror::Error;

/// A single detector entry that cannot be used. The entry is skipped; the
/// rest of the frame is processed normally.
#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("detection has no bounding box")]
    MissingBbox,

    #[error("degenerate bounding box ({width}x{height})")]
    DegenerateBbox { width: f32, height: f32 },

    #[error("detection contains non-finite coordinates")]
    NonFinite,
}

/// Zone configuration and zone lookup failures.
#[derive(Debug, Error, PartialEq)]
pub enum ZoneLookupError {
    #[error("zone {zone_id} has {vertices} vertices, at least 3 are required")]
    DegeneratePolygon { zone_id: String, vertices: usize },

    #[error("zone {0} polygon contains non-finite coordinates")]
    NonFinitePolygon(String),

    #[error("unknown zone: {0}")]
    UnknownZone(String),
}

/// Identity collaborator could not produce a match.
#[derive(Debug, Error, PartialEq)]
pub enum MatchFailure {
    #[error("embedding is empty or has zero norm")]
    EmptyEmbedding,

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("best similarity {best:.3} below threshold {threshold:.3}")]
    BelowThreshold { best: f32, threshold: f32 },

    #[error("identity gallery is empty")]
    EmptyGallery,
}

/// Persistence is best-effort: these are logged and counted, never fatal.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("http sink error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http sink requires a running tokio runtime")]
    NoRuntime,

    #[error("invalid persistence configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration rejected by `Config::validate`.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
