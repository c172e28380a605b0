// src/lib.rs

pub mod analysis;
pub mod config;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod pipeline;
pub mod source;
pub mod types;

pub use pipeline::{Engine, Snapshot, SnapshotReader};
pub use types::Config;
