//! Progress reporting for sync operations
//!
//! Progress events are purely observational: nothing in the engine depends on
//! what a sink does with them.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::TransferPhase;

/// Bytes moved so far for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub item_key: String,
    pub bytes_loaded: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_total: Option<u64>,
}

/// What happened to one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ItemOutcome {
    /// Bytes were copied
    Transferred { bytes: u64 },
    /// The remote response had no body; nothing was written
    NoBody,
}

/// Completion event for one item
#[derive(Debug, Clone, Serialize)]
pub struct ItemEvent {
    pub phase: TransferPhase,
    pub key: String,
    pub local_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub outcome: ItemOutcome,
}

/// Consumer of progress and per-item completion events
pub trait ProgressSink: Send + Sync {
    /// An item is about to be transferred
    fn on_start(&self, _key: &str, _bytes_total: Option<u64>) {}

    /// Bytes were moved for the current item
    fn on_progress(&self, _progress: &TransferProgress) {}

    /// The current item finished
    fn on_item(&self, _event: &ItemEvent) {}
}

/// Sink that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
