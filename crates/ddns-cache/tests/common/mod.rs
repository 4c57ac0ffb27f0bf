//! Common utilities for record store contract tests

#![allow(dead_code)]

use ddns_cache::record::{ChangeKind, RecordEvent};
use ddns_cache::{Store, StoreConfig};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// How long a test waits for a filesystem event before giving up
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Store rooted in a fresh temporary directory
///
/// The directory lives as long as the returned `TempDir`.
pub fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir is created");
    let store = Store::new(dir.path());
    (dir, store)
}

/// Store with a small notifier capacity, for backpressure tests
pub fn temp_store_with_capacity(capacity: usize) -> (TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir is created");
    let config = StoreConfig::new(dir.path()).with_notify_capacity(capacity);
    let store = Store::from_config(&config).expect("config is valid");
    (dir, store)
}

/// Wait for the next event about `name`, skipping events about other records
pub async fn next_event_for(
    events: &mut mpsc::Receiver<RecordEvent>,
    name: &str,
) -> Option<RecordEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            if event.record.name() == name {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Collect every event about `name` arriving within `window`
pub async fn drain_events_for(
    events: &mut mpsc::Receiver<RecordEvent>,
    name: &str,
    window: Duration,
) -> Vec<ChangeKind> {
    let mut kinds = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        if event.record.name() == name {
            kinds.push(event.kind);
        }
    }
    kinds
}
