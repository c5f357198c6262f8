//! Time-boxed cache of per-key replication status.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::Instant;

use crate::models::status::StatusRecord;

/// How long a fetched status is trusted.
pub const STATUS_TTL: Duration = Duration::from_millis(30_000);

/// Maps object keys to their last-known status.
///
/// Expired entries are not removed on read; they stay until overwritten,
/// invalidated or cleared, but are reported as absent.
#[derive(Debug)]
pub struct StatusCache {
    ttl: Duration,
    entries: HashMap<String, Arc<StatusRecord>>,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(STATUS_TTL)
    }
}

impl StatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Fresh record for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<StatusRecord>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Arc<StatusRecord>> {
        self.entries
            .get(key)
            .filter(|record| now.saturating_duration_since(record.fetched_at) < self.ttl)
            .cloned()
    }

    pub fn put(&mut self, key: impl Into<String>, record: StatusRecord) {
        self.entries.insert(key.into(), Arc::new(record));
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
