//! Replication status as seen from the zone being viewed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::Instant;

use crate::models::consistency::ConsistencyReport;

/// Resolved status for every requested key.
pub type StatusMap = HashMap<String, ResolvedStatus>;

/// Whether the viewed zone holds the latest version of an object.
///
/// `Unknown` means no authoritative answer is available, which is not the
/// same as "not checked yet".
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReplicationState {
    Latest,
    /// The zone lags behind; the backend reports a zone that lacks an
    /// existing object as `Missing`, which is the same situation.
    #[serde(alias = "Missing")]
    Outdated,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

/// What the UI needs to render a status badge for one key.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub state: ReplicationState,
    pub is_delete_marker: bool,
}

impl ResolvedStatus {
    pub const UNKNOWN: Self = Self {
        state: ReplicationState::Unknown,
        is_delete_marker: false,
    };

    pub fn badge(&self) -> Badge {
        Badge::from(*self)
    }
}

/// Last-known status of one key.
///
/// Records are never mutated in place: a refresh builds a new record and
/// replaces the old one in the cache.
#[derive(Clone, Debug)]
pub struct StatusRecord {
    pub key: String,

    /// Zone the status was resolved for. A record only answers for this zone.
    pub zone: String,

    pub state: ReplicationState,
    pub is_delete_marker: bool,

    /// Monotonic instant used for TTL checks.
    pub fetched_at: Instant,

    /// Wall-clock time of the observation, for display.
    pub observed_at: DateTime<Utc>,

    /// The report this record was derived from.
    pub raw: ConsistencyReport,
}

impl StatusRecord {
    /// Derive the record for `zone` from a consistency report.
    ///
    /// Uses the first `per_zone` entry whose name matches exactly; with no
    /// match the state is `Unknown`.
    pub fn from_report(key: impl Into<String>, zone: &str, raw: ConsistencyReport) -> Self {
        let (state, is_delete_marker) = match raw.zone(zone) {
            Some(entry) => (entry.state, entry.latest_is_delete_marker()),
            None => (ReplicationState::Unknown, false),
        };

        Self {
            key: key.into(),
            zone: zone.to_string(),
            state,
            is_delete_marker,
            fetched_at: Instant::now(),
            observed_at: Utc::now(),
            raw,
        }
    }

    pub fn status(&self) -> ResolvedStatus {
        ResolvedStatus {
            state: self.state,
            is_delete_marker: self.is_delete_marker,
        }
    }
}

/// Three-way display contract for a status badge.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Badge {
    Latest,
    Deleted,
    Syncing,
    None,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::Latest => "Latest",
            Badge::Deleted => "Deleted",
            Badge::Syncing => "Syncing…",
            Badge::None => "",
        }
    }
}

impl From<ResolvedStatus> for Badge {
    fn from(status: ResolvedStatus) -> Self {
        match status.state {
            ReplicationState::Latest if status.is_delete_marker => Badge::Deleted,
            ReplicationState::Latest => Badge::Latest,
            ReplicationState::Deleted => Badge::Deleted,
            ReplicationState::Outdated => Badge::Syncing,
            ReplicationState::Unknown => Badge::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::consistency::{VersionBrief, VersionKind, ZoneReport};

    fn zone(name: &str, state: ReplicationState, kind: Option<VersionKind>) -> ZoneReport {
        ZoneReport {
            zone: name.to_string(),
            state,
            latest: kind.map(|kind| VersionBrief {
                kind,
                version_id: None,
                etag: None,
                last_modified: None,
                size: None,
                is_latest: true,
            }),
            error: None,
        }
    }

    #[test]
    fn test_badge_labels() {
        let latest = ResolvedStatus {
            state: ReplicationState::Latest,
            is_delete_marker: false,
        };
        let deleted = ResolvedStatus {
            is_delete_marker: true,
            ..latest
        };
        let outdated = ResolvedStatus {
            state: ReplicationState::Outdated,
            is_delete_marker: false,
        };

        assert_eq!(latest.badge().label(), "Latest");
        assert_eq!(deleted.badge().label(), "Deleted");
        assert_eq!(outdated.badge().label(), "Syncing…");
        assert_eq!(ResolvedStatus::UNKNOWN.badge().label(), "");
    }

    #[test]
    fn test_record_takes_first_matching_zone() {
        let report = ConsistencyReport {
            per_zone: vec![
                zone("z2", ReplicationState::Outdated, Some(VersionKind::Version)),
                zone("z1", ReplicationState::Latest, Some(VersionKind::DeleteMarker)),
                zone("z1", ReplicationState::Outdated, Some(VersionKind::Version)),
            ],
            ..Default::default()
        };

        let record = StatusRecord::from_report("a.txt", "z1", report);
        assert_eq!(record.state, ReplicationState::Latest);
        assert!(record.is_delete_marker);
        assert_eq!(record.status().badge(), Badge::Deleted);
    }

    #[test]
    fn test_record_without_matching_zone_is_unknown() {
        let report = ConsistencyReport {
            per_zone: vec![zone("z2", ReplicationState::Latest, None)],
            ..Default::default()
        };

        let record = StatusRecord::from_report("a.txt", "z1", report);
        assert_eq!(record.status(), ResolvedStatus::UNKNOWN);
    }
}
