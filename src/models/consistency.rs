//! Wire model of the `/consistency/check` report.

use serde::{Deserialize, Serialize};

use crate::models::status::ReplicationState;

/// Cross-zone report for a single object key.
///
/// Returned by the storage browser backend. Only `per_zone` drives status
/// resolution; the remaining fields are kept so the raw report can be shown
/// alongside a cached status.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ConsistencyReport {
    /// True when every zone's latest non-delete version carries the same ETag.
    #[serde(default)]
    pub consistent: bool,

    /// One entry per configured zone.
    #[serde(default)]
    pub per_zone: Vec<ZoneReport>,

    /// Zone holding the newest downloadable version, if any.
    #[serde(default)]
    pub recommended_download_zone: Option<String>,

    /// Whether the zone the UI is looking at has a delete marker on top.
    #[serde(default)]
    pub current_zone_latest_is_delete_marker: bool,
}

impl ConsistencyReport {
    /// First entry whose zone name matches exactly.
    pub fn zone(&self, name: &str) -> Option<&ZoneReport> {
        self.per_zone.iter().find(|z| z.zone == name)
    }
}

/// Replication state of an object in one zone.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ZoneReport {
    pub zone: String,

    #[serde(default)]
    pub state: ReplicationState,

    /// Newest entry in this zone (a version or a delete marker).
    #[serde(default)]
    pub latest: Option<VersionBrief>,

    /// Set when the backend could not list versions in this zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ZoneReport {
    pub fn latest_is_delete_marker(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|brief| brief.kind == VersionKind::DeleteMarker)
    }
}

/// Condensed description of a version-listing entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VersionBrief {
    #[serde(rename = "type")]
    pub kind: VersionKind,

    #[serde(default)]
    pub version_id: Option<String>,

    #[serde(default)]
    pub etag: Option<String>,

    /// ISO-8601 timestamp as formatted by the backend.
    #[serde(default)]
    pub last_modified: Option<String>,

    #[serde(default)]
    pub size: Option<i64>,

    #[serde(default)]
    pub is_latest: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionKind {
    #[serde(alias = "Object")]
    Version,
    DeleteMarker,
    #[serde(other)]
    Other,
}
