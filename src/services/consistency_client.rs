//! Client for the backend's `/consistency/check` operation.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::{models::consistency::ConsistencyReport, services::session::SessionProvider};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("consistency check is not supported by the backend")]
    CapabilityNotFound,
    #[error("session lost")]
    SessionLost,
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Checks one key against one zone.
#[async_trait]
pub trait ConsistencyCheck: Send + Sync {
    async fn check(&self, key: &str, current_zone: &str) -> SyncResult<ConsistencyReport>;
}

/// HTTP implementation backed by `reqwest`.
///
/// Does not touch any cache; every call is one request.
pub struct ConsistencyClient {
    http: reqwest::Client,
    base_url: String,
    bucket: Option<String>,
    sessions: Arc<dyn SessionProvider>,
}

impl ConsistencyClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        bucket: Option<String>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket,
            sessions,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/consistency/check", self.base_url)
    }
}

#[async_trait]
impl ConsistencyCheck for ConsistencyClient {
    async fn check(&self, key: &str, current_zone: &str) -> SyncResult<ConsistencyReport> {
        let session = self
            .sessions
            .current_session()
            .await
            .ok_or(SyncError::SessionLost)?;

        let mut query = vec![("key", key), ("currentZone", current_zone)];
        if let Some(bucket) = self.bucket.as_deref() {
            query.push(("bucket", bucket));
        }

        debug!("consistency check key={} zone={}", key, current_zone);
        let resp = self
            .http
            .get(self.endpoint())
            .bearer_auth(&session.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;

        classify_status(resp.status())?;

        resp.json::<ConsistencyReport>()
            .await
            .map_err(|err| SyncError::Transport(format!("invalid report: {}", err)))
    }
}

/// Map an HTTP status onto the error taxonomy. 404 means the endpoint
/// itself is missing.
fn classify_status(status: StatusCode) -> SyncResult<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(SyncError::CapabilityNotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::SessionLost),
        other => Err(SyncError::Transport(format!("HTTP {}", other))),
    }
}
