//! HTTP handlers the browser UI uses to drive status resolution and polling.

use crate::{
    errors::AppError,
    models::{
        consistency::ConsistencyReport,
        status::{ReplicationState, ResolvedStatus, StatusMap},
        view::ViewContext,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /status/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveReq {
    pub zone: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Status of one key as rendered by the UI.
#[derive(Debug, Serialize, PartialEq)]
pub struct StatusView {
    pub state: ReplicationState,
    pub is_delete_marker: bool,
    pub badge: &'static str,
}

impl From<ResolvedStatus> for StatusView {
    fn from(status: ResolvedStatus) -> Self {
        Self {
            state: status.state,
            is_delete_marker: status.is_delete_marker,
            badge: status.badge().label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusesResponse {
    pub statuses: HashMap<String, StatusView>,
}

/// Query of `GET|DELETE /status/record`.
#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub key: String,
}

/// A cached status together with the report it came from.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub key: String,
    #[serde(flatten)]
    pub status: StatusView,
    pub observed_at: DateTime<Utc>,
    pub report: ConsistencyReport,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct PollingResponse {
    pub active: bool,
    pub changed: bool,
    pub cycle: u64,
    pub session_lost: bool,
    pub statuses: HashMap<String, StatusView>,
}

fn render(statuses: StatusMap) -> HashMap<String, StatusView> {
    statuses
        .into_iter()
        .map(|(key, status)| (key, StatusView::from(status)))
        .collect()
}

async fn polling_response(state: &AppState, changed: bool) -> PollingResponse {
    let snap = state.poller.snapshot();
    PollingResponse {
        active: state.poller.is_active().await,
        changed,
        cycle: snap.cycle,
        session_lost: snap.session_lost,
        statuses: render(snap.statuses),
    }
}

/// `PUT /view` — record what the user is looking at.
pub async fn put_view(
    State(state): State<AppState>,
    Json(view): Json<ViewContext>,
) -> Result<Json<ViewResponse>, AppError> {
    if view.zone.is_empty() {
        return Err(AppError::bad_request("missing 'zone'"));
    }
    let cleared = state.synchronizer().set_view(view).await;
    Ok(Json(ViewResponse { cleared }))
}

/// `POST /status/resolve` — resolve a batch of keys against one zone.
pub async fn resolve_statuses(
    State(state): State<AppState>,
    Json(req): Json<ResolveReq>,
) -> Result<Json<StatusesResponse>, AppError> {
    if req.zone.is_empty() {
        return Err(AppError::bad_request("missing 'zone'"));
    }
    let statuses = state.synchronizer().resolve(&req.keys, &req.zone).await?;
    Ok(Json(StatusesResponse {
        statuses: render(statuses),
    }))
}

/// `GET /status/record?key=` — cached record, including the raw report
/// (recommended download zone, per-zone versions).
pub async fn get_record(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordResponse>, AppError> {
    let record = state
        .synchronizer()
        .cached(&query.key)
        .await
        .ok_or_else(|| AppError::not_found(format!("no fresh status for `{}`", query.key)))?;

    Ok(Json(RecordResponse {
        key: record.key.clone(),
        status: StatusView::from(record.status()),
        observed_at: record.observed_at,
        report: record.raw.clone(),
    }))
}

/// `DELETE /status/record?key=` — drop one cached status so the next pass
/// checks it again.
pub async fn invalidate_record(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> StatusCode {
    state.synchronizer().invalidate(&query.key).await;
    StatusCode::NO_CONTENT
}

/// `GET /polling` — latest snapshot from the refresh loop.
pub async fn get_polling(State(state): State<AppState>) -> Json<PollingResponse> {
    Json(polling_response(&state, false).await)
}

/// `POST /polling/enable`
pub async fn enable_polling(State(state): State<AppState>) -> Json<PollingResponse> {
    let changed = state.poller.enable().await;
    Json(polling_response(&state, changed).await)
}

/// `POST /polling/disable`
pub async fn disable_polling(State(state): State<AppState>) -> Json<PollingResponse> {
    let changed = state.poller.disable().await;
    Json(polling_response(&state, changed).await)
}

/// `POST /mutations/complete` — run after an upload or delete finished.
pub async fn mutation_complete(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.poller.after_mutation().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /session/logout`
pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.poller.logout().await;
    StatusCode::NO_CONTENT
}
