//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the session and the consistency capability

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that reports:
/// 1. Whether a session is held (no refresh is attempted).
/// 2. Whether the backend still offers the consistency check.
///
/// HTTP 503 when no session is held. A missing capability is reported but
/// does not fail readiness; statuses simply resolve to `Unknown`.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let session_ok = state.sessions.current_session().await.is_some();
    let capability_ok = state.synchronizer().capability().is_available();

    let mut checks = HashMap::new();
    checks.insert(
        "session",
        CheckStatus {
            ok: session_ok,
            error: (!session_ok).then(|| "no active session".to_string()),
        },
    );
    checks.insert(
        "consistency_check",
        CheckStatus {
            ok: capability_ok,
            error: (!capability_ok).then(|| "endpoint not offered by backend".to_string()),
        },
    );

    let body = ReadyResponse {
        status: if session_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if session_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
