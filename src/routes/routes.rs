//! Defines routes for the replication-status API used by the browser UI.
//!
//! ## Structure
//! - **Health**
//!   - `GET  /healthz`, `GET /readyz`
//!
//! - **Status**
//!   - `PUT  /view` — set zone, prefix and visible keys
//!   - `POST /status/resolve` — resolve statuses for a batch of keys
//!   - `GET|DELETE /status/record?key=` — inspect or drop one cached status
//!
//! - **Polling**
//!   - `GET  /polling` — latest snapshot
//!   - `POST /polling/enable`, `POST /polling/disable`
//!
//! - **Session**
//!   - `POST /mutations/complete` — post-upload/delete hook
//!   - `POST /session/logout`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        status_handlers::{
            disable_polling, enable_polling, get_polling, get_record, invalidate_record, logout,
            mutation_complete, put_view, resolve_statuses,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for the status API.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // status resolution
        .route("/view", put(put_view))
        .route("/status/resolve", post(resolve_statuses))
        .route("/status/record", get(get_record).delete(invalidate_record))
        // auto-refresh
        .route("/polling", get(get_polling))
        .route("/polling/enable", post(enable_polling))
        .route("/polling/disable", post(disable_polling))
        // session
        .route("/mutations/complete", post(mutation_complete))
        .route("/session/logout", post(logout))
}
