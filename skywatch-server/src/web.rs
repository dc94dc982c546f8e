//! REST API
//!
//! The one surface clients poll:
//!
//! - `GET /v1/violations?since=<cursor>` - violator delta (or full
//!   snapshot when the cursor is absent, unparseable or stale)
//! - `GET /v1/zone` - the configured no-fly zone
//! - `GET /v1/healthz` - liveness and engine counters
//!
//! Sync never fails: the worst case for a confused client is a full
//! snapshot. Everything serializes as camelCase JSON.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_graceful_shutdown::SubsystemHandle;

use skywatch_core::{SyncResponse, Zone};

use crate::shared::SharedEngine;
use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/violations", get(violations))
        .route("/v1/zone", get(zone))
        .route("/v1/healthz", get(healthz))
        .with_state(state)
}

/// Serve the API until shutdown is requested.
pub async fn serve(
    subsys: SubsystemHandle,
    state: AppState,
    addr: std::net::SocketAddr,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("web: listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { subsys.on_shutdown_requested().await })
        .await?;

    log::debug!("web: shutdown");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SyncQuery {
    /// Kept as a string so a garbage cursor degrades to a full snapshot
    /// instead of a 400; clients recover without special casing.
    since: Option<String>,
}

async fn violations(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> Json<SyncResponse> {
    let cursor = query.since.as_deref().and_then(|s| s.parse::<u64>().ok());
    Json(state.engine.sync(cursor))
}

async fn zone(State(state): State<AppState>) -> Json<Zone> {
    Json(state.engine.zone())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    tracked: usize,
    pending_lookups: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "up",
        tracked: state.engine.tracked(),
        pending_lookups: state.engine.pending_lookups(),
    })
}
