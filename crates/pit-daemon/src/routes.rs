//! Axum router and all HTTP handlers for pit-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)`-free on purpose: the
//! scenario tests in `tests/` compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use pit_schemas::AccountId;
use pit_supervisor::SupervisorError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{ErrorResponse, HealthResponse, OkResponse},
    state::AppState,
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware (CORS, tracing) is not applied here; `main.rs` attaches it
/// after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/accounts", get(list_accounts))
        .route("/v1/accounts/:id/start", post(start_account))
        .route("/v1/accounts/:id/stop", post(stop_account))
        .route("/v1/accounts/:id/kill", post(kill_account))
        .route("/v1/accounts/:id/ack", post(ack_account))
        .route("/v1/accounts/:id/status", get(account_status))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

fn error_response(code: StatusCode, error: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

async fn list_accounts(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let records = st.supervisor.list().await;
    (StatusCode::OK, Json(records))
}

/// Start a session from the account's config file.
///
/// 400 on a missing/invalid config (the error chain is the body), 409 when
/// a live session already exists.
async fn start_account(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let path = st.config_path(&id);
    let config = match pit_config::load_account_config(&path) {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{e:#}")),
    };
    if config.account.as_str() != id {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "config file {} declares account {}, not {id}",
                path.display(),
                config.account
            ),
        );
    }

    match st.supervisor.start(config).await {
        Ok(()) => {
            info!(account = %id, "start accepted");
            (
                StatusCode::OK,
                Json(OkResponse {
                    ok: true,
                    account: id,
                }),
            )
                .into_response()
        }
        Err(e @ SupervisorError::AlreadyRunning(_)) => {
            error_response(StatusCode::CONFLICT, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Graceful stop. 504 when the engine missed the stop timeout; the record
/// stays STOPPING and the operator decides whether to escalate to kill.
async fn stop_account(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let account = AccountId::new(id.clone());
    match st.supervisor.stop(&account).await {
        Ok(()) => (
            StatusCode::OK,
            Json(OkResponse {
                ok: true,
                account: id,
            }),
        )
            .into_response(),
        Err(e @ SupervisorError::UnknownAccount(_)) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e @ SupervisorError::StopTimeout(_)) => {
            error_response(StatusCode::GATEWAY_TIMEOUT, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Unconditional force-terminate. Idempotent: 200 even for already-dead or
/// never-started accounts.
async fn kill_account(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let account = AccountId::new(id.clone());
    st.supervisor.kill(&account).await;
    info!(account = %id, "kill executed");
    (
        StatusCode::OK,
        Json(OkResponse {
            ok: true,
            account: id,
        }),
    )
        .into_response()
}

async fn ack_account(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let account = AccountId::new(id.clone());
    match st.supervisor.acknowledge(&account).await {
        Ok(()) => (
            StatusCode::OK,
            Json(OkResponse {
                ok: true,
                account: id,
            }),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e.to_string()),
    }
}

async fn account_status(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let account = AccountId::new(id);
    match st.supervisor.status(&account).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no status for this account"),
    }
}

/// SSE stream over the event bus: `status` and `heartbeat` events. Delivery
/// is best-effort; consumers key on the newest per-account `seq`.
async fn stream(
    State(st): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = st.bus.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(bus_msg) => {
                let name = match &bus_msg {
                    crate::state::BusMsg::Heartbeat { .. } => "heartbeat",
                    crate::state::BusMsg::Status(_) => "status",
                };
                match Event::default().event(name).json_data(&bus_msg) {
                    Ok(event) => Some(Ok(event)),
                    Err(_) => None,
                }
            }
            // Lagged viewers just miss intermediate snapshots.
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
