//! pit-daemon entry point.
//!
//! Intentionally thin: tracing setup, shared state, middleware, serve. All
//! route handlers live in `routes.rs`; all shared state in `state.rs`.
//!
//! The broker wired here is the deterministic paper adapter; live broker
//! transports are external collaborators plugged in through the same
//! [`pit_supervisor::BrokerFactory`] seam.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use pit_broker_paper::PaperBroker;
use pit_daemon::{routes, state};
use pit_engine::SystemClock;
use pit_schemas::MICROS_SCALE;
use pit_strategy::builtin_registry;
use pit_supervisor::{Supervisor, SupervisorConfig};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_dir = std::env::var("PIT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("accounts"));

    let paper_balance_micros = std::env::var("PIT_PAPER_BALANCE")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(10_000)
        * MICROS_SCALE;

    let supervisor = Arc::new(Supervisor::new(
        Arc::new(builtin_registry()),
        Arc::new(SystemClock),
        SupervisorConfig::default(),
        Box::new(move |_cfg| Box::new(PaperBroker::new(paper_balance_micros))),
    ));
    let watchdog = Arc::clone(&supervisor).spawn_watchdog();

    let shared = Arc::new(state::AppState::new(supervisor, config_dir));
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8790)));
    info!("pit-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    watchdog.abort();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("PIT_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
