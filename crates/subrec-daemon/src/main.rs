//! subrec-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config, builds
//! the shared state, spawns background tasks, wires middleware, and starts
//! the HTTP server. All route handlers live in `routes.rs`; all shared state
//! types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use subrec_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, resolve_secrets,
    ConfigSurface, LoadedConfig, UnusedKeyPolicy,
};
use subrec_daemon::{
    remote::{HttpSubscriptionClient, UnconfiguredSubscriptionClient},
    routes, state,
};
use subrec_runtime::SubscriptionClient;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config_from_env()?;
    let report = report_unused_keys(ConfigSurface::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config contains keys the daemon ignores");
    }
    let settings = loaded.settings()?;
    let secrets = resolve_secrets(&loaded.config_json)?;
    info!(
        config_hash = %loaded.config_hash,
        categories = ?settings.categories,
        state_dir = %settings.state_dir.display(),
        "config loaded"
    );

    let subscriptions: Arc<dyn SubscriptionClient> =
        match (settings.remote.as_ref(), secrets.remote_auth_token) {
            (Some(remote), Some(token)) => {
                info!(base_url = %remote.base_url, "remote subscription client configured");
                Arc::new(HttpSubscriptionClient::new(remote.base_url.clone(), token)?)
            }
            _ => {
                warn!("no remote subscription server configured; remote queries will fail soft");
                Arc::new(UnconfiguredSubscriptionClient)
            }
        };

    let shared = Arc::new(state::AppState::new(&settings, subscriptions));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_pass_forwarder(Arc::clone(&shared));
    state::spawn_triggers(Arc::clone(&shared));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or_else(|| settings.daemon_bind.as_deref()?.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("subrec-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `SUBREC_CONFIG` holds comma-separated YAML paths in merge order. Unset
/// means "all defaults".
fn load_config_from_env() -> Result<LoadedConfig> {
    match std::env::var("SUBREC_CONFIG") {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            load_layered_yaml(&paths).context("load SUBREC_CONFIG failed")
        }
        _ => load_layered_yaml_from_strings(&[]),
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SUBREC_DAEMON_ADDR").ok()?.parse().ok()
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
