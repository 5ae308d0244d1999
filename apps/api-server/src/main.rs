//! api-server — HTTP API for the guest check-in registry.
//!
//! Serves the registration endpoints the check-in frontend drives:
//! - Persistence: remote document store (online mode) when a connection
//!   descriptor is available and reachable at startup, SQLite (offline mode)
//!   otherwise. The decision is made once; `POST /api/reconnect` is the only
//!   way back online.
//! - CORS: configurable via CORS_ALLOW_ORIGIN (origin string) for the
//!   frontend.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # with a remote store descriptor
//! DOCSTORE_CONFIG=./config/docstore.json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use docstore::{DocstoreClient, DocstoreConfig};
use domain::id::TimestampIds;
use domain::service::Registry;
use domain::view::RECENT_LIMIT;
use domain::{csv, validate, Clock, CoreError, GuestId, GuestRecord, GuestStore, NewGuest};
use serde::{Deserialize, Serialize};
use sqlite_store::SqliteStore;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone)]
struct StdClock;

impl Clock for StdClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }

    fn local_stamp(&self, t: std::time::SystemTime) -> String {
        http_common::entry_stamp(t)
    }
}

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry<TimestampIds, StdClock>>,
    // The SQLite store doubles as the flag space (configured marker, saved
    // remote config), shared with the registry's offline backend.
    flags: Arc<SqliteStore>,
    remote_config_path: Arc<std::path::PathBuf>,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);

    if let Some(dir) = cfg.db_path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let local = match SqliteStore::new(&cfg.db_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("failed to open local store at {}: {e}", cfg.db_path.display());
            std::process::exit(1);
        }
    };

    let registry = Arc::new(build_registry(&cfg, &local));
    let state = AppState {
        registry,
        flags: Arc::clone(&local),
        remote_config_path: Arc::new(cfg.remote_config_path.clone()),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/guests", post(register_guest).get(list_guests))
        .route("/api/guests/:id", axum::routing::delete(delete_guest))
        .route("/api/guests/clear", post(clear_guests))
        .route("/api/reconnect", post(reconnect))
        .route("/api/export.csv", get(export_csv))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state);

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app).await.expect("server error");
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

/// One-shot startup decision: online when a descriptor is available and the
/// remote store answers, offline otherwise. Never fatal.
fn build_registry(cfg: &config::Config, local: &Arc<SqliteStore>) -> Registry<TimestampIds, StdClock> {
    if let Some(remote_cfg) = load_remote_config(&cfg.remote_config_path, local) {
        match DocstoreClient::connect(remote_cfg.clone()) {
            Ok(client) => {
                match Registry::online(
                    Box::new(Arc::clone(local)),
                    Box::new(client),
                    TimestampIds::new(),
                    StdClock,
                ) {
                    Ok(registry) => {
                        remember_remote_config(local, &remote_cfg);
                        info!("connected to remote store - online mode");
                        return registry;
                    }
                    Err(e) => {
                        warn!(err = %e, "remote read failed, falling back to offline mode");
                    }
                }
            }
            Err(e) => {
                warn!(err = %e, "remote connect failed, falling back to offline mode");
            }
        }
    }
    offline_registry(local)
}

fn offline_registry(local: &Arc<SqliteStore>) -> Registry<TimestampIds, StdClock> {
    match Registry::offline(Box::new(Arc::clone(local)), TimestampIds::new(), StdClock) {
        Ok((registry, warning)) => {
            if let Some(w) = warning {
                warn!(warning = %w, "local data recovered as empty");
            }
            info!("offline mode - local data");
            registry
        }
        Err(e) => {
            // Only reachable when the database itself is unusable
            eprintln!("failed to read local store: {e}");
            std::process::exit(1);
        }
    }
}

/// Resolve the connection descriptor: the config file first, then the copy
/// saved by a previous successful connection. `None` selects offline mode.
fn load_remote_config(path: &Path, flags: &SqliteStore) -> Option<DocstoreConfig> {
    match DocstoreConfig::from_file(path) {
        Ok(c) => Some(c),
        Err(file_err) => match flags.saved_remote_config() {
            Ok(Some(text)) => match DocstoreConfig::from_json(&text) {
                Ok(c) => {
                    info!("using previously saved remote config");
                    Some(c)
                }
                Err(e) => {
                    warn!(err = %e, "saved remote config is invalid");
                    None
                }
            },
            Ok(None) => {
                info!(err = %file_err, "no remote config; offline mode");
                None
            }
            Err(e) => {
                warn!(err = %e, "could not read saved remote config");
                None
            }
        },
    }
}

fn remember_remote_config(flags: &SqliteStore, remote_cfg: &DocstoreConfig) {
    match serde_json::to_string(remote_cfg) {
        Ok(text) => {
            if let Err(e) = flags.save_remote_config(&text) {
                warn!(err = %e, "could not save remote config");
            }
        }
        Err(e) => warn!(err = %e, "could not serialize remote config"),
    }
    if let Err(e) = flags.mark_configured() {
        warn!(err = %e, "could not set configured flag");
    }
}

#[derive(Deserialize)]
struct RegisterReq {
    name: String,
    #[serde(default)]
    phone: Option<String>,
    // Accepts a number or a raw form string; anything non-numeric counts as 0
    #[serde(default)]
    companions: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct GuestOut {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    companions: u32,
    created_at: String,
    entry_time: String,
}

#[derive(Serialize)]
struct StatusOut {
    mode: &'static str,
    configured: bool,
    total_guests: usize,
    total_companions: u64,
}

#[derive(Serialize)]
struct ListOut {
    guests: Vec<GuestOut>,
    total_guests: usize,
    total_companions: u64,
}

fn guest_to_out(guest: GuestRecord) -> GuestOut {
    GuestOut {
        id: guest.id.as_str().to_string(),
        name: guest.name.as_str().to_string(),
        phone: guest.phone,
        companions: guest.companions,
        created_at: http_common::system_time_to_rfc3339(guest.created_at),
        entry_time: guest.entry_time,
    }
}

fn companions_from_value(value: Option<&serde_json::Value>) -> u32 {
    match value {
        Some(serde_json::Value::Number(n)) => validate::parse_companions(Some(&n.to_string())),
        Some(serde_json::Value::String(s)) => validate::parse_companions(Some(s)),
        _ => 0,
    }
}

fn internal_error(e: &CoreError) -> axum::response::Response {
    error!(err = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(http_common::json_err("internal")),
    )
        .into_response()
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let mode = match state.registry.mode() {
        Ok(m) => m,
        Err(e) => return internal_error(&e),
    };
    let stats = match state.registry.stats() {
        Ok(s) => s,
        Err(e) => return internal_error(&e),
    };
    let configured = state.flags.is_configured().unwrap_or(false);
    Json(StatusOut {
        mode: mode.as_str(),
        configured,
        total_guests: stats.total_guests,
        total_companions: stats.total_companions,
    })
    .into_response()
}

async fn register_guest(
    State(state): State<AppState>,
    Json(body): Json<RegisterReq>,
) -> impl IntoResponse {
    let input = NewGuest {
        name: body.name,
        phone: body.phone,
        companions: companions_from_value(body.companions.as_ref()),
    };
    match state.registry.register(input) {
        Ok(guest) => {
            info!(id = %guest.id.as_str(), "register ok");
            (StatusCode::CREATED, Json(guest_to_out(guest))).into_response()
        }
        Err(CoreError::InvalidName(_)) => (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_error_with_message(
                "invalid_request",
                "name must not be empty",
            )),
        )
            .into_response(),
        Err(e) => internal_error(&e),
    }
}

async fn list_guests(State(state): State<AppState>) -> impl IntoResponse {
    let recent = match state.registry.recent(RECENT_LIMIT) {
        Ok(g) => g,
        Err(e) => return internal_error(&e),
    };
    let stats = match state.registry.stats() {
        Ok(s) => s,
        Err(e) => return internal_error(&e),
    };
    Json(ListOut {
        guests: recent.into_iter().map(guest_to_out).collect(),
        total_guests: stats.total_guests,
        total_companions: stats.total_companions,
    })
    .into_response()
}

async fn delete_guest(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> impl IntoResponse {
    let id = match GuestId::new(id) {
        Ok(i) => i,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(http_common::json_err("invalid_request")),
            )
                .into_response()
        }
    };
    match state.registry.remove(&id) {
        Ok(()) => {
            info!(id = %id.as_str(), "delete ok");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => internal_error(&e),
    }
}

async fn clear_guests(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.stats() {
        Ok(stats) if stats.total_guests == 0 => (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_error_with_message(
                "empty",
                "no guests to delete",
            )),
        )
            .into_response(),
        Ok(_) => match state.registry.clear_all() {
            Ok(()) => {
                info!("clear ok");
                Json(serde_json::json!({"cleared": true})).into_response()
            }
            Err(e) => internal_error(&e),
        },
        Err(e) => internal_error(&e),
    }
}

async fn reconnect(State(state): State<AppState>) -> impl IntoResponse {
    let Some(remote_cfg) = load_remote_config(&state.remote_config_path, &state.flags) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_error_with_message(
                "invalid_request",
                "no remote configuration available",
            )),
        )
            .into_response();
    };
    let connect_cfg = remote_cfg.clone();
    let result = state.registry.reconnect(move || {
        let client = DocstoreClient::connect(connect_cfg)?;
        Ok(Box::new(client) as Box<dyn GuestStore>)
    });
    match result {
        Ok(()) => {
            remember_remote_config(&state.flags, &remote_cfg);
            info!("reconnect ok - online mode");
            Json(serde_json::json!({"mode": "online"})).into_response()
        }
        Err(e) => {
            warn!(err = %e, "reconnect failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(http_common::json_error_with_message(
                    "offline",
                    &format!("{e}"),
                )),
            )
                .into_response()
        }
    }
}

async fn export_csv(State(state): State<AppState>) -> impl IntoResponse {
    let guests = match state.registry.guests() {
        Ok(g) => g,
        Err(e) => return internal_error(&e),
    };
    if guests.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_error_with_message(
                "empty",
                "no guests to export",
            )),
        )
            .into_response();
    }
    let body = csv::render(&guests);
    let filename = csv::filename(&http_common::export_date());
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companions_accepts_numbers_and_strings() {
        assert_eq!(
            companions_from_value(Some(&serde_json::json!(2))),
            2
        );
        assert_eq!(
            companions_from_value(Some(&serde_json::json!("3"))),
            3
        );
        assert_eq!(
            companions_from_value(Some(&serde_json::json!("abc"))),
            0
        );
        assert_eq!(
            companions_from_value(Some(&serde_json::json!(-5))),
            0
        );
        assert_eq!(companions_from_value(Some(&serde_json::Value::Null)), 0);
        assert_eq!(companions_from_value(None), 0);
    }
}
