//! Documentation of an anonymous meeting voting platform.
//!
//!
//!
//! # General Infrastructure
//! - One process serves the JSON API, the ballot pages, the static consoles and both WebSocket feeds
//! - State lives in memory, a restart drops every session
//! - Container listens on 8000, a reverse proxy in front terminates TLS if needed
//!
//!
//!
//! # Flow
//!
//! - Admin creates a session with the member roster (`POST /api/admin/create-session`)
//! - Admin starts a round on a topic (`POST /api/admin/start-voting/{session_id}`)
//! - Response holds one link per member, the admin hands them out over whatever channel the contact field names
//! - Projector shows topic, presenter and a countdown as soon as the round starts
//! - Members open `/vote?token=...`, pick for, against or abstain, confirm
//! - Admin console sees the live tally after every vote
//! - Round ends by timer or by `POST /api/admin/end-voting/{session_id}`
//! - Unused tokens count as abstaining, final results go to admin and projector
//!
//!
//!
//! # Anonymity
//!
//! **Goal**: nobody, the operator included, can link a vote to a member after the fact.
//!
//! - Token to member mapping exists only to mark the token used
//! - Vote records keep the choice, a timestamp and an HMAC of the token keyed by `SECRET_KEY`
//! - Tokens are dropped when the next round of the session starts
//! - Tokens expire `TOKEN_EXPIRE_BUFFER_MINUTES` after the round deadline
//!
//!
//!
//! # Notes
//!
//! ## Redis / PostgreSQL
//! The storage is a single in-memory map behind an async lock. Meetings are small, a few hundred members at most,
//! and a round lasts minutes. Persistence would only matter across restarts in the middle of a meeting, which we
//! accept losing.
//!
//! ## Round numbers
//! Each round has a process-wide sequence number. The auto-close timer carries it, so a timer from an earlier
//! round that was ended by hand cannot close the round that replaced it.
//!
//!
//!
//! # Setup
//!
//! Provision the working directory.
//! ```sh
//! cargo run -p setup
//! ```
//!
//! Start and stop.
//! ```sh
//! ./start_server.sh
//! ./stop_server.sh
//! ```
//!
//! Run one scripted round against a live server.
//! ```sh
//! cargo run -p tester
//! ```
//!
//!
//!
//! # Just
//!
//! Example workflow
//! ```sh
//! just setup
//! just start
//! just stop
//! ```
//!
//! Container
//! ```sh
//! just image
//! just run
//! ```
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub mod broadcast;
pub mod config;
pub mod error;
pub mod models;
pub mod pages;
pub mod routes;
pub mod state;
pub mod storage;
pub mod utils;

use broadcast::{admin_socket, projector_socket};
use config::Config;
use error::ServerError;
use routes::{
    create_session_handler, end_voting_handler, start_voting_handler, status_handler,
    vote_handler, vote_page_handler,
};
use state::AppState;

pub async fn start_server() -> Result<(), ServerError> {
    let config = Config::load()?;
    init_tracing(&config);
    config.summary();

    info!("Initializing state...");
    let state = AppState::new(config)?;

    info!("Starting server...");
    let app = app(state.clone());

    let address = format!("{}:{}", state.config.host, state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let static_dir = &state.config.static_dir;

    Router::new()
        .route("/api/admin/create-session", post(create_session_handler))
        .route(
            "/api/admin/start-voting/{session_id}",
            post(start_voting_handler),
        )
        .route("/api/admin/end-voting/{session_id}", post(end_voting_handler))
        .route("/api/vote", post(vote_handler))
        .route("/api/vote-page", get(vote_page_handler))
        .route("/vote", get(vote_page_handler))
        .route("/api/sessions/{session_id}/status", get(status_handler))
        .route("/ws/admin", get(admin_socket))
        .route("/ws/projector", get(projector_socket))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route_service("/admin", ServeFile::new(static_dir.join("admin.html")))
        .route_service(
            "/projector",
            ServeFile::new(static_dir.join("projector.html")),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}

fn cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

/// Stdout always, plus a plain-text copy in `LOG_FILE` when it can be opened.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    let (file_layer, file_error) = match config.log_file.as_deref().map(open_log_file) {
        Some(Ok(file)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    // Already initialized is fine, tests and embedders may install their own.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();

    if let Some(e) = file_error {
        warn!("Failed to open log file, logging to stdout only: {e}");
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    OpenOptions::new().create(true).append(true).open(path)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
