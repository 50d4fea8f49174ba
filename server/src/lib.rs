//! Ticket-management backend.
//!
//! Accepts ticket records over a JSON API or as bulk CSV uploads (whole files
//! or staged chunks), stores them in a document store, and serves the CRUD
//! and barcode-lookup endpoints a box-office scanning tool needs.
//!
//! The CSV pipeline runs upload -> chunk reassembly -> decode -> batched
//! bulk insert, with the staging area cleared on every exit path. A separate
//! `pinger` binary keeps the deployed host awake.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod decode;
pub mod error;
pub mod import;
pub mod memory;
pub mod models;
pub mod routes;
pub mod staging;
pub mod state;
pub mod storage;

use routes::{
    create_ticket_handler, delete_ticket_handler, import_chunks_handler, import_handler,
    list_tickets_handler, list_users_handler, ticket_by_barcode_handler, update_ticket_handler,
    upload_chunk_handler, user_by_username_handler,
};
use state::AppState;

/// Uploads larger than this are refused outright.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/import", post(import_handler))
        .route("/upload", post(upload_chunk_handler))
        .route("/import-chunks", post(import_chunks_handler))
        .route(
            "/tickets",
            get(list_tickets_handler).post(create_ticket_handler),
        )
        .route(
            "/tickets/{id}",
            put(update_ticket_handler).delete(delete_ticket_handler),
        )
        .route("/ticket/{barcode}", get(ticket_by_barcode_handler))
        .route("/api/users", get(list_users_handler))
        .route("/api/users/{username}", get(user_by_username_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
