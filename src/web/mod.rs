// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP surface.
//!
//! | Method | Path                       | Body / query                        |
//! |--------|----------------------------|-------------------------------------|
//! | GET    | `/countries`               | `?limit=&sortBy=&orderBy=`          |
//! | GET    | `/countries/{name}`        |                                     |
//! | POST   | `/countries/{name}/images` | multipart `file`, `title`, `description` |
//! | GET    | `/countries/{name}/images` |                                     |
//! | GET    | `/health`                  | always `{"status": "ok"}`           |
//! | GET    | `/ready`                   | store and cache reachability        |

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::service::CountryService;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CountryService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/countries", get(handlers::list_countries))
        .route("/countries/{name}", get(handlers::get_country))
        .route(
            "/countries/{name}/images",
            get(handlers::list_images).post(handlers::upload_image),
        )
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` flips to `true` or its sender is dropped.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
}
