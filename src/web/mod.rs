mod hashtag;
mod post;
mod posts;
mod user;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::storage::ImageStore;

/// Page size for post listings.
pub const POSTS_PAGE_SIZE: i64 = 10;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub images: Arc<dyn ImageStore>,
}

/// `?lastId=` cursor shared by the post listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(rename = "lastId")]
    last_id: Option<i64>,
}

impl PageParams {
    /// The cursor, with `0` meaning "start from the newest post".
    #[must_use]
    pub fn cursor(&self) -> Option<i64> {
        self.last_id.filter(|&id| id > 0)
    }
}

/// Start the web server and run until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state)?;

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
///
/// # Errors
///
/// Returns an error if the configured CORS origin is not a valid header value.
pub fn create_app(state: AppState) -> Result<Router> {
    let uploads_dir = state.config.uploads_dir.clone();
    info!(uploads_dir = %uploads_dir.display(), "Serving uploaded files");

    let cors = cors_layer(&state.config)?;
    let upload_body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(post::MAX_IMAGES_PER_UPLOAD);

    Ok(Router::new()
        .route("/", get(index))
        .route("/healthz", get(health))
        .nest("/post", post::router(upload_body_limit))
        .nest("/posts", posts::router())
        .nest("/user", user::router())
        .nest("/hashtag", hashtag::router())
        .fallback_service(ServeDir::new(uploads_dir))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(&config.cors_origin)
        .with_context(|| format!("Invalid CORS origin: {}", config.cors_origin))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60)))
}

async fn index() -> &'static str {
    "hello nodebird"
}

async fn health() -> &'static str {
    "OK"
}
