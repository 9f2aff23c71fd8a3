//! # HTTP API
//!
//! axum router over the task store.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/`, `/health`, `/api/health` | Liveness |
//! | `GET` | `/api/tasks` | List (filters: `userId`, `status`, `priority`, `course`, `q`) |
//! | `POST` | `/api/tasks` | Create |
//! | `GET` `PUT` `DELETE` | `/api/tasks/{id}` | Fetch, partial update, delete |
//! | `GET` | `/api/tasks/stats` | Student dashboard counters |
//! | `GET` | `/api/tasks/kanban` | Board columns |
//! | `GET` | `/api/analytics/system` | Admin totals |
//! | `GET` | `/api/analytics/courses` | Per-course rows (`limit` for the top N) |
//! | `GET` | `/api/analytics/users` | Per-user activity (`limit` for the most recent N) |
//! | `GET` | `/api/analytics/grading` | Submitted tasks waiting for a grade |
//! | `GET` | `/api/analytics/performance` | Weekly activity and growth (`weeks`, default 6) |
//! | `POST` | `/api/auth/login`, `/api/auth/register` | Development stubs |
//!
//! Store calls are synchronous and may touch disk, so handlers run them on
//! tokio's blocking pool through [`AppState::read`] and [`AppState::write`].

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::config::{BoxedStore, ConfigError, ServerConfig};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use taskboard_core::StoreError;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Store shared by all handlers. Reads run concurrently, writes are exclusive.
pub type SharedStore = Arc<RwLock<BoxedStore>>;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl AppState {
    /// Wrap a store. `rate_limit_per_second == 0` disables rate limiting.
    pub fn new(store: BoxedStore, rate_limit_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(rate_limit_per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self {
            store: Arc::new(RwLock::new(store)),
            limiter,
        }
    }

    /// Run a read-only store call on the blocking pool.
    pub async fn read<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&BoxedStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let guard = store.read().map_err(|_| ApiError::lock_poisoned())?;
            Ok(f(&guard)?)
        })
        .await?
    }

    /// Run a mutating store call on the blocking pool.
    pub async fn write<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut BoxedStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let mut guard = store.write().map_err(|_| ApiError::lock_poisoned())?;
            Ok(f(&mut guard)?)
        })
        .await?
    }
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let over_budget = state
        .limiter
        .as_ref()
        .is_some_and(|limiter| limiter.check().is_err());
    if over_budget {
        tracing::warn!(path = %request.uri().path(), "request rejected by rate limiter");
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the application router.
pub fn create_router(state: AppState, config: &ServerConfig) -> Result<Router, ConfigError> {
    let cors = cors_layer(config.origin_headers()?);

    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::api_health))
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route("/api/tasks/stats", get(handlers::task_stats))
        .route("/api/tasks/kanban", get(handlers::task_kanban))
        .route(
            "/api/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/api/analytics/system", get(handlers::system_analytics))
        .route("/api/analytics/courses", get(handlers::course_analytics))
        .route("/api/analytics/users", get(handlers::user_analytics))
        .route("/api/analytics/grading", get(handlers::grading_queue))
        .route(
            "/api/analytics/performance",
            get(handlers::performance_analytics),
        )
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(config.body_limit_bytes)),
        )
        .with_state(state);

    Ok(router)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, store: BoxedStore) -> std::io::Result<()> {
    let invalid = |e: ConfigError| std::io::Error::new(std::io::ErrorKind::InvalidInput, e);

    let addr = config.socket_addr().map_err(invalid)?;
    let state = AppState::new(store, config.rate_limit_per_second);
    let app = create_router(state, config).map_err(invalid)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "taskboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
