//! stereo-quiz library - stereotype annotation survey service
//!
//! Serves the participant flow (entry form, one page per target region,
//! completion page) and the unauthenticated admin results view.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use stereo_common::DefinitionsStore;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pages;
pub mod session;

use session::SessionStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Results database pool
    pub db: SqlitePool,
    /// Read-only stereotype definitions
    pub definitions: Arc<DefinitionsStore>,
    /// In-progress and completed quiz sessions
    pub sessions: SessionStore,
    /// Target regions each participant annotates (K)
    pub regions_per_participant: usize,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, definitions: DefinitionsStore, regions_per_participant: usize) -> Self {
        Self {
            db,
            definitions: Arc::new(definitions),
            sessions: SessionStore::new(),
            regions_per_participant,
        }
    }

    /// Discard sessions idle for longer than `ttl`
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.sessions = SessionStore::with_ttl(ttl);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::entry_routes())
        .merge(api::quiz_routes())
        .merge(api::done_routes())
        .merge(api::admin_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
