//! Admin API.
//!
//! Served on its own bind address, every route behind bearer-token auth.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::governor::Governor;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub governor: Governor,
    pub api_key: Arc<str>,
    /// File re-read by `POST /admin/reload`.
    pub config_path: Option<PathBuf>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/enable", post(enable))
        .route("/admin/disable", post(disable))
        .route("/admin/cache", delete(clear_cache))
        .route("/admin/circuits/reset", post(reset_circuits))
        .route("/admin/reload", post(reload))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
