use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::config::load_config;
use crate::governor::GovernorStats;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToggleResult {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct AdminError {
    pub error: String,
}

type AdminResult<T> = Result<Json<T>, (StatusCode, Json<AdminError>)>;

fn admin_error(status: StatusCode, error: impl ToString) -> (StatusCode, Json<AdminError>) {
    (
        status,
        Json(AdminError {
            error: error.to_string(),
        }),
    )
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let stats = state.governor.stats();
    let status = if stats.emergency_stopped {
        "emergency_stopped"
    } else if stats.enabled {
        "governing"
    } else {
        "disabled"
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<GovernorStats> {
    Json(state.governor.stats())
}

pub async fn enable(State(state): State<AdminState>) -> Json<ToggleResult> {
    state.governor.enable();
    Json(ToggleResult { enabled: true })
}

pub async fn disable(State(state): State<AdminState>) -> Json<ToggleResult> {
    state.governor.disable();
    Json(ToggleResult { enabled: false })
}

pub async fn clear_cache(State(state): State<AdminState>) -> Json<ClearResult> {
    let cleared = state.governor.stats().cache_stats.entries;
    state.governor.clear_cache();
    Json(ClearResult { cleared })
}

pub async fn reset_circuits(State(state): State<AdminState>) -> Json<ClearResult> {
    let cleared = state.governor.stats().open_circuits.len();
    state.governor.reset_circuits();
    Json(ClearResult { cleared })
}

/// Re-read the config file and swap in its governor policy.
pub async fn reload(State(state): State<AdminState>) -> AdminResult<serde_json::Value> {
    let Some(path) = state.config_path.as_deref() else {
        return Err(admin_error(
            StatusCode::CONFLICT,
            "service was started without a config file",
        ));
    };

    let config = load_config(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Config reload rejected");
        admin_error(StatusCode::UNPROCESSABLE_ENTITY, e)
    })?;

    state.governor.reconfigure(config.governor).map_err(|errors| {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        admin_error(StatusCode::UNPROCESSABLE_ENTITY, message)
    })?;

    tracing::info!(path = %path.display(), "Config reloaded");
    Ok(Json(serde_json::json!({ "reloaded": true })))
}
