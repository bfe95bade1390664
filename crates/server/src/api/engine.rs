//! Local engine handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use conversio_core::engine::SessionInfo;
use serde::Serialize;
use tracing::{error, info};

use super::{error_response, ApiError};
use crate::state::AppState;

/// Log lines returned by `GET /engine`
const RECENT_LOG_LINES: usize = 50;

#[derive(Debug, Serialize)]
pub struct EngineResponse {
    pub runtime: String,
    #[serde(flatten)]
    pub session: SessionInfo,
    pub progress: u8,
    pub recent_logs: Vec<String>,
}

pub async fn get_engine(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EngineResponse>, ApiError> {
    let engine = state.engine().ok_or_else(no_engine)?;
    Ok(Json(EngineResponse {
        runtime: engine.runtime_name().to_string(),
        session: engine.session(),
        progress: engine.progress(),
        recent_logs: engine.recent_logs(RECENT_LOG_LINES),
    }))
}

/// Load the engine if it is not loaded yet
pub async fn load_engine(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionInfo>, ApiError> {
    let engine = state.engine().ok_or_else(no_engine)?;

    match engine.ensure_loaded().await {
        Ok(()) => {
            info!("Engine ready");
            Ok(Json(engine.session()))
        }
        Err(e) => {
            error!("Engine load failed: {}", e);
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

fn no_engine() -> ApiError {
    error_response(
        StatusCode::NOT_FOUND,
        "Local engine is not configured for this backend",
    )
}
