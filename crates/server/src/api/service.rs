//! Conversion service health handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use conversio_core::{HealthState, HealthStatus};

use crate::state::AppState;

/// Last known health of the configured backend
pub async fn get_service_health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(current_status(&state))
}

/// Run a health check now and return its result
pub async fn check_service_health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    match state.health() {
        Some(monitor) => Json(monitor.check_now().await),
        None => Json(current_status(&state)),
    }
}

fn current_status(state: &AppState) -> HealthStatus {
    if let Some(monitor) = state.health() {
        return monitor.status();
    }

    // The local backend has no probe; its health is the engine session.
    match state.engine() {
        Some(engine) => {
            let session = engine.session();
            if session.loaded {
                HealthStatus::new(HealthState::Healthy, None, "Engine loaded")
            } else {
                let message = session
                    .last_error
                    .unwrap_or_else(|| "Engine not loaded".to_string());
                HealthStatus::new(HealthState::Unhealthy, None, message)
            }
        }
        None => HealthStatus::new(HealthState::Unknown, None, "No health source configured"),
    }
}
