use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    error::ApiResult,
    models::{DatabaseHealth, HealthResponse},
    AppState,
};

/// Health check endpoint
///
/// GET /api/v1/iot/health
#[utoipa::path(
    get,
    path = "/api/v1/iot/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    debug!("Health check requested");

    let db_health = match sqlx::query("SELECT 1").fetch_one(state.db.pool()).await {
        Ok(_) => DatabaseHealth {
            connected: true,
            message: "Database connection successful".to_string(),
        },
        Err(e) => {
            warn!("Health check could not reach the database: {}", e);
            DatabaseHealth {
                connected: false,
                message: format!("Database connection failed: {}", e),
            }
        }
    };

    let status = if db_health.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_health.connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database: db_health,
    };

    Ok((status, Json(response)))
}
