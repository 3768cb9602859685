//! 运行状态 handlers
//!
//! - GET /health
//! - GET /gateways
//! - GET /metrics
//! - 未识别路由 → `unknown command '...'`

use crate::AppState;
use crate::utils::{control_error, gateway_to_dto, metrics_to_dto, success};
use api_contract::{GatewayDto, HealthDto};
use axum::{extract::State, http::Uri, response::Response};
use lightd_control::ControlError;
use lightd_telemetry::metrics;

pub async fn health() -> Response {
    success(HealthDto { ok: true })
}

pub async fn list_gateways(State(state): State<AppState>) -> Response {
    let data: Vec<GatewayDto> = state
        .gateways
        .snapshot()
        .await
        .into_iter()
        .map(gateway_to_dto)
        .collect();
    success(data)
}

pub async fn get_metrics() -> Response {
    success(metrics_to_dto(metrics().snapshot()))
}

pub async fn unknown_command(uri: Uri) -> Response {
    let command = uri
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string();
    control_error(ControlError::unknown_command(command))
}
