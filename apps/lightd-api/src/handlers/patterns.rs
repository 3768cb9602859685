//! 场景 handlers
//!
//! - GET /pattern：当前场景 `{current, ts}`
//! - GET /pattern/{name}[/{fadeMs}]：应用场景
//! - GET /patterns：已加载场景名
//! - GET /export：以场景描述串导出当前设备状态

use crate::AppState;
use crate::utils::{control_error, ok, success};
use api_contract::PatternStatusDto;
use axum::{
    extract::{Path, State},
    response::Response,
};
use lightd_control::ControlError;

#[derive(serde::Deserialize)]
pub struct PatternPath {
    name: String,
    fade: Option<String>,
}

pub async fn pattern_status(State(state): State<AppState>) -> Response {
    match state.lights.active_pattern().await {
        Ok(active) => success(PatternStatusDto {
            current: active.name,
            ts: active.applied_at,
        }),
        Err(err) => control_error(err),
    }
}

pub async fn apply_pattern(
    State(state): State<AppState>,
    Path(path): Path<PatternPath>,
) -> Response {
    let fade_ms = match path.fade.as_deref().filter(|fade| !fade.is_empty()) {
        Some(fade) => match fade.parse::<u32>() {
            Ok(fade) => Some(fade),
            Err(_) => return control_error(ControlError::invalid_argument(fade)),
        },
        None => None,
    };
    match state.lights.apply_pattern(&path.name, fade_ms).await {
        Ok(_) => ok(),
        Err(err) => control_error(err),
    }
}

pub async fn list_patterns(State(state): State<AppState>) -> Response {
    success(state.lights.pattern_names())
}

pub async fn export_scene(State(state): State<AppState>) -> Response {
    match state.lights.export().await {
        Ok(scene) => success(scene),
        Err(err) => control_error(err),
    }
}
