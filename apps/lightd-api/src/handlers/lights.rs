//! 灯控 handlers
//!
//! - GET /power/{on|off}[/{label}]
//! - GET /color/{rgb}-{hue}-{sat}-{bri}-{dim}-{kelvin}[/{label}]
//! - GET /state[/{label}]
//!
//! 未指定标签时命令发往全部网关。

use crate::AppState;
use crate::utils::{control_error, device_to_dto, ok, success};
use api_contract::DeviceDto;
use axum::{
    extract::{Path, State},
    response::Response,
};
use lightd_control::{ColorCommand, parse_power};

#[derive(serde::Deserialize)]
pub struct PowerPath {
    state: String,
    label: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct ColorPath {
    color: String,
    label: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct LabelPath {
    label: String,
}

pub async fn set_power(State(state): State<AppState>, Path(path): Path<PowerPath>) -> Response {
    let on = match parse_power(&path.state) {
        Ok(on) => on,
        Err(err) => return control_error(err),
    };
    match state.lights.set_power(on, path.label.as_deref()).await {
        Ok(()) => ok(),
        Err(err) => control_error(err),
    }
}

pub async fn set_color(State(state): State<AppState>, Path(path): Path<ColorPath>) -> Response {
    let command = match ColorCommand::parse(&path.color) {
        Ok(command) => command,
        Err(err) => return control_error(err),
    };
    match state.lights.set_color(&command, path.label.as_deref()).await {
        Ok(()) => ok(),
        Err(err) => control_error(err),
    }
}

/// 全部设备
pub async fn list_states(State(state): State<AppState>) -> Response {
    match state.lights.devices().await {
        Ok(items) => {
            let data: Vec<DeviceDto> = items.into_iter().map(device_to_dto).collect();
            success(data)
        }
        Err(err) => control_error(err),
    }
}

/// 按标签查询单个设备
pub async fn get_state(State(state): State<AppState>, Path(path): Path<LabelPath>) -> Response {
    match state.lights.device(&path.label).await {
        Ok(record) => success(device_to_dto(record)),
        Err(err) => control_error(err),
    }
}
