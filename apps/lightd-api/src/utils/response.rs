//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：control_error（ControlError → 状态码 + 错误封装）
//! - DTO 转换：device_to_dto, gateway_to_dto, metrics_to_dto

use api_contract::{ApiResponse, DeviceDto, GatewayDto, LightExtraDto, MetricsDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lightd_control::{ControlError, GatewaySnapshot};
use lightd_storage::DeviceRecord;
use lightd_telemetry::MetricsSnapshot;
use tracing::warn;

/// 成功响应
pub fn success<T: serde::Serialize>(object: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(object))).into_response()
}

/// 命令类接口的成功响应（object 为 null）
pub fn ok() -> Response {
    (StatusCode::OK, Json(ApiResponse::ok())).into_response()
}

/// 控制错误响应，错误信息原样返回。
pub fn control_error(err: ControlError) -> Response {
    let status = match &err {
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::UnknownPattern(_)
        | ControlError::InvalidCommand(_)
        | ControlError::InvalidColor(_) => StatusCode::BAD_REQUEST,
        ControlError::Dispatch(_) | ControlError::Storage(_) => {
            warn!(target: "lightd.api", error = %err, "request_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ApiResponse::<()>::error(err.to_string()))).into_response()
}

/// DeviceRecord 转 DeviceDto
pub fn device_to_dto(record: DeviceRecord) -> DeviceDto {
    DeviceDto {
        id: record.id,
        label: record.label,
        gateway_id: record.gateway_id,
        tags: record.tags,
        power: record.power,
        color: record.color,
        extra: LightExtraDto {
            hue: record.extra.hue,
            saturation: record.extra.saturation,
            brightness: record.extra.brightness,
            dim: record.extra.dim,
            kelvin: record.extra.kelvin,
        },
        last_seen_at: record.last_seen_at_ms,
    }
}

/// GatewaySnapshot 转 GatewayDto
pub fn gateway_to_dto(snapshot: GatewaySnapshot) -> GatewayDto {
    GatewayDto {
        id: snapshot.id,
        address: snapshot.address.ip().to_string(),
        port: snapshot.address.port(),
        connection_state: snapshot.state.as_str().to_string(),
        session_gateway_id: snapshot.session_gateway_id,
        last_refresh_at: snapshot.last_refresh_at_ms,
    }
}

pub fn metrics_to_dto(snapshot: MetricsSnapshot) -> MetricsDto {
    MetricsDto {
        packets_received: snapshot.packets_received,
        packets_malformed: snapshot.packets_malformed,
        light_states: snapshot.light_states,
        commands_sent: snapshot.commands_sent,
        commands_dropped: snapshot.commands_dropped,
        discovery_probes: snapshot.discovery_probes,
        gateways_added: snapshot.gateways_added,
        gateways_removed: snapshot.gateways_removed,
        devices_evicted: snapshot.devices_evicted,
    }
}
