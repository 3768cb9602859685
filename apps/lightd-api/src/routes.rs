//! 路由定义
//!
//! - 灯控：/power, /color, /state
//! - 场景：/pattern, /patterns, /export
//! - 运行状态：/health, /gateways, /metrics
//!
//! 其余路径统一返回 `unknown command`。

use super::AppState;
use super::handlers::*;
use axum::{Router, routing::get};

pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/power/:state", get(set_power))
        .route("/power/:state/:label", get(set_power))
        .route("/color/:color", get(set_color))
        .route("/color/:color/:label", get(set_color))
        .route("/state", get(list_states))
        .route("/state/:label", get(get_state))
        .route("/pattern", get(pattern_status))
        .route("/pattern/:name", get(apply_pattern))
        .route("/pattern/:name/:fade", get(apply_pattern))
        .route("/patterns", get(list_patterns))
        .route("/export", get(export_scene))
        .route("/gateways", get(list_gateways))
        .route("/metrics", get(get_metrics))
        .fallback(unknown_command)
}
