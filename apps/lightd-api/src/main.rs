//! lightd 控制接口与调度循环。

mod handlers;
mod routes;
mod scheduler;
mod utils;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use lightd_config::{AppConfig, load_scenes};
use lightd_control::{
    DeviceStateSink, GatewayRegistry, GatewayRegistryConfig, LightService, PatternStore,
};
use lightd_protocol::{ConnectionConfig, DiscoveryConfig};
use lightd_storage::{DeviceStore, InMemoryActivePatternStore, InMemoryDeviceStore};
use lightd_telemetry::{init_tracing, new_request_ids};
use scheduler::Scheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info};

#[derive(Clone)]
pub struct AppState {
    pub lights: Arc<LightService>,
    pub gateways: Arc<GatewayRegistry>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let scenes = load_scenes(&config.scenes_file)?;
    let patterns = Arc::new(PatternStore::load(&scenes));
    info!(target: "lightd.api", file = %config.scenes_file, patterns = patterns.len(), "scenes_loaded");

    // 设备注册表：网关会话写入，控制接口读取
    let devices: Arc<dyn DeviceStore> = Arc::new(InMemoryDeviceStore::new());
    let gateways = Arc::new(GatewayRegistry::new(
        GatewayRegistryConfig {
            connection: ConnectionConfig {
                connect_timeout: config.connect_timeout(),
                reconnect_delay: config.reconnect_delay(),
            },
            refresh_interval: config.refresh_interval(),
        },
        Arc::new(DeviceStateSink::new(devices.clone())),
    ));
    let lights = Arc::new(LightService::new(
        devices.clone(),
        Arc::new(InMemoryActivePatternStore::new()),
        patterns,
        gateways.clone(),
    ));

    let discovery = DiscoveryConfig {
        bind_addr: SocketAddr::from(([0, 0, 0, 0], config.device_port)),
        target_addr: SocketAddr::new(config.broadcast_addr, config.device_port),
        passes: config.discovery_passes,
        pass_timeout: config.discovery_pass_timeout(),
    };
    let scheduler = Scheduler::new(
        discovery,
        gateways.clone(),
        devices,
        config.device_ttl_seconds,
        config.reconcile_interval(),
    )
    .spawn();

    let app = build_app(AppState {
        lights,
        gateways: gateways.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "lightd.api", addr = %config.http_addr, "control_api_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    gateways.close_all().await;
    info!(target: "lightd.api", "shutdown_complete");
    Ok(())
}

/// 组装路由与中间件。
pub fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "lightd.api", error = %err, "signal_handler_failed");
        std::future::pending::<()>().await;
    }
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
