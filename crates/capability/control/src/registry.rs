//! 网关注册表
//!
//! 以发现得到的网关标识为键，每个网关至多一条 TCP 会话。每轮发现结果 `D`
//! 与当前注册表 `R` 调和：
//!
//! - `D \ R`：新建会话并连接，连接失败直接丢弃
//! - `D ∩ R`：需重连则安排延迟重连，否则按刷新间隔请求全量状态
//! - `R \ D`：关闭会话并移除
//!
//! 新网关并发建连，建连期间不持有注册表锁。

use crate::dispatcher::CommandDispatcher;
use crate::error::ControlError;
use async_trait::async_trait;
use domain::{ConnectionState, DiscoveredGateway, now_epoch_ms};
use lightd_protocol::{ConnectionConfig, GatewayConnection, GatewayEventHandler, Packet};
use lightd_telemetry::{
    record_command_dropped, record_command_sent, record_gateway_added, record_gateway_removed,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 注册表配置
#[derive(Debug, Clone, Copy)]
pub struct GatewayRegistryConfig {
    pub connection: ConnectionConfig,
    /// 两次全量刷新的最小间隔
    pub refresh_interval: Duration,
}

impl Default for GatewayRegistryConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            refresh_interval: Duration::from_secs(2),
        }
    }
}

struct GatewayEntry {
    connection: Arc<GatewayConnection>,
    last_refresh: Instant,
    last_refresh_at_ms: i64,
}

/// 网关快照（用于查询接口）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySnapshot {
    pub id: String,
    pub address: SocketAddr,
    pub state: ConnectionState,
    /// 会话应答中记录的网关标识
    pub session_gateway_id: Option<String>,
    pub last_refresh_at_ms: i64,
}

/// 一轮调和的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub failed: Vec<String>,
    pub removed: Vec<String>,
    pub refreshed: Vec<String>,
    pub reconnecting: Vec<String>,
}

/// 网关注册表
pub struct GatewayRegistry {
    config: GatewayRegistryConfig,
    handler: Arc<dyn GatewayEventHandler>,
    gateways: RwLock<HashMap<String, GatewayEntry>>,
}

impl GatewayRegistry {
    pub fn new(config: GatewayRegistryConfig, handler: Arc<dyn GatewayEventHandler>) -> Self {
        Self {
            config,
            handler,
            gateways: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.gateways.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.gateways.read().await.is_empty()
    }

    pub async fn contains(&self, gateway_id: &str) -> bool {
        self.gateways.read().await.contains_key(gateway_id)
    }

    /// 当前注册表快照（按标识排序）
    pub async fn snapshot(&self) -> Vec<GatewaySnapshot> {
        let gateways = self.gateways.read().await;
        let mut items: Vec<GatewaySnapshot> = gateways
            .iter()
            .map(|(id, entry)| GatewaySnapshot {
                id: id.clone(),
                address: entry.connection.address(),
                state: entry.connection.state(),
                session_gateway_id: entry.connection.gateway_id(),
                last_refresh_at_ms: entry.last_refresh_at_ms,
            })
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    /// 用一轮发现结果调和注册表。
    pub async fn reconcile(
        &self,
        discovered: &HashMap<String, DiscoveredGateway>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        // R \ D
        let stale: Vec<(String, Arc<GatewayConnection>)> = {
            let mut gateways = self.gateways.write().await;
            let ids: Vec<String> = gateways
                .keys()
                .filter(|id| !discovered.contains_key(*id))
                .cloned()
                .collect();
            ids.into_iter()
                .filter_map(|id| gateways.remove(&id).map(|entry| (id, entry.connection)))
                .collect()
        };
        for (id, connection) in stale {
            connection.close().await;
            record_gateway_removed();
            info!(target: "lightd.control", gateway_id = %id, "gateway_removed");
            report.removed.push(id);
        }

        // D ∩ R
        let now = Instant::now();
        let existing: Vec<(String, Arc<GatewayConnection>, Instant)> = {
            let gateways = self.gateways.read().await;
            gateways
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(&entry.connection), entry.last_refresh))
                .collect()
        };
        for (id, connection, last_refresh) in existing {
            match connection.state() {
                ConnectionState::NeedsReconnect => {
                    if connection.schedule_reconnect() {
                        report.reconnecting.push(id);
                    }
                }
                ConnectionState::Connected
                    if now.duration_since(last_refresh) >= self.config.refresh_interval =>
                {
                    match connection.refresh_states().await {
                        Ok(()) => {
                            self.mark_refreshed(&id).await;
                            report.refreshed.push(id);
                        }
                        Err(err) => {
                            warn!(target: "lightd.control", gateway_id = %id, error = %err, "gateway_refresh_failed");
                        }
                    }
                }
                state => {
                    debug!(target: "lightd.control", gateway_id = %id, state = %state, "gateway_unchanged");
                }
            }
        }

        // D \ R
        let fresh: Vec<DiscoveredGateway> = {
            let gateways = self.gateways.read().await;
            discovered
                .values()
                .filter(|gateway| !gateways.contains_key(&gateway.gateway_id))
                .cloned()
                .collect()
        };
        let mut attempts = JoinSet::new();
        for gateway in fresh {
            let address = SocketAddr::new(gateway.address, gateway.port);
            let connection = Arc::new(GatewayConnection::new(
                address,
                self.config.connection,
                Arc::clone(&self.handler),
            ));
            attempts.spawn(async move {
                let result = connection.connect().await;
                (gateway.gateway_id, connection, result)
            });
        }
        while let Some(joined) = attempts.join_next().await {
            let (id, connection, result) = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(target: "lightd.control", error = %err, "gateway_connect_task_failed");
                    continue;
                }
            };
            if let Err(err) = result {
                connection.close().await;
                warn!(
                    target: "lightd.control",
                    gateway_id = %id,
                    address = %connection.address(),
                    error = %err,
                    "gateway_unreachable"
                );
                report.failed.push(id);
                continue;
            }
            let mut gateways = self.gateways.write().await;
            if gateways.contains_key(&id) {
                drop(gateways);
                connection.close().await;
                continue;
            }
            gateways.insert(
                id.clone(),
                GatewayEntry {
                    connection: Arc::clone(&connection),
                    last_refresh: Instant::now(),
                    last_refresh_at_ms: now_epoch_ms(),
                },
            );
            record_gateway_added();
            info!(
                target: "lightd.control",
                gateway_id = %id,
                address = %connection.address(),
                "gateway_added"
            );
            report.added.push(id);
        }

        report.added.sort();
        report.failed.sort();
        report
    }

    /// 关闭全部会话（进程退出时）
    pub async fn close_all(&self) {
        let drained: Vec<(String, GatewayEntry)> = self.gateways.write().await.drain().collect();
        for (id, entry) in drained {
            entry.connection.close().await;
            debug!(target: "lightd.control", gateway_id = %id, "gateway_closed");
        }
    }

    async fn mark_refreshed(&self, gateway_id: &str) {
        if let Some(entry) = self.gateways.write().await.get_mut(gateway_id) {
            entry.last_refresh = Instant::now();
            entry.last_refresh_at_ms = now_epoch_ms();
        }
    }

    /// 按注册表键或会话网关标识查找会话。
    async fn find(&self, gateway_id: &str) -> Option<Arc<GatewayConnection>> {
        let gateways = self.gateways.read().await;
        if let Some(entry) = gateways.get(gateway_id) {
            return Some(Arc::clone(&entry.connection));
        }
        gateways
            .values()
            .find(|entry| entry.connection.gateway_id().as_deref() == Some(gateway_id))
            .map(|entry| Arc::clone(&entry.connection))
    }
}

#[async_trait]
impl CommandDispatcher for GatewayRegistry {
    async fn dispatch(&self, gateway_id: &str, packet: Packet) -> Result<(), ControlError> {
        let Some(connection) = self.find(gateway_id).await else {
            record_command_dropped();
            return Err(ControlError::Dispatch(format!(
                "gateway {} not registered",
                gateway_id
            )));
        };
        let packet_type = packet.kind;
        match connection.send_command(packet).await {
            Ok(()) => {
                record_command_sent();
                debug!(target: "lightd.control", gateway_id = %gateway_id, packet_type, "command_sent");
                Ok(())
            }
            Err(err) => {
                record_command_dropped();
                Err(ControlError::Dispatch(format!("gateway {}: {}", gateway_id, err)))
            }
        }
    }

    async fn broadcast(&self, packet: Packet) -> Result<usize, ControlError> {
        let targets: Vec<(String, Arc<GatewayConnection>)> = {
            let gateways = self.gateways.read().await;
            gateways
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(&entry.connection)))
                .collect()
        };
        let mut sent = 0;
        for (id, connection) in targets {
            if connection.state() != ConnectionState::Connected {
                record_command_dropped();
                debug!(target: "lightd.control", gateway_id = %id, "broadcast_skipped_disconnected");
                continue;
            }
            match connection.send_command(packet.clone()).await {
                Ok(()) => {
                    record_command_sent();
                    sent += 1;
                }
                Err(err) => {
                    record_command_dropped();
                    warn!(target: "lightd.control", gateway_id = %id, error = %err, "broadcast_failed");
                }
            }
        }
        Ok(sent)
    }
}
