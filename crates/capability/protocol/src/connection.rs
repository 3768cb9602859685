//! 网关 TCP 会话
//!
//! 每个网关一条会话，状态流转：
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!                               │                  │ IO 错误 / 对端关闭
//!                               ▼ 失败/超时         ▼
//!                          NeedsReconnect ◀────────┘
//!                               │ schedule_reconnect（延迟后重试，不阻塞调用方）
//!                               ▼
//!                           Connecting
//! ```
//!
//! 建连后立即发送一个发现报文作为会话问候。每次建连后收到的第一帧视为会话应答，
//! 记录其中的网关标识并请求一次全量状态；之后的 0x6b 帧解析为灯状态上报。
//! 重连期间沿用上一次记录的网关标识发送命令，直到新的会话应答到达。

use crate::driver::{build_discover, build_refresh_all, parse_light_state};
use crate::error::ProtocolError;
use crate::packet::{FrameBuffer, HardwareId, MessageType, Packet};
use async_trait::async_trait;
use domain::{ConnectionState, LightState};
use lightd_telemetry::{record_light_state, record_packet_malformed, record_packet_received};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 4096;

/// 会话配置
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// 建连超时
    pub connect_timeout: Duration,
    /// 断线后的重连延迟
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

/// 网关会话事件处理器
#[async_trait]
pub trait GatewayEventHandler: Send + Sync {
    /// 灯状态上报
    async fn on_light_state(&self, state: LightState);

    /// 会话应答，网关标识已记录
    async fn on_session(&self, _address: SocketAddr, _gateway_id: &str) {}

    /// 其它报文（默认忽略）
    async fn on_packet(&self, _packet: Packet) {}
}

/// 入站报文分类
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// 会话应答，携带网关标识
    Session(HardwareId),
    LightState(LightState),
    Other(Packet),
}

impl Inbound {
    /// 按会话是否已建立对报文分类。
    pub fn classify(packet: Packet, session_known: bool) -> Result<Self, ProtocolError> {
        if !session_known {
            return Ok(Self::Session(packet.gateway));
        }
        match packet.message_type() {
            Some(MessageType::LightState) => parse_light_state(&packet).map(Self::LightState),
            _ => Ok(Self::Other(packet)),
        }
    }
}

struct Shared {
    address: SocketAddr,
    state: RwLock<ConnectionState>,
    gateway: RwLock<Option<HardwareId>>,
    /// 当前 TCP 会话是否已收到会话应答
    session_established: AtomicBool,
    writer: Mutex<Option<OwnedWriteHalf>>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    reconnect_pending: AtomicBool,
    closed: AtomicBool,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        self.state.read().map(|state| *state).unwrap_or_default()
    }

    fn set_state(&self, next: ConnectionState) {
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
    }

    fn gateway(&self) -> Option<HardwareId> {
        self.gateway.read().ok().and_then(|gateway| *gateway)
    }

    fn set_gateway(&self, id: HardwareId) {
        if let Ok(mut gateway) = self.gateway.write() {
            *gateway = Some(id);
        }
    }

    /// 写入网关标识后发送。
    async fn send(&self, mut packet: Packet) -> Result<(), ProtocolError> {
        packet.gateway = self.gateway().unwrap_or(HardwareId::BROADCAST);
        self.write_frame(&packet.encode()?).await
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<(), ProtocolError> {
        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(ProtocolError::Connection(format!(
                "gateway {} not connected",
                self.address
            )));
        };
        if let Err(err) = stream.write_all(frame).await {
            writer.take();
            self.set_state(ConnectionState::NeedsReconnect);
            return Err(ProtocolError::Io(err));
        }
        Ok(())
    }
}

/// 网关 TCP 会话
pub struct GatewayConnection {
    config: ConnectionConfig,
    handler: Arc<dyn GatewayEventHandler>,
    shared: Arc<Shared>,
}

impl GatewayConnection {
    /// 创建会话（尚未连接）
    pub fn new(
        address: SocketAddr,
        config: ConnectionConfig,
        handler: Arc<dyn GatewayEventHandler>,
    ) -> Self {
        Self {
            config,
            handler,
            shared: Arc::new(Shared {
                address,
                state: RwLock::new(ConnectionState::Disconnected),
                gateway: RwLock::new(None),
                session_established: AtomicBool::new(false),
                writer: Mutex::new(None),
                reader: std::sync::Mutex::new(None),
                generation: AtomicU64::new(0),
                reconnect_pending: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.shared.address
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// 会话应答中记录的网关标识
    pub fn gateway_id(&self) -> Option<String> {
        self.shared.gateway().map(|id| id.to_string())
    }

    /// 建立 TCP 会话（带超时），成功后发送问候报文。
    pub async fn connect(&self) -> Result<(), ProtocolError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ProtocolError::Connection(format!(
                "gateway {} closed",
                self.shared.address
            )));
        }
        let address = self.shared.address;
        self.shared.set_state(ConnectionState::Connecting);
        info!(target: "lightd.protocol", %address, "connecting to gateway");

        let stream =
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(address))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => {
                    self.shared.set_state(ConnectionState::NeedsReconnect);
                    return Err(ProtocolError::Connection(format!("{}: {}", address, err)));
                }
                Err(_) => {
                    self.shared.set_state(ConnectionState::NeedsReconnect);
                    return Err(ProtocolError::Timeout(format!("connect to {}", address)));
                }
            };

        let (read_half, write_half) = stream.into_split();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.session_established.store(false, Ordering::SeqCst);
        *self.shared.writer.lock().await = Some(write_half);
        let reader = tokio::spawn(read_loop(
            read_half,
            Arc::clone(&self.shared),
            Arc::clone(&self.handler),
            generation,
        ));
        if let Ok(mut slot) = self.shared.reader.lock() {
            if let Some(previous) = slot.replace(reader) {
                previous.abort();
            }
        }
        self.shared.set_state(ConnectionState::Connected);
        info!(target: "lightd.protocol", %address, "connected to gateway");

        self.shared.write_frame(&build_discover().encode()?).await
    }

    /// 延迟重连；已有待执行的重连时不重复安排。
    ///
    /// 返回是否新安排了一次重连。
    pub fn schedule_reconnect(self: &Arc<Self>) -> bool {
        if self.shared.closed.load(Ordering::SeqCst)
            || self.shared.reconnect_pending.swap(true, Ordering::SeqCst)
        {
            return false;
        }
        let connection = Arc::clone(self);
        let delay = self.config.reconnect_delay;
        warn!(
            target: "lightd.protocol",
            address = %self.shared.address,
            delay_ms = delay.as_millis() as u64,
            "lost connection, reconnect scheduled"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = connection.connect().await {
                warn!(
                    target: "lightd.protocol",
                    address = %connection.shared.address,
                    error = %err,
                    "reconnect failed"
                );
            }
            connection
                .shared
                .reconnect_pending
                .store(false, Ordering::SeqCst);
        });
        true
    }

    /// 发送命令报文（写入本会话的网关标识）。
    pub async fn send_command(&self, packet: Packet) -> Result<(), ProtocolError> {
        self.shared.send(packet).await
    }

    /// 请求网关上报全部灯状态。
    pub async fn refresh_states(&self) -> Result<(), ProtocolError> {
        let gateway = self.shared.gateway().unwrap_or(HardwareId::BROADCAST);
        self.shared.send(build_refresh_all(gateway)).await
    }

    /// 关闭会话，之后不再重连。
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.shared.reader.lock() {
            if let Some(reader) = slot.take() {
                reader.abort();
            }
        }
        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.shared.set_state(ConnectionState::Disconnected);
        info!(target: "lightd.protocol", address = %self.shared.address, "gateway session closed");
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    shared: Arc<Shared>,
    handler: Arc<dyn GatewayEventHandler>,
    generation: u64,
) {
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let reason = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break "peer closed".to_string(),
            Ok(n) => {
                frames.extend(&buf[..n]);
                while let Some(frame) = frames.next_packet() {
                    match frame {
                        Ok(packet) => dispatch(&shared, &handler, packet).await,
                        Err(err) => {
                            record_packet_malformed();
                            warn!(
                                target: "lightd.protocol",
                                address = %shared.address,
                                error = %err,
                                "dropped inbound frame"
                            );
                        }
                    }
                }
            }
            Err(err) => break err.to_string(),
        }
    };

    // 已被新会话或 close 取代时不再改动状态
    if shared.generation.load(Ordering::SeqCst) != generation {
        return;
    }
    shared.writer.lock().await.take();
    shared.set_state(ConnectionState::NeedsReconnect);
    warn!(
        target: "lightd.protocol",
        address = %shared.address,
        reason = %reason,
        "gateway session ended"
    );
}

async fn dispatch(shared: &Shared, handler: &Arc<dyn GatewayEventHandler>, packet: Packet) {
    record_packet_received();
    let packet_type = packet.kind;
    let session_known = shared.session_established.load(Ordering::SeqCst);
    let inbound = match Inbound::classify(packet, session_known) {
        Ok(inbound) => inbound,
        Err(err) => {
            record_packet_malformed();
            warn!(
                target: "lightd.protocol",
                address = %shared.address,
                packet_type,
                error = %err,
                "dropped inbound packet"
            );
            return;
        }
    };

    match inbound {
        Inbound::Session(gateway) => {
            shared.set_gateway(gateway);
            shared.session_established.store(true, Ordering::SeqCst);
            let gateway_id = gateway.to_string();
            info!(
                target: "lightd.protocol",
                address = %shared.address,
                gateway_id = %gateway_id,
                "found gateway"
            );
            handler.on_session(shared.address, &gateway_id).await;
            if let Err(err) = shared.send(build_refresh_all(gateway)).await {
                warn!(target: "lightd.protocol", gateway_id = %gateway_id, error = %err, "initial refresh failed");
            }
        }
        Inbound::LightState(state) => {
            record_light_state();
            debug!(
                target: "lightd.protocol",
                device_id = %state.id,
                label = %state.label,
                power = state.power,
                "light state"
            );
            handler.on_light_state(state).await;
        }
        Inbound::Other(packet) => {
            debug!(target: "lightd.protocol", packet_type = packet.kind, "unhandled packet");
            handler.on_packet(packet).await;
        }
    }
}
