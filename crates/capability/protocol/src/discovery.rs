//! UDP 广播发现
//!
//! 一次探测：向广播地址发送一个发现报文，然后在同端口上收包若干轮，
//! 每轮最多等待 `pass_timeout`。仅保留 0x03 应答，同一网关以最后一次应答为准。
//! 整个探测耗时不超过 `passes × pass_timeout`。

use crate::driver::{build_discover, parse_discovery_reply};
use crate::error::ProtocolError;
use crate::packet::{MessageType, Packet};
use domain::DiscoveredGateway;
use lightd_telemetry::record_discovery_probe;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// 设备默认端口
pub const DEFAULT_DEVICE_PORT: u16 = 56700;

/// 默认收包轮数
pub const DEFAULT_DISCOVERY_PASSES: u32 = 5;

/// 应答报文上限（报文头 + 少量负载）
const MAX_DATAGRAM_SIZE: usize = 512;

/// 发现配置
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// 本地绑定地址（通常 0.0.0.0:56700）
    pub bind_addr: SocketAddr,
    /// 广播目标地址（通常 255.255.255.255:56700）
    pub target_addr: SocketAddr,
    /// 收包轮数
    pub passes: u32,
    /// 每轮超时
    pub pass_timeout: Duration,
}

impl DiscoveryConfig {
    /// 以设备端口构造默认广播配置
    pub fn broadcast(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)),
            target_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, port)),
            passes: DEFAULT_DISCOVERY_PASSES,
            pass_timeout: Duration::from_secs(1),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::broadcast(DEFAULT_DEVICE_PORT)
    }
}

/// 执行一次发现，返回以网关标识为键的结果集。
pub async fn probe(
    config: &DiscoveryConfig,
) -> Result<HashMap<String, DiscoveredGateway>, ProtocolError> {
    record_discovery_probe();
    let socket = UdpSocket::bind(config.bind_addr).await?;
    socket.set_broadcast(true)?;

    let request = build_discover().encode()?;
    socket.send_to(&request, config.target_addr).await?;
    debug!(target: "lightd.protocol", target_addr = %config.target_addr, "discovery broadcast sent");

    let mut gateways = HashMap::new();
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    for pass in 0..config.passes {
        let (len, from) =
            match tokio::time::timeout(config.pass_timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(err)) => {
                    warn!(target: "lightd.protocol", pass, error = %err, "discovery receive failed");
                    continue;
                }
                Err(_) => {
                    debug!(target: "lightd.protocol", pass, "discovery pass timed out");
                    continue;
                }
            };
        if let Some(gateway) = accept_reply(&buf[..len], from) {
            info!(
                target: "lightd.protocol",
                gateway_id = %gateway.gateway_id,
                address = %gateway.address,
                port = gateway.port,
                "discovery reply"
            );
            gateways.insert(gateway.gateway_id.clone(), gateway);
        }
    }
    Ok(gateways)
}

/// 解析一条数据报，仅接受合法的 0x03 应答。
pub fn accept_reply(datagram: &[u8], from: SocketAddr) -> Option<DiscoveredGateway> {
    let packet = match Packet::decode(datagram) {
        Ok(packet) => packet,
        Err(err) => {
            debug!(target: "lightd.protocol", %from, error = %err, "ignored datagram");
            return None;
        }
    };
    if packet.message_type() != Some(MessageType::DiscoverReply) {
        return None;
    }
    let port = match parse_discovery_reply(&packet) {
        Ok(port) => port,
        Err(err) => {
            warn!(target: "lightd.protocol", %from, error = %err, "bad discovery reply");
            return None;
        }
    };
    let Ok(port) = u16::try_from(port) else {
        warn!(target: "lightd.protocol", %from, port, "discovery reply port out of range");
        return None;
    };
    Some(DiscoveredGateway {
        gateway_id: packet.gateway.to_string(),
        address: from.ip(),
        port,
    })
}
