use domain::{ConnectionState, DiscoveredGateway};
use lightd_control::{CommandDispatcher, GatewayRegistry, GatewayRegistryConfig};
use lightd_protocol::driver::build_set_power;
use lightd_protocol::{ConnectionConfig, GatewayEventHandler, HardwareId, MessageType, Packet};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

struct IgnoreStates;

#[async_trait::async_trait]
impl GatewayEventHandler for IgnoreStates {
    async fn on_light_state(&self, _state: domain::LightState) {}
}

/// 本地假网关：接受连接并把收到的报文转发到通道。
async fn fake_gateway(id: &str) -> (DiscoveredGateway, mpsc::UnboundedReceiver<Packet>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(packet) = read_frame(&mut stream).await {
                    let _ = tx.send(packet);
                }
            });
        }
    });
    (
        DiscoveredGateway {
            gateway_id: id.to_string(),
            address: address.ip(),
            port: address.port(),
        },
        rx,
    )
}

async fn read_frame(stream: &mut TcpStream) -> Option<Packet> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.ok()?;
    let size = u16::from_le_bytes(header) as usize;
    let mut frame = vec![0u8; size];
    frame[..2].copy_from_slice(&header);
    stream.read_exact(&mut frame[2..]).await.ok()?;
    Packet::decode(&frame).ok()
}

/// 首个会话读到问候后即断开，之后的会话把收到的报文转发到通道。
async fn dropping_gateway(id: &str) -> (DiscoveredGateway, mpsc::UnboundedReceiver<Packet>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let Ok((mut first, _)) = listener.accept().await else {
            return;
        };
        read_frame(&mut first).await;
        drop(first);
        while let Ok((mut stream, _)) = listener.accept().await {
            while let Some(packet) = read_frame(&mut stream).await {
                let _ = tx.send(packet);
            }
        }
    });
    (
        DiscoveredGateway {
            gateway_id: id.to_string(),
            address: address.ip(),
            port: address.port(),
        },
        rx,
    )
}

async fn closed_port(id: &str) -> DiscoveredGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    drop(listener);
    DiscoveredGateway {
        gateway_id: id.to_string(),
        address: address.ip(),
        port: address.port(),
    }
}

fn discovered(gateways: &[&DiscoveredGateway]) -> HashMap<String, DiscoveredGateway> {
    gateways
        .iter()
        .map(|gateway| (gateway.gateway_id.clone(), (*gateway).clone()))
        .collect()
}

fn registry() -> GatewayRegistry {
    GatewayRegistry::new(
        GatewayRegistryConfig {
            connection: ConnectionConfig {
                connect_timeout: Duration::from_millis(500),
                reconnect_delay: Duration::from_millis(50),
            },
            refresh_interval: Duration::ZERO,
        },
        Arc::new(IgnoreStates),
    )
}

async fn next_of_kind(rx: &mut mpsc::UnboundedReceiver<Packet>, kind: MessageType) -> Packet {
    loop {
        let packet = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout")
            .expect("packet");
        if packet.kind == kind.code() {
            return packet;
        }
    }
}

#[tokio::test]
async fn reconcile_adds_removes_and_refreshes() {
    let (a, _a_rx) = fake_gateway("d073d50000aa").await;
    let (b, mut b_rx) = fake_gateway("d073d50000bb").await;
    let (c, _c_rx) = fake_gateway("d073d50000cc").await;
    let registry = registry();

    let first = registry.reconcile(&discovered(&[&a, &b])).await;
    assert_eq!(first.added, vec!["d073d50000aa", "d073d50000bb"]);
    assert!(first.removed.is_empty());
    next_of_kind(&mut b_rx, MessageType::Discover).await;

    let second = registry.reconcile(&discovered(&[&b, &c])).await;
    assert_eq!(second.removed, vec!["d073d50000aa"]);
    assert_eq!(second.added, vec!["d073d50000cc"]);
    assert_eq!(second.refreshed, vec!["d073d50000bb"]);
    next_of_kind(&mut b_rx, MessageType::GetAllStates).await;

    let ids: Vec<String> = registry
        .snapshot()
        .await
        .into_iter()
        .map(|gateway| gateway.id)
        .collect();
    assert_eq!(ids, vec!["d073d50000bb", "d073d50000cc"]);
    registry.close_all().await;
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn unreachable_gateway_is_dropped() {
    let dead = closed_port("d073d50000dd").await;
    let registry = registry();
    let report = registry.reconcile(&discovered(&[&dead])).await;
    assert_eq!(report.failed, vec!["d073d50000dd"]);
    assert!(report.added.is_empty());
    assert!(!registry.contains("d073d50000dd").await);
}

#[tokio::test]
async fn dispatch_routes_to_owning_gateway() {
    let (a, mut a_rx) = fake_gateway("d073d50000aa").await;
    let (b, mut b_rx) = fake_gateway("d073d50000bb").await;
    let registry = registry();
    registry.reconcile(&discovered(&[&a, &b])).await;

    let target: HardwareId = "d073d5123456".parse().expect("id");
    registry
        .dispatch("d073d50000bb", build_set_power(true, target))
        .await
        .expect("dispatch");
    let packet = next_of_kind(&mut b_rx, MessageType::SetPower).await;
    assert_eq!(packet.target, target);

    assert!(
        registry
            .dispatch("d073d5ffffff", build_set_power(true, target))
            .await
            .is_err()
    );

    let sent = registry
        .broadcast(build_set_power(false, HardwareId::BROADCAST))
        .await
        .expect("broadcast");
    assert_eq!(sent, 2);
    let packet = next_of_kind(&mut a_rx, MessageType::SetPower).await;
    assert!(packet.target.is_broadcast());
    registry.close_all().await;
}

#[tokio::test]
async fn snapshot_reports_connection_state() {
    let (a, _a_rx) = fake_gateway("d073d50000aa").await;
    let registry = registry();
    registry.reconcile(&discovered(&[&a])).await;
    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].state, ConnectionState::Connected);
    assert_eq!(snapshot[0].address.port(), a.port);
    assert!(snapshot[0].last_refresh_at_ms > 0);
    registry.close_all().await;
}

#[tokio::test]
async fn lost_gateway_is_reconnected_on_next_round() {
    let (a, mut a_rx) = dropping_gateway("d073d50000aa").await;
    let registry = registry();
    let first = registry.reconcile(&discovered(&[&a])).await;
    assert_eq!(first.added, vec!["d073d50000aa"]);

    let mut state = ConnectionState::Connected;
    for _ in 0..100 {
        state = registry.snapshot().await[0].state;
        if state == ConnectionState::NeedsReconnect {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state, ConnectionState::NeedsReconnect);

    let second = registry.reconcile(&discovered(&[&a])).await;
    assert_eq!(second.reconnecting, vec!["d073d50000aa"]);
    assert!(second.added.is_empty());
    assert!(second.removed.is_empty());
    assert!(second.refreshed.is_empty());

    // 延迟重连后重新发送问候
    next_of_kind(&mut a_rx, MessageType::Discover).await;
    assert!(registry.contains("d073d50000aa").await);
    registry.close_all().await;
}
