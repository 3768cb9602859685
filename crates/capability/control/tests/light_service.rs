use async_trait::async_trait;
use domain::{LightExtra, LightState, now_epoch_ms, now_epoch_secs};
use lightd_control::{
    ColorCommand, CommandDispatcher, ControlError, LightService, PatternStore,
};
use lightd_protocol::{MessageType, Packet};
use lightd_storage::{
    ActivePatternStore, DeviceStore, InMemoryActivePatternStore, InMemoryDeviceStore,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Direct(String, Packet),
    Broadcast(Packet),
}

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingDispatcher {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandDispatcher for RecordingDispatcher {
    async fn dispatch(&self, gateway_id: &str, packet: Packet) -> Result<(), ControlError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Direct(gateway_id.to_string(), packet));
        Ok(())
    }

    async fn broadcast(&self, packet: Packet) -> Result<usize, ControlError> {
        self.sent.lock().unwrap().push(Sent::Broadcast(packet));
        Ok(1)
    }
}

struct FailingDispatcher;

#[async_trait]
impl CommandDispatcher for FailingDispatcher {
    async fn dispatch(&self, gateway_id: &str, _packet: Packet) -> Result<(), ControlError> {
        Err(ControlError::Dispatch(format!("gateway {} offline", gateway_id)))
    }

    async fn broadcast(&self, _packet: Packet) -> Result<usize, ControlError> {
        Ok(0)
    }
}

fn light(id: &str, label: &str, power: bool) -> LightState {
    LightState {
        id: id.to_string(),
        gateway_id: "d073d5000001".to_string(),
        label: label.to_string(),
        tags: 0,
        power,
        color: "#ff8800".to_string(),
        extra: LightExtra {
            kelvin: 2700,
            ..LightExtra::default()
        },
    }
}

fn patterns() -> PatternStore {
    let evening = vec![
        ("Kitchen".to_string(), "off".to_string()),
        ("Lounge".to_string(), "#ff0000 2700K".to_string()),
    ];
    let broken = vec![
        ("Kitchen".to_string(), "on".to_string()),
        ("Attic".to_string(), "on".to_string()),
    ];
    let mut definitions = BTreeMap::new();
    definitions.insert("evening".to_string(), evening);
    definitions.insert("broken".to_string(), broken);
    PatternStore::load(&definitions)
}

struct Fixture {
    service: LightService,
    active: Arc<InMemoryActivePatternStore>,
    dispatcher: Arc<RecordingDispatcher>,
}

async fn fixture() -> Fixture {
    let devices = Arc::new(InMemoryDeviceStore::new());
    devices
        .upsert(light("d073d5aaaaaa", "Kitchen", true), now_epoch_ms())
        .await
        .unwrap();
    devices
        .upsert(light("d073d5bbbbbb", "Lounge", false), now_epoch_ms())
        .await
        .unwrap();
    let active = Arc::new(InMemoryActivePatternStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let service = LightService::new(
        devices,
        active.clone(),
        Arc::new(patterns()),
        dispatcher.clone(),
    );
    Fixture {
        service,
        active,
        dispatcher,
    }
}

fn u16_at(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

#[tokio::test]
async fn apply_pattern_issues_power_and_color() {
    let fixture = fixture().await;
    let before = now_epoch_secs();
    let applied = fixture
        .service
        .apply_pattern("evening", None)
        .await
        .expect("apply");
    assert_eq!(applied.name, "evening");
    assert!(applied.applied_at >= before);

    let sent = fixture.dispatcher.sent();
    assert_eq!(sent.len(), 3);

    let Sent::Direct(gateway, kitchen) = &sent[0] else {
        panic!("expected direct send");
    };
    assert_eq!(gateway, "d073d5000001");
    assert_eq!(kitchen.kind, MessageType::SetPower.code());
    assert_eq!(kitchen.target.to_string(), "d073d5aaaaaa");
    assert_eq!(kitchen.payload, vec![0, 0]);

    let Sent::Direct(_, lounge_power) = &sent[1] else {
        panic!("expected direct send");
    };
    assert_eq!(lounge_power.target.to_string(), "d073d5bbbbbb");
    assert_eq!(lounge_power.payload, vec![1, 0]);

    let Sent::Direct(_, lounge_color) = &sent[2] else {
        panic!("expected direct send");
    };
    assert_eq!(lounge_color.kind, MessageType::SetColor.code());
    assert_eq!(u16_at(&lounge_color.payload, 1), 0);
    assert_eq!(u16_at(&lounge_color.payload, 3), 0xFFFF);
    assert_eq!(u16_at(&lounge_color.payload, 7), 2700);

    let current = fixture.active.current().await.unwrap();
    assert_eq!(current, applied);
}

#[tokio::test]
async fn apply_pattern_passes_fade() {
    let fixture = fixture().await;
    fixture
        .service
        .apply_pattern("evening", Some(1500))
        .await
        .expect("apply");
    let Sent::Direct(_, color) = &fixture.dispatcher.sent()[2] else {
        panic!("expected direct send");
    };
    let fade = u32::from_le_bytes([
        color.payload[9],
        color.payload[10],
        color.payload[11],
        color.payload[12],
    ]);
    assert_eq!(fade, 1500);
}

#[tokio::test]
async fn unknown_pattern_leaves_marker() {
    let fixture = fixture().await;
    let err = fixture
        .service
        .apply_pattern("doesnotexist", None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown pattern 'doesnotexist'");
    assert!(fixture.dispatcher.sent().is_empty());
    assert_eq!(fixture.active.current().await.unwrap().name, "off");
}

#[tokio::test]
async fn missing_label_fails_pattern_without_marker_update() {
    let fixture = fixture().await;
    let err = fixture
        .service
        .apply_pattern("broken", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NotFound(ref label) if label == "Attic"));
    assert_eq!(err.to_string(), "Light not found: Attic");
    assert_eq!(fixture.active.current().await.unwrap().name, "off");

    // 缺失标签之前的条目已按定义顺序下发，不回滚
    let sent = fixture.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Direct(_, kitchen_power) = &sent[0] else {
        panic!("expected direct send");
    };
    assert_eq!(kitchen_power.kind, MessageType::SetPower.code());
    assert_eq!(kitchen_power.target.to_string(), "d073d5aaaaaa");
}

#[tokio::test]
async fn commands_without_label_are_broadcast() {
    let fixture = fixture().await;
    fixture.service.set_power(true, None).await.expect("power");
    let command = ColorCommand::parse("0000ff").unwrap();
    fixture
        .service
        .set_color(&command, None)
        .await
        .expect("color");

    let sent = fixture.dispatcher.sent();
    assert_eq!(sent.len(), 2);
    for item in &sent {
        let Sent::Broadcast(packet) = item else {
            panic!("expected broadcast");
        };
        assert!(packet.target.is_broadcast());
    }
}

#[tokio::test]
async fn labelled_commands_need_known_device() {
    let fixture = fixture().await;
    let err = fixture
        .service
        .set_power(false, Some("Garage"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Light not found: Garage");

    let bad = ColorCommand::parse("zzzzzz").unwrap();
    let err = fixture
        .service
        .set_color(&bad, Some("Kitchen"))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidColor(_)));
    assert!(fixture.dispatcher.sent().is_empty());
}

#[tokio::test]
async fn offline_gateway_is_not_an_error() {
    let devices = Arc::new(InMemoryDeviceStore::new());
    devices
        .upsert(light("d073d5aaaaaa", "Kitchen", true), now_epoch_ms())
        .await
        .unwrap();
    let service = LightService::new(
        devices,
        Arc::new(InMemoryActivePatternStore::new()),
        Arc::new(patterns()),
        Arc::new(FailingDispatcher),
    );
    service
        .set_power(false, Some("Kitchen"))
        .await
        .expect("accepted");
    service.set_power(true, None).await.expect("accepted");
}

#[tokio::test]
async fn export_describes_devices() {
    let fixture = fixture().await;
    let exported = fixture.service.export().await.expect("export");
    assert_eq!(exported["Kitchen"], "#ff8800 2700K");
    assert_eq!(exported["Lounge"], "off");
    assert_eq!(fixture.service.pattern_names(), vec!["broken", "evening"]);
}
