use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use weave_types::{DeviceKind, DeviceRecord, DeviceStatus};

fn record() -> DeviceRecord {
    DeviceRecord::local("workbench", DeviceKind::Desktop, "192.168.1.20", 8000)
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn local_record_is_online() {
    let r = record();
    assert_eq!(r.status, DeviceStatus::Online);
    assert_eq!(r.name, "workbench");
    assert_eq!(r.kind, DeviceKind::Desktop);
    assert!(!r.platform.is_empty());
    assert!(!r.version.is_empty());
}

#[test]
fn api_addr_joins_host_and_port() {
    assert_eq!(record().api_addr(), "192.168.1.20:8000");
}

#[test]
fn with_capabilities_builder() {
    let r = record().with_capabilities(vec!["sync".into(), "search".into()]);
    assert_eq!(r.capabilities, vec!["sync".to_string(), "search".to_string()]);
}

// ── Derived status ───────────────────────────────────────────────

#[test]
fn status_is_online_before_timeout() {
    let r = record();
    let now = r.last_seen + Duration::seconds(29);
    assert_eq!(r.status_at(now, Duration::seconds(30)), DeviceStatus::Online);
}

#[test]
fn status_is_offline_at_exactly_the_timeout() {
    let r = record();
    let now = r.last_seen + Duration::seconds(30);
    assert_eq!(r.status_at(now, Duration::seconds(30)), DeviceStatus::Offline);
}

#[test]
fn status_is_offline_past_the_timeout() {
    let r = record();
    let now = r.last_seen + Duration::seconds(300);
    assert_eq!(r.status_at(now, Duration::seconds(30)), DeviceStatus::Offline);
}

#[test]
fn touch_refreshes_last_seen() {
    let mut r = record();
    let later = Utc::now() + Duration::seconds(10);
    r.touch(later);
    assert_eq!(r.last_seen, later);
}

// ── Wire format ──────────────────────────────────────────────────

#[test]
fn serializes_kind_as_type_field() {
    let json = serde_json::to_value(record()).unwrap();
    assert_eq!(json["type"], "desktop");
    assert!(json.get("kind").is_none());
    assert_eq!(json["status"], "online");
    assert_eq!(json["ip_address"], "192.168.1.20");
    assert_eq!(json["port"], 8000);
}

#[test]
fn deserializes_from_announcement_payload() {
    let json = r#"{
        "id": "0191f3a8-5b7e-7c61-b0f0-111111111111",
        "name": "study-pc",
        "type": "server",
        "platform": "linux-x86_64",
        "ip_address": "10.0.0.3",
        "port": 8000,
        "version": "0.4.1",
        "capabilities": ["sync"],
        "last_seen": "2026-08-01T10:00:00Z",
        "status": "online"
    }"#;
    let r: DeviceRecord = serde_json::from_str(json).unwrap();
    assert_eq!(r.kind, DeviceKind::Server);
    assert_eq!(r.ip_address, "10.0.0.3");
    assert_eq!(r.capabilities, vec!["sync".to_string()]);
}

#[test]
fn kind_parses_from_wire_strings() {
    assert_eq!("server".parse::<DeviceKind>().unwrap(), DeviceKind::Server);
    assert_eq!("desktop".parse::<DeviceKind>().unwrap(), DeviceKind::Desktop);
    assert_eq!("mobile".parse::<DeviceKind>().unwrap(), DeviceKind::Mobile);
    assert!("toaster".parse::<DeviceKind>().is_err());
}

#[test]
fn record_serde_roundtrip() {
    let r = record().with_capabilities(vec!["sync".into()]);
    let json = serde_json::to_string(&r).unwrap();
    let back: DeviceRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(r, back);
}
