// Uploader tests: minute gate, payload build, posting to a stub collector

mod common;

use bytes::BytesMut;
use serde_json::json;
use server_exporter::probe_repo::ProbeRepo;
use server_exporter::state::{AggregateState, CpuWindow, MemWindow, WindowSnapshot};
use server_exporter::uploader::{
    MinuteGate, build_payload, minute_of_hour, post_payload, upload_window,
};

#[test]
fn minute_gate_fires_once_per_minute() {
    let mut gate = MinuteGate::new(0);
    assert!(!gate.check(1));
    assert!(!gate.check(59));
    assert!(gate.check(60));
    assert!(!gate.check(61));
    assert!(gate.check(120));
}

#[test]
fn armed_gate_fires_immediately() {
    let mut gate = MinuteGate::armed();
    assert!(gate.check(30));
    assert!(!gate.check(31));
}

#[test]
fn minute_of_hour_wraps() {
    assert_eq!(minute_of_hour(0), 0);
    assert_eq!(minute_of_hour(61), 1);
    assert_eq!(minute_of_hour(3600), 0);
}

fn seeded_snapshot() -> WindowSnapshot {
    WindowSnapshot {
        window_start: Some(1_700_000_000),
        cpu: CpuWindow {
            last_total: 0,
            last_idle: 0,
            is_first_sample: false,
            usage_rates: vec![10.0, 20.0, 30.0],
        },
        mem: MemWindow {
            total: 0,
            used_samples: vec![100, 200, 300],
        },
    }
}

#[test]
fn build_payload_scales_and_averages() {
    let payload = build_payload(&seeded_snapshot(), "web-01", 5000, 1500);
    assert_eq!(payload.ts, 1_700_000_000);
    assert_eq!(payload.server, "web-01");
    assert_eq!(payload.cpu_c, 2000.0);
    assert_eq!(payload.cpu_m, 10_000);
    assert_eq!(payload.mem_c, 200.0);
    assert_eq!(payload.mem_m, 0);
    assert_eq!(payload.disk_c, 1500);
    assert_eq!(payload.disk_m, 5000);
}

#[tokio::test]
async fn post_payload_sends_expected_body_and_headers() {
    let (endpoint, received) = common::stub_collector(json!({"code": 0})).await;
    let settings = common::test_settings(&endpoint);
    let client = reqwest::Client::new();
    let mut buffer = BytesMut::new();
    let payload = build_payload(&seeded_snapshot(), &settings.server_name, 5000, 1500);

    post_payload(&client, &settings, &mut buffer, &payload)
        .await
        .expect("stub replies code 0");

    let requests = received.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.app_key.as_deref(), Some("token"));
    assert_eq!(req.app_token.as_deref(), Some("secret"));
    assert_eq!(req.content_type.as_deref(), Some("application/json"));
    assert_eq!(req.body["ts"], 1_700_000_000_i64);
    assert_eq!(req.body["server"], "test-server");
    assert_eq!(req.body["cpu_c"], 2000.0);
    assert_eq!(req.body["cpu_m"], 10_000);
    assert_eq!(req.body["mem_c"], 200.0);
    assert_eq!(req.body["mem_m"], 0);
    assert_eq!(req.body["disk_c"], 1500);
    assert_eq!(req.body["disk_m"], 5000);
}

#[tokio::test]
async fn non_zero_reply_code_is_an_error_not_a_panic() {
    let (endpoint, _received) =
        common::stub_collector(json!({"code": 7, "message": "quota exceeded"})).await;
    let settings = common::test_settings(&endpoint);
    let client = reqwest::Client::new();
    let mut buffer = BytesMut::new();
    let payload = build_payload(&seeded_snapshot(), &settings.server_name, 0, 0);

    let err = post_payload(&client, &settings, &mut buffer, &payload)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("code=7"), "unexpected error: {msg}");
    assert!(msg.contains("quota exceeded"), "unexpected error: {msg}");
}

#[tokio::test]
async fn output_buffer_is_reset_between_uploads() {
    let (endpoint, received) = common::stub_collector(json!({"code": 0})).await;
    let settings = common::test_settings(&endpoint);
    let client = reqwest::Client::new();
    let mut buffer = BytesMut::new();

    let mut first = build_payload(&seeded_snapshot(), &settings.server_name, 5000, 1500);
    first.ts = 100;
    let mut second = first.clone();
    second.ts = 200;

    post_payload(&client, &settings, &mut buffer, &first)
        .await
        .unwrap();
    post_payload(&client, &settings, &mut buffer, &second)
        .await
        .unwrap();

    let requests = received.lock().unwrap();
    assert_eq!(requests.len(), 2);
    // A buffer that appended instead of resetting would not decode cleanly.
    assert_eq!(requests[0].body["ts"], 100);
    assert_eq!(requests[1].body["ts"], 200);
}

#[tokio::test]
async fn empty_window_skips_upload() {
    let (endpoint, received) = common::stub_collector(json!({"code": 0})).await;
    let settings = common::test_settings(&endpoint);
    let client = reqwest::Client::new();
    let mut buffer = BytesMut::new();
    let state = AggregateState::new();
    let probes = ProbeRepo::new();

    upload_window(&state, &probes, &client, &settings, &mut buffer).await;

    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transport_error_is_an_error_not_a_panic() {
    // Nothing listens on this port.
    let settings = common::test_settings("http://127.0.0.1:1");
    let client = reqwest::Client::new();
    let mut buffer = BytesMut::new();
    let payload = build_payload(&seeded_snapshot(), &settings.server_name, 0, 0);

    assert!(
        post_payload(&client, &settings, &mut buffer, &payload)
            .await
            .is_err()
    );
}
