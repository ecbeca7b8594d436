// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: queue -> in-process bus -> worker -> mock adapter.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use pushline_core::{Device, PushError, Where};
use pushline_push::PushState;
use pushline_test_utils::{MockPushAdapter, TestHarness};

const WAIT: Duration = Duration::from_secs(2);

fn device(i: usize, device_type: &str) -> Device {
    Device::new(format!("d{i}"), device_type, format!("token-{i}"))
        .with_created_at(Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap())
}

fn ios_devices(n: usize) -> Vec<Device> {
    (0..n).map(|i| device(i, "ios")).collect()
}

fn where_of(value: Value) -> Where {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn ten_devices_in_batches_of_three() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(10))
        .with_batch_size(3)
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {"alert": "hello"}}), Where::new())
        .await
        .unwrap();
    assert_eq!(status.running_calls(), 1);
    assert_eq!(status.expected(), 10);

    assert!(harness.wait_for_deliveries(10, WAIT).await);
    assert!(
        harness
            .wait_for(WAIT, || status.state() == PushState::Succeeded)
            .await
    );

    let sends = harness.adapter.sends().await;
    assert_eq!(sends.len(), 4);
    assert!(sends.iter().all(|s| s.devices.len() <= 3));
    assert!(sends.iter().all(|s| s.push_status_id == status.snapshot().object_id));

    let ids: HashSet<String> = sends.iter().flat_map(|s| s.object_ids()).collect();
    assert_eq!(ids.len(), 10);
    assert_eq!(status.num_sent(), 10);
    assert_eq!(status.remaining(), 0);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn device_removed_after_enqueue_is_not_delivered() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(10))
        .with_batch_size(3)
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {"alert": "hello"}}), Where::new())
        .await
        .unwrap();
    // The worker has not run yet on this single-threaded runtime.
    assert!(harness.devices.remove("d0"));

    assert!(harness.wait_for_deliveries(9, WAIT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sends = harness.adapter.sends().await;
    let ids: Vec<String> = sends.iter().flat_map(|s| s.object_ids()).collect();
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), 9);
    assert_eq!(unique.len(), 9);
    assert!(!unique.contains(&"d0".to_string()));
    assert_eq!(status.num_sent(), 9);
    assert_eq!(status.remaining(), 1);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn badge_increment_fans_out_per_stored_badge() {
    let devices = vec![
        device(0, "ios").with_badge(1),
        device(1, "ios").with_badge(1),
        device(2, "ios").with_badge(5),
        device(3, "android"),
    ];
    let harness = TestHarness::builder()
        .with_devices(devices)
        .with_batch_size(10)
        .build()
        .unwrap();

    harness
        .push(json!({"data": {"alert": "hi", "badge": "Increment"}}), Where::new())
        .await
        .unwrap();
    assert!(harness.wait_for_deliveries(4, WAIT).await);

    for send in harness.adapter.sends().await {
        let badge = send.body["data"].get("badge").cloned();
        match send.object_ids().as_slice() {
            [a, b] if a == "d0" && b == "d1" => assert_eq!(badge, Some(json!(1))),
            [c] if c == "d2" => assert_eq!(badge, Some(json!(5))),
            [d] if d == "d3" => assert_eq!(badge, None),
            other => panic!("unexpected group {other:?}"),
        }
    }

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn locale_variants_reach_matching_devices() {
    let devices = vec![
        device(0, "ios").with_locale("fr-CA"),
        device(1, "android").with_locale("en-GB"),
        device(2, "ios").with_locale("de-DE"),
    ];
    let harness = TestHarness::builder()
        .with_devices(devices)
        .build()
        .unwrap();

    harness
        .push(
            json!({"data": {"alert": "Hello", "alert-fr": "Bonjour", "title-en": "Greetings"}}),
            Where::new(),
        )
        .await
        .unwrap();
    assert!(harness.wait_for_deliveries(3, WAIT).await);

    for send in harness.adapter.sends().await {
        let data = &send.body["data"];
        match send.object_ids()[0].as_str() {
            "d0" => assert_eq!(*data, json!({"alert": "Bonjour"})),
            "d1" => assert_eq!(*data, json!({"alert": "Hello", "title": "Greetings"})),
            "d2" => assert_eq!(*data, json!({"alert": "Hello"})),
            other => panic!("unexpected device {other}"),
        }
    }

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn where_constraint_limits_targets() {
    let devices = vec![device(0, "ios"), device(1, "android"), device(2, "android")];
    let harness = TestHarness::builder()
        .with_devices(devices)
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {"alert": "x"}}), where_of(json!({"deviceType": "android"})))
        .await
        .unwrap();
    assert_eq!(status.expected(), 2);
    assert!(harness.wait_for_deliveries(2, WAIT).await);

    let sends = harness.adapter.sends().await;
    assert!(
        sends
            .iter()
            .flat_map(|s| s.devices.iter())
            .all(|d| d.device_type == "android")
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn unsupported_device_type_is_rejected_before_enqueue() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(3))
        .with_adapter(MockPushAdapter::new().with_valid_push_types(&["ios"]))
        .build()
        .unwrap();

    let err = harness
        .push(json!({"data": {}}), where_of(json!({"deviceType": {"$in": ["ios", "winrt"]}})))
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::PushMisconfigured(ref m) if m.contains("winrt")));
    assert!(harness.statuses.is_empty());

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn push_matching_nothing_completes_immediately() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(3))
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {}}), where_of(json!({"deviceType": "android"})))
        .await
        .unwrap();
    assert_eq!(status.state(), PushState::Succeeded);
    assert_eq!(status.expected(), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(harness.adapter.sends().await.is_empty());

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_tokens_are_reported_for_removal() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(4))
        .with_adapter(MockPushAdapter::new().reject_token("token-2", "Unregistered"))
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {"alert": "x"}}), Where::new())
        .await
        .unwrap();
    assert!(
        harness
            .wait_for(WAIT, || status.state() == PushState::Succeeded)
            .await
    );

    assert_eq!(status.num_sent(), 3);
    assert_eq!(status.num_failed(), 1);
    assert_eq!(status.devices_to_remove(), vec!["token-2"]);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn adapter_failure_does_not_stop_the_worker() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(4))
        .with_batch_size(2)
        .with_adapter(MockPushAdapter::new().fail_with("gateway down"))
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {"alert": "x"}}), Where::new())
        .await
        .unwrap();
    assert!(harness.wait_for_deliveries(4, WAIT).await);
    assert_eq!(harness.adapter.sends().await.len(), 2);
    assert_eq!(status.num_sent(), 0);
    assert_eq!(status.state(), PushState::Running);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn backlog_larger_than_bus_capacity_is_fully_delivered() {
    let harness = TestHarness::builder()
        .with_devices(ios_devices(300))
        .with_batch_size(1)
        .with_bus_queue_capacity(16)
        .build()
        .unwrap();

    let status = harness
        .push(json!({"data": {"alert": "everyone"}}), Where::new())
        .await
        .unwrap();
    assert!(harness.wait_for_deliveries(300, Duration::from_secs(20)).await);
    assert!(
        harness
            .wait_for(WAIT, || status.state() == PushState::Succeeded)
            .await
    );
    assert_eq!(status.num_sent(), 300);
    assert_eq!(status.remaining(), 0);

    harness.shutdown().await.unwrap();
}
