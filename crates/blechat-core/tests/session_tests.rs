//! Session manager behaviour against scripted and simulated transports

use std::sync::Arc;
use std::time::Duration;

use blechat_core::{
    BlechatError, Message, Origin, SessionManager, SessionStatus, SimulatedTransport,
    SimulatorConfig, StaticPermission, Timestamp,
};

use test_utils::{
    device, wait_for_snapshot, MockTimeSource, RecordingHistoryStore, ScriptedScan,
    ScriptedTransport,
};

struct Harness {
    session: SessionManager,
    transport: Arc<ScriptedTransport>,
    store: Arc<RecordingHistoryStore>,
    clock: MockTimeSource,
}

fn harness() -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let store = Arc::new(RecordingHistoryStore::new());
    let clock = MockTimeSource::new_at(1_000);
    let session = SessionManager::builder(transport.clone())
        .history_store(store.clone())
        .time_source(Arc::new(clock.clone()))
        .build();

    Harness {
        session,
        transport,
        store,
        clock,
    }
}

// ----------------------------------------------------------------------------
// Discovery
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_rediscovery_refreshes_in_place() {
    let h = harness();
    h.transport.push_scan(ScriptedScan::found(vec![
        device("A", -55),
        device("B", -63),
        device("A", -50),
    ]));

    h.session.start_scan().await.unwrap();

    let snapshot = h.session.snapshot();
    let seen: Vec<_> = snapshot
        .devices
        .iter()
        .map(|d| (d.id.as_str(), d.signal_strength))
        .collect();
    assert_eq!(seen, vec![("A", Some(-50)), ("B", Some(-63))]);
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(!snapshot.scanning);
}

#[tokio::test(start_paused = true)]
async fn test_new_scan_resets_devices_first() {
    let h = harness();
    h.transport
        .push_scan(ScriptedScan::found(vec![device("A", -55), device("B", -63)]));
    h.transport
        .push_scan(ScriptedScan::found(vec![device("C", -70)]).delayed(Duration::from_millis(500)));

    h.session.start_scan().await.unwrap();
    assert_eq!(h.session.snapshot().devices.len(), 2);

    let session = h.session.clone();
    let scan = tokio::spawn(async move { session.start_scan().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let during = h.session.snapshot();
    assert_eq!(during.status, SessionStatus::Scanning);
    assert!(during.scanning);
    assert!(during.devices.is_empty());

    scan.await.unwrap().unwrap();
    let ids: Vec<_> = h
        .session
        .snapshot()
        .devices
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["C"]);
}

#[tokio::test]
async fn test_scan_failure_sets_error() {
    let h = harness();
    h.transport
        .push_scan(ScriptedScan::failing(BlechatError::transport("adapter off")));

    let result = h.session.start_scan().await;

    assert_eq!(result, Err(BlechatError::transport("adapter off")));
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert!(!snapshot.scanning);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Transport error: adapter off")
    );
}

#[tokio::test]
async fn test_scan_failure_while_connected_sets_error() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();
    h.transport
        .push_scan(ScriptedScan::failing(BlechatError::PermissionDenied));

    assert!(h.session.start_scan().await.is_err());

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert!(!snapshot.scanning);
    // The link itself is untouched
    assert!(snapshot.is_connected());
    assert!(h.session.has_active_subscription().await);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Bluetooth permission not granted")
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_transport_scan_registers_drops_late_devices() {
    let h = harness();
    h.transport
        .push_scan(ScriptedScan::found(vec![device("D", -40)]).delayed(Duration::from_millis(500)));

    let session = h.session.clone();
    let scan = tokio::spawn(async move { session.start_scan().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The scripted transport ignores stop requests and reports anyway
    h.session.stop_scan().await;
    scan.await.unwrap().unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(!snapshot.scanning);
    assert!(snapshot.devices.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_scan_keeps_found_devices() {
    let transport = Arc::new(SimulatedTransport::new(
        SimulatorConfig::default().with_ping_interval(None),
    ));
    let session = SessionManager::new(transport);

    let scanner = session.clone();
    let scan = tokio::spawn(async move { scanner.start_scan().await });
    let found = wait_for_snapshot(&session, |s| s.devices.len() == 2).await;
    assert!(found.scanning);

    session.stop_scan().await;
    session.stop_scan().await;
    scan.await.unwrap().unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(!snapshot.scanning);
    assert_eq!(snapshot.devices.len(), 2);
}

#[tokio::test]
async fn test_stop_scan_when_idle_is_noop() {
    let h = harness();
    let before = h.session.snapshot();
    h.session.stop_scan().await;
    assert_eq!(h.session.snapshot(), before);
}

#[tokio::test]
async fn test_permission_denied_scan() {
    let transport = Arc::new(SimulatedTransport::with_permissions(
        SimulatorConfig::default(),
        Arc::new(StaticPermission::new(false)),
    ));
    let session = SessionManager::new(transport);

    assert_eq!(
        session.start_scan().await,
        Err(BlechatError::PermissionDenied)
    );
    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Bluetooth permission not granted")
    );
}

// ----------------------------------------------------------------------------
// Connection
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_loads_exactly_persisted_history() {
    let h = harness();
    let history = vec![
        Message::local("earlier", Timestamp::new(10)),
        Message::remote("reply", Timestamp::new(20)),
    ];
    h.store.seed("X", &history).await;

    let connected = h.session.connect_to_device("X").await.unwrap();

    assert_eq!(connected.id, "X");
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Connected);
    assert_eq!(snapshot.connected_device, Some(connected));
    assert_eq!(snapshot.messages, history);
    assert_eq!(h.store.load_count(), 1);
    assert_eq!(h.store.save_count(), 0);
    assert!(h.session.has_active_subscription().await);
    assert!(h.transport.has_listener());
}

#[tokio::test]
async fn test_failed_connect_skips_history() {
    let h = harness();
    h.transport.fail_connect(Some(BlechatError::not_found("X")));

    let result = h.session.connect_to_device("X").await;

    assert_eq!(result, Err(BlechatError::not_found("X")));
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.connected_device, None);
    assert_eq!(snapshot.last_error.as_deref(), Some("Device not found: X"));
    assert_eq!(h.store.load_count(), 0);
    assert!(!h.session.has_active_subscription().await);
    assert!(!h.transport.has_listener());
}

#[tokio::test]
async fn test_history_load_failure_tears_down() {
    let h = harness();
    h.store.set_fail_loads(true);

    assert!(h.session.connect_to_device("X").await.is_err());

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.connected_device, None);
    assert!(!h.session.has_active_subscription().await);
    assert_eq!(h.transport.disconnect_count(), 1);
}

#[tokio::test]
async fn test_connect_while_connected_replaces_connection() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();
    h.session.connect_to_device("Y").await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.connected_device.map(|d| d.id).as_deref(), Some("Y"));
    assert_eq!(h.transport.connect_count(), 2);
    assert_eq!(h.transport.disconnect_count(), 1);
    assert!(h.session.has_active_subscription().await);
}

#[tokio::test]
async fn test_connection_and_subscription_move_together() {
    let h = harness();
    let paired = |connected: bool, subscribed: bool| connected == subscribed;

    h.session.connect_to_device("X").await.unwrap();
    assert!(paired(
        h.session.snapshot().is_connected(),
        h.session.has_active_subscription().await
    ));

    h.session.disconnect().await;
    assert!(!h.session.snapshot().is_connected());
    assert!(!h.session.has_active_subscription().await);

    h.transport.fail_connect(Some(BlechatError::NotConnected));
    let _ = h.session.connect_to_device("X").await;
    assert!(paired(
        h.session.snapshot().is_connected(),
        h.session.has_active_subscription().await
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_scan_goes_idle() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();
    h.transport
        .push_scan(ScriptedScan::found(vec![device("A", -55)]).delayed(Duration::from_millis(500)));

    let session = h.session.clone();
    let scan = tokio::spawn(async move { session.start_scan().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.session.snapshot().status, SessionStatus::Scanning);

    h.session.disconnect().await;
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(!snapshot.is_connected());
    assert!(snapshot.scanning);

    scan.await.unwrap().unwrap();
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(!snapshot.scanning);
    assert_eq!(snapshot.devices.len(), 1);
}

#[tokio::test]
async fn test_disconnect_when_idle() {
    let h = harness();
    h.session.disconnect().await;
    assert_eq!(h.session.snapshot().status, SessionStatus::Idle);
}

#[tokio::test]
async fn test_disconnect_releases_listener() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();

    h.session.disconnect().await;

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.messages.is_empty());
    assert!(!h.transport.has_listener());
    assert!(!h.transport.notify_from("X", "late"));
}

// ----------------------------------------------------------------------------
// Messaging
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_messages_are_ignored() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();

    assert_eq!(h.session.send_message("").await, Ok(None));
    assert_eq!(h.session.send_message("   ").await, Ok(None));

    assert!(h.session.snapshot().messages.is_empty());
    assert_eq!(h.store.save_count(), 0);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_send_without_connection_is_ignored() {
    let h = harness();
    assert_eq!(h.session.send_message("hello").await, Ok(None));
    assert_eq!(h.store.save_count(), 0);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_send_then_receive() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();

    let sent = h.session.send_message("  hi ").await.unwrap().unwrap();
    assert_eq!(sent.text, "hi");
    assert_eq!(h.transport.sent(), vec!["hi"]);

    h.clock.advance(500);
    assert!(h.transport.notify("hello"));
    let snapshot = wait_for_snapshot(&h.session, |s| s.messages.len() == 2).await;

    let log: Vec<_> = snapshot
        .messages
        .iter()
        .map(|m| (m.origin, m.text.as_str(), m.timestamp.as_millis()))
        .collect();
    assert_eq!(
        log,
        vec![
            (Origin::Local, "hi", 1_000),
            (Origin::Remote, "hello", 1_500),
        ]
    );
    assert_eq!(h.store.persisted("X").await, snapshot.messages);
}

#[tokio::test]
async fn test_send_failure_keeps_message() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();
    h.transport
        .fail_send(Some(BlechatError::transport("write rejected")));

    let result = h.session.send_message("hi").await;

    assert_eq!(result, Err(BlechatError::transport("write rejected")));
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Connected);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Transport error: write rejected")
    );
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].text, "hi");
    assert_eq!(h.store.persisted("X").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_during_scan_keeps_scanning_status() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();
    h.transport
        .push_scan(ScriptedScan::found(vec![device("A", -55)]).delayed(Duration::from_millis(500)));
    h.transport
        .fail_send(Some(BlechatError::transport("write rejected")));

    let session = h.session.clone();
    let scan = tokio::spawn(async move { session.start_scan().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.session.send_message("hi").await.is_err());
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Scanning);
    assert!(snapshot.scanning);

    scan.await.unwrap().unwrap();
    assert_eq!(h.session.snapshot().status, SessionStatus::Connected);
}

#[tokio::test]
async fn test_save_failure_still_writes() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();
    h.store.set_fail_saves(true);

    let sent = h.session.send_message("hi").await.unwrap();

    assert!(sent.is_some());
    assert_eq!(h.transport.sent(), vec!["hi"]);
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Connected);
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("History storage error: disk full")
    );
}

#[tokio::test]
async fn test_timestamps_never_go_backwards() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();

    h.clock.set_time(5_000);
    h.session.send_message("first").await.unwrap();
    h.clock.set_time(2_000);
    h.session.send_message("second").await.unwrap();

    let messages = h.session.snapshot().messages;
    let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(messages[1].timestamp, Timestamp::new(5_000));
}

#[tokio::test]
async fn test_inbound_filtering() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();

    assert!(h.transport.notify_from("Y", "stray"));
    assert!(h.transport.notify("   "));
    assert!(h.transport.notify("real"));

    let snapshot = wait_for_snapshot(&h.session, |s| !s.messages.is_empty()).await;
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].text, "real");
}

#[tokio::test]
async fn test_fault_reports_error_and_stays_connected() {
    let h = harness();
    h.session.connect_to_device("X").await.unwrap();

    assert!(h.transport.fault("link lost"));
    let snapshot = wait_for_snapshot(&h.session, |s| s.last_error.is_some()).await;

    assert_eq!(snapshot.last_error.as_deref(), Some("link lost"));
    assert_eq!(snapshot.status, SessionStatus::Connected);
}

#[tokio::test]
async fn test_clear_error() {
    let h = harness();
    h.transport.fail_connect(Some(BlechatError::NotConnected));
    let _ = h.session.connect_to_device("X").await;

    h.session.clear_error().await;

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.last_error, None);
    assert_eq!(snapshot.status, SessionStatus::Error);
}

// ----------------------------------------------------------------------------
// Simulated End To End
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_simulated_echo_round_trip() {
    let transport = Arc::new(SimulatedTransport::new(
        SimulatorConfig::default().with_ping_interval(None),
    ));
    let session = SessionManager::new(transport);

    session.start_scan().await.unwrap();
    assert_eq!(session.snapshot().devices.len(), 3);

    session.connect_to_device("mock-alpha").await.unwrap();
    session.send_message("hi").await.unwrap();

    let snapshot = wait_for_snapshot(&session, |s| s.messages.len() == 2).await;
    assert_eq!(snapshot.messages[1].text, "Echo: hi");
    assert_eq!(snapshot.messages[1].origin, Origin::Remote);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_unresponsive_device_times_out() {
    let transport = Arc::new(SimulatedTransport::new(
        SimulatorConfig::default()
            .with_ping_interval(None)
            .with_unresponsive_device("mock-gamma"),
    ));
    let session = SessionManager::new(transport);

    let result = session.connect_to_device("mock-gamma").await;

    assert_eq!(result, Err(BlechatError::Timeout { duration_ms: 15_000 }));
    assert_eq!(session.snapshot().status, SessionStatus::Error);
}
