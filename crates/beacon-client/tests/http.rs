//! End-to-end through the real HTTP event source against a mock server.

mod common;

use beacon_client::{NotificationHub, Role, StopReason};
use beacon_core::NotificationKind;
use beacon_settings::BeaconSettings;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{stopped, within};

fn settings_for(server: &MockServer) -> BeaconSettings {
    let mut settings = BeaconSettings::default();
    settings.stream.base_url = server.uri();
    settings
}

#[tokio::test]
async fn streams_notifications_to_leader_and_follower() {
    let server = MockServer::start().await;
    let body = concat!(
        ":heartbeat\n\n",
        "data: {\"type\":\"balance_updated\",\"title\":\"Saldo\",\"message\":\"+10\",\"timestamp\":\"2024-01-01T00:00:00Z\"}\n\n",
        "data: {\"type\":\"sms_received\",\"title\":\"SMS\",\"message\":\"Code 482913\",\"playSound\":true,\"timestamp\":\"2024-01-01T00:00:00Z\"}\n\n",
        "data: {not json}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/notifications/stream/42"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let hub = NotificationHub::new(settings_for(&server)).unwrap();
    let leader_tab = hub.open_context();
    let follower_tab = hub.open_context();
    let mut leader_bus = leader_tab.events();
    let mut follower_bus = follower_tab.events();

    let leader = leader_tab.watch(42u64);
    let follower = follower_tab.watch(42u64);
    assert_eq!(leader.role(), Role::Leader);
    assert_eq!(follower.role(), Role::Follower);

    for bus in [&mut leader_bus, &mut follower_bus] {
        let first = within(bus.recv()).await.unwrap();
        assert_eq!(first.kind, NotificationKind::BalanceUpdated);
        let second = within(bus.recv()).await.unwrap();
        assert_eq!(second.kind, NotificationKind::SmsReceived);
        assert_eq!(second.message, "Code 482913");
        assert!(second.plays_sound());
    }

    hub.shutdown();
}

#[tokio::test]
async fn forbidden_makes_a_single_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let hub = NotificationHub::new(settings_for(&server)).unwrap();
    let mut sub = hub.open_context().watch(42u64);

    assert_eq!(stopped(&mut sub).await, Some(StopReason::Unauthorized));
    assert!(!sub.is_connected());
    assert_eq!(hub.breaker().snapshot().failure_count, 0);
}

#[test]
fn invalid_settings_are_rejected() {
    let mut settings = BeaconSettings::default();
    settings.breaker.failure_threshold = 0;
    let err = NotificationHub::new(settings).unwrap_err();
    assert!(err.to_string().starts_with("invalid settings"));
}
