//! Connection supervisor event handling tests
//!
//! Feed routed broker events through the supervisor with a mock subscriber and
//! check subscriptions and dispatch without a live broker.

use raspi_off::config::DaemonConfig;
use raspi_off::dispatch::{ActionDispatcher, HostAction};
use raspi_off::testing::{MockCommandRunner, MockSubscriber};
use raspi_off::transport::mqtt::{
    ConnectionState, ConnectionSupervisor, EventRoute, RouteOutcome,
};
use rumqttc::QoS;

fn supervisor_for(base_topic: &str) -> (ConnectionSupervisor, MockCommandRunner) {
    let runner = MockCommandRunner::new();
    let (handle, _worker) = ActionDispatcher::new(runner.clone()).spawn();
    let mut config = DaemonConfig::default();
    config.mqtt.base_topic = base_topic.to_string();
    let supervisor = ConnectionSupervisor::new("raspi-off-010203040506", &config, handle)
        .expect("default config should build a supervisor");
    (supervisor, runner)
}

#[tokio::test]
async fn test_every_connection_subscribes_both_topics_again() {
    let (supervisor, _) = supervisor_for("raspi-off");
    let subscriber = MockSubscriber::new();

    for reconnect in 1..=3u32 {
        subscriber.clear_history().await;
        let mut attempts = reconnect;

        let outcome = supervisor
            .process_event_route(EventRoute::ConnectionAcknowledged, &subscriber, &mut attempts)
            .await;

        assert!(matches!(outcome, RouteOutcome::Continue));
        assert_eq!(attempts, 0, "reconnect counter resets on ConnAck");
        assert_eq!(
            subscriber.subscriptions().await,
            vec![
                ("raspi-off/reboot".to_string(), QoS::AtLeastOnce),
                ("raspi-off/shutdown".to_string(), QoS::AtLeastOnce),
            ]
        );
    }
}

#[tokio::test]
async fn test_disconnect_then_connack_restores_connected_state() {
    let (supervisor, _) = supervisor_for("raspi-off");
    let subscriber = MockSubscriber::new();
    let mut attempts = 0;

    let outcome = supervisor
        .process_event_route(EventRoute::Disconnected, &subscriber, &mut attempts)
        .await;
    assert!(matches!(outcome, RouteOutcome::Reconnect(_)));
    assert!(matches!(
        supervisor.connection_state(),
        ConnectionState::Disconnected(_)
    ));

    supervisor
        .process_event_route(EventRoute::ConnectionAcknowledged, &subscriber, &mut attempts)
        .await;
    assert_eq!(supervisor.connection_state(), ConnectionState::Connected);
    assert_eq!(subscriber.subscriptions().await.len(), 2);
}

#[tokio::test]
async fn test_received_publish_reaches_dispatcher() {
    let runner = MockCommandRunner::new();
    let (handle, worker) = ActionDispatcher::new(runner.clone()).spawn();
    let mut config = DaemonConfig::default();
    config.mqtt.base_topic = "home/raspi-off".to_string();
    let supervisor = ConnectionSupervisor::new("raspi-off-test", &config, handle).unwrap();

    let subscriber = MockSubscriber::new();
    let mut attempts = 0;
    let outcome = supervisor
        .process_event_route(
            EventRoute::MessageReceived {
                topic: "home/raspi-off/shutdown".to_string(),
                payload: b"+10".to_vec(),
                retain: false,
            },
            &subscriber,
            &mut attempts,
        )
        .await;
    assert!(matches!(outcome, RouteOutcome::Continue));

    // Dropping the supervisor closes the queue so the worker drains and exits
    drop(supervisor);
    worker.await.unwrap();

    let executed = runner.executed().await;
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].action, HostAction::Shutdown);
    assert_eq!(executed[0].delay, "+10");
}
