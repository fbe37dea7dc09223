//! Impure I/O operations for the MQTT connection supervisor
//!
//! This module owns the rumqttc event loop: it drives the connection, re-issues
//! both subscriptions on every ConnAck, hands publishes to the dispatcher and
//! retries forever when the connection drops.

use super::connection::{
    configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig, TopicBuilder,
};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{DaemonConfig, MqttSection, QosLevel};
use crate::dispatch::{DispatcherHandle, InboundMessage};
use crate::transport::TopicSubscriber;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, NetworkOptions, QoS, Request};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument, Span};

/// Capacity of the rumqttc request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Upper bound on draining the event loop after requesting a disconnect
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What the run loop should do after an event has been processed
#[derive(Debug)]
pub enum RouteOutcome {
    /// Keep polling the current event loop
    Continue,
    /// The connection is gone; back off and let rumqttc reconnect
    Reconnect(String),
    /// A subscription failed; the session cannot be trusted
    SubscriptionFailed(MqttError),
}

/// Owns the broker connection lifecycle
pub struct ConnectionSupervisor {
    client_id: String,
    mqtt_options: MqttOptions,
    connect_timeout: Duration,
    topics: Vec<String>,
    qos: QoS,
    reconnect_config: ReconnectConfig,
    fail_fast: bool,
    dispatcher: DispatcherHandle,
    state_tx: watch::Sender<ConnectionState>,
    span: Span,
}

impl ConnectionSupervisor {
    /// Build a supervisor for `client_id`. No network I/O happens until [`run`](Self::run).
    pub fn new(
        client_id: &str,
        config: &DaemonConfig,
        dispatcher: DispatcherHandle,
    ) -> Result<Self, MqttError> {
        let credentials = config
            .get_mqtt_username()
            .map(|user| (user, config.get_mqtt_password().unwrap_or_default()));

        Self::from_section(
            client_id,
            &config.mqtt,
            credentials,
            config.daemon.fail_fast,
            dispatcher,
        )
    }

    fn from_section(
        client_id: &str,
        config: &MqttSection,
        credentials: Option<(String, String)>,
        fail_fast: bool,
        dispatcher: DispatcherHandle,
    ) -> Result<Self, MqttError> {
        let qos: QosLevel = config
            .qos_level()
            .map_err(|e| MqttError::InvalidConfig(e.to_string()))?;
        let mqtt_options = configure_mqtt_options(client_id, config, credentials)?;
        let reconnect_config = ReconnectConfig::from_section(config);
        HealthMonitor::validate_reconnect_config(&reconnect_config)
            .map_err(MqttError::InvalidConfig)?;

        let (state_tx, _) = watch::channel(ConnectionState::Connecting);

        Ok(Self {
            client_id: client_id.to_string(),
            mqtt_options,
            connect_timeout: config.connect_timeout(),
            topics: TopicBuilder::build_subscription_topics(&config.base_topic),
            qos: qos.into(),
            reconnect_config,
            fail_fast,
            dispatcher,
            state_tx,
            span: crate::mqtt_span!(client_id = %client_id),
        })
    }

    /// Override the reconnection policy
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.reconnect_config = reconnect_config;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Topics subscribed on every connection, reboot first
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Observe connection state transitions
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Returns an error only for a subscription failure with fail-fast enabled.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), MqttError> {
        let span = self.span.clone();
        self.run_loop(shutdown).instrument(span).await
    }

    async fn run_loop(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), MqttError> {
        info!("MQTT Client ID: {}", self.client_id);
        let (host, port) = self.mqtt_options.broker_address();
        info!("MQTT Server: {}:{}", host, port);

        let (mut client, mut event_loop) = self.create_connection();
        let mut reconnect_attempts = 0u32;
        let mut ever_connected = false;

        loop {
            let outcome = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT supervisor");
                        break;
                    }
                    continue;
                }

                event_result = event_loop.poll() => match event_result {
                    Ok(event) => {
                        let route = MessageHandler::route_mqtt_event(&event);
                        if matches!(route, EventRoute::ConnectionAcknowledged) {
                            ever_connected = true;
                        }
                        self.process_event_route(route, &client, &mut reconnect_attempts)
                            .await
                    }
                    Err(e) => {
                        self.set_state(HealthMonitor::determine_next_state(
                            ConnectionEvent::NetworkError(e.to_string()),
                        ));
                        RouteOutcome::Reconnect(e.to_string())
                    }
                },
            };

            match outcome {
                RouteOutcome::Continue => {}
                RouteOutcome::Reconnect(reason) => {
                    debug!("Connection interrupted: {}", reason);
                    discard_stale_requests(&mut event_loop);
                    if !self
                        .wait_before_reconnect(&mut reconnect_attempts, ever_connected, &shutdown_rx)
                        .await
                    {
                        break;
                    }
                }
                RouteOutcome::SubscriptionFailed(e) => {
                    self.set_state(HealthMonitor::determine_next_state(
                        ConnectionEvent::SubscriptionFailed(e.to_string()),
                    ));
                    if self.fail_fast {
                        error!("Subscription failed and fail-fast is enabled: {}", e);
                        return Err(e);
                    }

                    error!("Subscription failed, dropping connection to retry: {}", e);
                    if !self
                        .wait_before_reconnect(&mut reconnect_attempts, ever_connected, &shutdown_rx)
                        .await
                    {
                        break;
                    }
                    // A fresh session guarantees no half-subscribed state carries over
                    (client, event_loop) = self.create_connection();
                }
            }
        }

        self.graceful_shutdown(&client, &mut event_loop).await;
        Ok(())
    }

    /// Process routed MQTT event - generic over the subscriber for testability
    pub async fn process_event_route<S: TopicSubscriber>(
        &self,
        route: EventRoute,
        subscriber: &S,
        reconnect_attempts: &mut u32,
    ) -> RouteOutcome {
        match route {
            EventRoute::ConnectionAcknowledged => {
                self.set_state(HealthMonitor::determine_next_state(
                    ConnectionEvent::ConnAckReceived,
                ));
                *reconnect_attempts = 0;
                match self.subscribe_all(subscriber).await {
                    Ok(()) => RouteOutcome::Continue,
                    Err(e) => RouteOutcome::SubscriptionFailed(e),
                }
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                return_codes,
            } => match MessageHandler::validate_subscription_success(&return_codes) {
                Ok(()) => RouteOutcome::Continue,
                Err(reason) => RouteOutcome::SubscriptionFailed(MqttError::SubscriptionRejected(
                    format!("packet {packet_id}: {reason}"),
                )),
            },
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                debug!(topic = %topic, retain, "Received MQTT message");
                self.dispatcher
                    .dispatch(InboundMessage::new(topic, payload))
                    .await;
                RouteOutcome::Continue
            }
            EventRoute::Disconnected => {
                self.set_state(HealthMonitor::determine_next_state(
                    ConnectionEvent::DisconnectedByBroker,
                ));
                RouteOutcome::Reconnect("Broker disconnected".to_string())
            }
            EventRoute::DisconnectSent => RouteOutcome::Continue,
            EventRoute::InfrastructureEvent(event_str) => {
                tracing::trace!(target: "mqtt_transport", "MQTT event: {}", event_str);
                RouteOutcome::Continue
            }
            EventRoute::OutgoingEvent => RouteOutcome::Continue,
        }
    }

    /// Issue one subscribe request per topic at the configured QoS
    pub async fn subscribe_all<S: TopicSubscriber>(&self, subscriber: &S) -> Result<(), MqttError> {
        for topic in &self.topics {
            info!("Subscribing to: {}", topic);
            subscriber.subscribe(topic, self.qos).await?;
        }
        Ok(())
    }

    /// Unsubscribe from every topic, then request a clean disconnect
    pub async fn request_shutdown<S: TopicSubscriber>(&self, subscriber: &S) {
        for topic in &self.topics {
            if let Err(e) = subscriber.unsubscribe(topic).await {
                warn!("Failed to unsubscribe from {}: {}", topic, e);
            }
        }
        if let Err(e) = subscriber.disconnect().await {
            warn!("Failed to request disconnect: {}", e);
        }
    }

    fn create_connection(&self) -> (AsyncClient, EventLoop) {
        let (client, mut event_loop) =
            AsyncClient::new(self.mqtt_options.clone(), REQUEST_CHANNEL_CAPACITY);

        let mut network_options = NetworkOptions::new();
        network_options.set_connection_timeout(self.connect_timeout.as_secs());
        event_loop.set_network_options(network_options);

        (client, event_loop)
    }

    fn set_state(&self, new_state: ConnectionState) {
        let previous = self.state_tx.borrow().clone();
        if previous != new_state {
            HealthMonitor::log_state_transition(&previous, &new_state);
        }
        self.state_tx.send_replace(new_state);
    }

    /// Apply the reconnection policy. Returns false if the supervisor should stop.
    async fn wait_before_reconnect(
        &self,
        reconnect_attempts: &mut u32,
        ever_connected: bool,
        shutdown_rx: &watch::Receiver<bool>,
    ) -> bool {
        let decision = HealthMonitor::should_attempt_reconnection(
            *reconnect_attempts,
            &self.reconnect_config,
            *shutdown_rx.borrow(),
            ever_connected,
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                *reconnect_attempts = attempt;
                self.set_state(HealthMonitor::determine_next_state(
                    ConnectionEvent::ReconnectionStarted(attempt),
                ));

                info!(
                    "Attempting reconnection {} after {}ms delay",
                    attempt, delay_ms
                );

                Self::interruptible_sleep(shutdown_rx.clone(), Duration::from_millis(delay_ms))
                    .await
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received during reconnection delay, stopping");
                        return false;
                    }
                }
                _ = &mut sleep => return true,
            }
        }
    }

    /// Unsubscribe, disconnect and drain the event loop so the requests go out
    async fn graceful_shutdown(&self, client: &AsyncClient, event_loop: &mut EventLoop) {
        let connected = matches!(self.connection_state(), ConnectionState::Connected);

        if connected {
            self.request_shutdown(client).await;

            let drained = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
                loop {
                    match event_loop.poll().await {
                        Ok(event) => {
                            if matches!(
                                MessageHandler::route_mqtt_event(&event),
                                EventRoute::DisconnectSent
                            ) {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            })
            .await;

            if drained.is_err() {
                warn!("MQTT event loop didn't drain in time, closing connection");
            }
        }

        self.set_state(HealthMonitor::determine_next_state(
            ConnectionEvent::ShutdownCompleted,
        ));
        info!("MQTT client disconnected");
    }
}

/// Drop requests carried over from the lost session.
///
/// rumqttc parks unsent and unacknowledged requests in `pending` and replays them
/// after reconnecting, even with a clean session. Subscriptions are re-issued on
/// every ConnAck, so replaying them would subscribe twice.
fn discard_stale_requests(event_loop: &mut EventLoop) {
    let before = event_loop.pending.len();
    event_loop
        .pending
        .retain(|request| !matches!(request, Request::Subscribe(_) | Request::Unsubscribe(_)));
    let dropped = before - event_loop.pending.len();
    if dropped > 0 {
        debug!("Discarded {} stale subscription request(s)", dropped);
    }
}
