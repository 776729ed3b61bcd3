//! MQTT client facade
//!
//! The impure half of the transport: owns the rumqttc client, runs the
//! delivery loop task, and wires transport events into the inbound buffer,
//! the connection flag, and the lifecycle listener. Public methods never
//! raise; failures are logged and degrade to sentinel values.

use super::connection::{assign_client_id, configure_mqtt_options, ConnectionState};
use super::message_handler::{self, EventRoute};
use crate::buffer::MessageBuffer;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::message::{Message, Payload, ReadMessage};
use crate::transport::{ConnectionListener, PubSubClient};
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay between polls after the transport reports an error, so a dead
/// broker does not spin the loop.
const RECONNECT_POLL_DELAY: Duration = Duration::from_millis(250);

/// State shared between the caller and the delivery loop task. The buffer is
/// the only mutexed resource; the connected flag is a plain atomic written by
/// the loop and read by callers.
struct SharedState {
    connected: AtomicBool,
    buffer: MessageBuffer,
    topics: Vec<String>,
    listener: Mutex<Option<Box<dyn ConnectionListener>>>,
}

impl SharedState {
    fn notify_listener(&self, connected: bool) {
        let listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(listener) = listener.as_ref() {
            listener.connection_changed(connected);
        }
    }
}

/// Uniform pub/sub client over an MQTT transport.
///
/// Holds a bounded buffer of inbound messages filled by a background
/// delivery loop; `read` drains only what is already buffered and `write` is
/// fire-and-forget against the transport's own acknowledgment mechanics.
pub struct MqttClient {
    client_id: String,
    config: ClientConfig,
    client: AsyncClient,
    // EventLoop is Send but not Sync; keeping it behind a mutex keeps the
    // whole client shareable across tasks. Held only long enough to take the
    // loop out in connect().
    event_loop: Mutex<Option<EventLoop>>,
    delivery_handle: Option<JoinHandle<()>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    shared: Arc<SharedState>,
}

impl MqttClient {
    /// Build a client from configuration. No I/O happens until `connect`.
    pub fn new(config: ClientConfig) -> Self {
        let client_id = assign_client_id(&config);
        info!("creating mqtt client instance with id {client_id}");

        let (client, event_loop) = Self::create_transport(&client_id, &config);
        let shared = Arc::new(SharedState {
            connected: AtomicBool::new(false),
            buffer: MessageBuffer::new(config.buffer_capacity),
            topics: config.topics.clone(),
            listener: Mutex::new(None),
        });

        Self {
            client_id,
            config,
            client,
            event_loop: Mutex::new(Some(event_loop)),
            delivery_handle: None,
            state_tx: None,
            state_rx: None,
            shutdown_tx: None,
            shared,
        }
    }

    fn create_transport(client_id: &str, config: &ClientConfig) -> (AsyncClient, EventLoop) {
        let options = configure_mqtt_options(client_id, config);
        AsyncClient::new(options, 10)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Register the lifecycle listener invoked on every connect/disconnect
    /// transition. Replaces any previously registered listener.
    pub fn set_connection_listener(&self, listener: impl ConnectionListener + 'static) {
        let mut slot = self
            .shared
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(Box::new(listener));
    }

    /// Current connection state, or `None` before the first `connect`.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Last value reported by the transport's connect/disconnect events.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn is_loop_started(&self) -> bool {
        self.delivery_handle.is_some()
    }

    /// Connect to the broker and start the delivery loop.
    ///
    /// A no-op returning `false` when the loop is active and the client is
    /// already connected. Rather than sleeping a fixed settle period, this
    /// waits on the connection-state channel, bounded by the configured
    /// connect timeout plus settle delay, so it never returns before the
    /// transport attempted the handshake.
    pub async fn connect(&mut self) -> bool {
        if self.is_loop_started() && self.is_connected() {
            warn!(
                "failed to connect client {} since it is already connected",
                self.client_id
            );
            return false;
        }

        info!(
            "connecting client {} to broker {}:{} ...",
            self.client_id,
            self.config.host(),
            self.config.port()
        );

        if !self.is_loop_started() {
            let taken = self
                .event_loop
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            let event_loop = match taken {
                Some(event_loop) => event_loop,
                None => {
                    // The previous loop was stopped and consumed its event
                    // loop; begin a fresh transport session.
                    let (client, event_loop) =
                        Self::create_transport(&self.client_id, &self.config);
                    self.client = client;
                    event_loop
                }
            };

            let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            self.state_tx = Some(state_tx.clone());
            self.state_rx = Some(state_rx);
            self.shutdown_tx = Some(shutdown_tx);

            info!("starting delivery loop for client {}", self.client_id);
            let handle = tokio::spawn(Self::run_delivery_loop(
                event_loop,
                self.client.clone(),
                self.shared.clone(),
                state_tx,
                shutdown_rx,
                self.client_id.clone(),
                self.config.qos(),
            ));
            self.delivery_handle = Some(handle);
        } else if let Some(state_tx) = &self.state_tx {
            // Loop already running but not connected (mid-reconnect): wait
            // for the next acknowledgment rather than failing on the stale
            // disconnect state.
            let _ = state_tx.send(ConnectionState::Connecting);
        }

        let Some(state_rx) = self.state_rx.clone() else {
            return false;
        };
        let deadline = self.config.connect_timeout() + self.config.settle_delay();
        match Self::wait_for_connection(state_rx, deadline).await {
            Ok(()) => {
                info!("client {} connected", self.client_id);
                true
            }
            Err(e) => {
                error!(
                    "failed to connect client {} to broker {}:{}: {e}",
                    self.client_id,
                    self.config.host(),
                    self.config.port()
                );
                false
            }
        }
    }

    /// Wait until the delivery loop reports a connect acknowledgment, a
    /// terminal disconnect, or the deadline passes.
    async fn wait_for_connection(
        mut state_rx: watch::Receiver<ConnectionState>,
        deadline: Duration,
    ) -> ClientResult<()> {
        let wait = tokio::time::timeout(deadline, async {
            loop {
                match state_rx.borrow_and_update().clone() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(reason) => {
                        return Err(ClientError::ConnectionFailed(reason));
                    }
                    ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(ClientError::ConnectionFailed(
                        "state channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        match wait {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectionFailed(
                "no connect acknowledgment before timeout".to_string(),
            )),
        }
    }

    /// Delivery loop: polls the transport and routes its events until a
    /// shutdown signal arrives.
    async fn run_delivery_loop(
        mut event_loop: EventLoop,
        client: AsyncClient,
        shared: Arc<SharedState>,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
        client_id: String,
        qos: QoS,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping delivery loop for client {client_id}");
                        break;
                    }
                }
                event = event_loop.poll() => match event {
                    Ok(event) => {
                        Self::handle_event(&event, &client, &shared, &state_tx, &client_id, qos)
                            .await;
                    }
                    Err(e) => {
                        Self::handle_connection_lost(&shared, &state_tx, &client_id, &e.to_string());
                        tokio::time::sleep(RECONNECT_POLL_DELAY).await;
                    }
                }
            }
        }
        info!("delivery loop stopped for client {client_id}");
    }

    async fn handle_event(
        event: &rumqttc::v5::Event,
        client: &AsyncClient,
        shared: &Arc<SharedState>,
        state_tx: &watch::Sender<ConnectionState>,
        client_id: &str,
        qos: QoS,
    ) {
        match message_handler::route_event(event) {
            EventRoute::ConnectionAcknowledged => {
                info!("client {client_id} connected to broker");
                shared.connected.store(true, Ordering::SeqCst);
                let _ = state_tx.send(ConnectionState::Connected);
                // Re-subscribe the whole set on every (re)connect.
                // Subscription failures are logged, never fatal, and do not
                // block subsequent topics.
                for topic in &shared.topics {
                    info!("subscribing client {client_id} to topic {topic} ...");
                    if let Err(e) = client.subscribe(topic.clone(), qos).await {
                        let e = ClientError::SubscriptionFailed(Box::new(e));
                        warn!("failed to subscribe client {client_id} to {topic}: {e}");
                    }
                }
                shared.notify_listener(true);
            }
            EventRoute::MessageReceived { topic, payload } => {
                debug!("client {client_id} received message on topic {topic}");
                shared.buffer.push(Message::new(topic, payload));
            }
            EventRoute::Disconnected => {
                Self::handle_connection_lost(shared, state_tx, client_id, "disconnected by broker");
            }
            EventRoute::SubscriptionConfirmed { packet_id } => {
                debug!("client {client_id} subscription confirmed (pkid {packet_id})");
            }
            EventRoute::UnsubscribeConfirmed { packet_id } => {
                debug!("client {client_id} unsubscription confirmed (pkid {packet_id})");
            }
            EventRoute::Ignored => {}
        }
    }

    fn handle_connection_lost(
        shared: &Arc<SharedState>,
        state_tx: &watch::Sender<ConnectionState>,
        client_id: &str,
        reason: &str,
    ) {
        let was_connected = shared.connected.swap(false, Ordering::SeqCst);
        let _ = state_tx.send(ConnectionState::Disconnected(reason.to_string()));
        if was_connected {
            warn!("client {client_id} disconnected from broker: {reason}");
            shared.notify_listener(false);
        }
    }

    /// Disconnect from the broker and stop the delivery loop.
    ///
    /// Two individually reported steps: the transport disconnect goes first
    /// because rumqttc flushes it through the still-running loop, then the
    /// loop is force-stopped with an abort, falling back to awaiting its
    /// exit. Returns `true` only if the loop-stop step completed; either
    /// half being a no-op (never connected, never started) is benign.
    pub async fn disconnect(&mut self) -> bool {
        if self.is_connected() {
            info!(
                "disconnecting client {} from broker {}:{} ...",
                self.client_id,
                self.config.host(),
                self.config.port()
            );
            if let Err(e) = self.client.disconnect().await {
                warn!("failed to disconnect client {}: {e}", self.client_id);
                return false;
            }
        }

        let Some(handle) = self.delivery_handle.take() else {
            warn!(
                "delivery loop for client {} was never started, nothing to stop",
                self.client_id
            );
            return false;
        };

        info!("stopping delivery loop for client {} ...", self.client_id);
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        handle.abort();
        match handle.await {
            Ok(()) => info!("delivery loop for client {} exited cleanly", self.client_id),
            Err(e) if e.is_cancelled() => {
                info!("delivery loop for client {} force-stopped", self.client_id);
            }
            Err(e) => {
                error!(
                    "failed to stop delivery loop for client {}: {e}",
                    self.client_id
                );
                return false;
            }
        }

        // The aborted loop may not have seen the connection close; settle the
        // state here so is_connected and the listener reflect the requested
        // disconnect.
        if let Some(state_tx) = &self.state_tx {
            let _ = state_tx.send(ConnectionState::Disconnected(
                "disconnect requested".to_string(),
            ));
        }
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            self.shared.notify_listener(false);
        }
        true
    }

    /// Pop and decode the oldest buffered message; `None` when the buffer is
    /// empty.
    pub fn read(&self, filter: Option<&str>, decode_as_string: bool) -> Option<ReadMessage> {
        let pending = self.shared.buffer.len();
        debug!(
            "{pending} message(s) awaiting in client {} read buffer",
            self.client_id
        );
        let msg = self.shared.buffer.pop()?;
        debug!("popped message from topic {}", msg.topic);
        Some(message_handler::decode_message(msg, filter, decode_as_string))
    }

    /// Publish a payload. Returns the published length, or `0` when not
    /// connected, on encoding failure, or on transport failure.
    pub async fn write(&self, payload: Payload, topic: &str) -> usize {
        if !self.is_connected() {
            let state = self
                .connection_state()
                .unwrap_or_else(|| ConnectionState::Disconnected("never connected".to_string()));
            let e = ClientError::NotConnected { state };
            warn!("client {} cannot publish to {topic}: {e}", self.client_id);
            return 0;
        }

        let (bytes, count) = match payload.encoded() {
            Ok(encoded) => encoded,
            Err(e) => {
                let e = ClientError::Serialization(e);
                error!("failed to encode payload for topic {topic}: {e}");
                return 0;
            }
        };

        debug!(
            "tx client {} publishing {} byte(s) to {topic}",
            self.client_id,
            bytes.len()
        );
        match self
            .client
            .publish(topic, self.config.qos(), false, bytes)
            .await
        {
            Ok(()) => count,
            Err(e) => {
                let e = ClientError::PublishFailed(Box::new(e));
                error!("failed to publish to {topic}: {e}");
                0
            }
        }
    }
}

#[async_trait::async_trait]
impl PubSubClient for MqttClient {
    async fn connect(&mut self) -> bool {
        MqttClient::connect(self).await
    }

    async fn disconnect(&mut self) -> bool {
        MqttClient::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        MqttClient::is_connected(self)
    }

    fn read(&self, filter: Option<&str>, decode_as_string: bool) -> Option<ReadMessage> {
        MqttClient::read(self, filter, decode_as_string)
    }

    async fn write(&self, payload: Payload, topic: &str) -> usize {
        MqttClient::write(self, payload, topic).await
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // Users should call disconnect() for a graceful shutdown; this only
        // makes sure the background task does not outlive its owner.
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.delivery_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig {
            client_id: Some("test-client".to_string()),
            ..ClientConfig::anonymous("127.0.0.1", 1)
        }
    }

    #[test]
    fn test_client_is_send_and_sync() {
        // The trait bound demands both, and the shared delivery loop depends
        // on it; the non-Sync event loop must stay behind its mutex.
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MqttClient>();
    }

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let client = MqttClient::new(test_config());
        assert!(!client.is_connected());
        assert!(client.connection_state().is_none());
    }

    #[tokio::test]
    async fn test_read_on_empty_buffer_is_none() {
        let client = MqttClient::new(test_config());
        assert!(client.read(None, true).is_none());
        assert!(client.read(Some("any/topic"), false).is_none());
    }

    #[tokio::test]
    async fn test_write_without_connection_returns_zero() {
        let client = MqttClient::new(test_config());
        let written = client.write(Payload::Text("hello".into()), "t").await;
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_benign() {
        let mut client = MqttClient::new(test_config());
        // Never-started loop: no-op reported as false, but no panic or hang.
        assert!(!client.disconnect().await);
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_broker_fails() {
        // Port 1 refuses immediately, so this fails well before the timeout.
        let mut config = test_config();
        config.connect_timeout_secs = 1;
        config.settle_delay_secs = 0;

        let mut client = MqttClient::new(config);
        assert!(!client.connect().await);
        assert!(!client.is_connected());

        // The loop was started even though the connect failed; stopping it
        // succeeds.
        assert!(client.disconnect().await);
    }

    #[tokio::test]
    async fn test_wait_for_connection_success() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Connected);
        });

        let result =
            MqttClient::wait_for_connection(state_rx, Duration::from_millis(500)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_connection_timeout() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        // Keep the sender alive so the channel does not close early.
        let _keep_alive = state_tx;

        let result = MqttClient::wait_for_connection(state_rx, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ClientError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_wait_for_connection_disconnected() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Disconnected("refused".to_string()));
        });

        let result =
            MqttClient::wait_for_connection(state_rx, Duration::from_millis(500)).await;
        match result {
            Err(ClientError::ConnectionFailed(reason)) => assert_eq!(reason, "refused"),
            other => panic!("expected connection failure, got {other:?}"),
        }
    }

    #[test]
    fn test_listener_notified_on_transitions() {
        use std::sync::atomic::AtomicUsize;

        let transitions = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(SharedState {
            connected: AtomicBool::new(false),
            buffer: MessageBuffer::new(10),
            topics: Vec::new(),
            listener: Mutex::new(None),
        });

        let counter = transitions.clone();
        *shared.listener.lock().unwrap() = Some(Box::new(move |connected: bool| {
            if !connected {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let (state_tx, _state_rx) = watch::channel(ConnectionState::Connected);
        shared.connected.store(true, Ordering::SeqCst);
        MqttClient::handle_connection_lost(&shared, &state_tx, "c", "gone");

        assert!(!shared.connected.load(Ordering::SeqCst));
        assert_eq!(transitions.load(Ordering::SeqCst), 1);

        // Already disconnected: no duplicate notification.
        MqttClient::handle_connection_lost(&shared, &state_tx, "c", "gone again");
        assert_eq!(transitions.load(Ordering::SeqCst), 1);
    }
}
