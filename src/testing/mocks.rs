//! Mock pub/sub client for testing
//!
//! [`MockClient`] implements [`PubSubClient`] without any transport. Inbound
//! messages are injected with [`MockClient::push_incoming`] and flow through
//! the same buffer and decode policy as the real MQTT facade, so read
//! behavior is identical; publishes are recorded and can be failed on
//! demand.

use crate::buffer::MessageBuffer;
use crate::message::{Message, Payload, ReadMessage};
use crate::transport::mqtt::decode_message;
use crate::transport::{ConnectionListener, PubSubClient};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A published record: topic, wire bytes, reported length.
pub type PublishedMessage = (String, Bytes, usize);

/// In-memory stand-in for a pub/sub transport.
#[derive(Default)]
pub struct MockClient {
    connected: AtomicBool,
    fail_connect: bool,
    fail_publishes: bool,
    buffer: MessageBuffer,
    published: Mutex<Vec<PublishedMessage>>,
    listener: Mutex<Option<Box<dyn ConnectionListener>>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose `connect` always fails.
    pub fn with_connect_failure() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    /// A client whose publishes all report failure.
    pub fn with_publish_failure() -> Self {
        Self {
            fail_publishes: true,
            ..Default::default()
        }
    }

    /// Inject an inbound message, as if delivered by the transport.
    pub fn push_incoming(&self, topic: impl Into<String>, payload: impl Into<Bytes>) {
        self.buffer.push(Message::new(topic, payload));
    }

    pub fn set_connection_listener(&self, listener: impl ConnectionListener + 'static) {
        let mut slot = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Box::new(listener));
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn notify_listener(&self, connected: bool) {
        let listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(listener) = listener.as_ref() {
            listener.connection_changed(connected);
        }
    }
}

#[async_trait::async_trait]
impl PubSubClient for MockClient {
    async fn connect(&mut self) -> bool {
        if self.fail_connect {
            return false;
        }
        if self.connected.load(Ordering::SeqCst) {
            // Idempotent guard, mirroring the MQTT facade.
            return false;
        }
        self.connected.store(true, Ordering::SeqCst);
        self.notify_listener(true);
        true
    }

    async fn disconnect(&mut self) -> bool {
        // Same sentinel as the MQTT facade: disconnecting while not
        // connected is a benign no-op reported as false.
        if self.connected.swap(false, Ordering::SeqCst) {
            self.notify_listener(false);
            true
        } else {
            false
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn read(&self, filter: Option<&str>, decode_as_string: bool) -> Option<ReadMessage> {
        let msg = self.buffer.pop()?;
        Some(decode_message(msg, filter, decode_as_string))
    }

    async fn write(&self, payload: Payload, topic: &str) -> usize {
        if self.fail_publishes || !self.is_connected() {
            return 0;
        }
        let Ok((bytes, count)) = payload.encoded() else {
            return 0;
        };
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((topic.to_string(), bytes, count));
        count
    }
}
