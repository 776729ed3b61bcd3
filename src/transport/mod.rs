//! Transport layer for pub/sub messaging
//!
//! Provides the uniform client abstraction and its MQTT implementation, so
//! application code can connect, subscribe, read, and publish without
//! depending on the underlying client library's API shape.

use crate::message::{Payload, ReadMessage};

pub mod mqtt;

/// Uniform capability surface over a pub/sub transport.
///
/// No method ever raises: failures degrade to sentinel values (`false`, `0`,
/// `None`) and are reported through logging.
#[async_trait::async_trait]
pub trait PubSubClient: Send + Sync {
    /// Connect to the broker and start the delivery loop. Returns `false`
    /// when the connection could not be established, or when the client is
    /// already connected (benign idempotent guard).
    async fn connect(&mut self) -> bool;

    /// Stop the delivery loop and disconnect from the broker. Returns `true`
    /// only if the loop-stop step completed; disconnecting a client that was
    /// never connected is a benign no-op.
    async fn disconnect(&mut self) -> bool;

    /// Last connection state reported by the transport's own events; the
    /// broker is never actively probed.
    fn is_connected(&self) -> bool;

    /// Pop and decode the oldest buffered message. `None` means nothing is
    /// buffered, a normal condition rather than an error. With
    /// `decode_as_string` unset, the payload is returned as raw bytes and
    /// all JSON handling is bypassed.
    fn read(&self, filter: Option<&str>, decode_as_string: bool) -> Option<ReadMessage>;

    /// Publish a payload to `topic`. Returns the published length on
    /// success, `0` on any failure.
    async fn write(&self, payload: Payload, topic: &str) -> usize;
}

/// Observer notified on every connect/disconnect transition.
///
/// Invoked synchronously from the delivery loop's execution context, so
/// implementations must not block indefinitely.
pub trait ConnectionListener: Send + Sync {
    fn connection_changed(&self, connected: bool);
}

impl<F> ConnectionListener for F
where
    F: Fn(bool) + Send + Sync,
{
    fn connection_changed(&self, connected: bool) {
        self(connected)
    }
}

/// Type alias for the MQTT transport.
pub type MqttTransport = mqtt::MqttClient;
