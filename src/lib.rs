//! uniclient - a uniform pub/sub client facade over MQTT
//!
//! Lets application code connect, subscribe, read received messages, and
//! publish without depending on the underlying MQTT library's API shape.
//! The heavy lifting of the transport (handshake, topic filtering, QoS,
//! wire encoding) is delegated to rumqttc; this crate contributes:
//!
//! - a bounded, lock-guarded ring buffer of inbound messages with
//!   oldest-eviction on overflow
//! - a best-effort payload decoding policy on read (raw bytes, text, plain
//!   JSON, or an embedded topic/payload envelope)
//! - connection-lifecycle bookkeeping with an optional listener
//! - interactive credential prompting when no configuration is supplied
//!
//! Nothing in the public surface raises: failures degrade to sentinel
//! values (`false`, `0`, `None`) and are reported through tracing logs.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use uniclient::{ClientConfig, MqttClient, Payload};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig {
//!     topics: vec!["sensors/#".to_string()],
//!     ..ClientConfig::anonymous("localhost", 1883)
//! };
//!
//! let mut client = MqttClient::new(config);
//! if client.connect().await {
//!     // Fire-and-forget publish; returns the published length, 0 on failure
//!     let written = client
//!         .write(Payload::Text("21.5".to_string()), "sensors/kitchen")
//!         .await;
//!     assert!(written > 0);
//!
//!     // Drain whatever the delivery loop has buffered so far
//!     while let Some(msg) = client.read(None, true) {
//!         println!("{}: {}", msg.topic, msg.payload);
//!     }
//!
//!     client.disconnect().await;
//! }
//! # });
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod message;
pub mod observability;
pub mod testing;
pub mod transport;

pub use buffer::MessageBuffer;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use message::{Message, Payload, ReadMessage, ReadPayload};
pub use transport::mqtt::{ConnectionState, MqttClient};
pub use transport::{ConnectionListener, MqttTransport, PubSubClient};
