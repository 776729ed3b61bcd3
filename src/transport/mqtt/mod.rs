//! MQTT implementation of the uniform pub/sub client
//!
//! Split into focused sub-modules, separating pure functions from I/O:
//!
//! - [`connection`] - connection state and transport option construction
//! - [`message_handler`] - event routing and the payload decode policy
//! - [`client`] - the facade itself: delivery loop, buffer wiring, lifecycle
//!
//! # Usage
//!
//! ```rust,no_run
//! use uniclient::{ClientConfig, MqttClient, Payload};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig {
//!     topics: vec!["demo/#".to_string()],
//!     ..ClientConfig::anonymous("localhost", 1883)
//! };
//!
//! let mut client = MqttClient::new(config);
//! if client.connect().await {
//!     client.write(Payload::Text("hello".to_string()), "demo/greeting").await;
//!     if let Some(msg) = client.read(None, true) {
//!         println!("{}: {}", msg.topic, msg.payload);
//!     }
//!     client.disconnect().await;
//! }
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::ConnectionState;
pub use message_handler::{decode_message, EventRoute};
