//! Connection state and transport option construction
//!
//! Pure functions shared by the facade's initial connection and any later
//! reconnection, kept separate from the I/O code for testability.

use crate::config::ClientConfig;
use rumqttc::v5::MqttOptions;
use std::time::Duration;
use uuid::Uuid;

/// Connection state of the facade.
///
/// Tracked independently from whether the delivery loop is running: a client
/// can have an active delivery loop while momentarily not logically
/// connected, e.g. mid-reconnect.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Delivery loop started, waiting for the connect acknowledgment
    Connecting,
    /// Connect acknowledgment received, ready for operations
    Connected,
    /// Disconnected, with the transport-reported reason
    Disconnected(String),
}

/// Pick the configured client id or generate a unique one.
pub fn assign_client_id(config: &ClientConfig) -> String {
    config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("uniclient-{}", Uuid::new_v4().simple()))
}

/// Build MQTT options from the client configuration.
///
/// Credentials are installed only when both halves resolve to non-empty
/// values; otherwise the connect is anonymous.
pub fn configure_mqtt_options(client_id: &str, config: &ClientConfig) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, config.host(), config.port());

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    options.set_keep_alive(Duration::from_secs(60));
    // Generous packet budget; broker defaults are often too small for
    // structured payloads.
    options.set_max_packet_size(Some(256 * 1024));

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_client_id_prefers_configured() {
        let config = ClientConfig {
            client_id: Some("sensor-7".to_string()),
            ..Default::default()
        };
        assert_eq!(assign_client_id(&config), "sensor-7");
    }

    #[test]
    fn test_assign_client_id_generates_unique() {
        let config = ClientConfig::default();
        let a = assign_client_id(&config);
        let b = assign_client_id(&config);
        assert!(a.starts_with("uniclient-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_configure_options_with_and_without_credentials() {
        let anonymous = ClientConfig::anonymous("broker.test", 1884);
        let _ = configure_mqtt_options("c1", &anonymous);

        let credentialed = ClientConfig {
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            ..ClientConfig::default()
        };
        assert!(credentialed.credentials().is_some());
        let _ = configure_mqtt_options("c2", &credentialed);
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("gone".to_string())
        );
        assert_eq!(
            ConnectionState::Disconnected("gone".to_string()),
            ConnectionState::Disconnected("gone".to_string())
        );
    }
}
