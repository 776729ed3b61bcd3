//! Client configuration
//!
//! Broker address, credentials, subscription topics, and the tunables of the
//! facade (buffer capacity, connect timeout, settle delay, QoS). Fields left
//! unset fall back to defaults, may be resolved from environment variables
//! (credentials), or can be filled interactively from stdin via
//! [`ClientConfig::resolve_interactive`], the default external-facing
//! behavior when no configuration is supplied.

use crate::error::{ClientError, ClientResult};
use rumqttc::v5::mqttbytes::QoS;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1883;

fn default_buffer_capacity() -> usize {
    crate::buffer::DEFAULT_BUFFER_CAPACITY
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_settle_delay_secs() -> u64 {
    2
}

/// Configuration for a pub/sub client instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Broker host name or IP (default: localhost)
    #[serde(default)]
    pub host: Option<String>,
    /// Broker port (default: 1883)
    #[serde(default)]
    pub port: Option<u16>,
    /// Login username. `None` means "ask interactively or stay anonymous";
    /// an empty string means anonymous.
    #[serde(default)]
    pub username: Option<String>,
    /// Login password, same conventions as `username`
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the username
    #[serde(default)]
    pub username_env: Option<String>,
    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
    /// Topic filters subscribed on every successful connection
    #[serde(default)]
    pub topics: Vec<String>,
    /// Explicit client id; generated when absent
    #[serde(default)]
    pub client_id: Option<String>,
    /// Capacity of the inbound message buffer
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Budget for the broker handshake during `connect`
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on waiting for the connect acknowledgment after the
    /// delivery loop starts
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    /// QoS level for publishes and subscriptions (0, 1, or 2; default 0)
    #[serde(default)]
    pub qos: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            username: None,
            password: None,
            username_env: None,
            password_env: None,
            topics: Vec::new(),
            client_id: None,
            buffer_capacity: default_buffer_capacity(),
            connect_timeout_secs: default_connect_timeout_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            qos: 0,
        }
    }
}

impl ClientConfig {
    /// Anonymous configuration for a known broker address.
    pub fn anonymous(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            username: Some(String::new()),
            password: Some(String::new()),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.qos > 2 {
            return Err(ClientError::InvalidConfig(format!(
                "qos must be 0, 1, or 2 (got {})",
                self.qos
            )));
        }
        Ok(())
    }

    /// Prompt on stdin for any field still unset. Empty username or password
    /// input yields an anonymous connect.
    pub fn resolve_interactive(self) -> ClientResult<Self> {
        let stdin = io::stdin();
        let mut lines = stdin.lock();
        self.resolve_with_prompts(&mut lines)
    }

    /// Prompting core, separated from stdin so it can be driven by tests.
    pub fn resolve_with_prompts(mut self, input: &mut impl BufRead) -> ClientResult<Self> {
        if self.host.is_none() {
            let host = prompt_line(input, &format!("broker host (default: {DEFAULT_HOST}): "))?;
            self.host = Some(if host.is_empty() {
                DEFAULT_HOST.to_string()
            } else {
                host
            });
        }
        if self.port.is_none() {
            let port = prompt_line(input, &format!("broker port (default: {DEFAULT_PORT}): "))?;
            self.port = Some(if port.is_empty() {
                DEFAULT_PORT
            } else {
                port.parse()
                    .map_err(|_| ClientError::InvalidConfig(format!("invalid port: {port}")))?
            });
        }
        if self.username.is_none() && self.username_env.is_none() {
            self.username = Some(prompt_line(
                input,
                "broker username (empty for anonymous): ",
            )?);
        }
        if self.password.is_none() && self.password_env.is_none() {
            self.password = Some(prompt_line(
                input,
                "broker password (empty for anonymous): ",
            )?);
        }
        Ok(self)
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Resolved credentials, or `None` for an anonymous connect. Both halves
    /// must be present and non-empty, direct values taking precedence over
    /// environment indirection.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| env_var(self.username_env.as_deref()))?;
        let password = self
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| env_var(self.password_env.as_deref()))?;
        Some((username, password))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn qos(&self) -> QoS {
        match self.qos {
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtMostOnce,
        }
    }
}

fn env_var(name: Option<&str>) -> Option<String> {
    name.and_then(|n| std::env::var(n).ok())
        .filter(|v| !v.is_empty())
}

fn prompt_line(input: &mut impl BufRead, prompt: &str) -> ClientResult<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 1883);
        assert_eq!(config.buffer_capacity, 1000);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.qos(), QoS::AtMostOnce);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_content = r#"
host = "broker.example.com"
port = 8883
username = "sensor"
password = "hunter2"
topics = ["telemetry/#", "control/valve"]
buffer_capacity = 50
qos = 1
"#;
        let config: ClientConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.host(), "broker.example.com");
        assert_eq!(config.port(), 8883);
        assert_eq!(config.topics, vec!["telemetry/#", "control/valve"]);
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.qos(), QoS::AtLeastOnce);
        assert_eq!(
            config.credentials(),
            Some(("sensor".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"127.0.0.1\"\ntopics = [\"a/b\"]").unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.topics, vec!["a/b"]);
    }

    #[test]
    fn test_invalid_qos_rejected() {
        let config = ClientConfig {
            qos: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_credentials_mean_anonymous() {
        let config = ClientConfig {
            username: Some(String::new()),
            password: Some(String::new()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());

        // A username without a password is anonymous too
        let config = ClientConfig {
            username: Some("user".to_string()),
            password: Some(String::new()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_env_var_credentials() {
        std::env::set_var("UNICLIENT_TEST_USER", "envuser");
        std::env::set_var("UNICLIENT_TEST_PASS", "envpass");

        let config = ClientConfig {
            username_env: Some("UNICLIENT_TEST_USER".to_string()),
            password_env: Some("UNICLIENT_TEST_PASS".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.credentials(),
            Some(("envuser".to_string(), "envpass".to_string()))
        );

        std::env::remove_var("UNICLIENT_TEST_USER");
        std::env::remove_var("UNICLIENT_TEST_PASS");
    }

    #[test]
    fn test_interactive_resolution_defaults() {
        // Empty host and port lines take the defaults; empty credentials
        // stay anonymous.
        let mut input = Cursor::new("\n\n\n\n");
        let config = ClientConfig::default()
            .resolve_with_prompts(&mut input)
            .unwrap();

        assert_eq!(config.host(), DEFAULT_HOST);
        assert_eq!(config.port(), DEFAULT_PORT);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_interactive_resolution_values() {
        let mut input = Cursor::new("broker.local\n8883\nalice\nsecret\n");
        let config = ClientConfig::default()
            .resolve_with_prompts(&mut input)
            .unwrap();

        assert_eq!(config.host(), "broker.local");
        assert_eq!(config.port(), 8883);
        assert_eq!(
            config.credentials(),
            Some(("alice".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_interactive_resolution_bad_port() {
        let mut input = Cursor::new("\nnot-a-port\n");
        let result = ClientConfig::default().resolve_with_prompts(&mut input);
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_prompts_skip_preset_fields() {
        // Only the password is missing, so only one line is consumed.
        let mut input = Cursor::new("s3cret\n");
        let config = ClientConfig {
            host: Some("h".to_string()),
            port: Some(1),
            username: Some("u".to_string()),
            ..Default::default()
        }
        .resolve_with_prompts(&mut input)
        .unwrap();

        assert_eq!(
            config.credentials(),
            Some(("u".to_string(), "s3cret".to_string()))
        );
    }
}
