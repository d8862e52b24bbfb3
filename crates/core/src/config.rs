use std::fmt;
use std::time::Duration;

/// Default upstream base URL (Coinbase Advanced Trade, brokerage API).
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.coinbase.com/api/v3/brokerage";

/// Where and how to reach the market-data API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Base URL, including the `/api/v3/brokerage` path.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl UpstreamConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// RabbitMQ connection settings, shared by the publisher and the consumer.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Bound on TCP connect plus the AMQP handshake.
    pub connect_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "rabbitmq".to_string(),
            port: 5672,
            username: "user".to_string(),
            password: "password".to_string(),
            vhost: "/".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("vhost", &self.vhost)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
