use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};
use marketbridge_core::{BrokerConfig, BrokerError};
use tracing::{debug, info};

/// Build the AMQP URI for `config` without string formatting, so credentials
/// containing reserved characters need no escaping.
pub fn amqp_uri(config: &BrokerConfig) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.vhost.clone(),
        ..Default::default()
    }
}

/// Open a connection to the broker, giving up after `config.connect_timeout`.
pub async fn connect(config: &BrokerConfig, name: &str) -> Result<Connection, BrokerError> {
    info!(host = %config.host, port = config.port, vhost = %config.vhost, "Connecting to broker");

    let properties = ConnectionProperties::default().with_connection_name(name.into());
    let attempt = Connection::connect_uri(amqp_uri(config), properties);
    let failed = |reason: String| {
        BrokerError::Connection(format!(
            "{}:{} ({}): {}",
            config.host, config.port, config.vhost, reason
        ))
    };

    match tokio::time::timeout(config.connect_timeout, attempt).await {
        Ok(result) => result.map_err(|e| failed(e.to_string())),
        Err(_) => Err(failed(format!(
            "timed out after {}ms",
            config.connect_timeout.as_millis()
        ))),
    }
}

/// Open a channel and declare `queue` as durable.
///
/// Declaring is idempotent when the queue already exists with the same
/// durability; a mismatch closes the channel and is reported as a declare error.
pub async fn open_queue(connection: &Connection, queue: &str) -> Result<Channel, BrokerError> {
    if queue.trim().is_empty() {
        return Err(BrokerError::Declare {
            queue: queue.to_string(),
            message: "queue name must not be empty".to_string(),
        });
    }

    let channel = connection
        .create_channel()
        .await
        .map_err(|e| BrokerError::Channel(e.to_string()))?;

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::Declare {
            queue: queue.to_string(),
            message: e.to_string(),
        })?;

    debug!(queue = %queue, "Declared durable queue");
    Ok(channel)
}

/// Close a connection, logging rather than failing if the broker already dropped it.
pub async fn close(connection: &Connection) {
    if let Err(e) = connection.close(200, "OK").await {
        debug!(error = %e, "Connection close failed");
    }
}
