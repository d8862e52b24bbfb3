use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Connection};
use marketbridge_core::{BrokerConfig, BrokerError, QueueMessage, QueuePublisher};
use tracing::info;

use crate::connection;

/// AMQP delivery mode 2: the broker writes the message to disk.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Serialize `message` into the `{"message": ...}` envelope.
pub fn encode_message(message: &str) -> Result<Vec<u8>, BrokerError> {
    serde_json::to_vec(&QueueMessage::new(message))
        .map_err(|e| BrokerError::Serialization(e.to_string()))
}

/// Properties attached to every published message.
pub fn persistent_properties() -> BasicProperties {
    BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE)
}

/// Publishes to RabbitMQ, one connection per call.
///
/// Each publish connects, declares the queue durable, publishes on the default
/// exchange with the queue name as routing key, waits for the broker's
/// confirm, and closes the connection.
#[derive(Debug, Clone)]
pub struct RabbitPublisher {
    config: BrokerConfig,
}

impl RabbitPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    pub async fn publish_message(&self, queue_name: &str, message: &str) -> Result<(), BrokerError> {
        let payload = encode_message(message)?;
        let conn = connection::connect(&self.config, "marketbridge-publisher").await?;

        let result = publish_on(&conn, queue_name, &payload).await;
        connection::close(&conn).await;

        if result.is_ok() {
            info!(queue = %queue_name, bytes = payload.len(), "Message published");
        }
        result
    }
}

async fn publish_on(conn: &Connection, queue_name: &str, payload: &[u8]) -> Result<(), BrokerError> {
    let channel = connection::open_queue(conn, queue_name).await?;

    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|e| BrokerError::Channel(e.to_string()))?;

    let confirmation = channel
        .basic_publish(
            "",
            queue_name,
            BasicPublishOptions::default(),
            payload,
            persistent_properties(),
        )
        .await
        .map_err(|e| BrokerError::Publish(e.to_string()))?
        .await
        .map_err(|e| BrokerError::Publish(e.to_string()))?;

    if confirmation.is_nack() {
        return Err(BrokerError::Publish(format!(
            "broker rejected message for queue '{}'",
            queue_name
        )));
    }
    Ok(())
}

#[async_trait]
impl QueuePublisher for RabbitPublisher {
    async fn publish(&self, queue_name: &str, message: &str) -> Result<(), BrokerError> {
        self.publish_message(queue_name, message)
            .await
            .inspect_err(|e| tracing::error!(queue = %queue_name, error = %e, "Publish failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_message_envelope() {
        let payload = encode_message("hello").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value, serde_json::json!({"message": "hello"}));
    }

    #[test]
    fn test_encode_message_escapes_json() {
        let payload = encode_message(r#"{"nested": "quote"}"#).unwrap();
        let decoded: QueueMessage = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.message, r#"{"nested": "quote"}"#);
    }

    #[test]
    fn test_properties_are_persistent() {
        let props = persistent_properties();
        assert_eq!(*props.delivery_mode(), Some(PERSISTENT_DELIVERY_MODE));
        assert!(props.headers().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_connection_error() {
        let publisher = RabbitPublisher::new(BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        });
        let err = publisher.publish("test_queue", "hello").await.unwrap_err();
        assert!(matches!(err, BrokerError::Connection(_)));
    }
}
