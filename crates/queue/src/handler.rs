use async_trait::async_trait;
use marketbridge_core::{MessageHandler, ReceivedMessage};
use tracing::info;

/// Logs every message it receives.
///
/// Well-formed `{"message": ...}` envelopes are logged by their text; anything
/// else is logged as the raw (lossy UTF-8) body.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

#[async_trait]
impl MessageHandler for LogHandler {
    async fn handle(&self, message: &ReceivedMessage) -> anyhow::Result<()> {
        match message.envelope() {
            Ok(envelope) => info!(
                queue = %message.queue,
                redelivered = message.redelivered,
                message = %envelope.message,
                "Received"
            ),
            Err(_) => info!(
                queue = %message.queue,
                redelivered = message.redelivered,
                body = %String::from_utf8_lossy(&message.body),
                "Received non-envelope body"
            ),
        }
        Ok(())
    }
}
