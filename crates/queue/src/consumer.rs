use std::fmt;
use std::str::FromStr;

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use lapin::Connection;
use marketbridge_core::{BrokerConfig, BrokerError, MessageHandler, ReceivedMessage};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::connection;
use crate::reconnect::{ReconnectConfig, ReconnectPolicy};

// ---------------------------------------------------------------------------
// Acknowledgement
// ---------------------------------------------------------------------------

/// When the broker considers a delivery handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Acknowledged on delivery, before the handler runs. Handler failures
    /// lose the message (at-most-once).
    #[default]
    Auto,
    /// Acknowledged only after the handler succeeds (at-least-once).
    AfterHandle,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::AfterHandle => "after-handle",
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(AckMode::Auto),
            "after-handle" | "after_handle" | "manual" => Ok(AckMode::AfterHandle),
            other => Err(format!(
                "unknown ack mode '{}' (expected 'auto' or 'after-handle')",
                other
            )),
        }
    }
}

/// What to tell the broker about a delivery once the handler has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Nothing to send; the broker already auto-acknowledged.
    None,
    Ack,
    /// Negative-acknowledge and put the message back on the queue.
    Requeue,
    /// Negative-acknowledge and drop the message.
    Reject,
}

/// Decide how to settle a delivery.
///
/// With manual acks a failed message is requeued once; if it fails again on
/// redelivery it is rejected so one bad message cannot cycle forever.
pub fn settle(mode: AckMode, handled: bool, redelivered: bool) -> Settlement {
    match (mode, handled, redelivered) {
        (AckMode::Auto, _, _) => Settlement::None,
        (AckMode::AfterHandle, true, _) => Settlement::Ack,
        (AckMode::AfterHandle, false, false) => Settlement::Requeue,
        (AckMode::AfterHandle, false, true) => Settlement::Reject,
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub queue: String,
    pub consumer_tag: String,
    pub ack_mode: AckMode,
    pub reconnect: ReconnectConfig,
}

impl ConsumerOptions {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            consumer_tag: String::new(),
            ack_mode: AckMode::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Why a consume cycle ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeExit {
    Cancelled,
    /// The broker closed the delivery stream.
    StreamClosed,
}

/// Long-running consumer for one durable queue.
pub struct QueueConsumer {
    config: BrokerConfig,
    options: ConsumerOptions,
}

impl QueueConsumer {
    pub fn new(config: BrokerConfig, options: ConsumerOptions) -> Self {
        Self { config, options }
    }

    pub fn options(&self) -> &ConsumerOptions {
        &self.options
    }

    /// Consume until `cancel` fires, reconnecting with backoff after every
    /// failed or closed cycle.
    ///
    /// Returns an error only when `max_attempts` consecutive reconnects fail.
    pub async fn run<H>(&self, handler: &H, cancel: CancellationToken) -> Result<(), BrokerError>
    where
        H: MessageHandler + ?Sized,
    {
        let mut policy = ReconnectPolicy::new(self.options.reconnect.clone());

        loop {
            match self.consume_messages(handler, &cancel, &mut policy).await {
                Ok(ConsumeExit::Cancelled) => {
                    info!(queue = %self.options.queue, "Consumer stopped");
                    return Ok(());
                }
                Ok(ConsumeExit::StreamClosed) => {
                    warn!(queue = %self.options.queue, "Broker closed the delivery stream");
                }
                Err(e) => {
                    error!(queue = %self.options.queue, error = %e, "Consumer failed");
                }
            }

            let Some(delay) = policy.next_delay() else {
                return Err(BrokerError::Connection(format!(
                    "giving up after {} reconnect attempts",
                    policy.attempt_count()
                )));
            };
            warn!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to broker"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(queue = %self.options.queue, "Consumer stopped during backoff");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connect-declare-consume cycle.
    ///
    /// Blocks until the stream ends, an error occurs, or `cancel` fires. The
    /// backoff policy is reset once the subscription is in place.
    pub async fn consume_messages<H>(
        &self,
        handler: &H,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
    ) -> Result<ConsumeExit, BrokerError>
    where
        H: MessageHandler + ?Sized,
    {
        let conn = connection::connect(&self.config, "marketbridge-consumer").await?;
        let result = self.consume_on(&conn, handler, cancel, policy).await;
        connection::close(&conn).await;
        result
    }

    async fn consume_on<H>(
        &self,
        conn: &Connection,
        handler: &H,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
    ) -> Result<ConsumeExit, BrokerError>
    where
        H: MessageHandler + ?Sized,
    {
        let queue = self.options.queue.as_str();
        let channel = connection::open_queue(conn, queue).await?;
        let mut deliveries = channel
            .basic_consume(
                queue,
                &self.options.consumer_tag,
                BasicConsumeOptions {
                    no_ack: self.options.ack_mode == AckMode::Auto,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        policy.reset();
        info!(queue = %queue, ack_mode = %self.options.ack_mode, "Waiting for messages");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(ConsumeExit::Cancelled),
                next = deliveries.next() => next,
            };
            match next {
                None => return Ok(ConsumeExit::StreamClosed),
                Some(Err(e)) => return Err(BrokerError::Consume(e.to_string())),
                Some(Ok(delivery)) => self.dispatch(handler, delivery).await?,
            }
        }
    }

    async fn dispatch<H>(&self, handler: &H, delivery: Delivery) -> Result<(), BrokerError>
    where
        H: MessageHandler + ?Sized,
    {
        let Delivery {
            data,
            redelivered,
            acker,
            ..
        } = delivery;
        let message = ReceivedMessage {
            queue: self.options.queue.clone(),
            body: data,
            redelivered,
        };

        let outcome = handler.handle(&message).await;
        if let Err(e) = &outcome {
            warn!(queue = %message.queue, error = %e, "Handler failed");
        }

        let settlement = settle(self.options.ack_mode, outcome.is_ok(), redelivered);
        match settlement {
            Settlement::None => {
                if outcome.is_err() {
                    warn!(queue = %message.queue, "Message was auto-acknowledged and is lost");
                }
                Ok(())
            }
            Settlement::Ack => acker
                .ack(BasicAckOptions::default())
                .await
                .map(drop)
                .map_err(|e| BrokerError::Ack(e.to_string())),
            Settlement::Requeue | Settlement::Reject => acker
                .nack(BasicNackOptions {
                    requeue: settlement == Settlement::Requeue,
                    ..Default::default()
                })
                .await
                .map(drop)
                .map_err(|e| BrokerError::Ack(e.to_string())),
        }
    }
}
