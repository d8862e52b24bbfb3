//! RabbitMQ bridge.
//!
//! The publisher opens a fresh connection per message; the consumer holds one
//! connection for as long as the broker keeps it alive and reconnects with
//! exponential backoff otherwise.

pub mod connection;
pub mod consumer;
pub mod handler;
pub mod publisher;
pub mod reconnect;

pub use consumer::{AckMode, ConsumerOptions, QueueConsumer};
pub use handler::LogHandler;
pub use publisher::RabbitPublisher;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
