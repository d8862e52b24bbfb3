use crate::error::*;
use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Market Data Source Trait
// ---------------------------------------------------------------------------

/// Read-only access to public market data, already normalized.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// List all tradeable products.
    async fn products(&self) -> Result<Vec<Product>, UpstreamError>;

    /// Current upstream server time.
    async fn server_time(&self) -> Result<ServerTime, UpstreamError>;

    /// Order book for one product.
    async fn product_book(&self, product_id: &str) -> Result<ProductBook, UpstreamError>;

    /// Metadata for one product.
    async fn product(&self, product_id: &str) -> Result<Product, UpstreamError>;

    /// Historical candles for one product.
    async fn candles(
        &self,
        product_id: &str,
        query: &CandleQuery,
    ) -> Result<Vec<Candle>, UpstreamError>;

    /// Most recent public trades for one product.
    async fn market_trades(&self, product_id: &str) -> Result<Vec<MarketTrade>, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Queue Traits
// ---------------------------------------------------------------------------

/// Publishes a message onto a named durable queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish(&self, queue_name: &str, message: &str) -> Result<(), BrokerError>;
}

/// A message taken off the queue.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub queue: String,
    pub body: Vec<u8>,
    /// Whether the broker has delivered this message before.
    pub redelivered: bool,
}

impl ReceivedMessage {
    /// Decode the body as a [`QueueMessage`] envelope.
    pub fn envelope(&self) -> Result<QueueMessage, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Side-effecting handler invoked for every consumed message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &ReceivedMessage) -> anyhow::Result<()>;
}
