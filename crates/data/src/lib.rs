pub mod client;

pub use client::UpstreamClient;

use async_trait::async_trait;
use marketbridge_core::normalize;
use marketbridge_core::*;

/// Market data served from the upstream brokerage API.
pub struct BrokerageDataSource {
    pub client: UpstreamClient,
}

impl BrokerageDataSource {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Ok(Self::new(UpstreamClient::new(config)?))
    }
}

#[async_trait]
impl MarketDataSource for BrokerageDataSource {
    async fn products(&self) -> Result<Vec<Product>, UpstreamError> {
        let result = self
            .client
            .get(&["market", "products"], &[])
            .await
            .and_then(normalize::products);
        result.inspect_err(|e| tracing::error!(error = %e, "Error fetching products"))
    }

    async fn server_time(&self) -> Result<ServerTime, UpstreamError> {
        let result = self.client.get(&["time"], &[]).await.and_then(normalize::server_time);
        result.inspect_err(|e| tracing::error!(error = %e, "Error fetching server time"))
    }

    async fn product_book(&self, product_id: &str) -> Result<ProductBook, UpstreamError> {
        let query = [("product_id", product_id.to_string())];
        let result = self
            .client
            .get(&["market", "product_book"], &query)
            .await
            .and_then(|body| normalize::product_book(product_id, body));
        result.inspect_err(|e| {
            tracing::error!(product_id = %product_id, error = %e, "Error fetching product book")
        })
    }

    async fn product(&self, product_id: &str) -> Result<Product, UpstreamError> {
        let result = self
            .client
            .get(&["market", "products", product_id], &[])
            .await
            .and_then(normalize::product);
        result.inspect_err(|e| {
            tracing::error!(product_id = %product_id, error = %e, "Error fetching product")
        })
    }

    async fn candles(
        &self,
        product_id: &str,
        query: &CandleQuery,
    ) -> Result<Vec<Candle>, UpstreamError> {
        let params = [
            ("start", query.start.to_string()),
            ("end", query.end.to_string()),
            ("granularity", query.granularity.to_string()),
        ];
        let result = self
            .client
            .get(&["market", "products", product_id, "candles"], &params)
            .await
            .and_then(normalize::candles);
        result.inspect_err(|e| {
            tracing::error!(product_id = %product_id, error = %e, "Error fetching candles")
        })
    }

    async fn market_trades(&self, product_id: &str) -> Result<Vec<MarketTrade>, UpstreamError> {
        let result = self
            .client
            .get(&["market", "products", product_id, "ticker"], &[])
            .await
            .and_then(normalize::market_trades);
        result.inspect_err(|e| {
            tracing::error!(product_id = %product_id, error = %e, "Error fetching market trades")
        })
    }
}
