//! Pure mappings from raw upstream JSON to the canonical schema.
//!
//! Nothing here performs I/O; the upstream client hands each response body to
//! the matching function and returns whatever comes out.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::models::*;

/// Decode a value into `T`, failing on any type mismatch.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, UpstreamError> {
    serde_json::from_value(value).map_err(|e| UpstreamError::Schema(e.to_string()))
}

/// Take a required key out of an object body.
fn take_field(body: &mut Value, key: &str) -> Result<Value, UpstreamError> {
    body.get_mut(key)
        .map(Value::take)
        .ok_or_else(|| UpstreamError::Schema(format!("missing '{}' in response", key)))
}

/// `GET /market/products` → the `products` array.
pub fn products(mut body: Value) -> Result<Vec<Product>, UpstreamError> {
    decode(take_field(&mut body, "products")?)
}

/// `GET /time` → server time, unchanged.
pub fn server_time(body: Value) -> Result<ServerTime, UpstreamError> {
    decode(body)
}

/// `GET /market/products/{id}` → a single product.
///
/// `future_product_details` is present as `null` when upstream omits it.
pub fn product(body: Value) -> Result<Product, UpstreamError> {
    decode(body)
}

/// `GET /market/product_book` → a book that is always nested under `pricebook`.
///
/// A missing or `null` envelope is replaced by an empty book for `product_id`.
pub fn product_book(product_id: &str, mut body: Value) -> Result<ProductBook, UpstreamError> {
    let pricebook = match body.get_mut("pricebook").map(Value::take) {
        Some(Value::Null) | None => {
            tracing::debug!(product_id = %product_id, "Upstream returned no pricebook, using empty book");
            PriceBook::empty(product_id)
        }
        Some(raw) => decode(raw)?,
    };
    Ok(ProductBook { pricebook })
}

/// `GET /market/products/{id}/candles` → the `candles` array.
pub fn candles(mut body: Value) -> Result<Vec<Candle>, UpstreamError> {
    decode(take_field(&mut body, "candles")?)
}

/// `GET /market/products/{id}/ticker` → the `trades` array, empty when absent.
pub fn market_trades(mut body: Value) -> Result<Vec<MarketTrade>, UpstreamError> {
    match body.get_mut("trades").map(Value::take) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(raw) => decode(raw),
    }
}
