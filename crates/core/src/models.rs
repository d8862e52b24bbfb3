use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Market metadata for a tradeable product (e.g. BTC-USD).
///
/// Numeric quantities are kept as the strings upstream sends. Optional
/// sections default to `None` and are serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub price: String,
    pub price_percentage_change_24h: String,
    pub volume_24h: String,
    pub volume_percentage_change_24h: String,
    pub base_increment: String,
    pub quote_increment: String,
    pub quote_min_size: String,
    pub quote_max_size: String,
    pub base_min_size: String,
    pub base_max_size: String,
    pub base_name: String,
    pub quote_name: String,
    pub watched: bool,
    pub is_disabled: bool,
    pub new: bool,
    pub status: String,
    pub cancel_only: bool,
    pub limit_only: bool,
    pub post_only: bool,
    pub trading_disabled: bool,
    pub auction_mode: bool,
    pub product_type: String,
    pub quote_currency_id: String,
    pub base_currency_id: String,
    #[serde(default)]
    pub fcm_trading_session_details: Option<FcmTradingSessionDetails>,
    #[serde(default)]
    pub mid_market_price: Option<String>,
    pub alias: String,
    pub alias_to: Vec<String>,
    pub base_display_symbol: String,
    pub quote_display_symbol: String,
    pub view_only: bool,
    pub price_increment: String,
    #[serde(default)]
    pub future_product_details: Option<FutureProductDetails>,
    pub display_name: String,
    pub product_venue: String,
    pub approximate_quote_24h_volume: String,
}

/// Trading session window for FCM (futures) products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FcmTradingSessionDetails {
    #[serde(default)]
    pub is_session_open: Option<bool>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
}

/// Contract details, present only for futures products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FutureProductDetails {
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub contract_code: Option<String>,
    #[serde(default)]
    pub contract_expiry: Option<String>,
    #[serde(default)]
    pub contract_size: Option<String>,
    #[serde(default)]
    pub contract_root_unit: Option<String>,
    #[serde(default)]
    pub group_description: Option<String>,
    #[serde(default)]
    pub contract_expiry_timezone: Option<String>,
    #[serde(default)]
    pub group_short_description: Option<String>,
    #[serde(default)]
    pub risk_managed_by: Option<String>,
    #[serde(default)]
    pub contract_expiry_type: Option<String>,
    #[serde(default)]
    pub perpetual_details: Option<PerpetualDetails>,
    #[serde(default)]
    pub contract_display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerpetualDetails {
    #[serde(default)]
    pub open_interest: Option<String>,
    #[serde(default)]
    pub funding_rate: Option<String>,
    #[serde(default)]
    pub funding_time: Option<String>,
}

// ---------------------------------------------------------------------------
// Server time
// ---------------------------------------------------------------------------

/// Upstream clock, as an ISO string plus two epoch renderings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerTime {
    pub iso: String,
    #[serde(rename = "epochSeconds")]
    pub epoch_seconds: String,
    #[serde(rename = "epochMillis")]
    pub epoch_millis: String,
}

// ---------------------------------------------------------------------------
// Order book
// ---------------------------------------------------------------------------

/// A single price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub price: String,
    pub size: String,
}

/// Bids and asks for one product at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    pub product_id: String,
    #[serde(default)]
    pub bids: Vec<BookEntry>,
    #[serde(default)]
    pub asks: Vec<BookEntry>,
    #[serde(default)]
    pub time: String,
}

impl PriceBook {
    /// An empty book for `product_id`, used when upstream returns no book.
    pub fn empty(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            ..Default::default()
        }
    }
}

/// Canonical product-book response: the book is always nested under `pricebook`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBook {
    pub pricebook: PriceBook,
}

// ---------------------------------------------------------------------------
// Candles & trades
// ---------------------------------------------------------------------------

/// A single OHLCV candle. Every field stays in upstream's string encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub start: String,
    pub low: String,
    pub high: String,
    pub open: String,
    pub close: String,
    pub volume: String,
}

/// A public trade print from the ticker endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTrade {
    pub trade_id: String,
    pub product_id: String,
    pub price: String,
    pub size: String,
    pub time: String,
    pub side: String,
    pub bid: String,
    pub ask: String,
}

/// Candle bucket width accepted by the candles endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    UnknownGranularity,
    OneMinute,
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    #[default]
    OneHour,
    TwoHour,
    SixHour,
    OneDay,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::UnknownGranularity => "UNKNOWN_GRANULARITY",
            Granularity::OneMinute => "ONE_MINUTE",
            Granularity::FiveMinute => "FIVE_MINUTE",
            Granularity::FifteenMinute => "FIFTEEN_MINUTE",
            Granularity::ThirtyMinute => "THIRTY_MINUTE",
            Granularity::OneHour => "ONE_HOUR",
            Granularity::TwoHour => "TWO_HOUR",
            Granularity::SixHour => "SIX_HOUR",
            Granularity::OneDay => "ONE_DAY",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UNKNOWN_GRANULARITY" => Ok(Granularity::UnknownGranularity),
            "ONE_MINUTE" => Ok(Granularity::OneMinute),
            "FIVE_MINUTE" => Ok(Granularity::FiveMinute),
            "FIFTEEN_MINUTE" => Ok(Granularity::FifteenMinute),
            "THIRTY_MINUTE" => Ok(Granularity::ThirtyMinute),
            "ONE_HOUR" => Ok(Granularity::OneHour),
            "TWO_HOUR" => Ok(Granularity::TwoHour),
            "SIX_HOUR" => Ok(Granularity::SixHour),
            "ONE_DAY" => Ok(Granularity::OneDay),
            _ => Err(ValidationError::InvalidGranularity(s.to_string())),
        }
    }
}

/// Parameters for a candles request, with start/end already in Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleQuery {
    pub start: i64,
    pub end: i64,
    pub granularity: Granularity,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// The JSON envelope carried on the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message: String,
}

impl QueueMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
