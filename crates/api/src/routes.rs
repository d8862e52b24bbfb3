use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use marketbridge_core::time::parse_timestamp_param;
use marketbridge_core::*;
use serde::Deserialize;
use std::sync::Arc;

pub const WELCOME_MESSAGE: &str = "Welcome to the Coinbase Public Data API";
pub const PUBLISHED_STATUS: &str = "Message published";

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Market data
        .route("/products", get(fetch_products))
        .route("/server-time", get(fetch_server_time))
        .route("/product-book/{product_id}", get(fetch_product_book))
        .route("/product/{product_id}", get(fetch_product))
        .route("/candles/{product_id}", get(fetch_candles))
        .route("/market-trades/{product_id}", get(fetch_market_trades))
        // Queue
        .route("/publish/{queue_name}", post(publish_message))
}

// ---------------------------------------------------------------------------
// Root & Health
// ---------------------------------------------------------------------------

pub async fn read_root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": WELCOME_MESSAGE }))
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Unwrap a single path segment, turning axum's rejection into a validation error.
fn path_param(param: Result<Path<String>, PathRejection>) -> Result<String, ValidationError> {
    param
        .map(|Path(value)| value)
        .map_err(|e| ValidationError::Malformed(e.body_text()))
}

async fn fetch_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.market.products().await?))
}

async fn fetch_server_time(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServerTime>, ApiError> {
    Ok(Json(state.market.server_time().await?))
}

async fn fetch_product_book(
    State(state): State<Arc<AppState>>,
    product_id: Result<Path<String>, PathRejection>,
) -> Result<Json<ProductBook>, ApiError> {
    let product_id = path_param(product_id)?;
    Ok(Json(state.market.product_book(&product_id).await?))
}

async fn fetch_product(
    State(state): State<Arc<AppState>>,
    product_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Product>, ApiError> {
    let product_id = path_param(product_id)?;
    Ok(Json(state.market.product(&product_id).await?))
}

#[derive(Debug, Default, Deserialize)]
struct CandleParams {
    start: Option<String>,
    end: Option<String>,
    granularity: Option<String>,
}

impl CandleParams {
    fn into_query(self) -> Result<CandleQuery, ValidationError> {
        let start = self.start.ok_or(ValidationError::Missing("start"))?;
        let end = self.end.ok_or(ValidationError::Missing("end"))?;
        let start = parse_timestamp_param("start", &start)?;
        let end = parse_timestamp_param("end", &end)?;
        if end < start {
            return Err(ValidationError::InvalidRange { start, end });
        }

        let granularity = match self.granularity.as_deref() {
            None | Some("") => Granularity::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(CandleQuery {
            start,
            end,
            granularity,
        })
    }
}

async fn fetch_candles(
    State(state): State<Arc<AppState>>,
    product_id: Result<Path<String>, PathRejection>,
    params: Result<Query<CandleParams>, QueryRejection>,
) -> Result<Json<Vec<Candle>>, ApiError> {
    let product_id = path_param(product_id)?;
    let Query(params) = params.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let query = params.into_query()?;
    Ok(Json(state.market.candles(&product_id, &query).await?))
}

async fn fetch_market_trades(
    State(state): State<Arc<AppState>>,
    product_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<MarketTrade>>, ApiError> {
    let product_id = path_param(product_id)?;
    Ok(Json(state.market.market_trades(&product_id).await?))
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

async fn publish_message(
    State(state): State<Arc<AppState>>,
    queue_name: Result<Path<String>, PathRejection>,
    payload: Result<Json<QueueMessage>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let queue_name = path_param(queue_name)?;
    if queue_name.trim().is_empty() {
        return Err(ValidationError::Empty { field: "queue_name" }.into());
    }
    let Json(payload) = payload.map_err(|e| ValidationError::Malformed(e.body_text()))?;

    state.publisher.publish(&queue_name, &payload.message).await?;
    Ok(Json(serde_json::json!({ "status": PUBLISHED_STATUS })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use marketbridge_data::BrokerageDataSource;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl QueuePublisher for RecordingPublisher {
        async fn publish(&self, queue_name: &str, message: &str) -> Result<(), BrokerError> {
            if self.fail {
                return Err(BrokerError::Connection("connection refused".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((queue_name.to_string(), message.to_string()));
            Ok(())
        }
    }

    async fn app_with(server: &MockServer, publisher: Arc<RecordingPublisher>) -> Router {
        let config = UpstreamConfig::with_base_url(format!("{}/api/v3/brokerage", server.uri()));
        let market = BrokerageDataSource::from_config(&config).unwrap();
        build_router(AppState::new(Arc::new(market), publisher))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn product_json(with_future_details: bool) -> Value {
        let mut product = json!({
            "product_id": "BTC-USD", "price": "42000.01",
            "price_percentage_change_24h": "1.5", "volume_24h": "1234.5",
            "volume_percentage_change_24h": "-3.2", "base_increment": "0.00000001",
            "quote_increment": "0.01", "quote_min_size": "1", "quote_max_size": "150000000",
            "base_min_size": "0.00000001", "base_max_size": "3400", "base_name": "Bitcoin",
            "quote_name": "US Dollar", "watched": false, "is_disabled": false, "new": false,
            "status": "online", "cancel_only": false, "limit_only": false, "post_only": false,
            "trading_disabled": false, "auction_mode": false, "product_type": "SPOT",
            "quote_currency_id": "USD", "base_currency_id": "BTC", "alias": "",
            "alias_to": [], "base_display_symbol": "BTC", "quote_display_symbol": "USD",
            "view_only": false, "price_increment": "0.01", "display_name": "BTC-USD",
            "product_venue": "CBE", "approximate_quote_24h_volume": "51840000.12"
        });
        if with_future_details {
            product["future_product_details"] = json!({
                "venue": "cde", "contract_code": "BIT",
                "perpetual_details": {"funding_rate": "0.0001"}
            });
        }
        product
    }

    #[tokio::test]
    async fn test_read_root() {
        let server = MockServer::start().await;
        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Welcome to the Coinbase Public Data API"}));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_get_products() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/market/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [product_json(false), product_json(true)],
                "num_products": 2
            })))
            .mount(&server)
            .await;

        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/public/products").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["future_product_details"], Value::Null);
        assert_eq!(body[1]["future_product_details"]["venue"], "cde");
        assert_eq!(body[1]["future_product_details"]["contract_expiry"], Value::Null);
    }

    #[tokio::test]
    async fn test_get_server_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "iso": "2024-01-01T00:00:00Z",
                "epochSeconds": "1704067200",
                "epochMillis": "1704067200000"
            })))
            .mount(&server)
            .await;

        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/public/server-time").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["epochSeconds"], "1704067200");
        assert_eq!(body["epochMillis"], "1704067200000");
    }

    #[tokio::test]
    async fn test_product_without_future_details_has_null_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/market/products/BTC-USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(product_json(false)))
            .mount(&server)
            .await;

        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/public/product/BTC-USD").await;
        assert_eq!(status, StatusCode::OK);
        let fields = body.as_object().unwrap();
        assert!(fields.contains_key("future_product_details"));
        assert_eq!(fields["future_product_details"], Value::Null);
        assert_eq!(fields["mid_market_price"], Value::Null);
    }

    #[tokio::test]
    async fn test_product_book_synthesized_when_upstream_omits_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/market/product_book"))
            .and(query_param("product_id", "ETH-USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"last": "2000"})))
            .mount(&server)
            .await;

        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/public/product-book/ETH-USD").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"pricebook": {"product_id": "ETH-USD", "bids": [], "asks": [], "time": ""}})
        );
    }

    #[tokio::test]
    async fn test_candles_convert_iso_bounds_and_keep_strings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/market/products/BTC-USD/candles"))
            .and(query_param("start", "1704067200"))
            .and(query_param("end", "1704153600"))
            .and(query_param("granularity", "ONE_HOUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candles": [{
                    "start": "1704067200", "low": "100.5", "high": "101.25",
                    "open": "100.75", "close": "101.00", "volume": "12.3"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(
            app,
            "/public/candles/BTC-USD?start=2024-01-01T00:00:00&end=2024-01-02T00:00:00",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["low"], json!("100.5"));
        assert_eq!(body[0]["close"], json!("101.00"));
    }

    #[tokio::test]
    async fn test_candles_validation_errors_are_500_with_detail() {
        let server = MockServer::start().await;
        let cases = [
            ("/public/candles/BTC-USD?end=2024-01-02T00:00:00", "start"),
            ("/public/candles/BTC-USD?start=2024-01-01T00:00:00", "end"),
            ("/public/candles/BTC-USD?start=soon&end=2024-01-02T00:00:00", "soon"),
            (
                "/public/candles/BTC-USD?start=2024-01-02T00:00:00&end=2024-01-01T00:00:00",
                "before",
            ),
            (
                "/public/candles/BTC-USD?start=2024-01-01&end=2024-01-02&granularity=HOURLY",
                "HOURLY",
            ),
        ];

        for (uri, needle) in cases {
            let app = app_with(&server, Arc::default()).await;
            let (status, body) = get_json(app, uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            let detail = body["detail"].as_str().unwrap();
            assert!(detail.contains(needle), "{} -> {}", uri, detail);
        }
    }

    #[tokio::test]
    async fn test_market_trades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/market/products/BTC-USD/ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trades": [{
                    "trade_id": "42", "product_id": "BTC-USD", "price": "42000.00",
                    "size": "0.01", "time": "2024-01-01T00:00:00Z", "side": "SELL",
                    "bid": "", "ask": ""
                }],
                "best_bid": "41999.99",
                "best_ask": "42000.01"
            })))
            .mount(&server)
            .await;

        let app = app_with(&server, Arc::default()).await;
        let (status, body) = get_json(app, "/public/market-trades/BTC-USD").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["trade_id"], "42");
        assert_eq!(body[0]["price"], "42000.00");
    }

    #[tokio::test]
    async fn test_upstream_errors_become_500_on_every_get_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("product not found"))
            .mount(&server)
            .await;

        let routes = [
            "/public/products",
            "/public/server-time",
            "/public/product-book/BTC-USD",
            "/public/product/BTC-USD",
            "/public/candles/BTC-USD?start=2024-01-01&end=2024-01-02",
            "/public/market-trades/BTC-USD",
        ];
        for uri in routes {
            let app = app_with(&server, Arc::default()).await;
            let (status, body) = get_json(app, uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            assert!(!body["detail"].as_str().unwrap().is_empty(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_network_failure_becomes_500() {
        let config = UpstreamConfig::with_base_url("http://127.0.0.1:1/api/v3/brokerage");
        let market = BrokerageDataSource::from_config(&config).unwrap();
        let app = build_router(AppState::new(
            Arc::new(market),
            Arc::new(RecordingPublisher::default()),
        ));

        let (status, body) = get_json(app, "/public/server-time").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["detail"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_message() {
        let server = MockServer::start().await;
        let publisher = Arc::new(RecordingPublisher::default());
        let app = app_with(&server, publisher.clone()).await;

        let (status, body) =
            post_json(app, "/public/publish/test_queue", r#"{"message": "hello"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "Message published"}));
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec![("test_queue".to_string(), "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_publish_rejects_malformed_body() {
        let server = MockServer::start().await;
        let publisher = Arc::new(RecordingPublisher::default());
        let app = app_with(&server, publisher.clone()).await;

        let (status, body) = post_json(app, "/public/publish/test_queue", r#"{"msg": 1}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("Malformed request"));
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_broker_failure_is_500() {
        let server = MockServer::start().await;
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let app = app_with(&server, publisher).await;

        let (status, body) =
            post_json(app, "/public/publish/test_queue", r#"{"message": "hello"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_undecodable_path_params_are_500_with_detail() {
        let server = MockServer::start().await;
        for uri in [
            "/public/product/%FF",
            "/public/product-book/%C3%28",
            "/public/candles/%FF?start=2024-01-01&end=2024-01-02",
            "/public/market-trades/%FF",
        ] {
            let app = app_with(&server, Arc::default()).await;
            let (status, body) = get_json(app, uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            assert!(body["detail"].as_str().unwrap().starts_with("Malformed request"), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_publish_rejects_undecodable_queue_name() {
        let server = MockServer::start().await;
        let publisher = Arc::new(RecordingPublisher::default());
        let app = app_with(&server, publisher.clone()).await;

        let (status, body) = post_json(app, "/public/publish/%FF", r#"{"message": "hello"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("queue_name"));
        assert!(publisher.sent.lock().unwrap().is_empty());
    }
}
