use marketbridge_core::{MarketDataSource, QueuePublisher};
use std::sync::Arc;

/// Shared application state accessible by all route handlers.
///
/// Nothing here is mutated after start-up.
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<dyn MarketDataSource>,
    pub publisher: Arc<dyn QueuePublisher>,
}

impl AppState {
    pub fn new(market: Arc<dyn MarketDataSource>, publisher: Arc<dyn QueuePublisher>) -> Self {
        Self { market, publisher }
    }
}
