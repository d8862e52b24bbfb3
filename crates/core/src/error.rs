/// Errors talking to the upstream market-data API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Request to {path} failed: {message}")]
    Request { path: String, message: String },
    #[error("Upstream returned {status} for {path}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },
    #[error("Unexpected response schema: {0}")]
    Schema(String),
}

impl UpstreamError {
    /// HTTP status reported by upstream, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors talking to the message broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Channel error: {0}")]
    Channel(String),
    #[error("Queue declare failed for '{queue}': {message}")]
    Declare { queue: String, message: String },
    #[error("Publish failed: {0}")]
    Publish(String),
    #[error("Consume failed: {0}")]
    Consume(String),
    #[error("Acknowledgement failed: {0}")]
    Ack(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A malformed or missing request parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    Missing(&'static str),
    #[error("Parameter {field} must not be empty")]
    Empty { field: &'static str },
    #[error("Invalid timestamp for {field}: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("Invalid granularity: '{0}'")]
    InvalidGranularity(String),
    #[error("Invalid range: end ({end}) is before start ({start})")]
    InvalidRange { start: i64, end: i64 },
    #[error("Malformed request: {0}")]
    Malformed(String),
}
