use marketbridge_core::{UpstreamConfig, UpstreamError};
use reqwest::{Client, Url};
use serde_json::Value;

/// Thin GET-only client for the upstream brokerage API.
///
/// Every call builds its URL from the configured base plus path segments, so
/// product ids are percent-encoded rather than spliced into the path.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| UpstreamError::Request {
            path: config.base_url.clone(),
            message: format!("Invalid base URL: {}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::Request {
                path: config.base_url.clone(),
                message: "Base URL cannot carry a path".to_string(),
            });
        }

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("marketbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Request {
                path: config.base_url.clone(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { http, base_url })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `segments` under the base URL and parse the JSON body.
    ///
    /// Non-2xx responses become [`UpstreamError::Status`] carrying the body text.
    pub async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let path = format!("/{}", segments.join("/"));
        let url = self.url(segments);
        tracing::debug!(url = %url, "Upstream GET");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| UpstreamError::Request {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string()
            } else {
                body
            };
            return Err(UpstreamError::Status {
                path,
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Schema(format!("Invalid JSON from {}: {}", path, e)))
    }
}
