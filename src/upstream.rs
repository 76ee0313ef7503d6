//! Upstream feed client.
//!
//! One network exchange per invocation: a POST carrying the fixed
//! request body for non-historical, non-identified train data, bounded
//! by a total request timeout. There are no retries; a failed cycle
//! waits for the next tick.

use std::time::Duration;

use reqwest::header;
use serde_json::json;

use crate::config::TrackerConfig;
use crate::domain::RawSnapshot;
use crate::error::TrackerError;

/// HTTP client for the train-position feed.
#[derive(Debug, Clone)]
pub struct TrainsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TrainsClient {
    /// Builds a client with the configured endpoint and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Fetch`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.upstream_url.clone(),
        })
    }

    /// Performs one fetch against the feed and returns the raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Fetch`] on transport failure, timeout, or
    /// a non-success HTTP status.
    pub async fn fetch(&self) -> Result<RawSnapshot, TrackerError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(&request_body())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Fixed request body: current train positions, no history, no
/// identification.
fn request_body() -> serde_json::Value {
    json!({"a": "TRAINS", "jo": {"history": false, "id": false}})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_feed_contract() {
        let body = request_body();
        assert_eq!(
            body.to_string(),
            r#"{"a":"TRAINS","jo":{"history":false,"id":false}}"#
        );
    }
}
