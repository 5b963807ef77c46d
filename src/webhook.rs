//! Outbound dataset delivery.
//!
//! One POST of `{"data": [...]}` per completed pass. Delivery is
//! fire-and-forget from the pipeline's point of view: a failure is logged by
//! the runner and the in-memory dataset is unaffected. No retries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::config::BoardConfig;
use crate::core::types::LeaderboardEntry;

#[derive(Serialize)]
struct DispatchPayload<'a> {
    data: &'a [LeaderboardEntry],
}

#[async_trait]
pub trait DispatchSink: Send + Sync {
    async fn deliver(&self, entries: &[LeaderboardEntry]) -> Result<()>;

    /// Whether this sink actually sends anywhere. Purely informational.
    fn enabled(&self) -> bool {
        true
    }
}

/// POSTs the dataset to a configured webhook endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, url: String, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl DispatchSink for WebhookSink {
    async fn deliver(&self, entries: &[LeaderboardEntry]) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&DispatchPayload { data: entries })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!("webhook POST to {} failed: {}", self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("webhook {} answered {}", self.url, status));
        }

        info!("✅ Dispatched {} entries ({})", entries.len(), status);
        Ok(())
    }
}

/// Sink used when no webhook URL is configured.
pub struct DisabledSink;

#[async_trait]
impl DispatchSink for DisabledSink {
    async fn deliver(&self, entries: &[LeaderboardEntry]) -> Result<()> {
        debug!("no webhook configured — skipping dispatch of {} entries", entries.len());
        Ok(())
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Build the sink the config asks for.
pub fn sink_from_config(client: reqwest::Client, config: &BoardConfig) -> Arc<dyn DispatchSink> {
    match config.resolve_webhook_url() {
        Some(url) => Arc::new(WebhookSink::new(
            client,
            url,
            Duration::from_secs(config.dispatch_timeout_secs()),
        )),
        None => Arc::new(DisabledSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_shape() {
        let entries = vec![LeaderboardEntry::placeholder(0)];
        let json = serde_json::to_value(DispatchPayload { data: &entries }).unwrap();
        let rows = json
            .get("data")
            .and_then(|d| d.as_array())
            .expect("payload must wrap entries in a `data` array");
        assert_eq!(rows.len(), 1);
        // The consumer contract fixes these field names.
        for key in [
            "rank",
            "profile_icon",
            "name",
            "profile_url",
            "wallet_address",
            "wins",
            "losses",
            "sol_number",
            "dollar_value",
            "x_profile_url",
        ] {
            assert!(rows[0].get(key).is_some(), "missing wire field `{}`", key);
        }
    }

    #[test]
    fn test_sink_selection_follows_config() {
        let with_url = BoardConfig {
            webhook_url: Some("https://hooks.example.com/abc".to_string()),
            ..Default::default()
        };
        assert!(sink_from_config(reqwest::Client::new(), &with_url).enabled());

        let without_url = BoardConfig {
            webhook_url: Some(String::new()),
            ..Default::default()
        };
        assert!(!sink_from_config(reqwest::Client::new(), &without_url).enabled());
    }
}
