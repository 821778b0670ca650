//! HTTP telemetry bus publisher.
//!
//! Publishes JSON to topic endpoints under a configured base URL:
//! domain log batches to `topics/domain-logs`, journey records to
//! `topics/journeys`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use dispatch_core::bus::{BusError, TelemetryBus};
use dispatch_core::telemetry::DomainLog;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpBus {
    client: Client,
    base_url: String,
}

impl HttpBus {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build bus HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{topic}", self.base_url)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        topic: &str,
        body: &T,
    ) -> Result<(), BusError> {
        let response = self
            .client
            .post(self.topic_url(topic))
            .json(body)
            .send()
            .await
            .map_err(|err| BusError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BusError::Rejected(response.status().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryBus for HttpBus {
    async fn publish_domain_logs(&self, logs: &[DomainLog]) -> Result<(), BusError> {
        self.post_json("domain-logs", logs).await
    }

    async fn publish_journey(
        &self,
        journey_id: u64,
        truck_id: u64,
        route_geography: &str,
    ) -> Result<(), BusError> {
        self.post_json(
            "journeys",
            &json!({
                "journey_id": journey_id,
                "truck_id": truck_id,
                "route_geography": route_geography,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_urls_join_cleanly() {
        let bus = HttpBus::new("http://bus.local/");
        assert_eq!(bus.topic_url("domain-logs"), "http://bus.local/topics/domain-logs");
        assert_eq!(bus.topic_url("journeys"), "http://bus.local/topics/journeys");
    }
}
