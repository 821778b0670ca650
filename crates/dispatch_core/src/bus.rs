//! Telemetry bus boundary: batched domain logs and journey records.

use async_trait::async_trait;
use thiserror::Error;

use crate::telemetry::DomainLog;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unreachable: {0}")]
    Transport(String),
    #[error("bus rejected the publish: {0}")]
    Rejected(String),
}

/// External message bus the dispatcher publishes to. No acknowledgement
/// beyond the `Result` is expected; publish failures are logged and the
/// payload dropped.
#[async_trait]
pub trait TelemetryBus: Send + Sync {
    /// Publish one batch of domain log entries.
    async fn publish_domain_logs(&self, logs: &[DomainLog]) -> Result<(), BusError>;

    /// Publish one journey record with its waypoints encoded as a WKT
    /// `LINESTRING` (longitude first).
    async fn publish_journey(
        &self,
        journey_id: u64,
        truck_id: u64,
        route_geography: &str,
    ) -> Result<(), BusError>;
}

/// Discards everything. Useful when running without a bus attached.
#[derive(Debug, Default)]
pub struct NullBus;

#[async_trait]
impl TelemetryBus for NullBus {
    async fn publish_domain_logs(&self, _logs: &[DomainLog]) -> Result<(), BusError> {
        Ok(())
    }

    async fn publish_journey(
        &self,
        _journey_id: u64,
        _truck_id: u64,
        _route_geography: &str,
    ) -> Result<(), BusError> {
        Ok(())
    }
}
