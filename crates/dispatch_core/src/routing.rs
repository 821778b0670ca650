//! Pluggable routing/geocoding provider boundary.
//!
//! The engine only sees this trait; the server crate supplies an HTTP
//! implementation. Provider failures are recoverable: the dispatcher
//! retries with bounded exponential backoff and drops the request once
//! the budget is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::route::Route;
use crate::spatial::LocationPoint;

/// Either side of a route query.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEndpoint {
    Address(String),
    Position(LocationPoint),
}

impl RouteEndpoint {
    pub fn address(address: impl Into<String>) -> Self {
        RouteEndpoint::Address(address.into())
    }

    pub fn position(position: LocationPoint) -> Self {
        RouteEndpoint::Position(position)
    }
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing backend unreachable: {0}")]
    Transport(String),
    #[error("routing backend rejected the query: {0}")]
    Api(String),
    #[error("malformed routing response: {0}")]
    Malformed(String),
    #[error("no route between the requested endpoints")]
    NoRoute,
}

/// Routing and geocoding backend.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Compute an ordered waypoint path and duration estimate between two
    /// endpoints.
    async fn route(
        &self,
        origin: RouteEndpoint,
        destination: RouteEndpoint,
    ) -> Result<Route, RoutingError>;

    /// Resolve an address to a single position.
    async fn geocode(&self, address: &str) -> Result<LocationPoint, RoutingError>;
}

/// Retry budget for provider queries. Backoff doubles after each failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Query a route, retrying per `policy`. Returns the last error once the
/// attempt budget is spent.
pub async fn route_with_retry(
    provider: &dyn RouteProvider,
    origin: RouteEndpoint,
    destination: RouteEndpoint,
    policy: &RetryPolicy,
) -> Result<Route, RoutingError> {
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut last_error = RoutingError::NoRoute;

    for attempt in 1..=attempts {
        match provider.route(origin.clone(), destination.clone()).await {
            Ok(route) => return Ok(route),
            Err(err) => {
                warn!(attempt, attempts, error = %err, "route query failed");
                last_error = err;
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error)
}
