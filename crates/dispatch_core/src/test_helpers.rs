//! Shared fixtures for tests: a deterministic route provider, a recording
//! bus, and a canonical three-truck fleet.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bus::{BusError, TelemetryBus};
use crate::fleet::Fleet;
use crate::route::Route;
use crate::routing::{RouteEndpoint, RouteProvider, RoutingError};
use crate::spatial::LocationPoint;
use crate::telemetry::DomainLog;

/// Deterministic provider: every address maps to a stable synthetic
/// position, every route is a two-point leg with a fixed duration.
#[derive(Debug)]
pub struct StubRouteProvider {
    pub leg_duration_secs: u64,
}

impl Default for StubRouteProvider {
    fn default() -> Self {
        Self {
            leg_duration_secs: 120,
        }
    }
}

impl StubRouteProvider {
    /// Hash an address into a stable in-range coordinate.
    pub fn position_for(address: &str) -> LocationPoint {
        let mut hash: u64 = 0;
        for byte in address.bytes() {
            hash = hash.wrapping_mul(31).wrapping_add(u64::from(byte));
        }
        LocationPoint::new((hash % 90) as f64, (hash / 90 % 180) as f64)
    }

    fn resolve(endpoint: RouteEndpoint) -> (Option<String>, LocationPoint) {
        match endpoint {
            RouteEndpoint::Address(address) => {
                let position = Self::position_for(&address);
                (Some(address), position)
            }
            RouteEndpoint::Position(position) => (None, position),
        }
    }
}

#[async_trait]
impl RouteProvider for StubRouteProvider {
    async fn route(
        &self,
        origin: RouteEndpoint,
        destination: RouteEndpoint,
    ) -> Result<Route, RoutingError> {
        let (origin_address, origin_location) = Self::resolve(origin);
        let (destination_address, destination_location) = Self::resolve(destination);
        Ok(Route {
            origin_address,
            origin_location: Some(origin_location),
            destination_address,
            destination_location: Some(destination_location),
            waypoints: vec![origin_location, destination_location],
            expected_duration_secs: self.leg_duration_secs,
        })
    }

    async fn geocode(&self, address: &str) -> Result<LocationPoint, RoutingError> {
        Ok(Self::position_for(address))
    }
}

/// Captures everything published so tests can assert on it.
#[derive(Debug, Default)]
pub struct RecordingBus {
    pub domain_logs: Mutex<Vec<DomainLog>>,
    /// `(journey_id, truck_id, route_geography)` per published journey.
    pub journeys: Mutex<Vec<(u64, u64, String)>>,
}

#[async_trait]
impl TelemetryBus for RecordingBus {
    async fn publish_domain_logs(&self, logs: &[DomainLog]) -> Result<(), BusError> {
        self.domain_logs.lock().extend_from_slice(logs);
        Ok(())
    }

    async fn publish_journey(
        &self,
        journey_id: u64,
        truck_id: u64,
        route_geography: &str,
    ) -> Result<(), BusError> {
        self.journeys
            .lock()
            .push((journey_id, truck_id, route_geography.to_string()));
        Ok(())
    }
}

/// Three trucks with capacities 5000 / 10000 / 15000, mirroring the
/// canonical deployment fleet.
pub fn test_fleet() -> Fleet {
    Fleet::new(vec![
        (LocationPoint::new(54.687, 25.28), 5000),
        (LocationPoint::new(54.898, 23.903), 10000),
        (LocationPoint::new(55.703, 21.144), 15000),
    ])
}
