//! HTTP routing/geocoding adapter.
//!
//! Routes come from an OSRM-compatible `/route/v1/driving` endpoint
//! (GeoJSON geometry, duration in seconds); addresses are resolved through
//! a Nominatim-compatible `/search` endpoint. Both are thin: response
//! parsing is kept in pure functions so it can be tested without a server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use dispatch_core::route::Route;
use dispatch_core::routing::{RouteEndpoint, RouteProvider, RoutingError};
use dispatch_core::spatial::LocationPoint;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpRouteProvider {
    client: Client,
    routing_endpoint: String,
    geocoding_endpoint: String,
}

impl HttpRouteProvider {
    pub fn new(routing_endpoint: &str, geocoding_endpoint: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build routing HTTP client");
        Self {
            client,
            routing_endpoint: routing_endpoint.trim_end_matches('/').to_string(),
            geocoding_endpoint: geocoding_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Turn an endpoint into a concrete position, geocoding addresses and
    /// remembering which address produced it.
    async fn resolve(
        &self,
        endpoint: RouteEndpoint,
    ) -> Result<(Option<String>, LocationPoint), RoutingError> {
        match endpoint {
            RouteEndpoint::Address(address) => {
                let position = self.geocode(&address).await?;
                Ok((Some(address), position))
            }
            RouteEndpoint::Position(position) => Ok((None, position)),
        }
    }
}

#[async_trait]
impl RouteProvider for HttpRouteProvider {
    async fn route(
        &self,
        origin: RouteEndpoint,
        destination: RouteEndpoint,
    ) -> Result<Route, RoutingError> {
        let (origin_address, origin_location) = self.resolve(origin).await?;
        let (destination_address, destination_location) = self.resolve(destination).await?;

        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.routing_endpoint,
            origin_location.lon,
            origin_location.lat,
            destination_location.lon,
            destination_location.lat,
        );
        let response: RouteResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RoutingError::Transport(err.to_string()))?
            .json()
            .await
            .map_err(|err| RoutingError::Malformed(err.to_string()))?;

        parse_route_response(
            response,
            origin_address,
            origin_location,
            destination_address,
            destination_location,
        )
    }

    async fn geocode(&self, address: &str) -> Result<LocationPoint, RoutingError> {
        let url = format!("{}/search", self.geocoding_endpoint);
        let hits: Vec<GeocodeHit> = self
            .client
            .get(url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|err| RoutingError::Transport(err.to_string()))?
            .json()
            .await
            .map_err(|err| RoutingError::Malformed(err.to_string()))?;

        parse_geocode_response(address, hits)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteEntry {
    duration: f64,
    geometry: RouteGeometry,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteGeometry {
    /// `[lon, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

/// Nominatim reports coordinates as strings.
#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeHit {
    lat: String,
    lon: String,
}

fn parse_route_response(
    response: RouteResponse,
    origin_address: Option<String>,
    origin_location: LocationPoint,
    destination_address: Option<String>,
    destination_location: LocationPoint,
) -> Result<Route, RoutingError> {
    if response.code != "Ok" {
        return Err(RoutingError::Api(response.code));
    }
    let entry = response.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
    let waypoints: Vec<LocationPoint> = entry
        .geometry
        .coordinates
        .iter()
        .map(|[lon, lat]| LocationPoint::new(*lat, *lon))
        .collect();
    if waypoints.is_empty() {
        return Err(RoutingError::Malformed(
            "route geometry has no coordinates".to_string(),
        ));
    }
    Ok(Route {
        origin_address,
        origin_location: Some(origin_location),
        destination_address,
        destination_location: Some(destination_location),
        waypoints,
        expected_duration_secs: entry.duration.round() as u64,
    })
}

fn parse_geocode_response(
    address: &str,
    hits: Vec<GeocodeHit>,
) -> Result<LocationPoint, RoutingError> {
    let hit = hits
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::Api(format!("no geocoding result for {address:?}")))?;
    let lat = hit
        .lat
        .parse()
        .map_err(|_| RoutingError::Malformed(format!("bad latitude {:?}", hit.lat)))?;
    let lon = hit
        .lon
        .parse()
        .map_err(|_| RoutingError::Malformed(format!("bad longitude {:?}", hit.lon)))?;
    Ok(LocationPoint::new(lat, lon))
}
