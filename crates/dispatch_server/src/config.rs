//! Environment-driven configuration. The core crate never reads the
//! environment; everything is collected here once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use dispatch_core::dispatcher::DispatcherConfig;
use dispatch_core::routing::RetryPolicy;

/// One configured truck: where it starts and how much it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeBase {
    pub address: String,
    pub max_load_weight: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub routing_endpoint: String,
    pub geocoding_endpoint: String,
    /// Base URL of the telemetry bus; `None` disables publishing.
    pub bus_base_url: Option<String>,
    pub fleet: Vec<HomeBase>,
    pub intake_capacity: usize,
    pub state_report_interval: Duration,
    pub telemetry_flush_interval: Duration,
    pub journey_step_interval: Duration,
    pub route_retry_attempts: u32,
    pub route_retry_backoff: Duration,
}

const DEFAULT_FLEET: &str =
    "Vilnius, Lithuania=5000|Kaunas, Lithuania=10000|Klaipeda, Lithuania=15000";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let fleet_spec =
            std::env::var("DISPATCH_FLEET").unwrap_or_else(|_| DEFAULT_FLEET.to_string());
        Ok(Self {
            bind_addr: env_or("DISPATCH_BIND_ADDR", "0.0.0.0:8000".parse()?)?,
            routing_endpoint: env_string("DISPATCH_ROUTING_ENDPOINT", "http://localhost:5000"),
            geocoding_endpoint: env_string("DISPATCH_GEOCODING_ENDPOINT", "http://localhost:8080"),
            bus_base_url: std::env::var("DISPATCH_BUS_BASE_URL").ok(),
            fleet: parse_fleet(&fleet_spec)?,
            intake_capacity: env_or("DISPATCH_INTAKE_CAPACITY", 64)?,
            state_report_interval: Duration::from_secs(env_or(
                "DISPATCH_REPORT_INTERVAL_SECS",
                5,
            )?),
            telemetry_flush_interval: Duration::from_secs(env_or(
                "DISPATCH_FLUSH_INTERVAL_SECS",
                3,
            )?),
            journey_step_interval: Duration::from_millis(env_or(
                "DISPATCH_STEP_INTERVAL_MS",
                50,
            )?),
            route_retry_attempts: env_or("DISPATCH_ROUTE_RETRY_ATTEMPTS", 3)?,
            route_retry_backoff: Duration::from_millis(env_or(
                "DISPATCH_ROUTE_RETRY_BACKOFF_MS",
                200,
            )?),
        })
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            state_report_interval: self.state_report_interval,
            telemetry_flush_interval: self.telemetry_flush_interval,
            journey_step_interval: self.journey_step_interval,
            retry: RetryPolicy {
                attempts: self.route_retry_attempts,
                initial_backoff: self.route_retry_backoff,
            },
            ..DispatcherConfig::default()
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}

/// Parse a fleet spec of the form `address=capacity|address=capacity`.
fn parse_fleet(spec: &str) -> anyhow::Result<Vec<HomeBase>> {
    let mut fleet = Vec::new();
    for entry in spec.split('|') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((address, capacity)) = entry.rsplit_once('=') else {
            bail!("fleet entry {entry:?} is missing '=capacity'");
        };
        let address = address.trim();
        if address.is_empty() {
            bail!("fleet entry {entry:?} has an empty address");
        }
        fleet.push(HomeBase {
            address: address.to_string(),
            max_load_weight: capacity
                .trim()
                .parse()
                .with_context(|| format!("invalid capacity in fleet entry {entry:?}"))?,
        });
    }
    if fleet.is_empty() {
        bail!("fleet spec is empty");
    }
    Ok(fleet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_spec_parses_addresses_and_capacities() {
        let fleet = parse_fleet(DEFAULT_FLEET).unwrap();
        assert_eq!(fleet.len(), 3);
        assert_eq!(fleet[0].address, "Vilnius, Lithuania");
        assert_eq!(fleet[0].max_load_weight, 5000);
        assert_eq!(fleet[2].max_load_weight, 15000);
    }

    #[test]
    fn fleet_spec_rejects_missing_capacity() {
        assert!(parse_fleet("Vilnius, Lithuania").is_err());
        assert!(parse_fleet("Vilnius=abc").is_err());
        assert!(parse_fleet("").is_err());
    }

    #[test]
    fn fleet_spec_tolerates_whitespace() {
        let fleet = parse_fleet(" Riga, Latvia = 7000 | Tallinn, Estonia=9000 ").unwrap();
        assert_eq!(fleet[0].address, "Riga, Latvia");
        assert_eq!(fleet[0].max_load_weight, 7000);
        assert_eq!(fleet[1].address, "Tallinn, Estonia");
    }
}
