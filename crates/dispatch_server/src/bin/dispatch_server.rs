//! Main dispatch service: HTTP intake in front of the dispatcher engine.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_core::bus::{NullBus, TelemetryBus};
use dispatch_core::dispatcher::Dispatcher;
use dispatch_core::fleet::Fleet;
use dispatch_core::routing::RouteProvider;
use dispatch_core::sequence::Sequence;
use dispatch_server::bus::HttpBus;
use dispatch_server::config::Config;
use dispatch_server::http::{self, AppState};
use dispatch_server::provider::HttpRouteProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let provider: Arc<dyn RouteProvider> = Arc::new(HttpRouteProvider::new(
        &config.routing_endpoint,
        &config.geocoding_endpoint,
    ));
    let bus: Arc<dyn TelemetryBus> = match &config.bus_base_url {
        Some(url) => Arc::new(HttpBus::new(url)),
        None => {
            info!("no bus configured, telemetry publishing disabled");
            Arc::new(NullBus)
        }
    };

    // Home bases are geocoded once at startup; a provider that cannot even
    // resolve the fleet is a fatal misconfiguration.
    let mut bases = Vec::with_capacity(config.fleet.len());
    for base in &config.fleet {
        let location = provider
            .geocode(&base.address)
            .await
            .with_context(|| format!("failed to geocode home base {:?}", base.address))?;
        info!(address = %base.address, lat = location.lat, lon = location.lon, "truck home base");
        bases.push((location, base.max_load_weight));
    }
    let fleet = Fleet::new(bases);

    let (events_tx, events_rx) = mpsc::channel(config.intake_capacity.max(1));
    let cancel = CancellationToken::new();
    let dispatcher = Dispatcher::new(fleet, provider, bus, config.dispatcher_config());
    let dispatcher_handle = tokio::spawn(dispatcher.run(events_rx, cancel.clone()));

    let app = http::router(AppState {
        events: events_tx,
        request_ids: Arc::new(Sequence::new()),
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "dispatch server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    dispatcher_handle.await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
