//! Demand generator: posts random delivery requests to the dispatch
//! server on a fixed cadence.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CITIES: [&str; 5] = [
    "Siauliai, Lithuania",
    "Vilnius, Lithuania",
    "Klaipeda, Lithuania",
    "Kaunas, Lithuania",
    "Panevezys, Lithuania",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let target = std::env::var("TRIGGER_TARGET_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string());
    let interval: u64 = std::env::var("TRIGGER_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(15);
    let url = format!(
        "{}/trigger-event/delivery-request",
        target.trim_end_matches('/')
    );
    let client = reqwest::Client::new();

    loop {
        let (origin, destination, load_weight) = {
            let mut rng = rand::thread_rng();
            let pair: Vec<_> = CITIES.choose_multiple(&mut rng, 2).collect();
            (*pair[0], *pair[1], rng.gen_range(0..20_000u32))
        };

        info!(origin, destination, load_weight, "sending delivery request");
        let result = client
            .post(&url)
            .json(&json!({
                "originAddress": origin,
                "destinationAddress": destination,
                "loadWeight": load_weight,
            }))
            .send()
            .await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "request rejected");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to reach dispatch server"),
        }

        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
