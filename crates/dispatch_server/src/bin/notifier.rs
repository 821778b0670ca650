//! Notification forwarder: receives bus push envelopes and relays derived
//! notifications to a chat webhook.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_server::notify::parse_push_envelope;

#[derive(Clone)]
struct NotifierState {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_addr = std::env::var("NOTIFIER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8001".to_string());
    let webhook_url = std::env::var("NOTIFIER_WEBHOOK_URL").ok();
    if webhook_url.is_none() {
        info!("no webhook configured, notifications will only be logged");
    }

    let state = NotifierState {
        client: reqwest::Client::new(),
        webhook_url,
    };
    let app = Router::new()
        .route("/notifications", post(receive_notification))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "notifier listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn receive_notification(
    State(state): State<NotifierState>,
    Json(envelope): Json<Value>,
) -> (StatusCode, &'static str) {
    let notification = match parse_push_envelope(&envelope) {
        Ok(notification) => notification,
        Err(err) => {
            warn!(error = %err, "rejected malformed push envelope");
            return (StatusCode::BAD_REQUEST, "malformed envelope");
        }
    };

    info!(event_type = %notification.event_type, "received notification");
    if let Some(url) = &state.webhook_url {
        if let Err(err) = state.client.post(url).json(&notification).send().await {
            // Delivery is best effort; the bus does not expect an ack.
            warn!(error = %err, "failed to forward notification");
        }
    }
    (StatusCode::OK, "ok")
}
