//! Inbound HTTP boundary: accepts delivery-request triggers and forwards
//! them into the dispatcher's intake channel.
//!
//! Validation happens here; the core only ever sees well-formed events.
//! A full intake channel is surfaced as 503 rather than queueing without
//! bound.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use dispatch_core::event::{DeliveryRequest, InboundEvent};
use dispatch_core::sequence::Sequence;

#[derive(Clone)]
pub struct AppState {
    pub events: mpsc::Sender<InboundEvent>,
    pub request_ids: Arc<Sequence>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/trigger-event/delivery-request", post(trigger_delivery_request))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequestBody {
    pub origin_address: String,
    pub destination_address: String,
    pub load_weight: u32,
}

impl DeliveryRequestBody {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.origin_address.trim().is_empty() {
            return Err("originAddress must be a non-empty string");
        }
        if self.destination_address.trim().is_empty() {
            return Err("destinationAddress must be a non-empty string");
        }
        Ok(())
    }
}

async fn trigger_delivery_request(
    State(state): State<AppState>,
    Json(body): Json<DeliveryRequestBody>,
) -> (StatusCode, &'static str) {
    if let Err(message) = body.validate() {
        warn!(message, "rejected malformed delivery request");
        return (StatusCode::BAD_REQUEST, message);
    }

    let request = DeliveryRequest {
        id: state.request_ids.next(),
        load_weight: body.load_weight,
        origin_address: body.origin_address,
        destination_address: body.destination_address,
    };
    let request_id = request.id;

    match state.events.try_send(InboundEvent::DeliveryRequest(request)) {
        Ok(()) => {
            info!(request_id, "accepted delivery request");
            (StatusCode::OK, "accepted")
        }
        Err(TrySendError::Full(_)) => {
            warn!(request_id, "intake channel full, rejecting request");
            (StatusCode::SERVICE_UNAVAILABLE, "dispatcher overloaded")
        }
        Err(TrySendError::Closed(_)) => {
            warn!(request_id, "intake channel closed, rejecting request");
            (StatusCode::SERVICE_UNAVAILABLE, "dispatcher unavailable")
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(origin: &str, destination: &str) -> DeliveryRequestBody {
        DeliveryRequestBody {
            origin_address: origin.to_string(),
            destination_address: destination.to_string(),
            load_weight: 100,
        }
    }

    #[test]
    fn validation_rejects_empty_addresses() {
        assert!(body("Vilnius", "Kaunas").validate().is_ok());
        assert!(body("", "Kaunas").validate().is_err());
        assert!(body("Vilnius", "   ").validate().is_err());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let parsed: DeliveryRequestBody = serde_json::from_str(
            r#"{"originAddress": "A", "destinationAddress": "B", "loadWeight": 7}"#,
        )
        .unwrap();
        assert_eq!(parsed.origin_address, "A");
        assert_eq!(parsed.load_weight, 7);
    }

    #[test]
    fn missing_load_weight_is_rejected() {
        // A request without loadWeight must fail deserialization (axum's
        // Json rejection turns this into a 4xx) rather than dispatch a
        // zero-weight delivery.
        let result = serde_json::from_str::<DeliveryRequestBody>(
            r#"{"originAddress": "A", "destinationAddress": "B"}"#,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn full_channel_returns_service_unavailable() {
        let (tx, _rx) = mpsc::channel(1);
        let state = AppState {
            events: tx,
            request_ids: Arc::new(Sequence::new()),
        };

        let first = trigger_delivery_request(
            State(state.clone()),
            Json(body("Vilnius", "Kaunas")),
        )
        .await;
        assert_eq!(first.0, StatusCode::OK);

        let second = trigger_delivery_request(
            State(state),
            Json(body("Kaunas", "Klaipeda")),
        )
        .await;
        assert_eq!(second.0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
