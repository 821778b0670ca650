//! Inbound demand events.
//!
//! The event set is a closed enum matched exhaustively by the dispatcher.
//! Requests that do not map onto a known kind never reach the core: the
//! HTTP boundary rejects them before an event is constructed.

use serde::{Deserialize, Serialize};

/// One unit of delivery demand. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: u64,
    pub load_weight: u32,
    pub origin_address: String,
    pub destination_address: String,
}

/// The closed set of events the dispatcher consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    DeliveryRequest(DeliveryRequest),
}
