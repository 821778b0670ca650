//! Truck registry: ownership of the fleet and first-fit matching.
//!
//! Registration order is fixed at construction and doubles as the matching
//! tie-break: the first free truck with sufficient capacity wins, even when
//! a later, smaller truck would also fit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use crate::event::DeliveryRequest;
use crate::spatial::LocationPoint;
use crate::telemetry::{DomainLog, DomainLogKind};

/// Display palette; trucks cycle through it by id.
pub const TRUCK_COLORS: [&str; 4] = ["#FF0000", "#229900", "#20cc20", "#201cFF"];

/// A delivery truck. Identity, color, and capacity are immutable; the
/// position is written only by the journey that currently owns the truck,
/// and the assignment flag only by the dispatcher.
#[derive(Debug)]
pub struct Truck {
    id: u64,
    color: &'static str,
    max_load_weight: u32,
    location: Mutex<LocationPoint>,
    in_journey: AtomicBool,
}

impl Truck {
    pub fn new(id: u64, location: LocationPoint, max_load_weight: u32) -> Self {
        Self {
            id,
            color: TRUCK_COLORS[id as usize % TRUCK_COLORS.len()],
            max_load_weight,
            location: Mutex::new(location),
            in_journey: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn color(&self) -> &'static str {
        self.color
    }

    pub fn max_load_weight(&self) -> u32 {
        self.max_load_weight
    }

    pub fn location(&self) -> LocationPoint {
        *self.location.lock()
    }

    /// Move the truck. Called only by the owning journey while it runs.
    pub fn set_location(&self, location: LocationPoint) {
        *self.location.lock() = location;
    }

    pub fn in_journey(&self) -> bool {
        self.in_journey.load(Ordering::Acquire)
    }

    /// Flip the assignment flag. The dispatcher is the single writer.
    pub(crate) fn set_in_journey(&self, value: bool) {
        self.in_journey.store(value, Ordering::Release);
    }

    pub fn snapshot(&self) -> TruckSnapshot {
        TruckSnapshot {
            id: self.id,
            in_journey: self.in_journey(),
            location: self.location(),
        }
    }
}

/// Read-only view of one truck at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct TruckSnapshot {
    pub id: u64,
    pub in_journey: bool,
    pub location: LocationPoint,
}

/// Aggregate view of the fleet at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub free_trucks: usize,
    pub busy_trucks: usize,
    pub trucks: Vec<TruckSnapshot>,
}

/// The truck registry. Trucks are registered once and never destroyed.
#[derive(Debug)]
pub struct Fleet {
    trucks: Vec<Arc<Truck>>,
}

impl Fleet {
    /// Build a fleet from `(home location, max load weight)` pairs.
    /// Ids are assigned monotonically in registration order.
    pub fn new(bases: Vec<(LocationPoint, u32)>) -> Self {
        let trucks = bases
            .into_iter()
            .enumerate()
            .map(|(id, (location, max_load_weight))| {
                Arc::new(Truck::new(id as u64, location, max_load_weight))
            })
            .collect();
        Self { trucks }
    }

    pub fn trucks(&self) -> &[Arc<Truck>] {
        &self.trucks
    }

    pub fn len(&self) -> usize {
        self.trucks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trucks.is_empty()
    }

    /// First-fit match: the first free truck in registration order whose
    /// capacity is strictly greater than the required load. `None` is a
    /// normal outcome, not an error.
    pub fn match_truck(&self, required_capacity: u32) -> Option<Arc<Truck>> {
        self.trucks
            .iter()
            .find(|truck| !truck.in_journey() && required_capacity < truck.max_load_weight())
            .cloned()
    }

    pub fn free_count(&self) -> usize {
        self.trucks.iter().filter(|t| !t.in_journey()).count()
    }

    pub fn busy_count(&self) -> usize {
        self.trucks.iter().filter(|t| t.in_journey()).count()
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            free_trucks: self.free_count(),
            busy_trucks: self.busy_count(),
            trucks: self.trucks.iter().map(|t| t.snapshot()).collect(),
        }
    }

    /// Telemetry entry for a request no truck could serve.
    pub fn truck_not_found_log(&self, request: &DeliveryRequest) -> DomainLog {
        DomainLog::new(
            DomainLogKind::TruckNotFound,
            json!({
                "origin_address": request.origin_address,
                "destination_address": request.destination_address,
                "load_weight": request.load_weight,
            }),
        )
    }
}
