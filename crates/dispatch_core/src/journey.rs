//! Journey state machine: one truck traversing one route over time.
//!
//! Pending (waiting out the starting delay) → Running (stepping waypoints)
//! → Finished (reported once on the completion channel, then discarded).
//! A journey is never reused and never transitions backward.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::fleet::Truck;
use crate::route::Route;
use crate::telemetry::{DomainLog, DomainLogKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyState {
    Pending,
    Running,
    Finished,
}

/// Progress after processing waypoint `index` out of `total`.
fn progress_for_step(index: usize, total: usize) -> f64 {
    (index + 1) as f64 / total as f64 * 100.0
}

/// Per-step pause: the base interval plus a uniform jitter of up to 10% of
/// the base. The jitter decorrelates concurrently running journeys so their
/// position updates do not synchronize.
fn step_pause(step_interval: Duration) -> Duration {
    step_interval + step_interval.mul_f64(rand::random::<f64>() / 10.0)
}

/// A single traversal of one route by one truck.
#[derive(Debug)]
pub struct Journey {
    id: u64,
    truck: Arc<Truck>,
    route: Route,
    starting_delay: Duration,
    step_interval: Duration,
    progress_percentage: f64,
    state: JourneyState,
}

impl Journey {
    pub fn new(
        id: u64,
        truck: Arc<Truck>,
        route: Route,
        starting_delay: Duration,
        step_interval: Duration,
    ) -> Self {
        debug_assert!(!route.waypoints.is_empty(), "a route has at least one waypoint");
        Self {
            id,
            truck,
            route,
            starting_delay,
            step_interval,
            progress_percentage: 0.0,
            state: JourneyState::Pending,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn truck(&self) -> &Arc<Truck> {
        &self.truck
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn state(&self) -> JourneyState {
        self.state
    }

    /// 0–100, non-decreasing once the journey is running.
    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    /// Simulate the traversal. Waits out the starting delay, then sets the
    /// truck's position to each waypoint in order, pausing between steps.
    /// On the final waypoint the journey reports itself exactly once on
    /// `completed`. Cancellation aborts the remaining steps without
    /// reporting; the shutdown path tears the whole dispatcher down with it.
    pub async fn run(mut self, completed: mpsc::Sender<Journey>, cancel: CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(self.starting_delay) => {}
            _ = cancel.cancelled() => return,
        }

        self.state = JourneyState::Running;
        let total = self.route.waypoints.len();
        for index in 0..total {
            self.truck.set_location(self.route.waypoints[index]);
            self.progress_percentage = progress_for_step(index, total);
            tokio::select! {
                _ = tokio::time::sleep(step_pause(self.step_interval)) => {}
                _ = cancel.cancelled() => return,
            }
        }

        self.state = JourneyState::Finished;
        let id = self.id;
        if completed.send(self).await.is_err() {
            warn!(journey_id = id, "completion channel closed, journey report lost");
        }
    }

    pub fn dispatched_log(&self) -> DomainLog {
        DomainLog::new(
            DomainLogKind::JourneyDispatched,
            json!({
                "journey_id": self.id,
                "truck_id": self.truck.id(),
                "origin_address": self.route.origin_address,
                "destination_address": self.route.destination_address,
                "expected_duration_secs": self.route.expected_duration_secs,
                "waypoints": self.route.waypoints,
            }),
        )
    }

    pub fn finished_log(&self) -> DomainLog {
        DomainLog::new(
            DomainLogKind::JourneyFinished,
            json!({
                "journey_id": self.id,
                "truck_id": self.truck.id(),
                "origin_address": self.route.origin_address,
                "destination_address": self.route.destination_address,
            }),
        )
    }
}
