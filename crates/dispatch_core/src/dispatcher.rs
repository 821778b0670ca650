//! The orchestration loop: matches requests to trucks, builds routes,
//! runs journeys, and reports state.
//!
//! The dispatcher is a single task multiplexing four concerns with
//! `tokio::select!`: event intake, journey completions, the periodic state
//! report, and the telemetry flush. Fleet flags and the active-journey map
//! are touched only from this task, so mutual exclusion is structural —
//! no locks guard the bookkeeping. Each dispatched journey runs as its own
//! spawned task and only ever mutates the truck it owns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::TelemetryBus;
use crate::event::{DeliveryRequest, InboundEvent};
use crate::fleet::{Fleet, Truck};
use crate::journey::Journey;
use crate::route::Route;
use crate::routing::{route_with_retry, RetryPolicy, RouteEndpoint, RouteProvider, RoutingError};
use crate::sequence::Sequence;
use crate::telemetry::{DomainLog, DomainLogBuffer, DomainLogKind};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Cadence of the state-snapshot telemetry entry.
    pub state_report_interval: Duration,
    /// Cadence of the batched flush to the external bus.
    pub telemetry_flush_interval: Duration,
    /// Base pause between journey waypoint steps.
    pub journey_step_interval: Duration,
    /// Completion channel capacity. A full channel blocks the reporting
    /// journey task until the dispatcher catches up.
    pub completion_capacity: usize,
    /// Domain log buffer capacity; the buffer drops its oldest entry when
    /// full.
    pub log_buffer_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            state_report_interval: Duration::from_secs(5),
            telemetry_flush_interval: Duration::from_secs(3),
            journey_step_interval: Duration::from_millis(50),
            completion_capacity: 64,
            log_buffer_capacity: 1024,
            retry: RetryPolicy::default(),
        }
    }
}

/// Bookkeeping for one running journey, keyed by journey id in the active
/// map.
#[derive(Debug)]
struct ActiveJourney {
    truck_id: u64,
}

pub struct Dispatcher {
    fleet: Fleet,
    provider: Arc<dyn RouteProvider>,
    bus: Arc<dyn TelemetryBus>,
    logs: Arc<DomainLogBuffer>,
    config: DispatcherConfig,
    journey_ids: Sequence,
    active: HashMap<u64, ActiveJourney>,
    completed_tx: mpsc::Sender<Journey>,
    completed_rx: Option<mpsc::Receiver<Journey>>,
}

impl Dispatcher {
    pub fn new(
        fleet: Fleet,
        provider: Arc<dyn RouteProvider>,
        bus: Arc<dyn TelemetryBus>,
        config: DispatcherConfig,
    ) -> Self {
        let (completed_tx, completed_rx) = mpsc::channel(config.completion_capacity.max(1));
        let logs = Arc::new(DomainLogBuffer::new(config.log_buffer_capacity));
        Self {
            fleet,
            provider,
            bus,
            logs,
            config,
            journey_ids: Sequence::new(),
            active: HashMap::new(),
            completed_tx,
            completed_rx: Some(completed_rx),
        }
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn active_journeys(&self) -> usize {
        self.active.len()
    }

    /// Handle on the shared log buffer, mainly for observing telemetry from
    /// the outside.
    pub fn log_buffer(&self) -> Arc<DomainLogBuffer> {
        Arc::clone(&self.logs)
    }

    /// Run until `cancel` fires or the intake channel closes. Queued
    /// telemetry is flushed once more on the way out.
    pub async fn run(mut self, mut events: mpsc::Receiver<InboundEvent>, cancel: CancellationToken) {
        let mut completed_rx = self
            .completed_rx
            .take()
            .expect("dispatcher can only be run once");
        // A long intake stall (provider retries) can put both intervals in
        // arrears; Delay resumes the cadence with a single catch-up tick
        // instead of a burst of back-to-back ones.
        let mut report = tokio::time::interval(self.config.state_report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut flush = tokio::time::interval(self.config.telemetry_flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(trucks = self.fleet.len(), "dispatcher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dispatcher shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &cancel).await,
                    None => {
                        info!("intake channel closed, dispatcher stopping");
                        break;
                    }
                },
                journey = completed_rx.recv() => {
                    if let Some(journey) = journey {
                        self.on_journey_finished(journey);
                    }
                }
                _ = report.tick() => self.report_state(),
                _ = flush.tick() => self.flush_logs().await,
            }
        }
        self.flush_logs().await;
    }

    async fn handle_event(&mut self, event: InboundEvent, cancel: &CancellationToken) {
        match event {
            InboundEvent::DeliveryRequest(request) => {
                self.handle_delivery_request(request, cancel).await;
            }
        }
    }

    /// Match, route, and launch one delivery. The request is handled
    /// synchronously up to the journey spawn; unserviceable requests are
    /// dropped after a telemetry entry, never retried.
    async fn handle_delivery_request(&mut self, request: DeliveryRequest, cancel: &CancellationToken) {
        info!(
            request_id = request.id,
            load_weight = request.load_weight,
            "handling delivery request"
        );

        let Some(truck) = self.fleet.match_truck(request.load_weight) else {
            info!(request_id = request.id, "no free truck with sufficient capacity");
            self.logs.push(self.fleet.truck_not_found_log(&request));
            return;
        };

        let route = match self.build_route(&truck, &request).await {
            Ok(route) => route,
            Err(err) => {
                error!(
                    request_id = request.id,
                    error = %err,
                    "route planning failed, dropping request"
                );
                self.logs.push(DomainLog::new(
                    DomainLogKind::TruckNotFound,
                    json!({
                        "origin_address": request.origin_address,
                        "destination_address": request.destination_address,
                        "load_weight": request.load_weight,
                        "reason": "routing_unavailable",
                    }),
                ));
                return;
            }
        };

        let journey = Journey::new(
            self.journey_ids.next(),
            Arc::clone(&truck),
            route,
            Duration::ZERO,
            self.config.journey_step_interval,
        );
        let journey_id = journey.id();
        let dispatched_log = journey.dispatched_log();
        let geometry = journey.route().linestring();

        truck.set_in_journey(true);
        self.active
            .insert(journey_id, ActiveJourney { truck_id: truck.id() });
        tokio::spawn(journey.run(self.completed_tx.clone(), cancel.child_token()));

        info!(journey_id, truck_id = truck.id(), "journey dispatched");
        self.logs.push(dispatched_log);
        if let Err(err) = self
            .bus
            .publish_journey(journey_id, truck.id(), &geometry)
            .await
        {
            warn!(journey_id, error = %err, "failed to publish journey record");
        }
    }

    /// Two provider legs stitched into one traversal: the truck's current
    /// position to the pickup address, then pickup to destination.
    async fn build_route(
        &self,
        truck: &Truck,
        request: &DeliveryRequest,
    ) -> Result<Route, RoutingError> {
        let to_pickup = route_with_retry(
            self.provider.as_ref(),
            RouteEndpoint::position(truck.location()),
            RouteEndpoint::address(&request.origin_address),
            &self.config.retry,
        )
        .await?;
        let to_destination = route_with_retry(
            self.provider.as_ref(),
            RouteEndpoint::address(&request.origin_address),
            RouteEndpoint::address(&request.destination_address),
            &self.config.retry,
        )
        .await?;
        Ok(Route::combine(to_pickup, to_destination))
    }

    fn on_journey_finished(&mut self, journey: Journey) {
        journey.truck().set_in_journey(false);
        if self.active.remove(&journey.id()).is_none() {
            warn!(journey_id = journey.id(), "completion for unknown journey");
        }
        info!(
            journey_id = journey.id(),
            truck_id = journey.truck().id(),
            "journey finished"
        );
        self.logs.push(journey.finished_log());
    }

    fn report_state(&mut self) {
        let snapshot = self.fleet.snapshot();
        info!(
            active_journeys = self.active.len(),
            free_trucks = snapshot.free_trucks,
            busy_trucks = snapshot.busy_trucks,
            "dispatch state"
        );
        self.logs.push(DomainLog::new(
            DomainLogKind::StateSnapshot,
            json!({
                "number_of_journeys": self.active.len(),
                "fleet": snapshot,
            }),
        ));
    }

    async fn flush_logs(&mut self) {
        let batch = self.logs.drain();
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.bus.publish_domain_logs(&batch).await {
            warn!(error = %err, batch_len = batch.len(), "failed to publish domain log batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::LocationPoint;
    use crate::test_helpers::{test_fleet, RecordingBus, StubRouteProvider};
    use async_trait::async_trait;

    fn request(id: u64, load_weight: u32) -> DeliveryRequest {
        DeliveryRequest {
            id,
            load_weight,
            origin_address: "Vilnius, Lithuania".to_string(),
            destination_address: "Klaipeda, Lithuania".to_string(),
        }
    }

    fn dispatcher_with(bus: Arc<RecordingBus>) -> Dispatcher {
        Dispatcher::new(
            test_fleet(),
            Arc::new(StubRouteProvider::default()),
            bus,
            DispatcherConfig {
                retry: RetryPolicy {
                    attempts: 1,
                    initial_backoff: Duration::from_millis(1),
                },
                ..DispatcherConfig::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_flags_truck_until_completion() {
        let bus = Arc::new(RecordingBus::default());
        let mut dispatcher = dispatcher_with(Arc::clone(&bus));
        let cancel = CancellationToken::new();

        dispatcher
            .handle_event(InboundEvent::DeliveryRequest(request(0, 1000)), &cancel)
            .await;

        let truck = Arc::clone(&dispatcher.fleet().trucks()[0]);
        assert!(truck.in_journey());
        assert_eq!(dispatcher.active_journeys(), 1);

        let journeys = bus.journeys.lock().clone();
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].1, truck.id());
        assert!(journeys[0].2.starts_with("LINESTRING("));

        let kinds: Vec<_> = dispatcher.logs.drain().into_iter().map(|l| l.kind).collect();
        assert!(kinds.contains(&DomainLogKind::JourneyDispatched));

        // The spawned journey runs to completion under the paused clock.
        let mut completed_rx = dispatcher.completed_rx.take().unwrap();
        let finished = completed_rx.recv().await.expect("journey completes");
        dispatcher.completed_rx = Some(completed_rx);
        dispatcher.on_journey_finished(finished);

        assert!(!truck.in_journey());
        assert_eq!(dispatcher.active_journeys(), 0);
        let kinds: Vec<_> = dispatcher.logs.drain().into_iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![DomainLogKind::JourneyFinished]);
    }

    #[tokio::test(start_paused = true)]
    async fn flag_matches_active_journey_across_requests() {
        let bus = Arc::new(RecordingBus::default());
        let mut dispatcher = dispatcher_with(Arc::clone(&bus));
        let cancel = CancellationToken::new();

        for id in 0..3 {
            dispatcher
                .handle_event(InboundEvent::DeliveryRequest(request(id, 1000)), &cancel)
                .await;
            let busy = dispatcher.fleet().busy_count();
            assert_eq!(busy, dispatcher.active_journeys());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn heavier_load_skips_small_trucks() {
        let bus = Arc::new(RecordingBus::default());
        let mut dispatcher = dispatcher_with(Arc::clone(&bus));
        let cancel = CancellationToken::new();

        // test_fleet capacities: 5000, 10000, 15000.
        dispatcher
            .handle_event(InboundEvent::DeliveryRequest(request(0, 6000)), &cancel)
            .await;

        assert!(!dispatcher.fleet().trucks()[0].in_journey());
        assert!(dispatcher.fleet().trucks()[1].in_journey());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_fleet_logs_truck_not_found() {
        let bus = Arc::new(RecordingBus::default());
        let mut dispatcher = dispatcher_with(Arc::clone(&bus));
        let cancel = CancellationToken::new();

        for truck in dispatcher.fleet().trucks() {
            truck.set_in_journey(true);
        }
        dispatcher
            .handle_event(InboundEvent::DeliveryRequest(request(9, 500)), &cancel)
            .await;

        assert_eq!(dispatcher.active_journeys(), 0);
        let batch = dispatcher.logs.drain();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, DomainLogKind::TruckNotFound);
        assert_eq!(batch[0].data["origin_address"], "Vilnius, Lithuania");
        assert_eq!(batch[0].data["destination_address"], "Klaipeda, Lithuania");
        assert_eq!(batch[0].data["load_weight"], 500);
    }

    struct BrokenProvider;

    #[async_trait]
    impl RouteProvider for BrokenProvider {
        async fn route(
            &self,
            _origin: RouteEndpoint,
            _destination: RouteEndpoint,
        ) -> Result<Route, RoutingError> {
            Err(RoutingError::Transport("backend down".to_string()))
        }

        async fn geocode(&self, _address: &str) -> Result<LocationPoint, RoutingError> {
            Err(RoutingError::Transport("backend down".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn routing_failure_drops_request_without_flagging() {
        let bus = Arc::new(RecordingBus::default());
        let mut dispatcher = Dispatcher::new(
            test_fleet(),
            Arc::new(BrokenProvider),
            Arc::clone(&bus) as Arc<dyn TelemetryBus>,
            DispatcherConfig {
                retry: RetryPolicy {
                    attempts: 2,
                    initial_backoff: Duration::from_millis(10),
                },
                ..DispatcherConfig::default()
            },
        );
        let cancel = CancellationToken::new();

        dispatcher
            .handle_event(InboundEvent::DeliveryRequest(request(0, 1000)), &cancel)
            .await;

        assert_eq!(dispatcher.fleet().busy_count(), 0);
        assert_eq!(dispatcher.active_journeys(), 0);
        let batch = dispatcher.logs.drain();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, DomainLogKind::TruckNotFound);
        assert_eq!(batch[0].data["reason"], "routing_unavailable");
    }

    /// Stalls on every route query, then fails.
    struct StallingProvider {
        stall: Duration,
    }

    #[async_trait]
    impl RouteProvider for StallingProvider {
        async fn route(
            &self,
            _origin: RouteEndpoint,
            _destination: RouteEndpoint,
        ) -> Result<Route, RoutingError> {
            tokio::time::sleep(self.stall).await;
            Err(RoutingError::Transport("slow backend".to_string()))
        }

        async fn geocode(&self, _address: &str) -> Result<LocationPoint, RoutingError> {
            Err(RoutingError::Transport("slow backend".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn report_cadence_recovers_without_bursting_after_a_stall() {
        let bus = Arc::new(RecordingBus::default());
        let dispatcher = Dispatcher::new(
            test_fleet(),
            Arc::new(StallingProvider {
                stall: Duration::from_secs(12),
            }),
            Arc::clone(&bus) as Arc<dyn TelemetryBus>,
            DispatcherConfig {
                retry: RetryPolicy {
                    attempts: 1,
                    initial_backoff: Duration::from_millis(1),
                },
                ..DispatcherConfig::default()
            },
        );
        let (events_tx, events_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(dispatcher.run(events_rx, cancel.clone()));

        // Let the startup ticks fire, then stall the intake arm on the
        // provider from t=1s to t=13s: the report deadlines at 5s and 10s
        // are both missed while the loop is blocked.
        tokio::time::sleep(Duration::from_secs(1)).await;
        events_tx
            .send(InboundEvent::DeliveryRequest(request(0, 1000)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(13_500)).await;
        cancel.cancel();
        handle.await.unwrap();

        // One snapshot at startup and a single catch-up snapshot after the
        // stall; a bursting interval would emit one per missed deadline.
        let snapshots = bus
            .domain_logs
            .lock()
            .iter()
            .filter(|log| log.kind == DomainLogKind::StateSnapshot)
            .count();
        assert_eq!(snapshots, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_dispatches_and_flushes_end_to_end() {
        let bus = Arc::new(RecordingBus::default());
        let dispatcher = dispatcher_with(Arc::clone(&bus));
        let (events_tx, events_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(dispatcher.run(events_rx, cancel.clone()));

        events_tx
            .send(InboundEvent::DeliveryRequest(request(0, 1000)))
            .await
            .unwrap();

        // Long enough for the journey to finish and several flush ticks to
        // fire under the paused clock.
        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        handle.await.unwrap();

        let journeys = bus.journeys.lock();
        assert_eq!(journeys.len(), 1);

        let kinds: Vec<_> = bus
            .domain_logs
            .lock()
            .iter()
            .map(|l| l.kind)
            .collect();
        assert!(kinds.contains(&DomainLogKind::StateSnapshot));
        assert!(kinds.contains(&DomainLogKind::JourneyDispatched));
        assert!(kinds.contains(&DomainLogKind::JourneyFinished));
    }
}
