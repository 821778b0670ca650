//! Immutable route values produced by the routing provider.

use serde::{Deserialize, Serialize};

use crate::spatial::{self, LocationPoint};

/// An ordered waypoint sequence plus a traversal duration estimate.
///
/// Waypoint order is traversal order and the sequence holds at least one
/// point. Routes are created once, from a provider response or from
/// [`Route::combine`], and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub origin_address: Option<String>,
    pub origin_location: Option<LocationPoint>,
    pub destination_address: Option<String>,
    pub destination_location: Option<LocationPoint>,
    pub waypoints: Vec<LocationPoint>,
    pub expected_duration_secs: u64,
}

impl Route {
    /// Stitch two legs into one continuous route: waypoints concatenated in
    /// order (the shared handover point is intentionally not deduplicated),
    /// durations summed, origin taken from `first`, destination from
    /// `second`.
    ///
    /// Contiguity (`first` ends where `second` begins) is checked in debug
    /// builds when both endpoint addresses are known; release builds accept
    /// disjoint legs.
    pub fn combine(first: Route, second: Route) -> Route {
        if let (Some(end), Some(start)) = (&first.destination_address, &second.origin_address) {
            debug_assert_eq!(end, start, "combined legs must share a handover point");
        }
        let mut waypoints = first.waypoints;
        waypoints.extend(second.waypoints);
        Route {
            origin_address: first.origin_address,
            origin_location: first.origin_location,
            destination_address: second.destination_address,
            destination_location: second.destination_location,
            waypoints,
            expected_duration_secs: first.expected_duration_secs + second.expected_duration_secs,
        }
    }

    /// The waypoint sequence as a WKT `LINESTRING`, longitude first.
    pub fn linestring(&self) -> String {
        spatial::linestring(&self.waypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(
        origin: &str,
        destination: &str,
        waypoints: Vec<LocationPoint>,
        duration: u64,
    ) -> Route {
        Route {
            origin_address: Some(origin.to_string()),
            origin_location: None,
            destination_address: Some(destination.to_string()),
            destination_location: None,
            waypoints,
            expected_duration_secs: duration,
        }
    }

    #[test]
    fn combine_concatenates_without_dedup_and_sums_durations() {
        let p1 = LocationPoint::new(1.0, 1.0);
        let p2 = LocationPoint::new(2.0, 2.0);
        let p3 = LocationPoint::new(3.0, 3.0);
        let a = leg("A", "B", vec![p1, p2], 100);
        let b = leg("B", "C", vec![p2, p3], 50);

        let combined = Route::combine(a, b);

        assert_eq!(combined.waypoints, vec![p1, p2, p2, p3]);
        assert_eq!(combined.expected_duration_secs, 150);
        assert_eq!(combined.origin_address.as_deref(), Some("A"));
        assert_eq!(combined.destination_address.as_deref(), Some("C"));
    }

    #[test]
    fn combine_keeps_first_leg_origin_location() {
        let truck_pos = LocationPoint::new(54.68, 25.28);
        let mut a = leg("A", "B", vec![truck_pos], 10);
        a.origin_address = None;
        a.origin_location = Some(truck_pos);
        let b = leg("B", "C", vec![LocationPoint::new(1.0, 1.0)], 20);

        let combined = Route::combine(a, b);
        assert_eq!(combined.origin_location, Some(truck_pos));
        assert_eq!(combined.origin_address, None);
    }

    #[test]
    fn linestring_covers_all_waypoints() {
        let route = leg(
            "A",
            "B",
            vec![LocationPoint::new(1.0, 2.0), LocationPoint::new(3.0, 4.0)],
            1,
        );
        assert_eq!(route.linestring(), "LINESTRING(2 1, 4 3)");
    }
}
