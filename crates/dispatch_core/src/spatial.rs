//! Geographic primitives shared by the fleet, routing, and journey code.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub lat: f64,
    pub lon: f64,
}

impl LocationPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Encode a waypoint sequence as a WKT line geometry, longitude first.
///
/// Downstream consumers (the journeys topic) expect
/// `LINESTRING(lon lat, lon lat, ...)`.
pub fn linestring(points: &[LocationPoint]) -> String {
    let coords = points
        .iter()
        .map(|p| format!("{} {}", p.lon, p.lat))
        .collect::<Vec<_>>()
        .join(", ");
    format!("LINESTRING({coords})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linestring_puts_longitude_first() {
        let points = vec![
            LocationPoint::new(54.68, 25.28),
            LocationPoint::new(54.9, 23.9),
        ];
        assert_eq!(
            linestring(&points),
            "LINESTRING(25.28 54.68, 23.9 54.9)"
        );
    }

    #[test]
    fn linestring_handles_single_point() {
        let points = vec![LocationPoint::new(1.5, 2.5)];
        assert_eq!(linestring(&points), "LINESTRING(2.5 1.5)");
    }
}
