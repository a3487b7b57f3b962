// SPDX-License-Identifier: Apache-2.0

/// Mean Earth radius in miles, matching the snapshot's unit system.
pub const EARTH_RADIUS_MI: f64 = 3958.7613;

/// Great-circle distance via the haversine formula:
/// `a = sin²(Δφ/2) + cos(φ1)·cos(φ2)·sin²(Δλ/2); d = 2·R·asin(√a)`.
#[must_use]
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MI * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_to_self() {
        assert_eq!(haversine_miles(12.0, -45.0, 12.0, -45.0), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        // πR/180 ≈ 69.093 miles with this radius.
        let d = haversine_miles(0.0, 0.0, 1.0, 0.0);
        assert!((d - 69.0932).abs() < 0.001, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((17.3, -42.8), (-33.9, 151.2)),
            ((0.0, 179.5), (0.0, -179.5)),
            ((89.0, 10.0), (-89.0, -170.0)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let forward = haversine_miles(lat1, lon1, lat2, lon2);
            let back = haversine_miles(lat2, lon2, lat1, lon1);
            assert!((forward - back).abs() < 1e-9, "{forward} vs {back}");
        }
    }
}
