//! # GeoMath
//!
//! Great-circle primitives on a spherical Earth.
//!
//! Inputs are not range-checked here; callers validate claimed coordinates
//! with [`GeoPoint::validated`] before trusting them.

use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula (meters).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Valid latitude range (degrees, inclusive).
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid longitude range (degrees, inclusive).
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// A WGS84-style latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a point without validation.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Creates a point, rejecting anything outside `[-90,90] x [-180,180]`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidCoordinate`] for out-of-range or non-finite input.
    pub fn validated(lat: f64, lng: f64) -> GateResult<Self> {
        let point = Self::new(lat, lng);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(GateError::InvalidCoordinate { lat, lng })
        }
    }

    /// Returns true if both components are finite and in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&self.lat)
            && (LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&self.lng)
    }

    /// Great-circle distance to another point (meters).
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        distance_meters(self.lat, self.lng, other.lat, other.lng)
    }

    /// Initial bearing towards another point (degrees clockwise from north).
    #[must_use]
    pub fn bearing_to(self, other: Self) -> f64 {
        initial_bearing_degrees(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Circular geofence: a center and an inclusive radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoFence {
    /// Fence center.
    pub center: GeoPoint,
    /// Radius in meters. A point exactly on the boundary is inside.
    pub radius_meters: f64,
}

impl GeoFence {
    /// Creates a fence.
    #[must_use]
    pub const fn new(center: GeoPoint, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }

    /// Returns true if `point` lies within the radius (inclusive).
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.center.distance_to(point) <= self.radius_meters
    }
}

/// Haversine distance between two coordinates (meters).
///
/// Zero for identical points, symmetric, monotonic in angular separation.
#[must_use]
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let half_dphi = (lat2 - lat1).to_radians() / 2.0;
    let half_dlambda = (lng2 - lng1).to_radians() / 2.0;

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial great-circle bearing from the first point to the second.
///
/// Normalized to `[0, 360)`. Identical points yield `0.0`.
#[must_use]
pub fn initial_bearing_degrees(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();

    let theta = y.atan2(x).to_degrees();
    (theta + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEOUL: GeoPoint = GeoPoint::new(37.5665, 126.9780);
    const BUSAN: GeoPoint = GeoPoint::new(35.1796, 129.0756);

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(SEOUL.distance_to(SEOUL), 0.0);
        assert_eq!(distance_meters(-89.0, 179.0, -89.0, 179.0), 0.0);
    }

    #[test]
    fn test_known_distance() {
        let d = SEOUL.distance_to(BUSAN);
        assert!((d - 325_111.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn test_one_degree_on_equator() {
        let d = distance_meters(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_194.93).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_monotonic_along_meridian() {
        let mut last = 0.0;
        for step in 1..=90 {
            let d = distance_meters(0.0, 0.0, f64::from(step), 0.0);
            assert!(d > last);
            last = d;
        }
    }

    #[test]
    fn test_antipodal_is_half_circumference() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((d - half).abs() < 1.0);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        assert!(matches!(
            GeoPoint::validated(91.0, 0.0),
            Err(GateError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            GeoPoint::validated(0.0, 181.0),
            Err(GateError::InvalidCoordinate { .. })
        ));
        assert!(GeoPoint::validated(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::validated(90.0, -180.0).is_ok());
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert!((origin.bearing_to(GeoPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((origin.bearing_to(GeoPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((origin.bearing_to(GeoPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((origin.bearing_to(GeoPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_fence_boundary_is_inclusive() {
        let point = GeoPoint::new(0.0, 0.001);
        let exact = GeoPoint::new(0.0, 0.0).distance_to(point);
        let fence = GeoFence::new(GeoPoint::new(0.0, 0.0), exact);
        assert!(fence.contains(point));
        let tight = GeoFence::new(GeoPoint::new(0.0, 0.0), exact - 0.01);
        assert!(!tight.contains(point));
    }
}
