use crate::error::ApiError;
use serde::Serialize;
use utoipa::ToSchema;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Serialize, ToSchema)]
pub struct GeofenceCheck {
    pub valid: bool,
    /// Great-circle distance to the office, rounded to 2 decimals.
    pub distance_meters: f64,
}

/// Haversine great-circle distance between two coordinates, in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Range-checks the reported coordinate before any distance math, then
/// decides membership in the office radius. Pure and deterministic.
pub fn validate_location(
    latitude: f64,
    longitude: f64,
    office_latitude: f64,
    office_longitude: f64,
    max_distance_meters: f64,
) -> Result<GeofenceCheck, ApiError> {
    if !(-90.0..=90.0).contains(&latitude) || !latitude.is_finite() {
        return Err(ApiError::validation(
            "latitude",
            "latitude must be between -90 and 90",
        ));
    }
    if !(-180.0..=180.0).contains(&longitude) || !longitude.is_finite() {
        return Err(ApiError::validation(
            "longitude",
            "longitude must be between -180 and 180",
        ));
    }

    let distance = haversine_distance(latitude, longitude, office_latitude, office_longitude);
    let distance_meters = (distance * 100.0).round() / 100.0;

    Ok(GeofenceCheck {
        valid: distance_meters <= max_distance_meters,
        distance_meters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFICE: (f64, f64) = (22.5726, 88.3639);

    #[test]
    fn same_point_is_zero_distance() {
        let d = haversine_distance(OFFICE.0, OFFICE.1, OFFICE.0, OFFICE.1);
        assert!(d.abs() < 1e-9);

        let check = validate_location(OFFICE.0, OFFICE.1, OFFICE.0, OFFICE.1, 100.0).unwrap();
        assert!(check.valid);
        assert_eq!(check.distance_meters, 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = (12.9716, 77.5946); // Bengaluru
        let d1 = haversine_distance(a.0, a.1, OFFICE.0, OFFICE.1);
        let d2 = haversine_distance(OFFICE.0, OFFICE.1, a.0, a.1);
        assert!((d1 - d2).abs() < 1e-6);
        assert!(d1 > 0.0);
    }

    #[test]
    fn known_pair_roughly_matches() {
        // Kolkata -> Bengaluru is about 1,560 km as the crow flies.
        let d = haversine_distance(22.5726, 88.3639, 12.9716, 77.5946);
        assert!(d > 1_500_000.0 && d < 1_650_000.0, "got {d}");
    }

    #[test]
    fn just_outside_radius_is_invalid_with_distance() {
        // ~0.002 degrees of latitude is ~222 m.
        let check =
            validate_location(OFFICE.0 + 0.002, OFFICE.1, OFFICE.0, OFFICE.1, 100.0).unwrap();
        assert!(!check.valid);
        assert!(check.distance_meters > 100.0);
    }

    #[test]
    fn coordinate_ranges_checked_before_distance() {
        assert!(validate_location(91.0, 0.0, OFFICE.0, OFFICE.1, 100.0).is_err());
        assert!(validate_location(-91.0, 0.0, OFFICE.0, OFFICE.1, 100.0).is_err());
        assert!(validate_location(0.0, 181.0, OFFICE.0, OFFICE.1, 100.0).is_err());
        assert!(validate_location(0.0, -180.5, OFFICE.0, OFFICE.1, 100.0).is_err());
        assert!(validate_location(f64::NAN, 0.0, OFFICE.0, OFFICE.1, 100.0).is_err());
    }

    #[test]
    fn valid_extremes_never_error() {
        for (lat, lon) in [(-90.0, -180.0), (90.0, 180.0), (0.0, 0.0), (-45.0, 120.0)] {
            let check = validate_location(lat, lon, OFFICE.0, OFFICE.1, 100.0).unwrap();
            assert!(check.distance_meters >= 0.0);
        }
    }
}
