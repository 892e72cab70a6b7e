//! Great-circle geometry on the WGS-84 sphere.

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Haversine distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let h = sin_lat * sin_lat + lat1_rad.cos() * lat2_rad.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * central_angle
}

/// Latitude must lie in [-90, 90].
pub fn is_valid_lat(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

/// Longitude must lie in [-180, 180].
pub fn is_valid_lon(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        assert!(haversine_km(55.7558, 37.6173, 55.7558, 37.6173) < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine_km(51.5074, -0.1278, 48.8566, 2.3522);
        let b = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let distance = haversine_km(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((distance - 343.0).abs() < 5.0, "got {distance}");
    }

    #[test]
    fn coordinate_validation() {
        assert!(is_valid_lat(55.7558));
        assert!(is_valid_lat(-90.0));
        assert!(!is_valid_lat(90.1));
        assert!(is_valid_lon(-180.0));
        assert!(!is_valid_lon(180.5));
    }
}
