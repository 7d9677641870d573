//! Geographic helpers shared by the Normalizer (field clamping) and the
//! Matcher (venue distance scoring).

/// Great-circle distance between two lat/lon points, in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a =
        (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Clamp a latitude to `[-90, 90]`, returning `None` if it's not a finite
/// number at all (the Normalizer drops the field in that case).
pub fn clamp_lat(lat: f64) -> Option<f64> {
    if !lat.is_finite() {
        return None;
    }
    Some(lat.clamp(-90.0, 90.0))
}

/// Clamp a longitude to `[-180, 180]`.
pub fn clamp_lon(lon: f64) -> Option<f64> {
    if !lon.is_finite() {
        return None;
    }
    Some(lon.clamp(-180.0, 180.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_distance() {
        assert!(haversine_km(44.9778, -93.2650, 44.9778, -93.2650) < 1e-9);
    }

    #[test]
    fn haversine_known_distance() {
        // Minneapolis to St. Paul, roughly 15-20 km apart.
        let d = haversine_km(44.9778, -93.2650, 44.9537, -93.0900);
        assert!(d > 10.0 && d < 25.0, "got {d}");
    }

    #[test]
    fn clamp_lat_out_of_range() {
        assert_eq!(clamp_lat(200.0), Some(90.0));
        assert_eq!(clamp_lat(-200.0), Some(-90.0));
        assert_eq!(clamp_lat(f64::NAN), None);
    }

    #[test]
    fn clamp_lon_out_of_range() {
        assert_eq!(clamp_lon(200.0), Some(180.0));
        assert_eq!(clamp_lon(-200.0), Some(-180.0));
    }
}
