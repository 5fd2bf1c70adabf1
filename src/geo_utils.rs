//! Geographic helpers: great-circle distances, radian conversion and the
//! unit-sphere embedding used by spatial indices.

use crate::GpsPoint;

/// Mean Earth radius in kilometres, i.e. kilometres per radian of arc.
pub const KM_PER_RADIAN: f64 = 6371.0088;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = KM_PER_RADIAN * 1000.0;

/// Great-circle distance between two points in metres (haversine formula).
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_radians(
        p1.latitude.to_radians(),
        p1.longitude.to_radians(),
        p2.latitude.to_radians(),
        p2.longitude.to_radians(),
    ) * EARTH_RADIUS_M
}

/// Central angle in radians between two (lat, lng) positions given in radians.
pub fn haversine_radians(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

/// Convert a great-circle distance in kilometres into an angular distance
/// in radians.
pub fn km_to_radians(km: f64) -> f64 {
    km / KM_PER_RADIAN
}

/// Position on the unit sphere as `[x, y, z]`.
pub fn unit_vector(point: &GpsPoint) -> [f64; 3] {
    let lat = point.latitude.to_radians();
    let lng = point.longitude.to_radians();
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

/// Straight-line distance between two unit vectors.
pub fn chord_length(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Central angle in radians subtended by a chord of the unit sphere.
pub fn chord_to_angle(chord: f64) -> f64 {
    2.0 * (chord / 2.0).min(1.0).asin()
}

/// Chord of the unit sphere subtending `angle` radians.
pub fn angle_to_chord(angle: f64) -> f64 {
    2.0 * (angle.min(std::f64::consts::PI) / 2.0).sin()
}
