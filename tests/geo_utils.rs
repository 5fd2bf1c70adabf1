//! Tests for geo_utils module

use flowclus::geo_utils::*;
use flowclus::GpsPoint;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_haversine_distance_same_point() {
    let p = GpsPoint::new(1.3644, 103.9915);
    assert_eq!(haversine_distance(&p, &p), 0.0);
}

#[test]
fn test_haversine_distance_known_value() {
    // Changi to Kuala Lumpur International is roughly 300 km
    let changi = GpsPoint::new(1.3644, 103.9915);
    let klia = GpsPoint::new(2.7456, 101.7099);
    let dist = haversine_distance(&changi, &klia);
    assert!(approx_eq(dist, 297_000.0, 10_000.0), "got {dist}");
}

#[test]
fn test_haversine_is_symmetric() {
    let a = GpsPoint::new(1.0, 103.0);
    let b = GpsPoint::new(2.5, 104.2);
    assert!(approx_eq(
        haversine_distance(&a, &b),
        haversine_distance(&b, &a),
        1e-6
    ));
}

#[test]
fn test_km_to_radians() {
    assert!(approx_eq(km_to_radians(KM_PER_RADIAN), 1.0, 1e-12));
    assert!(approx_eq(km_to_radians(30.0), 30.0 / 6371.0088, 1e-12));
}

#[test]
fn test_one_degree_of_arc() {
    let a = GpsPoint::new(0.0, 0.0);
    let b = GpsPoint::new(1.0, 0.0);
    let radians = haversine_radians(0.0, 0.0, 1.0_f64.to_radians(), 0.0);
    assert!(approx_eq(radians, 1.0_f64.to_radians(), 1e-12));
    assert!(approx_eq(haversine_distance(&a, &b), 111_195.0, 100.0));
}

#[test]
fn test_chord_angle_agrees_with_haversine() {
    let a = GpsPoint::new(50.0, 8.0);
    let b = GpsPoint::new(50.2, 8.3);
    let chord = chord_length(&unit_vector(&a), &unit_vector(&b));
    let angle = chord_to_angle(chord);
    assert!(approx_eq(angle * EARTH_RADIUS_M, haversine_distance(&a, &b), 0.01));
    assert!(approx_eq(angle_to_chord(angle), chord, 1e-12));
}

#[test]
fn test_unit_vector_is_continuous_across_antimeridian() {
    let west = GpsPoint::new(-17.0, 179.99);
    let east = GpsPoint::new(-17.0, -179.99);
    let angle = chord_to_angle(chord_length(&unit_vector(&west), &unit_vector(&east)));
    assert!(approx_eq(angle * EARTH_RADIUS_M, 2127.0, 5.0), "got {}", angle * EARTH_RADIUS_M);
    assert!(approx_eq(angle * EARTH_RADIUS_M, haversine_distance(&west, &east), 0.01));
}
