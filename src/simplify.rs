//! Douglas-Peucker trajectory simplification.

use geo::{algorithm::simplify::Simplify, Coord, LineString};

use crate::GpsPoint;

/// Reduce a trajectory to a shape-preserving subsequence of its points.
///
/// Endpoints are always kept; an intermediate point survives only if it
/// deviates from the current chord by more than `epsilon` degrees. Invalid
/// coordinates are dropped before simplification. Applying the function to
/// its own output with the same `epsilon` returns the output unchanged.
pub fn simplify(points: &[GpsPoint], epsilon: f64) -> Vec<GpsPoint> {
    let valid: Vec<GpsPoint> = points.iter().copied().filter(|p| p.is_valid()).collect();
    if valid.len() <= 2 || epsilon <= 0.0 {
        return valid;
    }

    let coords: Vec<Coord> = valid
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    LineString::new(coords)
        .simplify(&epsilon)
        .0
        .into_iter()
        .map(|c| GpsPoint::new(c.y, c.x))
        .collect()
}
