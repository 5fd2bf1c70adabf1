//! Synthetic approach traffic for tests and benchmarks.
//!
//! Generates flights converging on an airport along a few arrival streams,
//! with the stream of every flight recorded as ground truth.
//!
//! # Example
//!
//! ```rust
//! use flowclus::synthetic::{ApproachScenario, ArrivalStream};
//! use flowclus::GpsPoint;
//!
//! let scenario = ApproachScenario {
//!     airport: GpsPoint::new(1.3644, 103.9915),
//!     flight_count: 20,
//!     streams: vec![ArrivalStream::new(30.0, 1.0), ArrivalStream::new(210.0, 1.0)],
//!     start_distance: 3.2,
//!     end_distance: 0.1,
//!     points_per_flight: 40,
//!     noise_sigma_deg: 0.005,
//!     seed: 42,
//! };
//!
//! let dataset = scenario.generate();
//! assert_eq!(dataset.stream_of.len(), 20);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::flights::FlightRecord;
use crate::geo_utils::EARTH_RADIUS_M;
use crate::geo_utils::haversine_distance;
use crate::GpsPoint;

// ============================================================================
// Types
// ============================================================================

/// One arrival stream: flights enter on `bearing_deg` (from the airport) and
/// bend by `dogleg_deg` halfway in.
#[derive(Debug, Clone, Copy)]
pub struct ArrivalStream {
    pub bearing_deg: f64,
    /// Relative weight of this stream when picking a flight's stream.
    pub share: f64,
    pub dogleg_deg: f64,
}

impl ArrivalStream {
    pub fn new(bearing_deg: f64, share: f64) -> Self {
        Self {
            bearing_deg,
            share,
            dogleg_deg: 0.0,
        }
    }

    pub fn with_dogleg(mut self, dogleg_deg: f64) -> Self {
        self.dogleg_deg = dogleg_deg;
        self
    }
}

/// Scenario configuration. Distances are degrees of arc from the airport.
#[derive(Debug, Clone)]
pub struct ApproachScenario {
    pub airport: GpsPoint,
    pub flight_count: usize,
    pub streams: Vec<ArrivalStream>,
    /// Distance remaining at the first observed point.
    pub start_distance: f64,
    /// Distance remaining at the last observed point.
    pub end_distance: f64,
    pub points_per_flight: usize,
    /// Standard deviation of position noise in degrees.
    pub noise_sigma_deg: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

/// Metadata about a generated dataset.
#[derive(Debug, Clone)]
pub struct DatasetMetadata {
    pub total_points: usize,
    /// Number of pairwise comparisons (N*(N-1)/2).
    pub total_pairs: usize,
}

/// Generated records plus ground truth.
pub struct SyntheticApproaches {
    pub records: Vec<FlightRecord>,
    /// Stream index of every flight id.
    pub stream_of: HashMap<String, usize>,
    pub metadata: DatasetMetadata,
}

// ============================================================================
// Generation
// ============================================================================

/// Offset `origin` by `distance` degrees of arc along `bearing` (radians,
/// clockwise from north). Planar approximation, fine for a few degrees.
fn offset(origin: &GpsPoint, bearing: f64, distance: f64) -> GpsPoint {
    let lat = origin.latitude + distance * bearing.cos();
    let cos_lat = origin.latitude.to_radians().cos().max(1e-6);
    let lng = origin.longitude + distance * bearing.sin() / cos_lat;
    GpsPoint::new(lat, lng)
}

fn lerp(a: &GpsPoint, b: &GpsPoint, t: f64) -> GpsPoint {
    GpsPoint::new(
        a.latitude + (b.latitude - a.latitude) * t,
        a.longitude + (b.longitude - a.longitude) * t,
    )
}

/// Box-Muller standard normal sample.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn pick_stream(streams: &[ArrivalStream], rng: &mut StdRng) -> usize {
    let total: f64 = streams.iter().map(|s| s.share.max(0.0)).sum();
    if total <= 0.0 {
        return rng.gen_range(0..streams.len());
    }
    let mut target = rng.gen_range(0.0..total);
    for (i, s) in streams.iter().enumerate() {
        let share = s.share.max(0.0);
        if target < share {
            return i;
        }
        target -= share;
    }
    streams.len() - 1
}

impl ApproachScenario {
    /// Degrees of arc between a point and the airport.
    fn distance_remaining(&self, point: &GpsPoint) -> f64 {
        (haversine_distance(point, &self.airport) / EARTH_RADIUS_M).to_degrees()
    }

    /// Generate the records of every flight, in flight order.
    pub fn generate(&self) -> SyntheticApproaches {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut records = Vec::with_capacity(self.flight_count * self.points_per_flight);
        let mut stream_of = HashMap::with_capacity(self.flight_count);

        if self.streams.is_empty() || self.points_per_flight < 2 {
            return SyntheticApproaches {
                records,
                stream_of,
                metadata: DatasetMetadata {
                    total_points: 0,
                    total_pairs: 0,
                },
            };
        }

        let midway = (self.start_distance + self.end_distance) / 2.0;

        for flight_idx in 0..self.flight_count {
            let flight_id = format!("FL{:04}", flight_idx);
            let stream_idx = pick_stream(&self.streams, &mut rng);
            let stream = self.streams[stream_idx];
            stream_of.insert(flight_id.clone(), stream_idx);

            let bearing = stream.bearing_deg.to_radians();
            let entry = offset(&self.airport, bearing, self.start_distance);
            let turn = offset(
                &self.airport,
                bearing + stream.dogleg_deg.to_radians(),
                midway,
            );
            let last = offset(&self.airport, bearing, self.end_distance);

            for step in 0..self.points_per_flight {
                let t = step as f64 / (self.points_per_flight - 1) as f64;
                let nominal = if t < 0.5 {
                    lerp(&entry, &turn, t * 2.0)
                } else {
                    lerp(&turn, &last, (t - 0.5) * 2.0)
                };
                let point = GpsPoint::new(
                    nominal.latitude + gaussian(&mut rng) * self.noise_sigma_deg,
                    nominal.longitude + gaussian(&mut rng) * self.noise_sigma_deg,
                );
                records.push(FlightRecord::new(
                    &flight_id,
                    point.latitude,
                    point.longitude,
                    self.distance_remaining(&point),
                ));
            }
        }

        let n = self.flight_count;
        SyntheticApproaches {
            metadata: DatasetMetadata {
                total_points: records.len(),
                total_pairs: n * n.saturating_sub(1) / 2,
            },
            records,
            stream_of,
        }
    }
}

// ============================================================================
// Predefined Scenarios
// ============================================================================

/// Singapore Changi, the default airport of the configuration.
pub const CHANGI: GpsPoint = GpsPoint {
    latitude: 1.3644,
    longitude: 103.9915,
};

impl ApproachScenario {
    /// 60 flights on three well separated streams.
    pub fn three_streams() -> Self {
        Self {
            airport: CHANGI,
            flight_count: 60,
            streams: vec![
                ArrivalStream::new(20.0, 1.0),
                ArrivalStream::new(140.0, 1.0).with_dogleg(15.0),
                ArrivalStream::new(260.0, 1.0),
            ],
            start_distance: 3.2,
            end_distance: 0.1,
            points_per_flight: 60,
            noise_sigma_deg: 0.003,
            seed: 42,
        }
    }

    /// `count` flights on three streams, for scaling benchmarks.
    pub fn with_flight_count(count: usize) -> Self {
        Self {
            flight_count: count,
            ..Self::three_streams()
        }
    }
}
