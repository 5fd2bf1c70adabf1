//! Grouping of per-point records into flight trajectories.
//!
//! Upstream data arrives as one row per observed position. Each flight keeps
//! the points inside the trajectory window of distance remaining, plus the
//! subset inside the entrance window used for corridor detection. Both are
//! ordered by decreasing distance remaining, i.e. along the approach.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::GpsPoint;

/// One observed position of a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Remaining distance to the destination airport.
    pub distance_remaining: f64,
}

impl FlightRecord {
    pub fn new(flight_id: &str, latitude: f64, longitude: f64, distance_remaining: f64) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            latitude,
            longitude,
            distance_remaining,
        }
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Inclusive range of distance remaining.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceWindow {
    pub min: f64,
    pub max: f64,
}

impl DistanceWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, distance_remaining: f64) -> bool {
        distance_remaining >= self.min && distance_remaining <= self.max
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(FlowError::invalid_parameter(
                name,
                format!("[{}, {}] is not a valid range", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// A flight's approach as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub flight_id: String,
    /// Points within the trajectory window, along the approach.
    pub trajectory: Vec<GpsPoint>,
    /// Points within the entrance window, along the approach.
    pub entrance: Vec<GpsPoint>,
}

impl Flight {
    pub fn new(flight_id: &str, trajectory: Vec<GpsPoint>, entrance: Vec<GpsPoint>) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            trajectory,
            entrance,
        }
    }
}

fn along_approach(mut rows: Vec<&FlightRecord>) -> Vec<GpsPoint> {
    rows.sort_by(|a, b| {
        b.distance_remaining
            .partial_cmp(&a.distance_remaining)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.into_iter().map(FlightRecord::point).collect()
}

/// Group records into flights.
///
/// Flights appear in order of first occurrence and are truncated to
/// `max_flights`. A flight with no point in the trajectory window is
/// dropped. Fails with [`FlowError::EmptyInput`] if no flight remains.
pub fn assemble(
    records: &[FlightRecord],
    trajectory_window: DistanceWindow,
    entrance_window: DistanceWindow,
    max_flights: usize,
) -> Result<Vec<Flight>> {
    trajectory_window.validate("trajectory_window")?;
    entrance_window.validate("entrance_window")?;

    let mut order: Vec<&str> = Vec::new();
    let mut rows: HashMap<&str, Vec<&FlightRecord>> = HashMap::new();
    for record in records {
        let in_trajectory = trajectory_window.contains(record.distance_remaining);
        let in_entrance = entrance_window.contains(record.distance_remaining);
        if !(in_trajectory || in_entrance) {
            continue;
        }
        let entry = rows.entry(record.flight_id.as_str()).or_insert_with(|| {
            order.push(record.flight_id.as_str());
            Vec::new()
        });
        entry.push(record);
    }

    let mut flights = Vec::new();
    for flight_id in order {
        if flights.len() >= max_flights {
            debug!("[Flights] Reached max_flights={max_flights}; ignoring the rest");
            break;
        }
        let Some(flight_rows) = rows.remove(flight_id) else {
            continue;
        };

        let trajectory = along_approach(
            flight_rows
                .iter()
                .copied()
                .filter(|r| trajectory_window.contains(r.distance_remaining))
                .collect(),
        );
        if trajectory.is_empty() {
            debug!("[Flights] {flight_id} has no point in the trajectory window");
            continue;
        }
        let entrance = along_approach(
            flight_rows
                .iter()
                .copied()
                .filter(|r| entrance_window.contains(r.distance_remaining))
                .collect(),
        );

        flights.push(Flight::new(flight_id, trajectory, entrance));
    }

    if flights.is_empty() {
        return Err(FlowError::empty_input("flight assembly"));
    }

    info!(
        "[Flights] Assembled {} flights from {} records",
        flights.len(),
        records.len()
    );
    Ok(flights)
}
