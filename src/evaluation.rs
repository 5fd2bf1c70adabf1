//! Cluster quality evaluation.
//!
//! A symmetric trajectory distance matrix is built with a pluggable metric
//! and scored with the silhouette coefficient over every record, noise included.

use std::collections::BTreeMap;

use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buckets::NOISE;
use crate::error::{FlowError, Result};
use crate::geo_utils::haversine_distance;
use crate::GpsPoint;

/// A dissimilarity between two trajectories.
///
/// Implementations must be non-negative and symmetric.
pub trait TrajectoryDistance: Send + Sync {
    fn distance(&self, a: &[GpsPoint], b: &[GpsPoint]) -> f64;
}

/// Built-in trajectory metrics. Point distances are great-circle metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryMetric {
    /// Directed Hausdorff distance, symmetrised by taking the larger direction.
    #[default]
    DirectedHausdorff,
    /// Mean of the two directed average-minimum distances.
    AverageMinDistance,
}

impl TrajectoryDistance for TrajectoryMetric {
    fn distance(&self, a: &[GpsPoint], b: &[GpsPoint]) -> f64 {
        match self {
            TrajectoryMetric::DirectedHausdorff => {
                directed_hausdorff(a, b).max(directed_hausdorff(b, a))
            }
            TrajectoryMetric::AverageMinDistance => {
                (average_min_distance(a, b) + average_min_distance(b, a)) / 2.0
            }
        }
    }
}

fn min_distance_to(point: &GpsPoint, points: &[GpsPoint]) -> f64 {
    points
        .iter()
        .map(|q| haversine_distance(point, q))
        .fold(f64::INFINITY, f64::min)
}

/// Largest distance from a point of `from` to its nearest point in `to`.
/// Zero if either side is empty.
pub fn directed_hausdorff(from: &[GpsPoint], to: &[GpsPoint]) -> f64 {
    if from.is_empty() || to.is_empty() {
        return 0.0;
    }
    from.iter()
        .map(|p| min_distance_to(p, to))
        .fold(0.0, f64::max)
}

/// Mean distance from each point of `from` to its nearest point in `to`.
/// Zero if either side is empty.
pub fn average_min_distance(from: &[GpsPoint], to: &[GpsPoint]) -> f64 {
    if from.is_empty() || to.is_empty() {
        return 0.0;
    }
    let total: f64 = from.iter().map(|p| min_distance_to(p, to)).sum();
    total / from.len() as f64
}

/// Dense symmetric distance matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Pairwise distances between all trajectories.
    pub fn build<M, T>(trajectories: &[T], metric: &M) -> Self
    where
        M: TrajectoryDistance + ?Sized,
        T: AsRef<[GpsPoint]> + Sync,
    {
        let n = trajectories.len();

        let row = |i: usize| -> Vec<f64> {
            (i + 1..n)
                .map(|j| {
                    let d = metric.distance(trajectories[i].as_ref(), trajectories[j].as_ref());
                    if d.is_finite() {
                        d.max(0.0)
                    } else {
                        f64::MAX
                    }
                })
                .collect()
        };

        #[cfg(feature = "parallel")]
        let upper: Vec<Vec<f64>> = (0..n).into_par_iter().map(row).collect();
        #[cfg(not(feature = "parallel"))]
        let upper: Vec<Vec<f64>> = (0..n).map(row).collect();

        let mut values = vec![0.0; n * n];
        for (i, distances) in upper.into_iter().enumerate() {
            for (offset, d) in distances.into_iter().enumerate() {
                let j = i + 1 + offset;
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }

        info!("[Evaluation] Built {n}x{n} distance matrix");
        Self { size: n, values }
    }

    /// Matrix from explicit rows. Rows must form a square matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return Err(FlowError::invalid_parameter(
                "distance_matrix",
                "rows must form a square matrix",
            ));
        }
        Ok(Self {
            size: n,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.size..(i + 1) * self.size]
    }
}

/// Mean silhouette coefficient over every record.
///
/// [`NOISE`] is scored as an ordinary label, so noise records count in the
/// mean and form a cluster of their own for everyone else. Each record
/// scores `(b - a) / max(a, b)`, where `a` is its mean distance to the rest
/// of its cluster and `b` the smallest mean distance to another cluster.
/// Members of singleton clusters score 0.
///
/// Undefined with fewer than two non-noise labels, or when the number of
/// labels (noise included) is not below the number of records.
pub fn silhouette(matrix: &DistanceMatrix, labels: &[i32]) -> Result<f64> {
    if labels.len() != matrix.len() {
        return Err(FlowError::invalid_parameter(
            "labels",
            format!(
                "{} labels for a {}x{} matrix",
                labels.len(),
                matrix.len(),
                matrix.len()
            ),
        ));
    }

    let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        members.entry(label).or_default().push(i);
    }

    let non_noise_labels = members.keys().filter(|&&label| label != NOISE).count();
    if non_noise_labels < 2 || members.len() >= labels.len() {
        return Err(FlowError::SilhouetteUndefined {
            non_noise_labels,
            labels: members.len(),
            samples: labels.len(),
        });
    }

    let total: f64 = (0..labels.len())
        .map(|i| {
            let own = &members[&labels[i]];
            if own.len() < 2 {
                return 0.0;
            }

            let row = matrix.row(i);
            let a = own.iter().filter(|&&j| j != i).map(|&j| row[j]).sum::<f64>()
                / (own.len() - 1) as f64;
            let b = members
                .iter()
                .filter(|(label, _)| **label != labels[i])
                .map(|(_, others)| others.iter().map(|&j| row[j]).sum::<f64>() / others.len() as f64)
                .fold(f64::INFINITY, f64::min);

            let scale = a.max(b);
            if scale > 0.0 {
                (b - a) / scale
            } else {
                0.0
            }
        })
        .sum();

    Ok(total / labels.len() as f64)
}
