//! Entrance corridor detection.
//!
//! Corridors are spatial clusters of the points where approaching flights
//! enter the terminal area. Two detectors are available:
//!
//! - **k-means** partitions the pooled entrance points into exactly `k`
//!   corridors (`clump` k-means++ with restarts drawn from an explicit seed)
//!   and classifies new points by nearest center.
//! - **density** runs `clump` DBSCAN with a great-circle metric over points
//!   embedded on the unit sphere. Each cluster is represented by its
//!   centermost observed point, and new points take the label of the
//!   nearest clustered point within epsilon.
//!
//! The detector is chosen once from configuration; after `detect` every
//! caller works with the fitted [`CorridorSet`] regardless of algorithm.

use clump::{Dbscan, DistanceMetric, Kmeans, KmeansFit};
use geo::{Centroid, MultiPoint, Point};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, OptionExt, Result};
use crate::geo_utils::{
    angle_to_chord, chord_length, chord_to_angle, haversine_distance, km_to_radians, unit_vector,
};
use crate::{ClusteringConfig, GpsPoint};

/// Corridor label. Negative values are never real corridors.
pub type CorridorId = i32;

/// Label for points that could not be classified into any corridor.
pub const UNCLASSIFIED: CorridorId = -1;

/// Minimum trajectory length that is classified point by point.
pub const MIN_CLASSIFIABLE_POINTS: usize = 2;

const KMEANS_RESTARTS: usize = 10;
const KMEANS_MAX_ITERATIONS: usize = 300;

/// Selector names accepted for the k-means detector.
pub const KMEANS_NAMES: &[&str] = &["k-means", "kmeans", "centroid-k"];
/// Selector names accepted for the density detector.
pub const DENSITY_NAMES: &[&str] = &["dbscan", "density", "density-based"];

/// A detected corridor: its label and representative location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub id: CorridorId,
    pub center: GpsPoint,
}

/// Corridor detector, fixed at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub enum CorridorDetector {
    /// Exactly `k` corridors by within-cluster variance minimisation.
    KMeans { k: usize, seed: u64 },
    /// DBSCAN over great-circle distance; `epsilon` is in radians.
    Density { epsilon: f64, min_samples: usize },
}

impl CorridorDetector {
    /// Build a detector from a selector name and the configured parameters.
    ///
    /// Fails with [`FlowError::InvalidAlgorithm`] for unknown names instead
    /// of returning an empty corridor set.
    pub fn from_config(config: &ClusteringConfig) -> Result<Self> {
        let name = config.corridor_algorithm.trim().to_ascii_lowercase();

        let detector = if KMEANS_NAMES.contains(&name.as_str()) {
            CorridorDetector::KMeans {
                k: config.corridor_count,
                seed: config.corridor_seed,
            }
        } else if DENSITY_NAMES.contains(&name.as_str()) {
            let epsilon = config
                .corridor_epsilon
                .unwrap_or_else(|| km_to_radians(config.corridor_max_distance_km));
            CorridorDetector::Density {
                epsilon,
                min_samples: config.corridor_min_samples,
            }
        } else {
            let expected: Vec<&str> = KMEANS_NAMES.iter().chain(DENSITY_NAMES).copied().collect();
            return Err(FlowError::InvalidAlgorithm {
                name: config.corridor_algorithm.clone(),
                expected: expected.join(", "),
            });
        };

        detector.validate()?;
        Ok(detector)
    }

    fn validate(&self) -> Result<()> {
        match *self {
            CorridorDetector::KMeans { k, .. } if k == 0 => Err(FlowError::invalid_parameter(
                "corridor_count",
                "k-means needs at least one corridor",
            )),
            CorridorDetector::Density { epsilon, .. } if !(epsilon.is_finite() && epsilon > 0.0) => {
                Err(FlowError::invalid_parameter(
                    "corridor_epsilon",
                    format!("must be a positive angle, got {epsilon}"),
                ))
            }
            CorridorDetector::Density { min_samples, .. } if min_samples == 0 => Err(
                FlowError::invalid_parameter("corridor_min_samples", "must be at least 1"),
            ),
            _ => Ok(()),
        }
    }

    /// Human-readable algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            CorridorDetector::KMeans { .. } => "k-means",
            CorridorDetector::Density { .. } => "dbscan",
        }
    }

    /// Fit corridors on the pooled entrance points.
    pub fn detect(&self, points: &[GpsPoint]) -> Result<CorridorSet> {
        self.validate()?;

        let pool: Vec<GpsPoint> = points.iter().copied().filter(|p| p.is_valid()).collect();
        if pool.is_empty() {
            return Err(FlowError::empty_input("corridor detection"));
        }
        if pool.len() < points.len() {
            warn!(
                "[Corridors] Dropped {} invalid entrance points",
                points.len() - pool.len()
            );
        }

        let set = match *self {
            CorridorDetector::KMeans { k, seed } => fit_kmeans(&pool, k, seed)?,
            CorridorDetector::Density {
                epsilon,
                min_samples,
            } => fit_density(&pool, epsilon, min_samples)?,
        };

        info!(
            "[Corridors] {} detected {} corridors from {} entrance points",
            self.name(),
            set.len(),
            pool.len()
        );
        Ok(set)
    }
}

/// Labelled unit vector stored in the density classifier's R-tree.
type LabelledPoint = GeomWithData<[f64; 3], CorridorId>;

#[derive(Debug, Clone)]
enum Classifier {
    NearestCenter,
    NearestMember {
        tree: RTree<LabelledPoint>,
        epsilon: f64,
    },
}

/// The fitted corridors of one run and the matching classification rule.
#[derive(Debug, Clone)]
pub struct CorridorSet {
    corridors: Vec<Corridor>,
    classifier: Classifier,
}

impl CorridorSet {
    /// Corridors ordered by id.
    pub fn corridors(&self) -> &[Corridor] {
        &self.corridors
    }

    pub fn len(&self) -> usize {
        self.corridors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corridors.is_empty()
    }

    /// Representative location of every corridor, in id order.
    pub fn centers(&self) -> Vec<GpsPoint> {
        self.corridors.iter().map(|c| c.center).collect()
    }

    /// Classify a single point.
    pub fn classify_point(&self, point: &GpsPoint) -> CorridorId {
        if !point.is_valid() {
            return UNCLASSIFIED;
        }
        match &self.classifier {
            Classifier::NearestCenter => nearest_center(&self.corridors, point),
            Classifier::NearestMember { tree, epsilon } => nearest_member(tree, *epsilon, point),
        }
    }

    /// Classify every point, preserving order.
    pub fn classify(&self, points: &[GpsPoint]) -> Vec<CorridorId> {
        points.iter().map(|p| self.classify_point(p)).collect()
    }

    /// Classify a flight's entrance segment.
    ///
    /// Segments with fewer than [`MIN_CLASSIFIABLE_POINTS`] points yield a
    /// single [`UNCLASSIFIED`] label rather than an error.
    pub fn classify_trajectory(&self, flight_id: &str, points: &[GpsPoint]) -> Vec<CorridorId> {
        match self.checked_classify(flight_id, points) {
            Ok(labels) => labels,
            Err(err) => {
                debug!("[Corridors] {err}; marking as unclassified");
                vec![UNCLASSIFIED]
            }
        }
    }

    fn checked_classify(&self, flight_id: &str, points: &[GpsPoint]) -> Result<Vec<CorridorId>> {
        let segment = Some(points)
            .filter(|p| p.len() >= MIN_CLASSIFIABLE_POINTS)
            .ok_or_insufficient_points(flight_id, points.len(), MIN_CLASSIFIABLE_POINTS)?;
        Ok(self.classify(segment))
    }
}

// ============================================================================
// k-means
// ============================================================================

fn squared_distance(a: &GpsPoint, b: &GpsPoint) -> f64 {
    let dlat = a.latitude - b.latitude;
    let dlng = a.longitude - b.longitude;
    dlat * dlat + dlng * dlng
}

fn nearest_center(corridors: &[Corridor], point: &GpsPoint) -> CorridorId {
    let mut best = UNCLASSIFIED;
    let mut best_dist = f64::INFINITY;
    for corridor in corridors {
        let d = squared_distance(&corridor.center, point);
        if d < best_dist {
            best_dist = d;
            best = corridor.id;
        }
    }
    best
}

fn fit_kmeans(points: &[GpsPoint], k: usize, seed: u64) -> Result<CorridorSet> {
    if k > points.len() {
        return Err(FlowError::invalid_parameter(
            "corridor_count",
            format!("{k} corridors requested from {} entrance points", points.len()),
        ));
    }

    let rows: Vec<Vec<f32>> = points
        .iter()
        .map(|p| vec![p.latitude as f32, p.longitude as f32])
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(KmeansFit, f32)> = None;
    for restart in 0..KMEANS_RESTARTS {
        let fit = Kmeans::new(k)
            .with_seed(rng.gen())
            .with_max_iter(KMEANS_MAX_ITERATIONS)
            .fit(&rows)?;
        let inertia = fit.wcss(&rows);
        debug!(
            "[Corridors] k-means restart {restart}: inertia {inertia:.6e} after {} iterations",
            fit.iters
        );
        if best.as_ref().map_or(true, |(_, lowest)| inertia < *lowest) {
            best = Some((fit, inertia));
        }
    }

    let (fit, _) = best.ok_or_else(|| FlowError::empty_input("k-means corridors"))?;
    let corridors = fit
        .centroids
        .iter()
        .enumerate()
        .map(|(i, c)| Corridor {
            id: i as CorridorId,
            center: GpsPoint::new(f64::from(c[0]), f64::from(c[1])),
        })
        .collect();

    Ok(CorridorSet {
        corridors,
        classifier: Classifier::NearestCenter,
    })
}

// ============================================================================
// Density (DBSCAN, great-circle)
// ============================================================================

/// Great-circle angle between two unit vectors, in radians.
///
/// Rows are points embedded on the unit sphere, so neighbourhoods are
/// continuous across the antimeridian and the poles. Every coordinate
/// difference is bounded by the angle, which keeps a grid index with
/// `epsilon`-sized cells exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreatCircle;

impl DistanceMetric for GreatCircle {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let chord = a
            .iter()
            .zip(b)
            .map(|(x, y)| {
                let d = f64::from(*x) - f64::from(*y);
                d * d
            })
            .sum::<f64>()
            .sqrt();
        chord_to_angle(chord) as f32
    }

    fn distance_is_squared(&self) -> bool {
        false
    }
}

fn fit_density(points: &[GpsPoint], epsilon: f64, min_samples: usize) -> Result<CorridorSet> {
    let rows: Vec<Vec<f32>> = points
        .iter()
        .map(|p| unit_vector(p).iter().map(|&c| c as f32).collect())
        .collect();

    let labels = Dbscan::with_metric(epsilon as f32, min_samples, GreatCircle)
        .fit_predict_with_noise(&rows)?;

    let cluster_count = labels.iter().filter_map(|l| *l).max().map_or(0, |m| m + 1);
    let noise = labels.iter().filter(|l| l.is_none()).count();
    if noise > 0 {
        debug!("[Corridors] DBSCAN left {noise} entrance points as noise");
    }
    if cluster_count == 0 {
        warn!("[Corridors] DBSCAN found no dense region; every point is noise");
        return Err(FlowError::empty_input("density corridors"));
    }

    let mut members: Vec<Vec<GpsPoint>> = vec![Vec::new(); cluster_count];
    for (label, p) in labels.iter().zip(points) {
        if let Some(cluster) = label {
            members[*cluster].push(*p);
        }
    }

    let corridors = members
        .iter()
        .enumerate()
        .filter_map(|(i, cluster)| {
            centermost_point(cluster).map(|center| Corridor {
                id: i as CorridorId,
                center,
            })
        })
        .collect();

    let labelled: Vec<LabelledPoint> = labels
        .iter()
        .zip(points)
        .filter_map(|(label, p)| {
            label.map(|cluster| GeomWithData::new(unit_vector(p), cluster as CorridorId))
        })
        .collect();

    Ok(CorridorSet {
        corridors,
        classifier: Classifier::NearestMember {
            tree: RTree::bulk_load(labelled),
            epsilon,
        },
    })
}

/// The observed point closest (great-circle) to the cluster's centroid.
pub fn centermost_point(cluster: &[GpsPoint]) -> Option<GpsPoint> {
    let multi: MultiPoint<f64> = cluster
        .iter()
        .map(|p| Point::new(p.longitude, p.latitude))
        .collect();
    let centroid = multi.centroid()?;
    let centroid = GpsPoint::new(centroid.y(), centroid.x());

    cluster.iter().copied().min_by(|a, b| {
        haversine_distance(a, &centroid)
            .partial_cmp(&haversine_distance(b, &centroid))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

fn nearest_member(tree: &RTree<LabelledPoint>, epsilon: f64, point: &GpsPoint) -> CorridorId {
    let query = unit_vector(point);
    let max_chord = angle_to_chord(epsilon);
    let mut best = UNCLASSIFIED;
    let mut best_dist = f64::INFINITY;
    for entry in tree.locate_within_distance(query, max_chord * max_chord) {
        let d = chord_to_angle(chord_length(&query, entry.geom()));
        if d <= epsilon && (d < best_dist || (d == best_dist && entry.data < best)) {
            best_dist = d;
            best = entry.data;
        }
    }
    best
}
