//! # flowclus
//!
//! Clustering of aircraft approach trajectories into traffic flows.
//!
//! This library provides:
//! - Entrance corridor detection (k-means or haversine DBSCAN)
//! - Douglas-Peucker trajectory simplification
//! - Corridor tokenization of each flight's entrance segment
//! - MinHash signatures and a banded LSH index for approximate Jaccard search
//! - Bucket reduction of candidate duplicates into cluster ids
//! - Silhouette evaluation over a pairwise trajectory distance matrix
//!
//! ## Features
//!
//! - **`parallel`** - Build the distance matrix in parallel with rayon
//! - **`cli`** - Build the `flowclus-cli` debug binary
//!
//! ## Quick Start
//!
//! ```rust
//! use flowclus::{ClusteringConfig, Pipeline};
//! use flowclus::synthetic::ApproachScenario;
//!
//! let records = ApproachScenario::three_streams().generate().records;
//!
//! let config = ClusteringConfig {
//!     corridor_count: 3,
//!     ..ClusteringConfig::default()
//! };
//! let pipeline = Pipeline::new(config).unwrap();
//! let result = pipeline.run_records(&records).unwrap();
//!
//! for assignment in &result.assignments {
//!     println!("{} -> cluster {}", assignment.flight_id, assignment.cluster);
//! }
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{FlowError, OptionExt, Result};

// Geographic utilities (haversine, radians, search windows)
pub mod geo_utils;

// Union-Find for the connected-components reduction
pub mod union_find;
pub use union_find::UnionFind;

// Per-point records to per-flight trajectories
pub mod flights;
pub use flights::{assemble, DistanceWindow, Flight, FlightRecord};

// Douglas-Peucker simplification
pub mod simplify;
pub use simplify::simplify;

// Entrance corridor detection and classification
pub mod corridors;
pub use corridors::{Corridor, CorridorDetector, CorridorId, CorridorSet, UNCLASSIFIED};

// Corridor tokens
pub mod tokens;
pub use tokens::{jaccard, token_set, tokenize};

// MinHash + LSH
pub mod lsh;
pub use lsh::{LshIndex, MinHasher, Signature};

// Candidate sets to cluster ids
pub mod buckets;
pub use buckets::{
    reduce, CandidateSet, ClusterAssignment, ClusterSummary, ReductionStrategy, NOISE,
};

// Distance matrix and silhouette
pub mod evaluation;
pub use evaluation::{silhouette, DistanceMatrix, TrajectoryDistance, TrajectoryMetric};

// Stage chain and run log
pub mod pipeline;
pub use pipeline::{
    Evaluation, FacadeLog, MemoryLog, NoopLog, Pipeline, PipelineResult, PipelineStage, RunLog,
};

// Synthetic approach traffic for tests and benchmarks
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A position with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use flowclus::GpsPoint;
/// let point = GpsPoint::new(1.3644, 103.9915); // Changi
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Configuration for a clustering run.
///
/// Every field has a default, so a JSON configuration only needs to name
/// what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// ICAO code of the destination airport. Default: "WSSS"
    pub airport: String,

    /// Distance-remaining range of the trajectory used for evaluation.
    /// Default: [0.2, 3.0]
    pub trajectory_window: DistanceWindow,

    /// Distance-remaining range of the entrance segment used for corridors.
    /// Default: [2.0, 3.0]
    pub entrance_window: DistanceWindow,

    /// Maximum number of flights per run. Default: 1000
    pub max_flights: usize,

    /// Douglas-Peucker tolerance in degrees. Default: 0.0001
    pub simplification_tolerance: f64,

    /// Corridor detection algorithm: "k-means" or "dbscan". Default: "k-means"
    pub corridor_algorithm: String,

    /// Number of corridors for k-means. Default: 9
    pub corridor_count: usize,

    /// Seed of the k-means initialisation. Default: 0
    pub corridor_seed: u64,

    /// Neighbourhood radius for DBSCAN in kilometres. Default: 30.0
    pub corridor_max_distance_km: f64,

    /// Explicit DBSCAN radius in radians; overrides `corridor_max_distance_km`.
    /// Default: None
    pub corridor_epsilon: Option<f64>,

    /// DBSCAN minimum neighbourhood size, the point included. Default: 1
    pub corridor_min_samples: usize,

    /// Jaccard threshold of the LSH index, in (0, 1). Default: 0.6
    pub lsh_threshold: f64,

    /// MinHash signature length. Default: 128
    pub num_perm: usize,

    /// Seed of the MinHash permutations. Default: 1
    pub lsh_seed: u64,

    /// Buckets with this many records or fewer are noise. Default: 5
    pub min_bucket_population: usize,

    /// Candidate set to bucket reduction. Default: candidate set equality
    pub reduction: ReductionStrategy,

    /// Trajectory metric for evaluation. Default: directed Hausdorff
    pub metric: TrajectoryMetric,

    /// Whether to compute the silhouette score. Default: true
    pub evaluate: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            airport: "WSSS".to_string(),
            trajectory_window: DistanceWindow::new(0.2, 3.0),
            entrance_window: DistanceWindow::new(2.0, 3.0),
            max_flights: 1000,
            simplification_tolerance: 0.0001,
            corridor_algorithm: "k-means".to_string(),
            corridor_count: 9,
            corridor_seed: 0,
            corridor_max_distance_km: 30.0,
            corridor_epsilon: None,
            corridor_min_samples: 1,
            lsh_threshold: 0.6,
            num_perm: 128,
            lsh_seed: 1,
            min_bucket_population: buckets::DEFAULT_MIN_BUCKET_POPULATION,
            reduction: ReductionStrategy::default(),
            metric: TrajectoryMetric::default(),
            evaluate: true,
        }
    }
}

impl ClusteringConfig {
    /// Check ranges that do not belong to a single stage.
    pub fn validate(&self) -> Result<()> {
        self.trajectory_window.validate("trajectory_window")?;
        self.entrance_window.validate("entrance_window")?;
        if self.max_flights == 0 {
            return Err(FlowError::InvalidParameter {
                name: "max_flights".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.simplification_tolerance.is_finite() && self.simplification_tolerance >= 0.0) {
            return Err(FlowError::InvalidParameter {
                name: "simplification_tolerance".to_string(),
                reason: format!("must be a non-negative number, got {}", self.simplification_tolerance),
            });
        }
        Ok(())
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FlowError::InvalidParameter {
            name: "config".to_string(),
            reason: e.to_string(),
        })
    }
}
