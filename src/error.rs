//! Unified error type for the clustering pipeline.

use thiserror::Error;

/// Errors produced by the clustering stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// The corridor detection selector did not name a known algorithm.
    #[error("unknown corridor detection algorithm '{name}' (expected one of: {expected})")]
    InvalidAlgorithm { name: String, expected: String },

    /// A stage received no data to work on.
    #[error("no input available for {stage}")]
    EmptyInput { stage: String },

    /// A trajectory is too short to be classified or compared.
    #[error("flight {flight_id} has {point_count} points, {minimum_required} required")]
    InsufficientPoints {
        flight_id: String,
        point_count: usize,
        minimum_required: usize,
    },

    /// Silhouette needs at least two non-noise clusters, and fewer labels
    /// than samples.
    #[error("silhouette undefined: {non_noise_labels} non-noise labels, {labels} labels over {samples} samples")]
    SilhouetteUndefined {
        non_noise_labels: usize,
        labels: usize,
        samples: usize,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A record id was inserted into the LSH index twice.
    #[error("record {0} is already indexed")]
    DuplicateRecord(usize),

    /// A record id was queried but never inserted.
    #[error("record {0} is not indexed")]
    UnknownRecord(usize),

    /// The clustering backend rejected its input.
    #[error("corridor clustering failed: {0}")]
    Clustering(String),
}

impl From<clump::Error> for FlowError {
    fn from(err: clump::Error) -> Self {
        match err {
            clump::Error::EmptyInput => FlowError::empty_input("corridor clustering"),
            clump::Error::InvalidClusterCount { requested, n_items } => FlowError::invalid_parameter(
                "corridor_count",
                format!("{requested} corridors requested from {n_items} entrance points"),
            ),
            other => FlowError::Clustering(other.to_string()),
        }
    }
}

impl FlowError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        FlowError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn empty_input(stage: &str) -> Self {
        FlowError::EmptyInput {
            stage: stage.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Conversion helpers for optional values.
pub trait OptionExt<T> {
    /// Turn `None` into [`FlowError::InsufficientPoints`].
    fn ok_or_insufficient_points(
        self,
        flight_id: &str,
        point_count: usize,
        minimum_required: usize,
    ) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(
        self,
        flight_id: &str,
        point_count: usize,
        minimum_required: usize,
    ) -> Result<T> {
        self.ok_or_else(|| FlowError::InsufficientPoints {
            flight_id: flight_id.to_string(),
            point_count,
            minimum_required,
        })
    }
}
