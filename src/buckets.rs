//! Reduction of LSH candidate sets to cluster ids.
//!
//! Every record carries the set of records the index reported as candidate
//! duplicates. Records are bucketed by a canonical key derived from that set,
//! buckets are enumerated in first-occurrence order, and buckets that are
//! too small are marked as noise.

use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::union_find::UnionFind;

/// Cluster id for records in buckets at or below the minimum population.
pub const NOISE: i32 = -1;

/// Default minimum bucket population; buckets of this size or smaller are noise.
pub const DEFAULT_MIN_BUCKET_POPULATION: usize = 5;

/// Separator between record ids in a bucket key.
pub const KEY_SEPARATOR: &str = "_";

/// How candidate sets are turned into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionStrategy {
    /// Records share a bucket only if their candidate sets are identical.
    #[default]
    CandidateSetEquality,
    /// Records share a bucket if they are connected in the candidate graph.
    ConnectedComponents,
}

/// Candidate duplicates reported for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub flight_id: String,
    pub record_id: usize,
    pub candidates: Vec<usize>,
}

/// Final bucket and cluster of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub flight_id: String,
    pub record_id: usize,
    /// Canonical bucket key, e.g. `"0_3_7"`.
    pub bucket: String,
    /// Position of the bucket among all distinct buckets.
    pub bucket_index: usize,
    /// Cluster id, or [`NOISE`].
    pub cluster: i32,
}

impl ClusterAssignment {
    pub fn is_noise(&self) -> bool {
        self.cluster == NOISE
    }
}

/// Canonical key for a set of record ids: sorted, deduplicated, joined.
pub fn bucket_key(ids: &[usize]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Bucket key per record under the chosen strategy.
pub fn bucket_keys(candidates: &[CandidateSet], strategy: ReductionStrategy) -> Vec<String> {
    match strategy {
        ReductionStrategy::CandidateSetEquality => candidates
            .iter()
            .map(|c| bucket_key(&c.candidates))
            .collect(),
        ReductionStrategy::ConnectedComponents => component_keys(candidates),
    }
}

fn component_keys(candidates: &[CandidateSet]) -> Vec<String> {
    let mut uf = UnionFind::with_capacity(candidates.len());
    for record in candidates {
        uf.make_set(record.record_id);
        for &other in &record.candidates {
            uf.union(&record.record_id, &other);
        }
    }

    let components = uf.groups();
    let keys: HashMap<usize, String> = components
        .iter()
        .map(|(root, members)| (*root, bucket_key(members)))
        .collect();

    candidates
        .iter()
        .map(|record| {
            let root = uf.find(&record.record_id);
            keys.get(&root).cloned().unwrap_or_else(|| bucket_key(&[record.record_id]))
        })
        .collect()
}

/// Assign cluster ids to records.
///
/// Distinct bucket keys are enumerated in order of first occurrence. Buckets
/// with population `<= min_population` map to [`NOISE`]; the surviving
/// buckets are numbered `0..K` in that same order.
pub fn reduce(
    candidates: &[CandidateSet],
    strategy: ReductionStrategy,
    min_population: usize,
) -> Vec<ClusterAssignment> {
    let keys = bucket_keys(candidates, strategy);

    let mut order: Vec<&str> = Vec::new();
    let mut population: HashMap<&str, usize> = HashMap::new();
    for key in &keys {
        let count = population.entry(key.as_str()).or_insert(0);
        if *count == 0 {
            order.push(key.as_str());
        }
        *count += 1;
    }

    let mut bucket_index: HashMap<&str, usize> = HashMap::new();
    let mut cluster_of: HashMap<&str, i32> = HashMap::new();
    let mut next_cluster = 0;
    for (index, &key) in order.iter().enumerate() {
        bucket_index.insert(key, index);
        let cluster = if population[key] <= min_population {
            NOISE
        } else {
            next_cluster += 1;
            next_cluster - 1
        };
        cluster_of.insert(key, cluster);
    }

    let assignments: Vec<ClusterAssignment> = candidates
        .iter()
        .zip(&keys)
        .map(|(record, key)| ClusterAssignment {
            flight_id: record.flight_id.clone(),
            record_id: record.record_id,
            bucket: key.clone(),
            bucket_index: bucket_index[key.as_str()],
            cluster: cluster_of[key.as_str()],
        })
        .collect();

    info!(
        "[Buckets] {} records -> {} buckets, {} clusters, {} noise",
        candidates.len(),
        order.len(),
        next_cluster,
        assignments.iter().filter(|a| a.is_noise()).count()
    );

    assignments
}

/// Summary of a cluster assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub bucket_count: usize,
    pub cluster_count: usize,
    pub noise_count: usize,
    /// Population per cluster id, indexed by cluster id.
    pub cluster_sizes: Vec<usize>,
}

impl ClusterSummary {
    pub fn from_assignments(assignments: &[ClusterAssignment]) -> Self {
        let mut buckets: Vec<&str> = assignments.iter().map(|a| a.bucket.as_str()).collect();
        buckets.sort_unstable();
        buckets.dedup();

        let cluster_count = assignments
            .iter()
            .filter(|a| !a.is_noise())
            .map(|a| a.cluster as usize + 1)
            .max()
            .unwrap_or(0);

        let mut cluster_sizes = vec![0; cluster_count];
        for a in assignments.iter().filter(|a| !a.is_noise()) {
            cluster_sizes[a.cluster as usize] += 1;
        }

        Self {
            bucket_count: buckets.len(),
            cluster_count,
            noise_count: assignments.iter().filter(|a| a.is_noise()).count(),
            cluster_sizes,
        }
    }
}
