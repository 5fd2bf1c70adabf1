//! The clustering pipeline as a chain of immutable stage outputs.
//!
//! Each stage consumes the previous stage's records and returns a new
//! collection:
//!
//! ```text
//! Flight -> SimplifiedFlight -> TokenizedFlight -> SignedFlight
//!        -> CandidateSet -> ClusterAssignment -> silhouette
//! ```
//!
//! Stages are public functions so they can be run and tested on their own;
//! [`Pipeline`] wires them together with a validated configuration and an
//! injected [`RunLog`].

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::buckets::{self, CandidateSet, ClusterAssignment, ClusterSummary};
use crate::corridors::{Corridor, CorridorDetector, CorridorId, CorridorSet};
use crate::error::{FlowError, Result};
use crate::evaluation::{silhouette, DistanceMatrix, TrajectoryDistance};
use crate::flights::{self, Flight, FlightRecord};
use crate::lsh::{LshIndex, MinHasher, Signature};
use crate::simplify::simplify;
use crate::tokens::tokenize;
use crate::{ClusteringConfig, GpsPoint};

// ============================================================================
// Run log
// ============================================================================

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Assembly,
    Simplification,
    CorridorDetection,
    Tokenization,
    Signatures,
    CandidateSearch,
    Reduction,
    Evaluation,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Assembly => "assembly",
            PipelineStage::Simplification => "simplification",
            PipelineStage::CorridorDetection => "corridor_detection",
            PipelineStage::Tokenization => "tokenization",
            PipelineStage::Signatures => "signatures",
            PipelineStage::CandidateSearch => "candidate_search",
            PipelineStage::Reduction => "reduction",
            PipelineStage::Evaluation => "evaluation",
        }
    }
}

/// Receiver for run lifecycle and stage messages.
///
/// `open` is called before the first stage of a run and `close` after the
/// last one, whether the run succeeded or not.
pub trait RunLog: Send + Sync {
    fn open(&self, run: &str);
    fn stage(&self, stage: PipelineStage, message: &str);
    fn close(&self, run: &str, outcome: &str);
}

/// Forwards everything to the `log` facade.
pub struct FacadeLog;

impl RunLog for FacadeLog {
    fn open(&self, run: &str) {
        info!("[Pipeline] Opening run {run}");
    }

    fn stage(&self, stage: PipelineStage, message: &str) {
        info!("[Pipeline:{}] {message}", stage.as_str());
    }

    fn close(&self, run: &str, outcome: &str) {
        info!("[Pipeline] Closing run {run}: {outcome}");
    }
}

/// Discards everything.
pub struct NoopLog;

impl RunLog for NoopLog {
    fn open(&self, _run: &str) {}
    fn stage(&self, _stage: PipelineStage, _message: &str) {}
    fn close(&self, _run: &str, _outcome: &str) {}
}

/// Keeps every line in memory. Useful for tests and for embedding callers.
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded lines.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(line);
        }
    }
}

impl RunLog for MemoryLog {
    fn open(&self, run: &str) {
        self.push(format!("open {run}"));
    }

    fn stage(&self, stage: PipelineStage, message: &str) {
        self.push(format!("{} {message}", stage.as_str()));
    }

    fn close(&self, run: &str, outcome: &str) {
        self.push(format!("close {run} {outcome}"));
    }
}

// ============================================================================
// Stage records
// ============================================================================

/// A flight with its simplified trajectory and entrance segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedFlight {
    pub flight_id: String,
    pub raw: Vec<GpsPoint>,
    pub trajectory: Vec<GpsPoint>,
    pub entrance: Vec<GpsPoint>,
}

impl AsRef<[GpsPoint]> for SimplifiedFlight {
    fn as_ref(&self) -> &[GpsPoint] {
        &self.trajectory
    }
}

/// Corridor labels and tokens of a flight's entrance segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizedFlight {
    pub flight_id: String,
    pub corridors: Vec<CorridorId>,
    pub tokens: Vec<String>,
}

impl TokenizedFlight {
    /// Tokenized flight from raw token strings, bypassing classification.
    pub fn from_tokens<S: AsRef<str>>(flight_id: &str, tokens: &[S]) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            corridors: Vec::new(),
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }
}

/// A flight's MinHash signature and its record id in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedFlight {
    pub flight_id: String,
    pub record_id: usize,
    pub signature: Signature,
}

/// Outcome of the evaluation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Scored { silhouette: f64 },
    Failed { reason: String },
    Skipped,
}

impl Evaluation {
    pub fn score(&self) -> Option<f64> {
        match self {
            Evaluation::Scored { silhouette } => Some(*silhouette),
            _ => None,
        }
    }
}

/// Everything a run produces, for the renderer and for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub airport: String,
    pub algorithm: String,
    pub corridors: Vec<Corridor>,
    pub flights: Vec<SimplifiedFlight>,
    pub tokens: Vec<TokenizedFlight>,
    pub assignments: Vec<ClusterAssignment>,
    pub summary: ClusterSummary,
    pub evaluation: Evaluation,
}

impl PipelineResult {
    /// Cluster id per flight, in flight order.
    pub fn labels(&self) -> Vec<i32> {
        self.assignments.iter().map(|a| a.cluster).collect()
    }

    pub fn cluster_of(&self, flight_id: &str) -> Option<i32> {
        self.assignments
            .iter()
            .find(|a| a.flight_id == flight_id)
            .map(|a| a.cluster)
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Simplify every flight's trajectory and entrance segment.
pub fn simplify_flights(flights: &[Flight], epsilon: f64) -> Vec<SimplifiedFlight> {
    flights
        .iter()
        .map(|f| SimplifiedFlight {
            flight_id: f.flight_id.clone(),
            raw: f.trajectory.clone(),
            trajectory: simplify(&f.trajectory, epsilon),
            entrance: simplify(&f.entrance, epsilon),
        })
        .collect()
}

/// All simplified entrance points, pooled for corridor detection.
pub fn pool_entrance_points(flights: &[SimplifiedFlight]) -> Vec<GpsPoint> {
    flights
        .iter()
        .flat_map(|f| f.entrance.iter().copied())
        .collect()
}

/// Classify each flight's entrance segment and turn it into tokens.
pub fn tokenize_flights(flights: &[SimplifiedFlight], corridors: &CorridorSet) -> Vec<TokenizedFlight> {
    flights
        .iter()
        .map(|f| {
            let labels = corridors.classify_trajectory(&f.flight_id, &f.entrance);
            TokenizedFlight {
                flight_id: f.flight_id.clone(),
                tokens: tokenize(&labels),
                corridors: labels,
            }
        })
        .collect()
}

/// MinHash every token sequence. Record ids are positions in `flights`.
pub fn sign_flights(flights: &[TokenizedFlight], hasher: &MinHasher) -> Vec<SignedFlight> {
    flights
        .iter()
        .enumerate()
        .map(|(record_id, f)| SignedFlight {
            flight_id: f.flight_id.clone(),
            record_id,
            signature: hasher.signature(&f.tokens),
        })
        .collect()
}

/// Index every signature, then query each one against the full index.
pub fn find_candidates(flights: &[SignedFlight], index: &mut LshIndex) -> Result<Vec<CandidateSet>> {
    for f in flights {
        index.insert(f.record_id, &f.signature)?;
    }

    flights
        .iter()
        .map(|f| {
            Ok(CandidateSet {
                flight_id: f.flight_id.clone(),
                record_id: f.record_id,
                candidates: index.query(&f.signature)?,
            })
        })
        .collect()
}

/// Silhouette of the assignments over the flights' simplified trajectories.
pub fn evaluate<M>(
    flights: &[SimplifiedFlight],
    assignments: &[ClusterAssignment],
    metric: &M,
) -> Result<f64>
where
    M: TrajectoryDistance + ?Sized,
{
    let matrix = DistanceMatrix::build(flights, metric);
    let labels: Vec<i32> = assignments.iter().map(|a| a.cluster).collect();
    silhouette(&matrix, &labels)
}

// ============================================================================
// Pipeline
// ============================================================================

/// A validated pipeline ready to run.
pub struct Pipeline {
    config: ClusteringConfig,
    detector: CorridorDetector,
    hasher: MinHasher,
    /// LSH `(bands, rows)`, chosen once per configuration.
    band_layout: (usize, usize),
    log: Arc<dyn RunLog>,
}

impl Pipeline {
    /// Pipeline logging through the `log` facade.
    pub fn new(config: ClusteringConfig) -> Result<Self> {
        Self::with_log(config, Arc::new(FacadeLog))
    }

    /// Pipeline with an injected run log. All configuration errors surface
    /// here, before any data is touched.
    pub fn with_log(config: ClusteringConfig, log: Arc<dyn RunLog>) -> Result<Self> {
        config.validate()?;
        let detector = CorridorDetector::from_config(&config)?;
        let hasher = MinHasher::new(config.num_perm, config.lsh_seed)?;
        let tuned = LshIndex::new(config.lsh_threshold, config.num_perm)?;
        let band_layout = (tuned.bands(), tuned.rows());

        Ok(Self {
            config,
            detector,
            hasher,
            band_layout,
            log,
        })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn detector(&self) -> &CorridorDetector {
        &self.detector
    }

    /// LSH `(bands, rows)` used by every run of this pipeline.
    pub fn band_layout(&self) -> (usize, usize) {
        self.band_layout
    }

    /// Assemble flights from per-point records, then run.
    pub fn run_records(&self, records: &[FlightRecord]) -> Result<PipelineResult> {
        let run = format!("{}:{}records", self.config.airport, records.len());
        self.log.open(&run);

        let result = flights::assemble(
            records,
            self.config.trajectory_window,
            self.config.entrance_window,
            self.config.max_flights,
        )
        .and_then(|flights| {
            self.log.stage(
                PipelineStage::Assembly,
                &format!("{} flights from {} records", flights.len(), records.len()),
            );
            self.run_stages(&flights)
        });

        self.log.close(&run, &outcome(&result));
        result
    }

    /// Run every stage over already assembled flights.
    pub fn run(&self, flights: &[Flight]) -> Result<PipelineResult> {
        let run = format!("{}:{}flights", self.config.airport, flights.len());
        self.log.open(&run);
        let result = self.run_stages(flights);
        self.log.close(&run, &outcome(&result));
        result
    }

    fn run_stages(&self, flights: &[Flight]) -> Result<PipelineResult> {
        if flights.is_empty() {
            return Err(FlowError::empty_input("pipeline"));
        }
        let flights = &flights[..flights.len().min(self.config.max_flights)];

        let simplified = simplify_flights(flights, self.config.simplification_tolerance);
        let raw_points: usize = simplified.iter().map(|f| f.raw.len()).sum();
        let kept_points: usize = simplified.iter().map(|f| f.trajectory.len()).sum();
        self.log.stage(
            PipelineStage::Simplification,
            &format!("{raw_points} -> {kept_points} trajectory points"),
        );

        let pool = pool_entrance_points(&simplified);
        let corridors = self.detector.detect(&pool)?;
        self.log.stage(
            PipelineStage::CorridorDetection,
            &format!(
                "{} corridors from {} entrance points ({})",
                corridors.len(),
                pool.len(),
                self.detector.name()
            ),
        );

        let tokenized = tokenize_flights(&simplified, &corridors);
        let unclassified = tokenized
            .iter()
            .filter(|t| t.corridors.iter().all(|&c| c < 0))
            .count();
        if unclassified > 0 {
            warn!("[Pipeline] {unclassified} flights have no classified entrance point");
        }
        self.log.stage(
            PipelineStage::Tokenization,
            &format!("{} token sequences, {unclassified} unclassified", tokenized.len()),
        );

        let signed = sign_flights(&tokenized, &self.hasher);
        self.log.stage(
            PipelineStage::Signatures,
            &format!("{} signatures of length {}", signed.len(), self.hasher.num_perm()),
        );

        let (bands, rows) = self.band_layout;
        let mut index = LshIndex::with_bands(bands, rows, self.config.num_perm)?;
        let candidates = find_candidates(&signed, &mut index)?;
        self.log.stage(
            PipelineStage::CandidateSearch,
            &format!(
                "{} records indexed in {} bands x {} rows",
                index.len(),
                index.bands(),
                index.rows()
            ),
        );

        let assignments = buckets::reduce(
            &candidates,
            self.config.reduction,
            self.config.min_bucket_population,
        );
        let summary = ClusterSummary::from_assignments(&assignments);
        self.log.stage(
            PipelineStage::Reduction,
            &format!(
                "{} buckets, {} clusters, {} noise",
                summary.bucket_count, summary.cluster_count, summary.noise_count
            ),
        );

        let evaluation = if self.config.evaluate {
            match evaluate(&simplified, &assignments, &self.config.metric) {
                Ok(score) => Evaluation::Scored { silhouette: score },
                Err(err) => {
                    warn!("[Pipeline] Evaluation failed: {err}");
                    Evaluation::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        } else {
            debug!("[Pipeline] Evaluation disabled");
            Evaluation::Skipped
        };
        self.log.stage(PipelineStage::Evaluation, &format!("{evaluation:?}"));

        Ok(PipelineResult {
            airport: self.config.airport.clone(),
            algorithm: self.detector.name().to_string(),
            corridors: corridors.corridors().to_vec(),
            flights: simplified,
            tokens: tokenized,
            assignments,
            summary,
            evaluation,
        })
    }
}

fn outcome(result: &Result<PipelineResult>) -> String {
    match result {
        Ok(r) => format!(
            "ok ({} clusters, {} noise)",
            r.summary.cluster_count, r.summary.noise_count
        ),
        Err(err) => format!("failed: {err}"),
    }
}
