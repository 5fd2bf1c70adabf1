//! MinHash signatures and a banded LSH index for approximate Jaccard search.
//!
//! A signature holds, for each of `num_perm` universal-hash permutations,
//! the minimum permuted hash over a token set. The probability that two
//! signatures agree at a position equals the Jaccard similarity of the sets.
//!
//! The index splits signatures into `b` bands of `r` rows. Two records
//! become candidates when any band matches exactly, which happens with
//! probability `1 - (1 - s^r)^b` for Jaccard similarity `s`. The `(b, r)`
//! pair is chosen to balance the false-positive area below the threshold
//! against the false-negative area above it.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FlowError, Result};

/// Modulus of the permutation family, 2^61 - 1.
pub const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// Permuted hashes are truncated to 32 bits.
pub const MAX_HASH: u64 = (1 << 32) - 1;

/// Weight of the false-positive area when choosing bands and rows.
const FALSE_POSITIVE_WEIGHT: f64 = 0.5;
/// Weight of the false-negative area when choosing bands and rows.
const FALSE_NEGATIVE_WEIGHT: f64 = 0.5;
/// Simpson intervals for the error integrals (must be even).
const INTEGRATION_STEPS: usize = 200;

/// Fixed-length MinHash signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(Vec<u32>);

impl Signature {
    pub fn values(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fraction of agreeing positions, an estimate of Jaccard similarity.
    pub fn estimate_jaccard(&self, other: &Signature) -> f64 {
        if self.0.is_empty() || self.0.len() != other.0.len() {
            return 0.0;
        }
        let equal = self.0.iter().zip(&other.0).filter(|(a, b)| a == b).count();
        equal as f64 / self.0.len() as f64
    }
}

/// 32-bit token hash: the first four bytes of the token's SHA-256 digest.
pub fn token_hash(token: &str) -> u32 {
    let digest = Sha256::digest(token.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// A seeded family of `num_perm` hash permutations.
#[derive(Debug, Clone)]
pub struct MinHasher {
    permutations: Vec<(u64, u64)>,
}

impl MinHasher {
    /// Draw `num_perm` permutations `h -> (a*h + b) mod p` from `seed`.
    pub fn new(num_perm: usize, seed: u64) -> Result<Self> {
        if num_perm == 0 {
            return Err(FlowError::invalid_parameter(
                "num_perm",
                "at least one permutation is required",
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let permutations = (0..num_perm)
            .map(|_| {
                (
                    rng.gen_range(1..MERSENNE_PRIME),
                    rng.gen_range(0..MERSENNE_PRIME),
                )
            })
            .collect();
        Ok(Self { permutations })
    }

    pub fn num_perm(&self) -> usize {
        self.permutations.len()
    }

    /// Signature of a token collection. Duplicates and order do not matter;
    /// the empty collection yields all `u32::MAX`.
    pub fn signature<S: AsRef<str>>(&self, tokens: &[S]) -> Signature {
        let hashes: BTreeSet<u32> = tokens.iter().map(|t| token_hash(t.as_ref())).collect();

        let values = self
            .permutations
            .iter()
            .map(|&(a, b)| {
                hashes
                    .iter()
                    .map(|&h| permute(h, a, b))
                    .min()
                    .unwrap_or(u32::MAX)
            })
            .collect();

        Signature(values)
    }
}

fn permute(hash: u32, a: u64, b: u64) -> u32 {
    let value = (a as u128 * hash as u128 + b as u128) % MERSENNE_PRIME as u128;
    (value as u64 & MAX_HASH) as u32
}

/// Composite Simpson integration of `f` over `[lo, hi]`.
fn integrate<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return 0.0;
    }
    let h = (hi - lo) / INTEGRATION_STEPS as f64;
    let mut sum = f(lo) + f(hi);
    for i in 1..INTEGRATION_STEPS {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(lo + i as f64 * h);
    }
    sum * h / 3.0
}

/// Probability mass of dissimilar pairs (below `threshold`) becoming candidates.
pub fn false_positive_area(threshold: f64, bands: usize, rows: usize) -> f64 {
    integrate(
        |s| 1.0 - (1.0 - s.powi(rows as i32)).powi(bands as i32),
        0.0,
        threshold,
    )
}

/// Probability mass of similar pairs (above `threshold`) being missed.
pub fn false_negative_area(threshold: f64, bands: usize, rows: usize) -> f64 {
    integrate(
        |s| (1.0 - s.powi(rows as i32)).powi(bands as i32),
        threshold,
        1.0,
    )
}

/// Bands and rows (`b * r <= num_perm`) minimising the weighted error.
pub fn optimal_bands(threshold: f64, num_perm: usize) -> (usize, usize) {
    let mut best = (1, num_perm.max(1));
    let mut best_error = f64::INFINITY;
    for bands in 1..=num_perm {
        for rows in 1..=(num_perm / bands) {
            let error = FALSE_POSITIVE_WEIGHT * false_positive_area(threshold, bands, rows)
                + FALSE_NEGATIVE_WEIGHT * false_negative_area(threshold, bands, rows);
            if error < best_error {
                best_error = error;
                best = (bands, rows);
            }
        }
    }
    best
}

/// Banded LSH index over MinHash signatures.
#[derive(Debug, Clone)]
pub struct LshIndex {
    num_perm: usize,
    bands: usize,
    rows: usize,
    tables: Vec<HashMap<Vec<u32>, Vec<usize>>>,
    signatures: HashMap<usize, Signature>,
}

impl LshIndex {
    /// Index tuned for Jaccard `threshold` with signatures of length `num_perm`.
    pub fn new(threshold: f64, num_perm: usize) -> Result<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(FlowError::invalid_parameter(
                "lsh_threshold",
                format!("must lie strictly between 0 and 1, got {threshold}"),
            ));
        }
        if num_perm == 0 {
            return Err(FlowError::invalid_parameter(
                "num_perm",
                "at least one permutation is required",
            ));
        }
        let (bands, rows) = optimal_bands(threshold, num_perm);
        debug!("[LSH] threshold {threshold} over {num_perm} permutations -> {bands} bands x {rows} rows");
        Self::with_bands(bands, rows, num_perm)
    }

    /// Index with an explicit band layout.
    pub fn with_bands(bands: usize, rows: usize, num_perm: usize) -> Result<Self> {
        if bands == 0 || rows == 0 || bands * rows > num_perm {
            return Err(FlowError::invalid_parameter(
                "bands",
                format!("{bands} bands x {rows} rows does not fit {num_perm} permutations"),
            ));
        }
        Ok(Self {
            num_perm,
            bands,
            rows,
            tables: vec![HashMap::new(); bands],
            signatures: HashMap::new(),
        })
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn contains(&self, record_id: usize) -> bool {
        self.signatures.contains_key(&record_id)
    }

    fn check_length(&self, signature: &Signature) -> Result<()> {
        if signature.len() != self.num_perm {
            return Err(FlowError::invalid_parameter(
                "signature",
                format!(
                    "length {} does not match num_perm {}",
                    signature.len(),
                    self.num_perm
                ),
            ));
        }
        Ok(())
    }

    fn band_keys<'a>(&'a self, signature: &'a Signature) -> impl Iterator<Item = &'a [u32]> + 'a {
        signature
            .values()
            .chunks_exact(self.rows)
            .take(self.bands)
    }

    /// Register a record under each of its band keys.
    pub fn insert(&mut self, record_id: usize, signature: &Signature) -> Result<()> {
        self.check_length(signature)?;
        if self.contains(record_id) {
            return Err(FlowError::DuplicateRecord(record_id));
        }

        let keys: Vec<Vec<u32>> = self.band_keys(signature).map(|k| k.to_vec()).collect();
        for (table, key) in self.tables.iter_mut().zip(keys) {
            table.entry(key).or_default().push(record_id);
        }
        self.signatures.insert(record_id, signature.clone());
        Ok(())
    }

    /// Every indexed record sharing at least one band with `signature`,
    /// sorted ascending.
    pub fn query(&self, signature: &Signature) -> Result<Vec<usize>> {
        self.check_length(signature)?;

        let mut found = BTreeSet::new();
        for (table, key) in self.tables.iter().zip(self.band_keys(signature)) {
            if let Some(ids) = table.get(key) {
                found.extend(ids.iter().copied());
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Candidates for an already indexed record, including the record itself.
    pub fn query_record(&self, record_id: usize) -> Result<Vec<usize>> {
        let signature = self
            .signatures
            .get(&record_id)
            .ok_or(FlowError::UnknownRecord(record_id))?;
        self.query(signature)
    }
}
