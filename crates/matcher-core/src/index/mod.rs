//! Similarity indexes over one candidate document's chunk vectors
//!
//! The original pipeline built a fresh brute-force inner-product index per
//! candidate inside the scoring loop. That is re-architected here as an
//! explicit [`SimilarityIndex`] trait with two interchangeable backends:
//!
//! - [`ExactIndex`]: exhaustive cosine scan, deterministic, used when the
//!   candidate pool is small or bit-exact reproducibility matters.
//! - [`ApproximateIndex`]: inner-product index normalized on build, with
//!   centroid-pruned scanning above a flat-scan cutoff.
//!
//! Both return per-query top-k hits sorted descending by score, ties broken
//! by lowest position in the build-time vector list.

pub mod approximate;
pub mod exact;

pub use approximate::ApproximateIndex;
pub use exact::ExactIndex;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MatchError;

/// One scored hit against an index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Similarity score. Cosine for the exact backend; inner product for
    /// the approximate backend (identical when inputs are unit vectors).
    pub score: f32,
    /// Position of the matched vector in the build-time list.
    pub position: usize,
}

/// A pre-built similarity index over one vector set.
pub trait SimilarityIndex: Send + Sync {
    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-k hits for every query, each list sorted descending by score
    /// with ties broken by lowest position.
    fn search(&self, queries: &[Vec<f32>], k: usize) -> Vec<Vec<SearchHit>>;
}

/// Which index implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    Exact,
    Approximate,
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexBackend::Exact => write!(f, "exact"),
            IndexBackend::Approximate => write!(f, "approximate"),
        }
    }
}

/// Build an index with the chosen backend.
///
/// Fails with [`MatchError::EmptyIndex`] when `vectors` is empty; callers
/// must treat zero-chunk documents as "no match possible" instead.
pub fn build_index(
    backend: IndexBackend,
    vectors: &[Vec<f32>],
) -> Result<Box<dyn SimilarityIndex>, MatchError> {
    match backend {
        IndexBackend::Exact => Ok(Box::new(ExactIndex::build(vectors)?)),
        IndexBackend::Approximate => Ok(Box::new(ApproximateIndex::build(vectors)?)),
    }
}

/// Sort scored positions into a top-k hit list: descending score, ties by
/// lowest position.
pub(crate) fn top_hits(mut scored: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.position.cmp(&b.position))
    });
    scored.truncate(k);
    scored
}
