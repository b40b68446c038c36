//! Brute-force cosine index
//!
//! O(|queries| x |vectors|) exhaustive scan. The vector set is normalized
//! once at build time; queries are normalized per search call, so scores
//! are true cosine similarities regardless of what the caller feeds in.

use crate::error::MatchError;
use crate::index::{top_hits, SearchHit, SimilarityIndex};
use crate::vecmath;

/// Exhaustive cosine-similarity index.
pub struct ExactIndex {
    /// Unit-normalized copies of the build-time vectors.
    vectors: Vec<Vec<f32>>,
}

impl ExactIndex {
    /// Build an index over the given vectors.
    ///
    /// # Errors
    ///
    /// [`MatchError::EmptyIndex`] when `vectors` is empty.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, MatchError> {
        if vectors.is_empty() {
            return Err(MatchError::EmptyIndex);
        }
        Ok(Self {
            vectors: vectors.iter().map(|v| vecmath::normalize(v)).collect(),
        })
    }
}

impl SimilarityIndex for ExactIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn search(&self, queries: &[Vec<f32>], k: usize) -> Vec<Vec<SearchHit>> {
        queries
            .iter()
            .map(|query| {
                let q = vecmath::normalize(query);
                let scored = self
                    .vectors
                    .iter()
                    .enumerate()
                    .map(|(position, row)| SearchHit {
                        score: vecmath::dot(&q, row).clamp(-1.0, 1.0),
                        position,
                    })
                    .collect();
                top_hits(scored, k)
            })
            .collect()
    }
}
