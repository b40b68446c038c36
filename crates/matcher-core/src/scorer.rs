//! Document-to-document scoring
//!
//! Max-pooling over all (reader-chunk, candidate-chunk) pairs: a single
//! strongly-overlapping section drives a match even when the rest of the
//! two documents differ, mirroring partial-relevance judgments a human
//! would make. Whether a more conservative aggregation (top-k average)
//! should replace this is an open product question; the run's
//! `aggregation_method` column records the policy used.

use crate::grouper::GroupedDocument;
use crate::index::SimilarityIndex;

/// Sentinel score for "no match possible" (candidate with zero vectors).
/// Guaranteed below any realistic threshold.
pub const NO_MATCH_SCORE: f32 = -1.0;

/// Computes one scalar relevance score between a reader document and a
/// candidate document's pre-built index.
pub struct MatchScorer;

impl MatchScorer {
    /// Max of top-1 scores across every reader vector: "does any part of
    /// the reader's document resemble any part of the candidate?"
    ///
    /// An empty index or a reader document with zero vectors scores
    /// [`NO_MATCH_SCORE`] rather than erroring, so the orchestrator can
    /// skip such candidates uniformly.
    pub fn score(reader: &GroupedDocument, candidate_index: &dyn SimilarityIndex) -> f32 {
        if candidate_index.is_empty() || reader.vectors.is_empty() {
            return NO_MATCH_SCORE;
        }

        candidate_index
            .search(&reader.vectors, 1)
            .iter()
            .filter_map(|hits| hits.first())
            .map(|hit| hit.score)
            .fold(NO_MATCH_SCORE, f32::max)
    }
}
