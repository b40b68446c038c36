//! Run orchestration
//!
//! Composes grouping, filtering, per-candidate index building and scoring,
//! threshold/rank/truncate, and persistence of the audit record. A run
//! moves through Initialized -> CandidatesLoaded -> Scored -> Thresholded ->
//! Persisted -> Done; any unrecoverable input error fails the whole run
//! before anything is persisted.
//!
//! The scoring step is embarrassingly parallel across candidates (each
//! candidate's scoring is read-only with respect to the reader corpus), so
//! candidates are sharded across rayon workers and merged before ranking.
//! The only suspension points are the two load calls and the persistence
//! pair at the end; the scoring loop itself is synchronous.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shared_types::{
    CorpusId, DocumentId, EmbeddingKind, NewRecommendation, NewRecommendationRun, RunId,
    ThresholdLabel,
};
use tracing::{debug, info};

use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::filter::{CandidateFilter, TimeWindow};
use crate::grouper::{EmbeddingGrouper, GroupedDocument};
use crate::index::{build_index, IndexBackend};
use crate::scorer::{MatchScorer, NO_MATCH_SCORE};
use crate::store::{EmbeddingStore, RunStore};
use crate::vecmath;

/// Similarity cut-off for one run: a named table entry or an explicit value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Low,
    Medium,
    High,
    Value(f32),
}

impl Threshold {
    fn resolve(self, config: &MatchConfig) -> (ThresholdLabel, f32) {
        match self {
            Threshold::Low => (ThresholdLabel::Low, config.thresholds.low),
            Threshold::Medium => (ThresholdLabel::Medium, config.thresholds.medium),
            Threshold::High => (ThresholdLabel::High, config.thresholds.high),
            Threshold::Value(v) => (ThresholdLabel::Custom, v),
        }
    }
}

/// Parameters for one matching run.
#[derive(Debug, Clone)]
pub struct MatchParams {
    pub reader_id: i64,
    pub reader_corpus_id: CorpusId,
    pub candidate_corpus_id: CorpusId,
    pub threshold: Threshold,
    /// Submission-time window, already normalized to absolute UTC instants.
    pub window: Option<TimeWindow>,
    /// Topical category filter; `None` or an empty set means no restriction.
    pub categories: Option<BTreeSet<String>>,
    /// Truncate the ranked list to this many rows. Default: no truncation.
    pub top_k: Option<usize>,
    /// Index backend override. Default: exact below the configured
    /// candidate-pool cutoff, approximate above it.
    pub backend: Option<IndexBackend>,
    /// Restrict matching to one embedding kind (e.g. abstract-only runs).
    pub kind: Option<EmbeddingKind>,
}

impl MatchParams {
    pub fn new(reader_id: i64, reader_corpus_id: CorpusId, candidate_corpus_id: CorpusId) -> Self {
        Self {
            reader_id,
            reader_corpus_id,
            candidate_corpus_id,
            threshold: Threshold::Medium,
            window: None,
            categories: None,
            top_k: None,
            backend: None,
            kind: None,
        }
    }
}

/// One ranked match as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub document_id: DocumentId,
    pub score: f32,
    pub rank: u32,
}

/// Outcome of a successful run.
///
/// An empty `recommendations` list with a persisted run is a successful
/// "nothing matched", distinct from a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub recommendations: Vec<RankedMatch>,
}

/// The recommendation matching engine.
pub struct RecommendationEngine {
    embeddings: Arc<dyn EmbeddingStore>,
    runs: Arc<dyn RunStore>,
    config: MatchConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl RecommendationEngine {
    pub fn new(
        embeddings: Arc<dyn EmbeddingStore>,
        runs: Arc<dyn RunStore>,
        config: MatchConfig,
    ) -> Self {
        Self {
            embeddings,
            runs,
            config,
            cancel: None,
        }
    }

    /// Attach a cooperative cancellation flag, checked once per candidate.
    /// A cancelled run aborts with [`MatchError::Cancelled`] before any
    /// persistence.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Execute one complete matching pass and persist its audit record.
    pub async fn run_match(&self, params: MatchParams) -> Result<RunResult, MatchError> {
        let (threshold_label, threshold_value) = params.threshold.resolve(&self.config);
        info!(
            reader_corpus = params.reader_corpus_id,
            candidate_corpus = params.candidate_corpus_id,
            %threshold_label,
            threshold_value,
            "starting matching run"
        );

        // Initialized -> CandidatesLoaded
        let reader_records = self
            .embeddings
            .load_embeddings(params.reader_corpus_id, params.kind)
            .await
            .map_err(MatchError::Load)?;
        if reader_records.is_empty() {
            return Err(MatchError::NoReaderEmbeddings(params.reader_corpus_id));
        }

        let candidate_records = self
            .embeddings
            .load_embeddings(params.candidate_corpus_id, params.kind)
            .await
            .map_err(MatchError::Load)?;

        // Candidate vectors are normalized inside index building; reader
        // vectors are normalized here. Sources are expected to ship unit
        // vectors already, but the approximate backend returns raw dot
        // products for whatever queries it is handed, so trust nothing.
        let mut readers = EmbeddingGrouper::group(reader_records);
        for reader in readers.values_mut() {
            for vector in &mut reader.vectors {
                *vector = vecmath::normalize(vector);
            }
        }
        let candidates = EmbeddingGrouper::group(candidate_records);
        let candidate_ids: BTreeSet<DocumentId> = candidates.keys().copied().collect();

        let has_category_filter = params
            .categories
            .as_ref()
            .is_some_and(|c| !c.is_empty());
        let filtered = if params.window.is_some() || has_category_filter {
            let metadata = self
                .embeddings
                .load_document_metadata(params.candidate_corpus_id)
                .await
                .map_err(MatchError::Load)?;
            CandidateFilter::filter(
                &candidate_ids,
                &metadata,
                params.window.as_ref(),
                params.categories.as_ref(),
            )
        } else {
            candidate_ids
        };

        // Captured before scoring so a zero-survivor run still records how
        // many candidates were eligible.
        let total_candidates_considered = filtered.len() as u64;
        info!(
            reader_documents = readers.len(),
            candidates_considered = total_candidates_considered,
            "candidates loaded"
        );

        // CandidatesLoaded -> Scored
        let backend = params.backend.unwrap_or_else(|| {
            if filtered.len() > self.config.approximate_cutoff {
                IndexBackend::Approximate
            } else {
                IndexBackend::Exact
            }
        });

        let reader_docs: Vec<&GroupedDocument> = readers.values().collect();
        let pool: Vec<&GroupedDocument> = filtered
            .iter()
            .filter_map(|id| candidates.get(id))
            .collect();

        let scored: Vec<Option<(DocumentId, f32)>> = pool
            .par_iter()
            .map(|candidate| {
                if self.is_cancelled() {
                    return None;
                }
                // One bad candidate must not sink the pass: an index-build
                // failure scores the candidate out instead of aborting.
                let score = match build_index(backend, &candidate.vectors) {
                    Ok(index) => reader_docs
                        .iter()
                        .map(|reader| MatchScorer::score(reader, index.as_ref()))
                        .fold(NO_MATCH_SCORE, f32::max),
                    Err(_) => NO_MATCH_SCORE,
                };
                Some((candidate.document_id, score))
            })
            .collect();

        if self.is_cancelled() {
            return Err(MatchError::Cancelled);
        }
        let scored: Vec<(DocumentId, f32)> = scored.into_iter().flatten().collect();
        log_score_distribution(&scored);

        // Scored -> Thresholded
        let mut survivors: Vec<(DocumentId, f32)> = scored
            .into_iter()
            .filter(|(_, score)| *score >= threshold_value)
            .collect();
        survivors.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        if let Some(top_k) = params.top_k {
            survivors.truncate(top_k);
        }
        info!(survivors = survivors.len(), %backend, "thresholding complete");

        // Thresholded -> Persisted
        let scope = match params.kind {
            None => "all".to_string(),
            Some(kind) => kind.to_string(),
        };
        let run = NewRecommendationRun {
            reader_id: params.reader_id,
            reader_corpus_id: params.reader_corpus_id,
            candidate_corpus_id: params.candidate_corpus_id,
            threshold_label,
            threshold_value,
            aggregation_method: format!("{}_max_{}", backend, scope),
            total_candidates_considered,
        };
        let run_id = self
            .runs
            .create_run(run)
            .await
            .map_err(MatchError::Persistence)?;

        let recommendations: Vec<NewRecommendation> = survivors
            .iter()
            .enumerate()
            .map(|(i, (document_id, score))| NewRecommendation {
                document_id: *document_id,
                score: *score,
                rank: (i + 1) as u32,
            })
            .collect();
        self.runs
            .create_recommendations(run_id, &recommendations)
            .await
            .map_err(MatchError::Persistence)?;

        // Persisted -> Done
        info!(run_id, stored = recommendations.len(), "matching run persisted");
        Ok(RunResult {
            run_id,
            recommendations: recommendations
                .into_iter()
                .map(|rec| RankedMatch {
                    document_id: rec.document_id,
                    score: rec.score,
                    rank: rec.rank,
                })
                .collect(),
        })
    }
}

fn log_score_distribution(scored: &[(DocumentId, f32)]) {
    if scored.is_empty() {
        debug!("no candidates scored");
        return;
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    for (_, score) in scored {
        min = min.min(*score);
        max = max.max(*score);
        sum += f64::from(*score);
    }
    debug!(
        candidates = scored.len(),
        max_score = max,
        min_score = min,
        mean_score = sum / scored.len() as f64,
        "score distribution"
    );
}
