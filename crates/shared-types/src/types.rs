use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serial identifier of a document in the external store.
pub type DocumentId = i64;

/// Serial identifier of a corpus (a named collection of documents).
pub type CorpusId = i64;

/// Serial identifier of a recommendation run.
pub type RunId = i64;

/// Which part of a document an embedding was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    /// Whole-document embedding of the title + abstract.
    Abstract,
    /// Embedding of a single content section.
    Section,
}

impl fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingKind::Abstract => write!(f, "abstract"),
            EmbeddingKind::Section => write!(f, "section"),
        }
    }
}

/// One chunk embedding as stored by the ingestion pipeline.
///
/// `chunk_id` is `None` for whole-document (abstract) embeddings. Vectors
/// are expected to be unit-normalized by the embedding provider, but the
/// matching engine re-normalizes defensively rather than trust the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub document_id: DocumentId,
    pub chunk_id: Option<i64>,
    pub vector: Vec<f32>,
    pub kind: EmbeddingKind,
}

/// Read-only document metadata owned by the external store.
///
/// `categories` is always present; an empty set means the ingestion side
/// recorded no topical tags for the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: DocumentId,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
}

/// Named similarity cut-off, as exposed to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLabel {
    Low,
    Medium,
    High,
    /// Caller supplied an explicit threshold value instead of a label.
    Custom,
}

impl fmt::Display for ThresholdLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdLabel::Low => write!(f, "low"),
            ThresholdLabel::Medium => write!(f, "medium"),
            ThresholdLabel::High => write!(f, "high"),
            ThresholdLabel::Custom => write!(f, "custom"),
        }
    }
}

/// Fields the engine supplies when opening a new recommendation run.
///
/// The store assigns `id` and `created_at` on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecommendationRun {
    pub reader_id: i64,
    pub reader_corpus_id: CorpusId,
    pub candidate_corpus_id: CorpusId,
    pub threshold_label: ThresholdLabel,
    pub threshold_value: f32,
    pub aggregation_method: String,
    pub total_candidates_considered: u64,
}

/// The audit record of one complete matching pass.
///
/// Immutable after creation; a re-run produces a fresh row rather than
/// overwriting. `total_candidates_considered` is captured before scoring so
/// a run with zero survivors still records how many candidates were
/// eligible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRun {
    pub id: RunId,
    pub reader_id: i64,
    pub reader_corpus_id: CorpusId,
    pub candidate_corpus_id: CorpusId,
    pub threshold_label: ThresholdLabel,
    pub threshold_value: f32,
    pub aggregation_method: String,
    pub total_candidates_considered: u64,
    pub created_at: DateTime<Utc>,
}

/// Fields the engine supplies for one recommendation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecommendation {
    pub document_id: DocumentId,
    /// Cosine score in [-1, 1].
    pub score: f32,
    /// 1-based position within the run, contiguous after truncation.
    pub rank: u32,
}

/// One persisted recommendation, owned by its run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub run_id: RunId,
    pub document_id: DocumentId,
    pub score: f32,
    pub rank: u32,
    pub created_at: DateTime<Utc>,
}
