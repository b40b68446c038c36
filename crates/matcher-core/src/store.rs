//! Store abstractions over the external embedding/metadata/run store
//!
//! The engine never talks to a database directly; it consumes these two
//! narrow traits. The surrounding system implements them against its
//! relational store, and the run-persistence pair (`create_run` +
//! `create_recommendations`) is expected to run inside one transaction so
//! a crash mid-write leaves no orphaned run without rows.
//!
//! [`MemoryStore`] is the in-memory implementation used by tests and local
//! development.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared_types::{
    CorpusId, DocumentId, DocumentMetadata, EmbeddingKind, EmbeddingRecord, NewRecommendation,
    NewRecommendationRun, Recommendation, RecommendationRun, RunId,
};

/// Read access to embeddings and document metadata.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Load all embedding records for a corpus, optionally restricted to
    /// one embedding kind.
    async fn load_embeddings(
        &self,
        corpus_id: CorpusId,
        kind: Option<EmbeddingKind>,
    ) -> Result<Vec<EmbeddingRecord>>;

    /// Load the metadata map for every document in a corpus.
    async fn load_document_metadata(
        &self,
        corpus_id: CorpusId,
    ) -> Result<HashMap<DocumentId, DocumentMetadata>>;
}

/// Write access for recommendation runs and their rows, plus read-back.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a new run row; the store assigns id and created_at.
    async fn create_run(&self, run: NewRecommendationRun) -> Result<RunId>;

    /// Bulk-create the recommendations belonging to a run.
    async fn create_recommendations(
        &self,
        run_id: RunId,
        recommendations: &[NewRecommendation],
    ) -> Result<()>;

    /// Fetch a run by id.
    async fn get_run(&self, run_id: RunId) -> Result<Option<RecommendationRun>>;

    /// Fetch a run's recommendations ordered by ascending rank.
    async fn recommendations_for_run(&self, run_id: RunId) -> Result<Vec<Recommendation>>;
}

#[derive(Default)]
struct MemoryInner {
    embeddings: HashMap<CorpusId, Vec<EmbeddingRecord>>,
    metadata: HashMap<CorpusId, HashMap<DocumentId, DocumentMetadata>>,
    runs: HashMap<RunId, RecommendationRun>,
    recommendations: Vec<Recommendation>,
    next_run_id: RunId,
    next_recommendation_id: i64,
}

/// In-memory store for tests and local development.
///
/// All mutations are guarded by one lock, so the run + recommendations pair
/// is trivially atomic with respect to readers.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a corpus with embedding records.
    pub fn insert_embeddings(&self, corpus_id: CorpusId, records: Vec<EmbeddingRecord>) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.embeddings.entry(corpus_id).or_default().extend(records);
    }

    /// Seed a corpus with document metadata.
    pub fn insert_metadata(&self, corpus_id: CorpusId, metadata: Vec<DocumentMetadata>) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let map = inner.metadata.entry(corpus_id).or_default();
        for meta in metadata {
            map.insert(meta.document_id, meta);
        }
    }
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    async fn load_embeddings(
        &self,
        corpus_id: CorpusId,
        kind: Option<EmbeddingKind>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let records = inner
            .embeddings
            .get(&corpus_id)
            .cloned()
            .unwrap_or_default();
        Ok(match kind {
            Some(kind) => records.into_iter().filter(|r| r.kind == kind).collect(),
            None => records,
        })
    }

    async fn load_document_metadata(
        &self,
        corpus_id: CorpusId,
    ) -> Result<HashMap<DocumentId, DocumentMetadata>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.metadata.get(&corpus_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(&self, run: NewRecommendationRun) -> Result<RunId> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.next_run_id += 1;
        let id = inner.next_run_id;
        inner.runs.insert(
            id,
            RecommendationRun {
                id,
                reader_id: run.reader_id,
                reader_corpus_id: run.reader_corpus_id,
                candidate_corpus_id: run.candidate_corpus_id,
                threshold_label: run.threshold_label,
                threshold_value: run.threshold_value,
                aggregation_method: run.aggregation_method,
                total_candidates_considered: run.total_candidates_considered,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn create_recommendations(
        &self,
        run_id: RunId,
        recommendations: &[NewRecommendation],
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        if !inner.runs.contains_key(&run_id) {
            return Err(anyhow!("recommendation run {} does not exist", run_id));
        }
        let created_at = Utc::now();
        for rec in recommendations {
            inner.next_recommendation_id += 1;
            let id = inner.next_recommendation_id;
            inner.recommendations.push(Recommendation {
                id,
                run_id,
                document_id: rec.document_id,
                score: rec.score,
                rank: rec.rank,
                created_at,
            });
        }
        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<RecommendationRun>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.runs.get(&run_id).cloned())
    }

    async fn recommendations_for_run(&self, run_id: RunId) -> Result<Vec<Recommendation>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut rows: Vec<Recommendation> = inner
            .recommendations
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.rank);
        Ok(rows)
    }
}
