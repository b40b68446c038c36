//! End-to-end matching scenarios against the in-memory store

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use matcher_core::{
    IndexBackend, MatchConfig, MatchError, MatchParams, MemoryStore, RecommendationEngine,
    RunStore, Threshold, TimeWindow,
};
use pretty_assertions::assert_eq;
use shared_types::{DocumentId, DocumentMetadata, EmbeddingKind, EmbeddingRecord, ThresholdLabel};

const READER_CORPUS: i64 = 10;
const CANDIDATE_CORPUS: i64 = 20;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn engine(store: &Arc<MemoryStore>) -> RecommendationEngine {
    RecommendationEngine::new(store.clone(), store.clone(), MatchConfig::default())
}

fn section(document_id: DocumentId, chunk_id: i64, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        document_id,
        chunk_id: Some(chunk_id),
        vector,
        kind: EmbeddingKind::Section,
    }
}

fn abstract_record(document_id: DocumentId, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        document_id,
        chunk_id: None,
        vector,
        kind: EmbeddingKind::Abstract,
    }
}

fn metadata(
    document_id: DocumentId,
    submitted_at: Option<DateTime<Utc>>,
    categories: &[&str],
) -> DocumentMetadata {
    DocumentMetadata {
        document_id,
        submitted_at,
        categories: categories.iter().map(|c| c.to_string()).collect(),
    }
}

fn instant(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

/// Scenario A: one aligned candidate above threshold, one orthogonal below.
#[tokio::test]
async fn scenario_a_single_match_above_threshold() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(100, 1, vec![1.0, 0.0]),
            section(200, 1, vec![0.0, 1.0]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(0.9);
    let result = engine(&store).run_match(params).await.unwrap();

    assert_eq!(result.recommendations.len(), 1);
    let top = &result.recommendations[0];
    assert_eq!(top.document_id, 100);
    assert_eq!(top.rank, 1);
    assert!((top.score - 1.0).abs() < 1e-6);
}

/// Scenario B: an impossible threshold leaves zero recommendations but the
/// run still records how many candidates were eligible.
#[tokio::test]
async fn scenario_b_impossible_threshold_still_counts_candidates() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(100, 1, vec![1.0, 0.0]),
            section(200, 1, vec![0.0, 1.0]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(1.1);
    let result = engine(&store).run_match(params).await.unwrap();

    assert!(result.recommendations.is_empty());
    let run = store.get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(run.total_candidates_considered, 2);
    assert_eq!(run.threshold_label, ThresholdLabel::Custom);
}

/// Scenario C: a candidate document with zero embeddings never appears and
/// never sinks the run.
#[tokio::test]
async fn scenario_c_candidate_without_embeddings_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    // Document 300 exists only in metadata; it has no embeddings at all.
    store.insert_embeddings(CANDIDATE_CORPUS, vec![section(100, 1, vec![1.0, 0.0])]);
    store.insert_metadata(
        CANDIDATE_CORPUS,
        vec![
            metadata(100, Some(instant(1, 12)), &[]),
            metadata(300, Some(instant(1, 12)), &[]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(0.5);
    params.window = Some(TimeWindow::new(instant(1, 0), instant(2, 0)).unwrap());
    let result = engine(&store).run_match(params).await.unwrap();

    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(result.recommendations[0].document_id, 100);
    let run = store.get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(run.total_candidates_considered, 1);
}

/// Scenario D: tied scores rank by ascending document id.
#[tokio::test]
async fn scenario_d_ties_rank_by_ascending_document_id() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    // Both candidates carry the same vector, so they tie exactly.
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(7, 1, vec![1.0, 1.0]),
            section(3, 1, vec![1.0, 1.0]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(0.5);
    let result = engine(&store).run_match(params).await.unwrap();

    let order: Vec<DocumentId> = result
        .recommendations
        .iter()
        .map(|r| r.document_id)
        .collect();
    assert_eq!(order, vec![3, 7]);
    assert_eq!(result.recommendations[0].rank, 1);
    assert_eq!(result.recommendations[1].rank, 2);
}

/// Persisting a run and reading it back yields the same audit fields and
/// the same ordered recommendation list.
#[tokio::test]
async fn run_round_trips_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(100, 1, vec![1.0, 0.0]),
            section(200, 1, vec![0.8, 0.2]),
            section(300, 1, vec![0.0, 1.0]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Low;
    let result = engine(&store).run_match(params).await.unwrap();

    let run = store.get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(run.total_candidates_considered, 3);
    assert_eq!(run.threshold_label, ThresholdLabel::Low);
    assert!((run.threshold_value - 0.5).abs() < 1e-6);
    assert_eq!(run.aggregation_method, "exact_max_all");

    let rows = store.recommendations_for_run(result.run_id).await.unwrap();
    assert_eq!(rows.len(), result.recommendations.len());
    for (row, returned) in rows.iter().zip(result.recommendations.iter()) {
        assert_eq!(row.document_id, returned.document_id);
        assert_eq!(row.rank, returned.rank);
        assert_eq!(row.run_id, result.run_id);
        assert!((row.score - returned.score).abs() < 1e-6);
    }
}

/// A reader corpus with no embeddings fails the run before any persistence.
#[tokio::test]
async fn empty_reader_corpus_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(CANDIDATE_CORPUS, vec![section(100, 1, vec![1.0, 0.0])]);

    let params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    let err = engine(&store).run_match(params).await.unwrap_err();
    assert!(matches!(err, MatchError::NoReaderEmbeddings(READER_CORPUS)));
}

/// Cancellation between candidates aborts before persistence.
#[tokio::test]
async fn cancelled_run_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    store.insert_embeddings(CANDIDATE_CORPUS, vec![section(100, 1, vec![1.0, 0.0])]);

    let flag = Arc::new(AtomicBool::new(false));
    flag.store(true, Ordering::Relaxed);
    let engine = RecommendationEngine::new(store.clone(), store.clone(), MatchConfig::default())
        .with_cancel_flag(flag);

    let params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    let err = engine.run_match(params).await.unwrap_err();
    assert!(matches!(err, MatchError::Cancelled));
    assert!(store.get_run(1).await.unwrap().is_none());
}

/// The submission window and category filter restrict the eligible pool
/// and are reflected in `total_candidates_considered`.
#[tokio::test]
async fn window_and_categories_restrict_the_pool() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(100, 1, vec![1.0, 0.0]), // in window, right category
            section(200, 1, vec![1.0, 0.0]), // out of window
            section(300, 1, vec![1.0, 0.0]), // wrong category
            section(400, 1, vec![1.0, 0.0]), // no submitted_at
        ],
    );
    store.insert_metadata(
        CANDIDATE_CORPUS,
        vec![
            metadata(100, Some(instant(1, 12)), &["cs.CL"]),
            metadata(200, Some(instant(5, 12)), &["cs.CL"]),
            metadata(300, Some(instant(1, 12)), &["astro-ph"]),
            metadata(400, None, &["cs.CL"]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(0.9);
    params.window = Some(TimeWindow::new(instant(1, 0), instant(2, 0)).unwrap());
    params.categories = Some(BTreeSet::from(["cs.CL".to_string()]));
    let result = engine(&store).run_match(params).await.unwrap();

    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(result.recommendations[0].document_id, 100);
    let run = store.get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(run.total_candidates_considered, 1);
}

/// `top_k` truncates after ranking, keeping contiguous 1-based ranks.
#[tokio::test]
async fn top_k_truncates_after_ranking() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![section(1, 1, vec![1.0, 0.0])]);
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(100, 1, vec![1.0, 0.0]),
            section(200, 1, vec![0.9, 0.1]),
            section(300, 1, vec![0.8, 0.2]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(0.0);
    params.top_k = Some(2);
    let result = engine(&store).run_match(params).await.unwrap();

    assert_eq!(result.recommendations.len(), 2);
    assert_eq!(result.recommendations[0].document_id, 100);
    assert_eq!(result.recommendations[0].rank, 1);
    assert_eq!(result.recommendations[1].rank, 2);
}

/// Abstract-only runs ignore section embeddings entirely.
#[tokio::test]
async fn abstract_only_runs_ignore_sections() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(READER_CORPUS, vec![abstract_record(1, vec![1.0, 0.0])]);
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            abstract_record(100, vec![0.0, 1.0]),
            // A section that would match perfectly, but must be ignored.
            section(100, 1, vec![1.0, 0.0]),
        ],
    );

    let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
    params.threshold = Threshold::Value(0.9);
    params.kind = Some(EmbeddingKind::Abstract);
    let result = engine(&store).run_match(params).await.unwrap();

    assert!(result.recommendations.is_empty());
    let run = store.get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(run.aggregation_method, "exact_max_abstract");
}

/// Both backends produce the same ranked output on a small corpus.
#[tokio::test]
async fn backends_agree_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    store.insert_embeddings(
        READER_CORPUS,
        vec![section(1, 1, vec![1.0, 0.2]), section(2, 1, vec![0.3, 0.9])],
    );
    store.insert_embeddings(
        CANDIDATE_CORPUS,
        vec![
            section(100, 1, vec![1.0, 0.0]),
            section(200, 1, vec![0.0, 1.0]),
            section(300, 1, vec![0.7, 0.7]),
        ],
    );

    let mut results = Vec::new();
    for backend in [IndexBackend::Exact, IndexBackend::Approximate] {
        let mut params = MatchParams::new(1, READER_CORPUS, CANDIDATE_CORPUS);
        params.threshold = Threshold::Value(0.0);
        params.backend = Some(backend);
        let result = engine(&store).run_match(params).await.unwrap();
        results.push(
            result
                .recommendations
                .iter()
                .map(|r| r.document_id)
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(results[0], results[1]);
}
