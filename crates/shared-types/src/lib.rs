pub mod types;

pub use types::{
    CorpusId, DocumentId, DocumentMetadata, EmbeddingKind, EmbeddingRecord, NewRecommendation,
    NewRecommendationRun, Recommendation, RecommendationRun, RunId, ThresholdLabel,
};
