//! Matcher Core - the recommendation matching engine
//!
//! This crate provides:
//! - Vector math primitives (normalization, cosine similarity)
//! - Similarity indexes (exact and approximate inner-product search)
//! - Embedding grouping by parent document
//! - Candidate filtering by submission window and topical categories
//! - Max-pooled document-to-document scoring
//! - Run orchestration and persistence of auditable recommendation runs
//! - Store abstractions over the external embedding/metadata/run store

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod grouper;
pub mod index;
pub mod scorer;
pub mod store;
pub mod vecmath;

// Re-export commonly used types
pub use config::{MatchConfig, ThresholdTable};
pub use engine::{MatchParams, RankedMatch, RecommendationEngine, RunResult, Threshold};
pub use error::MatchError;
pub use filter::{CandidateFilter, TimeWindow};
pub use grouper::{EmbeddingGrouper, GroupedDocument};
pub use index::{ApproximateIndex, ExactIndex, IndexBackend, SearchHit, SimilarityIndex};
pub use scorer::{MatchScorer, NO_MATCH_SCORE};
pub use store::{EmbeddingStore, MemoryStore, RunStore};
