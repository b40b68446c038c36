use chrono::{DateTime, Utc};
use shared_types::CorpusId;
use thiserror::Error;

/// Errors that can abort a matching run.
///
/// Only whole-run failures surface to the caller. Per-candidate anomalies
/// (an `EmptyIndex` while scoring one candidate) are absorbed internally and
/// reflected in that candidate's score instead.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The reader corpus contained no embeddings at all. Fatal; nothing is
    /// scored or persisted.
    #[error("reader corpus {0} has no embeddings")]
    NoReaderEmbeddings(CorpusId),

    /// A similarity index cannot be built over zero vectors. Callers must
    /// special-case zero-chunk documents as "no match possible".
    #[error("cannot build a similarity index over zero vectors")]
    EmptyIndex,

    /// The caller supplied a window whose start is not before its end.
    /// Rejected before anything is loaded.
    #[error("invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The run was cancelled cooperatively between candidates. Nothing has
    /// been persisted.
    #[error("matching run cancelled before persistence")]
    Cancelled,

    /// The store failed while loading embeddings or metadata. Fatal; the
    /// run aborts before any persistence.
    #[error("failed to load embeddings or metadata from the store")]
    Load(#[source] anyhow::Error),

    /// The store failed while persisting the run or its recommendations.
    /// The store's transaction boundary guarantees no partial rows.
    #[error("failed to persist recommendation run")]
    Persistence(#[source] anyhow::Error),
}
