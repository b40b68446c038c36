//! Candidate filtering by submission window and topical categories
//!
//! arXiv-style corpora cut over at 14:00 in a fixed reference timezone, so a
//! "day" of submissions spans two calendar days. Callers normalize that to
//! absolute UTC instants before building a [`TimeWindow`]; the filter itself
//! performs no timezone arithmetic and stays a pure predicate.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{DocumentId, DocumentMetadata};

use crate::error::MatchError;

/// Half-open `[start, end)` interval of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting `start >= end`.
    ///
    /// # Errors
    ///
    /// [`MatchError::InvalidWindow`] when the interval is empty or inverted.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, MatchError> {
        if start >= end {
            return Err(MatchError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether an instant falls inside the half-open interval.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Narrows a candidate document set using store-owned metadata.
pub struct CandidateFilter;

impl CandidateFilter {
    /// Apply the window and category conditions (ANDed) to a document set.
    ///
    /// - With a window, a document passes only if `submitted_at` is present
    ///   and inside it; missing timestamps are excluded, never silently
    ///   included. A document with no metadata row is treated the same way.
    /// - With a non-empty category set, a document passes only if its
    ///   categories intersect the filter set. An empty filter set means no
    ///   category restriction.
    ///
    /// Inputs are not mutated; the result is a fresh set.
    pub fn filter(
        documents: &BTreeSet<DocumentId>,
        metadata: &HashMap<DocumentId, DocumentMetadata>,
        window: Option<&TimeWindow>,
        categories: Option<&BTreeSet<String>>,
    ) -> BTreeSet<DocumentId> {
        let categories = categories.filter(|c| !c.is_empty());

        documents
            .iter()
            .copied()
            .filter(|id| {
                let meta = metadata.get(id);

                if let Some(window) = window {
                    match meta.and_then(|m| m.submitted_at) {
                        Some(submitted_at) if window.contains(submitted_at) => {}
                        _ => return false,
                    }
                }

                if let Some(wanted) = categories {
                    match meta {
                        Some(m) if m.categories.iter().any(|c| wanted.contains(c)) => {}
                        _ => return false,
                    }
                }

                true
            })
            .collect()
    }
}
