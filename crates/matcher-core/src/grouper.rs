//! Grouping of flat embedding records by parent document

use std::collections::BTreeMap;

use shared_types::{DocumentId, EmbeddingKind, EmbeddingRecord};

/// One document's embeddings, assembled for the duration of a match pass.
///
/// `vectors` and `kinds` are parallel lists in the order the records
/// arrived, so chunk provenance (abstract vs. section) survives grouping.
#[derive(Debug, Clone)]
pub struct GroupedDocument {
    pub document_id: DocumentId,
    pub vectors: Vec<Vec<f32>>,
    pub kinds: Vec<EmbeddingKind>,
}

/// Groups a flat record stream into per-document collections.
pub struct EmbeddingGrouper;

impl EmbeddingGrouper {
    /// Group records by document id, preserving insertion order within each
    /// document's vector list.
    ///
    /// Documents with zero records are simply absent from the output map.
    /// Pure transform; consumes the records to avoid copying vectors.
    pub fn group(records: Vec<EmbeddingRecord>) -> BTreeMap<DocumentId, GroupedDocument> {
        let mut grouped: BTreeMap<DocumentId, GroupedDocument> = BTreeMap::new();

        for record in records {
            let entry = grouped
                .entry(record.document_id)
                .or_insert_with(|| GroupedDocument {
                    document_id: record.document_id,
                    vectors: Vec::new(),
                    kinds: Vec::new(),
                });
            entry.vectors.push(record.vector);
            entry.kinds.push(record.kind);
        }

        grouped
    }
}
