//! Per-shard ranking
//!
//! The ranker owns the scoring side of a shard: each indexed document's
//! opaque field payload and labels, stored in a concurrent map because the
//! shard's rank workers read it while the add/remove workers mutate it.
//!
//! Ranking applies the caller's scoring criterion to every candidate the
//! indexer produced and sorts the shard's slice of the results. Pagination
//! is not applied here: the engine re-sorts globally across shards and
//! clips there, so per-shard trimming would drop documents the global order
//! still needs.

use dashmap::DashMap;
use loupe_core::{
    sort_scored_documents, DocId, FieldsHandle, IndexedDocument, ScoredDocument,
    ScoringCriteria,
};
use std::any::Any;

/// Scoring-side record for one document.
struct RankerDoc {
    fields: Option<FieldsHandle>,
    #[allow(dead_code)] // kept for parity with the indexed label set
    labels: Vec<String>,
}

/// Scoring state for one shard.
#[derive(Default)]
pub(crate) struct Ranker {
    docs: DashMap<DocId, RankerDoc>,
}

impl Ranker {
    pub fn new() -> Self {
        Ranker::default()
    }

    /// Store a document's scoring payload.
    pub fn add_doc(&self, doc_id: DocId, fields: Option<FieldsHandle>, labels: Vec<String>) {
        self.docs.insert(doc_id, RankerDoc { fields, labels });
    }

    /// Forget a document.
    pub fn remove_doc(&self, doc_id: DocId) {
        self.docs.remove(&doc_id);
    }

    /// Score and sort one shard's candidates.
    ///
    /// Candidates whose criterion returns an empty vector are dropped; a
    /// candidate with no stored record is scored with `None` fields so the
    /// criterion decides its fate.
    pub fn rank(
        &self,
        candidates: Vec<IndexedDocument>,
        criteria: &dyn ScoringCriteria,
        orderless: bool,
        reverse_order: bool,
    ) -> Vec<ScoredDocument> {
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let record = self.docs.get(&candidate.doc_id);
            let fields = record
                .as_ref()
                .and_then(|r| r.fields.as_ref())
                .map(|f| f.as_ref() as &(dyn Any + Send + Sync));
            let scores = criteria.score(&candidate, fields);
            if scores.is_empty() {
                continue;
            }
            scored.push(ScoredDocument {
                doc_id: candidate.doc_id,
                scores,
                token_snippet_locations: candidate.token_snippet_locations,
            });
        }

        if !orderless {
            sort_scored_documents(&mut scored, reverse_order);
        }
        scored
    }

    /// Documents currently tracked.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Drop all scoring state.
    pub fn clear(&self) {
        self.docs.clear();
    }
}
