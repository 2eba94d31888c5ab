//! Pluggable relevance scoring
//!
//! Scoring criteria turn an indexer candidate plus the document's opaque
//! field payload into a score vector. Vectors are compared lexicographically
//! (first component primary) when ordering results, so a criterion can
//! express multi-level ordering without collapsing everything into one
//! float.

use crate::types::IndexedDocument;
use std::any::Any;
use std::sync::Arc;

/// Opaque, shareable scoring payload attached to a document.
///
/// The concrete type is chosen by the caller and downcast inside the
/// scoring criterion. Payloads that should survive persistence must be
/// registered with [`FieldsRegistry`](crate::fields::FieldsRegistry).
pub type FieldsHandle = Arc<dyn Any + Send + Sync>;

/// Caller-supplied relevance scoring.
///
/// Implementations must be pure: the same candidate and fields always
/// produce the same vector. Returning an empty vector drops the candidate
/// from the results, which is how a criterion rejects documents whose
/// field payload is missing or has an unexpected type.
pub trait ScoringCriteria: Send + Sync {
    /// Score one candidate. `fields` is the payload attached at indexing
    /// time, or `None` when the document carried no fields.
    fn score(
        &self,
        doc: &IndexedDocument,
        fields: Option<&(dyn Any + Send + Sync)>,
    ) -> Vec<f32>;
}

/// Rank by the indexer-computed BM25 score. The engine default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankByBm25;

impl ScoringCriteria for RankByBm25 {
    fn score(
        &self,
        doc: &IndexedDocument,
        _fields: Option<&(dyn Any + Send + Sync)>,
    ) -> Vec<f32> {
        vec![doc.bm25]
    }
}

/// Rank by token proximity: `1 / (proximity + 1)`, so 1.0 is exact
/// adjacency. Drops candidates whose proximity could not be computed.
///
/// Only meaningful with the locations index variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankByTokenProximity;

impl ScoringCriteria for RankByTokenProximity {
    fn score(
        &self,
        doc: &IndexedDocument,
        _fields: Option<&(dyn Any + Send + Sync)>,
    ) -> Vec<f32> {
        if doc.token_proximity < 0 {
            return vec![];
        }
        vec![1.0 / (doc.token_proximity as f32 + 1.0)]
    }
}
