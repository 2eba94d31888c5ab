//! Document, request and response types
//!
//! These types form the interface contract between callers and the engine:
//! - [`Document`]: the payload handed to `index_document`
//! - [`SearchRequest`] / [`SearchResponse`]: the query surface
//! - [`IndexedDocument`]: a per-shard candidate produced by the indexer and
//!   consumed by scoring criteria
//! - [`ScoredDocument`]: a ranked result

use crate::options::RankOptions;
use crate::scoring::FieldsHandle;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Document identifier, unique across the engine.
pub type DocId = u64;

// ============================================================================
// TokenData / Document
// ============================================================================

/// A single token with the byte offsets of its occurrences in the original
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    /// Token text.
    pub text: String,
    /// Byte offsets into the original document content, ascending.
    pub positions: Vec<usize>,
}

impl TokenData {
    /// Create a token with its occurrence positions.
    pub fn new(text: impl Into<String>, positions: Vec<usize>) -> Self {
        TokenData {
            text: text.into(),
            positions,
        }
    }
}

/// Payload for `index_document`.
///
/// Either `content` is set (the segmenter tokenizes it) or `tokens` is
/// non-empty (segmentation is bypassed and the provided tokens are indexed
/// as-is). `labels` are tokens that must be present for a match but never
/// participate in proximity or BM25 scoring. `fields` is an opaque scoring
/// payload downcast inside the configured [`ScoringCriteria`].
///
/// [`ScoringCriteria`]: crate::scoring::ScoringCriteria
#[derive(Clone, Default)]
pub struct Document {
    /// Raw text to segment and index. Ignored when `tokens` is non-empty.
    pub content: String,
    /// Pre-tokenized content; bypasses the segmenter when non-empty.
    pub tokens: Vec<TokenData>,
    /// Filter-only tokens, excluded from scoring.
    pub labels: Vec<String>,
    /// Opaque scoring payload for the ranker.
    pub fields: Option<FieldsHandle>,
}

impl Document {
    /// Document built from raw text.
    pub fn from_content(content: impl Into<String>) -> Self {
        Document {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Document built from pre-tokenized content.
    pub fn from_tokens(tokens: Vec<TokenData>) -> Self {
        Document {
            tokens,
            ..Default::default()
        }
    }

    /// Builder: attach an opaque scoring payload.
    pub fn with_fields(mut self, fields: FieldsHandle) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Builder: attach filter-only labels.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("content", &self.content)
            .field("tokens", &self.tokens)
            .field("labels", &self.labels)
            .field("has_fields", &self.fields.is_some())
            .finish()
    }
}

// ============================================================================
// IndexedDocument / ScoredDocument
// ============================================================================

/// A candidate produced by a shard's indexer for one matching document.
///
/// Scoring criteria read the variant-specific relevance inputs from here:
/// `bm25` is populated by the frequencies index, `token_proximity` and
/// `token_snippet_locations` by the locations index. For other index
/// variants the fields keep their zero defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedDocument {
    /// The matching document.
    pub doc_id: DocId,
    /// Okapi BM25 score (frequencies index only).
    pub bm25: f32,
    /// Minimum summed gap between chosen positions of successive query
    /// tokens; 0 is exact adjacency, -1 means not computable.
    pub token_proximity: i32,
    /// Byte positions realizing the minimum proximity, one per query token.
    pub token_snippet_locations: Vec<usize>,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// The matching document.
    pub doc_id: DocId,
    /// Score vector from the scoring criterion; compared lexicographically.
    pub scores: Vec<f32>,
    /// Snippet positions carried over from the indexer candidate.
    pub token_snippet_locations: Vec<usize>,
}

/// Compare two score vectors lexicographically (first component primary).
///
/// Incomparable components (NaN) are treated as equal; a longer vector wins
/// over a shorter equal prefix.
pub fn compare_score_vectors(a: &[f32], b: &[f32]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.partial_cmp(y) {
            Some(Ordering::Equal) | None => continue,
            Some(ordering) => return ordering,
        }
    }
    a.len().cmp(&b.len())
}

/// Sort results by score vector, descending (ascending when `reverse`).
///
/// Ties are broken by ascending doc id regardless of direction, so repeated
/// searches over the same corpus return a stable order.
pub fn sort_scored_documents(docs: &mut [ScoredDocument], reverse: bool) {
    docs.sort_by(|a, b| {
        let by_score = if reverse {
            compare_score_vectors(&a.scores, &b.scores)
        } else {
            compare_score_vectors(&b.scores, &a.scores)
        };
        by_score.then_with(|| a.doc_id.cmp(&b.doc_id))
    });
}

// ============================================================================
// SearchRequest / SearchResponse
// ============================================================================

/// A search query.
///
/// Either `text` is set (segmented and stop-filtered into query tokens) or
/// `tokens` supplies them directly. All query tokens must appear in a
/// document for it to match (conjunctive search).
#[derive(Clone, Default)]
pub struct SearchRequest {
    /// Query text; segmented when non-empty.
    pub text: String,
    /// Pre-tokenized query; used when `text` is empty.
    pub tokens: Vec<String>,
    /// Labels that matching documents must also carry.
    pub labels: Vec<String>,
    /// Restrict results to this allow-set when present.
    pub doc_ids: Option<HashSet<DocId>>,
    /// Deadline in milliseconds; <= 0 waits for every shard.
    pub timeout_ms: i64,
    /// Return only the match count, no scored documents.
    pub count_docs_only: bool,
    /// Skip sorting entirely; results arrive in shard-completion order.
    pub orderless: bool,
    /// Per-request override of the engine's default rank options.
    pub rank_options: Option<RankOptions>,
}

impl SearchRequest {
    /// Query built from raw text.
    pub fn from_text(text: impl Into<String>) -> Self {
        SearchRequest {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Query built from pre-segmented tokens.
    pub fn from_query_tokens(tokens: Vec<String>) -> Self {
        SearchRequest {
            tokens,
            ..Default::default()
        }
    }

    /// Builder: override rank options for this request.
    pub fn with_rank_options(mut self, options: RankOptions) -> Self {
        self.rank_options = Some(options);
        self
    }

    /// Builder: restrict results to an allow-set of document ids.
    pub fn within_doc_ids(mut self, doc_ids: HashSet<DocId>) -> Self {
        self.doc_ids = Some(doc_ids);
        self
    }
}

impl std::fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRequest")
            .field("text", &self.text)
            .field("tokens", &self.tokens)
            .field("labels", &self.labels)
            .field("doc_ids", &self.doc_ids)
            .field("timeout_ms", &self.timeout_ms)
            .field("count_docs_only", &self.count_docs_only)
            .field("orderless", &self.orderless)
            .finish_non_exhaustive()
    }
}

/// Search results.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    /// The query tokens actually used (after segmentation and stop-token
    /// filtering).
    pub tokens: Vec<String>,
    /// Scored documents, globally sorted and clipped to offset/limit.
    /// Empty when `count_docs_only` was set.
    pub docs: Vec<ScoredDocument>,
    /// Total matching documents across all shards that replied.
    pub num_docs: usize,
    /// True when the deadline elapsed before every shard replied; `docs`
    /// then holds the results that arrived in time.
    pub timeout: bool,
}
