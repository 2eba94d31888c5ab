//! Pipeline worker loops
//!
//! Topology:
//!
//! ```text
//! index_document ─→ segmenter queue ─→ one of N segmenter workers
//!     ─→ shard's index-add worker (single: serializes shard writes)
//!         ─→ shard's ranker-add worker (stores fields, bumps the
//!            documents-indexed counter: the flush barrier therefore
//!            implies both index and ranker visibility)
//!         ─→ shard's persistence queue (when enabled)
//!
//! search ─→ every shard's lookup workers ─→ shard's rank workers
//!     ─→ the request's reply mailbox
//! ```
//!
//! Every worker drains its mailbox to end-of-stream, so closing the
//! mailboxes after a flush shuts the pipeline down without losing queued
//! work.

use crate::engine::EngineCore;
use crate::indexer::{DocumentIndex, KeywordEntry};
use crate::mailbox::Mailbox;
use crate::persist::PersistRequest;
use loupe_core::{
    DocId, Document, FieldsHandle, IndexedDocument, ScoredDocument, ScoringCriteria,
};
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

// ============================================================================
// Pipeline messages
// ============================================================================

pub(crate) struct SegmenterRequest {
    pub doc_id: DocId,
    pub shard: usize,
    pub document: Document,
    /// False for recovery replays, which are already on disk.
    pub persist: bool,
}

pub(crate) struct IndexAddRequest {
    pub index: DocumentIndex,
    pub document: Document,
    pub persist: bool,
}

pub(crate) struct RankerAddRequest {
    pub doc_id: DocId,
    pub fields: Option<FieldsHandle>,
    pub labels: Vec<String>,
}

/// Fan-out lookup request, one clone per shard.
#[derive(Clone)]
pub(crate) struct LookupRequest {
    pub tokens: Vec<String>,
    pub labels: Vec<String>,
    pub doc_ids: Option<Arc<HashSet<DocId>>>,
    pub count_docs_only: bool,
    pub orderless: bool,
    pub reverse_order: bool,
    pub criteria: Arc<dyn ScoringCriteria>,
    pub reply: Mailbox<RankerOutput>,
}

pub(crate) struct RankRequest {
    pub candidates: Vec<IndexedDocument>,
    pub num_docs: usize,
    pub count_docs_only: bool,
    pub orderless: bool,
    pub reverse_order: bool,
    pub criteria: Arc<dyn ScoringCriteria>,
    pub reply: Mailbox<RankerOutput>,
}

/// One shard's contribution to a search.
pub(crate) struct RankerOutput {
    pub docs: Vec<ScoredDocument>,
    pub num_docs: usize,
}

// ============================================================================
// Indexing path
// ============================================================================

/// Turn a document into its index form: either adopt the caller's tokens
/// verbatim or segment the content and stop-filter the result. The token
/// length counts every segment, stop tokens included, so document length
/// statistics do not depend on the stop list.
fn build_document_index(core: &EngineCore, doc_id: DocId, document: &Document) -> DocumentIndex {
    let (keywords, token_length) = if !document.tokens.is_empty() {
        let keywords = document
            .tokens
            .iter()
            .map(|token| KeywordEntry {
                text: token.text.clone(),
                positions: token.positions.clone(),
            })
            .collect();
        (keywords, document.tokens.len() as f32)
    } else {
        let segments = core.segmenter.segment(&document.content);
        let token_length = segments.len() as f32;
        let mut grouped: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for segment in segments {
            if !core.stop_tokens.is_stop_token(&segment.text) {
                grouped.entry(segment.text).or_default().push(segment.start);
            }
        }
        let keywords = grouped
            .into_iter()
            .map(|(text, positions)| KeywordEntry { text, positions })
            .collect();
        (keywords, token_length)
    };

    DocumentIndex {
        doc_id,
        keywords,
        labels: document.labels.clone(),
        token_length,
    }
}

/// Shared segmenter worker: segments documents and routes them to their
/// shard's add queue.
pub(crate) fn segmenter_worker(core: Arc<EngineCore>) {
    while let Some(request) = core.segmenter_queue.recv() {
        let index = build_document_index(&core, request.doc_id, &request.document);
        let add = IndexAddRequest {
            index,
            document: request.document,
            persist: request.persist,
        };
        if core.index_add[request.shard].send(add).is_err() {
            return;
        }
    }
}

/// Per-shard add worker: the only writer of this shard's inverted index.
pub(crate) fn index_add_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(request) = core.index_add[shard].recv() {
        let doc_id = request.index.doc_id;
        let num_keywords = request.index.keywords.len();

        let persisted_tokens: Vec<String> = if core.persistent && request.persist {
            request
                .index
                .keywords
                .iter()
                .map(|keyword| keyword.text.clone())
                .chain(request.index.labels.iter().cloned())
                .collect()
        } else {
            Vec::new()
        };
        let fields = request.document.fields.clone();
        let labels = request.document.labels.clone();

        core.indexers[shard].add_document(request.index);
        core.token_index_added
            .fetch_add(num_keywords as u64, Ordering::Relaxed);

        if core.persistent {
            if request.persist {
                let _ = core.persist_queues[shard].send(PersistRequest::Store {
                    doc_id,
                    document: request.document,
                    tokens: persisted_tokens,
                });
            } else {
                // Recovery replay: the record is already on disk.
                core.documents_stored.fetch_add(1, Ordering::Relaxed);
            }
        }

        let forward = RankerAddRequest {
            doc_id,
            fields,
            labels,
        };
        if core.ranker_add[shard].send(forward).is_err() {
            return;
        }
    }
}

/// Per-shard remove worker for the inverted index.
pub(crate) fn index_remove_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(doc_id) = core.index_remove[shard].recv() {
        core.indexers[shard].remove_document(doc_id);
        core.removals_processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-shard ranker-add worker: stores scoring fields, then marks the
/// document fully indexed.
pub(crate) fn ranker_add_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(request) = core.ranker_add[shard].recv() {
        core.rankers[shard].add_doc(request.doc_id, request.fields, request.labels);
        core.documents_indexed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-shard remove worker for the ranker document store.
pub(crate) fn ranker_remove_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(doc_id) = core.ranker_remove[shard].recv() {
        core.rankers[shard].remove_doc(doc_id);
        core.removals_processed.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Query path
// ============================================================================

/// Per-shard lookup worker: runs the conjunctive intersection and hands the
/// candidates to the shard's rank queue.
pub(crate) fn lookup_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(request) = core.index_lookup[shard].recv() {
        let (candidates, num_docs) = core.indexers[shard].lookup(
            &request.tokens,
            &request.labels,
            request.doc_ids.as_deref(),
            request.count_docs_only,
        );
        let rank = RankRequest {
            candidates,
            num_docs,
            count_docs_only: request.count_docs_only,
            orderless: request.orderless,
            reverse_order: request.reverse_order,
            criteria: request.criteria,
            reply: request.reply,
        };
        if core.ranker_rank[shard].send(rank).is_err() {
            return;
        }
    }
}

/// Per-shard rank worker: scores candidates and posts the shard's result to
/// the search's reply mailbox. A reply mailbox sized to the shard count
/// never blocks here, so a timed-out search simply discards late replies.
pub(crate) fn rank_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(request) = core.ranker_rank[shard].recv() {
        let output = if request.count_docs_only {
            RankerOutput {
                docs: Vec::new(),
                num_docs: request.num_docs,
            }
        } else {
            let docs = core.rankers[shard].rank(
                request.candidates,
                request.criteria.as_ref(),
                request.orderless,
                request.reverse_order,
            );
            RankerOutput {
                num_docs: docs.len(),
                docs,
            }
        };
        let _ = request.reply.send(output);
    }
}
