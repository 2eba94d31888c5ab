//! Per-shard inverted index
//!
//! One `Indexer` per shard, owned behind a read/write lock: the shard's
//! single add/remove workers take the write side, lookup workers share the
//! read side. Posting lists are kept strictly ascending by doc id so the
//! conjunctive lookup is a linear k-way merge.
//!
//! The index variant decides what each posting carries and which relevance
//! inputs lookups produce: `Locations` yields token proximity and snippet
//! positions, `Frequencies` yields BM25, `DocIds` yields membership only.

use loupe_core::{Bm25Params, DocId, IndexKind, IndexedDocument, IndexerOptions};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashSet;

/// One keyword of a document entering the index.
#[derive(Debug, Clone)]
pub(crate) struct KeywordEntry {
    /// Token text.
    pub text: String,
    /// Byte offsets of the token's occurrences, ascending.
    pub positions: Vec<usize>,
}

/// A segmented document ready for index insertion.
#[derive(Debug, Clone)]
pub(crate) struct DocumentIndex {
    pub doc_id: DocId,
    pub keywords: Vec<KeywordEntry>,
    /// Filter-only tokens; indexed without positions or frequency.
    pub labels: Vec<String>,
    /// Token count of the document, BM25's length signal.
    pub token_length: f32,
}

#[derive(Debug, Clone)]
struct Posting {
    doc_id: DocId,
    frequency: u32,
    positions: Vec<usize>,
}

#[derive(Debug, Default)]
struct PostingList {
    entries: Vec<Posting>,
}

impl PostingList {
    /// Insert or replace the posting for `posting.doc_id`, keeping the list
    /// sorted by doc id.
    fn upsert(&mut self, posting: Posting) {
        match self
            .entries
            .binary_search_by_key(&posting.doc_id, |p| p.doc_id)
        {
            Ok(i) => self.entries[i] = posting,
            Err(i) => self.entries.insert(i, posting),
        }
    }

    fn remove(&mut self, doc_id: DocId) -> bool {
        match self.entries.binary_search_by_key(&doc_id, |p| p.doc_id) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }
}

#[derive(Default)]
struct IndexerState {
    table: FxHashMap<String, PostingList>,
    /// Per-doc token counts; a doc's presence here is what "indexed on this
    /// shard" means.
    doc_token_lengths: FxHashMap<DocId, f32>,
    /// Tombstones for the variants that do not delete postings in place.
    removed: FxHashSet<DocId>,
    total_token_length: f32,
    num_documents: u64,
}

/// Inverted index for one shard.
pub(crate) struct Indexer {
    kind: IndexKind,
    bm25: Bm25Params,
    state: RwLock<IndexerState>,
}

impl Indexer {
    pub fn new(options: IndexerOptions) -> Self {
        Indexer {
            kind: options.index_kind,
            bm25: options.bm25,
            state: RwLock::new(IndexerState::default()),
        }
    }

    /// Insert or update a document.
    ///
    /// Re-adding an id replaces its posting per token; tokens from the
    /// previous version that the new one lacks are left behind and only
    /// disappear on removal.
    pub fn add_document(&self, doc: DocumentIndex) {
        let DocumentIndex {
            doc_id,
            keywords,
            labels,
            token_length,
        } = doc;
        let mut state = self.state.write();

        state.removed.remove(&doc_id);
        if let Some(previous) = state.doc_token_lengths.insert(doc_id, token_length) {
            state.total_token_length += token_length - previous;
        } else {
            state.total_token_length += token_length;
            state.num_documents += 1;
        }

        let keep_positions = self.kind == IndexKind::Locations;
        for keyword in keywords {
            let frequency = keyword.positions.len().max(1) as u32;
            let positions = if keep_positions {
                keyword.positions
            } else {
                Vec::new()
            };
            state.table.entry(keyword.text).or_default().upsert(Posting {
                doc_id,
                frequency,
                positions,
            });
        }
        for label in labels {
            state.table.entry(label).or_default().upsert(Posting {
                doc_id,
                frequency: 0,
                positions: Vec::new(),
            });
        }
    }

    /// Remove a document.
    ///
    /// The locations variant deletes postings in place; the others record a
    /// tombstone that lookups filter on. Either way the doc stops counting
    /// toward corpus statistics immediately.
    pub fn remove_document(&self, doc_id: DocId) {
        let mut state = self.state.write();
        let Some(length) = state.doc_token_lengths.remove(&doc_id) else {
            // Not on this shard; removals are broadcast to all shards.
            return;
        };
        state.total_token_length -= length;
        state.num_documents = state.num_documents.saturating_sub(1);

        match self.kind {
            IndexKind::Locations => {
                state.table.retain(|_, list| {
                    list.remove(doc_id);
                    !list.entries.is_empty()
                });
            }
            IndexKind::DocIds | IndexKind::Frequencies => {
                state.removed.insert(doc_id);
            }
        }
    }

    /// Conjunctive lookup over query tokens and labels.
    ///
    /// Returns the per-doc candidates (empty when `count_docs_only`) and the
    /// number of matching documents. A token absent from this shard's table
    /// means no document here matches.
    pub fn lookup(
        &self,
        tokens: &[String],
        labels: &[String],
        allow: Option<&HashSet<DocId>>,
        count_docs_only: bool,
    ) -> (Vec<IndexedDocument>, usize) {
        let state = self.state.read();
        if tokens.is_empty() && labels.is_empty() {
            return (Vec::new(), 0);
        }

        let mut lists: Vec<&[Posting]> = Vec::with_capacity(tokens.len() + labels.len());
        for text in tokens.iter().chain(labels.iter()) {
            match state.table.get(text) {
                Some(list) => lists.push(&list.entries),
                None => return (Vec::new(), 0),
            }
        }

        let mut cursors = vec![0usize; lists.len()];
        let mut docs = Vec::new();
        let mut num_docs = 0;

        'scan: loop {
            // Highest current head is the next possible match.
            let mut candidate = 0;
            for (list, cursor) in lists.iter().zip(cursors.iter()) {
                match list.get(*cursor) {
                    Some(posting) => candidate = candidate.max(posting.doc_id),
                    None => break 'scan,
                }
            }

            // Advance every cursor to the candidate.
            let mut aligned = true;
            for (k, list) in lists.iter().enumerate() {
                cursors[k] += list[cursors[k]..].partition_point(|p| p.doc_id < candidate);
                match list.get(cursors[k]) {
                    None => break 'scan,
                    Some(posting) if posting.doc_id != candidate => aligned = false,
                    Some(_) => {}
                }
            }
            if !aligned {
                continue;
            }

            let accepted = !state.removed.contains(&candidate)
                && allow.map_or(true, |set| set.contains(&candidate));
            if accepted {
                num_docs += 1;
                if !count_docs_only {
                    docs.push(self.build_candidate(
                        &state,
                        candidate,
                        tokens,
                        &lists[..tokens.len()],
                        &cursors[..tokens.len()],
                    ));
                }
            }
            for cursor in cursors.iter_mut() {
                *cursor += 1;
            }
        }

        (docs, num_docs)
    }

    fn build_candidate(
        &self,
        state: &IndexerState,
        doc_id: DocId,
        tokens: &[String],
        token_lists: &[&[Posting]],
        cursors: &[usize],
    ) -> IndexedDocument {
        let mut doc = IndexedDocument {
            doc_id,
            ..Default::default()
        };
        match self.kind {
            IndexKind::Locations if !token_lists.is_empty() => {
                let position_lists: Vec<&[usize]> = token_lists
                    .iter()
                    .zip(cursors.iter())
                    .map(|(list, &cursor)| list[cursor].positions.as_slice())
                    .collect();
                let (proximity, snippet) = min_token_proximity(tokens, &position_lists);
                doc.token_proximity = proximity;
                doc.token_snippet_locations = snippet;
            }
            IndexKind::Frequencies => {
                doc.bm25 = self.bm25_score(state, doc_id, token_lists, cursors);
            }
            _ => {}
        }
        doc
    }

    /// Okapi BM25 over the query tokens matched by `doc_id`.
    fn bm25_score(
        &self,
        state: &IndexerState,
        doc_id: DocId,
        token_lists: &[&[Posting]],
        cursors: &[usize],
    ) -> f32 {
        if state.num_documents == 0 {
            return 0.0;
        }
        let num_documents = state.num_documents as f32;
        let avg_doc_length = state.total_token_length / num_documents;
        let doc_length = state.doc_token_lengths.get(&doc_id).copied().unwrap_or(0.0);
        if avg_doc_length <= 0.0 || doc_length <= 0.0 {
            return 0.0;
        }

        let Bm25Params { k1, b } = self.bm25;
        let mut score = 0.0;
        for (list, &cursor) in token_lists.iter().zip(cursors.iter()) {
            let tf = list[cursor].frequency as f32;
            if tf == 0.0 {
                continue;
            }
            let idf = (num_documents / list.len() as f32 + 1.0).log2();
            score += idf * tf * (k1 + 1.0)
                / (tf + k1 * (1.0 - b + b * doc_length / avg_doc_length));
        }
        score
    }

    /// Documents currently indexed on this shard.
    pub fn num_documents(&self) -> u64 {
        self.state.read().num_documents
    }

    /// Drop all index state.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.table.clear();
        state.doc_token_lengths.clear();
        state.removed.clear();
        state.total_token_length = 0.0;
        state.num_documents = 0;
    }
}

/// Minimum token proximity and the positions realizing it.
///
/// Proximity is `Σ |p_{i+1} − p_i − len(token_i)|` over one chosen position
/// per query token, minimized with a dynamic program over the position
/// lists in query order. 0 means the tokens are exactly adjacent. Returns
/// -1 when any token has no recorded positions.
fn min_token_proximity(tokens: &[String], position_lists: &[&[usize]]) -> (i32, Vec<usize>) {
    if position_lists.iter().any(|list| list.is_empty()) {
        return (-1, Vec::new());
    }
    if position_lists.len() == 1 {
        return (0, vec![position_lists[0][0]]);
    }

    let levels = position_lists.len();
    let mut cost: Vec<i64> = vec![0; position_lists[0].len()];
    let mut back: Vec<Vec<usize>> = vec![Vec::new()];

    for i in 1..levels {
        let token_len = tokens[i - 1].len() as i64;
        let previous = position_lists[i - 1];
        let current = position_lists[i];
        let mut next_cost = vec![i64::MAX; current.len()];
        let mut next_back = vec![0usize; current.len()];

        for (j, &q) in current.iter().enumerate() {
            for (k, &p) in previous.iter().enumerate() {
                let gap = (q as i64 - p as i64 - token_len).abs();
                let total = cost[k] + gap;
                if total < next_cost[j] {
                    next_cost[j] = total;
                    next_back[j] = k;
                }
            }
        }
        cost = next_cost;
        back.push(next_back);
    }

    let (mut choice, &best) = cost
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| **c)
        .expect("position lists are non-empty");

    let mut snippet = vec![0usize; levels];
    for i in (0..levels).rev() {
        snippet[i] = position_lists[i][choice];
        if i > 0 {
            choice = back[i][choice];
        }
    }
    (best as i32, snippet)
}
