//! Sharded indexing and query pipeline
//!
//! This crate orchestrates the whole engine:
//! - [`Engine`]: the public front (index, remove, search, flush, suggest)
//! - Segmenter: dictionary-based tokenization with byte offsets
//! - Indexer: one inverted index per shard (doc ids / frequencies /
//!   locations variants)
//! - Ranker: per-shard scoring with caller-supplied criteria
//! - Persistence: per-shard write-behind to embedded KV stores, replayed
//!   on construction
//!
//! Work moves between dedicated worker threads through bounded mailboxes;
//! each shard's index mutations are serialized by a single add worker,
//! which is what makes per-shard writes totally ordered.

#![warn(clippy::all)]

mod engine;
mod indexer;
mod mailbox;
mod persist;
mod ranker;
mod segment;
mod workers;

pub use engine::Engine;
pub use segment::{Segment, Segmenter, StopTokens};

// Re-export the core surface so callers can depend on this crate alone.
pub use loupe_core::{
    Bm25Params, DocId, Document, EngineError, EngineOptions, EngineResult, FieldsHandle,
    FieldsRegistry, IndexKind, IndexedDocument, IndexerOptions, RankByBm25,
    RankByTokenProximity, RankOptions, ScoredDocument, ScoringCriteria, SearchRequest,
    SearchResponse, TokenData,
};
