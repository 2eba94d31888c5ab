//! # Loupe
//!
//! An in-memory, sharded full-text search engine with optional on-disk
//! persistence.
//!
//! Documents enter the engine either as raw text (tokenized by a
//! dictionary-based segmenter) or as pre-tokenized token lists with byte
//! positions. The engine maintains one inverted index per shard, answers
//! conjunctive multi-token queries, and ranks results with pluggable scoring:
//! token proximity, BM25, or caller-defined criteria over typed field
//! payloads.
//!
//! # Quick Start
//!
//! ```no_run
//! use loupe::{Document, Engine, EngineOptions, SearchRequest};
//!
//! let options = EngineOptions::default()
//!     .with_dictionary("testdata/dictionary.txt");
//! let engine = Engine::new(options).expect("engine init");
//!
//! engine.index_document(1, Document::from_content("the quick brown fox"));
//! engine.flush_index();
//!
//! let response = engine.search(SearchRequest::from_text("quick fox"));
//! for doc in &response.docs {
//!     println!("{} scored {:?}", doc.doc_id, doc.scores);
//! }
//! engine.close();
//! ```
//!
//! # Architecture
//!
//! The [`Engine`] struct is the main entry point. Internally it owns N
//! shards, each with its own inverted index, ranker document store, and
//! worker threads; a document's id hashes to exactly one shard. Searches
//! fan out to every shard and the engine merges and re-sorts the per-shard
//! results globally.
//!
//! The storage crate (embedded KV stores used for persistence) is internal.
//! Only the API surface re-exported here is stable.

pub use loupe_core::{
    compare_score_vectors, shard_for_doc, Bm25Params, DocId, Document, EngineError,
    EngineOptions, EngineResult, FieldsHandle, FieldsRegistry, IndexKind, IndexedDocument,
    IndexerOptions, RankByBm25, RankByTokenProximity, RankOptions, ScoredDocument,
    ScoringCriteria, SearchRequest, SearchResponse, TokenData,
};
pub use loupe_engine::Engine;
