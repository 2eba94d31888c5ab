//! Core types and traits for the loupe search engine
//!
//! This crate defines the foundational types used throughout the system:
//! - Document payloads and token data handed to the indexing pipeline
//! - Search requests, responses and scored results
//! - Engine, indexer and rank option structs with their defaults
//! - The pluggable [`ScoringCriteria`] trait and stock criteria
//! - [`FieldsRegistry`]: the codec registry that round-trips opaque scoring
//!   payloads through persistent storage
//! - Shard assignment hashing
//! - The error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fields;
pub mod options;
pub mod scoring;
pub mod shard;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use fields::FieldsRegistry;
pub use options::{Bm25Params, EngineOptions, IndexKind, IndexerOptions, RankOptions};
pub use scoring::{FieldsHandle, RankByBm25, RankByTokenProximity, ScoringCriteria};
pub use shard::{murmur3_32, shard_for_doc};
pub use types::{
    compare_score_vectors, sort_scored_documents, DocId, Document, IndexedDocument,
    ScoredDocument, SearchRequest, SearchResponse, TokenData,
};
