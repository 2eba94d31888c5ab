//! Engine, indexer and rank configuration
//!
//! Zero-valued thread and buffer fields mean "auto": [`EngineOptions::normalized`]
//! fills them from the host's available parallelism, mirroring how the rest
//! of the engine treats zero (`max_outputs == 0` is "no cap").

use crate::fields::FieldsRegistry;
use crate::scoring::{RankByBm25, ScoringCriteria};
use std::path::PathBuf;
use std::sync::Arc;

/// Default shard count when the caller leaves `num_shards` at zero.
pub const DEFAULT_NUM_SHARDS: usize = 2;

// ============================================================================
// Indexer options
// ============================================================================

/// Which payload the inverted index stores per posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    /// Doc ids only: boolean search.
    #[default]
    DocIds,
    /// Doc ids plus term frequency: enables BM25.
    Frequencies,
    /// Doc ids plus byte positions: enables proximity scoring and snippet
    /// locations.
    Locations,
}

/// Okapi BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 2.0, b: 0.75 }
    }
}

/// Per-shard indexer configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexerOptions {
    /// Index variant, fixed at engine construction.
    pub index_kind: IndexKind,
    /// BM25 parameters; only read by the frequencies variant.
    pub bm25: Bm25Params,
}

// ============================================================================
// Rank options
// ============================================================================

/// Result scoring and pagination options.
///
/// Used both as the engine-wide default and as a per-request override. A
/// `None` criterion in an override falls back to the engine default.
#[derive(Clone, Default)]
pub struct RankOptions {
    /// Scoring criterion; `None` means "use the engine default".
    pub scoring_criteria: Option<Arc<dyn ScoringCriteria>>,
    /// Documents to skip from the front of the sorted results.
    pub output_offset: usize,
    /// Result cap after the offset; 0 means no cap.
    pub max_outputs: usize,
    /// Sort ascending instead of descending.
    pub reverse_order: bool,
}

impl RankOptions {
    /// Rank options with the given criterion.
    pub fn with_criteria(criteria: impl ScoringCriteria + 'static) -> Self {
        RankOptions {
            scoring_criteria: Some(Arc::new(criteria)),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for RankOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankOptions")
            .field("has_criteria", &self.scoring_criteria.is_some())
            .field("output_offset", &self.output_offset)
            .field("max_outputs", &self.max_outputs)
            .field("reverse_order", &self.reverse_order)
            .finish()
    }
}

// ============================================================================
// Engine options
// ============================================================================

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Segmenter dictionary files (`word frequency pos` per line).
    pub segmenter_dictionaries: Vec<PathBuf>,
    /// Stop-token file, one token per line. Optional.
    pub stop_token_file: Option<PathBuf>,
    /// Number of index shards; 0 means [`DEFAULT_NUM_SHARDS`].
    pub num_shards: usize,
    /// Segmenter worker threads; 0 means auto.
    pub num_segmenter_threads: usize,
    /// Lookup worker threads per shard; 0 means auto.
    pub num_indexer_threads_per_shard: usize,
    /// Rank worker threads per shard; 0 means auto.
    pub num_ranker_threads_per_shard: usize,
    /// Capacity of each indexer mailbox; 0 means auto.
    pub indexer_buffer_length: usize,
    /// Capacity of each ranker mailbox; 0 means auto.
    pub ranker_buffer_length: usize,
    /// Default rank options applied when a request carries none.
    pub default_rank_options: RankOptions,
    /// Inverted-index variant and BM25 parameters.
    pub indexer_options: IndexerOptions,
    /// Persist the index to disk and recover it on construction.
    pub use_persistent_storage: bool,
    /// Folder holding the per-shard stores. Required when persistent.
    pub persistent_storage_folder: PathBuf,
    /// Codec registry for persisted field payloads.
    pub fields_registry: FieldsRegistry,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            segmenter_dictionaries: Vec::new(),
            stop_token_file: None,
            num_shards: 0,
            num_segmenter_threads: 0,
            num_indexer_threads_per_shard: 0,
            num_ranker_threads_per_shard: 0,
            indexer_buffer_length: 0,
            ranker_buffer_length: 0,
            default_rank_options: RankOptions::default(),
            indexer_options: IndexerOptions::default(),
            use_persistent_storage: false,
            persistent_storage_folder: PathBuf::new(),
            fields_registry: FieldsRegistry::default(),
        }
    }
}

impl EngineOptions {
    /// Builder: add a segmenter dictionary file.
    pub fn with_dictionary(mut self, path: impl Into<PathBuf>) -> Self {
        self.segmenter_dictionaries.push(path.into());
        self
    }

    /// Builder: set the stop-token file.
    pub fn with_stop_tokens(mut self, path: impl Into<PathBuf>) -> Self {
        self.stop_token_file = Some(path.into());
        self
    }

    /// Builder: set the shard count.
    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards;
        self
    }

    /// Builder: set the index variant.
    pub fn with_index_kind(mut self, kind: IndexKind) -> Self {
        self.indexer_options.index_kind = kind;
        self
    }

    /// Builder: set the default rank options.
    pub fn with_default_rank_options(mut self, options: RankOptions) -> Self {
        self.default_rank_options = options;
        self
    }

    /// Builder: enable persistence under `folder`.
    pub fn with_persistent_storage(mut self, folder: impl Into<PathBuf>) -> Self {
        self.use_persistent_storage = true;
        self.persistent_storage_folder = folder.into();
        self
    }

    /// Resolve every "auto" field to a concrete value.
    ///
    /// Idempotent; the engine calls this once at construction.
    pub fn normalized(mut self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        if self.num_shards == 0 {
            self.num_shards = DEFAULT_NUM_SHARDS;
        }
        if self.num_segmenter_threads == 0 {
            self.num_segmenter_threads = cpus;
        }
        if self.num_indexer_threads_per_shard == 0 {
            self.num_indexer_threads_per_shard = (cpus / self.num_shards).max(1);
        }
        if self.num_ranker_threads_per_shard == 0 {
            self.num_ranker_threads_per_shard = (cpus / self.num_shards).max(1);
        }
        if self.indexer_buffer_length == 0 {
            self.indexer_buffer_length = cpus.max(1);
        }
        if self.ranker_buffer_length == 0 {
            self.ranker_buffer_length = cpus.max(1);
        }
        if self.default_rank_options.scoring_criteria.is_none() {
            self.default_rank_options.scoring_criteria = Some(Arc::new(RankByBm25));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_fills_auto_fields() {
        let options = EngineOptions::default().normalized();
        assert_eq!(options.num_shards, DEFAULT_NUM_SHARDS);
        assert!(options.num_segmenter_threads >= 1);
        assert!(options.num_indexer_threads_per_shard >= 1);
        assert!(options.num_ranker_threads_per_shard >= 1);
        assert!(options.indexer_buffer_length >= 1);
        assert!(options.ranker_buffer_length >= 1);
        assert!(options.default_rank_options.scoring_criteria.is_some());
    }

    #[test]
    fn test_normalized_keeps_explicit_values() {
        let options = EngineOptions::default()
            .with_num_shards(7)
            .normalized();
        assert_eq!(options.num_shards, 7);
    }

    #[test]
    fn test_bm25_defaults() {
        let params = Bm25Params::default();
        assert_eq!(params.k1, 2.0);
        assert_eq!(params.b, 0.75);
    }

    #[test]
    fn test_default_index_kind_is_doc_ids() {
        assert_eq!(IndexerOptions::default().index_kind, IndexKind::DocIds);
    }
}
