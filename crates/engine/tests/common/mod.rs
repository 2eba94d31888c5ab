//! Shared fixtures for the engine integration tests: the test dictionary,
//! the five-document corpus, and the scoring criteria exercised against it.

#![allow(dead_code)]

use loupe_engine::{
    Document, Engine, EngineOptions, FieldsHandle, IndexKind, IndexedDocument,
    RankByTokenProximity, RankOptions, ScoringCriteria, SearchResponse,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

pub fn dict_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/test_dict.txt")
}

pub fn stop_tokens_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/stop_tokens.txt")
}

/// Opaque scoring payload attached to most corpus documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringFields {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

/// `proximity * a + b * c`; drops documents without a `ScoringFields`
/// payload.
pub struct WeightedFields;

impl ScoringCriteria for WeightedFields {
    fn score(
        &self,
        doc: &IndexedDocument,
        fields: Option<&(dyn Any + Send + Sync)>,
    ) -> Vec<f32> {
        match fields.and_then(|f| f.downcast_ref::<ScoringFields>()) {
            Some(fields) => vec![doc.token_proximity as f32 * fields.a + fields.b * fields.c],
            None => vec![],
        }
    }
}

/// BM25 passthrough restricted to documents carrying `ScoringFields`.
pub struct Bm25WithFields;

impl ScoringCriteria for Bm25WithFields {
    fn score(
        &self,
        doc: &IndexedDocument,
        fields: Option<&(dyn Any + Send + Sync)>,
    ) -> Vec<f32> {
        match fields.and_then(|f| f.downcast_ref::<ScoringFields>()) {
            Some(_) => vec![doc.bm25],
            None => vec![],
        }
    }
}

pub fn proximity_rank_options() -> RankOptions {
    RankOptions {
        scoring_criteria: Some(Arc::new(RankByTokenProximity)),
        output_offset: 0,
        max_outputs: 10,
        reverse_order: false,
    }
}

pub fn locations_options() -> EngineOptions {
    EngineOptions::default()
        .with_dictionary(dict_path())
        .with_index_kind(IndexKind::Locations)
        .with_default_rank_options(proximity_rank_options())
}

pub fn scoring_fields(a: f32, b: f32, c: f32) -> FieldsHandle {
    Arc::new(ScoringFields { a, b, c })
}

/// The shared corpus: five documents about population figures, one of them
/// (doc 1) with no scoring payload.
pub fn add_corpus(engine: &Engine) {
    engine.index_document(
        0,
        Document::from_content("中国有十三亿人口人口").with_fields(scoring_fields(1.0, 2.0, 3.0)),
    );
    engine.index_document(1, Document::from_content("中国人口"));
    engine.index_document(
        2,
        Document::from_content("有人口").with_fields(scoring_fields(2.0, 3.0, 1.0)),
    );
    engine.index_document(
        3,
        Document::from_content("有十三亿人口").with_fields(scoring_fields(2.0, 3.0, 3.0)),
    );
    engine.index_document(
        4,
        Document::from_content("中国十三亿人口").with_fields(scoring_fields(0.0, 9.0, 1.0)),
    );
    engine.flush_index();
}

pub fn doc_ids(response: &SearchResponse) -> Vec<u64> {
    response.docs.iter().map(|d| d.doc_id).collect()
}

/// First score component truncated at millis, matching how expected values
/// are written in the assertions.
pub fn score_millis(response: &SearchResponse, index: usize) -> i32 {
    (response.docs[index].scores[0] * 1000.0) as i32
}
