//! Persistence, recovery and suggestion tests.

mod common;

use common::{
    add_corpus, doc_ids, locations_options, score_millis, ScoringFields, WeightedFields,
};
use loupe_engine::{
    Document, Engine, EngineOptions, RankOptions, SearchRequest,
};
use tempfile::TempDir;

fn persistent_options(folder: &TempDir) -> EngineOptions {
    let mut options = locations_options().with_persistent_storage(folder.path());
    options
        .fields_registry
        .register::<ScoringFields>("scoring-fields");
    options
}

#[test]
fn test_search_results_survive_restart() {
    let folder = TempDir::new().unwrap();

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    add_corpus(&engine);
    engine.remove_document(4);
    engine.close();
    drop(engine);

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    let response = engine.search(SearchRequest::from_text("中国人口"));
    assert_eq!(response.tokens, vec!["中国", "人口"]);
    assert_eq!(doc_ids(&response), vec![1, 0]);

    assert_eq!(score_millis(&response, 0), 1000);
    assert_eq!(response.docs[0].token_snippet_locations, vec![0, 6]);
    assert_eq!(score_millis(&response, 1), 76);
    assert_eq!(response.docs[1].token_snippet_locations, vec![0, 18]);
    engine.close();
}

#[test]
fn test_fields_survive_restart() {
    let folder = TempDir::new().unwrap();

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    add_corpus(&engine);
    engine.close();
    drop(engine);

    // Scoring with a fields-dependent criterion after recovery proves the
    // payloads round-tripped through the registry.
    let engine = Engine::new(
        persistent_options(&folder)
            .with_default_rank_options(RankOptions::with_criteria(WeightedFields)),
    )
    .unwrap();
    let response = engine.search(SearchRequest::from_text("中国人口"));
    assert_eq!(doc_ids(&response), vec![0, 4]);
    assert_eq!(score_millis(&response, 0), 18000);
    assert_eq!(score_millis(&response, 1), 9000);
    engine.close();
}

#[test]
fn test_unregistered_fields_recover_without_payload() {
    let folder = TempDir::new().unwrap();

    // No registry entries: documents persist, payloads do not.
    let engine = Engine::new(
        locations_options().with_persistent_storage(folder.path()),
    )
    .unwrap();
    add_corpus(&engine);
    engine.close();
    drop(engine);

    let engine = Engine::new(
        locations_options().with_persistent_storage(folder.path()),
    )
    .unwrap();
    // Proximity scoring needs no fields: all three matches return.
    let response = engine.search(SearchRequest::from_text("中国人口"));
    assert_eq!(doc_ids(&response), vec![1, 4, 0]);

    // A fields-dependent criterion now drops everything.
    let dropped = engine.search(
        SearchRequest::from_text("中国人口")
            .with_rank_options(RankOptions::with_criteria(WeightedFields)),
    );
    assert!(dropped.docs.is_empty());
    engine.close();
}

#[test]
fn test_stored_counter_tracks_writes_and_replays() {
    let folder = TempDir::new().unwrap();

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    add_corpus(&engine);
    assert_eq!(engine.num_documents_stored(), 5);
    engine.close();
    drop(engine);

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    // Replayed documents count as stored; nothing is rewritten.
    assert_eq!(engine.num_documents_stored(), 5);
    assert_eq!(engine.num_documents_indexed(), 5);
    engine.close();
}

#[test]
fn test_restart_twice() {
    let folder = TempDir::new().unwrap();

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    add_corpus(&engine);
    engine.close();
    drop(engine);

    for _ in 0..2 {
        let engine = Engine::new(persistent_options(&folder)).unwrap();
        let response = engine.search(SearchRequest::from_text("中国人口"));
        assert_eq!(doc_ids(&response), vec![1, 4, 0]);
        engine.close();
        drop(engine);
    }
}

#[test]
fn test_indexing_continues_after_recovery() {
    let folder = TempDir::new().unwrap();

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    add_corpus(&engine);
    engine.close();
    drop(engine);

    let engine = Engine::new(persistent_options(&folder)).unwrap();
    engine.index_document(10, Document::from_content("北京人口"));
    engine.flush_index();

    let response = engine.search(SearchRequest::from_text("北京人口"));
    assert_eq!(doc_ids(&response), vec![10]);
    engine.close();
}

#[test]
fn test_suggestion_prefix_scan() {
    let folder = TempDir::new().unwrap();
    let engine = Engine::new(persistent_options(&folder)).unwrap();
    add_corpus(&engine);

    assert_eq!(engine.suggestion("中"), vec!["中国"]);
    assert_eq!(engine.suggestion("人"), vec!["人口"]);
    assert!(engine.suggestion("zz").is_empty());

    // Empty prefix matches every distinct token of the corpus.
    let mut all = engine.suggestion("");
    all.sort();
    assert_eq!(all, vec!["中国", "人口", "亿", "十三", "有"]);
    engine.close();
}

#[test]
fn test_suggestion_caps_at_ten() {
    let folder = TempDir::new().unwrap();
    let engine = Engine::new(persistent_options(&folder)).unwrap();

    engine.index_document(
        1,
        Document::from_content(
            "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu",
        ),
    );
    engine.flush_index();

    assert_eq!(engine.suggestion("").len(), 10);
    engine.close();
}

#[test]
fn test_suggestion_empty_without_persistence() {
    let engine = Engine::new(locations_options()).unwrap();
    add_corpus(&engine);
    assert!(engine.suggestion("中").is_empty());
    engine.close();
}

#[test]
fn test_removed_doc_absent_from_suggestion_scan() {
    let folder = TempDir::new().unwrap();
    let engine = Engine::new(persistent_options(&folder)).unwrap();

    engine.index_document(1, Document::from_content("北京"));
    engine.index_document(2, Document::from_content("上海"));
    engine.flush_index();

    engine.remove_document(1);
    engine.flush_index();

    assert!(engine.suggestion("北").is_empty());
    assert_eq!(engine.suggestion("上"), vec!["上海"]);
    engine.close();
}
