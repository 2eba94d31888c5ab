use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loupe_engine::{
    Document, Engine, EngineOptions, IndexKind, RankByTokenProximity, RankOptions,
    SearchRequest,
};
use std::path::PathBuf;
use std::sync::Arc;

fn dict_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/test_dict.txt")
}

fn corpus_engine() -> Engine {
    let options = EngineOptions::default()
        .with_dictionary(dict_path())
        .with_index_kind(IndexKind::Locations)
        .with_default_rank_options(RankOptions {
            scoring_criteria: Some(Arc::new(RankByTokenProximity)),
            output_offset: 0,
            max_outputs: 10,
            reverse_order: false,
        });
    let engine = Engine::new(options).expect("engine init");
    for doc_id in 0..1_000u64 {
        let content = if doc_id % 3 == 0 {
            "中国有十三亿人口人口"
        } else if doc_id % 3 == 1 {
            "中国十三亿人口"
        } else {
            "有人口"
        };
        engine.index_document(doc_id, Document::from_content(content));
    }
    engine.flush_index();
    engine
}

fn bench_search(c: &mut Criterion) {
    let engine = corpus_engine();
    c.bench_function("search_two_tokens_1k_docs", |b| {
        b.iter(|| black_box(engine.search(SearchRequest::from_text("中国人口"))))
    });
    engine.close();
}

fn bench_index_throughput(c: &mut Criterion) {
    c.bench_function("index_and_flush_100_docs", |b| {
        b.iter(|| {
            let engine = corpus_engine();
            for doc_id in 1_000..1_100u64 {
                engine.index_document(doc_id, Document::from_content("中国十三亿人口"));
            }
            engine.flush_index();
            engine.close();
        })
    });
}

criterion_group!(benches, bench_search, bench_index_throughput);
criterion_main!(benches);
