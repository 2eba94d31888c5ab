//! Engine front: construction, dispatch, cross-shard merge
//!
//! The [`Engine`] owns N shards (inverted index + ranker each), the worker
//! threads that drive them, and, when persistence is enabled, two KV
//! stores per shard. Construction recovers persisted state before the
//! write path opens; `close` flushes, drains the pipeline, joins every
//! worker and releases the stores.

use crate::indexer::Indexer;
use crate::mailbox::{Mailbox, RecvTimeoutError};
use crate::persist::{self, PersistRequest};
use crate::ranker::Ranker;
use crate::segment::{Segmenter, StopTokens};
use crate::workers::{
    self, IndexAddRequest, LookupRequest, RankRequest, RankerAddRequest, RankerOutput,
    SegmenterRequest,
};
use loupe_core::{
    shard_for_doc, sort_scored_documents, DocId, Document, EngineError, EngineOptions,
    EngineResult, RankByBm25, ScoringCriteria, SearchRequest, SearchResponse,
};
use loupe_storage::{codec, KvStore};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// File name prefix of the per-shard stores inside the storage folder.
const PERSISTENT_STORAGE_FILE_PREFIX: &str = "loupe";

/// Suggestion results are capped at this many tokens.
const MAX_SUGGESTIONS: usize = 10;

/// The two stores of one shard.
pub(crate) struct ShardStores {
    pub info: KvStore,
    pub index: KvStore,
}

/// State shared between the engine front and every worker thread.
pub(crate) struct EngineCore {
    pub options: EngineOptions,
    pub segmenter: Segmenter,
    pub stop_tokens: StopTokens,
    pub indexers: Vec<Indexer>,
    pub rankers: Vec<Ranker>,

    /// Whether persistence was enabled at construction.
    pub persistent: bool,
    /// Per-shard stores; taken and dropped on close so the files unlock.
    pub stores: RwLock<Option<Vec<ShardStores>>>,

    pub segmenter_queue: Mailbox<SegmenterRequest>,
    pub index_add: Vec<Mailbox<IndexAddRequest>>,
    pub index_remove: Vec<Mailbox<DocId>>,
    pub index_lookup: Vec<Mailbox<LookupRequest>>,
    pub ranker_add: Vec<Mailbox<RankerAddRequest>>,
    pub ranker_remove: Vec<Mailbox<DocId>>,
    pub ranker_rank: Vec<Mailbox<RankRequest>>,
    pub persist_queues: Vec<Mailbox<PersistRequest>>,
    /// Per-shard recovery completion signals, consumed once at startup.
    pub recovery_barrier: Mailbox<usize>,

    pub indexing_requests: AtomicU64,
    pub documents_indexed: AtomicU64,
    pub token_index_added: AtomicU64,
    pub documents_stored: AtomicU64,
    /// Removal messages dispatched to shard workers. Paired with
    /// `removals_processed` so the flush barrier also covers removals:
    /// after `remove_document` + `flush_index`, no search returns the doc.
    pub removal_requests: AtomicU64,
    pub removals_processed: AtomicU64,
}

impl EngineCore {
    /// Count the request and hand the document to the segmenter queue.
    ///
    /// `persist` is false for recovery replays, which are already on disk.
    pub(crate) fn enqueue_document(&self, doc_id: DocId, document: Document, persist: bool) {
        self.indexing_requests.fetch_add(1, Ordering::Relaxed);
        let shard = shard_for_doc(doc_id, self.options.num_shards);
        let request = SegmenterRequest {
            doc_id,
            shard,
            document,
            persist,
        };
        if self.segmenter_queue.send(request).is_err() {
            self.indexing_requests.fetch_sub(1, Ordering::Relaxed);
            warn!(target: "loupe::engine", doc_id, "index request dropped: engine is closed");
        }
    }

    /// Block until every accepted request has passed through the indexer
    /// and ranker (and the persistence worker, when enabled).
    pub(crate) fn flush(&self) {
        loop {
            std::thread::yield_now();
            let requests = self.indexing_requests.load(Ordering::Acquire);
            let indexed = self.documents_indexed.load(Ordering::Acquire);
            let removals = self.removal_requests.load(Ordering::Acquire);
            let removed = self.removals_processed.load(Ordering::Acquire);
            if requests == indexed
                && removals == removed
                && (!self.persistent || requests == self.documents_stored.load(Ordering::Acquire))
            {
                return;
            }
        }
    }

    /// Segment text and drop stop tokens, in query-token form.
    pub(crate) fn segment_text(&self, text: &str) -> Vec<String> {
        self.segmenter
            .segment(text)
            .into_iter()
            .map(|segment| segment.text)
            .filter(|token| !self.stop_tokens.is_stop_token(token))
            .collect()
    }

    fn close_mailboxes(&self) {
        self.segmenter_queue.close();
        for mailbox in &self.index_add {
            mailbox.close();
        }
        for mailbox in &self.index_remove {
            mailbox.close();
        }
        for mailbox in &self.index_lookup {
            mailbox.close();
        }
        for mailbox in &self.ranker_add {
            mailbox.close();
        }
        for mailbox in &self.ranker_remove {
            mailbox.close();
        }
        for mailbox in &self.ranker_rank {
            mailbox.close();
        }
        for mailbox in &self.persist_queues {
            mailbox.close();
        }
    }
}

/// The search engine front.
///
/// All methods take `&self` and are safe to call from any thread.
pub struct Engine {
    core: Arc<EngineCore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Engine {
    /// Build an engine: load the dictionary and stop tokens, create the
    /// shards, open the stores and spawn the workers. When persistence is
    /// enabled, previously stored documents are replayed before this
    /// returns, so the first search already sees them.
    pub fn new(options: EngineOptions) -> EngineResult<Engine> {
        let options = options.normalized();
        if options.use_persistent_storage && options.persistent_storage_folder.as_os_str().is_empty()
        {
            return Err(EngineError::Config(
                "persistent storage enabled without a storage folder".to_string(),
            ));
        }

        let segmenter = if options.segmenter_dictionaries.is_empty() {
            Segmenter::empty()
        } else {
            Segmenter::from_files(&options.segmenter_dictionaries)?
        };
        let stop_tokens = match &options.stop_token_file {
            Some(path) => StopTokens::from_file(path)?,
            None => StopTokens::default(),
        };

        let num_shards = options.num_shards;
        let indexers: Vec<Indexer> = (0..num_shards)
            .map(|_| Indexer::new(options.indexer_options))
            .collect();
        let rankers: Vec<Ranker> = (0..num_shards).map(|_| Ranker::new()).collect();

        let stores = if options.use_persistent_storage {
            std::fs::create_dir_all(&options.persistent_storage_folder).map_err(|source| {
                EngineError::StorageFolder {
                    path: options.persistent_storage_folder.clone(),
                    source,
                }
            })?;
            let mut shard_stores = Vec::with_capacity(num_shards);
            for shard in 0..num_shards {
                let folder = &options.persistent_storage_folder;
                let info = KvStore::open(
                    &folder.join(format!("{PERSISTENT_STORAGE_FILE_PREFIX}.info.{shard}")),
                )?;
                let index = KvStore::open(
                    &folder.join(format!("{PERSISTENT_STORAGE_FILE_PREFIX}.index.{shard}")),
                )?;
                shard_stores.push(ShardStores { info, index });
            }
            Some(shard_stores)
        } else {
            None
        };

        fn per_shard<T>(num_shards: usize, capacity: usize) -> Vec<Mailbox<T>> {
            (0..num_shards).map(|_| Mailbox::new(capacity)).collect()
        }
        let core = Arc::new(EngineCore {
            segmenter,
            stop_tokens,
            indexers,
            rankers,
            persistent: options.use_persistent_storage,
            stores: RwLock::new(stores),
            segmenter_queue: Mailbox::new(options.num_segmenter_threads),
            index_add: per_shard(num_shards, options.indexer_buffer_length),
            index_remove: per_shard(num_shards, options.indexer_buffer_length),
            index_lookup: per_shard(num_shards, options.indexer_buffer_length),
            ranker_add: per_shard(num_shards, options.ranker_buffer_length),
            ranker_remove: per_shard(num_shards, options.ranker_buffer_length),
            ranker_rank: per_shard(num_shards, options.ranker_buffer_length),
            persist_queues: per_shard(num_shards, options.indexer_buffer_length),
            recovery_barrier: Mailbox::new(num_shards),
            indexing_requests: AtomicU64::new(0),
            documents_indexed: AtomicU64::new(0),
            token_index_added: AtomicU64::new(0),
            documents_stored: AtomicU64::new(0),
            removal_requests: AtomicU64::new(0),
            removals_processed: AtomicU64::new(0),
            options,
        });

        let mut worker_handles = Vec::new();
        for i in 0..core.options.num_segmenter_threads {
            let core = Arc::clone(&core);
            worker_handles.push(spawn_worker(format!("loupe-seg-{i}"), move || {
                workers::segmenter_worker(core)
            }));
        }
        for shard in 0..num_shards {
            let c = Arc::clone(&core);
            worker_handles.push(spawn_worker(format!("loupe-idx-add-{shard}"), move || {
                workers::index_add_worker(c, shard)
            }));
            let c = Arc::clone(&core);
            worker_handles.push(spawn_worker(format!("loupe-idx-rm-{shard}"), move || {
                workers::index_remove_worker(c, shard)
            }));
            let c = Arc::clone(&core);
            worker_handles.push(spawn_worker(format!("loupe-rank-add-{shard}"), move || {
                workers::ranker_add_worker(c, shard)
            }));
            let c = Arc::clone(&core);
            worker_handles.push(spawn_worker(format!("loupe-rank-rm-{shard}"), move || {
                workers::ranker_remove_worker(c, shard)
            }));
            for i in 0..core.options.num_indexer_threads_per_shard {
                let c = Arc::clone(&core);
                worker_handles.push(spawn_worker(
                    format!("loupe-lookup-{shard}-{i}"),
                    move || workers::lookup_worker(c, shard),
                ));
            }
            for i in 0..core.options.num_ranker_threads_per_shard {
                let c = Arc::clone(&core);
                worker_handles.push(spawn_worker(format!("loupe-rank-{shard}-{i}"), move || {
                    workers::rank_worker(c, shard)
                }));
            }
        }

        if core.persistent {
            // Replay persisted documents through the pipeline, one recovery
            // worker per shard, then drain before opening the write path.
            let mut recovery_handles = Vec::with_capacity(num_shards);
            for shard in 0..num_shards {
                let c = Arc::clone(&core);
                recovery_handles.push(spawn_worker(format!("loupe-recover-{shard}"), move || {
                    let replayed = persist::recover_shard(&c, shard);
                    if replayed > 0 {
                        info!(target: "loupe::engine", shard, replayed, "shard recovered");
                    }
                    let _ = c.recovery_barrier.send(shard);
                }));
            }
            for _ in 0..num_shards {
                let _ = core.recovery_barrier.recv();
            }
            for handle in recovery_handles {
                let _ = handle.join();
            }
            core.flush();

            for shard in 0..num_shards {
                let c = Arc::clone(&core);
                worker_handles.push(spawn_worker(format!("loupe-persist-{shard}"), move || {
                    persist::persist_worker(c, shard)
                }));
            }
        }

        Ok(Engine {
            core,
            workers: Mutex::new(worker_handles),
            closed: AtomicBool::new(false),
        })
    }

    /// Queue a document for indexing and return immediately.
    ///
    /// The document may not be searchable yet when this returns; call
    /// [`flush_index`](Engine::flush_index) to wait for the pipeline to
    /// drain. Re-indexing an id updates it in place.
    pub fn index_document(&self, doc_id: DocId, document: Document) {
        self.core.enqueue_document(doc_id, document, true);
    }

    /// Remove a document from every shard's index and ranker, and from
    /// persistent storage. Asynchronous like indexing; `flush_index`
    /// waits for the removal to take effect everywhere.
    pub fn remove_document(&self, doc_id: DocId) {
        let core = &self.core;
        for shard in 0..core.options.num_shards {
            core.removal_requests.fetch_add(1, Ordering::Relaxed);
            if core.index_remove[shard].send(doc_id).is_err() {
                core.removal_requests.fetch_sub(1, Ordering::Relaxed);
            }
            core.removal_requests.fetch_add(1, Ordering::Relaxed);
            if core.ranker_remove[shard].send(doc_id).is_err() {
                core.removal_requests.fetch_sub(1, Ordering::Relaxed);
            }
        }
        if core.persistent {
            let home = shard_for_doc(doc_id, core.options.num_shards);
            core.removal_requests.fetch_add(1, Ordering::Relaxed);
            if core.persist_queues[home]
                .send(PersistRequest::Remove { doc_id })
                .is_err()
            {
                core.removal_requests.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }

    /// Run a conjunctive search across every shard and merge the results.
    pub fn search(&self, request: SearchRequest) -> SearchResponse {
        let core = &self.core;
        let defaults = &core.options.default_rank_options;
        let (criteria, output_offset, max_outputs, reverse_order) = match &request.rank_options {
            Some(options) => (
                options
                    .scoring_criteria
                    .clone()
                    .or_else(|| defaults.scoring_criteria.clone()),
                options.output_offset,
                options.max_outputs,
                options.reverse_order,
            ),
            None => (
                defaults.scoring_criteria.clone(),
                defaults.output_offset,
                defaults.max_outputs,
                defaults.reverse_order,
            ),
        };
        let criteria: Arc<dyn ScoringCriteria> =
            criteria.unwrap_or_else(|| Arc::new(RankByBm25));

        let tokens = if !request.text.is_empty() {
            core.segment_text(&request.text)
        } else {
            request.tokens.clone()
        };

        let num_shards = core.options.num_shards;
        // Sized to the shard count so late repliers never block: a reply
        // arriving after a timeout is simply dropped with the mailbox.
        let reply: Mailbox<RankerOutput> = Mailbox::new(num_shards);
        let lookup = LookupRequest {
            tokens: tokens.clone(),
            labels: request.labels.clone(),
            doc_ids: request.doc_ids.clone().map(Arc::new),
            count_docs_only: request.count_docs_only,
            orderless: request.orderless,
            reverse_order,
            criteria,
            reply: reply.clone(),
        };

        let mut dispatched = 0;
        for shard in 0..num_shards {
            if core.index_lookup[shard].send(lookup.clone()).is_ok() {
                dispatched += 1;
            }
        }

        let mut docs = Vec::new();
        let mut num_docs = 0;
        let mut timeout = false;
        if request.timeout_ms <= 0 {
            for _ in 0..dispatched {
                match reply.recv() {
                    Some(output) => {
                        if !request.count_docs_only {
                            docs.extend(output.docs);
                        }
                        num_docs += output.num_docs;
                    }
                    None => break,
                }
            }
        } else {
            let deadline = Instant::now() + Duration::from_millis(request.timeout_ms as u64);
            for _ in 0..dispatched {
                match reply.recv_deadline(deadline) {
                    Ok(output) => {
                        if !request.count_docs_only {
                            docs.extend(output.docs);
                        }
                        num_docs += output.num_docs;
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        timeout = true;
                        break;
                    }
                    Err(RecvTimeoutError::Closed) => break,
                }
            }
        }

        if !request.count_docs_only && !request.orderless {
            sort_scored_documents(&mut docs, reverse_order);
        }

        let docs = if request.count_docs_only {
            Vec::new()
        } else if request.orderless {
            docs
        } else {
            let start = output_offset.min(docs.len());
            let end = if max_outputs == 0 {
                docs.len()
            } else {
                (start + max_outputs).min(docs.len())
            };
            docs[start..end].to_vec()
        };

        SearchResponse {
            tokens,
            docs,
            num_docs,
            timeout,
        }
    }

    /// Block until every accepted index request is fully processed (and
    /// persisted, when persistence is enabled).
    pub fn flush_index(&self) {
        self.core.flush();
    }

    /// Segment text and drop stop tokens, without touching the index.
    pub fn segment_text(&self, text: &str) -> Vec<String> {
        self.core.segment_text(text)
    }

    /// Up to 10 indexed tokens starting with `prefix`, gathered from the
    /// persisted index stores. Empty when persistence is disabled.
    pub fn suggestion(&self, prefix: &str) -> Vec<String> {
        let stores_guard = self.core.stores.read();
        let Some(stores) = stores_guard.as_ref() else {
            return Vec::new();
        };

        let mut suggestions: Vec<String> = Vec::new();
        for (shard, shard_stores) in stores.iter().enumerate() {
            let scan = shard_stores.index.for_each(|key, _| {
                if let Some(token) = codec::token_from_key(key) {
                    if token.starts_with(prefix) && !suggestions.iter().any(|s| s == token) {
                        suggestions.push(token.to_string());
                        if suggestions.len() >= MAX_SUGGESTIONS {
                            return false;
                        }
                    }
                }
                true
            });
            if let Err(error) = scan {
                warn!(target: "loupe::engine", shard, %error, "suggestion scan failed");
            }
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
        }
        suggestions
    }

    /// Flush, stop every worker and release the stores. Idempotent; also
    /// invoked on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.flush();
        self.core.close_mailboxes();

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }

        for indexer in &self.core.indexers {
            indexer.clear();
        }
        for ranker in &self.core.rankers {
            ranker.clear();
        }
        // Dropping the stores releases the database files, so the same
        // folder can be reopened by a new engine.
        *self.core.stores.write() = None;
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// Index requests accepted so far.
    pub fn num_indexing_requests(&self) -> u64 {
        self.core.indexing_requests.load(Ordering::Acquire)
    }

    /// Documents fully processed by indexer and ranker.
    pub fn num_documents_indexed(&self) -> u64 {
        self.core.documents_indexed.load(Ordering::Acquire)
    }

    /// Token postings written to the inverted indexes.
    pub fn num_token_index_added(&self) -> u64 {
        self.core.token_index_added.load(Ordering::Acquire)
    }

    /// Documents written to persistent storage (or replayed from it).
    pub fn num_documents_stored(&self) -> u64 {
        self.core.documents_stored.load(Ordering::Acquire)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("num_shards", &self.core.options.num_shards)
            .field("persistent", &self.core.persistent)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

fn spawn_worker(name: String, work: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name)
        .spawn(work)
        .expect("failed to spawn engine worker thread")
}
