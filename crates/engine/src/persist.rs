//! Persistent storage and recovery
//!
//! Each shard owns two stores. `info` maps a doc id to the full document
//! record and is the recovery source of truth; `index` holds one empty
//! marker per (doc id, token) pair, a denormalization used by removal scans
//! and suggestion. A crash between the two writes is tolerated: the next
//! start rebuilds everything from `info`.
//!
//! Per-operation failures after startup are logged and dropped; the
//! in-memory index stays authoritative and the next recovery reconciles.

use crate::engine::EngineCore;
use loupe_core::{DocId, Document, FieldsRegistry, TokenData};
use loupe_storage::codec;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

/// Work for a shard's persistence worker.
pub(crate) enum PersistRequest {
    /// Write a freshly indexed document.
    Store {
        doc_id: DocId,
        document: Document,
        /// Every indexed token and label, for the `index` store markers.
        tokens: Vec<String>,
    },
    /// Erase a removed document.
    Remove { doc_id: DocId },
}

/// The on-disk form of a document, bincode-encoded into the `info` store.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    content: String,
    tokens: Vec<TokenData>,
    labels: Vec<String>,
    fields: Option<StoredFields>,
}

/// A field payload encoded through the registry: the registered type name
/// plus the payload bytes.
#[derive(Debug, Serialize, Deserialize)]
struct StoredFields {
    type_name: String,
    bytes: Vec<u8>,
}

fn encode_document(doc_id: DocId, document: &Document, registry: &FieldsRegistry) -> Option<Vec<u8>> {
    let fields = match &document.fields {
        Some(handle) => match registry.encode(handle) {
            Some((type_name, bytes)) => Some(StoredFields { type_name, bytes }),
            None => {
                warn!(
                    target: "loupe::persist",
                    doc_id,
                    "fields type not registered; persisting document without fields"
                );
                None
            }
        },
        None => None,
    };

    let record = StoredDocument {
        content: document.content.clone(),
        tokens: document.tokens.clone(),
        labels: document.labels.clone(),
        fields,
    };
    match bincode::serialize(&record) {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            warn!(target: "loupe::persist", doc_id, %error, "failed to encode document");
            None
        }
    }
}

fn decode_document(bytes: &[u8], registry: &FieldsRegistry) -> Option<Document> {
    let record: StoredDocument = bincode::deserialize(bytes).ok()?;
    let fields = record
        .fields
        .and_then(|f| registry.decode(&f.type_name, &f.bytes));
    Some(Document {
        content: record.content,
        tokens: record.tokens,
        labels: record.labels,
        fields,
    })
}

/// Per-shard persistence worker: applies store/remove requests in arrival
/// order, which serializes a shard's on-disk mutations the same way the add
/// worker serializes its in-memory ones.
pub(crate) fn persist_worker(core: Arc<EngineCore>, shard: usize) {
    while let Some(request) = core.persist_queues[shard].recv() {
        let stores_guard = core.stores.read();
        let Some(stores) = stores_guard.as_ref() else {
            return;
        };
        let shard_stores = &stores[shard];

        match request {
            PersistRequest::Store {
                doc_id,
                document,
                tokens,
            } => {
                // Count the document handled even when a write fails: the
                // in-memory index is authoritative and the flush barrier
                // must not wait on a dead disk.
                if let Some(value) =
                    encode_document(doc_id, &document, &core.options.fields_registry)
                {
                    match shard_stores.info.set(&codec::doc_key(doc_id), &value) {
                        Ok(()) => {
                            for token in &tokens {
                                if let Err(error) = shard_stores
                                    .index
                                    .set(&codec::token_key(doc_id, token), b"")
                                {
                                    warn!(target: "loupe::persist", doc_id, shard, %error, "index write failed");
                                }
                            }
                        }
                        Err(error) => {
                            warn!(target: "loupe::persist", doc_id, shard, %error, "info write failed");
                        }
                    }
                }
                core.documents_stored.fetch_add(1, Ordering::Relaxed);
            }
            PersistRequest::Remove { doc_id } => {
                if let Err(error) = shard_stores.info.delete(&codec::doc_key(doc_id)) {
                    warn!(target: "loupe::persist", doc_id, shard, %error, "info delete failed");
                }
                let prefix = codec::doc_prefix(doc_id);
                let mut stale_keys: Vec<Vec<u8>> = Vec::new();
                let scan = shard_stores.index.for_each(|key, _| {
                    if key.starts_with(&prefix) {
                        stale_keys.push(key.to_vec());
                    }
                    true
                });
                if let Err(error) = scan {
                    warn!(target: "loupe::persist", doc_id, shard, %error, "index scan failed");
                }
                if let Err(error) = shard_stores.index.delete_batch(&stale_keys) {
                    warn!(target: "loupe::persist", doc_id, shard, %error, "index delete failed");
                }
                core.removals_processed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Replay one shard's `info` store through the indexing pipeline.
///
/// Replayed documents re-enter via the normal segmenter path but with the
/// persist flag off, so recovery never rewrites what it just read.
/// Malformed records are logged and skipped. Returns the number of
/// documents replayed.
pub(crate) fn recover_shard(core: &Arc<EngineCore>, shard: usize) -> u64 {
    let mut records: Vec<(DocId, Vec<u8>)> = Vec::new();
    {
        let stores_guard = core.stores.read();
        let Some(stores) = stores_guard.as_ref() else {
            return 0;
        };
        let scan = stores[shard].info.for_each(|key, value| {
            match codec::doc_id_from_key(key) {
                Some(doc_id) => records.push((doc_id, value.to_vec())),
                None => {
                    warn!(target: "loupe::persist", shard, "skipping malformed info key");
                }
            }
            true
        });
        if let Err(error) = scan {
            warn!(target: "loupe::persist", shard, %error, "recovery scan failed");
        }
    }

    let mut replayed = 0;
    for (doc_id, bytes) in records {
        match decode_document(&bytes, &core.options.fields_registry) {
            Some(document) => {
                core.enqueue_document(doc_id, document, false);
                replayed += 1;
            }
            None => {
                warn!(
                    target: "loupe::persist",
                    doc_id, shard,
                    "skipping malformed recovery record"
                );
            }
        }
    }
    replayed
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_core::FieldsHandle;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Boost(f32);

    #[test]
    fn test_document_round_trip_with_fields() {
        let mut registry = FieldsRegistry::new();
        registry.register::<Boost>("boost");

        let document = Document {
            content: "中国人口".to_string(),
            tokens: vec![TokenData::new("中国", vec![0])],
            labels: vec!["geo".to_string()],
            fields: Some(Arc::new(Boost(2.5)) as FieldsHandle),
        };

        let bytes = encode_document(1, &document, &registry).unwrap();
        let decoded = decode_document(&bytes, &registry).unwrap();

        assert_eq!(decoded.content, "中国人口");
        assert_eq!(decoded.tokens, document.tokens);
        assert_eq!(decoded.labels, document.labels);
        let boost = decoded.fields.unwrap();
        assert_eq!(boost.downcast_ref::<Boost>(), Some(&Boost(2.5)));
    }

    #[test]
    fn test_unregistered_fields_dropped_not_fatal() {
        let registry = FieldsRegistry::new();
        let document =
            Document::from_content("text").with_fields(Arc::new(Boost(1.0)) as FieldsHandle);

        let bytes = encode_document(1, &document, &registry).unwrap();
        let decoded = decode_document(&bytes, &registry).unwrap();
        assert!(decoded.fields.is_none());
    }

    #[test]
    fn test_malformed_record_decodes_to_none() {
        let registry = FieldsRegistry::new();
        assert!(decode_document(&[0xde, 0xad, 0xbe, 0xef], &registry).is_none());
    }
}
