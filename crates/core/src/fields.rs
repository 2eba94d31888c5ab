//! Codec registry for opaque scoring payloads
//!
//! Field payloads are `Arc<dyn Any>` handles in memory, but persistence has
//! to round-trip them through byte storage. Callers register each concrete
//! payload type under a stable name before constructing the engine; the
//! persisted record then carries `(name, bincode bytes)` and recovery
//! resolves the name back to a decoder.
//!
//! Payload types that are never persisted do not need registration. An
//! unregistered payload on a persisted document is stored without fields
//! (and logged by the persistence worker).

use crate::scoring::FieldsHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type EncodeFn = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Vec<u8>> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&[u8]) -> Option<FieldsHandle> + Send + Sync>;

struct FieldCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Registry mapping field payload types to their persisted encoding.
#[derive(Default, Clone)]
pub struct FieldsRegistry {
    by_name: HashMap<String, Arc<FieldCodec>>,
    by_type: HashMap<TypeId, String>,
}

impl FieldsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register payload type `T` under `name`.
    ///
    /// The name is the wire identifier: it must stay stable across restarts
    /// for previously persisted documents to decode. Registering a second
    /// type under the same name replaces the first.
    pub fn register<T>(&mut self, name: &str)
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        let codec = FieldCodec {
            encode: Box::new(|any: &(dyn Any + Send + Sync)| {
                any.downcast_ref::<T>()
                    .and_then(|value| bincode::serialize(value).ok())
            }),
            decode: Box::new(|bytes: &[u8]| {
                bincode::deserialize::<T>(bytes)
                    .ok()
                    .map(|value| Arc::new(value) as FieldsHandle)
            }),
        };
        self.by_type.insert(TypeId::of::<T>(), name.to_string());
        self.by_name.insert(name.to_string(), Arc::new(codec));
    }

    /// Encode a payload, returning its registered name and bytes.
    ///
    /// `None` when the payload's concrete type was never registered.
    pub fn encode(&self, fields: &FieldsHandle) -> Option<(String, Vec<u8>)> {
        let name = self.by_type.get(&fields.as_ref().type_id())?;
        let codec = self.by_name.get(name)?;
        (codec.encode)(fields.as_ref()).map(|bytes| (name.clone(), bytes))
    }

    /// Decode a persisted payload by its registered name.
    ///
    /// `None` for unknown names or undecodable bytes.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Option<FieldsHandle> {
        self.by_name.get(name).and_then(|codec| (codec.decode)(bytes))
    }

    /// Number of registered payload types.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when no payload type is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for FieldsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldsRegistry")
            .field("types", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}
