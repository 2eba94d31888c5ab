//! Persisted key layout
//!
//! Info store keys are the 8-byte big-endian document id, so iteration
//! order is ascending doc id. Index store keys append a `0x00` separator
//! and the token's UTF-8 bytes:
//!
//! ```text
//! info  key: [doc_id BE; 8]
//! index key: [doc_id BE; 8] 0x00 [token bytes]
//! ```
//!
//! The separator byte never occurs inside valid UTF-8 token text, so the
//! token portion of an index key is unambiguous. All of a document's index
//! keys share the 9-byte prefix returned by [`doc_prefix`], which is what
//! removal scans filter on.

use loupe_core::DocId;

/// Separator between the doc id prefix and the token bytes.
pub const TOKEN_SEPARATOR: u8 = 0x00;

/// Info store key for a document.
pub fn doc_key(doc_id: DocId) -> [u8; 8] {
    doc_id.to_be_bytes()
}

/// Prefix shared by all of a document's index keys.
pub fn doc_prefix(doc_id: DocId) -> [u8; 9] {
    let id = doc_id.to_be_bytes();
    [
        id[0],
        id[1],
        id[2],
        id[3],
        id[4],
        id[5],
        id[6],
        id[7],
        TOKEN_SEPARATOR,
    ]
}

/// Index store key linking a document to one of its tokens.
pub fn token_key(doc_id: DocId, token: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(9 + token.len());
    key.extend_from_slice(&doc_key(doc_id));
    key.push(TOKEN_SEPARATOR);
    key.extend_from_slice(token.as_bytes());
    key
}

/// Doc id from an info or index key.
pub fn doc_id_from_key(key: &[u8]) -> Option<DocId> {
    let bytes: [u8; 8] = key.get(..8)?.try_into().ok()?;
    Some(DocId::from_be_bytes(bytes))
}

/// Token portion of an index key.
pub fn token_from_key(key: &[u8]) -> Option<&str> {
    if key.len() < 9 || key[8] != TOKEN_SEPARATOR {
        return None;
    }
    std::str::from_utf8(&key[9..]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_key_orders_by_id() {
        assert!(doc_key(1) < doc_key(2));
        assert!(doc_key(255) < doc_key(256));
    }

    #[test]
    fn test_token_key_round_trip() {
        let key = token_key(42, "中国");
        assert_eq!(doc_id_from_key(&key), Some(42));
        assert_eq!(token_from_key(&key), Some("中国"));
    }

    #[test]
    fn test_token_keys_share_doc_prefix() {
        let prefix = doc_prefix(7);
        assert!(token_key(7, "alpha").starts_with(&prefix));
        assert!(token_key(7, "beta").starts_with(&prefix));
        assert!(!token_key(8, "alpha").starts_with(&prefix));
    }

    #[test]
    fn test_info_key_is_not_a_token_key() {
        assert_eq!(token_from_key(&doc_key(7)), None);
    }

    #[test]
    fn test_empty_token() {
        let key = token_key(1, "");
        assert_eq!(token_from_key(&key), Some(""));
    }
}
