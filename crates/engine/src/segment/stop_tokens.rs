//! Stop-token filtering
//!
//! Stop tokens are dropped after segmentation, both when indexing document
//! content and when tokenizing query text. The file format is one token per
//! line, UTF-8.

use loupe_core::{EngineError, EngineResult};
use std::collections::HashSet;
use std::path::Path;

/// Set of tokens excluded from the index and from queries.
#[derive(Debug, Default)]
pub struct StopTokens {
    tokens: HashSet<String>,
}

impl StopTokens {
    /// Load a stop-token file.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::StopTokens {
            path: path.to_path_buf(),
            source,
        })?;

        let tokens = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(StopTokens { tokens })
    }

    /// True when `token` should be dropped.
    pub fn is_stop_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Number of stop tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no stop tokens are loaded.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
