//! Segmentation dictionary
//!
//! Dictionary files are UTF-8 text, one entry per line: `word frequency
//! pos`. Frequency and part-of-speech are optional; missing frequencies
//! default to 1. Entry frequencies are normalized into log-probabilities at
//! load time, which is what the shortest-path segmentation maximizes.

use loupe_core::{EngineError, EngineResult};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Log-probability penalty below the rarest dictionary word applied to
/// out-of-vocabulary single characters. Large enough that any in-dictionary
/// path beats a path through an unknown character.
const OOV_LOG_PENALTY: f64 = 10.0;

/// An in-memory segmentation dictionary.
#[derive(Debug, Default)]
pub struct Dictionary {
    words: FxHashMap<String, f64>,
    max_word_chars: usize,
    min_log_prob: f64,
}

impl Dictionary {
    /// Load and merge the given dictionary files.
    pub fn load(paths: &[PathBuf]) -> EngineResult<Self> {
        let mut frequencies: FxHashMap<String, f64> = FxHashMap::default();
        for path in paths {
            Self::load_file(path, &mut frequencies)?;
        }

        let total: f64 = frequencies.values().sum();
        let mut words = FxHashMap::default();
        let mut max_word_chars = 0;
        let mut min_log_prob = 0.0f64;
        for (word, freq) in frequencies {
            let log_prob = (freq / total).ln();
            min_log_prob = min_log_prob.min(log_prob);
            max_word_chars = max_word_chars.max(word.chars().count());
            words.insert(word, log_prob);
        }

        Ok(Dictionary {
            words,
            max_word_chars,
            min_log_prob,
        })
    }

    fn load_file(path: &Path, frequencies: &mut FxHashMap<String, f64>) -> EngineResult<()> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Dictionary {
            path: path.to_path_buf(),
            source,
        })?;

        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let frequency = parts
                .next()
                .and_then(|f| f.parse::<f64>().ok())
                .unwrap_or(1.0)
                .max(1.0);
            // Remaining column is the part-of-speech tag, unused here.
            *frequencies.entry(word.to_string()).or_insert(0.0) += frequency;
        }
        Ok(())
    }

    /// Log-probability of a dictionary word, `None` for unknown words.
    pub fn log_prob(&self, word: &str) -> Option<f64> {
        self.words.get(word).copied()
    }

    /// Log-probability charged to an out-of-vocabulary single character.
    pub fn oov_log_prob(&self) -> f64 {
        self.min_log_prob - OOV_LOG_PENALTY
    }

    /// Length in characters of the longest dictionary word.
    pub fn max_word_chars(&self) -> usize {
        self.max_word_chars.max(1)
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when no dictionary was loaded.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
