//! Dictionary-based text segmentation
//!
//! Pipeline: split text into Han spans and everything else. Han spans are
//! segmented by frequency-weighted shortest path over dictionary words
//! (unknown characters fall back to single-character tokens at a fixed
//! penalty). Other spans go through UAX#29 word boundaries, so Latin words,
//! numbers and contractions come out the way a standard tokenizer would
//! produce them.
//!
//! Every emitted segment carries the byte offset of its first character in
//! the original text; these are the positions the locations index stores
//! and snippet computation reports.

mod dictionary;
mod stop_tokens;

pub use dictionary::Dictionary;
pub use stop_tokens::StopTokens;

use loupe_core::EngineResult;
use std::path::PathBuf;
use unicode_segmentation::UnicodeSegmentation;

/// One token produced by segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset of the token in the original text.
    pub start: usize,
    /// Token text.
    pub text: String,
}

/// Dictionary-backed segmenter.
#[derive(Debug, Default)]
pub struct Segmenter {
    dictionary: Dictionary,
}

impl Segmenter {
    /// Load dictionaries from disk.
    pub fn from_files(paths: &[PathBuf]) -> EngineResult<Self> {
        Ok(Segmenter {
            dictionary: Dictionary::load(paths)?,
        })
    }

    /// Segmenter with no dictionary: Han text degrades to single-character
    /// tokens, everything else still follows UAX#29 boundaries.
    pub fn empty() -> Self {
        Segmenter::default()
    }

    /// Number of dictionary words loaded.
    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }

    /// Segment `text` into tokens with byte offsets.
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut span_start = 0;
        let mut span_is_han = false;

        for (offset, ch) in text.char_indices() {
            let han = is_han(ch);
            if offset == 0 {
                span_is_han = han;
                continue;
            }
            if han != span_is_han {
                self.segment_span(text, span_start, offset, span_is_han, &mut segments);
                span_start = offset;
                span_is_han = han;
            }
        }
        if span_start < text.len() {
            self.segment_span(text, span_start, text.len(), span_is_han, &mut segments);
        }
        segments
    }

    fn segment_span(
        &self,
        text: &str,
        start: usize,
        end: usize,
        han: bool,
        out: &mut Vec<Segment>,
    ) {
        if han {
            self.segment_han(text, start, end, out);
        } else {
            for (offset, word) in text[start..end].unicode_word_indices() {
                out.push(Segment {
                    start: start + offset,
                    text: word.to_string(),
                });
            }
        }
    }

    /// Frequency-weighted shortest-path segmentation of a Han span.
    ///
    /// Dynamic program over character boundaries: an edge per dictionary
    /// word starting at a boundary, plus a single-character fallback edge,
    /// maximizing the summed log-probability of the path.
    fn segment_han(&self, text: &str, start: usize, end: usize, out: &mut Vec<Segment>) {
        let span = &text[start..end];
        let offsets: Vec<usize> = span.char_indices().map(|(i, _)| i).collect();
        let n = offsets.len();
        if n == 0 {
            return;
        }
        let byte_end = |j: usize| if j == n { span.len() } else { offsets[j] };

        let mut best = vec![f64::NEG_INFINITY; n + 1];
        let mut back = vec![0usize; n + 1];
        best[0] = 0.0;

        for i in 0..n {
            let limit = (i + self.dictionary.max_word_chars()).min(n);
            for j in (i + 1)..=limit {
                let word = &span[offsets[i]..byte_end(j)];
                let log_prob = match self.dictionary.log_prob(word) {
                    Some(lp) => lp,
                    // Only single characters may fall back out-of-vocabulary.
                    None if j == i + 1 => self.dictionary.oov_log_prob(),
                    None => continue,
                };
                let score = best[i] + log_prob;
                if score > best[j] {
                    best[j] = score;
                    back[j] = i;
                }
            }
        }

        let mut bounds = Vec::new();
        let mut j = n;
        while j > 0 {
            let i = back[j];
            bounds.push((i, j));
            j = i;
        }
        bounds.reverse();

        for (i, j) in bounds {
            out.push(Segment {
                start: start + offsets[i],
                text: span[offsets[i]..byte_end(j)].to_string(),
            });
        }
    }
}

/// Han ideograph check (URO, extension A, compatibility block).
fn is_han(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}
