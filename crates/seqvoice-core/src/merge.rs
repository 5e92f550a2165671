//! Fragment Merger: folds too-short, unterminated fragments into the following sentence.

use crate::segment::{is_terminator, segment};

/// Fragments shorter than this many codepoints are merge candidates.
pub const DEFAULT_SHORT_FRAGMENT_THRESHOLD: usize = 10;

/// Merge with the default threshold.
pub fn merge<S: AsRef<str>>(sentences: &[S]) -> Vec<String> {
    merge_with_threshold(sentences, DEFAULT_SHORT_FRAGMENT_THRESHOLD)
}

/// Hold every sentence that is shorter than `threshold`, not last, and not terminated,
/// then concatenate the held run onto the next sentence that breaks the pattern.
/// No separator is inserted. Order is preserved.
pub fn merge_with_threshold<S: AsRef<str>>(sentences: &[S], threshold: usize) -> Vec<String> {
    let last = sentences.len().saturating_sub(1);
    let mut merged = Vec::with_capacity(sentences.len());
    let mut pending = String::new();

    for (idx, sentence) in sentences.iter().enumerate() {
        let sentence = sentence.as_ref();
        let short = sentence.chars().count() < threshold;
        let unterminated = sentence
            .chars()
            .last()
            .is_some_and(|ch| !is_terminator(ch));

        if short && idx != last && unterminated {
            pending.push_str(sentence);
            continue;
        }

        if pending.is_empty() {
            merged.push(sentence.to_string());
        } else {
            pending.push_str(sentence);
            merged.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        merged.push(pending);
    }
    merged
}

/// Segment then merge: the sentence list a task is created with.
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    short_fragment_threshold: usize,
}

impl SentenceSplitter {
    pub fn new(short_fragment_threshold: usize) -> Self {
        Self {
            short_fragment_threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.short_fragment_threshold
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        merge_with_threshold(&segment(text), self.short_fragment_threshold)
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_FRAGMENT_THRESHOLD)
    }
}
