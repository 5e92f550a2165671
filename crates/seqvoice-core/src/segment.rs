//! Sentence Segmenter: splits mixed-punctuation text into sentence units.
//!
//! Single left-to-right scan over codepoints with a character buffer. Before scanning,
//! decimal points (`3.14`) are swapped for a private-use placeholder and list-marker dots
//! (`1. `, trailing `2.`) are dropped. During the scan, `...` is kept as one token, and a
//! terminator only closes a sentence when the lookahead heuristics agree:
//!
//! - closing bracket or quote next: boundary
//! - lowercase letter or digit next: no boundary (abbreviation-like)
//! - whitespace next: no boundary only if the first non-whitespace char is lowercase
//!
//! These are heuristics, not grammar. Terminators followed by capitalized or non-alphabetic
//! continuations split even where a human reader would not.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that may end a sentence (full-width and half-width forms).
pub const TERMINATORS: [char; 9] = ['。', '！', '？', '；', '.', '!', '?', ';', '…'];

/// Characters that confirm a boundary when they immediately follow a terminator.
const CLOSING_MARKS: [char; 7] = ['）', '」', '》', '】', ')', ']', '}'];

/// Stand-in for a protected decimal point while scanning.
const DECIMAL_PLACEHOLDER: char = '\u{E000}';

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d+)").expect("decimal pattern is valid"));

static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\s|$)").expect("list marker pattern is valid"));

/// True if `ch` is one of the sentence terminators.
pub fn is_terminator(ch: char) -> bool {
    TERMINATORS.contains(&ch)
}

fn is_digit(ch: char) -> bool {
    ch.is_numeric()
}

/// Trimmed content is non-empty and made only of digits.
fn is_digits_only(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty() && trimmed.chars().all(is_digit)
}

/// Split `text` into ordered, trimmed, non-empty sentences.
///
/// Pure and deterministic. Decimal points survive as `.`; list-marker dots are dropped.
pub fn segment(text: &str) -> Vec<String> {
    let protected = DECIMAL_RE.replace_all(text, format!("${{1}}{DECIMAL_PLACEHOLDER}${{2}}"));
    let prepared = LIST_MARKER_RE.replace_all(&protected, "${1}${2}");
    let chars: Vec<char> = prepared.chars().collect();

    let mut sentences = Vec::new();
    let mut buffer = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '.' && chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') {
            buffer.push_str("...");
            i += 3;
            continue;
        }

        if is_terminator(ch) {
            // Second chance for list markers the pre-pass could not see.
            if ch == '.' && is_digits_only(&buffer) {
                i += 1;
                continue;
            }

            buffer.push(ch);
            if is_boundary(&chars, i) {
                flush(&mut buffer, &mut sentences);
            }
        } else {
            buffer.push(ch);
        }

        i += 1;
    }

    if let Some(rest) = buffer.strip_suffix('.') {
        if is_digits_only(rest) {
            buffer.truncate(rest.len());
        }
    }
    flush(&mut buffer, &mut sentences);

    sentences
        .into_iter()
        .map(|s| s.replace(DECIMAL_PLACEHOLDER, "."))
        .collect()
}

/// Lookahead check for the terminator at `pos`.
fn is_boundary(chars: &[char], pos: usize) -> bool {
    let Some(&next) = chars.get(pos + 1) else {
        return true;
    };

    if CLOSING_MARKS.contains(&next) {
        return true;
    }
    if next.is_lowercase() || is_digit(next) {
        return false;
    }
    if next.is_whitespace() {
        let following = chars[pos + 1..].iter().find(|c| !c.is_whitespace());
        return !matches!(following, Some(c) if c.is_lowercase());
    }
    true
}

fn flush(buffer: &mut String, sentences: &mut Vec<String>) {
    let sentence = buffer.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
    buffer.clear();
}
