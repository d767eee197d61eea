//! # Stage: SpanResolver
//!
//! ## Responsibility
//! Locate an AI-returned annotation's approximate text inside the exact
//! source text and produce a character span. Strategies are tried in a fixed
//! priority order, cheapest and most precise first: trusted offsets, exact
//! substring, case-insensitive, punctuation-stripped fuzzy, and finally a
//! strided word-overlap scan.
//!
//! ## Guarantees
//! - Deterministic: the same (source, annotation) pair always resolves to the
//!   same span and strategy
//! - Non-panicking: every failure is expressed as `None`, never an error
//! - All offsets are character offsets, valid for any Unicode source text
//! - Word-overlap cost is linear in source length (stride-based sampling)
//!
//! ## NOT Responsible For
//! - Overlap handling between spans (see `reconcile`)
//! - Rendering (see `render`)

use serde::Serialize;

use crate::annotations::Annotation;

/// Half-width of the local window the fuzzy strategy re-searches when
/// refining an approximate word-boundary position.
const FUZZY_REFINE_WINDOW: usize = 50;

/// Step between candidate windows in the word-overlap scan.
const WORD_OVERLAP_STRIDE: usize = 10;

/// Minimum share of the annotation text length a word-overlap window must
/// cover, in percent.
const WORD_OVERLAP_THRESHOLD_PCT: usize = 60;

// ---------------------------------------------------------------------------
// Strategy and ResolvedSpan
// ---------------------------------------------------------------------------

/// Which matching strategy located a span. Recorded for diagnostics and
/// exposed in JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Offset,
    Exact,
    CaseInsensitive,
    Fuzzy,
    WordOverlap,
    Unresolved,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Offset => write!(f, "offset"),
            Strategy::Exact => write!(f, "exact"),
            Strategy::CaseInsensitive => write!(f, "case-insensitive"),
            Strategy::Fuzzy => write!(f, "fuzzy"),
            Strategy::WordOverlap => write!(f, "word-overlap"),
            Strategy::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// An annotation located in the source text: a character range plus the
/// strategy that found it. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSpan {
    pub start: usize,
    pub end: usize,
    pub strategy: Strategy,
    pub annotation: Annotation,
}

impl ResolvedSpan {
    fn located(start: usize, end: usize, strategy: Strategy, annotation: &Annotation) -> Self {
        ResolvedSpan { start, end, strategy, annotation: annotation.clone() }
    }
}

// ---------------------------------------------------------------------------
// Character-offset helpers
// ---------------------------------------------------------------------------

/// Number of characters in `s`. All public span offsets count characters,
/// not bytes, so Cyrillic and other multi-byte text gets correct spans.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Slice `s` by character offsets. Out-of-range offsets are clamped.
pub fn slice_chars(s: &str, start: usize, end: usize) -> &str {
    let b0 = byte_of_char(s, start);
    let b1 = byte_of_char(s, end.max(start));
    &s[b0..b1]
}

fn byte_of_char(s: &str, idx: usize) -> usize {
    s.char_indices().nth(idx).map(|(b, _)| b).unwrap_or(s.len())
}

fn char_of_byte(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

/// Per-character lowercase mapping. Keeps character counts identical to the
/// input (only the first char of a multi-char lowercase expansion is kept),
/// so character indices in the result line up with the original.
fn lower_chars(s: &str) -> String {
    s.chars().map(|c| c.to_lowercase().next().unwrap_or(c)).collect()
}

/// Normalize text for fuzzy matching: lowercase, drop everything that is
/// neither alphanumeric nor whitespace, collapse whitespace runs to a single
/// space, trim.
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    let mut last_was_space = false;

    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else if ch.is_alphanumeric() {
            result.push(ch);
            last_was_space = false;
        }
        // punctuation and symbols are dropped
    }

    result.trim_matches(' ').to_string()
}

/// Character spans `(start, end)` of every whitespace-delimited word in
/// `source` that contains at least one alphanumeric character. Pure
/// punctuation runs are skipped so word indices line up with `clean_text`
/// output, where those runs vanish entirely.
fn word_spans(source: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut has_alnum = false;
    let mut idx = 0;

    for ch in source.chars() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                if has_alnum {
                    spans.push((s, idx));
                }
            }
            has_alnum = false;
        } else {
            if start.is_none() {
                start = Some(idx);
            }
            if ch.is_alphanumeric() {
                has_alnum = true;
            }
        }
        idx += 1;
    }
    if let Some(s) = start {
        if has_alnum {
            spans.push((s, idx));
        }
    }
    spans
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Locate `annotation` in `source`, trying each strategy in priority order.
///
/// Returns `None` when the annotation cannot be placed: empty source,
/// annotation text shorter than 2 characters with no valid offsets, or no
/// strategy matching. Callers drop and count such annotations; resolution
/// failure is never an error.
pub fn resolve(source: &str, annotation: &Annotation) -> Option<ResolvedSpan> {
    if source.is_empty() {
        return None;
    }
    let total = char_len(source);

    // 1. Trusted offsets. Valid offsets win without any text validation —
    //    the backend computed them against this exact source text.
    if let (Some(start), Some(end)) = (annotation.char_start, annotation.char_end) {
        if start < end && end <= total {
            return Some(ResolvedSpan::located(start, end, Strategy::Offset, annotation));
        }
    }

    let needle = annotation.text.trim();
    let needle_len = char_len(needle);
    if needle_len < 2 {
        return None;
    }

    // 2. Exact, case-sensitive.
    if let Some(b) = source.find(needle) {
        let start = char_of_byte(source, b);
        return Some(ResolvedSpan::located(start, start + needle_len, Strategy::Exact, annotation));
    }

    // 3. Case-insensitive.
    let lower_src = lower_chars(source);
    let lower_needle = lower_chars(needle);
    if let Some(b) = lower_src.find(&lower_needle) {
        let start = char_of_byte(&lower_src, b);
        return Some(ResolvedSpan::located(
            start,
            start + needle_len,
            Strategy::CaseInsensitive,
            annotation,
        ));
    }

    // 4. Fuzzy: punctuation-stripped, whitespace-collapsed.
    if let Some((start, end)) = fuzzy_match(source, needle) {
        return Some(ResolvedSpan::located(start, end, Strategy::Fuzzy, annotation));
    }

    // 5. Word-overlap, only for multi-word annotation text.
    if let Some((start, end)) = word_overlap_match(&lower_src, &lower_needle) {
        return Some(ResolvedSpan::located(start, end, Strategy::WordOverlap, annotation));
    }

    None
}

/// Search the cleaned source for the cleaned needle, map the hit back to a
/// word boundary in the original text, then refine by re-searching a small
/// local window for the exact original substring.
fn fuzzy_match(source: &str, needle: &str) -> Option<(usize, usize)> {
    let clean_src = clean_text(source);
    let clean_needle = clean_text(needle);
    if clean_needle.is_empty() {
        return None;
    }
    let hit = clean_src.find(&clean_needle)?;

    // Index of the word the match starts in, counted over the cleaned text.
    let prefix = &clean_src[..hit];
    let word_idx = if prefix.is_empty() || prefix.ends_with(' ') {
        prefix.split_whitespace().count()
    } else {
        prefix.split_whitespace().count().saturating_sub(1)
    };

    let words = word_spans(source);
    let (anchor_start, _) = *words.get(word_idx)?;

    // Refinement: the exact original substring may sit near the anchor even
    // though a global search missed it (leading/trailing garbage in the
    // annotation text, say). Re-search a bounded window.
    let needle_len = char_len(needle);
    let total = char_len(source);
    let win_start = anchor_start.saturating_sub(FUZZY_REFINE_WINDOW);
    let win_end = (anchor_start + FUZZY_REFINE_WINDOW + needle_len).min(total);
    let window = slice_chars(source, win_start, win_end);
    if let Some(b) = window.find(needle) {
        let start = win_start + char_of_byte(window, b);
        return Some((start, start + needle_len));
    }

    // Refinement missed: cover the same number of words as the needle,
    // starting at the anchor word.
    let word_count = clean_needle.split_whitespace().count();
    let last_idx = word_idx + word_count.saturating_sub(1);
    let (_, end) = *words.get(last_idx).or_else(|| words.last())?;
    if anchor_start < end {
        Some((anchor_start, end))
    } else {
        None
    }
}

/// Slide a fixed-size window across the source in `WORD_OVERLAP_STRIDE`
/// steps, scoring each window by the total character length of annotation
/// words it contains. The best window is accepted when its score reaches
/// `WORD_OVERLAP_THRESHOLD_PCT` of the annotation text length.
fn word_overlap_match(lower_src: &str, lower_needle: &str) -> Option<(usize, usize)> {
    let words: Vec<&str> = lower_needle.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }

    let needle_len = char_len(lower_needle);
    let src_chars: Vec<char> = lower_src.chars().collect();
    let total = src_chars.len();
    if total == 0 || needle_len == 0 {
        return None;
    }
    let window_len = needle_len.min(total);

    let mut best: Option<(usize, usize, usize)> = None; // (score, start, end)
    let mut start = 0;
    while start < total {
        let end = (start + window_len).min(total);
        let window: String = src_chars[start..end].iter().collect();
        let score: usize = words
            .iter()
            .filter(|w| window.contains(*w))
            .map(|w| w.chars().count())
            .sum();
        if best.map_or(true, |(s, _, _)| score > s) {
            best = Some((score, start, end));
        }
        start += WORD_OVERLAP_STRIDE;
    }

    let (score, start, end) = best?;
    if start < end && score * 100 >= needle_len * WORD_OVERLAP_THRESHOLD_PCT {
        Some((start, end))
    } else {
        None
    }
}
