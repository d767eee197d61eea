//! # Stage: SpanReconciler
//!
//! ## Responsibility
//! Maintain the canonical, non-overlapping, sorted set of resolved spans for
//! one source text. New batches are merged against the existing set by
//! sorting everything together and folding overlapping runs into single
//! spans.
//!
//! ## Guarantees
//! - The resulting set is always sorted by start and strictly non-overlapping
//! - Merging is a pure function: neither input is mutated
//! - When spans overlap, the first-accepted annotation wins; a later span can
//!   only extend the covered range, never replace the annotation
//! - Re-merging spans already covered by the set is a no-op

use serde::Serialize;

use crate::resolver::ResolvedSpan;

/// The canonical span set for one source text. Construct with `new`, grow
/// with `merge`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciledSet {
    spans: Vec<ResolvedSpan>,
}

impl ReconciledSet {
    pub fn new() -> Self {
        ReconciledSet { spans: Vec::new() }
    }

    /// Sorted, non-overlapping spans.
    pub fn spans(&self) -> &[ResolvedSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Merge `incoming` with the current set and return the result.
    ///
    /// All spans are sorted by start ascending; on a start tie the longer
    /// span sorts first so the fold below keeps the wider annotation. Spans
    /// whose start falls strictly before the previous accepted span's end are
    /// folded in, extending the accepted span's range but keeping its
    /// annotation. Adjacent spans (`start == prev.end`) stay separate so two
    /// back-to-back findings each keep their own annotation.
    pub fn merge(&self, incoming: Vec<ResolvedSpan>) -> ReconciledSet {
        let mut all: Vec<ResolvedSpan> =
            self.spans.iter().cloned().chain(incoming).collect();
        all.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut merged: Vec<ResolvedSpan> = Vec::with_capacity(all.len());
        for span in all {
            match merged.last_mut() {
                Some(prev) if span.start < prev.end => {
                    if span.end > prev.end {
                        prev.end = span.end;
                    }
                }
                _ => merged.push(span),
            }
        }

        ReconciledSet { spans: merged }
    }
}
