//! # teampulse-highlight
//!
//! Streaming negotiation-analysis highlighting. An AI backend streams
//! annotations about a fixed source text; this crate locates each annotation
//! in the text (resolver), folds the located spans into one canonical
//! non-overlapping set (reconcile), and renders the text as alternating
//! plain and highlighted segments (render). [`AnalysisSession`] drives the
//! pipeline batch by batch and re-renders the full segment list after every
//! batch.

pub mod annotations;
pub mod cli;
pub mod error;
pub mod reconcile;
pub mod render;
pub mod resolver;
pub mod sessions;
pub mod stream;
pub mod web;

pub use annotations::{AnalysisStreamEvent, Annotation, Category, SegmentEvent};
pub use error::HighlightError;
pub use reconcile::ReconciledSet;
pub use render::{render, RenderSegment};
pub use resolver::{resolve, ResolvedSpan, Strategy};

use tokio::sync::mpsc;

/// Stateful highlighting pipeline for one source text.
///
/// Feed annotation batches with [`add_annotations`](Self::add_annotations)
/// or stream events with [`apply_event`](Self::apply_event); each batch
/// merges into the canonical span set and produces a complete re-render of
/// the source. Earlier-accepted annotations keep their spans when later
/// batches overlap them.
#[derive(Debug)]
pub struct AnalysisSession {
    source_text: String,
    reconciled: ReconciledSet,
    resolved_count: usize,
    dropped_count: usize,
    batch_count: usize,
    /// When set, every batch's segment snapshot is forwarded here. Used by
    /// the web server to fan renders out over SSE.
    pub event_tx: Option<mpsc::UnboundedSender<SegmentEvent>>,
    /// Label reported in forwarded snapshots, e.g. a dashboard client id.
    pub client_label: Option<String>,
}

impl AnalysisSession {
    pub fn new(source_text: impl Into<String>) -> Self {
        AnalysisSession {
            source_text: source_text.into(),
            reconciled: ReconciledSet::new(),
            resolved_count: 0,
            dropped_count: 0,
            batch_count: 0,
            event_tx: None,
            client_label: None,
        }
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn reconciled(&self) -> &ReconciledSet {
        &self.reconciled
    }

    /// Annotations successfully located so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved_count
    }

    /// Annotations that no strategy could place.
    pub fn dropped_count(&self) -> usize {
        self.dropped_count
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// Render the current span set without ingesting anything.
    pub fn segments(&self) -> Vec<RenderSegment> {
        render::render(&self.source_text, &self.reconciled)
    }

    /// Ingest one batch of annotations and return the full re-rendered
    /// segment list. Unresolvable annotations are counted and dropped,
    /// never surfaced as errors.
    pub fn add_annotations(&mut self, batch: &[Annotation]) -> Vec<RenderSegment> {
        let mut resolved = Vec::with_capacity(batch.len());
        for annotation in batch {
            match resolver::resolve(&self.source_text, annotation) {
                Some(span) => {
                    tracing::debug!(
                        strategy = %span.strategy,
                        start = span.start,
                        end = span.end,
                        text = %annotation.text,
                        "annotation resolved"
                    );
                    resolved.push(span);
                }
                None => {
                    tracing::debug!(text = %annotation.text, "annotation dropped, no strategy matched");
                    self.dropped_count += 1;
                }
            }
        }
        self.resolved_count += resolved.len();
        self.reconciled = self.reconciled.merge(resolved);
        self.batch_count += 1;

        let segments = self.segments();
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(SegmentEvent {
                segments: segments.clone(),
                resolved: self.resolved_count,
                dropped: self.dropped_count,
                batch_index: self.batch_count,
                client: self.client_label.clone(),
            });
        }
        segments
    }

    /// Apply one backend stream event.
    ///
    /// `highlight` events merge incrementally. `merged_highlights` is the
    /// backend's authoritative final set: the session resets and ingests it
    /// from scratch. Every other event type (including `done`) is a no-op.
    pub fn apply_event(&mut self, event: &AnalysisStreamEvent) -> Option<Vec<RenderSegment>> {
        match event.event_type.as_str() {
            "highlight" => Some(self.add_annotations(&event.highlights)),
            "merged_highlights" => {
                self.reset();
                Some(self.add_annotations(&event.highlights))
            }
            _ => None,
        }
    }

    /// Clear spans and counters for a fresh analysis of the same text. The
    /// event channel and client label are kept.
    pub fn reset(&mut self) {
        self.reconciled = ReconciledSet::new();
        self.resolved_count = 0;
        self.dropped_count = 0;
        self.batch_count = 0;
    }
}
