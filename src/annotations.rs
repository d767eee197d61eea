use serde::{Deserialize, Serialize};

use crate::render::RenderSegment;

// -- Category ---------------------------------------------------------------

/// The kind of finding the analysis service reports for a text fragment.
///
/// Unknown categories from newer backend versions deserialize to `Other`
/// instead of failing the whole event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Manipulation,
    CognitiveBias,
    RhetoricalFallacy,
    #[default]
    #[serde(other)]
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Manipulation => write!(f, "manipulation"),
            Category::CognitiveBias => write!(f, "cognitive_bias"),
            Category::RhetoricalFallacy => write!(f, "rhetorical_fallacy"),
            Category::Other => write!(f, "other"),
        }
    }
}

// -- Annotation (wire shape) ------------------------------------------------

fn default_severity() -> u8 {
    1
}

/// One AI-reported finding, as delivered by the analysis stream.
///
/// `text` is the substring the annotator believes it found and may be
/// inexact (paraphrased, re-punctuated, mis-quoted). `char_start`/`char_end`
/// are character offsets into the source text and, when valid, take priority
/// over any text search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub text: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_severity")]
    pub severity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
}

impl Annotation {
    pub fn new(text: impl Into<String>, category: Category, severity: u8) -> Self {
        Annotation {
            text: text.into(),
            category,
            severity,
            explanation: None,
            recommendation: None,
            char_start: None,
            char_end: None,
        }
    }

    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.char_start = Some(start);
        self.char_end = Some(end);
        self
    }

    /// Severity clamped to the 1–4 scale the dashboard renders.
    pub fn severity_clamped(&self) -> u8 {
        self.severity.clamp(1, 4)
    }
}

// -- Analysis stream events -------------------------------------------------

/// One SSE message from the analysis service.
///
/// `highlight` carries incremental findings; `merged_highlights` is the
/// authoritative full set that replaces everything received so far; `done`
/// closes the stream. Unknown event types are ignored by consumers.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisStreamEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub highlights: Vec<Annotation>,
}

// -- Segment snapshot event (for web UI streaming) --------------------------

/// A full re-render snapshot after one ingested batch, sent as an SSE event
/// to the dashboard. Always carries the complete segment list, never a delta,
/// so the UI can replace its view without flicker or duplication.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentEvent {
    pub segments: Vec<RenderSegment>,
    pub resolved: usize,
    pub dropped: usize,
    pub batch_index: usize,
    /// Client profile this analysis run belongs to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}
