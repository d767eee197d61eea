//! # Stage: Renderer
//!
//! ## Responsibility
//! Project a reconciled span set onto the source text as an ordered list of
//! segments, alternating plain text and highlighted ranges, plus helpers for
//! terminal and HTML presentation of those segments.
//!
//! ## Guarantees
//! - Concatenating segment contents in order reproduces the source text
//!   exactly, regardless of the span set
//! - Single linear walk over the source; no segment is visited twice
//! - Never panics on odd span sets; bounds are clamped to the text

use colored::Colorize;
use serde::Serialize;

use crate::annotations::{Annotation, Category};
use crate::reconcile::ReconciledSet;
use crate::resolver::{char_len, slice_chars};

/// One output segment: either plain source text or a highlighted range
/// carrying its annotation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderSegment {
    Text { content: String },
    Highlight { content: String, annotation: Annotation },
}

impl RenderSegment {
    pub fn content(&self) -> &str {
        match self {
            RenderSegment::Text { content } => content,
            RenderSegment::Highlight { content, .. } => content,
        }
    }

    pub fn is_highlight(&self) -> bool {
        matches!(self, RenderSegment::Highlight { .. })
    }
}

/// Split `source` into segments according to `set`.
///
/// Empty source yields a single empty text segment. An empty span set yields
/// one text segment holding the whole source.
pub fn render(source: &str, set: &ReconciledSet) -> Vec<RenderSegment> {
    let total = char_len(source);
    let mut segments = Vec::with_capacity(set.len() * 2 + 1);
    let mut cursor = 0;

    for span in set.spans() {
        let start = span.start.min(total);
        let end = span.end.min(total);
        if start >= end || start < cursor {
            continue;
        }
        if start > cursor {
            segments.push(RenderSegment::Text {
                content: slice_chars(source, cursor, start).to_string(),
            });
        }
        segments.push(RenderSegment::Highlight {
            content: slice_chars(source, start, end).to_string(),
            annotation: span.annotation.clone(),
        });
        cursor = end;
    }

    if cursor < total || segments.is_empty() {
        segments.push(RenderSegment::Text {
            content: slice_chars(source, cursor, total).to_string(),
        });
    }

    segments
}

// ---------------------------------------------------------------------------
// Terminal presentation
// ---------------------------------------------------------------------------

/// Color a highlighted range for terminal output. Category picks the color,
/// severity 3 adds bold and severity 4 adds bold plus underline.
pub fn apply_category_color(text: &str, category: &Category, severity: u8) -> String {
    let colored = match category {
        Category::Manipulation => text.bright_red(),
        Category::CognitiveBias => text.yellow(),
        Category::RhetoricalFallacy => text.bright_blue(),
        Category::Other => text.magenta(),
    };
    let styled = match severity {
        s if s >= 4 => colored.bold().underline(),
        3 => colored.bold(),
        _ => colored,
    };
    styled.to_string()
}

/// Render segments as a single terminal string with highlights colored.
pub fn render_terminal(segments: &[RenderSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            RenderSegment::Text { content } => out.push_str(content),
            RenderSegment::Highlight { content, annotation } => {
                out.push_str(&apply_category_color(
                    content,
                    &annotation.category,
                    annotation.severity_clamped(),
                ));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// HTML presentation
// ---------------------------------------------------------------------------

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render segments as an HTML fragment. Highlights become `<mark>` elements
/// classed by category, with the explanation in the title attribute when
/// present.
pub fn render_html(segments: &[RenderSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            RenderSegment::Text { content } => out.push_str(&escape_html(content)),
            RenderSegment::Highlight { content, annotation } => {
                let title = annotation
                    .explanation
                    .as_deref()
                    .map(|e| format!(" title=\"{}\"", escape_html(e)))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "<mark class=\"hl-{}\" data-severity=\"{}\"{}>{}</mark>",
                    annotation.category,
                    annotation.severity_clamped(),
                    title,
                    escape_html(content)
                ));
            }
        }
    }
    out
}
