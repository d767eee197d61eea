//! SSE transport between the analysis backend and an [`AnalysisSession`].
//!
//! The backend answers a POST with a server-sent-event stream of
//! newline-delimited JSON events. Chunks arrive at arbitrary boundaries, so
//! incoming bytes accumulate in a line buffer and complete lines are drained
//! out one at a time. Malformed lines are skipped, never fatal.

use serde::Serialize;
use tokio_stream::StreamExt;

use crate::annotations::AnalysisStreamEvent;
use crate::error::HighlightError;
use crate::render::RenderSegment;
use crate::AnalysisSession;

/// Request body sent to the analysis backend.
#[derive(Debug, Serialize)]
pub struct AnalysisRequest<'a> {
    pub text: &'a str,
    pub stream: bool,
}

/// HTTP client for one analysis backend.
pub struct AnalysisClient {
    client: reqwest::Client,
    backend_url: String,
}

impl AnalysisClient {
    pub fn new(backend_url: impl Into<String>) -> Self {
        AnalysisClient { client: reqwest::Client::new(), backend_url: backend_url.into() }
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Stream one full analysis of the session's source text, applying each
    /// event as it arrives. Returns the final segment list.
    ///
    /// The stream ends on a `[DONE]` sentinel, a `done` event, or EOF;
    /// whichever comes first.
    pub async fn stream_analysis(
        &self,
        session: &mut AnalysisSession,
    ) -> Result<Vec<RenderSegment>, HighlightError> {
        tracing::info!(url = %self.backend_url, "starting analysis stream");

        let response = self
            .client
            .post(&self.backend_url)
            .json(&AnalysisRequest { text: session.source_text(), stream: true })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HighlightError::Backend(format!("backend returned {}: {}", status, body)));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line: String = buffer[..line_end].to_string();
                buffer.drain(..=line_end);

                let Some(payload) = sse_payload(&line) else { continue };
                if payload == "[DONE]" {
                    tracing::debug!("stream finished via [DONE] sentinel");
                    return Ok(session.segments());
                }
                if let Ok(event) = serde_json::from_str::<AnalysisStreamEvent>(payload) {
                    if event.event_type == "done" {
                        tracing::debug!("stream finished via done event");
                        return Ok(session.segments());
                    }
                    session.apply_event(&event);
                }
                // malformed lines are dropped silently
            }
        }

        Ok(session.segments())
    }
}

/// Extract the JSON payload from one SSE line. Returns `None` for blank
/// lines and comment/field lines that carry no data.
fn sse_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        let rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        return Some(rest);
    }
    if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") {
        return None;
    }
    // bare JSON lines (backends that skip the SSE framing) pass through
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, Category};

    // -- sse_payload --

    #[test]
    fn test_sse_payload_data_prefix() {
        assert_eq!(sse_payload("data: {\"type\":\"done\"}"), Some("{\"type\":\"done\"}"));
    }

    #[test]
    fn test_sse_payload_data_prefix_no_space() {
        assert_eq!(sse_payload("data:{\"type\":\"done\"}"), Some("{\"type\":\"done\"}"));
    }

    #[test]
    fn test_sse_payload_blank_line() {
        assert_eq!(sse_payload(""), None);
        assert_eq!(sse_payload("   "), None);
    }

    #[test]
    fn test_sse_payload_comment_line() {
        assert_eq!(sse_payload(": keep-alive"), None);
    }

    #[test]
    fn test_sse_payload_event_and_id_fields_skipped() {
        assert_eq!(sse_payload("event: highlight"), None);
        assert_eq!(sse_payload("id: 7"), None);
        assert_eq!(sse_payload("retry: 3000"), None);
    }

    #[test]
    fn test_sse_payload_bare_json_passes_through() {
        assert_eq!(sse_payload("{\"type\":\"highlight\"}"), Some("{\"type\":\"highlight\"}"));
    }

    #[test]
    fn test_sse_payload_done_sentinel() {
        assert_eq!(sse_payload("data: [DONE]"), Some("[DONE]"));
    }

    #[test]
    fn test_sse_payload_empty_data_field() {
        assert_eq!(sse_payload("data:"), None);
        assert_eq!(sse_payload("data: "), None);
    }

    // -- request body --

    #[test]
    fn test_analysis_request_serializes() {
        let req = AnalysisRequest { text: "negotiate hard", stream: true };
        let json = serde_json::to_value(&req).expect("json");
        assert_eq!(json["text"], "negotiate hard");
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_client_keeps_backend_url() {
        let client = AnalysisClient::new("http://localhost:9000/analyze");
        assert_eq!(client.backend_url(), "http://localhost:9000/analyze");
    }

    // -- event application through parsed lines --

    #[test]
    fn test_parsed_stream_lines_drive_session() {
        let mut session = AnalysisSession::new("The quick brown fox");
        let lines = [
            "data: {\"type\":\"highlight\",\"highlights\":[{\"text\":\"quick\",\"category\":\"manipulation\",\"severity\":2}]}",
            ": ping",
            "data: not-json-at-all",
            "data: {\"type\":\"highlight\",\"highlights\":[{\"text\":\"fox\",\"category\":\"other\",\"severity\":1}]}",
        ];
        for line in lines {
            let Some(payload) = sse_payload(line) else { continue };
            if let Ok(event) = serde_json::from_str::<AnalysisStreamEvent>(payload) {
                session.apply_event(&event);
            }
        }
        assert_eq!(session.resolved_count(), 2);
        assert_eq!(session.reconciled().len(), 2);
    }

    #[test]
    fn test_malformed_highlight_payload_is_skipped() {
        let mut session = AnalysisSession::new("text");
        let payload = sse_payload("data: {\"highlights\": 12}").expect("payload");
        assert!(serde_json::from_str::<AnalysisStreamEvent>(payload).is_err());
        assert_eq!(session.batch_count(), 0);
        session.reset();
    }

    #[test]
    fn test_offline_batch_matches_stream_semantics() {
        // A stream of one highlight batch and an offline add_annotations call
        // must produce identical spans.
        let source = "Everyone agrees you should act now.";
        let mut streamed = AnalysisSession::new(source);
        let event: AnalysisStreamEvent = serde_json::from_str(
            "{\"type\":\"highlight\",\"highlights\":[{\"text\":\"act now\",\"category\":\"manipulation\",\"severity\":3}]}",
        )
        .expect("event");
        streamed.apply_event(&event);

        let mut offline = AnalysisSession::new(source);
        offline.add_annotations(&[Annotation::new("act now", Category::Manipulation, 3)]);

        let a: Vec<_> = streamed.reconciled().spans().iter().map(|s| (s.start, s.end)).collect();
        let b: Vec<_> = offline.reconciled().spans().iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(a, b);
    }
}
