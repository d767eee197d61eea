use proptest::prelude::*;

use teampulse_highlight::sessions::{
    create_session, discard_session, feed, new_session_store, session_stats,
};
use teampulse_highlight::{AnalysisSession, AnalysisStreamEvent, Annotation, Category, RenderSegment};

fn ann(text: &str, category: Category, severity: u8) -> Annotation {
    Annotation::new(text, category, severity)
}

fn concat(segments: &[RenderSegment]) -> String {
    segments.iter().map(|s| s.content()).collect()
}

// -- full scenario: streamed negotiation analysis --

#[test]
fn streamed_batches_build_up_highlights_over_one_text() {
    let source = "Купуйте зараз, бо завтра буде пізно! Everyone agrees this is the best deal.";
    let mut session = AnalysisSession::new(source);

    let first = session.add_annotations(&[ann("Купуйте зараз", Category::Manipulation, 3)]);
    assert_eq!(concat(&first), source);
    assert!(first[0].is_highlight());
    assert_eq!(first[0].content(), "Купуйте зараз");

    let second = session.add_annotations(&[ann("Everyone agrees", Category::RhetoricalFallacy, 2)]);
    assert_eq!(concat(&second), source);
    let highlights: Vec<&str> =
        second.iter().filter(|s| s.is_highlight()).map(|s| s.content()).collect();
    assert_eq!(highlights, vec!["Купуйте зараз", "Everyone agrees"]);
    assert_eq!(session.resolved_count(), 2);
    assert_eq!(session.batch_count(), 2);
}

#[test]
fn one_at_a_time_matches_single_batch() {
    let source = "Sign today or lose the discount forever. Everyone agrees this is fair.";
    let annotations = [
        ann("lose the discount", Category::Manipulation, 4),
        ann("Everyone agrees", Category::RhetoricalFallacy, 2),
        ann("Sign today", Category::Manipulation, 3),
    ];

    let mut streamed = AnalysisSession::new(source);
    for a in &annotations {
        streamed.add_annotations(std::slice::from_ref(a));
    }
    let mut batched = AnalysisSession::new(source);
    batched.add_annotations(&annotations);

    let ranges = |s: &AnalysisSession| -> Vec<(usize, usize)> {
        s.reconciled().spans().iter().map(|sp| (sp.start, sp.end)).collect()
    };
    assert_eq!(ranges(&streamed), ranges(&batched));
    assert_eq!(concat(&streamed.segments()), concat(&batched.segments()));
}

#[test]
fn overlapping_batches_fold_and_first_annotation_wins() {
    let source = "sign today or lose the discount forever";
    let mut session = AnalysisSession::new(source);
    session.add_annotations(&[ann("lose the discount", Category::Manipulation, 4)]);
    session.add_annotations(&[ann("the discount forever", Category::CognitiveBias, 1)]);

    let spans = session.reconciled().spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].annotation.text, "lose the discount");
    assert_eq!(spans[0].annotation.category, Category::Manipulation);
    assert_eq!(concat(&session.segments()), source);
}

#[test]
fn repeating_a_batch_changes_nothing() {
    let source = "act now before midnight";
    let mut session = AnalysisSession::new(source);
    let batch = [ann("act now", Category::Manipulation, 2)];
    let once = session.add_annotations(&batch);
    let twice = session.add_annotations(&batch);
    assert_eq!(concat(&once), concat(&twice));
    assert_eq!(session.reconciled().len(), 1);
    assert_eq!(session.batch_count(), 2);
}

#[test]
fn merged_highlights_event_is_authoritative() {
    let source = "The quick brown fox jumps over the lazy dog";
    let mut session = AnalysisSession::new(source);
    session.add_annotations(&[
        ann("quick brown", Category::Manipulation, 2),
        ann("lazy dog", Category::Other, 1),
    ]);
    assert_eq!(session.reconciled().len(), 2);

    let event: AnalysisStreamEvent = serde_json::from_str(
        r#"{"type":"merged_highlights","highlights":[{"text":"jumps over","category":"cognitive_bias","severity":2}]}"#,
    )
    .expect("event");
    let segments = session.apply_event(&event).expect("segments");

    let highlights: Vec<&str> =
        segments.iter().filter(|s| s.is_highlight()).map(|s| s.content()).collect();
    assert_eq!(highlights, vec!["jumps over"]);
    assert_eq!(session.reconciled().len(), 1);
    assert_eq!(concat(&segments), source);
}

#[test]
fn unknown_event_types_do_not_disturb_state() {
    let mut session = AnalysisSession::new("some text");
    session.add_annotations(&[ann("some text", Category::Other, 1)]);
    let event: AnalysisStreamEvent =
        serde_json::from_str(r#"{"type":"heartbeat"}"#).expect("event");
    assert!(session.apply_event(&event).is_none());
    assert_eq!(session.reconciled().len(), 1);
    assert_eq!(session.batch_count(), 1);
}

#[test]
fn dropped_annotations_never_poison_the_batch() {
    let source = "short source";
    let mut session = AnalysisSession::new(source);
    let segments = session.add_annotations(&[
        ann("completely absent phrase", Category::Manipulation, 2),
        ann("short", Category::CognitiveBias, 1),
        ann("", Category::Other, 1),
    ]);
    assert_eq!(session.resolved_count(), 1);
    assert_eq!(session.dropped_count(), 2);
    assert_eq!(concat(&segments), source);
}

// -- shared store --

#[test]
fn store_isolates_concurrent_analyses() {
    let store = new_session_store();
    let alpha = create_session(&store, "dash-a", "the quick brown fox");
    let beta = create_session(&store, "dash-b", "the quick brown fox");

    feed(&store, &alpha, &[ann("quick", Category::Manipulation, 2)]).expect("alpha feed");
    feed(
        &store,
        &beta,
        &[ann("quick", Category::Other, 1), ann("fox", Category::Other, 1)],
    )
    .expect("beta feed");

    assert_eq!(session_stats(&store, &alpha).expect("alpha").resolved, 1);
    assert_eq!(session_stats(&store, &beta).expect("beta").resolved, 2);

    let finished = discard_session(&store, &alpha).expect("alpha session");
    assert_eq!(finished.resolved_count(), 1);
    assert!(session_stats(&store, &alpha).is_none());
    assert!(session_stats(&store, &beta).is_some());
}

// -- property: segments always reproduce the source --

proptest! {
    #[test]
    fn segments_always_concatenate_back_to_source(
        source in "[a-z ]{0,60}",
        needles in prop::collection::vec("[a-z]{1,8}", 0..5),
    ) {
        let mut session = AnalysisSession::new(source.clone());
        let batch: Vec<Annotation> = needles
            .iter()
            .map(|n| ann(n, Category::Other, 1))
            .collect();
        let segments = session.add_annotations(&batch);
        prop_assert_eq!(concat(&segments), source);
    }

    #[test]
    fn resolved_spans_stay_in_bounds(
        source in "[a-zA-Z ,.!]{1,80}",
        needle in "[a-zA-Z ]{2,12}",
    ) {
        let mut session = AnalysisSession::new(source.clone());
        session.add_annotations(&[ann(&needle, Category::Manipulation, 2)]);
        let total = source.chars().count();
        for span in session.reconciled().spans() {
            prop_assert!(span.start < span.end);
            prop_assert!(span.end <= total);
        }
    }
}
