use spanmark_engine::TreeAdapter;
use rstest::rstest;
use spanmark_engine::config::AnchorConfig;
use spanmark_engine::{
    check_overlaps, classify, AcceptAll, Boundary, Document, EngineConfig, NodeId, OverlapType,
    SerializedSpan, Serializer, Span, SpanId,
};

/// Two paragraphs, the second split over a text leaf and an `em`
fn two_paragraphs() -> (Document, NodeId, NodeId, NodeId) {
    let mut doc = Document::new();
    let root = doc.root();
    let p1 = doc.append_element(root, "p", &[]);
    let a = doc.append_text(p1, "alpha beta gamma delta");
    let p2 = doc.append_element(root, "p", &[]);
    let b = doc.append_text(p2, "epsilon zeta ");
    let em = doc.append_element(p2, "em", &[]);
    let c = doc.append_text(em, "eta theta");
    (doc, a, b, c)
}

fn span(node: NodeId, start: usize, end_node: NodeId, end: usize) -> Span {
    Span::new(Boundary::new(node, start), Boundary::new(end_node, end))
}

#[rstest]
#[case::nested_same_leaf(0, 2, 0, 10, 0, 0, 0, 22)]
#[case::partial_same_leaf(0, 0, 0, 10, 0, 6, 0, 16)]
#[case::cross_leaf_partial(1, 8, 2, 3, 1, 0, 1, 12)]
#[case::cross_element_nested(0, 6, 2, 3, 1, 0, 1, 5)]
#[case::identical(0, 6, 0, 10, 0, 6, 0, 10)]
#[case::touching(0, 0, 0, 5, 0, 5, 0, 10)]
#[case::disjoint_paragraphs(0, 0, 0, 5, 1, 0, 2, 3)]
#[allow(clippy::too_many_arguments)]
fn overlap_roles_are_symmetric(
    #[case] a_start_leaf: usize,
    #[case] a_start: usize,
    #[case] a_end_leaf: usize,
    #[case] a_end: usize,
    #[case] b_start_leaf: usize,
    #[case] b_start: usize,
    #[case] b_end_leaf: usize,
    #[case] b_end: usize,
) {
    let (doc, a, b, c) = two_paragraphs();
    let leaves = [a, b, c];
    let first = span(leaves[a_start_leaf], a_start, leaves[a_end_leaf], a_end);
    let second = span(leaves[b_start_leaf], b_start, leaves[b_end_leaf], b_end);

    let forward = classify(&doc, &first, &second);
    let backward = classify(&doc, &second, &first);

    assert_eq!(forward.has_overlap, backward.has_overlap);
    if first != second {
        assert_eq!(
            forward.overlap_type == OverlapType::ExistingContainsCurrent,
            backward.overlap_type == OverlapType::CurrentContainsExisting
        );
        assert_eq!(
            forward.overlap_type == OverlapType::PartialOverlap,
            backward.overlap_type == OverlapType::PartialOverlap
        );
    }
}

#[test]
fn current_ending_before_existing_starts_is_disjoint() {
    let (doc, a, _, _) = two_paragraphs();
    for end in 1..=10 {
        let current = Span::within(a, 0, end);
        let existing = Span::within(a, 10, 16);
        assert!(!classify(&doc, &current, &existing).has_overlap, "end {end}");
    }
}

#[test]
fn cross_element_classification() {
    let (doc, a, b, c) = two_paragraphs();
    // "gamma delta" .. "epsilon zeta eta"
    let wide = span(a, 11, c, 3);
    let inner = Span::within(b, 0, 7);
    assert_eq!(classify(&doc, &inner, &wide).overlap_type, OverlapType::ExistingContainsCurrent);
    assert_eq!(classify(&doc, &wide, &inner).overlap_type, OverlapType::CurrentContainsExisting);
}

fn saved_spans(doc: &Document, leaf: NodeId, count: usize) -> Vec<SerializedSpan> {
    let config = AnchorConfig::default();
    let serializer = Serializer::new(&config, &AcceptAll);
    (0..count)
        .map(|i| {
            serializer
                .serialize(doc, &Span::within(leaf, 0, 10), Some(SpanId::from(format!("s{i:02}"))), None)
                .unwrap()
        })
        .collect()
}

#[test]
fn batch_check_examines_only_the_ten_most_recent() {
    let (doc, a, _, _) = two_paragraphs();
    let saved = saved_spans(&doc, a, 25);
    let config = EngineConfig::default();

    let report = check_overlaps(&doc, &Span::within(a, 0, 5), &saved, &config);

    assert_eq!(report.checked, 10);
    assert_eq!(report.records.len(), 10);
    let ids: Vec<&str> = report.records.iter().map(|r| r.selection_id.as_str()).collect();
    assert_eq!(ids.first(), Some(&"s15"));
    assert_eq!(ids.last(), Some(&"s24"));
    let record = &report.records[0];
    assert_eq!(record.text, "alpha");
    assert_eq!(record.overlapped_text, "alpha beta");
    assert_eq!(record.overlap_type, OverlapType::ExistingContainsCurrent);
}

#[test]
fn unresolvable_saved_span_is_recorded_not_fatal() {
    let (doc, a, _, _) = two_paragraphs();
    let mut saved = saved_spans(&doc, a, 3);
    saved[1].id = "ghost".into();
    saved[1].text = "not in this document".to_string();
    saved[1].restore.anchors.start = None;
    saved[1].restore.paths.start.text_offset = 500;

    let report = check_overlaps(&doc, &Span::within(a, 2, 4), &saved, &EngineConfig::default());

    assert_eq!(report.checked, 3);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].span_id, SpanId::from("ghost"));
}
