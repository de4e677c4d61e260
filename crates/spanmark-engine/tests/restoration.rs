use pretty_assertions::assert_eq;
use rstest::rstest;
use spanmark_engine::anchoring::restore::fingerprint_similarity;
use spanmark_engine::config::AnchorConfig;
use spanmark_engine::{
    AcceptAll, Boundary, Document, EngineConfig, Layer, NodeId, Restorer, SerializedSpan,
    Serializer, Span, SpanId, TreeAdapter,
};

const PARAGRAPH: &str = "The restoration cascade relocates spans after edits.";
const SPAN_TEXT: &str = "restoration cascade relocates spans";

struct Page {
    doc: Document,
    article: NodeId,
    lead: NodeId,
    lead_text: NodeId,
}

fn page() -> Page {
    let mut doc = Document::new();
    let root = doc.root();
    let article = doc.append_element(root, "article", &[("id", "post"), ("class", "post")]);
    let h2 = doc.append_element(article, "h2", &[]);
    doc.append_text(h2, "Anchoring");
    let lead = doc.append_element(article, "p", &[("class", "post__body lead")]);
    let lead_text = doc.append_text(lead, PARAGRAPH);
    let other = doc.append_element(article, "p", &[("class", "post__body")]);
    doc.append_text(other, "Second paragraph with other words.");
    Page {
        doc,
        article,
        lead,
        lead_text,
    }
}

fn save(page: &Page) -> SerializedSpan {
    let config = AnchorConfig::default();
    Serializer::new(&config, &AcceptAll)
        .serialize(&page.doc, &Span::within(page.lead_text, 4, 39), Some("s".into()), None)
        .unwrap()
}

fn layers_run(result: &spanmark_engine::RestoreResult) -> Vec<(Layer, bool)> {
    result
        .attempts
        .iter()
        .map(|attempt| (attempt.layer, attempt.success))
        .collect()
}

#[test]
fn scenario_a_identifiers_present_restore_at_layer_one() {
    let page = page();
    let saved = save(&page);
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&page.doc, &saved);

    assert!(result.success);
    assert_eq!(result.layer, Layer::Anchor);
    assert_eq!(result.layer_name(), "anchor");
    assert_eq!(result.span, Some(Span::within(page.lead_text, 4, 39)));
}

#[test]
fn layer_one_success_short_circuits_the_cascade() {
    let page = page();
    let saved = save(&page);
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&page.doc, &saved);

    assert_eq!(layers_run(&result), vec![(Layer::Anchor, true)]);
}

#[test]
fn scenario_b_identifiers_removed_paths_resolve_at_layer_two() {
    let mut page = page();
    let saved = save(&page);
    page.doc.remove_attribute(page.article, "id");
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&page.doc, &saved);

    assert_eq!(result.layer, Layer::Path);
    assert_eq!(
        layers_run(&result),
        vec![(Layer::Anchor, false), (Layer::Path, true)]
    );
    let span = result.span.unwrap();
    assert_eq!(page.doc.span_text(&span).unwrap(), SPAN_TEXT);
}

#[test]
fn scenario_c_signature_and_text_prefix_restore_at_layer_three() {
    let mut page = page();
    let saved = save(&page);
    page.doc.remove_attribute(page.article, "id");
    page.doc.wrap(page.article, "section", &[]);
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&page.doc, &saved);

    assert!(result.success);
    assert_eq!(result.layer, Layer::MultiAnchor);
    assert_eq!(result.attempts[2].candidates_tested, 2);
    let span = result.span.unwrap();
    assert_eq!(span, Span::within(page.lead_text, 4, 39));
    assert_eq!(page.doc.parent(span.start.node), Some(page.lead));
}

/// body > div.wrapper > section > div, the paragraph reworded to the same
/// length so only the structure is scored
fn restructured() -> (Document, NodeId) {
    let mut doc = Document::new();
    let root = doc.root();
    let wrapper = doc.append_element(root, "div", &[("class", "wrapper")]);
    let section = doc.append_element(wrapper, "section", &[]);
    let inner = doc.append_element(section, "div", &[]);
    doc.append_text(inner, "Now: the restoration cascade relocates spans safely.");
    (doc, section)
}

#[test]
fn scenario_d_restructured_tree_accepted_at_loose_threshold() {
    let page = page();
    let saved = save(&page);
    let (doc, section) = restructured();
    let config = EngineConfig::default();

    // tag 0, class 0, length 1.0 * 3, depth 1.0 * 1, children 0, chain 0.5 * 2
    let similarity = fingerprint_similarity(
        &doc,
        section,
        &saved.restore.fingerprint,
        &saved.restore.context,
        &config.restore.fingerprint,
        &config.restore.multi_anchor,
    );
    assert!((similarity.value - 0.5).abs() < 1e-9);
    assert!(!similarity.context_bonus);

    let result = Restorer::new(&config).restore(&doc, &saved);

    assert!(result.success);
    assert_eq!(result.layer, Layer::Fingerprint);
    assert_eq!(result.threshold, Some(0.4));
    assert_eq!(
        layers_run(&result),
        vec![
            (Layer::Anchor, false),
            (Layer::Path, false),
            (Layer::MultiAnchor, false),
            (Layer::Fingerprint, true),
        ]
    );
    assert_eq!(doc.span_text(&result.span.unwrap()).unwrap(), SPAN_TEXT);
}

#[test]
fn scenario_e_nothing_similar_fails_without_panicking() {
    let page = page();
    let saved = save(&page);
    let mut doc = Document::new();
    let root = doc.root();
    let p = doc.append_element(root, "p", &[]);
    doc.append_text(p, "Completely unrelated content.");
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&doc, &saved);

    assert!(!result.success);
    assert_eq!(result.layer, Layer::None);
    assert_eq!(result.layer.number(), 0);
    assert_eq!(result.span, None);
    assert_eq!(result.attempts.len(), 4);
    assert!(result.attempts.iter().all(|attempt| !attempt.success));
    assert!(result.error.is_some());
}

#[test]
fn restoring_twice_is_deterministic() {
    let (doc, _) = restructured();
    let saved = save(&page());
    let config = EngineConfig::default();
    let restorer = Restorer::new(&config);

    let first = restorer.restore(&doc, &saved);
    let second = restorer.restore(&doc, &saved);

    assert_eq!(first.layer, second.layer);
    assert_eq!(first.span, second.span);
    assert_eq!(first.threshold, second.threshold);
}

#[test]
fn restore_from_persisted_json() {
    let page = page();
    let json = save(&page).to_json().unwrap();
    let saved = SerializedSpan::from_json(&json).unwrap();
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&page.doc, &saved);

    assert_eq!(result.layer, Layer::Anchor);
}

#[test]
fn missing_scope_root_skips_restore() {
    let page = page();
    let saved = save(&page);
    let mut config = EngineConfig::default();
    config.anchor.scope_root = Some("nowhere".to_string());

    let result = Restorer::new(&config).restore(&page.doc, &saved);

    assert!(!result.success);
    assert!(result.attempts.is_empty());
    assert!(result.error.unwrap().contains("configuration"));
    let failure = Restorer::new(&config).resolve(&page.doc, &saved).unwrap_err();
    assert!(failure.config.is_some());
}

#[test]
fn batch_restore_reports_partial_success() {
    let page = page();
    let config = AnchorConfig::default();
    let serializer = Serializer::new(&config, &AcceptAll);
    let mut spans = vec![
        save(&page),
        serializer
            .serialize(&page.doc, &Span::within(page.lead_text, 0, 3), Some("t".into()), None)
            .unwrap(),
    ];
    let mut orphan = save(&page);
    orphan.id = "orphan".into();
    orphan.text = "text that is nowhere".to_string();
    orphan.restore.anchors.start = None;
    orphan.restore.paths.start.path.0.clear();
    orphan.restore.paths.start.text_offset = 999;
    spans.push(orphan);
    let engine = EngineConfig::default();

    let report = Restorer::new(&engine).restore_batch(&page.doc, &mut spans);

    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failures[0].span_id, SpanId::from("orphan"));
    assert_eq!(report.failures[0].attempts.len(), 4);
    assert_eq!(spans[0].runtime.map(|status| status.layer), Some(Layer::Anchor));
    assert_eq!(spans[2].runtime.map(|status| status.restored), Some(false));
}

const SHARED: &str = "Shared sentence in both notes.";

/// article > two `p.note` with identical text, returning the second leaf
fn twin_notes() -> (Document, NodeId, NodeId) {
    let mut doc = Document::new();
    let root = doc.root();
    let article = doc.append_element(root, "article", &[]);
    let first = doc.append_element(article, "p", &[("class", "note")]);
    doc.append_text(first, SHARED);
    let second = doc.append_element(article, "p", &[("class", "note")]);
    let leaf = doc.append_text(second, SHARED);
    (doc, article, leaf)
}

#[test]
fn indistinguishable_candidates_fall_through_to_fingerprint() {
    let (mut doc, article, leaf) = twin_notes();
    let config = AnchorConfig::default();
    let saved = Serializer::new(&config, &AcceptAll)
        .serialize(&doc, &Span::within(leaf, 0, SHARED.chars().count()), Some("s".into()), None)
        .unwrap();
    doc.wrap(article, "section", &[]);
    let engine = EngineConfig::default();

    let result = Restorer::new(&engine).restore(&doc, &saved);

    let multi_anchor = &result.attempts[2];
    assert_eq!(multi_anchor.layer, Layer::MultiAnchor);
    assert!(!multi_anchor.success);
    assert!(multi_anchor.detail.contains("ambiguous"), "{}", multi_anchor.detail);
    assert_eq!(multi_anchor.candidates_tested, 2);
    assert!(result.success);
    assert_eq!(result.layer, Layer::Fingerprint);
    assert_eq!(doc.span_text(&result.span.unwrap()).unwrap(), SHARED);
}

#[test]
fn cross_element_span_needs_minimum_similarity() {
    let mut source = Document::new();
    let root = source.root();
    let p = source.append_element(root, "p", &[("class", "note")]);
    let head = source.append_text(p, "alpha ");
    let em = source.append_element(p, "em", &[]);
    let tail = source.append_text(em, "beta gamma");
    let config = AnchorConfig::default();
    let span = Span::new(Boundary::new(head, 0), Boundary::new(tail, 4));
    let mut saved = Serializer::new(&config, &AcceptAll)
        .serialize(&source, &span, Some("s".into()), None)
        .unwrap();
    assert!(saved.restore.context.cross_element);

    // only the bare root holds the text now
    let mut doc = Document::new();
    let root = doc.root();
    doc.append_text(root, "alpha beta");
    let engine = EngineConfig::default();

    // tag 0, class 0, length 10/16 * 3, depth 0.5 * 1, children 0, chain 0
    let similarity = fingerprint_similarity(
        &doc,
        root,
        &saved.restore.fingerprint,
        &saved.restore.context,
        &engine.restore.fingerprint,
        &engine.restore.multi_anchor,
    );
    assert!((similarity.value - 0.2375).abs() < 1e-9);
    assert!(!similarity.context_bonus);

    let result = Restorer::new(&engine).restore(&doc, &saved);
    assert!(!result.success);
    assert_eq!(result.attempts[3].layer, Layer::Fingerprint);
    assert!(!result.attempts[3].success);

    saved.restore.context.cross_element = false;
    let result = Restorer::new(&engine).restore(&doc, &saved);
    assert_eq!(result.layer, Layer::Fingerprint);
    assert_eq!(result.threshold, Some(0.2));
    assert_eq!(doc.span_text(&result.span.unwrap()).unwrap(), "alpha beta");
}

/// body > p.intro holding "Start of the " and an inline element
fn keyed(inline_tag: &str, inline_class: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    let p = doc.append_element(root, "p", &[("class", "intro")]);
    doc.append_text(p, "Start of the ");
    let inline = doc.append_element(p, inline_tag, &[("class", inline_class)]);
    doc.append_text(inline, "key phrase");
    doc.append_text(p, " here.");
    doc
}

fn save_keyed(doc: &Document) -> SerializedSpan {
    let p = doc.element_children(doc.root())[0];
    let leaves = doc.text_leaves(p);
    let config = AnchorConfig::default();
    let span = Span::new(Boundary::new(leaves[0], 9), Boundary::new(leaves[1], 3));
    Serializer::new(&config, &AcceptAll)
        .serialize(doc, &span, Some("k".into()), None)
        .unwrap()
}

#[test]
fn matching_end_element_restores_at_layer_three() {
    let mut doc = keyed("strong", "key");
    let saved = save_keyed(&doc);
    assert_eq!(saved.text, "the key");
    let p = doc.element_children(doc.root())[0];
    doc.wrap(p, "div", &[]);
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&doc, &saved);

    assert_eq!(result.layer, Layer::MultiAnchor);
    assert_eq!(doc.span_text(&result.span.unwrap()).unwrap(), "the key");
}

#[rstest]
#[case::retagged("em", "key")]
#[case::reclassed("strong", "other")]
fn mismatched_end_element_is_rejected_at_layer_three(#[case] tag: &str, #[case] class: &str) {
    let saved = save_keyed(&keyed("strong", "key"));
    let mut doc = keyed(tag, class);
    let p = doc.element_children(doc.root())[0];
    doc.wrap(p, "div", &[]);
    let config = EngineConfig::default();

    let result = Restorer::new(&config).restore(&doc, &saved);

    let multi_anchor = &result.attempts[2];
    assert_eq!(multi_anchor.layer, Layer::MultiAnchor);
    assert!(!multi_anchor.success);
    assert_eq!(multi_anchor.candidates_tested, 1);
    assert_eq!(result.layer, Layer::Fingerprint);
    assert_eq!(doc.span_text(&result.span.unwrap()).unwrap(), "the key");
}
