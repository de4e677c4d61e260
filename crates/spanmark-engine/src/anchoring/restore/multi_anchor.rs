//! Layer 3: signature candidates scored on classes and text.
//!
//! Candidates are elements sharing the recorded start element's tag (and at
//! least one class when it had any), in document order, capped at
//! `max_candidates`. The start signature picks the pool because the recorded
//! offset is relative to the start element. Each candidate is scored as
//! `class_similarity + text_multiplier * text_confidence` and must show some
//! text confidence to qualify. The span is then searched inside the
//! candidate's ancestor at the recorded distance, starting within the
//! candidate itself, and is kept only when the element it ends in matches the
//! recorded end signature: same tag, and a shared class when both sides have
//! classes.

use std::cmp::Ordering;

use crate::anchoring::model::ElementSignature;
use crate::anchoring::similarity::{char_slice, class_similarity, text_confidence, TextConfidence};
use crate::tree::path::class_list;
use crate::tree::{Boundary, NodeId, Span, TreeAdapter};

use super::{locate_text, LayerOutcome, RestoreContext};

const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Scored {
    span: Span,
    score: f64,
    context_score: usize,
}

pub(super) fn attempt<T: TreeAdapter + ?Sized>(ctx: &RestoreContext<'_, T>) -> LayerOutcome {
    let tree = ctx.tree;
    let cfg = &ctx.config.restore.multi_anchor;
    let data = &ctx.saved.restore.multiple_anchors;

    let candidates = candidates(ctx);
    if candidates.is_empty() {
        return LayerOutcome::failed(format!("no <{}> candidates", data.start.tag));
    }
    let tested = candidates.len();

    let mut scored: Vec<Scored> = Vec::new();
    for candidate in candidates {
        let text = tree.text_content(candidate);
        let window = char_slice(
            &text,
            data.start_offset.saturating_sub(cfg.element_window / 2),
            usize::MAX,
        );
        let confidence = text_confidence(&ctx.saved.text, &window, cfg);
        if confidence == TextConfidence::None {
            continue;
        }
        let Some((span, context_score)) = locate_from(ctx, candidate) else {
            continue;
        };
        let classes = class_list(tree, candidate);
        let score =
            class_similarity(&data.start.classes, &classes, cfg) + cfg.text_multiplier * confidence.score();
        scored.push(Scored {
            span,
            score,
            context_score,
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.context_score.cmp(&a.context_score))
    });
    let Some(best) = scored.first().copied() else {
        return LayerOutcome::failed("no candidate matched the text").with_candidates(tested);
    };
    let ambiguous = scored.get(1).is_some_and(|runner_up| {
        (best.score - runner_up.score).abs() < SCORE_EPSILON
            && best.context_score == runner_up.context_score
            && best.span != runner_up.span
    });
    if ambiguous {
        return LayerOutcome::failed(format!("ambiguous candidates at score {:.3}", best.score))
            .with_candidates(tested);
    }
    LayerOutcome::found(best.span, format!("best candidate scored {:.3}", best.score))
        .with_candidates(tested)
}

fn candidates<T: TreeAdapter + ?Sized>(ctx: &RestoreContext<'_, T>) -> Vec<NodeId> {
    let tree = ctx.tree;
    let signature = &ctx.saved.restore.multiple_anchors.start;
    let same_tag: Vec<NodeId> = std::iter::once(ctx.scope)
        .chain(tree.descendants(ctx.scope))
        .filter(|&node| tree.tag(node) == Some(signature.tag.as_str()))
        .collect();
    let sharing_class: Vec<NodeId> = if signature.classes.is_empty() {
        Vec::new()
    } else {
        same_tag
            .iter()
            .copied()
            .filter(|&node| {
                class_list(tree, node)
                    .iter()
                    .any(|class| signature.classes.contains(class))
            })
            .collect()
    };
    let pool = if sharing_class.is_empty() { same_tag } else { sharing_class };
    pool.into_iter()
        .take(ctx.config.restore.multi_anchor.max_candidates)
        .collect()
}

/// Searches the span text in the candidate's ancestor at the recorded
/// distance, starting inside the candidate
fn locate_from<T: TreeAdapter + ?Sized>(ctx: &RestoreContext<'_, T>, candidate: NodeId) -> Option<(Span, usize)> {
    let tree = ctx.tree;
    let data = &ctx.saved.restore.multiple_anchors;
    let mut container = candidate;
    for _ in 0..data.ancestor_distance {
        container = tree.parent(container)?;
    }
    let first_leaf = *tree.text_leaves(candidate).first()?;
    let candidate_offset = tree.offset_within(container, Boundary::new(first_leaf, 0))?;
    let candidate_len = tree.char_len(candidate);
    let located = locate_text(
        tree,
        container,
        &ctx.saved.text,
        candidate_offset + data.start_offset,
        &ctx.saved.restore.context,
        Some(candidate_offset..candidate_offset + candidate_len + 1),
    )?;
    let end_element = tree.parent(located.span.end.node)?;
    if !matches_signature(tree, end_element, &data.end) {
        return None;
    }
    Some((located.span, located.context_score))
}

fn matches_signature<T: TreeAdapter + ?Sized>(tree: &T, element: NodeId, signature: &ElementSignature) -> bool {
    if tree.tag(element) != Some(signature.tag.as_str()) {
        return false;
    }
    let classes = class_list(tree, element);
    signature.classes.is_empty()
        || classes.is_empty()
        || classes.iter().any(|class| signature.classes.contains(class))
}
