//! Layer 4: structural fingerprint search under a relaxing threshold ladder.
//!
//! Candidates are elements whose text contains the span text and whose depth
//! is within `search_depth` of the recorded container, deepest first, capped
//! at `max_tests`. Each is scored against the recorded fingerprint; the
//! thresholds are tried from strictest to loosest and the first one that
//! admits a candidate decides.

use std::cmp::Ordering;

use crate::anchoring::model::{StructuralFingerprint, TextContext};
use crate::anchoring::serializer::parent_chain;
use crate::anchoring::similarity::{class_similarity, ratio, tags_equivalent};
use crate::config::{FingerprintConfig, MultiAnchorConfig};
use crate::tree::path::class_list;
use crate::tree::{NodeId, Span, TreeAdapter};

use super::{locate_text, LayerOutcome, RestoreContext};

/// Similarity of one candidate to the recorded fingerprint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Final score in `[0, 1]`
    pub value: f64,
    /// Matched through an equivalent tag rather than the same one
    pub semantic: bool,
    pub context_bonus: bool,
}

/// Weighted similarity of `candidate` to `fingerprint`.
///
/// Tag, class, text length, depth, child count and parent chain each score
/// in `[0, 1]` and are averaged by their weights. Containing the recorded
/// parent text adds the context bonus; an equivalent-but-different tag
/// scales the result by the semantic factor.
pub fn fingerprint_similarity<T: TreeAdapter + ?Sized>(
    tree: &T,
    candidate: NodeId,
    fingerprint: &StructuralFingerprint,
    context: &TextContext,
    config: &FingerprintConfig,
    classes: &MultiAnchorConfig,
) -> Similarity {
    let weights = &config.weights;
    let tag = tree.tag(candidate).unwrap_or_default();
    let (tag_score, semantic) = if tag == fingerprint.tag {
        (1.0, false)
    } else if tags_equivalent(tag, &fingerprint.tag) {
        (1.0, true)
    } else {
        (0.0, false)
    };
    let class_score = class_similarity(&fingerprint.classes, &class_list(tree, candidate), classes);
    let length_score = ratio(tree.char_len(candidate), fingerprint.text_length);
    let depth_score = 1.0 / (1.0 + tree.depth(candidate).abs_diff(fingerprint.depth) as f64);
    let child_score = ratio(tree.element_children(candidate).len(), fingerprint.child_count);
    let chain_score = chain_similarity(
        &parent_chain(tree, candidate, config.parent_chain_depth),
        &fingerprint.parent_chain,
    );

    let weighted = weights.tag * tag_score
        + weights.class * class_score
        + weights.text_length * length_score
        + weights.depth * depth_score
        + weights.child_count * child_score
        + weights.parent_chain * chain_score;
    let total = weights.total();
    let mut value = if total > 0.0 { weighted / total } else { 0.0 };

    let context_bonus = !context.parent_text.is_empty()
        && tree.text_content(candidate).contains(&context.parent_text);
    if context_bonus {
        value = (value + config.context_bonus).min(1.0);
    }
    if semantic {
        value *= config.semantic_tag_factor;
    }
    Similarity {
        value,
        semantic,
        context_bonus,
    }
}

/// Positional tag matches over the longer chain; two empty chains match
fn chain_similarity(a: &[String], b: &[String]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x == y).count();
    matches as f64 / longest as f64
}

/// Index of the best score admitted by the first threshold that admits any,
/// together with that threshold. Equal scores keep the earlier index.
pub fn select_by_ladder(scores: &[f64], thresholds: &[f64]) -> Option<(usize, f64)> {
    thresholds.iter().find_map(|&threshold| {
        scores
            .iter()
            .enumerate()
            .filter(|(_, score)| **score >= threshold)
            .max_by(|(ia, a), (ib, b)| {
                a.partial_cmp(b)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(index, _)| (index, threshold))
    })
}

struct Candidate {
    span: Span,
    similarity: f64,
    context_score: usize,
}

pub(super) fn attempt<T: TreeAdapter + ?Sized>(ctx: &RestoreContext<'_, T>) -> LayerOutcome {
    let tree = ctx.tree;
    let cfg = &ctx.config.restore.fingerprint;
    let restore = &ctx.saved.restore;
    let fingerprint = &restore.fingerprint;

    let mut pool: Vec<NodeId> = std::iter::once(ctx.scope)
        .chain(tree.descendants(ctx.scope))
        .filter(|&node| tree.is_element(node))
        .filter(|&node| tree.depth(node).abs_diff(fingerprint.depth) <= cfg.search_depth)
        .filter(|&node| tree.text_content(node).contains(&ctx.saved.text))
        .collect();
    pool.sort_by_key(|&node| std::cmp::Reverse(tree.depth(node)));
    pool.truncate(cfg.max_tests);
    if pool.is_empty() {
        return LayerOutcome::failed("span text not found in scope");
    }
    let tested = pool.len();

    let mut candidates: Vec<Candidate> = Vec::new();
    for node in pool {
        let similarity = fingerprint_similarity(
            tree,
            node,
            fingerprint,
            &restore.context,
            cfg,
            &ctx.config.restore.multi_anchor,
        );
        if restore.context.cross_element && similarity.value < cfg.cross_element_minimum {
            continue;
        }
        let Some(located) = locate_text(
            tree,
            node,
            &ctx.saved.text,
            restore.context.parent_offset,
            &restore.context,
            None,
        ) else {
            continue;
        };
        candidates.push(Candidate {
            span: located.span,
            similarity: similarity.value,
            context_score: located.context_score,
        });
    }

    // Stronger context first so equal similarities resolve toward it
    candidates.sort_by(|a, b| b.context_score.cmp(&a.context_score));
    let scores: Vec<f64> = candidates.iter().map(|c| c.similarity).collect();
    match select_by_ladder(&scores, &cfg.thresholds) {
        Some((index, threshold)) => {
            let best = &candidates[index];
            LayerOutcome::found(
                best.span,
                format!("similarity {:.3} at threshold {threshold}", best.similarity),
            )
            .with_candidates(tested)
            .with_threshold(threshold)
        }
        None => {
            let best = scores.iter().copied().fold(0.0, f64::max);
            LayerOutcome::failed(format!("best similarity {best:.3} below every threshold"))
                .with_candidates(tested)
        }
    }
}
