//! # Restoration cascade
//!
//! Relocates a [`SerializedSpan`] in the current tree by trying four layers
//! in strict order, most precise first:
//!
//! 1. **Anchor**: stable identifiers plus text offsets
//! 2. **Path**: structural element paths plus text offsets
//! 3. **Multi-anchor**: signature candidate search with class/text scoring
//! 4. **Fingerprint**: structural similarity under a relaxing threshold ladder
//!
//! The first layer that produces a span wins and later layers never run.
//! Layers are single-attempt: a failure is structural, retrying against the
//! same tree would fail the same way. Every search is capped by the limits in
//! [`RestoreConfig`](crate::config::RestoreConfig), so the cost is bounded
//! whatever the tree looks like.
//!
//! Restoration is a pure function of the saved span and the tree: the same
//! inputs always give the same layer and the same boundaries.

mod anchor;
mod fingerprint;
mod multi_anchor;
mod path;

use std::cmp::Ordering;
use std::ops::Range;
use std::time::Duration;

use crate::anchoring::model::{RuntimeStatus, SerializedSpan, SpanId, TextContext};
use crate::anchoring::serializer::scope_root;
use crate::anchoring::similarity::{char_slice, find_char_offsets};
use crate::config::EngineConfig;
use crate::error::{ConfigError, RestoreFailure};
use crate::timing::ScopedTimer;
use crate::tree::{Bias, NodeId, Span, TreeAdapter};

pub use fingerprint::{fingerprint_similarity, select_by_ladder, Similarity};

/// One strategy of the cascade. `None` means nothing succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    None = 0,
    Anchor = 1,
    Path = 2,
    MultiAnchor = 3,
    Fingerprint = 4,
}

impl Layer {
    pub const CASCADE: [Layer; 4] = [
        Layer::Anchor,
        Layer::Path,
        Layer::MultiAnchor,
        Layer::Fingerprint,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Layer::None => "none",
            Layer::Anchor => "anchor",
            Layer::Path => "path",
            Layer::MultiAnchor => "multi-anchor",
            Layer::Fingerprint => "fingerprint",
        }
    }
}

/// Diagnostics for one executed layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAttempt {
    pub layer: Layer,
    pub success: bool,
    pub detail: String,
    pub candidates_tested: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreResult {
    pub success: bool,
    pub layer: Layer,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub span: Option<Span>,
    /// Layers that actually ran, in order
    pub attempts: Vec<LayerAttempt>,
    /// Fingerprint threshold that accepted the span (layer 4 only)
    pub threshold: Option<f64>,
}

impl RestoreResult {
    pub fn layer_name(&self) -> &'static str {
        self.layer.name()
    }

    fn failed(error: String, attempts: Vec<LayerAttempt>, elapsed: Duration) -> Self {
        Self {
            success: false,
            layer: Layer::None,
            error: Some(error),
            elapsed,
            span: None,
            attempts,
            threshold: None,
        }
    }

    pub fn runtime_status(&self) -> RuntimeStatus {
        RuntimeStatus {
            restored: self.success,
            layer: self.layer,
        }
    }
}

/// What a single layer produced
#[derive(Debug, Clone)]
pub(crate) struct LayerOutcome {
    span: Option<Span>,
    detail: String,
    candidates_tested: usize,
    threshold: Option<f64>,
}

impl LayerOutcome {
    pub(crate) fn found(span: Span, detail: impl Into<String>) -> Self {
        Self {
            span: Some(span),
            detail: detail.into(),
            candidates_tested: 0,
            threshold: None,
        }
    }

    pub(crate) fn failed(detail: impl Into<String>) -> Self {
        Self {
            span: None,
            detail: detail.into(),
            candidates_tested: 0,
            threshold: None,
        }
    }

    pub(crate) fn with_candidates(mut self, tested: usize) -> Self {
        self.candidates_tested = tested;
        self
    }

    pub(crate) fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Inputs shared by every layer
pub(crate) struct RestoreContext<'a, T: TreeAdapter + ?Sized> {
    pub tree: &'a T,
    pub saved: &'a SerializedSpan,
    pub config: &'a EngineConfig,
    pub scope: NodeId,
}

/// Restored spans plus every failure, for partial-success reporting
#[derive(Debug, Clone, Default)]
pub struct BatchRestoreReport {
    pub restored: Vec<(SpanId, RestoreResult)>,
    pub failures: Vec<RestoreFailure>,
}

impl BatchRestoreReport {
    pub fn success_count(&self) -> usize {
        self.restored.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

pub struct Restorer<'a> {
    config: &'a EngineConfig,
}

impl<'a> Restorer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Run the cascade. Never panics; failures come back as
    /// `RestoreResult { success: false, layer: Layer::None }`.
    pub fn restore<T: TreeAdapter + ?Sized>(&self, tree: &T, saved: &SerializedSpan) -> RestoreResult {
        let timer = ScopedTimer::start("restore");
        let scope = match scope_root(tree, &self.config.anchor) {
            Ok(scope) => scope,
            Err(e) => {
                log::error!("Skipping restore of {}: {e}", saved.id);
                return RestoreResult::failed(
                    format!("configuration error: {e}"),
                    Vec::new(),
                    timer.elapsed(),
                );
            }
        };
        let ctx = RestoreContext {
            tree,
            saved,
            config: self.config,
            scope,
        };

        let mut attempts = Vec::with_capacity(Layer::CASCADE.len());
        for layer in Layer::CASCADE {
            let outcome = match layer {
                Layer::Anchor => anchor::attempt(&ctx),
                Layer::Path => path::attempt(&ctx),
                Layer::MultiAnchor => multi_anchor::attempt(&ctx),
                Layer::Fingerprint => fingerprint::attempt(&ctx),
                Layer::None => continue,
            };
            let span = outcome.span.filter(|span| is_ordered(tree, span));
            attempts.push(LayerAttempt {
                layer,
                success: span.is_some(),
                detail: outcome.detail,
                candidates_tested: outcome.candidates_tested,
            });
            if let Some(span) = span {
                log::debug!("Restored {} at layer {} ({})", saved.id, layer.number(), layer.name());
                return RestoreResult {
                    success: true,
                    layer,
                    error: None,
                    elapsed: timer.elapsed(),
                    span: Some(span),
                    attempts,
                    threshold: outcome.threshold,
                };
            }
            log::trace!("Layer {} failed for {}", layer.name(), saved.id);
        }

        log::debug!("Restore failed for {} after {} layers", saved.id, attempts.len());
        RestoreResult::failed(
            "no restoration layer succeeded".to_string(),
            attempts,
            timer.elapsed(),
        )
    }

    /// Like [`Restorer::restore`] but typed as a `Result`
    pub fn resolve<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        saved: &SerializedSpan,
    ) -> Result<Span, RestoreFailure> {
        let result = self.restore(tree, saved);
        match result.span {
            Some(span) if result.success => Ok(span),
            _ => Err(self.failure(tree, saved, result)),
        }
    }

    fn failure<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        saved: &SerializedSpan,
        result: RestoreResult,
    ) -> RestoreFailure {
        let config: Option<ConfigError> = scope_root(tree, &self.config.anchor).err();
        RestoreFailure {
            span_id: saved.id.clone(),
            attempts: result.attempts,
            config,
        }
    }

    /// Restore every span, recording runtime status on each. One failure
    /// never stops the batch.
    pub fn restore_batch<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        spans: &mut [SerializedSpan],
    ) -> BatchRestoreReport {
        let mut report = BatchRestoreReport::default();
        for saved in spans.iter_mut() {
            let result = self.restore(tree, saved);
            saved.runtime = Some(result.runtime_status());
            if result.success {
                report.restored.push((saved.id.clone(), result));
            } else {
                report.failures.push(self.failure(tree, saved, result));
            }
        }
        report
    }
}

fn is_ordered<T: TreeAdapter + ?Sized>(tree: &T, span: &Span) -> bool {
    !span.is_collapsed()
        && matches!(
            tree.compare_boundaries(span.start, span.end),
            Ok(Ordering::Less)
        )
}

/// Length of the common suffix of `a` and `b`, in chars
fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// A located occurrence of the saved text
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Located {
    pub span: Span,
    /// Chars of recorded context matching around the occurrence
    pub context_score: usize,
}

/// Finds the saved text inside `container` and maps it to a span.
///
/// Occurrences must start inside `window` when one is given. Among several,
/// the one agreeing with the recorded context on more chars wins, then the
/// one closest to `hint`, then the earliest.
pub(crate) fn locate_text<T: TreeAdapter + ?Sized>(
    tree: &T,
    container: NodeId,
    text: &str,
    hint: usize,
    context: &TextContext,
    window: Option<Range<usize>>,
) -> Option<Located> {
    let full = tree.text_content(container);
    let len = text.chars().count();
    let best = find_char_offsets(&full, text)
        .into_iter()
        .filter(|offset| window.as_ref().is_none_or(|w| w.contains(offset)))
        .map(|offset| {
            let before = char_slice(&full, offset.saturating_sub(context.preceding.chars().count()), offset);
            let after = char_slice(&full, offset + len, offset + len + context.following.chars().count());
            let score = common_suffix(&before, &context.preceding) + common_prefix(&after, &context.following);
            (offset, score)
        })
        .min_by(|(a, sa), (b, sb)| {
            sb.cmp(sa)
                .then_with(|| a.abs_diff(hint).cmp(&b.abs_diff(hint)))
                .then_with(|| a.cmp(b))
        })?;
    let (offset, context_score) = best;
    let start = tree.boundary_at(container, offset, Bias::Forward)?;
    let end = tree.boundary_at(container, offset + len, Bias::Backward)?;
    Some(Located {
        span: Span::new(start, end),
        context_score,
    })
}
