//! # Overlap classification
//!
//! Relates a freshly created span (`current`) to a previously saved one
//! (`existing`) using four boundary comparisons:
//!
//! | comparison | meaning |
//! |---|---|
//! | `cmp(current.end, existing.start)` | current ends after existing starts |
//! | `cmp(current.start, existing.end)` | current starts before existing ends |
//! | `cmp(current.start, existing.start)` | start vs start |
//! | `cmp(current.end, existing.end)` | end vs end |
//!
//! Spans overlap when the first is positive and the second negative, so
//! touching spans do not overlap. Containment is checked existing-first:
//! identical spans classify as `ExistingContainsCurrent` in both directions.
//!
//! Comparison failures (detached nodes, foreign trees) never surface; the
//! pair is reported as `NoOverlap`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::anchoring::{Restorer, SerializedSpan, SpanId};
use crate::config::EngineConfig;
use crate::error::{ComparisonError, RestoreFailure};
use crate::tree::{Boundary, Span, TreeAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlapType {
    NoOverlap,
    ExistingContainsCurrent,
    CurrentContainsExisting,
    PartialOverlap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub has_overlap: bool,
    pub overlap_type: OverlapType,
}

impl Classification {
    const NONE: Classification = Classification {
        has_overlap: false,
        overlap_type: OverlapType::NoOverlap,
    };
}

fn cmp<T: TreeAdapter + ?Sized>(tree: &T, a: Boundary, b: Boundary) -> Result<i8, ComparisonError> {
    Ok(match tree.compare_boundaries(a, b)? {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

pub fn try_classify<T: TreeAdapter + ?Sized>(
    tree: &T,
    current: &Span,
    existing: &Span,
) -> Result<Classification, ComparisonError> {
    let end_vs_start = cmp(tree, current.end, existing.start)?;
    let start_vs_end = cmp(tree, current.start, existing.end)?;
    if !(end_vs_start > 0 && start_vs_end < 0) {
        return Ok(Classification::NONE);
    }
    let start_vs_start = cmp(tree, current.start, existing.start)?;
    let end_vs_end = cmp(tree, current.end, existing.end)?;
    let overlap_type = if start_vs_start >= 0 && end_vs_end <= 0 {
        OverlapType::ExistingContainsCurrent
    } else if start_vs_start <= 0 && end_vs_end >= 0 {
        OverlapType::CurrentContainsExisting
    } else {
        OverlapType::PartialOverlap
    };
    Ok(Classification {
        has_overlap: true,
        overlap_type,
    })
}

/// Like [`try_classify`] but degrades any comparison failure to no overlap
pub fn classify<T: TreeAdapter + ?Sized>(tree: &T, current: &Span, existing: &Span) -> Classification {
    try_classify(tree, current, existing).unwrap_or_else(|e| {
        log::debug!("Overlap comparison failed, treating as disjoint: {e}");
        Classification::NONE
    })
}

/// An overlap between the current span and one saved span
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapRecord {
    pub selection_id: SpanId,
    /// Text of the current span
    pub text: String,
    pub overlap_type: OverlapType,
    pub overlapped_span: Span,
    /// Text of the saved span as it resolves now
    pub overlapped_text: String,
    pub selection_data: SerializedSpan,
}

#[derive(Debug, Clone, Default)]
pub struct OverlapReport {
    pub records: Vec<OverlapRecord>,
    /// Saved spans that could not be resolved
    pub errors: Vec<RestoreFailure>,
    /// How many saved spans were examined
    pub checked: usize,
}

impl OverlapReport {
    pub fn has_overlap(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Checks `current` against the most recent saved spans.
///
/// `saved` is in save order, oldest first; only the last
/// `config.overlap.batch_limit` entries are re-resolved and compared.
pub fn check_overlaps<T: TreeAdapter + ?Sized>(
    tree: &T,
    current: &Span,
    saved: &[SerializedSpan],
    config: &EngineConfig,
) -> OverlapReport {
    let restorer = Restorer::new(config);
    let recent = &saved[saved.len().saturating_sub(config.overlap.batch_limit)..];
    let text = tree.span_text(current).unwrap_or_default();
    let mut report = OverlapReport {
        checked: recent.len(),
        ..OverlapReport::default()
    };
    for candidate in recent {
        let existing = match restorer.resolve(tree, candidate) {
            Ok(span) => span,
            Err(failure) => {
                log::debug!("Skipping overlap check against {}: {failure}", candidate.id);
                report.errors.push(failure);
                continue;
            }
        };
        let classification = classify(tree, current, &existing);
        if !classification.has_overlap {
            continue;
        }
        report.records.push(OverlapRecord {
            selection_id: candidate.id.clone(),
            text: text.clone(),
            overlap_type: classification.overlap_type,
            overlapped_span: existing,
            overlapped_text: tree.span_text(&existing).unwrap_or_default(),
            selection_data: candidate.clone(),
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Document, NodeId};
    use rstest::rstest;

    fn line() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(root, "p", &[]);
        let text = doc.append_text(p, "0123456789abcdefghij");
        (doc, text)
    }

    #[rstest]
    #[case((2, 5), (0, 10), OverlapType::ExistingContainsCurrent)]
    #[case((0, 10), (2, 5), OverlapType::CurrentContainsExisting)]
    #[case((0, 6), (4, 10), OverlapType::PartialOverlap)]
    #[case((4, 10), (0, 6), OverlapType::PartialOverlap)]
    #[case((0, 5), (5, 10), OverlapType::NoOverlap)]
    #[case((6, 9), (0, 3), OverlapType::NoOverlap)]
    #[case((3, 7), (3, 7), OverlapType::ExistingContainsCurrent)]
    fn test_classify(#[case] current: (usize, usize), #[case] existing: (usize, usize), #[case] expected: OverlapType) {
        let (doc, text) = line();
        let result = classify(
            &doc,
            &Span::within(text, current.0, current.1),
            &Span::within(text, existing.0, existing.1),
        );
        assert_eq!(result.overlap_type, expected);
        assert_eq!(result.has_overlap, expected != OverlapType::NoOverlap);
    }

    #[test]
    fn test_comparison_failure_degrades() {
        let (mut doc, text) = line();
        let root = doc.root();
        let p2 = doc.append_element(root, "p", &[]);
        let other = doc.append_text(p2, "detached soon");
        doc.remove(p2);

        let current = Span::within(text, 0, 5);
        let existing = Span::within(other, 0, 5);
        assert!(try_classify(&doc, &current, &existing).is_err());
        assert_eq!(classify(&doc, &current, &existing), Classification::NONE);
    }

    #[test]
    fn test_overlap_type_wire_names() {
        let json = serde_json::to_string(&OverlapType::ExistingContainsCurrent).unwrap();
        assert_eq!(json, "\"EXISTING_CONTAINS_CURRENT\"");
    }
}
