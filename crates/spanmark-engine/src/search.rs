//! Keyword match candidates.
//!
//! Finds every occurrence of a keyword in a scope as a prospective span and
//! marks which of them collide with spans already active. Filtering is a
//! pure function over the candidate list.

use crate::anchoring::SpanId;
use crate::overlap::{classify, OverlapType};
use crate::tree::{Bias, NodeId, Span, TreeAdapter};

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOverlap {
    pub id: SpanId,
    pub overlap_type: OverlapType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// Position in the candidate list
    pub index: usize,
    pub span: Span,
    pub text: String,
    pub has_overlap: bool,
    pub overlaps: Vec<CandidateOverlap>,
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Char offsets of non-overlapping, case-insensitive occurrences
fn find_ignore_case(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut out = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return out;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        let hit = haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(&a, &b)| chars_eq_ignore_case(a, b));
        if hit {
            out.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    out
}

/// Every occurrence of `keyword` under `scope`, classified against `active`
pub fn find_matches<T: TreeAdapter + ?Sized>(
    tree: &T,
    scope: NodeId,
    keyword: &str,
    active: &[(SpanId, Span)],
) -> Vec<MatchCandidate> {
    let haystack: Vec<char> = tree.text_content(scope).chars().collect();
    let needle: Vec<char> = keyword.trim().chars().collect();
    let mut out = Vec::new();
    for offset in find_ignore_case(&haystack, &needle) {
        let end = offset + needle.len();
        let (Some(start), Some(stop)) = (
            tree.boundary_at(scope, offset, Bias::Forward),
            tree.boundary_at(scope, end, Bias::Backward),
        ) else {
            continue;
        };
        let span = Span::new(start, stop);
        let overlaps: Vec<CandidateOverlap> = active
            .iter()
            .filter_map(|(id, existing)| {
                let classification = classify(tree, &span, existing);
                classification.has_overlap.then(|| CandidateOverlap {
                    id: id.clone(),
                    overlap_type: classification.overlap_type,
                })
            })
            .collect();
        out.push(MatchCandidate {
            index: out.len(),
            span,
            text: haystack[offset..end].iter().collect(),
            has_overlap: !overlaps.is_empty(),
            overlaps,
        });
    }
    log::trace!("{} candidates for keyword {keyword:?}", out.len());
    out
}

/// Keeps candidates free of overlaps whose text contains `keyword`
/// (case-insensitive), renumbering what is left
pub fn filter_candidates(candidates: Vec<MatchCandidate>, keyword: &str) -> Vec<MatchCandidate> {
    let needle: Vec<char> = keyword.trim().chars().collect();
    candidates
        .into_iter()
        .filter(|candidate| !candidate.has_overlap)
        .filter(|candidate| {
            let text: Vec<char> = candidate.text.chars().collect();
            needle.is_empty() || !find_ignore_case(&text, &needle).is_empty()
        })
        .enumerate()
        .map(|(index, candidate)| MatchCandidate { index, ..candidate })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Document;
    use pretty_assertions::assert_eq;

    fn doc() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(root, "p", &[]);
        let text = doc.append_text(p, "Rust is fast. rust is safe. RUST!");
        (doc, p, text)
    }

    #[test]
    fn test_find_matches_case_insensitive() {
        let (doc, p, text) = doc();
        let matches = find_matches(&doc, p, "rust", &[]);
        let spans: Vec<Span> = matches.iter().map(|m| m.span).collect();
        assert_eq!(
            spans,
            vec![
                Span::within(text, 0, 4),
                Span::within(text, 14, 18),
                Span::within(text, 28, 32),
            ]
        );
        assert_eq!(matches[2].text, "RUST");
        assert_eq!(matches[2].index, 2);
    }

    #[test]
    fn test_overlapping_candidates_filtered_and_renumbered() {
        let (doc, p, text) = doc();
        let active = vec![(SpanId::from("saved"), Span::within(text, 10, 20))];
        let matches = find_matches(&doc, p, "rust", &active);
        assert!(matches[1].has_overlap);
        assert_eq!(matches[1].overlaps[0].id, SpanId::from("saved"));
        assert_eq!(matches[1].overlaps[0].overlap_type, OverlapType::ExistingContainsCurrent);

        let kept = filter_candidates(matches, "RUST");
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].index, 1);
        assert_eq!(kept[1].span, Span::within(text, 28, 32));
    }

    #[test]
    fn test_filter_drops_non_matching_text() {
        let (doc, p, _) = doc();
        let matches = find_matches(&doc, p, "is", &[]);
        assert_eq!(matches.len(), 2);
        assert!(filter_candidates(matches, "safe").is_empty());
    }

    #[test]
    fn test_empty_keyword_has_no_matches() {
        let (doc, p, _) = doc();
        assert!(find_matches(&doc, p, "  ", &[]).is_empty());
    }
}
