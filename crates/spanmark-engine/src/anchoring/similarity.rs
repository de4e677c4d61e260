//! Scoring primitives shared by the fuzzy restoration layers.

use std::collections::BTreeMap;

use crate::config::MultiAnchorConfig;

/// One weighted feature extracted from a class name
#[derive(Debug, Clone, PartialEq)]
struct ClassFeature {
    key: String,
    weight: f64,
}

/// Splits classes into BEM features.
///
/// `card__title--big` yields a block feature `card`, an element feature
/// `card__title` and a modifier feature `card__title--big`. A class with no
/// BEM separators is a plain feature. Low-priority prefixes (`js-`, `is-`,
/// ...) scale the feature down.
fn class_features(classes: &[String], config: &MultiAnchorConfig) -> BTreeMap<String, f64> {
    let mut features = BTreeMap::new();
    for class in classes {
        let factor = if config
            .low_priority_prefixes
            .iter()
            .any(|prefix| class.starts_with(prefix.as_str()))
        {
            config.low_priority_factor
        } else {
            1.0
        };
        for feature in bem_features(class, config) {
            let entry = features.entry(feature.key).or_insert(0.0);
            *entry = f64::max(*entry, feature.weight * factor);
        }
    }
    features
}

fn bem_features(class: &str, config: &MultiAnchorConfig) -> Vec<ClassFeature> {
    let (base, modifier) = match class.split_once("--") {
        Some((base, modifier)) => (base, Some(modifier)),
        None => (class, None),
    };
    let (block, element) = match base.split_once("__") {
        Some((block, element)) => (block, Some(element)),
        None => (base, None),
    };
    if element.is_none() && modifier.is_none() {
        return vec![ClassFeature {
            key: format!("p:{class}"),
            weight: config.plain_weight,
        }];
    }
    let mut out = vec![ClassFeature {
        key: format!("b:{block}"),
        weight: config.block_weight,
    }];
    if element.is_some() {
        out.push(ClassFeature {
            key: format!("e:{base}"),
            weight: config.element_weight,
        });
    }
    if modifier.is_some() {
        out.push(ClassFeature {
            key: format!("m:{class}"),
            weight: config.modifier_weight,
        });
    }
    out
}

/// Weighted Jaccard similarity of two class lists, in `[0, 1]`.
/// Two empty lists are identical.
pub fn class_similarity(recorded: &[String], candidate: &[String], config: &MultiAnchorConfig) -> f64 {
    if recorded.is_empty() && candidate.is_empty() {
        return 1.0;
    }
    let a = class_features(recorded, config);
    let b = class_features(candidate, config);
    let mut shared = 0.0;
    let mut union = 0.0;
    for (key, weight) in &a {
        match b.get(key) {
            Some(other) => {
                shared += weight.min(*other);
                union += weight.max(*other);
            }
            None => union += weight,
        }
    }
    for (key, weight) in &b {
        if !a.contains_key(key) {
            union += weight;
        }
    }
    if union == 0.0 { 0.0 } else { shared / union }
}

/// How well an element's leading text matches the expected span text
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum TextConfidence {
    None,
    Medium,
    High,
}

impl TextConfidence {
    pub fn score(self) -> f64 {
        match self {
            TextConfidence::None => 0.0,
            TextConfidence::Medium => 0.5,
            TextConfidence::High => 1.0,
        }
    }
}

/// Looks for the expected text's prefix inside the element text window.
///
/// The expected text is cut to `expected_window` chars and the element text
/// to `element_window` chars before comparing.
pub fn text_confidence(expected: &str, element_text: &str, config: &MultiAnchorConfig) -> TextConfidence {
    let expected = normalize_whitespace(&take_chars(expected, config.expected_window));
    let window = normalize_whitespace(&take_chars(element_text, config.element_window));
    if expected.is_empty() {
        return TextConfidence::None;
    }
    let high = take_chars(&expected, config.high_confidence_prefix);
    if window.contains(high.as_str()) {
        return TextConfidence::High;
    }
    let medium = take_chars(&expected, config.medium_confidence_prefix);
    if window.contains(medium.as_str()) {
        return TextConfidence::Medium;
    }
    TextConfidence::None
}

const SEMANTIC_GROUPS: &[&[&str]] = &[
    &["b", "strong"],
    &["i", "em", "cite"],
    &["s", "strike", "del"],
    &["u", "ins"],
    &["div", "section", "article", "main", "aside", "header", "footer", "nav"],
    &["ul", "ol", "menu"],
    &["h1", "h2", "h3", "h4", "h5", "h6"],
    &["pre", "code"],
    &["span", "font", "mark"],
    &["td", "th"],
];

/// Tags that render the same role, e.g. `b`/`strong`
pub fn tags_equivalent(a: &str, b: &str) -> bool {
    SEMANTIC_GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

pub fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Last `n` chars of `text`
pub fn take_last_chars(text: &str, n: usize) -> String {
    let len = text.chars().count();
    text.chars().skip(len.saturating_sub(n)).collect()
}

/// Chars `[from, to)` of `text`
pub fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Char offsets of every occurrence of `needle` in `haystack`, overlapping
/// occurrences included
pub fn find_char_offsets(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut char_pos = 0;
    let mut last_byte = 0;
    let mut search_from = 0;
    while let Some(found) = haystack[search_from..].find(needle) {
        let byte = search_from + found;
        char_pos += haystack[last_byte..byte].chars().count();
        last_byte = byte;
        out.push(char_pos);
        let step = haystack[byte..].chars().next().map_or(1, char::len_utf8);
        search_from = byte + step;
    }
    out
}

/// Ratio of the smaller to the larger value; 1 when both are zero
pub fn ratio(a: usize, b: usize) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if hi == 0 { 1.0 } else { lo as f64 / hi as f64 }
}
