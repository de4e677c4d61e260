//! Highlight styles per span type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Visual style handed to the renderer. Every field is optional so a later
/// registration can override a subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Renderer-specific properties
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Style {
    /// Fields set on `newer` win; unset ones keep their current value
    pub fn merge(&mut self, newer: Style) {
        if newer.color.is_some() {
            self.color = newer.color;
        }
        if newer.background.is_some() {
            self.background = newer.background;
        }
        if newer.underline.is_some() {
            self.underline = newer.underline;
        }
        if newer.opacity.is_some() {
            self.opacity = newer.opacity;
        }
        if newer.class_name.is_some() {
            self.class_name = newer.class_name;
        }
        self.extra.extend(newer.extra);
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: BTreeMap<String, Style>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or merges the style for `kind`, returning the merged result
    pub fn register(&mut self, kind: &str, style: Style) -> &Style {
        let entry = self.styles.entry(kind.to_string()).or_default();
        entry.merge(style);
        entry
    }

    pub fn get(&self, kind: &str) -> Option<&Style> {
        self.styles.get(kind)
    }

    /// Style for a span type, falling back to the default style
    pub fn resolve(&self, kind: Option<&str>) -> Style {
        kind.and_then(|kind| self.get(kind))
            .or_else(|| self.get(DEFAULT_KIND))
            .cloned()
            .unwrap_or_default()
    }

    pub fn remove(&mut self, kind: &str) -> Option<Style> {
        self.styles.remove(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }
}

/// Type used for spans saved without one
pub const DEFAULT_KIND: &str = "default";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_merges_instead_of_replacing() {
        let mut registry = StyleRegistry::new();
        registry.register(
            "note",
            Style {
                color: Some("black".to_string()),
                background: Some("yellow".to_string()),
                ..Style::default()
            },
        );
        let merged = registry
            .register(
                "note",
                Style {
                    background: Some("orange".to_string()),
                    underline: Some(true),
                    ..Style::default()
                },
            )
            .clone();

        assert_eq!(
            merged,
            Style {
                color: Some("black".to_string()),
                background: Some("orange".to_string()),
                underline: Some(true),
                ..Style::default()
            }
        );
    }

    #[test]
    fn test_resolve_falls_back_to_default_kind() {
        let mut registry = StyleRegistry::new();
        registry.register(
            DEFAULT_KIND,
            Style {
                color: Some("blue".to_string()),
                ..Style::default()
            },
        );
        assert_eq!(registry.resolve(Some("unknown")).color.as_deref(), Some("blue"));
        assert_eq!(registry.resolve(None).color.as_deref(), Some("blue"));
        assert_eq!(StyleRegistry::new().resolve(None), Style::default());
    }

    #[test]
    fn test_style_deserializes_partial_json() {
        let style: Style = serde_json::from_str(r#"{"background": "pink"}"#).unwrap();
        assert_eq!(style.background.as_deref(), Some("pink"));
    }
}
