//! Structural element paths.
//!
//! A path is the chain of elements from below the root down to a target,
//! one [`PathStep`] per level. Each step keeps the tag, id and classes for
//! diagnostics and scoring, but resolution only relies on the tag and the
//! step's position among same-tag siblings, so a path survives id and class
//! churn as long as the element skeleton is unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, TreeAdapter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Position among element siblings sharing the same tag (0-based)
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementPath(pub Vec<PathStep>);

/// Splits a `class` attribute into its class names
pub fn class_list<T: TreeAdapter + ?Sized>(tree: &T, node: NodeId) -> Vec<String> {
    tree.attribute(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

impl ElementPath {
    /// Path from the root to `element`; `None` for detached nodes or text leaves
    pub fn of<T: TreeAdapter + ?Sized>(tree: &T, element: NodeId) -> Option<Self> {
        if !tree.is_element(element) || !tree.is_connected(element) {
            return None;
        }
        let root = tree.root();
        let mut steps = Vec::new();
        let mut current = element;
        while current != root {
            let parent = tree.parent(current)?;
            let tag = tree.tag(current)?;
            let index = tree
                .element_children(parent)
                .into_iter()
                .filter(|&sibling| tree.tag(sibling) == Some(tag))
                .position(|sibling| sibling == current)?;
            steps.push(PathStep {
                tag: tag.to_string(),
                id: tree.attribute(current, "id").map(str::to_string),
                classes: class_list(tree, current),
                index,
            });
            current = parent;
        }
        steps.reverse();
        Some(Self(steps))
    }

    /// Walks the path down from the root
    pub fn resolve<T: TreeAdapter + ?Sized>(&self, tree: &T) -> Option<NodeId> {
        let mut current = tree.root();
        for step in &self.0 {
            current = tree
                .element_children(current)
                .into_iter()
                .filter(|&child| tree.tag(child) == Some(step.tag.as_str()))
                .nth(step.index)?;
        }
        Some(current)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// Tag and same-tag index of each step, ignoring ids and classes
    pub fn skeleton(&self) -> String {
        self.0
            .iter()
            .map(|step| format!("{}[{}]", step.tag, step.index))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        write!(f, ":nth-of-type({})", self.index + 1)
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
