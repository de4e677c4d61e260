//! # Tree Adapter
//!
//! Read-only view over the host's document tree. The anchoring engine never
//! touches a concrete tree type: everything goes through [`TreeAdapter`],
//! which asks the host for a handful of primitives and derives the rest
//! (text-leaf enumeration, offset mapping, boundary ordering, rectangles).
//!
//! Hosts that can answer a derived question faster (a native hit-test, an
//! indexed id lookup) override the provided method.
//!
//! [`Document`] is the in-memory reference tree used by the CLI and tests.

pub mod document;
pub mod path;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;

pub use document::{Document, NodeSpec};
pub use path::{ElementPath, PathStep};

/// Handle of a node inside a tree
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A position inside a text leaf, counted in chars
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A contiguous range between two boundaries in document order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Boundary,
    pub end: Boundary,
}

impl Span {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// Span inside a single text leaf
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(Boundary::new(node, start), Boundary::new(node, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Which leaf wins when an offset falls exactly between two text leaves
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bias {
    /// Prefer the start of the following leaf (span starts)
    Forward,
    /// Prefer the end of the preceding leaf (span ends)
    Backward,
}

/// Axis-aligned rectangle
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Point containment, widened by `tolerance` on every side
    pub fn contains(&self, x: f64, y: f64, tolerance: f64) -> bool {
        x >= self.x - tolerance
            && x <= self.right() + tolerance
            && y >= self.y - tolerance
            && y <= self.bottom() + tolerance
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// Bounding rectangle of a rect list; zero-sized at the origin when empty
    pub fn bounding(rects: &[Rect]) -> Self {
        let mut iter = rects.iter().filter(|r| !r.is_empty());
        match iter.next() {
            Some(first) => iter.fold(*first, |acc, r| acc.union(r)),
            None => Rect::default(),
        }
    }
}

/// Read-only primitives over a host document tree.
///
/// Element nodes have a tag; text leaves have text. Boundaries always sit
/// inside text leaves.
pub trait TreeAdapter {
    fn root(&self) -> NodeId;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> &[NodeId];
    /// Lowercase tag name, `None` for text leaves
    fn tag(&self, node: NodeId) -> Option<&str>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;
    fn attribute_names(&self, node: NodeId) -> Vec<&str>;
    /// Text of a leaf, `None` for elements
    fn text(&self, node: NodeId) -> Option<&str>;
    /// Layout box in document coordinates, if the node has been laid out
    fn layout_rect(&self, node: NodeId) -> Option<Rect>;

    fn scroll_offset(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.tag(node).is_some()
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    /// Whether walking up from `node` reaches the root
    fn is_connected(&self, node: NodeId) -> bool {
        let root = self.root();
        let mut current = node;
        loop {
            if current == root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Number of ancestors between `node` and the root
    fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// `node` itself when it is an element, otherwise its parent
    fn nearest_element(&self, node: NodeId) -> Option<NodeId> {
        if self.is_element(node) {
            Some(node)
        } else {
            self.parent(node)
        }
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    /// All descendants in document order, excluding `node`
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Text-bearing leaves under `node` in document order
    fn text_leaves(&self, node: NodeId) -> Vec<NodeId> {
        if self.is_text(node) {
            return vec![node];
        }
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .collect()
    }

    fn text_content(&self, node: NodeId) -> String {
        self.text_leaves(node)
            .into_iter()
            .filter_map(|leaf| self.text(leaf))
            .collect()
    }

    /// Length of `text_content` in chars
    fn char_len(&self, node: NodeId) -> usize {
        self.text_leaves(node)
            .into_iter()
            .filter_map(|leaf| self.text(leaf))
            .map(|text| text.chars().count())
            .sum()
    }

    /// First element in document order carrying `name="value"`
    fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        let root = self.root();
        std::iter::once(root)
            .chain(self.descendants(root))
            .find(|&node| self.attribute(node, name) == Some(value))
    }

    fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute("id", id)
    }

    /// Ancestors from the parent of `node` up to the root
    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// Deepest element containing both nodes
    fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let a = self.nearest_element(a)?;
        let b = self.nearest_element(b)?;
        let mut chain_a = vec![a];
        chain_a.extend(self.ancestors(a));
        let mut chain_b = vec![b];
        chain_b.extend(self.ancestors(b));
        chain_a.into_iter().find(|node| chain_b.contains(node))
    }

    /// Char offset of `boundary` within the text content of `ancestor`
    fn offset_within(&self, ancestor: NodeId, boundary: Boundary) -> Option<usize> {
        let mut acc = 0;
        for leaf in self.text_leaves(ancestor) {
            if leaf == boundary.node {
                return Some(acc + boundary.offset);
            }
            acc += self.text(leaf).map_or(0, |t| t.chars().count());
        }
        None
    }

    /// Maps a char offset within `ancestor`'s text content back to a boundary
    fn boundary_at(&self, ancestor: NodeId, offset: usize, bias: Bias) -> Option<Boundary> {
        let leaves = self.text_leaves(ancestor);
        let mut acc = 0;
        let mut previous: Option<(NodeId, usize)> = None;
        for leaf in leaves {
            let len = self.text(leaf).map_or(0, |t| t.chars().count());
            if offset < acc + len || (offset == acc + len && bias == Bias::Backward && len > 0) {
                if offset == acc && bias == Bias::Backward {
                    if let Some((prev, prev_len)) = previous {
                        return Some(Boundary::new(prev, prev_len));
                    }
                }
                return Some(Boundary::new(leaf, offset - acc));
            }
            acc += len;
            if len > 0 {
                previous = Some((leaf, len));
            }
        }
        if offset == acc {
            return previous.map(|(leaf, len)| Boundary::new(leaf, len));
        }
        None
    }

    /// Checks that a boundary sits inside a connected text leaf
    fn validate_boundary(&self, boundary: Boundary) -> Result<(), TreeError> {
        let text = self
            .text(boundary.node)
            .ok_or(TreeError::NotText(boundary.node))?;
        if !self.is_connected(boundary.node) {
            return Err(TreeError::Detached(boundary.node));
        }
        let len = text.chars().count();
        if boundary.offset > len {
            return Err(TreeError::OffsetOutOfRange {
                node: boundary.node,
                offset: boundary.offset,
                len,
            });
        }
        Ok(())
    }

    /// Child-index path from the root, used as a document-order key
    fn order_key(&self, node: NodeId) -> Result<Vec<usize>, TreeError> {
        let root = self.root();
        let mut key = Vec::new();
        let mut current = node;
        while current != root {
            let parent = self.parent(current).ok_or(TreeError::Detached(node))?;
            let index = self
                .children(parent)
                .iter()
                .position(|&child| child == current)
                .ok_or(TreeError::Detached(node))?;
            key.push(index);
            current = parent;
        }
        key.reverse();
        Ok(key)
    }

    /// Orders two boundaries in document order
    fn compare_boundaries(&self, a: Boundary, b: Boundary) -> Result<Ordering, TreeError> {
        self.validate_boundary(a)?;
        self.validate_boundary(b)?;
        if a.node == b.node {
            return Ok(a.offset.cmp(&b.offset));
        }
        let key_a = self.order_key(a.node)?;
        let key_b = self.order_key(b.node)?;
        Ok(key_a.cmp(&key_b))
    }

    /// Text leaves touched by `span`, paired with the char range inside each
    fn span_pieces(&self, span: &Span) -> Result<Vec<(NodeId, usize, usize)>, TreeError> {
        if self.compare_boundaries(span.start, span.end)? == Ordering::Greater {
            return Err(TreeError::Reversed);
        }
        let root = self.root();
        let mut pieces = Vec::new();
        let mut inside = false;
        for leaf in self.text_leaves(root) {
            let len = self.text(leaf).map_or(0, |t| t.chars().count());
            if leaf == span.start.node {
                inside = true;
            }
            if inside {
                let from = if leaf == span.start.node {
                    span.start.offset
                } else {
                    0
                };
                let to = if leaf == span.end.node {
                    span.end.offset
                } else {
                    len
                };
                pieces.push((leaf, from, to));
            }
            if leaf == span.end.node {
                break;
            }
        }
        Ok(pieces)
    }

    fn span_text(&self, span: &Span) -> Result<String, TreeError> {
        let mut out = String::new();
        for (leaf, from, to) in self.span_pieces(span)? {
            if let Some(text) = self.text(leaf) {
                out.extend(text.chars().skip(from).take(to.saturating_sub(from)));
            }
        }
        Ok(out)
    }

    /// Viewport-relative rectangles of the text covered by `span`.
    ///
    /// Leaves are assumed to lay out on a single line, so a partial leaf
    /// gets the proportional slice of its box.
    fn span_rects(&self, span: &Span) -> Result<Vec<Rect>, TreeError> {
        let (scroll_x, scroll_y) = self.scroll_offset();
        let mut rects = Vec::new();
        for (leaf, from, to) in self.span_pieces(span)? {
            let Some(rect) = self.layout_rect(leaf) else {
                continue;
            };
            let len = self.text(leaf).map_or(0, |t| t.chars().count());
            if len == 0 || to <= from {
                continue;
            }
            let per_char = rect.width / len as f64;
            let slice = Rect::new(
                rect.x + per_char * from as f64,
                rect.y,
                per_char * (to - from) as f64,
                rect.height,
            );
            rects.push(slice.translate(-scroll_x, -scroll_y));
        }
        Ok(rects)
    }

    /// Topmost element under a viewport point
    fn element_at_point(&self, x: f64, y: f64) -> Option<NodeId> {
        let (scroll_x, scroll_y) = self.scroll_offset();
        let (doc_x, doc_y) = (x + scroll_x, y + scroll_y);
        self.descendants(self.root())
            .into_iter()
            .filter(|&node| self.is_element(node))
            .filter(|&node| {
                self.layout_rect(node)
                    .is_some_and(|rect| rect.contains(doc_x, doc_y, 0.0))
            })
            .last()
    }
}
