//! Answers "which span is under this point".
//!
//! With a marker attribute configured, the host's element-at-point primitive
//! is tried first and its ancestors are checked for a span marker. Otherwise
//! (or when no marker is found) the spatial index supplies candidates that
//! pass a bounding-rect precheck and then a precise per-rect test. The
//! smallest matching span wins so nested spans stay reachable.

use std::collections::BTreeMap;

use crate::anchoring::SpanId;
use crate::config::InteractionConfig;
use crate::geometry::cache::GeometryCache;
use crate::geometry::spatial::SpatialIndex;
use crate::timing::Clock;
use crate::tree::{Span, TreeAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPath {
    Marker,
    Geometry,
    Throttled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: Option<SpanId>,
    pub path: HitPath,
}

pub struct InteractionDetector<C: Clock> {
    config: InteractionConfig,
    clock: C,
    last_check: Option<u64>,
    last_hit: Option<SpanId>,
}

impl<C: Clock> InteractionDetector<C> {
    pub fn new(config: &InteractionConfig, clock: C) -> Self {
        Self {
            config: config.clone(),
            clock,
            last_check: None,
            last_hit: None,
        }
    }

    /// Forget the throttled result, e.g. after spans were removed
    pub fn reset(&mut self) {
        self.last_check = None;
        self.last_hit = None;
    }

    pub fn detect<T: TreeAdapter + ?Sized>(
        &mut self,
        tree: &T,
        x: f64,
        y: f64,
        active: &BTreeMap<SpanId, Span>,
        cache: &mut GeometryCache,
        index: &SpatialIndex,
    ) -> Option<SpanId> {
        self.detect_hit(tree, x, y, active, cache, index).id
    }

    /// Like [`InteractionDetector::detect`], also reporting which path answered
    pub fn detect_hit<T: TreeAdapter + ?Sized>(
        &mut self,
        tree: &T,
        x: f64,
        y: f64,
        active: &BTreeMap<SpanId, Span>,
        cache: &mut GeometryCache,
        index: &SpatialIndex,
    ) -> Hit {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_check {
            if now.saturating_sub(last) < self.config.throttle_ms {
                return Hit {
                    id: self.last_hit.clone(),
                    path: HitPath::Throttled,
                };
            }
        }
        self.last_check = Some(now);

        let hit = match self.marker_hit(tree, x, y, active) {
            Some(id) => Hit {
                id: Some(id),
                path: HitPath::Marker,
            },
            None => Hit {
                id: self.geometry_hit(tree, x, y, active, cache, index, now),
                path: HitPath::Geometry,
            },
        };
        self.last_hit = hit.id.clone();
        hit
    }

    fn marker_hit<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        x: f64,
        y: f64,
        active: &BTreeMap<SpanId, Span>,
    ) -> Option<SpanId> {
        let marker = self.config.marker_attribute.as_deref()?;
        let element = tree.element_at_point(x, y)?;
        std::iter::once(element)
            .chain(tree.ancestors(element))
            .filter_map(|node| tree.attribute(node, marker))
            .map(SpanId::from)
            .find(|id| active.contains_key(id))
    }

    #[allow(clippy::too_many_arguments)]
    fn geometry_hit<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        x: f64,
        y: f64,
        active: &BTreeMap<SpanId, Span>,
        cache: &mut GeometryCache,
        index: &SpatialIndex,
        now: u64,
    ) -> Option<SpanId> {
        let (scroll_x, scroll_y) = tree.scroll_offset();
        let (doc_x, doc_y) = (x + scroll_x, y + scroll_y);
        let tolerance = self.config.tolerance;
        let mut best: Option<(f64, SpanId)> = None;
        for id in index.query(doc_x, doc_y) {
            let Some(span) = active.get(&id) else {
                continue;
            };
            let geometry = cache.get_or_compute(tree, &id, span, now);
            if geometry.is_empty() || !geometry.bounding_rect.contains(doc_x, doc_y, tolerance) {
                continue;
            }
            if !geometry.rects.iter().any(|rect| rect.contains(doc_x, doc_y, tolerance)) {
                continue;
            }
            let area = geometry.bounding_rect.area();
            if best.as_ref().is_none_or(|(smallest, _)| area < *smallest) {
                best = Some((area, id));
            }
        }
        best.map(|(_, id)| id)
    }
}
