//! Per-span geometry memoized with a time-to-live.

use std::collections::HashMap;

use crate::anchoring::SpanId;
use crate::config::GeometryConfig;
use crate::tree::{Rect, Span, TreeAdapter};

/// Geometry of one span in document coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGeometry {
    pub id: SpanId,
    pub span: Span,
    pub bounding_rect: Rect,
    pub rects: Vec<Rect>,
    pub last_updated: u64,
}

impl CachedGeometry {
    fn empty(id: SpanId, span: Span, now: u64) -> Self {
        Self {
            id,
            span,
            bounding_rect: Rect::default(),
            rects: Vec::new(),
            last_updated: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// Reads the rectangles of `span`, translated to document coordinates.
/// A tree that can no longer place the span yields an empty entry.
pub fn measure<T: TreeAdapter + ?Sized>(tree: &T, id: &SpanId, span: &Span, now: u64) -> CachedGeometry {
    let (scroll_x, scroll_y) = tree.scroll_offset();
    match tree.span_rects(span) {
        Ok(rects) => {
            let rects: Vec<Rect> = rects
                .into_iter()
                .filter(|rect| !rect.is_empty())
                .map(|rect| rect.translate(scroll_x, scroll_y))
                .collect();
            CachedGeometry {
                id: id.clone(),
                span: *span,
                bounding_rect: Rect::bounding(&rects),
                rects,
                last_updated: now,
            }
        }
        Err(e) => {
            log::debug!("Geometry unavailable for {id}: {e}");
            CachedGeometry::empty(id.clone(), *span, now)
        }
    }
}

#[derive(Debug)]
pub struct GeometryCache {
    entries: HashMap<SpanId, CachedGeometry>,
    ttl_ms: u64,
    max_entries: usize,
    last_sweep: u64,
}

impl GeometryCache {
    pub fn new(config: &GeometryConfig) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms: config.ttl_ms,
            max_entries: config.max_entries,
            last_sweep: 0,
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn sweep_interval_ms(&self) -> u64 {
        (self.ttl_ms / 2).max(1)
    }

    fn is_stale(&self, entry: &CachedGeometry, now: u64) -> bool {
        now.saturating_sub(entry.last_updated) > self.ttl_ms
    }

    /// Cached geometry for `id`, recomputed when missing, stale or recorded
    /// for a different span
    pub fn get_or_compute<T: TreeAdapter + ?Sized>(
        &mut self,
        tree: &T,
        id: &SpanId,
        span: &Span,
        now: u64,
    ) -> &CachedGeometry {
        let fresh = self
            .entries
            .get(id)
            .is_some_and(|entry| entry.span == *span && !self.is_stale(entry, now));
        if !fresh {
            log::trace!("Measuring geometry for {id}");
            let geometry = measure(tree, id, span, now);
            self.entries.insert(id.clone(), geometry);
            self.evict_overflow(Some(id));
        }
        &self.entries[id]
    }

    /// Entry for `id` regardless of age
    pub fn get(&self, id: &SpanId) -> Option<&CachedGeometry> {
        self.entries.get(id)
    }

    pub fn invalidate(&mut self, id: &SpanId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops stale entries and trims to capacity, returning how many went
    pub fn sweep(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_ms;
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.last_updated) <= ttl);
        self.evict_overflow(None);
        self.last_sweep = now;
        let removed = before - self.entries.len();
        if removed > 0 {
            log::debug!("Geometry sweep removed {removed} entries");
        }
        removed
    }

    /// Runs [`GeometryCache::sweep`] when the sweep interval has elapsed
    pub fn maybe_sweep(&mut self, now: u64) -> Option<usize> {
        if now.saturating_sub(self.last_sweep) >= self.sweep_interval_ms() {
            Some(self.sweep(now))
        } else {
            None
        }
    }

    /// Oldest-first eviction down to `max_entries`, never evicting `keep`
    fn evict_overflow(&mut self, keep: Option<&SpanId>) {
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .values()
                .filter(|entry| Some(&entry.id) != keep)
                .min_by(|a, b| {
                    a.last_updated
                        .cmp(&b.last_updated)
                        .then_with(|| a.id.cmp(&b.id))
                })
                .map(|entry| entry.id.clone());
            match oldest {
                Some(id) => {
                    self.entries.remove(&id);
                }
                None => break,
            }
        }
    }
}
