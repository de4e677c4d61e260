//! Uniform grid over document coordinates for coarse point queries.
//!
//! A span is registered in every cell its rectangles touch. A point query
//! looks at the 3x3 block of cells around the point, so a rectangle sitting
//! just across a cell edge is still returned. Results are candidates only;
//! callers run the precise containment test.

use std::collections::{BTreeSet, HashMap};

use crate::anchoring::SpanId;
use crate::config::SpatialConfig;
use crate::tree::Rect;

type Cell = (i64, i64);

#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<Cell, BTreeSet<SpanId>>,
    /// Reverse map so removal never scans the grid
    membership: HashMap<SpanId, Vec<Cell>>,
}

impl SpatialIndex {
    pub fn new(config: &SpatialConfig) -> Self {
        Self {
            cell_size: config.cell_size,
            cells: HashMap::new(),
            membership: HashMap::new(),
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> Cell {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// Registers `rects` (document coordinates) under `id`, replacing any
    /// previous registration
    pub fn insert(&mut self, id: &SpanId, rects: &[Rect]) {
        self.remove(id);
        let mut touched: BTreeSet<Cell> = BTreeSet::new();
        for rect in rects.iter().filter(|rect| !rect.is_empty()) {
            let (min_x, min_y) = self.cell_of(rect.x, rect.y);
            let (max_x, max_y) = self.cell_of(rect.right(), rect.bottom());
            for cx in min_x..=max_x {
                for cy in min_y..=max_y {
                    touched.insert((cx, cy));
                }
            }
        }
        if touched.is_empty() {
            return;
        }
        for cell in &touched {
            self.cells.entry(*cell).or_default().insert(id.clone());
        }
        self.membership.insert(id.clone(), touched.into_iter().collect());
    }

    pub fn remove(&mut self, id: &SpanId) -> bool {
        let Some(cells) = self.membership.remove(id) else {
            return false;
        };
        for cell in cells {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.remove(id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Deduplicated candidates near a document-coordinate point, in id order
    pub fn query(&self, x: f64, y: f64) -> Vec<SpanId> {
        let (cx, cy) = self.cell_of(x, y);
        let mut found: BTreeSet<&SpanId> = BTreeSet::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.cells.get(&(cx + dx, cy + dy)) {
                    found.extend(ids.iter());
                }
            }
        }
        found.into_iter().cloned().collect()
    }

    /// Query with a viewport point and the current scroll offset
    pub fn query_viewport(&self, x: f64, y: f64, scroll: (f64, f64)) -> Vec<SpanId> {
        self.query(x + scroll.0, y + scroll.1)
    }

    pub fn contains(&self, id: &SpanId) -> bool {
        self.membership.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.membership.clear();
    }
}
