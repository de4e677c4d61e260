//! # Content drift monitor
//!
//! Each watched span is re-resolved on a fixed interval and hashed over its
//! current text plus the element skeleton (tags and same-tag positions) above
//! its two ends. Id and class changes are not drift. A hash change while
//! the span still resolves is reported as a [`DriftEvent`]. A span that no
//! longer resolves is left alone until it does: a failed restore counts as
//! "no change".
//!
//! Checks are polled: the host calls [`ContentMonitor::poll`] from its own
//! timer and receives the events due at that moment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::anchoring::{Restorer, SerializedSpan, SpanId};
use crate::config::EngineConfig;
use crate::timing::Clock;
use crate::tree::{ElementPath, Span, TreeAdapter};

/// djb2 over the chars of `text`, `start_path` and `end_path`, in order
pub fn content_hash(text: &str, start_path: &str, end_path: &str) -> u32 {
    text.chars()
        .chain(start_path.chars())
        .chain(end_path.chars())
        .fold(5381u32, |hash, c| {
            hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(c as u32)
        })
}

/// Text-length change relative to the longer text, in `[0, 1]`
pub fn change_magnitude(before: &str, after: &str) -> f64 {
    let a = before.chars().count();
    let b = after.chars().count();
    a.abs_diff(b) as f64 / a.max(b).max(1) as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftEvent {
    pub id: SpanId,
    pub before: String,
    pub after: String,
    pub change_type: ChangeType,
    pub change_magnitude: f64,
    pub detected_at: u64,
}

/// Hashable snapshot of where and what a span currently is
#[derive(Debug, Clone, PartialEq)]
struct Observation {
    text: String,
    hash: u32,
}

fn observe<T: TreeAdapter + ?Sized>(tree: &T, span: &Span) -> Option<Observation> {
    let text = tree.span_text(span).ok()?;
    let path_of = |node| {
        tree.parent(node)
            .and_then(|element| ElementPath::of(tree, element))
            .map(|path| path.skeleton())
            .unwrap_or_default()
    };
    let hash = content_hash(&text, &path_of(span.start.node), &path_of(span.end.node));
    Some(Observation { text, hash })
}

#[derive(Debug)]
struct Watch {
    saved: SerializedSpan,
    last: Option<Observation>,
    next_due: u64,
}

pub struct ContentMonitor<C: Clock> {
    config: EngineConfig,
    clock: C,
    watches: BTreeMap<SpanId, Watch>,
}

impl<C: Clock> ContentMonitor<C> {
    pub fn new(config: &EngineConfig, clock: C) -> Self {
        Self {
            config: config.clone(),
            clock,
            watches: BTreeMap::new(),
        }
    }

    fn interval_ms(&self) -> u64 {
        self.config.monitor.interval_ms
    }

    /// Start watching `saved`, recording its current state as the baseline.
    /// Watching an id again restarts its schedule.
    pub fn start<T: TreeAdapter + ?Sized>(&mut self, tree: &T, saved: SerializedSpan) {
        let restorer = Restorer::new(&self.config);
        let last = restorer
            .resolve(tree, &saved)
            .ok()
            .and_then(|span| observe(tree, &span));
        let next_due = self.clock.now_ms() + self.interval_ms();
        log::trace!("Monitoring {} every {}ms", saved.id, self.interval_ms());
        self.watches.insert(
            saved.id.clone(),
            Watch {
                saved,
                last,
                next_due,
            },
        );
    }

    pub fn stop(&mut self, id: &SpanId) -> bool {
        self.watches.remove(id).is_some()
    }

    pub fn stop_all(&mut self) {
        self.watches.clear();
    }

    pub fn is_watching(&self, id: &SpanId) -> bool {
        self.watches.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Runs every check that is due, in id order
    pub fn poll<T: TreeAdapter + ?Sized>(&mut self, tree: &T) -> Vec<DriftEvent> {
        let now = self.clock.now_ms();
        let interval = self.interval_ms();
        let due: Vec<SpanId> = self
            .watches
            .iter()
            .filter(|(_, watch)| watch.next_due <= now)
            .map(|(id, _)| id.clone())
            .collect();
        let mut events = Vec::new();
        for id in due {
            if let Some(watch) = self.watches.get_mut(&id) {
                watch.next_due = now + interval;
            }
            events.extend(self.check_now(tree, &id));
        }
        events
    }

    /// Checks one span immediately, outside its schedule
    pub fn check_now<T: TreeAdapter + ?Sized>(&mut self, tree: &T, id: &SpanId) -> Option<DriftEvent> {
        let now = self.clock.now_ms();
        let restorer = Restorer::new(&self.config);
        let watch = self.watches.get_mut(id)?;
        let span = match restorer.resolve(tree, &watch.saved) {
            Ok(span) => span,
            Err(_) => {
                log::trace!("{id} did not resolve, skipping drift check");
                return None;
            }
        };
        let current = observe(tree, &span)?;
        let previous = watch.last.replace(current.clone())?;
        if previous.hash == current.hash {
            return None;
        }
        log::warn!("Content drift detected for {id}");
        Some(DriftEvent {
            id: id.clone(),
            change_magnitude: change_magnitude(&previous.text, &current.text),
            before: previous.text,
            after: current.text,
            change_type: ChangeType::Content,
            detected_at: now,
        })
    }
}
