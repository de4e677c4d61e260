//! # Session coordinator
//!
//! Owns the lifecycle of active spans. Three maps move together:
//!
//! - `instances`: the saved span plus its capabilities
//! - `active`: the currently resolved span
//! - `handles`: the renderer handle of the painted highlight
//!
//! Adding a span paints it, measures and indexes its geometry and starts its
//! drift monitor. Removing it undoes all of that. Nothing is garbage
//! collected implicitly: every component is updated on each change.
//!
//! Instances never point back at the session. Each one receives a
//! [`SpanCapabilities`] value holding two closures (style lookup and clear
//! request) over state shared with the session.

pub mod style;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::anchoring::serializer::scope_root;
use crate::anchoring::{RestoreResult, Restorer, SerializedSpan, Serializer, SpanId, VolatileIdFilter};
use crate::config::EngineConfig;
use crate::error::{ConfigError, SerializeError};
use crate::geometry::{GeometryCache, InteractionDetector, SpatialIndex};
use crate::monitor::{ContentMonitor, DriftEvent};
use crate::overlap::{check_overlaps, OverlapReport};
use crate::search::{find_matches, MatchCandidate};
use crate::timing::{Clock, Debouncer};
use crate::tree::{Span, TreeAdapter};

pub use style::{Style, StyleRegistry, DEFAULT_KIND};

/// Rendering collaborator. The engine only hands it resolved spans.
pub trait Renderer {
    type Handle: Clone + fmt::Debug;

    fn paint(&mut self, span: &Span, kind: Option<&str>, style: &Style) -> Self::Handle;
    fn clear(&mut self, handle: Self::Handle);
    fn clear_by_type(&mut self, kind: &str);
    fn register_style(&mut self, kind: &str, style: &Style);
    fn scroll_into_view(&mut self, span: &Span);
}

/// What a span instance may ask of its session
#[derive(Clone)]
pub struct SpanCapabilities {
    style_for: Rc<dyn Fn(Option<&str>) -> Style>,
    request_clear: Rc<dyn Fn(&SpanId)>,
}

impl fmt::Debug for SpanCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanCapabilities").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SpanInstance {
    saved: SerializedSpan,
    capabilities: SpanCapabilities,
}

impl SpanInstance {
    pub fn id(&self) -> &SpanId {
        &self.saved.id
    }

    pub fn kind(&self) -> Option<&str> {
        self.saved.kind.as_deref()
    }

    pub fn saved(&self) -> &SerializedSpan {
        &self.saved
    }

    /// Current style for this span's type
    pub fn style(&self) -> Style {
        (self.capabilities.style_for)(self.kind())
    }

    /// Asks the session to clear this span's highlight on its next tick
    pub fn clear_highlight(&self) {
        (self.capabilities.request_clear)(self.id());
    }
}

type ChangeListener = Box<dyn FnMut(usize)>;

pub struct Session<R: Renderer, C: Clock + Clone> {
    config: EngineConfig,
    clock: C,
    renderer: R,
    styles: Rc<RefCell<StyleRegistry>>,
    pending_clears: Rc<RefCell<Vec<SpanId>>>,
    instances: BTreeMap<SpanId, SpanInstance>,
    active: BTreeMap<SpanId, Span>,
    handles: BTreeMap<SpanId, R::Handle>,
    cache: GeometryCache,
    index: SpatialIndex,
    monitor: ContentMonitor<C>,
    detector: InteractionDetector<C>,
    rebuild: Debouncer,
    listeners: Vec<ChangeListener>,
    last_count: usize,
}

impl<R: Renderer, C: Clock + Clone> Session<R, C> {
    pub fn new(config: EngineConfig, renderer: R, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            cache: GeometryCache::new(&config.geometry),
            index: SpatialIndex::new(&config.spatial),
            monitor: ContentMonitor::new(&config, clock.clone()),
            detector: InteractionDetector::new(&config.interaction, clock.clone()),
            rebuild: Debouncer::new(config.session.rebuild_debounce_ms),
            config,
            clock,
            renderer,
            styles: Rc::new(RefCell::new(StyleRegistry::new())),
            pending_clears: Rc::new(RefCell::new(Vec::new())),
            instances: BTreeMap::new(),
            active: BTreeMap::new(),
            handles: BTreeMap::new(),
            listeners: Vec::new(),
            last_count: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    fn capabilities(&self) -> SpanCapabilities {
        let styles = Rc::clone(&self.styles);
        let pending = Rc::clone(&self.pending_clears);
        SpanCapabilities {
            style_for: Rc::new(move |kind: Option<&str>| styles.borrow().resolve(kind)),
            request_clear: Rc::new(move |id: &SpanId| pending.borrow_mut().push(id.clone())),
        }
    }

    /// Registers (or merges into) the style for `kind` and forwards the
    /// merged style to the renderer
    pub fn register_style(&mut self, kind: &str, style: Style) -> Style {
        let merged = self.styles.borrow_mut().register(kind, style).clone();
        self.renderer.register_style(kind, &merged);
        merged
    }

    pub fn style(&self, kind: Option<&str>) -> Style {
        self.styles.borrow().resolve(kind)
    }

    /// Restores a saved span and registers it on success. The saved span's
    /// runtime status records the outcome either way.
    pub fn add_selection<T: TreeAdapter + ?Sized>(&mut self, tree: &T, mut saved: SerializedSpan) -> RestoreResult {
        let result = Restorer::new(&self.config).restore(tree, &saved);
        saved.runtime = Some(result.runtime_status());
        match result.span {
            Some(span) if result.success => self.register(tree, saved, span),
            _ => log::debug!("Not registering {}: restore failed", saved.id),
        }
        result
    }

    /// Serializes a freshly created span and registers it, returning the
    /// record the caller should persist
    pub fn add_span<T: TreeAdapter + ?Sized>(
        &mut self,
        tree: &T,
        span: &Span,
        kind: Option<String>,
    ) -> Result<SerializedSpan, SerializeError> {
        let filter = VolatileIdFilter::from_config(&self.config.anchor)?;
        let saved = Serializer::new(&self.config.anchor, &filter)
            .with_chain_depth(self.config.restore.fingerprint.parent_chain_depth)
            .try_serialize(tree, span, None, kind)?;
        self.register(tree, saved.clone(), *span);
        Ok(saved)
    }

    fn register<T: TreeAdapter + ?Sized>(&mut self, tree: &T, saved: SerializedSpan, span: Span) {
        let id = saved.id.clone();
        if self.release(&id) {
            log::debug!("Span {id} superseded by a newer registration");
        }
        let style = self.style(saved.kind.as_deref());
        let handle = self.renderer.paint(&span, saved.kind.as_deref(), &style);
        let now = self.clock.now_ms();
        let rects = self.cache.get_or_compute(tree, &id, &span, now).rects.clone();
        self.index.insert(&id, &rects);
        self.monitor.start(tree, saved.clone());
        self.handles.insert(id.clone(), handle);
        self.active.insert(id.clone(), span);
        let capabilities = self.capabilities();
        self.instances.insert(id, SpanInstance { saved, capabilities });
        self.detector.reset();
        self.notify();
    }

    /// Drops everything held for `id`; true when anything was held
    fn release(&mut self, id: &SpanId) -> bool {
        self.monitor.stop(id);
        if let Some(handle) = self.handles.remove(id) {
            self.renderer.clear(handle);
        }
        let was_active = self.active.remove(id).is_some();
        self.cache.invalidate(id);
        self.index.remove(id);
        let had_instance = self.instances.remove(id).is_some();
        was_active || had_instance
    }

    pub fn remove_selection(&mut self, id: &SpanId) -> bool {
        let removed = self.release(id);
        if removed {
            self.detector.reset();
            self.notify();
        }
        removed
    }

    /// Subscribe to active-span count changes
    pub fn on_change(&mut self, listener: impl FnMut(usize) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self) {
        let count = self.active.len();
        if count == self.last_count {
            return;
        }
        self.last_count = count;
        for listener in &mut self.listeners {
            listener(count);
        }
    }

    pub fn instance(&self, id: &SpanId) -> Option<&SpanInstance> {
        self.instances.get(id)
    }

    pub fn active_span(&self, id: &SpanId) -> Option<&Span> {
        self.active.get(id)
    }

    pub fn handle(&self, id: &SpanId) -> Option<&R::Handle> {
        self.handles.get(id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn geometry_cache(&self) -> &GeometryCache {
        &self.cache
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn is_monitored(&self, id: &SpanId) -> bool {
        self.monitor.is_watching(id)
    }

    /// Active span ids in document order of their start boundary. Spans the
    /// tree can no longer place sort last, by id.
    pub fn ordered_ids<T: TreeAdapter + ?Sized>(&self, tree: &T) -> Vec<SpanId> {
        let mut keyed: Vec<(Option<(Vec<usize>, usize)>, &SpanId)> = self
            .active
            .iter()
            .map(|(id, span)| {
                let key = tree
                    .order_key(span.start.node)
                    .ok()
                    .map(|key| (key, span.start.offset));
                (key, id)
            })
            .collect();
        keyed.sort_by(|(ka, ia), (kb, ib)| {
            ka.is_none()
                .cmp(&kb.is_none())
                .then_with(|| ka.cmp(kb))
                .then_with(|| ia.cmp(ib))
        });
        keyed.into_iter().map(|(_, id)| id.clone()).collect()
    }

    /// Next span in document order after `id`, wrapping to the first
    pub fn next_after<T: TreeAdapter + ?Sized>(&self, tree: &T, id: &SpanId) -> Option<SpanId> {
        let ordered = self.ordered_ids(tree);
        match ordered.iter().position(|other| other == id) {
            Some(pos) => ordered.get((pos + 1) % ordered.len()).cloned(),
            None => ordered.first().cloned(),
        }
    }

    /// Previous span in document order before `id`, wrapping to the last
    pub fn previous_before<T: TreeAdapter + ?Sized>(&self, tree: &T, id: &SpanId) -> Option<SpanId> {
        let ordered = self.ordered_ids(tree);
        match ordered.iter().position(|other| other == id) {
            Some(pos) => ordered.get((pos + ordered.len() - 1) % ordered.len()).cloned(),
            None => ordered.last().cloned(),
        }
    }

    pub fn scroll_into_view(&mut self, id: &SpanId) -> bool {
        match self.active.get(id) {
            Some(span) => {
                self.renderer.scroll_into_view(span);
                true
            }
            None => false,
        }
    }

    /// Clears every highlight of type `kind`. The spans stay active.
    pub fn clear_by_type(&mut self, kind: &str) -> usize {
        self.renderer.clear_by_type(kind);
        let cleared: Vec<SpanId> = self
            .instances
            .values()
            .filter(|instance| instance.kind().unwrap_or(DEFAULT_KIND) == kind)
            .map(|instance| instance.id().clone())
            .collect();
        cleared
            .iter()
            .filter(|id| self.handles.remove(*id).is_some())
            .count()
    }

    /// Paints an active span again after its highlight was cleared
    pub fn repaint(&mut self, id: &SpanId) -> bool {
        if self.handles.contains_key(id) {
            return false;
        }
        let (Some(span), Some(instance)) = (self.active.get(id), self.instances.get(id)) else {
            return false;
        };
        let style = instance.style();
        let handle = self.renderer.paint(span, instance.kind(), &style);
        self.handles.insert(id.clone(), handle);
        true
    }

    /// Applies clear requests made through instance capabilities
    pub fn process_pending_clears(&mut self) -> usize {
        let pending: Vec<SpanId> = self.pending_clears.borrow_mut().drain(..).collect();
        let mut cleared = 0;
        for id in pending {
            if let Some(handle) = self.handles.remove(&id) {
                self.renderer.clear(handle);
                cleared += 1;
            }
        }
        cleared
    }

    /// Span under a viewport point, if any
    pub fn detect<T: TreeAdapter + ?Sized>(&mut self, tree: &T, x: f64, y: f64) -> Option<SpanId> {
        self.detector
            .detect(tree, x, y, &self.active, &mut self.cache, &self.index)
    }

    /// Signal that content or layout may have changed. Schedules a
    /// debounced index rebuild; a newer signal supersedes a pending one.
    pub fn content_changed(&mut self) {
        self.rebuild.request(self.clock.now_ms());
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild.is_pending()
    }

    /// Re-measures every active span and re-registers it in the grid
    pub fn rebuild_index<T: TreeAdapter + ?Sized>(&mut self, tree: &T) {
        let now = self.clock.now_ms();
        for (id, span) in &self.active {
            self.cache.invalidate(id);
            let rects = &self.cache.get_or_compute(tree, id, span, now).rects;
            self.index.insert(id, rects);
        }
        self.detector.reset();
        log::debug!("Rebuilt spatial index for {} spans", self.active.len());
    }

    /// Drives the session's timers: pending clears, the debounced rebuild,
    /// the cache sweep and due drift checks
    pub fn tick<T: TreeAdapter + ?Sized>(&mut self, tree: &T) -> Vec<DriftEvent> {
        self.process_pending_clears();
        let now = self.clock.now_ms();
        if self.rebuild.poll(now) {
            self.rebuild_index(tree);
        }
        self.cache.maybe_sweep(now);
        self.monitor.poll(tree)
    }

    /// Keyword occurrences in scope, marked against the active spans
    pub fn find_matches<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        keyword: &str,
    ) -> Result<Vec<MatchCandidate>, ConfigError> {
        let scope = scope_root(tree, &self.config.anchor)?;
        let active: Vec<(SpanId, Span)> = self
            .active
            .iter()
            .map(|(id, span)| (id.clone(), *span))
            .collect();
        Ok(find_matches(tree, scope, keyword, &active))
    }

    pub fn check_overlaps<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        span: &Span,
        saved: &[SerializedSpan],
    ) -> OverlapReport {
        check_overlaps(tree, span, saved, &self.config)
    }

    /// Stops every monitor and releases every handle, cache entry and grid
    /// cell. The session stays usable afterwards.
    pub fn teardown(&mut self) {
        self.monitor.stop_all();
        for (_, handle) in std::mem::take(&mut self.handles) {
            self.renderer.clear(handle);
        }
        self.active.clear();
        self.instances.clear();
        self.cache.clear();
        self.index.clear();
        self.pending_clears.borrow_mut().clear();
        self.rebuild.cancel();
        self.detector.reset();
        self.notify();
        log::debug!("Session torn down");
    }
}
