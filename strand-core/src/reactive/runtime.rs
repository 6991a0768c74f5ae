//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph, the effect queue, and the tracking
//! state that decides which node a read is attributed to.
//!
//! # How It Works
//!
//! 1. When a signal, memo, or effect is created, it registers a node with
//!    the runtime.
//!
//! 2. While a memo or effect evaluates, it is the *active node*. Every
//!    signal or memo read during that time links itself to the active node.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks the signal dirty
//!    b. Marks everything downstream as pending
//!    c. Queues the effects it reached
//!    d. Runs the queue, unless a batch is open
//!
//! 4. Memos are lazy: a pending memo re-validates its inputs only when it is
//!    read, and recomputes only if one of them really changed.
//!
//! # Threading
//!
//! A runtime is single-threaded. Each thread gets its own default runtime
//! through [`Runtime::current`]; independent runtimes can be created with
//! [`Runtime::new`] and passed to the `*_in` constructors.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, error, trace, warn};

use super::context::TrackingPause;
use super::scope::EffectScope;
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::graph::{self, Flags, Graph, NodeId, ReactiveSystem, UpdateScheduler};

/// Behavior behind a graph node.
pub(crate) trait Reactive {
    /// The node this value occupies.
    fn node_id(&self) -> NodeId;

    /// Bring a signal or memo up to date. Returns whether its value changed.
    fn update(&self, rt: &Runtime) -> bool;

    /// Run a queued effect if it is still stale.
    fn schedule(&self, _rt: &Runtime) {}
}

/// What the graph stores for each node.
///
/// Signals and memos are owned by their handles, so the graph only keeps a
/// weak reference. A live effect is owned by the graph itself: it keeps
/// running after its handles are dropped, until it is stopped.
pub(crate) enum Owner {
    Vacant,
    Weak(Weak<dyn Reactive>),
    Strong(Rc<dyn Reactive>),
}

impl Owner {
    fn upgrade(&self) -> Option<Rc<dyn Reactive>> {
        match self {
            Owner::Vacant => None,
            Owner::Weak(weak) => weak.upgrade(),
            Owner::Strong(strong) => Some(Rc::clone(strong)),
        }
    }
}

/// Registration of a node with a runtime.
///
/// Dropping this handle removes the node and all its edges from the graph.
pub(crate) struct ReactiveHandle {
    rt: Rc<Runtime>,
    id: NodeId,
}

impl ReactiveHandle {
    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.rt
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        self.rt.dispose(self.id);
    }
}

/// Snapshot of a runtime's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Live nodes
    pub nodes: usize,
    /// Live edges
    pub links: usize,
    /// Effects waiting to run
    pub queued: usize,
    /// Evaluation cycles so far
    pub cycle: u64,
    /// Open batches
    pub batch_depth: u32,
}

/// A single-threaded reactive runtime.
pub struct Runtime {
    graph: RefCell<Graph<Owner>>,
    scheduler: UpdateScheduler<Rc<dyn Reactive>>,

    /// The node currently evaluating, if any.
    active: Cell<Option<NodeId>>,

    /// Incremented once per memo or effect evaluation.
    cycle: Cell<u64>,

    /// Active nodes saved by [`Runtime::pause_tracking`].
    pause_stack: RefCell<Vec<Option<NodeId>>>,

    /// Effect scopes currently collecting new effects.
    scopes: RefCell<Vec<EffectScope>>,

    config: RuntimeConfig,
}

thread_local! {
    static CURRENT: Rc<Runtime> = Runtime::new();
}

/// Closes a batch when dropped. During a panic the queue is left for the
/// next flush instead of running effects while unwinding.
struct BatchGuard<'a>(&'a Runtime);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.scheduler.end_batch();
        } else {
            self.0.end_batch();
        }
    }
}

/// Clears an effect's `QUEUED` mark once its scheduled run is over,
/// including by panic. Until then, notifications for it are dropped.
struct Dequeue<'a>(&'a Runtime, NodeId);

impl Drop for Dequeue<'_> {
    fn drop(&mut self) {
        if let Ok(mut graph) = self.0.graph.try_borrow_mut() {
            graph.remove_flags(self.1, Flags::QUEUED);
        }
    }
}

/// Adapter handing the runtime's hooks to the graph algorithms.
struct Engine<'a>(&'a Runtime);

impl ReactiveSystem for Engine<'_> {
    type Payload = Owner;

    fn graph(&self) -> RefMut<'_, Graph<Owner>> {
        self.0.graph.borrow_mut()
    }

    fn update(&self, node: NodeId) -> bool {
        let owner = self.0.graph.borrow().payload(node).upgrade();
        match owner {
            Some(owner) => owner.update(self.0),
            None => false,
        }
    }

    fn notify(&self, node: NodeId) {
        let effect = {
            let mut graph = self.0.graph.borrow_mut();
            if graph.flags(node).contains(Flags::QUEUED) {
                return;
            }
            let effect = match graph.payload(node) {
                Owner::Strong(effect) => Rc::clone(effect),
                _ => return,
            };
            graph.insert_flags(node, Flags::QUEUED);
            effect
        };
        self.0.scheduler.enqueue(effect);
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Rc<Self> {
        Self::build(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Rc<Self>, ReactiveError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Rc<Self> {
        debug!(
            node_capacity = config.node_capacity,
            link_capacity = config.link_capacity,
            flush_limit = ?config.flush_limit,
            "creating reactive runtime"
        );
        Rc::new(Self {
            graph: RefCell::new(Graph::with_capacity(
                config.node_capacity,
                config.link_capacity,
            )),
            scheduler: UpdateScheduler::new(config.flush_limit),
            active: Cell::new(None),
            cycle: Cell::new(0),
            pause_stack: RefCell::new(Vec::new()),
            scopes: RefCell::new(Vec::new()),
            config,
        })
    }

    /// The runtime used by this thread's free-standing constructors.
    pub fn current() -> Rc<Self> {
        CURRENT.with(Rc::clone)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Whether reads are currently being attributed to a node.
    pub fn is_tracking(&self) -> bool {
        self.active.get().is_some()
    }

    /// The node currently evaluating, if any.
    pub fn active_node(&self) -> Option<NodeId> {
        self.active.get()
    }

    /// Run `f` with effect execution deferred until it returns, then flush
    /// once.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.start_batch();
        let _guard = BatchGuard(self);
        f()
    }

    /// Open a batch. Every call must be paired with [`end_batch`](Self::end_batch).
    pub fn start_batch(&self) {
        self.scheduler.start_batch();
    }

    /// Close a batch, flushing if it was the outermost one.
    pub fn end_batch(&self) {
        if self.scheduler.end_batch() {
            trace!(queued = self.scheduler.queued(), "outermost batch closed");
            self.flush();
        }
    }

    /// Run `f` without attributing its reads to the current node.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.pause_tracking();
        f()
    }

    /// Suspend dependency tracking until the returned guard is dropped.
    pub fn pause_tracking(&self) -> TrackingPause<'_> {
        self.pause_stack.borrow_mut().push(self.active.replace(None));
        TrackingPause::new(self)
    }

    pub(crate) fn resume_tracking(&self) {
        let restored = self.pause_stack.borrow_mut().pop().flatten();
        self.active.set(restored);
    }

    /// Run queued effects.
    ///
    /// # Panics
    ///
    /// Panics if the configured flush limit is exceeded; use
    /// [`try_flush`](Self::try_flush) to get the error instead.
    pub fn flush(&self) {
        if let Err(err) = self.try_flush() {
            panic!("{err}");
        }
    }

    /// Run queued effects, returning how many ran.
    ///
    /// An effect is queued at most once; notifications that reach it while
    /// it waits, or while its scheduled run checks its inputs, are dropped.
    pub fn try_flush(&self) -> Result<usize, ReactiveError> {
        let result = self.scheduler.drain(
            |effect| {
                let _dequeue = Dequeue(self, effect.node_id());
                effect.schedule(self);
            },
            |effect| {
                // Forget the pending change as well, or later writes would
                // find the effect already marked and never queue it again.
                if let Ok(mut graph) = self.graph.try_borrow_mut() {
                    graph.remove_flags(
                        effect.node_id(),
                        Flags::QUEUED | Flags::PENDING | Flags::DIRTY,
                    );
                }
            },
        );
        match &result {
            Ok(0) => {}
            Ok(ran) => trace!(ran, "flushed effects"),
            Err(err) => error!(%err, "flush aborted"),
        }
        result
    }

    /// Snapshot of the runtime's bookkeeping.
    pub fn stats(&self) -> GraphStats {
        let graph = self.graph.borrow();
        GraphStats {
            nodes: graph.node_count(),
            links: graph.link_count(),
            queued: self.scheduler.queued(),
            cycle: self.cycle.get(),
            batch_depth: self.scheduler.batch_depth(),
        }
    }

    // ------------------------------------------------------------------
    // Node plumbing
    // ------------------------------------------------------------------

    /// Allocate a node. Its behavior is attached with [`attach`](Self::attach)
    /// once the owning value exists.
    pub(crate) fn create_node(self: &Rc<Self>, flags: Flags) -> ReactiveHandle {
        let id = self.graph.borrow_mut().add_node(flags, Owner::Vacant);
        ReactiveHandle {
            rt: Rc::clone(self),
            id,
        }
    }

    pub(crate) fn attach(&self, id: NodeId, owner: Owner) {
        let previous = self.graph.borrow_mut().replace_payload(id, owner);
        // Released outside the borrow: dropping an owner can run destructors
        // that touch the graph.
        drop(previous);
    }

    fn dispose(&self, id: NodeId) {
        let owner = match self.graph.try_borrow_mut() {
            Ok(mut graph) => graph.remove_node(id),
            Err(_) => {
                warn!(node = id.raw(), "graph busy while disposing node; leaking it");
                return;
            }
        };
        drop(owner);
    }

    /// Detach an effect from everything it reads and hand ownership back to
    /// its handles.
    pub(crate) fn release_effect(&self, id: NodeId, owner: Owner) {
        let previous = {
            let mut graph = self.graph.borrow_mut();
            graph.unlink_deps(id);
            graph.set_flags(id, Flags::WATCHING);
            graph.replace_payload(id, owner)
        };
        drop(previous);
        debug!(node = id.raw(), "effect stopped");
    }

    pub(crate) fn flags(&self, id: NodeId) -> Flags {
        self.graph.borrow().flags(id)
    }

    pub(crate) fn set_flags(&self, id: NodeId, flags: Flags) {
        self.graph.borrow_mut().set_flags(id, flags);
    }

    pub(crate) fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.borrow().dependencies(id)
    }

    pub(crate) fn subscribers(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.borrow().subscribers(id)
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Make `id` the active node for a fresh evaluation. Returns the node
    /// that was active before.
    pub(crate) fn begin_evaluation(&self, id: NodeId, base: Flags) -> Option<NodeId> {
        self.cycle.set(self.cycle.get() + 1);
        {
            let mut graph = self.graph.borrow_mut();
            assert!(
                !graph.flags(id).contains(Flags::RECURSED_CHECK),
                "dependency cycle: {id:?} was read during its own evaluation"
            );
            let queued = graph.flags(id) & Flags::QUEUED;
            graph.start_tracking(id);
            graph.set_flags(id, base | queued | Flags::RECURSED_CHECK);
        }
        self.active.replace(Some(id))
    }

    /// Undo [`begin_evaluation`](Self::begin_evaluation) and drop every edge
    /// the evaluation did not re-declare.
    pub(crate) fn end_evaluation(&self, id: NodeId, previous: Option<NodeId>) {
        self.active.set(previous);
        match self.graph.try_borrow_mut() {
            Ok(mut graph) => {
                graph.remove_flags(id, Flags::RECURSED_CHECK);
                graph.prune_stale(id);
            }
            Err(_) => warn!(node = id.raw(), "graph busy while ending evaluation"),
        }
    }

    /// Link `dep` to the active node, if there is one.
    pub(crate) fn track(&self, dep: NodeId) {
        if let Some(sub) = self.active.get() {
            self.graph.borrow_mut().link(dep, sub, self.cycle.get());
        }
    }

    /// Whether `id` must re-evaluate before its value can be used.
    ///
    /// A pending node checks its inputs; if none of them changed, the
    /// pending mark is cleared and the cached value stays valid. If one
    /// did, the node is marked dirty until it re-evaluates.
    pub(crate) fn should_update(&self, id: NodeId) -> bool {
        let (flags, deps) = {
            let graph = self.graph.borrow();
            (graph.flags(id), graph.deps(id))
        };
        if flags.contains(Flags::DIRTY) {
            return true;
        }
        if flags.contains(Flags::PENDING) {
            let dirty = match deps {
                Some(deps) => graph::check_dirty(&Engine(self), deps, id),
                None => false,
            };
            let mut graph = self.graph.borrow_mut();
            if dirty {
                graph.insert_flags(id, Flags::DIRTY);
                return true;
            }
            graph.remove_flags(id, Flags::PENDING);
        }
        false
    }

    /// Bring a signal or memo up to date and link it to the active node.
    ///
    /// `force` re-evaluates even if the node looks clean.
    pub(crate) fn refresh(&self, node: &dyn Reactive, force: bool) {
        let id = node.node_id();
        if (self.should_update(id) || force) && node.update(self) {
            let subs = self.graph.borrow().subs(id);
            if let Some(subs) = subs {
                graph::shallow_propagate(&Engine(self), subs);
            }
        }
        self.track(id);
    }

    /// Record that a signal received a new value.
    pub(crate) fn mark_written(&self, id: NodeId) {
        let subs = {
            let mut graph = self.graph.borrow_mut();
            graph.set_flags(id, Flags::MUTABLE | Flags::DIRTY);
            graph.subs(id)
        };
        if let Some(subs) = subs {
            graph::propagate(&Engine(self), subs);
            if !self.scheduler.is_batching() {
                self.flush();
            }
        }
    }

    // ------------------------------------------------------------------
    // Effect scopes
    // ------------------------------------------------------------------

    pub(crate) fn push_scope(&self, scope: EffectScope) {
        self.scopes.borrow_mut().push(scope);
    }

    pub(crate) fn pop_scope(&self) {
        self.scopes.borrow_mut().pop();
    }

    pub(crate) fn current_scope(&self) -> Option<EffectScope> {
        self.scopes.borrow().last().cloned()
    }
}

/// Run `f` as a batch on this thread's runtime.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::current().batch(f)
}

/// Open a batch on this thread's runtime.
pub fn start_batch() {
    Runtime::current().start_batch();
}

/// Close a batch on this thread's runtime.
pub fn end_batch() {
    Runtime::current().end_batch();
}

/// Run `f` without dependency tracking on this thread's runtime.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    Runtime::current().untracked(f)
}

/// Run queued effects on this thread's runtime.
pub fn flush() {
    Runtime::current().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Memo, Signal};

    #[test]
    fn runtimes_are_independent() {
        let first = Runtime::new();
        let second = Runtime::new();

        let _a = Signal::new_in(&first, 1);
        let _b = Signal::new_in(&first, 2);
        let _c = Signal::new_in(&second, 3);

        assert_eq!(first.stats().nodes, 2);
        assert_eq!(second.stats().nodes, 1);
    }

    #[test]
    fn with_config_rejects_zero_flush_limit() {
        let config = RuntimeConfig::default().with_flush_limit(0);
        assert!(matches!(
            Runtime::with_config(config),
            Err(ReactiveError::Config(_))
        ));
    }

    #[test]
    fn dropping_handles_frees_nodes_and_edges() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 1);
        let memo = {
            let source = source.clone();
            Memo::new_in(&rt, move || source.get() * 2)
        };
        assert_eq!(memo.get(), 2);
        assert_eq!(rt.stats().links, 1);

        drop(memo);
        assert_eq!(rt.stats().links, 0);
        assert_eq!(rt.stats().nodes, 1);
    }

    #[test]
    fn untracked_restores_active_node() {
        let rt = Runtime::new();
        let seen = Rc::new(Cell::new((false, false)));

        let probe = {
            let inner = rt.clone();
            let seen = seen.clone();
            Effect::new_in(&rt, move || {
                let inside = inner.untracked(|| inner.is_tracking());
                seen.set((inside, inner.is_tracking()));
            })
        };

        assert_eq!(seen.get(), (false, true));
        assert!(!rt.is_tracking());
        probe.stop();
    }

    #[test]
    fn nested_batches_flush_once() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 0);
        let runs = Rc::new(Cell::new(0));

        let _effect = {
            let source = source.clone();
            let runs = runs.clone();
            Effect::new_in(&rt, move || {
                source.get();
                runs.set(runs.get() + 1);
            })
        };

        rt.batch(|| {
            source.set(1);
            rt.batch(|| source.set(2));
            assert_eq!(rt.stats().batch_depth, 1);
            assert_eq!(runs.get(), 1);
        });

        assert_eq!(runs.get(), 2);
        assert_eq!(rt.stats().batch_depth, 0);
    }

    #[test]
    fn effect_reached_twice_in_one_flush_runs_once() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_flush_limit(1)).unwrap();
        let source = Signal::new_in(&rt, 1);
        let doubled = {
            let source = source.clone();
            Memo::new_in(&rt, move || source.get() * 2)
        };
        let seen = Rc::new(RefCell::new(Vec::new()));

        // Reads the source directly and through the memo, so the source
        // has two subscribers and the dirty check notifies the effect again.
        let effect = {
            let (source, doubled, seen) = (source.clone(), doubled.clone(), seen.clone());
            Effect::new_in(&rt, move || seen.borrow_mut().push((source.get(), doubled.get())))
        };

        rt.start_batch();
        source.set(2);
        rt.scheduler.end_batch();
        assert_eq!(rt.stats().queued, 1);

        assert_eq!(rt.try_flush(), Ok(1));
        assert_eq!(effect.run_count(), 2);
        assert_eq!(*seen.borrow(), [(1, 2), (2, 4)]);
        assert!(!rt.flags(effect.id()).contains(Flags::QUEUED));

        // The mark is gone, so the next write queues it again.
        rt.batch(|| source.set(3));
        assert_eq!(effect.run_count(), 3);
        effect.stop();
    }

    #[test]
    fn flush_limit_releases_discarded_effects() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_flush_limit(1)).unwrap();
        let source = Signal::new_in(&rt, 0);
        let runs = Rc::new(Cell::new(0));

        let effects: Vec<Effect> = (0..2)
            .map(|_| {
                let (source, runs) = (source.clone(), runs.clone());
                Effect::new_in(&rt, move || {
                    source.get();
                    runs.set(runs.get() + 1);
                })
            })
            .collect();

        rt.start_batch();
        source.set(1);
        rt.scheduler.end_batch();
        assert!(rt.try_flush().is_err());
        assert_eq!(runs.get(), 3);
        assert!(!rt.flags(effects[1].id()).contains(Flags::QUEUED));

        // Stopping the first leaves one effect, which fits the limit.
        effects[0].stop();
        source.set(2);
        assert_eq!(runs.get(), 4);
        effects[1].stop();
    }

    #[test]
    fn flush_limit_stops_runaway_effects() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_flush_limit(3)).unwrap();
        let a = Signal::new_in(&rt, 0);
        let b = Signal::new_in(&rt, 0);

        let _ping = {
            let (a, b) = (a.clone(), b.clone());
            Effect::new_in(&rt, move || b.set(a.get() + 1))
        };
        let _pong = {
            let (a, b) = (a.clone(), b.clone());
            Effect::new_in(&rt, move || a.set(b.get() + 1))
        };

        rt.start_batch();
        a.set(100);
        rt.scheduler.end_batch();

        assert_eq!(
            rt.try_flush(),
            Err(ReactiveError::FlushLimitExceeded { limit: 3 })
        );
        assert_eq!(rt.stats().queued, 0);
    }
}
