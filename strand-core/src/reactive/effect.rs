//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued. The queue runs
//!    when the write returns, or when the outermost batch closes.
//!
//! 3. A queued effect first checks whether its inputs really changed. A
//!    memo that recomputed to the same value does not re-run it.
//!
//! 4. While re-running, the effect re-declares its dependencies. Anything
//!    it stopped reading is unlinked.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Logging state changes
//! - Pushing values into a cache or a socket
//! - Writing to files
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Lifetime
//!
//! A running effect is kept alive by its runtime, so dropping every handle
//! does not stop it. Call [`Effect::stop`] to detach it permanently.

use std::cell::Cell;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{Owner, Reactive, ReactiveHandle, Runtime};
use crate::graph::{Flags, NodeId};

struct EffectInner {
    handle: ReactiveHandle,
    run: Box<dyn Fn()>,
    stopped: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    fn execute(&self, rt: &Runtime) {
        if self.stopped.get() {
            return;
        }
        let _ctx = ReactiveContext::enter(rt, self.handle.id(), Flags::WATCHING);
        self.run_count.set(self.run_count.get() + 1);
        (self.run)();
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.handle.id()
    }

    // Nothing reads an effect, so it is never asked for a value.
    fn update(&self, _rt: &Runtime) -> bool {
        false
    }

    fn schedule(&self, rt: &Runtime) {
        if !self.stopped.get() && rt.should_update(self.handle.id()) {
            self.execute(rt);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use strand_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let effect = {
///     let (count, seen) = (count.clone(), seen.clone());
///     Effect::new(move || seen.set(count.get()))
/// };
/// assert_eq!(seen.get(), 0);
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
///
/// effect.stop();
/// count.set(6);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect on this thread's runtime and run it once.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::new_in(&Runtime::current(), run)
    }

    /// Create an effect on the given runtime and run it once.
    ///
    /// If an [`EffectScope`](super::EffectScope) is collecting on this
    /// runtime, the effect joins it.
    pub fn new_in<F>(rt: &Rc<Runtime>, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let handle = rt.create_node(Flags::WATCHING);
        let id = handle.id();
        let inner = Rc::new(EffectInner {
            handle,
            run: Box::new(run),
            stopped: Cell::new(false),
            run_count: Cell::new(0),
        });
        let strong: Rc<dyn Reactive> = Rc::clone(&inner) as Rc<EffectInner>;
        rt.attach(id, Owner::Strong(strong));

        let effect = Self { inner };
        if let Some(scope) = rt.current_scope() {
            scope.adopt(effect.clone());
        }
        effect.inner.execute(rt);
        effect
    }

    /// The effect's node in its runtime's graph.
    pub fn id(&self) -> NodeId {
        self.inner.handle.id()
    }

    /// Run the effect now, whether or not its inputs changed.
    ///
    /// Does nothing once the effect is stopped.
    pub fn execute(&self) {
        self.inner.execute(self.inner.handle.runtime());
    }

    /// Detach the effect from everything it reads. It never runs again.
    ///
    /// Stopping twice is a no-op.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        let rt = self.inner.handle.runtime();
        let weak = Rc::downgrade(&self.inner);
        rt.release_effect(self.id(), Owner::Weak(weak));
    }

    /// Check if the effect has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    /// Whether one of the effect's inputs changed since it last ran.
    ///
    /// Resolves pending memos along the way, exactly like a scheduled run
    /// would.
    pub fn dirty(&self) -> bool {
        !self.is_stopped() && self.inner.handle.runtime().should_update(self.id())
    }

    /// Get the number of times this effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of values read by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.handle.runtime().dependencies(self.id()).len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Memo, Signal};
    use std::cell::RefCell;

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));

        let effect = {
            let runs = runs.clone();
            Effect::new_in(&rt, move || runs.set(runs.get() + 1))
        };

        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 1);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _effect = {
            let (source, log) = (source.clone(), log.clone());
            Effect::new_in(&rt, move || log.borrow_mut().push(source.get()))
        };

        source.set(2);
        source.set(3);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn effect_keeps_running_after_handles_drop() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 0);
        let runs = Rc::new(Cell::new(0));

        {
            let (source, runs) = (source.clone(), runs.clone());
            drop(Effect::new_in(&rt, move || {
                source.get();
                runs.set(runs.get() + 1);
            }));
        }

        source.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn effect_does_not_run_after_stop() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 0);
        let runs = Rc::new(Cell::new(0));

        let effect = {
            let (source, runs) = (source.clone(), runs.clone());
            Effect::new_in(&rt, move || {
                source.get();
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(source.subscriber_count(), 1);

        effect.stop();
        effect.stop();
        assert!(effect.is_stopped());
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(source.subscriber_count(), 0);

        source.set(1);
        effect.execute();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn stopped_effect_is_freed_with_its_handles() {
        let rt = Runtime::new();
        let effect = Effect::new_in(&rt, || {});
        assert_eq!(rt.stats().nodes, 1);

        effect.stop();
        drop(effect);
        assert_eq!(rt.stats().nodes, 0);
    }

    #[test]
    fn effect_skips_run_when_memo_is_unchanged() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 1);
        let positive = {
            let source = source.clone();
            Memo::new_in(&rt, move || source.get() > 0)
        };
        let effect = {
            let positive = positive.clone();
            Effect::new_in(&rt, move || {
                positive.get();
            })
        };

        source.set(2);
        assert_eq!(effect.run_count(), 1);

        source.set(-2);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn dirty_reports_pending_changes_inside_batch() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 1);
        let effect = {
            let source = source.clone();
            Effect::new_in(&rt, move || {
                source.get();
            })
        };
        assert!(!effect.dirty());

        rt.batch(|| {
            source.set(2);
            assert!(effect.dirty());
        });
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_tracks_run_count() {
        let rt = Runtime::new();
        let effect = Effect::new_in(&rt, || {});

        assert_eq!(effect.run_count(), 1);
        effect.execute();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = Effect::new_in(&rt, || {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect2.stop();
        assert!(effect1.is_stopped());
    }
}
