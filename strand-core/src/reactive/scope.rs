//! Effect Scopes
//!
//! An [`EffectScope`] collects the effects created while it runs a closure,
//! so they can be stopped together. Scopes created inside a running scope
//! become its children and are stopped with it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use super::effect::Effect;
use super::runtime::Runtime;

struct ScopeInner {
    rt: Rc<Runtime>,
    effects: RefCell<Vec<Effect>>,
    children: RefCell<Vec<EffectScope>>,
    active: Cell<bool>,
}

/// Pops the scope stack when a scoped closure returns or unwinds.
struct ScopeGuard<'a>(&'a Runtime);

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.0.pop_scope();
    }
}

/// A group of effects that are stopped together.
///
/// # Example
///
/// ```rust
/// use strand_core::reactive::{Effect, EffectScope, Signal};
///
/// let source = Signal::new(0);
/// let scope = EffectScope::new();
///
/// scope.run(|| {
///     let source = source.clone();
///     Effect::new(move || {
///         source.get();
///     });
/// });
/// assert_eq!(scope.effect_count(), 1);
/// assert_eq!(source.subscriber_count(), 1);
///
/// scope.stop();
/// assert_eq!(source.subscriber_count(), 0);
/// ```
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

impl EffectScope {
    /// Create a scope on this thread's runtime.
    pub fn new() -> Self {
        Self::new_in(&Runtime::current())
    }

    /// Create a scope on the given runtime.
    ///
    /// A scope created while another one is running becomes its child.
    pub fn new_in(rt: &Rc<Runtime>) -> Self {
        let scope = Self {
            inner: Rc::new(ScopeInner {
                rt: Rc::clone(rt),
                effects: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                active: Cell::new(true),
            }),
        };
        if let Some(parent) = rt.current_scope() {
            parent.inner.children.borrow_mut().push(scope.clone());
        }
        scope
    }

    /// Run `f`, collecting every effect it creates into this scope.
    ///
    /// A stopped scope still runs `f`, but collects nothing.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        if !self.is_active() {
            warn!("running a closure in a stopped effect scope");
            return f();
        }
        let rt = &self.inner.rt;
        rt.push_scope(self.clone());
        let _guard = ScopeGuard(rt);
        f()
    }

    /// Stop every collected effect and every child scope.
    ///
    /// Stopping twice is a no-op.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        debug!(
            effects = effects.len(),
            children = children.len(),
            "stopping effect scope"
        );
        for effect in &effects {
            effect.stop();
        }
        for child in &children {
            child.stop();
        }
    }

    /// Whether the scope has not been stopped yet.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of effects collected directly by this scope.
    pub fn effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    pub(crate) fn adopt(&self, effect: Effect) {
        self.inner.effects.borrow_mut().push(effect);
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("effects", &self.effect_count())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn scope_collects_and_stops_effects() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 0);
        let runs = Rc::new(Cell::new(0));
        let scope = EffectScope::new_in(&rt);

        scope.run(|| {
            for _ in 0..3 {
                let (source, runs) = (source.clone(), runs.clone());
                Effect::new_in(&rt, move || {
                    source.get();
                    runs.set(runs.get() + 1);
                });
            }
        });
        assert_eq!(scope.effect_count(), 3);
        assert_eq!(runs.get(), 3);

        scope.stop();
        assert!(!scope.is_active());
        assert_eq!(source.subscriber_count(), 0);

        source.set(1);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effects_outside_run_are_not_collected() {
        let rt = Runtime::new();
        let scope = EffectScope::new_in(&rt);

        scope.run(|| {});
        let outside = Effect::new_in(&rt, || {});

        assert_eq!(scope.effect_count(), 0);
        scope.stop();
        assert!(!outside.is_stopped());
    }

    #[test]
    fn nested_scopes_stop_with_parent() {
        let rt = Runtime::new();
        let parent = EffectScope::new_in(&rt);

        let child = parent.run(|| {
            let child = EffectScope::new_in(&rt);
            child.run(|| Effect::new_in(&rt, || {}));
            child
        });
        assert_eq!(parent.effect_count(), 0);
        assert_eq!(child.effect_count(), 1);

        parent.stop();
        assert!(!child.is_active());
    }

    #[test]
    fn scope_stack_unwinds_on_panic() {
        let rt = Runtime::new();
        let scope = EffectScope::new_in(&rt);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scope.run(|| {
                panic!("boom");
            });
        }));
        assert!(result.is_err());

        let stray = Effect::new_in(&rt, || {});
        assert_eq!(scope.effect_count(), 0);
        stray.stop();
    }

    #[test]
    fn stopped_scope_collects_nothing() {
        let rt = Runtime::new();
        let scope = EffectScope::new_in(&rt);
        scope.stop();

        let effect = scope.run(|| Effect::new_in(&rt, || {}));
        assert_eq!(scope.effect_count(), 0);
        assert!(!effect.is_stopped());
    }
}
