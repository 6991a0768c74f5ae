//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked "maybe dirty" (pending).
//!
//! 4. On next access, the memo re-checks if inputs actually changed.
//!
//! 5. If inputs changed, recompute. Otherwise, mark clean and return cache.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay pending (no wasted work)
//!
//! A recomputation that produces a value equal to the cached one stops
//! there: memos further downstream keep their cache.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::context::ReactiveContext;
use super::runtime::{Owner, Reactive, ReactiveHandle, Runtime};
use crate::graph::{Flags, NodeId};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency might have changed. Need to check.
    MaybeDirty,

    /// The memo definitely needs to recompute.
    Dirty,
}

struct MemoInner<T> {
    handle: ReactiveHandle,
    getter: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
}

/// Drops the cached value if the getter unwinds, so the next read
/// evaluates again instead of serving a result that was never confirmed.
struct DiscardOnPanic<'a, T>(&'a RefCell<Option<T>>);

impl<T> Drop for DiscardOnPanic<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Ok(mut value) = self.0.try_borrow_mut() {
                value.take();
            }
        }
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn node_id(&self) -> NodeId {
        self.handle.id()
    }

    fn update(&self, rt: &Runtime) -> bool {
        let _discard = DiscardOnPanic(&self.value);
        let next = {
            let _ctx = ReactiveContext::enter(rt, self.handle.id(), Flags::MUTABLE);
            (self.getter)()
        };
        let mut value = self.value.borrow_mut();
        let changed = value.as_ref() != Some(&next);
        *value = Some(next);
        changed
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos might return the same value even if inputs changed).
///
/// # Example
///
/// ```rust
/// use strand_core::reactive::{Memo, Signal};
///
/// let width = Signal::new(3);
/// let area = {
///     let width = width.clone();
///     Memo::new(move || width.get() * width.get())
/// };
///
/// assert_eq!(area.get(), 9);
/// width.set(4);
/// assert_eq!(area.get(), 16);
/// ```
pub struct Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new memo on this thread's runtime.
    ///
    /// The computation is lazy: it won't run until the first `get()`.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::new_in(&Runtime::current(), compute)
    }

    /// Create a new memo on the given runtime.
    pub fn new_in<F>(rt: &Rc<Runtime>, compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let handle = rt.create_node(Flags::MUTABLE | Flags::DIRTY);
        let id = handle.id();
        let inner = Rc::new(MemoInner {
            handle,
            getter: Box::new(compute),
            value: RefCell::new(None),
        });
        let weak: Weak<dyn Reactive> = Rc::downgrade(&inner) as Weak<MemoInner<T>>;
        rt.attach(id, Owner::Weak(weak));
        Self { inner }
    }

    /// The memo's node in its runtime's graph.
    pub fn id(&self) -> NodeId {
        self.inner.handle.id()
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrow the current value, recomputing if necessary.
    ///
    /// `f` runs inside a batch, so effects triggered by writes it makes run
    /// only after the borrow is released.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let rt = self.inner.handle.runtime();
        let missing = self.inner.value.borrow().is_none();
        rt.refresh(&*self.inner, missing);

        rt.batch(|| {
            let value = self.inner.value.borrow();
            match value.as_ref() {
                Some(value) => f(value),
                None => unreachable!("memo {:?} evaluated without a value", self.id()),
            }
        })
    }

    /// Run the computation without tracking and without touching the cache.
    pub fn peek(&self) -> T {
        self.inner.handle.runtime().untracked(|| (self.inner.getter)())
    }

    /// Get the current state, as seen by the graph.
    ///
    /// A pending memo reports `MaybeDirty` until it is read.
    pub fn state(&self) -> MemoState {
        if !self.has_value() {
            return MemoState::Dirty;
        }
        let flags = self.inner.handle.runtime().flags(self.id());
        if flags.contains(Flags::DIRTY) {
            MemoState::Dirty
        } else if flags.contains(Flags::PENDING) {
            MemoState::MaybeDirty
        } else {
            MemoState::Clean
        }
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Get the number of values read by the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.handle.runtime().dependencies(self.id()).len()
    }

    /// Get the number of computations that read this memo.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handle.runtime().subscribers(self.id()).len()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
