//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal links itself to that context.
//!
//! 2. Writing a signal only stores the new value as *pending* and marks the
//!    signal dirty. Everything downstream is marked pending and the
//!    affected effects are queued.
//!
//! 3. The pending value is adopted the next time the signal is read. If it
//!    equals the current value, nothing downstream recomputes.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A registration with its runtime (the graph node)
//! - The current value
//! - The pending value (equal to the current one once read)

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::runtime::{Owner, Reactive, ReactiveHandle, Runtime};
use crate::graph::{Flags, NodeId};

struct SignalInner<T> {
    handle: ReactiveHandle,
    current: RefCell<T>,
    pending: RefCell<T>,
}

impl<T> Reactive for SignalInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn node_id(&self) -> NodeId {
        self.handle.id()
    }

    fn update(&self, rt: &Runtime) -> bool {
        rt.set_flags(self.handle.id(), Flags::MUTABLE);
        let pending = self.pending.borrow().clone();
        let mut current = self.current.borrow_mut();
        let changed = *current != pending;
        *current = pending;
        changed
    }
}

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. `PartialEq` decides
///   whether a write actually changed anything.
///
/// # Example
///
/// ```rust
/// use strand_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal on this thread's runtime.
    pub fn new(value: T) -> Self {
        Self::new_in(&Runtime::current(), value)
    }

    /// Create a new signal on the given runtime.
    pub fn new_in(rt: &Rc<Runtime>, value: T) -> Self {
        let handle = rt.create_node(Flags::MUTABLE);
        let id = handle.id();
        let inner = Rc::new(SignalInner {
            handle,
            current: RefCell::new(value.clone()),
            pending: RefCell::new(value),
        });
        let weak: Weak<dyn Reactive> = Rc::downgrade(&inner) as Weak<SignalInner<T>>;
        rt.attach(id, Owner::Weak(weak));
        Self { inner }
    }

    /// The signal's node in its runtime's graph.
    pub fn id(&self) -> NodeId {
        self.inner.handle.id()
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrow the current value, with the same tracking as [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.handle.runtime().refresh(&*self.inner, false);
        f(&self.inner.current.borrow())
    }

    /// Get the most recently written value without tracking dependencies
    /// and without settling the pending write.
    pub fn peek(&self) -> T {
        self.inner.pending.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Effects that depend on this signal run before `set` returns, unless
    /// a batch is open.
    pub fn set(&self, value: T) {
        *self.inner.pending.borrow_mut() = value;
        self.inner.handle.runtime().mark_written(self.id());
    }

    /// Update the value using a function of the latest value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.pending.borrow());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handle.runtime().subscribers(self.id()).len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
