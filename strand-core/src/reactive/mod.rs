//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the user-facing layer over the dependency graph in
//! [`crate::graph`].
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and only when it is read. Memos are useful
//! for expensive computations that should not be repeated unnecessarily.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems.
//!
//! # Implementation Notes
//!
//! Every primitive belongs to a [`Runtime`]. The runtime keeps an "active
//! node" slot: when a signal is read while a memo or effect is evaluating,
//! the read is linked to that node.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod maybe;
mod memo;
mod runtime;
mod scope;
mod signal;

pub use context::TrackingPause;
pub use effect::Effect;
pub use maybe::{is_memo, is_signal, to_value, un_signal, MaybeSignal};
pub use memo::{Memo, MemoState};
pub use runtime::{batch, end_batch, flush, start_batch, untracked, GraphStats, Runtime};
pub use scope::EffectScope;
pub use signal::Signal;
