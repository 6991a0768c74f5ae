//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between reactive values and the computations that read them.
//!
//! # Overview
//!
//! - Nodes represent signals, memos, and effects. Each node carries status
//!   flags and the heads/tails of two edge lists.
//! - An edge says "sub read dep". Every edge is threaded through the
//!   subscriber list of its `dep` and the dependency list of its `sub` at the
//!   same time.
//!
//! When a signal changes, [`Graph::propagate`] walks the subscriber lists
//! forward and marks everything downstream as pending. Reading a pending
//! node runs [`check_dirty`], which walks dependency lists backward and
//! re-evaluates only what actually changed.
//!
//! # Design Decisions
//!
//! 1. Edge lists are intrusive doubly-linked lists stored in an arena, so a
//!    single edge can be spliced out of the middle of both lists in O(1).
//!
//! 2. Nodes and edges are addressed by `u32` handles into free-list arenas,
//!    which keeps the structure free of reference cycles.
//!
//! 3. The graph is purely structural. Evaluating a node is delegated to a
//!    [`ReactiveSystem`], so the same algorithms drive every node kind.

mod arena;
mod engine;
mod node;
mod scheduler;
mod store;

pub use engine::{check_dirty, propagate, shallow_propagate, Notified, ReactiveSystem};
pub use node::{Flags, LinkId, NodeId};
pub use scheduler::UpdateScheduler;
pub use store::Graph;
