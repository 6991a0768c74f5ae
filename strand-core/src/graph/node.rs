//! Graph Nodes
//!
//! This module defines the records that live in the dependency graph: the
//! per-node header (status flags plus the heads and tails of its two edge
//! lists) and the edge record that threads itself through both lists.

use bitflags::bitflags;

/// Handle to a node in the dependency graph.
///
/// Handles are indices into the graph's node arena. They stay valid until
/// the node is removed, after which the slot may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw arena index.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Handle to an edge in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u32);

impl LinkId {
    pub(crate) fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw arena index.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

bitflags! {
    /// Status flags carried by every node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// The node holds a value and can be observed (signal or memo).
        const MUTABLE = 1 << 0;
        /// The node is an effect: a terminal that gets scheduled.
        const WATCHING = 1 << 1;
        /// The node is currently evaluating.
        const RECURSED_CHECK = 1 << 2;
        /// The node was notified by a write that happened during its own
        /// evaluation.
        const RECURSED = 1 << 3;
        /// The cached value is definitely stale.
        const DIRTY = 1 << 4;
        /// An upstream node changed; the cached value might be stale.
        const PENDING = 1 << 5;
        /// The effect sits in the scheduler queue or is being run from it.
        const QUEUED = 1 << 6;
    }
}

/// Header of a node in the dependency graph.
///
/// `P` is the payload the owner of the graph attaches to each node.
#[derive(Debug)]
pub(crate) struct NodeRecord<P> {
    pub flags: Flags,

    /// First and last edge of the list of nodes this node reads from.
    pub deps: Option<LinkId>,
    pub deps_tail: Option<LinkId>,

    /// First and last edge of the list of nodes that read from this node.
    pub subs: Option<LinkId>,
    pub subs_tail: Option<LinkId>,

    pub payload: P,
}

impl<P> NodeRecord<P> {
    pub fn new(flags: Flags, payload: P) -> Self {
        Self {
            flags,
            deps: None,
            deps_tail: None,
            subs: None,
            subs_tail: None,
            payload,
        }
    }
}

/// A single dependency edge: `sub` reads from `dep`.
///
/// The record sits in two intrusive doubly-linked lists at once:
/// `prev_sub`/`next_sub` thread the subscriber list of `dep`, and
/// `prev_dep`/`next_dep` thread the dependency list of `sub`.
#[derive(Debug, Clone)]
pub(crate) struct LinkRecord {
    /// Evaluation cycle in which the edge was created or last re-declared.
    pub version: u64,
    pub dep: NodeId,
    pub sub: NodeId,
    pub prev_sub: Option<LinkId>,
    pub next_sub: Option<LinkId>,
    pub prev_dep: Option<LinkId>,
    pub next_dep: Option<LinkId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_test() {
        let flags = Flags::MUTABLE | Flags::PENDING;

        assert!(flags.contains(Flags::MUTABLE | Flags::PENDING));
        assert!(!flags.contains(Flags::MUTABLE | Flags::DIRTY));
        assert!(flags.intersects(Flags::DIRTY | Flags::PENDING));
        assert_eq!(flags - Flags::PENDING, Flags::MUTABLE);
    }

    #[test]
    fn fresh_record_has_no_edges() {
        let record = NodeRecord::new(Flags::WATCHING, ());

        assert_eq!(record.flags, Flags::WATCHING);
        assert!(record.deps.is_none());
        assert!(record.deps_tail.is_none());
        assert!(record.subs.is_none());
        assert!(record.subs_tail.is_none());
    }
}
