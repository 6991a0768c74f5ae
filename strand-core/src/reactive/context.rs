//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! it links itself to the current computation.
//!
//! # Implementation
//!
//! The runtime keeps a single "active node" slot. Entering a context saves
//! the previous occupant and installs the evaluating node; leaving restores
//! it. Both guards below undo their change in `Drop`, so the slot is
//! restored even if the computation panics.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo, or an effect created inside another effect).

use crate::graph::{Flags, NodeId};

use super::runtime::Runtime;

/// Guard for one evaluation of a memo or effect.
///
/// While it is alive, reads link to `id`. On drop the previous active node
/// comes back, the evaluating flag is cleared, and any dependency the
/// evaluation did not read again is unlinked.
pub(crate) struct ReactiveContext<'a> {
    rt: &'a Runtime,
    id: NodeId,
    previous: Option<NodeId>,
}

impl<'a> ReactiveContext<'a> {
    /// Enter a new evaluation of `id`. `base` is the node's resting flag set
    /// (`MUTABLE` for memos, `WATCHING` for effects); any dirty or pending
    /// state is cleared.
    pub fn enter(rt: &'a Runtime, id: NodeId, base: Flags) -> Self {
        let previous = rt.begin_evaluation(id, base);
        Self { rt, id, previous }
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        self.rt.end_evaluation(self.id, self.previous);
    }
}

/// Guard returned by [`Runtime::pause_tracking`].
///
/// Reads made while it is alive are not attributed to any node. Dropping it
/// resumes tracking for the node that was active before.
pub struct TrackingPause<'a> {
    rt: &'a Runtime,
}

impl<'a> TrackingPause<'a> {
    pub(crate) fn new(rt: &'a Runtime) -> Self {
        Self { rt }
    }
}

impl Drop for TrackingPause<'_> {
    fn drop(&mut self) {
        self.rt.resume_tracking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_installs_and_restores_active_node() {
        let rt = Runtime::new();
        let handle = rt.create_node(Flags::WATCHING);
        let id = handle.id();

        assert!(rt.active_node().is_none());

        {
            let _ctx = ReactiveContext::enter(&rt, id, Flags::WATCHING);
            assert_eq!(rt.active_node(), Some(id));
            assert!(rt.flags(id).contains(Flags::RECURSED_CHECK));
        }

        assert!(rt.active_node().is_none());
        assert_eq!(rt.flags(id), Flags::WATCHING);
    }

    #[test]
    fn nested_contexts() {
        let rt = Runtime::new();
        let outer = rt.create_node(Flags::WATCHING);
        let inner = rt.create_node(Flags::MUTABLE);

        {
            let _outer = ReactiveContext::enter(&rt, outer.id(), Flags::WATCHING);
            assert_eq!(rt.active_node(), Some(outer.id()));

            {
                let _inner = ReactiveContext::enter(&rt, inner.id(), Flags::MUTABLE);
                assert_eq!(rt.active_node(), Some(inner.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(rt.active_node(), Some(outer.id()));
        }

        assert!(rt.active_node().is_none());
    }

    #[test]
    fn context_restores_after_panic() {
        let rt = Runtime::new();
        let handle = rt.create_node(Flags::MUTABLE);
        let id = handle.id();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(&rt, id, Flags::MUTABLE);
            panic!("getter failed");
        }));

        assert!(result.is_err());
        assert!(rt.active_node().is_none());
        assert!(!rt.flags(id).contains(Flags::RECURSED_CHECK));
    }

    #[test]
    fn pause_nests_inside_context() {
        let rt = Runtime::new();
        let handle = rt.create_node(Flags::WATCHING);

        let _ctx = ReactiveContext::enter(&rt, handle.id(), Flags::WATCHING);
        {
            let _outer = rt.pause_tracking();
            assert!(!rt.is_tracking());
            {
                let _inner = rt.pause_tracking();
                assert!(!rt.is_tracking());
            }
            assert!(!rt.is_tracking());
        }
        assert_eq!(rt.active_node(), Some(handle.id()));
    }
}
