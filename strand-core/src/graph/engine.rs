//! Propagation Engine
//!
//! Change notification runs in two phases:
//!
//! 1. **Push.** When a signal is written, [`Graph::propagate`] walks forward
//!    over subscriber edges and marks every reachable node `PENDING`. Effects
//!    reached by the walk are reported back so they can be queued. No user
//!    code runs during this phase.
//!
//! 2. **Pull.** When a `PENDING` node is read, [`check_dirty`] walks its
//!    dependencies upstream-first and re-evaluates only the nodes whose
//!    inputs really changed. If every input turns out unchanged, the node
//!    keeps its cached value.
//!
//! In a diamond (`a -> b, a -> c, b + c -> d`), the push phase marks `d` once
//! and the pull phase evaluates `b` and `c` at most once each before `d`
//! recomputes, so `d` never runs twice for one write.

use std::cell::RefMut;

use smallvec::SmallVec;

use super::node::{Flags, LinkId, NodeId};
use super::store::Graph;

/// Effects reached by a propagation walk, in notification order.
pub type Notified = SmallVec<[NodeId; 4]>;

impl<P> Graph<P> {
    /// Mark everything downstream of `link` (and its siblings) as pending.
    ///
    /// Returns the effects that should be scheduled.
    pub fn propagate(&mut self, mut link: LinkId) -> Notified {
        let mut notified = Notified::new();
        let mut next = self.edge(link).next_sub;
        let mut stack: SmallVec<[Option<LinkId>; 8]> = SmallVec::new();

        'top: loop {
            let sub = self.edge(link).sub;
            let mut flags = self.flags(sub);

            if !flags.intersects(
                Flags::RECURSED_CHECK | Flags::RECURSED | Flags::DIRTY | Flags::PENDING,
            ) {
                self.set_flags(sub, flags | Flags::PENDING);
            } else if !flags.intersects(Flags::RECURSED_CHECK | Flags::RECURSED) {
                // Already marked by this or an earlier walk.
                flags = Flags::empty();
            } else if !flags.contains(Flags::RECURSED_CHECK) {
                self.set_flags(sub, (flags - Flags::RECURSED) | Flags::PENDING);
            } else if !flags.intersects(Flags::DIRTY | Flags::PENDING)
                && self.is_valid_link(link, sub)
            {
                // Written while it is evaluating: mark it, but do not
                // schedule it again from inside its own run.
                self.set_flags(sub, flags | Flags::RECURSED | Flags::PENDING);
                flags &= Flags::MUTABLE;
            } else {
                flags = Flags::empty();
            }

            if flags.contains(Flags::WATCHING) {
                notified.push(sub);
            }

            if flags.contains(Flags::MUTABLE) {
                if let Some(sub_subs) = self.node(sub).subs {
                    link = sub_subs;
                    let nested = self.edge(sub_subs).next_sub;
                    if nested.is_some() {
                        stack.push(next);
                        next = nested;
                    }
                    continue;
                }
            }

            if let Some(sibling) = next {
                link = sibling;
                next = self.edge(sibling).next_sub;
                continue;
            }

            while let Some(saved) = stack.pop() {
                if let Some(resume) = saved {
                    link = resume;
                    next = self.edge(resume).next_sub;
                    continue 'top;
                }
            }

            break;
        }

        notified
    }

    /// Upgrade the immediate subscribers reachable from `link` from pending
    /// to dirty, without recursing.
    ///
    /// Returns the effects that should be scheduled.
    pub fn shallow_propagate(&mut self, link: LinkId) -> Notified {
        let mut notified = Notified::new();
        let mut cursor = Some(link);

        while let Some(link) = cursor {
            let edge = self.edge(link);
            let sub = edge.sub;
            cursor = edge.next_sub;

            let flags = self.flags(sub);
            if flags & (Flags::PENDING | Flags::DIRTY) == Flags::PENDING {
                self.set_flags(sub, flags | Flags::DIRTY);
                if flags & (Flags::WATCHING | Flags::RECURSED_CHECK) == Flags::WATCHING {
                    notified.push(sub);
                }
            }
        }

        notified
    }

    /// Whether `check` has already been re-declared by `sub` during its
    /// current evaluation (it sits at or before the dependency cursor).
    pub fn is_valid_link(&self, check: LinkId, sub: NodeId) -> bool {
        let mut cursor = self.node(sub).deps_tail;
        while let Some(link) = cursor {
            if link == check {
                return true;
            }
            cursor = self.edge(link).prev_dep;
        }
        false
    }
}

/// The hooks the pull phase needs from whoever owns the graph.
///
/// `update` and `notify` may run user code, which reads and links other
/// nodes, so implementations must not hold the graph borrow across them.
pub trait ReactiveSystem {
    type Payload;

    /// Borrow the graph for a short structural step.
    fn graph(&self) -> RefMut<'_, Graph<Self::Payload>>;

    /// Bring a signal or memo up to date. Returns whether its value changed.
    fn update(&self, node: NodeId) -> bool;

    /// Queue an effect for execution.
    fn notify(&self, node: NodeId);
}

/// Run [`Graph::propagate`] and schedule the effects it reached.
pub fn propagate<S: ReactiveSystem + ?Sized>(system: &S, link: LinkId) {
    let notified = system.graph().propagate(link);
    for node in notified {
        system.notify(node);
    }
}

/// Run [`Graph::shallow_propagate`] and schedule the effects it reached.
pub fn shallow_propagate<S: ReactiveSystem + ?Sized>(system: &S, link: LinkId) {
    let notified = system.graph().shallow_propagate(link);
    for node in notified {
        system.notify(node);
    }
}

/// Shallow-propagate from `node` only when more than one node subscribes
/// to it. With a single subscriber, that subscriber is the one currently
/// being checked and is about to re-evaluate anyway.
fn shallow_propagate_shared<S: ReactiveSystem + ?Sized>(system: &S, node: NodeId) {
    let graph = system.graph();
    let shared = graph.subs(node).filter(|&first| graph.edge(first).next_sub.is_some());
    drop(graph);
    if let Some(first) = shared {
        shallow_propagate(system, first);
    }
}

/// Decide whether `sub`, currently `PENDING`, really has to re-evaluate.
///
/// `link` is the head of `sub`'s dependency list. Dependencies are checked in
/// read order; pending ones are descended into first, dirty ones are
/// updated on the spot. The walk stops at the first dependency whose value
/// actually changed. Nodes found clean on the way up lose their `PENDING`
/// flag.
pub fn check_dirty<S: ReactiveSystem + ?Sized>(system: &S, mut link: LinkId, mut sub: NodeId) -> bool {
    // Edges descended through, one per level below the starting node.
    let mut stack: SmallVec<[LinkId; 8]> = SmallVec::new();
    let mut dirty = false;

    'top: loop {
        let (dep, dep_flags, sub_flags) = {
            let graph = system.graph();
            let dep = graph.link_dep(link);
            (dep, graph.flags(dep), graph.flags(sub))
        };

        if sub_flags.contains(Flags::DIRTY) {
            dirty = true;
        } else if dep_flags.contains(Flags::MUTABLE | Flags::DIRTY) {
            if system.update(dep) {
                shallow_propagate_shared(system, dep);
                dirty = true;
            }
        } else if dep_flags.contains(Flags::MUTABLE | Flags::PENDING) {
            let first = system.graph().deps(dep);
            match first {
                Some(first) => {
                    stack.push(link);
                    link = first;
                    sub = dep;
                    continue;
                }
                // Lost its inputs since it was marked; nothing can be stale.
                None => system.graph().remove_flags(dep, Flags::PENDING),
            }
        }

        if !dirty {
            let next = system.graph().edge(link).next_dep;
            if let Some(next) = next {
                link = next;
                continue;
            }
        }

        while let Some(parent) = stack.pop() {
            link = parent;
            if dirty {
                if system.update(sub) {
                    shallow_propagate_shared(system, sub);
                    sub = system.graph().link_sub(link);
                    continue;
                }
                dirty = false;
            } else {
                system.graph().remove_flags(sub, Flags::PENDING);
            }

            let next = {
                let graph = system.graph();
                sub = graph.link_sub(link);
                graph.edge(link).next_dep
            };
            if let Some(next) = next {
                link = next;
                continue 'top;
            }
        }

        return dirty;
    }
}
