//! Graph Storage
//!
//! `Graph` owns every node header and every edge. Edges are spliced into two
//! intrusive lists at once, so adding, re-ordering and removing a single
//! dependency is O(1) and never touches unrelated edges.

use super::arena::Arena;
use super::node::{Flags, LinkId, LinkRecord, NodeId, NodeRecord};

/// The dependency graph: node headers plus the edges between them.
///
/// `P` is an arbitrary payload stored with each node. The graph never
/// inspects it; the reactive runtime uses it to find the signal, memo or
/// effect behind a node.
#[derive(Debug)]
pub struct Graph<P> {
    nodes: Arena<NodeRecord<P>>,
    links: Arena<LinkRecord>,
}

impl<P> Graph<P> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create an empty graph with room for the given number of nodes and
    /// edges.
    pub fn with_capacity(nodes: usize, links: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(nodes),
            links: Arena::with_capacity(links),
        }
    }

    /// Add an unconnected node.
    pub fn add_node(&mut self, flags: Flags, payload: P) -> NodeId {
        NodeId::from_index(self.nodes.insert(NodeRecord::new(flags, payload)))
    }

    /// Remove a node and every edge touching it, returning its payload.
    pub fn remove_node(&mut self, id: NodeId) -> P {
        self.detach(id);
        match self.nodes.remove(id.raw()) {
            Some(record) => record.payload,
            None => panic!("remove of unknown node {id:?}"),
        }
    }

    /// Whether the handle refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.raw()).is_some()
    }

    pub(crate) fn node(&self, id: NodeId) -> &NodeRecord<P> {
        match self.nodes.get(id.raw()) {
            Some(record) => record,
            None => panic!("stale node handle {id:?}"),
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeRecord<P> {
        match self.nodes.get_mut(id.raw()) {
            Some(record) => record,
            None => panic!("stale node handle {id:?}"),
        }
    }

    pub(crate) fn edge(&self, id: LinkId) -> &LinkRecord {
        match self.links.get(id.raw()) {
            Some(record) => record,
            None => panic!("stale edge handle {id:?}"),
        }
    }

    pub(crate) fn edge_mut(&mut self, id: LinkId) -> &mut LinkRecord {
        match self.links.get_mut(id.raw()) {
            Some(record) => record,
            None => panic!("stale edge handle {id:?}"),
        }
    }

    pub fn flags(&self, id: NodeId) -> Flags {
        self.node(id).flags
    }

    pub fn set_flags(&mut self, id: NodeId, flags: Flags) {
        self.node_mut(id).flags = flags;
    }

    pub fn insert_flags(&mut self, id: NodeId, flags: Flags) {
        self.node_mut(id).flags.insert(flags);
    }

    pub fn remove_flags(&mut self, id: NodeId, flags: Flags) {
        self.node_mut(id).flags.remove(flags);
    }

    /// First edge of the node's dependency list.
    pub fn deps(&self, id: NodeId) -> Option<LinkId> {
        self.node(id).deps
    }

    /// First edge of the node's subscriber list.
    pub fn subs(&self, id: NodeId) -> Option<LinkId> {
        self.node(id).subs
    }

    /// The node read through this edge.
    pub fn link_dep(&self, link: LinkId) -> NodeId {
        self.edge(link).dep
    }

    /// The node that reads through this edge.
    pub fn link_sub(&self, link: LinkId) -> NodeId {
        self.edge(link).sub
    }

    pub fn payload(&self, id: NodeId) -> &P {
        &self.node(id).payload
    }

    /// Swap the payload of a node, returning the previous one.
    pub fn replace_payload(&mut self, id: NodeId, payload: P) -> P {
        std::mem::replace(&mut self.node_mut(id).payload, payload)
    }

    /// Record that `sub` read `dep` during evaluation cycle `version`.
    ///
    /// The dependency tail of `sub` acts as a cursor over its previous
    /// dependency list. Re-reading dependencies in the same order as last
    /// time just advances the cursor; an edge that exists further down the
    /// not-yet-visited part of the list is moved up to the cursor; only a
    /// genuinely new dependency allocates an edge. A pair never has more
    /// than one edge.
    pub fn link(&mut self, dep: NodeId, sub: NodeId, version: u64) {
        let prev_dep = self.node(sub).deps_tail;
        if let Some(prev) = prev_dep {
            if self.edge(prev).dep == dep {
                return;
            }
        }

        let next_dep = match prev_dep {
            Some(prev) => self.edge(prev).next_dep,
            None => self.node(sub).deps,
        };
        if let Some(next) = next_dep {
            if self.edge(next).dep == dep {
                self.edge_mut(next).version = version;
                self.node_mut(sub).deps_tail = Some(next);
                return;
            }
        }

        let prev_sub = self.node(dep).subs_tail;
        if let Some(prev) = prev_sub {
            let edge = self.edge(prev);
            if edge.version == version && edge.sub == sub {
                return;
            }
        }

        if self.find_before(prev_dep, dep) {
            return;
        }

        if let Some(next) = next_dep {
            if let Some(stale) = self.find_after(next, dep) {
                self.move_to_cursor(stale, sub, prev_dep, next);
                self.edge_mut(stale).version = version;
                return;
            }
        }

        let new_link = LinkId::from_index(self.links.insert(LinkRecord {
            version,
            dep,
            sub,
            prev_sub,
            next_sub: None,
            prev_dep,
            next_dep,
        }));

        self.node_mut(sub).deps_tail = Some(new_link);
        self.node_mut(dep).subs_tail = Some(new_link);
        if let Some(next) = next_dep {
            self.edge_mut(next).prev_dep = Some(new_link);
        }
        match prev_dep {
            Some(prev) => self.edge_mut(prev).next_dep = Some(new_link),
            None => self.node_mut(sub).deps = Some(new_link),
        }
        match prev_sub {
            Some(prev) => self.edge_mut(prev).next_sub = Some(new_link),
            None => self.node_mut(dep).subs = Some(new_link),
        }
    }

    /// Whether the visited part of the dependency list, from `tail` back to
    /// the head, already holds an edge to `dep`.
    fn find_before(&self, tail: Option<LinkId>, dep: NodeId) -> bool {
        let mut cursor = tail;
        while let Some(link) = cursor {
            let edge = self.edge(link);
            if edge.dep == dep {
                return true;
            }
            cursor = edge.prev_dep;
        }
        false
    }

    /// Search the dependency list strictly after `from` for an edge to `dep`.
    fn find_after(&self, from: LinkId, dep: NodeId) -> Option<LinkId> {
        let mut cursor = self.edge(from).next_dep;
        while let Some(link) = cursor {
            let edge = self.edge(link);
            if edge.dep == dep {
                return Some(link);
            }
            cursor = edge.next_dep;
        }
        None
    }

    /// Splice `link` out of its place in the dependency list of `sub` and
    /// re-insert it between `prev` and `next`, making it the new cursor.
    fn move_to_cursor(&mut self, link: LinkId, sub: NodeId, prev: Option<LinkId>, next: LinkId) {
        let (old_prev, old_next) = {
            let edge = self.edge(link);
            (edge.prev_dep, edge.next_dep)
        };
        if let Some(old_prev) = old_prev {
            self.edge_mut(old_prev).next_dep = old_next;
        }
        if let Some(old_next) = old_next {
            self.edge_mut(old_next).prev_dep = old_prev;
        }

        {
            let edge = self.edge_mut(link);
            edge.prev_dep = prev;
            edge.next_dep = Some(next);
        }
        self.edge_mut(next).prev_dep = Some(link);
        match prev {
            Some(prev) => self.edge_mut(prev).next_dep = Some(link),
            None => self.node_mut(sub).deps = Some(link),
        }
        self.node_mut(sub).deps_tail = Some(link);
    }

    /// Remove an edge from both of its lists.
    ///
    /// Returns the edge that followed it in the dependency list of `sub`, so
    /// callers can walk and prune a suffix.
    pub fn unlink(&mut self, link: LinkId, sub: NodeId) -> Option<LinkId> {
        assert_eq!(
            self.edge(link).sub,
            sub,
            "edge {link:?} is not in the dependency list of {sub:?}"
        );
        let edge = match self.links.remove(link.raw()) {
            Some(edge) => edge,
            None => panic!("unlink of unknown edge {link:?}"),
        };

        let dep = edge.dep;
        {
            let node = self.node_mut(sub);
            if node.deps_tail == Some(link) {
                node.deps_tail = edge.prev_dep;
            }
        }
        if let Some(next) = edge.next_dep {
            self.edge_mut(next).prev_dep = edge.prev_dep;
        }
        match edge.prev_dep {
            Some(prev) => self.edge_mut(prev).next_dep = edge.next_dep,
            None => self.node_mut(sub).deps = edge.next_dep,
        }
        match edge.next_sub {
            Some(next) => self.edge_mut(next).prev_sub = edge.prev_sub,
            None => self.node_mut(dep).subs_tail = edge.prev_sub,
        }
        match edge.prev_sub {
            Some(prev) => self.edge_mut(prev).next_sub = edge.next_sub,
            None => self.node_mut(dep).subs = edge.next_sub,
        }

        edge.next_dep
    }

    /// Reset the dependency cursor of `sub` ahead of a new evaluation.
    pub fn start_tracking(&mut self, sub: NodeId) {
        self.node_mut(sub).deps_tail = None;
    }

    /// Drop every dependency edge of `sub` that was not re-declared since
    /// the last [`start_tracking`](Self::start_tracking).
    pub fn prune_stale(&mut self, sub: NodeId) {
        let node = self.node(sub);
        let mut stale = match node.deps_tail {
            Some(tail) => self.edge(tail).next_dep,
            None => node.deps,
        };
        while let Some(link) = stale {
            stale = self.unlink(link, sub);
        }
    }

    /// Drop every dependency edge of `sub`.
    pub fn unlink_deps(&mut self, sub: NodeId) {
        let mut dep = self.node(sub).deps;
        while let Some(link) = dep {
            dep = self.unlink(link, sub);
        }
    }

    /// Drop every edge touching the node, in both directions.
    pub fn detach(&mut self, id: NodeId) {
        self.unlink_deps(id);
        while let Some(link) = self.node(id).subs {
            let sub = self.edge(link).sub;
            self.unlink(link, sub);
        }
    }

    /// The nodes `sub` currently depends on, in read order.
    pub fn dependencies(&self, sub: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.node(sub).deps;
        while let Some(link) = cursor {
            let edge = self.edge(link);
            out.push(edge.dep);
            cursor = edge.next_dep;
        }
        out
    }

    /// The nodes currently reading `dep`, in subscription order.
    pub fn subscribers(&self, dep: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.node(dep).subs;
        while let Some(link) = cursor {
            let edge = self.edge(link);
            out.push(edge.sub);
            cursor = edge.next_sub;
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

impl<P> Default for Graph<P> {
    fn default() -> Self {
        Self::new()
    }
}
