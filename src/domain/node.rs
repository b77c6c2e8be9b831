//! Connection nodes and the lists that own them.
//!
//! Every participant owns one [`NodeList`] behind its [`LockDomain`]. The
//! list is a slab of slots threaded into an intrusive doubly linked list by
//! slot index; a node is addressed by [`NodeKey`] (index plus generation),
//! so a key that outlived its node is detected as a generation mismatch
//! instead of reaching a reused slot.
//!
//! One `connect()` creates two cross-linked nodes sharing a [`Wire`]: a
//! source node on the emitter's list and a sink node on the receiver's list.
//! A scope additionally threads a tracker node (no pairing, weak wire) onto
//! its own list.
//!
//! # Teardown protocol
//!
//! [`destroy`] reads the node's pairing under its own lock, retains the peer
//! domain, then takes both domains with [`acquire_pair`] and re-checks that
//! its node is still linked. The first caller to get there unlinks both
//! halves; any later caller finds its key stale and returns `false`. Nodes
//! are dropped only after every lock is released, because dropping the last
//! reference to a callback may tear down further participants.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::ConnectionId;
use super::lock_domain::{LockDomain, acquire_pair};
use crate::context::{Context, Counters};

pub(crate) type Domain = LockDomain<NodeList>;

/// Where a new subscriber is linked into a source's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Ahead of every existing subscriber.
    Front,
    /// After every existing subscriber.
    #[default]
    Back,
    /// Before the subscriber currently at this index; past the end appends.
    At(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeKey {
    index: usize,
    generation: u64,
}

/// Reference to a node on some list, possibly another participant's.
#[derive(Debug, Clone)]
pub(crate) struct NodeRef {
    domain: Weak<Domain>,
    key: NodeKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeRole {
    Source,
    Sink,
    Tracker,
}

/// Record shared by both halves of one connection.
pub(crate) struct Wire {
    id: ConnectionId,
    source: NodeRef,
    attached: AtomicBool,
    slot: Box<dyn Any + Send + Sync>,
}

impl Wire {
    pub(crate) const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Cleared when the source node is unlinked. Checked right before every
    /// invocation.
    pub(crate) fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn slot<S: 'static>(&self) -> Option<&S> {
        self.slot.downcast_ref::<S>()
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wire")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) enum Payload {
    Wire(Arc<Wire>),
    Tracker(Weak<Wire>),
}

#[derive(Debug)]
pub(crate) struct Node {
    role: NodeRole,
    prev: Option<usize>,
    next: Option<usize>,
    peer: Option<NodeRef>,
    payload: Payload,
}

impl Node {
    fn new(role: NodeRole, peer: Option<NodeRef>, payload: Payload) -> Self {
        Self {
            role,
            prev: None,
            next: None,
            peer,
            payload,
        }
    }

    fn wire(&self) -> Option<&Arc<Wire>> {
        match &self.payload {
            Payload::Wire(wire) => Some(wire),
            Payload::Tracker(_) => None,
        }
    }

    /// Only the two halves and in-flight snapshots hold a wire strongly.
    /// Must not upgrade: this runs under the list lock.
    fn is_live_tracker(&self) -> bool {
        match &self.payload {
            Payload::Tracker(wire) => wire.strong_count() > 0,
            Payload::Wire(_) => false,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    reserved: bool,
    node: Option<Node>,
}

/// Intrusive node list owned by one participant.
#[derive(Debug)]
pub(crate) struct NodeList {
    context: Context,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    closing: bool,
    prune_at: usize,
}

const PRUNE_FLOOR: usize = 32;

impl NodeList {
    pub(crate) fn new(context: Context) -> Self {
        Self {
            context,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            closing: false,
            prune_at: PRUNE_FLOOR,
        }
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_closing(&self) -> bool {
        self.closing
    }

    /// Refuses every later attach.
    pub(crate) fn begin_close(&mut self) {
        self.closing = true;
    }

    fn node(&self, index: usize) -> Option<&Node> {
        self.slots.get(index)?.node.as_ref()
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.slots.get_mut(index)?.node.as_mut()
    }

    fn key_of(&self, index: usize) -> Option<NodeKey> {
        let slot = self.slots.get(index)?;
        slot.node.as_ref()?;
        Some(NodeKey {
            index,
            generation: slot.generation,
        })
    }

    pub(crate) fn contains(&self, key: NodeKey) -> bool {
        self.slots
            .get(key.index)
            .is_some_and(|slot| slot.generation == key.generation && slot.node.is_some())
    }

    fn get(&self, key: NodeKey) -> Option<&Node> {
        if self.contains(key) {
            self.node(key.index)
        } else {
            None
        }
    }

    pub(crate) fn head(&self) -> Option<NodeKey> {
        self.head.and_then(|index| self.key_of(index))
    }

    pub(crate) fn next_key(&self, key: NodeKey) -> Option<NodeKey> {
        let next = self.get(key)?.next?;
        self.key_of(next)
    }

    /// Claims a slot for a node that is attached later under the same lock.
    fn reserve(&mut self) -> NodeKey {
        while let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.reserved = true;
                return NodeKey {
                    index,
                    generation: slot.generation,
                };
            }
        }
        let index = self.slots.len();
        self.slots.push(Slot {
            generation: 0,
            reserved: true,
            node: None,
        });
        NodeKey {
            index,
            generation: 0,
        }
    }

    fn attach(&mut self, key: NodeKey, node: Node, position: Position) {
        let role = node.role;
        let Some(slot) = self.slots.get_mut(key.index) else {
            return;
        };
        debug_assert!(
            slot.reserved && slot.generation == key.generation && slot.node.is_none(),
            "attach into a slot that was not reserved for it"
        );
        slot.reserved = false;
        slot.node = Some(node);
        self.len += 1;
        Counters::bump(&self.context.counters().nodes_allocated);

        match position {
            Position::Front => self.push_front(key.index),
            Position::Back => self.push_back(key.index),
            Position::At(at) => self.insert_at(key.index, role, at),
        }
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head.and_then(|head| self.node_mut(head)) {
            Some(head) => head.prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    fn push_back(&mut self, index: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(index) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail.and_then(|tail| self.node_mut(tail)) {
            Some(tail) => tail.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    /// Links `index` before the `at`-th node of the same role.
    fn insert_at(&mut self, index: usize, role: NodeRole, at: usize) {
        let mut cursor = self.head;
        let mut seen = 0;
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else {
                break;
            };
            if current != index && node.role == role {
                if seen == at {
                    self.link_before(index, current);
                    return;
                }
                seen += 1;
            }
            cursor = node.next;
        }
        self.push_back(index);
    }

    fn link_before(&mut self, index: usize, at: usize) {
        let Some(prev) = self.node(at).and_then(|node| node.prev) else {
            self.push_front(index);
            return;
        };
        if let Some(node) = self.node_mut(index) {
            node.prev = Some(prev);
            node.next = Some(at);
        }
        if let Some(node) = self.node_mut(prev) {
            node.next = Some(index);
        }
        if let Some(node) = self.node_mut(at) {
            node.prev = Some(index);
        }
    }

    fn unlink(&mut self, index: usize) {
        let Some(node) = self.node_mut(index) else {
            return;
        };
        let prev = node.prev.take();
        let next = node.next.take();
        match prev.and_then(|prev| self.node_mut(prev)) {
            Some(prev) => prev.next = next,
            None => self.head = next,
        }
        match next.and_then(|next| self.node_mut(next)) {
            Some(next) => next.prev = prev,
            None => self.tail = prev,
        }
    }

    /// Unlinks a node in constant time and frees its slot. A stale key is a
    /// no-op.
    fn detach(&mut self, key: NodeKey) -> Option<Node> {
        if !self.contains(key) {
            return None;
        }
        self.unlink(key.index);
        let slot = self.slots.get_mut(key.index)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Counters::bump(&self.context.counters().nodes_released);
        if let Payload::Wire(wire) = &node.payload {
            wire.attached.store(false, Ordering::Release);
        }
        Some(node)
    }

    fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Wires of every outgoing connection, in invocation order.
    pub(crate) fn outgoing(&self) -> Vec<Arc<Wire>> {
        self.iter()
            .filter(|node| node.role == NodeRole::Source)
            .filter_map(Node::wire)
            .map(Arc::clone)
            .collect()
    }

    pub(crate) fn count(&self, role: NodeRole) -> usize {
        self.iter().filter(|node| node.role == role).count()
    }

    fn tracked(&self) -> Vec<Weak<Wire>> {
        self.iter()
            .filter_map(|node| match &node.payload {
                Payload::Tracker(wire) => Some(Weak::clone(wire)),
                Payload::Wire(_) => None,
            })
            .collect()
    }

    /// Unlinks trackers whose connection is already gone.
    fn prune_trackers(&mut self) -> Vec<Node> {
        let stale: Vec<NodeKey> = self
            .iter_keys()
            .filter(|(_, node)| node.role == NodeRole::Tracker && !node.is_live_tracker())
            .map(|(key, _)| key)
            .collect();
        stale.into_iter().filter_map(|key| self.detach(key)).collect()
    }

    fn iter_keys(&self) -> impl Iterator<Item = (NodeKey, &Node)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let key = self.key_of(index)?;
            let node = self.node(index)?;
            cursor = node.next;
            Some((key, node))
        })
    }
}

impl Drop for NodeList {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.len == 0,
                "lock domain released while {} nodes still reference it",
                self.len
            );
        }
        Counters::bump(&self.context.counters().domains_released);
    }
}

struct Iter<'a> {
    list: &'a NodeList,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.cursor?)?;
        self.cursor = node.next;
        Some(node)
    }
}

/// Creates both halves of a connection from `source` to `sink`.
///
/// Returns `None` without side effects if either list is closing.
pub(crate) fn link(
    source: &Arc<Domain>,
    sink: &Arc<Domain>,
    position: Position,
    slot: Box<dyn Any + Send + Sync>,
) -> Option<Arc<Wire>> {
    let mut pair = acquire_pair(&**source, &**sink);
    if pair.left().is_closing() || pair.right().is_closing() {
        let context = pair.left().context().clone();
        drop(pair);
        Counters::bump(&context.counters().connections_rejected);
        tracing::debug!(
            source = %source.id(),
            sink = %sink.id(),
            "connect refused: endpoint is tearing down"
        );
        return None;
    }

    let source_key = pair.left().reserve();
    let sink_key = pair.right().reserve();
    let wire = Arc::new(Wire {
        id: ConnectionId::new(),
        source: NodeRef {
            domain: Arc::downgrade(source),
            key: source_key,
        },
        attached: AtomicBool::new(true),
        slot,
    });

    let source_node = Node::new(
        NodeRole::Source,
        Some(NodeRef {
            domain: Arc::downgrade(sink),
            key: sink_key,
        }),
        Payload::Wire(Arc::clone(&wire)),
    );
    let sink_node = Node::new(
        NodeRole::Sink,
        Some(NodeRef {
            domain: Arc::downgrade(source),
            key: source_key,
        }),
        Payload::Wire(Arc::clone(&wire)),
    );
    pair.left().attach(source_key, source_node, position);
    pair.right().attach(sink_key, sink_node, Position::Back);
    Counters::bump(&pair.left().context().counters().connections_made);
    drop(pair);

    tracing::trace!(
        connection = %wire.id(),
        source = %source.id(),
        sink = %sink.id(),
        "connected"
    );
    Some(wire)
}

/// Threads a tracker for `wire` onto `domain`'s list.
///
/// Returns `false` if the list is closing or the connection is already gone.
pub(crate) fn track(domain: &Arc<Domain>, wire: &Weak<Wire>) -> bool {
    if !wire.upgrade().is_some_and(|wire| wire.is_attached()) {
        return false;
    }
    let mut list = domain.acquire();
    if list.is_closing() {
        return false;
    }
    let pruned = if list.len() >= list.prune_at {
        let pruned = list.prune_trackers();
        list.prune_at = (list.len() * 2).max(PRUNE_FLOOR);
        pruned
    } else {
        Vec::new()
    };
    let key = list.reserve();
    let tracker = Node::new(NodeRole::Tracker, None, Payload::Tracker(Weak::clone(wire)));
    list.attach(key, tracker, Position::Back);
    drop(list);
    drop(pruned);
    true
}

/// Number of connections tracked on `domain` that are still established.
///
/// Upgrades after the lock is released: an upgraded wire may be the last
/// strong reference to its callback.
pub(crate) fn count_tracked(domain: &Arc<Domain>) -> usize {
    let tracked = domain.acquire().tracked();
    tracked
        .iter()
        .filter(|wire| wire.upgrade().is_some_and(|wire| wire.is_attached()))
        .count()
}

/// Returns `true` if `wire` is still alive and was emitted from `domain`.
pub(crate) fn is_sourced_by(wire: &Weak<Wire>, domain: &Arc<Domain>) -> bool {
    wire.upgrade()
        .is_some_and(|wire| std::ptr::eq(wire.source.domain.as_ptr(), Arc::as_ptr(domain)))
}

/// Tears down the connection a wire belongs to.
///
/// Returns `true` only for the call that performed the teardown.
pub(crate) fn sever(wire: &Weak<Wire>) -> bool {
    let Some(wire) = wire.upgrade() else {
        return false;
    };
    let Some(domain) = wire.source.domain.upgrade() else {
        return false;
    };
    let key = wire.source.key;
    drop(wire);
    destroy(&domain, key)
}

/// Destroys one node and its paired twin.
///
/// Returns `true` if this call unlinked the node, `false` if another path
/// got there first.
pub(crate) fn destroy(domain: &Arc<Domain>, key: NodeKey) -> bool {
    let peer = {
        let list = domain.acquire();
        match list.get(key) {
            Some(node) => node.peer.clone(),
            None => return false,
        }
    };
    let Some(peer) = peer else {
        return detach_unpaired(domain, key);
    };
    let Some(peer_domain) = peer.domain.upgrade() else {
        return detach_unpaired(domain, key);
    };

    let mut pair = acquire_pair(&**domain, &*peer_domain);
    let paired_with = match pair.left().get(key) {
        Some(node) => node.peer.as_ref().map(|peer| peer.key),
        None => return false,
    };
    let node = pair.left().detach(key);
    let twin = if paired_with == Some(peer.key) {
        pair.right().detach(peer.key)
    } else {
        None
    };
    let context = pair.left().context().clone();
    drop(pair);

    if context.config().verify_pairing {
        verify_pairing(key, node.as_ref(), twin.as_ref());
    }
    Counters::bump(&context.counters().connections_destroyed);
    if let Some(wire) = node.as_ref().and_then(Node::wire) {
        tracing::trace!(
            connection = %wire.id(),
            domain = %domain.id(),
            peer = %peer_domain.id(),
            "disconnected"
        );
    }
    true
}

/// Unlinks a node that has no live twin to clear. A tracker also severs the
/// connection it tracks, outside the lock.
fn detach_unpaired(domain: &Arc<Domain>, key: NodeKey) -> bool {
    let node = domain.acquire().detach(key);
    let Some(node) = node else {
        return false;
    };
    match &node.payload {
        Payload::Tracker(wire) => {
            sever(wire);
        }
        Payload::Wire(_) => {
            let context = domain.acquire().context().clone();
            Counters::bump(&context.counters().connections_destroyed);
        }
    }
    true
}

fn verify_pairing(key: NodeKey, node: Option<&Node>, twin: Option<&Node>) {
    let consistent = match (node, twin) {
        (Some(node), Some(twin)) => {
            let back_reference = twin.peer.as_ref().is_some_and(|peer| peer.key == key);
            let same_wire = match (node.wire(), twin.wire()) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            back_reference && same_wire
        }
        _ => false,
    };
    if !consistent {
        tracing::error!(
            index = key.index,
            generation = key.generation,
            twin_found = twin.is_some(),
            "connection pairing is inconsistent"
        );
    }
    debug_assert!(consistent, "connection pairing is inconsistent");
}

/// Tears down every node on `domain`'s list.
///
/// Walks the list once, capturing each successor before destroying the
/// current node. If the captured successor was removed concurrently the walk
/// resumes from the head.
pub(crate) fn remove_all(domain: &Arc<Domain>) -> usize {
    let mut removed = 0;
    let mut cursor: Option<NodeKey> = None;
    loop {
        let (current, successor) = {
            let list = domain.acquire();
            let current = cursor.filter(|key| list.contains(*key)).or_else(|| list.head());
            let Some(current) = current else {
                break;
            };
            (current, list.next_key(current))
        };
        if destroy(domain, current) {
            removed += 1;
        }
        cursor = successor;
    }
    removed
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use std::cell::RefCell;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    /// Hands out bare domains and tears every one of them down on drop, the
    /// way an `Endpoint` would.
    struct Fixture {
        ctx: Context,
        domains: RefCell<Vec<Arc<Domain>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ctx: Context::new(RegistryConfig::default()),
                domains: RefCell::new(Vec::new()),
            }
        }

        fn domain(&self) -> Arc<Domain> {
            let _entered = self.ctx.enter();
            let domain =
                LockDomain::shared(self.ctx.next_domain_id(), NodeList::new(self.ctx.clone()));
            self.domains.borrow_mut().push(Arc::clone(&domain));
            domain
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            for domain in self.domains.take() {
                remove_all(&domain);
            }
        }
    }

    fn wire_ids(list: &NodeList) -> Vec<ConnectionId> {
        list.outgoing().iter().map(|wire| wire.id()).collect()
    }

    fn connect(source: &Arc<Domain>, sink: &Arc<Domain>, position: Position) -> Arc<Wire> {
        let Some(wire) = link(source, sink, position, Box::new(())) else {
            panic!("link refused");
        };
        wire
    }

    #[test]
    fn fixture_teardown_releases_linked_domains() {
        let ctx = {
            let fx = Fixture::new();
            let a = fx.domain();
            let b = fx.domain();
            connect(&a, &b, Position::Back);
            connect(&b, &a, Position::Front);
            fx.ctx.clone()
        };
        let stats = ctx.stats();
        assert!(stats.is_balanced(), "unbalanced: {stats:?}");
        assert_eq!(stats.domains_released, 2);
    }

    #[test]
    fn unwinding_past_linked_domains_does_not_abort() {
        let ctx = Context::new(RegistryConfig::default());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _entered = ctx.enter();
            let source = LockDomain::shared(ctx.next_domain_id(), NodeList::new(ctx.clone()));
            let sink = LockDomain::shared(ctx.next_domain_id(), NodeList::new(ctx.clone()));
            connect(&source, &sink, Position::Back);
            panic!("callback failed while connected");
        }));
        assert!(outcome.is_err());
        assert_eq!(ctx.stats().domains_released, 2);
    }

    #[test]
    fn link_puts_one_node_on_each_side() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let wire = connect(&source, &sink, Position::Back);

        assert!(wire.is_attached());
        assert_eq!(source.acquire().count(NodeRole::Source), 1);
        assert_eq!(sink.acquire().count(NodeRole::Sink), 1);
        assert_eq!(fx.ctx.stats().nodes_allocated, 2);
    }

    #[test]
    fn positions_control_order() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let first = connect(&source, &sink, Position::Back);
        let second = connect(&source, &sink, Position::Back);
        let front = connect(&source, &sink, Position::Front);
        let middle = connect(&source, &sink, Position::At(2));
        let past_end = connect(&source, &sink, Position::At(99));

        assert_eq!(
            wire_ids(&source.acquire()),
            vec![front.id(), first.id(), middle.id(), second.id(), past_end.id()]
        );
    }

    #[test]
    fn destroy_from_either_side_removes_both_nodes_once() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let wire = connect(&source, &sink, Position::Back);
        let sink_key = {
            let list = sink.acquire();
            let Some(key) = list.head() else {
                panic!("sink node missing");
            };
            key
        };

        assert!(destroy(&sink, sink_key));
        assert!(!wire.is_attached());
        assert_eq!(source.acquire().len(), 0);
        assert_eq!(sink.acquire().len(), 0);

        assert!(!destroy(&sink, sink_key));
        assert!(!sever(&Arc::downgrade(&wire)));
        assert_eq!(fx.ctx.stats().connections_destroyed, 1);
        assert_eq!(fx.ctx.stats().nodes_released, 2);
    }

    #[test]
    fn self_connection_shares_one_domain() {
        let fx = Fixture::new();
        let both = fx.domain();
        let wire = connect(&both, &both, Position::Back);
        assert_eq!(both.acquire().len(), 2);

        assert!(sever(&Arc::downgrade(&wire)));
        assert_eq!(both.acquire().len(), 0);
    }

    #[test]
    fn slots_are_reused_with_a_new_generation() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let old = connect(&source, &sink, Position::Back);
        let old_key = old.source.key;
        assert!(sever(&Arc::downgrade(&old)));

        let new = connect(&source, &sink, Position::Back);
        assert_eq!(new.source.key.index, old_key.index);
        assert_ne!(new.source.key.generation, old_key.generation);
        assert!(!destroy(&source, old_key));
        assert!(new.is_attached());
    }

    #[test]
    fn closing_list_refuses_links() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        sink.acquire().begin_close();

        assert!(link(&source, &sink, Position::Back, Box::new(())).is_none());
        assert_eq!(source.acquire().len(), 0);
        assert_eq!(fx.ctx.stats().connections_rejected, 1);
    }

    #[test]
    fn remove_all_clears_mixed_roles() {
        let fx = Fixture::new();
        let hub = fx.domain();
        let other = fx.domain();
        connect(&hub, &other, Position::Back);
        connect(&other, &hub, Position::Back);
        connect(&hub, &hub, Position::Back);

        assert_eq!(remove_all(&hub), 3);
        assert_eq!(hub.acquire().len(), 0);
        assert_eq!(other.acquire().len(), 0);
        assert_eq!(fx.ctx.stats().live_connections(), 0);
    }

    #[test]
    fn tracker_destroy_severs_the_connection() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let scope = fx.domain();
        let wire = connect(&source, &sink, Position::Back);

        assert!(track(&scope, &Arc::downgrade(&wire)));
        assert_eq!(count_tracked(&scope), 1);
        assert_eq!(remove_all(&scope), 1);
        assert!(!wire.is_attached());
        assert_eq!(source.acquire().len(), 0);
        assert_eq!(sink.acquire().len(), 0);
    }

    #[test]
    fn dead_connections_are_not_tracked() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let scope = fx.domain();
        let wire = connect(&source, &sink, Position::Back);
        let weak = Arc::downgrade(&wire);
        assert!(sever(&weak));

        assert!(!track(&scope, &weak));
        assert_eq!(scope.acquire().len(), 0);
    }

    #[test]
    fn stale_trackers_are_pruned() {
        let fx = Fixture::new();
        let source = fx.domain();
        let sink = fx.domain();
        let scope = fx.domain();

        for _ in 0..PRUNE_FLOOR {
            let wire = connect(&source, &sink, Position::Back);
            let weak = Arc::downgrade(&wire);
            assert!(track(&scope, &weak));
            assert!(sever(&weak));
        }
        assert_eq!(scope.acquire().len(), PRUNE_FLOOR);
        assert_eq!(count_tracked(&scope), 0);

        let wire = connect(&source, &sink, Position::Back);
        assert!(track(&scope, &Arc::downgrade(&wire)));
        assert_eq!(scope.acquire().len(), 1);
        assert_eq!(count_tracked(&scope), 1);
    }
}
