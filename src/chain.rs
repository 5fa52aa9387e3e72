//! Collision chains: buckets, nodes and the link bookkeeping between them.
//!
//! Nodes live in a `SlotMap` arena owned by the table and are linked by
//! `NodeKey`. A node belongs to exactly one chain at a time. Every helper
//! here keeps `next`/`prev` mutually consistent: for linked nodes `a -> b`,
//! `a.next == Some(b)` iff `b.prev == Some(a)`, and the first node of a
//! chain has `prev == None`.

use crate::hooks::KeyCompare;
use core::cmp::Ordering;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable, generational index of a collision node.
    pub(crate) struct NodeKey;
}

pub(crate) type NodeArena = SlotMap<NodeKey, Node>;

/// One stored key/value pair plus its chain links.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    next: Option<NodeKey>,
    prev: Option<NodeKey>,
}

impl Node {
    pub(crate) fn new(key: Box<[u8]>, value: Box<[u8]>) -> Self {
        Self {
            key,
            value,
            next: None,
            prev: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn next(&self) -> Option<NodeKey> {
        self.next
    }

    #[cfg(test)]
    pub(crate) fn prev(&self) -> Option<NodeKey> {
        self.prev
    }
}

/// One slot of the backing store: the root of a collision chain.
///
/// `relocated` is only non-empty while a resize is redistributing nodes; it
/// collects nodes that already moved here so they are not scanned again.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Bucket {
    pub(crate) head: Option<NodeKey>,
    pub(crate) relocated: Option<NodeKey>,
}

/// Find the node in `bucket`'s chain whose key compares equal to `key`.
pub(crate) fn locate<C: KeyCompare>(
    nodes: &NodeArena,
    bucket: &Bucket,
    key: &[u8],
    compare: &C,
) -> Option<NodeKey> {
    walk(nodes, bucket.head).find(|&k| compare.compare(key, &nodes[k].key) == Ordering::Equal)
}

/// Link `k` in front of the chain rooted at `head`. `k` must be detached.
pub(crate) fn push_front(nodes: &mut NodeArena, head: &mut Option<NodeKey>, k: NodeKey) {
    if let Some(old) = *head {
        nodes[old].prev = Some(k);
    }
    let node = &mut nodes[k];
    node.next = *head;
    node.prev = None;
    *head = Some(k);
}

/// Detach and return the first node of the chain rooted at `head`.
pub(crate) fn pop_front(nodes: &mut NodeArena, head: &mut Option<NodeKey>) -> Option<NodeKey> {
    let k = (*head)?;
    let next = nodes[k].next;
    *head = next;
    if let Some(n) = next {
        nodes[n].prev = None;
    }
    let node = &mut nodes[k];
    node.next = None;
    node.prev = None;
    Some(k)
}

/// Unlink `k` from `bucket`'s chain. `k` must currently be in that chain.
pub(crate) fn unlink(nodes: &mut NodeArena, bucket: &mut Bucket, k: NodeKey) {
    let (prev, next) = {
        let node = &nodes[k];
        (node.prev, node.next)
    };
    match (prev, next) {
        // sole node
        (None, None) => bucket.head = None,
        // tail
        (Some(p), None) => nodes[p].next = None,
        // head
        (None, Some(n)) => {
            bucket.head = Some(n);
            nodes[n].prev = None;
        }
        // interior
        (Some(p), Some(n)) => {
            nodes[p].next = Some(n);
            nodes[n].prev = Some(p);
        }
    }
    let node = &mut nodes[k];
    node.next = None;
    node.prev = None;
}

/// Iterate the node keys of the chain starting at `head`.
pub(crate) fn walk(nodes: &NodeArena, head: Option<NodeKey>) -> Walk<'_> {
    Walk { nodes, cur: head }
}

pub(crate) struct Walk<'a> {
    nodes: &'a NodeArena,
    cur: Option<NodeKey>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = NodeKey;

    #[inline]
    fn next(&mut self) -> Option<NodeKey> {
        let k = self.cur?;
        self.cur = self.nodes.get(k).and_then(|n| n.next);
        Some(k)
    }
}
