//! Per-vertex adjacency rows: singly linked lists of outgoing edges.
//!
//! Each row keeps its links in a slab of index-chained entries rather than
//! boxed nodes. Insertion is O(1) at the head, so iteration visits the most
//! recently added edge first; removal and lookup match the first entry for a
//! destination in that order. Freed slots are recycled through a free list.
//!
//! Parallel edges to the same destination are allowed. Because of head
//! insertion, `find_first`/`remove_first` resolve to the newest matching edge.

use crate::types::{DeviceId, LinkId};

/// One outgoing edge in a row.
#[derive(Clone, Debug)]
pub struct EdgeEntry {
    pub destination: DeviceId,
    /// Cached routing weight. Kept in sync with the link record by
    /// [`EdgeList::update_weight`].
    pub weight: f64,
    pub link: LinkId,
    next: Option<usize>,
}

/// A singly linked list of outgoing edges for one vertex.
#[derive(Clone, Debug, Default)]
pub struct EdgeList {
    nodes: Vec<EdgeEntry>,
    free: Vec<usize>,
    head: Option<usize>,
    len: usize,
}

impl EdgeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an edge at the head of the row.
    pub fn push_front(&mut self, destination: DeviceId, weight: f64, link: LinkId) {
        let entry = EdgeEntry {
            destination,
            weight,
            link,
            next: self.head,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = entry;
                slot
            }
            None => {
                self.nodes.push(entry);
                self.nodes.len() - 1
            }
        };
        self.head = Some(slot);
        self.len += 1;
    }

    /// Remove the first edge pointing at `destination`, returning its link id.
    pub fn remove_first(&mut self, destination: &DeviceId) -> Option<LinkId> {
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            if self.nodes[slot].destination == *destination {
                let next = self.nodes[slot].next;
                match prev {
                    Some(p) => self.nodes[p].next = next,
                    None => self.head = next,
                }
                self.free.push(slot);
                self.len -= 1;
                return Some(self.nodes[slot].link.clone());
            }
            prev = cursor;
            cursor = self.nodes[slot].next;
        }
        None
    }

    /// First edge pointing at `destination`, if any.
    pub fn find_first(&self, destination: &DeviceId) -> Option<&EdgeEntry> {
        self.iter().find(|entry| entry.destination == *destination)
    }

    /// Refresh the cached weight of the edge belonging to `link`.
    pub fn update_weight(&mut self, link: &LinkId, weight: f64) -> bool {
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            if self.nodes[slot].link == *link {
                self.nodes[slot].weight = weight;
                return true;
            }
            cursor = self.nodes[slot].next;
        }
        false
    }

    /// Iterate edges head to tail (newest first).
    pub fn iter(&self) -> Edges<'_> {
        Edges {
            list: self,
            cursor: self.head,
        }
    }
}

/// Iterator over a row's edges.
pub struct Edges<'a> {
    list: &'a EdgeList,
    cursor: Option<usize>,
}

impl<'a> Iterator for Edges<'a> {
    type Item = &'a EdgeEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let entry = &self.list.nodes[slot];
        self.cursor = entry.next;
        Some(entry)
    }
}

impl<'a> IntoIterator for &'a EdgeList {
    type Item = &'a EdgeEntry;
    type IntoIter = Edges<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
