//! `EventHeap` — mutable min-heap of pending completion dates.
//!
//! # Why not `BinaryHeap`
//!
//! The lazy algorithm needs to *move* an action's pending date when its share
//! changes and to *drop* it when the action is suspended or cancelled.
//! `std::collections::BinaryHeap` supports neither, so this heap keeps an
//! arena of handle slots next to the binary heap array:
//!
//! ```text
//! slots[handle.slot] = { generation, position }   position → index in `entries`
//! entries[position]  = { date, tie, kind, item, handle }
//! ```
//!
//! Every sift keeps `slots[..].position` current, so update and remove are
//! O(log n) through a handle that stays valid for as long as the entry lives.
//! Slots are recycled with a bumped generation; a handle from a removed entry
//! is detected as stale instead of silently aliasing a new entry.
//!
//! # Ordering
//!
//! Entries are ordered by `(date, tie)`.  The kernel uses the action's creation
//! sequence number as `tie`, so actions due at the same date always pop in
//! creation order regardless of insertion history.

use std::cmp::Ordering;

/// Why an entry sits in the heap.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum HeapEntryKind {
    /// No entry (or the entry was removed).
    #[default]
    NotSet,
    /// Date at which the remaining work is exhausted at the current share.
    Normal,
    /// Date at which the action's `max_duration` deadline expires.
    MaxDuration,
    /// Date at which a resource-specific latency has been paid.
    Latency,
}

/// Stable reference to one heap entry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct HeapHandle {
    slot:       u32,
    generation: u32,
}

/// One entry removed from the heap.
#[derive(Clone, Debug, PartialEq)]
pub struct HeapEntry<T> {
    pub date: f64,
    pub kind: HeapEntryKind,
    pub item: T,
}

struct Node<T> {
    date:   f64,
    tie:    u64,
    kind:   HeapEntryKind,
    item:   T,
    handle: HeapHandle,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    generation: u32,
    position:   Option<usize>,
}

/// Min-heap keyed by `(date, tie)` with handle-based update and removal.
pub struct EventHeap<T> {
    nodes: Vec<Node<T>>,
    slots: Vec<Slot>,
    free:  Vec<u32>,
}

impl<T> Default for EventHeap<T> {
    fn default() -> Self {
        Self { nodes: Vec::new(), slots: Vec::new(), free: Vec::new() }
    }
}

impl<T> EventHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Earliest pending date, or `None` if the heap is empty.
    pub fn top_date(&self) -> Option<f64> {
        self.nodes.first().map(|n| n.date)
    }

    /// Earliest entry without removing it.
    pub fn peek(&self) -> Option<(f64, HeapEntryKind, &T)> {
        self.nodes.first().map(|n| (n.date, n.kind, &n.item))
    }

    /// Whether `handle` still refers to a live entry.
    pub fn contains(&self, handle: HeapHandle) -> bool {
        self.position(handle).is_some()
    }

    /// Date and kind of the entry behind `handle`.
    pub fn get(&self, handle: HeapHandle) -> Option<(f64, HeapEntryKind)> {
        self.position(handle).map(|p| (self.nodes[p].date, self.nodes[p].kind))
    }

    /// Insert a new entry and return its handle.
    pub fn push(&mut self, date: f64, tie: u64, kind: HeapEntryKind, item: T) -> HeapHandle {
        let handle = self.allocate_slot();
        let position = self.nodes.len();
        self.nodes.push(Node { date, tie, kind, item, handle });
        self.slots[handle.slot as usize].position = Some(position);
        self.sift_up(position);
        handle
    }

    /// Move an existing entry to `date`.  Returns `false` for a stale handle.
    pub fn update(&mut self, handle: HeapHandle, date: f64, kind: HeapEntryKind) -> bool {
        let Some(position) = self.position(handle) else {
            return false;
        };
        let node = &mut self.nodes[position];
        let earlier = date < node.date;
        node.date = date;
        node.kind = kind;
        if earlier {
            self.sift_up(position);
        } else {
            self.sift_down(position);
        }
        true
    }

    /// Remove the entry behind `handle`.  Returns `None` for a stale handle.
    pub fn remove(&mut self, handle: HeapHandle) -> Option<HeapEntry<T>> {
        let position = self.position(handle)?;
        Some(self.remove_at(position))
    }

    /// Remove and return the earliest entry.
    pub fn pop(&mut self) -> Option<HeapEntry<T>> {
        if self.nodes.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn position(&self, handle: HeapHandle) -> Option<usize> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.position
    }

    fn allocate_slot(&mut self) -> HeapHandle {
        match self.free.pop() {
            Some(slot) => HeapHandle { slot, generation: self.slots[slot as usize].generation },
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot::default());
                HeapHandle { slot, generation: 0 }
            }
        }
    }

    fn remove_at(&mut self, position: usize) -> HeapEntry<T> {
        let last = self.nodes.len() - 1;
        self.swap(position, last);
        let node = self.nodes.pop().expect("heap is non-empty");

        let slot = &mut self.slots[node.handle.slot as usize];
        slot.position = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node.handle.slot);

        if position < self.nodes.len() {
            self.sift_down(position);
            self.sift_up(position);
        }
        HeapEntry { date: node.date, kind: node.kind, item: node.item }
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.nodes[a], &self.nodes[b]);
        a.date.total_cmp(&b.date).then(a.tie.cmp(&b.tie)) == Ordering::Less
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.nodes.swap(a, b);
        self.slots[self.nodes[a].handle.slot as usize].position = Some(a);
        self.slots[self.nodes[b].handle.slot as usize].position = Some(b);
    }

    fn sift_up(&mut self, mut position: usize) {
        while position > 0 {
            let parent = (position - 1) / 2;
            if !self.less(position, parent) {
                break;
            }
            self.swap(position, parent);
            position = parent;
        }
    }

    fn sift_down(&mut self, mut position: usize) {
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut smallest = position;
            if left < self.nodes.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.nodes.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == position {
                break;
            }
            self.swap(position, smallest);
            position = smallest;
        }
    }
}
