//! Concurrent skip list over arena-owned nodes.
//!
//! Thread safety
//! -------------
//!
//! Writes require external synchronization: one writer at a time. Reads are
//! lock-free and may run concurrently with the writer, provided the skip
//! list (and so its arena) is not dropped while a read is in progress.
//!
//! Two invariants make that safe:
//!
//! 1. Nodes are never deleted until the arena is dropped.
//! 2. Everything in a node except its forward links is immutable once the
//!    node is linked in. `insert` initializes a node fully, then publishes
//!    it with release stores; traversal uses acquire loads, so any reader
//!    that reaches a node sees it fully initialized.

use std::cmp::Ordering;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use tansu_core::Comparator;

use super::arena::Arena;

/// Maximum number of levels a node can occupy.
pub const MAX_HEIGHT: usize = 12;

/// A node is promoted one level with probability 1/BRANCHING.
const BRANCHING: u32 = 4;

/// Fixed seed so height sampling is reproducible across runs.
const RNG_SEED: u64 = 0xdeadbeef;

/// Skip list node: an immutable key plus a variable-length tower of forward
/// links. Only the first tower slot is declared; the rest live in the tail
/// of the same arena allocation, sized by the node's sampled height.
#[repr(C)]
struct Node {
    key_ptr: *const u8,
    key_len: usize,
    tower: [AtomicPtr<Node>; 1],
}

impl Node {
    fn key(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.key_ptr, self.key_len) }
    }

    /// Caller must ensure `level` is below this node's allocated height.
    unsafe fn tower_slot(&self, level: usize) -> &AtomicPtr<Node> {
        &*self.tower.as_ptr().add(level)
    }

    /// Acquire load: observes a fully initialized target node.
    unsafe fn next(&self, level: usize) -> *mut Node {
        self.tower_slot(level).load(AtomicOrdering::Acquire)
    }

    /// Release store: publishes the target node to readers.
    unsafe fn set_next(&self, level: usize, node: *mut Node) {
        self.tower_slot(level).store(node, AtomicOrdering::Release);
    }

    unsafe fn next_relaxed(&self, level: usize) -> *mut Node {
        self.tower_slot(level).load(AtomicOrdering::Relaxed)
    }

    unsafe fn set_next_relaxed(&self, level: usize, node: *mut Node) {
        self.tower_slot(level).store(node, AtomicOrdering::Relaxed);
    }
}

fn node_size(height: usize) -> usize {
    std::mem::size_of::<Node>() + (height - 1) * std::mem::size_of::<AtomicPtr<Node>>()
}

/// Concurrent ordered set of pre-encoded keys.
///
/// Keys are unique under the comparator; inserting a key that compares equal
/// to a present key is a contract violation and asserts.
pub struct SkipList<C: Comparator> {
    comparator: C,
    arena: Arc<Arena>,
    /// Sentinel of maximal height; its key is never read.
    head: *mut Node,
    /// Height of the tallest linked node. Written only by `insert`, read
    /// racily by readers; stale values are fine (see `insert`).
    max_height: AtomicUsize,
    /// Used only by the writer; locked to keep `insert` callable on `&self`.
    rng: Mutex<SmallRng>,
}

// Nodes are reachable only through this list and the arena keeps them alive;
// link mutation is confined to the externally-synchronized writer.
unsafe impl<C: Comparator> Send for SkipList<C> {}
unsafe impl<C: Comparator> Sync for SkipList<C> {}

impl<C: Comparator> SkipList<C> {
    /// Creates an empty list allocating from `arena`. The arena must not be
    /// shared with another allocator of nodes that this list will traverse.
    pub fn new(comparator: C, arena: Arc<Arena>) -> Self {
        let head = Self::new_node(&arena, &[], MAX_HEIGHT);
        Self {
            comparator,
            arena,
            head,
            max_height: AtomicUsize::new(1),
            rng: Mutex::new(SmallRng::seed_from_u64(RNG_SEED)),
        }
    }

    /// Inserts `key`. Requires external synchronization against other
    /// writers; readers may run concurrently.
    ///
    /// # Panics
    ///
    /// If a key comparing equal is already present.
    pub fn insert(&self, key: &[u8]) {
        let mut prev: [*mut Node; MAX_HEIGHT] = [ptr::null_mut(); MAX_HEIGHT];
        let x = self.find_greater_or_equal(key, Some(&mut prev));
        assert!(
            x.is_null() || self.comparator.compare(unsafe { (*x).key() }, key) != Ordering::Equal,
            "duplicate key inserted into skip list"
        );

        let height = self.random_height();
        let max_height = self.current_max_height();
        if height > max_height {
            for slot in prev.iter_mut().take(height).skip(max_height) {
                *slot = self.head;
            }
            // Relaxed is enough: a reader that observes the new height
            // before the node below is published finds null at the new
            // levels (null sorts after every key) and drops down a level.
            self.max_height.store(height, AtomicOrdering::Relaxed);
        }

        let node = Self::new_node(&self.arena, key, height);
        for (level, &p) in prev.iter().enumerate().take(height) {
            unsafe {
                // The node is still unreachable, so its own link can be set
                // without a barrier; the store into prev publishes it.
                (*node).set_next_relaxed(level, (*p).next_relaxed(level));
                (*p).set_next(level, node);
            }
        }
    }

    /// Returns true iff a key comparing equal to `key` is in the list.
    pub fn contains(&self, key: &[u8]) -> bool {
        let x = self.find_greater_or_equal(key, None);
        !x.is_null() && self.comparator.compare(unsafe { (*x).key() }, key) == Ordering::Equal
    }

    pub fn iter(&self) -> SkipListIter<'_, C> {
        SkipListIter {
            list: self,
            node: ptr::null_mut(),
        }
    }

    /// Approximate bytes consumed by this list's nodes and keys.
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    fn new_node(arena: &Arena, key: &[u8], height: usize) -> *mut Node {
        let key_ptr = if key.is_empty() {
            ptr::NonNull::<u8>::dangling().as_ptr() as *const u8
        } else {
            let dst = arena.allocate(key.len());
            unsafe { ptr::copy_nonoverlapping(key.as_ptr(), dst, key.len()) };
            dst as *const u8
        };
        let node = arena.allocate_aligned(node_size(height)) as *mut Node;
        unsafe {
            ptr::addr_of_mut!((*node).key_ptr).write(key_ptr);
            ptr::addr_of_mut!((*node).key_len).write(key.len());
            let tower = ptr::addr_of_mut!((*node).tower) as *mut AtomicPtr<Node>;
            for level in 0..height {
                tower.add(level).write(AtomicPtr::new(ptr::null_mut()));
            }
        }
        node
    }

    fn current_max_height(&self) -> usize {
        self.max_height.load(AtomicOrdering::Relaxed)
    }

    fn random_height(&self) -> usize {
        let mut rng = self.rng.lock();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.next_u32() % BRANCHING == 0 {
            height += 1;
        }
        height
    }

    /// True if `key` sorts strictly after the key in `node`. Null sorts
    /// after everything.
    fn key_is_after_node(&self, key: &[u8], node: *mut Node) -> bool {
        !node.is_null() && self.comparator.compare(unsafe { (*node).key() }, key) == Ordering::Less
    }

    /// Returns the earliest node at or after `key`, or null. If `prev` is
    /// given, fills it with the predecessor at every level up to the current
    /// max height.
    fn find_greater_or_equal(
        &self,
        key: &[u8],
        mut prev: Option<&mut [*mut Node; MAX_HEIGHT]>,
    ) -> *mut Node {
        let mut x = self.head;
        let mut level = self.current_max_height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(slots) = prev.as_mut() {
                    slots[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    /// Returns the latest node strictly before `key`, or the head sentinel.
    fn find_less_than(&self, key: &[u8]) -> *mut Node {
        let mut x = self.head;
        let mut level = self.current_max_height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if next.is_null()
                || self.comparator.compare(unsafe { (*next).key() }, key) != Ordering::Less
            {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }

    /// Returns the last node, or the head sentinel if empty. Walks down and
    /// right instead of scanning level zero, so this is O(log n).
    fn find_last(&self) -> *mut Node {
        let mut x = self.head;
        let mut level = self.current_max_height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if next.is_null() {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }
}

/// Cursor over a skip list. Freshly created iterators are not valid;
/// position them with one of the seek methods first.
pub struct SkipListIter<'a, C: Comparator> {
    list: &'a SkipList<C>,
    node: *mut Node,
}

impl<'a, C: Comparator> SkipListIter<'a, C> {
    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }

    /// # Panics
    ///
    /// If the iterator is not valid.
    pub fn key(&self) -> &'a [u8] {
        assert!(self.valid());
        unsafe { (*self.node).key() }
    }

    pub fn next(&mut self) {
        assert!(self.valid());
        self.node = unsafe { (*self.node).next(0) };
    }

    /// Steps to the previous entry by searching for the last node before the
    /// current key; there are no backward links.
    pub fn prev(&mut self) {
        assert!(self.valid());
        let node = self.list.find_less_than(unsafe { (*self.node).key() });
        self.node = if node == self.list.head {
            ptr::null_mut()
        } else {
            node
        };
    }

    /// Positions at the first entry with key >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.node = self.list.find_greater_or_equal(target, None);
    }

    pub fn seek_to_first(&mut self) {
        self.node = unsafe { (*self.list.head).next(0) };
    }

    pub fn seek_to_last(&mut self) {
        let node = self.list.find_last();
        self.node = if node == self.list.head {
            ptr::null_mut()
        } else {
            node
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansu_core::BytewiseComparator;

    fn new_list() -> SkipList<BytewiseComparator> {
        SkipList::new(BytewiseComparator, Arc::new(Arena::new()))
    }

    #[test]
    fn test_empty_list() {
        let list = new_list();
        assert!(!list.contains(b"anything"));

        let mut iter = list.iter();
        assert!(!iter.valid());
        iter.seek_to_first();
        assert!(!iter.valid());
        iter.seek_to_last();
        assert!(!iter.valid());
        iter.seek(b"x");
        assert!(!iter.valid());
    }

    #[test]
    fn test_insert_and_contains() {
        let list = new_list();
        for key in [b"delta" as &[u8], b"alpha", b"echo", b"bravo", b"charlie"] {
            list.insert(key);
        }
        for key in [b"alpha" as &[u8], b"bravo", b"charlie", b"delta", b"echo"] {
            assert!(list.contains(key));
        }
        assert!(!list.contains(b"foxtrot"));
        assert!(!list.contains(b"alph"));
        assert!(!list.contains(b"alphaa"));
    }

    #[test]
    fn test_iteration_is_ordered() {
        let list = new_list();
        let keys: Vec<Vec<u8>> = (0..200u32)
            .map(|i| format!("key{:05}", (i * 7919) % 1000).into_bytes())
            .collect();
        let mut expected: Vec<Vec<u8>> = keys.clone();
        expected.sort();
        expected.dedup();
        let mut seen = std::collections::HashSet::new();
        for key in &keys {
            if seen.insert(key.clone()) {
                list.insert(key);
            }
        }

        let mut iter = list.iter();
        iter.seek_to_first();
        let mut collected = Vec::new();
        while iter.valid() {
            collected.push(iter.key().to_vec());
            iter.next();
        }
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_seek_and_prev() {
        let list = new_list();
        for key in [b"a" as &[u8], b"c", b"e", b"g"] {
            list.insert(key);
        }

        let mut iter = list.iter();
        iter.seek(b"c");
        assert_eq!(iter.key(), b"c");
        iter.seek(b"d");
        assert_eq!(iter.key(), b"e");
        iter.seek(b"h");
        assert!(!iter.valid());

        iter.seek_to_last();
        assert_eq!(iter.key(), b"g");
        iter.prev();
        assert_eq!(iter.key(), b"e");
        iter.prev();
        iter.prev();
        assert_eq!(iter.key(), b"a");
        iter.prev();
        assert!(!iter.valid());
    }

    #[test]
    #[should_panic(expected = "duplicate key")]
    fn test_duplicate_insert_panics() {
        let list = new_list();
        list.insert(b"once");
        list.insert(b"once");
    }

    #[test]
    fn test_memory_usage_grows() {
        let list = new_list();
        let before = list.memory_usage();
        for i in 0..100u32 {
            list.insert(format!("key-{i:04}").as_bytes());
        }
        assert!(list.memory_usage() > before);
    }
}
