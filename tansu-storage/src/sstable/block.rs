//! Prefix-compressed block builder.
//!
//! Keys are stored as a delta against the previous key: every entry records
//! how many leading bytes it shares with its predecessor and only the
//! remainder. Every `restart_interval` entries the full key is stored again
//! (a restart point), and the block ends with the offsets of all restart
//! points so a reader can binary-search them.
//!
//! Entry layout:
//!
//! ```text
//! shared_bytes:   varint32
//! unshared_bytes: varint32
//! value_length:   varint32
//! key_delta:      u8[unshared_bytes]
//! value:          u8[value_length]
//! ```
//!
//! Trailer: `u32le[num_restarts]` restart offsets, then `u32le` num_restarts.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use tansu_core::coding::{put_fixed32, put_varint32};
use tansu_core::Comparator;

/// Append-only builder for one block. Keys must arrive in strictly
/// ascending comparator order; violations assert.
pub struct BlockBuilder {
    restart_interval: usize,
    comparator: Arc<dyn Comparator>,
    buffer: BytesMut,
    /// Offsets of restart entries, always starting with 0.
    restarts: Vec<u32>,
    /// Entries emitted since the last restart.
    counter: usize,
    /// Last key added, kept whole even though storage is delta-compressed.
    last_key: Vec<u8>,
    finished: bool,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize, comparator: Arc<dyn Comparator>) -> Self {
        assert!(restart_interval >= 1);
        Self {
            restart_interval,
            comparator,
            buffer: BytesMut::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            finished: false,
        }
    }

    /// Clears all state so the builder can assemble another block.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
        self.finished = false;
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished, "add after finish");
        assert!(self.counter <= self.restart_interval);
        debug_assert!(
            self.buffer.is_empty()
                || self.comparator.compare(key, &self.last_key) == Ordering::Greater,
            "keys must be added in strictly ascending order"
        );

        let mut shared = 0;
        if self.counter < self.restart_interval {
            let min_length = self.last_key.len().min(key.len());
            while shared < min_length && self.last_key[shared] == key[shared] {
                shared += 1;
            }
        } else {
            // Interval reached: store the full key and start a new restart.
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        }
        let non_shared = key.len() - shared;

        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, non_shared as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.put_slice(&key[shared..]);
        self.buffer.put_slice(value);

        // last_key already holds the shared prefix; append only the tail.
        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        debug_assert_eq!(self.last_key, key);
        self.counter += 1;
    }

    /// Size of the block `finish` would currently produce.
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// True until the first `add` after construction or `reset`.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends the restart trailer and returns the finished block. The
    /// builder must not be mutated while the returned slice is in use.
    pub fn finish(&mut self) -> &[u8] {
        for i in 0..self.restarts.len() {
            let restart = self.restarts[i];
            put_fixed32(&mut self.buffer, restart);
        }
        put_fixed32(&mut self.buffer, self.restarts.len() as u32);
        self.finished = true;
        &self.buffer
    }
}
