//! # MemTable - In-Memory Write Buffer
//!
//! The in-memory side of the write path: a concurrent skip list holding
//! pre-encoded keys, backed by a bump arena that owns every node and key
//! byte until the whole structure is dropped.
//!
//! ## Module Structure
//!
//! - `arena.rs` - Bump allocator; allocations share the arena's lifetime
//! - `skiplist.rs` - Ordered index with lock-free readers and a single
//!   externally-synchronized writer
//!
//! Nothing here is ever deleted in place. Keys cannot be updated or removed
//! once inserted; memory comes back only when the arena is dropped. That
//! immutability is what lets readers run without locks.

mod arena;
mod skiplist;

pub use arena::Arena;
pub use skiplist::{SkipList, SkipListIter, MAX_HEIGHT};
