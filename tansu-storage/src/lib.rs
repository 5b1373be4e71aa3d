//! # TansuDB Storage Engine - Write Path
//!
//! Turns a stream of ordered key-value insertions into a durable,
//! random-access sorted table.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Write Path                             │
//! │                                                             │
//! │  Incoming Keys ──> SkipList (Arena-backed) ──> TableBuilder │
//! │                        │                          │         │
//! │                        ▼                          ▼         │
//! │                  Lock-free reads            Sorted table    │
//! │                  while writing              file on disk    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The memtable side is a concurrent skip list whose nodes live in a bump
//! arena; the table side composes prefix-compressed blocks, an optional
//! Bloom filter block, a meta-index, an index and a footer into one file.

pub mod memtable;
pub mod sstable;

pub use memtable::{Arena, SkipList, SkipListIter};
pub use sstable::{
    BlockBuilder, BloomFilterPolicy, CompressionType, FileWriter, FilterBlockBuilder,
    TableBuilder, TableOptions,
};
