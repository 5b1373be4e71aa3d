//! # Core Traits
//!
//! Interfaces the write path consumes but does not own: key ordering, filter
//! generation, and the output file. Implementations must be consistent for
//! the lifetime of a build; in particular, a comparator's `name()` is used
//! to reject mid-build comparator swaps.

use std::cmp::Ordering;

use crate::error::Result;

/// Total order over byte-string keys.
pub trait Comparator: Send + Sync {
    /// Name of this ordering. Stable across a build; tables written under
    /// one name must not be modified under another.
    fn name(&self) -> &'static str;

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Shortens `start` in place to some string `s` with
    /// `start_old <= s < limit`. Used to keep index keys small.
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    /// Shortens `key` in place to a string `>=` the original.
    fn find_short_successor(&self, key: &mut Vec<u8>);
}

/// Per-segment probabilistic membership filter.
pub trait FilterPolicy: Send + Sync {
    /// Name of this policy, embedded in the table's meta-index as
    /// `"filter." + name()`.
    fn name(&self) -> &'static str;

    /// Appends a single filter summarizing `keys` to `dst`.
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>);

    /// Returns true if `key` may be in the set `filter` was built from.
    /// False positives are allowed; false negatives are not.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// Append-only output file.
pub trait WritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}

/// In-memory sink; handy for inspecting exact file bytes in tests.
impl WritableFile for Vec<u8> {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
