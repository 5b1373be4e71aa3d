//! Filter block builder.
//!
//! One filter is generated for every 2 KiB window of the table file, keyed
//! by the offset of the data block that starts in that window. The finished
//! block is the concatenation of all filters, the offset of each filter, the
//! offset of that offset array, and the window size exponent:
//!
//! ```text
//! [filter 1]...[filter n] [offset 1]...[offset n] [array_offset: u32le] [base_lg: u8]
//! ```
//!
//! A reader computes `index = block_offset >> base_lg` and probes the filter
//! between `offset[index]` and `offset[index + 1]`; an empty range matches
//! no key.

use std::sync::Arc;

use tansu_core::coding::put_fixed32;
use tansu_core::FilterPolicy;

/// log2 of the window size: one filter per 2 KiB of file.
pub const FILTER_BASE_LG: u8 = 11;
const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

/// Accumulates keys and emits one filter per file window.
///
/// Call sequence: repeated `start_block(offset)` / `add_key(key)` pairs with
/// non-decreasing offsets, then one `finish`.
pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    /// Keys of the current segment, flattened back to back.
    keys: Vec<u8>,
    /// Start offset of each key in `keys`.
    starts: Vec<usize>,
    result: Vec<u8>,
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        Self {
            policy,
            keys: Vec::new(),
            starts: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Announces that the next data block begins at `block_offset`. Emits
    /// one filter per window boundary crossed since the last call, so
    /// skipped windows get an empty filter entry.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset / FILTER_BASE;
        assert!(filter_index >= self.filter_offsets.len() as u64);
        while filter_index > self.filter_offsets.len() as u64 {
            self.generate_filter();
        }
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.starts.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    /// Emits any pending filter, the offset array, its position and the
    /// window exponent, and returns the finished block.
    pub fn finish(&mut self) -> &[u8] {
        if !self.starts.is_empty() {
            self.generate_filter();
        }

        let array_offset = self.result.len() as u32;
        for i in 0..self.filter_offsets.len() {
            let offset = self.filter_offsets[i];
            put_fixed32(&mut self.result, offset);
        }
        put_fixed32(&mut self.result, array_offset);
        self.result.push(FILTER_BASE_LG);
        &self.result
    }

    fn generate_filter(&mut self) {
        let num_keys = self.starts.len();
        if num_keys == 0 {
            // No keys for this window: record an empty filter.
            self.filter_offsets.push(self.result.len() as u32);
            return;
        }

        // Rebuild key slices from the flattened buffer.
        self.starts.push(self.keys.len());
        let key_slices: Vec<&[u8]> = (0..num_keys)
            .map(|i| &self.keys[self.starts[i]..self.starts[i + 1]])
            .collect();

        self.filter_offsets.push(self.result.len() as u32);
        self.policy.create_filter(&key_slices, &mut self.result);

        self.keys.clear();
        self.starts.clear();
    }
}
