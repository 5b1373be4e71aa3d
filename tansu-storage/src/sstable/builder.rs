//! Table builder: composes data blocks, an optional filter block, the
//! meta-index, the index and the footer into a single table file.
//!
//! The index entry for a data block is not emitted when the block is
//! flushed; it waits for the first key of the next block so the comparator
//! can pick a short separator between the two. Between a flush and the next
//! `add`, that deferred entry is the `pending_index_entry` state.

use std::cmp::Ordering;
use std::mem;

use tracing::{debug, info};

use tansu_core::coding::put_fixed32;
use tansu_core::error::{Error, Result};
use tansu_core::WritableFile;

use super::block::BlockBuilder;
use super::compression::{compress_into, CompressionType};
use super::filter::FilterBlockBuilder;
use super::format::{block_checksum, mask_crc, BlockHandle, Footer, BLOCK_TRAILER_SIZE};
use super::types::TableOptions;

/// Builds a sorted table from strictly ascending key-value pairs.
///
/// The builder owns its output file for the duration of the build and
/// latches the first error it encounters: every mutating call after that is
/// a no-op returning the same error. `finish` or `abandon` must be called
/// exactly once; mutating a closed builder asserts.
pub struct TableBuilder<W: WritableFile> {
    options: TableOptions,
    file: W,
    /// Committed bytes only; an append failure stops it from advancing.
    offset: u64,
    error: Option<Error>,
    data_block: BlockBuilder,
    index_block: BlockBuilder,
    last_key: Vec<u8>,
    num_entries: u64,
    closed: bool,
    filter_block: Option<FilterBlockBuilder>,
    /// True exactly between a flush and the next add.
    pending_index_entry: bool,
    /// Handle of the last flushed data block, awaiting its index entry.
    pending_handle: BlockHandle,
    /// Scratch buffer reused across block compressions.
    compressed_output: Vec<u8>,
}

impl<W: WritableFile> TableBuilder<W> {
    pub fn new(options: TableOptions, file: W) -> Self {
        let mut filter_block = options
            .filter_policy
            .clone()
            .map(FilterBlockBuilder::new);
        if let Some(filter) = &mut filter_block {
            filter.start_block(0);
        }
        let data_block =
            BlockBuilder::new(options.block_restart_interval, options.comparator.clone());
        // Index entries are never delta-compressed: one restart per entry
        // keeps every separator key directly addressable.
        let index_block = BlockBuilder::new(1, options.comparator.clone());
        Self {
            options,
            file,
            offset: 0,
            error: None,
            data_block,
            index_block,
            last_key: Vec::new(),
            num_entries: 0,
            closed: false,
            filter_block,
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
            compressed_output: Vec::new(),
        }
    }

    /// Adds an entry. `key` must compare strictly greater than every key
    /// added before it.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        assert!(!self.closed, "add after finish or abandon");
        self.check_ok()?;
        if self.num_entries > 0 {
            debug_assert_eq!(
                self.options.comparator.compare(key, &self.last_key),
                Ordering::Greater,
                "keys must be added in strictly ascending order"
            );
        }

        if self.pending_index_entry {
            debug_assert!(self.data_block.is_empty());
            // Shrink the flushed block's last key to the shortest string
            // that still sorts before the new block's first key.
            self.options
                .comparator
                .find_shortest_separator(&mut self.last_key, key);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&self.last_key, &handle_encoding);
            self.pending_index_entry = false;
        }

        if let Some(filter) = &mut self.filter_block {
            filter.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= self.options.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the active data block out, if it holds anything.
    pub fn flush(&mut self) -> Result<()> {
        assert!(!self.closed, "flush after finish or abandon");
        self.check_ok()?;
        if self.data_block.is_empty() {
            return Ok(());
        }
        debug_assert!(!self.pending_index_entry);

        let mut block = mem::replace(
            &mut self.data_block,
            BlockBuilder::new(
                self.options.block_restart_interval,
                self.options.comparator.clone(),
            ),
        );
        let result = self.write_block(&mut block);
        self.data_block = block;
        self.pending_handle = result?;
        self.pending_index_entry = true;
        let flush_result = self.file.flush();
        self.latch(flush_result)?;
        debug!(offset = self.offset, "data block flushed");
        if let Some(filter) = &mut self.filter_block {
            filter.start_block(self.offset);
        }
        Ok(())
    }

    /// Writes every remaining block and the footer. The builder is closed
    /// afterwards whether or not this succeeds.
    pub fn finish(&mut self) -> Result<()> {
        let flushed = self.flush();
        assert!(!self.closed, "finish after finish or abandon");
        self.closed = true;
        flushed?;

        // Filter block (never compressed: it is not prefix-encoded data)
        let mut filter_handle = BlockHandle::default();
        if let Some(mut filter) = self.filter_block.take() {
            filter_handle = self.write_raw_block(filter.finish(), CompressionType::None)?;
        }

        // Meta-index block: one entry per meta block; only the filter for now
        let mut meta_index_block = BlockBuilder::new(
            self.options.block_restart_interval,
            self.options.comparator.clone(),
        );
        if let Some(policy) = &self.options.filter_policy {
            let mut key = b"filter.".to_vec();
            key.extend_from_slice(policy.name().as_bytes());
            let mut handle_encoding = Vec::new();
            filter_handle.encode_to(&mut handle_encoding);
            meta_index_block.add(&key, &handle_encoding);
        }
        let metaindex_handle = self.write_block(&mut meta_index_block)?;

        // Index block, including the deferred entry for the final data block
        if self.pending_index_entry {
            self.options.comparator.find_short_successor(&mut self.last_key);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&self.last_key, &handle_encoding);
            self.pending_index_entry = false;
        }
        let mut index_block = mem::replace(
            &mut self.index_block,
            BlockBuilder::new(1, self.options.comparator.clone()),
        );
        let result = self.write_block(&mut index_block);
        self.index_block = index_block;
        let index_handle = result?;

        // Footer
        let footer = Footer {
            metaindex_handle,
            index_handle,
        };
        let mut footer_encoding = Vec::new();
        footer.encode_to(&mut footer_encoding);
        let append_result = self.file.append(&footer_encoding);
        self.latch(append_result)?;
        self.offset += footer_encoding.len() as u64;

        info!(
            entries = self.num_entries,
            file_size = self.offset,
            "finished building table"
        );
        Ok(())
    }

    /// Closes the builder without further writes. The file is left in
    /// whatever partial state it holds; deleting it is the caller's job.
    pub fn abandon(&mut self) {
        assert!(!self.closed, "abandon after finish or abandon");
        self.closed = true;
    }

    /// Replaces the build options mid-build. The comparator cannot change;
    /// the index block keeps its one-entry restart interval regardless.
    pub fn change_options(&mut self, options: TableOptions) -> Result<()> {
        if options.comparator.name() != self.options.comparator.name() {
            return Err(Error::invalid_argument(
                "changing comparator while building table",
            ));
        }
        self.options = options;
        Ok(())
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Committed file size so far; after `finish`, the final file size.
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// The latched error, if any write has failed.
    pub fn status(&self) -> Result<()> {
        self.check_ok()
    }

    /// Returns the output file. Meaningful once the builder is closed.
    pub fn into_inner(self) -> W {
        self.file
    }

    /// Finishes `block`, compresses it when that pays for itself, writes it
    /// out and resets the block for reuse.
    fn write_block(&mut self, block: &mut BlockBuilder) -> Result<BlockHandle> {
        let mut compressed = mem::take(&mut self.compressed_output);
        let raw = block.finish();
        let mut block_type = self.options.compression;

        let use_compressed = match block_type {
            CompressionType::None => false,
            CompressionType::Snappy => {
                // Store the compressed form only when it saves at least
                // 12.5%; a failing compressor downgrades silently.
                if compress_into(raw, &mut compressed)
                    && compressed.len() < raw.len() - raw.len() / 8
                {
                    true
                } else {
                    block_type = CompressionType::None;
                    false
                }
            }
        };

        let contents: &[u8] = if use_compressed { &compressed } else { raw };
        let result = self.write_raw_block(contents, block_type);
        compressed.clear();
        self.compressed_output = compressed;
        block.reset();
        result
    }

    /// Appends `contents` plus its 5-byte trailer, returning the handle of
    /// the written block. The file offset advances only on success.
    fn write_raw_block(
        &mut self,
        contents: &[u8],
        block_type: CompressionType,
    ) -> Result<BlockHandle> {
        let handle = BlockHandle::new(self.offset, contents.len() as u64);
        self.latch_append(contents)?;

        let mut trailer = Vec::with_capacity(BLOCK_TRAILER_SIZE);
        trailer.push(block_type as u8);
        put_fixed32(
            &mut trailer,
            mask_crc(block_checksum(contents, block_type as u8)),
        );
        self.latch_append(&trailer)?;

        self.offset += (contents.len() + BLOCK_TRAILER_SIZE) as u64;
        Ok(handle)
    }

    fn latch_append(&mut self, data: &[u8]) -> Result<()> {
        let result = self.file.append(data);
        self.latch(result)
    }

    fn latch(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            if self.error.is_none() {
                self.error = Some(err.clone());
            }
        }
        result
    }

    fn check_ok(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tansu_core::BytewiseComparator;

    /// Sink that starts failing after a fixed number of appends.
    struct FlakyFile {
        data: Vec<u8>,
        appends_left: usize,
    }

    impl WritableFile for FlakyFile {
        fn append(&mut self, data: &[u8]) -> Result<()> {
            if self.appends_left == 0 {
                return Err(Error::Io {
                    message: "disk full".to_string(),
                });
            }
            self.appends_left -= 1;
            self.data.extend_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn sync(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn options_plain() -> TableOptions {
        TableOptions {
            compression: CompressionType::None,
            ..Default::default()
        }
    }

    #[test]
    fn test_error_is_latched_and_offset_frozen() {
        let file = FlakyFile {
            data: Vec::new(),
            appends_left: 0,
        };
        let mut builder = TableBuilder::new(options_plain(), file);
        builder.add(b"a", b"1").unwrap();
        let err = builder.flush().unwrap_err();
        assert!(matches!(&err, Error::Io { .. }));
        assert_eq!(builder.file_size(), 0);

        // Every later mutating call reports the same latched error
        assert_eq!(builder.add(b"b", b"2").unwrap_err(), err);
        assert_eq!(builder.status().unwrap_err(), err);
        assert_eq!(builder.finish().unwrap_err(), err);
        assert_eq!(builder.file_size(), 0);
    }

    #[test]
    fn test_partial_append_failure_keeps_committed_offset() {
        // First append (block contents) succeeds, trailer append fails
        let file = FlakyFile {
            data: Vec::new(),
            appends_left: 1,
        };
        let mut builder = TableBuilder::new(options_plain(), file);
        builder.add(b"a", b"1").unwrap();
        assert!(builder.flush().is_err());
        // Offset tracks committed whole blocks only
        assert_eq!(builder.file_size(), 0);
    }

    #[test]
    fn test_change_options_rejects_comparator_swap() {
        #[derive(Debug)]
        struct ReversedComparator;
        impl tansu_core::Comparator for ReversedComparator {
            fn name(&self) -> &'static str {
                "test.ReversedComparator"
            }
            fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
                b.cmp(a)
            }
            fn find_shortest_separator(&self, _start: &mut Vec<u8>, _limit: &[u8]) {}
            fn find_short_successor(&self, _key: &mut Vec<u8>) {}
        }

        let mut builder = TableBuilder::new(options_plain(), Vec::new());
        let swapped = TableOptions {
            comparator: Arc::new(ReversedComparator),
            ..options_plain()
        };
        assert!(matches!(
            builder.change_options(swapped),
            Err(Error::InvalidArgument { .. })
        ));

        // Same comparator, different block size: accepted
        let resized = TableOptions {
            comparator: Arc::new(BytewiseComparator),
            block_size: 1024,
            ..options_plain()
        };
        builder.change_options(resized).unwrap();
        builder.abandon();
    }

    #[test]
    fn test_abandon_stops_io() {
        let mut builder = TableBuilder::new(options_plain(), Vec::new());
        builder.add(b"a", b"1").unwrap();
        builder.abandon();
        let file = builder.into_inner();
        assert!(file.is_empty());
    }

    #[test]
    #[should_panic(expected = "after finish or abandon")]
    fn test_finish_twice_panics() {
        let mut builder = TableBuilder::new(options_plain(), Vec::new());
        builder.finish().unwrap();
        let _ = builder.finish();
    }
}
