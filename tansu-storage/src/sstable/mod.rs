//! Sorted tables are immutable, ordered files built once and never modified.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Table File Structure                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [data block 1][trailer]                                    │
//! │  [data block 2][trailer]                                    │
//! │  ...                                                        │
//! │  [data block n][trailer]                                    │
//! │  [filter block][trailer]        (optional)                  │
//! │  [meta-index block][trailer]                                │
//! │  [index block][trailer]                                     │
//! │  [footer]                       (fixed 48 bytes)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each trailer is one compression-type byte plus a masked CRC32C of the
//! block contents and that byte. Data blocks hold prefix-compressed entries
//! with a restart array; the index block maps short separator keys to data
//! block handles; the meta-index maps `"filter.<policy>"` to the filter
//! block, which holds one Bloom filter per 2 KiB window of the file.

mod block;
mod bloom;
mod builder;
mod compression;
mod filter;
mod format;
mod types;
mod writer;

pub use block::BlockBuilder;
pub use bloom::BloomFilterPolicy;
pub use builder::TableBuilder;
pub use compression::{compress_into, decompress_block, CompressionType};
pub use filter::{FilterBlockBuilder, FILTER_BASE_LG};
pub use format::{
    mask_crc, unmask_crc, BlockHandle, Footer, BLOCK_TRAILER_SIZE, FOOTER_SIZE, TABLE_MAGIC,
};
pub use types::{TableOptions, DEFAULT_BLOCK_RESTART_INTERVAL, DEFAULT_BLOCK_SIZE};
pub use writer::FileWriter;
