//! Table building configuration.

use std::fmt;
use std::sync::Arc;

use tansu_core::{BytewiseComparator, Comparator, FilterPolicy};

use super::compression::CompressionType;

pub const DEFAULT_BLOCK_SIZE: usize = 4096;
pub const DEFAULT_BLOCK_RESTART_INTERVAL: usize = 16;

/// Options controlling table construction.
#[derive(Clone)]
pub struct TableOptions {
    /// Key ordering. Must not change while a table is being built.
    pub comparator: Arc<dyn Comparator>,
    /// Uncompressed size threshold at which a data block is flushed.
    pub block_size: usize,
    /// Number of delta-compressed entries between restart points.
    pub block_restart_interval: usize,
    pub compression: CompressionType,
    /// When set, a filter block is built and referenced from the meta-index.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            comparator: Arc::new(BytewiseComparator),
            block_size: DEFAULT_BLOCK_SIZE,
            block_restart_interval: DEFAULT_BLOCK_RESTART_INTERVAL,
            compression: CompressionType::Snappy,
            filter_policy: None,
        }
    }
}

impl fmt::Debug for TableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableOptions")
            .field("comparator", &self.comparator.name())
            .field("block_size", &self.block_size)
            .field("block_restart_interval", &self.block_restart_interval)
            .field("compression", &self.compression)
            .field(
                "filter_policy",
                &self.filter_policy.as_ref().map(|p| p.name()),
            )
            .finish()
    }
}
