//! # TansuDB Core
//!
//! This crate provides the fundamental building blocks for TansuDB:
//! - Error types and the crate-wide `Result` alias
//! - Collaborator traits (comparator, filter policy, writable file)
//! - Byte-coding utilities (varints, fixed-width integers)
//! - The built-in bytewise comparator

pub mod coding;
pub mod comparator;
pub mod error;
pub mod traits;

// Re-export commonly used types
pub use comparator::BytewiseComparator;
pub use error::{Error, Result};
pub use traits::{Comparator, FilterPolicy, WritableFile};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
