//! Bump allocator backing the skip list.
//!
//! Allocations are handed out as raw pointers into arena-owned chunks and
//! are never freed individually; everything is released when the arena is
//! dropped. Readers of arena-backed structures never touch the allocator,
//! so only the (single) writer ever takes the internal lock.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::trace;

/// Default chunk size for arena allocations.
const CHUNK_SIZE: usize = 4096;

/// Alignment used by `allocate_aligned`; also the alignment of every chunk.
const ALIGN: usize = if std::mem::size_of::<usize>() > 8 {
    std::mem::size_of::<usize>()
} else {
    8
};

struct Chunk {
    ptr: *mut u8,
    layout: Layout,
}

struct ArenaCore {
    /// Cursor into the current chunk.
    alloc_ptr: *mut u8,
    /// Bytes left in the current chunk.
    remaining: usize,
    /// Every chunk ever allocated, released on drop.
    chunks: Vec<Chunk>,
}

/// Region allocator whose allocations share the arena's lifetime.
///
/// Pointers returned by [`Arena::allocate`] and [`Arena::allocate_aligned`]
/// stay valid until the arena is dropped. The caller is responsible for not
/// outliving the arena; the skip list does this by holding the arena in an
/// `Arc`.
pub struct Arena {
    core: Mutex<ArenaCore>,
    usage: AtomicUsize,
}

// The raw chunk pointers are owned exclusively by the arena and only
// mutated under the core mutex.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new() -> Self {
        Self {
            core: Mutex::new(ArenaCore {
                alloc_ptr: std::ptr::null_mut(),
                remaining: 0,
                chunks: Vec::new(),
            }),
            usage: AtomicUsize::new(0),
        }
    }

    /// Returns a pointer to `bytes` bytes of uninitialized memory.
    /// Alignment is unspecified.
    pub fn allocate(&self, bytes: usize) -> *mut u8 {
        assert!(bytes > 0);
        let mut core = self.core.lock();
        if bytes <= core.remaining {
            let result = core.alloc_ptr;
            // Cursor stays inside the chunk allocation, so `add` is in bounds.
            core.alloc_ptr = unsafe { core.alloc_ptr.add(bytes) };
            core.remaining -= bytes;
            return result;
        }
        self.allocate_fallback(&mut core, bytes)
    }

    /// As [`Arena::allocate`], but the returned pointer is aligned to
    /// `max(pointer_size, 8)`.
    pub fn allocate_aligned(&self, bytes: usize) -> *mut u8 {
        assert!(bytes > 0);
        let mut core = self.core.lock();
        let current_mod = core.alloc_ptr as usize & (ALIGN - 1);
        let slop = if current_mod == 0 {
            0
        } else {
            ALIGN - current_mod
        };
        let needed = bytes + slop;
        let result = if needed <= core.remaining {
            let result = unsafe { core.alloc_ptr.add(slop) };
            core.alloc_ptr = unsafe { core.alloc_ptr.add(needed) };
            core.remaining -= needed;
            result
        } else {
            // Fresh chunks are always ALIGN-aligned.
            self.allocate_fallback(&mut core, bytes)
        };
        debug_assert_eq!(result as usize & (ALIGN - 1), 0);
        result
    }

    /// Approximate total memory footprint. Monotonically non-decreasing and
    /// readable without synchronization; consumers needing exact accounting
    /// must synchronize with the writer themselves.
    pub fn memory_usage(&self) -> usize {
        self.usage.load(Ordering::Relaxed)
    }

    fn allocate_fallback(&self, core: &mut ArenaCore, bytes: usize) -> *mut u8 {
        if bytes > CHUNK_SIZE / 4 {
            // More than a quarter of a chunk: give it a dedicated chunk so
            // the current one keeps serving small requests.
            return self.new_chunk(core, bytes);
        }

        // Whatever is left of the current chunk is abandoned.
        let ptr = self.new_chunk(core, CHUNK_SIZE);
        core.alloc_ptr = unsafe { ptr.add(bytes) };
        core.remaining = CHUNK_SIZE - bytes;
        ptr
    }

    fn new_chunk(&self, core: &mut ArenaCore, size: usize) -> *mut u8 {
        let layout = Layout::from_size_align(size, ALIGN).expect("arena chunk layout");
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }
        core.chunks.push(Chunk { ptr, layout });
        self.usage.fetch_add(
            size + std::mem::size_of::<Chunk>(),
            Ordering::Relaxed,
        );
        trace!(size, total = self.usage.load(Ordering::Relaxed), "arena chunk allocated");
        ptr
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        for chunk in &core.chunks {
            unsafe { dealloc(chunk.ptr, chunk.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_arena_has_no_usage() {
        let arena = Arena::new();
        assert_eq!(arena.memory_usage(), 0);
    }

    #[test]
    fn test_allocations_are_writable_and_distinct() {
        let arena = Arena::new();
        let sizes = [1usize, 7, 16, 100, 1000, 5000];
        let mut regions = Vec::new();
        for (i, &size) in sizes.iter().enumerate() {
            let ptr = arena.allocate(size);
            unsafe {
                std::ptr::write_bytes(ptr, i as u8, size);
            }
            regions.push((ptr, size, i as u8));
        }
        // Earlier writes must survive later allocations
        for (ptr, size, fill) in regions {
            let slice = unsafe { std::slice::from_raw_parts(ptr, size) };
            assert!(slice.iter().all(|&b| b == fill));
        }
    }

    #[test]
    fn test_small_allocations_are_contiguous() {
        let arena = Arena::new();
        let a = arena.allocate(100);
        let b = arena.allocate(20);
        assert_eq!(unsafe { a.add(100) }, b);
    }

    #[test]
    fn test_large_allocation_keeps_current_chunk() {
        let arena = Arena::new();
        let a = arena.allocate(100);
        // Over a quarter of the chunk size: served from a dedicated chunk
        let big = arena.allocate(2000);
        let c = arena.allocate(20);
        assert_eq!(unsafe { a.add(100) }, c);
        assert_ne!(unsafe { a.add(100) }, big);
    }

    #[test]
    fn test_aligned_allocations() {
        let arena = Arena::new();
        arena.allocate(1); // skew the cursor
        for &size in &[1usize, 3, 8, 31, 4096] {
            let ptr = arena.allocate_aligned(size);
            assert_eq!(ptr as usize % ALIGN, 0);
            unsafe { std::ptr::write_bytes(ptr, 0xab, size) };
        }
    }

    #[test]
    fn test_memory_usage_is_monotonic() {
        let arena = Arena::new();
        let mut last = 0;
        for i in 1..200 {
            arena.allocate(i * 13 % 1500 + 1);
            let usage = arena.memory_usage();
            assert!(usage >= last);
            last = usage;
        }
        assert!(last >= 199);
    }
}
