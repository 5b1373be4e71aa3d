//! On-disk format types: block handles, the footer, and trailer checksums.

use crc::{Crc, CRC_32_ISCSI};

use tansu_core::coding::{
    decode_fixed64, get_varint64, put_fixed64, put_varint64, MAX_VARINT64_LEN,
};
use tansu_core::error::{Error, Result};

/// 1-byte compression type + 4-byte masked checksum after every block.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Longest encoding of a block handle: two full varint64s.
pub const MAX_ENCODED_HANDLE_LEN: usize = 2 * MAX_VARINT64_LEN;

/// Fixed footer size: two padded handles plus the magic number.
pub const FOOTER_SIZE: usize = 2 * MAX_ENCODED_HANDLE_LEN + 8;

/// Trailing magic number identifying a table file.
pub const TABLE_MAGIC: u64 = 0xdb4775248b80fb57;

const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const CRC_MASK_DELTA: u32 = 0xa282ead8;

/// Masks a CRC so checksums of data containing embedded CRCs do not collide
/// with checksums taken at other layers.
pub fn mask_crc(crc: u32) -> u32 {
    (crc >> 15 | crc << 17).wrapping_add(CRC_MASK_DELTA)
}

pub fn unmask_crc(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(CRC_MASK_DELTA);
    rot >> 17 | rot << 15
}

/// CRC32C over `contents || [block_type]`, unmasked.
pub fn block_checksum(contents: &[u8], block_type: u8) -> u32 {
    let mut digest = CRC32C.digest();
    digest.update(contents);
    digest.update(&[block_type]);
    digest.finalize()
}

/// Locates a block in the file: byte offset and length, excluding the
/// trailer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        put_varint64(dst, self.offset);
        put_varint64(dst, self.size);
    }

    /// Decodes a handle, returning it and the number of bytes consumed.
    pub fn decode_from(src: &[u8]) -> Result<(Self, usize)> {
        let (offset, n) = get_varint64(src)?;
        let (size, m) = get_varint64(&src[n..])?;
        Ok((Self { offset, size }, n + m))
    }
}

/// Fixed-size trailer at the very end of the file pointing at the meta-index
/// and index blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        let start = dst.len();
        self.metaindex_handle.encode_to(dst);
        self.index_handle.encode_to(dst);
        dst.resize(start + 2 * MAX_ENCODED_HANDLE_LEN, 0);
        put_fixed64(dst, TABLE_MAGIC);
        debug_assert_eq!(dst.len() - start, FOOTER_SIZE);
    }

    pub fn decode_from(src: &[u8]) -> Result<Self> {
        if src.len() < FOOTER_SIZE {
            return Err(Error::corruption("footer too short"));
        }
        let magic = decode_fixed64(&src[FOOTER_SIZE - 8..FOOTER_SIZE]);
        if magic != TABLE_MAGIC {
            return Err(Error::corruption("bad table magic number"));
        }
        let (metaindex_handle, n) = BlockHandle::decode_from(src)?;
        let (index_handle, _) = BlockHandle::decode_from(&src[n..])?;
        Ok(Self {
            metaindex_handle,
            index_handle,
        })
    }
}
