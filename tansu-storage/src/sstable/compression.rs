use tansu_core::error::{Error, Result};

/// Block compression scheme, stored as the first trailer byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
}

impl TryFrom<u8> for CompressionType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Snappy),
            _ => Err(Error::corruption(format!(
                "invalid compression type: {value}"
            ))),
        }
    }
}

/// Snappy-compresses `data` into `dst`, reusing its allocation. Returns
/// false when the compressor fails; callers store the raw bytes instead.
pub fn compress_into(data: &[u8], dst: &mut Vec<u8>) -> bool {
    dst.resize(snap::raw::max_compress_len(data.len()), 0);
    match snap::raw::Encoder::new().compress(data, dst) {
        Ok(written) => {
            dst.truncate(written);
            true
        }
        Err(_) => {
            dst.clear();
            false
        }
    }
}

pub fn decompress_block(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| Error::corruption(format!("snappy decompression failed: {e}"))),
    }
}
