//! Body compression and checksums.
//!
//! Compressed archives store the body as one zlib stream; the header flag
//! says whether it is compressed, so no size prefix is needed.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};

use crate::util::{Error, Result};

/// Compress data using zlib.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib body of at most `limit` bytes.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data).take((limit as u64).saturating_add(1));
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).min(limit));
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::invalid(format!("corrupt compressed body: {e}")))?;
    if out.len() > limit {
        return Err(Error::invalid(format!("compressed body expands past {limit} bytes")));
    }
    Ok(out)
}

/// CRC-32 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
