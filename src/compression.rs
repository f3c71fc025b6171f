//! Outer compression layers of cutout payloads

use crate::error::{BossError, Result};
use crate::utils::format_bytes;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression as FlateCompression;
use std::io::Read;

/// Compression methods a payload can arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    /// Blosc1 frames
    Block = 1,
    /// zlib-wrapped deflate stream
    Deflate = 2,
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Trait for compression/decompression operations
pub trait Compressor: Send + Sync {
    /// Compress data
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress at most `limit` bytes.
    ///
    /// Output longer than `limit` is rejected without being buffered, so a
    /// small hostile payload cannot expand past what the request declared.
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>>;

    /// Largest compressed form any encoder can produce for `uncompressed` bytes
    fn max_compressed_len(&self, uncompressed: usize) -> usize;
}

fn reserve(limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(limit).map_err(|e| {
        BossError::OutOfMemory(format!("reserving {}: {}", format_bytes(limit), e))
    })?;
    Ok(out)
}

fn too_large(limit: usize) -> BossError {
    BossError::ShapeMismatch(format!(
        "payload decompresses to more than the {} the request extents allow",
        format_bytes(limit)
    ))
}

fn read_bounded<R: Read>(reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut out = reserve(limit)?;
    let mut limited = reader.take(limit as u64 + 1);
    limited
        .read_to_end(&mut out)
        .map_err(|e| BossError::PayloadCorrupt(e.to_string()))?;

    if out.len() > limit {
        return Err(too_large(limit));
    }
    Ok(out)
}

/// Header bytes a Blosc1 frame adds on top of its contents
const BLOSC_MAX_OVERHEAD: usize = 16;
/// Largest buffer a Blosc1 frame can describe
const BLOSC_MAX_BUFFERSIZE: usize = i32::MAX as usize - BLOSC_MAX_OVERHEAD;
const BLOSC_SHUFFLE: i32 = 1;
const BLOSCLZ: &[u8] = b"blosclz\0";

/// Blosc1 frames, as written by `blosc.compress` and c-blosc
#[derive(Debug, Default)]
pub struct BlockCompressor;

impl BlockCompressor {
    /// Uncompressed size recorded in the frame header, if the frame is well formed
    fn frame_len(data: &[u8]) -> Option<usize> {
        let mut nbytes = 0usize;
        // SAFETY: the pointer and length describe `data`; blosc only reads
        // the header and writes `nbytes`.
        let rc = unsafe {
            blosc_src::blosc_cbuffer_validate(data.as_ptr().cast(), data.len(), &mut nbytes)
        };
        (rc >= 0).then_some(nbytes)
    }
}

impl Compressor for BlockCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        if data.len() > BLOSC_MAX_BUFFERSIZE {
            return Err(BossError::InvalidArgument(format!(
                "{} is too large for a single blosc frame",
                format_bytes(data.len())
            )));
        }
        let capacity = self.max_compressed_len(data.len());
        let mut out = vec![0u8; capacity];
        // SAFETY: `out` is writable for `capacity` bytes and `data` readable
        // for its length. The context variant keeps no global state.
        let written = unsafe {
            blosc_src::blosc_compress_ctx(
                i32::from(level.value()),
                BLOSC_SHUFFLE,
                1,
                data.len(),
                data.as_ptr().cast(),
                out.as_mut_ptr().cast(),
                capacity,
                BLOSCLZ.as_ptr().cast(),
                0,
                1,
            )
        };
        if written <= 0 {
            return Err(BossError::UnhandledInternal(format!(
                "blosc compression failed with code {}",
                written
            )));
        }
        out.truncate(written as usize);
        Ok(out)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let nbytes = Self::frame_len(data)
            .ok_or_else(|| BossError::PayloadCorrupt("not a valid blosc frame".to_string()))?;
        if nbytes > limit {
            return Err(too_large(limit));
        }
        if nbytes == 0 {
            return Ok(Vec::new());
        }

        let mut out = reserve(nbytes)?;
        out.resize(nbytes, 0);
        // SAFETY: the frame was validated above and `out` is writable for
        // the `nbytes` its header declares.
        let read = unsafe {
            blosc_src::blosc_decompress_ctx(
                data.as_ptr().cast(),
                out.as_mut_ptr().cast(),
                nbytes,
                1,
            )
        };
        if read < 0 {
            return Err(BossError::PayloadCorrupt(format!(
                "blosc decompression failed with code {}",
                read
            )));
        }
        out.truncate(read as usize);
        Ok(out)
    }

    fn max_compressed_len(&self, uncompressed: usize) -> usize {
        uncompressed.saturating_add(BLOSC_MAX_OVERHEAD)
    }
}

/// zlib/deflate streams
#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(data, FlateCompression::new(level.value() as u32));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed)?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        read_bounded(ZlibDecoder::new(data), limit)
    }

    // zlib's compressBound plus the two-byte header and adler32 trailer
    fn max_compressed_len(&self, uncompressed: usize) -> usize {
        uncompressed
            .saturating_add(uncompressed >> 12)
            .saturating_add(uncompressed >> 14)
            .saturating_add(uncompressed >> 25)
            .saturating_add(13 + 6)
    }
}

/// Get a compressor for a given method
pub fn get_compressor(method: CompressionMethod) -> Box<dyn Compressor> {
    match method {
        CompressionMethod::Block => Box::new(BlockCompressor),
        CompressionMethod::Deflate => Box::new(DeflateCompressor),
    }
}
