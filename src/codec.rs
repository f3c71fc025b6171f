//! Decoding of client-submitted cutout payloads
//!
//! Three wire encodings share one pipeline and differ only in how the
//! payload is decompressed:
//!
//! | media type                 | outer layer | inner bytes                 |
//! |----------------------------|-------------|-----------------------------|
//! | `application/blosc`        | block codec | flat little-endian elements |
//! | `application/blosc-python` | block codec | `.npy` array                |
//! | `application/npygz`        | zlib        | `.npy` array                |
//!
//! Every path checks the implied uncompressed size before reading the body,
//! stops reading once the body outgrows the worst-case compressed form of
//! that size, bounds decompression by it, and reshapes the result to the
//! request's `(t?, z, y, x)` extents.

use crate::array::{bytes_to_elements, with_element_type, DecodedArray, Element};
use crate::compression::{get_compressor, CompressionLevel, CompressionMethod};
use crate::config::BossConfig;
use crate::error::{BossError, Result};
use crate::request::CutoutRequest;
use crate::utils::{drain, format_bytes};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use npyz::WriterBuilder;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// Room allowed for an `.npy` header on top of the element bytes
const NPY_HEADER_ALLOWANCE: usize = 64 * 1024;

/// Wire encoding of a cutout payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Block-compressed flat array in the channel's element type
    RawArray,
    /// Block-compressed self-describing array
    SelfDescribingBlock,
    /// Deflate-compressed self-describing array
    SelfDescribingDeflate,
}

impl Encoding {
    pub fn from_media_type(media_type: &str) -> Result<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim();
        match essence {
            "application/blosc" => Ok(Encoding::RawArray),
            "application/blosc-python" => Ok(Encoding::SelfDescribingBlock),
            "application/npygz" => Ok(Encoding::SelfDescribingDeflate),
            other => Err(BossError::InvalidArgument(format!(
                "Unsupported media type: {}",
                other
            ))),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Encoding::RawArray => "application/blosc",
            Encoding::SelfDescribingBlock => "application/blosc-python",
            Encoding::SelfDescribingDeflate => "application/npygz",
        }
    }

    pub fn compression(&self) -> CompressionMethod {
        match self {
            Encoding::RawArray | Encoding::SelfDescribingBlock => CompressionMethod::Block,
            Encoding::SelfDescribingDeflate => CompressionMethod::Deflate,
        }
    }

    pub fn is_self_describing(&self) -> bool {
        !matches!(self, Encoding::RawArray)
    }
}

/// A decoded payload together with the request it was validated against
#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    pub request: CutoutRequest,
    pub data: DecodedArray,
}

/// Size-checks, decompresses and reshapes cutout payloads
#[derive(Debug, Clone)]
pub struct CutoutCodec {
    config: Arc<BossConfig>,
}

impl CutoutCodec {
    pub fn new(config: Arc<BossConfig>) -> Self {
        Self { config }
    }

    /// Reject requests whose uncompressed volume exceeds the configured ceiling.
    ///
    /// 64-bit channels are measured at a fraction of their size since label
    /// volumes compress far better than imagery.
    pub fn check_size(&self, request: &CutoutRequest) -> Result<()> {
        let datatype = request.resource.datatype;
        let mut total = request.uncompressed_bytes();
        if datatype.bit_depth() == 64 {
            total /= self.config.wide_type_divisor;
        }
        if total > self.config.cutout_max_size {
            log::warn!(
                "rejecting {} cutout of {} for {}",
                datatype,
                format_bytes(request.uncompressed_bytes() as usize),
                request.resource.boss_key
            );
            return Err(BossError::RequestTooLarge {
                size: format_bytes(request.uncompressed_bytes() as usize),
                limit: format_bytes(self.config.cutout_max_size as usize),
            });
        }
        Ok(())
    }

    /// Decode a payload read from `body`.
    ///
    /// On any failure the remainder of `body` is drained before returning.
    pub fn decode<R: Read + ?Sized>(
        &self,
        request: CutoutRequest,
        encoding: Encoding,
        body: &mut R,
    ) -> Result<Cutout> {
        let result = self.check_size(&request).and_then(|_| {
            let bound = self.max_body_len(&request, encoding);
            let mut payload = Vec::new();
            (&mut *body).take(bound as u64 + 1).read_to_end(&mut payload)?;
            self.decode_bytes(request, encoding, &payload)
        });
        if result.is_err() {
            drain(body);
        }
        result
    }

    /// Longest body that could hold a valid payload for `request`
    pub fn max_body_len(&self, request: &CutoutRequest, encoding: Encoding) -> usize {
        get_compressor(encoding.compression())
            .max_compressed_len(decompressed_limit(request, encoding))
    }

    /// Decode an already-buffered payload
    pub fn decode_bytes(
        &self,
        request: CutoutRequest,
        encoding: Encoding,
        payload: &[u8],
    ) -> Result<Cutout> {
        self.check_size(&request)?;
        check_body_len(payload.len(), self.max_body_len(&request, encoding))?;

        let shape = request.shape();
        let limit = decompressed_limit(&request, encoding);
        let decompressed = get_compressor(encoding.compression()).decompress(payload, limit)?;
        log::debug!(
            "decompressed {} payload {} -> {} for {}",
            encoding.media_type(),
            format_bytes(payload.len()),
            format_bytes(decompressed.len()),
            request.resource.boss_key
        );

        let data = with_element_type!(request.resource.datatype, T => {
            if encoding.is_self_describing() {
                parse_npy::<T>(&decompressed, &shape)?
            } else {
                DecodedArray::from_flat(&shape, bytes_to_elements::<T>(&decompressed)?)?
            }
        });

        Ok(Cutout { request, data })
    }

    /// Inverse of [`CutoutCodec::decode_bytes`]: flatten row-major and compress
    pub fn encode(&self, array: &DecodedArray, encoding: Encoding) -> Result<Vec<u8>> {
        let inner = if encoding.is_self_describing() {
            with_element_type!(array.data_type(), T => {
                let typed = array.as_array::<T>().ok_or_else(|| {
                    BossError::UnhandledInternal("array type changed during encode".to_string())
                })?;
                write_npy(typed)?
            })
        } else {
            array.to_le_bytes()
        };
        get_compressor(encoding.compression()).compress(&inner, CompressionLevel::default())
    }
}

fn decompressed_limit(request: &CutoutRequest, encoding: Encoding) -> usize {
    let element_bytes = request.uncompressed_bytes() as usize;
    if encoding.is_self_describing() {
        element_bytes.saturating_add(NPY_HEADER_ALLOWANCE)
    } else {
        element_bytes
    }
}

/// Fail once a body has outgrown anything the request extents could compress to
fn check_body_len(len: usize, bound: usize) -> Result<()> {
    if len > bound {
        return Err(BossError::ShapeMismatch(format!(
            "payload is longer than the {} the request extents allow",
            format_bytes(bound)
        )));
    }
    Ok(())
}

/// Parse a `.npy` buffer as `T` and reshape it to `shape`.
///
/// The channel's datatype is authoritative: an array whose embedded dtype
/// cannot be read as `T` is reported as corrupt. Fortran-ordered arrays are
/// transposed into row-major order first.
fn parse_npy<T: Element>(bytes: &[u8], shape: &[usize]) -> Result<DecodedArray> {
    let npy = npyz::NpyFile::new(bytes).map_err(|e| BossError::PayloadCorrupt(e.to_string()))?;
    let embedded: Vec<usize> = npy.shape().iter().map(|&d| d as usize).collect();
    let order = npy.order();
    let data: Vec<T> = npy
        .into_vec::<T>()
        .map_err(|e| BossError::PayloadCorrupt(format!("{} (expected {})", e, T::DATA_TYPE)))?;

    let data = match order {
        npyz::Order::C => data,
        npyz::Order::Fortran => {
            let array = ArrayD::from_shape_vec(IxDyn(&embedded).f(), data)
                .map_err(|e| BossError::ShapeMismatch(e.to_string()))?;
            array.iter().copied().collect()
        }
    };
    DecodedArray::from_flat(shape, data)
}

fn write_npy<T: Element>(array: &ArrayD<T>) -> Result<Vec<u8>> {
    let shape: Vec<u64> = array.shape().iter().map(|&d| d as u64).collect();
    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = npyz::WriteOptions::<T>::new()
            .default_dtype()
            .shape(&shape)
            .writer(&mut out)
            .begin_nd()?;
        for value in array.iter() {
            writer.push(value)?;
        }
        writer.finish()?;
    }
    Ok(out.into_inner())
}
