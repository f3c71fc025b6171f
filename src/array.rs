//! Typed N-dimensional cutout buffers

use crate::error::{BossError, Result};
use crate::types::DataType;
use ndarray::{ArrayD, IxDyn};
use std::fmt;

/// Primitive element types a channel can hold
pub trait Element:
    Copy
    + Default
    + PartialEq
    + fmt::Debug
    + Send
    + Sync
    + npyz::Deserialize
    + npyz::AutoSerialize
    + 'static
{
    const DATA_TYPE: DataType;

    /// Decode one little-endian element; `bytes` has exactly the element width
    fn from_le_slice(bytes: &[u8]) -> Self;

    fn extend_le(self, out: &mut Vec<u8>);

    fn wrap(array: ArrayD<Self>) -> DecodedArray;

    fn unwrap_ref(array: &DecodedArray) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, $dtype:expr) => {
        impl Element for $t {
            const DATA_TYPE: DataType = $dtype;

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn extend_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn wrap(array: ArrayD<Self>) -> DecodedArray {
                DecodedArray::$variant(array)
            }

            fn unwrap_ref(array: &DecodedArray) -> Option<&ArrayD<Self>> {
                match array {
                    DecodedArray::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(u8, Uint8, DataType::Uint8);
impl_element!(u16, Uint16, DataType::Uint16);
impl_element!(u32, Uint32, DataType::Uint32);
impl_element!(u64, Uint64, DataType::Uint64);
impl_element!(i8, Int8, DataType::Int8);
impl_element!(i16, Int16, DataType::Int16);
impl_element!(i32, Int32, DataType::Int32);
impl_element!(i64, Int64, DataType::Int64);
impl_element!(f32, Float32, DataType::Float32);
impl_element!(f64, Float64, DataType::Float64);

/// Run `$body` with `$T` bound to the element type matching `$dtype`
macro_rules! with_element_type {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::types::DataType::Uint8 => {
                type $T = u8;
                $body
            }
            $crate::types::DataType::Uint16 => {
                type $T = u16;
                $body
            }
            $crate::types::DataType::Uint32 => {
                type $T = u32;
                $body
            }
            $crate::types::DataType::Uint64 => {
                type $T = u64;
                $body
            }
            $crate::types::DataType::Int8 => {
                type $T = i8;
                $body
            }
            $crate::types::DataType::Int16 => {
                type $T = i16;
                $body
            }
            $crate::types::DataType::Int32 => {
                type $T = i32;
                $body
            }
            $crate::types::DataType::Int64 => {
                type $T = i64;
                $body
            }
            $crate::types::DataType::Float32 => {
                type $T = f32;
                $body
            }
            $crate::types::DataType::Float64 => {
                type $T = f64;
                $body
            }
        }
    };
}
pub(crate) use with_element_type;

/// Decoded cutout with axis order `(t?, z, y, x)`, row-major
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedArray {
    Uint8(ArrayD<u8>),
    Uint16(ArrayD<u16>),
    Uint32(ArrayD<u32>),
    Uint64(ArrayD<u64>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

macro_rules! each_variant {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            DecodedArray::Uint8($inner) => $body,
            DecodedArray::Uint16($inner) => $body,
            DecodedArray::Uint32($inner) => $body,
            DecodedArray::Uint64($inner) => $body,
            DecodedArray::Int8($inner) => $body,
            DecodedArray::Int16($inner) => $body,
            DecodedArray::Int32($inner) => $body,
            DecodedArray::Int64($inner) => $body,
            DecodedArray::Float32($inner) => $body,
            DecodedArray::Float64($inner) => $body,
        }
    };
}

impl DecodedArray {
    /// Reshape a flat buffer into `shape`, failing if the element count disagrees
    pub fn from_flat<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(BossError::ShapeMismatch(format!(
                "payload holds {} elements but extents {:?} need {}",
                data.len(),
                shape,
                expected
            )));
        }
        let array = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| BossError::ShapeMismatch(e.to_string()))?;
        Ok(T::wrap(array))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            DecodedArray::Uint8(_) => DataType::Uint8,
            DecodedArray::Uint16(_) => DataType::Uint16,
            DecodedArray::Uint32(_) => DataType::Uint32,
            DecodedArray::Uint64(_) => DataType::Uint64,
            DecodedArray::Int8(_) => DataType::Int8,
            DecodedArray::Int16(_) => DataType::Int16,
            DecodedArray::Int32(_) => DataType::Int32,
            DecodedArray::Int64(_) => DataType::Int64,
            DecodedArray::Float32(_) => DataType::Float32,
            DecodedArray::Float64(_) => DataType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        each_variant!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view, if the array holds `T`
    pub fn as_array<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::unwrap_ref(self)
    }

    /// Flatten row-major into little-endian bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.data_type().size_in_bytes());
        each_variant!(self, a => {
            for value in a.iter() {
                value.extend_le(&mut out);
            }
        });
        out
    }
}

/// Reinterpret little-endian bytes as `T`; the length must be a multiple of the element width
pub fn bytes_to_elements<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    let width = T::DATA_TYPE.size_in_bytes();
    if bytes.len() % width != 0 {
        return Err(BossError::PayloadCorrupt(format!(
            "{} bytes is not a whole number of {} elements",
            bytes.len(),
            T::DATA_TYPE
        )));
    }
    Ok(bytes.chunks_exact(width).map(T::from_le_slice).collect())
}
