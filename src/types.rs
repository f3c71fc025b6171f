//! Core data types shared across the crate

use crate::error::{BossError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Voxel datatypes a channel can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Unsigned 16-bit integer
    Uint16 = 2,
    /// Unsigned 32-bit integer
    Uint32 = 3,
    /// Unsigned 64-bit integer (annotation labels)
    Uint64 = 4,
    /// Signed 8-bit integer
    Int8 = 5,
    /// Signed 16-bit integer
    Int16 = 6,
    /// Signed 32-bit integer
    Int32 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// 32-bit floating point
    Float32 = 9,
    /// 64-bit floating point
    Float64 = 10,
}

impl DataType {
    /// Size in bytes of one element
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Uint64 | DataType::Int64 | DataType::Float64 => 8,
        }
    }

    pub fn bit_depth(&self) -> u32 {
        self.size_in_bytes() as u32 * 8
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        ) || self.is_float()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Uint64 => "uint64",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl FromStr for DataType {
    type Err = BossError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uint8" => Ok(DataType::Uint8),
            "uint16" => Ok(DataType::Uint16),
            "uint32" => Ok(DataType::Uint32),
            "uint64" => Ok(DataType::Uint64),
            "int8" => Ok(DataType::Int8),
            "int16" => Ok(DataType::Int16),
            "int32" => Ok(DataType::Int32),
            "int64" => Ok(DataType::Int64),
            "float32" => Ok(DataType::Float32),
            "float64" => Ok(DataType::Float64),
            other => Err(BossError::InvalidArgument(format!(
                "Unsupported data type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial and temporal axes of a cutout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    T,
}

impl Axis {
    pub const SPATIAL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::T => "time",
        };
        f.write_str(name)
    }
}

/// How an experiment's resolution hierarchy downsamples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyMethod {
    /// X/Y halve every level, Z only past the isotropic crossover
    #[default]
    Anisotropic,
    /// Every axis halves every level
    Isotropic,
}

impl FromStr for HierarchyMethod {
    type Err = BossError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "anisotropic" => Ok(HierarchyMethod::Anisotropic),
            "isotropic" => Ok(HierarchyMethod::Isotropic),
            other => Err(BossError::InvalidArgument(format!(
                "Unknown hierarchy method: {}",
                other
            ))),
        }
    }
}

/// Kind of data a channel holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Image,
    Annotation,
}

impl ChannelType {
    /// Annotation label volumes are static; only image channels carry time series
    pub fn supports_time_series(&self) -> bool {
        matches!(self, ChannelType::Image)
    }
}

impl FromStr for ChannelType {
    type Err = BossError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(ChannelType::Image),
            "annotation" => Ok(ChannelType::Annotation),
            other => Err(BossError::InvalidArgument(format!(
                "Unknown channel type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Image => f.write_str("image"),
            ChannelType::Annotation => f.write_str("annotation"),
        }
    }
}

/// Service a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Cutout,
    Image,
    Tile,
    Ids,
    Reserve,
    BoundingBox,
    Downsample,
}

impl ServiceKind {
    /// Services that only make sense on annotation channels
    pub fn requires_annotation(&self) -> bool {
        matches!(
            self,
            ServiceKind::Ids | ServiceKind::Reserve | ServiceKind::BoundingBox
        )
    }
}

impl FromStr for ServiceKind {
    type Err = BossError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cutout" => Ok(ServiceKind::Cutout),
            "image" => Ok(ServiceKind::Image),
            "tile" => Ok(ServiceKind::Tile),
            "ids" => Ok(ServiceKind::Ids),
            "reserve" => Ok(ServiceKind::Reserve),
            "boundingbox" => Ok(ServiceKind::BoundingBox),
            "downsample" => Ok(ServiceKind::Downsample),
            other => Err(BossError::InvalidArgument(format!(
                "Unknown service: {}",
                other
            ))),
        }
    }
}

/// Half-open voxel extent `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub start: u64,
    pub stop: u64,
}

impl Extent {
    pub fn new(start: u64, stop: u64) -> Self {
        Self { start, stop }
    }

    pub fn span(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }

    pub fn contains(&self, other: &Extent) -> bool {
        other.start >= self.start && other.stop <= self.stop
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.stop)
    }
}

/// Physical size of one voxel along each spatial axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl VoxelSize {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::Uint8.size_in_bytes(), 1);
        assert_eq!(DataType::Uint16.size_in_bytes(), 2);
        assert_eq!(DataType::Float32.size_in_bytes(), 4);
        assert_eq!(DataType::Uint64.bit_depth(), 64);
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!("uint8".parse::<DataType>().unwrap(), DataType::Uint8);
        assert_eq!("float64".parse::<DataType>().unwrap(), DataType::Float64);
        assert!(matches!(
            "uinit8".parse::<DataType>(),
            Err(BossError::InvalidArgument(_))
        ));
        assert!(DataType::Int16.is_signed());
        assert!(!DataType::Uint64.is_signed());
    }

    #[test]
    fn test_service_kind() {
        assert_eq!("ids".parse::<ServiceKind>().unwrap(), ServiceKind::Ids);
        assert!(ServiceKind::Reserve.requires_annotation());
        assert!(!ServiceKind::Cutout.requires_annotation());
    }

    #[test]
    fn test_extent() {
        let frame = Extent::new(0, 1000);
        assert!(frame.contains(&Extent::new(0, 1000)));
        assert!(!frame.contains(&Extent::new(10, 1001)));
        assert_eq!(Extent::new(4, 10).span(), 6);
        assert_eq!(Extent::new(4, 10).to_string(), "4:10");
    }
}
