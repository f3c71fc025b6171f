//! Runtime configuration

use crate::error::{BossError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Uncompressed ceiling for a single cutout payload (500 MiB)
pub const DEFAULT_CUTOUT_MAX_SIZE: u64 = 500 * 1024 * 1024;

/// 64-bit payloads are allowed this many times the ceiling
pub const DEFAULT_WIDE_TYPE_DIVISOR: u64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    /// Maximum uncompressed bytes a cutout may carry
    pub cutout_max_size: u64,

    /// Divisor applied to the implied size of 64-bit payloads
    pub wide_type_divisor: u64,

    /// Explicit anisotropic crossover level. When unset, it is derived from
    /// the coordinate frame's voxel sizes.
    pub iso_break_level: Option<u32>,

    /// Allow annotation channels to be used as source channels
    pub allow_annotation_sources: bool,

    /// Blocking decode pool size. Defaults to the number of available cores.
    pub decode_workers: Option<usize>,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            cutout_max_size: DEFAULT_CUTOUT_MAX_SIZE,
            wide_type_divisor: DEFAULT_WIDE_TYPE_DIVISOR,
            iso_break_level: None,
            allow_annotation_sources: false,
            decode_workers: None,
        }
    }
}

impl BossConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: BossConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_cutout_max_size(mut self, bytes: u64) -> Self {
        self.cutout_max_size = bytes;
        self
    }

    pub fn with_iso_break_level(mut self, level: u32) -> Self {
        self.iso_break_level = Some(level);
        self
    }

    pub fn with_annotation_sources(mut self, allow: bool) -> Self {
        self.allow_annotation_sources = allow;
        self
    }

    pub fn with_decode_workers(mut self, workers: usize) -> Self {
        self.decode_workers = Some(workers);
        self
    }

    /// Effective decode pool size
    pub fn decode_workers(&self) -> usize {
        self.decode_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.cutout_max_size == 0 {
            return Err(BossError::InvalidArgument(
                "cutout_max_size must be greater than zero".to_string(),
            ));
        }
        if self.wide_type_divisor == 0 {
            return Err(BossError::InvalidArgument(
                "wide_type_divisor must be greater than zero".to_string(),
            ));
        }
        if self.decode_workers == Some(0) {
            return Err(BossError::InvalidArgument(
                "decode_workers must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
