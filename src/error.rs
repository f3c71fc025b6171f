//! Error types for addressing, validation and decode operations

use crate::types::Axis;
use thiserror::Error;

/// Stable, machine-readable error categories reported to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCutoutArgs,
    InvalidArgument,
    InvalidResolution,
    ResourceNotFound,
    ResourceExists,
    ChannelTypeMismatch,
    InvalidChannelRelationship,
    DatatypeDoesNotMatch,
    DataDimensionMismatch,
    RequestTooLarge,
    BossSystemError,
    UnhandledException,
}

impl ErrorCode {
    /// HTTP status an external transport should answer with
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::InvalidCutoutArgs
            | ErrorCode::InvalidArgument
            | ErrorCode::InvalidResolution
            | ErrorCode::ChannelTypeMismatch
            | ErrorCode::InvalidChannelRelationship
            | ErrorCode::DatatypeDoesNotMatch
            | ErrorCode::DataDimensionMismatch => 400,
            ErrorCode::ResourceNotFound => 404,
            ErrorCode::ResourceExists => 409,
            ErrorCode::RequestTooLarge => 413,
            ErrorCode::BossSystemError | ErrorCode::UnhandledException => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCutoutArgs => "INVALID_CUTOUT_ARGS",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::InvalidResolution => "INVALID_RESOLUTION",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::ResourceExists => "RESOURCE_EXISTS",
            ErrorCode::ChannelTypeMismatch => "CHANNEL_TYPE_MISMATCH",
            ErrorCode::InvalidChannelRelationship => "INVALID_CHANNEL_RELATIONSHIP",
            ErrorCode::DatatypeDoesNotMatch => "DATATYPE_DOES_NOT_MATCH",
            ErrorCode::DataDimensionMismatch => "DATA_DIMENSION_MISMATCH",
            ErrorCode::RequestTooLarge => "REQUEST_TOO_LARGE",
            ErrorCode::BossSystemError => "BOSS_SYSTEM_ERROR",
            ErrorCode::UnhandledException => "UNHANDLED_EXCEPTION",
        }
    }
}

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum BossError {
    #[error("Malformed range for {axis}: '{value}' (expected 'start:stop' with start < stop)")]
    MalformedRange { axis: Axis, value: String },

    #[error("{axis} range {}:{} is outside the legal range {}:{}", .requested.0, .requested.1, .legal.0, .legal.1)]
    OutOfBounds {
        axis: Axis,
        requested: (i64, i64),
        legal: (u64, u64),
    },

    #[error("Invalid resolution {requested}: must be between 0 and {max}")]
    InvalidResolution { requested: String, max: u32 },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource type mismatch: {0}")]
    ResourceTypeMismatch(String),

    #[error("Invalid channel relationship: {0}")]
    InvalidChannelRelationship(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Time key expansion for {lookup_key} stopped after {written} of {expected} records: {reason}")]
    PartialTimeExpansion {
        lookup_key: String,
        written: u32,
        expected: u64,
        reason: String,
    },

    #[error("Cutout request is {size} when uncompressed, over the {limit} limit. Reduce cutout dimensions.")]
    RequestTooLarge { size: String, limit: String },

    #[error("Failed to decompress data: {0}. Verify the datatype/bitdepth of your data matches the channel.")]
    PayloadCorrupt(String),

    #[error("Failed to unpack data: {0}. Verify the datatype of your POSTed data and xyz dimensions used in the POST URL.")]
    ShapeMismatch(String),

    #[error("Ran out of memory decompressing data: {0}")]
    OutOfMemory(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unhandled internal error: {0}")]
    UnhandledInternal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BossError {
    /// Category reported alongside the message
    pub fn code(&self) -> ErrorCode {
        match self {
            BossError::MalformedRange { .. } | BossError::OutOfBounds { .. } => {
                ErrorCode::InvalidCutoutArgs
            }
            BossError::InvalidResolution { .. } => ErrorCode::InvalidResolution,
            BossError::ResourceNotFound(_) | BossError::NotFound(_) => ErrorCode::ResourceNotFound,
            BossError::ResourceTypeMismatch(_) => ErrorCode::ChannelTypeMismatch,
            BossError::InvalidChannelRelationship(_) => ErrorCode::InvalidChannelRelationship,
            BossError::DuplicateKey(_) => ErrorCode::ResourceExists,
            BossError::RequestTooLarge { .. } => ErrorCode::RequestTooLarge,
            BossError::PayloadCorrupt(_) => ErrorCode::DatatypeDoesNotMatch,
            BossError::ShapeMismatch(_) => ErrorCode::DataDimensionMismatch,
            BossError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            BossError::OutOfMemory(_)
            | BossError::PartialTimeExpansion { .. }
            | BossError::Io(_)
            | BossError::Serialization(_) => ErrorCode::BossSystemError,
            BossError::UnhandledInternal(_) => ErrorCode::UnhandledException,
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> u16 {
        self.code().status()
    }

    /// Whether the caller may retry the same operation and expect progress
    pub fn is_retryable(&self) -> bool {
        matches!(self, BossError::PartialTimeExpansion { .. })
    }
}

/// Specialized Result type for crate operations
pub type Result<T> = std::result::Result<T, BossError>;

impl From<serde_json::Error> for BossError {
    fn from(err: serde_json::Error) -> Self {
        BossError::Serialization(err.to_string())
    }
}
