//! BossAddr - request addressing and cutout decoding for voxel datasets
//!
//! Resolves human-readable resource paths (collection/experiment/channel,
//! optionally a time sample) to immutable storage keys, validates cutout
//! requests against the addressed resource's geometry, and decodes
//! client-submitted compressed arrays into typed, shape-checked buffers.
//!
//! # Features
//!
//! - Two-level key space: name-based boss keys over id-based lookup keys
//! - Resolution-aware bounds checking for isotropic and anisotropic hierarchies
//! - Three payload encodings sharing one size/shape pipeline
//! - Metadata store abstraction with in-memory and file-backed backends
//!
//! # Example
//!
//! ```rust,ignore
//! use bossaddr::{CutoutParser, RequestParams};
//!
//! # async fn example(parser: CutoutParser, body: &[u8]) -> bossaddr::Result<()> {
//! let params = RequestParams::new("col1", "exp1", "channel1")
//!     .resolution(0)
//!     .ranges("0:1024", "0:1024", "0:16");
//! let mut body = body;
//! let cutout = parser.parse("application/blosc", &params, &mut body).await?;
//! assert_eq!(cutout.data.shape(), &[16, 1024, 1024]);
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod lookup;
pub mod metadb;
pub mod parser;
pub mod request;
pub mod resource;
pub mod scaling;
pub mod types;
pub mod utils;

// Re-exports
pub use array::{DecodedArray, Element};
pub use codec::{Cutout, CutoutCodec, Encoding};
pub use config::BossConfig;
pub use error::{BossError, ErrorCode, Result};
pub use lookup::{BossKey, CanonicalPath, KeySpace, LookupKey, LookupRecord};
pub use metadb::{FileMetadataStore, InMemoryMetadataStore, MetadataStore};
pub use parser::CutoutParser;
pub use request::{CutoutRequest, RequestParams, RequestValidator};
pub use resource::{ChannelSpec, InMemoryCatalog, ResourceCatalog, ResourceDescriptor};
pub use types::{Axis, ChannelType, DataType, Extent, HierarchyMethod, ServiceKind, VoxelSize};

/// Version of this crate
pub const BOSSADDR_VERSION: &str = env!("CARGO_PKG_VERSION");
