//! Shared fixture hierarchy for integration tests

#![allow(dead_code)]

use bossaddr::{
    BossConfig, ChannelSpec, DataType, DecodedArray, Element, Extent, HierarchyMethod,
    InMemoryCatalog, InMemoryMetadataStore, KeySpace, VoxelSize,
};
use bossaddr::compression::{BlockCompressor, CompressionLevel, Compressor};
use std::sync::Arc;

pub const ALL_TYPES: [DataType; 10] = [
    DataType::Uint8,
    DataType::Uint16,
    DataType::Uint32,
    DataType::Uint64,
    DataType::Int8,
    DataType::Int16,
    DataType::Int32,
    DataType::Int64,
    DataType::Float32,
    DataType::Float64,
];

pub struct Fixture {
    pub store: Arc<InMemoryMetadataStore>,
    pub keys: KeySpace,
    pub catalog: Arc<InMemoryCatalog>,
    pub config: Arc<BossConfig>,
}

pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

pub async fn fixture() -> Fixture {
    fixture_with(BossConfig::default()).await
}

pub async fn fixture_with(config: BossConfig) -> Fixture {
    init_logging();
    let store = Arc::new(InMemoryMetadataStore::new());
    let keys = KeySpace::new(store.clone());
    let config = Arc::new(config);
    let catalog = Arc::new(InMemoryCatalog::new(keys.clone(), config.clone()));

    catalog.add_collection("col1", "Description for collection1").await.unwrap();
    catalog.add_collection("col1-22", "Description for collection1-22").await.unwrap();
    catalog.add_collection("col2", "Description for collection2").await.unwrap();

    catalog
        .add_coordinate_frame(
            "cf1",
            "Description for cf1",
            Extent::new(0, 1000),
            Extent::new(0, 1000),
            Extent::new(0, 1000),
            VoxelSize::new(4.0, 4.0, 4.0),
        )
        .unwrap();
    catalog
        .add_experiment("col1", "exp1", "cf1", 10, 10, HierarchyMethod::Anisotropic)
        .await
        .unwrap();
    catalog
        .add_experiment("col1", "exp22", "cf1", 10, 500, HierarchyMethod::Anisotropic)
        .await
        .unwrap();
    // Same experiment name in another collection
    catalog
        .add_experiment("col2", "exp1", "cf1", 10, 500, HierarchyMethod::Anisotropic)
        .await
        .unwrap();

    catalog
        .add_channel("col1", "exp1", ChannelSpec::image("channel1", DataType::Uint8))
        .await
        .unwrap();
    catalog
        .add_channel("col1", "exp1", ChannelSpec::image("channel2", DataType::Uint8))
        .await
        .unwrap();
    catalog
        .add_channel("col1", "exp1", ChannelSpec::annotation("channel3", ["channel1"]))
        .await
        .unwrap();
    catalog
        .add_channel("col1", "exp1", ChannelSpec::annotation("layer1", ["channel1"]))
        .await
        .unwrap();
    catalog
        .add_channel("col2", "exp1", ChannelSpec::image("channel1", DataType::Uint8))
        .await
        .unwrap();

    for datatype in ALL_TYPES {
        catalog
            .add_channel("col1", "exp1", ChannelSpec::image(type_channel(datatype), datatype))
            .await
            .unwrap();
    }

    // Anisotropic and isotropic hierarchies over the same extents
    catalog
        .add_coordinate_frame(
            "cf2aniso",
            "Description for cf2",
            Extent::new(0, 2000),
            Extent::new(0, 5000),
            Extent::new(0, 200),
            VoxelSize::new(4.0, 4.0, 35.0),
        )
        .unwrap();
    catalog
        .add_experiment("col1", "exp_aniso", "cf2aniso", 8, 5, HierarchyMethod::Anisotropic)
        .await
        .unwrap();
    catalog
        .add_channel("col1", "exp_aniso", ChannelSpec::image("channel1", DataType::Uint8))
        .await
        .unwrap();

    catalog
        .add_coordinate_frame(
            "cf2iso",
            "Description for cf2",
            Extent::new(0, 2000),
            Extent::new(0, 5000),
            Extent::new(0, 200),
            VoxelSize::new(6.0, 6.0, 6.0),
        )
        .unwrap();
    catalog
        .add_experiment("col1", "exp_iso", "cf2iso", 8, 5, HierarchyMethod::Isotropic)
        .await
        .unwrap();
    catalog
        .add_channel("col1", "exp_iso", ChannelSpec::image("channel1", DataType::Uint8))
        .await
        .unwrap();

    Fixture {
        store,
        keys,
        catalog,
        config,
    }
}

/// Channel in `col1/exp1` holding `datatype`
pub fn type_channel(datatype: DataType) -> String {
    format!("chan_{}", datatype)
}

/// Deterministic, non-trivial byte pattern
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 31 + 7) ^ (i >> 3)) as u8)
        .collect()
}

/// Blosc1 frame around `raw`
pub fn blosc(raw: &[u8]) -> Vec<u8> {
    BlockCompressor.compress(raw, CompressionLevel::fast()).unwrap()
}

fn typed<T: Element>(shape: &[usize], bytes: &[u8]) -> DecodedArray {
    let values = bytes_to::<T>(bytes);
    DecodedArray::from_flat(shape, values).unwrap()
}

fn bytes_to<T: Element>(bytes: &[u8]) -> Vec<T> {
    bossaddr::array::bytes_to_elements::<T>(bytes).unwrap()
}

/// Build an array of `datatype` whose little-endian bytes are `bytes`
pub fn array_from_bytes(datatype: DataType, shape: &[usize], bytes: &[u8]) -> DecodedArray {
    match datatype {
        DataType::Uint8 => typed::<u8>(shape, bytes),
        DataType::Uint16 => typed::<u16>(shape, bytes),
        DataType::Uint32 => typed::<u32>(shape, bytes),
        DataType::Uint64 => typed::<u64>(shape, bytes),
        DataType::Int8 => typed::<i8>(shape, bytes),
        DataType::Int16 => typed::<i16>(shape, bytes),
        DataType::Int32 => typed::<i32>(shape, bytes),
        DataType::Int64 => typed::<i64>(shape, bytes),
        DataType::Float32 => typed::<f32>(shape, bytes),
        DataType::Float64 => typed::<f64>(shape, bytes),
    }
}
