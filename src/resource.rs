//! Resource metadata records and the geometry view resolved from them

use crate::config::BossConfig;
use crate::error::{BossError, Result};
use crate::lookup::{BossKey, CanonicalPath, KeySpace, LookupKey, RenameLevel};
use crate::scaling::derive_break_level;
use crate::types::{ChannelType, DataType, Extent, HierarchyMethod, VoxelSize};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateFrame {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub x: Extent,
    pub y: Extent,
    pub z: Extent,
    pub voxel_size: VoxelSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: u64,
    pub name: String,
    pub collection_id: u64,
    pub coord_frame_id: u64,
    pub num_hierarchy_levels: u32,
    pub hierarchy_method: HierarchyMethod,
    pub num_time_samples: u32,
    pub time_step: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: u64,
    pub name: String,
    pub experiment_id: u64,
    pub channel_type: ChannelType,
    pub datatype: DataType,
    pub default_time_sample: u32,
    pub base_resolution: u32,
    pub sources: Vec<u64>,
}

/// Read-only, id-keyed access to persisted resource records
pub trait ResourceCatalog: Send + Sync {
    fn collection(&self, id: u64) -> Option<Collection>;
    fn experiment(&self, id: u64) -> Option<Experiment>;
    fn coordinate_frame(&self, id: u64) -> Option<CoordinateFrame>;
    fn channel(&self, id: u64) -> Option<Channel>;
}

/// Geometry of one channel, valid for the duration of a single request
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub path: CanonicalPath,
    pub boss_key: BossKey,
    pub lookup_key: LookupKey,
    pub channel_type: ChannelType,
    pub datatype: DataType,
    /// Voxel bounds at resolution 0, X/Y/Z
    pub bounds: [Extent; 3],
    pub voxel_size: VoxelSize,
    pub hierarchy_depth: u32,
    pub hierarchy_method: HierarchyMethod,
    /// Level past which an anisotropic hierarchy also halves Z
    pub iso_break_level: u32,
    pub default_time_sample: u32,
    /// Highest addressable time sample, inclusive
    pub max_time_sample: u32,
    pub base_resolution: u32,
}

fn missing(what: &str, path: &CanonicalPath) -> BossError {
    BossError::ResourceNotFound(format!("{} not found for {}", what, path))
}

impl ResourceDescriptor {
    /// Resolve collection, experiment, coordinate frame and channel for `path`, in that order
    pub async fn resolve(
        catalog: &dyn ResourceCatalog,
        keys: &KeySpace,
        path: &CanonicalPath,
        config: &BossConfig,
    ) -> Result<Self> {
        path.validate()
            .map_err(|err| BossError::ResourceNotFound(err.to_string()))?;
        if path.channel.is_none() {
            return Err(missing("Channel", path));
        }

        let collection_key = resolve_level(keys, path, 1).await?;
        let collection = catalog
            .collection(collection_key.last_id()?)
            .ok_or_else(|| missing("Collection", path))?;

        let experiment_key = resolve_level(keys, path, 2).await?;
        let experiment = catalog
            .experiment(experiment_key.last_id()?)
            .filter(|e| e.collection_id == collection.id)
            .ok_or_else(|| missing("Experiment", path))?;

        let frame = catalog
            .coordinate_frame(experiment.coord_frame_id)
            .ok_or_else(|| missing("Coordinate frame", path))?;

        let channel_key = resolve_level(keys, path, 3).await?;
        let channel = catalog
            .channel(channel_key.last_id()?)
            .filter(|c| c.experiment_id == experiment.id)
            .ok_or_else(|| missing("Channel", path))?;

        validate_sources(catalog, &channel, config.allow_annotation_sources)?;

        let iso_break_level = config
            .iso_break_level
            .unwrap_or_else(|| derive_break_level(&frame.voxel_size));

        log::debug!("resolved {} to {}", path, channel_key);
        Ok(Self {
            path: path.ancestor(3),
            boss_key: path.ancestor(3).boss_key(),
            lookup_key: channel_key,
            channel_type: channel.channel_type,
            datatype: channel.datatype,
            bounds: [frame.x, frame.y, frame.z],
            voxel_size: frame.voxel_size,
            hierarchy_depth: experiment.num_hierarchy_levels,
            hierarchy_method: experiment.hierarchy_method,
            iso_break_level,
            default_time_sample: channel.default_time_sample,
            max_time_sample: experiment.num_time_samples,
            base_resolution: channel.base_resolution,
        })
    }

    /// Fail unless this channel can be addressed as a time series
    pub fn ensure_time_series(&self) -> Result<()> {
        if self.channel_type.supports_time_series() {
            Ok(())
        } else {
            Err(BossError::ResourceTypeMismatch(format!(
                "{} channel {} does not support time series requests",
                self.channel_type, self.path
            )))
        }
    }
}

async fn resolve_level(keys: &KeySpace, path: &CanonicalPath, depth: usize) -> Result<LookupKey> {
    let level = path.ancestor(depth);
    keys.resolve(&level.boss_key()).await.map_err(|err| match err {
        BossError::NotFound(_) => BossError::ResourceNotFound(format!("{} does not exist", level)),
        other => other,
    })
}

/// Check the source-channel graph reachable from `channel`.
///
/// Annotation channels need at least one source. Every source must exist,
/// live in the same experiment and not be the channel itself; annotation
/// sources are refused unless permitted, and no chain may loop back on itself.
pub fn validate_sources(
    catalog: &dyn ResourceCatalog,
    channel: &Channel,
    allow_annotation_sources: bool,
) -> Result<()> {
    if channel.channel_type == ChannelType::Annotation && channel.sources.is_empty() {
        return Err(BossError::InvalidChannelRelationship(format!(
            "Annotation channel {} must have at least one source channel",
            channel.name
        )));
    }

    let mut visited = HashSet::from([channel.id]);
    let mut pending: Vec<(u64, u64)> = channel.sources.iter().map(|&s| (channel.id, s)).collect();
    while let Some((parent, source_id)) = pending.pop() {
        if source_id == channel.id {
            return Err(BossError::InvalidChannelRelationship(format!(
                "Channel {} cannot be its own source",
                channel.name
            )));
        }
        let source = catalog.channel(source_id).ok_or_else(|| {
            BossError::InvalidChannelRelationship(format!(
                "Source channel {} of channel {} does not exist",
                source_id, parent
            ))
        })?;
        if source.experiment_id != channel.experiment_id {
            return Err(BossError::InvalidChannelRelationship(format!(
                "Source channel {} is not in the same experiment as {}",
                source.name, channel.name
            )));
        }
        if source.channel_type == ChannelType::Annotation && !allow_annotation_sources {
            return Err(BossError::InvalidChannelRelationship(format!(
                "Source channel {} is itself an annotation channel",
                source.name
            )));
        }
        if !visited.insert(source.id) {
            continue;
        }
        pending.extend(source.sources.iter().map(|&s| (source.id, s)));
    }
    Ok(())
}

/// Description of a channel to create
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub channel_type: ChannelType,
    pub datatype: DataType,
    pub default_time_sample: u32,
    pub base_resolution: u32,
    pub sources: Vec<String>,
}

impl ChannelSpec {
    pub fn image(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            channel_type: ChannelType::Image,
            datatype,
            default_time_sample: 0,
            base_resolution: 0,
            sources: Vec::new(),
        }
    }

    pub fn annotation<S: Into<String>>(
        name: impl Into<String>,
        sources: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_type: ChannelType::Annotation,
            datatype: DataType::Uint64,
            default_time_sample: 0,
            base_resolution: 0,
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn with_default_time_sample(mut self, sample: u32) -> Self {
        self.default_time_sample = sample;
        self
    }

    pub fn with_base_resolution(mut self, resolution: u32) -> Self {
        self.base_resolution = resolution;
        self
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    next_id: u64,
    collections: BTreeMap<u64, Collection>,
    frames: BTreeMap<u64, CoordinateFrame>,
    experiments: BTreeMap<u64, Experiment>,
    channels: BTreeMap<u64, Channel>,
}

impl CatalogState {
    /// Ids come from one arena counter and are never handed out twice
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn collection_by_name(&self, name: &str) -> Option<&Collection> {
        self.collections.values().find(|c| c.name == name)
    }

    fn experiment_by_name(&self, collection_id: u64, name: &str) -> Option<&Experiment> {
        self.experiments
            .values()
            .find(|e| e.collection_id == collection_id && e.name == name)
    }

    fn channel_by_name(&self, experiment_id: u64, name: &str) -> Option<&Channel> {
        self.channels
            .values()
            .find(|c| c.experiment_id == experiment_id && c.name == name)
    }
}

/// In-process catalog that registers lookup keys as records are created
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
    keys: KeySpace,
    config: Arc<BossConfig>,
}

impl InMemoryCatalog {
    pub fn new(keys: KeySpace, config: Arc<BossConfig>) -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            keys,
            config,
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub async fn add_collection(&self, name: &str, description: &str) -> Result<Collection> {
        CanonicalPath::collection(name).validate()?;
        let collection = {
            let mut state = self.state.write();
            if state.collection_by_name(name).is_some() {
                return Err(BossError::DuplicateKey(format!("Collection {} exists", name)));
            }
            let collection = Collection {
                id: state.allocate(),
                name: name.to_string(),
                description: description.to_string(),
            };
            state.collections.insert(collection.id, collection.clone());
            collection
        };

        let registered = self
            .keys
            .add_lookup(
                LookupKey::from_ids(&[collection.id]),
                BossKey::from_names(&[name]),
                name,
                None,
                None,
                None,
            )
            .await;
        self.settle(registered, |state| {
            state.collections.remove(&collection.id);
        })?;
        Ok(collection)
    }

    /// Undo a freshly inserted record when its key registration failed.
    ///
    /// A partial time expansion keeps the record so the expansion can be
    /// finished with [`KeySpace::expand_time`].
    fn settle(&self, registered: Result<()>, undo: impl FnOnce(&mut CatalogState)) -> Result<()> {
        if let Err(err) = &registered {
            if !err.is_retryable() {
                undo(&mut *self.state.write());
            }
        }
        registered
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_coordinate_frame(
        &self,
        name: &str,
        description: &str,
        x: Extent,
        y: Extent,
        z: Extent,
        voxel_size: VoxelSize,
    ) -> Result<CoordinateFrame> {
        for (axis, extent) in [("x", x), ("y", y), ("z", z)] {
            if extent.start >= extent.stop {
                return Err(BossError::InvalidArgument(format!(
                    "Coordinate frame {} has an empty {} extent {}",
                    name, axis, extent
                )));
            }
        }
        let mut state = self.state.write();
        if state.frames.values().any(|f| f.name == name) {
            return Err(BossError::DuplicateKey(format!(
                "Coordinate frame {} exists",
                name
            )));
        }
        let frame = CoordinateFrame {
            id: state.allocate(),
            name: name.to_string(),
            description: description.to_string(),
            x,
            y,
            z,
            voxel_size,
        };
        state.frames.insert(frame.id, frame.clone());
        Ok(frame)
    }

    pub async fn add_experiment(
        &self,
        collection_name: &str,
        name: &str,
        coord_frame_name: &str,
        num_hierarchy_levels: u32,
        num_time_samples: u32,
        hierarchy_method: HierarchyMethod,
    ) -> Result<Experiment> {
        let path = CanonicalPath::collection(collection_name).with_experiment(name);
        path.validate()?;
        if num_hierarchy_levels == 0 {
            return Err(BossError::InvalidArgument(
                "An experiment needs at least one hierarchy level".to_string(),
            ));
        }

        let (collection, experiment) = {
            let mut state = self.state.write();
            let collection = state
                .collection_by_name(collection_name)
                .cloned()
                .ok_or_else(|| missing("Collection", &path))?;
            let frame_id = state
                .frames
                .values()
                .find(|f| f.name == coord_frame_name)
                .map(|f| f.id)
                .ok_or_else(|| missing("Coordinate frame", &path))?;
            if state.experiment_by_name(collection.id, name).is_some() {
                return Err(BossError::DuplicateKey(format!("Experiment {} exists", path)));
            }
            let experiment = Experiment {
                id: state.allocate(),
                name: name.to_string(),
                collection_id: collection.id,
                coord_frame_id: frame_id,
                num_hierarchy_levels,
                hierarchy_method,
                num_time_samples,
                time_step: None,
            };
            state.experiments.insert(experiment.id, experiment.clone());
            (collection, experiment)
        };

        let registered = self
            .keys
            .add_lookup(
                LookupKey::from_ids(&[collection.id, experiment.id]),
                path.boss_key(),
                collection_name,
                Some(name),
                None,
                None,
            )
            .await;
        self.settle(registered, |state| {
            state.experiments.remove(&experiment.id);
        })?;
        Ok(experiment)
    }

    pub async fn add_channel(
        &self,
        collection_name: &str,
        experiment_name: &str,
        spec: ChannelSpec,
    ) -> Result<Channel> {
        let path = CanonicalPath::channel(collection_name, experiment_name, &spec.name);
        path.validate()?;

        let (collection, experiment, channel) = {
            let mut state = self.state.write();
            let collection = state
                .collection_by_name(collection_name)
                .cloned()
                .ok_or_else(|| missing("Collection", &path))?;
            let experiment = state
                .experiment_by_name(collection.id, experiment_name)
                .cloned()
                .ok_or_else(|| missing("Experiment", &path))?;
            if state.channel_by_name(experiment.id, &spec.name).is_some() {
                return Err(BossError::DuplicateKey(format!("Channel {} exists", path)));
            }

            let mut sources = Vec::with_capacity(spec.sources.len());
            for source in &spec.sources {
                let id = state
                    .channel_by_name(experiment.id, source)
                    .map(|c| c.id)
                    .ok_or_else(|| {
                        BossError::InvalidChannelRelationship(format!(
                            "Source channel {} does not exist in experiment {}",
                            source, experiment.name
                        ))
                    })?;
                sources.push(id);
            }

            let channel = Channel {
                id: state.next_id + 1,
                name: spec.name.clone(),
                experiment_id: experiment.id,
                channel_type: spec.channel_type,
                datatype: spec.datatype,
                default_time_sample: spec.default_time_sample,
                base_resolution: spec.base_resolution,
                sources,
            };
            validate_sources(&*state, &channel, self.config.allow_annotation_sources)?;

            let id = state.allocate();
            debug_assert_eq!(id, channel.id);
            state.channels.insert(channel.id, channel.clone());
            (collection, experiment, channel)
        };

        let max_time_sample = channel
            .channel_type
            .supports_time_series()
            .then_some(experiment.num_time_samples);
        let registered = self
            .keys
            .add_lookup(
                LookupKey::from_ids(&[collection.id, experiment.id, channel.id]),
                path.boss_key(),
                collection_name,
                Some(experiment_name),
                Some(&channel.name),
                max_time_sample,
            )
            .await;
        self.settle(registered, |state| {
            state.channels.remove(&channel.id);
        })?;
        Ok(channel)
    }

    pub async fn rename_collection(&self, name: &str, new_name: &str) -> Result<()> {
        let path = CanonicalPath::collection(name);
        {
            let mut state = self.state.write();
            if state.collection_by_name(new_name).is_some() {
                return Err(BossError::DuplicateKey(format!("Collection {} exists", new_name)));
            }
            let id = state
                .collection_by_name(name)
                .map(|c| c.id)
                .ok_or_else(|| missing("Collection", &path))?;
            if let Some(collection) = state.collections.get_mut(&id) {
                collection.name = new_name.to_string();
            }
        }
        self.keys
            .rename(RenameLevel::Collection, &path, new_name)
            .await?;
        Ok(())
    }

    pub async fn rename_experiment(
        &self,
        collection_name: &str,
        name: &str,
        new_name: &str,
    ) -> Result<()> {
        let path = CanonicalPath::collection(collection_name).with_experiment(name);
        {
            let mut state = self.state.write();
            let collection_id = state
                .collection_by_name(collection_name)
                .map(|c| c.id)
                .ok_or_else(|| missing("Collection", &path))?;
            if state.experiment_by_name(collection_id, new_name).is_some() {
                return Err(BossError::DuplicateKey(format!("Experiment {} exists", new_name)));
            }
            let id = state
                .experiment_by_name(collection_id, name)
                .map(|e| e.id)
                .ok_or_else(|| missing("Experiment", &path))?;
            if let Some(experiment) = state.experiments.get_mut(&id) {
                experiment.name = new_name.to_string();
            }
        }
        self.keys
            .rename(RenameLevel::Experiment, &path, new_name)
            .await?;
        Ok(())
    }

    pub async fn rename_channel(
        &self,
        collection_name: &str,
        experiment_name: &str,
        name: &str,
        new_name: &str,
    ) -> Result<()> {
        let path = CanonicalPath::channel(collection_name, experiment_name, name);
        {
            let mut state = self.state.write();
            let collection_id = state
                .collection_by_name(collection_name)
                .map(|c| c.id)
                .ok_or_else(|| missing("Collection", &path))?;
            let experiment_id = state
                .experiment_by_name(collection_id, experiment_name)
                .map(|e| e.id)
                .ok_or_else(|| missing("Experiment", &path))?;
            if state.channel_by_name(experiment_id, new_name).is_some() {
                return Err(BossError::DuplicateKey(format!("Channel {} exists", new_name)));
            }
            let id = state
                .channel_by_name(experiment_id, name)
                .map(|c| c.id)
                .ok_or_else(|| missing("Channel", &path))?;
            if let Some(channel) = state.channels.get_mut(&id) {
                channel.name = new_name.to_string();
            }
        }
        self.keys
            .rename(RenameLevel::Channel, &path, new_name)
            .await?;
        Ok(())
    }
}

impl ResourceCatalog for CatalogState {
    fn collection(&self, id: u64) -> Option<Collection> {
        self.collections.get(&id).cloned()
    }

    fn experiment(&self, id: u64) -> Option<Experiment> {
        self.experiments.get(&id).cloned()
    }

    fn coordinate_frame(&self, id: u64) -> Option<CoordinateFrame> {
        self.frames.get(&id).cloned()
    }

    fn channel(&self, id: u64) -> Option<Channel> {
        self.channels.get(&id).cloned()
    }
}

impl ResourceCatalog for InMemoryCatalog {
    fn collection(&self, id: u64) -> Option<Collection> {
        self.state.read().collection(id)
    }

    fn experiment(&self, id: u64) -> Option<Experiment> {
        self.state.read().experiment(id)
    }

    fn coordinate_frame(&self, id: u64) -> Option<CoordinateFrame> {
        self.state.read().coordinate_frame(id)
    }

    fn channel(&self, id: u64) -> Option<Channel> {
        self.state.read().channel(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadb::InMemoryMetadataStore;

    async fn catalog() -> InMemoryCatalog {
        let keys = KeySpace::new(Arc::new(InMemoryMetadataStore::new()));
        let catalog = InMemoryCatalog::new(keys, Arc::new(BossConfig::default()));
        catalog.add_collection("col1", "Description for collection1").await.unwrap();
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
            .add_channel("col1", "exp1", ChannelSpec::image("channel1", DataType::Uint8))
            .await
            .unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_resolve_descriptor() {
        let catalog = catalog().await;
        let path = CanonicalPath::channel("col1", "exp1", "channel1");
        let descriptor =
            ResourceDescriptor::resolve(&catalog, catalog.keys(), &path, &BossConfig::default())
                .await
                .unwrap();

        assert_eq!(descriptor.lookup_key.as_str(), "1&3&4");
        assert_eq!(descriptor.boss_key.as_str(), "col1&exp1&channel1");
        assert_eq!(descriptor.bounds[2], Extent::new(0, 1000));
        assert_eq!(descriptor.hierarchy_depth, 10);
        assert_eq!(descriptor.max_time_sample, 10);
        assert_eq!(descriptor.iso_break_level, 0);
        assert_eq!(descriptor.datatype, DataType::Uint8);
    }

    #[tokio::test]
    async fn test_missing_levels() {
        let catalog = catalog().await;
        let config = BossConfig::default();
        for path in [
            CanonicalPath::channel("nope", "exp1", "channel1"),
            CanonicalPath::channel("col1", "nope", "channel1"),
            CanonicalPath::channel("col1", "exp1", "nope"),
            CanonicalPath::collection("col1").with_experiment("exp1"),
        ] {
            let err = ResourceDescriptor::resolve(&catalog, catalog.keys(), &path, &config)
                .await
                .unwrap_err();
            assert!(matches!(err, BossError::ResourceNotFound(_)), "{}", path);
        }
    }

    #[tokio::test]
    async fn test_annotation_requires_sources() {
        let catalog = catalog().await;
        let empty: Vec<String> = Vec::new();
        let err = catalog
            .add_channel("col1", "exp1", ChannelSpec::annotation("ann", empty))
            .await
            .unwrap_err();
        assert!(matches!(err, BossError::InvalidChannelRelationship(_)));

        let err = catalog
            .add_channel("col1", "exp1", ChannelSpec::annotation("ann", ["missing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BossError::InvalidChannelRelationship(_)));

        catalog
            .add_channel("col1", "exp1", ChannelSpec::annotation("ann", ["channel1"]))
            .await
            .unwrap();

        // Annotation of an annotation is refused by default
        let err = catalog
            .add_channel("col1", "exp1", ChannelSpec::annotation("ann2", ["ann"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BossError::InvalidChannelRelationship(_)));
    }

    #[test]
    fn test_cycle_detected() {
        let mut state = CatalogState::default();
        let make = |id: u64, sources: Vec<u64>| Channel {
            id,
            name: format!("c{}", id),
            experiment_id: 1,
            channel_type: ChannelType::Annotation,
            datatype: DataType::Uint64,
            default_time_sample: 0,
            base_resolution: 0,
            sources,
        };
        state.channels.insert(10, make(10, vec![11]));
        state.channels.insert(11, make(11, vec![10]));

        let err = validate_sources(&state, &make(10, vec![11]), true).unwrap_err();
        assert!(matches!(err, BossError::InvalidChannelRelationship(_)));

        let err = validate_sources(&state, &make(12, vec![12]), true).unwrap_err();
        assert!(matches!(err, BossError::InvalidChannelRelationship(_)));
    }

    #[test]
    fn test_cross_experiment_source() {
        let mut state = CatalogState::default();
        let source = Channel {
            id: 3,
            name: "img".into(),
            experiment_id: 2,
            channel_type: ChannelType::Image,
            datatype: DataType::Uint8,
            default_time_sample: 0,
            base_resolution: 0,
            sources: vec![],
        };
        state.channels.insert(3, source);
        let ann = Channel {
            id: 4,
            name: "ann".into(),
            experiment_id: 1,
            channel_type: ChannelType::Annotation,
            datatype: DataType::Uint64,
            default_time_sample: 0,
            base_resolution: 0,
            sources: vec![3],
        };
        assert!(matches!(
            validate_sources(&state, &ann, false),
            Err(BossError::InvalidChannelRelationship(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_keeps_lookup_key() {
        let catalog = catalog().await;
        let config = BossConfig::default();
        let before = ResourceDescriptor::resolve(
            &catalog,
            catalog.keys(),
            &CanonicalPath::channel("col1", "exp1", "channel1"),
            &config,
        )
        .await
        .unwrap();

        catalog.rename_experiment("col1", "exp1", "exp1-renamed").await.unwrap();
        let after = ResourceDescriptor::resolve(
            &catalog,
            catalog.keys(),
            &CanonicalPath::channel("col1", "exp1-renamed", "channel1"),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(before.lookup_key, after.lookup_key);

        let time_key = catalog
            .keys()
            .resolve(&BossKey::new("col1&exp1-renamed&channel1&3"))
            .await
            .unwrap();
        assert_eq!(time_key, before.lookup_key.with_time(3));
    }
}
