//! Two-level key space: human-readable boss keys and identifier-based lookup keys
//!
//! A lookup key is built from the immutable integer ids of the collection,
//! experiment and channel records (`"4&12&31"`); a boss key is the same
//! hierarchy spelled with the current names (`"col1&exp1&channel1"`). Storage
//! is addressed exclusively by lookup keys, so renaming a resource only
//! re-points boss keys and never touches stored data.

use crate::error::{BossError, Result};
use crate::metadb::MetadataStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Separator between hierarchy segments in both key spaces
pub const KEY_DELIMITER: char = '&';

const BOSS_PREFIX: &str = "lookup/boss/";
const LOOKUP_PREFIX: &str = "lookup/id/";

fn join_segments<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: fmt::Display,
{
    segments
        .into_iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(&KEY_DELIMITER.to_string())
}

/// Identifier-based storage address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LookupKey(String);

impl LookupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build from record ids, outermost first
    pub fn from_ids(ids: &[u64]) -> Self {
        Self(join_segments(ids))
    }

    pub fn with_time(&self, time: u32) -> Self {
        Self(format!("{}{}{}", self.0, KEY_DELIMITER, time))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the numeric id segments
    pub fn ids(&self) -> Result<Vec<u64>> {
        self.0
            .split(KEY_DELIMITER)
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    BossError::InvalidArgument(format!("Malformed lookup key {}", self.0))
                })
            })
            .collect()
    }

    /// Id of the deepest record the key addresses
    pub fn last_id(&self) -> Result<u64> {
        self.ids()?.last().copied().ok_or_else(|| {
            BossError::InvalidArgument(format!("Malformed lookup key {}", self.0))
        })
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name-based address resolving to a [`LookupKey`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BossKey(String);

impl BossKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self(join_segments(names.iter().map(|s| s.as_ref())))
    }

    pub fn with_time(&self, time: u32) -> Self {
        Self(format!("{}{}{}", self.0, KEY_DELIMITER, time))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split(KEY_DELIMITER).collect()
    }

    /// True if `self` equals `prefix` or extends it by whole segments
    pub fn is_under(&self, prefix: &BossKey) -> bool {
        match self.0.strip_prefix(prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(KEY_DELIMITER),
            None => false,
        }
    }
}

impl fmt::Display for BossKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hierarchical name tuple identifying a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalPath {
    pub collection: String,
    pub experiment: Option<String>,
    pub channel: Option<String>,
    pub time: Option<u32>,
}

impl CanonicalPath {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            experiment: None,
            channel: None,
            time: None,
        }
    }

    pub fn channel(
        collection: impl Into<String>,
        experiment: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            experiment: Some(experiment.into()),
            channel: Some(channel.into()),
            time: None,
        }
    }

    pub fn with_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.experiment = Some(experiment.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_time(mut self, time: u32) -> Self {
        self.time = Some(time);
        self
    }

    /// Check the nesting rules: each level requires its parent and names are non-empty
    pub fn validate(&self) -> Result<()> {
        let names = [
            Some(&self.collection),
            self.experiment.as_ref(),
            self.channel.as_ref(),
        ];
        for name in names.iter().flatten() {
            if name.is_empty() {
                return Err(BossError::InvalidArgument(
                    "Resource names must be non-empty".to_string(),
                ));
            }
            if name.contains(KEY_DELIMITER) {
                return Err(BossError::InvalidArgument(format!(
                    "Resource name '{}' contains the reserved character '{}'",
                    name, KEY_DELIMITER
                )));
            }
        }
        if self.channel.is_some() && self.experiment.is_none() {
            return Err(BossError::InvalidArgument(
                "A channel requires an experiment".to_string(),
            ));
        }
        if self.time.is_some() && self.channel.is_none() {
            return Err(BossError::InvalidArgument(
                "A time index requires a channel".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of named levels (1 = collection .. 3 = channel)
    pub fn depth(&self) -> usize {
        1 + self.experiment.is_some() as usize + self.channel.is_some() as usize
    }

    /// Path truncated to its first `depth` named levels, without time
    pub fn ancestor(&self, depth: usize) -> CanonicalPath {
        CanonicalPath {
            collection: self.collection.clone(),
            experiment: if depth >= 2 { self.experiment.clone() } else { None },
            channel: if depth >= 3 { self.channel.clone() } else { None },
            time: None,
        }
    }

    pub fn boss_key(&self) -> BossKey {
        let mut names = vec![self.collection.as_str()];
        names.extend(self.experiment.as_deref());
        names.extend(self.channel.as_deref());
        let key = BossKey::from_names(&names);
        match self.time {
            Some(t) => key.with_time(t),
            None => key,
        }
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        if let Some(experiment) = &self.experiment {
            write!(f, "/{}", experiment)?;
        }
        if let Some(channel) = &self.channel {
            write!(f, "/{}", channel)?;
        }
        if let Some(time) = self.time {
            write!(f, "@{}", time)?;
        }
        Ok(())
    }
}

/// One boss key to lookup key mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
    pub lookup_key: LookupKey,
    pub boss_key: BossKey,
    pub collection_name: String,
    pub experiment_name: Option<String>,
    pub channel_name: Option<String>,
}

impl LookupRecord {
    fn with_time(&self, time: u32) -> Self {
        Self {
            lookup_key: self.lookup_key.with_time(time),
            boss_key: self.boss_key.with_time(time),
            ..self.clone()
        }
    }
}

/// Hierarchy level being renamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameLevel {
    Collection,
    Experiment,
    Channel,
}

impl RenameLevel {
    fn depth(&self) -> usize {
        match self {
            RenameLevel::Collection => 1,
            RenameLevel::Experiment => 2,
            RenameLevel::Channel => 3,
        }
    }
}

/// Bidirectional boss key / lookup key mapping backed by a [`MetadataStore`]
#[derive(Clone)]
pub struct KeySpace {
    store: Arc<dyn MetadataStore>,
}

impl KeySpace {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    fn boss_entry(key: &BossKey) -> String {
        format!("{}{}", BOSS_PREFIX, key)
    }

    fn lookup_entry(key: &LookupKey) -> String {
        format!("{}{}", LOOKUP_PREFIX, key)
    }

    /// Register a mapping and, for time-series channels, one mapping per time sample.
    ///
    /// The base mapping is never overwritten: an existing boss key or lookup
    /// key fails with [`BossError::DuplicateKey`]. Time records are written
    /// after the base record; if one fails the base is kept and
    /// [`BossError::PartialTimeExpansion`] is returned so the caller can
    /// finish with [`KeySpace::expand_time`].
    pub async fn add_lookup(
        &self,
        lookup_key: LookupKey,
        boss_key: BossKey,
        collection_name: &str,
        experiment_name: Option<&str>,
        channel_name: Option<&str>,
        max_time_sample: Option<u32>,
    ) -> Result<()> {
        let record = LookupRecord {
            lookup_key,
            boss_key,
            collection_name: collection_name.to_string(),
            experiment_name: experiment_name.map(str::to_string),
            channel_name: channel_name.map(str::to_string),
        };
        self.insert_record(&record).await?;
        log::debug!("added lookup {} -> {}", record.boss_key, record.lookup_key);

        if let (Some(_), Some(_), Some(max)) = (experiment_name, channel_name, max_time_sample) {
            self.expand_time(&record, max).await?;
        }
        Ok(())
    }

    async fn insert_record(&self, record: &LookupRecord) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.store
            .write_new(&Self::boss_entry(&record.boss_key), value)
            .await?;

        let reverse = serde_json::to_value(&record.boss_key)?;
        if let Err(err) = self
            .store
            .write_new(&Self::lookup_entry(&record.lookup_key), reverse)
            .await
        {
            // The lookup key already belongs to another boss key; undo ours
            let _ = self.store.delete(&Self::boss_entry(&record.boss_key)).await;
            return Err(err);
        }
        Ok(())
    }

    /// Write the `&<t>` records for `0..=max_time_sample`, skipping ones already present.
    ///
    /// Safe to call again after a [`BossError::PartialTimeExpansion`].
    pub async fn expand_time(&self, base: &LookupRecord, max_time_sample: u32) -> Result<()> {
        let expected = u64::from(max_time_sample) + 1;
        for time in 0..=max_time_sample {
            let record = base.with_time(time);
            match self.lookup(&record.boss_key).await {
                Ok(existing) if existing.lookup_key == record.lookup_key => continue,
                Ok(existing) => {
                    return Err(BossError::DuplicateKey(format!(
                        "{} already maps to {}",
                        existing.boss_key, existing.lookup_key
                    )))
                }
                Err(BossError::NotFound(_)) => {}
                Err(err) => return Err(partial(base, time, expected, err)),
            }
            if let Err(err) = self.insert_record(&record).await {
                return Err(partial(base, time, expected, err));
            }
        }
        log::debug!(
            "expanded {} time keys under {}",
            expected,
            base.lookup_key
        );
        Ok(())
    }

    /// Full record for an exact boss key
    pub async fn lookup(&self, boss_key: &BossKey) -> Result<LookupRecord> {
        let value = self
            .store
            .read(&Self::boss_entry(boss_key))
            .await
            .map_err(|err| match err {
                BossError::NotFound(_) => {
                    BossError::NotFound(format!("No lookup key for {}", boss_key))
                }
                other => other,
            })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Exact-match resolution; no prefix matching is ever performed
    pub async fn resolve(&self, boss_key: &BossKey) -> Result<LookupKey> {
        Ok(self.lookup(boss_key).await?.lookup_key)
    }

    /// Current boss key for a lookup key
    pub async fn reverse(&self, lookup_key: &LookupKey) -> Result<BossKey> {
        let value = self.store.read(&Self::lookup_entry(lookup_key)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Remove the mapping for a lookup key, returning the removed record
    pub async fn delete(&self, lookup_key: &LookupKey) -> Result<LookupRecord> {
        let boss_key = self.reverse(lookup_key).await?;
        let value = self.store.delete(&Self::boss_entry(&boss_key)).await?;
        self.store.delete(&Self::lookup_entry(lookup_key)).await?;
        log::debug!("deleted lookup {} -> {}", boss_key, lookup_key);
        Ok(serde_json::from_value(value)?)
    }

    /// Re-point every boss key under `old` at its unchanged lookup key, with the
    /// segment at `level` renamed to `new_name`. Returns the number of records moved.
    pub async fn rename(
        &self,
        level: RenameLevel,
        old: &CanonicalPath,
        new_name: &str,
    ) -> Result<usize> {
        let old_prefix = old.ancestor(level.depth());
        if old_prefix.depth() != level.depth() {
            return Err(BossError::InvalidArgument(format!(
                "{} does not name a {:?}",
                old, level
            )));
        }
        let mut new_prefix = old_prefix.clone();
        match level {
            RenameLevel::Collection => new_prefix.collection = new_name.to_string(),
            RenameLevel::Experiment => new_prefix.experiment = Some(new_name.to_string()),
            RenameLevel::Channel => new_prefix.channel = Some(new_name.to_string()),
        }
        new_prefix.validate()?;

        let old_key = old_prefix.boss_key();
        let new_key = new_prefix.boss_key();
        if self.lookup(&new_key).await.is_ok() {
            return Err(BossError::DuplicateKey(format!("{} already exists", new_key)));
        }

        let entries = self
            .store
            .list(&Self::boss_entry(&old_key))
            .await?;
        let mut moved = 0;
        for entry in entries {
            let boss_key = BossKey::new(&entry[BOSS_PREFIX.len()..]);
            if !boss_key.is_under(&old_key) {
                continue;
            }
            let mut record = self.lookup(&boss_key).await?;
            let suffix = &boss_key.as_str()[old_key.as_str().len()..];
            record.boss_key = BossKey::new(format!("{}{}", new_key, suffix));
            match level {
                RenameLevel::Collection => record.collection_name = new_name.to_string(),
                RenameLevel::Experiment => record.experiment_name = Some(new_name.to_string()),
                RenameLevel::Channel => record.channel_name = Some(new_name.to_string()),
            }

            self.store
                .write_new(&Self::boss_entry(&record.boss_key), serde_json::to_value(&record)?)
                .await?;
            self.store
                .update(
                    &Self::lookup_entry(&record.lookup_key),
                    serde_json::to_value(&record.boss_key)?,
                )
                .await?;
            self.store.delete(&entry).await?;
            moved += 1;
        }
        log::debug!("renamed {} -> {} ({} keys)", old_key, new_key, moved);
        Ok(moved)
    }
}

fn partial(base: &LookupRecord, written: u32, expected: u64, err: BossError) -> BossError {
    log::warn!(
        "time key expansion for {} failed at {}: {}",
        base.lookup_key,
        written,
        err
    );
    BossError::PartialTimeExpansion {
        lookup_key: base.lookup_key.to_string(),
        written,
        expected,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadb::InMemoryMetadataStore;

    fn keyspace() -> (KeySpace, Arc<InMemoryMetadataStore>) {
        let store = Arc::new(InMemoryMetadataStore::new());
        (KeySpace::new(store.clone()), store)
    }

    #[test]
    fn test_key_building() {
        assert_eq!(LookupKey::from_ids(&[4, 12, 31]).as_str(), "4&12&31");
        assert_eq!(LookupKey::from_ids(&[4, 12, 31]).with_time(7).as_str(), "4&12&31&7");
        assert_eq!(LookupKey::new("4&12&31").last_id().unwrap(), 31);
        assert!(LookupKey::new("4&x").ids().is_err());

        let path = CanonicalPath::channel("col1", "exp1", "channel1");
        assert_eq!(path.boss_key().as_str(), "col1&exp1&channel1");
        assert_eq!(path.clone().with_time(3).boss_key().as_str(), "col1&exp1&channel1&3");
        assert_eq!(path.ancestor(1).boss_key().as_str(), "col1");
    }

    #[test]
    fn test_segment_prefix() {
        let col = BossKey::new("col1");
        assert!(BossKey::new("col1").is_under(&col));
        assert!(BossKey::new("col1&exp1").is_under(&col));
        assert!(!BossKey::new("col1-22").is_under(&col));
        assert!(!BossKey::new("col1-22&exp1").is_under(&col));
    }

    #[test]
    fn test_path_validation() {
        assert!(CanonicalPath::channel("col1", "exp1", "ch").validate().is_ok());
        assert!(CanonicalPath::collection("").validate().is_err());
        assert!(CanonicalPath::collection("a&b").validate().is_err());
        assert!(CanonicalPath::collection("col1")
            .with_channel("ch")
            .validate()
            .is_err());
        assert!(CanonicalPath::collection("col1")
            .with_experiment("exp1")
            .with_time(0)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_add_and_resolve() {
        let (keys, _) = keyspace();
        keys.add_lookup(LookupKey::new("1"), BossKey::new("col1"), "col1", None, None, None)
            .await
            .unwrap();
        keys.add_lookup(
            LookupKey::new("2"),
            BossKey::new("col1-22"),
            "col1-22",
            None,
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(keys.resolve(&BossKey::new("col1")).await.unwrap().as_str(), "1");
        assert_eq!(keys.resolve(&BossKey::new("col1-22")).await.unwrap().as_str(), "2");
        assert!(matches!(
            keys.resolve(&BossKey::new("col")).await,
            Err(BossError::NotFound(_))
        ));
        assert_eq!(
            keys.reverse(&LookupKey::new("2")).await.unwrap(),
            BossKey::new("col1-22")
        );
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let (keys, _) = keyspace();
        keys.add_lookup(LookupKey::new("1"), BossKey::new("col1"), "col1", None, None, None)
            .await
            .unwrap();
        let err = keys
            .add_lookup(LookupKey::new("1"), BossKey::new("col1"), "col1", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BossError::DuplicateKey(_)));

        // Re-parenting an existing lookup key under a new name is also refused
        let err = keys
            .add_lookup(LookupKey::new("1"), BossKey::new("other"), "other", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BossError::DuplicateKey(_)));
        assert!(keys.resolve(&BossKey::new("other")).await.is_err());
    }

    #[tokio::test]
    async fn test_time_expansion() {
        let (keys, store) = keyspace();
        keys.add_lookup(
            LookupKey::new("1&1&1"),
            BossKey::new("col1&exp1&ch1"),
            "col1",
            Some("exp1"),
            Some("ch1"),
            Some(4),
        )
        .await
        .unwrap();

        // base + 5 time records, two store entries each
        assert_eq!(store.len(), 12);
        for t in 0..=4 {
            let key = keys
                .resolve(&BossKey::new(format!("col1&exp1&ch1&{}", t)))
                .await
                .unwrap();
            assert_eq!(key.as_str(), format!("1&1&1&{}", t));
        }
        assert!(keys
            .resolve(&BossKey::new("col1&exp1&ch1&5"))
            .await
            .is_err());

        // Re-running the expansion is a no-op
        let base = keys.lookup(&BossKey::new("col1&exp1&ch1")).await.unwrap();
        keys.expand_time(&base, 4).await.unwrap();
        assert_eq!(store.len(), 12);
    }

    #[tokio::test]
    async fn test_time_expansion_needs_channel() {
        let (keys, store) = keyspace();
        keys.add_lookup(
            LookupKey::new("1&1"),
            BossKey::new("col1&exp1"),
            "col1",
            Some("exp1"),
            None,
            Some(4),
        )
        .await
        .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let (keys, _) = keyspace();
        keys.add_lookup(LookupKey::new("1"), BossKey::new("col1"), "col1", None, None, None)
            .await
            .unwrap();
        let removed = keys.delete(&LookupKey::new("1")).await.unwrap();
        assert_eq!(removed.boss_key, BossKey::new("col1"));
        assert!(matches!(
            keys.delete(&LookupKey::new("1")).await,
            Err(BossError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_keeps_lookup_keys() {
        let (keys, _) = keyspace();
        keys.add_lookup(LookupKey::new("1"), BossKey::new("col1"), "col1", None, None, None)
            .await
            .unwrap();
        keys.add_lookup(LookupKey::new("2"), BossKey::new("col1-22"), "col1-22", None, None, None)
            .await
            .unwrap();
        keys.add_lookup(
            LookupKey::new("1&5"),
            BossKey::new("col1&exp1"),
            "col1",
            Some("exp1"),
            None,
            None,
        )
        .await
        .unwrap();

        let moved = keys
            .rename(RenameLevel::Collection, &CanonicalPath::collection("col1"), "renamed")
            .await
            .unwrap();
        assert_eq!(moved, 2);

        assert_eq!(keys.resolve(&BossKey::new("renamed")).await.unwrap().as_str(), "1");
        let record = keys.lookup(&BossKey::new("renamed&exp1")).await.unwrap();
        assert_eq!(record.lookup_key.as_str(), "1&5");
        assert_eq!(record.collection_name, "renamed");
        assert!(keys.resolve(&BossKey::new("col1")).await.is_err());
        assert_eq!(
            keys.reverse(&LookupKey::new("1&5")).await.unwrap(),
            BossKey::new("renamed&exp1")
        );
        // Sibling with a shared string prefix is untouched
        assert_eq!(keys.resolve(&BossKey::new("col1-22")).await.unwrap().as_str(), "2");
    }
}
