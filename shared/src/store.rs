use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Identifies one slot at one location. Derived only from the location id and the slot's
/// start timestamp so the same pair maps to the same key on every run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationKey(String);

impl NotificationKey {
    pub fn new(location_id: &str, start_timestamp: &str) -> Self {
        Self(format!("{location_id}-{start_timestamp}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NotificationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys that have already been emailed. Only ever grows; serialized as a sorted JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifiedSet {
    keys: BTreeSet<NotificationKey>,
}

impl NotifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &NotificationKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: NotificationKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationKey> {
        self.keys.iter()
    }
}

impl FromIterator<NotificationKey> for NotifiedSet {
    fn from_iter<T: IntoIterator<Item = NotificationKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Flat-file persistence for the [`NotifiedSet`]. No locking and no atomic rename: a torn
/// write leaves a file that [`NotificationStore::load`] treats as empty.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    path: PathBuf,
}

impl NotificationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_load(&self) -> Result<NotifiedSet, StoreError> {
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str::<NotifiedSet>(&contents)?)
    }

    /// Never fails: a missing, unreadable or corrupt file yields an empty set.
    pub fn load(&self) -> NotifiedSet {
        match self.try_load() {
            Ok(set) => {
                debug!(path = %self.path.display(), keys = set.len(), "loaded notified appointments");
                set
            }
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state file found, starting with an empty set");
                NotifiedSet::new()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = ?e,
                    "could not load notified appointments, starting with an empty set"
                );
                NotifiedSet::new()
            }
        }
    }

    /// Overwrites the file with the full set.
    pub fn save(&self, set: &NotifiedSet) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(set)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), keys = set.len(), "saved notified appointments");
        Ok(())
    }
}
