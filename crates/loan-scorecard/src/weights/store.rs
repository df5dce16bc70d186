use std::collections::BTreeMap;
use std::fmt;

use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id vocabulary a store speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// Registry ids, weights as fractions.
    Flat,
    /// Table ids with a category column, weights as percentages.
    Table,
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingScheme::Flat => f.write_str("flat"),
            NamingScheme::Table => f.write_str("table"),
        }
    }
}

/// One row of the categorized weight table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub variable_id: String,
    pub category: String,
    pub weight_percent: f64,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Store contents in the store's own vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredWeights {
    Flat(BTreeMap<String, f64>),
    Table(Vec<WeightRow>),
}

impl StoredWeights {
    pub fn scheme(&self) -> NamingScheme {
        match self {
            StoredWeights::Flat(_) => NamingScheme::Flat,
            StoredWeights::Table(_) => NamingScheme::Table,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StoredWeights::Flat(weights) => weights.is_empty(),
            StoredWeights::Table(rows) => !rows.iter().any(|row| row.is_active),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{store}: i/o failure: {source}")]
    Io {
        store: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{store}: malformed weight document: {source}")]
    Json {
        store: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{store}: malformed weight table: {source}")]
    Csv {
        store: String,
        #[source]
        source: csv::Error,
    },
    #[error("{store} holds {expected} weights and cannot accept another layout")]
    SchemeMismatch {
        store: String,
        expected: NamingScheme,
    },
    #[error("{store} is unavailable: {reason}")]
    Unavailable { store: String, reason: String },
}

impl StoreError {
    pub(crate) fn io(store: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            store: store.to_string(),
            source,
        }
    }
}

/// Persistence backend for one copy of the weight configuration.
///
/// Writes are two-phase: `stage` prepares the new contents without making them visible,
/// and `StagedWrite::commit` publishes them. Dropping a staged write discards it.
pub trait WeightStore: Send + Sync {
    fn name(&self) -> &str;

    fn scheme(&self) -> NamingScheme;

    fn read(&self) -> Result<StoredWeights, StoreError>;

    fn stage(&self, weights: &StoredWeights) -> Result<Box<dyn StagedWrite>, StoreError>;
}

pub trait StagedWrite: Send {
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Staged write backed by a temporary file renamed into place on commit.
pub(crate) struct StagedFile {
    store: String,
    file: AtomicWriteFile,
}

impl StagedFile {
    pub(crate) fn new(store: &str, file: AtomicWriteFile) -> Self {
        Self {
            store: store.to_string(),
            file,
        }
    }
}

impl StagedWrite for StagedFile {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let StagedFile { store, file } = *self;
        file.commit().map_err(|source| StoreError::io(&store, source))
    }
}

/// Open an atomic write handle, creating the parent directory first.
pub(crate) fn open_atomic(store: &str, path: &std::path::Path) -> Result<AtomicWriteFile, StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::io(store, source))?;
    }
    AtomicWriteFile::open(path).map_err(|source| StoreError::io(store, source))
}
