use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::set::WeightSet;
use super::store::{open_atomic, StoreError};

const STORE_NAME: &str = "config-history";

/// Snapshot of one applied weight configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub weights: WeightSet,
    pub total: f64,
    pub description: String,
}

impl HistoryEntry {
    pub fn new(weights: WeightSet, description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            total: weights.total(),
            weights,
            description: description.into(),
        }
    }
}

/// Bounded history of applied configurations, oldest evicted first.
///
/// On disk the history is a JSON array with the newest entry last.
#[derive(Debug, Clone)]
pub struct ConfigurationHistory {
    entries: VecDeque<HistoryEntry>,
    depth: usize,
    path: Option<PathBuf>,
}

impl ConfigurationHistory {
    /// In-memory history holding at most `depth` entries.
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            depth: depth.max(1),
            path: None,
        }
    }

    /// History backed by `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>, depth: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let mut history = Self::new(depth);

        match File::open(&path) {
            Ok(file) => {
                let entries: Vec<HistoryEntry> = serde_json::from_reader(BufReader::new(file))
                    .map_err(|source| StoreError::Json {
                        store: STORE_NAME.to_string(),
                        source,
                    })?;
                history.entries = entries.into();
                history.trim();
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::io(STORE_NAME, err)),
        }

        history.path = Some(path);
        Ok(history)
    }

    /// Append an entry in memory, then persist. The entry is kept even when persisting fails.
    pub fn record(&mut self, entry: HistoryEntry) -> Result<(), StoreError> {
        self.entries.push_back(entry);
        self.trim();
        self.persist()
    }

    /// Newest first, at most `limit` entries.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Entry `steps` back from the newest; `0` is the newest.
    pub fn back(&self, steps: usize) -> Option<&HistoryEntry> {
        self.entries.iter().rev().nth(steps)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn trim(&mut self) {
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut file = open_atomic(STORE_NAME, path)?;
        serde_json::to_writer_pretty(&mut file, &self.entries).map_err(|source| {
            StoreError::Json {
                store: STORE_NAME.to_string(),
                source,
            }
        })?;
        file.commit()
            .map_err(|source| StoreError::io(STORE_NAME, source))
    }
}
