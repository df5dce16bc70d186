use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::history::{ConfigurationHistory, HistoryEntry};
use super::mapping::IdMapping;
use super::set::{WeightInvariantViolation, WeightSet};
use super::store::{
    open_atomic, NamingScheme, StagedWrite, StoreError, StoredWeights, WeightRow, WeightStore,
};
use crate::config::SyncConfig;
use crate::scoring::VariableId;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("variable '{id}' has no {scheme} mapping")]
    UnmappedId { id: String, scheme: NamingScheme },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invariant(#[from] WeightInvariantViolation),
    #[error("weight update rejected, stores left unchanged: {}", reasons.join("; "))]
    Rejected { reasons: Vec<String> },
    #[error("weight stores have diverged: {}", reasons.join("; "))]
    Diverged { reasons: Vec<String> },
    #[error("weight writes are blocked until the stores are resolved: {}", reasons.join("; "))]
    Blocked { reasons: Vec<String> },
}

const STATE_STORE: &str = "sync state";

/// Whether the stores are known to agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    InSync,
    Diverged { reasons: Vec<String> },
}

impl SyncState {
    /// Read a persisted state. A missing file reads as `InSync`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match File::open(path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                StoreError::Json {
                    store: STATE_STORE.to_string(),
                    source,
                }
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(SyncState::InSync),
            Err(err) => Err(StoreError::io(STATE_STORE, err)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let mut file = open_atomic(STATE_STORE, path)?;
        serde_json::to_writer_pretty(&mut file, self).map_err(|source| StoreError::Json {
            store: STATE_STORE.to_string(),
            source,
        })?;
        file.commit()
            .map_err(|source| StoreError::io(STATE_STORE, source))
    }
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn run<T>(
        &self,
        store: &str,
        action: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    warn!(store, action, attempt, error = %err, "store operation failed; retrying");
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl From<SyncConfig> for RetryPolicy {
    fn from(config: SyncConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.retry_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        SyncConfig::default().into()
    }
}

/// Summary of a successful synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub stores: Vec<String>,
    pub entry: HistoryEntry,
}

/// Keeps every weight store consistent with the canonical weight set.
pub struct WeightSynchronizer {
    stores: Vec<Arc<dyn WeightStore>>,
    mapping: IdMapping,
    history: ConfigurationHistory,
    retry: RetryPolicy,
    state: SyncState,
    state_file: Option<PathBuf>,
}

impl WeightSynchronizer {
    pub fn new(
        stores: Vec<Arc<dyn WeightStore>>,
        mapping: IdMapping,
        history: ConfigurationHistory,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            stores,
            mapping,
            history,
            retry,
            state: SyncState::InSync,
            state_file: None,
        }
    }

    /// Keep the sync state in `path`, resuming whatever an earlier run left there.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        self.state = SyncState::load(&path)?;
        if let SyncState::Diverged { reasons } = &self.state {
            warn!(reasons = ?reasons, "stores were left diverged by an earlier run; writes blocked");
        }
        self.state_file = Some(path);
        Ok(self)
    }

    pub fn stores(&self) -> &[Arc<dyn WeightStore>] {
        &self.stores
    }

    pub fn mapping(&self) -> &IdMapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut IdMapping {
        &mut self.mapping
    }

    pub fn history(&self) -> &ConfigurationHistory {
        &self.history
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn is_diverged(&self) -> bool {
        matches!(self.state, SyncState::Diverged { .. })
    }

    /// Block writes until [`resolve`](Self::resolve) succeeds.
    pub fn mark_diverged(&mut self, reasons: Vec<String>) {
        error!(reasons = ?reasons, "weight stores diverged; writes blocked until resolved");
        self.set_state(SyncState::Diverged { reasons });
    }

    /// Read a store and translate it to canonical ids and fractions.
    pub fn pull(&self, store: &dyn WeightStore) -> Result<WeightSet, SyncError> {
        let stored = self
            .retry
            .run(store.name(), "read", || store.read())?;
        self.from_stored(&stored)
    }

    /// Write `weights` to a single store, outside of history and divergence tracking.
    pub fn push(&self, weights: &WeightSet, store: &dyn WeightStore) -> Result<(), SyncError> {
        let payload = self.to_stored(weights, store.scheme())?;
        self.stage_and_commit(store, &payload)?;
        Ok(())
    }

    /// Propagate `weights` to every store and record the change in history.
    ///
    /// Refused with [`SyncError::Blocked`] while the stores are diverged.
    pub fn sync_all(
        &mut self,
        weights: &WeightSet,
        description: &str,
    ) -> Result<SyncReport, SyncError> {
        if let SyncState::Diverged { reasons } = &self.state {
            return Err(SyncError::Blocked {
                reasons: reasons.clone(),
            });
        }

        self.write_all(weights)?;
        Ok(self.record(weights, description))
    }

    /// Re-synchronize every store with `weights`, clearing a divergence on success.
    pub fn resolve(&mut self, weights: &WeightSet) -> Result<SyncReport, SyncError> {
        self.write_all(weights)?;
        if self.is_diverged() {
            info!("weight stores re-synchronized; divergence cleared");
        }
        self.set_state(SyncState::InSync);
        Ok(self.record(weights, "Divergence resolved"))
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(path) = &self.state_file {
            if let Err(err) = self.state.save(path) {
                error!(error = %err, "failed to persist sync state");
            }
        }
    }

    fn record(&mut self, weights: &WeightSet, description: &str) -> SyncReport {
        let entry = HistoryEntry::new(weights.clone(), description);
        if let Err(err) = self.history.record(entry.clone()) {
            warn!(error = %err, "failed to persist configuration history");
        }

        SyncReport {
            stores: self
                .stores
                .iter()
                .map(|store| store.name().to_string())
                .collect(),
            entry,
        }
    }

    fn write_all(&mut self, weights: &WeightSet) -> Result<(), SyncError> {
        weights.validate()?;

        let payloads = self
            .stores
            .iter()
            .map(|store| self.to_stored(weights, store.scheme()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut priors = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            match self.retry.run(store.name(), "read", || store.read()) {
                Ok(prior) => priors.push(prior),
                Err(err) => {
                    return Err(SyncError::Rejected {
                        reasons: vec![err.to_string()],
                    })
                }
            }
        }

        let mut staged: Vec<Box<dyn StagedWrite>> = Vec::with_capacity(self.stores.len());
        for (store, payload) in self.stores.iter().zip(&payloads) {
            match self.retry.run(store.name(), "stage", || store.stage(payload)) {
                Ok(write) => staged.push(write),
                Err(err) => {
                    // Dropping the staged writes discards them.
                    drop(staged);
                    warn!(store = store.name(), error = %err, "staging failed; update discarded");
                    return Err(SyncError::Rejected {
                        reasons: vec![err.to_string()],
                    });
                }
            }
        }

        for (index, write) in staged.into_iter().enumerate() {
            let store = self.stores[index].as_ref();
            if let Err(err) = self.commit_with_retry(store, write, &payloads[index]) {
                let mut reasons = vec![err.to_string()];
                let restore_failures = self.restore(&priors, index);
                if restore_failures.is_empty() {
                    warn!(store = store.name(), error = %err, "commit failed; earlier stores restored");
                    return Err(SyncError::Rejected { reasons });
                }

                reasons.extend(restore_failures);
                self.mark_diverged(reasons.clone());
                return Err(SyncError::Diverged { reasons });
            }
        }

        Ok(())
    }

    fn commit_with_retry(
        &self,
        store: &dyn WeightStore,
        first: Box<dyn StagedWrite>,
        payload: &StoredWeights,
    ) -> Result<(), StoreError> {
        let mut pending = Some(first);
        self.retry.run(store.name(), "commit", || {
            let write = match pending.take() {
                Some(write) => write,
                None => store.stage(payload)?,
            };
            write.commit()
        })
    }

    /// Put the first `committed` stores back to their prior contents. Returns the
    /// failures, one per store that could not be restored.
    fn restore(&self, priors: &[StoredWeights], committed: usize) -> Vec<String> {
        self.stores[..committed]
            .iter()
            .zip(priors)
            .filter_map(|(store, prior)| {
                self.stage_and_commit(store.as_ref(), prior)
                    .err()
                    .map(|err| format!("restoring {} failed: {err}", store.name()))
            })
            .collect()
    }

    fn stage_and_commit(
        &self,
        store: &dyn WeightStore,
        payload: &StoredWeights,
    ) -> Result<(), StoreError> {
        self.retry
            .run(store.name(), "write", || store.stage(payload)?.commit())
    }

    fn to_stored(&self, weights: &WeightSet, scheme: NamingScheme) -> Result<StoredWeights, SyncError> {
        match scheme {
            NamingScheme::Flat => {
                let mut flat = BTreeMap::new();
                for (id, weight) in weights.iter() {
                    let entry = self.mapping.by_flat(id.as_str()).ok_or_else(|| {
                        SyncError::UnmappedId {
                            id: id.to_string(),
                            scheme,
                        }
                    })?;
                    flat.insert(entry.flat_id.clone(), weight);
                }
                Ok(StoredWeights::Flat(flat))
            }
            NamingScheme::Table => {
                let updated_at = Utc::now();
                let rows = weights
                    .iter()
                    .map(|(id, weight)| {
                        let entry = self.mapping.by_flat(id.as_str()).ok_or_else(|| {
                            SyncError::UnmappedId {
                                id: id.to_string(),
                                scheme,
                            }
                        })?;
                        Ok(WeightRow {
                            variable_id: entry.table_id.clone(),
                            category: entry.category.clone(),
                            weight_percent: weight * 100.0,
                            is_active: true,
                            updated_at,
                        })
                    })
                    .collect::<Result<Vec<_>, SyncError>>()?;
                Ok(StoredWeights::Table(rows))
            }
        }
    }

    fn from_stored(&self, stored: &StoredWeights) -> Result<WeightSet, SyncError> {
        match stored {
            StoredWeights::Flat(flat) => flat
                .iter()
                .map(|(id, weight)| {
                    let entry = self.mapping.by_flat(id).ok_or_else(|| SyncError::UnmappedId {
                        id: id.clone(),
                        scheme: NamingScheme::Flat,
                    })?;
                    Ok((VariableId::new(entry.flat_id.clone()), *weight))
                })
                .collect(),
            StoredWeights::Table(rows) => rows
                .iter()
                .filter(|row| row.is_active)
                .map(|row| {
                    let entry = self.mapping.by_table(&row.variable_id).ok_or_else(|| {
                        SyncError::UnmappedId {
                            id: row.variable_id.clone(),
                            scheme: NamingScheme::Table,
                        }
                    })?;
                    Ok((VariableId::new(entry.flat_id.clone()), row.weight_percent / 100.0))
                })
                .collect(),
        }
    }
}
