use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{StorageConfig, SyncConfig};
use crate::scoring::{
    standard_engine, ApplicantAttributes, RegistryError, ScoringEngine, ScoringError,
    ScoringResult, VariableDefinition, VariableId, VariableScoringRegistry,
};
use crate::weights::{
    normalize, table_id_for, ActiveWeights, ConfigurationHistory, FlatFileStore, HistoryEntry,
    IdMapping, MappingEntry, MappingError, NamingScheme, StoreError, SyncError, SyncState,
    TableFileStore, WeightInvariantViolation, WeightPublisher, WeightSet, WeightStore,
    WeightSynchronizer,
};

#[derive(Debug, thiserror::Error)]
pub enum WeightServiceError {
    #[error("variable '{0}' is not registered")]
    UnknownVariable(VariableId),
    #[error(transparent)]
    Invariant(#[from] WeightInvariantViolation),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("rollback needs at least one step")]
    InvalidRollback,
    #[error("history holds {available} entries; cannot roll back {steps} steps")]
    NoHistory { steps: usize, available: usize },
}

/// Result of a weight write. A divergence is an expected outcome, not an error: the
/// previous snapshot stays active and further writes are blocked until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SetWeightsOutcome {
    Applied {
        active: ActiveWeights,
    },
    Diverged {
        reasons: Vec<String>,
        active: ActiveWeights,
    },
}

/// Sync state and history as of the last finished write, newest history entry first.
#[derive(Debug, Clone)]
struct WriterStatus {
    state: SyncState,
    history: Vec<HistoryEntry>,
}

impl WriterStatus {
    fn of(writer: &WeightSynchronizer) -> Self {
        let history = writer.history();
        Self {
            state: writer.state().clone(),
            history: history.recent(history.len()),
        }
    }
}

/// Scoring and weight configuration behind one handle.
///
/// Evaluations read `Arc` snapshots of the engine and weights. Writers serialize on the
/// synchronizer mutex for the whole normalize, sync, publish sequence and refresh the
/// status snapshot before releasing it, so status reads never wait on store I/O.
pub struct ScorecardService {
    engine: RwLock<Arc<ScoringEngine>>,
    publisher: WeightPublisher,
    status: RwLock<Arc<WriterStatus>>,
    writer: Mutex<WeightSynchronizer>,
}

impl ScorecardService {
    /// Service over `engine` publishing the registry's default weights until
    /// [`bootstrap`](Self::bootstrap) or a write replaces them.
    pub fn new(
        engine: ScoringEngine,
        synchronizer: WeightSynchronizer,
    ) -> Result<Self, WeightServiceError> {
        let defaults = normalize(&engine.registry().default_weights())?;
        let publisher = WeightPublisher::new(defaults, engine.registry().revision())?;

        Ok(Self {
            engine: RwLock::new(Arc::new(engine)),
            publisher,
            status: RwLock::new(Arc::new(WriterStatus::of(&synchronizer))),
            writer: Mutex::new(synchronizer),
        })
    }

    /// Default engine wired to the file stores named in `storage`.
    pub fn from_config(
        storage: &StorageConfig,
        sync: SyncConfig,
    ) -> Result<Self, WeightServiceError> {
        let engine = standard_engine()?;
        let mapping = IdMapping::from_registry(engine.registry())?;
        let history = ConfigurationHistory::open(&storage.history_file, storage.history_depth)?;
        let stores: Vec<Arc<dyn WeightStore>> = vec![
            Arc::new(FlatFileStore::new(&storage.weights_file)),
            Arc::new(TableFileStore::new(&storage.weights_table)),
        ];

        let synchronizer = WeightSynchronizer::new(stores, mapping, history, sync.into())
            .with_state_file(&storage.sync_state_file)?;
        let service = Self::new(engine, synchronizer)?;
        service.bootstrap()?;
        Ok(service)
    }

    /// Load the active weights from storage.
    ///
    /// Every store is read. When the populated stores agree, the table store wins over the
    /// flat store, and the registry defaults cover empty storage. When they disagree, or
    /// an earlier run left them diverged, writes stay blocked and the last synchronized
    /// configuration from history is served instead (the defaults when there is none).
    /// The loaded set is normalized before publishing.
    pub fn bootstrap(&self) -> Result<Arc<ActiveWeights>, WeightServiceError> {
        let mut writer = self.writer.lock();
        let engine = self.engine_snapshot();
        let registry = engine.registry();

        let mut ordered: Vec<Arc<dyn WeightStore>> = writer.stores().to_vec();
        ordered.sort_by_key(|store| match store.scheme() {
            NamingScheme::Table => 0,
            NamingScheme::Flat => 1,
        });

        let mut loaded = Vec::with_capacity(ordered.len());
        for store in &ordered {
            match writer.pull(store.as_ref()) {
                Ok(weights) if weights.is_empty() => {}
                Ok(weights) => loaded.push((store.name().to_string(), weights)),
                Err(err) => {
                    warn!(store = store.name(), error = %err, "could not load weights; skipping store");
                }
            }
        }

        let disagreements = store_disagreements(&loaded);
        if !disagreements.is_empty() {
            writer.mark_diverged(disagreements);
        }

        let active = if writer.is_diverged() {
            self.publish_last_synced(&writer, registry)
        } else {
            self.publish_first_usable(&loaded, registry)
        };
        self.refresh_status(&writer);
        active
    }

    pub fn score(&self, applicant: &ApplicantAttributes) -> Result<ScoringResult, ScoringError> {
        let engine = self.engine_snapshot();
        let active = self.publisher.snapshot();

        if active.registry_revision == engine.registry().revision() {
            return engine.score(applicant, &active.weights, active.version);
        }

        let mut weights = active.weights.clone();
        weights.retain(|id| engine.registry().contains(id));
        let weights = normalize(&weights)?;
        engine.score(applicant, &weights, active.version)
    }

    pub fn get_weights(&self) -> Arc<ActiveWeights> {
        self.publisher.snapshot()
    }

    pub fn set_weights(&self, weights: WeightSet) -> Result<SetWeightsOutcome, WeightServiceError> {
        self.apply(weights, "Manual weight update")
    }

    pub fn reset_to_defaults(&self) -> Result<SetWeightsOutcome, WeightServiceError> {
        let defaults = self.engine_snapshot().registry().default_weights();
        self.apply(defaults, "Reset to default weights")
    }

    /// Newest first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let status = Arc::clone(&self.status.read());
        status.history.iter().take(limit).cloned().collect()
    }

    /// Re-apply the configuration `steps` entries before the newest one.
    pub fn rollback(&self, steps: usize) -> Result<SetWeightsOutcome, WeightServiceError> {
        if steps == 0 {
            return Err(WeightServiceError::InvalidRollback);
        }

        let target = {
            let writer = self.writer.lock();
            let history = writer.history();
            history
                .back(steps)
                .map(|entry| entry.weights.clone())
                .ok_or(WeightServiceError::NoHistory {
                    steps,
                    available: history.len(),
                })?
        };

        self.apply(target, &format!("Rollback {steps} step(s)"))
    }

    /// Re-sync the active snapshot to every store and clear a divergence.
    pub fn resolve_divergence(&self) -> Result<Arc<ActiveWeights>, WeightServiceError> {
        let mut writer = self.writer.lock();
        let active = self.publisher.snapshot();
        let resolved = writer.resolve(&active.weights);
        self.refresh_status(&writer);
        resolved?;
        Ok(active)
    }

    pub fn sync_state(&self) -> SyncState {
        self.status.read().state.clone()
    }

    /// Add or replace a variable. The new registry is swapped in whole; active weights
    /// are re-normalized against it at scoring time until the next write.
    pub fn register_variable(&self, definition: VariableDefinition) -> Result<(), WeightServiceError> {
        let mut writer = self.writer.lock();
        let current = self.engine_snapshot();

        let flat_id = definition.id.as_str().to_string();
        let mapping_entry = MappingEntry::new(
            flat_id.clone(),
            table_id_for(&flat_id),
            definition.category.clone(),
        );

        let mut registry = current.registry().clone();
        registry.register(definition)?;
        if writer.mapping().by_flat(&flat_id).is_none() {
            writer.mapping_mut().insert(mapping_entry)?;
        }

        *self.engine.write() = Arc::new(current.with_registry(registry));
        info!(variable = %flat_id, "registered scorecard variable");
        Ok(())
    }

    pub fn unregister_variable(&self, id: &VariableId) -> Option<VariableDefinition> {
        let _writer = self.writer.lock();
        let current = self.engine_snapshot();

        let mut registry = current.registry().clone();
        let removed = registry.unregister(id)?;
        *self.engine.write() = Arc::new(current.with_registry(registry));
        info!(variable = %id, "unregistered scorecard variable");
        Some(removed)
    }

    pub fn engine(&self) -> Arc<ScoringEngine> {
        self.engine_snapshot()
    }

    fn engine_snapshot(&self) -> Arc<ScoringEngine> {
        Arc::clone(&self.engine.read())
    }

    fn apply(&self, weights: WeightSet, description: &str) -> Result<SetWeightsOutcome, WeightServiceError> {
        let mut writer = self.writer.lock();
        let engine = self.engine_snapshot();
        let registry = engine.registry();

        if let Some(unknown) = weights.ids().find(|id| !registry.contains(id)) {
            return Err(WeightServiceError::UnknownVariable(unknown.clone()));
        }

        let normalized = normalize(&weights)?;
        let synced = writer.sync_all(&normalized, description);
        self.refresh_status(&writer);
        match synced {
            Ok(_) => {
                let active = self.publisher.publish(normalized, registry.revision())?;
                Ok(SetWeightsOutcome::Applied {
                    active: active.as_ref().clone(),
                })
            }
            Err(SyncError::Diverged { reasons }) => {
                error!(reasons = ?reasons, "weight update left stores diverged; keeping previous weights");
                Ok(SetWeightsOutcome::Diverged {
                    reasons,
                    active: self.publisher.snapshot().as_ref().clone(),
                })
            }
            Err(SyncError::Blocked { reasons }) => {
                warn!(reasons = ?reasons, description, "weight write refused while stores are diverged");
                Ok(SetWeightsOutcome::Diverged {
                    reasons,
                    active: self.publisher.snapshot().as_ref().clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn refresh_status(&self, writer: &WeightSynchronizer) {
        *self.status.write() = Arc::new(WriterStatus::of(writer));
    }

    fn publish_first_usable(
        &self,
        loaded: &[(String, WeightSet)],
        registry: &VariableScoringRegistry,
    ) -> Result<Arc<ActiveWeights>, WeightServiceError> {
        for (store, weights) in loaded {
            let mut weights = weights.clone();
            weights.retain(|id| registry.contains(id));
            if weights.is_empty() {
                continue;
            }

            match normalize(&weights) {
                Ok(weights) => {
                    info!(store = store.as_str(), variables = weights.len(), "loaded stored weights");
                    return Ok(self.publisher.publish(weights, registry.revision())?);
                }
                Err(err) => {
                    warn!(store = store.as_str(), error = %err, "stored weights unusable; trying next store");
                }
            }
        }

        info!("no stored weights found; using registry defaults");
        let defaults = normalize(&registry.default_weights())?;
        Ok(self.publisher.publish(defaults, registry.revision())?)
    }

    fn publish_last_synced(
        &self,
        writer: &WeightSynchronizer,
        registry: &VariableScoringRegistry,
    ) -> Result<Arc<ActiveWeights>, WeightServiceError> {
        let recorded = writer.history().latest().and_then(|entry| {
            let mut weights = entry.weights.clone();
            weights.retain(|id| registry.contains(id));
            normalize(&weights).ok().filter(|weights| !weights.is_empty())
        });

        let weights = match recorded {
            Some(weights) => {
                warn!(variables = weights.len(), "stores diverged; serving the last synchronized weights");
                weights
            }
            None => {
                warn!("stores diverged with no history; serving registry defaults");
                normalize(&registry.default_weights())?
            }
        };
        Ok(self.publisher.publish(weights, registry.revision())?)
    }
}

/// One reason per populated store whose weights differ from the first populated store.
fn store_disagreements(loaded: &[(String, WeightSet)]) -> Vec<String> {
    let Some((first_name, first)) = loaded.first() else {
        return Vec::new();
    };

    loaded[1..]
        .iter()
        .filter_map(|(name, weights)| {
            let differing = first.differing_ids(weights);
            (!differing.is_empty()).then(|| {
                let ids: Vec<&str> = differing.iter().map(VariableId::as_str).collect();
                format!("{first_name} and {name} disagree on {}", ids.join(", "))
            })
        })
        .collect()
}
