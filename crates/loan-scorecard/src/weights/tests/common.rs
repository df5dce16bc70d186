use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::weights::{
    ConfigurationHistory, IdMapping, MappingEntry, NamingScheme, RetryPolicy, StagedWrite,
    StoreError, StoredWeights, WeightSet, WeightStore, WeightSynchronizer,
};

/// In-memory store with scripted failures.
pub(crate) struct MemoryStore {
    name: String,
    scheme: NamingScheme,
    contents: Arc<Mutex<StoredWeights>>,
    stage_failures: AtomicUsize,
    commit_failures: Arc<AtomicUsize>,
    commits_allowed: Arc<Mutex<Option<usize>>>,
}

impl MemoryStore {
    pub(crate) fn flat(name: &str) -> Self {
        Self::with_contents(name, StoredWeights::Flat(BTreeMap::new()))
    }

    pub(crate) fn table(name: &str) -> Self {
        Self::with_contents(name, StoredWeights::Table(Vec::new()))
    }

    fn with_contents(name: &str, contents: StoredWeights) -> Self {
        Self {
            name: name.to_string(),
            scheme: contents.scheme(),
            contents: Arc::new(Mutex::new(contents)),
            stage_failures: AtomicUsize::new(0),
            commit_failures: Arc::new(AtomicUsize::new(0)),
            commits_allowed: Arc::new(Mutex::new(None)),
        }
    }

    /// Fail the next `count` stage calls.
    pub(crate) fn failing_stages(self, count: usize) -> Self {
        self.stage_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fail the next `count` commits.
    pub(crate) fn failing_commits(self, count: usize) -> Self {
        self.commit_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Let `count` commits through, then fail every later one.
    pub(crate) fn commits_then_fails(self, count: usize) -> Self {
        *self.commits_allowed.lock() = Some(count);
        self
    }

    /// Clear every scripted failure.
    pub(crate) fn recover(&self) {
        self.stage_failures.store(0, Ordering::SeqCst);
        self.commit_failures.store(0, Ordering::SeqCst);
        *self.commits_allowed.lock() = None;
    }

    pub(crate) fn contents(&self) -> StoredWeights {
        self.contents.lock().clone()
    }
}

struct MemoryWrite {
    store: String,
    target: Arc<Mutex<StoredWeights>>,
    payload: StoredWeights,
    commit_failures: Arc<AtomicUsize>,
    commits_allowed: Arc<Mutex<Option<usize>>>,
}

impl StagedWrite for MemoryWrite {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let unavailable = |reason: &str| StoreError::Unavailable {
            store: self.store.clone(),
            reason: reason.to_string(),
        };

        if take_one(&self.commit_failures) {
            return Err(unavailable("scripted commit failure"));
        }
        {
            let mut allowed = self.commits_allowed.lock();
            match allowed.as_mut() {
                Some(0) => return Err(unavailable("store went away")),
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }

        *self.target.lock() = self.payload.clone();
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl WeightStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> NamingScheme {
        self.scheme
    }

    fn read(&self) -> Result<StoredWeights, StoreError> {
        Ok(self.contents())
    }

    fn stage(&self, weights: &StoredWeights) -> Result<Box<dyn StagedWrite>, StoreError> {
        if take_one(&self.stage_failures) {
            return Err(StoreError::Unavailable {
                store: self.name.clone(),
                reason: "scripted stage failure".to_string(),
            });
        }
        if weights.scheme() != self.scheme {
            return Err(StoreError::SchemeMismatch {
                store: self.name.clone(),
                expected: self.scheme,
            });
        }

        Ok(Box::new(MemoryWrite {
            store: self.name.clone(),
            target: Arc::clone(&self.contents),
            payload: weights.clone(),
            commit_failures: Arc::clone(&self.commit_failures),
            commits_allowed: Arc::clone(&self.commits_allowed),
        }))
    }
}

pub(crate) fn mapping() -> IdMapping {
    IdMapping::new([
        MappingEntry::new("credit_score", "credit_score", "Core Credit Variables"),
        MappingEntry::new("credit_vintage", "credit_vintage_months", "Behavioral Analytics"),
        MappingEntry::new("foir", "foir", "Core Credit Variables"),
    ])
    .expect("valid mapping")
}

pub(crate) fn weights(entries: &[(&str, f64)]) -> WeightSet {
    entries.iter().map(|(id, weight)| (*id, *weight)).collect()
}

pub(crate) fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    }
}

pub(crate) fn synchronizer(stores: Vec<Arc<dyn WeightStore>>) -> WeightSynchronizer {
    WeightSynchronizer::new(stores, mapping(), ConfigurationHistory::new(3), quick_retry())
}

pub(crate) fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "loan-scorecard-{label}-{}-{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

pub(crate) fn assert_same_weights(left: &WeightSet, right: &WeightSet) {
    assert_eq!(
        left.ids().collect::<Vec<_>>(),
        right.ids().collect::<Vec<_>>()
    );
    for (id, weight) in left.iter() {
        let other = right.get(id).expect("same ids");
        assert!((weight - other).abs() < 1e-9, "{id}: {weight} vs {other}");
    }
}
