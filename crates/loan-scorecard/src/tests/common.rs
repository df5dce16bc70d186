use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use axum::response::Response;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{StorageConfig, SyncConfig};
use crate::scoring::{standard_engine, ApplicantAttributes};
use crate::service::ScorecardService;
use crate::weights::tests::common::{quick_retry, scratch_dir, MemoryStore};
use crate::weights::{
    ConfigurationHistory, IdMapping, NamingScheme, StagedWrite, StoreError, StoredWeights,
    WeightStore, WeightSynchronizer,
};

pub(super) fn storage(dir: &std::path::Path) -> StorageConfig {
    StorageConfig::in_dir(dir)
}

pub(super) fn fast_sync() -> SyncConfig {
    SyncConfig {
        max_attempts: 2,
        retry_backoff: std::time::Duration::ZERO,
    }
}

/// File-backed service in a fresh scratch directory.
pub(super) fn file_service(label: &str) -> (Arc<ScorecardService>, PathBuf) {
    let dir = scratch_dir(label);
    let service = ScorecardService::from_config(&storage(&dir), fast_sync())
        .expect("service builds from scratch storage");
    (Arc::new(service), dir)
}

/// Service over two in-memory stores; the first accepts one commit, the second none.
pub(super) fn diverging_service() -> (Arc<ScorecardService>, Arc<MemoryStore>) {
    let flat = Arc::new(MemoryStore::flat("flat").commits_then_fails(1));
    let table = Arc::new(MemoryStore::table("table").failing_commits(usize::MAX));
    let engine = standard_engine().expect("default registry is valid");
    let mapping = IdMapping::from_registry(engine.registry()).expect("mapping");
    let synchronizer = WeightSynchronizer::new(
        vec![
            flat.clone() as Arc<dyn WeightStore>,
            table as Arc<dyn WeightStore>,
        ],
        mapping,
        ConfigurationHistory::new(3),
        quick_retry(),
    );
    let service = ScorecardService::new(engine, synchronizer).expect("service builds");
    (Arc::new(service), flat)
}

/// Store whose `stage` reports on `entered` and then waits for a message on `release`,
/// holding the writer in the middle of a synchronization.
pub(super) struct GatedStore {
    inner: MemoryStore,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedStore {
    pub(super) fn new(inner: MemoryStore, entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            inner,
            entered: Mutex::new(entered),
            release: Mutex::new(release),
        }
    }
}

impl WeightStore for GatedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn scheme(&self) -> NamingScheme {
        self.inner.scheme()
    }

    fn read(&self) -> Result<StoredWeights, StoreError> {
        self.inner.read()
    }

    fn stage(&self, weights: &StoredWeights) -> Result<Box<dyn StagedWrite>, StoreError> {
        self.entered.lock().send(()).ok();
        self.release.lock().recv().ok();
        self.inner.stage(weights)
    }
}

/// Service whose only store is gated.
pub(super) fn gated_service(store: GatedStore) -> Arc<ScorecardService> {
    let engine = standard_engine().expect("default registry is valid");
    let mapping = IdMapping::from_registry(engine.registry()).expect("mapping");
    let synchronizer = WeightSynchronizer::new(
        vec![Arc::new(store) as Arc<dyn WeightStore>],
        mapping,
        ConfigurationHistory::new(3),
        quick_retry(),
    );
    Arc::new(ScorecardService::new(engine, synchronizer).expect("service builds"))
}

pub(super) fn perfect_applicant() -> ApplicantAttributes {
    ApplicantAttributes::new()
        .with("pan", "ABCDE1234F")
        .with("writeoff_flag", false)
        .with("credit_score", 750)
        .with("foir", "25%")
        .with("dpd30plus", 0)
        .with("enquiry_count", 0)
        .with("monthly_income", 55_000)
        .with("age", 32)
        .with("credit_vintage", 84)
        .with("loan_mix_type", "PL/HL/CC")
        .with("loan_completion_ratio", 0.9)
        .with("defaulted_loans", 0)
        .with("job_type", "Government/PSU")
        .with("employment_tenure", 72)
        .with("company_stability", "Fortune 500")
        .with("account_vintage", 96)
        .with("avg_monthly_balance", 150_000)
        .with("bounce_frequency", 0)
        .with("geographic_risk", "Metro Tier 1")
        .with("mobile_number_vintage", 120)
        .with("digital_engagement", 92)
        .with("unsecured_loan_amount", 75_000)
        .with("outstanding_amount_percent", 0.1)
        .with("our_lender_exposure", 1)
        .with("channel_type", "Merchant/Referral")
}

pub(super) async fn read_json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
