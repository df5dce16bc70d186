use loan_scorecard::config::AppConfig;
use loan_scorecard::error::AppError;
use loan_scorecard::ScorecardService;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Scorecard service over the configured stores, bootstrapped from whatever they hold.
pub(crate) fn scorecard_service(config: &AppConfig) -> Result<Arc<ScorecardService>, AppError> {
    let service = ScorecardService::from_config(&config.storage, config.sync)?;
    Ok(Arc::new(service))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| AppError::Input {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
