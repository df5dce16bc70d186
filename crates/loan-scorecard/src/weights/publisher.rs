use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::set::{WeightInvariantViolation, WeightSet};

/// Published weight snapshot read by every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveWeights {
    pub version: u64,
    pub weights: WeightSet,
    /// Registry revision the weights were normalized against.
    pub registry_revision: u64,
    pub published_at: DateTime<Utc>,
}

/// Snapshot-and-swap holder of the active weights. Readers clone an `Arc` and never
/// observe a partially applied set.
#[derive(Debug)]
pub struct WeightPublisher {
    current: RwLock<Arc<ActiveWeights>>,
}

impl WeightPublisher {
    pub fn new(
        weights: WeightSet,
        registry_revision: u64,
    ) -> Result<Self, WeightInvariantViolation> {
        weights.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(ActiveWeights {
                version: 1,
                weights,
                registry_revision,
                published_at: Utc::now(),
            })),
        })
    }

    pub fn snapshot(&self) -> Arc<ActiveWeights> {
        Arc::clone(&self.current.read())
    }

    pub fn publish(
        &self,
        weights: WeightSet,
        registry_revision: u64,
    ) -> Result<Arc<ActiveWeights>, WeightInvariantViolation> {
        weights.validate()?;

        let mut current = self.current.write();
        let next = Arc::new(ActiveWeights {
            version: current.version + 1,
            weights,
            registry_revision,
            published_at: Utc::now(),
        });
        *current = Arc::clone(&next);
        drop(current);

        info!(
            version = next.version,
            variables = next.weights.len(),
            registry_revision,
            "published weight set"
        );
        Ok(next)
    }
}
