//! Weight configuration: the 100% invariant, normalization, the two persistence stores,
//! and the synchronizer keeping them consistent.

mod flat;
mod history;
mod mapping;
mod normalizer;
mod publisher;
mod set;
mod store;
mod sync;
mod table;

#[cfg(test)]
pub(crate) mod tests;

pub use flat::FlatFileStore;
pub use history::{ConfigurationHistory, HistoryEntry};
pub use mapping::{table_id_for, IdMapping, MappingEntry, MappingError};
pub use normalizer::{normalize, validate};
pub use publisher::{ActiveWeights, WeightPublisher};
pub use set::{WeightInvariantViolation, WeightSet, WEIGHT_EPSILON};
pub use store::{NamingScheme, StagedWrite, StoreError, StoredWeights, WeightRow, WeightStore};
pub use sync::{RetryPolicy, SyncError, SyncReport, SyncState, WeightSynchronizer};
pub use table::TableFileStore;
