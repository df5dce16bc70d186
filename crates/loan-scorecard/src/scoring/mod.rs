//! Applicant scoring: variable registry, clearance rules, weighted aggregation, bucket
//! classification, and post-score bucket movements.

mod adjustments;
mod aggregator;
mod buckets;
mod clearance;
pub mod defaults;
mod domain;
mod engine;
mod registry;

#[cfg(test)]
mod tests;

pub use adjustments::{
    AdjustmentFactor, BucketAdjuster, BucketAdjustment, BucketMovement, FactorCondition,
};
pub use aggregator::{aggregate, Aggregation, VariableBreakdown};
pub use buckets::{BucketBand, BucketClassifier, BucketConfigError};
pub use clearance::{ClearanceOutcome, ClearanceRule, ClearanceRuleEvaluator, RulePredicate};
pub use domain::{ApplicantAttributes, AttributeValue, Decision, Provenance, VariableId};
pub use engine::{ScoringEngine, ScoringError, ScoringResult};
pub use registry::{
    CategoryScore, RegistryError, ScoreBand, ScoringStrategy, VariableDefinition,
    VariableScore, VariableScoringRegistry,
};

/// Engine wired with the default registry, clearance policy, bucket table and movements.
pub fn standard_engine() -> Result<ScoringEngine, RegistryError> {
    Ok(ScoringEngine::new(
        defaults::standard_registry()?,
        ClearanceRuleEvaluator::standard(),
        BucketClassifier::standard(),
        BucketAdjuster::standard(),
    ))
}
