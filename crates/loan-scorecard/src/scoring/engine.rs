use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::adjustments::{BucketAdjuster, BucketMovement};
use super::aggregator::{aggregate, VariableBreakdown};
use super::buckets::BucketClassifier;
use super::clearance::{ClearanceOutcome, ClearanceRuleEvaluator};
use super::domain::{ApplicantAttributes, Decision};
use super::registry::VariableScoringRegistry;
use crate::weights::{WeightInvariantViolation, WeightSet};

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("active weights are unusable: {0}")]
    Weights(#[from] WeightInvariantViolation),
    #[error("bucket '{bucket}' has no band in the classifier")]
    UnknownBucket { bucket: String },
}

/// Outcome of one evaluation. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub final_score: f64,
    pub raw_weighted_score: f64,
    pub initial_bucket: String,
    pub bucket: String,
    pub decision: Decision,
    pub clearance: ClearanceOutcome,
    pub adjustments: Vec<BucketMovement>,
    pub variable_breakdown: Vec<VariableBreakdown>,
    pub fallback_count: usize,
    pub weights_version: u64,
}

impl ScoringResult {
    pub fn summary(&self) -> String {
        if !self.clearance.passed {
            return format!(
                "rejected at clearance: {}",
                self.clearance.failed_rules.join("; ")
            );
        }

        let movement = if self.initial_bucket == self.bucket {
            String::new()
        } else {
            format!(" (moved from {})", self.initial_bucket)
        };

        format!(
            "score {:.2}, bucket {}{}, decision {}",
            self.final_score,
            self.bucket,
            movement,
            self.decision.label()
        )
    }
}

/// Stateless evaluator: clearance, weighted aggregation, classification, adjustments.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    registry: VariableScoringRegistry,
    clearance: ClearanceRuleEvaluator,
    classifier: BucketClassifier,
    adjuster: BucketAdjuster,
}

impl ScoringEngine {
    pub fn new(
        registry: VariableScoringRegistry,
        clearance: ClearanceRuleEvaluator,
        classifier: BucketClassifier,
        adjuster: BucketAdjuster,
    ) -> Self {
        Self {
            registry,
            clearance,
            classifier,
            adjuster,
        }
    }

    pub fn registry(&self) -> &VariableScoringRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &BucketClassifier {
        &self.classifier
    }

    /// Copy of this engine with a different registry.
    pub fn with_registry(&self, registry: VariableScoringRegistry) -> Self {
        Self {
            registry,
            ..self.clone()
        }
    }

    pub fn score(
        &self,
        applicant: &ApplicantAttributes,
        weights: &WeightSet,
        weights_version: u64,
    ) -> Result<ScoringResult, ScoringError> {
        let clearance = self.clearance.evaluate(applicant);
        let aggregation = aggregate(&self.registry, applicant, weights)?;
        let fallback_count = aggregation.fallback_count();

        if fallback_count * 2 > aggregation.breakdown.len() {
            warn!(
                fallback_count,
                variables = aggregation.breakdown.len(),
                "most variables resolved to fallback scores"
            );
        }

        if !clearance.passed {
            let lowest = self.classifier.lowest().bucket.clone();
            let variable_breakdown = aggregation
                .breakdown
                .into_iter()
                .map(|line| VariableBreakdown {
                    weight: 0.0,
                    contribution: 0.0,
                    ..line
                })
                .collect();

            debug!(failed = clearance.failed_rules.len(), "clearance rejected applicant");

            return Ok(ScoringResult {
                final_score: 0.0,
                raw_weighted_score: 0.0,
                initial_bucket: lowest.clone(),
                bucket: lowest,
                decision: Decision::Reject,
                clearance,
                adjustments: Vec::new(),
                variable_breakdown,
                fallback_count,
                weights_version,
            });
        }

        let final_score = aggregation.normalized_score;
        let initial_bucket = self.classifier.classify(final_score).bucket.clone();
        let (adjustments, bucket) = self.adjuster.apply(&initial_bucket, applicant);
        let decision = self
            .classifier
            .band_for(&bucket)
            .map(|band| band.decision)
            .ok_or_else(|| ScoringError::UnknownBucket {
                bucket: bucket.clone(),
            })?;

        debug!(
            final_score,
            %initial_bucket,
            %bucket,
            decision = decision.label(),
            weights_version,
            "applicant scored"
        );

        Ok(ScoringResult {
            final_score,
            raw_weighted_score: aggregation.raw_weighted_score,
            initial_bucket,
            bucket,
            decision,
            clearance,
            adjustments,
            variable_breakdown: aggregation.breakdown,
            fallback_count,
            weights_version,
        })
    }
}

