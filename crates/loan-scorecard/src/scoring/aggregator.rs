use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{ApplicantAttributes, AttributeValue, Provenance, VariableId};
use super::registry::VariableScoringRegistry;
use crate::weights::{WeightInvariantViolation, WeightSet};

/// Per-variable line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBreakdown {
    pub variable: VariableId,
    pub category: String,
    pub value: Option<AttributeValue>,
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
    pub provenance: Provenance,
}

/// Weighted sum over every variable in the weight set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub raw_weighted_score: f64,
    pub total_weight: f64,
    pub normalized_score: f64,
    pub breakdown: Vec<VariableBreakdown>,
}

impl Aggregation {
    pub fn fallback_count(&self) -> usize {
        self.breakdown
            .iter()
            .filter(|line| line.provenance == Provenance::Fallback)
            .count()
    }
}

/// Aggregate `applicant` against `weights`. The weight set must satisfy the sum invariant.
///
/// Ids are visited in weight-set order so the summation is reproducible. Ids unknown to
/// the registry are skipped; registered variables missing from the weight set do not
/// participate.
pub fn aggregate(
    registry: &VariableScoringRegistry,
    applicant: &ApplicantAttributes,
    weights: &WeightSet,
) -> Result<Aggregation, WeightInvariantViolation> {
    weights.validate()?;

    let mut raw_weighted_score = 0.0;
    let mut total_weight = 0.0;
    let mut breakdown = Vec::with_capacity(weights.len());

    for (variable, weight) in weights.iter() {
        let value = applicant.get(variable.as_str());
        let Some(scored) = registry.score(variable, value) else {
            warn!(%variable, "weight set references an unregistered variable; skipping");
            continue;
        };
        let category = registry
            .get(variable)
            .map(|definition| definition.category.clone())
            .unwrap_or_default();

        let contribution = scored.score * weight;
        raw_weighted_score += contribution;
        total_weight += weight;

        breakdown.push(VariableBreakdown {
            variable: variable.clone(),
            category,
            value: value.cloned(),
            score: scored.score,
            weight,
            contribution,
            provenance: scored.provenance,
        });
    }

    let normalized_score = if total_weight > 0.0 {
        (raw_weighted_score / total_weight * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Ok(Aggregation {
        raw_weighted_score,
        total_weight,
        normalized_score,
        breakdown,
    })
}
