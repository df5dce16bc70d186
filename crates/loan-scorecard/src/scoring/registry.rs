use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{AttributeValue, Provenance, VariableId};
use crate::weights::WeightSet;

/// Numeric band `[min, max)`, or `[min, max]` when `upper_inclusive` is set; a missing
/// bound is unbounded. Bands are matched in order, so a value sitting on a shared edge goes
/// to the earlier band when that band includes its upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub upper_inclusive: bool,
}

impl ScoreBand {
    pub fn new(min: Option<f64>, max: Option<f64>, score: f64) -> Self {
        Self {
            min,
            max,
            score,
            upper_inclusive: false,
        }
    }

    pub fn inclusive_upper(mut self) -> Self {
        self.upper_inclusive = true;
        self
    }

    pub fn contains(&self, value: f64) -> bool {
        let above_min = self.min.map_or(true, |min| value >= min);
        let below_max = self.max.map_or(true, |max| {
            if self.upper_inclusive {
                value <= max
            } else {
                value < max
            }
        });
        above_min && below_max
    }
}

/// Score assigned to one member of a closed category set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub value: String,
    pub score: f64,
}

impl CategoryScore {
    pub fn new(value: impl Into<String>, score: f64) -> Self {
        Self {
            value: value.into(),
            score,
        }
    }
}

/// Declarative, side-effect free mapping from a raw value to a score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringStrategy {
    Numeric { bands: Vec<ScoreBand> },
    Categorical { categories: Vec<CategoryScore> },
}

impl ScoringStrategy {
    /// Score a raw value, or `None` when the value is absent, unparseable, or outside the
    /// declared domain.
    pub fn evaluate(&self, raw: Option<&AttributeValue>) -> Option<f64> {
        let raw = raw?;
        match self {
            ScoringStrategy::Numeric { bands } => {
                let value = raw.as_number()?;
                bands
                    .iter()
                    .find(|band| band.contains(value))
                    .map(|band| band.score)
            }
            ScoringStrategy::Categorical { categories } => {
                let value = raw.as_text()?;
                categories
                    .iter()
                    .find(|category| category.value == value)
                    .or_else(|| {
                        categories
                            .iter()
                            .find(|category| category.value.eq_ignore_ascii_case(value))
                    })
                    .map(|category| category.score)
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            ScoringStrategy::Numeric { bands } => validate_bands(bands),
            ScoringStrategy::Categorical { categories } => validate_categories(categories),
        }
    }
}

fn validate_score(score: f64) -> Result<(), String> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(format!("band score {score} outside [0, 1]"))
    }
}

fn validate_bands(bands: &[ScoreBand]) -> Result<(), String> {
    if bands.is_empty() {
        return Err("numeric strategy declares no bands".to_string());
    }

    let last = bands.len() - 1;
    for (index, band) in bands.iter().enumerate() {
        validate_score(band.score)?;

        if band.min.is_none() && index != 0 {
            return Err(format!("band {index} is unbounded below but is not the first band"));
        }
        if band.max.is_none() && index != last {
            return Err(format!("band {index} is unbounded above but is not the last band"));
        }
        if let (Some(min), Some(max)) = (band.min, band.max) {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(format!("band {index} has an empty range [{min}, {max})"));
            }
        }
    }

    for (index, pair) in bands.windows(2).enumerate() {
        if pair[0].max != pair[1].min {
            return Err(format!(
                "bands {} and {} are not contiguous ({:?} vs {:?})",
                index,
                index + 1,
                pair[0].max,
                pair[1].min
            ));
        }
    }

    Ok(())
}

fn validate_categories(categories: &[CategoryScore]) -> Result<(), String> {
    if categories.is_empty() {
        return Err("categorical strategy declares no categories".to_string());
    }

    for (index, category) in categories.iter().enumerate() {
        validate_score(category.score)?;
        if category.value.trim().is_empty() {
            return Err(format!("category {index} has an empty value"));
        }
        if categories[..index]
            .iter()
            .any(|earlier| earlier.value.eq_ignore_ascii_case(&category.value))
        {
            return Err(format!("category '{}' declared twice", category.value));
        }
    }

    Ok(())
}

/// Registered scorecard variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub id: VariableId,
    pub display_name: String,
    pub category: String,
    /// Default weight as a fraction; the active weight comes from the published weight set.
    pub weight: f64,
    pub fallback_score: f64,
    pub strategy: ScoringStrategy,
}

/// Score for a single variable, with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableScore {
    pub score: f64,
    pub provenance: Provenance,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("variable '{id}' has an invalid scoring strategy: {reason}")]
    InvalidStrategy { id: VariableId, reason: String },
    #[error("variable '{id}' has an invalid default weight {weight}")]
    InvalidWeight { id: VariableId, weight: f64 },
    #[error("variable '{id}' has a fallback score {score} outside [0, 1]")]
    InvalidFallback { id: VariableId, score: f64 },
}

/// Registry of per-variable scoring strategies keyed by variable id.
#[derive(Debug, Clone, Default)]
pub struct VariableScoringRegistry {
    variables: BTreeMap<VariableId, VariableDefinition>,
    revision: u64,
}

impl VariableScoringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(
        definitions: impl IntoIterator<Item = VariableDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Add or replace a variable. Bumps the revision so weight sets normalized against the
    /// previous variable list are recognised as stale.
    pub fn register(&mut self, definition: VariableDefinition) -> Result<(), RegistryError> {
        definition
            .strategy
            .validate()
            .map_err(|reason| RegistryError::InvalidStrategy {
                id: definition.id.clone(),
                reason,
            })?;

        if !(definition.weight.is_finite() && definition.weight >= 0.0) {
            return Err(RegistryError::InvalidWeight {
                id: definition.id.clone(),
                weight: definition.weight,
            });
        }

        if validate_score(definition.fallback_score).is_err() {
            return Err(RegistryError::InvalidFallback {
                id: definition.id.clone(),
                score: definition.fallback_score,
            });
        }

        self.variables.insert(definition.id.clone(), definition);
        self.revision += 1;
        Ok(())
    }

    pub fn unregister(&mut self, id: &VariableId) -> Option<VariableDefinition> {
        let removed = self.variables.remove(id);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Score `raw` with the variable's strategy, resolving to the fallback score whenever
    /// the strategy cannot. Returns `None` only for an unregistered id.
    pub fn score(&self, id: &VariableId, raw: Option<&AttributeValue>) -> Option<VariableScore> {
        let definition = self.variables.get(id)?;
        let scored = match definition.strategy.evaluate(raw) {
            Some(score) => VariableScore {
                score,
                provenance: Provenance::Scored,
            },
            None => VariableScore {
                score: definition.fallback_score,
                provenance: Provenance::Fallback,
            },
        };
        Some(scored)
    }

    pub fn get(&self, id: &VariableId) -> Option<&VariableDefinition> {
        self.variables.get(id)
    }

    pub fn contains(&self, id: &VariableId) -> bool {
        self.variables.contains_key(id)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.variables.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &VariableId> {
        self.variables.keys()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Default weights as declared on each definition, not normalized.
    pub fn default_weights(&self) -> WeightSet {
        self.variables
            .values()
            .map(|definition| (definition.id.clone(), definition.weight))
            .collect()
    }
}
