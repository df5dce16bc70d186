use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scoring::VariableId;

/// Tolerance for the 100% sum invariant.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Ordered `variable_id -> weight` mapping. Iteration follows id order, so every sum over
/// a weight set is computed in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightSet(BTreeMap<VariableId, f64>);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightInvariantViolation {
    #[error("weight set is empty")]
    Empty,
    #[error("weight for '{variable}' is negative ({weight})")]
    Negative { variable: VariableId, weight: f64 },
    #[error("weight for '{variable}' is not a finite number")]
    NonFinite { variable: VariableId },
    #[error("weights sum to {total:.6}, expected 1.0")]
    Sum { total: f64 },
}

impl WeightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<VariableId>, weight: f64) -> Option<f64> {
        self.0.insert(id.into(), weight)
    }

    pub fn remove(&mut self, id: &VariableId) -> Option<f64> {
        self.0.remove(id)
    }

    pub fn get(&self, id: &VariableId) -> Option<f64> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &VariableId) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariableId, f64)> {
        self.0.iter().map(|(id, weight)| (id, *weight))
    }

    pub fn ids(&self) -> impl Iterator<Item = &VariableId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Keep only the ids accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&VariableId) -> bool) {
        self.0.retain(|id, _| keep(id));
    }

    /// Ids held by only one side, or whose weights differ by more than `WEIGHT_EPSILON`.
    pub fn differing_ids(&self, other: &WeightSet) -> Vec<VariableId> {
        let mut ids: Vec<VariableId> = self
            .0
            .iter()
            .filter(|(id, weight)| {
                other
                    .get(id)
                    .map_or(true, |theirs| (theirs - **weight).abs() > WEIGHT_EPSILON)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.extend(other.ids().filter(|id| !self.contains(id)).cloned());
        ids.sort();
        ids
    }

    /// Check every weight is finite and non-negative, without looking at the total.
    pub fn check_entries(&self) -> Result<(), WeightInvariantViolation> {
        if self.0.is_empty() {
            return Err(WeightInvariantViolation::Empty);
        }

        for (variable, weight) in &self.0 {
            if !weight.is_finite() {
                return Err(WeightInvariantViolation::NonFinite {
                    variable: variable.clone(),
                });
            }
            if *weight < 0.0 {
                return Err(WeightInvariantViolation::Negative {
                    variable: variable.clone(),
                    weight: *weight,
                });
            }
        }

        Ok(())
    }

    /// Check the full invariant: non-empty, finite, non-negative, summing to 1.0.
    pub fn validate(&self) -> Result<(), WeightInvariantViolation> {
        self.check_entries()?;

        let total = self.total();
        if (total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(WeightInvariantViolation::Sum { total });
        }

        Ok(())
    }

    pub fn into_inner(self) -> BTreeMap<VariableId, f64> {
        self.0
    }
}

impl From<BTreeMap<VariableId, f64>> for WeightSet {
    fn from(weights: BTreeMap<VariableId, f64>) -> Self {
        Self(weights)
    }
}

impl<K> FromIterator<(K, f64)> for WeightSet
where
    K: Into<VariableId>,
{
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(id, weight)| (id.into(), weight)).collect())
    }
}

impl<'a> IntoIterator for &'a WeightSet {
    type Item = (&'a VariableId, &'a f64);
    type IntoIter = std::collections::btree_map::Iter<'a, VariableId, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
