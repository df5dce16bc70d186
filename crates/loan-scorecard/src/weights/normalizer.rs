use super::set::{WeightInvariantViolation, WeightSet};

/// Rescale a non-negative weight set so it sums to 1.0.
///
/// A set whose weights are all zero is spread evenly across its ids. No id is ever dropped,
/// and normalizing an already normalized set leaves it unchanged within [`WEIGHT_EPSILON`].
///
/// [`WEIGHT_EPSILON`]: super::set::WEIGHT_EPSILON
pub fn normalize(weights: &WeightSet) -> Result<WeightSet, WeightInvariantViolation> {
    weights.check_entries()?;

    let total = weights.total();
    if !total.is_finite() {
        return Err(WeightInvariantViolation::Sum { total });
    }

    if total == 0.0 {
        let equal = 1.0 / weights.len() as f64;
        return Ok(weights.ids().map(|id| (id.clone(), equal)).collect());
    }

    Ok(weights
        .iter()
        .map(|(id, weight)| (id.clone(), weight / total))
        .collect())
}

/// Check the invariant without modifying the set.
pub fn validate(weights: &WeightSet) -> Result<(), WeightInvariantViolation> {
    weights.validate()
}
