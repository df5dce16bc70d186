use serde::{Deserialize, Serialize};

use super::domain::ApplicantAttributes;

/// Condition on one applicant attribute. A missing or unparseable value never meets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorCondition {
    AtLeast { variable: String, value: f64 },
    Above { variable: String, value: f64 },
    AtMost { variable: String, value: f64 },
    Below { variable: String, value: f64 },
    Equals { variable: String, value: f64 },
    Matches { variable: String, value: String },
}

impl FactorCondition {
    pub fn is_met(&self, applicant: &ApplicantAttributes) -> bool {
        let compare = |variable: &str, test: fn(f64, f64) -> bool, threshold: f64| {
            applicant
                .number(variable)
                .map_or(false, |value| test(value, threshold))
        };

        match self {
            FactorCondition::AtLeast { variable, value } => {
                compare(variable, |v, t| v >= t, *value)
            }
            FactorCondition::Above { variable, value } => {
                compare(variable, |v, t| v > t, *value)
            }
            FactorCondition::AtMost { variable, value } => {
                compare(variable, |v, t| v <= t, *value)
            }
            FactorCondition::Below { variable, value } => {
                compare(variable, |v, t| v < t, *value)
            }
            FactorCondition::Equals { variable, value } => {
                compare(variable, |v, t| v == t, *value)
            }
            FactorCondition::Matches { variable, value } => applicant
                .text(variable)
                .map_or(false, |text| text.eq_ignore_ascii_case(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFactor {
    pub label: String,
    pub condition: FactorCondition,
}

impl AdjustmentFactor {
    pub fn new(label: impl Into<String>, condition: FactorCondition) -> Self {
        Self {
            label: label.into(),
            condition,
        }
    }
}

/// Moves an applicant from one bucket to another when enough factors hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketAdjustment {
    pub from: String,
    pub to: String,
    pub required: usize,
    pub description: String,
    pub factors: Vec<AdjustmentFactor>,
}

impl BucketAdjustment {
    fn evaluate(&self, applicant: &ApplicantAttributes) -> Option<BucketMovement> {
        let met: Vec<&str> = self
            .factors
            .iter()
            .filter(|factor| factor.condition.is_met(applicant))
            .map(|factor| factor.label.as_str())
            .collect();

        if met.len() < self.required || met.is_empty() {
            return None;
        }

        let reason = if self.required >= self.factors.len() {
            format!("All conditions met: {}", met.join(", "))
        } else {
            format!(
                "{}+ {}: {}",
                self.required,
                self.description,
                met[..self.required].join(", ")
            )
        };

        Some(BucketMovement {
            from: self.from.clone(),
            to: self.to.clone(),
            reason,
        })
    }
}

/// Recorded bucket movement, reported on the scoring result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMovement {
    pub from: String,
    pub to: String,
    pub reason: String,
}

/// Post-score movement rules. At most one movement applies per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketAdjuster {
    pub enabled: bool,
    pub rules: Vec<BucketAdjustment>,
}

impl BucketAdjuster {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            rules: Vec::new(),
        }
    }

    pub fn standard() -> Self {
        Self {
            enabled: true,
            rules: vec![
                BucketAdjustment {
                    from: "A".to_string(),
                    to: "B".to_string(),
                    required: 2,
                    description: "negative factors".to_string(),
                    factors: vec![
                        AdjustmentFactor::new("DPD > 0", above("dpd30plus", 0.0)),
                        AdjustmentFactor::new("Enquiry > 3", above("enquiry_count", 3.0)),
                        AdjustmentFactor::new("FOIR > 0.45", above("foir", 0.45)),
                        AdjustmentFactor::new(
                            "LoanMix = Gold only",
                            equals_text("loan_mix_type", "Only Gold"),
                        ),
                        AdjustmentFactor::new(
                            "CompletionRatio < 0.5",
                            below("loan_completion_ratio", 0.5),
                        ),
                    ],
                },
                BucketAdjustment {
                    from: "B".to_string(),
                    to: "A".to_string(),
                    required: 4,
                    description: "positive factors".to_string(),
                    factors: vec![
                        AdjustmentFactor::new("CreditScore >= 770", at_least("credit_score", 770.0)),
                        AdjustmentFactor::new("DPD = 0", equals("dpd30plus", 0.0)),
                        AdjustmentFactor::new("FOIR < 0.35", below("foir", 0.35)),
                        AdjustmentFactor::new(
                            "PL/HL in LoanMix",
                            equals_text("loan_mix_type", "PL/HL/CC"),
                        ),
                        AdjustmentFactor::new(
                            "OurLenderExposure > 0",
                            above("our_lender_exposure", 0.0),
                        ),
                    ],
                },
                BucketAdjustment {
                    from: "C".to_string(),
                    to: "B".to_string(),
                    required: 3,
                    description: "conditions".to_string(),
                    factors: vec![
                        AdjustmentFactor::new("CreditScore >= 730", at_least("credit_score", 730.0)),
                        AdjustmentFactor::new("CreditVintage >= 36", at_least("credit_vintage", 36.0)),
                        AdjustmentFactor::new(
                            "CompletionRatio > 0.6",
                            above("loan_completion_ratio", 0.6),
                        ),
                    ],
                },
                BucketAdjustment {
                    from: "D".to_string(),
                    to: "C".to_string(),
                    required: 3,
                    description: "positive factors".to_string(),
                    factors: vec![
                        AdjustmentFactor::new("CreditScore >= 750", at_least("credit_score", 750.0)),
                        AdjustmentFactor::new("FOIR < 0.35", below("foir", 0.35)),
                        AdjustmentFactor::new("DPD = 0", equals("dpd30plus", 0.0)),
                        AdjustmentFactor::new("Enquiry <= 2", at_most("enquiry_count", 2.0)),
                        AdjustmentFactor::new("Income >= 30000", at_least("monthly_income", 30_000.0)),
                    ],
                },
            ],
        }
    }

    /// Apply the first rule matching `bucket` whose factors hold. Returns the movements
    /// taken and the final bucket.
    pub fn apply(&self, bucket: &str, applicant: &ApplicantAttributes) -> (Vec<BucketMovement>, String) {
        if !self.enabled {
            return (Vec::new(), bucket.to_string());
        }

        let movement = self
            .rules
            .iter()
            .filter(|rule| rule.from == bucket)
            .find_map(|rule| rule.evaluate(applicant));

        match movement {
            Some(movement) => {
                let to = movement.to.clone();
                (vec![movement], to)
            }
            None => (Vec::new(), bucket.to_string()),
        }
    }
}

impl Default for BucketAdjuster {
    fn default() -> Self {
        Self::standard()
    }
}

fn at_least(variable: &str, value: f64) -> FactorCondition {
    FactorCondition::AtLeast {
        variable: variable.to_string(),
        value,
    }
}

fn above(variable: &str, value: f64) -> FactorCondition {
    FactorCondition::Above {
        variable: variable.to_string(),
        value,
    }
}

fn at_most(variable: &str, value: f64) -> FactorCondition {
    FactorCondition::AtMost {
        variable: variable.to_string(),
        value,
    }
}

fn below(variable: &str, value: f64) -> FactorCondition {
    FactorCondition::Below {
        variable: variable.to_string(),
        value,
    }
}

fn equals(variable: &str, value: f64) -> FactorCondition {
    FactorCondition::Equals {
        variable: variable.to_string(),
        value,
    }
}

fn equals_text(variable: &str, value: &str) -> FactorCondition {
    FactorCondition::Matches {
        variable: variable.to_string(),
        value: value.to_string(),
    }
}
