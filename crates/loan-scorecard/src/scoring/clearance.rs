use serde::{Deserialize, Serialize};

use super::domain::{ApplicantAttributes, AttributeValue};

/// Declarative predicate over one applicant attribute.
///
/// Missing numeric values read as zero, so an applicant without a reported income fails
/// an income minimum while an applicant without reported DPD history passes a DPD maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RulePredicate {
    Required { variable: String },
    Minimum { variable: String, min: f64 },
    Maximum { variable: String, max: f64 },
    Range { variable: String, min: f64, max: f64 },
    Flag { variable: String },
}

/// Hard pass/fail rule checked before any weighted aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearanceRule {
    pub label: String,
    pub predicate: RulePredicate,
}

impl ClearanceRule {
    pub fn new(label: impl Into<String>, predicate: RulePredicate) -> Self {
        Self {
            label: label.into(),
            predicate,
        }
    }

    /// Rejection reason when the rule fails, `None` when it passes.
    pub fn check(&self, applicant: &ApplicantAttributes) -> Option<String> {
        match &self.predicate {
            RulePredicate::Required { variable } => applicant
                .get(variable)
                .map_or(true, AttributeValue::is_blank)
                .then(|| format!("{} is missing", self.label)),
            RulePredicate::Minimum { variable, min } => {
                let value = numeric(applicant, variable);
                (value < *min).then(|| {
                    format!(
                        "{} ({}) is below minimum ({})",
                        self.label,
                        display_number(value),
                        display_number(*min)
                    )
                })
            }
            RulePredicate::Maximum { variable, max } => {
                let value = numeric(applicant, variable);
                (value > *max).then(|| {
                    format!(
                        "{} ({}) exceeds maximum allowed ({})",
                        self.label,
                        display_number(value),
                        display_number(*max)
                    )
                })
            }
            RulePredicate::Range { variable, min, max } => {
                let value = numeric(applicant, variable);
                (value < *min || value > *max).then(|| {
                    format!(
                        "{} ({}) is outside allowed range ({}-{})",
                        self.label,
                        display_number(value),
                        display_number(*min),
                        display_number(*max)
                    )
                })
            }
            RulePredicate::Flag { variable } => applicant
                .flag(variable)
                .unwrap_or(false)
                .then(|| format!("{} flag is true", self.label)),
        }
    }
}

fn numeric(applicant: &ApplicantAttributes, variable: &str) -> f64 {
    applicant.number(variable).unwrap_or(0.0)
}

fn display_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Result of running every clearance rule against an applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearanceOutcome {
    pub passed: bool,
    pub failed_rules: Vec<String>,
}

impl ClearanceOutcome {
    pub fn passed() -> Self {
        Self {
            passed: true,
            failed_rules: Vec::new(),
        }
    }
}

/// Ordered list of clearance rules. Every rule runs; failures keep rule order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearanceRuleEvaluator {
    rules: Vec<ClearanceRule>,
}

impl ClearanceRuleEvaluator {
    pub fn new(rules: Vec<ClearanceRule>) -> Self {
        Self { rules }
    }

    /// Lending policy used when no other rule set is configured.
    pub fn standard() -> Self {
        Self::new(vec![
            ClearanceRule::new(
                "PAN",
                RulePredicate::Required {
                    variable: "pan".to_string(),
                },
            ),
            ClearanceRule::new(
                "Age",
                RulePredicate::Range {
                    variable: "age".to_string(),
                    min: 21.0,
                    max: 60.0,
                },
            ),
            ClearanceRule::new(
                "Monthly income",
                RulePredicate::Minimum {
                    variable: "monthly_income".to_string(),
                    min: 15_000.0,
                },
            ),
            ClearanceRule::new(
                "Write-off",
                RulePredicate::Flag {
                    variable: "writeoff_flag".to_string(),
                },
            ),
            ClearanceRule::new(
                "DPD30+",
                RulePredicate::Maximum {
                    variable: "dpd30plus".to_string(),
                    max: 2.0,
                },
            ),
            ClearanceRule::new(
                "Defaulted loans",
                RulePredicate::Maximum {
                    variable: "defaulted_loans".to_string(),
                    max: 0.0,
                },
            ),
            ClearanceRule::new(
                "FOIR",
                RulePredicate::Maximum {
                    variable: "foir".to_string(),
                    max: 0.65,
                },
            ),
        ])
    }

    pub fn rules(&self) -> &[ClearanceRule] {
        &self.rules
    }

    pub fn evaluate(&self, applicant: &ApplicantAttributes) -> ClearanceOutcome {
        let failed_rules: Vec<String> = self
            .rules
            .iter()
            .filter_map(|rule| rule.check(applicant))
            .collect();

        ClearanceOutcome {
            passed: failed_rules.is_empty(),
            failed_rules,
        }
    }
}
