use crate::scoring::{
    defaults, ApplicantAttributes, BucketAdjuster, BucketClassifier, ClearanceRuleEvaluator,
    ScoreBand, ScoringEngine, ScoringStrategy, VariableDefinition, VariableId,
    VariableScoringRegistry,
};
use crate::weights::{normalize, WeightSet};

/// Applicant sitting in the best band of every default variable.
pub(super) fn perfect_applicant() -> ApplicantAttributes {
    ApplicantAttributes::new()
        .with("pan", "ABCDE1234F")
        .with("writeoff_flag", false)
        .with("credit_score", 750)
        .with("foir", "25%")
        .with("dpd30plus", 0)
        .with("enquiry_count", 0)
        .with("monthly_income", 55_000)
        .with("age", 32)
        .with("credit_vintage", 84)
        .with("loan_mix_type", "PL/HL/CC")
        .with("loan_completion_ratio", 0.9)
        .with("defaulted_loans", 0)
        .with("job_type", "Government/PSU")
        .with("employment_tenure", 72)
        .with("company_stability", "Fortune 500")
        .with("account_vintage", 96)
        .with("avg_monthly_balance", 150_000)
        .with("bounce_frequency", 0)
        .with("geographic_risk", "Metro Tier 1")
        .with("mobile_number_vintage", 120)
        .with("digital_engagement", 92)
        .with("unsecured_loan_amount", 75_000)
        .with("outstanding_amount_percent", 0.1)
        .with("our_lender_exposure", 1)
        .with("channel_type", "Merchant/Referral")
}

pub(super) fn standard_engine() -> ScoringEngine {
    crate::scoring::standard_engine().expect("default registry is valid")
}

pub(super) fn default_weights() -> WeightSet {
    let registry = defaults::standard_registry().expect("default registry is valid");
    normalize(&registry.default_weights()).expect("default weights normalize")
}

pub(super) fn stepped(id: &str, thresholds: &[(f64, f64)], fallback_score: f64) -> VariableDefinition {
    let bands = thresholds
        .iter()
        .enumerate()
        .map(|(index, (min, score))| {
            ScoreBand::new(
                Some(*min),
                thresholds.get(index + 1).map(|(next, _)| *next),
                *score,
            )
        })
        .collect();

    VariableDefinition {
        id: VariableId::from(id),
        display_name: id.to_string(),
        category: "Test".to_string(),
        weight: 1.0,
        fallback_score,
        strategy: ScoringStrategy::Numeric { bands },
    }
}

/// Engine over a single variable `x` with no clearance rules.
pub(super) fn single_variable_engine(score: f64) -> ScoringEngine {
    let registry = VariableScoringRegistry::from_definitions([stepped("x", &[(0.0, score)], 0.0)])
        .expect("valid registry");
    ScoringEngine::new(
        registry,
        ClearanceRuleEvaluator::new(Vec::new()),
        BucketClassifier::standard(),
        BucketAdjuster::standard(),
    )
}

pub(super) fn weights(entries: &[(&str, f64)]) -> WeightSet {
    entries.iter().map(|(id, weight)| (*id, *weight)).collect()
}
