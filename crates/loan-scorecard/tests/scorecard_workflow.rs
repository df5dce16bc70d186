//! End-to-end scoring scenarios driven through the public engine and service facade.
//!
//! Weight sets are narrowed to one or two variables so the expected score and bucket can be
//! read straight off the default bands.

mod common {
    use loan_scorecard::scoring::{standard_engine, ApplicantAttributes, ScoringEngine};
    use loan_scorecard::weights::{normalize, WeightSet};

    pub(super) fn engine() -> ScoringEngine {
        standard_engine().expect("default registry is valid")
    }

    pub(super) fn weights(entries: &[(&str, f64)]) -> WeightSet {
        let raw: WeightSet = entries.iter().map(|(id, weight)| (*id, *weight)).collect();
        normalize(&raw).expect("weights normalize")
    }

    pub(super) fn applicant() -> ApplicantAttributes {
        ApplicantAttributes::new()
            .with("pan", "ABCDE1234F")
            .with("writeoff_flag", false)
            .with("credit_score", 750)
            .with("foir", 0.25)
            .with("dpd30plus", 0)
            .with("enquiry_count", 0)
            .with("monthly_income", 55_000)
            .with("age", 32)
            .with("credit_vintage", 84)
            .with("loan_mix_type", "PL/HL/CC")
            .with("loan_completion_ratio", 0.9)
            .with("defaulted_loans", 0)
            .with("our_lender_exposure", 1)
    }
}

use common::*;
use loan_scorecard::scoring::{AttributeValue, Decision, Provenance};

#[test]
fn strong_applicant_is_auto_approved() {
    let result = engine()
        .score(&applicant(), &weights(&[("credit_score", 1.0)]), 1)
        .expect("scores");

    assert!((result.final_score - 100.0).abs() < 1e-9);
    assert_eq!(result.bucket, "A");
    assert_eq!(result.decision, Decision::AutoApprove);
    assert!(result.adjustments.is_empty());
    assert_eq!(result.weights_version, 1);
    assert_eq!(result.summary(), "score 100.00, bucket A, decision auto_approve");
}

#[test]
fn negative_factors_move_bucket_a_down() {
    let applicant = applicant()
        .with("dpd30plus", 1)
        .with("enquiry_count", 4);

    let result = engine()
        .score(&applicant, &weights(&[("credit_score", 1.0)]), 1)
        .expect("scores");

    assert_eq!(result.initial_bucket, "A");
    assert_eq!(result.bucket, "B");
    assert_eq!(result.decision, Decision::Recommend);
    assert_eq!(result.adjustments.len(), 1);
    assert_eq!(
        result.adjustments[0].reason,
        "2+ negative factors: DPD > 0, Enquiry > 3"
    );
    assert!(result.summary().contains("(moved from A)"));
}

#[test]
fn bucket_c_moves_up_when_every_condition_holds() {
    let applicant = applicant().with("credit_score", 730).with("foir", 0.5);

    let result = engine()
        .score(
            &applicant,
            &weights(&[("credit_score", 1.0), ("foir", 1.0)]),
            1,
        )
        .expect("scores");

    assert!((result.final_score - 60.0).abs() < 1e-9);
    assert_eq!(result.initial_bucket, "C");
    assert_eq!(result.bucket, "B");
    assert!(result.adjustments[0]
        .reason
        .starts_with("All conditions met: "));
}

#[test]
fn clearance_failure_rejects_regardless_of_score() {
    let applicant = applicant().with("age", 19).with("defaulted_loans", 1);

    let result = engine()
        .score(&applicant, &weights(&[("credit_score", 1.0)]), 1)
        .expect("scores");

    assert_eq!(result.decision, Decision::Reject);
    assert_eq!(result.final_score, 0.0);
    assert_eq!(result.bucket, "D");
    assert_eq!(result.clearance.failed_rules.len(), 2);
    assert!(result
        .clearance
        .failed_rules
        .iter()
        .any(|reason| reason == "Age (19) is outside allowed range (21-60)"));
    assert!(result
        .variable_breakdown
        .iter()
        .all(|line| line.contribution == 0.0));
}

#[test]
fn missing_attributes_fall_back_and_are_reported() {
    let applicant = applicant().with("credit_score", AttributeValue::Null);

    let result = engine()
        .score(
            &applicant,
            &weights(&[("credit_score", 1.0), ("job_type", 1.0)]),
            1,
        )
        .expect("scores");

    assert_eq!(result.fallback_count, 2);
    assert!(result
        .variable_breakdown
        .iter()
        .all(|line| line.provenance == Provenance::Fallback));
}

#[test]
fn service_scores_against_the_published_weights() {
    let dir = std::env::temp_dir().join(format!(
        "loan-scorecard-workflow-{}",
        std::process::id()
    ));
    let storage = loan_scorecard::config::StorageConfig::in_dir(&dir);
    let service = loan_scorecard::ScorecardService::from_config(&storage, Default::default())
        .expect("service builds");

    let outcome = service
        .set_weights(weights(&[("credit_score", 1.0)]))
        .expect("applies");
    let version = match outcome {
        loan_scorecard::SetWeightsOutcome::Applied { active } => active.version,
        other => panic!("expected applied outcome, got {other:?}"),
    };

    let result = service.score(&applicant()).expect("scores");
    assert_eq!(result.weights_version, version);
    assert_eq!(result.variable_breakdown.len(), 1);
    std::fs::remove_dir_all(&dir).ok();
}
