use crate::commands::{render_active, render_history, render_outcome, render_result};
use chrono::Utc;
use clap::Args;
use loan_scorecard::config::{StorageConfig, SyncConfig};
use loan_scorecard::error::AppError;
use loan_scorecard::scoring::ApplicantAttributes;
use loan_scorecard::weights::WeightSet;
use loan_scorecard::ScorecardService;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Directory for the demo weight stores. Defaults to a fresh temporary directory.
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Skip the weight update and rollback portion of the demo.
    #[arg(long)]
    pub(crate) skip_weights: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        data_dir,
        skip_weights,
    } = args;

    let data_dir = data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("loan-scorecard-demo-{}", Utc::now().timestamp()))
    });
    println!("Loan Scorecard Demo");
    println!("===================");
    println!("Weight stores: {}", data_dir.display());

    let service = ScorecardService::from_config(&StorageConfig::in_dir(&data_dir), SyncConfig::default())?;
    render_active(&service.get_weights(), &service.sync_state());

    let applicants = sample_applicants();
    for (label, applicant) in &applicants {
        println!();
        println!("== {label} ==");
        render_result(&service.score(applicant)?);
    }

    if skip_weights {
        return Ok(());
    }

    println!();
    println!("== Core-credit weighting ==");
    render_outcome(&service.set_weights(core_credit_weights())?);
    let (label, applicant) = &applicants[1];
    println!("{label} under the new weights:");
    render_result(&service.score(applicant)?);

    println!();
    println!("== Rollback ==");
    render_outcome(&service.reset_to_defaults()?);
    render_outcome(&service.rollback(1)?);
    render_history(&service.history(3));

    Ok(())
}

fn core_credit_weights() -> WeightSet {
    [
        ("credit_score", 30.0),
        ("foir", 20.0),
        ("dpd30plus", 20.0),
        ("enquiry_count", 15.0),
        ("monthly_income", 15.0),
    ]
    .into_iter()
    .collect()
}

fn sample_applicants() -> Vec<(&'static str, ApplicantAttributes)> {
    let salaried = ApplicantAttributes::new()
        .with("pan", "ABCPK4821M")
        .with("writeoff_flag", false)
        .with("credit_score", 781)
        .with("foir", "28%")
        .with("dpd30plus", 0)
        .with("enquiry_count", 1)
        .with("monthly_income", "82,000")
        .with("age", 34)
        .with("credit_vintage", 96)
        .with("loan_mix_type", "PL/HL/CC")
        .with("loan_completion_ratio", 0.92)
        .with("defaulted_loans", 0)
        .with("job_type", "Private Company (MNC)")
        .with("employment_tenure", 60)
        .with("company_stability", "Fortune 500")
        .with("account_vintage", 84)
        .with("avg_monthly_balance", 140_000)
        .with("bounce_frequency", 0)
        .with("geographic_risk", "Metro Tier 1")
        .with("mobile_number_vintage", 110)
        .with("digital_engagement", 88)
        .with("unsecured_loan_amount", 90_000)
        .with("outstanding_amount_percent", 0.2)
        .with("our_lender_exposure", 1)
        .with("channel_type", "Merchant/Referral");

    let thin_file = ApplicantAttributes::new()
        .with("pan", "BQRPS7712D")
        .with("writeoff_flag", false)
        .with("credit_score", 702)
        .with("foir", 0.41)
        .with("dpd30plus", 1)
        .with("enquiry_count", 4)
        .with("monthly_income", 24_000)
        .with("age", 23)
        .with("credit_vintage", 14)
        .with("loan_mix_type", "Only Gold")
        .with("defaulted_loans", 0);

    let written_off = ApplicantAttributes::new()
        .with("pan", "CTZPM3309K")
        .with("writeoff_flag", true)
        .with("credit_score", 655)
        .with("foir", 0.7)
        .with("dpd30plus", 3)
        .with("monthly_income", 18_000)
        .with("age", 45)
        .with("defaulted_loans", 1);

    vec![
        ("Salaried professional", salaried),
        ("Thin-file applicant", thin_file),
        ("Recent write-off", written_off),
    ]
}
