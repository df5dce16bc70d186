use crate::infra::{percent, read_json, scorecard_service};
use clap::{Args, Subcommand};
use loan_scorecard::config::AppConfig;
use loan_scorecard::error::AppError;
use loan_scorecard::scoring::{ApplicantAttributes, Provenance, ScoringResult};
use loan_scorecard::weights::{ActiveWeights, HistoryEntry, SyncState, WeightSet};
use loan_scorecard::SetWeightsOutcome;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct InputArgs {
    /// JSON file to read
    #[arg(long)]
    pub(crate) input: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct HistoryArgs {
    /// Number of entries to list
    #[arg(long, default_value_t = 3)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug)]
pub(crate) struct RollbackArgs {
    /// How many configurations back from the newest to re-apply
    #[arg(long, default_value_t = 1)]
    pub(crate) steps: usize,
}

#[derive(Subcommand, Debug)]
pub(crate) enum WeightsCommand {
    /// Print the active weights and store sync state
    Show,
    /// Apply a weight set read from a JSON file of variable id to weight
    Set(InputArgs),
    /// Restore the registry default weights
    Reset,
    /// List recent configuration changes, newest first
    History(HistoryArgs),
    /// Re-apply an earlier configuration from history
    Rollback(RollbackArgs),
    /// Re-sync every store to the active weights and unblock writes
    Resolve,
}

pub(crate) fn run_score(args: InputArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = scorecard_service(&config)?;
    let applicant: ApplicantAttributes = read_json(&args.input)?;

    let result = service.score(&applicant)?;
    render_result(&result);
    Ok(())
}

pub(crate) fn run_weights(command: WeightsCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = scorecard_service(&config)?;

    match command {
        WeightsCommand::Show => render_active(&service.get_weights(), &service.sync_state()),
        WeightsCommand::Set(args) => {
            let weights: WeightSet = read_json(&args.input)?;
            render_outcome(&service.set_weights(weights)?);
        }
        WeightsCommand::Reset => render_outcome(&service.reset_to_defaults()?),
        WeightsCommand::History(args) => render_history(&service.history(args.limit)),
        WeightsCommand::Rollback(args) => render_outcome(&service.rollback(args.steps)?),
        WeightsCommand::Resolve => {
            let active = service.resolve_divergence()?;
            render_active(&active, &service.sync_state());
        }
    }
    Ok(())
}

pub(crate) fn render_result(result: &ScoringResult) {
    println!("{}", result.summary());

    if !result.clearance.passed {
        println!("Clearance failures:");
        for reason in &result.clearance.failed_rules {
            println!("  - {reason}");
        }
        return;
    }

    for movement in &result.adjustments {
        println!(
            "Bucket {} -> {}: {}",
            movement.from, movement.to, movement.reason
        );
    }

    println!("Variable breakdown (weights version {}):", result.weights_version);
    for line in &result.variable_breakdown {
        let value = line
            .value
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_else(|| "-".to_string());
        let marker = match line.provenance {
            Provenance::Scored => "",
            Provenance::Fallback => " (fallback)",
        };
        println!(
            "  {:<28} {:<20} score {:.2} x {:>7} = {:.2}{}",
            line.variable.as_str(),
            value,
            line.score,
            percent(line.weight),
            line.contribution,
            marker
        );
    }
}

pub(crate) fn render_active(active: &ActiveWeights, state: &SyncState) {
    println!(
        "Active weights v{} (published {})",
        active.version,
        active.published_at.to_rfc3339()
    );
    for (id, weight) in active.weights.iter() {
        println!("  {:<28} {:>7}", id.as_str(), percent(weight));
    }
    match state {
        SyncState::InSync => println!("Stores in sync"),
        SyncState::Diverged { reasons } => {
            println!("Stores DIVERGED; writes blocked until resolved:");
            for reason in reasons {
                println!("  - {reason}");
            }
        }
    }
}

pub(crate) fn render_outcome(outcome: &SetWeightsOutcome) {
    match outcome {
        SetWeightsOutcome::Applied { active } => {
            println!("Applied weights v{} across {} variables", active.version, active.weights.len());
        }
        SetWeightsOutcome::Diverged { reasons, active } => {
            println!("Weight update did not apply; stores diverged. Still serving v{}:", active.version);
            for reason in reasons {
                println!("  - {reason}");
            }
        }
    }
}

pub(crate) fn render_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No configuration changes recorded");
        return;
    }

    for entry in entries {
        println!(
            "{}  {} ({} variables, total {})",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.description,
            entry.weights.len(),
            percent(entry.total)
        );
    }
}
