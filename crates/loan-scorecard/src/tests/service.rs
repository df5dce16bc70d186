use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::common::*;
use crate::scoring::{Decision, ScoreBand, ScoringStrategy, VariableDefinition, VariableId};
use crate::service::{ScorecardService, SetWeightsOutcome, WeightServiceError};
use crate::weights::tests::common::{
    assert_same_weights, quick_retry, scratch_dir, weights, MemoryStore,
};
use crate::weights::{
    ConfigurationHistory, FlatFileStore, IdMapping, SyncState, TableFileStore,
    WeightInvariantViolation, WeightSynchronizer, WEIGHT_EPSILON,
};

fn applied(outcome: SetWeightsOutcome) -> crate::weights::ActiveWeights {
    match outcome {
        SetWeightsOutcome::Applied { active } => active,
        other => panic!("expected applied outcome, got {other:?}"),
    }
}

#[test]
fn fresh_service_publishes_normalized_defaults() {
    let (service, dir) = file_service("svc-defaults");

    let active = service.get_weights();
    assert_eq!(active.weights.len(), 23);
    assert!((active.weights.total() - 1.0).abs() <= WEIGHT_EPSILON);

    let result = service.score(&perfect_applicant()).expect("scores");
    assert_eq!(result.bucket, "A");
    assert_eq!(result.decision, Decision::AutoApprove);
    assert_eq!(result.weights_version, active.version);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn set_weights_normalizes_and_publishes() {
    let (service, dir) = file_service("svc-set");
    let before = service.get_weights().version;

    let active = applied(
        service
            .set_weights(weights(&[("credit_score", 10.0), ("foir", 10.0)]))
            .expect("applies"),
    );

    assert_eq!(active.version, before + 1);
    assert_eq!(active.weights.get(&VariableId::from("credit_score")), Some(0.5));
    assert_eq!(active.weights.get(&VariableId::from("foir")), Some(0.5));
    assert_eq!(service.history(10).len(), 1);
    assert!(dir.join("scoring_weights.json").exists());
    assert!(dir.join("scorecard_variables.csv").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn set_weights_rejects_unknown_and_negative_weights() {
    let (service, dir) = file_service("svc-reject");

    match service.set_weights(weights(&[("credit_score", 1.0), ("shoe_size", 1.0)])) {
        Err(WeightServiceError::UnknownVariable(id)) => assert_eq!(id.as_str(), "shoe_size"),
        other => panic!("expected unknown variable, got {other:?}"),
    }
    match service.set_weights(weights(&[("credit_score", 1.0), ("foir", -1.0)])) {
        Err(WeightServiceError::Invariant(WeightInvariantViolation::Negative { .. })) => {}
        other => panic!("expected invariant violation, got {other:?}"),
    }
    assert!(service.history(10).is_empty());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn restart_bootstraps_from_stored_weights() {
    let (service, dir) = file_service("svc-restart");
    service
        .set_weights(weights(&[("credit_score", 3.0), ("foir", 1.0)]))
        .expect("applies");
    drop(service);

    let restarted =
        ScorecardService::from_config(&storage(&dir), fast_sync()).expect("restarts");
    let active = restarted.get_weights();
    assert_same_weights(&active.weights, &weights(&[("credit_score", 0.75), ("foir", 0.25)]));
    assert_eq!(restarted.history(10).len(), 1);
    std::fs::remove_dir_all(&dir).ok();
}

fn seeding_synchronizer() -> WeightSynchronizer {
    let engine = crate::scoring::standard_engine().expect("engine");
    WeightSynchronizer::new(
        Vec::new(),
        IdMapping::from_registry(engine.registry()).expect("mapping"),
        ConfigurationHistory::new(3),
        quick_retry(),
    )
}

#[test]
fn bootstrap_prefers_the_table_store() {
    let dir = scratch_dir("svc-precedence");
    let config = storage(&dir);
    let sync = seeding_synchronizer();
    sync.push(
        &weights(&[("credit_vintage", 1.0)]),
        &TableFileStore::new(&config.weights_table),
    )
    .expect("seed table");

    let service = ScorecardService::from_config(&config, fast_sync()).expect("boots");
    assert_same_weights(&service.get_weights().weights, &weights(&[("credit_vintage", 1.0)]));
    assert_eq!(service.sync_state(), SyncState::InSync);

    std::fs::remove_file(&config.weights_table).expect("drop table");
    sync.push(
        &weights(&[("foir", 1.0)]),
        &FlatFileStore::new(&config.weights_file),
    )
    .expect("seed flat");
    let service = ScorecardService::from_config(&config, fast_sync()).expect("boots");
    assert_same_weights(&service.get_weights().weights, &weights(&[("foir", 1.0)]));
    assert_eq!(service.sync_state(), SyncState::InSync);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn disagreeing_stores_without_history_boot_diverged_on_defaults() {
    let dir = scratch_dir("svc-split-defaults");
    let config = storage(&dir);
    let sync = seeding_synchronizer();
    sync.push(
        &weights(&[("credit_score", 1.0)]),
        &FlatFileStore::new(&config.weights_file),
    )
    .expect("seed flat");
    sync.push(
        &weights(&[("foir", 1.0)]),
        &TableFileStore::new(&config.weights_table),
    )
    .expect("seed table");

    let service = ScorecardService::from_config(&config, fast_sync()).expect("boots");
    match service.sync_state() {
        SyncState::Diverged { reasons } => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("credit_score") && reasons[0].contains("foir"));
        }
        other => panic!("expected a divergence, got {other:?}"),
    }
    assert_eq!(service.get_weights().weights.len(), 23);
    assert!(matches!(
        service.set_weights(weights(&[("age", 1.0)])),
        Ok(SetWeightsOutcome::Diverged { .. })
    ));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn restart_over_disagreeing_stores_serves_the_last_synced_weights() {
    let (service, dir) = file_service("svc-split-history");
    service
        .set_weights(weights(&[("credit_score", 1.0)]))
        .expect("applies");
    drop(service);

    let config = storage(&dir);
    seeding_synchronizer()
        .push(
            &weights(&[("foir", 1.0)]),
            &TableFileStore::new(&config.weights_table),
        )
        .expect("overwrite table");

    let restarted = ScorecardService::from_config(&config, fast_sync()).expect("restarts");
    assert!(matches!(restarted.sync_state(), SyncState::Diverged { .. }));
    assert_same_weights(&restarted.get_weights().weights, &weights(&[("credit_score", 1.0)]));

    let active = restarted.resolve_divergence().expect("healthy stores resolve");
    assert_same_weights(&active.weights, &weights(&[("credit_score", 1.0)]));
    assert_eq!(restarted.sync_state(), SyncState::InSync);
    drop(restarted);

    let resolved = ScorecardService::from_config(&config, fast_sync()).expect("restarts");
    assert_eq!(resolved.sync_state(), SyncState::InSync);
    assert_same_weights(&resolved.get_weights().weights, &weights(&[("credit_score", 1.0)]));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn recorded_divergence_survives_a_restart() {
    let (service, dir) = file_service("svc-state-file");
    service
        .set_weights(weights(&[("credit_score", 1.0)]))
        .expect("applies");
    drop(service);

    let config = storage(&dir);
    SyncState::Diverged {
        reasons: vec!["restoring flat failed".to_string()],
    }
    .save(&config.sync_state_file)
    .expect("state saved");

    let restarted = ScorecardService::from_config(&config, fast_sync()).expect("restarts");
    match restarted.sync_state() {
        SyncState::Diverged { reasons } => assert_eq!(reasons, vec!["restoring flat failed"]),
        other => panic!("expected the recorded divergence, got {other:?}"),
    }
    assert_same_weights(&restarted.get_weights().weights, &weights(&[("credit_score", 1.0)]));
    assert!(matches!(
        restarted.set_weights(weights(&[("foir", 1.0)])),
        Ok(SetWeightsOutcome::Diverged { .. })
    ));
    assert_eq!(restarted.history(10).len(), 1);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn status_reads_do_not_wait_for_a_write_in_progress() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let service = gated_service(GatedStore::new(
        MemoryStore::flat("flat"),
        entered_tx,
        release_rx,
    ));

    let writer = {
        let service = service.clone();
        thread::spawn(move || service.set_weights(weights(&[("credit_score", 1.0)])))
    };
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("write reaches the store");

    let (read_tx, read_rx) = mpsc::channel();
    let reader = {
        let service = service.clone();
        thread::spawn(move || {
            read_tx
                .send((service.sync_state(), service.history(3).len()))
                .ok();
        })
    };
    let observed = read_rx.recv_timeout(Duration::from_secs(1));

    release_tx.send(()).expect("writer still waiting");
    let outcome = writer.join().expect("writer thread").expect("write applies");
    reader.join().expect("reader thread");

    assert_eq!(observed, Ok((SyncState::InSync, 0)));
    applied(outcome);
    assert_eq!(service.history(3).len(), 1);
}

#[test]
fn rollback_reapplies_an_earlier_configuration() {
    let (service, dir) = file_service("svc-rollback");
    service
        .set_weights(weights(&[("credit_score", 1.0)]))
        .expect("first");
    service
        .set_weights(weights(&[("foir", 1.0)]))
        .expect("second");

    let active = applied(service.rollback(1).expect("rolls back"));
    assert_same_weights(&active.weights, &weights(&[("credit_score", 1.0)]));

    let history = service.history(10);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].description, "Rollback 1 step(s)");

    assert!(matches!(
        service.rollback(0),
        Err(WeightServiceError::InvalidRollback)
    ));
    assert!(matches!(
        service.rollback(5),
        Err(WeightServiceError::NoHistory { steps: 5, available: 3 })
    ));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reset_restores_registry_defaults() {
    let (service, dir) = file_service("svc-reset");
    service
        .set_weights(weights(&[("credit_score", 1.0)]))
        .expect("custom");

    let active = applied(service.reset_to_defaults().expect("resets"));
    assert_eq!(active.weights.len(), 23);
    assert!((active.weights.total() - 1.0).abs() <= WEIGHT_EPSILON);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn divergence_keeps_previous_weights_and_blocks_writes() {
    let (service, flat) = diverging_service();
    let before = service.get_weights();

    match service
        .set_weights(weights(&[("credit_score", 1.0)]))
        .expect("divergence is an outcome")
    {
        SetWeightsOutcome::Diverged { reasons, active } => {
            assert!(!reasons.is_empty());
            assert_eq!(active.version, before.version);
        }
        other => panic!("expected divergence, got {other:?}"),
    }
    let recorded = match service.sync_state() {
        SyncState::Diverged { reasons } => reasons,
        other => panic!("expected a diverged state, got {other:?}"),
    };

    match service.set_weights(weights(&[("foir", 1.0)])) {
        Ok(SetWeightsOutcome::Diverged { reasons, active }) => {
            assert_eq!(reasons, recorded);
            assert_eq!(active.version, before.version);
        }
        other => panic!("expected the write to be refused, got {other:?}"),
    }
    assert!(service.history(10).is_empty());
    assert!(service.score(&perfect_applicant()).is_ok());

    flat.recover();
    assert!(service.resolve_divergence().is_err(), "second store is still failing");
}

#[test]
fn registered_variables_join_scoring_after_a_weight_update() {
    let (service, dir) = file_service("svc-register");
    let definition = VariableDefinition {
        id: VariableId::from("utility_payment_ratio"),
        display_name: "Utility Payment Ratio".to_string(),
        category: "Banking Behavior".to_string(),
        weight: 0.05,
        fallback_score: 0.0,
        strategy: ScoringStrategy::Numeric {
            bands: vec![
                ScoreBand::new(Some(0.0), Some(0.9), 0.4),
                ScoreBand::new(Some(0.9), None, 1.0),
            ],
        },
    };

    service.register_variable(definition).expect("registers");
    let result = service.score(&perfect_applicant()).expect("scores with stale weights");
    assert!(result
        .variable_breakdown
        .iter()
        .all(|line| line.variable.as_str() != "utility_payment_ratio"));

    service
        .set_weights(weights(&[("credit_score", 1.0), ("utility_payment_ratio", 1.0)]))
        .expect("mapped and applied");
    let applicant = perfect_applicant().with("utility_payment_ratio", 0.95);
    let result = service.score(&applicant).expect("scores");
    assert!(result
        .variable_breakdown
        .iter()
        .any(|line| line.variable.as_str() == "utility_payment_ratio" && line.score == 1.0));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unregistered_variables_drop_out_of_scoring() {
    let (service, dir) = file_service("svc-unregister");
    let removed = service.unregister_variable(&VariableId::from("age"));
    assert!(removed.is_some());

    let result = service.score(&perfect_applicant()).expect("re-normalizes and scores");
    assert_eq!(result.variable_breakdown.len(), 22);
    let total: f64 = result.variable_breakdown.iter().map(|line| line.weight).sum();
    assert!((total - 1.0).abs() <= WEIGHT_EPSILON);
    assert_eq!(result.bucket, "A");

    std::fs::remove_dir_all(&dir).ok();
}
