//! Tests for entity phase tracking over the in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;
use cohort_rs::error::Error;
use cohort_rs::event::{EventKind, MoveKind};
use cohort_rs::model::*;
use cohort_rs::orchestrator::{Orchestrator, ProgramDetail};
use cohort_rs::store::MemoryStore;
use cohort_rs::tracker::PhaseTracker;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn test_orchestrator() -> Orchestrator {
    Orchestrator::new(Arc::new(MemoryStore::new()))
}

async fn program(orch: &Orchestrator, phases: usize) -> ProgramDetail {
    let mut new = NewProgram::new("Tracker", date(2026, 1, 1), date(2026, 12, 31));
    for i in 0..phases - 1 {
        new = new.phase(format!("Phase {i}"));
    }
    new = new.winner_phase("Final");
    orch.create_program(new).await.unwrap()
}

async fn team(orch: &Orchestrator, program: &ProgramDetail, name: &str) -> EntityId {
    orch.register_entity(NewEntity::team(program.program.id, name))
        .await
        .unwrap()
        .id
}

fn tracker(orch: &Orchestrator) -> &PhaseTracker {
    orch.tracker()
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unassigned_entity_has_no_stored_phase_but_reads_as_first() {
    let orch = test_orchestrator();
    let program = program(&orch, 3).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;

    assert!(tracker(&orch).get_current_phase(entity, pid).await.unwrap().is_none());
    let current = tracker(&orch).current_or_first(entity, pid).await.unwrap();
    assert_eq!(current.ordinal, 0);
}

#[tokio::test]
async fn entity_of_another_program_is_not_found() {
    let orch = test_orchestrator();
    let a = program(&orch, 3).await;
    let b = program(&orch, 3).await;
    let entity = team(&orch, &a, "Nova").await;

    let err = tracker(&orch)
        .current_or_first(entity, b.program.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn unknown_program_is_not_found() {
    let orch = test_orchestrator();
    let err = tracker(&orch)
        .advance(EntityId::new(), ProgramId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Sequential moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn advance_and_retreat_step_one_ordinal_within_bounds() {
    let orch = test_orchestrator();
    let program = program(&orch, 4).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;
    let t = tracker(&orch);

    // At ordinal 0 there is nothing behind.
    assert!(matches!(
        t.retreat(entity, pid).await.unwrap_err(),
        Error::AlreadyAtStart(_)
    ));

    for expected in 1..4 {
        let written = t.advance(entity, pid).await.unwrap();
        assert_eq!(written.phase_id, program.phases[expected].id);
    }
    assert!(matches!(
        t.advance(entity, pid).await.unwrap_err(),
        Error::AlreadyTerminal(_)
    ));

    for expected in (0..3).rev() {
        let written = t.retreat(entity, pid).await.unwrap();
        assert_eq!(written.phase_id, program.phases[expected].id);
    }
    assert!(matches!(
        t.retreat(entity, pid).await.unwrap_err(),
        Error::AlreadyAtStart(_)
    ));
}

#[tokio::test]
async fn failed_step_leaves_the_phase_unchanged() {
    let orch = test_orchestrator();
    let program = program(&orch, 2).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;
    let terminal = program.phases[1].id;

    tracker(&orch).assign_phase(entity, pid, terminal).await.unwrap();
    assert!(tracker(&orch).advance(entity, pid).await.is_err());

    let current = tracker(&orch).current_or_first(entity, pid).await.unwrap();
    assert_eq!(current.id, terminal);
}

#[tokio::test]
async fn single_phase_program_cannot_move() {
    let orch = test_orchestrator();
    let program = program(&orch, 1).await;
    let entity = team(&orch, &program, "Solo").await;
    let pid = program.program.id;

    assert!(matches!(
        tracker(&orch).advance(entity, pid).await.unwrap_err(),
        Error::AlreadyTerminal(_)
    ));
    assert!(matches!(
        tracker(&orch).retreat(entity, pid).await.unwrap_err(),
        Error::AlreadyAtStart(_)
    ));
}

#[tokio::test]
async fn racing_advances_never_skip_a_phase() {
    let orch = test_orchestrator();
    let program = program(&orch, 5).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let tracker = orch.tracker().clone();
            tokio::spawn(async move { tracker.advance(entity, pid).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(Error::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert!(applied >= 1);
    let current = tracker(&orch).current_or_first(entity, pid).await.unwrap();
    assert_eq!(current.ordinal, applied);
}

// ---------------------------------------------------------------------------
// Direct moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_move_reads_back_immediately() {
    let orch = test_orchestrator();
    let program = program(&orch, 4).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;

    for target in [2, 0, 3, 1] {
        let phase = program.phases[target].id;
        tracker(&orch).assign_phase(entity, pid, phase).await.unwrap();
        let current = tracker(&orch).get_current_phase(entity, pid).await.unwrap();
        assert_eq!(current.map(|p| p.id), Some(phase));
    }
}

#[tokio::test]
async fn direct_move_to_foreign_phase_is_invalid() {
    let orch = test_orchestrator();
    let a = program(&orch, 3).await;
    let b = program(&orch, 3).await;
    let entity = team(&orch, &a, "Nova").await;

    let err = tracker(&orch)
        .assign_phase(entity, a.program.id, b.phases[1].id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPhase { .. }));

    // Nothing was written.
    assert!(tracker(&orch)
        .get_current_phase(entity, a.program.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn legacy_name_places_entity() {
    let orch = test_orchestrator();
    let program = program(&orch, 3).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;

    let written = tracker(&orch).assign_by_name(entity, pid, "final").await.unwrap();
    assert_eq!(written.phase_id, program.phases[2].id);

    let err = tracker(&orch)
        .assign_by_name(entity, pid, "graduation")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PhaseNotFound(_)));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn moves_publish_phase_assigned_events() {
    let orch = test_orchestrator();
    let program = program(&orch, 3).await;
    let entity = team(&orch, &program, "Nova").await;
    let pid = program.program.id;
    let mut rx = orch.events().subscribe();

    tracker(&orch).advance(entity, pid).await.unwrap();
    tracker(&orch)
        .assign_phase(entity, pid, program.phases[0].id)
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.program_id, pid);
    match first.kind {
        EventKind::PhaseAssigned { from, to, via, .. } => {
            assert_eq!(from, None);
            assert_eq!(to, program.phases[1].id);
            assert_eq!(via, MoveKind::Advance);
        }
        other => panic!("expected PhaseAssigned, got {other:?}"),
    }

    let second = rx.recv().await.unwrap();
    assert!(second.seq > first.seq);
    match second.kind {
        EventKind::PhaseAssigned { from, to, via, .. } => {
            assert_eq!(from, Some(program.phases[1].id));
            assert_eq!(to, program.phases[0].id);
            assert_eq!(via, MoveKind::Assign);
        }
        other => panic!("expected PhaseAssigned, got {other:?}"),
    }
}
