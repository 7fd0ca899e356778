//! Tests for TOML seeding and legacy name-based imports.

use std::sync::Arc;

use cohort_rs::error::Error;
use cohort_rs::model::*;
use cohort_rs::orchestrator::Orchestrator;
use cohort_rs::seed::{LegacyAssignment, LegacyFile, SeedFile};
use cohort_rs::store::MemoryStore;

const SEED: &str = r#"
[[program]]
name = "Cohorte 2026"
start_date = "2026-01-15"
end_date = "2026-06-30"
status = "active"
phases = ["Idéation", "Prototypage", "Validation"]
winner_phase = "Lancement"

[[program.entity]]
kind = "team"
name = "Atlas"
phase = "prototypage"

[[program.entity]]
kind = "individual"
name = "Ada"

[[program]]
name = "Bootcamp"
start_date = "2026-09-01"
end_date = "2026-09-30"
phases = ["Week 1", "Week 2"]
"#;

fn test_orchestrator() -> Orchestrator {
    Orchestrator::new(Arc::new(MemoryStore::new()))
}

#[test]
fn seed_file_parses() {
    let seed = SeedFile::parse(SEED).unwrap();
    assert_eq!(seed.programs.len(), 2);

    let cohort = &seed.programs[0];
    assert_eq!(cohort.status, Some(ProgramStatus::Active));
    assert_eq!(cohort.phases.len(), 3);
    assert_eq!(cohort.winner_phase.as_deref(), Some("Lancement"));
    assert_eq!(cohort.entities.len(), 2);
    assert_eq!(cohort.entities[1].kind, EntityKind::Individual);
    assert!(cohort.entities[1].phase.is_none());

    let bootcamp = &seed.programs[1];
    assert!(bootcamp.status.is_none());
    assert!(bootcamp.winner_phase.is_none());
    assert!(bootcamp.entities.is_empty());
}

#[test]
fn malformed_seed_is_a_config_error() {
    let err = SeedFile::parse("[[program]]\nname = 3").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn applying_seed_creates_programs_entities_and_positions() {
    let orch = test_orchestrator();
    let seeded = SeedFile::parse(SEED).unwrap().apply(&orch).await.unwrap();
    assert_eq!(seeded.len(), 2);

    let cohort = &seeded[0];
    assert_eq!(cohort.detail.program.status, ProgramStatus::Active);
    let names: Vec<_> = cohort.detail.phases.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Idéation", "Prototypage", "Validation", "Lancement"]);
    assert!(cohort.detail.phases[3].has_winner);

    let program_id = cohort.detail.program.id;
    let atlas = &cohort.entities[0];
    let ada = &cohort.entities[1];
    assert_eq!(
        orch.current_phase(program_id, atlas.id).await.unwrap().name,
        "Prototypage"
    );
    assert_eq!(orch.current_phase(program_id, ada.id).await.unwrap().ordinal, 0);

    let bootcamp = &seeded[1];
    assert_eq!(bootcamp.detail.program.status, ProgramStatus::Draft);
    assert!(bootcamp.detail.phases.iter().all(|p| !p.has_winner));
    assert_eq!(orch.list_programs().await.unwrap().len(), 2);
}

#[tokio::test]
async fn seed_with_invalid_program_fails() {
    let orch = test_orchestrator();
    let seed = SeedFile::parse(
        r#"
[[program]]
name = "Backwards"
start_date = "2026-05-01"
end_date = "2026-04-01"
phases = ["Only"]
"#,
    )
    .unwrap();

    let err = seed.apply(&orch).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn legacy_import_reports_each_row() {
    let orch = test_orchestrator();
    let seeded = SeedFile::parse(SEED).unwrap().apply(&orch).await.unwrap();
    let program = seeded[0].detail.program.id;
    let atlas = seeded[0].entities[0].id;
    let ada = seeded[0].entities[1].id;

    let legacy = LegacyFile {
        assignments: vec![
            LegacyAssignment {
                program,
                entity: atlas,
                phase_name: "LANCEMENT".to_string(),
            },
            LegacyAssignment {
                program,
                entity: ada,
                phase_name: "incubation".to_string(),
            },
            LegacyAssignment {
                program,
                entity: EntityId::new(),
                phase_name: "validation".to_string(),
            },
        ],
    };

    let report = legacy.apply(&orch).await;
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(report.resolved[0].1.name, "Lancement");
    assert_eq!(report.unresolved.len(), 2);
    assert!(matches!(report.unresolved[0].1, Error::PhaseNotFound(_)));
    assert!(matches!(report.unresolved[1].1, Error::NotFound(_)));

    // The unresolved row did not move Ada.
    assert_eq!(orch.current_phase(program, ada).await.unwrap().ordinal, 0);
}

#[test]
fn legacy_file_parses_ids() {
    let program = ProgramId::new();
    let entity = EntityId::new();
    let toml = format!(
        "[[assignment]]\nprogram = \"{program}\"\nentity = \"{entity}\"\nphase_name = \"Idéation\"\n"
    );

    let legacy = LegacyFile::parse(&toml).unwrap();
    assert_eq!(legacy.assignments.len(), 1);
    assert_eq!(legacy.assignments[0].program, program);
    assert_eq!(legacy.assignments[0].entity, entity);
}

#[tokio::test]
async fn bad_later_program_writes_nothing() {
    let orch = test_orchestrator();
    let seed = SeedFile::parse(
        r#"
[[program]]
name = "Fine"
start_date = "2026-01-01"
end_date = "2026-02-01"
phases = ["One", "Two"]

[[program]]
name = "Broken"
start_date = "2026-01-01"
end_date = "2026-02-01"
phases = ["One"]

[[program.entity]]
kind = "team"
name = "Atlas"
phase = "Nowhere"
"#,
    )
    .unwrap();

    let err = seed.apply(&orch).await.unwrap_err();
    assert!(matches!(err, Error::PhaseNotFound(_)));
    assert!(orch.list_programs().await.unwrap().is_empty());
}
