//! Tests for phase ordering, authoring validation and legacy name lookup.

use chrono::NaiveDate;
use cohort_rs::catalog::{PhaseCatalog, names};
use cohort_rs::error::Error;
use cohort_rs::model::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn accelerator() -> NewProgram {
    NewProgram::new("Cohorte Printemps", date(2026, 3, 1), date(2026, 6, 30))
        .phase("Idéation")
        .phase("Prototypage")
        .phase("Validation")
        .winner_phase("Lancement")
}

fn catalog() -> PhaseCatalog {
    PhaseCatalog::author(ProgramId::new(), &accelerator()).unwrap()
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn authoring_assigns_dense_ordinals_in_order() {
    let catalog = catalog();
    let names: Vec<_> = catalog.phases().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Idéation", "Prototypage", "Validation", "Lancement"]);
    for (i, phase) in catalog.phases().iter().enumerate() {
        assert_eq!(phase.ordinal, i as u32);
        assert_eq!(phase.program_id, catalog.program_id());
    }
}

#[test]
fn first_and_terminal() {
    let catalog = catalog();
    assert_eq!(catalog.first().unwrap().name, "Idéation");
    let terminal = catalog.terminal().unwrap();
    assert_eq!(terminal.name, "Lancement");
    assert!(terminal.has_winner);
    assert!(catalog.is_terminal(terminal.id).unwrap());
    assert!(!catalog.is_terminal(catalog.first().unwrap().id).unwrap());
}

#[test]
fn next_and_previous_walk_one_ordinal() {
    let catalog = catalog();
    let phases = catalog.phases();

    assert_eq!(catalog.next(phases[1].id).unwrap().unwrap().id, phases[2].id);
    assert_eq!(catalog.previous(phases[1].id).unwrap().unwrap().id, phases[0].id);
    assert!(catalog.next(phases[3].id).unwrap().is_none());
    assert!(catalog.previous(phases[0].id).unwrap().is_none());
}

#[test]
fn catalog_from_storage_is_sorted_by_ordinal() {
    let mut phases = catalog().into_phases();
    let program_id = phases[0].program_id;
    phases.reverse();

    let catalog = PhaseCatalog::new(program_id, phases);
    let ordinals: Vec<_> = catalog.phases().iter().map(|p| p.ordinal).collect();
    assert_eq!(ordinals, [0, 1, 2, 3]);
}

#[test]
fn phase_of_another_program_is_not_found() {
    let catalog = catalog();
    let other = PhaseCatalog::author(ProgramId::new(), &accelerator()).unwrap();
    let foreign = other.first().unwrap().id;

    assert!(!catalog.contains(foreign));
    assert!(matches!(catalog.get(foreign), Err(Error::NotFound(_))));
    assert!(catalog.next(foreign).is_err());
}

// ---------------------------------------------------------------------------
// Authoring validation
// ---------------------------------------------------------------------------

#[test]
fn program_without_phases_is_rejected() {
    let new = NewProgram::new("Empty", date(2026, 1, 1), date(2026, 2, 1));
    assert!(matches!(
        PhaseCatalog::author(ProgramId::new(), &new),
        Err(Error::Validation(_))
    ));
}

#[test]
fn duplicate_phase_names_are_rejected_case_insensitively() {
    let new = NewProgram::new("Dup", date(2026, 1, 1), date(2026, 2, 1))
        .phase("Validation")
        .phase("validation");
    assert!(matches!(
        PhaseCatalog::author(ProgramId::new(), &new),
        Err(Error::Validation(_))
    ));
}

#[test]
fn winner_phase_must_be_last() {
    let new = NewProgram::new("Early winner", date(2026, 1, 1), date(2026, 2, 1))
        .winner_phase("Demo Day")
        .phase("Follow-up");
    assert!(matches!(
        PhaseCatalog::author(ProgramId::new(), &new),
        Err(Error::Validation(_))
    ));
}

#[test]
fn end_before_start_is_rejected() {
    let new = NewProgram::new("Backwards", date(2026, 5, 1), date(2026, 4, 1)).phase("Only");
    assert!(matches!(
        PhaseCatalog::author(ProgramId::new(), &new),
        Err(Error::Validation(_))
    ));
}

#[test]
fn blank_phase_name_is_rejected() {
    let new = NewProgram::new("Blank", date(2026, 1, 1), date(2026, 2, 1))
        .phase("Intro")
        .phase("   ");
    assert!(PhaseCatalog::author(ProgramId::new(), &new).is_err());
}

// ---------------------------------------------------------------------------
// Legacy name resolution
// ---------------------------------------------------------------------------

#[test]
fn exact_name_ignores_case() {
    let catalog = catalog();
    assert_eq!(catalog.resolve_name("PROTOTYPAGE").unwrap().ordinal, 1);
    assert_eq!(catalog.resolve_name("  lancement ").unwrap().ordinal, 3);
}

#[test]
fn substring_matches_either_direction() {
    let catalog = catalog();
    // Query contained in the name.
    assert_eq!(catalog.resolve_name("proto").unwrap().ordinal, 1);
    // Name contained in the query.
    assert_eq!(catalog.resolve_name("phase de validation").unwrap().ordinal, 2);
}

#[test]
fn accents_are_folded_as_a_last_resort() {
    let catalog = catalog();
    assert_eq!(catalog.resolve_name("ideation").unwrap().name, "Idéation");
    assert_eq!(catalog.resolve_name("IDEA").unwrap().name, "Idéation");
}

#[test]
fn exact_match_beats_an_earlier_substring_match() {
    let new = NewProgram::new("Overlap", date(2026, 1, 1), date(2026, 2, 1))
        .phase("Demo Day Prep")
        .winner_phase("Demo Day");
    let catalog = PhaseCatalog::author(ProgramId::new(), &new).unwrap();

    assert_eq!(catalog.resolve_name("demo day").unwrap().ordinal, 1);
    // Substring tier picks the lowest ordinal.
    assert_eq!(catalog.resolve_name("demo").unwrap().ordinal, 0);
}

#[test]
fn unknown_or_empty_name_is_phase_not_found() {
    let catalog = catalog();
    assert!(matches!(
        catalog.resolve_name("incubation"),
        Err(Error::PhaseNotFound(_))
    ));
    assert!(matches!(catalog.resolve_name("  "), Err(Error::PhaseNotFound(_))));
}

#[test]
fn fold_strips_diacritics_and_case() {
    assert_eq!(names::fold("Idéation"), "ideation");
    assert_eq!(names::fold("  ÉTÉ Çà "), "ete ca");
}
