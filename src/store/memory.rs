//! In-memory store for development and testing.
//!
//! Everything sits behind one lock so multi-record writes (winner + entity
//! status) are atomic, mirroring what a Postgres transaction gives `Db`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AssignmentChange, Store, WinnerInsert};
use crate::error::{Error, Result};
use crate::model::*;

#[derive(Debug, Default)]
struct Inner {
    programs: HashMap<ProgramId, Program>,
    phases: HashMap<ProgramId, Vec<Phase>>,
    entities: HashMap<EntityId, Entity>,
    assignments: HashMap<(EntityId, ProgramId), PhaseAssignment>,
    winners: HashMap<ProgramId, WinnerRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_program(&self, program: &Program, phases: &[Phase]) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.programs.contains_key(&program.id) {
            return Err(Error::Conflict(format!("program {} already exists", program.id)));
        }
        let mut phases = phases.to_vec();
        phases.sort_by_key(|p| p.ordinal);
        inner.programs.insert(program.id, program.clone());
        inner.phases.insert(program.id, phases);
        Ok(())
    }

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>> {
        Ok(self.inner.read().await.programs.get(&id).cloned())
    }

    async fn list_programs(&self) -> Result<Vec<Program>> {
        let inner = self.inner.read().await;
        let mut programs: Vec<_> = inner.programs.values().cloned().collect();
        programs.sort_by_key(|p| p.created_at);
        Ok(programs)
    }

    async fn update_program_status(
        &self,
        id: ProgramId,
        from: ProgramStatus,
        to: ProgramStatus,
    ) -> Result<Option<Program>> {
        let mut inner = self.inner.write().await;
        match inner.programs.get_mut(&id) {
            Some(program) if program.status == from => {
                program.status = to;
                program.updated_at = Utc::now();
                Ok(Some(program.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_phases(&self, program_id: ProgramId) -> Result<Vec<Phase>> {
        let inner = self.inner.read().await;
        Ok(inner.phases.get(&program_id).cloned().unwrap_or_default())
    }

    async fn insert_entity(&self, entity: &Entity) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.programs.contains_key(&entity.program_id) {
            return Err(Error::NotFound(format!("program {}", entity.program_id)));
        }
        if inner.entities.contains_key(&entity.id) {
            return Err(Error::Conflict(format!("entity {} already exists", entity.id)));
        }
        inner.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        Ok(self.inner.read().await.entities.get(&id).cloned())
    }

    async fn list_entities(&self, program_id: ProgramId) -> Result<Vec<Entity>> {
        let inner = self.inner.read().await;
        let mut entities: Vec<_> = inner
            .entities
            .values()
            .filter(|e| e.program_id == program_id)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(entities)
    }

    async fn update_entity_status(
        &self,
        id: EntityId,
        from: EntityStatus,
        to: EntityStatus,
    ) -> Result<Option<Entity>> {
        let mut inner = self.inner.write().await;
        match inner.entities.get_mut(&id) {
            Some(entity) if entity.status == from => {
                entity.status = to;
                entity.updated_at = Utc::now();
                Ok(Some(entity.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
    ) -> Result<Option<PhaseAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner.assignments.get(&(entity_id, program_id)).cloned())
    }

    async fn list_assignments(&self, program_id: ProgramId) -> Result<Vec<PhaseAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .assignments
            .values()
            .filter(|a| a.program_id == program_id)
            .cloned()
            .collect())
    }

    async fn upsert_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        phase_id: PhaseId,
    ) -> Result<AssignmentChange> {
        let mut inner = self.inner.write().await;
        check_phase(&inner, program_id, phase_id)?;
        let assignment = PhaseAssignment {
            entity_id,
            program_id,
            phase_id,
            updated_at: Utc::now(),
        };
        let previous = inner
            .assignments
            .insert((entity_id, program_id), assignment.clone())
            .map(|a| a.phase_id);
        Ok(AssignmentChange {
            previous,
            assignment,
        })
    }

    async fn swap_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        expected: Option<PhaseId>,
        phase_id: PhaseId,
    ) -> Result<Option<PhaseAssignment>> {
        let mut inner = self.inner.write().await;
        check_phase(&inner, program_id, phase_id)?;
        let key = (entity_id, program_id);
        let current = inner.assignments.get(&key).map(|a| a.phase_id);
        if current != expected {
            return Ok(None);
        }
        let assignment = PhaseAssignment {
            entity_id,
            program_id,
            phase_id,
            updated_at: Utc::now(),
        };
        inner.assignments.insert(key, assignment.clone());
        Ok(Some(assignment))
    }

    async fn insert_winner(
        &self,
        record: &WinnerRecord,
        unassigned_in_phase: bool,
    ) -> Result<WinnerInsert> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.winners.get(&record.program_id) {
            return Ok(WinnerInsert::Existing(existing.clone()));
        }

        let in_phase = match inner.assignments.get(&(record.entity_id, record.program_id)) {
            Some(a) => a.phase_id == record.phase_id,
            None => unassigned_in_phase,
        };
        if !in_phase {
            return Ok(WinnerInsert::PhaseMoved);
        }

        let entity = inner
            .entities
            .get_mut(&record.entity_id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", record.entity_id)))?;
        entity.status = EntityStatus::Completed;
        entity.progress = 100;
        entity.updated_at = record.declared_at;

        inner.winners.insert(record.program_id, record.clone());
        Ok(WinnerInsert::Declared(record.clone()))
    }

    async fn get_winner(&self, program_id: ProgramId) -> Result<Option<WinnerRecord>> {
        Ok(self.inner.read().await.winners.get(&program_id).cloned())
    }
}

/// Same guarantee the phase_assignments foreign key gives in Postgres.
fn check_phase(inner: &Inner, program_id: ProgramId, phase_id: PhaseId) -> Result<()> {
    let known = inner
        .phases
        .get(&program_id)
        .is_some_and(|phases| phases.iter().any(|p| p.id == phase_id));
    if known {
        Ok(())
    } else {
        Err(Error::InvalidPhase {
            program: program_id.to_string(),
            phase: phase_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn seeded() -> (MemoryStore, Program, Vec<Phase>, Entity) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let program = Program {
            id: ProgramId::new(),
            name: "Test".to_string(),
            status: ProgramStatus::Draft,
            start_date: date,
            end_date: date,
            created_at: now,
            updated_at: now,
        };
        let phases: Vec<_> = ["One", "Two"]
            .iter()
            .enumerate()
            .map(|(i, name)| Phase {
                id: PhaseId::new(),
                program_id: program.id,
                name: name.to_string(),
                ordinal: i as u32,
                has_winner: i == 1,
            })
            .collect();
        store.insert_program(&program, &phases).await.unwrap();
        let entity = Entity {
            id: EntityId::new(),
            program_id: program.id,
            kind: EntityKind::Team,
            name: "Atlas".to_string(),
            status: EntityStatus::Active,
            progress: 0,
            created_at: now,
            updated_at: now,
        };
        store.insert_entity(&entity).await.unwrap();
        (store, program, phases, entity)
    }

    #[tokio::test]
    async fn swap_requires_expected_phase() {
        let (store, program, phases, entity) = seeded().await;

        // Expecting an assignment that does not exist yet.
        let lost = store
            .swap_assignment(entity.id, program.id, Some(phases[0].id), phases[1].id)
            .await
            .unwrap();
        assert!(lost.is_none());

        let won = store
            .swap_assignment(entity.id, program.id, None, phases[1].id)
            .await
            .unwrap();
        assert_eq!(won.map(|a| a.phase_id), Some(phases[1].id));

        // A second swap from "unassigned" now loses.
        let stale = store
            .swap_assignment(entity.id, program.id, None, phases[0].id)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn upsert_reports_previous_phase() {
        let (store, program, phases, entity) = seeded().await;

        let first = store
            .upsert_assignment(entity.id, program.id, phases[0].id)
            .await
            .unwrap();
        assert_eq!(first.previous, None);
        let second = store
            .upsert_assignment(entity.id, program.id, phases[1].id)
            .await
            .unwrap();
        assert_eq!(second.previous, Some(phases[0].id));
    }

    #[tokio::test]
    async fn winner_insert_checks_phase_then_keeps_first() {
        let (store, program, phases, entity) = seeded().await;
        let record = WinnerRecord {
            program_id: program.id,
            entity_id: entity.id,
            phase_id: phases[1].id,
            declared_at: Utc::now(),
        };

        // Unassigned in a two-phase program means first phase, not final.
        let moved = store.insert_winner(&record, false).await.unwrap();
        assert!(matches!(moved, WinnerInsert::PhaseMoved));

        store
            .upsert_assignment(entity.id, program.id, phases[1].id)
            .await
            .unwrap();
        let declared = store.insert_winner(&record, false).await.unwrap();
        assert!(matches!(declared, WinnerInsert::Declared(_)));

        let entity = store.get_entity(entity.id).await.unwrap().unwrap();
        assert_eq!(entity.status, EntityStatus::Completed);
        assert_eq!(entity.progress, 100);

        let other = WinnerRecord {
            entity_id: EntityId::new(),
            ..record.clone()
        };
        match store.insert_winner(&other, false).await.unwrap() {
            WinnerInsert::Existing(existing) => assert_eq!(existing, record),
            other => panic!("expected Existing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_phase_is_invalid() {
        let (store, program, _, entity) = seeded().await;
        let err = store
            .upsert_assignment(entity.id, program.id, PhaseId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPhase { .. }));
    }
}
