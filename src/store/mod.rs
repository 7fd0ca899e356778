//! Storage seam: the single source of truth for programs, phases, entities,
//! phase assignments and winners.
//!
//! Two backends implement [`Store`]: [`MemoryStore`] for development and
//! tests, and the Postgres [`crate::db::Db`] for production.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::*;

/// An assignment write together with the phase it replaced.
#[derive(Debug, Clone)]
pub struct AssignmentChange {
    pub previous: Option<PhaseId>,
    pub assignment: PhaseAssignment,
}

/// Outcome of trying to record a winner.
#[derive(Debug, Clone)]
pub enum WinnerInsert {
    /// Record stored; the entity is now completed with progress 100.
    Declared(WinnerRecord),
    /// The program already had a winner. Nothing changed.
    Existing(WinnerRecord),
    /// The entity was no longer in the expected phase when the write landed.
    PhaseMoved,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap liveness probe for the backend.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    /// Insert a program and its full phase sequence atomically.
    async fn insert_program(&self, program: &Program, phases: &[Phase]) -> Result<()>;

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>>;

    async fn list_programs(&self) -> Result<Vec<Program>>;

    /// Compare-and-swap the program status. `None` if it was not `from`.
    async fn update_program_status(
        &self,
        id: ProgramId,
        from: ProgramStatus,
        to: ProgramStatus,
    ) -> Result<Option<Program>>;

    /// Phases of a program, ordered by ordinal. Empty if the program is unknown.
    async fn list_phases(&self, program_id: ProgramId) -> Result<Vec<Phase>>;

    async fn insert_entity(&self, entity: &Entity) -> Result<()>;

    async fn get_entity(&self, id: EntityId) -> Result<Option<Entity>>;

    async fn list_entities(&self, program_id: ProgramId) -> Result<Vec<Entity>>;

    /// Compare-and-swap the entity status. `None` if it was not `from`.
    async fn update_entity_status(
        &self,
        id: EntityId,
        from: EntityStatus,
        to: EntityStatus,
    ) -> Result<Option<Entity>>;

    async fn get_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
    ) -> Result<Option<PhaseAssignment>>;

    async fn list_assignments(&self, program_id: ProgramId) -> Result<Vec<PhaseAssignment>>;

    /// Unconditional set. Concurrent writers on one key serialize; last commit wins.
    async fn upsert_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        phase_id: PhaseId,
    ) -> Result<AssignmentChange>;

    /// Set only if the current phase is still `expected` (`None` = unassigned).
    /// Returns `None` when another writer got there first.
    async fn swap_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        expected: Option<PhaseId>,
        phase_id: PhaseId,
    ) -> Result<Option<PhaseAssignment>>;

    /// Record a winner if the program has none, in one atomic step with the
    /// phase check and the entity's status update.
    ///
    /// The entity must currently be assigned to `record.phase_id`, or be
    /// unassigned when `unassigned_in_phase` says that counts as the same.
    async fn insert_winner(
        &self,
        record: &WinnerRecord,
        unassigned_in_phase: bool,
    ) -> Result<WinnerInsert>;

    async fn get_winner(&self, program_id: ProgramId) -> Result<Option<WinnerRecord>>;
}
