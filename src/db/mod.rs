//! Postgres backend: connection pool, migrations, health check, and the
//! [`Store`] implementation.
//!
//! Each submodule adds inherent query methods to [`Db`]; the trait impl
//! below only delegates.

mod entities;
mod programs;
mod tracking;
mod winners;

use crate::error::{Error, Result};
use crate::model::*;
use crate::store::{AssignmentChange, Store, WinnerInsert};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Cloning shares the connection pool.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translate constraint violations into domain errors.
fn map_constraint(err: sqlx::Error, program_id: ProgramId, phase_id: PhaseId) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => Error::InvalidPhase {
            program: program_id.to_string(),
            phase: phase_id.to_string(),
        },
        _ => Error::Database(err),
    }
}

#[async_trait]
impl Store for Db {
    async fn health_check(&self) -> Result<()> {
        Db::health_check(self).await
    }

    async fn insert_program(&self, program: &Program, phases: &[Phase]) -> Result<()> {
        self.insert_program_row(program, phases).await
    }

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>> {
        self.fetch_program(id).await
    }

    async fn list_programs(&self) -> Result<Vec<Program>> {
        self.fetch_programs().await
    }

    async fn update_program_status(
        &self,
        id: ProgramId,
        from: ProgramStatus,
        to: ProgramStatus,
    ) -> Result<Option<Program>> {
        self.swap_program_status(id, from, to).await
    }

    async fn list_phases(&self, program_id: ProgramId) -> Result<Vec<Phase>> {
        self.fetch_phases(program_id).await
    }

    async fn insert_entity(&self, entity: &Entity) -> Result<()> {
        self.insert_entity_row(entity).await
    }

    async fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        self.fetch_entity(id).await
    }

    async fn list_entities(&self, program_id: ProgramId) -> Result<Vec<Entity>> {
        self.fetch_entities(program_id).await
    }

    async fn update_entity_status(
        &self,
        id: EntityId,
        from: EntityStatus,
        to: EntityStatus,
    ) -> Result<Option<Entity>> {
        self.swap_entity_status(id, from, to).await
    }

    async fn get_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
    ) -> Result<Option<PhaseAssignment>> {
        self.fetch_assignment(entity_id, program_id).await
    }

    async fn list_assignments(&self, program_id: ProgramId) -> Result<Vec<PhaseAssignment>> {
        self.fetch_assignments(program_id).await
    }

    async fn upsert_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        phase_id: PhaseId,
    ) -> Result<AssignmentChange> {
        self.put_assignment(entity_id, program_id, phase_id).await
    }

    async fn swap_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        expected: Option<PhaseId>,
        phase_id: PhaseId,
    ) -> Result<Option<PhaseAssignment>> {
        self.cas_assignment(entity_id, program_id, expected, phase_id)
            .await
    }

    async fn insert_winner(
        &self,
        record: &WinnerRecord,
        unassigned_in_phase: bool,
    ) -> Result<WinnerInsert> {
        self.record_winner(record, unassigned_in_phase).await
    }

    async fn get_winner(&self, program_id: ProgramId) -> Result<Option<WinnerRecord>> {
        self.fetch_winner(program_id).await
    }
}
