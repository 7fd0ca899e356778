//! Program and phase catalog queries.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::*;

impl super::Db {
    /// Insert a program and its phases in one transaction.
    pub(super) async fn insert_program_row(&self, program: &Program, phases: &[Phase]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO programs (id, name, status, start_date, end_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(program.id.0)
        .bind(&program.name)
        .bind(program.status.to_string())
        .bind(program.start_date)
        .bind(program.end_date)
        .bind(program.created_at)
        .bind(program.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(Error::Conflict(format!("program {} already exists", program.id)));
        }

        for phase in phases {
            sqlx::query(
                "INSERT INTO phases (id, program_id, name, ordinal, has_winner)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(phase.id.0)
            .bind(phase.program_id.0)
            .bind(&phase.name)
            .bind(phase.ordinal as i32)
            .bind(phase.has_winner)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub(super) async fn fetch_program(&self, id: ProgramId) -> Result<Option<Program>> {
        let row: Option<ProgramRow> = sqlx::query_as(
            "SELECT id, name, status, start_date, end_date, created_at, updated_at
             FROM programs WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.map(ProgramRow::try_into_program).transpose()
    }

    pub(super) async fn fetch_programs(&self) -> Result<Vec<Program>> {
        let rows: Vec<ProgramRow> = sqlx::query_as(
            "SELECT id, name, status, start_date, end_date, created_at, updated_at
             FROM programs ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(ProgramRow::try_into_program).collect()
    }

    /// Optimistic status change: only applies if the row still holds `from`.
    pub(super) async fn swap_program_status(
        &self,
        id: ProgramId,
        from: ProgramStatus,
        to: ProgramStatus,
    ) -> Result<Option<Program>> {
        let row: Option<ProgramRow> = sqlx::query_as(
            "UPDATE programs SET status = $1, updated_at = $2
             WHERE id = $3 AND status = $4
             RETURNING id, name, status, start_date, end_date, created_at, updated_at",
        )
        .bind(to.to_string())
        .bind(Utc::now())
        .bind(id.0)
        .bind(from.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(ProgramRow::try_into_program).transpose()
    }

    pub(super) async fn fetch_phases(&self, program_id: ProgramId) -> Result<Vec<Phase>> {
        let rows: Vec<PhaseRow> = sqlx::query_as(
            "SELECT id, program_id, name, ordinal, has_winner
             FROM phases WHERE program_id = $1 ORDER BY ordinal ASC",
        )
        .bind(program_id.0)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Phase::from).collect())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ProgramRow {
    id: Uuid,
    name: String,
    status: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProgramRow {
    fn try_into_program(self) -> Result<Program> {
        Ok(Program {
            id: ProgramId(self.id),
            name: self.name,
            status: self.status.parse()?,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PhaseRow {
    id: Uuid,
    program_id: Uuid,
    name: String,
    ordinal: i32,
    has_winner: bool,
}

impl From<PhaseRow> for Phase {
    fn from(row: PhaseRow) -> Self {
        Self {
            id: PhaseId(row.id),
            program_id: ProgramId(row.program_id),
            name: row.name,
            ordinal: row.ordinal as u32,
            has_winner: row.has_winner,
        }
    }
}
