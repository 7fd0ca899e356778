//! TOML program definitions and legacy assignment imports.
//!
//! A seed file authors programs with their phases and entities:
//!
//! ```toml
//! [[program]]
//! name = "Cohorte 2026"
//! start_date = "2026-01-15"
//! end_date = "2026-06-30"
//! status = "active"
//! phases = ["Idéation", "Prototypage", "Validation"]
//! winner_phase = "Lancement"
//!
//! [[program.entity]]
//! kind = "team"
//! name = "Atlas"
//! phase = "Prototypage"
//! ```
//!
//! A legacy file places existing entities by phase *name*, for data that
//! predates phase ids:
//!
//! ```toml
//! [[assignment]]
//! program = "8f0c…"
//! entity = "2b7e…"
//! phase_name = "prototypage"
//! ```

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::catalog::PhaseCatalog;
use crate::error::{Error, Result};
use crate::model::*;
use crate::orchestrator::{Orchestrator, ProgramDetail};

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default, rename = "program")]
    pub programs: Vec<ProgramSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSeed {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: Option<ProgramStatus>,
    pub phases: Vec<String>,
    /// Appended after `phases` as the winner-eligible final phase.
    #[serde(default)]
    pub winner_phase: Option<String>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntitySeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitySeed {
    pub kind: EntityKind,
    pub name: String,
    /// Starting phase, by name. Omitted means the first phase.
    #[serde(default)]
    pub phase: Option<String>,
}

/// What seeding one program produced.
#[derive(Debug)]
pub struct SeededProgram {
    pub detail: ProgramDetail,
    pub entities: Vec<Entity>,
}

impl SeedFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad seed file {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check every program before anything is written.
    ///
    /// Catches bad dates, bad phase lists, blank entity names and starting
    /// phases that name no phase, so [`SeedFile::apply`] does not leave a
    /// half-seeded store behind for those.
    pub fn validate(&self) -> Result<()> {
        for program in &self.programs {
            program.validate()?;
        }
        Ok(())
    }

    /// Create every program, its entities and their starting phases.
    pub async fn apply(&self, orchestrator: &Orchestrator) -> Result<Vec<SeededProgram>> {
        self.validate()?;
        let mut seeded = Vec::with_capacity(self.programs.len());
        for program in &self.programs {
            seeded.push(program.apply(orchestrator).await?);
        }
        Ok(seeded)
    }
}

impl ProgramSeed {
    fn to_new_program(&self) -> NewProgram {
        let mut new = NewProgram::new(&self.name, self.start_date, self.end_date);
        for phase in &self.phases {
            new = new.phase(phase);
        }
        if let Some(ref winner) = self.winner_phase {
            new = new.winner_phase(winner);
        }
        new
    }

    fn validate(&self) -> Result<()> {
        let catalog = PhaseCatalog::author(ProgramId::new(), &self.to_new_program())
            .map_err(|e| Error::Validation(format!("program {:?}: {e}", self.name)))?;
        for seed in &self.entities {
            if seed.name.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "program {:?}: entity name must not be empty",
                    self.name
                )));
            }
            if let Some(ref phase) = seed.phase {
                catalog.resolve_name(phase)?;
            }
        }
        Ok(())
    }

    async fn apply(&self, orchestrator: &Orchestrator) -> Result<SeededProgram> {
        let mut detail = orchestrator.create_program(self.to_new_program()).await?;
        let program_id = detail.program.id;

        let mut entities = Vec::with_capacity(self.entities.len());
        for seed in &self.entities {
            let entity = orchestrator
                .register_entity(NewEntity::new(program_id, seed.kind, &seed.name))
                .await?;
            if let Some(ref phase) = seed.phase {
                orchestrator
                    .import_legacy(program_id, entity.id, phase)
                    .await?;
            }
            entities.push(entity);
        }

        if let Some(status) = self.status {
            detail.program = orchestrator.set_program_status(program_id, status).await?;
        }

        info!(%program_id, name = %detail.program.name, entities = entities.len(), "program seeded");
        Ok(SeededProgram { detail, entities })
    }
}

// ---------------------------------------------------------------------------
// Legacy import
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LegacyFile {
    #[serde(default, rename = "assignment")]
    pub assignments: Vec<LegacyAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyAssignment {
    pub program: ProgramId,
    pub entity: EntityId,
    pub phase_name: String,
}

/// Per-row outcome of a legacy import. Failed rows never stop the import.
#[derive(Debug, Default)]
pub struct LegacyReport {
    pub resolved: Vec<(LegacyAssignment, PhaseView)>,
    pub unresolved: Vec<(LegacyAssignment, Error)>,
}

impl LegacyFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad legacy file {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub async fn apply(&self, orchestrator: &Orchestrator) -> LegacyReport {
        let mut report = LegacyReport::default();
        for row in &self.assignments {
            match orchestrator
                .import_legacy(row.program, row.entity, &row.phase_name)
                .await
            {
                Ok(view) => report.resolved.push((row.clone(), view)),
                Err(e) => {
                    warn!(entity_id = %row.entity, phase_name = %row.phase_name, "legacy row not imported: {e}");
                    report.unresolved.push((row.clone(), e));
                }
            }
        }
        report
    }
}
