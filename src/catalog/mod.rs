//! Phase catalog: the ordered phase sequence of one program.
//!
//! Read-only. Answers ordering questions (first, terminal, next, previous)
//! and validates newly authored sequences.

pub mod names;

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{NewProgram, Phase, PhaseId, ProgramId};
use crate::store::Store;

/// A program's phases, sorted by ordinal.
#[derive(Debug, Clone)]
pub struct PhaseCatalog {
    program_id: ProgramId,
    phases: Vec<Phase>,
}

impl PhaseCatalog {
    /// Build a catalog from phases loaded out of storage.
    pub fn new(program_id: ProgramId, mut phases: Vec<Phase>) -> Self {
        phases.sort_by_key(|p| p.ordinal);
        Self { program_id, phases }
    }

    /// Validate an authored program and assign ids and ordinals to its phases.
    pub fn author(program_id: ProgramId, new: &NewProgram) -> Result<Self> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("program name must not be empty".to_string()));
        }
        if new.start_date > new.end_date {
            return Err(Error::Validation(format!(
                "program starts {} after it ends {}",
                new.start_date, new.end_date
            )));
        }
        if new.phases.is_empty() {
            return Err(Error::Validation(
                "program needs at least one phase".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let last = new.phases.len() - 1;
        for (i, phase) in new.phases.iter().enumerate() {
            let name = phase.name.trim();
            if name.is_empty() {
                return Err(Error::Validation(format!("phase {i} has no name")));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(Error::Validation(format!("duplicate phase name: {name}")));
            }
            if phase.has_winner && i != last {
                return Err(Error::Validation(format!(
                    "only the final phase may yield a winner, not {name}"
                )));
            }
        }

        let phases = new
            .phases
            .iter()
            .enumerate()
            .map(|(i, p)| Phase {
                id: PhaseId::new(),
                program_id,
                name: p.name.trim().to_string(),
                ordinal: i as u32,
                has_winner: p.has_winner,
            })
            .collect();

        Ok(Self { program_id, phases })
    }

    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    /// Phases in ordinal order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn into_phases(self) -> Vec<Phase> {
        self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn contains(&self, phase_id: PhaseId) -> bool {
        self.phases.iter().any(|p| p.id == phase_id)
    }

    /// Look up a phase; fails if it belongs to another program.
    pub fn get(&self, phase_id: PhaseId) -> Result<&Phase> {
        self.phases.iter().find(|p| p.id == phase_id).ok_or_else(|| {
            Error::NotFound(format!("phase {phase_id} in program {}", self.program_id))
        })
    }

    /// The ordinal-0 phase, where unassigned entities implicitly sit.
    pub fn first(&self) -> Option<&Phase> {
        self.phases.first()
    }

    /// The phase with the highest ordinal.
    pub fn terminal(&self) -> Option<&Phase> {
        self.phases.last()
    }

    pub fn is_terminal(&self, phase_id: PhaseId) -> Result<bool> {
        let phase = self.get(phase_id)?;
        Ok(self.terminal().is_some_and(|t| t.id == phase.id))
    }

    pub fn next(&self, phase_id: PhaseId) -> Result<Option<&Phase>> {
        let phase = self.get(phase_id)?;
        Ok(self.by_ordinal(phase.ordinal + 1))
    }

    pub fn previous(&self, phase_id: PhaseId) -> Result<Option<&Phase>> {
        let phase = self.get(phase_id)?;
        Ok(phase.ordinal.checked_sub(1).and_then(|o| self.by_ordinal(o)))
    }

    pub fn by_ordinal(&self, ordinal: u32) -> Option<&Phase> {
        self.phases.iter().find(|p| p.ordinal == ordinal)
    }

    /// Resolve a legacy free-text phase name. See [`names::resolve`].
    pub fn resolve_name(&self, name: &str) -> Result<&Phase> {
        names::resolve(&self.phases, name).ok_or_else(|| Error::PhaseNotFound(name.to_string()))
    }
}

/// Load a program's catalog from storage. Fails if the program is unknown.
pub async fn load(store: &dyn Store, program_id: ProgramId) -> Result<PhaseCatalog> {
    if store.get_program(program_id).await?.is_none() {
        return Err(Error::NotFound(format!("program {program_id}")));
    }
    let phases = store.list_phases(program_id).await?;
    Ok(PhaseCatalog::new(program_id, phases))
}
