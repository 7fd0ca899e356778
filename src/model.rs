//! Core data model.
//!
//! A program owns an ordered sequence of phases. Entities (teams or
//! individual applicants) move through those phases; at most one of them
//! is declared the program's winner.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| Error::Validation(format!("invalid {}: {e}", stringify!($name))))
            }
        }
    };
}

id_type!(
    /// Newtype for program IDs.
    ProgramId
);
id_type!(
    /// Newtype for phase IDs.
    PhaseId
);
id_type!(
    /// Newtype for entity (team or individual) IDs.
    EntityId
);

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// An accelerator program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub status: ProgramStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a program. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Draft,
    Active,
    Completed,
}

impl ProgramStatus {
    /// Can transition from self to `to`? Staying put counts as allowed.
    pub fn can_transition_to(self, to: ProgramStatus) -> bool {
        use ProgramStatus::*;
        matches!(
            (self, to),
            (Draft, _) | (Active, Active | Completed) | (Completed, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ProgramStatus::Completed
    }
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgramStatus::Draft => "draft",
            ProgramStatus::Active => "active",
            ProgramStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProgramStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProgramStatus::Draft),
            "active" => Ok(ProgramStatus::Active),
            "completed" => Ok(ProgramStatus::Completed),
            other => Err(Error::Validation(format!("unknown program status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One stage in a program's sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: PhaseId,
    pub program_id: ProgramId,
    pub name: String,
    /// Zero-based position, unique within the program.
    pub ordinal: u32,
    /// Whether a winner may be declared in this phase.
    pub has_winner: bool,
}

/// What the UI needs to render an entity's position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseView {
    pub phase_id: PhaseId,
    pub name: String,
    pub ordinal: u32,
}

impl From<&Phase> for PhaseView {
    fn from(phase: &Phase) -> Self {
        Self {
            phase_id: phase.id,
            name: phase.name.clone(),
            ordinal: phase.ordinal,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A team or individual applicant tracked through a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub program_id: ProgramId,
    pub kind: EntityKind,
    pub name: String,
    pub status: EntityStatus,
    /// 0..=100. Set to 100 when the entity wins.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Team,
    Individual,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Team => "team",
            EntityKind::Individual => "individual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(EntityKind::Team),
            "individual" => Ok(EntityKind::Individual),
            other => Err(Error::Validation(format!("unknown entity kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    AtRisk,
    /// Reserved for the declared winner.
    Completed,
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityStatus::Active => "active",
            EntityStatus::AtRisk => "at_risk",
            EntityStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EntityStatus::Active),
            "at_risk" => Ok(EntityStatus::AtRisk),
            "completed" => Ok(EntityStatus::Completed),
            other => Err(Error::Validation(format!("unknown entity status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Assignment + Winner
// ---------------------------------------------------------------------------

/// Which phase an entity currently occupies in a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseAssignment {
    pub entity_id: EntityId,
    pub program_id: ProgramId,
    pub phase_id: PhaseId,
    pub updated_at: DateTime<Utc>,
}

/// The single winner of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub program_id: ProgramId,
    pub entity_id: EntityId,
    pub phase_id: PhaseId,
    pub declared_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Role of whoever triggered an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Staff,
    /// May view and move entities between ordinary phases, never pick winners.
    Mentor,
}

impl ActorRole {
    pub fn can_declare_winner(self) -> bool {
        !matches!(self, ActorRole::Mentor)
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorRole::Admin => "admin",
            ActorRole::Staff => "staff",
            ActorRole::Mentor => "mentor",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ActorRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(ActorRole::Admin),
            "staff" => Ok(ActorRole::Staff),
            "mentor" => Ok(ActorRole::Mentor),
            other => Err(Error::Validation(format!("unknown actor role: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A phase as authored, before it gets an id and ordinal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhase {
    pub name: String,
    #[serde(default)]
    pub has_winner: bool,
}

/// Builder for authoring a program and its phase sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgram {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub phases: Vec<NewPhase>,
}

impl NewProgram {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            phases: Vec::new(),
        }
    }

    /// Append an ordinary phase.
    pub fn phase(mut self, name: impl Into<String>) -> Self {
        self.phases.push(NewPhase {
            name: name.into(),
            has_winner: false,
        });
        self
    }

    /// Append a phase in which a winner can be declared. Must be the last one.
    pub fn winner_phase(mut self, name: impl Into<String>) -> Self {
        self.phases.push(NewPhase {
            name: name.into(),
            has_winner: true,
        });
        self
    }
}

/// Builder for registering an entity in a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntity {
    pub program_id: ProgramId,
    pub kind: EntityKind,
    pub name: String,
}

impl NewEntity {
    pub fn new(program_id: ProgramId, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            program_id,
            kind,
            name: name.into(),
        }
    }

    pub fn team(program_id: ProgramId, name: impl Into<String>) -> Self {
        Self::new(program_id, EntityKind::Team, name)
    }

    pub fn individual(program_id: ProgramId, name: impl Into<String>) -> Self {
        Self::new(program_id, EntityKind::Individual, name)
    }
}
