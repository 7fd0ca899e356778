//! Error types for cohort-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("phase {phase} does not belong to program {program}")]
    InvalidPhase { program: String, phase: String },

    #[error("entity {0} is already in the final phase")]
    AlreadyTerminal(String),

    #[error("entity {0} is already in the first phase")]
    AlreadyAtStart(String),

    #[error("entity {entity} is not in the final phase of program {program}")]
    NotInTerminalPhase { program: String, entity: String },

    #[error("phase {0} does not yield a winner")]
    PhaseNotWinnerEligible(String),

    #[error("no phase matches name {0:?}")]
    PhaseNotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("program {program} already has winner {entity}")]
    WinnerAlreadyDeclared { program: String, entity: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// The four caller-facing error families, plus everything the caller cannot act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    Forbidden,
    Conflict,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::PhaseNotFound(_) => ErrorKind::NotFound,
            Error::InvalidPhase { .. }
            | Error::AlreadyTerminal(_)
            | Error::AlreadyAtStart(_)
            | Error::NotInTerminalPhase { .. }
            | Error::PhaseNotWinnerEligible(_)
            | Error::InvalidTransition { .. }
            | Error::Validation(_) => ErrorKind::InvalidTransition,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::WinnerAlreadyDeclared { .. } | Error::Conflict(_) => ErrorKind::Conflict,
            Error::Config(_) | Error::Database(_) | Error::Io(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
