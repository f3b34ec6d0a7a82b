use thiserror::Error;

use crate::types::MatchId;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse error taxonomy exposed to callers that map errors onto
/// transport-level responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    StateConflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tournament {0} not found")]
    TournamentNotFound(String),

    #[error("no bracket exists for tournament {0}")]
    BracketNotFound(String),

    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    #[error("a bracket needs at least 2 entrants, got {0}")]
    InvalidEntrantCount(usize),

    #[error("unrecognized bracket kind {0:?}")]
    InvalidKind(String),

    #[error("match {0} is tied and no winner override was supplied")]
    AmbiguousResult(MatchId),

    #[error("match {0} is still awaiting a team slot")]
    IncompleteSlots(MatchId),

    #[error("match {0} is already completed")]
    MatchAlreadyCompleted(MatchId),

    #[error("match {0} is not completed")]
    MatchNotCompleted(MatchId),

    #[error("winner override {winner} is not a team of match {match_id}")]
    InvalidWinnerOverride { match_id: MatchId, winner: String },

    #[error("a bracket already exists for tournament {0}")]
    BracketAlreadyExists(String),

    #[error("tournament {0} is not ready to finalize")]
    TournamentNotReady(String),

    #[error("registration for tournament {0} is closed")]
    RegistrationClosed(String),

    #[error("team {team_id} is already registered for tournament {tournament_id}")]
    AlreadyRegistered {
        tournament_id: String,
        team_id: String,
    },

    #[error("no registration for team {team_id} in tournament {tournament_id}")]
    RegistrationNotFound {
        tournament_id: String,
        team_id: String,
    },

    #[error("bracket invariant violated: {0}")]
    Corrupt(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::TournamentNotFound(_)
            | EngineError::BracketNotFound(_)
            | EngineError::MatchNotFound(_)
            | EngineError::RegistrationNotFound { .. } => ErrorKind::NotFound,
            EngineError::InvalidEntrantCount(_)
            | EngineError::InvalidKind(_)
            | EngineError::AmbiguousResult(_)
            | EngineError::IncompleteSlots(_)
            | EngineError::InvalidWinnerOverride { .. } => ErrorKind::InvalidInput,
            EngineError::MatchAlreadyCompleted(_)
            | EngineError::MatchNotCompleted(_)
            | EngineError::BracketAlreadyExists(_)
            | EngineError::TournamentNotReady(_)
            | EngineError::RegistrationClosed(_)
            | EngineError::AlreadyRegistered { .. } => ErrorKind::StateConflict,
            EngineError::Corrupt(_) => ErrorKind::Internal,
        }
    }
}
