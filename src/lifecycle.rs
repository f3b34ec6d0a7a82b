//! Tournament lifecycle orchestration: registration, start, results,
//! corrections, and finalization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use crate::broadcast::{Subscription, UpdateBroadcaster};
use crate::builder::build_bracket;
use crate::error::{EngineError, Result};
use crate::store::BracketStore;
use crate::types::{
    Bracket, BracketKind, Match, MatchId, MatchStatus, Payout, Registration, RegistrationStatus,
    TeamId, TournamentStatus,
};
use crate::{results, rollback};

struct TournamentRecord {
    status: TournamentStatus,
    payout: Option<Payout>,
    registrations: Vec<Registration>,
}

impl TournamentRecord {
    fn new() -> Self {
        TournamentRecord {
            status: TournamentStatus::Upcoming,
            payout: None,
            registrations: Vec::new(),
        }
    }
}

/// Facade over the bracket engine. Owns the store, the broadcaster, and the
/// per-tournament registration/payout records.
pub struct TournamentEngine {
    store: Arc<BracketStore>,
    broadcaster: Arc<UpdateBroadcaster>,
    tournaments: Mutex<HashMap<String, TournamentRecord>>,
}

impl Default for TournamentEngine {
    fn default() -> Self {
        TournamentEngine::new()
    }
}

impl TournamentEngine {
    pub fn new() -> Self {
        let broadcaster = UpdateBroadcaster::new();
        TournamentEngine {
            store: Arc::new(BracketStore::new(broadcaster.clone())),
            broadcaster,
            tournaments: Mutex::new(HashMap::new()),
        }
    }

    // ── Registrations ──────────────────────────────────────────────────

    /// Creates a pending registration. The tournament record is created on
    /// first contact, in `upcoming` state.
    pub fn register_team(&self, tournament_id: &str, team_id: &str) -> Result<Registration> {
        let mut tournaments = self.lock_tournaments();
        let record = tournaments
            .entry(tournament_id.to_string())
            .or_insert_with(TournamentRecord::new);
        if record.status != TournamentStatus::Upcoming {
            return Err(EngineError::RegistrationClosed(tournament_id.to_string()));
        }
        if record.registrations.iter().any(|r| r.team_id == team_id) {
            return Err(EngineError::AlreadyRegistered {
                tournament_id: tournament_id.to_string(),
                team_id: team_id.to_string(),
            });
        }
        let registration = Registration {
            tournament_id: tournament_id.to_string(),
            team_id: team_id.to_string(),
            status: RegistrationStatus::Pending,
            created_at: Utc::now(),
        };
        record.registrations.push(registration.clone());
        info!(tournament_id, team_id, "registration requested");
        Ok(registration)
    }

    pub fn approve_registration(&self, tournament_id: &str, team_id: &str) -> Result<Registration> {
        self.set_registration_status(tournament_id, team_id, RegistrationStatus::Approved)
    }

    pub fn decline_registration(&self, tournament_id: &str, team_id: &str) -> Result<Registration> {
        self.set_registration_status(tournament_id, team_id, RegistrationStatus::Declined)
    }

    fn set_registration_status(
        &self,
        tournament_id: &str,
        team_id: &str,
        status: RegistrationStatus,
    ) -> Result<Registration> {
        let mut tournaments = self.lock_tournaments();
        let record = tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.to_string()))?;
        if record.status != TournamentStatus::Upcoming {
            return Err(EngineError::RegistrationClosed(tournament_id.to_string()));
        }
        let registration = record
            .registrations
            .iter_mut()
            .find(|r| r.team_id == team_id)
            .ok_or_else(|| EngineError::RegistrationNotFound {
                tournament_id: tournament_id.to_string(),
                team_id: team_id.to_string(),
            })?;
        registration.status = status;
        info!(tournament_id, team_id, status = ?status, "registration updated");
        Ok(registration.clone())
    }

    pub fn registrations(&self, tournament_id: &str) -> Result<Vec<Registration>> {
        let tournaments = self.lock_tournaments();
        tournaments
            .get(tournament_id)
            .map(|record| record.registrations.clone())
            .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.to_string()))
    }

    pub fn tournament_status(&self, tournament_id: &str) -> Result<TournamentStatus> {
        let tournaments = self.lock_tournaments();
        tournaments
            .get(tournament_id)
            .map(|record| record.status)
            .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.to_string()))
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Builds and stores the bracket from approved registrations in
    /// registration order. Idempotent: a tournament that already has a
    /// bracket gets it back unchanged.
    pub fn start(&self, tournament_id: &str, kind: BracketKind, actor: &str) -> Result<Bracket> {
        if self.store.contains(tournament_id) {
            return self.store.get(tournament_id);
        }
        let seeds: Vec<TeamId> = {
            let tournaments = self.lock_tournaments();
            let record = tournaments
                .get(tournament_id)
                .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.to_string()))?;
            record
                .registrations
                .iter()
                .filter(|r| r.status == RegistrationStatus::Approved)
                .map(|r| r.team_id.clone())
                .collect()
        };
        let bracket = build_bracket(tournament_id, &seeds, kind)?;
        // create publishes; subscribers must never run under the lifecycle
        // lock, or a callback re-entering the engine deadlocks.
        match self.store.create(bracket) {
            Ok(bracket) => {
                let mut tournaments = self.lock_tournaments();
                if let Some(record) = tournaments.get_mut(tournament_id) {
                    record.status = TournamentStatus::Ongoing;
                }
                info!(tournament_id, actor, kind = ?kind, teams = seeds.len(), "tournament started");
                Ok(bracket)
            }
            // Lost a race with a concurrent start; the existing bracket wins.
            Err(EngineError::BracketAlreadyExists(_)) => self.store.get(tournament_id),
            Err(e) => Err(e),
        }
    }

    /// Computes payout eligibility once the deciding grand-final match is
    /// completed. Idempotent: repeat calls return the cached payout.
    pub fn finalize(&self, tournament_id: &str, actor: &str) -> Result<Payout> {
        let mut tournaments = self.lock_tournaments();
        let record = tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.to_string()))?;
        if let Some(payout) = &record.payout {
            return Ok(payout.clone());
        }

        let bracket = self.store.get(tournament_id)?;
        let decider = bracket
            .decider()
            .ok_or_else(|| EngineError::TournamentNotReady(tournament_id.to_string()))?;
        if decider.status != MatchStatus::Completed {
            return Err(EngineError::TournamentNotReady(tournament_id.to_string()));
        }
        let champion_id = decider
            .winner_id
            .clone()
            .ok_or_else(|| EngineError::TournamentNotReady(tournament_id.to_string()))?;
        let runner_up_id = decider.loser_id.clone().ok_or_else(|| {
            EngineError::Corrupt(format!(
                "deciding match {} has a winner but no loser",
                decider.id
            ))
        })?;

        let payout = Payout {
            champion_id,
            runner_up_id,
            computed_at: Utc::now(),
        };
        record.payout = Some(payout.clone());
        record.status = TournamentStatus::Completed;
        info!(tournament_id, actor, champion = %payout.champion_id, "tournament finalized");
        Ok(payout)
    }

    // ── Results and corrections ────────────────────────────────────────

    /// Reports a score for a pending match. Supplying a winner override for
    /// an already completed match routes through the rollback engine.
    pub fn report(
        &self,
        tournament_id: &str,
        match_id: MatchId,
        score1: u32,
        score2: u32,
        winner_override: Option<TeamId>,
        actor: &str,
    ) -> Result<Match> {
        let updated = self.store.mutate(tournament_id, |bracket| {
            let completed = bracket
                .find(match_id)
                .ok_or(EngineError::MatchNotFound(match_id))?
                .status
                == MatchStatus::Completed;
            match (completed, winner_override.as_ref()) {
                (true, Some(winner)) => rollback::override_winner(
                    bracket,
                    match_id,
                    winner.clone(),
                    Some(score1),
                    Some(score2),
                ),
                _ => results::report(bracket, match_id, score1, score2, winner_override.as_ref()),
            }
        })?;
        info!(tournament_id, match_id, actor, score1, score2, "result reported");
        Ok(updated)
    }

    pub fn edit_score(
        &self,
        tournament_id: &str,
        match_id: MatchId,
        score1: u32,
        score2: u32,
        actor: &str,
    ) -> Result<Match> {
        let updated = self.store.mutate(tournament_id, |bracket| {
            rollback::edit_score(bracket, match_id, score1, score2)
        })?;
        info!(tournament_id, match_id, actor, score1, score2, "score edited");
        Ok(updated)
    }

    pub fn override_winner(
        &self,
        tournament_id: &str,
        match_id: MatchId,
        winner: TeamId,
        score1: Option<u32>,
        score2: Option<u32>,
        actor: &str,
    ) -> Result<Match> {
        let updated = self.store.mutate(tournament_id, |bracket| {
            rollback::override_winner(bracket, match_id, winner.clone(), score1, score2)
        })?;
        info!(tournament_id, match_id, actor, winner = %updated.winner_id.as_deref().unwrap_or(""), "winner overridden");
        Ok(updated)
    }

    pub fn reset_match(&self, tournament_id: &str, match_id: MatchId, actor: &str) -> Result<Match> {
        let updated = self
            .store
            .mutate(tournament_id, |bracket| rollback::reset_match(bracket, match_id))?;
        info!(tournament_id, match_id, actor, "match reset");
        Ok(updated)
    }

    // ── Reads and subscriptions ────────────────────────────────────────

    pub fn get_bracket(&self, tournament_id: &str) -> Result<Bracket> {
        self.store.get(tournament_id)
    }

    pub fn subscribe(
        &self,
        tournament_id: &str,
        callback: impl Fn(&Bracket) + Send + Sync + 'static,
    ) -> Subscription {
        self.broadcaster.subscribe(tournament_id, callback)
    }

    pub(crate) fn broadcaster(&self) -> &Arc<UpdateBroadcaster> {
        &self.broadcaster
    }

    fn lock_tournaments(&self) -> MutexGuard<'_, HashMap<String, TournamentRecord>> {
        self.tournaments.lock().unwrap_or_else(|e| e.into_inner())
    }
}
