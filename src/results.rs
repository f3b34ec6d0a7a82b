//! Result reporting and forward propagation.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::types::{Bracket, BracketKind, Match, MatchId, MatchStatus, Side, SlotRef, SlotSource, TeamId};

/// Applies a reported score to a pending match, decides the winner, and
/// propagates winner/loser into their forward slots. Overriding an already
/// completed match goes through the rollback engine instead.
pub fn report(
    bracket: &mut Bracket,
    match_id: MatchId,
    score1: u32,
    score2: u32,
    winner_override: Option<&TeamId>,
) -> Result<Match> {
    let m = bracket
        .find(match_id)
        .ok_or(EngineError::MatchNotFound(match_id))?;
    if m.status == MatchStatus::Completed {
        return Err(EngineError::MatchAlreadyCompleted(match_id));
    }
    let (Some(team1), Some(team2)) = (m.team1_id.clone(), m.team2_id.clone()) else {
        return Err(EngineError::IncompleteSlots(match_id));
    };

    let winner = match winner_override {
        Some(winner) if *winner == team1 || *winner == team2 => winner.clone(),
        Some(winner) => {
            return Err(EngineError::InvalidWinnerOverride {
                match_id,
                winner: winner.clone(),
            })
        }
        None => {
            if score1 > score2 {
                team1.clone()
            } else if score2 > score1 {
                team2.clone()
            } else {
                return Err(EngineError::AmbiguousResult(match_id));
            }
        }
    };
    let loser = if winner == team1 { team2 } else { team1 };

    {
        let m = bracket
            .find_mut(match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        m.score1 = Some(score1);
        m.score2 = Some(score2);
        m.winner_id = Some(winner.clone());
        m.loser_id = Some(loser);
        m.status = MatchStatus::Completed;
    }
    debug!(match_id, winner = %winner, score1, score2, "match completed");

    apply_completion(bracket, match_id)?;
    settle_byes(bracket)?;

    bracket
        .find(match_id)
        .cloned()
        .ok_or_else(|| EngineError::Corrupt(format!("match {match_id} vanished after report")))
}

/// Pushes a completed match's winner (and, in double elimination, its
/// loser) into the forward slots wired at build time.
pub(crate) fn apply_completion(bracket: &mut Bracket, match_id: MatchId) -> Result<()> {
    let m = bracket
        .find(match_id)
        .ok_or(EngineError::MatchNotFound(match_id))?
        .clone();

    if m.side == Side::Grand {
        // Grand final 1 taken by the losers-bracket representative (slot 2)
        // activates the reset game with the same two teams. Any other grand
        // result decides the tournament and propagates nowhere.
        if m.index == 0 && m.winner_id.is_some() && m.winner_id == m.team2_id {
            if let (Some(dest), Some(winner)) = (m.winner_to, m.winner_id.clone()) {
                place_team(bracket, dest, winner)?;
            }
            if let (Some(dest), Some(loser)) = (m.loser_to, m.loser_id.clone()) {
                place_team(bracket, dest, loser)?;
            }
        }
        return Ok(());
    }

    if let (Some(dest), Some(winner)) = (m.winner_to, m.winner_id.clone()) {
        place_team(bracket, dest, winner)?;
    }
    // Losers of losers-bracket matches are eliminated; only winners-side
    // losers drop anywhere.
    if bracket.kind == BracketKind::Double && m.side == Side::Winners {
        if let (Some(dest), Some(loser)) = (m.loser_to, m.loser_id.clone()) {
            place_team(bracket, dest, loser)?;
        }
    }
    Ok(())
}

fn place_team(bracket: &mut Bracket, dest: SlotRef, team: TeamId) -> Result<()> {
    let Some(m) = bracket.by_ref_mut(dest) else {
        return Err(EngineError::Corrupt(format!(
            "forward pointer targets missing match {dest:?}"
        )));
    };
    let slot = match dest.slot {
        1 => &mut m.team1_id,
        2 => &mut m.team2_id,
        other => {
            return Err(EngineError::Corrupt(format!(
                "forward pointer names slot {other}"
            )))
        }
    };
    match slot {
        Some(existing) if *existing != team => Err(EngineError::Corrupt(format!(
            "slot {dest:?} already holds {existing}, cannot place {team}"
        ))),
        _ => {
            *slot = Some(team);
            Ok(())
        }
    }
}

/// Runs auto-resolution to a fixpoint: a pending match whose one slot holds
/// a team while the other slot's source can never produce one completes as
/// a bye (winner, no loser, no scores); a match whose both sources are
/// exhausted completes void (no winner at all). Grand-final matches always
/// end up with two real teams and are left alone.
pub(crate) fn settle_byes(bracket: &mut Bracket) -> Result<()> {
    loop {
        let mut actions: Vec<(MatchId, Option<TeamId>)> = Vec::new();
        for m in bracket.iter_matches() {
            if m.status != MatchStatus::Pending || m.side == Side::Grand {
                continue;
            }
            let exhausted1 = slot_exhausted(bracket, &m.sources[0])?;
            let exhausted2 = slot_exhausted(bracket, &m.sources[1])?;
            match (&m.team1_id, &m.team2_id, exhausted1, exhausted2) {
                (Some(team), None, _, true) => actions.push((m.id, Some(team.clone()))),
                (None, Some(team), true, _) => actions.push((m.id, Some(team.clone()))),
                (None, None, true, true) => actions.push((m.id, None)),
                _ => {}
            }
        }
        if actions.is_empty() {
            return Ok(());
        }
        for (id, winner) in actions {
            let m = bracket
                .find_mut(id)
                .ok_or(EngineError::MatchNotFound(id))?;
            if m.status != MatchStatus::Pending {
                continue;
            }
            m.status = MatchStatus::Completed;
            m.winner_id = winner.clone();
            match &winner {
                Some(team) => {
                    debug!(match_id = id, winner = %team, "bye auto-resolved");
                    apply_completion(bracket, id)?;
                }
                None => debug!(match_id = id, "match voided, both feeds are byes"),
            }
        }
    }
}

/// True when a slot's source can never produce a team: a seeded bye, or an
/// upstream match that completed without the winner/loser this slot needs.
fn slot_exhausted(bracket: &Bracket, source: &SlotSource) -> Result<bool> {
    let resolved = match source {
        SlotSource::Seed(team) => team.is_none(),
        SlotSource::WinnerOf(id) => {
            let m = bracket
                .find(*id)
                .ok_or_else(|| EngineError::Corrupt(format!("slot source references missing match {id}")))?;
            m.status == MatchStatus::Completed && m.winner_id.is_none()
        }
        SlotSource::LoserOf(id) => {
            let m = bracket
                .find(*id)
                .ok_or_else(|| EngineError::Corrupt(format!("slot source references missing match {id}")))?;
            m.status == MatchStatus::Completed && m.loser_id.is_none()
        }
    };
    Ok(resolved)
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod results_tests;
