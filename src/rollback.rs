//! Cascading rollback: reverting a match and everything derived from it.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::results::{self, settle_byes};
use crate::types::{Bracket, Match, MatchId, MatchStatus, TeamId};

enum Frame {
    Visit(MatchId),
    Clear(MatchId),
}

/// Reverts a match to pending and recursively undoes every downstream
/// placement derived from it. Depth-first over the forward pointers with an
/// explicit stack, so depth is bounded by bracket size rather than the call
/// stack: each match is cleared only after all of its completed dependents
/// have been cleared, which guarantees no match anywhere keeps a team
/// placement traceable to the undone result. Pure bye matches re-resolve
/// immediately afterwards, so resetting them is a no-op.
pub fn reset_match(bracket: &mut Bracket, match_id: MatchId) -> Result<Match> {
    if bracket.find(match_id).is_none() {
        return Err(EngineError::MatchNotFound(match_id));
    }

    let mut visited: HashSet<MatchId> = HashSet::new();
    let mut stack = vec![Frame::Visit(match_id)];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Visit(id) => {
                if !visited.insert(id) {
                    continue;
                }
                stack.push(Frame::Clear(id));
                for dependent in completed_dependents(bracket, id)? {
                    stack.push(Frame::Visit(dependent));
                }
            }
            Frame::Clear(id) => clear_match(bracket, id)?,
        }
    }

    settle_byes(bracket)?;
    bracket
        .find(match_id)
        .cloned()
        .ok_or_else(|| EngineError::Corrupt(format!("match {match_id} vanished after reset")))
}

/// Corrects a finished match's outcome: reset, then re-report with the
/// given winner. Scores default to the previously reported ones.
pub fn override_winner(
    bracket: &mut Bracket,
    match_id: MatchId,
    winner: TeamId,
    score1: Option<u32>,
    score2: Option<u32>,
) -> Result<Match> {
    let m = bracket
        .find(match_id)
        .ok_or(EngineError::MatchNotFound(match_id))?;
    if m.team1_id.as_ref() != Some(&winner) && m.team2_id.as_ref() != Some(&winner) {
        return Err(EngineError::InvalidWinnerOverride { match_id, winner });
    }
    let score1 = score1.or(m.score1).unwrap_or(0);
    let score2 = score2.or(m.score2).unwrap_or(0);

    reset_match(bracket, match_id)?;
    results::report(bracket, match_id, score1, score2, Some(&winner))
}

/// Recomputes the winner of a completed match from new scores. An unchanged
/// winner only touches the score fields; a changed winner cascades through
/// a full reset and re-report.
pub fn edit_score(bracket: &mut Bracket, match_id: MatchId, score1: u32, score2: u32) -> Result<Match> {
    let m = bracket
        .find(match_id)
        .ok_or(EngineError::MatchNotFound(match_id))?;
    if m.status != MatchStatus::Completed {
        return Err(EngineError::MatchNotCompleted(match_id));
    }
    let (Some(team1), Some(team2)) = (m.team1_id.clone(), m.team2_id.clone()) else {
        return Err(EngineError::IncompleteSlots(match_id));
    };
    let new_winner = if score1 > score2 {
        team1
    } else if score2 > score1 {
        team2
    } else {
        return Err(EngineError::AmbiguousResult(match_id));
    };

    if m.winner_id.as_ref() == Some(&new_winner) {
        let m = bracket
            .find_mut(match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        m.score1 = Some(score1);
        m.score2 = Some(score2);
        return Ok(m.clone());
    }

    reset_match(bracket, match_id)?;
    results::report(bracket, match_id, score1, score2, Some(&new_winner))
}

fn completed_dependents(bracket: &Bracket, match_id: MatchId) -> Result<Vec<MatchId>> {
    let m = bracket
        .find(match_id)
        .ok_or(EngineError::MatchNotFound(match_id))?;
    let mut dependents = Vec::new();
    for dest in [m.winner_to, m.loser_to].into_iter().flatten() {
        let dependent = bracket.by_ref(dest).ok_or_else(|| {
            EngineError::Corrupt(format!("forward pointer targets missing match {dest:?}"))
        })?;
        if dependent.status == MatchStatus::Completed && !dependents.contains(&dependent.id) {
            dependents.push(dependent.id);
        }
    }
    Ok(dependents)
}

/// Nulls this match's downstream placements and reverts it to pending. The
/// grand-final reset game is covered by the same pointers: clearing grand
/// final 1 empties both of its slots, deactivating it.
fn clear_match(bracket: &mut Bracket, match_id: MatchId) -> Result<()> {
    let (winner_to, loser_to) = {
        let m = bracket
            .find(match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        (m.winner_to, m.loser_to)
    };
    for dest in [winner_to, loser_to].into_iter().flatten() {
        let dependent = bracket.by_ref_mut(dest).ok_or_else(|| {
            EngineError::Corrupt(format!("forward pointer targets missing match {dest:?}"))
        })?;
        match dest.slot {
            1 => dependent.team1_id = None,
            2 => dependent.team2_id = None,
            other => {
                return Err(EngineError::Corrupt(format!(
                    "forward pointer names slot {other}"
                )))
            }
        }
    }

    let m = bracket
        .find_mut(match_id)
        .ok_or(EngineError::MatchNotFound(match_id))?;
    m.score1 = None;
    m.score2 = None;
    m.winner_id = None;
    m.loser_id = None;
    m.status = MatchStatus::Pending;
    debug!(match_id, "match reverted to pending");
    Ok(())
}

#[cfg(test)]
#[path = "rollback_tests.rs"]
mod rollback_tests;
