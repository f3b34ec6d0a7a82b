//! Match graph construction for single and double elimination.
//!
//! Seeding is adjacent pairing in seed order: round-1 match *i* pits seed
//! 2i against seed 2i+1, with bye padding at the tail when the entrant
//! count is not a power of two. The losers bracket uses the standard
//! two-phase layout: for each winners round k >= 2 there is an odd losers
//! round pairing survivors of the previous even round (round 1 pairs the
//! winners-round-1 losers directly), then an even round pairing each
//! odd-round winner against the loser dropping from winners round k.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::results::settle_byes;
use crate::types::{Bracket, BracketKind, Match, MatchId, Round, Side, SlotRef, SlotSource, TeamId};

/// Builds a fully wired bracket with round-1 slots seeded, all forward
/// pointers set, and byes already settled.
pub fn build_bracket(tournament_id: &str, teams: &[TeamId], kind: BracketKind) -> Result<Bracket> {
    if teams.len() < 2 {
        return Err(EngineError::InvalidEntrantCount(teams.len()));
    }

    let mut next_id: MatchId = 1;
    let mut bracket = match kind {
        BracketKind::Single => Bracket {
            tournament_id: tournament_id.to_string(),
            kind,
            winners: build_winners(teams, &mut next_id),
            losers: Vec::new(),
            grand: Vec::new(),
        },
        BracketKind::Double => build_double(tournament_id, teams, &mut next_id)?,
    };

    wire_forward_refs(&mut bracket)?;
    settle_byes(&mut bracket)?;
    debug!(
        tournament_id,
        kind = ?kind,
        teams = teams.len(),
        matches = bracket.match_count(),
        "bracket materialized"
    );
    Ok(bracket)
}

fn take_id(next_id: &mut MatchId) -> MatchId {
    let id = *next_id;
    *next_id += 1;
    id
}

fn build_winners(teams: &[TeamId], next_id: &mut MatchId) -> Vec<Round> {
    let size = teams.len().next_power_of_two();
    let round_count = size.trailing_zeros();

    let mut rounds = Vec::with_capacity(round_count as usize);
    let mut prev_ids: Vec<MatchId> = Vec::new();
    for round_no in 1..=round_count {
        let match_count = size >> round_no;
        let mut matches = Vec::with_capacity(match_count);
        let mut ids = Vec::with_capacity(match_count);
        for i in 0..match_count {
            let sources = if round_no == 1 {
                [
                    SlotSource::Seed(teams.get(2 * i).cloned()),
                    SlotSource::Seed(teams.get(2 * i + 1).cloned()),
                ]
            } else {
                [
                    SlotSource::WinnerOf(prev_ids[2 * i]),
                    SlotSource::WinnerOf(prev_ids[2 * i + 1]),
                ]
            };
            let m = Match::new(take_id(next_id), Side::Winners, round_no, i as u32, sources);
            ids.push(m.id);
            matches.push(m);
        }
        rounds.push(Round {
            round: round_no,
            matches,
        });
        prev_ids = ids;
    }
    rounds
}

fn build_double(tournament_id: &str, teams: &[TeamId], next_id: &mut MatchId) -> Result<Bracket> {
    let winners = build_winners(teams, next_id);
    let winners_ids: Vec<Vec<MatchId>> = winners
        .iter()
        .map(|round| round.matches.iter().map(|m| m.id).collect())
        .collect();

    let mut losers: Vec<Round> = Vec::new();
    let mut losers_ids: Vec<Vec<MatchId>> = Vec::new();
    let mut losers_round_no = 0u32;

    for k in 1..winners_ids.len() {
        let match_count = winners_ids[k].len();

        // Odd round: winners-round-1 losers (k == 1) or survivors of the
        // previous even round.
        losers_round_no += 1;
        let mut matches = Vec::with_capacity(match_count);
        let mut ids = Vec::with_capacity(match_count);
        for j in 0..match_count {
            let sources = if k == 1 {
                [
                    SlotSource::LoserOf(winners_ids[0][2 * j]),
                    SlotSource::LoserOf(winners_ids[0][2 * j + 1]),
                ]
            } else {
                let prev_even = losers_ids
                    .last()
                    .ok_or_else(|| EngineError::Corrupt("missing losers round".to_string()))?;
                [
                    SlotSource::WinnerOf(prev_even[2 * j]),
                    SlotSource::WinnerOf(prev_even[2 * j + 1]),
                ]
            };
            let m = Match::new(take_id(next_id), Side::Losers, losers_round_no, j as u32, sources);
            ids.push(m.id);
            matches.push(m);
        }
        losers.push(Round {
            round: losers_round_no,
            matches,
        });
        losers_ids.push(ids);

        // Even round: odd-round winner vs the loser dropping from winners
        // round k+1.
        losers_round_no += 1;
        let odd_ids = losers_ids
            .last()
            .cloned()
            .ok_or_else(|| EngineError::Corrupt("missing losers round".to_string()))?;
        let mut matches = Vec::with_capacity(match_count);
        let mut ids = Vec::with_capacity(match_count);
        for j in 0..match_count {
            let sources = [
                SlotSource::WinnerOf(odd_ids[j]),
                SlotSource::LoserOf(winners_ids[k][j]),
            ];
            let m = Match::new(take_id(next_id), Side::Losers, losers_round_no, j as u32, sources);
            ids.push(m.id);
            matches.push(m);
        }
        losers.push(Round {
            round: losers_round_no,
            matches,
        });
        losers_ids.push(ids);
    }

    let winners_final = *winners_ids
        .last()
        .and_then(|round| round.first())
        .ok_or_else(|| EngineError::Corrupt("missing winners final".to_string()))?;

    // Two entrants have no losers bracket at all; the one loser goes
    // straight to the grand final.
    let losers_final_source = match losers_ids.last().and_then(|round| round.first()) {
        Some(id) => SlotSource::WinnerOf(*id),
        None => SlotSource::LoserOf(winners_final),
    };

    let gf1 = Match::new(
        take_id(next_id),
        Side::Grand,
        1,
        0,
        [SlotSource::WinnerOf(winners_final), losers_final_source],
    );
    // Reset game placeholder: populated only if the losers-bracket
    // representative takes grand final 1.
    let gf2 = Match::new(
        take_id(next_id),
        Side::Grand,
        1,
        1,
        [SlotSource::WinnerOf(gf1.id), SlotSource::LoserOf(gf1.id)],
    );

    Ok(Bracket {
        tournament_id: tournament_id.to_string(),
        kind: BracketKind::Double,
        winners,
        losers,
        grand: vec![gf1, gf2],
    })
}

/// Inverts the per-slot sources into winner/loser forward pointers. Every
/// match may feed at most one winner destination and one loser destination.
fn wire_forward_refs(bracket: &mut Bracket) -> Result<()> {
    let mut links: Vec<(MatchId, bool, SlotRef)> = Vec::new();
    for m in bracket.iter_matches() {
        for (slot_index, source) in m.sources.iter().enumerate() {
            let dest = SlotRef {
                side: m.side,
                round: m.round,
                index: m.index,
                slot: slot_index as u8 + 1,
            };
            match source {
                SlotSource::WinnerOf(src) => links.push((*src, true, dest)),
                SlotSource::LoserOf(src) => links.push((*src, false, dest)),
                SlotSource::Seed(_) => {}
            }
        }
    }

    for (src, is_winner, dest) in links {
        let m = bracket
            .find_mut(src)
            .ok_or_else(|| EngineError::Corrupt(format!("slot source references missing match {src}")))?;
        let pointer = if is_winner {
            &mut m.winner_to
        } else {
            &mut m.loser_to
        };
        if pointer.is_some() {
            return Err(EngineError::Corrupt(format!(
                "match {src} has more than one forward destination"
            )));
        }
        *pointer = Some(dest);
    }
    Ok(())
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
