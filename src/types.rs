use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ── Identifiers ────────────────────────────────────────────────────────

/// Opaque team identifier. The engine owns no team attributes.
pub type TeamId = String;

/// Match identifier, unique within one tournament's bracket.
pub type MatchId = u64;

// ── Bracket enums ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Winners,
    Losers,
    Grand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BracketKind {
    Single,
    Double,
}

impl std::str::FromStr for BracketKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(BracketKind::Single),
            "double" => Ok(BracketKind::Double),
            other => Err(EngineError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Completed,
}

// ── Match graph wiring ─────────────────────────────────────────────────

/// Where a team slot gets its occupant from. Fixed at build time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotSource {
    /// Initial seeding; `None` is a bye slot that never produces a team.
    Seed(Option<TeamId>),
    WinnerOf(MatchId),
    LoserOf(MatchId),
}

/// Precomputed forward destination: which match slot a winner or loser
/// lands in. Stored as a positional tuple rather than a live reference so
/// brackets stay serializable and rollback can traverse via store lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRef {
    pub side: Side,
    /// 1-indexed round within the side.
    pub round: u32,
    /// 0-indexed match position within the round.
    pub index: u32,
    /// 1 or 2.
    pub slot: u8,
}

// ── Match / Round / Bracket ────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub side: Side,
    pub round: u32,
    pub index: u32,
    pub team1_id: Option<TeamId>,
    pub team2_id: Option<TeamId>,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
    pub winner_id: Option<TeamId>,
    pub loser_id: Option<TeamId>,
    pub status: MatchStatus,
    pub sources: [SlotSource; 2],
    pub winner_to: Option<SlotRef>,
    pub loser_to: Option<SlotRef>,
}

impl Match {
    pub(crate) fn new(
        id: MatchId,
        side: Side,
        round: u32,
        index: u32,
        sources: [SlotSource; 2],
    ) -> Self {
        let seed_team = |source: &SlotSource| match source {
            SlotSource::Seed(team) => team.clone(),
            _ => None,
        };
        Match {
            id,
            side,
            round,
            index,
            team1_id: seed_team(&sources[0]),
            team2_id: seed_team(&sources[1]),
            score1: None,
            score2: None,
            winner_id: None,
            loser_id: None,
            status: MatchStatus::Pending,
            sources,
            winner_to: None,
            loser_to: None,
        }
    }

    /// True for matches resolved during bye settlement: completed with a
    /// winner (or voided) but no reported scores.
    pub fn is_auto_resolved(&self) -> bool {
        self.status == MatchStatus::Completed && self.score1.is_none() && self.score2.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round: u32,
    pub matches: Vec<Match>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub tournament_id: String,
    pub kind: BracketKind,
    pub winners: Vec<Round>,
    /// Empty for single elimination.
    pub losers: Vec<Round>,
    /// Two matches for double elimination (final + reset game), empty for
    /// single elimination where the last winners round is the final.
    pub grand: Vec<Match>,
}

impl Bracket {
    pub fn iter_matches(&self) -> impl Iterator<Item = &Match> {
        self.winners
            .iter()
            .chain(self.losers.iter())
            .flat_map(|round| round.matches.iter())
            .chain(self.grand.iter())
    }

    pub fn find(&self, id: MatchId) -> Option<&Match> {
        self.iter_matches().find(|m| m.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.winners
            .iter_mut()
            .chain(self.losers.iter_mut())
            .flat_map(|round| round.matches.iter_mut())
            .chain(self.grand.iter_mut())
            .find(|m| m.id == id)
    }

    pub fn by_ref(&self, slot: SlotRef) -> Option<&Match> {
        match slot.side {
            Side::Grand => self.grand.get(slot.index as usize),
            Side::Winners | Side::Losers => {
                let rounds = if slot.side == Side::Winners {
                    &self.winners
                } else {
                    &self.losers
                };
                rounds
                    .get(slot.round.checked_sub(1)? as usize)?
                    .matches
                    .get(slot.index as usize)
            }
        }
    }

    pub(crate) fn by_ref_mut(&mut self, slot: SlotRef) -> Option<&mut Match> {
        match slot.side {
            Side::Grand => self.grand.get_mut(slot.index as usize),
            Side::Winners | Side::Losers => {
                let rounds = if slot.side == Side::Winners {
                    &mut self.winners
                } else {
                    &mut self.losers
                };
                rounds
                    .get_mut(slot.round.checked_sub(1)? as usize)?
                    .matches
                    .get_mut(slot.index as usize)
            }
        }
    }

    pub fn match_count(&self) -> usize {
        self.iter_matches().count()
    }

    /// The match whose completion decides the tournament. For double
    /// elimination this is the reset game whenever the losers-bracket
    /// representative took grand final 1, otherwise grand final 1 itself.
    pub fn decider(&self) -> Option<&Match> {
        match self.kind {
            BracketKind::Single => self.winners.last()?.matches.first(),
            BracketKind::Double => {
                let gf1 = self.grand.first()?;
                if gf1.status == MatchStatus::Completed
                    && gf1.winner_id.is_some()
                    && gf1.winner_id == gf1.team2_id
                {
                    self.grand.get(1)
                } else {
                    Some(gf1)
                }
            }
        }
    }

    /// Debug/consistency pass: every filled slot must be traceable to its
    /// declared source and completed reported matches must carry a winner.
    pub fn check_invariants(&self) -> Result<()> {
        for m in self.iter_matches() {
            let slots = [(1u8, &m.team1_id, &m.sources[0]), (2u8, &m.team2_id, &m.sources[1])];
            for (slot_no, team, source) in slots {
                let Some(team) = team else { continue };
                let ok = match source {
                    SlotSource::Seed(seeded) => seeded.as_ref() == Some(team),
                    SlotSource::WinnerOf(src) => self
                        .find(*src)
                        .is_some_and(|s| s.winner_id.as_ref() == Some(team)),
                    SlotSource::LoserOf(src) => self
                        .find(*src)
                        .is_some_and(|s| s.loser_id.as_ref() == Some(team)),
                };
                if !ok {
                    return Err(EngineError::Corrupt(format!(
                        "match {} slot {slot_no} holds {team} without a matching source result",
                        m.id
                    )));
                }
            }
            match m.status {
                MatchStatus::Pending => {
                    if m.winner_id.is_some() || m.score1.is_some() || m.score2.is_some() {
                        return Err(EngineError::Corrupt(format!(
                            "pending match {} carries result fields",
                            m.id
                        )));
                    }
                }
                MatchStatus::Completed => {
                    if m.score1.is_some() && m.winner_id.is_none() {
                        return Err(EngineError::Corrupt(format!(
                            "completed match {} has scores but no winner",
                            m.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Registration / tournament state ────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub tournament_id: String,
    pub team_id: TeamId,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    Upcoming,
    Ongoing,
    Completed,
}

/// Payout eligibility derived from final bracket state. The actual prize
/// formula lives with the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub champion_id: TeamId,
    pub runner_up_id: TeamId,
    pub computed_at: DateTime<Utc>,
}
