use super::*;

use crate::builder::build_bracket;

fn named(names: &[&str]) -> Vec<TeamId> {
    names.iter().map(|s| s.to_string()).collect()
}

fn single_four() -> Bracket {
    build_bracket("t", &named(&["A", "B", "C", "D"]), BracketKind::Single).unwrap()
}

fn double_four() -> Bracket {
    build_bracket("t", &named(&["A", "B", "C", "D"]), BracketKind::Double).unwrap()
}

#[test]
fn report_decides_winner_and_propagates() {
    let mut b = single_four();
    let m1 = b.winners[0].matches[0].id;
    let updated = report(&mut b, m1, 3, 1, None).unwrap();
    assert_eq!(updated.status, MatchStatus::Completed);
    assert_eq!(updated.winner_id.as_deref(), Some("A"));
    assert_eq!(updated.loser_id.as_deref(), Some("B"));
    assert_eq!(b.winners[1].matches[0].team1_id.as_deref(), Some("A"));
    b.check_invariants().unwrap();
}

#[test]
fn tie_without_override_is_ambiguous() {
    let mut b = single_four();
    let m1 = b.winners[0].matches[0].id;
    assert!(matches!(
        report(&mut b, m1, 2, 2, None),
        Err(EngineError::AmbiguousResult(_))
    ));
    // Nothing was recorded.
    assert_eq!(b.find(m1).unwrap().status, MatchStatus::Pending);
}

#[test]
fn override_settles_a_tie() {
    let mut b = single_four();
    let m1 = b.winners[0].matches[0].id;
    let winner = "B".to_string();
    let updated = report(&mut b, m1, 2, 2, Some(&winner)).unwrap();
    assert_eq!(updated.winner_id.as_deref(), Some("B"));
    assert_eq!(b.winners[1].matches[0].team1_id.as_deref(), Some("B"));
}

#[test]
fn override_must_name_a_participant() {
    let mut b = single_four();
    let m1 = b.winners[0].matches[0].id;
    let outsider = "Z".to_string();
    assert!(matches!(
        report(&mut b, m1, 3, 1, Some(&outsider)),
        Err(EngineError::InvalidWinnerOverride { .. })
    ));
}

#[test]
fn rejects_matches_with_open_slots() {
    let mut b = single_four();
    let finals = b.winners[1].matches[0].id;
    assert!(matches!(
        report(&mut b, finals, 1, 0, None),
        Err(EngineError::IncompleteSlots(_))
    ));
}

#[test]
fn rejects_double_reporting() {
    let mut b = single_four();
    let m1 = b.winners[0].matches[0].id;
    report(&mut b, m1, 3, 1, None).unwrap();
    assert!(matches!(
        report(&mut b, m1, 0, 3, None),
        Err(EngineError::MatchAlreadyCompleted(_))
    ));
}

#[test]
fn rejects_unknown_match() {
    let mut b = single_four();
    assert!(matches!(
        report(&mut b, 999, 1, 0, None),
        Err(EngineError::MatchNotFound(999))
    ));
}

#[test]
fn winners_side_losers_drop_to_losers_bracket() {
    let mut b = double_four();
    let m1 = b.winners[0].matches[0].id;
    let m2 = b.winners[0].matches[1].id;
    report(&mut b, m1, 3, 1, None).unwrap();
    report(&mut b, m2, 3, 1, None).unwrap();
    let l1 = &b.losers[0].matches[0];
    assert_eq!(l1.team1_id.as_deref(), Some("B"));
    assert_eq!(l1.team2_id.as_deref(), Some("D"));
    b.check_invariants().unwrap();
}

#[test]
fn dropped_loser_advances_past_exhausted_bye() {
    let mut b = build_bracket("t", &named(&["A", "B", "C"]), BracketKind::Double).unwrap();
    let m1 = b.winners[0].matches[0].id;
    report(&mut b, m1, 2, 0, None).unwrap();

    let l1 = &b.losers[0].matches[0];
    assert!(l1.is_auto_resolved());
    assert_eq!(l1.winner_id.as_deref(), Some("B"));
    assert_eq!(b.losers[1].matches[0].team1_id.as_deref(), Some("B"));
    b.check_invariants().unwrap();
}

// Plays a four-entrant double bracket up to a filled grand final:
// A and C win round one, C falls to A in the winners final, B beats D,
// then C eliminates B. Grand final: A vs C.
fn double_four_at_grand_final() -> Bracket {
    let mut b = double_four();
    let ids: Vec<MatchId> = b.iter_matches().map(|m| m.id).collect();
    report(&mut b, ids[0], 3, 1, None).unwrap();
    report(&mut b, ids[1], 3, 1, None).unwrap();
    report(&mut b, ids[2], 3, 0, None).unwrap();
    report(&mut b, ids[3], 10, 8, None).unwrap();
    report(&mut b, ids[4], 1, 2, None).unwrap();
    b
}

#[test]
fn losers_champion_winning_game_one_activates_reset_game() {
    let mut b = double_four_at_grand_final();
    let gf1 = b.grand[0].id;
    assert_eq!(b.grand[0].team1_id.as_deref(), Some("A"));
    assert_eq!(b.grand[0].team2_id.as_deref(), Some("C"));

    report(&mut b, gf1, 1, 2, None).unwrap();
    let gf2 = &b.grand[1];
    assert_eq!(gf2.team1_id.as_deref(), Some("C"));
    assert_eq!(gf2.team2_id.as_deref(), Some("A"));
    assert_eq!(gf2.status, MatchStatus::Pending);
    assert_eq!(b.decider().map(|m| m.id), Some(gf2.id));
    b.check_invariants().unwrap();
}

#[test]
fn winners_champion_winning_game_one_ends_the_bracket() {
    let mut b = double_four_at_grand_final();
    let gf1 = b.grand[0].id;
    report(&mut b, gf1, 3, 1, None).unwrap();

    let gf2 = &b.grand[1];
    assert!(gf2.team1_id.is_none() && gf2.team2_id.is_none());
    assert_eq!(gf2.status, MatchStatus::Pending);
    let decider = b.decider().unwrap();
    assert_eq!(decider.id, gf1);
    assert_eq!(decider.winner_id.as_deref(), Some("A"));
    b.check_invariants().unwrap();
}
