use super::*;

use crate::types::BracketKind;

fn engine_with_bracket(tournament_id: &str) -> TournamentEngine {
    let engine = TournamentEngine::new();
    for team in ["A", "B"] {
        engine.register_team(tournament_id, team).unwrap();
        engine.approve_registration(tournament_id, team).unwrap();
    }
    engine.start(tournament_id, BracketKind::Single, "admin").unwrap();
    engine
}

#[tokio::test]
async fn failed_subscribe_leaves_no_subscriber_behind() {
    let engine = TournamentEngine::new();
    assert!(engine
        .subscribe_live("missing", Duration::from_millis(10))
        .is_err());
    assert_eq!(engine.broadcaster().subscriber_count("missing"), 0);
}

#[tokio::test]
async fn feed_starts_with_the_current_snapshot() {
    let engine = engine_with_bracket("t1");
    let mut feed = engine
        .subscribe_live("t1", Duration::from_millis(50))
        .unwrap();
    match feed.recv().await {
        Some(LiveUpdate::Snapshot { bracket }) => {
            assert_eq!(bracket, engine.get_bracket("t1").unwrap())
        }
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn dropping_the_feed_unsubscribes() {
    let engine = engine_with_bracket("t1");
    let feed = engine
        .subscribe_live("t1", Duration::from_millis(50))
        .unwrap();
    assert_eq!(engine.broadcaster().subscriber_count("t1"), 1);
    drop(feed);
    assert_eq!(engine.broadcaster().subscriber_count("t1"), 0);
}
