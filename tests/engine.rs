use std::str::FromStr;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use bracket_engine::{
    BracketKind, EngineError, LiveUpdate, MatchStatus, TournamentEngine, TournamentStatus,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_with_approved(tournament_id: &str, teams: &[&str]) -> TournamentEngine {
    let engine = TournamentEngine::new();
    for &team in teams {
        engine.register_team(tournament_id, team).unwrap();
        engine.approve_registration(tournament_id, team).unwrap();
    }
    engine
}

#[test]
fn bracket_kind_parses_leniently() {
    assert_eq!(BracketKind::from_str(" Double ").unwrap(), BracketKind::Double);
    assert_eq!(BracketKind::from_str("single").unwrap(), BracketKind::Single);
    assert!(matches!(
        BracketKind::from_str("round-robin"),
        Err(EngineError::InvalidKind(_))
    ));
}

#[test]
fn single_elimination_lifecycle() {
    init_logging();
    let engine = engine_with_approved("t1", &["A", "B", "C", "D"]);
    assert_eq!(
        engine.tournament_status("t1").unwrap(),
        TournamentStatus::Upcoming
    );

    let bracket = engine.start("t1", BracketKind::Single, "admin").unwrap();
    assert_eq!(bracket.match_count(), 3);
    assert_eq!(
        engine.tournament_status("t1").unwrap(),
        TournamentStatus::Ongoing
    );

    // Registration closes once the bracket exists.
    assert!(matches!(
        engine.register_team("t1", "E"),
        Err(EngineError::RegistrationClosed(_))
    ));
    assert!(matches!(
        engine.approve_registration("t1", "A"),
        Err(EngineError::RegistrationClosed(_))
    ));

    // Starting again returns the same bracket.
    let again = engine.start("t1", BracketKind::Single, "admin").unwrap();
    assert_eq!(again, bracket);

    assert!(matches!(
        engine.finalize("t1", "admin"),
        Err(EngineError::TournamentNotReady(_))
    ));

    let m1 = bracket.winners[0].matches[0].id;
    let m2 = bracket.winners[0].matches[1].id;
    engine.report("t1", m1, 3, 1, None, "admin").unwrap();
    engine.report("t1", m2, 0, 2, None, "admin").unwrap();

    let finals = engine.get_bracket("t1").unwrap().winners[1].matches[0].clone();
    assert_eq!(finals.team1_id.as_deref(), Some("A"));
    assert_eq!(finals.team2_id.as_deref(), Some("D"));
    engine.report("t1", finals.id, 3, 2, None, "admin").unwrap();

    let payout = engine.finalize("t1", "admin").unwrap();
    assert_eq!(payout.champion_id, "A");
    assert_eq!(payout.runner_up_id, "D");
    assert_eq!(
        engine.tournament_status("t1").unwrap(),
        TournamentStatus::Completed
    );

    // Finalizing again returns the cached payout.
    let cached = engine.finalize("t1", "admin").unwrap();
    assert_eq!(cached, payout);
}

#[test]
fn only_approved_registrations_are_seeded() {
    let engine = TournamentEngine::new();
    for team in ["A", "B", "C"] {
        engine.register_team("t2", team).unwrap();
    }
    engine.approve_registration("t2", "A").unwrap();
    engine.approve_registration("t2", "B").unwrap();
    engine.decline_registration("t2", "C").unwrap();

    let bracket = engine.start("t2", BracketKind::Single, "admin").unwrap();
    assert_eq!(bracket.match_count(), 1);
    let m = &bracket.winners[0].matches[0];
    assert_eq!(m.team1_id.as_deref(), Some("A"));
    assert_eq!(m.team2_id.as_deref(), Some("B"));
}

#[test]
fn registration_errors() {
    let engine = TournamentEngine::new();
    engine.register_team("t3", "A").unwrap();
    assert!(matches!(
        engine.register_team("t3", "A"),
        Err(EngineError::AlreadyRegistered { .. })
    ));
    assert!(matches!(
        engine.approve_registration("t3", "B"),
        Err(EngineError::RegistrationNotFound { .. })
    ));
    assert!(matches!(
        engine.start("missing", BracketKind::Single, "admin"),
        Err(EngineError::TournamentNotFound(_))
    ));

    // One approved team is not enough for a bracket.
    engine.approve_registration("t3", "A").unwrap();
    assert!(matches!(
        engine.start("t3", BracketKind::Single, "admin"),
        Err(EngineError::InvalidEntrantCount(1))
    ));
}

#[test]
fn double_elimination_with_bracket_reset() {
    init_logging();
    let engine = engine_with_approved("t4", &["A", "B", "C", "D"]);
    let bracket = engine.start("t4", BracketKind::Double, "admin").unwrap();

    let w1a = bracket.winners[0].matches[0].id;
    let w1b = bracket.winners[0].matches[1].id;
    let wf = bracket.winners[1].matches[0].id;
    let l1 = bracket.losers[0].matches[0].id;
    let l2 = bracket.losers[1].matches[0].id;
    let gf1 = bracket.grand[0].id;
    let gf2 = bracket.grand[1].id;

    engine.report("t4", w1a, 3, 1, None, "admin").unwrap(); // A over B
    engine.report("t4", w1b, 3, 1, None, "admin").unwrap(); // C over D
    engine.report("t4", wf, 3, 0, None, "admin").unwrap(); // A over C
    engine.report("t4", l1, 10, 8, None, "admin").unwrap(); // B over D

    let snapshot = engine.get_bracket("t4").unwrap();
    assert_eq!(snapshot.losers[1].matches[0].team1_id.as_deref(), Some("B"));
    assert_eq!(snapshot.losers[1].matches[0].team2_id.as_deref(), Some("C"));

    engine.report("t4", l2, 1, 2, None, "admin").unwrap(); // C eliminates B
    let snapshot = engine.get_bracket("t4").unwrap();
    assert_eq!(snapshot.grand[0].team1_id.as_deref(), Some("A"));
    assert_eq!(snapshot.grand[0].team2_id.as_deref(), Some("C"));

    // The losers champion taking game one forces the reset game.
    engine.report("t4", gf1, 2, 3, None, "admin").unwrap();
    let snapshot = engine.get_bracket("t4").unwrap();
    assert_eq!(snapshot.grand[1].team1_id.as_deref(), Some("C"));
    assert_eq!(snapshot.grand[1].team2_id.as_deref(), Some("A"));
    assert!(matches!(
        engine.finalize("t4", "admin"),
        Err(EngineError::TournamentNotReady(_))
    ));

    engine.report("t4", gf2, 1, 3, None, "admin").unwrap(); // A takes the reset game
    let payout = engine.finalize("t4", "admin").unwrap();
    assert_eq!(payout.champion_id, "A");
    assert_eq!(payout.runner_up_id, "C");
}

#[test]
fn corrections_flow_through_the_engine() {
    let engine = engine_with_approved("t5", &["A", "B", "C", "D"]);
    let bracket = engine.start("t5", BracketKind::Single, "admin").unwrap();
    let m1 = bracket.winners[0].matches[0].id;

    engine.report("t5", m1, 3, 1, None, "admin").unwrap();

    // Reporting a completed match with an override rolls it back first.
    let updated = engine
        .report("t5", m1, 2, 3, Some("B".to_string()), "admin")
        .unwrap();
    assert_eq!(updated.winner_id.as_deref(), Some("B"));
    let finals = engine.get_bracket("t5").unwrap().winners[1].matches[0].clone();
    assert_eq!(finals.team1_id.as_deref(), Some("B"));

    // Plain re-reporting without an override stays rejected.
    assert!(matches!(
        engine.report("t5", m1, 3, 1, None, "admin"),
        Err(EngineError::MatchAlreadyCompleted(_))
    ));

    let edited = engine.edit_score("t5", m1, 0, 5, "admin").unwrap();
    assert_eq!(edited.winner_id.as_deref(), Some("B"));
    assert_eq!(edited.score2, Some(5));

    let overridden = engine
        .override_winner("t5", m1, "A".to_string(), None, None, "admin")
        .unwrap();
    assert_eq!(overridden.winner_id.as_deref(), Some("A"));

    let reverted = engine.reset_match("t5", m1, "admin").unwrap();
    assert_eq!(reverted.status, MatchStatus::Pending);
    assert!(engine.get_bracket("t5").unwrap().winners[1].matches[0]
        .team1_id
        .is_none());
}

#[test]
fn subscribers_may_reenter_the_engine_during_start() {
    let engine = Arc::new(engine_with_approved("t7", &["A", "B"]));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let engine = Arc::clone(&engine);
        let observed = Arc::clone(&observed);
        engine.clone().subscribe("t7", move |_| {
            observed
                .lock()
                .unwrap()
                .push(engine.tournament_status("t7").unwrap());
        })
    };

    // Run start on a worker so a delivery deadlock fails the test instead
    // of hanging it.
    let (done, outcome) = mpsc::channel();
    let worker = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            done.send(engine.start("t7", BracketKind::Single, "admin")).unwrap();
        })
    };
    let bracket = outcome
        .recv_timeout(Duration::from_secs(5))
        .expect("start blocked on its own subscriber")
        .unwrap();
    worker.join().unwrap();

    assert_eq!(bracket.match_count(), 1);
    assert!(!observed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn live_feed_streams_snapshots_and_keepalives() {
    init_logging();
    let engine = engine_with_approved("t6", &["A", "B"]);

    assert!(matches!(
        engine.subscribe_live("missing", Duration::from_millis(20)),
        Err(EngineError::BracketNotFound(_))
    ));

    let bracket = engine.start("t6", BracketKind::Single, "admin").unwrap();
    let mut feed = engine
        .subscribe_live("t6", Duration::from_millis(20))
        .unwrap();

    match feed.recv().await {
        Some(LiveUpdate::Snapshot { bracket: snapshot }) => assert_eq!(snapshot, bracket),
        other => panic!("expected the initial snapshot, got {other:?}"),
    }

    let m = bracket.winners[0].matches[0].id;
    engine.report("t6", m, 2, 0, None, "admin").unwrap();
    let snapshot = loop {
        match tokio::time::timeout(Duration::from_secs(2), feed.recv()).await {
            Ok(Some(LiveUpdate::Snapshot { bracket })) => break bracket,
            Ok(Some(LiveUpdate::KeepAlive)) => continue,
            other => panic!("expected a snapshot after the report, got {other:?}"),
        }
    };
    assert_eq!(
        snapshot.winners[0].matches[0].status,
        MatchStatus::Completed
    );

    let keepalive = tokio::time::timeout(Duration::from_secs(2), feed.recv()).await;
    assert!(matches!(keepalive, Ok(Some(LiveUpdate::KeepAlive))));

    drop(feed);
    // Publishing to a dropped feed must not fail the engine.
    engine.reset_match("t6", m, "admin").unwrap();
}
