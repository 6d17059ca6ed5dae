//! Evaluation sessions sharing a scripted engine.

use std::sync::Arc;
use std::time::Duration;

use chess::Evaluation;
use engine::testing::{candidate, Behavior, ScriptedHost};
use engine::{EvalSession, EvalSnapshot, EngineSupervisor, SessionError, SessionOptions, SupervisorOptions};

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

fn options() -> SessionOptions {
    SessionOptions {
        depth: None,
        movetime: Duration::from_millis(250),
        safety_timeout: Duration::from_millis(2600),
    }
}

fn supervisor(host: &ScriptedHost, labels: &[&str]) -> EngineSupervisor {
    EngineSupervisor::spawn(
        Arc::new(host.clone()),
        labels.iter().map(|label| candidate(label)).collect(),
        SupervisorOptions {
            init_timeout: Duration::from_millis(2500),
        },
    )
}

async fn observed(session: &EvalSession, revision: u64) -> EvalSnapshot {
    let mut rx = session.subscribe();
    let snapshot = rx
        .wait_for(|s| s.revision >= revision)
        .await
        .expect("session running")
        .clone();
    snapshot
}

fn go_count(host: &ScriptedHost) -> usize {
    host.sent_to_latest()
        .iter()
        .filter(|line| line.starts_with("go"))
        .count()
}

mod evaluation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn mount_does_not_start_engine() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(host.spawn_attempts().is_empty());
        assert_eq!(supervisor.listener_count(), 1);
        assert_eq!(session.snapshot(), EvalSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn white_to_move_score_is_reported_as_is() {
        let host = ScriptedHost::new().with_default(Behavior::answering([
            "info depth 9 score cp 20",
            "info depth 12 score cp 35 nodes 1000 pv e2e4",
        ]));
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        let snapshot = session.settled(1).await;

        assert_eq!(snapshot.evaluation, Some(Evaluation::Centipawns(35)));
        assert_eq!(snapshot.depth, Some(12));
        assert!(!snapshot.thinking);
        assert!(snapshot.available);

        let sent = host.sent_to_latest();
        assert_eq!(
            sent[sent.len() - 3..],
            [
                "stop".to_string(),
                format!("position fen {}", START),
                "go movetime 250".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn black_to_move_score_is_flipped() {
        let host = ScriptedHost::new().with_default(Behavior::answering(["info depth 10 score cp 50"]));
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(AFTER_E4), 0).await.unwrap();
        let snapshot = session.settled(1).await;

        assert_eq!(snapshot.evaluation, Some(Evaluation::Centipawns(-50)));
    }

    #[tokio::test(start_paused = true)]
    async fn mate_for_black_to_move_favours_black() {
        let host = ScriptedHost::new().with_default(Behavior::answering(["info depth 5 score mate 2"]));
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(AFTER_E4), 0).await.unwrap();
        let snapshot = session.settled(1).await;

        assert_eq!(snapshot.evaluation, Some(Evaluation::Mate(-2)));
        assert_eq!(snapshot.evaluation.map(|e| e.fraction()), Some(0.01));
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_position_clears_evaluation() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        assert!(session.settled(1).await.evaluation.is_some());

        session.observe(None, 0).await.unwrap();
        let snapshot = session.settled(2).await;

        assert_eq!(snapshot.evaluation, None);
        assert!(!snapshot.thinking);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_position_is_not_submitted() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some("not a position"), 0).await.unwrap();
        let snapshot = session.settled(1).await;

        assert_eq!(snapshot.evaluation, None);
        assert!(!snapshot.thinking);
        assert!(host.spawn_attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_engine_reports_no_evaluation() {
        let host = ScriptedHost::new().with_default(Behavior::LaunchFails);
        let supervisor = supervisor(&host, &["a", "b"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        let snapshot = session.settled(1).await;

        assert_eq!(snapshot.evaluation, None);
        assert!(!snapshot.thinking);
        assert!(!snapshot.available);
    }

    #[tokio::test(start_paused = true)]
    async fn info_without_position_is_ignored() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());
        supervisor.acquire().await.expect("engine available");

        host.emit("info depth 3 score cp 80");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(session.snapshot().evaluation, None);
    }
}

mod requests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeated_observation_is_a_noop() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        session.observe(Some(START), 0).await.unwrap();
        session.settled(2).await;

        assert_eq!(go_count(&host), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_position_resubmits() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        session.observe(Some(AFTER_E4), 0).await.unwrap();
        session.settled(2).await;

        assert_eq!(go_count(&host), 2);
        assert_eq!(host.spawned().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_token_change_restarts_engine() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        session.settled(1).await;
        session.observe(Some(START), 1).await.unwrap();
        let snapshot = session.settled(2).await;

        assert_eq!(host.spawned().len(), 2);
        assert_eq!(host.terminated_count(), 1);
        assert!(snapshot.evaluation.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn first_refresh_token_does_not_reset() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 7).await.unwrap();
        session.settled(1).await;

        assert_eq!(host.spawned().len(), 1);
        assert_eq!(host.terminated_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn safety_timeout_clears_thinking() {
        let host = ScriptedHost::new().with_default(Behavior::silent_search());
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        assert!(observed(&session, 1).await.thinking);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(session.snapshot().thinking);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!session.snapshot().thinking);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_request_supersedes_safety_timer() {
        let host = ScriptedHost::new().with_default(Behavior::silent_search());
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        observed(&session, 1).await;
        tokio::time::sleep(Duration::from_millis(2000)).await;

        session.observe(Some(AFTER_E4), 0).await.unwrap();
        observed(&session, 2).await;

        // Past the first request's deadline, before the second's.
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(session.snapshot().thinking);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!session.snapshot().thinking);
    }

    #[tokio::test(start_paused = true)]
    async fn any_bestmove_ends_thinking() {
        let host = ScriptedHost::new().with_default(Behavior::silent_search());
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        observed(&session, 1).await;
        host.emit("bestmove d2d4");

        let mut rx = session.subscribe();
        let snapshot = rx.wait_for(|s| !s.thinking).await.expect("session running").clone();
        assert!(snapshot.revision >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mated_position_drops_previous_evaluation() {
        let host = ScriptedHost::new().with_default(Behavior::silent_search());
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        observed(&session, 1).await;
        host.emit("info depth 12 score cp 300");
        host.emit("bestmove e2e4");
        assert_eq!(
            session.settled(1).await.evaluation,
            Some(Evaluation::Centipawns(300))
        );

        session.observe(Some(FOOLS_MATE), 0).await.unwrap();
        assert_eq!(observed(&session, 2).await.evaluation, None);
        host.emit("info depth 0 score mate 0");
        host.emit("bestmove (none)");
        let snapshot = session.settled(2).await;

        assert_eq!(snapshot.evaluation, None);
        assert!(!snapshot.thinking);
        assert!(snapshot.available);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_crash_mid_search_recovers_on_next_position() {
        let host = ScriptedHost::new().with_behavior("a", Behavior::CrashOnGo);
        let supervisor = supervisor(&host, &["a", "b"]);
        let session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        let snapshot = session.settled(1).await;
        assert_eq!(snapshot.evaluation, None);

        session.observe(Some(AFTER_E4), 0).await.unwrap();
        let snapshot = session.settled(2).await;

        assert_eq!(host.spawned(), vec!["a", "b"]);
        assert_eq!(snapshot.evaluation, Some(Evaluation::Centipawns(-35)));
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unmount_is_idempotent_and_spares_other_sessions() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let mut first = EvalSession::mount(&supervisor, options());
        let second = EvalSession::mount(&supervisor, options());
        assert_ne!(first.id(), second.id());

        first.observe(Some(START), 0).await.unwrap();
        first.settled(1).await;
        assert_eq!(supervisor.listener_count(), 2);

        first.unmount().await;
        first.unmount().await;

        assert!(!first.is_mounted());
        assert_eq!(supervisor.listener_count(), 1);
        assert!(matches!(
            first.observe(Some(START), 0).await,
            Err(SessionError::Unmounted)
        ));
        assert_eq!(host.terminated_count(), 0);

        second.observe(Some(AFTER_E4), 0).await.unwrap();
        let snapshot = second.settled(1).await;
        assert_eq!(snapshot.evaluation, Some(Evaluation::Centipawns(-35)));
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_does_not_wait_for_engine_startup() {
        let host = ScriptedHost::new().with_default(Behavior::Mute);
        let supervisor = supervisor(&host, &["a", "b"]);
        let mut session = EvalSession::mount(&supervisor, options());

        session.observe(Some(START), 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(host.spawn_attempts(), vec!["a"]);

        tokio::time::timeout(Duration::from_millis(100), session.unmount())
            .await
            .expect("unmount returned while the engine was starting");

        assert!(!session.is_mounted());
        assert_eq!(supervisor.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_session_unsubscribes() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let session = EvalSession::mount(&supervisor, options());
        assert_eq!(supervisor.listener_count(), 1);

        drop(session);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(supervisor.listener_count(), 0);
    }
}
