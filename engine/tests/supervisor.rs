//! Supervisor lifecycle against a scripted host.

use std::sync::Arc;
use std::time::Duration;

use engine::testing::{candidate, Behavior, ScriptedHost};
use engine::{
    CandidateSet, EngineCandidate, EngineLine, EngineStatus, EngineSupervisor, Listener,
    SupervisorOptions, UciCommand,
};

fn options() -> SupervisorOptions {
    SupervisorOptions {
        init_timeout: Duration::from_millis(2500),
    }
}

fn supervisor(host: &ScriptedHost, labels: &[&str]) -> EngineSupervisor {
    let candidates = labels.iter().map(|label| candidate(label)).collect();
    EngineSupervisor::spawn(Arc::new(host.clone()), candidates, options())
}

async fn wait_for_status(supervisor: &EngineSupervisor, expected: EngineStatus) {
    let mut status = supervisor.watch_status();
    status
        .wait_for(|s| *s == expected)
        .await
        .expect("supervisor stopped");
}

/// Skip handshake chatter that may still be in flight.
async fn next_info(listener: &mut Listener) -> EngineLine {
    loop {
        let line = listener.recv().await;
        if line.text.starts_with("info") {
            return line;
        }
    }
}

mod startup {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn nothing_starts_before_first_acquire() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(host.spawn_attempts().is_empty());
        assert_eq!(supervisor.status(), EngineStatus::Uninitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn first_healthy_candidate_becomes_ready() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a", "b"]);

        let link = supervisor.acquire().await.expect("engine available");

        assert_eq!(link.candidate, 0);
        assert_eq!(link.label, "a");
        assert_eq!(supervisor.status(), EngineStatus::Ready { candidate: 0 });
        assert_eq!(host.sent(0), vec!["uci", "isready"]);
        assert_eq!(host.spawned(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn threaded_candidate_is_told_its_thread_count() {
        let host = ScriptedHost::new();
        let threaded = EngineCandidate::threaded("sf", 4).with_label("mt");
        let supervisor = EngineSupervisor::spawn(Arc::new(host.clone()), vec![threaded], options());

        supervisor.acquire().await.expect("engine available");

        assert_eq!(
            host.sent(0),
            vec!["uci", "setoption name Threads value 4", "isready"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_share_one_process() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);

        let (first, second) = tokio::join!(supervisor.acquire(), supervisor.acquire());

        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(host.spawned().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn host_capabilities_gate_threaded_candidate() {
        let set = CandidateSet {
            portable: vec![candidate("lite")],
            threaded: Some(EngineCandidate::threaded("sf", 2).with_label("mt")),
        };

        let host = ScriptedHost::new()
            .with_behavior("lite", Behavior::LaunchFails)
            .with_shared_memory(false);
        let supervisor = EngineSupervisor::with_host(Arc::new(host.clone()), &set, options());
        assert!(supervisor.acquire().await.is_none());
        assert_eq!(host.spawn_attempts(), vec!["lite"]);

        let host = ScriptedHost::new()
            .with_behavior("lite", Behavior::LaunchFails)
            .with_shared_memory(true);
        let supervisor = EngineSupervisor::with_host(Arc::new(host.clone()), &set, options());
        let link = supervisor.acquire().await.expect("threaded build available");
        assert_eq!(link.label, "mt");
    }
}

mod fallback {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn launch_failure_advances_to_next_candidate() {
        let host = ScriptedHost::new().with_behavior("a", Behavior::LaunchFails);
        let supervisor = supervisor(&host, &["a", "b"]);

        let link = supervisor.acquire().await.expect("engine available");

        assert_eq!(link.label, "b");
        assert_eq!(host.spawn_attempts(), vec!["a", "b"]);
        assert_eq!(supervisor.status(), EngineStatus::Ready { candidate: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn silent_candidate_times_out_and_is_terminated() {
        let host = ScriptedHost::new().with_behavior("a", Behavior::Mute);
        let supervisor = supervisor(&host, &["a", "b"]);

        let started = tokio::time::Instant::now();
        let link = supervisor.acquire().await.expect("engine available");

        assert_eq!(link.label, "b");
        assert!(started.elapsed() >= Duration::from_millis(2500));
        assert_eq!(host.terminated_count(), 1);
        assert_eq!(host.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_error_moves_to_next_candidate() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a", "b"]);
        supervisor.acquire().await.expect("engine available");

        host.crash("segfault");
        wait_for_status(&supervisor, EngineStatus::Ready { candidate: 1 }).await;

        assert_eq!(host.spawned(), vec!["a", "b"]);
        assert_eq!(host.terminated_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_terminal_until_next_demand() {
        let host = ScriptedHost::new().with_default(Behavior::LaunchFails);
        let supervisor = supervisor(&host, &["a", "b"]);

        assert!(supervisor.acquire().await.is_none());
        assert_eq!(supervisor.status(), EngineStatus::Failed);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(host.spawn_attempts(), vec!["a", "b"]);

        host.set_behavior("b", Behavior::healthy());
        let link = supervisor.acquire().await.expect("second cycle succeeds");
        assert_eq!(link.label, "b");
        assert_eq!(host.spawn_attempts(), vec!["a", "b", "a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_host_is_permanent() {
        let host = ScriptedHost::new().with_default(Behavior::Unsupported);
        let supervisor = supervisor(&host, &["a", "b"]);

        assert!(supervisor.acquire().await.is_none());
        assert!(supervisor.acquire().await.is_none());

        assert_eq!(supervisor.status(), EngineStatus::Unsupported);
        assert_eq!(host.spawn_attempts(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn hard_reset_keeps_unsupported() {
        let host = ScriptedHost::new().with_default(Behavior::Unsupported);
        let supervisor = supervisor(&host, &["a", "b"]);
        assert!(supervisor.acquire().await.is_none());

        supervisor.hard_reset().await.unwrap();

        assert_eq!(supervisor.status(), EngineStatus::Unsupported);
        assert!(supervisor.acquire().await.is_none());
        assert_eq!(host.spawn_attempts(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_candidate_list_fails() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &[]);

        assert!(supervisor.acquire().await.is_none());
        assert_eq!(supervisor.status(), EngineStatus::Failed);
    }
}

mod reset {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn hard_reset_starts_over_from_first_candidate() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a", "b"]);
        supervisor.acquire().await.expect("engine available");
        host.crash("segfault");
        wait_for_status(&supervisor, EngineStatus::Ready { candidate: 1 }).await;

        supervisor.hard_reset().await.expect("supervisor running");

        assert_eq!(supervisor.status(), EngineStatus::Uninitialized);
        assert_eq!(host.live_count(), 0);

        let link = supervisor.acquire().await.expect("engine available");
        assert_eq!(link.label, "a");
        assert_eq!(link.generation, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_for_replaced_process_are_dropped() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a", "b"]);
        let stale = supervisor.acquire().await.expect("engine available");
        host.crash("segfault");
        wait_for_status(&supervisor, EngineStatus::Ready { candidate: 1 }).await;

        supervisor
            .send(&stale, &[UciCommand::Stop])
            .await
            .expect("supervisor running");
        let current = supervisor.acquire().await.expect("engine available");
        supervisor
            .send(&current, &[UciCommand::IsReady])
            .await
            .expect("supervisor running");
        // Commands are handled in order, so this round trip flushes the sends.
        supervisor.acquire().await;

        assert!(!host.sent(0).contains(&"stop".to_string()));
        assert_eq!(host.sent(1), vec!["uci", "isready", "isready"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_terminates_engine() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        supervisor.acquire().await.expect("engine available");

        supervisor.shutdown().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(host.live_count(), 0);
        assert!(supervisor.acquire().await.is_none());
    }
}

mod listeners {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn listener_count_tracks_subscriptions() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        assert_eq!(supervisor.listener_count(), 0);

        let first = supervisor.listen();
        let second = supervisor.listen();
        assert_eq!(supervisor.listener_count(), 2);

        drop(first);
        assert_eq!(supervisor.listener_count(), 1);
        drop(second);
        assert_eq!(supervisor.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_receives_lines_across_restarts() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a", "b"]);
        let mut listener = supervisor.listen();

        supervisor.acquire().await.expect("engine available");
        host.emit("info depth 1 score cp 10");
        let line = next_info(&mut listener).await;
        assert_eq!(&*line.text, "info depth 1 score cp 10");
        assert_eq!(line.generation, 1);

        host.crash("segfault");
        wait_for_status(&supervisor, EngineStatus::Ready { candidate: 1 }).await;

        host.emit("info depth 2 score cp 20");
        let line = next_info(&mut listener).await;
        assert_eq!(&*line.text, "info depth 2 score cp 20");
        assert_eq!(line.generation, 2);
        assert_eq!(listener.generation(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn every_listener_sees_every_line() {
        let host = ScriptedHost::new();
        let supervisor = supervisor(&host, &["a"]);
        let mut first = supervisor.listen();
        let mut second = supervisor.listen();
        supervisor.acquire().await.expect("engine available");

        // Subscribe both to the live process before it prints.
        let _ = tokio::time::timeout(Duration::from_millis(1), first.recv()).await;
        let _ = tokio::time::timeout(Duration::from_millis(1), second.recv()).await;
        host.emit("info depth 7 score cp -15");

        assert_eq!(&*next_info(&mut first).await.text, "info depth 7 score cp -15");
        assert_eq!(&*next_info(&mut second).await.text, "info depth 7 score cp -15");
    }
}
