// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::alerts::AlertBusConfig;
use pg_adapters::{FakeOsAdapter, FakeSink, SignalKind, SpawnError};
use pg_core::{AlertKind, CrashAction, CrashPolicy, FakeClock};

struct Harness {
    supervisor: Supervisor<FakeOsAdapter, FakeClock>,
    os: FakeOsAdapter,
    clock: FakeClock,
    sink: FakeSink,
    _logs_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let os = FakeOsAdapter::new();
    let clock = FakeClock::new();
    let sink = FakeSink::new();
    let alerts = Arc::new(AlertBus::new(
        clock.clone(),
        AlertBusConfig::default(),
        vec![Arc::new(sink.clone())],
    ));
    let logs_dir = tempfile::tempdir().unwrap();
    let logs = Arc::new(LogManager::new(logs_dir.path(), 10 * 1024 * 1024, 5).unwrap());
    let supervisor = Supervisor::new(
        os.clone(),
        clock.clone(),
        alerts,
        logs,
        SupervisorConfig::default(),
    );
    Harness {
        supervisor,
        os,
        clock,
        sink,
        _logs_dir: logs_dir,
    }
}

fn basic(name: &str) -> ProcessConfig {
    let mut cfg = ProcessConfig::new(name, format!("run-{name}"));
    cfg.restart_delay_seconds = 0.0;
    cfg
}

async fn wait_for_state(
    supervisor: &Supervisor<FakeOsAdapter, FakeClock>,
    name: &str,
    state: ProcessState,
) {
    for _ in 0..400 {
        if supervisor.status(name).unwrap().state == state {
            return;
        }
        // 50ms polls stretch far past the 1s grace and 10s kill windows
        // under paused time
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "timed out waiting for {name} to reach {state}; currently {}",
        supervisor.status(name).unwrap().state
    );
}

async fn start_and_run(h: &Harness, name: &str) -> u32 {
    h.supervisor
        .start(name, StartOptions::default())
        .await
        .unwrap();
    wait_for_state(&h.supervisor, name, ProcessState::Running).await;
    h.supervisor.status(name).unwrap().pid.unwrap()
}

fn alerts_of_kind(h: &Harness, kind: AlertKind) -> Vec<pg_core::Alert> {
    h.supervisor
        .alerts()
        .list(false)
        .into_iter()
        .filter(|a| a.kind == kind)
        .collect()
}

// --- registration -----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn register_rejects_duplicates_and_unknown_dependencies() {
    let h = harness();
    h.supervisor.register(basic("db")).unwrap();
    assert!(matches!(
        h.supervisor.register(basic("db")),
        Err(SupervisorError::Config(ConfigError::DuplicateName(_)))
    ));

    let mut api = basic("api");
    api.depends_on = vec!["ghost".to_string()];
    assert!(matches!(
        h.supervisor.register(api),
        Err(SupervisorError::Config(ConfigError::UnknownDependency { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn deregister_refuses_while_depended_upon() {
    let h = harness();
    h.supervisor.register(basic("db")).unwrap();
    let mut api = basic("api");
    api.depends_on = vec!["db".to_string()];
    h.supervisor.register(api).unwrap();

    assert!(h.supervisor.deregister("db").is_err());
    h.supervisor.deregister("api").unwrap();
    h.supervisor.deregister("db").unwrap();
    assert!(h.supervisor.list().is_empty());
}

// --- lifecycle basics -------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn start_reaches_running_after_grace() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    let pid = start_and_run(&h, "svc").await;
    let status = h.supervisor.status("svc").unwrap();
    assert_eq!(status.pid, Some(pid));
    assert_eq!(status.restarts_total, 0);
    assert!(h.os.is_alive(pid));
}

#[tokio::test(start_paused = true)]
async fn first_sample_promotes_starting_to_running() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    h.os.set_default_sample(sample_with(5.0, 5.0));
    h.supervisor
        .start("svc", StartOptions::default())
        .await
        .unwrap();
    assert_eq!(
        h.supervisor.status("svc").unwrap().state,
        ProcessState::Starting
    );
    h.supervisor.run_sample_tick().await;
    wait_for_state(&h.supervisor, "svc", ProcessState::Running).await;
}

#[tokio::test(start_paused = true)]
async fn start_while_running_is_rejected() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    start_and_run(&h, "svc").await;
    assert!(matches!(
        h.supervisor.start("svc", StartOptions::default()).await,
        Err(SupervisorError::AlreadyRunning(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_on_stopped_process() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    h.supervisor.stop("svc").await.unwrap();
    assert_eq!(
        h.supervisor.status("svc").unwrap().state,
        ProcessState::Stopped
    );
}

#[tokio::test(start_paused = true)]
async fn restart_spawns_a_new_pid_and_counts() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    let first = start_and_run(&h, "svc").await;

    h.supervisor
        .restart("svc", StartOptions::default())
        .await
        .unwrap();
    wait_for_state(&h.supervisor, "svc", ProcessState::Running).await;
    let status = h.supervisor.status("svc").unwrap();
    assert_ne!(status.pid, Some(first));
    assert_eq!(status.restarts_total, 1);
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_moves_to_failed_with_critical_alert() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    h.os.fail_next_spawn(SpawnError::NotFound("run-svc".to_string()));
    assert!(matches!(
        h.supervisor.start("svc", StartOptions::default()).await,
        Err(SupervisorError::Spawn { .. })
    ));
    assert_eq!(
        h.supervisor.status("svc").unwrap().state,
        ProcessState::Failed
    );
    let crashed = alerts_of_kind(&h, AlertKind::ProcessCrashed);
    assert_eq!(crashed.len(), 1);
    assert_eq!(crashed[0].severity, pg_core::AlertSeverity::Critical);
}

#[tokio::test(start_paused = true)]
async fn unexpected_exit_records_crash_and_restarts() {
    let h = harness();
    let mut cfg = basic("svc");
    cfg.crash.max_crashes = 5;
    h.supervisor.register(cfg).unwrap();
    let pid = start_and_run(&h, "svc").await;

    h.os.exit(pid, Some(127));
    wait_for_state(&h.supervisor, "svc", ProcessState::Running).await;

    let status = h.supervisor.status("svc").unwrap();
    assert_eq!(status.restarts_total, 1);
    assert_eq!(status.consecutive_restarts, 1);
    assert_eq!(status.crashes_in_window, 1);

    // exit 127 still counts as a crash, with the code in metadata
    let crashed = alerts_of_kind(&h, AlertKind::ProcessCrashed);
    assert_eq!(crashed.len(), 1);
    assert_eq!(crashed[0].metadata.get("exit_code"), Some(&serde_json::json!(127)));

    let stats = h.supervisor.crash_stats("svc").unwrap();
    assert_eq!(stats.crashes.len(), 1);
    assert_eq!(stats.crashes[0].exit_code, Some(127));
}

#[tokio::test(start_paused = true)]
async fn auto_restart_disabled_holds_in_failed() {
    let h = harness();
    let mut cfg = basic("svc");
    cfg.auto_restart = false;
    h.supervisor.register(cfg).unwrap();
    let pid = start_and_run(&h, "svc").await;

    h.os.exit(pid, Some(1));
    wait_for_state(&h.supervisor, "svc", ProcessState::Failed).await;
    // No automatic start happens afterwards
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        h.supervisor.status("svc").unwrap().state,
        ProcessState::Failed
    );
}

// --- S1: quarantine ---------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn s1_quarantine_after_crash_window_then_self_clears() {
    let h = harness();
    let mut cfg = ProcessConfig::new("u", "false");
    cfg.restart_delay_seconds = 0.0;
    cfg.crash = CrashPolicy {
        max_crashes: 3,
        window_seconds: 5,
        action: CrashAction::Quarantine,
        quarantine_seconds: 30,
    };
    h.supervisor.register(cfg).unwrap();

    h.os.set_exit_on_spawn(Some(Some(1)));
    h.supervisor
        .start("u", StartOptions::default())
        .await
        .unwrap();
    wait_for_state(&h.supervisor, "u", ProcessState::Quarantined).await;

    // Start is rejected while the quarantine clock runs
    match h.supervisor.start("u", StartOptions::default()).await {
        Err(SupervisorError::Quarantined {
            remaining_seconds, ..
        }) => assert!(remaining_seconds > 0 && remaining_seconds <= 30),
        other => panic!("expected quarantine rejection, got {other:?}"),
    }
    assert_eq!(alerts_of_kind(&h, AlertKind::Quarantined).len(), 1);

    // After expiry the engine permits the start again
    h.clock.advance(Duration::from_secs(31));
    h.os.set_exit_on_spawn(None);
    h.supervisor
        .start("u", StartOptions::default())
        .await
        .unwrap();
    assert_eq!(
        h.supervisor.status("u").unwrap().state,
        ProcessState::Starting
    );
}

// --- S2: cascade ------------------------------------------------------------

fn three_tier(h: &Harness) {
    let mut db = basic("db");
    db.crash = CrashPolicy {
        max_crashes: 2,
        window_seconds: 60,
        action: CrashAction::KillDependencies,
        quarantine_seconds: 0,
    };
    h.supervisor.register(db).unwrap();
    let mut api = basic("api");
    api.depends_on = vec!["db".to_string()];
    h.supervisor.register(api).unwrap();
    let mut web = basic("web");
    web.depends_on = vec!["api".to_string()];
    h.supervisor.register(web).unwrap();
}

#[tokio::test(start_paused = true)]
async fn s2_cascade_disables_origin_and_stops_dependents() {
    let h = harness();
    three_tier(&h);
    let db_pid = start_and_run(&h, "db").await;
    start_and_run(&h, "api").await;
    start_and_run(&h, "web").await;

    // First db crash restarts it
    h.os.exit(db_pid, Some(1));
    wait_for_state(&h.supervisor, "db", ProcessState::Running).await;
    let second_pid = h.supervisor.status("db").unwrap().pid.unwrap();

    // Second crash inside the window trips kill_dependencies
    h.os.exit(second_pid, Some(1));
    wait_for_state(&h.supervisor, "db", ProcessState::Disabled).await;
    wait_for_state(&h.supervisor, "api", ProcessState::Stopped).await;
    wait_for_state(&h.supervisor, "web", ProcessState::Stopped).await;

    // Victims are stopped but not disabled
    assert!(h.supervisor.status("db").unwrap().disabled);
    assert!(!h.supervisor.status("api").unwrap().disabled);
    assert!(!h.supervisor.status("web").unwrap().disabled);

    let killed = alerts_of_kind(&h, AlertKind::DependencyKilled);
    assert_eq!(killed.len(), 2);
    let victims: Vec<_> = killed.iter().filter_map(|a| a.process.clone()).collect();
    assert!(victims.contains(&"api".to_string()));
    assert!(victims.contains(&"web".to_string()));
    assert_eq!(alerts_of_kind(&h, AlertKind::ProcessDisabled).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn s2_force_enable_restores_the_whole_stack() {
    let h = harness();
    three_tier(&h);
    let db_pid = start_and_run(&h, "db").await;
    start_and_run(&h, "api").await;
    start_and_run(&h, "web").await;

    h.os.exit(db_pid, Some(1));
    wait_for_state(&h.supervisor, "db", ProcessState::Running).await;
    let second_pid = h.supervisor.status("db").unwrap().pid.unwrap();
    h.os.exit(second_pid, Some(1));
    wait_for_state(&h.supervisor, "db", ProcessState::Disabled).await;
    wait_for_state(&h.supervisor, "api", ProcessState::Stopped).await;
    wait_for_state(&h.supervisor, "web", ProcessState::Stopped).await;

    // Plain start is refused on the disabled origin
    assert!(matches!(
        h.supervisor.start("db", StartOptions::default()).await,
        Err(SupervisorError::Disabled(_))
    ));

    h.supervisor.force_enable("db").await.unwrap();
    wait_for_state(&h.supervisor, "db", ProcessState::Running).await;
    assert_eq!(h.supervisor.status("db").unwrap().crashes_in_window, 0);

    // Victims are startable without any force
    h.supervisor
        .start("api", StartOptions::default())
        .await
        .unwrap();
    wait_for_state(&h.supervisor, "api", ProcessState::Running).await;
    h.supervisor
        .start("web", StartOptions::default())
        .await
        .unwrap();
    wait_for_state(&h.supervisor, "web", ProcessState::Running).await;
}

// --- S3: threshold hysteresis ----------------------------------------------

fn sample_with(cpu: f64, memory: f64) -> MetricSample {
    MetricSample {
        taken_at: chrono::Utc::now(),
        cpu_percent: cpu,
        rss_bytes: 64 << 20,
        memory_percent: memory,
        threads: 2,
        open_files: 8,
        connections: 1,
        uptime_seconds: 0.0,
    }
}

#[tokio::test(start_paused = true)]
async fn s3_cpu_threshold_raises_once_and_clears_once() {
    let h = harness();
    let mut cfg = basic("hot");
    cfg.cpu_threshold_percent = 80.0;
    h.supervisor.register(cfg).unwrap();
    start_and_run(&h, "hot").await;

    h.os.set_default_sample(sample_with(90.0, 10.0));
    for _ in 0..6 {
        h.supervisor.run_sample_tick().await;
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(alerts_of_kind(&h, AlertKind::CpuHigh).len(), 1);
    assert_eq!(alerts_of_kind(&h, AlertKind::MemoryHigh).len(), 0);

    h.os.set_default_sample(sample_with(74.0, 10.0));
    for _ in 0..6 {
        h.supervisor.run_sample_tick().await;
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(alerts_of_kind(&h, AlertKind::CpuHigh).len(), 1);
    assert_eq!(alerts_of_kind(&h, AlertKind::ThresholdCleared).len(), 1);

    // The latest frame carries the live sample set
    let frame = h.supervisor.run_sample_tick().await;
    assert!(frame.processes.contains_key("hot"));
}

// --- S4: disable and force-enable ------------------------------------------

#[tokio::test(start_paused = true)]
async fn s4_disabled_process_starts_only_via_force_enable() {
    let h = harness();
    let mut cfg = basic("d");
    // Zero max_crashes: first crash disables
    cfg.crash.max_crashes = 0;
    h.supervisor.register(cfg).unwrap();
    let pid = start_and_run(&h, "d").await;

    h.os.exit(pid, Some(1));
    wait_for_state(&h.supervisor, "d", ProcessState::Disabled).await;
    assert_eq!(alerts_of_kind(&h, AlertKind::ProcessDisabled).len(), 1);

    assert!(matches!(
        h.supervisor.start("d", StartOptions::default()).await,
        Err(SupervisorError::Disabled(_))
    ));

    h.supervisor.force_enable("d").await.unwrap();
    let state = h.supervisor.status("d").unwrap().state;
    assert!(
        state == ProcessState::Starting || state == ProcessState::Running,
        "force-enable starts the process (saw {state})"
    );
}

// --- S5: dependency gate ----------------------------------------------------

#[tokio::test(start_paused = true)]
async fn s5_start_requires_running_dependencies_unless_ignored() {
    let h = harness();
    h.supervisor.register(basic("db")).unwrap();
    let mut api = basic("api");
    api.depends_on = vec!["db".to_string()];
    h.supervisor.register(api).unwrap();

    match h.supervisor.start("api", StartOptions::default()).await {
        Err(SupervisorError::DependencyNotReady { missing, .. }) => {
            assert_eq!(missing, vec!["db".to_string()]);
        }
        other => panic!("expected DependencyNotReady, got {other:?}"),
    }

    h.supervisor
        .start(
            "api",
            StartOptions {
                ignore_dependencies: true,
            },
        )
        .await
        .unwrap();
    wait_for_state(&h.supervisor, "api", ProcessState::Running).await;
}

// --- S6: graceful stop ------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn s6_stop_escalates_term_to_kill_without_crash_engine() {
    let h = harness();
    h.supervisor.register(basic("stubborn")).unwrap();
    h.os.set_term_exits(false);
    let pid = start_and_run(&h, "stubborn").await;

    h.supervisor.stop("stubborn").await.unwrap();
    assert_eq!(
        h.supervisor.status("stubborn").unwrap().state,
        ProcessState::Stopping
    );

    // Kill fires after the graceful window (virtual time)
    wait_for_state(&h.supervisor, "stubborn", ProcessState::Stopped).await;
    let signals = h.os.signals();
    assert_eq!(
        signals,
        vec![(pid as i32, SignalKind::Term), (pid as i32, SignalKind::Kill)]
    );

    // Commanded stops never touch the crash engine
    assert!(h.supervisor.crash_stats("stubborn").unwrap().crashes.is_empty());
    assert!(alerts_of_kind(&h, AlertKind::ProcessCrashed).is_empty());
}

// --- restart cap ------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn consecutive_restart_cap_disables_regardless_of_action() {
    let h = harness();
    let mut cfg = basic("flappy");
    cfg.max_restarts = 1;
    cfg.crash = CrashPolicy {
        max_crashes: 100,
        window_seconds: 0,
        action: CrashAction::Quarantine,
        quarantine_seconds: 60,
    };
    h.supervisor.register(cfg).unwrap();
    let pid = start_and_run(&h, "flappy").await;

    h.os.exit(pid, Some(1));
    wait_for_state(&h.supervisor, "flappy", ProcessState::Running).await;
    let second = h.supervisor.status("flappy").unwrap().pid.unwrap();

    h.os.exit(second, Some(1));
    wait_for_state(&h.supervisor, "flappy", ProcessState::Disabled).await;
    assert!(h.supervisor.status("flappy").unwrap().disabled);
}

// --- deregistration ---------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn deregister_kills_running_child() {
    let h = harness();
    h.supervisor.register(basic("svc")).unwrap();
    let pid = start_and_run(&h, "svc").await;

    h.supervisor.deregister("svc").unwrap();
    for _ in 0..100 {
        if !h.os.is_alive(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!h.os.is_alive(pid));
    assert!(h.supervisor.status("svc").is_err());
}

// --- ordered auto-start -----------------------------------------------------

#[tokio::test(start_paused = true)]
async fn auto_start_walks_the_dependency_order() {
    let h = harness();
    three_tier(&h);
    let results = h.supervisor.start_in_dependency_order().await;
    assert!(results.iter().all(|(_, r)| r.is_ok()), "{results:?}");

    wait_for_state(&h.supervisor, "web", ProcessState::Running).await;
    let spawned: Vec<String> = h.os.spawned().iter().map(|s| s.command.clone()).collect();
    assert_eq!(spawned, vec!["run-db", "run-api", "run-web"]);
}
