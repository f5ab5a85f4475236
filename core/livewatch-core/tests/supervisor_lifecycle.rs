use livewatch_core::testing::{RecorderCall, ScriptedRecorder, ScriptedSource, SourceCall};
use livewatch_core::{
    AuthError, BeginOutcome, ConnError, LiveTick, Monitor, MonitorSettings, MonitorState,
    NavError, RecorderEndpoint, ShutdownReason, StartupError, Supervisor,
};
use std::future;
use std::time::Duration;

type TestSupervisor = Supervisor<ScriptedSource, ScriptedRecorder>;

fn settings(stop_after_first_session: bool) -> MonitorSettings {
    MonitorSettings {
        live_check_interval: Duration::from_secs(10),
        end_check_interval: Duration::from_secs(5),
        stop_after_first_session,
    }
}

fn endpoint() -> RecorderEndpoint {
    RecorderEndpoint {
        address: "ws://127.0.0.1:4455".to_string(),
        credential: Some("obs-pass".to_string()),
    }
}

fn supervisor(stop_after_first_session: bool) -> TestSupervisor {
    let monitor = Monitor::new(
        ScriptedSource::new(),
        ScriptedRecorder::new(),
        settings(stop_after_first_session),
    );
    Supervisor::new(monitor, endpoint())
}

async fn stop_after(delay: Duration) -> ShutdownReason {
    tokio::time::sleep(delay).await;
    ShutdownReason::Signal
}

#[tokio::test]
async fn start_connects_then_runs_initial_check() {
    let supervisor = supervisor(false);
    let monitor = supervisor.monitor();

    assert_eq!(supervisor.start().await.expect("start"), LiveTick::Offline);

    assert_eq!(
        monitor.recorder().calls(),
        vec![RecorderCall::Connect {
            address: "ws://127.0.0.1:4455".to_string(),
            credential: Some("obs-pass".to_string()),
        }]
    );
    assert_eq!(
        monitor.source().calls(),
        vec![
            SourceCall::Authenticate,
            SourceCall::Navigate(1),
            SourceCall::Reload(1),
            SourceCall::LiveQuery,
        ]
    );
    assert!(monitor.live_cadence().is_running());
}

#[tokio::test]
async fn initial_auth_failure_is_fatal_and_schedules_nothing() {
    let supervisor = supervisor(false);
    let monitor = supervisor.monitor();
    monitor
        .source()
        .push_auth(Err(AuthError::Rejected("wrong password".to_string())));

    let err = supervisor.start().await.unwrap_err();

    assert!(matches!(err, StartupError::Authenticate(AuthError::Rejected(_))));
    assert!(!monitor.live_cadence().is_running());
    assert!(!monitor.end_cadence().is_running());
    assert_eq!(monitor.source().live_queries(), 0);
    assert!(monitor.current_session().is_none());

    assert!(supervisor.shutdown(ShutdownReason::Fatal).await);
    assert_eq!(ShutdownReason::Fatal.exit_code(), 1);
    assert_eq!(monitor.recorder().disconnects(), 1);
}

#[tokio::test]
async fn initial_navigation_failure_is_fatal() {
    let supervisor = supervisor(false);
    let monitor = supervisor.monitor();
    monitor.source().push_navigate(Err(NavError::Unreachable {
        target: "https://example.test/someone/".to_string(),
        details: "HTTP 502".to_string(),
    }));

    let err = supervisor.start().await.unwrap_err();

    assert!(matches!(err, StartupError::Navigate(NavError::Unreachable { .. })));
    assert_eq!(
        monitor.source().calls(),
        vec![SourceCall::Authenticate, SourceCall::Navigate(1)]
    );
    assert!(monitor.current_session().is_none());
    assert!(!monitor.live_cadence().is_running());
    assert_eq!(monitor.recorder().starts(), 0);
}

#[tokio::test]
async fn recorder_connect_failure_stops_before_authentication() {
    let supervisor = supervisor(false);
    let monitor = supervisor.monitor();
    monitor.recorder().push_connect(Err(ConnError::Unreachable {
        address: "ws://127.0.0.1:4455".to_string(),
        details: "connection refused".to_string(),
    }));

    let err = supervisor.start().await.unwrap_err();

    assert_eq!(err.kind(), "conn_unreachable");
    assert!(monitor.source().calls().is_empty());
    assert!(!monitor.live_cadence().is_running());
}

#[tokio::test(start_paused = true)]
async fn run_polls_on_live_interval_until_stopped() {
    let supervisor = supervisor(false);
    supervisor.start().await.expect("start");

    let reason = supervisor
        .run(stop_after(Duration::from_secs(25)))
        .await
        .expect("run");

    assert_eq!(reason, ShutdownReason::Signal);
    // One immediate check plus ticks at 10s and 20s.
    assert_eq!(supervisor.monitor().source().live_queries(), 3);
}

#[tokio::test(start_paused = true)]
async fn one_shot_mode_finishes_after_first_session() {
    let supervisor = supervisor(true);
    let monitor = supervisor.monitor();
    monitor.source().push_live(Ok(true));
    monitor.source().push_end(Ok(false));
    monitor.source().push_end(Ok(true));

    assert_eq!(
        supervisor.start().await.expect("start"),
        LiveTick::RecordingStarted
    );
    let reason = supervisor.run(future::pending()).await.expect("run");

    assert_eq!(reason, ShutdownReason::SessionComplete);
    assert_eq!(monitor.source().end_queries(), 2);
    assert_eq!(monitor.recorder().stops(), 1);
    assert_eq!(monitor.status().sessions_recorded, 1);

    assert!(supervisor.shutdown(reason).await);
    assert_eq!(monitor.recorder().stops(), 1);
    assert_eq!(reason.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn live_polling_resumes_one_period_after_session_ends() {
    let supervisor = supervisor(false);
    let monitor = supervisor.monitor();
    monitor.source().push_live(Ok(true));
    monitor.source().push_end(Ok(true));
    supervisor.start().await.expect("start");

    // End check at 5s stops the recording; the next live check lands at 15s.
    let reason = supervisor
        .run(stop_after(Duration::from_secs(16)))
        .await
        .expect("run");

    assert_eq!(reason, ShutdownReason::Signal);
    assert_eq!(monitor.recorder().stops(), 1);
    assert_eq!(monitor.source().live_queries(), 2);
    assert_eq!(monitor.state(), MonitorState::Idle);
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let supervisor = supervisor(false);
    supervisor.start().await.expect("start");
    let monitor = supervisor.monitor();

    assert!(supervisor.shutdown(ShutdownReason::Signal).await);
    assert!(!supervisor.shutdown(ShutdownReason::Fatal).await);

    assert_eq!(supervisor.shutdown_reason(), Some(ShutdownReason::Signal));
    assert_eq!(monitor.recorder().disconnects(), 1);
    assert_eq!(monitor.source().closes(), 1);
    assert!(monitor.current_session().is_none());
    assert!(!monitor.live_cadence().is_running());
    assert!(!monitor.live_cadence().resume());
}

#[tokio::test]
async fn shutdown_stops_active_recording() {
    let supervisor = supervisor(false);
    let monitor = supervisor.monitor();
    monitor.source().push_live(Ok(true));
    supervisor.start().await.expect("start");
    assert!(monitor.is_recording());

    supervisor.shutdown(ShutdownReason::Signal).await;

    assert!(!monitor.is_recording());
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert_eq!(monitor.recorder().stops(), 1);
    assert_eq!(
        monitor.recorder().calls().last(),
        Some(&RecorderCall::Disconnect)
    );
    assert_eq!(monitor.live_poller().tick().await, LiveTick::Suspended);
    assert_eq!(monitor.controller().end().await, livewatch_core::EndOutcome::NotRecording);
    assert_eq!(monitor.recorder().stops(), 1);
}

#[tokio::test]
async fn run_after_shutdown_returns_stored_reason() {
    let supervisor = supervisor(false);
    supervisor.start().await.expect("start");
    supervisor.shutdown(ShutdownReason::Fatal).await;

    let reason = supervisor.run(future::pending()).await.expect("run");
    assert_eq!(reason, ShutdownReason::Fatal);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_begin_then_stops_it() {
    let monitor = Monitor::new(
        ScriptedSource::new(),
        ScriptedRecorder::new().with_command_delay(Duration::from_secs(1)),
        settings(false),
    );
    let supervisor = Supervisor::new(monitor, endpoint());
    supervisor.start().await.expect("start");
    let monitor = supervisor.monitor();

    let controller = monitor.controller();
    let begin = controller.begin();
    let shutdown = async {
        tokio::task::yield_now().await;
        supervisor.shutdown(ShutdownReason::Signal).await
    };
    let (began, shut_down) = tokio::join!(begin, shutdown);

    assert_eq!(began, BeginOutcome::Started);
    assert!(shut_down);
    assert_eq!(
        monitor.recorder().calls()[1..],
        [RecorderCall::Start, RecorderCall::Stop, RecorderCall::Disconnect]
    );
    assert!(!monitor.is_recording());
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert!(!monitor.end_cadence().is_running());
}
