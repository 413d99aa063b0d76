use super::*;
use crate::analysis::{AnalysisDispatcher, AnalysisService, RequestStatus};
use crate::camera::{FacingMode, SessionState, SyntheticDevices};
use crate::config::CamsightConfig;
use crate::error::{AnalysisError, CamsightError};
use crate::events::{CamsightEvent, EventBus};
use crate::frame::CapturedFrame;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Answers every prompt with the still's dimensions
struct EchoService;

#[async_trait]
impl AnalysisService for EchoService {
    async fn analyze(
        &self,
        frame: &CapturedFrame,
        _prompt: &str,
    ) -> std::result::Result<String, AnalysisError> {
        Ok(format!("{}x{} still", frame.width, frame.height))
    }
}

fn create_test_config() -> CamsightConfig {
    let mut config = CamsightConfig::default();
    config.camera.ideal_resolution = (32, 24);
    config.camera.restart_delay_ms = 10;
    config.camera.surface_retry_attempts = 2;
    config.camera.surface_retry_delay_ms = 10;
    config
}

/// Never answers, like a request hanging on the network
struct StalledService;

#[async_trait]
impl AnalysisService for StalledService {
    async fn analyze(
        &self,
        _frame: &CapturedFrame,
        _prompt: &str,
    ) -> std::result::Result<String, AnalysisError> {
        std::future::pending().await
    }
}

fn create_test_app(devices: &SyntheticDevices) -> CamsightApp {
    create_test_app_with_service(devices, Arc::new(EchoService))
}

fn create_test_app_with_service(
    devices: &SyntheticDevices,
    service: Arc<dyn AnalysisService>,
) -> CamsightApp {
    let config = create_test_config();
    let event_bus = Arc::new(EventBus::new(128));
    let dispatcher = AnalysisDispatcher::new(
        service,
        Arc::clone(&event_bus),
        Duration::from_millis(config.analysis.correlation_window_ms),
    );
    CamsightApp::with_parts(
        config,
        event_bus,
        Arc::new(devices.clone()),
        Some(dispatcher),
        None,
    )
}

#[tokio::test]
async fn test_commands_drive_session() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);
    app.mount_console_surface();

    assert!(app.handle_command(AppCommand::Acquire).await);
    assert_eq!(app.session().state(), SessionState::Ready);

    app.handle_command(AppCommand::TogglePause).await;
    assert_eq!(app.session().state(), SessionState::Paused);

    app.handle_command(AppCommand::TogglePause).await;
    assert_eq!(app.session().state(), SessionState::Ready);

    app.handle_command(AppCommand::SwitchFacing).await;
    assert_eq!(app.session().facing_mode(), FacingMode::Rear);
    assert_eq!(app.session().state(), SessionState::Ready);

    app.handle_command(AppCommand::Stop).await;
    assert_eq!(app.session().state(), SessionState::Idle);
    assert_eq!(devices.open_streams(), 0);
    assert_eq!(devices.max_open_streams(), 1);

    assert!(!app.handle_command(AppCommand::Quit).await);
}

#[tokio::test]
async fn test_failed_command_keeps_running() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);

    // Pausing an idle session is rejected but not fatal
    assert!(app.handle_command(AppCommand::TogglePause).await);
    assert_eq!(app.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn test_capture_analyzes_selected_categories() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);
    app.mount_console_surface();
    app.handle_command(AppCommand::Acquire).await;

    // Positions follow the configured order
    app.handle_command(AppCommand::ToggleCategory(3)).await;
    app.handle_command(AppCommand::ToggleCategory(0)).await;

    let report = app.analyze_selected().await.unwrap();

    let categories: Vec<_> = report.requests.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(categories, vec!["Emotion Detection", "Accessories"]);
    assert!(report
        .requests
        .iter()
        .all(|r| r.status == RequestStatus::Succeeded && r.result_text() == Some("32x24 still")));
}

#[tokio::test]
async fn test_capture_without_selection_is_rejected() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);
    app.mount_console_surface();
    app.handle_command(AppCommand::Acquire).await;
    app.handle_command(AppCommand::SelectAll).await;
    app.handle_command(AppCommand::ClearSelection).await;

    let result = app.analyze_selected().await;
    assert!(matches!(result, Err(CamsightError::Validation { .. })));
}

#[tokio::test]
async fn test_analysis_unavailable_without_credential() {
    let devices = SyntheticDevices::new();
    let config = create_test_config();
    let event_bus = Arc::new(EventBus::new(32));
    let app = CamsightApp::with_parts(
        config,
        Arc::clone(&event_bus),
        Arc::new(devices.clone()),
        None,
        Some("No API key configured".to_string()),
    );
    let mut receiver = event_bus.subscribe();

    match app.describe().await {
        Err(CamsightError::Component { component, message }) => {
            assert_eq!(component, "analysis");
            assert_eq!(message, "No API key configured");
        }
        _ => panic!("Expected analysis component error"),
    }

    match receiver.try_recv() {
        Ok(CamsightEvent::BatchFailed { message }) => {
            assert_eq!(message, "No API key configured")
        }
        other => panic!("Expected BatchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_loop_quits_and_releases_camera() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);
    app.mount_console_surface();

    let (commands_tx, commands_rx) = mpsc::channel(8);
    commands_tx.send(AppCommand::Acquire).await.unwrap();
    commands_tx.send(AppCommand::Quit).await.unwrap();

    let exit_code = app.run(commands_rx).await.unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(devices.total_opened(), 1);
    assert_eq!(devices.open_streams(), 0);
    assert_eq!(app.session().state(), SessionState::Idle);
    assert!(app.cancellation_token().is_cancelled());
}

#[tokio::test]
async fn test_run_loop_reports_track_loss() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);
    app.mount_console_surface();
    let mut receiver = app.event_bus().subscribe();

    let (commands_tx, commands_rx) = mpsc::channel(8);
    commands_tx.send(AppCommand::Acquire).await.unwrap();

    let unplug = devices.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        unplug.end_active_tracks();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = commands_tx.send(AppCommand::Quit).await;
    });

    app.run(commands_rx).await.unwrap();

    let mut disconnected = false;
    while let Ok(event) = receiver.try_recv() {
        if let CamsightEvent::SessionError { message, .. } = event {
            disconnected |= message == "Camera disconnected";
        }
    }
    assert!(disconnected);
    assert_eq!(devices.open_streams(), 0);
}

#[tokio::test]
async fn test_track_loss_and_quit_during_analysis() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app_with_service(&devices, Arc::new(StalledService));
    app.mount_console_surface();
    let mut receiver = app.event_bus().subscribe();

    let (commands_tx, commands_rx) = mpsc::channel(8);
    commands_tx.send(AppCommand::Acquire).await.unwrap();
    commands_tx.send(AppCommand::ToggleCategory(0)).await.unwrap();
    commands_tx.send(AppCommand::CaptureAndAnalyze).await.unwrap();

    let unplug = devices.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        unplug.end_active_tracks();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = commands_tx.send(AppCommand::Quit).await;
    });

    let exit_code = tokio::time::timeout(Duration::from_secs(3), app.run(commands_rx))
        .await
        .expect("run loop blocked behind an unanswered request")
        .unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(devices.open_streams(), 0);
    assert_eq!(app.in_flight_batches(), 0);

    let mut started = false;
    let mut errored = false;
    let mut settled = false;
    while let Ok(event) = receiver.try_recv() {
        match event {
            CamsightEvent::AnalysisStarted { category, .. } => {
                started |= category == "Emotion Detection"
            }
            CamsightEvent::SessionStateChanged {
                state: SessionState::Error,
                ..
            } => errored = true,
            CamsightEvent::AnalysisResult { .. } => settled = true,
            _ => {}
        }
    }
    assert!(started);
    assert!(errored);
    assert!(!settled);
}

#[tokio::test]
async fn test_commands_handled_while_batch_in_flight() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app_with_service(&devices, Arc::new(StalledService));
    app.mount_console_surface();
    app.handle_command(AppCommand::Acquire).await;
    app.handle_command(AppCommand::SelectAll).await;

    assert!(app.handle_command(AppCommand::CaptureAndAnalyze).await);
    assert!(app.handle_command(AppCommand::Describe).await);
    assert_eq!(app.in_flight_batches(), 2);

    app.handle_command(AppCommand::TogglePause).await;
    assert_eq!(app.session().state(), SessionState::Paused);

    let exit_code = tokio::time::timeout(
        Duration::from_secs(3),
        app.shutdown(ShutdownReason::UserRequest),
    )
    .await
    .expect("shutdown waited on an unanswered request")
    .unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(app.in_flight_batches(), 0);
    assert_eq!(devices.open_streams(), 0);
}

#[tokio::test]
async fn test_run_once() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);

    let report = app
        .run_once(&["Gaze Analysis".to_string(), "Scene Description".to_string()])
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(devices.open_streams(), 0);
    assert_eq!(app.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn test_describe_once() {
    let devices = SyntheticDevices::new();
    let mut app = create_test_app(&devices);

    let result = app.describe_once().await.unwrap();

    assert_eq!(
        result,
        crate::analysis::SingleResult::Described("32x24 still".to_string())
    );
    assert_eq!(devices.open_streams(), 0);
}

#[test]
fn test_shutdown_reason_exit_codes() {
    assert_eq!(ShutdownReason::UserRequest.exit_code(), 0);
    assert_eq!(ShutdownReason::Signal("SIGTERM".to_string()).exit_code(), 0);
    assert_eq!(ShutdownReason::Error("boom".to_string()).exit_code(), 1);
    assert_eq!(
        ShutdownReason::Signal("SIGINT".to_string()).to_string(),
        "received SIGINT"
    );
}

#[test]
fn test_console_render() {
    let line = ConsoleDisplay::render(&CamsightEvent::AnalysisResult {
        batch_id: "b1".to_string(),
        category: "Emotion Detection".to_string(),
        outcome: crate::analysis::AnalysisOutcome::Text("happy, relaxed".to_string()),
    });
    assert_eq!(line.as_deref(), Some("[Emotion Detection] happy, relaxed"));

    let finished = ConsoleDisplay::render(&CamsightEvent::AnalysisFinished {
        batch_id: "b1".to_string(),
        category: "Emotion Detection".to_string(),
    });
    assert!(finished.is_none());
}
