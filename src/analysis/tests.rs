use super::prompts::{prompt_for, DESCRIBE_PROMPT, FALLBACK_PROMPT};
use super::*;
use crate::camera::{CameraSession, CaptureSurface, StreamSettings, SurfaceSlot, SyntheticDevices};
use crate::config::CamsightConfig;
use crate::error::{AnalysisError, CamsightError};
use crate::events::{CamsightEvent, EventBus};
use crate::frame::CapturedFrame;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct NullSurface;

impl CaptureSurface for NullSurface {
    fn attach(&self, _settings: &StreamSettings) {}
    fn detach(&self) {}
}

/// Answers by prompt text and records every prompt it receives
#[derive(Default)]
struct StubService {
    answers: HashMap<&'static str, Result<String, AnalysisError>>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl StubService {
    fn answer(mut self, prompt: &'static str, answer: Result<String, AnalysisError>) -> Self {
        self.answers.insert(prompt, answer);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl AnalysisService for StubService {
    async fn analyze(
        &self,
        _frame: &CapturedFrame,
        prompt: &str,
    ) -> std::result::Result<String, AnalysisError> {
        self.prompts.lock().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answers
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| Ok("no particular observations".to_string()))
    }
}

async fn create_ready_session(event_bus: Arc<EventBus>) -> CameraSession {
    let mut config = CamsightConfig::default().camera;
    config.ideal_resolution = (16, 12);
    let mut session = CameraSession::new(
        config,
        Arc::new(SyntheticDevices::new()),
        SurfaceSlot::mounted(Arc::new(NullSurface)),
        event_bus,
    );
    session.acquire().await.unwrap();
    session
}

fn create_dispatcher(service: Arc<StubService>, event_bus: Arc<EventBus>) -> AnalysisDispatcher {
    AnalysisDispatcher::new(service, event_bus, Duration::from_millis(1000))
}

fn categories(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<CamsightEvent>) -> Vec<CamsightEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_failure_is_isolated_per_category() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let service = Arc::new(
        StubService::default()
            .answer(
                prompt_for("Emotion Detection"),
                Ok("happy, relaxed".to_string()),
            )
            .answer(
                prompt_for("Accessories"),
                Err(AnalysisError::Network {
                    details: "connection reset".to_string(),
                }),
            ),
    );
    let dispatcher = create_dispatcher(Arc::clone(&service), event_bus);

    let report = dispatcher
        .dispatch(&session, &categories(&["Emotion Detection", "Accessories"]))
        .await
        .unwrap();

    assert_eq!(report.requests.len(), 2);

    let emotion = &report.requests[0];
    assert_eq!(emotion.category, "Emotion Detection");
    assert_eq!(emotion.status, RequestStatus::Succeeded);
    assert_eq!(emotion.result_text(), Some("happy, relaxed"));

    let accessories = report.get("Accessories").unwrap();
    assert_eq!(accessories.status, RequestStatus::Failed);
    assert!(!accessories.error_message().unwrap().is_empty());

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(service.calls(), 2);
}

#[tokio::test]
async fn test_empty_selection_is_rejected_before_capture() {
    let event_bus = Arc::new(EventBus::new(64));
    // An idle session would fail to capture; validation must come first
    let session = CameraSession::new(
        CamsightConfig::default().camera,
        Arc::new(SyntheticDevices::new()),
        SurfaceSlot::new(),
        Arc::clone(&event_bus),
    );
    let service = Arc::new(StubService::default());
    let dispatcher = create_dispatcher(Arc::clone(&service), Arc::clone(&event_bus));
    let mut receiver = event_bus.subscribe();

    let result = dispatcher.dispatch(&session, &[]).await;

    assert!(matches!(result, Err(CamsightError::Validation { .. })));
    assert_eq!(service.calls(), 0);
    assert!(drain(&mut receiver)
        .iter()
        .any(|e| matches!(e, CamsightEvent::BatchFailed { .. })));
}

#[tokio::test]
async fn test_capture_failure_sends_no_requests() {
    let event_bus = Arc::new(EventBus::new(64));
    let mut session = create_ready_session(Arc::clone(&event_bus)).await;
    session.pause().await.unwrap();

    let service = Arc::new(StubService::default());
    let dispatcher = create_dispatcher(Arc::clone(&service), Arc::clone(&event_bus));
    let mut receiver = event_bus.subscribe();

    let result = dispatcher
        .dispatch(&session, &categories(&["Gaze Analysis"]))
        .await;

    match result {
        Err(CamsightError::Camera(e)) => assert!(e.to_string().contains("paused")),
        other => panic!("Expected camera error, got {:?}", other.map(|r| r.batch_id)),
    }
    assert_eq!(service.calls(), 0);

    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], CamsightEvent::BatchFailed { .. }));
}

#[tokio::test]
async fn test_progress_events_per_category() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let dispatcher = create_dispatcher(Arc::new(StubService::default()), Arc::clone(&event_bus));
    let mut receiver = event_bus.subscribe();

    let selected = categories(&["Gaze Analysis", "Posture Analysis", "Age Estimation"]);
    let report = dispatcher.dispatch(&session, &selected).await.unwrap();

    let events = drain(&mut receiver);
    for category in &selected {
        let position = |kind: &str| {
            events
                .iter()
                .position(|e| progress(e) == Some((kind, category.as_str())))
                .unwrap()
        };

        assert!(position("analysis_started") < position("analysis_result"));
        assert!(position("analysis_result") < position("analysis_finished"));
    }

    assert!(events.iter().all(|e| match e {
        CamsightEvent::AnalysisStarted { batch_id, .. }
        | CamsightEvent::AnalysisResult { batch_id, .. }
        | CamsightEvent::AnalysisFinished { batch_id, .. } => *batch_id == report.batch_id,
        _ => true,
    }));
}

fn progress(event: &CamsightEvent) -> Option<(&'static str, &str)> {
    match event {
        CamsightEvent::AnalysisStarted { category, .. }
        | CamsightEvent::AnalysisResult { category, .. }
        | CamsightEvent::AnalysisFinished { category, .. } => {
            Some((event.event_type(), category.as_str()))
        }
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_requests_run_concurrently() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let service = Arc::new(StubService::default().with_delay(Duration::from_millis(500)));
    let dispatcher = create_dispatcher(Arc::clone(&service), event_bus);

    let start = tokio::time::Instant::now();
    let report = dispatcher
        .dispatch(
            &session,
            &categories(&["Gaze Analysis", "Facial Features", "Scene Description"]),
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 3);
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_unknown_category_uses_fallback_prompt() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let service = Arc::new(StubService::default());
    let dispatcher = create_dispatcher(Arc::clone(&service), event_bus);

    let report = dispatcher
        .dispatch(&session, &categories(&["Tattoo Detection"]))
        .await
        .unwrap();

    assert_eq!(report.requests[0].prompt, FALLBACK_PROMPT);
    assert_eq!(*service.prompts.lock(), vec![FALLBACK_PROMPT.to_string()]);
    assert_eq!(report.requests[0].status, RequestStatus::Succeeded);
}

#[tokio::test]
async fn test_results_are_aggregated_across_batches() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let dispatcher = create_dispatcher(Arc::new(StubService::default()), event_bus);

    let selected = categories(&["Emotion Detection", "Lighting Conditions"]);
    dispatcher.dispatch(&session, &selected).await.unwrap();
    dispatcher.dispatch(&session, &selected).await.unwrap();

    let results = dispatcher.results();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|entry| !entry.is_pending()));

    dispatcher.clear_results();
    assert!(dispatcher.results().is_empty());
}

#[tokio::test]
async fn test_slow_results_fill_their_placeholders() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    // Answers arrive well after the correlation window has passed
    let service = Arc::new(StubService::default().with_delay(Duration::from_millis(150)));
    let dispatcher = AnalysisDispatcher::new(service, event_bus, Duration::from_millis(50));

    let before = std::time::Instant::now();
    let selected = categories(&["Gaze Analysis", "Age Estimation"]);
    dispatcher.dispatch(&session, &selected).await.unwrap();

    let results = dispatcher.results();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|entry| !entry.is_pending()));
    assert!(results
        .iter()
        .all(|entry| entry.requested_at.duration_since(before) < Duration::from_millis(150)));
}

#[tokio::test]
async fn test_describe() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let service = Arc::new(
        StubService::default().answer(DESCRIBE_PROMPT, Ok("a person at a desk".to_string())),
    );
    let dispatcher = create_dispatcher(Arc::clone(&service), Arc::clone(&event_bus));
    let mut receiver = event_bus.subscribe();

    let result = dispatcher.describe(&session).await;

    assert_eq!(result, SingleResult::Described("a person at a desk".to_string()));
    assert!(drain(&mut receiver).iter().any(|e| matches!(
        e,
        CamsightEvent::DescriptionReady { outcome: AnalysisOutcome::Text(_) }
    )));
}

#[tokio::test]
async fn test_describe_failure_replaces_result() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = create_ready_session(Arc::clone(&event_bus)).await;
    let service = Arc::new(StubService::default().answer(
        DESCRIBE_PROMPT,
        Err(AnalysisError::Quota {
            details: "daily limit reached".to_string(),
        }),
    ));
    let dispatcher = create_dispatcher(service, event_bus);

    match dispatcher.describe(&session).await {
        SingleResult::Failed(message) => assert!(message.contains("daily limit reached")),
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_describe_without_frame() {
    let event_bus = Arc::new(EventBus::new(64));
    let session = CameraSession::new(
        CamsightConfig::default().camera,
        Arc::new(SyntheticDevices::new()),
        SurfaceSlot::new(),
        Arc::clone(&event_bus),
    );
    let service = Arc::new(StubService::default());
    let dispatcher = create_dispatcher(Arc::clone(&service), event_bus);

    assert!(matches!(
        dispatcher.describe(&session).await,
        SingleResult::Failed(_)
    ));
    assert_eq!(service.calls(), 0);
}

#[test]
fn test_from_config_requires_credential() {
    let mut config = CamsightConfig::default().analysis;
    config.api_key = None;
    config.api_key_env = "CAMSIGHT_TEST_UNSET_DISPATCH_KEY".to_string();

    let result = AnalysisDispatcher::from_config(&config, Arc::new(EventBus::new(8)));
    assert!(matches!(result, Err(CamsightError::Config(_))));
}
