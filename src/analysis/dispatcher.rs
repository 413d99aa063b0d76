use super::client::{AnalysisService, GenerativeClient};
use super::correlation::{BoardEntry, ResultBoard};
use super::prompts::{is_known_category, DESCRIBE_PROMPT};
use super::types::{AnalysisOutcome, AnalysisRequest, BatchReport, SingleResult};
use crate::camera::{CameraSession, SessionState};
use crate::config::AnalysisConfig;
use crate::error::{CameraError, CamsightError, Result};
use crate::events::{CamsightEvent, EventBus};
use crate::frame::CapturedFrame;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fans a captured frame out to one analysis request per category
pub struct AnalysisDispatcher {
    service: Arc<dyn AnalysisService>,
    event_bus: Arc<EventBus>,
    board: Mutex<ResultBoard>,
}

impl AnalysisDispatcher {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        event_bus: Arc<EventBus>,
        correlation_window: Duration,
    ) -> Self {
        Self {
            service,
            event_bus,
            board: Mutex::new(ResultBoard::new(correlation_window)),
        }
    }

    /// Dispatcher backed by the configured generative client
    pub fn from_config(config: &AnalysisConfig, event_bus: Arc<EventBus>) -> Result<Self> {
        let client = GenerativeClient::new(config)?;
        Ok(Self::new(
            Arc::new(client),
            event_bus,
            Duration::from_millis(config.correlation_window_ms),
        ))
    }

    /// Capture a still from `session` and analyze it for every category.
    ///
    /// Rejects an empty selection before capturing. Per-category failures
    /// are recorded in the report and never fail the batch.
    pub async fn dispatch(
        &self,
        session: &CameraSession,
        categories: &[String],
    ) -> Result<BatchReport> {
        let frame = self.capture_for(session, categories).await?;
        self.analyze_frame(frame, categories).await
    }

    /// Validate the selection and capture the still a batch will analyze.
    ///
    /// Either failure is published as `BatchFailed` and no request is sent.
    pub async fn capture_for(
        &self,
        session: &CameraSession,
        categories: &[String],
    ) -> Result<Arc<CapturedFrame>> {
        self.check_selection(categories).await?;

        let Some(frame) = session.capture_frame() else {
            let error = CameraError::Render {
                details: format!("no frame available while camera is {}", session.state()),
            };
            self.event_bus
                .emit(CamsightEvent::BatchFailed {
                    message: error.to_string(),
                })
                .await;
            return Err(error.into());
        };

        Ok(Arc::new(frame))
    }

    /// Analyze an already captured still for every category
    pub async fn analyze_frame(
        &self,
        frame: Arc<CapturedFrame>,
        categories: &[String],
    ) -> Result<BatchReport> {
        self.check_selection(categories).await?;

        let batch_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Dispatching batch {} ({} categor{}) for still {}",
            batch_id,
            categories.len(),
            if categories.len() == 1 { "y" } else { "ies" },
            frame.id
        );

        let pending = categories
            .iter()
            .map(|category| AnalysisRequest::new(category.clone(), Arc::clone(&frame)));

        let requests = join_all(pending.map(|request| self.run_request(&batch_id, request))).await;

        let report = BatchReport { batch_id, requests };
        info!(
            "Batch {} settled: {} succeeded, {} failed",
            report.batch_id,
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Single generic description of the current frame. Any failure
    /// replaces the result.
    pub async fn describe(&self, session: &CameraSession) -> SingleResult {
        self.describe_still(session.capture_frame(), session.state())
            .await
    }

    /// Describe a still captured while the session was in `state`, or
    /// report why none was available. Publishes `DescriptionReady`.
    pub async fn describe_still(
        &self,
        frame: Option<CapturedFrame>,
        state: SessionState,
    ) -> SingleResult {
        let result = match frame {
            Some(frame) => self.describe_frame(&frame).await,
            None => SingleResult::Failed(format!("No frame available while camera is {}", state)),
        };

        self.event_bus
            .emit(CamsightEvent::DescriptionReady {
                outcome: result.clone().into(),
            })
            .await;
        result
    }

    pub async fn describe_frame(&self, frame: &CapturedFrame) -> SingleResult {
        debug!("Describing still {}", frame.id);
        match self.service.analyze(frame, DESCRIBE_PROMPT).await {
            Ok(text) => SingleResult::Described(text),
            Err(e) => {
                warn!("Description failed: {}", e);
                SingleResult::Failed(e.to_string())
            }
        }
    }

    /// Snapshot of results aggregated across batches
    pub fn results(&self) -> Vec<BoardEntry> {
        self.board.lock().entries().to_vec()
    }

    pub fn clear_results(&self) {
        self.board.lock().clear();
    }

    async fn check_selection(&self, categories: &[String]) -> Result<()> {
        if !categories.is_empty() {
            return Ok(());
        }

        let error = CamsightError::validation("Select at least one analysis category");
        self.event_bus
            .emit(CamsightEvent::BatchFailed {
                message: error.to_string(),
            })
            .await;
        Err(error)
    }

    async fn run_request(&self, batch_id: &str, mut request: AnalysisRequest) -> AnalysisRequest {
        if !is_known_category(&request.category) {
            warn!(
                "No prompt for category {:?}; using the generic prompt",
                request.category
            );
        }

        request.mark_in_flight();
        let requested_at = Instant::now();
        self.board
            .lock()
            .add_pending(&request.category, requested_at);
        self.event_bus
            .emit(CamsightEvent::AnalysisStarted {
                batch_id: batch_id.to_string(),
                category: request.category.clone(),
            })
            .await;

        let outcome = AnalysisOutcome::from(
            self.service
                .analyze(&request.frame, request.prompt)
                .await,
        );

        match &outcome {
            AnalysisOutcome::Text(_) => debug!("{} succeeded", request.category),
            AnalysisOutcome::Error(message) => warn!("{} failed: {}", request.category, message),
        }

        self.board
            .lock()
            .record(&request.category, outcome.clone(), requested_at);
        self.event_bus
            .emit(CamsightEvent::AnalysisResult {
                batch_id: batch_id.to_string(),
                category: request.category.clone(),
                outcome: outcome.clone(),
            })
            .await;

        request.settle(outcome);
        self.event_bus
            .emit(CamsightEvent::AnalysisFinished {
                batch_id: batch_id.to_string(),
                category: request.category.clone(),
            })
            .await;

        request
    }
}
