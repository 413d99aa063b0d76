use super::{AppCommand, CamsightApp};
use crate::analysis::{AnalysisDispatcher, BatchReport, SingleResult};
use crate::camera::SessionState;
use crate::error::{CamsightError, Result};
use crate::events::CamsightEvent;
use crate::recovery::RetryPolicy;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

impl CamsightApp {
    /// Apply one user command. Returns false when the app should quit.
    ///
    /// Command failures are already surfaced as events, so they are logged
    /// here and never end the loop.
    pub async fn handle_command(&mut self, command: AppCommand) -> bool {
        debug!("Handling command {:?}", command);

        let result = match command {
            AppCommand::Quit => return false,
            AppCommand::ToggleCategory(index) => {
                match self.selection.toggle_index(index) {
                    Some(selected) => info!(
                        "{} {}",
                        if selected { "Selected" } else { "Deselected" },
                        self.selection.categories()[index]
                    ),
                    None => debug!("No category at position {}", index),
                }
                Ok(())
            }
            AppCommand::SelectAll => {
                self.selection.select_all();
                Ok(())
            }
            AppCommand::ClearSelection => {
                self.selection.clear();
                Ok(())
            }
            AppCommand::Acquire => self.acquire().await,
            AppCommand::CaptureAndAnalyze => self.start_analysis().await,
            AppCommand::Describe => self.start_describe().await,
            AppCommand::TogglePause => match self.session.state() {
                SessionState::Paused => self.session.resume().await,
                _ => self.session.pause().await,
            },
            AppCommand::SwitchFacing => self.session.switch_facing().await,
            AppCommand::Restart => self.session.restart().await,
            AppCommand::Stop => {
                self.session.stop().await;
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Command {:?} failed: {}", command, e);
        }
        true
    }

    /// Acquire the camera, waiting for the capture surface if needed
    pub async fn acquire(&mut self) -> Result<()> {
        let policy = RetryPolicy::surface_mount(&self.config.camera);
        let outcome = self
            .session
            .acquire_with_retry(&policy, &self.cancellation_token)
            .await?;
        debug!("Acquisition finished: {:?}", outcome);
        Ok(())
    }

    /// Capture now and analyze the selected categories in the background.
    ///
    /// Validation and capture happen before this returns. Results arrive
    /// as events while the caller keeps handling commands and track loss.
    pub async fn start_analysis(&mut self) -> Result<()> {
        let dispatcher = self.require_dispatcher().await?;
        let categories = self.selection.selected();
        let frame = dispatcher.capture_for(&self.session, &categories).await?;

        self.track_batch(tokio::spawn(async move {
            if let Err(e) = dispatcher.analyze_frame(frame, &categories).await {
                warn!("Analysis batch failed: {}", e);
            }
        }));
        Ok(())
    }

    /// Capture now and describe the still in the background
    pub async fn start_describe(&mut self) -> Result<()> {
        let dispatcher = self.require_dispatcher().await?;
        let frame = self.session.capture_frame();
        let state = self.session.state();

        self.track_batch(tokio::spawn(async move {
            dispatcher.describe_still(frame, state).await;
        }));
        Ok(())
    }

    /// Capture and analyze the currently selected categories
    pub async fn analyze_selected(&self) -> Result<BatchReport> {
        self.analyze(&self.selection.selected()).await
    }

    /// Capture and analyze the given categories
    pub async fn analyze(&self, categories: &[String]) -> Result<BatchReport> {
        let dispatcher = self.require_dispatcher().await?;
        dispatcher.dispatch(&self.session, categories).await
    }

    pub async fn describe(&self) -> Result<SingleResult> {
        let dispatcher = self.require_dispatcher().await?;
        Ok(dispatcher.describe(&self.session).await)
    }

    fn track_batch(&mut self, batch: JoinHandle<()>) {
        self.batches.retain(|running| !running.is_finished());
        self.batches.push(batch);
        debug!("{} analysis batch(es) in flight", self.batches.len());
    }

    async fn require_dispatcher(&self) -> Result<Arc<AnalysisDispatcher>> {
        match &self.dispatcher {
            Some(dispatcher) => Ok(Arc::clone(dispatcher)),
            None => Err(self.report_analysis_unavailable().await),
        }
    }

    async fn report_analysis_unavailable(&self) -> CamsightError {
        let message = self
            .analysis_unavailable
            .clone()
            .unwrap_or_else(|| "Analysis service is not configured".to_string());
        self.event_bus
            .emit(CamsightEvent::BatchFailed {
                message: message.clone(),
            })
            .await;
        CamsightError::component("analysis", message)
    }
}
