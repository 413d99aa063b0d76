use crate::analysis::AnalysisOutcome;
use crate::camera::{CaptureSurface, StreamSettings};
use crate::error::EventBusError;
use crate::events::{CamsightEvent, EventBus, EventFilter, EventReceiver};
use parking_lot::Mutex;
use std::io::Write;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal stand-in for the preview element
#[derive(Default)]
pub struct ConsoleSurface {
    bound: Mutex<Option<StreamSettings>>,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureSurface for ConsoleSurface {
    fn attach(&self, settings: &StreamSettings) {
        info!(
            "Preview bound to {} ({}x{})",
            settings.device_id, settings.width, settings.height
        );
        *self.bound.lock() = Some(settings.clone());
    }

    fn detach(&self) {
        if let Some(settings) = self.bound.lock().take() {
            debug!("Preview unbound from {}", settings.device_id);
        }
    }
}

/// Prints display-layer events to stdout
pub struct ConsoleDisplay;

impl ConsoleDisplay {
    /// Render events until `cancel` fires or the bus closes
    pub fn spawn(event_bus: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::All,
            "console".to_string(),
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(event) => {
                            if let Some(line) = Self::render(&event) {
                                // Raw mode needs an explicit carriage return
                                let mut stdout = std::io::stdout().lock();
                                let _ = write!(stdout, "{}\r\n", line);
                                let _ = stdout.flush();
                            }
                        }
                        Err(EventBusError::ChannelClosed) => break,
                        Err(e) => warn!("Console display: {}", e),
                    },
                }
            }
            debug!("Console display stopped");
        })
    }

    /// One display line per event; progress-only events render nothing
    pub fn render(event: &CamsightEvent) -> Option<String> {
        match event {
            CamsightEvent::SessionStateChanged { state, facing, .. } => {
                Some(format!("[camera] {} ({} facing)", state, facing))
            }
            CamsightEvent::SessionError { message, .. } => {
                Some(format!("[camera] error: {}", message))
            }
            CamsightEvent::DevicesRefreshed { count } => {
                Some(format!("[camera] {} device(s) available", count))
            }
            CamsightEvent::AnalysisStarted { category, .. } => {
                Some(format!("[{}] analyzing...", category))
            }
            CamsightEvent::AnalysisResult {
                category, outcome, ..
            } => Some(match outcome {
                AnalysisOutcome::Text(text) => format!("[{}] {}", category, text),
                AnalysisOutcome::Error(message) => format!("[{}] failed: {}", category, message),
            }),
            CamsightEvent::BatchFailed { message } => Some(format!("[analysis] {}", message)),
            CamsightEvent::DescriptionReady { outcome } => Some(match outcome {
                AnalysisOutcome::Text(text) => format!("[describe] {}", text),
                AnalysisOutcome::Error(message) => format!("[describe] failed: {}", message),
            }),
            CamsightEvent::AnalysisFinished { .. } | CamsightEvent::ShutdownRequested { .. } => {
                None
            }
        }
    }
}

/// Lines shown when the interactive app starts
pub fn help_lines(categories: &[String]) -> Vec<String> {
    let mut lines = vec![
        "Keys: a acquire, c capture+analyze, d describe, p pause/resume,".to_string(),
        "      s switch camera, r restart, x stop, * select all, 0 clear, q quit".to_string(),
        "Categories:".to_string(),
    ];
    lines.extend(
        categories
            .iter()
            .enumerate()
            .take(9)
            .map(|(i, category)| format!("  {} {}", i + 1, category)),
    );
    lines
}

pub fn print_lines(lines: &[String]) {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        let _ = write!(stdout, "{}\r\n", line);
    }
    let _ = stdout.flush();
}

