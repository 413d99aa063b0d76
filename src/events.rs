use crate::analysis::AnalysisOutcome;
use crate::camera::{FacingMode, SessionState};
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events consumed by the display layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CamsightEvent {
    /// The camera session moved to a new lifecycle state
    SessionStateChanged {
        state: SessionState,
        facing: FacingMode,
        timestamp: SystemTime,
    },
    /// A session-level error the user should see
    SessionError { message: String, timestamp: SystemTime },
    /// The device list was refreshed after acquisition
    DevicesRefreshed { count: usize },
    /// A category request went in flight
    AnalysisStarted { batch_id: String, category: String },
    /// A category request settled
    AnalysisFinished { batch_id: String, category: String },
    /// Result text or error for one category
    AnalysisResult {
        batch_id: String,
        category: String,
        outcome: AnalysisOutcome,
    },
    /// A batch failed before any per-category request was sent
    BatchFailed { message: String },
    /// Result of a single-prompt description
    DescriptionReady { outcome: AnalysisOutcome },
    /// Shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl CamsightEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CamsightEvent::SessionStateChanged { state, facing, .. } => {
                format!("Camera {} ({} facing)", state, facing)
            }
            CamsightEvent::SessionError { message, .. } => format!("Camera error: {}", message),
            CamsightEvent::DevicesRefreshed { count } => format!("{} camera(s) available", count),
            CamsightEvent::AnalysisStarted { category, .. } => {
                format!("Analyzing {}", category)
            }
            CamsightEvent::AnalysisFinished { category, .. } => {
                format!("Finished {}", category)
            }
            CamsightEvent::AnalysisResult {
                category, outcome, ..
            } => match outcome {
                AnalysisOutcome::Text(text) => format!("{}: {}", category, text),
                AnalysisOutcome::Error(message) => format!("{} failed: {}", category, message),
            },
            CamsightEvent::BatchFailed { message } => format!("Analysis failed: {}", message),
            CamsightEvent::DescriptionReady { outcome } => match outcome {
                AnalysisOutcome::Text(text) => format!("Description: {}", text),
                AnalysisOutcome::Error(message) => format!("Description failed: {}", message),
            },
            CamsightEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CamsightEvent::SessionStateChanged { .. } => "session_state_changed",
            CamsightEvent::SessionError { .. } => "session_error",
            CamsightEvent::DevicesRefreshed { .. } => "devices_refreshed",
            CamsightEvent::AnalysisStarted { .. } => "analysis_started",
            CamsightEvent::AnalysisFinished { .. } => "analysis_finished",
            CamsightEvent::AnalysisResult { .. } => "analysis_result",
            CamsightEvent::BatchFailed { .. } => "batch_failed",
            CamsightEvent::DescriptionReady { .. } => "description_ready",
            CamsightEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<CamsightEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CamsightEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: CamsightEvent) -> Result<usize, EventBusError> {
        match &event {
            CamsightEvent::SessionError { message, .. } => {
                error!("Camera session error: {}", message);
            }
            CamsightEvent::BatchFailed { message } => {
                warn!("Analysis batch failed: {}", message);
            }
            CamsightEvent::AnalysisResult {
                category,
                outcome: AnalysisOutcome::Error(message),
                ..
            } => {
                warn!("Analysis for '{}' failed: {}", category, message);
            }
            CamsightEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, treating a bus without subscribers as success
    pub async fn emit(&self, event: CamsightEvent) {
        if let Err(e) = self.publish(event).await {
            debug!("Event not delivered: {}", e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept analysis events belonging to one batch
    Batch(String),
    /// Custom filter function
    Custom(fn(&CamsightEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &CamsightEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Batch(id) => match event {
                CamsightEvent::AnalysisStarted { batch_id, .. }
                | CamsightEvent::AnalysisFinished { batch_id, .. }
                | CamsightEvent::AnalysisResult { batch_id, .. } => batch_id == id,
                _ => false,
            },
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<CamsightEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<CamsightEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<CamsightEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<CamsightEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
