use super::console::ConsoleSurface;
use super::types::ShutdownReason;
use crate::analysis::{AnalysisDispatcher, CategorySelection};
use crate::camera::{open_backend, CameraSession, MediaDevices, SurfaceSlot};
use crate::config::CamsightConfig;
use crate::error::{CamsightError, Result};
use crate::events::EventBus;
use crate::keyboard_input::KeyboardInputHandler;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main application coordinator: one camera session, one dispatcher and
/// the user's category selection
pub struct CamsightApp {
    pub(super) config: CamsightConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) session: CameraSession,
    pub(super) surface: SurfaceSlot,
    pub(super) dispatcher: Option<Arc<AnalysisDispatcher>>,
    /// Why analysis is unavailable when `dispatcher` is `None`
    pub(super) analysis_unavailable: Option<String>,
    pub(super) selection: CategorySelection,
    /// Analysis batches running in the background
    pub(super) batches: Vec<JoinHandle<()>>,

    pub(super) keyboard_handler: Option<KeyboardInputHandler>,

    // Lifecycle management
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl CamsightApp {
    /// Create the app with the configured camera backend and analysis client.
    ///
    /// A missing analysis credential does not prevent the camera from
    /// running; analysis commands report the configuration error instead.
    pub fn new(config: CamsightConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));

        let (dispatcher, analysis_unavailable) =
            match AnalysisDispatcher::from_config(&config.analysis, Arc::clone(&event_bus)) {
                Ok(dispatcher) => (Some(dispatcher), None),
                Err(e @ CamsightError::Config(_)) => {
                    warn!("Analysis disabled: {}", e);
                    (None, Some(e.to_string()))
                }
                Err(e) => return Err(e),
            };

        let devices = open_backend(&config.camera)?;
        Ok(Self::with_parts(config, event_bus, devices, dispatcher, analysis_unavailable))
    }

    /// Assemble the app from explicit parts
    pub fn with_parts(
        config: CamsightConfig,
        event_bus: Arc<EventBus>,
        devices: Arc<dyn MediaDevices>,
        dispatcher: Option<AnalysisDispatcher>,
        analysis_unavailable: Option<String>,
    ) -> Self {
        let surface = SurfaceSlot::new();
        let session = CameraSession::new(
            config.camera.clone(),
            devices,
            surface.clone(),
            Arc::clone(&event_bus),
        );
        let selection = CategorySelection::new(config.analysis.categories.clone());
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Self {
            config,
            event_bus,
            session,
            surface,
            dispatcher: dispatcher.map(Arc::new),
            analysis_unavailable,
            selection,
            batches: Vec::new(),
            keyboard_handler: None,
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Mount the console capture surface
    pub fn mount_console_surface(&self) {
        if !self.surface.is_mounted() {
            info!("Mounting console capture surface");
            self.surface.mount(Arc::new(ConsoleSurface::new()));
        }
    }

    pub fn session(&self) -> &CameraSession {
        &self.session
    }

    pub fn selection(&self) -> &CategorySelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut CategorySelection {
        &mut self.selection
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn dispatcher(&self) -> Option<&AnalysisDispatcher> {
        self.dispatcher.as_deref()
    }

    /// Background analysis batches that have not settled yet
    pub fn in_flight_batches(&self) -> usize {
        self.batches.iter().filter(|batch| !batch.is_finished()).count()
    }

    pub fn config(&self) -> &CamsightConfig {
        &self.config
    }

    /// Token cancelled when the app shuts down
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
