use super::device::{CaptureSurface, MediaDevices, MediaStream, SurfaceSlot};
use super::types::{DeviceDescriptor, FacingMode, SessionState, StreamConstraints, StreamSettings};
use crate::config::CameraConfig;
use crate::error::{CameraError, CamsightError, Result};
use crate::events::{CamsightEvent, EventBus};
use crate::frame::CapturedFrame;
use crate::recovery::{RecoveryAction, RetryPolicy};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of an acquisition that waited for the capture surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Stream acquired (or already held) after this many attempts
    Acquired { attempts: u32 },
    /// Surface never mounted; nothing was acquired
    Abandoned { attempts: u32 },
    /// Caller cancelled the wait
    Cancelled { attempts: u32 },
}

/// Owns the lifecycle of one capture stream.
///
/// Every transition releases the current stream before acquiring another,
/// so at most one device handle is open at a time.
pub struct CameraSession {
    config: CameraConfig,
    devices: Arc<dyn MediaDevices>,
    surface: SurfaceSlot,
    event_bus: Arc<EventBus>,
    stream: Option<Box<dyn MediaStream>>,
    bound_surface: Option<Arc<dyn CaptureSurface>>,
    ended: Option<CancellationToken>,
    facing: FacingMode,
    state: SessionState,
    last_error: Option<String>,
    available_devices: Vec<DeviceDescriptor>,
}

impl CameraSession {
    pub fn new(
        config: CameraConfig,
        devices: Arc<dyn MediaDevices>,
        surface: SurfaceSlot,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let facing = config.facing;
        Self {
            config,
            devices,
            surface,
            event_bus,
            stream: None,
            bound_surface: None,
            ended: None,
            facing,
            state: SessionState::Idle,
            last_error: None,
            available_devices: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.facing
    }

    pub fn available_devices(&self) -> &[DeviceDescriptor] {
        &self.available_devices
    }

    /// Message of the last session-level error, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_settings(&self) -> Option<&StreamSettings> {
        self.stream.as_ref().map(|s| s.settings())
    }

    pub fn surface(&self) -> &SurfaceSlot {
        &self.surface
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Token that fires if the current track ends externally. The caller
    /// awaits it and then calls [`CameraSession::handle_track_ended`].
    pub fn track_ended_signal(&self) -> Option<CancellationToken> {
        self.ended.clone()
    }

    /// Acquire a stream for the current facing mode.
    ///
    /// No-op while initializing or when a stream is already held. Fails with
    /// [`CameraError::SurfaceUnavailable`] if no surface is mounted; that
    /// error leaves the session untouched.
    pub async fn acquire(&mut self) -> Result<()> {
        self.observe_track_end().await;

        if self.state == SessionState::Initializing || self.stream.is_some() {
            debug!("Camera acquisition skipped: stream already held or pending");
            return Ok(());
        }

        let surface = self.surface.get().ok_or(CameraError::SurfaceUnavailable)?;

        self.release_stream();
        self.set_state(SessionState::Initializing).await;

        if !self.devices.is_supported() {
            return Err(self.fail(CameraError::Unsupported).await);
        }

        let constraints = StreamConstraints {
            facing: self.facing,
            ideal_width: self.config.ideal_resolution.0,
            ideal_height: self.config.ideal_resolution.1,
        };

        info!(
            "Acquiring {} camera ({}x{} ideal)",
            constraints.facing, constraints.ideal_width, constraints.ideal_height
        );

        let stream = match self.devices.open(&constraints).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e).await),
        };

        surface.attach(stream.settings());
        self.ended = Some(stream.track_ended());
        self.bound_surface = Some(surface);
        self.stream = Some(stream);

        let started = match self.stream.as_mut() {
            Some(stream) => stream.start().await,
            None => Err(CameraError::StartFailed {
                details: "stream released during start".to_string(),
            }),
        };
        if let Err(e) = started {
            return Err(self.fail(e).await);
        }

        if let Some(settings) = self.stream_settings() {
            info!(
                "Camera stream {} ready on {} ({}x{})",
                settings.stream_id, settings.device_id, settings.width, settings.height
            );
        }

        self.last_error = None;
        self.set_state(SessionState::Ready).await;

        if let Err(e) = self.refresh_devices().await {
            warn!("Device refresh after acquisition failed: {}", e);
        }

        Ok(())
    }

    /// Acquire, retrying while the capture surface is not yet mounted.
    ///
    /// Exhausting the policy is logged and reported as
    /// [`AcquireOutcome::Abandoned`]; the session stays idle.
    pub async fn acquire_with_retry(
        &mut self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<AcquireOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.acquire().await {
                Ok(()) => return Ok(AcquireOutcome::Acquired { attempts: attempt }),
                Err(CamsightError::Camera(e)) if e.is_recoverable() => {
                    match policy.after_failure(attempt) {
                        RecoveryAction::RetryAfterDelay(delay) => {
                            debug!(
                                "Capture surface not mounted (attempt {}/{}), retrying in {:?}",
                                attempt, policy.max_attempts, delay
                            );
                            if !policy.backoff(cancel).await {
                                return Ok(AcquireOutcome::Cancelled { attempts: attempt });
                            }
                        }
                        RecoveryAction::GiveUp => {
                            warn!(
                                "Capture surface not mounted after {} attempts; camera stays off",
                                attempt
                            );
                            return Ok(AcquireOutcome::Abandoned { attempts: attempt });
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Release the stream and return to idle. Safe from any state.
    pub async fn stop(&mut self) {
        self.release_stream();
        if self.state != SessionState::Idle {
            info!("Camera session stopped");
            self.last_error = None;
            self.set_state(SessionState::Idle).await;
        }
    }

    /// Stop, wait for the device to release, then acquire again
    pub async fn restart(&mut self) -> Result<()> {
        self.stop().await;
        sleep(Duration::from_millis(self.config.restart_delay_ms)).await;
        self.acquire().await
    }

    /// Toggle between front and rear cameras and re-acquire
    pub async fn switch_facing(&mut self) -> Result<()> {
        if self.available_devices.is_empty() {
            if let Err(e) = self.refresh_devices().await {
                warn!("Device refresh before switch failed: {}", e);
            }
        }

        self.facing = self.facing.toggled();
        info!("Switching to {} camera", self.facing);

        self.restart().await
    }

    /// Halt frame delivery without releasing the stream
    pub async fn pause(&mut self) -> Result<()> {
        self.observe_track_end().await;

        if self.state != SessionState::Ready {
            return Err(CameraError::InvalidTransition {
                operation: "pause",
                state: self.state.as_str(),
            }
            .into());
        }

        if let Some(stream) = self.stream.as_mut() {
            stream.pause()?;
        }

        debug!("Camera stream paused");
        self.set_state(SessionState::Paused).await;
        Ok(())
    }

    /// Resume frame delivery. A failed resume is reported but keeps the
    /// stream open and the session paused.
    pub async fn resume(&mut self) -> Result<()> {
        self.observe_track_end().await;

        if self.state != SessionState::Paused {
            return Err(CameraError::InvalidTransition {
                operation: "resume",
                state: self.state.as_str(),
            }
            .into());
        }

        let resumed = match self.stream.as_mut() {
            Some(stream) => stream.resume().await,
            None => Err(CameraError::ResumeFailed {
                details: "no stream is held".to_string(),
            }),
        };

        match resumed {
            Ok(()) => {
                debug!("Camera stream resumed");
                self.last_error = None;
                self.set_state(SessionState::Ready).await;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.last_error = Some(message.clone());
                self.event_bus
                    .emit(CamsightEvent::SessionError {
                        message,
                        timestamp: SystemTime::now(),
                    })
                    .await;
                Err(e.into())
            }
        }
    }

    /// Encode the current frame as a still. Returns `None` unless the
    /// session is ready and a frame renders.
    pub fn capture_frame(&self) -> Option<CapturedFrame> {
        if self.state != SessionState::Ready {
            debug!("Capture ignored: session is {}", self.state);
            return None;
        }

        if self.ended.as_ref().map_or(false, |t| t.is_cancelled()) {
            debug!("Capture ignored: track has ended");
            return None;
        }

        let stream = self.stream.as_ref()?;
        let Some(raw) = stream.latest_frame() else {
            warn!("Capture failed: no frame available from stream");
            return None;
        };

        match raw.encode_jpeg(self.config.jpeg_quality) {
            Ok(still) => {
                debug!(
                    "Captured still {} ({}x{}, {} bytes)",
                    still.id,
                    still.width,
                    still.height,
                    still.len()
                );
                Some(still)
            }
            Err(e) => {
                warn!("Capture failed: {}", e);
                None
            }
        }
    }

    /// Transition to error after the track ended externally.
    /// Returns false if there was no stream to lose.
    pub async fn handle_track_ended(&mut self) -> bool {
        if self.stream.is_none() {
            return false;
        }
        warn!("Camera track ended unexpectedly");
        self.fail(CameraError::DeviceLost).await;
        true
    }

    /// Re-read the device list from the backend
    pub async fn refresh_devices(&mut self) -> Result<&[DeviceDescriptor]> {
        let devices = self.devices.enumerate().await?;
        debug!("Found {} capture device(s)", devices.len());
        self.available_devices = devices;
        self.event_bus
            .emit(CamsightEvent::DevicesRefreshed {
                count: self.available_devices.len(),
            })
            .await;
        Ok(&self.available_devices)
    }

    async fn observe_track_end(&mut self) {
        if self.ended.as_ref().map_or(false, |t| t.is_cancelled()) {
            self.handle_track_ended().await;
        }
    }

    /// Release the stream and enter the error state
    async fn fail(&mut self, error: CameraError) -> CamsightError {
        self.release_stream();

        let message = error.to_string();
        self.last_error = Some(message.clone());
        self.set_state(SessionState::Error).await;
        self.event_bus
            .emit(CamsightEvent::SessionError {
                message,
                timestamp: SystemTime::now(),
            })
            .await;

        error.into()
    }

    fn release_stream(&mut self) {
        self.ended = None;
        if let Some(mut stream) = self.stream.take() {
            debug!("Releasing camera stream {}", stream.settings().stream_id);
            stream.stop();
        }
        if let Some(surface) = self.bound_surface.take() {
            surface.detach();
        }
    }

    async fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!("Camera session {} -> {}", self.state, state);
        self.state = state;
        self.event_bus
            .emit(CamsightEvent::SessionStateChanged {
                state,
                facing: self.facing,
                timestamp: SystemTime::now(),
            })
            .await;
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}
