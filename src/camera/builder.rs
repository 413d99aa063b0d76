use super::device::{MediaDevices, SurfaceSlot};
use super::session::CameraSession;
use super::synthetic::SyntheticDevices;
use crate::config::{CameraBackend, CameraConfig};
use crate::error::{CamsightError, Result};
use crate::events::EventBus;
use std::sync::Arc;

/// Builder for a camera session
pub struct CameraSessionBuilder {
    config: Option<CameraConfig>,
    devices: Option<Arc<dyn MediaDevices>>,
    surface: SurfaceSlot,
    event_bus: Option<Arc<EventBus>>,
}

impl CameraSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            devices: None,
            surface: SurfaceSlot::new(),
            event_bus: None,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an explicit device backend instead of the configured one
    pub fn devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn surface(mut self, surface: SurfaceSlot) -> Self {
        self.surface = surface;
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<CameraSession> {
        let config = self
            .config
            .ok_or_else(|| CamsightError::system("Camera configuration must be specified"))?;

        let devices = match self.devices {
            Some(devices) => devices,
            None => open_backend(&config)?,
        };

        let event_bus = self.event_bus.unwrap_or_default();

        Ok(CameraSession::new(config, devices, self.surface, event_bus))
    }
}

impl Default for CameraSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantiate the device backend named in the configuration
pub fn open_backend(config: &CameraConfig) -> Result<Arc<dyn MediaDevices>> {
    match config.backend {
        CameraBackend::Synthetic => Ok(Arc::new(SyntheticDevices::new())),
        #[cfg(all(target_os = "linux", feature = "camera"))]
        CameraBackend::V4l2 => Ok(Arc::new(super::v4l2::V4l2Devices::new(config)?)),
        #[cfg(not(all(target_os = "linux", feature = "camera")))]
        CameraBackend::V4l2 => Err(crate::error::CameraError::Configuration {
            details: "v4l2 backend requires building with the `camera` feature on Linux"
                .to_string(),
        }
        .into()),
    }
}
