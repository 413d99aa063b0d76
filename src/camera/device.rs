use super::types::{DeviceDescriptor, StreamConstraints, StreamSettings};
use crate::error::CameraError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source of capture streams (the platform camera API)
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether capture is available at all in this environment
    fn is_supported(&self) -> bool;

    /// Request a stream matching the constraints
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError>;

    /// List capture devices. Labels are only populated after permission.
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError>;
}

/// An open capture stream. Dropping or stopping it releases the device.
#[async_trait]
pub trait MediaStream: Send + Sync {
    fn settings(&self) -> &StreamSettings;

    /// Fires when the track ends without the session asking for it
    fn track_ended(&self) -> CancellationToken;

    /// Begin frame delivery; resolves once the stream can play
    async fn start(&mut self) -> Result<(), CameraError>;

    /// Halt frame delivery, keeping the device open
    fn pause(&mut self) -> Result<(), CameraError>;

    async fn resume(&mut self) -> Result<(), CameraError>;

    /// Most recent frame at native dimensions, if one is available
    fn latest_frame(&self) -> Option<RawFrame>;

    /// Release the device. Must be idempotent.
    fn stop(&mut self);
}

/// Display-side element a stream is bound to while it plays
pub trait CaptureSurface: Send + Sync {
    fn attach(&self, settings: &StreamSettings);
    fn detach(&self);
}

/// Shared mount point for the capture surface. The display layer mounts
/// the surface; the session only reads it.
#[derive(Clone, Default)]
pub struct SurfaceSlot {
    inner: Arc<RwLock<Option<Arc<dyn CaptureSurface>>>>,
}

impl SurfaceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot with a surface already mounted
    pub fn mounted(surface: Arc<dyn CaptureSurface>) -> Self {
        let slot = Self::new();
        slot.mount(surface);
        slot
    }

    pub fn mount(&self, surface: Arc<dyn CaptureSurface>) {
        *self.inner.write() = Some(surface);
    }

    pub fn unmount(&self) -> Option<Arc<dyn CaptureSurface>> {
        self.inner.write().take()
    }

    pub fn get(&self) -> Option<Arc<dyn CaptureSurface>> {
        self.inner.read().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl std::fmt::Debug for SurfaceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceSlot")
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
