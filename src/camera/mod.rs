mod builder;
mod device;
mod session;
mod synthetic;
mod types;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod v4l2;

pub use builder::{open_backend, CameraSessionBuilder};
pub use device::{CaptureSurface, MediaDevices, MediaStream, SurfaceSlot};
pub use session::{AcquireOutcome, CameraSession};
pub use synthetic::SyntheticDevices;
pub use types::{DeviceDescriptor, FacingMode, SessionState, StreamConstraints, StreamSettings};
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use v4l2::V4l2Devices;
