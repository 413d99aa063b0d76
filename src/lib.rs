pub mod analysis;
pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod keyboard_input;
pub mod recovery;

pub use analysis::{
    AnalysisDispatcher, AnalysisOutcome, AnalysisRequest, AnalysisService, BatchReport,
    CategorySelection, GenerativeClient, RequestStatus, ResultBoard, SingleResult,
};
pub use app::{AppCommand, CamsightApp, ShutdownReason};
pub use camera::{
    CameraSession, CameraSessionBuilder, CaptureSurface, FacingMode, MediaDevices, MediaStream,
    SessionState, SurfaceSlot, SyntheticDevices,
};
pub use config::CamsightConfig;
pub use error::{AnalysisError, CameraError, CamsightError, Result};
pub use events::{CamsightEvent, EventBus, EventFilter, EventReceiver};
pub use frame::{CapturedFrame, FrameFormat, RawFrame};
pub use recovery::{RecoveryAction, RetryPolicy};
