use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamsightError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl CamsightError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the camera session and its device backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera capture is not supported in this environment")]
    Unsupported,

    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("No camera satisfies the requested constraints: {details}")]
    ConstraintUnsatisfiable { details: String },

    #[error("Failed to open camera device: {details}")]
    DeviceOpen { details: String },

    #[error("Camera disconnected")]
    DeviceLost,

    #[error("Capture surface is not mounted")]
    SurfaceUnavailable,

    #[error("Stream failed to start: {details}")]
    StartFailed { details: String },

    #[error("Failed to pause stream: {details}")]
    PauseFailed { details: String },

    #[error("Failed to resume stream: {details}")]
    ResumeFailed { details: String },

    #[error("Failed to render frame: {details}")]
    Render { details: String },

    #[error("Device enumeration failed: {details}")]
    Enumeration { details: String },

    #[error("Cannot {operation} while session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Backend configuration error: {details}")]
    Configuration { details: String },
}

impl CameraError {
    /// Only a missing surface is transient; everything else needs a fresh
    /// acquisition attempt from the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::SurfaceUnavailable)
    }
}

/// Errors returned by the external analysis service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Authentication failed: {details}")]
    Authentication { details: String },

    #[error("Quota exceeded: {details}")]
    Quota { details: String },

    #[error("Network error: {details}")]
    Network { details: String },

    #[error("Malformed input: {details}")]
    MalformedInput { details: String },

    #[error("Service error (status {status}): {details}")]
    Service { status: u16, details: String },

    #[error("Malformed response: {details}")]
    MalformedResponse { details: String },
}

impl AnalysisError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalysisError::Network { .. } | AnalysisError::Quota { .. }
        ) || matches!(self, AnalysisError::Service { status, .. } if *status >= 500)
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, CamsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_recoverability() {
        assert!(CameraError::SurfaceUnavailable.is_recoverable());
        assert!(!CameraError::Unsupported.is_recoverable());
        assert!(!CameraError::DeviceLost.is_recoverable());
        assert!(!CameraError::PermissionDenied {
            details: "denied".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_analysis_error_transience() {
        assert!(AnalysisError::Network {
            details: "reset".to_string()
        }
        .is_transient());
        assert!(AnalysisError::Service {
            status: 503,
            details: "unavailable".to_string()
        }
        .is_transient());
        assert!(!AnalysisError::Service {
            status: 400,
            details: "bad".to_string()
        }
        .is_transient());
        assert!(!AnalysisError::Authentication {
            details: "bad key".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err: CamsightError = CameraError::DeviceLost.into();
        assert_eq!(err.to_string(), "Camera error: Camera disconnected");

        let err = CamsightError::validation("Select at least one category");
        assert!(err.to_string().contains("Select at least one category"));
    }
}
