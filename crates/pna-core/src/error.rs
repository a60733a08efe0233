use thiserror::Error;

#[derive(Debug, Error)]
pub enum PnaError {
    #[error("not initialized: run 'pna init'")]
    NotInitialized,

    #[error("unknown operation: {device}.{operation}")]
    UnknownOperation { device: String, operation: String },

    #[error("operation already registered: {device}.{operation}")]
    DuplicateOperation { device: String, operation: String },

    #[error("invalid device class '{0}': expected rig, arm, gripper or screwdriver")]
    InvalidDeviceClass(String),

    #[error("invalid job status '{0}': expected to_do, running, done or failed")]
    InvalidStatus(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("macro recording already in progress")]
    AlreadyRecording,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("actuator error on {device}.{operation}: {message}")]
    ActuatorError {
        device: String,
        operation: String,
        message: String,
    },

    #[error("job not found: {0}")]
    NotFound(u64),

    #[error("invalid macro file: {0}")]
    InvalidMacro(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PnaError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        PnaError::StorageUnavailable(e.to_string())
    }

    pub fn actuator(
        device: impl std::fmt::Display,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PnaError::ActuatorError {
            device: device.to_string(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PnaError>;
