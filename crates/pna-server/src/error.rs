use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pna_core::error::PnaError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

/// Carries an explicit 400 through the `anyhow::Error` chain for request
/// problems that have no `PnaError` counterpart.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }
}

fn status_for(e: &PnaError) -> StatusCode {
    match e {
        PnaError::NotFound(_) | PnaError::UnknownOperation { .. } => StatusCode::NOT_FOUND,
        PnaError::AlreadyRecording | PnaError::DuplicateOperation { .. } => StatusCode::CONFLICT,
        PnaError::InvalidGeometry(_) | PnaError::InvalidMacro(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PnaError::InvalidDeviceClass(_) | PnaError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        PnaError::NotInitialized => StatusCode::BAD_REQUEST,
        PnaError::ActuatorError { .. } => StatusCode::BAD_GATEWAY,
        PnaError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PnaError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        PnaError::Io(_) | PnaError::Yaml(_) | PnaError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(b) = self.0.downcast_ref::<BadRequestError>() {
            let body = serde_json::json!({ "error": b.0.clone() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        let status = self
            .0
            .downcast_ref::<PnaError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: PnaError) -> StatusCode {
        AppError(e.into()).into_response().status()
    }

    #[test]
    fn lookups_map_to_404() {
        assert_eq!(status(PnaError::NotFound(3)), StatusCode::NOT_FOUND);
        assert_eq!(
            status(PnaError::UnknownOperation {
                device: "rig".into(),
                operation: "fly".into()
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn already_recording_maps_to_409() {
        assert_eq!(status(PnaError::AlreadyRecording), StatusCode::CONFLICT);
    }

    #[test]
    fn bad_input_maps_to_422_or_400() {
        assert_eq!(
            status(PnaError::InvalidGeometry("pitch".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(PnaError::InvalidMacro("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(PnaError::InvalidDeviceClass("toaster".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn actuator_failure_maps_to_502() {
        assert_eq!(
            status(PnaError::actuator("gripper", "close", "jammed")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn storage_failure_maps_to_503() {
        assert_eq!(
            status(PnaError::StorageUnavailable("locked".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn missing_file_maps_to_404() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(status(PnaError::Io(io)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let response = AppError(anyhow::anyhow!("something unexpected")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let response = AppError::bad_request("path is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
