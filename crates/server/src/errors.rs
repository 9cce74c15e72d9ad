use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::storage::StorageError;
use service::ServiceError;
use tracing::error;

/// JSON error body: `{"error": <title>, "message": <detail>, "code": <service code>}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub title: &'static str,
    pub message: String,
    pub code: Option<u16>,
}

impl ApiError {
    pub fn new(status: StatusCode, title: &'static str, message: impl Into<String>) -> Self {
        Self { status, title, message: message.into(), code: None }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let (status, title) = match &e {
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation Error"),
            ServiceError::ReservedConfig(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Reserved Config"),
            ServiceError::MissingConfig(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ServiceError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::NotAllowed => (StatusCode::FORBIDDEN, "Forbidden"),
            ServiceError::Storage(StorageError::BothTiersFailed { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
            }
            ServiceError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            ServiceError::Payment(_) => (StatusCode::BAD_GATEWAY, "Bad Gateway"),
        };
        Self { status, title, message: e.to_string(), code: Some(e.code()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, code = ?self.code, error = %self.message, "request failed");
        }
        let body = serde_json::json!({"error": self.title, "message": self.message, "code": self.code});
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_outage_maps_to_503_with_settings_message() {
        let err = ServiceError::Storage(StorageError::BothTiersFailed {
            sync: Box::new(StorageError::Unavailable { tier: service::storage::StorageTier::Sync }),
            local: Box::new(StorageError::Unavailable { tier: service::storage::StorageTier::Local }),
        });
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(api.message.starts_with("unable to access settings"));
        assert_eq!(api.code, Some(1100));
    }

    #[test]
    fn invariant_violations_are_client_errors() {
        assert_eq!(ApiError::from(ServiceError::ReservedConfig("default".into())).status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::from(ServiceError::NotAllowed).status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(ServiceError::Conflict("a".into())).status, StatusCode::CONFLICT);
    }
}
