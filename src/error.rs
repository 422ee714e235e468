use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures raised while observing the platform.
///
/// None of these cross a component boundary as a fault: the prober, the
/// inspector and the collectors fold them into typed results. They exist so
/// that the detail strings carried by those results are uniform.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The service could not be reached at all
    #[error("{service} unreachable: {message}")]
    Connectivity { service: String, message: String },

    /// The service answered, but not with a success status
    #[error("{service} answered HTTP {status}")]
    Protocol { service: String, status: u16 },

    /// An administrative or document command against the store failed
    #[error("store command failed: {0}")]
    StoreCommand(String),

    /// The sentinel document never became visible on the read path
    #[error("sentinel not observed after {attempts} attempts")]
    ReplicationUnconfirmed { attempts: u32 },

    /// The metrics registry rejected an instrument
    #[error("instrumentation failure: {0}")]
    Instrumentation(#[from] prometheus::Error),
}

impl MonitorError {
    pub fn connectivity(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Connectivity {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn store(message: impl ToString) -> Self {
        Self::StoreCommand(message.to_string())
    }
}

impl From<mongodb::error::Error> for MonitorError {
    fn from(e: mongodb::error::Error) -> Self {
        Self::StoreCommand(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Store unreachable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_UNAVAILABLE",
                    msg.clone(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<MonitorError> for AppError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::StoreCommand(msg) => AppError::StoreUnavailable(msg),
            other => AppError::Internal(other.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
