use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const CONFIGURATION_ERROR: &str = "Configuration Error";
pub const DUNE_API_KEY_REQUIRED: &str = "Please add DUNE_API_KEY_TOKEN to your environment variables";
pub const FETCH_METRICS_ERROR: &str = "Failed to fetch metrics data";
pub const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("DUNE_API_KEY_TOKEN environment variable is not configured")]
    MissingApiKey,
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigurationErrorResponse {
    error: &'static str,
    message: String,
    configuration_required: bool,
    instructions: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingApiKey => {
                let body = Json(ConfigurationErrorResponse {
                    error: CONFIGURATION_ERROR,
                    message: self.to_string(),
                    configuration_required: true,
                    instructions: DUNE_API_KEY_REQUIRED,
                });
                (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
            }
            ApiError::Internal(message) => {
                let message = if message.is_empty() {
                    UNKNOWN_ERROR.to_string()
                } else {
                    message
                };
                let body = Json(ErrorResponse {
                    error: FETCH_METRICS_ERROR,
                    message,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
