use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JSON response for API errors.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code, e.g. `not_found`
    pub error: String,
    /// Human-readable explanation
    pub message: String,
}

/// Every error the JSON API can answer with.
///
/// The `Display` form of each variant is its error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("required_parameter_missing")]
    RequiredParameterMissing,
    #[error("either_both_dates_or_none")]
    EitherBothDatesOrNone,
    #[error("end_date_before_start")]
    EndDateBeforeStart,
    #[error("invalid_date")]
    InvalidDate,
    #[error("invalid_request_body")]
    InvalidRequestBody,
    #[error("unauthorized")]
    Unauthorized,
    #[error("unknown_user")]
    UnknownUser,
    #[error("permission_error")]
    PermissionError,
    #[error("not_found")]
    NotFound,
    #[error("already_is_a_participant")]
    AlreadyIsAParticipant,
    #[error("creation_failed")]
    CreationFailed,
    #[error("internal_server_error")]
    InternalServerError,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RequiredParameterMissing
            | ApiError::EitherBothDatesOrNone
            | ApiError::EndDateBeforeStart
            | ApiError::InvalidDate
            | ApiError::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::UnknownUser => StatusCode::UNAUTHORIZED,
            ApiError::PermissionError => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::AlreadyIsAParticipant => StatusCode::CONFLICT,
            ApiError::CreationFailed | ApiError::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::RequiredParameterMissing => "A required parameter is missing",
            ApiError::EitherBothDatesOrNone => "Provide both a start and an end date, or neither",
            ApiError::EndDateBeforeStart => "The end date must not be before the start date",
            ApiError::InvalidDate => "A date could not be parsed",
            ApiError::InvalidRequestBody => "The request body is not valid JSON for this endpoint",
            ApiError::Unauthorized => "Authentication required to access this resource",
            ApiError::UnknownUser => "The authenticated user is not registered",
            ApiError::PermissionError => "You are not allowed to access this resource",
            ApiError::NotFound => "The requested resource was not found",
            ApiError::AlreadyIsAParticipant => "The participant is already assigned to this task",
            ApiError::CreationFailed => "The resource could not be created",
            ApiError::InternalServerError => {
                "An unexpected error occurred while processing your request. Please try again later."
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            message: self.message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
