//! Unified error handling for the payroll core
//!
//! Every failure that reaches the HTTP boundary is rendered as an
//! `application/problem+json` document. Internal details are logged and
//! never sent to the client.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// The operation had nothing to act on (for example no open pay cycle).
    #[error("Not applicable: {0}")]
    NotApplicable(String),

    /// `Mediator::send` found no handler for the request type.
    #[error("No handler registered for {0}")]
    NoHandler(&'static str),

    /// A handler produced a response of an unexpected type.
    #[error("Handler for {0} returned a mismatched response type")]
    HandlerTypeMismatch(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Machine readable kind, used as the problem `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unprocessable(_) => "unprocessable",
            AppError::NotApplicable(_) => "not_applicable",
            AppError::NoHandler(_) => "no_handler",
            AppError::HandlerTypeMismatch(_) => "handler_type_mismatch",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) | AppError::NotApplicable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NoHandler(_)
            | AppError::HandlerTypeMismatch(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the client-facing problem document, logging anything that
    /// must not leave the process.
    pub fn to_problem(&self) -> Problem {
        let status = self.status();
        let detail = match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Unprocessable(msg)
            | AppError::NotApplicable(msg) => Some(msg.clone()),
            AppError::Validation(_) => Some("Request validation failed".to_string()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                None
            }
            AppError::NoHandler(_) | AppError::HandlerTypeMismatch(_) => {
                tracing::error!(error = %self, "Dispatch failure");
                None
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                None
            }
        };

        let extra = match self {
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };

        Problem {
            kind: self.kind().to_string(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail,
            instance: None,
            extra,
        }
    }
}

/// Problem details body (`application/problem+json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Problem {
    /// Problem for a bare status code, used when normalizing framework rejections.
    pub fn from_status(status: StatusCode) -> Self {
        let (kind, detail) = match status {
            StatusCode::BAD_REQUEST => ("bad_request", "Invalid request body"),
            StatusCode::UNAUTHORIZED => ("unauthorized", "Authentication required"),
            StatusCode::FORBIDDEN => ("forbidden", "Access denied"),
            StatusCode::NOT_FOUND => ("not_found", "Not found"),
            StatusCode::METHOD_NOT_ALLOWED => ("method_not_allowed", "Method not allowed"),
            StatusCode::CONFLICT => ("conflict", "Resource conflict"),
            StatusCode::UNPROCESSABLE_ENTITY => ("bad_request", "Invalid request body"),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                ("bad_request", "Unsupported content type")
            }
            StatusCode::REQUEST_TIMEOUT => ("timeout", "Request timed out"),
            _ if status.is_client_error() => ("bad_request", "Client error"),
            _ => ("internal_error", "An internal error occurred"),
        };

        Self {
            kind: kind.to_string(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: Some(detail.to_string()),
            instance: None,
            extra: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let extension = self.clone();
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        // The normalization middleware reads this back to stamp `instance`.
        response.extensions_mut().insert(extension);
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_problem().into_response()
    }
}
