//! Failure-to-response translation.
//!
//! # Responsibility
//! - Define the closed set of failures that can reach a request boundary.
//! - Map each failure to one uniform `ApiErrorResponse` payload.
//!
//! # Invariants
//! - `translate` never panics and always returns a payload.
//! - Internal failure detail goes to the log only, never into the payload.
//! - The request path is supplied by the caller; there is no ambient
//!   request state.

use crate::logging::sanitize_message;
use crate::model::title::{TitleId, TitleValidationError};
use crate::repo::title_repo::{ConstraintViolation, InvalidSortError, RepoError};
use crate::service::title_service::TitleServiceError;
use chrono::{SecondsFormat, Utc};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const LABEL_CONFLICT: &str = "Conflict";
pub const LABEL_NOT_FOUND: &str = "Not Found";
pub const LABEL_VALIDATION: &str = "Validation Error";
pub const LABEL_BAD_REQUEST: &str = "Bad Request";
pub const LABEL_INTERNAL: &str = "Internal Server Error";

const MSG_VALIDATION_GENERIC: &str = "request validation failed";
const MSG_MALFORMED_PAYLOAD: &str = "malformed request payload";
const MSG_ALREADY_REGISTERED: &str = "this value is already registered";
const MSG_INTEGRITY: &str = "data integrity violation";
const MSG_ENDPOINT_NOT_FOUND: &str = "endpoint not found";
const MSG_INTERNAL: &str = "an unexpected error occurred";

const MAX_LOGGED_PATH_CHARS: usize = 200;
const UNIQUE_NAME_MARKERS: [&str; 3] = ["unique", "uk_", "uniq"];

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Uniform error payload returned for every failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// RFC 3339 UTC timestamp of the translation.
    pub timestamp: String,
    pub status_code: u16,
    pub error_label: String,
    pub message: String,
    pub request_path: String,
}

/// One invalid input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<&TitleValidationError> for FieldError {
    fn from(value: &TitleValidationError) -> Self {
        Self::new(value.field(), value.reason())
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failure kind a request boundary can hand to `translate`.
#[derive(Debug)]
pub enum ApiFailure {
    /// A title with this description already exists.
    Duplicate { description: String },
    /// No title with this id exists.
    NotFound { id: TitleId },
    /// Field-level input validation failed.
    Validation(Vec<FieldError>),
    /// Request body could not be decoded; the detail is logged only.
    MalformedPayload(String),
    /// A path or query parameter could not be parsed.
    InvalidParameter { name: String },
    /// The store rejected a write on a constraint the service did not
    /// pre-empt.
    Integrity(BoxError),
    /// No route matches the request.
    RouteNotFound,
    /// Anything else.
    Unexpected(BoxError),
}

impl From<TitleServiceError> for ApiFailure {
    fn from(value: TitleServiceError) -> Self {
        match value {
            TitleServiceError::Validation(err) => Self::Validation(vec![FieldError::from(&err)]),
            TitleServiceError::Duplicate { description } => Self::Duplicate { description },
            TitleServiceError::NotFound(id) => Self::NotFound { id },
            TitleServiceError::Repo(err @ RepoError::Constraint(_)) => {
                Self::Integrity(Box::new(err))
            }
            TitleServiceError::Repo(err) => Self::Unexpected(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for ApiFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedPayload(value.to_string())
    }
}

impl From<InvalidSortError> for ApiFailure {
    fn from(_: InvalidSortError) -> Self {
        Self::InvalidParameter {
            name: "sort".to_string(),
        }
    }
}

/// Translates one failure into the uniform payload.
pub fn translate(failure: &ApiFailure, request_path: &str) -> ApiErrorResponse {
    let (status_code, error_label, message) = match failure {
        ApiFailure::Duplicate { description } => {
            warn!("event=api_error module=api status=409 error_code=duplicate");
            (
                409,
                LABEL_CONFLICT,
                format!("title with description '{description}' already exists"),
            )
        }
        ApiFailure::NotFound { id } => {
            warn!("event=api_error module=api status=404 error_code=not_found title_id={id}");
            (404, LABEL_NOT_FOUND, format!("title not found: {id}"))
        }
        ApiFailure::Validation(fields) => {
            warn!(
                "event=api_error module=api status=400 error_code=validation fields={}",
                fields.len()
            );
            (400, LABEL_VALIDATION, validation_message(fields))
        }
        ApiFailure::MalformedPayload(detail) => {
            warn!("event=api_error module=api status=400 error_code=malformed_payload error={detail}");
            (400, LABEL_BAD_REQUEST, MSG_MALFORMED_PAYLOAD.to_string())
        }
        ApiFailure::InvalidParameter { name } => {
            warn!("event=api_error module=api status=400 error_code=invalid_parameter name={name}");
            (400, LABEL_BAD_REQUEST, format!("invalid parameter: {name}"))
        }
        ApiFailure::Integrity(err) => {
            warn!("event=api_error module=api status=409 error_code=integrity error={err}");
            (409, LABEL_CONFLICT, integrity_message(err.as_ref()))
        }
        ApiFailure::RouteNotFound => {
            warn!(
                "event=api_error module=api status=404 error_code=route_not_found path={}",
                loggable_path(request_path)
            );
            (404, LABEL_NOT_FOUND, MSG_ENDPOINT_NOT_FOUND.to_string())
        }
        ApiFailure::Unexpected(err) => {
            error!("event=api_error module=api status=500 error_code=unexpected error={err}");
            (500, LABEL_INTERNAL, MSG_INTERNAL.to_string())
        }
    };

    ApiErrorResponse {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        status_code,
        error_label: error_label.to_string(),
        message,
        request_path: request_path.to_string(),
    }
}

fn loggable_path(request_path: &str) -> String {
    sanitize_message(request_path, MAX_LOGGED_PATH_CHARS)
}

fn validation_message(fields: &[FieldError]) -> String {
    if fields.is_empty() {
        return MSG_VALIDATION_GENERIC.to_string();
    }

    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn integrity_message(err: &(dyn Error + Send + Sync + 'static)) -> String {
    let already_registered = match resolve_constraint_name(err) {
        Some(name) => is_unique_constraint(&name),
        None => err.to_string().to_lowercase().contains("unique"),
    };

    if already_registered {
        MSG_ALREADY_REGISTERED.to_string()
    } else {
        MSG_INTEGRITY.to_string()
    }
}

/// Walks the full cause chain for the first named store constraint.
fn resolve_constraint_name(err: &(dyn Error + 'static)) -> Option<String> {
    let mut current = Some(err);
    while let Some(cause) = current {
        let violation = cause
            .downcast_ref::<ConstraintViolation>()
            .cloned()
            .or_else(|| {
                cause
                    .downcast_ref::<rusqlite::Error>()
                    .and_then(ConstraintViolation::from_sqlite)
            });
        if let Some(name) = violation.and_then(|violation| violation.constraint) {
            return Some(name);
        }
        current = cause.source();
    }
    None
}

fn is_unique_constraint(name: &str) -> bool {
    let normalized = name.to_lowercase();
    UNIQUE_NAME_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
}
