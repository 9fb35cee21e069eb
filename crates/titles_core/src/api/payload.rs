//! Request payload decoding for title writes.
//!
//! # Responsibility
//! - Decode JSON request bodies for create/update.
//! - Report undecodable bodies and invalid fields as distinct failures.

use crate::api::error::{ApiFailure, FieldError};
use crate::model::title::{normalize_description, TitleValidationError, DESCRIPTION_FIELD};
use serde::{Deserialize, Serialize};

/// JSON body accepted by create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePayload {
    #[serde(default)]
    pub description: Option<String>,
}

impl TitlePayload {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    /// Validates field constraints and returns the normalized description.
    pub fn validate(&self) -> Result<String, ApiFailure> {
        let Some(description) = self.description.as_deref() else {
            let missing = TitleValidationError::BlankDescription;
            return Err(ApiFailure::Validation(vec![FieldError::new(
                DESCRIPTION_FIELD,
                missing.reason(),
            )]));
        };

        normalize_description(description)
            .map_err(|err| ApiFailure::Validation(vec![FieldError::from(&err)]))
    }
}

/// Decodes and validates a create/update body.
///
/// # Errors
/// - `MalformedPayload` when `body` is not a JSON object of the right shape.
/// - `Validation` when `description` is missing, blank or too long.
pub fn parse_title_payload(body: &str) -> Result<String, ApiFailure> {
    let payload: TitlePayload = serde_json::from_str(body)?;
    payload.validate()
}
