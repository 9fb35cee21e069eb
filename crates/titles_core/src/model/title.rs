//! Title domain model.
//!
//! # Responsibility
//! - Define the persisted `Title` record and its transport DTO.
//! - Own description normalization and validation rules.
//!
//! # Invariants
//! - `id` is assigned by the store exactly once and never reused.
//! - `description` is always trimmed, holds 1..=150 characters and carries
//!   no control characters, so the store's CHECK length agrees with ours.
//! - Uniqueness is decided on `description_key`, never on raw text.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned identity of a title.
pub type TitleId = i64;

/// Maximum description length, counted in characters after trimming.
pub const MAX_DESCRIPTION_CHARS: usize = 150;

/// Field name reported by description validation failures.
pub const DESCRIPTION_FIELD: &str = "description";

/// Validation error for title descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleValidationError {
    /// Description is empty after trimming.
    BlankDescription,
    /// Description exceeds `MAX_DESCRIPTION_CHARS` after trimming.
    DescriptionTooLong { chars: usize },
    /// Description contains a control character such as NUL.
    ControlCharacter,
}

impl TitleValidationError {
    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        DESCRIPTION_FIELD
    }

    /// Field-level message without the field prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::BlankDescription => "must not be blank".to_string(),
            Self::DescriptionTooLong { chars } => format!(
                "must be between 1 and {MAX_DESCRIPTION_CHARS} characters (got {chars})"
            ),
            Self::ControlCharacter => "must not contain control characters".to_string(),
        }
    }
}

impl Display for TitleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field(), self.reason())
    }
}

impl Error for TitleValidationError {}

/// Canonical persisted title record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub id: TitleId,
    /// Trimmed, validated label text.
    pub description: String,
}

impl Title {
    /// Builds a title from persisted values, re-validating the description.
    pub fn new(
        id: TitleId,
        description: impl Into<String>,
    ) -> Result<Self, TitleValidationError> {
        let description = normalize_description(&description.into())?;
        Ok(Self { id, description })
    }

    /// Case-insensitive key used for duplicate detection.
    pub fn description_key(&self) -> String {
        description_key(&self.description)
    }

    /// Whether `candidate` names this title under case-insensitive comparison.
    pub fn same_description(&self, candidate: &str) -> bool {
        self.description_key() == description_key(candidate)
    }
}

/// Public representation returned by service operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleDto {
    pub id: TitleId,
    pub description: String,
}

impl From<Title> for TitleDto {
    fn from(value: Title) -> Self {
        Self {
            id: value.id,
            description: value.description,
        }
    }
}

impl From<&Title> for TitleDto {
    fn from(value: &Title) -> Self {
        Self {
            id: value.id,
            description: value.description.clone(),
        }
    }
}

/// Trims and validates raw description input.
///
/// # Errors
/// - `BlankDescription` when nothing remains after trimming.
/// - `DescriptionTooLong` when more than `MAX_DESCRIPTION_CHARS` remain.
/// - `ControlCharacter` when any control character remains; SQLite's
///   `length()` stops at NUL and would disagree with the count here.
pub fn normalize_description(raw: &str) -> Result<String, TitleValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TitleValidationError::BlankDescription);
    }
    if trimmed.chars().any(char::is_control) {
        return Err(TitleValidationError::ControlCharacter);
    }

    let chars = trimmed.chars().count();
    if chars > MAX_DESCRIPTION_CHARS {
        return Err(TitleValidationError::DescriptionTooLong { chars });
    }

    Ok(trimmed.to_string())
}

/// Derives the uniqueness key: trimmed and Unicode-lowercased.
pub fn description_key(description: &str) -> String {
    description.trim().to_lowercase()
}
