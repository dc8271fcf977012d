//! # Error Types
//!
//! Validation errors for talad-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  talad-core (this file)                                                │
//! │  ├── ValidationError   - One field-level failure                       │
//! │  └── ValidationErrors  - Every failure found in one draft              │
//! │                                                                         │
//! │  talad-db                                                              │
//! │  └── DbError           - Database operation failures                   │
//! │                                                                         │
//! │  talad-engine                                                          │
//! │  └── EngineError       - NotFound / PromotionInvalid / UsageLimit...   │
//! │                                                                         │
//! │  Flow: ValidationErrors → EngineError → Envelope (localized message)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The calculator never errors: an unmet condition is a zero discount.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// A single field-level validation failure.
///
/// Field names are the wire names (`discountValue`, `startDate`, ...) so a
/// form can highlight the offending input directly.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., unparseable date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A numeric field arrived as something that is not a number.
    #[error("{field} is not a valid number: '{value}'")]
    InvalidNumber { field: String, value: String },

    /// Start date is not strictly before end date.
    #[error("startDate must be before endDate")]
    InvalidDateRange,

    /// Collection has fewer entries than required.
    #[error("{field} needs at least {min} distinct entries")]
    TooFew { field: String, min: usize },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Returns the wire name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::InvalidNumber { field, .. }
            | ValidationError::TooFew { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
            ValidationError::InvalidDateRange => "endDate",
        }
    }

    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn positive(field: &str) -> Self {
        ValidationError::MustBePositive {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Validation Errors (collected)
// =============================================================================

/// Every validation failure found in one draft.
///
/// Writes are rejected with the full list rather than the first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors(Vec::new())
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// True when any failure points at `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field() == field)
    }

    /// `Ok(value)` when nothing was collected, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        ValidationErrors(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("name");
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::InvalidNumber {
            field: "discountValue".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "discountValue is not a valid number: 'abc'");
    }

    #[test]
    fn test_collected_errors_join_messages() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::required("name"));
        errors.push(ValidationError::InvalidDateRange);

        assert_eq!(errors.len(), 2);
        assert!(errors.has_field("endDate"));
        assert_eq!(
            errors.to_string(),
            "name is required; startDate must be before endDate"
        );
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::new().into_result(5), Ok(5));
        let errors: ValidationErrors = ValidationError::positive("bundlePrice").into();
        assert!(errors.into_result(()).is_err());
    }
}
