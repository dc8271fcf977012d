//! # Engine Error Types
//!
//! The language-neutral error kinds every engine operation returns.
//! Presentation (codes, Thai/English messages) lives in [`crate::envelope`].
//!
//! ## Error Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Validation          bad input; carries every field-level reason       │
//! │  NotFound            promotion / product / stock id does not resolve   │
//! │  PromotionInvalid    exists but disabled, scheduled, expired, or not   │
//! │                      open to the branch                                │
//! │  UsageLimitExceeded  exists and otherwise usable, fully redeemed       │
//! │  Storage             the store failed; never a business outcome        │
//! │  Internal            an export could not be serialized                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Schedule conflicts are warnings and never appear here.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use talad_core::{Availability, ValidationError, ValidationErrors};
use talad_db::DbError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// The kind of record a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Promotion,
    Product,
    StockItem,
}

impl Entity {
    /// Maps the entity names used by the database layer.
    fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "Promotion" => Some(Entity::Promotion),
            "Product" => Some(Entity::Product),
            "StockItem" | "BranchStock" => Some(Entity::StockItem),
            _ => None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Promotion => write!(f, "Promotion"),
            Entity::Product => write!(f, "Product"),
            Entity::StockItem => write!(f, "Stock item"),
        }
    }
}

/// Why an existing promotion cannot be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Disabled,
    Scheduled,
    Expired,
    BranchNotEligible,
    /// Changed by another request while being redeemed.
    Changed,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::Disabled => "disabled",
            InvalidReason::Scheduled => "not started yet",
            InvalidReason::Expired => "expired",
            InvalidReason::BranchNotEligible => "not available at this branch",
            InvalidReason::Changed => "changed while being used",
        };
        f.write_str(text)
    }
}

/// Errors returned by the pricing engine and the admin service.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Promotion {id} cannot be used: {reason}")]
    PromotionInvalid { id: String, reason: InvalidReason },

    /// The usage limit is reached. Kept apart from `PromotionInvalid` so a
    /// UI can say "fully redeemed".
    #[error("Promotion {id} reached its usage limit of {limit}")]
    UsageLimitExceeded { id: String, limit: u32 },

    #[error("Storage error: {0}")]
    Storage(DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(id: impl Into<String>, reason: InvalidReason) -> Self {
        EngineError::PromotionInvalid {
            id: id.into(),
            reason,
        }
    }

    /// The error for a promotion found in a non-active state, if any.
    ///
    /// `Exhausted` becomes `UsageLimitExceeded`; `Active` yields `None`.
    pub fn for_availability(
        id: &str,
        availability: Availability,
        limit: Option<u32>,
    ) -> Option<Self> {
        let reason = match availability {
            Availability::Active => return None,
            Availability::Exhausted => {
                return Some(EngineError::UsageLimitExceeded {
                    id: id.to_string(),
                    limit: limit.unwrap_or(0),
                })
            }
            Availability::Disabled => InvalidReason::Disabled,
            Availability::Scheduled => InvalidReason::Scheduled,
            Availability::Expired => InvalidReason::Expired,
        };
        Some(EngineError::invalid(id, reason))
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        EngineError::Validation(errors)
    }
}

impl From<ValidationError> for EngineError {
    fn from(error: ValidationError) -> Self {
        EngineError::Validation(error.into())
    }
}

/// `NotFound` for a known entity passes through; everything else is storage.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => match Entity::from_db_name(&entity) {
                Some(entity) => EngineError::NotFound { entity, id },
                None => EngineError::Storage(DbError::NotFound { entity, id }),
            },
            other => EngineError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_not_found_maps_through() {
        let err: EngineError = DbError::not_found("Promotion", "p-9").into();
        assert!(matches!(
            err,
            EngineError::NotFound { entity: Entity::Promotion, ref id } if id == "p-9"
        ));

        let err: EngineError = DbError::not_found("Record", "unknown").into();
        assert!(matches!(err, EngineError::Storage(_)));

        let err: EngineError = DbError::PoolExhausted.into();
        assert!(matches!(err, EngineError::Storage(DbError::PoolExhausted)));
    }

    #[test]
    fn test_for_availability() {
        assert!(EngineError::for_availability("p", Availability::Active, None).is_none());
        assert!(matches!(
            EngineError::for_availability("p", Availability::Exhausted, Some(3)),
            Some(EngineError::UsageLimitExceeded { limit: 3, .. })
        ));
        assert!(matches!(
            EngineError::for_availability("p", Availability::Expired, None),
            Some(EngineError::PromotionInvalid { reason: InvalidReason::Expired, .. })
        ));
    }
}
