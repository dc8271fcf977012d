//! # Response Envelope
//!
//! The shape a transport layer hands back to clients, and the localized
//! messages for each error kind.
//!
//! ```json
//! {"status": "success", "data": {...}}
//! {"status": "fail", "code": "NOT_FOUND", "message": "ไม่พบโปรโมชั่น"}
//! {"status": "fail", "code": "VALIDATION_ERROR", "message": "ข้อมูลไม่ถูกต้อง",
//!  "errors": [{"kind": "required", "field": "name"}]}
//! ```
//!
//! Error kinds stay language-neutral in [`EngineError`]; wording is only
//! chosen here.

use serde::Serialize;

use talad_core::{ValidationError, ValidationErrors};

use crate::error::{EngineError, EngineResult, Entity, InvalidReason};

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Promotion, product or stock item not found (404)
    NotFound,

    /// Promotion exists but cannot be used now (422)
    PromotionInvalid,

    /// Promotion fully redeemed (422)
    UsageLimitExceeded,

    /// Store failure (500)
    DatabaseError,

    /// Export or other internal failure (500)
    InternalError,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::PromotionInvalid { .. } => ErrorCode::PromotionInvalid,
            EngineError::UsageLimitExceeded { .. } => ErrorCode::UsageLimitExceeded,
            EngineError::Storage(_) => ErrorCode::DatabaseError,
            EngineError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Thai,
    English,
}

/// User-facing message for an error.
pub fn localize(err: &EngineError, locale: Locale) -> String {
    match locale {
        Locale::Thai => thai(err).to_string(),
        Locale::English => english(err),
    }
}

fn thai(err: &EngineError) -> &'static str {
    match err {
        EngineError::Validation(errors) => {
            if errors.has_field("promotionIds") {
                "กรุณาระบุรายการโปรโมชั่นที่ต้องการเปลี่ยนสถานะ"
            } else if only_date_range(errors) {
                "วันเริ่มต้นต้องน้อยกว่าวันสิ้นสุด"
            } else {
                "ข้อมูลไม่ถูกต้อง"
            }
        }
        EngineError::NotFound { entity, .. } => match entity {
            Entity::Promotion => "ไม่พบโปรโมชั่น",
            Entity::Product | Entity::StockItem => "ไม่พบสินค้า",
        },
        EngineError::PromotionInvalid { reason, .. } => match reason {
            InvalidReason::Disabled => "โปรโมชั่นนี้ถูกปิดการใช้งาน",
            InvalidReason::Scheduled | InvalidReason::Expired => {
                "โปรโมชั่นนี้ไม่อยู่ในช่วงเวลาที่ใช้ได้"
            }
            InvalidReason::BranchNotEligible => "โปรโมชั่นนี้ไม่รองรับสาขา",
            InvalidReason::Changed => "โปรโมชั่นไม่สามารถใช้ได้",
        },
        EngineError::UsageLimitExceeded { .. } => "โปรโมชั่นนี้ถูกใช้เต็มจำนวนแล้ว",
        EngineError::Storage(_) => "เกิดข้อผิดพลาดในการดึงข้อมูลโปรโมชั่น",
        EngineError::Internal(_) => "เกิดข้อผิดพลาดในการส่งออกข้อมูล",
    }
}

fn english(err: &EngineError) -> String {
    match err {
        EngineError::Validation(errors) if only_date_range(errors) => {
            "Start date must be before end date".to_string()
        }
        EngineError::Validation(_) => "Invalid input".to_string(),
        // Store details stay in the logs
        EngineError::Storage(_) => "Failed to load promotion data".to_string(),
        EngineError::Internal(_) => "Failed to export data".to_string(),
        other => other.to_string(),
    }
}

fn only_date_range(errors: &ValidationErrors) -> bool {
    !errors.is_empty() && errors.iter().all(|e| matches!(e, ValidationError::InvalidDateRange))
}

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success {
        data: T,
    },
    Fail {
        code: ErrorCode,
        message: String,
        /// Field-level reasons, for validation failures only.
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<Vec<ValidationError>>,
    },
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope::Success { data }
    }

    pub fn fail(err: EngineError, locale: Locale) -> Self {
        let message = localize(&err, locale);
        let code = err.code();
        let errors = match err {
            EngineError::Validation(errors) => Some(errors.into_vec()),
            _ => None,
        };
        Envelope::Fail { code, message, errors }
    }

    pub fn from_result(result: EngineResult<T>, locale: Locale) -> Self {
        match result {
            Ok(data) => Envelope::success(data),
            Err(err) => Envelope::fail(err, locale),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }
}
