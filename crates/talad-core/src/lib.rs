//! # talad-core: Pure Promotion Logic for Talad
//!
//! Everything the promotion engine decides without touching storage lives
//! here: the promotion model, the discount calculator, eligibility matching,
//! validation of admin input, and the presentation helpers layered on top.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Talad Promotions Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          talad-engine (PricingEngine, PromotionAdmin)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ talad-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ promotion │  │ discount  │  │ matching  │  │ validation│  │   │
//! │  │   │  Rule     │  │ calculate │  │ name / id │  │  input    │  │   │
//! │  │   │  Scope    │  │  bundle   │  │  scopes   │  │  coercion │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    talad-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in satang with integer arithmetic
//! - [`types`] - Catalog types (Product, BranchStockItem)
//! - [`promotion`] - Promotion, DiscountRule, Scope, availability
//! - [`discount`] - Line-item and bundle discount calculation
//! - [`matching`] - Scope matching for products and stock items
//! - [`validation`] - Field-level validation of promotion drafts
//! - [`input`] - Form input coercion (numbers arriving as strings)
//! - [`query`] - Filter, page and statistics shapes shared with the store
//! - [`export`] - CSV/JSON export with Thai headers
//! - [`alerts`] - Expiry and usage alerts for the back office
//! - [`error`] - Validation error types
//!
//! ## Example Usage
//!
//! ```rust
//! use talad_core::money::Money;
//! use talad_core::discount::buy_x_get_y_free_units;
//!
//! // Buy 2 get 1: nine units means three free
//! assert_eq!(buy_x_get_y_free_units(2, 1, 9), 3);
//!
//! let price = Money::from_satang(10_000); // ฿100.00
//! assert_eq!((price * 3u32).satang(), 30_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alerts;
pub mod discount;
pub mod error;
pub mod export;
pub mod input;
pub mod matching;
pub mod money;
pub mod promotion;
pub mod query;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ValidationError, ValidationErrors};
pub use money::Money;
pub use promotion::{
    availability, Availability, Conditions, DiscountRule, DiscountType, Promotion,
    PromotionDraft, PromotionType, Scope,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default priority for new promotions. Lower value wins ties.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Maximum length of a promotion name.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a promotion description.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum length of promotion notes.
pub const MAX_NOTES_LEN: usize = 1000;

/// Maximum quantity of a single line item priced by the engine.
pub const MAX_LINE_QUANTITY: u32 = 9_999;

/// Highest unit price a cart line may carry: ฿10,000,000.00.
pub const MAX_UNIT_PRICE_SATANG: i64 = 1_000_000_000;
