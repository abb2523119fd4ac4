//! # Domain Models
//!
//! Canonical domain types for globalcap.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated, exchange-qualified ticker |
//! | [`AssetRecord`] | Validated asset with USD market cap and native prices |
//! | [`AssetDraft`] | Unvalidated field set and JSON wire shape |
//! | [`AssetType`] | `stock`, `reit`, `commodity` or `crypto` |
//! | [`RankedAsset`] | Asset plus its 1-based rank |
//!
//! All invariants are enforced at construction:
//!
//! ```rust
//! use globalcap_core::{AssetDraft, AssetRecord, ValidationError};
//!
//! let draft = AssetDraft {
//!     ticker: String::from("ACME"),
//!     name: String::from("Acme Corp"),
//!     market_cap_usd: -1.0,
//!     ..AssetDraft::default()
//! };
//! assert!(matches!(
//!     AssetRecord::new(draft),
//!     Err(ValidationError::NegativeValue { .. })
//! ));
//! ```

mod asset;
mod symbol;

pub use asset::{validate_currency_code, AssetDraft, AssetRecord, AssetType, RankedAsset};
pub use symbol::Symbol;
