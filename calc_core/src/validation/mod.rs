//! # Input Validation
//!
//! Turns [`RawInputs`](crate::values::RawInputs) into a typed
//! [`InputBag`](crate::values::InputBag), or into a list of human-readable
//! messages explaining why it can't.
//!
//! A full pass runs, in order:
//!
//! 1. Presence of required fields
//! 2. Coercion to the declared kind
//! 3. Range and option checks
//! 4. Cross-field rules (only once every field passed 1-3)
//! 5. Advisories (warnings, never blocking)
//!
//! Failures aggregate; each field contributes at most one message.
//!
//! The quick path checks a single field as the user types it. It reuses the
//! same per-field check and only those cross-field rules whose fields are all
//! known, so anything it rejects the full pass rejects too.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::schema::FieldSchema;
//! use calc_core::validation::Validator;
//! use calc_core::values::RawInputs;
//!
//! let validator = Validator::new(
//!     "demo",
//!     vec![FieldSchema::currency("loanAmount", "Loan amount").range(10_000.0, 10_000_000.0)],
//! );
//!
//! let result = validator.validate(&RawInputs::new().with("loanAmount", "5000"));
//! assert!(!result.is_valid());
//! assert_eq!(result.errors, vec!["Loan amount must be at least $10,000".to_string()]);
//! ```

mod field;
mod result;
mod rules;
mod validator;

pub use field::{check_field, FieldOutcome};
pub use result::{QuickCheck, ValidationResult};
pub use rules::{Advisory, CrossFieldRule};
pub use validator::{Validation, Validator};
