//! # Error Types
//!
//! Structured error types for calc_core.
//!
//! Bad user input is *not* an error here: the validator reports it as data in a
//! [`ValidationResult`](crate::validation::ValidationResult). `CalcError` is for
//! wiring bugs (duplicate calculator ids, unknown ids, malformed schemas) and
//! for computations called on a bag that never passed validation.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::errors::{CalcError, CalcResult};
//!
//! fn checked_ratio(numerator: f64, denominator: f64) -> CalcResult<f64> {
//!     if denominator == 0.0 {
//!         return Err(CalcError::calculation_failed(
//!             "ratio",
//!             "denominator is zero",
//!         ));
//!     }
//!     Ok(numerator / denominator)
//! }
//!
//! assert!(checked_ratio(1.0, 0.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for calc_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for registry, schema and computation failures.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// A bag value has the wrong kind or an impossible value
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A field the computation depends on is absent from the bag
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// No calculator registered under this id
    #[error("Calculator not found: {id}")]
    CalculatorNotFound { id: String },

    /// A calculator with this id is already registered
    #[error("Duplicate calculator id: {id}")]
    DuplicateCalculator { id: String },

    /// A calculator definition violates the field schema invariants
    #[error("Invalid schema for '{calculator}': {reason}")]
    InvalidSchema { calculator: String, reason: String },

    /// Calculation failed (singularity, non-finite result, missing output)
    #[error("Calculation failed: {calculation_type} - {reason}")]
    CalculationFailed {
        calculation_type: String,
        reason: String,
    },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField {
            field: field.into(),
        }
    }

    /// Create a CalculatorNotFound error
    pub fn not_found(id: impl Into<String>) -> Self {
        CalcError::CalculatorNotFound { id: id.into() }
    }

    /// Create a DuplicateCalculator error
    pub fn duplicate(id: impl Into<String>) -> Self {
        CalcError::DuplicateCalculator { id: id.into() }
    }

    /// Create an InvalidSchema error
    pub fn invalid_schema(calculator: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidSchema {
            calculator: calculator.into(),
            reason: reason.into(),
        }
    }

    /// Create a CalculationFailed error
    pub fn calculation_failed(calculation_type: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::CalculationFailed {
            calculation_type: calculation_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error points at calculator wiring rather than at the data
    pub fn is_wiring_error(&self) -> bool {
        matches!(
            self,
            CalcError::CalculatorNotFound { .. }
                | CalcError::DuplicateCalculator { .. }
                | CalcError::InvalidSchema { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::CalculatorNotFound { .. } => "CALCULATOR_NOT_FOUND",
            CalcError::DuplicateCalculator { .. } => "DUPLICATE_CALCULATOR",
            CalcError::InvalidSchema { .. } => "INVALID_SCHEMA",
            CalcError::CalculationFailed { .. } => "CALCULATION_FAILED",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(err: serde_json::Error) -> Self {
        CalcError::SerializationError {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CalcError::invalid_input("loanAmount", "-5", "must be positive");
        let json = serde_json::to_string(&error).unwrap();
        let roundtrip: CalcError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalcError::missing_field("test").error_code(), "MISSING_FIELD");
        assert_eq!(CalcError::not_found("escrow").error_code(), "CALCULATOR_NOT_FOUND");
        assert_eq!(CalcError::duplicate("escrow").error_code(), "DUPLICATE_CALCULATOR");
    }

    #[test]
    fn test_wiring_errors() {
        assert!(CalcError::duplicate("x").is_wiring_error());
        assert!(CalcError::not_found("x").is_wiring_error());
        assert!(!CalcError::calculation_failed("dscr", "zero debt service").is_wiring_error());
    }

    #[test]
    fn test_display_mentions_id() {
        let msg = CalcError::not_found("loan-to-value").to_string();
        assert!(msg.contains("loan-to-value"));
    }
}
