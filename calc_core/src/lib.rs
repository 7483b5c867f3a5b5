//! # calc_core - Financial Calculator Engine
//!
//! `calc_core` defines the contract every financial calculator implements and
//! the pipeline that runs it: raw form input is validated against a declared
//! schema, computed into typed outputs and rendered as a text report. All
//! inputs, outputs and errors are JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Declarative schemas**: a calculator declares its fields; validation,
//!   defaults, rounding and report formatting follow from the declaration
//! - **Validate once**: computations receive a typed bag that already passed
//!   every field check and cross-field rule
//! - **Explicit sentinels**: impossible results are reported as
//!   `Unavailable { reason }`, never as NaN or negative durations
//! - **Rich Errors**: structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use calc_core::{standard_registry, Evaluation, RawInputs, Settings};
//!
//! let registry = standard_registry(&Settings::default()).unwrap();
//! let raw = RawInputs::new()
//!     .with("loanAmount", 400_000)
//!     .with("propertyValue", "500000");
//!
//! match registry.evaluate("loan-to-value", &raw).unwrap() {
//!     Evaluation::Completed { outputs, report, .. } => {
//!         assert_eq!(outputs.number("loanToValueRatio").unwrap(), 0.8);
//!         assert!(report.starts_with("# Loan-to-Value Analysis"));
//!     }
//!     Evaluation::Invalid { validation } => panic!("{:?}", validation.errors),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`schema`] - Field declarations, units and closed option sets
//! - [`values`] - Raw input bags and typed value bags
//! - [`validation`] - Full and per-field validation, cross-field rules
//! - [`calculator`] - The calculator definition and its pipeline
//! - [`registry`] - Lookup of calculators by id
//! - [`report`] - Report building and value formatting
//! - [`calculators`] - The bundled finance calculators
//! - [`equations`] - Shared financial formulas
//! - [`settings`] - Tunable calculator parameters
//! - [`units`] - Type-safe unit wrappers
//! - [`errors`] - Structured error types
//! - [`file_io`] - Loading inputs and settings from disk

pub mod calculator;
pub mod calculators;
pub mod equations;
pub mod errors;
pub mod file_io;
pub mod registry;
pub mod report;
pub mod schema;
pub mod settings;
pub mod units;
pub mod validation;
pub mod values;

// Re-export commonly used types at crate root for convenience
pub use calculator::{CalculatorDefinition, Evaluation};
pub use calculators::standard_registry;
pub use errors::{CalcError, CalcResult};
pub use registry::{Registry, SharedRegistry};
pub use schema::FieldSchema;
pub use settings::Settings;
pub use validation::ValidationResult;
pub use values::{Bag, RawInputs, Value};
