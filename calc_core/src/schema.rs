//! # Field Schemas
//!
//! Declarative description of one input or output slot of a calculator:
//! id, label, semantic kind, unit, required flag and constraints.
//!
//! ## Percentages
//!
//! Every `Percentage` field declares [`Unit::Fraction`] (`0.2` = 20%) or
//! [`Unit::Percent`] (`20` = 20%). Calculator families disagree on the
//! convention, so the schema is the place a caller checks before sending data.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::schema::{FieldSchema, FieldKind, Unit};
//!
//! let field = FieldSchema::currency("propertyValue", "Property value")
//!     .range(50_000.0, 10_000_000.0);
//! assert_eq!(field.kind, FieldKind::Currency);
//! assert!(field.required);
//!
//! let rate = FieldSchema::percentage("interestRate", "Interest rate", Unit::Percent)
//!     .range(1.0, 20.0)
//!     .optional();
//! assert!(!rate.required);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::values::Value;

// ============================================================================
// Kinds and Units
// ============================================================================

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Percentage,
    Currency,
    Enum,
    Text,
    Boolean,
    Date,
    /// Bounded list of numbers; outputs only
    Series,
}

impl FieldKind {
    /// Kinds coerced through numeric parsing
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::Percentage | FieldKind::Currency)
    }
}

/// Unit a numeric field is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Dollars,
    /// 0-1 convention
    Fraction,
    /// 0-100 convention
    Percent,
    Months,
    Years,
    /// Dollars per $1,000
    Mills,
    Ratio,
    Count,
}

impl Unit {
    /// Suffix used when echoing a value in messages and reports
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Dollars | Unit::Fraction | Unit::Percent | Unit::Ratio | Unit::Count => "",
            Unit::Months => " months",
            Unit::Years => " years",
            Unit::Mills => " mills",
        }
    }
}

/// One allowed value of an enumeration field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

// ============================================================================
// Closed option sets
// ============================================================================

/// A closed set of options backing an enumeration field.
///
/// Implemented by small per-field Rust enums so an invalid option is a
/// compile-time concern inside the crate and a validation error outside it.
///
/// ```rust
/// use calc_core::schema::Choice;
/// use calc_core::calculators::escrow_analysis::PaymentFrequency;
///
/// assert_eq!(PaymentFrequency::parse("quarterly"), Some(PaymentFrequency::Quarterly));
/// assert_eq!(PaymentFrequency::Quarterly.label(), "Quarterly");
/// assert!(PaymentFrequency::parse("weekly").is_none());
/// ```
pub trait Choice: Sized + Copy + 'static {
    /// All variants in display order
    const ALL: &'static [Self];

    /// Wire value (what callers send)
    fn value(self) -> &'static str;

    /// Human-readable label
    fn label(self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.value() == value)
    }

    fn options() -> Vec<EnumOption> {
        Self::ALL
            .iter()
            .map(|c| EnumOption {
                value: c.value().to_string(),
                label: c.label().to_string(),
            })
            .collect()
    }
}

/// Declare a closed option enum and its [`Choice`] impl in one go.
///
/// Each variant maps to its wire value and label; serde uses the wire value.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => ($value:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $crate::schema::Choice for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn value(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}

pub(crate) use choice_enum;

// ============================================================================
// Categories
// ============================================================================

/// Top-level calculator category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Finance,
    Business,
    Career,
    Construction,
    Health,
    Legal,
    Lifestyle,
    Math,
}

impl Choice for Category {
    const ALL: &'static [Self] = &[
        Category::Finance,
        Category::Business,
        Category::Career,
        Category::Construction,
        Category::Health,
        Category::Legal,
        Category::Lifestyle,
        Category::Math,
    ];

    fn value(self) -> &'static str {
        match self {
            Category::Finance => "finance",
            Category::Business => "business",
            Category::Career => "career",
            Category::Construction => "construction",
            Category::Health => "health",
            Category::Legal => "legal",
            Category::Lifestyle => "lifestyle",
            Category::Math => "math",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Category::Finance => "Finance & Investment",
            Category::Business => "Business & Operations",
            Category::Career => "Career",
            Category::Construction => "Construction & Industrial",
            Category::Health => "Health & Fitness",
            Category::Legal => "Legal & Insurance",
            Category::Lifestyle => "Lifestyle & Automotive",
            Category::Math => "Math & Science",
        }
    }
}

// ============================================================================
// Field Schema
// ============================================================================

/// Declarative description of one input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Unique within a calculator (camelCase, e.g. "loanAmount")
    pub id: String,

    /// Human-readable label used in messages and reports
    pub label: String,

    pub kind: FieldKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,

    pub required: bool,

    /// Inclusive lower bound for numeric kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound for numeric kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<EnumOption>,

    /// Value substituted when an optional input is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Decimal places kept at the output boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl FieldSchema {
    fn base(id: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        FieldSchema {
            id: id.into(),
            label: label.into(),
            kind,
            unit: None,
            required: true,
            min: None,
            max: None,
            options: Vec::new(),
            default: None,
            precision: None,
            help: None,
        }
    }

    pub fn number(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::base(id, label, FieldKind::Number)
    }

    pub fn currency(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::base(id, label, FieldKind::Currency).unit(Unit::Dollars)
    }

    pub fn percentage(id: impl Into<String>, label: impl Into<String>, unit: Unit) -> Self {
        Self::base(id, label, FieldKind::Percentage).unit(unit)
    }

    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::base(id, label, FieldKind::Text)
    }

    pub fn boolean(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::base(id, label, FieldKind::Boolean)
    }

    pub fn date(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::base(id, label, FieldKind::Date)
    }

    pub fn series(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::base(id, label, FieldKind::Series)
    }

    /// Enumeration field whose options come from a closed Rust enum
    pub fn choice<T: Choice>(id: impl Into<String>, label: impl Into<String>) -> Self {
        let mut field = Self::base(id, label, FieldKind::Enum);
        field.options = T::options();
        field
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    /// Default for an optional input; also marks the field optional
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn precision(mut self, decimals: u32) -> Self {
        self.precision = Some(decimals);
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Decimal places applied to numeric outputs.
    ///
    /// Currency keeps cents, fractions keep four places, whole-number
    /// percents two.
    pub fn output_precision(&self) -> u32 {
        if let Some(p) = self.precision {
            return p;
        }
        match (self.kind, self.unit) {
            (FieldKind::Currency, _) => 2,
            (FieldKind::Percentage, Some(Unit::Fraction)) => 4,
            (FieldKind::Percentage, _) => 2,
            _ => 4,
        }
    }

    /// Whether `value` is one of the declared options
    pub fn allows_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }

    fn check(&self, calculator: &str, is_input: bool) -> CalcResult<()> {
        let fail = |reason: String| Err(CalcError::invalid_schema(calculator, reason));

        if self.id.trim().is_empty() {
            return fail("field id cannot be empty".to_string());
        }
        if self.kind == FieldKind::Enum && self.options.is_empty() {
            return fail(format!("enum field '{}' has no options", self.id));
        }
        if self.kind == FieldKind::Percentage && !matches!(self.unit, Some(Unit::Fraction) | Some(Unit::Percent)) {
            return fail(format!("percentage field '{}' must declare fraction or percent", self.id));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return fail(format!("field '{}' has min {} above max {}", self.id, min, max));
            }
        }
        if is_input && self.kind == FieldKind::Series {
            return fail(format!("series field '{}' cannot be an input", self.id));
        }
        if is_input && self.required && self.default.is_some() {
            return fail(format!("required field '{}' cannot carry a default", self.id));
        }
        Ok(())
    }
}

/// Check a calculator's input and output schema sets.
///
/// Ids must be unique within each set; the two sets may share an id (an
/// output that echoes an input).
pub fn check_schema_set(calculator: &str, inputs: &[FieldSchema], outputs: &[FieldSchema]) -> CalcResult<()> {
    for (fields, is_input) in [(inputs, true), (outputs, false)] {
        let mut seen = HashSet::new();
        for field in fields {
            field.check(calculator, is_input)?;
            if !seen.insert(field.id.as_str()) {
                return Err(CalcError::invalid_schema(
                    calculator,
                    format!("duplicate field id '{}'", field.id),
                ));
            }
        }
    }
    Ok(())
}
