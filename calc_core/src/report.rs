//! # Report Formatting
//!
//! Builds the narrative text reports calculators return. Reports are plain
//! markdown-flavoured text:
//!
//! ```text
//! # Escrow Analysis Report
//! Calculator: escrow-analysis
//!
//! ## Loan Information
//! - Monthly P&I payment: $1,363.00
//! ```
//!
//! Nothing in this module computes a metric. Generators receive the outputs
//! already produced by the computation and only format them.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::report::{ReportBuilder, format_currency};
//!
//! let mut report = ReportBuilder::new("Demo Report", "demo");
//! report.section("Summary").line("Payment", format_currency(1713.0));
//! let text = report.finish();
//! assert!(text.starts_with("# Demo Report"));
//! assert!(text.contains("- Payment: $1,713.00"));
//! ```

use std::fmt::Write as _;

use crate::errors::{CalcError, CalcResult};
use crate::schema::{FieldKind, FieldSchema, Unit};
use crate::values::{Bag, Value, DATE_FORMAT};

// ============================================================================
// Number formatting
// ============================================================================

/// Group the integer digits of a non-negative number string with commas
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Format with a fixed number of decimals and thousands separators.
///
/// ```rust
/// use calc_core::report::format_number;
/// assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
/// assert_eq!(format_number(-42.0, 0), "-42");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text.clone(), None),
    };
    let mut out = String::new();
    // "-0.00" after rounding is just zero
    if value < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

/// Dollars and cents: `$1,713.00`
pub fn format_currency(value: f64) -> String {
    let body = format_number(value, 2);
    match body.strip_prefix('-') {
        Some(rest) => format!("-${}", rest),
        None => format!("${}", body),
    }
}

/// Whole dollars when the amount has no cents: `$50,000`
pub fn format_currency_compact(value: f64) -> String {
    if value.fract() == 0.0 {
        let body = format_number(value, 0);
        match body.strip_prefix('-') {
            Some(rest) => format!("-${}", rest),
            None => format!("${}", body),
        }
    } else {
        format_currency(value)
    }
}

/// A 0-1 fraction as a percentage: `0.8` → `80.00%`
pub fn format_fraction(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// A whole-number percent: `6.5` → `6.50%`
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

fn trim_decimals(value: f64) -> String {
    let text = format_number(value, 4);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Format a bare number according to a field's kind and unit.
///
/// Used for validation messages ("cannot exceed $10,000,000") as well as
/// report lines.
pub fn format_for_field(field: &FieldSchema, value: f64) -> String {
    match (field.kind, field.unit) {
        (FieldKind::Currency, _) | (_, Some(Unit::Dollars)) => format_currency_compact(value),
        (_, Some(Unit::Fraction)) => {
            let pct = trim_decimals(value * 100.0);
            format!("{}%", pct)
        }
        (_, Some(Unit::Percent)) => format!("{}%", trim_decimals(value)),
        (_, Some(unit)) => format!("{}{}", trim_decimals(value), unit.suffix()),
        (_, None) => trim_decimals(value),
    }
}

/// Render a bag value for display according to its field schema
pub fn render_value(field: &FieldSchema, value: &Value) -> String {
    match value {
        Value::Number(n) => match (field.kind, field.unit) {
            (FieldKind::Currency, _) => format_currency(*n),
            (FieldKind::Percentage, Some(Unit::Fraction)) => format_fraction(*n),
            (FieldKind::Percentage, _) => format_percent(*n),
            _ => format_for_field(field, *n),
        },
        Value::Text(s) if field.kind == FieldKind::Enum => field
            .options
            .iter()
            .find(|o| &o.value == s)
            .map(|o| o.label.clone())
            .unwrap_or_else(|| s.clone()),
        Value::Date(d) => d.format(DATE_FORMAT).to_string(),
        Value::Series(values) => values
            .iter()
            .map(|v| match field.unit {
                Some(Unit::Dollars) => format_currency(*v),
                _ => trim_decimals(*v),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

// ============================================================================
// Report builder
// ============================================================================

/// Incremental builder for a text report.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    out: String,
}

impl ReportBuilder {
    /// Start a report with its identifying header
    pub fn new(title: &str, calculator_id: &str) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "# {}", title);
        let _ = writeln!(out, "Calculator: {}", calculator_id);
        ReportBuilder { out }
    }

    pub fn section(&mut self, heading: &str) -> &mut Self {
        let _ = write!(self.out, "\n## {}\n", heading);
        self
    }

    pub fn line(&mut self, label: &str, value: impl AsRef<str>) -> &mut Self {
        let _ = writeln!(self.out, "- {}: {}", label, value.as_ref());
        self
    }

    pub fn bullet(&mut self, text: impl AsRef<str>) -> &mut Self {
        let _ = writeln!(self.out, "- {}", text.as_ref());
        self
    }

    pub fn paragraph(&mut self, text: impl AsRef<str>) -> &mut Self {
        let _ = writeln!(self.out, "{}", text.as_ref());
        self
    }

    /// One line for a field, labelled and formatted by its schema.
    ///
    /// Absent values are an error: the generator asked for something the
    /// computation never produced.
    pub fn field(&mut self, schemas: &[FieldSchema], bag: &Bag, id: &str) -> CalcResult<&mut Self> {
        let schema = schemas
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CalcError::Internal {
                message: format!("report references undeclared field '{}'", id),
            })?;
        let value = bag.get(id).ok_or_else(|| CalcError::missing_field(id))?;
        let rendered = render_value(schema, value);
        Ok(self.line(&schema.label, rendered))
    }

    /// Like [`field`](Self::field) but silently skips absent optional values
    pub fn field_if_present(&mut self, schemas: &[FieldSchema], bag: &Bag, id: &str) -> CalcResult<&mut Self> {
        if bag.contains(id) {
            self.field(schemas, bag, id)
        } else {
            Ok(self)
        }
    }

    /// Restate every present value of `bag` in schema order
    pub fn all_fields(&mut self, schemas: &[FieldSchema], bag: &Bag) -> &mut Self {
        for schema in schemas {
            if let Some(value) = bag.get(&schema.id) {
                let rendered = render_value(schema, value);
                self.line(&schema.label, rendered);
            }
        }
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}
