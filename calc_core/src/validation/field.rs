//! Per-field presence, coercion and range checks.

use chrono::NaiveDate;

use crate::report::format_for_field;
use crate::schema::{FieldKind, FieldSchema};
use crate::values::{Value, DATE_FORMAT};

/// Result of checking one raw value against its schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Nothing supplied and the field is optional
    Absent,
    /// Coerced and within bounds
    Accepted(Value),
    /// Message naming the field and the violated constraint
    Rejected(String),
}

impl FieldOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, FieldOutcome::Rejected(_))
    }
}

/// Null, missing and blank strings all count as "not supplied"
fn is_blank(raw: Option<&serde_json::Value>) -> bool {
    match raw {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_number(raw: &serde_json::Value) -> Option<f64> {
    let n = match raw {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_bool(raw: &serde_json::Value) -> Option<bool> {
    match raw {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_date(raw: &serde_json::Value) -> Option<NaiveDate> {
    match raw {
        serde_json::Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
        _ => None,
    }
}

fn check_bounds(schema: &FieldSchema, n: f64) -> FieldOutcome {
    if let Some(min) = schema.min {
        if n < min {
            return FieldOutcome::Rejected(format!(
                "{} must be at least {}",
                schema.label,
                format_for_field(schema, min)
            ));
        }
    }
    if let Some(max) = schema.max {
        if n > max {
            return FieldOutcome::Rejected(format!(
                "{} cannot exceed {}",
                schema.label,
                format_for_field(schema, max)
            ));
        }
    }
    FieldOutcome::Accepted(Value::Number(n))
}

/// Check one raw value against its schema.
///
/// Pure and total: every input yields exactly one outcome, and the same
/// function backs both the full and the quick validator.
///
/// ```rust
/// use calc_core::schema::FieldSchema;
/// use calc_core::validation::{check_field, FieldOutcome};
/// use calc_core::values::Value;
///
/// let field = FieldSchema::currency("propertyValue", "Property value").min(50_000.0);
/// let ok = check_field(&field, Some(&serde_json::json!(" 300000 ")));
/// assert_eq!(ok, FieldOutcome::Accepted(Value::Number(300_000.0)));
///
/// let missing = check_field(&field, None);
/// assert_eq!(missing, FieldOutcome::Rejected("Property value is required".into()));
/// ```
pub fn check_field(schema: &FieldSchema, raw: Option<&serde_json::Value>) -> FieldOutcome {
    if is_blank(raw) {
        return if schema.required {
            FieldOutcome::Rejected(format!("{} is required", schema.label))
        } else {
            FieldOutcome::Absent
        };
    }
    let Some(raw) = raw else {
        return FieldOutcome::Absent;
    };

    match schema.kind {
        FieldKind::Number | FieldKind::Percentage | FieldKind::Currency => match coerce_number(raw) {
            Some(n) => check_bounds(schema, n),
            None => FieldOutcome::Rejected(format!("{} must be a valid number", schema.label)),
        },
        FieldKind::Enum => match raw.as_str() {
            Some(s) if schema.allows_option(s) => FieldOutcome::Accepted(Value::Text(s.to_string())),
            _ => {
                let allowed: Vec<&str> = schema.options.iter().map(|o| o.value.as_str()).collect();
                FieldOutcome::Rejected(format!("{} must be one of: {}", schema.label, allowed.join(", ")))
            }
        },
        FieldKind::Boolean => match coerce_bool(raw) {
            Some(b) => FieldOutcome::Accepted(Value::Bool(b)),
            None => FieldOutcome::Rejected(format!("{} must be true or false", schema.label)),
        },
        FieldKind::Date => match coerce_date(raw) {
            Some(d) => FieldOutcome::Accepted(Value::Date(d)),
            None => FieldOutcome::Rejected(format!("{} must be a valid date (YYYY-MM-DD)", schema.label)),
        },
        FieldKind::Text => match raw {
            serde_json::Value::String(s) => FieldOutcome::Accepted(Value::Text(s.trim().to_string())),
            serde_json::Value::Number(n) => FieldOutcome::Accepted(Value::Text(n.to_string())),
            _ => FieldOutcome::Rejected(format!("{} must be text", schema.label)),
        },
        FieldKind::Series => FieldOutcome::Rejected(format!("{} cannot be supplied as an input", schema.label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Category, Unit};
    use serde_json::json;

    fn money() -> FieldSchema {
        FieldSchema::currency("loanAmount", "Loan amount").range(10_000.0, 10_000_000.0)
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        for raw in [None, Some(json!(null)), Some(json!("")), Some(json!("   "))] {
            assert_eq!(
                check_field(&money(), raw.as_ref()),
                FieldOutcome::Rejected("Loan amount is required".into())
            );
            assert_eq!(check_field(&money().optional(), raw.as_ref()), FieldOutcome::Absent);
        }
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(
            check_field(&money(), Some(&json!("250000"))),
            FieldOutcome::Accepted(Value::Number(250_000.0))
        );
        assert_eq!(
            check_field(&money(), Some(&json!(250000))),
            FieldOutcome::Accepted(Value::Number(250_000.0))
        );
        for bad in [json!("abc"), json!("NaN"), json!("inf"), json!(true), json!([1])] {
            assert_eq!(
                check_field(&money(), Some(&bad)),
                FieldOutcome::Rejected("Loan amount must be a valid number".into()),
                "{:?} should not coerce",
                bad
            );
        }
    }

    #[test]
    fn test_bound_messages_name_the_bound() {
        assert_eq!(
            check_field(&money(), Some(&json!(5_000))),
            FieldOutcome::Rejected("Loan amount must be at least $10,000".into())
        );
        assert_eq!(
            check_field(&money(), Some(&json!(20_000_000))),
            FieldOutcome::Rejected("Loan amount cannot exceed $10,000,000".into())
        );
        let rate = FieldSchema::percentage("interestRate", "Interest rate", Unit::Percent).range(1.0, 20.0);
        assert_eq!(
            check_field(&rate, Some(&json!(25))),
            FieldOutcome::Rejected("Interest rate cannot exceed 20%".into())
        );
    }

    #[test]
    fn test_enum_options() {
        let field = FieldSchema::choice::<Category>("category", "Category");
        assert_eq!(
            check_field(&field, Some(&json!("legal"))),
            FieldOutcome::Accepted(Value::Text("legal".into()))
        );
        match check_field(&field, Some(&json!("Legal"))) {
            FieldOutcome::Rejected(msg) => assert!(msg.starts_with("Category must be one of: finance")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_spellings() {
        let field = FieldSchema::boolean("homestead", "Homestead exemption");
        for (raw, expected) in [
            (json!(true), true),
            (json!("yes"), true),
            (json!("1"), true),
            (json!(0), false),
            (json!("No"), false),
        ] {
            assert_eq!(check_field(&field, Some(&raw)), FieldOutcome::Accepted(Value::Bool(expected)));
        }
        assert!(check_field(&field, Some(&json!("maybe"))).is_rejected());
    }

    #[test]
    fn test_dates() {
        let field = FieldSchema::date("asOfDate", "As-of date");
        let expected = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert_eq!(
            check_field(&field, Some(&json!("2026-02-28"))),
            FieldOutcome::Accepted(Value::Date(expected))
        );
        assert_eq!(
            check_field(&field, Some(&json!("2026-02-30"))),
            FieldOutcome::Rejected("As-of date must be a valid date (YYYY-MM-DD)".into())
        );
        assert!(check_field(&field, Some(&json!("02/28/2026"))).is_rejected());
    }
}
