//! # Values and Bags
//!
//! - [`RawInputs`] - what a form or CLI hands over: a JSON object of loosely
//!   typed values (`"300000"`, `300000`, `true`, `null`)
//! - [`Value`] - a coerced value of a declared field kind
//! - [`Bag`] - id → [`Value`] map; used as both the validated input bag and
//!   the output bag ([`InputBag`], [`OutputBag`])
//!
//! Bag getters fail loudly. A computation that asks for a number under an id
//! the validator never produced gets `MissingField` back, not a zero.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::values::{Bag, Value};
//!
//! let bag = Bag::new()
//!     .with("loanAmount", 400_000.0)
//!     .with("propertyValue", 500_000.0);
//!
//! assert_eq!(bag.number("loanAmount").unwrap(), 400_000.0);
//! assert!(bag.number("downPayment").is_err());
//! assert_eq!(bag.get("propertyValue"), Some(&Value::Number(500_000.0)));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::schema::Choice;

/// Date format used for all date inputs and outputs
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Raw inputs
// ============================================================================

/// Raw, unvalidated input values keyed by field id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInputs(BTreeMap<String, serde_json::Value>);

impl RawInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object.
    ///
    /// ```rust
    /// use calc_core::values::RawInputs;
    ///
    /// let raw = RawInputs::from_json(serde_json::json!({ "loanAmount": "400000" })).unwrap();
    /// assert!(raw.get("loanAmount").is_some());
    /// assert!(RawInputs::from_json(serde_json::json!([1, 2])).is_err());
    /// ```
    pub fn from_json(value: serde_json::Value) -> CalcResult<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(RawInputs(map.into_iter().collect())),
            other => Err(CalcError::SerializationError {
                reason: format!("input bag must be a JSON object, got {}", json_type_name(&other)),
            }),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, id: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(id.into(), value.into());
    }

    pub fn remove(&mut self, id: &str) -> Option<serde_json::Value> {
        self.0.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay another bag on top of this one (later values win)
    pub fn merged(mut self, other: &RawInputs) -> Self {
        for (id, value) in other.iter() {
            self.0.insert(id.clone(), value.clone());
        }
        self
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================================
// Value
// ============================================================================

/// A coerced field value.
///
/// `Unavailable` is the explicit sentinel for outputs that have no meaningful
/// number (e.g. "no cancellation possible"); computations return it instead
/// of NaN or a negative duration.
///
/// The JSON form is untagged, so a date and a text value are both plain
/// strings. Deserializing always yields `Text`; [`Bag::date`] parses
/// `YYYY-MM-DD` text back into a date, so a text output that happens to look
/// like a date is never turned into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    Series(Vec<f64>),
    Unavailable { unavailable: String },
}

impl Value {
    /// Build the sentinel value
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Value::Unavailable {
            unavailable: reason.into(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Value::Unavailable { .. })
    }

    /// Short kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::Text(_) => "text",
            Value::Series(_) => "series",
            Value::Unavailable { .. } => "unavailable",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Series(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Unavailable { unavailable } => write!(f, "n/a ({})", unavailable),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::Series(values)
    }
}

// ============================================================================
// Bag
// ============================================================================

/// Field id → value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bag {
    values: BTreeMap<String, Value>,
}

/// Bag produced by a successful validation pass
pub type InputBag = Bag;

/// Bag produced by a computation
pub type OutputBag = Bag;

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(id.into(), value.into());
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.values.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lenient numeric lookup for rule predicates: `None` when absent or not a number
    pub fn peek_number(&self, id: &str) -> Option<f64> {
        self.values.get(id).and_then(Value::as_number)
    }

    fn require(&self, id: &str) -> CalcResult<&Value> {
        self.values.get(id).ok_or_else(|| CalcError::missing_field(id))
    }

    fn wrong_kind(id: &str, value: &Value, expected: &str) -> CalcError {
        CalcError::invalid_input(id, value.to_string(), format!("expected {}, found {}", expected, value.kind_name()))
    }

    /// Required number
    pub fn number(&self, id: &str) -> CalcResult<f64> {
        match self.require(id)? {
            Value::Number(n) => Ok(*n),
            other => Err(Self::wrong_kind(id, other, "number")),
        }
    }

    /// Optional number; present values of another kind are still an error
    pub fn opt_number(&self, id: &str) -> CalcResult<Option<f64>> {
        match self.values.get(id) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(Some(*n)),
            Some(other) => Err(Self::wrong_kind(id, other, "number")),
        }
    }

    /// Required boolean
    pub fn flag(&self, id: &str) -> CalcResult<bool> {
        match self.require(id)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Self::wrong_kind(id, other, "boolean")),
        }
    }

    /// Required text
    pub fn text(&self, id: &str) -> CalcResult<&str> {
        match self.require(id)? {
            Value::Text(s) => Ok(s),
            other => Err(Self::wrong_kind(id, other, "text")),
        }
    }

    /// Required date; `YYYY-MM-DD` text (a deserialized date) is accepted
    pub fn date(&self, id: &str) -> CalcResult<NaiveDate> {
        Self::as_date(id, self.require(id)?)
    }

    /// Optional date
    pub fn opt_date(&self, id: &str) -> CalcResult<Option<NaiveDate>> {
        self.values.get(id).map(|value| Self::as_date(id, value)).transpose()
    }

    fn as_date(id: &str, value: &Value) -> CalcResult<NaiveDate> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| Self::wrong_kind(id, value, "date")),
            other => Err(Self::wrong_kind(id, other, "date")),
        }
    }

    /// Required series
    pub fn series(&self, id: &str) -> CalcResult<&[f64]> {
        match self.require(id)? {
            Value::Series(values) => Ok(values),
            other => Err(Self::wrong_kind(id, other, "series")),
        }
    }

    /// Required enumeration value, parsed into its closed Rust enum.
    ///
    /// ```rust
    /// use calc_core::calculators::escrow_analysis::EscrowAccountType;
    /// use calc_core::values::Bag;
    ///
    /// let bag = Bag::new().with("escrowAccountType", "waived");
    /// let kind: EscrowAccountType = bag.choice("escrowAccountType").unwrap();
    /// assert_eq!(kind, EscrowAccountType::Waived);
    /// ```
    pub fn choice<T: Choice>(&self, id: &str) -> CalcResult<T> {
        let raw = self.text(id)?;
        T::parse(raw).ok_or_else(|| CalcError::invalid_input(id, raw, "not one of the declared options"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_inputs_from_json() {
        let raw = RawInputs::from_json(serde_json::json!({
            "propertyValue": "300000",
            "loanAmount": 240000,
        }))
        .unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get("loanAmount"), Some(&serde_json::json!(240000)));
    }

    #[test]
    fn test_raw_inputs_rejects_non_object() {
        let err = RawInputs::from_json(serde_json::json!("hello")).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_merge_later_wins() {
        let base = RawInputs::new().with("a", "1").with("b", "2");
        let overlay = RawInputs::new().with("b", "3");
        let merged = base.merged(&overlay);
        assert_eq!(merged.get("b"), Some(&serde_json::json!("3")));
        assert_eq!(merged.get("a"), Some(&serde_json::json!("1")));
    }

    #[test]
    fn test_bag_getters_fail_loudly() {
        let bag = Bag::new().with("rate", 0.05).with("name", "x");
        assert_eq!(bag.number("rate").unwrap(), 0.05);
        assert_eq!(bag.number("missing").unwrap_err().error_code(), "MISSING_FIELD");
        assert_eq!(bag.number("name").unwrap_err().error_code(), "INVALID_INPUT");
        assert_eq!(bag.opt_number("missing").unwrap(), None);
        assert!(bag.opt_number("name").is_err());
    }

    #[test]
    fn test_value_serialization() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let bag = Bag::new()
            .with("n", 350.0)
            .with("d", date)
            .with("s", Value::unavailable("no cancellation possible"));
        let json = serde_json::to_value(&bag).unwrap();
        assert_eq!(json["n"], serde_json::json!(350.0));
        assert_eq!(json["d"], serde_json::json!("2026-01-15"));
        assert_eq!(json["s"]["unavailable"], serde_json::json!("no cancellation possible"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Bool(true).to_string(), "yes");
        assert_eq!(Value::Series(vec![1.0, 2.5]).to_string(), "[1, 2.5]");
        assert!(Value::unavailable("never").to_string().contains("never"));
    }

    #[test]
    fn test_deserialized_strings_stay_text() {
        let date = NaiveDate::from_ymd_opt(2031, 2, 1).unwrap();
        let bag = Bag::new().with("cancellationDate", date).with("note", "2026-01-15");
        let json = serde_json::to_string(&bag).unwrap();
        let back: Bag = serde_json::from_str(&json).unwrap();

        assert_eq!(back.text("note").unwrap(), "2026-01-15");
        assert_eq!(back.date("cancellationDate").unwrap(), date);
        assert_eq!(back.opt_date("cancellationDate").unwrap(), Some(date));
        assert!(back.date("missing").is_err());
        assert_eq!(
            Bag::new().with("d", "soon").date("d").unwrap_err().error_code(),
            "INVALID_INPUT"
        );
    }
}
