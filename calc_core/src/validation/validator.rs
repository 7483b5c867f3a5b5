use tracing::debug;

use crate::errors::{CalcError, CalcResult};
use crate::schema::FieldSchema;
use crate::values::{InputBag, RawInputs};

use super::field::{check_field, FieldOutcome};
use super::result::{QuickCheck, ValidationResult};
use super::rules::{Advisory, CrossFieldRule};

fn unknown_field_warning(id: &str) -> String {
    format!("Unknown field '{}' was ignored", id)
}

/// A full validation pass: the messages plus the bag it produced.
///
/// `bag` holds every value that passed its field check (defaults applied).
/// It is only a valid [`InputBag`] when `result.is_valid()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub result: ValidationResult,
    pub bag: InputBag,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }
}

/// Validator for one calculator's input schema.
#[derive(Debug)]
pub struct Validator {
    calculator: String,
    fields: Vec<FieldSchema>,
    rules: Vec<CrossFieldRule>,
    advisories: Vec<Advisory>,
}

impl Validator {
    pub fn new(calculator: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Validator {
            calculator: calculator.into(),
            fields,
            rules: Vec::new(),
            advisories: Vec::new(),
        }
    }

    /// Append a cross-field rule; rules run in insertion order
    pub fn with_rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_advisory(mut self, advisory: Advisory) -> Self {
        self.advisories.push(advisory);
        self
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn rules(&self) -> &[CrossFieldRule] {
        &self.rules
    }

    pub fn field(&self, id: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Definition-time checks: rules and advisories name declared fields,
    /// and every default passes its own field check.
    pub fn check_wiring(&self) -> CalcResult<()> {
        let rule_fields = self
            .rules
            .iter()
            .flat_map(|r| r.fields())
            .chain(self.advisories.iter().flat_map(|a| a.fields()));
        for id in rule_fields {
            if self.field(id).is_none() {
                return Err(CalcError::invalid_schema(
                    &self.calculator,
                    format!("rule references undeclared field '{}'", id),
                ));
            }
        }

        for field in &self.fields {
            if let Some(default) = &field.default {
                let raw = serde_json::to_value(default)?;
                if let FieldOutcome::Rejected(reason) = check_field(field, Some(&raw)) {
                    return Err(CalcError::invalid_schema(
                        &self.calculator,
                        format!("default for '{}' is invalid: {}", field.id, reason),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Full validation, discarding the bag
    pub fn validate(&self, raw: &RawInputs) -> ValidationResult {
        self.run(raw).result
    }

    /// Full validation pass.
    pub fn run(&self, raw: &RawInputs) -> Validation {
        let mut result = ValidationResult::new();
        let mut bag = InputBag::new();

        for field in &self.fields {
            match check_field(field, raw.get(&field.id)) {
                FieldOutcome::Accepted(value) => bag.insert(field.id.clone(), value),
                FieldOutcome::Absent => {
                    if let Some(default) = &field.default {
                        bag.insert(field.id.clone(), default.clone());
                    }
                }
                FieldOutcome::Rejected(message) => result.error(message),
            }
        }

        if result.is_valid() {
            for rule in &self.rules {
                if let Some(message) = rule.violation(&bag) {
                    result.error(message);
                }
            }
        }

        // warnings only accompany valid results
        if result.is_valid() {
            for (id, _) in raw.iter() {
                if self.field(id).is_none() {
                    result.warning(unknown_field_warning(id));
                }
            }
            for advisory in &self.advisories {
                if let Some(message) = advisory.warning(&bag) {
                    result.warning(message);
                }
            }
        }

        debug!(
            calculator = %self.calculator,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validation finished"
        );

        Validation { result, bag }
    }

    /// Bag of every context value that passes its own check, defaults applied
    fn lenient_bag(&self, raw: &RawInputs) -> InputBag {
        let mut bag = InputBag::new();
        for field in &self.fields {
            match check_field(field, raw.get(&field.id)) {
                FieldOutcome::Accepted(value) => bag.insert(field.id.clone(), value),
                FieldOutcome::Absent => {
                    if let Some(default) = &field.default {
                        bag.insert(field.id.clone(), default.clone());
                    }
                }
                FieldOutcome::Rejected(_) => {}
            }
        }
        bag
    }

    /// Check a single field as it is edited.
    ///
    /// `context` holds the other current values. Only the field's own check
    /// and the rules naming it run, so a rejection here is always a
    /// rejection of the full pass over `context` plus this value.
    ///
    /// ```rust
    /// use calc_core::schema::FieldSchema;
    /// use calc_core::validation::{CrossFieldRule, Validator};
    /// use calc_core::values::RawInputs;
    /// use serde_json::json;
    ///
    /// let validator = Validator::new("demo", vec![
    ///     FieldSchema::currency("loanAmount", "Loan amount"),
    ///     FieldSchema::currency("propertyValue", "Property value"),
    /// ])
    /// .with_rule(CrossFieldRule::new(
    ///     &["loanAmount", "propertyValue"],
    ///     "Loan amount cannot exceed property value",
    ///     |bag| bag.peek_number("loanAmount") <= bag.peek_number("propertyValue"),
    /// ));
    ///
    /// let context = RawInputs::new().with("propertyValue", 300_000);
    /// let check = validator.quick_validate("loanAmount", &json!(350_000), &context);
    /// assert!(!check.is_valid);
    /// assert!(validator.quick_validate("loanAmount", &json!(250_000), &context).is_valid);
    /// ```
    pub fn quick_validate(&self, field_id: &str, value: &serde_json::Value, context: &RawInputs) -> QuickCheck {
        let Some(schema) = self.field(field_id) else {
            return QuickCheck::valid().with_warning(Some(unknown_field_warning(field_id)));
        };

        if let FieldOutcome::Rejected(message) = check_field(schema, Some(value)) {
            return QuickCheck::invalid(message);
        }

        let bag = self.lenient_bag(&context.clone().with(field_id, value.clone()));

        if let Some(message) = self
            .rules
            .iter()
            .filter(|r| r.involves(field_id))
            .find_map(|r| r.violation(&bag))
        {
            return QuickCheck::invalid(message);
        }

        let warning = self
            .advisories
            .iter()
            .filter(|a| a.involves(field_id))
            .find_map(|a| a.warning(&bag));
        QuickCheck::valid().with_warning(warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Category, Unit};
    use proptest::prelude::*;
    use serde_json::json;

    fn loan_validator() -> Validator {
        Validator::new(
            "test",
            vec![
                FieldSchema::currency("loanAmount", "Loan amount").range(10_000.0, 10_000_000.0),
                FieldSchema::currency("propertyValue", "Property value").range(50_000.0, 10_000_000.0),
                FieldSchema::percentage("interestRate", "Interest rate", Unit::Percent)
                    .range(1.0, 20.0)
                    .default_value(5.0),
                FieldSchema::choice::<Category>("category", "Category").optional(),
            ],
        )
        .with_rule(CrossFieldRule::new(
            &["loanAmount", "propertyValue"],
            "Loan amount cannot exceed property value",
            |bag| bag.peek_number("loanAmount") <= bag.peek_number("propertyValue"),
        ))
        .with_advisory(Advisory::new(&["loanAmount", "propertyValue"], |bag| {
            let ltv = bag.peek_number("loanAmount")? / bag.peek_number("propertyValue")?;
            (ltv > 0.95).then(|| "Loan-to-value above 95%".to_string())
        }))
    }

    #[test]
    fn test_valid_bag_applies_defaults() {
        let raw = RawInputs::new().with("loanAmount", "200000").with("propertyValue", 300_000);
        let validation = loan_validator().run(&raw);
        assert!(validation.is_valid());
        assert_eq!(validation.bag.number("interestRate").unwrap(), 5.0);
        assert!(!validation.bag.contains("category"));
    }

    #[test]
    fn test_errors_aggregate() {
        let raw = RawInputs::new().with("propertyValue", "lots").with("interestRate", 30);
        let result = loan_validator().validate(&raw);
        assert_eq!(
            result.errors,
            vec![
                "Loan amount is required".to_string(),
                "Property value must be a valid number".to_string(),
                "Interest rate cannot exceed 20%".to_string(),
            ]
        );
    }

    #[test]
    fn test_cross_field_rule() {
        let raw = RawInputs::new().with("loanAmount", 350_000).with("propertyValue", 300_000);
        let result = loan_validator().validate(&raw);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("cannot exceed property value"));
        // advisories only accompany valid results
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_rules_wait_for_clean_fields() {
        let raw = RawInputs::new()
            .with("loanAmount", 350_000)
            .with("propertyValue", 300_000)
            .with("interestRate", 99);
        let result = loan_validator().validate(&raw);
        assert_eq!(result.errors, vec!["Interest rate cannot exceed 20%".to_string()]);
    }

    #[test]
    fn test_advisory_warning_keeps_valid() {
        let raw = RawInputs::new().with("loanAmount", 290_000).with("propertyValue", 300_000);
        let result = loan_validator().validate(&raw);
        assert!(result.is_valid());
        assert_eq!(result.warnings, vec!["Loan-to-value above 95%".to_string()]);
    }

    #[test]
    fn test_unknown_fields_warn() {
        let raw = RawInputs::new()
            .with("loanAmount", 100_000)
            .with("propertyValue", 300_000)
            .with("favouriteColour", "blue");
        let result = loan_validator().validate(&raw);
        assert!(result.is_valid());
        assert_eq!(result.warnings, vec!["Unknown field 'favouriteColour' was ignored".to_string()]);

        let raw = RawInputs::new().with("propertyValue", 300_000).with("favouriteColour", "blue");
        let result = loan_validator().validate(&raw);
        assert_eq!(result.errors, vec!["Loan amount is required".to_string()]);
        assert!(result.warnings.is_empty());

        let quick = loan_validator().quick_validate("favouriteColour", &json!("blue"), &RawInputs::new());
        assert!(quick.is_valid);
        assert!(quick.warning.is_some());
    }

    #[test]
    fn test_quick_validate_field_checks() {
        let v = loan_validator();
        let ctx = RawInputs::new();
        assert_eq!(
            v.quick_validate("loanAmount", &json!("abc"), &ctx),
            QuickCheck::invalid("Loan amount must be a valid number")
        );
        assert_eq!(
            v.quick_validate("loanAmount", &json!(""), &ctx),
            QuickCheck::invalid("Loan amount is required")
        );
        assert!(v.quick_validate("loanAmount", &json!(250_000), &ctx).is_valid);
    }

    #[test]
    fn test_quick_validate_warns() {
        let ctx = RawInputs::new().with("propertyValue", 300_000);
        let check = loan_validator().quick_validate("loanAmount", &json!(295_000), &ctx);
        assert!(check.is_valid);
        assert_eq!(check.warning.as_deref(), Some("Loan-to-value above 95%"));
    }

    #[test]
    fn test_wiring_rejects_unknown_rule_field() {
        let v = Validator::new("test", vec![FieldSchema::number("a", "A")])
            .with_rule(CrossFieldRule::new(&["a", "b"], "nope", |_| true));
        assert_eq!(v.check_wiring().unwrap_err().error_code(), "INVALID_SCHEMA");
    }

    #[test]
    fn test_wiring_rejects_bad_default() {
        let v = Validator::new(
            "test",
            vec![FieldSchema::number("term", "Term").range(10.0, 50.0).default_value(5.0)],
        );
        assert!(v.check_wiring().is_err());
        assert!(loan_validator().check_wiring().is_ok());
    }

    fn raw_value() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            Just(serde_json::Value::Null),
            Just(json!("")),
            Just(json!("not a number")),
            Just(json!("finance")),
            (0.0f64..20_000_000.0).prop_map(|n| json!(n)),
            (0.0f64..20_000_000.0).prop_map(|n| json!(n.to_string())),
            (0.0f64..40.0).prop_map(|n| json!(n)),
        ]
    }

    fn raw_bag() -> impl Strategy<Value = RawInputs> {
        proptest::collection::vec(
            (
                prop_oneof![
                    Just("loanAmount"),
                    Just("propertyValue"),
                    Just("interestRate"),
                    Just("category")
                ],
                raw_value(),
            ),
            0..5,
        )
        .prop_map(|pairs| {
            pairs
                .into_iter()
                .fold(RawInputs::new(), |raw, (id, value)| raw.with(id, value))
        })
    }

    proptest! {
        #[test]
        fn quick_rejection_implies_full_rejection(
            context in raw_bag(),
            field in prop_oneof![Just("loanAmount"), Just("propertyValue"), Just("interestRate"), Just("category")],
            value in raw_value(),
        ) {
            let v = loan_validator();
            let quick = v.quick_validate(field, &value, &context);
            if !quick.is_valid {
                let full = v.validate(&context.clone().with(field, value.clone()));
                prop_assert!(!full.is_valid());
            }
        }

        #[test]
        fn every_missing_required_field_is_named(has_loan: bool, has_value: bool) {
            let mut raw = RawInputs::new();
            if has_loan {
                raw.insert("loanAmount", 100_000);
            }
            if has_value {
                raw.insert("propertyValue", 300_000);
            }
            let result = loan_validator().validate(&raw);
            prop_assert_eq!(
                result.errors.contains(&"Loan amount is required".to_string()),
                !has_loan
            );
            prop_assert_eq!(
                result.errors.contains(&"Property value is required".to_string()),
                !has_value
            );
        }

        #[test]
        fn bounds_are_inclusive(min in -1.0e6f64..1.0e6, width in 1.0f64..1.0e6) {
            let max = min + width;
            let v = Validator::new("bounds", vec![FieldSchema::number("x", "X").range(min, max)]);
            let check = |n: f64| v.validate(&RawInputs::new().with("x", n)).is_valid();
            prop_assert!(check(min));
            prop_assert!(check(max));
            prop_assert!(!check(min - 1.0e-3));
            prop_assert!(!check(max + 1.0e-3));
        }

        #[test]
        fn validation_is_deterministic(raw in raw_bag()) {
            let v = loan_validator();
            prop_assert_eq!(v.run(&raw), v.run(&raw));
        }
    }
}
