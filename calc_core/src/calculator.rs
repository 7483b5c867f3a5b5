//! # Calculator Definitions
//!
//! A [`CalculatorDefinition`] bundles everything one calculator needs:
//! metadata, input and output schemas, a [`Validator`], a [`Computation`] and
//! a [`ReportGenerator`]. Definitions are built once, checked once at
//! [`build`](DefinitionBuilder::build) time and never mutated afterwards.
//!
//! ## Request lifecycle
//!
//! [`CalculatorDefinition::evaluate`] drives one request through
//! `Validating → Invalid` or `Validating → Computing → Reporting → Done`.
//! Nothing is kept between requests.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculator::{CalculatorDefinition, Evaluation};
//! use calc_core::errors::CalcResult;
//! use calc_core::schema::{Category, FieldSchema};
//! use calc_core::values::{Bag, InputBag, OutputBag, RawInputs};
//!
//! let doubler = CalculatorDefinition::builder("doubler", "Doubler", Category::Math)
//!     .input(FieldSchema::number("x", "X"))
//!     .output(FieldSchema::number("twice", "Twice X"))
//!     .computation(|inputs: &InputBag| -> CalcResult<OutputBag> {
//!         Ok(Bag::new().with("twice", inputs.number("x")? * 2.0))
//!     })
//!     .report(|_: &InputBag, outputs: &OutputBag| -> CalcResult<String> {
//!         Ok(format!("twice = {}", outputs.number("twice")?))
//!     })
//!     .build()
//!     .unwrap();
//!
//! match doubler.evaluate(&RawInputs::new().with("x", "21")).unwrap() {
//!     Evaluation::Completed { outputs, .. } => assert_eq!(outputs.number("twice").unwrap(), 42.0),
//!     Evaluation::Invalid { .. } => unreachable!(),
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{CalcError, CalcResult};
use crate::schema::{check_schema_set, Category, FieldSchema};
use crate::units::round_to;
use crate::validation::{Advisory, CrossFieldRule, QuickCheck, ValidationResult, Validator};
use crate::values::{InputBag, OutputBag, RawInputs, Value};

// ============================================================================
// Seams
// ============================================================================

/// Pure function from a validated input bag to an output bag.
///
/// Implementations may assume the bag passed validation and fail fast with
/// `MissingField` / `InvalidInput` if it did not.
pub trait Computation: Send + Sync {
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag>;
}

/// Pure formatter from (inputs, outputs) to report text. Never computes.
pub trait ReportGenerator: Send + Sync {
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String>;
}

impl<F> Computation for F
where
    F: Fn(&InputBag) -> CalcResult<OutputBag> + Send + Sync,
{
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        self(inputs)
    }
}

impl<F> ReportGenerator for F
where
    F: Fn(&InputBag, &OutputBag) -> CalcResult<String> + Send + Sync,
{
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        self(inputs, outputs)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Descriptive metadata shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub subcategory: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Documentation of one formula the computation applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,
    pub expression: String,
    pub description: String,
}

/// Named sample input bag; always valid for its calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    pub inputs: RawInputs,
}

/// Outcome of a full request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Evaluation {
    /// Validation failed; nothing was computed
    Invalid { validation: ValidationResult },
    Completed {
        outputs: OutputBag,
        report: String,
        warnings: Vec<String>,
    },
}

impl Evaluation {
    pub fn is_completed(&self) -> bool {
        matches!(self, Evaluation::Completed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Validating,
    Invalid,
    Computing,
    Reporting,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Invalid => "invalid",
            Stage::Computing => "computing",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
        }
    }
}

// ============================================================================
// Definition
// ============================================================================

/// An immutable, fully checked calculator.
pub struct CalculatorDefinition {
    meta: CalculatorMeta,
    validator: Validator,
    outputs: Vec<FieldSchema>,
    computation: Arc<dyn Computation>,
    report: Arc<dyn ReportGenerator>,
    formulas: Vec<Formula>,
    examples: Vec<Example>,
}

impl fmt::Debug for CalculatorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatorDefinition")
            .field("meta", &self.meta)
            .field("validator", &self.validator)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl CalculatorDefinition {
    pub fn builder(id: impl Into<String>, name: impl Into<String>, category: Category) -> DefinitionBuilder {
        DefinitionBuilder::new(id.into(), name.into(), category)
    }

    pub fn meta(&self) -> &CalculatorMeta {
        &self.meta
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn category(&self) -> Category {
        self.meta.category
    }

    pub fn inputs(&self) -> &[FieldSchema] {
        self.validator.fields()
    }

    pub fn outputs(&self) -> &[FieldSchema] {
        &self.outputs
    }

    pub fn rules(&self) -> &[CrossFieldRule] {
        self.validator.rules()
    }

    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn validate(&self, raw: &RawInputs) -> ValidationResult {
        self.validator.validate(raw)
    }

    pub fn quick_validate(&self, field_id: &str, value: &serde_json::Value, context: &RawInputs) -> QuickCheck {
        self.validator.quick_validate(field_id, value, context)
    }

    /// Run the computation and normalise its outputs.
    ///
    /// Every declared output must be present and finite; numbers are rounded
    /// to their schema precision here and nowhere else.
    pub fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        let mut outputs = self.computation.compute(inputs).inspect_err(|e| {
            warn!(calculator = %self.meta.id, error = %e, "computation failed");
        })?;
        self.finalize_outputs(&mut outputs)?;
        Ok(outputs)
    }

    fn finalize_outputs(&self, outputs: &mut OutputBag) -> CalcResult<()> {
        let failed = |reason: String| CalcError::calculation_failed(&self.meta.id, reason);

        for (id, _) in outputs.iter() {
            if !self.outputs.iter().any(|o| &o.id == id) {
                return Err(failed(format!("undeclared output '{}'", id)));
            }
        }

        for schema in &self.outputs {
            let decimals = schema.output_precision();
            match outputs.get_mut(&schema.id) {
                None => return Err(failed(format!("output '{}' was not produced", schema.id))),
                Some(Value::Number(n)) => {
                    if !n.is_finite() {
                        return Err(failed(format!("output '{}' is not a finite number", schema.id)));
                    }
                    *n = round_to(*n, decimals);
                }
                Some(Value::Series(values)) => {
                    if values.iter().any(|v| !v.is_finite()) {
                        return Err(failed(format!("output '{}' contains a non-finite value", schema.id)));
                    }
                    for v in values.iter_mut() {
                        *v = round_to(*v, decimals);
                    }
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn generate_report(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        self.report.generate(inputs, outputs)
    }

    fn enter(&self, stage: Stage) {
        debug!(calculator = %self.meta.id, state = stage.as_str(), "request state");
    }

    /// Full pipeline: validate, compute, report.
    ///
    /// Invalid input is a normal outcome ([`Evaluation::Invalid`]); `Err` is
    /// reserved for computations that fail on a validated bag.
    pub fn evaluate(&self, raw: &RawInputs) -> CalcResult<Evaluation> {
        self.enter(Stage::Validating);
        let validation = self.validator.run(raw);
        if !validation.is_valid() {
            self.enter(Stage::Invalid);
            return Ok(Evaluation::Invalid {
                validation: validation.result,
            });
        }

        self.enter(Stage::Computing);
        let outputs = self.compute(&validation.bag)?;

        self.enter(Stage::Reporting);
        let report = self.generate_report(&validation.bag, &outputs)?;

        self.enter(Stage::Done);
        Ok(Evaluation::Completed {
            outputs,
            report,
            warnings: validation.result.warnings,
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`CalculatorDefinition`]
pub struct DefinitionBuilder {
    meta: CalculatorMeta,
    inputs: Vec<FieldSchema>,
    outputs: Vec<FieldSchema>,
    rules: Vec<CrossFieldRule>,
    advisories: Vec<Advisory>,
    computation: Option<Arc<dyn Computation>>,
    report: Option<Arc<dyn ReportGenerator>>,
    formulas: Vec<Formula>,
    examples: Vec<Example>,
}

impl DefinitionBuilder {
    fn new(id: String, name: String, category: Category) -> Self {
        DefinitionBuilder {
            meta: CalculatorMeta {
                id,
                name,
                description: String::new(),
                category,
                subcategory: String::new(),
                tags: Vec::new(),
            },
            inputs: Vec::new(),
            outputs: Vec::new(),
            rules: Vec::new(),
            advisories: Vec::new(),
            computation: None,
            report: None,
            formulas: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.meta.description = text.into();
        self
    }

    pub fn subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.meta.subcategory = subcategory.into();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.meta.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn input(mut self, field: FieldSchema) -> Self {
        self.inputs.push(field);
        self
    }

    pub fn output(mut self, field: FieldSchema) -> Self {
        self.outputs.push(field);
        self
    }

    pub fn rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn advisory(mut self, advisory: Advisory) -> Self {
        self.advisories.push(advisory);
        self
    }

    pub fn computation(mut self, computation: impl Computation + 'static) -> Self {
        self.computation = Some(Arc::new(computation));
        self
    }

    pub fn report(mut self, report: impl ReportGenerator + 'static) -> Self {
        self.report = Some(Arc::new(report));
        self
    }

    /// Use one value as both computation and report generator
    pub fn engine<E>(mut self, engine: E) -> Self
    where
        E: Computation + ReportGenerator + 'static,
    {
        let engine = Arc::new(engine);
        self.computation = Some(engine.clone());
        self.report = Some(engine);
        self
    }

    pub fn formula(mut self, name: &str, expression: &str, description: &str) -> Self {
        self.formulas.push(Formula {
            name: name.to_string(),
            expression: expression.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn example(mut self, name: &str, inputs: RawInputs) -> Self {
        self.examples.push(Example {
            name: name.to_string(),
            inputs,
        });
        self
    }

    /// Check the definition and freeze it.
    ///
    /// Fails with `InvalidSchema` on duplicate field ids, inconsistent field
    /// constraints, rules naming undeclared fields, a missing computation or
    /// report generator, or an example that does not validate.
    pub fn build(self) -> CalcResult<CalculatorDefinition> {
        let id = self.meta.id.clone();
        if id.trim().is_empty() {
            return Err(CalcError::invalid_schema(id, "calculator id cannot be empty"));
        }
        check_schema_set(&id, &self.inputs, &self.outputs)?;

        let computation = self
            .computation
            .ok_or_else(|| CalcError::invalid_schema(&id, "no computation supplied"))?;
        let report = self
            .report
            .ok_or_else(|| CalcError::invalid_schema(&id, "no report generator supplied"))?;

        let validator = self
            .rules
            .into_iter()
            .fold(Validator::new(&id, self.inputs), Validator::with_rule);
        let validator = self.advisories.into_iter().fold(validator, Validator::with_advisory);
        validator.check_wiring()?;

        for example in &self.examples {
            let result = validator.validate(&example.inputs);
            if !result.is_valid() {
                return Err(CalcError::invalid_schema(
                    &id,
                    format!("example '{}' does not validate: {}", example.name, result.errors.join("; ")),
                ));
            }
        }

        debug!(calculator = %id, inputs = validator.fields().len(), outputs = self.outputs.len(), "calculator defined");

        Ok(CalculatorDefinition {
            meta: self.meta,
            validator,
            outputs: self.outputs,
            computation,
            report,
            formulas: self.formulas,
            examples: self.examples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Bag;

    fn ratio_calculator() -> DefinitionBuilder {
        CalculatorDefinition::builder("ratio", "Ratio", Category::Math)
            .subcategory("arithmetic")
            .input(FieldSchema::number("a", "A"))
            .input(FieldSchema::number("b", "B"))
            .output(FieldSchema::number("ratio", "Ratio").precision(2))
            .computation(|inputs: &InputBag| -> CalcResult<OutputBag> {
                let b = inputs.number("b")?;
                if b == 0.0 {
                    return Err(CalcError::calculation_failed("ratio", "division by zero"));
                }
                Ok(Bag::new().with("ratio", inputs.number("a")? / b))
            })
            .report(|_: &InputBag, outputs: &OutputBag| -> CalcResult<String> {
                Ok(format!("ratio {}", outputs.number("ratio")?))
            })
    }

    #[test]
    fn test_evaluate_rounds_at_boundary() {
        let calc = ratio_calculator().build().unwrap();
        let raw = RawInputs::new().with("a", 1).with("b", 3);
        match calc.evaluate(&raw).unwrap() {
            Evaluation::Completed { outputs, report, warnings } => {
                assert_eq!(outputs.number("ratio").unwrap(), 0.33);
                assert_eq!(report, "ratio 0.33");
                assert!(warnings.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_invalid_skips_compute() {
        let calc = ratio_calculator().build().unwrap();
        let evaluation = calc.evaluate(&RawInputs::new().with("a", 1)).unwrap();
        match evaluation {
            Evaluation::Invalid { validation } => {
                assert_eq!(validation.errors, vec!["B is required".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_singularity_fails_loudly() {
        let calc = ratio_calculator().build().unwrap();
        let err = calc.evaluate(&RawInputs::new().with("a", 1).with("b", 0)).unwrap_err();
        assert_eq!(err.error_code(), "CALCULATION_FAILED");
    }

    #[test]
    fn test_unvalidated_bag_fails_fast() {
        let calc = ratio_calculator().build().unwrap();
        let err = calc.compute(&Bag::new().with("a", 1.0)).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELD");
    }

    #[test]
    fn test_missing_output_rejected() {
        let calc = CalculatorDefinition::builder("broken", "Broken", Category::Math)
            .input(FieldSchema::number("a", "A"))
            .output(FieldSchema::number("b", "B"))
            .computation(|_: &InputBag| -> CalcResult<OutputBag> { Ok(Bag::new()) })
            .report(|_: &InputBag, _: &OutputBag| -> CalcResult<String> { Ok(String::new()) })
            .build()
            .unwrap();
        let err = calc.compute(&Bag::new().with("a", 1.0)).unwrap_err();
        assert!(err.to_string().contains("was not produced"));
    }

    #[test]
    fn test_non_finite_output_rejected() {
        let calc = CalculatorDefinition::builder("nan", "NaN", Category::Math)
            .input(FieldSchema::number("a", "A"))
            .output(FieldSchema::number("b", "B"))
            .computation(|_: &InputBag| -> CalcResult<OutputBag> { Ok(Bag::new().with("b", f64::NAN)) })
            .report(|_: &InputBag, _: &OutputBag| -> CalcResult<String> { Ok(String::new()) })
            .build()
            .unwrap();
        assert!(calc.compute(&Bag::new().with("a", 1.0)).is_err());
    }

    #[test]
    fn test_build_requires_engine() {
        let err = CalculatorDefinition::builder("empty", "Empty", Category::Math)
            .input(FieldSchema::number("a", "A"))
            .build()
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SCHEMA");
    }

    #[test]
    fn test_build_rejects_invalid_example() {
        let err = ratio_calculator()
            .example("broken", RawInputs::new().with("a", 1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("example 'broken'"));
    }

    #[test]
    fn test_evaluation_serializes_with_status() {
        let calc = ratio_calculator().build().unwrap();
        let evaluation = calc.evaluate(&RawInputs::new().with("a", 2).with("b", 4)).unwrap();
        let json = serde_json::to_value(&evaluation).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["outputs"]["ratio"], 0.5);
    }
}
