//! # Loan-to-Value
//!
//! Leverage of a mortgage against the property securing it. All ratios in
//! this calculator are fractions (`0.8` = 80%).
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculators::loan_to_value::{calculate, LtvInput};
//! use calc_core::settings::LtvSettings;
//! use calc_core::units::Money;
//!
//! let input = LtvInput::new(Money(400_000.0), Money(500_000.0));
//! let result = calculate(&input, &LtvSettings::default()).unwrap();
//! assert_eq!(result.loan_to_value_ratio.0, 0.8);
//! assert_eq!(result.equity_position.0, 100_000.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::calculator::{CalculatorDefinition, Computation, ReportGenerator};
use crate::errors::{CalcError, CalcResult};
use crate::report::{format_fraction, ReportBuilder};
use crate::schema::{choice_enum, Category, Choice, FieldSchema, Unit};
use crate::settings::{LtvSettings, Settings};
use crate::units::{Fraction, Money};
use crate::validation::{Advisory, CrossFieldRule};
use crate::values::{Bag, InputBag, OutputBag, RawInputs};

pub const ID: &str = "loan-to-value";

/// Tolerance when reconciling down payment + loan with purchase price
const PRICE_TOLERANCE: f64 = 1.0;

choice_enum! {
    /// Mortgage program
    pub enum LoanType {
        Conventional => ("conventional", "Conventional"),
        Fha => ("fha", "FHA"),
        Va => ("va", "VA"),
        Usda => ("usda", "USDA"),
        Jumbo => ("jumbo", "Jumbo"),
    }
}

impl LoanType {
    /// Whether the program charges mortgage insurance at this LTV
    pub fn requires_insurance(self, ltv: Fraction, threshold: Fraction) -> bool {
        match self {
            LoanType::Conventional | LoanType::Jumbo => ltv.0 > threshold.0,
            // FHA MIP and the USDA guarantee fee apply at any LTV
            LoanType::Fha | LoanType::Usda => true,
            LoanType::Va => false,
        }
    }
}

/// Qualitative leverage band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LtvRating {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
}

impl LtvRating {
    /// Classify against ascending band upper bounds
    pub fn classify(ltv: Fraction, bands: &[f64; 4]) -> Self {
        match ltv.0 {
            x if x <= bands[0] => LtvRating::Excellent,
            x if x <= bands[1] => LtvRating::Good,
            x if x <= bands[2] => LtvRating::Average,
            x if x <= bands[3] => LtvRating::Poor,
            _ => LtvRating::VeryPoor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LtvRating::Excellent => "Excellent",
            LtvRating::Good => "Good",
            LtvRating::Average => "Average",
            LtvRating::Poor => "Poor",
            LtvRating::VeryPoor => "Very Poor",
        }
    }
}

// ============================================================================
// Input / Result
// ============================================================================

/// Typed loan-to-value inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtvInput {
    pub loan_amount: Money,
    pub property_value: Money,
    pub second_mortgage_balance: Money,
    /// Annual PMI premium as a fraction of the loan
    pub pmi_rate: Fraction,
    /// LTV above which conventional loans carry PMI
    pub pmi_threshold: Fraction,
    /// Program LTV limit used for the maximum loan
    pub max_ltv_ratio: Fraction,
    pub loan_type: LoanType,
}

impl LtvInput {
    /// Conventional loan with the usual 80% thresholds
    pub fn new(loan_amount: Money, property_value: Money) -> Self {
        LtvInput {
            loan_amount,
            property_value,
            second_mortgage_balance: Money(0.0),
            pmi_rate: Fraction(0.005),
            pmi_threshold: Fraction(0.8),
            max_ltv_ratio: Fraction(0.8),
            loan_type: LoanType::Conventional,
        }
    }

    pub fn from_bag(bag: &InputBag) -> CalcResult<Self> {
        Ok(LtvInput {
            loan_amount: Money(bag.number("loanAmount")?),
            property_value: Money(bag.number("propertyValue")?),
            second_mortgage_balance: Money(bag.number("secondMortgageBalance")?),
            pmi_rate: Fraction(bag.number("pmiRate")?),
            pmi_threshold: Fraction(bag.number("pmiThreshold")?),
            max_ltv_ratio: Fraction(bag.number("maxLtvRatio")?),
            loan_type: bag.choice("loanType")?,
        })
    }
}

/// Loan-to-value results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtvResult {
    pub loan_to_value_ratio: Fraction,
    pub combined_ltv_ratio: Fraction,
    pub equity_position: Money,
    pub equity_percentage: Fraction,
    pub pmi_required: bool,
    pub annual_pmi_cost: Money,
    pub maximum_loan_amount: Money,
    pub rating: LtvRating,
}

impl LtvResult {
    pub fn into_bag(self) -> OutputBag {
        Bag::new()
            .with("loanToValueRatio", self.loan_to_value_ratio.0)
            .with("combinedLtvRatio", self.combined_ltv_ratio.0)
            .with("equityPosition", self.equity_position.0)
            .with("equityPercentage", self.equity_percentage.0)
            .with("pmiRequired", self.pmi_required)
            .with("annualPmiCost", self.annual_pmi_cost.0)
            .with("maximumLoanAmount", self.maximum_loan_amount.0)
            .with("ltvRating", self.rating.label())
    }
}

/// Compute loan-to-value metrics.
pub fn calculate(input: &LtvInput, settings: &LtvSettings) -> CalcResult<LtvResult> {
    let value = input.property_value;
    if value.0 <= 0.0 {
        return Err(CalcError::calculation_failed(ID, "property value must be positive"));
    }

    let ltv = Fraction(input.loan_amount.0 / value.0);
    let total_debt = input.loan_amount + input.second_mortgage_balance;
    let cltv = Fraction(total_debt.0 / value.0);
    let equity = value - total_debt;

    let pmi_required = input.loan_type.requires_insurance(ltv, input.pmi_threshold);
    let annual_pmi_cost = if pmi_required {
        input.pmi_rate.of(input.loan_amount)
    } else {
        Money(0.0)
    };

    Ok(LtvResult {
        loan_to_value_ratio: ltv,
        combined_ltv_ratio: cltv,
        equity_position: equity,
        equity_percentage: Fraction(equity.0 / value.0),
        pmi_required,
        annual_pmi_cost,
        maximum_loan_amount: (input.max_ltv_ratio.of(value) - input.second_mortgage_balance).non_negative(),
        rating: LtvRating::classify(ltv, &settings.rating_bands),
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Computation and report generator for loan-to-value
#[derive(Debug, Clone)]
pub struct LoanToValue {
    settings: LtvSettings,
}

impl LoanToValue {
    pub fn new(settings: LtvSettings) -> Self {
        LoanToValue { settings }
    }
}

impl Computation for LoanToValue {
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        let input = LtvInput::from_bag(inputs)?;
        Ok(calculate(&input, &self.settings)?.into_bag())
    }
}

impl ReportGenerator for LoanToValue {
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        let ins = input_fields();
        let outs = output_fields();
        let mut report = ReportBuilder::new("Loan-to-Value Analysis", ID);

        report.section("Loan Details");
        for id in ["loanAmount", "propertyValue", "purchasePrice", "downPayment", "secondMortgageBalance", "loanType"] {
            report.field_if_present(&ins, inputs, id)?;
        }

        report.section("Leverage");
        for id in ["loanToValueRatio", "combinedLtvRatio", "ltvRating", "equityPosition", "equityPercentage"] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Mortgage Insurance");
        report.field(&outs, outputs, "pmiRequired")?;
        if outputs.flag("pmiRequired")? {
            report.field(&outs, outputs, "annualPmiCost")?;
        }
        report.field(&outs, outputs, "maximumLoanAmount")?;

        let ltv = outputs.number("loanToValueRatio")?;
        let rating = outputs.text("ltvRating")?;
        report.section("Summary");
        report.paragraph(format!(
            "A loan-to-value ratio of {} is rated {}. {}",
            format_fraction(ltv),
            rating,
            if outputs.flag("pmiRequired")? {
                "Mortgage insurance applies to this loan."
            } else {
                "No mortgage insurance is required."
            }
        ));

        Ok(report.finish())
    }
}

// ============================================================================
// Definition
// ============================================================================

fn input_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("loanAmount", "Loan amount").range(10_000.0, 50_000_000.0),
        FieldSchema::currency("propertyValue", "Property value").range(10_000.0, 50_000_000.0),
        FieldSchema::currency("purchasePrice", "Purchase price")
            .range(10_000.0, 50_000_000.0)
            .optional(),
        FieldSchema::currency("downPayment", "Down payment")
            .range(0.0, 50_000_000.0)
            .optional(),
        FieldSchema::currency("secondMortgageBalance", "Second mortgage balance")
            .range(0.0, 50_000_000.0)
            .default_value(0.0),
        FieldSchema::percentage("pmiRate", "Annual PMI rate", Unit::Fraction)
            .range(0.0, 0.05)
            .default_value(0.005)
            .help("Annual premium as a fraction of the loan, e.g. 0.005"),
        FieldSchema::percentage("pmiThreshold", "PMI threshold", Unit::Fraction)
            .range(0.5, 1.0)
            .default_value(0.8),
        FieldSchema::percentage("maxLtvRatio", "Maximum LTV", Unit::Fraction)
            .range(0.5, 1.0)
            .default_value(0.8),
        FieldSchema::choice::<LoanType>("loanType", "Loan type").default_value(LoanType::Conventional.value()),
    ]
}

fn output_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::percentage("loanToValueRatio", "Loan-to-value ratio", Unit::Fraction),
        FieldSchema::percentage("combinedLtvRatio", "Combined LTV", Unit::Fraction),
        FieldSchema::currency("equityPosition", "Equity position"),
        FieldSchema::percentage("equityPercentage", "Equity percentage", Unit::Fraction),
        FieldSchema::boolean("pmiRequired", "PMI required"),
        FieldSchema::currency("annualPmiCost", "Annual PMI cost"),
        FieldSchema::currency("maximumLoanAmount", "Maximum loan amount"),
        FieldSchema::text("ltvRating", "LTV rating"),
    ]
}

/// The loan-to-value calculator
pub fn definition(settings: &Settings) -> CalcResult<CalculatorDefinition> {
    settings.validate()?;
    let warning_level = settings.ltv.warning_level;

    let mut builder = CalculatorDefinition::builder(ID, "Loan-to-Value Calculator", Category::Finance)
        .subcategory("mortgage")
        .description("Loan-to-value and combined LTV, equity position and mortgage insurance requirement")
        .tags(&["mortgage", "ltv", "equity", "pmi"]);
    for field in input_fields() {
        builder = builder.input(field);
    }
    for field in output_fields() {
        builder = builder.output(field);
    }

    builder
        .rule(CrossFieldRule::new(
            &["loanAmount", "propertyValue"],
            "Loan amount cannot exceed property value",
            |bag| bag.peek_number("loanAmount") <= bag.peek_number("propertyValue"),
        ))
        .rule(CrossFieldRule::new(
            &["loanAmount", "downPayment", "purchasePrice"],
            "Down payment plus loan amount must equal purchase price",
            |bag| match (
                bag.peek_number("loanAmount"),
                bag.peek_number("downPayment"),
                bag.peek_number("purchasePrice"),
            ) {
                (Some(loan), Some(down), Some(price)) => (loan + down - price).abs() <= PRICE_TOLERANCE,
                _ => true,
            },
        ))
        .advisory(Advisory::new(&["loanAmount", "propertyValue"], move |bag| {
            let ltv = bag.peek_number("loanAmount")? / bag.peek_number("propertyValue")?;
            (ltv > warning_level).then(|| {
                format!(
                    "Loan-to-value above {} leaves little equity cushion",
                    format_fraction(warning_level)
                )
            })
        }))
        .advisory(Advisory::new(
            &["loanAmount", "secondMortgageBalance", "propertyValue"],
            |bag| {
                let debt = bag.peek_number("loanAmount")? + bag.peek_number("secondMortgageBalance")?;
                (debt > bag.peek_number("propertyValue")?)
                    .then(|| "Combined mortgage debt exceeds the property value".to_string())
            },
        ))
        .engine(LoanToValue::new(settings.ltv.clone()))
        .formula("LTV", "loanAmount / propertyValue", "First-lien leverage")
        .formula(
            "Combined LTV",
            "(loanAmount + secondMortgageBalance) / propertyValue",
            "Leverage across all liens",
        )
        .formula(
            "Equity",
            "propertyValue - loanAmount - secondMortgageBalance",
            "Owner's stake in the property",
        )
        .formula(
            "Maximum loan",
            "propertyValue × maxLtvRatio - secondMortgageBalance",
            "Largest first lien within the program limit",
        )
        .example(
            "Conventional 80% LTV",
            RawInputs::new().with("loanAmount", 400_000).with("propertyValue", 500_000),
        )
        .example(
            "Purchase with second mortgage",
            RawInputs::new()
                .with("loanAmount", 360_000)
                .with("propertyValue", 400_000)
                .with("purchasePrice", 400_000)
                .with("downPayment", 40_000)
                .with("secondMortgageBalance", 20_000)
                .with("pmiRate", 0.0075),
        )
        .example(
            "FHA purchase",
            RawInputs::new()
                .with("loanAmount", 289_500)
                .with("propertyValue", 300_000)
                .with("loanType", "fha")
                .with("maxLtvRatio", 0.965),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Evaluation;

    fn calculator() -> CalculatorDefinition {
        definition(&Settings::default()).unwrap()
    }

    fn outputs_for(raw: &RawInputs) -> OutputBag {
        match calculator().evaluate(raw).unwrap() {
            Evaluation::Completed { outputs, .. } => outputs,
            Evaluation::Invalid { validation } => panic!("invalid: {:?}", validation.errors),
        }
    }

    #[test]
    fn test_basic_ltv() {
        let outputs = outputs_for(&RawInputs::new().with("loanAmount", 400_000).with("propertyValue", 500_000));
        assert_eq!(outputs.number("loanToValueRatio").unwrap(), 0.8);
        assert_eq!(outputs.number("equityPosition").unwrap(), 100_000.0);
        assert_eq!(outputs.number("equityPercentage").unwrap(), 0.2);
        assert_eq!(outputs.flag("pmiRequired").unwrap(), false);
        assert_eq!(outputs.number("annualPmiCost").unwrap(), 0.0);
        assert_eq!(outputs.number("maximumLoanAmount").unwrap(), 400_000.0);
        assert_eq!(outputs.text("ltvRating").unwrap(), "Average");
    }

    #[test]
    fn test_pmi_above_threshold() {
        let outputs = outputs_for(&RawInputs::new().with("loanAmount", 450_000).with("propertyValue", 500_000));
        assert_eq!(outputs.number("loanToValueRatio").unwrap(), 0.9);
        assert!(outputs.flag("pmiRequired").unwrap());
        assert_eq!(outputs.number("annualPmiCost").unwrap(), 2250.0);
        assert_eq!(outputs.text("ltvRating").unwrap(), "Very Poor");
    }

    #[test]
    fn test_program_rules() {
        let threshold = Fraction(0.8);
        assert!(LoanType::Fha.requires_insurance(Fraction(0.5), threshold));
        assert!(!LoanType::Va.requires_insurance(Fraction(1.0), threshold));
        assert!(!LoanType::Conventional.requires_insurance(Fraction(0.8), threshold));
    }

    #[test]
    fn test_rating_bands() {
        let bands = LtvSettings::default().rating_bands;
        assert_eq!(LtvRating::classify(Fraction(0.65), &bands), LtvRating::Excellent);
        assert_eq!(LtvRating::classify(Fraction(0.75), &bands), LtvRating::Good);
        assert_eq!(LtvRating::classify(Fraction(0.85), &bands), LtvRating::Poor);
        assert_eq!(LtvRating::classify(Fraction(0.86), &bands), LtvRating::VeryPoor);
    }

    #[test]
    fn test_combined_ltv() {
        let raw = RawInputs::new()
            .with("loanAmount", 360_000)
            .with("propertyValue", 400_000)
            .with("secondMortgageBalance", 20_000);
        let outputs = outputs_for(&raw);
        assert_eq!(outputs.number("combinedLtvRatio").unwrap(), 0.95);
        assert_eq!(outputs.number("equityPosition").unwrap(), 20_000.0);
        assert_eq!(outputs.number("maximumLoanAmount").unwrap(), 300_000.0);
    }

    #[test]
    fn test_loan_exceeding_value_rejected() {
        let result = calculator().validate(&RawInputs::new().with("propertyValue", 300_000).with("loanAmount", 350_000));
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("cannot exceed property value"));
    }

    #[test]
    fn test_purchase_price_reconciliation() {
        let base = RawInputs::new()
            .with("loanAmount", 360_000)
            .with("propertyValue", 400_000)
            .with("purchasePrice", 400_000);
        assert!(calculator().validate(&base.clone().with("downPayment", 40_000)).is_valid());
        assert!(calculator().validate(&base.clone().with("downPayment", 40_000.5)).is_valid());
        let result = calculator().validate(&base.with("downPayment", 30_000));
        assert_eq!(
            result.errors,
            vec!["Down payment plus loan amount must equal purchase price".to_string()]
        );
    }

    #[test]
    fn test_high_ltv_warning() {
        let raw = RawInputs::new().with("loanAmount", 290_000).with("propertyValue", 300_000);
        let result = calculator().validate(&raw);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("95.00%"));
    }

    #[test]
    fn test_fraction_inputs_rejected_as_percent() {
        let result = calculator().validate(
            &RawInputs::new()
                .with("loanAmount", 400_000)
                .with("propertyValue", 500_000)
                .with("pmiThreshold", 80),
        );
        assert_eq!(result.errors, vec!["PMI threshold cannot exceed 100%".to_string()]);
    }

    #[test]
    fn test_report() {
        match calculator()
            .evaluate(&RawInputs::new().with("loanAmount", 400_000).with("propertyValue", 500_000))
            .unwrap()
        {
            Evaluation::Completed { report, .. } => {
                assert!(report.contains("- Loan-to-value ratio: 80.00%"));
                assert!(report.contains("- PMI required: no"));
                assert!(report.contains("rated Average"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
