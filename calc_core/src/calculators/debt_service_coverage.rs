//! # Debt Service Coverage Ratio
//!
//! Income-property underwriting: how many times net operating income covers
//! the annual mortgage payments, and the largest loan the income supports at
//! the lender's minimum coverage.
//!
//! ## Method
//!
//! - EGI = gross rent × (1 − vacancy) + other income
//! - NOI = EGI − operating expenses
//! - DSCR = NOI / annual debt service
//! - Maximum loan = principal whose payment equals NOI / required DSCR
//!
//! Rates here are whole-number percents.

use serde::{Deserialize, Serialize};

use crate::calculator::{CalculatorDefinition, Computation, ReportGenerator};
use crate::equations::amortization::{monthly_payment, principal_for_payment};
use crate::errors::{CalcError, CalcResult};
use crate::report::{format_currency, format_fraction, ReportBuilder};
use crate::schema::{choice_enum, Category, Choice, FieldSchema, Unit};
use crate::settings::{DscrSettings, Settings};
use crate::units::{Fraction, Money, Percent, Years};
use crate::validation::{Advisory, CrossFieldRule};
use crate::values::{Bag, InputBag, OutputBag, RawInputs, Value};

pub const ID: &str = "debt-service-coverage-ratio";

choice_enum! {
    /// Income property type
    pub enum PropertyType {
        Office => ("office", "Office Building"),
        Retail => ("retail", "Retail/Commercial"),
        Industrial => ("industrial", "Industrial/Warehouse"),
        Multifamily => ("multifamily", "Multifamily"),
        Hotel => ("hotel", "Hotel/Motel"),
        Medical => ("medical", "Medical Office"),
        MixedUse => ("mixed-use", "Mixed-Use"),
        SelfStorage => ("self-storage", "Self-Storage"),
    }
}

/// Coverage risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskRating {
    Strong,
    Adequate,
    HighRisk,
}

impl RiskRating {
    pub fn classify(dscr: f64, settings: &DscrSettings) -> Self {
        if dscr >= settings.strong_band {
            RiskRating::Strong
        } else if dscr >= settings.marginal_band {
            RiskRating::Adequate
        } else {
            RiskRating::HighRisk
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskRating::Strong => "Strong",
            RiskRating::Adequate => "Adequate",
            RiskRating::HighRisk => "High Risk",
        }
    }
}

// ============================================================================
// Input / Result
// ============================================================================

/// Typed DSCR inputs. Income and expense amounts are annual.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DscrInput {
    pub property_type: PropertyType,
    pub gross_rental_income: Money,
    pub other_income: Money,
    pub vacancy_rate: Percent,
    pub operating_expenses: Money,
    /// Replacement reserves, taken out of cash flow only
    pub reserves: Money,
    pub loan_amount: Money,
    pub interest_rate: Percent,
    pub amortization_period: Years,
    pub property_value: Option<Money>,
    pub lender_dscr: f64,
}

impl DscrInput {
    pub fn from_bag(bag: &InputBag) -> CalcResult<Self> {
        Ok(DscrInput {
            property_type: bag.choice("propertyType")?,
            gross_rental_income: Money(bag.number("grossRentalIncome")?),
            other_income: Money(bag.number("otherIncome")?),
            vacancy_rate: Percent(bag.number("vacancyRate")?),
            operating_expenses: Money(bag.number("operatingExpenses")?),
            reserves: Money(bag.number("reserves")?),
            loan_amount: Money(bag.number("loanAmount")?),
            interest_rate: Percent(bag.number("interestRate")?),
            amortization_period: Years(bag.number("amortizationPeriod")?),
            property_value: bag.opt_number("propertyValue")?.map(Money),
            lender_dscr: bag.number("lenderDscr")?,
        })
    }
}

/// DSCR results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DscrResult {
    pub effective_gross_income: Money,
    pub net_operating_income: Money,
    pub annual_debt_service: Money,
    pub dscr: f64,
    pub dscr_margin: f64,
    pub cash_flow: Money,
    pub debt_yield: Percent,
    pub break_even_occupancy: Percent,
    pub maximum_loan_amount: Money,
    pub loan_to_value: Option<Percent>,
    pub risk_rating: RiskRating,
}

impl DscrResult {
    pub fn into_bag(self) -> OutputBag {
        let ltv = match self.loan_to_value {
            Some(ltv) => Value::Number(ltv.0),
            None => Value::unavailable("no property value supplied"),
        };
        Bag::new()
            .with("effectiveGrossIncome", self.effective_gross_income.0)
            .with("netOperatingIncome", self.net_operating_income.0)
            .with("annualDebtService", self.annual_debt_service.0)
            .with("dscr", self.dscr)
            .with("dscrMargin", self.dscr_margin)
            .with("cashFlow", self.cash_flow.0)
            .with("debtYield", self.debt_yield.0)
            .with("breakEvenOccupancy", self.break_even_occupancy.0)
            .with("maximumLoanAmount", self.maximum_loan_amount.0)
            .with("loanToValue", ltv)
            .with("riskRating", self.risk_rating.label())
    }
}

/// Coverage, cash flow and loan sizing for one property.
pub fn calculate(input: &DscrInput, settings: &DscrSettings) -> CalcResult<DscrResult> {
    let rate: Fraction = input.interest_rate.into();
    let vacancy: Fraction = input.vacancy_rate.into();
    let months = input.amortization_period.0 * 12.0;

    let potential_income = input.gross_rental_income + input.other_income;
    let effective_gross_income = input.gross_rental_income * (1.0 - vacancy.0) + input.other_income;
    let net_operating_income = effective_gross_income - input.operating_expenses;

    let annual_debt_service = Money(monthly_payment(input.loan_amount.0, rate.0, months)).per_year();
    if !annual_debt_service.0.is_finite() || annual_debt_service.0 <= 0.0 {
        return Err(CalcError::calculation_failed(ID, "annual debt service must be positive"));
    }
    if input.lender_dscr <= 0.0 {
        return Err(CalcError::calculation_failed(ID, "lender DSCR requirement must be positive"));
    }

    let dscr = net_operating_income.0 / annual_debt_service.0;
    let supportable_payment = (net_operating_income / input.lender_dscr).per_month();
    let maximum_loan_amount = Money(principal_for_payment(supportable_payment.0, rate.0, months)).non_negative();

    let break_even_occupancy = if potential_income.0 > 0.0 {
        Percent((input.operating_expenses + annual_debt_service).0 / potential_income.0 * 100.0)
    } else {
        Percent(100.0)
    };

    Ok(DscrResult {
        effective_gross_income,
        net_operating_income,
        annual_debt_service,
        dscr,
        dscr_margin: dscr - input.lender_dscr,
        cash_flow: net_operating_income - annual_debt_service - input.reserves,
        debt_yield: Percent(net_operating_income.0 / input.loan_amount.0 * 100.0),
        break_even_occupancy,
        maximum_loan_amount,
        loan_to_value: input
            .property_value
            .filter(|v| v.0 > 0.0)
            .map(|v| Percent(input.loan_amount.0 / v.0 * 100.0)),
        risk_rating: RiskRating::classify(dscr, settings),
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Computation and report generator for DSCR
#[derive(Debug, Clone)]
pub struct DebtServiceCoverage {
    settings: DscrSettings,
}

impl DebtServiceCoverage {
    pub fn new(settings: DscrSettings) -> Self {
        DebtServiceCoverage { settings }
    }
}

impl Computation for DebtServiceCoverage {
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        let input = DscrInput::from_bag(inputs)?;
        Ok(calculate(&input, &self.settings)?.into_bag())
    }
}

impl ReportGenerator for DebtServiceCoverage {
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        let ins = input_fields(&self.settings);
        let outs = output_fields();
        let mut report = ReportBuilder::new("Debt Service Coverage Analysis", ID);

        report.section("Property");
        for id in ["propertyType", "propertyValue", "grossRentalIncome", "otherIncome", "vacancyRate", "operatingExpenses"] {
            report.field_if_present(&ins, inputs, id)?;
        }

        report.section("Income");
        for id in ["effectiveGrossIncome", "netOperatingIncome"] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Financing");
        for id in ["loanAmount", "interestRate", "amortizationPeriod", "lenderDscr"] {
            report.field(&ins, inputs, id)?;
        }
        for id in ["annualDebtService", "loanToValue", "debtYield"] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Coverage");
        for id in ["dscr", "dscrMargin", "riskRating", "cashFlow", "breakEvenOccupancy", "maximumLoanAmount"] {
            report.field(&outs, outputs, id)?;
        }

        let dscr = outputs.number("dscr")?;
        let required = inputs.number("lenderDscr")?;
        report.section("Summary");
        if dscr >= required {
            report.paragraph(format!(
                "Net operating income covers debt service {:.2} times, meeting the {:.2} requirement.",
                dscr, required
            ));
        } else {
            report.paragraph(format!(
                "Net operating income covers debt service {:.2} times, short of the {:.2} requirement. \
                 The income supports a loan of about {}.",
                dscr,
                required,
                format_currency(outputs.number("maximumLoanAmount")?)
            ));
        }

        Ok(report.finish())
    }
}

// ============================================================================
// Definition
// ============================================================================

fn input_fields(settings: &DscrSettings) -> Vec<FieldSchema> {
    vec![
        FieldSchema::choice::<PropertyType>("propertyType", "Property type")
            .default_value(PropertyType::Multifamily.value()),
        FieldSchema::currency("grossRentalIncome", "Gross rental income")
            .range(0.0, 100_000_000.0)
            .help("Annual scheduled rent at full occupancy"),
        FieldSchema::currency("otherIncome", "Other income")
            .range(0.0, 10_000_000.0)
            .default_value(0.0),
        FieldSchema::percentage("vacancyRate", "Vacancy rate", Unit::Percent)
            .range(0.0, 50.0)
            .default_value(5.0),
        FieldSchema::currency("operatingExpenses", "Operating expenses")
            .range(0.0, 50_000_000.0)
            .help("Annual taxes, insurance, utilities, maintenance and management"),
        FieldSchema::currency("reserves", "Replacement reserves")
            .range(0.0, 5_000_000.0)
            .default_value(0.0),
        FieldSchema::currency("loanAmount", "Loan amount").range(100_000.0, 50_000_000.0),
        FieldSchema::percentage("interestRate", "Interest rate", Unit::Percent).range(0.0, 25.0),
        FieldSchema::number("amortizationPeriod", "Amortization period")
            .unit(Unit::Years)
            .range(5.0, 40.0),
        FieldSchema::currency("propertyValue", "Property value")
            .range(100_000.0, 100_000_000.0)
            .optional(),
        FieldSchema::number("lenderDscr", "Lender DSCR requirement")
            .unit(Unit::Ratio)
            .range(1.0, 2.5)
            .default_value(settings.default_requirement),
    ]
}

fn output_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("effectiveGrossIncome", "Effective gross income"),
        FieldSchema::currency("netOperatingIncome", "Net operating income"),
        FieldSchema::currency("annualDebtService", "Annual debt service"),
        FieldSchema::number("dscr", "DSCR").unit(Unit::Ratio).precision(2),
        FieldSchema::number("dscrMargin", "Margin to requirement").unit(Unit::Ratio).precision(2),
        FieldSchema::currency("cashFlow", "Annual cash flow"),
        FieldSchema::percentage("debtYield", "Debt yield", Unit::Percent),
        FieldSchema::percentage("breakEvenOccupancy", "Break-even occupancy", Unit::Percent),
        FieldSchema::currency("maximumLoanAmount", "Maximum loan at requirement"),
        FieldSchema::percentage("loanToValue", "Loan-to-value", Unit::Percent),
        FieldSchema::text("riskRating", "Risk rating"),
    ]
}

/// The debt service coverage calculator
pub fn definition(settings: &Settings) -> CalcResult<CalculatorDefinition> {
    settings.validate()?;
    let expense_warning = settings.dscr.expense_ratio_warning;

    let mut builder = CalculatorDefinition::builder(ID, "Debt Service Coverage Ratio Calculator", Category::Finance)
        .subcategory("commercial-real-estate")
        .description("Net operating income against debt service, with loan sizing at the lender's minimum coverage")
        .tags(&["dscr", "commercial", "noi", "underwriting", "income-property"]);
    for field in input_fields(&settings.dscr) {
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
            &["grossRentalIncome", "otherIncome"],
            "Gross rental income or other income must be positive",
            |bag| bag.peek_number("grossRentalIncome").unwrap_or(0.0) + bag.peek_number("otherIncome").unwrap_or(0.0) > 0.0,
        ))
        .advisory(Advisory::new(
            &["grossRentalIncome", "otherIncome", "vacancyRate", "operatingExpenses"],
            move |bag| {
                let egi = bag.peek_number("grossRentalIncome")? * (1.0 - bag.peek_number("vacancyRate")? / 100.0)
                    + bag.peek_number("otherIncome")?;
                let ratio = bag.peek_number("operatingExpenses")? / egi;
                (egi > 0.0 && ratio > expense_warning).then(|| {
                    format!(
                        "Operating expenses are {} of effective income, above the usual {}",
                        format_fraction(ratio),
                        format_fraction(expense_warning)
                    )
                })
            },
        ))
        .engine(DebtServiceCoverage::new(settings.dscr.clone()))
        .formula(
            "Effective gross income",
            "grossRentalIncome × (1 − vacancyRate / 100) + otherIncome",
            "Income after vacancy loss",
        )
        .formula("NOI", "effectiveGrossIncome − operatingExpenses", "Income before debt service")
        .formula("DSCR", "netOperatingIncome / annualDebtService", "Times income covers the mortgage")
        .formula("Debt yield", "netOperatingIncome / loanAmount × 100", "Lender's return on the loan")
        .formula(
            "Break-even occupancy",
            "(operatingExpenses + annualDebtService) / (grossRentalIncome + otherIncome) × 100",
            "Occupancy needed to cover all outflows",
        )
        .formula(
            "Maximum loan",
            "PV(netOperatingIncome / lenderDscr / 12, interestRate, amortizationPeriod × 12)",
            "Largest loan meeting the coverage requirement",
        )
        .example(
            "Multifamily acquisition",
            RawInputs::new()
                .with("grossRentalIncome", 500_000)
                .with("otherIncome", 20_000)
                .with("operatingExpenses", 200_000)
                .with("loanAmount", 2_500_000)
                .with("interestRate", 6.5)
                .with("amortizationPeriod", 25)
                .with("propertyValue", 4_000_000),
        )
        .example(
            "Thin retail coverage",
            RawInputs::new()
                .with("propertyType", "retail")
                .with("grossRentalIncome", 300_000)
                .with("vacancyRate", 10)
                .with("operatingExpenses", 120_000)
                .with("loanAmount", 1_800_000)
                .with("interestRate", 7.25)
                .with("amortizationPeriod", 20)
                .with("lenderDscr", 1.35),
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

    fn base() -> RawInputs {
        RawInputs::new()
            .with("grossRentalIncome", 500_000)
            .with("otherIncome", 20_000)
            .with("operatingExpenses", 200_000)
            .with("loanAmount", 2_500_000)
            .with("interestRate", 6.5)
            .with("amortizationPeriod", 25)
    }

    fn outputs_for(raw: &RawInputs) -> OutputBag {
        match calculator().evaluate(raw).unwrap() {
            Evaluation::Completed { outputs, .. } => outputs,
            Evaluation::Invalid { validation } => panic!("invalid: {:?}", validation.errors),
        }
    }

    #[test]
    fn test_coverage() {
        let outputs = outputs_for(&base());
        assert_eq!(outputs.number("effectiveGrossIncome").unwrap(), 495_000.0);
        assert_eq!(outputs.number("netOperatingIncome").unwrap(), 295_000.0);
        assert_eq!(outputs.number("annualDebtService").unwrap(), 202_562.15);
        assert_eq!(outputs.number("dscr").unwrap(), 1.46);
        assert_eq!(outputs.number("dscrMargin").unwrap(), 0.21);
        assert_eq!(outputs.number("cashFlow").unwrap(), 92_437.85);
        assert_eq!(outputs.number("debtYield").unwrap(), 11.8);
        assert_eq!(outputs.number("breakEvenOccupancy").unwrap(), 77.42);
        assert_eq!(outputs.text("riskRating").unwrap(), "Adequate");
    }

    #[test]
    fn test_maximum_loan_meets_requirement() {
        let outputs = outputs_for(&base());
        let max_loan = outputs.number("maximumLoanAmount").unwrap();
        assert!((max_loan - 2_912_686.33).abs() < 0.01);

        // Borrowing exactly the maximum lands on the requirement
        let at_max = outputs_for(&base().with("loanAmount", max_loan));
        assert_eq!(at_max.number("dscr").unwrap(), 1.25);
    }

    #[test]
    fn test_loan_to_value_needs_property_value() {
        let outputs = outputs_for(&base());
        assert!(outputs.get("loanToValue").unwrap().is_unavailable());

        let outputs = outputs_for(&base().with("propertyValue", 4_000_000));
        assert_eq!(outputs.number("loanToValue").unwrap(), 62.5);
    }

    #[test]
    fn test_risk_bands() {
        let settings = DscrSettings::default();
        assert_eq!(RiskRating::classify(1.5, &settings), RiskRating::Strong);
        assert_eq!(RiskRating::classify(1.0, &settings), RiskRating::Adequate);
        assert_eq!(RiskRating::classify(0.99, &settings), RiskRating::HighRisk);
    }

    #[test]
    fn test_negative_noi() {
        let outputs = outputs_for(&base().with("operatingExpenses", 600_000));
        assert_eq!(outputs.number("netOperatingIncome").unwrap(), -105_000.0);
        assert_eq!(outputs.number("maximumLoanAmount").unwrap(), 0.0);
        assert_eq!(outputs.text("riskRating").unwrap(), "High Risk");
    }

    #[test]
    fn test_lender_requirement_from_settings() {
        let mut settings = Settings::default();
        settings.dscr.default_requirement = 1.4;
        let calc = definition(&settings).unwrap();
        match calc.evaluate(&base()).unwrap() {
            Evaluation::Completed { outputs, .. } => {
                assert_eq!(outputs.number("dscrMargin").unwrap(), 0.06);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_expense_ratio_advisory() {
        let result = calculator().validate(&base().with("operatingExpenses", 350_000));
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("70.71%"));
    }

    #[test]
    fn test_rules() {
        let result = calculator().validate(&base().with("propertyValue", 2_000_000));
        assert_eq!(result.errors, vec!["Loan amount cannot exceed property value".to_string()]);

        let result = calculator().validate(&base().with("grossRentalIncome", 0).with("otherIncome", 0));
        assert_eq!(
            result.errors,
            vec!["Gross rental income or other income must be positive".to_string()]
        );
    }

    #[test]
    fn test_report() {
        match calculator().evaluate(&base()).unwrap() {
            Evaluation::Completed { report, .. } => {
                assert!(report.contains("## Coverage"));
                assert!(report.contains("- Risk rating: Adequate"));
                assert!(report.contains("covers debt service 1.46 times, meeting the 1.25 requirement"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
