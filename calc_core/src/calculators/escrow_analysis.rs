//! # Escrow Analysis
//!
//! Annual escrow account review: how much the servicer collects each month
//! for taxes and insurance, what balance it must hold, and whether the
//! account is short or carries a surplus.
//!
//! ## Method
//!
//! - Monthly escrow = (tax + insurance + PMI + flood) / 12
//! - Required balance = max(annual disbursements, cushion months × monthly escrow + cushion)
//! - Shortage is spread over the following year; surpluses above the refund
//!   threshold are refunded
//! - Waived accounts collect nothing; the borrower pays taxes and insurance
//!   directly
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculators::escrow_analysis::{calculate, EscrowInput};
//! use calc_core::settings::EscrowSettings;
//! use calc_core::units::Money;
//!
//! let input = EscrowInput {
//!     monthly_payment: Money(1363.0),
//!     current_escrow_balance: Money(5000.0),
//!     annual_property_tax: Money(3000.0),
//!     annual_home_insurance: Money(1200.0),
//!     escrow_cushion: Money(1000.0),
//!     ..EscrowInput::default()
//! };
//! let result = calculate(&input, &EscrowSettings::default()).unwrap();
//! assert_eq!(result.monthly_escrow_payment.0, 350.0);
//! assert_eq!(result.total_monthly_payment.0, 1713.0);
//! assert_eq!(result.required_escrow_balance.0, 4200.0);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calculator::{CalculatorDefinition, Computation, ReportGenerator};
use crate::errors::{CalcError, CalcResult};
use crate::report::{format_currency, ReportBuilder};
use crate::schema::{choice_enum, Category, Choice, FieldSchema, Unit};
use crate::settings::{EscrowSettings, Settings};
use crate::units::{Fraction, Money, Months, Percent};
use crate::validation::{Advisory, CrossFieldRule};
use crate::values::{Bag, InputBag, OutputBag, RawInputs, Value};

pub const ID: &str = "escrow-analysis";

choice_enum! {
    /// How often a tax or insurance bill is paid out of escrow
    pub enum PaymentFrequency {
        Monthly => ("monthly", "Monthly"),
        Quarterly => ("quarterly", "Quarterly"),
        SemiAnnually => ("semi-annually", "Semi-annually"),
        Annually => ("annually", "Annually"),
    }
}

impl PaymentFrequency {
    /// Disbursements per year
    pub fn per_year(self) -> f64 {
        match self {
            PaymentFrequency::Monthly => 12.0,
            PaymentFrequency::Quarterly => 4.0,
            PaymentFrequency::SemiAnnually => 2.0,
            PaymentFrequency::Annually => 1.0,
        }
    }
}

choice_enum! {
    /// Mortgage payment history over the last year
    pub enum PaymentHistory {
        Current => ("current", "Current"),
        Late30 => ("late-30", "30 days late"),
        Late60 => ("late-60", "60 days late"),
        Late90 => ("late-90", "90+ days late"),
    }
}

choice_enum! {
    /// Whether the servicer holds an escrow account
    pub enum EscrowAccountType {
        Required => ("required", "Required"),
        Voluntary => ("voluntary", "Voluntary"),
        Waived => ("waived", "Waived"),
    }
}

/// Outcome of comparing the current balance to the required balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Shortage,
    Surplus,
    Balanced,
    Waived,
}

impl EscrowStatus {
    pub fn label(self) -> &'static str {
        match self {
            EscrowStatus::Shortage => "Shortage",
            EscrowStatus::Surplus => "Surplus",
            EscrowStatus::Balanced => "Balanced",
            EscrowStatus::Waived => "Waived",
        }
    }
}

// ============================================================================
// Input / Result
// ============================================================================

/// Typed escrow inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowInput {
    /// Principal and interest portion of the mortgage payment
    pub monthly_payment: Money,
    pub current_escrow_balance: Money,
    pub annual_property_tax: Money,
    pub annual_home_insurance: Money,
    pub annual_pmi: Money,
    pub annual_flood_insurance: Money,
    pub escrow_cushion: Money,
    pub property_tax_frequency: PaymentFrequency,
    pub insurance_frequency: PaymentFrequency,
    /// Expected yearly growth of the tax bill
    pub tax_assessment_increase: Percent,
    /// Expected yearly growth of the insurance premium
    pub insurance_rate_increase: Percent,
    pub analysis_period: Months,
    pub account_type: EscrowAccountType,
    pub payment_history: PaymentHistory,
    /// Date of this analysis; the next one is due a year later
    pub as_of_date: Option<NaiveDate>,
}

impl Default for EscrowInput {
    fn default() -> Self {
        EscrowInput {
            monthly_payment: Money(0.0),
            current_escrow_balance: Money(0.0),
            annual_property_tax: Money(0.0),
            annual_home_insurance: Money(0.0),
            annual_pmi: Money(0.0),
            annual_flood_insurance: Money(0.0),
            escrow_cushion: Money(0.0),
            property_tax_frequency: PaymentFrequency::Annually,
            insurance_frequency: PaymentFrequency::Annually,
            tax_assessment_increase: Percent(2.0),
            insurance_rate_increase: Percent(3.0),
            analysis_period: Months(12.0),
            account_type: EscrowAccountType::Required,
            payment_history: PaymentHistory::Current,
            as_of_date: None,
        }
    }
}

impl EscrowInput {
    pub fn from_bag(bag: &InputBag) -> CalcResult<Self> {
        Ok(EscrowInput {
            monthly_payment: Money(bag.number("monthlyPayment")?),
            current_escrow_balance: Money(bag.number("currentEscrowBalance")?),
            annual_property_tax: Money(bag.number("annualPropertyTax")?),
            annual_home_insurance: Money(bag.number("annualHomeInsurance")?),
            annual_pmi: Money(bag.number("annualPMI")?),
            annual_flood_insurance: Money(bag.number("annualFloodInsurance")?),
            escrow_cushion: Money(bag.number("escrowCushion")?),
            property_tax_frequency: bag.choice("propertyTaxPaymentFrequency")?,
            insurance_frequency: bag.choice("insurancePaymentFrequency")?,
            tax_assessment_increase: Percent(bag.number("taxAssessmentIncrease")?),
            insurance_rate_increase: Percent(bag.number("insuranceRateIncrease")?),
            analysis_period: Months(bag.number("analysisPeriod")?),
            account_type: bag.choice("escrowAccountType")?,
            payment_history: bag.choice("paymentHistory")?,
            as_of_date: bag.opt_date("asOfDate")?,
        })
    }

    /// Total paid out of escrow in a year
    pub fn annual_disbursements(&self) -> Money {
        self.annual_property_tax + self.annual_home_insurance + self.annual_pmi + self.annual_flood_insurance
    }

    pub fn is_waived(&self) -> bool {
        self.account_type == EscrowAccountType::Waived
    }
}

/// Escrow analysis results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowResult {
    pub monthly_escrow_payment: Money,
    pub total_monthly_payment: Money,
    pub required_escrow_balance: Money,
    pub escrow_shortage: Money,
    pub escrow_surplus: Money,
    pub shortage_payment: Money,
    pub surplus_refund: Money,
    /// Amount of each property tax bill
    pub property_tax_installment: Money,
    /// Amount of each insurance bill
    pub insurance_installment: Money,
    pub next_escrow_analysis: Option<NaiveDate>,
    pub status: EscrowStatus,
    /// Annual disbursements for each projected year
    pub projected_annual_escrow: Vec<f64>,
}

impl EscrowResult {
    pub fn into_bag(self) -> OutputBag {
        let next = match self.next_escrow_analysis {
            Some(date) => Value::Date(date),
            None => Value::unavailable("no analysis date supplied"),
        };
        Bag::new()
            .with("monthlyEscrowPayment", self.monthly_escrow_payment.0)
            .with("totalMonthlyPayment", self.total_monthly_payment.0)
            .with("requiredEscrowBalance", self.required_escrow_balance.0)
            .with("escrowShortage", self.escrow_shortage.0)
            .with("escrowSurplus", self.escrow_surplus.0)
            .with("shortagePayment", self.shortage_payment.0)
            .with("surplusRefund", self.surplus_refund.0)
            .with("propertyTaxInstallment", self.property_tax_installment.0)
            .with("insuranceInstallment", self.insurance_installment.0)
            .with("nextEscrowAnalysis", next)
            .with("escrowStatus", self.status.label())
            .with("projectedAnnualEscrow", self.projected_annual_escrow)
    }
}

/// Run the escrow analysis.
pub fn calculate(input: &EscrowInput, settings: &EscrowSettings) -> CalcResult<EscrowResult> {
    let disbursements = input.annual_disbursements();

    let next_escrow_analysis = match input.as_of_date {
        Some(date) => Some(
            date.checked_add_months(chrono::Months::new(12))
                .ok_or_else(|| CalcError::calculation_failed(ID, "next analysis date out of range"))?,
        ),
        None => None,
    };

    let years = ((input.analysis_period.0 / 12.0).ceil() as u32).clamp(1, settings.max_projection_years.max(1));
    let tax_growth: Fraction = input.tax_assessment_increase.into();
    let insurance_growth: Fraction = input.insurance_rate_increase.into();
    let projected_annual_escrow = (1..=years)
        .map(|year| {
            let y = year as i32;
            input.annual_property_tax.0 * (1.0 + tax_growth.0).powi(y)
                + input.annual_home_insurance.0 * (1.0 + insurance_growth.0).powi(y)
                + input.annual_pmi.0
                + input.annual_flood_insurance.0
        })
        .collect();

    let property_tax_installment = input.annual_property_tax / input.property_tax_frequency.per_year();
    let insurance_installment = input.annual_home_insurance / input.insurance_frequency.per_year();

    if input.is_waived() {
        return Ok(EscrowResult {
            monthly_escrow_payment: Money(0.0),
            total_monthly_payment: input.monthly_payment,
            required_escrow_balance: Money(0.0),
            escrow_shortage: Money(0.0),
            escrow_surplus: Money(0.0),
            shortage_payment: Money(0.0),
            surplus_refund: Money(0.0),
            property_tax_installment,
            insurance_installment,
            next_escrow_analysis,
            status: EscrowStatus::Waived,
            projected_annual_escrow,
        });
    }

    let monthly_escrow = disbursements.per_month();
    let cushioned = monthly_escrow * settings.max_cushion_months + input.escrow_cushion;
    let required = if disbursements.0 > cushioned.0 { disbursements } else { cushioned };

    let difference = required - input.current_escrow_balance;
    let shortage = difference.non_negative();
    let surplus = (Money(0.0) - difference).non_negative();
    let surplus_refund = if surplus.0 > settings.refund_threshold { surplus } else { Money(0.0) };

    let status = if shortage.0 > 0.0 {
        EscrowStatus::Shortage
    } else if surplus.0 > 0.0 {
        EscrowStatus::Surplus
    } else {
        EscrowStatus::Balanced
    };

    Ok(EscrowResult {
        monthly_escrow_payment: monthly_escrow,
        total_monthly_payment: input.monthly_payment + monthly_escrow,
        required_escrow_balance: required,
        escrow_shortage: shortage,
        escrow_surplus: surplus,
        shortage_payment: shortage / settings.shortage_spread_months,
        surplus_refund,
        property_tax_installment,
        insurance_installment,
        next_escrow_analysis,
        status,
        projected_annual_escrow,
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Computation and report generator for escrow analysis
#[derive(Debug, Clone)]
pub struct EscrowAnalysis {
    settings: EscrowSettings,
}

impl EscrowAnalysis {
    pub fn new(settings: EscrowSettings) -> Self {
        EscrowAnalysis { settings }
    }
}

impl Computation for EscrowAnalysis {
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        let input = EscrowInput::from_bag(inputs)?;
        Ok(calculate(&input, &self.settings)?.into_bag())
    }
}

impl ReportGenerator for EscrowAnalysis {
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        let ins = input_fields();
        let outs = output_fields();
        let mut report = ReportBuilder::new("Escrow Analysis", ID);

        report.section("Escrow Summary");
        for id in ["monthlyEscrowPayment", "totalMonthlyPayment", "requiredEscrowBalance", "escrowStatus"] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Account Status");
        report.field(&ins, inputs, "currentEscrowBalance")?;
        let shortage = outputs.number("escrowShortage")?;
        let surplus = outputs.number("escrowSurplus")?;
        if shortage > 0.0 {
            report.field(&outs, outputs, "escrowShortage")?;
            report.field(&outs, outputs, "shortagePayment")?;
        } else if surplus > 0.0 {
            report.field(&outs, outputs, "escrowSurplus")?;
            report.field(&outs, outputs, "surplusRefund")?;
        }
        report.field(&ins, inputs, "escrowAccountType")?;
        report.field(&ins, inputs, "paymentHistory")?;
        report.field(&outs, outputs, "nextEscrowAnalysis")?;

        report.section("Cost Breakdown");
        report.field(&ins, inputs, "monthlyPayment")?;
        report.field(&ins, inputs, "annualPropertyTax")?;
        report.line(
            "Property tax installment",
            format!(
                "{} {}",
                format_currency(outputs.number("propertyTaxInstallment")?),
                inputs.choice::<PaymentFrequency>("propertyTaxPaymentFrequency")?.label().to_lowercase()
            ),
        );
        report.field(&ins, inputs, "annualHomeInsurance")?;
        report.line(
            "Insurance installment",
            format!(
                "{} {}",
                format_currency(outputs.number("insuranceInstallment")?),
                inputs.choice::<PaymentFrequency>("insurancePaymentFrequency")?.label().to_lowercase()
            ),
        );
        for id in ["annualPMI", "annualFloodInsurance", "escrowCushion"] {
            report.field_if_present(&ins, inputs, id)?;
        }

        report.section("Projected Annual Escrow");
        for (year, amount) in outputs.series("projectedAnnualEscrow")?.iter().enumerate() {
            report.line(&format!("Year {}", year + 1), format_currency(*amount));
        }

        report.section("Recommendations");
        if shortage > 0.0 {
            report.bullet(format!(
                "Pay the shortage of {} or add {} to each monthly payment",
                format_currency(shortage),
                format_currency(outputs.number("shortagePayment")?)
            ));
        }
        let refund = outputs.number("surplusRefund")?;
        if refund > 0.0 {
            report.bullet(format!("Request a refund of {} from the servicer", format_currency(refund)));
        }
        if inputs.choice::<PaymentHistory>("paymentHistory")? != PaymentHistory::Current {
            report.bullet("Bring the loan current; late payments can trigger escrow changes");
        }
        if inputs.choice::<EscrowAccountType>("escrowAccountType")? == EscrowAccountType::Waived {
            report.bullet("Escrow is waived: budget for tax and insurance bills directly");
        }
        report.bullet("Review the escrow analysis every year and watch for reassessments");

        Ok(report.finish())
    }
}

// ============================================================================
// Definition
// ============================================================================

fn input_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("monthlyPayment", "Monthly P&I payment").range(100.0, 50_000.0),
        FieldSchema::currency("currentEscrowBalance", "Current escrow balance").range(0.0, 100_000.0),
        FieldSchema::currency("annualPropertyTax", "Annual property tax").range(0.0, 100_000.0),
        FieldSchema::currency("annualHomeInsurance", "Annual home insurance").range(0.0, 50_000.0),
        FieldSchema::currency("annualPMI", "Annual PMI").range(0.0, 50_000.0).default_value(0.0),
        FieldSchema::currency("annualFloodInsurance", "Annual flood insurance")
            .range(0.0, 50_000.0)
            .default_value(0.0),
        FieldSchema::choice::<PaymentFrequency>("propertyTaxPaymentFrequency", "Property tax payment frequency")
            .default_value(PaymentFrequency::Annually.value()),
        FieldSchema::choice::<PaymentFrequency>("insurancePaymentFrequency", "Insurance payment frequency")
            .default_value(PaymentFrequency::Annually.value()),
        FieldSchema::currency("escrowCushion", "Escrow cushion")
            .range(0.0, 50_000.0)
            .help("Extra balance the servicer holds against bill increases"),
        FieldSchema::percentage("taxAssessmentIncrease", "Annual tax increase", Unit::Percent)
            .range(0.0, 50.0)
            .default_value(2.0),
        FieldSchema::percentage("insuranceRateIncrease", "Annual insurance increase", Unit::Percent)
            .range(0.0, 50.0)
            .default_value(3.0),
        FieldSchema::number("analysisPeriod", "Analysis period")
            .unit(Unit::Months)
            .range(12.0, 60.0)
            .default_value(12.0),
        FieldSchema::choice::<PaymentHistory>("paymentHistory", "Payment history")
            .default_value(PaymentHistory::Current.value()),
        FieldSchema::choice::<EscrowAccountType>("escrowAccountType", "Escrow account type")
            .default_value(EscrowAccountType::Required.value()),
        FieldSchema::currency("propertyValue", "Property value")
            .range(50_000.0, 10_000_000.0)
            .optional(),
        FieldSchema::currency("loanAmount", "Loan amount")
            .range(10_000.0, 10_000_000.0)
            .optional(),
        FieldSchema::percentage("interestRate", "Interest rate", Unit::Percent)
            .range(1.0, 20.0)
            .optional(),
        FieldSchema::number("loanTerm", "Loan term")
            .unit(Unit::Years)
            .range(10.0, 50.0)
            .optional(),
        FieldSchema::date("asOfDate", "Analysis date").optional(),
    ]
}

fn output_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("monthlyEscrowPayment", "Monthly escrow payment"),
        FieldSchema::currency("totalMonthlyPayment", "Total monthly payment"),
        FieldSchema::currency("requiredEscrowBalance", "Required escrow balance"),
        FieldSchema::currency("escrowShortage", "Escrow shortage"),
        FieldSchema::currency("escrowSurplus", "Escrow surplus"),
        FieldSchema::currency("shortagePayment", "Monthly shortage payment"),
        FieldSchema::currency("surplusRefund", "Surplus refund"),
        FieldSchema::currency("propertyTaxInstallment", "Property tax installment"),
        FieldSchema::currency("insuranceInstallment", "Insurance installment"),
        FieldSchema::date("nextEscrowAnalysis", "Next escrow analysis"),
        FieldSchema::text("escrowStatus", "Escrow status"),
        FieldSchema::series("projectedAnnualEscrow", "Projected annual escrow")
            .unit(Unit::Dollars)
            .precision(2),
    ]
}

/// The escrow analysis calculator
pub fn definition(settings: &Settings) -> CalcResult<CalculatorDefinition> {
    settings.validate()?;
    let cushion_months = settings.escrow.max_cushion_months;

    let mut builder = CalculatorDefinition::builder(ID, "Escrow Analysis", Category::Finance)
        .subcategory("mortgage")
        .description("Monthly escrow payment, required balance and shortage or surplus for a mortgage escrow account")
        .tags(&["mortgage", "escrow", "property tax", "insurance"]);
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
        .advisory(Advisory::new(
            &["escrowCushion", "annualPropertyTax", "annualHomeInsurance", "annualPMI", "annualFloodInsurance"],
            move |bag| {
                let annual = ["annualPropertyTax", "annualHomeInsurance", "annualPMI", "annualFloodInsurance"]
                    .iter()
                    .filter_map(|id| bag.peek_number(id))
                    .sum::<f64>();
                let limit = annual / 12.0 * cushion_months;
                let cushion = bag.peek_number("escrowCushion")?;
                (cushion > limit).then(|| {
                    format!(
                        "Escrow cushion exceeds the {}-month limit of {}",
                        cushion_months,
                        format_currency(limit)
                    )
                })
            },
        ))
        .advisory(Advisory::new(&["escrowAccountType", "currentEscrowBalance"], |bag| {
            let waived = bag.get("escrowAccountType").and_then(Value::as_text) == Some("waived");
            let balance = bag.peek_number("currentEscrowBalance")?;
            (waived && balance > 0.0).then(|| {
                format!(
                    "Escrow is waived but the account still holds {}",
                    format_currency(balance)
                )
            })
        }))
        .advisory(Advisory::new(&["paymentHistory"], |bag| {
            let history = bag.get("paymentHistory").and_then(Value::as_text)?;
            (history != PaymentHistory::Current.value())
                .then(|| "Late payments may lead the servicer to require a larger cushion".to_string())
        }))
        .engine(EscrowAnalysis::new(settings.escrow.clone()))
        .formula(
            "Monthly escrow",
            "(annualPropertyTax + annualHomeInsurance + annualPMI + annualFloodInsurance) / 12",
            "Annual disbursements collected in twelve installments",
        )
        .formula(
            "Required balance",
            "max(annual disbursements, 2 × monthly escrow + escrowCushion)",
            "Balance needed to cover a year of bills plus the cushion",
        )
        .formula(
            "Shortage payment",
            "escrowShortage / 12",
            "Shortage spread over the next year of payments",
        )
        .example(
            "Typical required escrow",
            RawInputs::new()
                .with("monthlyPayment", 1363)
                .with("currentEscrowBalance", 5000)
                .with("annualPropertyTax", 3000)
                .with("annualHomeInsurance", 1200)
                .with("escrowCushion", 1000),
        )
        .example(
            "Shortage with PMI",
            RawInputs::new()
                .with("monthlyPayment", 2100)
                .with("currentEscrowBalance", 1500)
                .with("annualPropertyTax", 6000)
                .with("annualHomeInsurance", 1800)
                .with("annualPMI", 1200)
                .with("escrowCushion", 500)
                .with("taxAssessmentIncrease", 4)
                .with("analysisPeriod", 36)
                .with("asOfDate", "2026-03-01"),
        )
        .example(
            "Waived escrow",
            RawInputs::new()
                .with("monthlyPayment", 1363)
                .with("currentEscrowBalance", 0)
                .with("annualPropertyTax", 0)
                .with("annualHomeInsurance", 0)
                .with("escrowCushion", 0)
                .with("escrowAccountType", "waived"),
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

    fn typical() -> RawInputs {
        RawInputs::new()
            .with("annualPropertyTax", 3000)
            .with("annualHomeInsurance", 1200)
            .with("escrowCushion", 1000)
            .with("currentEscrowBalance", 5000)
            .with("monthlyPayment", 1363)
    }

    fn completed(raw: &RawInputs) -> (OutputBag, String, Vec<String>) {
        match calculator().evaluate(raw).unwrap() {
            Evaluation::Completed { outputs, report, warnings } => (outputs, report, warnings),
            Evaluation::Invalid { validation } => panic!("invalid: {:?}", validation.errors),
        }
    }

    #[test]
    fn test_typical_escrow() {
        let (outputs, _, _) = completed(&typical());
        assert_eq!(outputs.number("monthlyEscrowPayment").unwrap(), 350.0);
        assert_eq!(outputs.number("totalMonthlyPayment").unwrap(), 1713.0);
        assert_eq!(outputs.number("requiredEscrowBalance").unwrap(), 4200.0);
        assert_eq!(outputs.number("escrowSurplus").unwrap(), 800.0);
        assert_eq!(outputs.number("surplusRefund").unwrap(), 800.0);
        assert_eq!(outputs.number("escrowShortage").unwrap(), 0.0);
        assert_eq!(outputs.text("escrowStatus").unwrap(), "Surplus");
    }

    #[test]
    fn test_large_cushion_drives_requirement() {
        let raw = typical().with("escrowCushion", 5000);
        let (outputs, _, warnings) = completed(&raw);
        assert_eq!(outputs.number("requiredEscrowBalance").unwrap(), 5700.0);
        assert_eq!(outputs.number("escrowShortage").unwrap(), 700.0);
        assert!((outputs.number("shortagePayment").unwrap() - 58.33).abs() < 1e-9);
        assert!(warnings.iter().any(|w| w.contains("2-month limit")));
    }

    #[test]
    fn test_waived_escrow() {
        let raw = RawInputs::new()
            .with("monthlyPayment", 1363)
            .with("currentEscrowBalance", 0)
            .with("annualPropertyTax", 0)
            .with("annualHomeInsurance", 0)
            .with("escrowCushion", 0)
            .with("escrowAccountType", "waived");
        let (outputs, report, _) = completed(&raw);
        assert_eq!(outputs.number("monthlyEscrowPayment").unwrap(), 0.0);
        assert_eq!(outputs.number("totalMonthlyPayment").unwrap(), 1363.0);
        assert_eq!(outputs.text("escrowStatus").unwrap(), "Waived");
        assert!(report.contains("budget for tax and insurance"));
    }

    #[test]
    fn test_small_surplus_not_refunded() {
        let raw = typical().with("currentEscrowBalance", 4230);
        let (outputs, _, _) = completed(&raw);
        assert_eq!(outputs.number("escrowSurplus").unwrap(), 30.0);
        assert_eq!(outputs.number("surplusRefund").unwrap(), 0.0);
    }

    #[test]
    fn test_next_analysis_needs_date() {
        let (outputs, _, _) = completed(&typical());
        assert!(outputs.get("nextEscrowAnalysis").unwrap().is_unavailable());

        let (outputs, _, _) = completed(&typical().with("asOfDate", "2026-02-15"));
        assert_eq!(
            outputs.date("nextEscrowAnalysis").unwrap(),
            NaiveDate::from_ymd_opt(2027, 2, 15).unwrap()
        );
    }

    #[test]
    fn test_projection_capped() {
        let (outputs, _, _) = completed(&typical().with("analysisPeriod", 60));
        let projection = outputs.series("projectedAnnualEscrow").unwrap();
        assert_eq!(projection.len(), 5);
        // year 1: 3000 × 1.02 + 1200 × 1.03
        assert_eq!(projection[0], 4296.0);
        assert!(projection.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_loan_cannot_exceed_value() {
        let raw = typical().with("propertyValue", 300_000).with("loanAmount", 350_000);
        let result = calculator().validate(&raw);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("cannot exceed property value")));
    }

    #[test]
    fn test_missing_fields_reported() {
        let result = calculator().validate(&RawInputs::new());
        for label in [
            "Monthly P&I payment",
            "Current escrow balance",
            "Annual property tax",
            "Annual home insurance",
            "Escrow cushion",
        ] {
            assert!(result.errors.contains(&format!("{} is required", label)), "{}", label);
        }
        assert_eq!(result.errors.len(), 5);
    }

    #[test]
    fn test_invalid_option() {
        let result = calculator().validate(&typical().with("escrowAccountType", "sometimes"));
        assert_eq!(
            result.errors,
            vec!["Escrow account type must be one of: required, voluntary, waived".to_string()]
        );
    }

    #[test]
    fn test_quick_validate_uses_context() {
        let calc = calculator();
        let ctx = typical().with("propertyValue", 300_000);
        assert!(!calc.quick_validate("loanAmount", &serde_json::json!(350_000), &ctx).is_valid);
        assert!(calc.quick_validate("loanAmount", &serde_json::json!(250_000), &ctx).is_valid);
        assert!(!calc.quick_validate("analysisPeriod", &serde_json::json!(72), &ctx).is_valid);
    }

    #[test]
    fn test_report_sections() {
        let (_, report, _) = completed(&typical());
        assert!(report.starts_with("# Escrow Analysis"));
        assert!(report.contains("- Monthly escrow payment: $350.00"));
        assert!(report.contains("- Escrow status: Surplus"));
        assert!(report.contains("Request a refund of $800.00"));
    }

    #[test]
    fn test_installments_follow_frequency() {
        let raw = typical()
            .with("propertyTaxPaymentFrequency", "semi-annually")
            .with("insurancePaymentFrequency", "quarterly");
        let (outputs, report, _) = completed(&raw);
        assert_eq!(outputs.number("propertyTaxInstallment").unwrap(), 1500.0);
        assert_eq!(outputs.number("insuranceInstallment").unwrap(), 300.0);
        assert!(report.contains("- Property tax installment: $1,500.00 semi-annually"));
        assert!(report.contains("- Insurance installment: $300.00 quarterly"));
    }

    #[test]
    fn test_definition_rejects_bad_settings() {
        let mut settings = Settings::default();
        settings.escrow.max_projection_years = 0;
        assert_eq!(definition(&settings).unwrap_err().error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_zero_projection_cap_still_projects_one_year() {
        let settings = EscrowSettings {
            max_projection_years: 0,
            ..EscrowSettings::default()
        };
        let input = EscrowInput {
            monthly_payment: Money(1363.0),
            annual_property_tax: Money(3000.0),
            annual_home_insurance: Money(1200.0),
            analysis_period: Months(60.0),
            ..EscrowInput::default()
        };
        let result = calculate(&input, &settings).unwrap();
        assert_eq!(result.projected_annual_escrow.len(), 1);
    }
}
