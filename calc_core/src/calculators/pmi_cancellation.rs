//! # PMI Cancellation
//!
//! When mortgage insurance can come off a loan, and what it costs until
//! then. Rates and LTVs here are whole-number percents (`80` = 80%).
//!
//! ## Program rules
//!
//! | Program      | Rule                                                        |
//! |--------------|-------------------------------------------------------------|
//! | Conventional | Borrower may cancel once the balance reaches 80% of value   |
//! | FHA          | 11 years of MIP if the original LTV was 90% or less, otherwise life of loan |
//! | VA           | No mortgage insurance                                       |
//! | USDA         | Guarantee fee for the life of the loan                      |
//!
//! Dates derive from the `asOfDate` input; the wall clock is never read.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calculator::{CalculatorDefinition, Computation, ReportGenerator};
use crate::equations::amortization::{balance_after, monthly_payment, months_to_balance};
use crate::errors::{CalcError, CalcResult};
use crate::report::{format_currency, ReportBuilder};
use crate::schema::{choice_enum, Category, Choice, FieldSchema, Unit};
use crate::settings::{PmiSettings, Settings};
use crate::units::{Fraction, Money, Percent, Years};
use crate::validation::{Advisory, CrossFieldRule};
use crate::values::{Bag, InputBag, OutputBag, RawInputs, Value};

pub const ID: &str = "pmi-cancellation";

const NO_CANCELLATION: &str = "no cancellation possible";

choice_enum! {
    /// Mortgage program, which decides the insurance rules
    pub enum MortgageProgram {
        Conventional => ("conventional", "Conventional"),
        Fha => ("fha", "FHA"),
        Va => ("va", "VA"),
        Usda => ("usda", "USDA"),
    }
}

choice_enum! {
    /// Borrower payment record
    pub enum PaymentRecord {
        Perfect => ("perfect", "Perfect"),
        Good => ("good", "Good"),
        Fair => ("fair", "Fair"),
        Poor => ("poor", "Poor"),
    }
}

/// When (if ever) insurance comes off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cancellation {
    /// After this many more monthly payments (0 = eligible now)
    AfterMonths(u32),
    /// Insurance stays on; the reason is shown to the user
    Never(&'static str),
}

// ============================================================================
// Input / Result
// ============================================================================

/// Typed PMI cancellation inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PmiInput {
    pub original_loan_amount: Money,
    pub current_balance: Money,
    pub original_home_value: Money,
    pub current_home_value: Money,
    pub interest_rate: Percent,
    pub loan_term: Years,
    /// Annual premium as a percent of the balance
    pub pmi_rate: Percent,
    pub loan_start_date: NaiveDate,
    pub as_of_date: NaiveDate,
    pub loan_type: MortgageProgram,
    pub payment_history: PaymentRecord,
    /// Extra principal paid every month
    pub additional_payments: Money,
    /// One-off principal reduction applied today
    pub lump_sum_payment: Money,
}

impl PmiInput {
    pub fn from_bag(bag: &InputBag) -> CalcResult<Self> {
        Ok(PmiInput {
            original_loan_amount: Money(bag.number("originalLoanAmount")?),
            current_balance: Money(bag.number("currentBalance")?),
            original_home_value: Money(bag.number("originalHomeValue")?),
            current_home_value: Money(bag.number("currentHomeValue")?),
            interest_rate: Percent(bag.number("interestRate")?),
            loan_term: Years(bag.number("loanTerm")?),
            pmi_rate: Percent(bag.number("pmiRate")?),
            loan_start_date: bag.date("loanStartDate")?,
            as_of_date: bag.date("asOfDate")?,
            loan_type: bag.choice("loanType")?,
            payment_history: bag.choice("paymentHistory")?,
            additional_payments: Money(bag.number("additionalPayments")?),
            lump_sum_payment: Money(bag.number("lumpSumPayment")?),
        })
    }

    /// Balance after the lump sum is applied
    pub fn adjusted_balance(&self) -> Money {
        (self.current_balance - self.lump_sum_payment).non_negative()
    }
}

/// Whole months from `start` to `end`, counting a month only once its day is reached
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

/// PMI cancellation results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmiResult {
    pub current_ltv: Percent,
    pub original_ltv: Percent,
    pub equity_percentage: Percent,
    /// Equity now minus the equity put in at origination
    pub equity_gain: Money,
    pub monthly_pmi: Money,
    pub cancellation: Cancellation,
    pub cancellation_date: Option<NaiveDate>,
    /// Projected balance on the cancellation date
    pub balance_at_cancellation: Option<Money>,
    pub cancellation_method: String,
    /// What the borrower must satisfy to drop the insurance
    pub cancellation_requirements: String,
}

impl PmiResult {
    pub fn into_bag(self) -> OutputBag {
        let (months, savings, remaining) = match self.cancellation {
            Cancellation::AfterMonths(m) => (
                Value::Number(m as f64),
                Value::Number(self.monthly_pmi.per_year().0),
                Value::Number((self.monthly_pmi * m as f64).0),
            ),
            Cancellation::Never(reason) => (
                Value::unavailable(reason),
                Value::unavailable(reason),
                Value::unavailable(reason),
            ),
        };
        let date = match (self.cancellation, self.cancellation_date) {
            (Cancellation::Never(reason), _) => Value::unavailable(reason),
            (_, Some(date)) => Value::Date(date),
            (_, None) => Value::unavailable("date out of range"),
        };
        let balance_at = match (self.cancellation, self.balance_at_cancellation) {
            (Cancellation::Never(reason), _) => Value::unavailable(reason),
            (_, Some(balance)) => Value::Number(balance.0),
            (_, None) => Value::unavailable(NO_CANCELLATION),
        };
        Bag::new()
            .with("currentLtv", self.current_ltv.0)
            .with("originalLtv", self.original_ltv.0)
            .with("equityPercentage", self.equity_percentage.0)
            .with("equityGain", self.equity_gain.0)
            .with("monthlyPmi", self.monthly_pmi.0)
            .with("annualPmiSavings", savings)
            .with("monthsToCancellation", months)
            .with("cancellationDate", date)
            .with("totalPmiRemaining", remaining)
            .with("balanceAtCancellation", balance_at)
            .with("cancellationMethod", self.cancellation_method)
            .with("cancellationRequirements", self.cancellation_requirements)
    }
}

/// Work out the cancellation timeline.
pub fn calculate(input: &PmiInput, settings: &PmiSettings) -> CalcResult<PmiResult> {
    if input.current_home_value.0 <= 0.0 || input.original_home_value.0 <= 0.0 {
        return Err(CalcError::calculation_failed(ID, "home values must be positive"));
    }

    let balance = input.adjusted_balance();
    let current_ltv = Percent(balance.0 / input.current_home_value.0 * 100.0);
    let original_ltv = Percent(input.original_loan_amount.0 / input.original_home_value.0 * 100.0);
    let equity_percentage = Percent(100.0 - current_ltv.0);
    let equity_gain = (input.current_home_value - balance) - (input.original_home_value - input.original_loan_amount);

    let elapsed = months_between(input.loan_start_date, input.as_of_date);
    let term_months = (input.loan_term.0 * 12.0).round() as u32;
    let remaining_months = term_months.saturating_sub(elapsed).max(1);

    let rate: Fraction = input.interest_rate.into();
    let pmi_rate: Fraction = input.pmi_rate.into();
    let payment = monthly_payment(balance.0, rate.0, remaining_months as f64) + input.additional_payments.0;
    let accelerated = input.additional_payments.0 > 0.0 || input.lump_sum_payment.0 > 0.0;

    let (cancellation, method, monthly_pmi) = match input.loan_type {
        MortgageProgram::Conventional => {
            let target = input.current_home_value.0 * settings.conventional_target_ltv / 100.0;
            let pmi = pmi_rate.of(input.current_balance).per_month();
            if current_ltv.0 <= settings.conventional_target_ltv {
                (Cancellation::AfterMonths(0), "Borrower request (target LTV reached)", pmi)
            } else {
                match months_to_balance(balance.0, rate.0, payment, target, settings.max_search_months) {
                    Some(m) if accelerated => (Cancellation::AfterMonths(m), "Accelerated (additional payments)", pmi),
                    Some(m) => (Cancellation::AfterMonths(m), "Borrower request at target LTV", pmi),
                    None => (Cancellation::Never(NO_CANCELLATION), "Not reachable with current payments", pmi),
                }
            }
        }
        MortgageProgram::Fha => {
            let pmi = pmi_rate.of(input.current_balance).per_month();
            if original_ltv.0 > settings.fha_life_of_loan_ltv {
                (
                    Cancellation::Never("MIP remains for the life of the loan"),
                    "Life of loan (FHA)",
                    pmi,
                )
            } else {
                let required = (settings.fha_minimum_years * 12.0).round() as u32;
                (
                    Cancellation::AfterMonths(required.saturating_sub(elapsed)),
                    "FHA minimum MIP period",
                    pmi,
                )
            }
        }
        MortgageProgram::Va => (Cancellation::AfterMonths(0), "No mortgage insurance (VA)", Money(0.0)),
        MortgageProgram::Usda => (
            Cancellation::Never("USDA guarantee fee remains for the life of the loan"),
            "Life of loan (USDA guarantee fee)",
            pmi_rate.of(input.current_balance).per_month(),
        ),
    };

    let (cancellation_date, balance_at_cancellation) = match cancellation {
        Cancellation::AfterMonths(m) => (
            input.as_of_date.checked_add_months(chrono::Months::new(m)),
            Some(Money(balance_after(balance.0, rate.0, payment, m as f64))),
        ),
        Cancellation::Never(_) => (None, None),
    };

    let mut requirements = match input.loan_type {
        MortgageProgram::Conventional if current_ltv.0 <= settings.conventional_target_ltv => {
            format!("Loan-to-value ratio is {}% or less", settings.conventional_target_ltv)
        }
        MortgageProgram::Conventional => {
            format!("Loan-to-value ratio must be {}% or less", settings.conventional_target_ltv)
        }
        MortgageProgram::Fha if original_ltv.0 > settings.fha_life_of_loan_ltv => {
            "Refinance out of FHA to remove MIP".to_string()
        }
        MortgageProgram::Fha => format!("{} years of MIP payments", settings.fha_minimum_years),
        MortgageProgram::Va => "VA loans do not require mortgage insurance".to_string(),
        MortgageProgram::Usda => "USDA loans carry an annual guarantee fee instead of PMI".to_string(),
    };
    let removable = matches!(cancellation, Cancellation::AfterMonths(_)) && monthly_pmi.0 > 0.0;
    if removable && input.payment_history == PaymentRecord::Poor {
        requirements.push_str(" and good payment history required");
    }

    Ok(PmiResult {
        current_ltv,
        original_ltv,
        equity_percentage,
        equity_gain,
        monthly_pmi,
        cancellation,
        cancellation_date,
        balance_at_cancellation,
        cancellation_method: method.to_string(),
        cancellation_requirements: requirements,
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Computation and report generator for PMI cancellation
#[derive(Debug, Clone)]
pub struct PmiCancellation {
    settings: PmiSettings,
}

impl PmiCancellation {
    pub fn new(settings: PmiSettings) -> Self {
        PmiCancellation { settings }
    }
}

impl Computation for PmiCancellation {
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        let input = PmiInput::from_bag(inputs)?;
        Ok(calculate(&input, &self.settings)?.into_bag())
    }
}

impl ReportGenerator for PmiCancellation {
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        let ins = input_fields();
        let outs = output_fields();
        let mut report = ReportBuilder::new("PMI Cancellation Analysis", ID);

        report.section("Loan");
        for id in [
            "loanType",
            "originalLoanAmount",
            "currentBalance",
            "originalHomeValue",
            "currentHomeValue",
            "interestRate",
            "pmiRate",
            "asOfDate",
        ] {
            report.field(&ins, inputs, id)?;
        }

        report.section("Equity");
        for id in ["originalLtv", "currentLtv", "equityPercentage", "equityGain"] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Cancellation");
        for id in [
            "cancellationMethod",
            "cancellationRequirements",
            "monthsToCancellation",
            "cancellationDate",
            "balanceAtCancellation",
            "monthlyPmi",
            "annualPmiSavings",
            "totalPmiRemaining",
        ] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Next Steps");
        let monthly_pmi = outputs.number("monthlyPmi")?;
        match outputs.get("monthsToCancellation") {
            _ if monthly_pmi == 0.0 => {
                report.bullet("No mortgage insurance is being paid on this loan");
            }
            Some(Value::Number(m)) if *m == 0.0 => {
                report.bullet("Contact the servicer in writing to request cancellation");
                report.bullet("Expect the servicer to order an appraisal to confirm the value");
            }
            Some(Value::Number(_)) => {
                report.bullet("Keep payments current until the cancellation date");
                if inputs.number("additionalPayments")? == 0.0 {
                    report.bullet("Extra principal payments bring the cancellation date forward");
                }
            }
            _ => {
                report.bullet("Refinancing into a conventional loan is the usual way to drop this insurance");
            }
        }
        if monthly_pmi > 0.0 {
            report.paragraph(format!(
                "Insurance currently costs {} per month.",
                format_currency(monthly_pmi)
            ));
        }

        Ok(report.finish())
    }
}

// ============================================================================
// Definition
// ============================================================================

fn input_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("originalLoanAmount", "Original loan amount").range(10_000.0, 10_000_000.0),
        FieldSchema::currency("currentBalance", "Current balance").range(0.0, 10_000_000.0),
        FieldSchema::currency("originalHomeValue", "Original home value").range(10_000.0, 50_000_000.0),
        FieldSchema::currency("currentHomeValue", "Current home value").range(10_000.0, 50_000_000.0),
        FieldSchema::percentage("interestRate", "Interest rate", Unit::Percent).range(0.0, 20.0),
        FieldSchema::number("loanTerm", "Loan term").unit(Unit::Years).range(5.0, 40.0),
        FieldSchema::percentage("pmiRate", "Annual PMI rate", Unit::Percent)
            .range(0.0, 5.0)
            .help("Annual premium as a percent of the balance, e.g. 0.5"),
        FieldSchema::date("loanStartDate", "Loan start date"),
        FieldSchema::date("asOfDate", "As-of date"),
        FieldSchema::choice::<MortgageProgram>("loanType", "Loan type")
            .default_value(MortgageProgram::Conventional.value()),
        FieldSchema::choice::<PaymentRecord>("paymentHistory", "Payment history")
            .default_value(PaymentRecord::Good.value()),
        FieldSchema::currency("additionalPayments", "Additional monthly principal")
            .range(0.0, 100_000.0)
            .default_value(0.0),
        FieldSchema::currency("lumpSumPayment", "Lump sum payment")
            .range(0.0, 10_000_000.0)
            .default_value(0.0),
    ]
}

fn output_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::percentage("currentLtv", "Current LTV", Unit::Percent),
        FieldSchema::percentage("originalLtv", "Original LTV", Unit::Percent),
        FieldSchema::percentage("equityPercentage", "Equity", Unit::Percent),
        FieldSchema::currency("equityGain", "Equity gained since origination"),
        FieldSchema::currency("monthlyPmi", "Monthly PMI"),
        FieldSchema::currency("annualPmiSavings", "Annual savings after cancellation"),
        FieldSchema::number("monthsToCancellation", "Months to cancellation")
            .unit(Unit::Months)
            .precision(0),
        FieldSchema::date("cancellationDate", "Cancellation date"),
        FieldSchema::currency("totalPmiRemaining", "PMI paid until cancellation"),
        FieldSchema::currency("balanceAtCancellation", "Balance at cancellation"),
        FieldSchema::text("cancellationMethod", "Cancellation method"),
        FieldSchema::text("cancellationRequirements", "Requirements"),
    ]
}

/// The PMI cancellation calculator
pub fn definition(settings: &Settings) -> CalcResult<CalculatorDefinition> {
    settings.validate()?;
    let mut builder = CalculatorDefinition::builder(ID, "PMI Cancellation Calculator", Category::Finance)
        .subcategory("mortgage")
        .description("When private mortgage insurance can be cancelled and what it costs until then")
        .tags(&["mortgage", "pmi", "mip", "insurance", "equity"]);
    for field in input_fields() {
        builder = builder.input(field);
    }
    for field in output_fields() {
        builder = builder.output(field);
    }

    builder
        .rule(CrossFieldRule::new(
            &["currentBalance", "originalLoanAmount"],
            "Current balance cannot exceed the original loan amount",
            |bag| bag.peek_number("currentBalance") <= bag.peek_number("originalLoanAmount"),
        ))
        .rule(CrossFieldRule::new(
            &["loanStartDate", "asOfDate"],
            "Loan start date cannot be after the as-of date",
            |bag| match (bag.date("loanStartDate"), bag.date("asOfDate")) {
                (Ok(start), Ok(as_of)) => start <= as_of,
                _ => true,
            },
        ))
        .rule(CrossFieldRule::new(
            &["lumpSumPayment", "currentBalance"],
            "Lump sum payment cannot exceed the current balance",
            |bag| bag.peek_number("lumpSumPayment") <= bag.peek_number("currentBalance"),
        ))
        .advisory(Advisory::new(&["paymentHistory"], |bag| {
            let history = bag.get("paymentHistory").and_then(Value::as_text)?;
            matches!(
                PaymentRecord::parse(history),
                Some(PaymentRecord::Fair) | Some(PaymentRecord::Poor)
            )
            .then(|| "Servicers can refuse a cancellation request after late payments".to_string())
        }))
        .advisory(Advisory::new(&["loanType", "pmiRate"], |bag| {
            let va = bag.get("loanType").and_then(Value::as_text) == Some(MortgageProgram::Va.value());
            let rate = bag.peek_number("pmiRate")?;
            (va && rate > 0.0).then(|| "VA loans carry no mortgage insurance; the PMI rate is ignored".to_string())
        }))
        .engine(PmiCancellation::new(settings.pmi.clone()))
        .formula("Current LTV", "(currentBalance - lumpSumPayment) / currentHomeValue × 100", "Leverage today")
        .formula("Monthly PMI", "currentBalance × pmiRate / 100 / 12", "Current insurance premium")
        .formula(
            "Equity gain",
            "(currentHomeValue - balance) - (originalHomeValue - originalLoanAmount)",
            "Appreciation plus principal paid since origination",
        )
        .formula(
            "Months to cancellation",
            "first month where balance ≤ currentHomeValue × 80%",
            "Amortized with the scheduled payment plus additional principal",
        )
        .example(
            "Conventional loan paying down",
            RawInputs::new()
                .with("originalLoanAmount", 300_000)
                .with("currentBalance", 285_000)
                .with("originalHomeValue", 320_000)
                .with("currentHomeValue", 330_000)
                .with("interestRate", 6.5)
                .with("loanTerm", 30)
                .with("pmiRate", 0.5)
                .with("loanStartDate", "2023-06-01")
                .with("asOfDate", "2026-06-01"),
        )
        .example(
            "FHA loan with small down payment",
            RawInputs::new()
                .with("originalLoanAmount", 289_500)
                .with("currentBalance", 280_000)
                .with("originalHomeValue", 300_000)
                .with("currentHomeValue", 310_000)
                .with("interestRate", 6.0)
                .with("loanTerm", 30)
                .with("pmiRate", 0.55)
                .with("loanStartDate", "2024-01-15")
                .with("asOfDate", "2026-01-15")
                .with("loanType", "fha"),
        )
        .build()
}
