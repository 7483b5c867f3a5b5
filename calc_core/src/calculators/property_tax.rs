//! # Property Tax
//!
//! Annual property tax from market value, assessment ratio, exemptions and
//! the local millage rate, with installment amounts and a comparison
//! against the local average rate.
//!
//! ## Method
//!
//! - Assessed value = market value × assessment ratio
//! - Taxable value = assessed value − exemptions (never below zero)
//! - Annual tax = taxable value × mills / 1000 + special assessments
//! - Effective rate = annual tax / market value
//!
//! Rates here are whole-number percents; the millage rate is in mills
//! (dollars per $1,000 of taxable value).

use serde::{Deserialize, Serialize};

use crate::calculator::{CalculatorDefinition, Computation, ReportGenerator};
use crate::calculators::escrow_analysis::PaymentFrequency;
use crate::errors::{CalcError, CalcResult};
use crate::report::{format_currency, format_percent, ReportBuilder};
use crate::schema::{Category, Choice, FieldSchema, Unit};
use crate::settings::{PropertyTaxSettings, Settings};
use crate::units::{Fraction, Mills, Money, Percent};
use crate::validation::{Advisory, CrossFieldRule};
use crate::values::{Bag, InputBag, OutputBag, RawInputs, Value};

pub const ID: &str = "property-tax";

/// Years covered by the tax projection
const PROJECTION_YEARS: i32 = 5;

// ============================================================================
// Input / Result
// ============================================================================

/// Typed property tax inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTaxInput {
    pub market_value: Money,
    pub assessment_ratio: Percent,
    pub millage_rate: Mills,
    pub special_assessments: Money,
    pub homestead_exemption: bool,
    pub homestead_exemption_amount: Money,
    pub senior_exemption: bool,
    pub senior_exemption_amount: Money,
    pub other_exemptions: Money,
    /// Effective rate of comparable properties, if known
    pub local_average_rate: Option<Percent>,
    pub payment_frequency: PaymentFrequency,
    /// Expected yearly change in the tax bill
    pub expected_annual_change: Percent,
}

impl PropertyTaxInput {
    pub fn from_bag(bag: &InputBag) -> CalcResult<Self> {
        Ok(PropertyTaxInput {
            market_value: Money(bag.number("marketValue")?),
            assessment_ratio: Percent(bag.number("assessmentRatio")?),
            millage_rate: Mills(bag.number("millageRate")?),
            special_assessments: Money(bag.number("specialAssessments")?),
            homestead_exemption: bag.flag("homesteadExemption")?,
            homestead_exemption_amount: Money(bag.number("homesteadExemptionAmount")?),
            senior_exemption: bag.flag("seniorExemption")?,
            senior_exemption_amount: Money(bag.number("seniorExemptionAmount")?),
            other_exemptions: Money(bag.number("otherExemptions")?),
            local_average_rate: bag.opt_number("localAverageRate")?.map(Percent),
            payment_frequency: bag.choice("paymentFrequency")?,
            expected_annual_change: Percent(bag.number("expectedAnnualChange")?),
        })
    }

    pub fn assessed_value(&self) -> Money {
        Fraction::from(self.assessment_ratio).of(self.market_value)
    }

    /// Exemptions that apply, counting flagged ones only
    pub fn total_exemptions(&self) -> Money {
        let mut total = self.other_exemptions;
        if self.homestead_exemption {
            total = total + self.homestead_exemption_amount;
        }
        if self.senior_exemption {
            total = total + self.senior_exemption_amount;
        }
        total
    }
}

/// Outcome of comparing the effective rate with the local average
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AppealOutlook {
    Recommended { effective: Percent, local: Percent },
    NotIndicated,
    NoComparison,
}

impl AppealOutlook {
    fn into_value(self) -> Value {
        match self {
            AppealOutlook::Recommended { effective, local } => Value::Text(format!(
                "Consider an appeal: effective rate {} is above the local average of {}",
                format_percent(effective.0),
                format_percent(local.0)
            )),
            AppealOutlook::NotIndicated => Value::Text("No appeal indicated".to_string()),
            AppealOutlook::NoComparison => Value::unavailable("no local average rate supplied"),
        }
    }
}

/// Property tax results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTaxResult {
    pub assessed_value: Money,
    pub total_exemptions: Money,
    pub taxable_value: Money,
    pub annual_tax: Money,
    pub installment_amount: Money,
    pub monthly_escrow: Money,
    pub exemption_savings: Money,
    pub effective_tax_rate: Percent,
    pub appeal: AppealOutlook,
    pub projected_annual_tax: Vec<f64>,
}

impl PropertyTaxResult {
    pub fn into_bag(self) -> OutputBag {
        Bag::new()
            .with("assessedValue", self.assessed_value.0)
            .with("totalExemptions", self.total_exemptions.0)
            .with("taxableValue", self.taxable_value.0)
            .with("annualTax", self.annual_tax.0)
            .with("installmentAmount", self.installment_amount.0)
            .with("monthlyEscrow", self.monthly_escrow.0)
            .with("exemptionSavings", self.exemption_savings.0)
            .with("effectiveTaxRate", self.effective_tax_rate.0)
            .with("appealRecommendation", self.appeal.into_value())
            .with("projectedAnnualTax", self.projected_annual_tax)
    }
}

/// Compute the tax bill and how it compares locally.
pub fn calculate(input: &PropertyTaxInput, settings: &PropertyTaxSettings) -> CalcResult<PropertyTaxResult> {
    if input.market_value.0 <= 0.0 {
        return Err(CalcError::calculation_failed(ID, "market value must be positive"));
    }

    let rate = Fraction::from(input.millage_rate);
    let assessed_value = input.assessed_value();
    let total_exemptions = Money(input.total_exemptions().0.min(assessed_value.0));
    let taxable_value = (assessed_value - total_exemptions).non_negative();
    let annual_tax = rate.of(taxable_value) + input.special_assessments;
    let effective_tax_rate = Percent(annual_tax.0 / input.market_value.0 * 100.0);

    let appeal = match input.local_average_rate {
        Some(local) if local.0 > 0.0 && effective_tax_rate.0 > local.0 * settings.appeal_ratio => {
            AppealOutlook::Recommended {
                effective: effective_tax_rate,
                local,
            }
        }
        Some(_) => AppealOutlook::NotIndicated,
        None => AppealOutlook::NoComparison,
    };

    let growth = 1.0 + Fraction::from(input.expected_annual_change).0;
    let projected_annual_tax = (1..=PROJECTION_YEARS).map(|y| annual_tax.0 * growth.powi(y)).collect();

    Ok(PropertyTaxResult {
        assessed_value,
        total_exemptions,
        taxable_value,
        annual_tax,
        installment_amount: annual_tax / input.payment_frequency.per_year(),
        monthly_escrow: annual_tax.per_month(),
        exemption_savings: rate.of(total_exemptions),
        effective_tax_rate,
        appeal,
        projected_annual_tax,
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Computation and report generator for property tax
#[derive(Debug, Clone)]
pub struct PropertyTax {
    settings: PropertyTaxSettings,
}

impl PropertyTax {
    pub fn new(settings: PropertyTaxSettings) -> Self {
        PropertyTax { settings }
    }
}

impl Computation for PropertyTax {
    fn compute(&self, inputs: &InputBag) -> CalcResult<OutputBag> {
        let input = PropertyTaxInput::from_bag(inputs)?;
        Ok(calculate(&input, &self.settings)?.into_bag())
    }
}

impl ReportGenerator for PropertyTax {
    fn generate(&self, inputs: &InputBag, outputs: &OutputBag) -> CalcResult<String> {
        let ins = input_fields();
        let outs = output_fields();
        let mut report = ReportBuilder::new("Property Tax Analysis", ID);

        report.section("Assessment");
        for id in ["marketValue", "assessmentRatio", "millageRate"] {
            report.field(&ins, inputs, id)?;
        }
        for id in ["assessedValue", "totalExemptions", "taxableValue"] {
            report.field(&outs, outputs, id)?;
        }

        report.section("Tax Bill");
        for id in ["annualTax", "effectiveTaxRate", "monthlyEscrow"] {
            report.field(&outs, outputs, id)?;
        }
        report.field(&ins, inputs, "paymentFrequency")?;
        report.field(&outs, outputs, "installmentAmount")?;

        report.section("Projected Annual Tax");
        for (year, amount) in outputs.series("projectedAnnualTax")?.iter().enumerate() {
            report.line(&format!("Year {}", year + 1), format_currency(*amount));
        }

        report.section("Savings");
        let savings = outputs.number("exemptionSavings")?;
        if savings > 0.0 {
            report.bullet(format!("Exemptions save {} per year", format_currency(savings)));
        } else if !inputs.flag("homesteadExemption")? {
            report.bullet("Check whether the property qualifies for a homestead exemption");
        }
        match outputs.get("appealRecommendation") {
            Some(Value::Text(text)) => {
                report.bullet(text);
            }
            _ => {
                report.bullet("Supply the local average rate to compare this bill with similar properties");
            }
        }

        Ok(report.finish())
    }
}

// ============================================================================
// Definition
// ============================================================================

fn input_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("marketValue", "Market value").range(1_000.0, 100_000_000.0),
        FieldSchema::percentage("assessmentRatio", "Assessment ratio", Unit::Percent)
            .range(1.0, 100.0)
            .default_value(100.0),
        FieldSchema::number("millageRate", "Millage rate")
            .unit(Unit::Mills)
            .range(0.0, 200.0)
            .help("Dollars of tax per $1,000 of taxable value"),
        FieldSchema::currency("specialAssessments", "Special assessments")
            .range(0.0, 1_000_000.0)
            .default_value(0.0),
        FieldSchema::boolean("homesteadExemption", "Homestead exemption").default_value(false),
        FieldSchema::currency("homesteadExemptionAmount", "Homestead exemption amount")
            .range(0.0, 10_000_000.0)
            .default_value(0.0),
        FieldSchema::boolean("seniorExemption", "Senior exemption").default_value(false),
        FieldSchema::currency("seniorExemptionAmount", "Senior exemption amount")
            .range(0.0, 10_000_000.0)
            .default_value(0.0),
        FieldSchema::currency("otherExemptions", "Other exemptions")
            .range(0.0, 10_000_000.0)
            .default_value(0.0),
        FieldSchema::percentage("localAverageRate", "Local average effective rate", Unit::Percent)
            .range(0.0, 10.0)
            .optional(),
        FieldSchema::choice::<PaymentFrequency>("paymentFrequency", "Payment frequency")
            .default_value(PaymentFrequency::SemiAnnually.value()),
        FieldSchema::percentage("expectedAnnualChange", "Expected annual change", Unit::Percent)
            .range(-20.0, 20.0)
            .default_value(0.0),
    ]
}

fn output_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::currency("assessedValue", "Assessed value"),
        FieldSchema::currency("totalExemptions", "Total exemptions"),
        FieldSchema::currency("taxableValue", "Taxable value"),
        FieldSchema::currency("annualTax", "Annual property tax"),
        FieldSchema::currency("installmentAmount", "Installment amount"),
        FieldSchema::currency("monthlyEscrow", "Monthly escrow"),
        FieldSchema::currency("exemptionSavings", "Exemption savings"),
        FieldSchema::percentage("effectiveTaxRate", "Effective tax rate", Unit::Percent).precision(3),
        FieldSchema::text("appealRecommendation", "Appeal recommendation"),
        FieldSchema::series("projectedAnnualTax", "Projected annual tax")
            .unit(Unit::Dollars)
            .precision(2),
    ]
}

fn exemption_requires_flag(flag: &'static str, amount: &'static str, label: &str) -> CrossFieldRule {
    CrossFieldRule::new(
        &[flag, amount],
        format!("{} amount requires the {} to be claimed", label, label.to_lowercase()),
        move |bag| bag.peek_number(amount).unwrap_or(0.0) == 0.0 || bag.flag(flag).unwrap_or(false),
    )
}

/// The property tax calculator
pub fn definition(settings: &Settings) -> CalcResult<CalculatorDefinition> {
    settings.validate()?;
    let tax_settings = settings.property_tax.clone();

    let mut builder = CalculatorDefinition::builder(ID, "Property Tax Calculator", Category::Finance)
        .subcategory("real-estate")
        .description("Annual property tax after exemptions, installments and a local rate comparison")
        .tags(&["property-tax", "real-estate", "assessment", "exemptions", "millage"]);
    for field in input_fields() {
        builder = builder.input(field);
    }
    for field in output_fields() {
        builder = builder.output(field);
    }

    builder
        .rule(exemption_requires_flag("homesteadExemption", "homesteadExemptionAmount", "Homestead exemption"))
        .rule(exemption_requires_flag("seniorExemption", "seniorExemptionAmount", "Senior exemption"))
        .rule(CrossFieldRule::new(
            &[
                "marketValue",
                "assessmentRatio",
                "homesteadExemption",
                "homesteadExemptionAmount",
                "seniorExemption",
                "seniorExemptionAmount",
                "otherExemptions",
            ],
            "Total exemptions cannot exceed the assessed value",
            |bag| {
                let (Some(value), Some(ratio)) = (bag.peek_number("marketValue"), bag.peek_number("assessmentRatio")) else {
                    return true;
                };
                let mut exemptions = bag.peek_number("otherExemptions").unwrap_or(0.0);
                if bag.flag("homesteadExemption").unwrap_or(false) {
                    exemptions += bag.peek_number("homesteadExemptionAmount").unwrap_or(0.0);
                }
                if bag.flag("seniorExemption").unwrap_or(false) {
                    exemptions += bag.peek_number("seniorExemptionAmount").unwrap_or(0.0);
                }
                exemptions <= value * ratio / 100.0
            },
        ))
        .advisory(Advisory::new(&["marketValue", "millageRate", "localAverageRate"], move |bag| {
            let input = PropertyTaxInput::from_bag(bag).ok()?;
            let local = input.local_average_rate?;
            let result = calculate(&input, &tax_settings).ok()?;
            (result.effective_tax_rate.0 > local.0 * tax_settings.rate_warning_multiplier).then(|| {
                format!(
                    "Effective tax rate {} is far above the local average of {}; check the assessment",
                    format_percent(result.effective_tax_rate.0),
                    format_percent(local.0)
                )
            })
        }))
        .advisory(Advisory::new(&["homesteadExemption", "homesteadExemptionAmount"], |bag| {
            (bag.flag("homesteadExemption").unwrap_or(false)
                && bag.peek_number("homesteadExemptionAmount").unwrap_or(0.0) == 0.0)
                .then(|| "Homestead exemption claimed with no amount; it has no effect".to_string())
        }))
        .engine(PropertyTax::new(settings.property_tax.clone()))
        .formula("Assessed value", "marketValue × assessmentRatio / 100", "Value the assessor taxes")
        .formula(
            "Taxable value",
            "max(0, assessedValue − exemptions)",
            "Homestead and senior amounts count only when claimed",
        )
        .formula(
            "Annual tax",
            "taxableValue × millageRate / 1000 + specialAssessments",
            "Total yearly bill",
        )
        .formula("Effective rate", "annualTax / marketValue × 100", "Tax as a share of market value")
        .example(
            "Owner-occupied home with homestead exemption",
            RawInputs::new()
                .with("marketValue", 400_000)
                .with("millageRate", 20)
                .with("homesteadExemption", true)
                .with("homesteadExemptionAmount", 50_000)
                .with("localAverageRate", 1.2),
        )
        .example(
            "Rental property at a partial assessment ratio",
            RawInputs::new()
                .with("marketValue", 250_000)
                .with("assessmentRatio", 40)
                .with("millageRate", 65)
                .with("specialAssessments", 350)
                .with("paymentFrequency", "quarterly")
                .with("expectedAnnualChange", 3),
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
            .with("marketValue", 400_000)
            .with("millageRate", 20)
            .with("homesteadExemption", true)
            .with("homesteadExemptionAmount", 50_000)
    }

    fn outputs_for(raw: &RawInputs) -> OutputBag {
        match calculator().evaluate(raw).unwrap() {
            Evaluation::Completed { outputs, .. } => outputs,
            Evaluation::Invalid { validation } => panic!("invalid: {:?}", validation.errors),
        }
    }

    #[test]
    fn test_homestead_bill() {
        let outputs = outputs_for(&base());
        assert_eq!(outputs.number("assessedValue").unwrap(), 400_000.0);
        assert_eq!(outputs.number("taxableValue").unwrap(), 350_000.0);
        assert_eq!(outputs.number("annualTax").unwrap(), 7_000.0);
        assert_eq!(outputs.number("installmentAmount").unwrap(), 3_500.0);
        assert_eq!(outputs.number("monthlyEscrow").unwrap(), 583.33);
        assert_eq!(outputs.number("exemptionSavings").unwrap(), 1_000.0);
        assert_eq!(outputs.number("effectiveTaxRate").unwrap(), 1.75);
    }

    #[test]
    fn test_unclaimed_exemption_ignored() {
        let input = PropertyTaxInput {
            market_value: Money(300_000.0),
            assessment_ratio: Percent(100.0),
            millage_rate: Mills(10.0),
            special_assessments: Money(0.0),
            homestead_exemption: false,
            homestead_exemption_amount: Money(0.0),
            senior_exemption: false,
            senior_exemption_amount: Money(25_000.0),
            other_exemptions: Money(5_000.0),
            local_average_rate: None,
            payment_frequency: PaymentFrequency::Annually,
            expected_annual_change: Percent(0.0),
        };
        assert_eq!(input.total_exemptions().0, 5_000.0);
        let result = calculate(&input, &PropertyTaxSettings::default()).unwrap();
        assert_eq!(result.annual_tax.0, 2_950.0);
        assert_eq!(result.appeal, AppealOutlook::NoComparison);
    }

    #[test]
    fn test_appeal_against_local_average() {
        let outputs = outputs_for(&base().with("localAverageRate", 1.2));
        assert!(outputs.text("appealRecommendation").unwrap().starts_with("Consider an appeal"));

        let outputs = outputs_for(&base().with("localAverageRate", 1.7));
        assert_eq!(outputs.text("appealRecommendation").unwrap(), "No appeal indicated");

        let outputs = outputs_for(&base());
        assert!(outputs.get("appealRecommendation").unwrap().is_unavailable());
    }

    #[test]
    fn test_high_rate_warning() {
        let result = calculator().validate(&base().with("localAverageRate", 1.1));
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("1.75%"));

        let result = calculator().validate(&base().with("localAverageRate", 1.2));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_projection() {
        let outputs = outputs_for(&base().with("expectedAnnualChange", 3));
        assert_eq!(
            outputs.series("projectedAnnualTax").unwrap(),
            &[7210.0, 7426.3, 7649.09, 7878.56, 8114.92]
        );
    }

    #[test]
    fn test_exemption_rules() {
        let result = calculator().validate(&base().with("homesteadExemption", false));
        assert_eq!(
            result.errors,
            vec!["Homestead exemption amount requires the homestead exemption to be claimed".to_string()]
        );

        let result = calculator().validate(&base().with("otherExemptions", 400_000));
        assert_eq!(
            result.errors,
            vec!["Total exemptions cannot exceed the assessed value".to_string()]
        );
    }

    #[test]
    fn test_report() {
        match calculator().evaluate(&base()).unwrap() {
            Evaluation::Completed { report, .. } => {
                assert!(report.contains("- Annual property tax: $7,000.00"));
                assert!(report.contains("Exemptions save $1,000.00 per year"));
                assert!(report.contains("Year 5"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
