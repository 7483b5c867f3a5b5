//! # Calculator Settings
//!
//! Tunable parameters for the bundled calculators: rating bands, thresholds
//! and program rules that are business conventions rather than arithmetic.
//! Every value has a default, so an empty JSON object is a complete
//! settings file.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::settings::Settings;
//!
//! let settings: Settings = serde_json::from_str(r#"{ "dscr": { "defaultRequirement": 1.35 } }"#).unwrap();
//! assert_eq!(settings.dscr.default_requirement, 1.35);
//! assert_eq!(settings.escrow.refund_threshold, 50.0);
//! assert!(settings.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

/// Parameters for every bundled calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub escrow: EscrowSettings,
    pub ltv: LtvSettings,
    pub pmi: PmiSettings,
    pub dscr: DscrSettings,
    pub property_tax: PropertyTaxSettings,
}

/// Escrow analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EscrowSettings {
    /// Surplus at or below this amount is carried over instead of refunded
    pub refund_threshold: f64,

    /// Cushion limit in months of escrow payments
    pub max_cushion_months: f64,

    /// Months a shortage is spread over
    pub shortage_spread_months: f64,

    /// Projection years shown at most
    pub max_projection_years: u32,
}

impl Default for EscrowSettings {
    fn default() -> Self {
        EscrowSettings {
            refund_threshold: 50.0,
            max_cushion_months: 2.0,
            shortage_spread_months: 12.0,
            max_projection_years: 5,
        }
    }
}

/// Loan-to-value parameters (all ratios are fractions)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LtvSettings {
    /// Advisory when LTV is above this
    pub warning_level: f64,

    /// Upper bounds of the rating bands: excellent, good, average, poor.
    /// Anything above the last is "Very Poor".
    pub rating_bands: [f64; 4],
}

impl Default for LtvSettings {
    fn default() -> Self {
        LtvSettings {
            warning_level: 0.95,
            rating_bands: [0.70, 0.75, 0.80, 0.85],
        }
    }
}

/// PMI cancellation rules (whole-number percents)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PmiSettings {
    /// Conventional loans: borrower may request cancellation at this LTV
    pub conventional_target_ltv: f64,

    /// FHA: MIP runs this many years when the original LTV was at or below
    /// `fha_life_of_loan_ltv`
    pub fha_minimum_years: f64,

    /// FHA: above this original LTV, MIP stays for the life of the loan
    pub fha_life_of_loan_ltv: f64,

    /// Months of payment history searched before giving up
    pub max_search_months: u32,
}

impl Default for PmiSettings {
    fn default() -> Self {
        PmiSettings {
            conventional_target_ltv: 80.0,
            fha_minimum_years: 11.0,
            fha_life_of_loan_ltv: 90.0,
            max_search_months: 600,
        }
    }
}

/// Debt service coverage parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DscrSettings {
    /// Lender requirement used when the caller doesn't supply one
    pub default_requirement: f64,

    /// DSCR at or above this is rated "Strong"
    pub strong_band: f64,

    /// DSCR at or above this (and below strong) is "Adequate"; below is "High Risk"
    pub marginal_band: f64,

    /// Advisory when operating expenses exceed this share of income
    pub expense_ratio_warning: f64,
}

impl Default for DscrSettings {
    fn default() -> Self {
        DscrSettings {
            default_requirement: 1.25,
            strong_band: 1.5,
            marginal_band: 1.0,
            expense_ratio_warning: 0.6,
        }
    }
}

/// Property tax parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyTaxSettings {
    /// Warn when the effective rate exceeds the local average by this factor
    pub rate_warning_multiplier: f64,

    /// Recommend an appeal when the effective rate exceeds the local
    /// average by this factor
    pub appeal_ratio: f64,
}

impl Default for PropertyTaxSettings {
    fn default() -> Self {
        PropertyTaxSettings {
            rate_warning_multiplier: 1.5,
            appeal_ratio: 1.1,
        }
    }
}

fn invalid(field: &str, value: f64, reason: &str) -> CalcError {
    CalcError::invalid_input(field, value.to_string(), reason)
}

impl Settings {
    /// Reject parameters no calculator can work with.
    pub fn validate(&self) -> CalcResult<()> {
        let e = &self.escrow;
        if e.refund_threshold < 0.0 {
            return Err(invalid("escrow.refundThreshold", e.refund_threshold, "must be non-negative"));
        }
        if e.max_cushion_months < 0.0 {
            return Err(invalid("escrow.maxCushionMonths", e.max_cushion_months, "must be non-negative"));
        }
        if e.shortage_spread_months < 1.0 {
            return Err(invalid("escrow.shortageSpreadMonths", e.shortage_spread_months, "must be at least 1"));
        }
        if e.max_projection_years == 0 || e.max_projection_years > 5 {
            return Err(invalid(
                "escrow.maxProjectionYears",
                e.max_projection_years as f64,
                "must be between 1 and 5",
            ));
        }

        let l = &self.ltv;
        if !(0.0..=2.0).contains(&l.warning_level) {
            return Err(invalid("ltv.warningLevel", l.warning_level, "must be a fraction between 0 and 2"));
        }
        if l.rating_bands.windows(2).any(|w| w[0] > w[1]) {
            return Err(CalcError::invalid_input(
                "ltv.ratingBands",
                format!("{:?}", l.rating_bands),
                "bands must be ascending",
            ));
        }

        let p = &self.pmi;
        if !(0.0..=100.0).contains(&p.conventional_target_ltv) {
            return Err(invalid("pmi.conventionalTargetLtv", p.conventional_target_ltv, "must be a percent"));
        }
        if p.fha_minimum_years < 0.0 {
            return Err(invalid("pmi.fhaMinimumYears", p.fha_minimum_years, "must be non-negative"));
        }
        if p.max_search_months == 0 {
            return Err(invalid("pmi.maxSearchMonths", 0.0, "must be positive"));
        }

        let d = &self.dscr;
        if d.default_requirement <= 0.0 {
            return Err(invalid("dscr.defaultRequirement", d.default_requirement, "must be positive"));
        }
        if d.marginal_band > d.strong_band {
            return Err(invalid("dscr.marginalBand", d.marginal_band, "cannot exceed the strong band"));
        }
        if d.expense_ratio_warning <= 0.0 {
            return Err(invalid("dscr.expenseRatioWarning", d.expense_ratio_warning, "must be positive"));
        }

        let t = &self.property_tax;
        if t.rate_warning_multiplier < 1.0 {
            return Err(invalid("propertyTax.rateWarningMultiplier", t.rate_warning_multiplier, "must be at least 1"));
        }
        if t.appeal_ratio < 1.0 {
            return Err(invalid("propertyTax.appealRatio", t.appeal_ratio, "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_override() {
        let settings: Settings =
            serde_json::from_str(r#"{ "propertyTax": { "appealRatio": 1.2 }, "ltv": { "warningLevel": 0.9 } }"#)
                .unwrap();
        assert_eq!(settings.property_tax.appeal_ratio, 1.2);
        assert_eq!(settings.property_tax.rate_warning_multiplier, 1.5);
        assert_eq!(settings.ltv.warning_level, 0.9);
    }

    #[test]
    fn test_rejects_unordered_bands() {
        let mut settings = Settings::default();
        settings.ltv.rating_bands = [0.8, 0.7, 0.9, 0.95];
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.dscr.marginal_band = 2.0;
        assert!(settings.validate().is_err());
    }
}
