//! # Bundled Calculators
//!
//! Each calculator module follows the same pattern:
//!
//! - `*Input` - Typed view of a validated input bag (`from_bag`)
//! - `*Result` - Typed outputs (`into_bag`)
//! - `calculate(input, settings) -> CalcResult<*Result>` - Pure calculation
//! - An engine struct implementing [`Computation`](crate::calculator::Computation)
//!   and [`ReportGenerator`](crate::calculator::ReportGenerator)
//! - `definition(settings)` - The checked [`CalculatorDefinition`]
//!
//! ## Available Calculators
//!
//! - [`escrow_analysis`] - Escrow payment, required balance, shortage/surplus
//! - [`loan_to_value`] - LTV, CLTV, equity and PMI requirement
//! - [`pmi_cancellation`] - When mortgage insurance can come off
//! - [`debt_service_coverage`] - DSCR for income property loans
//! - [`property_tax`] - Assessed value, exemptions and annual tax

pub mod debt_service_coverage;
pub mod escrow_analysis;
pub mod loan_to_value;
pub mod pmi_cancellation;
pub mod property_tax;

use crate::calculator::CalculatorDefinition;
use crate::errors::CalcResult;
use crate::registry::Registry;
use crate::settings::Settings;

/// Definitions of every bundled calculator, in listing order
pub fn standard_definitions(settings: &Settings) -> CalcResult<Vec<CalculatorDefinition>> {
    Ok(vec![
        escrow_analysis::definition(settings)?,
        loan_to_value::definition(settings)?,
        pmi_cancellation::definition(settings)?,
        debt_service_coverage::definition(settings)?,
        property_tax::definition(settings)?,
    ])
}

/// A registry holding every bundled calculator.
///
/// Settings are checked first so a bad settings file fails here rather than
/// producing odd ratings later.
pub fn standard_registry(settings: &Settings) -> CalcResult<Registry> {
    settings.validate()?;
    let mut registry = Registry::new();
    for definition in standard_definitions(settings)? {
        registry.register(definition)?;
    }
    Ok(registry)
}
