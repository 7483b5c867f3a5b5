//! # Financial Equations
//!
//! Closed-form formulas used by the calculators, kept apart from the
//! calculator wiring so they can be checked against textbook values.
//!
//! ## Modules
//!
//! - [`amortization`] - Level-payment loans (payment, balance, payoff months)
//!
//! ## Conventions
//!
//! - **Rates**: annual fractions, compounded monthly
//! - **Terms**: months
//! - **Amounts**: dollars, unrounded

pub mod amortization;

pub use amortization::{balance_after, monthly_payment, months_to_balance, principal_for_payment};
