//! # Amortization Formulas
//!
//! Level-payment loan equations shared by the mortgage and commercial
//! calculators. Rates are annual fractions (`0.065`), compounding monthly.
//!
//! ## Notation
//!
//! - `P` = Principal
//! - `r` = Monthly periodic rate (annual / 12)
//! - `n` = Number of monthly payments
//! - `A` = Level monthly payment
//! - `B_k` = Balance after `k` payments
//!
//! Callers guarantee `n > 0`; a zero rate degenerates to straight-line
//! repayment rather than dividing by zero.

// =============================================================================
// PAYMENT
// =============================================================================

/// Level monthly payment that retires `principal` in `months` payments
///
/// # Formula
/// - A = P·r(1+r)^n / ((1+r)^n − 1)
/// - A = P / n when r = 0
///
/// ```rust
/// use calc_core::equations::amortization::monthly_payment;
///
/// let payment = monthly_payment(300_000.0, 0.065, 360.0);
/// assert!((payment - 1896.20).abs() < 0.01);
/// assert_eq!(monthly_payment(12_000.0, 0.0, 12.0), 1000.0);
/// ```
pub fn monthly_payment(principal: f64, annual_rate: f64, months: f64) -> f64 {
    let r = annual_rate / 12.0;
    if r == 0.0 {
        return principal / months;
    }
    let growth = (1.0 + r).powf(months);
    principal * r * growth / (growth - 1.0)
}

/// Principal a level monthly payment can support over `months`
///
/// # Formula
/// - P = A(1 − (1+r)^−n) / r
/// - P = A·n when r = 0
pub fn principal_for_payment(payment: f64, annual_rate: f64, months: f64) -> f64 {
    let r = annual_rate / 12.0;
    if r == 0.0 {
        return payment * months;
    }
    payment * (1.0 - (1.0 + r).powf(-months)) / r
}

// =============================================================================
// BALANCE
// =============================================================================

/// Remaining balance after `k` payments of `payment`, floored at zero
///
/// # Formula
/// - B_k = P(1+r)^k − A((1+r)^k − 1) / r
/// - B_k = P − A·k when r = 0
pub fn balance_after(principal: f64, annual_rate: f64, payment: f64, k: f64) -> f64 {
    let r = annual_rate / 12.0;
    let balance = if r == 0.0 {
        principal - payment * k
    } else {
        let growth = (1.0 + r).powf(k);
        principal * growth - payment * (growth - 1.0) / r
    };
    balance.max(0.0)
}

/// Number of monthly payments until the balance first reaches `target`.
///
/// Steps month by month so extra principal can be added on each payment.
/// Returns `None` when the payment never covers the interest or the target
/// is not reached within `max_months`.
///
/// ```rust
/// use calc_core::equations::amortization::months_to_balance;
///
/// assert_eq!(months_to_balance(10_000.0, 0.0, 1_000.0, 0.0, 600), Some(10));
/// assert_eq!(months_to_balance(5_000.0, 0.0, 1_000.0, 8_000.0, 600), Some(0));
/// assert_eq!(months_to_balance(100_000.0, 0.12, 500.0, 0.0, 600), None);
/// ```
pub fn months_to_balance(balance: f64, annual_rate: f64, payment: f64, target: f64, max_months: u32) -> Option<u32> {
    let r = annual_rate / 12.0;
    let mut remaining = balance;
    for month in 0..=max_months {
        if remaining <= target + 1e-9 {
            return Some(month);
        }
        let principal_paid = payment - remaining * r;
        if principal_paid <= 0.0 {
            return None;
        }
        remaining -= principal_paid;
    }
    None
}
