//! Loan form validation
//!
//! Mirrors the contract's limits so a borrower sees every problem with a form
//! at once, before anything is signed. A form that passes here can still be
//! rejected on-chain.

use flashdag_common::{
    units, FieldError, FlashdagError, FormField, LoanRequest, PlatformLimits, Result,
    TOKEN_SYMBOL,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collateral::{collateral_ratio, meets_minimum};
use crate::interest::LoanQuote;
use crate::rates::{days_to_seconds, percent_to_bps};

/// Borrow form contents in display units
///
/// Unparsable inputs are carried as `None` so validation can report them
/// alongside every other problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanForm {
    /// Whole tokens
    pub amount: Option<Decimal>,
    /// Whole tokens
    pub collateral: Option<Decimal>,
    pub interest_rate_pct: Option<Decimal>,
    pub duration_days: Option<u32>,
    pub purpose: String,
}

impl LoanForm {
    /// Build a form from raw text inputs
    pub fn from_inputs(
        amount: &str,
        collateral: &str,
        interest_rate_pct: &str,
        duration_days: &str,
        purpose: &str,
    ) -> Self {
        Self {
            amount: units::parse_amount(amount).ok(),
            collateral: units::parse_amount(collateral).ok(),
            interest_rate_pct: units::parse_amount(interest_rate_pct).ok(),
            duration_days: duration_days.trim().parse().ok(),
            purpose: purpose.trim().to_string(),
        }
    }

    /// Collateral ratio of the current inputs, in percent
    pub fn collateral_ratio(&self) -> Option<Decimal> {
        collateral_ratio(self.amount?, self.collateral?)
    }

    /// Repayment quote for the current inputs
    pub fn quote(&self) -> Option<LoanQuote> {
        LoanQuote::new(
            self.amount?,
            self.interest_rate_pct?,
            Decimal::from(self.duration_days?),
        )
    }

    /// Validate and convert into contract encoding
    pub fn to_request(&self, limits: &PlatformLimits, decimals: u8) -> Result<LoanRequest> {
        let errors = validate_loan_request(self, limits);
        if !errors.is_empty() {
            return Err(FlashdagError::Validation(errors));
        }

        let (Some(amount), Some(collateral), Some(rate_pct), Some(days)) = (
            self.amount,
            self.collateral,
            self.interest_rate_pct,
            self.duration_days,
        ) else {
            return Err(FlashdagError::Internal(
                "validated form is missing a field".to_string(),
            ));
        };

        let amount_wei = units::to_base_units(amount, decimals)?;
        let collateral_wei = units::to_base_units(collateral, decimals)?;

        if !meets_minimum(amount_wei, collateral_wei, limits.min_collateral_ratio_bps) {
            return Err(FlashdagError::Validation(vec![collateral_ratio_error(
                limits,
            )]));
        }

        Ok(LoanRequest::new(
            amount_wei,
            percent_to_bps(rate_pct)?,
            days_to_seconds(days),
            collateral_wei,
            self.purpose.clone(),
        ))
    }
}

fn collateral_ratio_error(limits: &PlatformLimits) -> FieldError {
    FieldError::new(
        FormField::Collateral,
        format!(
            "Minimum collateral ratio is {}%",
            limits.min_collateral_ratio_pct().normalize()
        ),
    )
}

/// Check a borrow form against platform limits, collecting every failure
pub fn validate_loan_request(form: &LoanForm, limits: &PlatformLimits) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match form.amount {
        Some(amount) if amount > Decimal::ZERO => {
            if amount < limits.min_loan_amount {
                errors.push(FieldError::new(
                    FormField::Amount,
                    format!(
                        "Minimum loan amount is {} {}",
                        limits.min_loan_amount.normalize(),
                        TOKEN_SYMBOL
                    ),
                ));
            }
            if amount > limits.max_loan_amount {
                errors.push(FieldError::new(
                    FormField::Amount,
                    format!(
                        "Maximum loan amount is {} {}",
                        limits.max_loan_amount.normalize(),
                        TOKEN_SYMBOL
                    ),
                ));
            }
        }
        // Range messages only apply to a positive amount
        _ => errors.push(FieldError::new(
            FormField::Amount,
            "Loan amount must be greater than 0",
        )),
    }

    match form.collateral {
        Some(collateral) if collateral > Decimal::ZERO => {
            let below_minimum = form
                .collateral_ratio()
                .is_some_and(|ratio| ratio < limits.min_collateral_ratio_pct());
            if below_minimum {
                errors.push(collateral_ratio_error(limits));
            }
        }
        _ => errors.push(FieldError::new(
            FormField::Collateral,
            "Collateral amount must be greater than 0",
        )),
    }

    match form.interest_rate_pct {
        None => errors.push(FieldError::new(
            FormField::InterestRate,
            "Interest rate is required",
        )),
        Some(rate) if rate < Decimal::ZERO => errors.push(FieldError::new(
            FormField::InterestRate,
            "Interest rate cannot be negative",
        )),
        Some(rate) if rate > limits.max_interest_rate_pct() => errors.push(FieldError::new(
            FormField::InterestRate,
            format!(
                "Maximum interest rate is {}%",
                limits.max_interest_rate_pct().normalize()
            ),
        )),
        Some(rate) => {
            if percent_to_bps(rate).is_err() {
                errors.push(FieldError::new(
                    FormField::InterestRate,
                    "Interest rate supports at most 2 decimal places",
                ));
            }
        }
    }

    let duration_ok = form
        .duration_days
        .is_some_and(|days| (limits.min_duration_days..=limits.max_duration_days).contains(&days));
    if !duration_ok {
        errors.push(FieldError::new(
            FormField::Duration,
            format!(
                "Duration must be between {} and {} days",
                limits.min_duration_days, limits.max_duration_days
            ),
        ));
    }

    errors
}
