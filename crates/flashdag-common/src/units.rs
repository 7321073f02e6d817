//! Token units - exact conversion between display amounts and wei
//!
//! Contract amounts are 256-bit integers in the token's smallest unit. Display
//! amounts are [`Decimal`]s. Conversions never round: an amount with more
//! fractional digits than the token supports is rejected.

use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::AmountError;

/// Decimals of the platform token
pub const DEFAULT_DECIMALS: u8 = 18;

/// Largest decimals value whose scale factor fits in a u128
const MAX_DECIMALS: u8 = 38;

fn scale_factor(decimals: u8) -> Result<U256, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::Overflow);
    }
    Ok(U256::from(10u128.pow(decimals as u32)))
}

/// Convert a display amount into base units
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative);
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > decimals as u32 {
        return Err(AmountError::Precision { decimals });
    }

    let mantissa = u128::try_from(amount.mantissa()).map_err(|_| AmountError::Negative)?;
    let factor = scale_factor(decimals - scale as u8)?;

    U256::from(mantissa)
        .checked_mul(factor)
        .ok_or(AmountError::Overflow)
}

/// Convert base units into a display amount
pub fn from_base_units(value: U256, decimals: u8) -> Result<Decimal, AmountError> {
    let raw = u128::try_from(value).map_err(|_| AmountError::Overflow)?;
    let raw = i128::try_from(raw).map_err(|_| AmountError::Overflow)?;

    Decimal::try_from_i128_with_scale(raw, decimals as u32)
        .map(|d| d.normalize())
        .map_err(|_| AmountError::Overflow)
}

/// Parse a user-entered amount string
pub fn parse_amount(input: &str) -> Result<Decimal, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    Decimal::from_str(trimmed).map_err(|e| AmountError::Parse(format!("{}: {}", trimmed, e)))
}

/// Parse an 18-decimal token amount into wei
pub fn parse_ether(input: &str) -> Result<U256, AmountError> {
    to_base_units(parse_amount(input)?, DEFAULT_DECIMALS)
}

/// Format wei as an 18-decimal token amount
pub fn format_ether(value: U256) -> Result<Decimal, AmountError> {
    from_base_units(value, DEFAULT_DECIMALS)
}

/// Format a display amount with a fixed number of decimal places
///
/// Ties round away from zero.
pub fn display(amount: Decimal, places: u32) -> String {
    let rounded = amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", places as usize, rounded)
}
