//! Rate and duration conversions
//!
//! The contract stores rates in basis points and durations in seconds. These
//! conversions are exact; a rate that does not land on a whole basis point is
//! rejected instead of rounded.

use flashdag_common::{AmountError, SECONDS_PER_DAY};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Percentage to basis points (6.8 -> 680)
pub fn percent_to_bps(rate_pct: Decimal) -> Result<u32, AmountError> {
    if rate_pct < Decimal::ZERO {
        return Err(AmountError::Negative);
    }

    let bps = rate_pct
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(AmountError::Overflow)?;
    if !bps.fract().is_zero() {
        return Err(AmountError::FractionalBasisPoints(rate_pct));
    }

    bps.to_u32().ok_or(AmountError::Overflow)
}

/// Basis points to percentage (680 -> 6.8)
pub fn bps_to_percent(bps: u32) -> Decimal {
    Decimal::from(bps) / Decimal::ONE_HUNDRED
}

pub fn days_to_seconds(days: u32) -> u64 {
    days as u64 * SECONDS_PER_DAY
}

/// Fractional days in a duration
pub fn seconds_to_days(secs: u64) -> Decimal {
    Decimal::from(secs) / Decimal::from(SECONDS_PER_DAY)
}

/// Observed APR range for a loan term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBand {
    pub min: Decimal,
    pub avg: Decimal,
    pub max: Decimal,
}

impl RateBand {
    const fn new(min: Decimal, avg: Decimal, max: Decimal) -> Self {
        Self { min, avg, max }
    }

    pub fn contains(&self, rate_pct: Decimal) -> bool {
        rate_pct >= self.min && rate_pct <= self.max
    }
}

const fn pct(tenths: u32) -> Decimal {
    Decimal::from_parts(tenths, 0, 0, false, 1)
}

/// Market rate bands keyed by term length in days
pub const MARKET_RATES: [(u32, RateBand); 5] = [
    (7, RateBand::new(pct(42), pct(51), pct(68))),
    (14, RateBand::new(pct(45), pct(55), pct(72))),
    (30, RateBand::new(pct(58), pct(68), pct(85))),
    (60, RateBand::new(pct(65), pct(78), pct(92))),
    (90, RateBand::new(pct(72), pct(85), pct(101))),
];

/// Rate band for an exact term length
pub fn market_rate_band(duration_days: u32) -> Option<RateBand> {
    MARKET_RATES
        .iter()
        .find(|(days, _)| *days == duration_days)
        .map(|(_, band)| *band)
}

/// Average market rate to pre-fill for a term
pub fn suggested_rate(duration_days: u32) -> Option<Decimal> {
    market_rate_band(duration_days).map(|band| band.avg)
}
