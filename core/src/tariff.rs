//! Tariff tiers and the progressive (slab) consumption charge.
//!
//! Consumption is billed at increasing marginal rates per band: the
//! first band's units at the first rate, the next band's units at the
//! next rate, and so on. Never a single flat rate for the whole volume.

use crate::{
    error::{WsmsError, WsmsResult},
    types::{Units, MAX_STORED_UNITS},
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currency amounts are kept to this many decimal places.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffTier {
    pub lower_bound:   Units,
    /// `None` means unbounded. Only the last tier may be unbounded.
    pub upper_bound:   Option<Units>,
    pub rate_per_unit: Decimal,
}

impl TariffTier {
    pub fn bounded(lower_bound: Units, upper_bound: Units, rate_per_unit: Decimal) -> Self {
        Self { lower_bound, upper_bound: Some(upper_bound), rate_per_unit }
    }

    pub fn unbounded(lower_bound: Units, rate_per_unit: Decimal) -> Self {
        Self { lower_bound, upper_bound: None, rate_per_unit }
    }
}

/// Supplies the tariff schedule used to price consumption.
///
/// Implementations return tiers sorted by `lower_bound` and already
/// validated; a malformed schedule is a `Configuration` error.
/// An empty schedule is allowed and prices everything at zero.
pub trait RateTableProvider {
    fn fetch_tiers(&self) -> WsmsResult<Vec<TariffTier>>;
}

/// Sort `tiers` by lower bound and check the schedule invariants:
/// first tier starts at 0, each tier starts where the previous one
/// ended, bounded tiers are non-empty, rates are non-negative, bounds
/// fit the store and the only unbounded tier is the last one.
pub fn validate_tiers(mut tiers: Vec<TariffTier>) -> WsmsResult<Vec<TariffTier>> {
    tiers.sort_by_key(|t| t.lower_bound);

    let last = tiers.len().saturating_sub(1);
    let mut expected_floor: Units = 0;

    for (i, tier) in tiers.iter().enumerate() {
        let highest = tier.upper_bound.unwrap_or(tier.lower_bound);
        if highest > MAX_STORED_UNITS {
            return Err(WsmsError::Configuration(format!(
                "tier bound {highest} exceeds the largest storable unit count {MAX_STORED_UNITS}"
            )));
        }
        if tier.rate_per_unit < Decimal::ZERO {
            return Err(WsmsError::Configuration(format!(
                "tier starting at {} has negative rate {}",
                tier.lower_bound, tier.rate_per_unit
            )));
        }
        if tier.lower_bound != expected_floor {
            let what = if tier.lower_bound > expected_floor { "gap" } else { "overlap" };
            return Err(WsmsError::Configuration(format!(
                "{what} in tariff: tier starts at {} but previous coverage ends at {expected_floor}",
                tier.lower_bound
            )));
        }
        match tier.upper_bound {
            Some(upper) if upper <= tier.lower_bound => {
                return Err(WsmsError::Configuration(format!(
                    "tier {}..{upper} is empty or inverted",
                    tier.lower_bound
                )));
            }
            Some(upper) => expected_floor = upper,
            None if i != last => {
                return Err(WsmsError::Configuration(format!(
                    "unbounded tier starting at {} must be the last tier",
                    tier.lower_bound
                )));
            }
            None => {}
        }
    }

    Ok(tiers)
}

/// Round half-up to the currency scale.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Price `units` of consumption against a sorted, validated schedule.
///
/// Rounding is applied once to the final total, not per tier.
/// Decimal overflow panics: it can only come from a nonsensical
/// schedule, never from ordinary input.
pub fn compute_tier_charge(units: Units, tiers: &[TariffTier]) -> Decimal {
    let mut consumed_floor: Units = 0;
    let mut total = Decimal::ZERO;

    for tier in tiers {
        if units <= consumed_floor {
            break;
        }
        let tier_ceiling = tier.upper_bound.unwrap_or(Units::MAX);
        let quantity = units.min(tier_ceiling).saturating_sub(consumed_floor);
        total += Decimal::from(quantity) * tier.rate_per_unit;
        consumed_floor = tier_ceiling;
    }

    round_money(total)
}
