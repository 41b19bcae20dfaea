//! Boosted Strategy Shared Primitives
//!
//! Common types, fixed-point helpers and epoch arithmetic used by the
//! reward swapper and the boosted strategy pallets.

#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_runtime::{
    helpers_128bit::multiply_by_rational_with_rounding, FixedPointNumber, FixedU128, Rounding,
};

// ============================================================================
// Common Types
// ============================================================================

/// Reward distributor epoch number (seconds since epoch / WEEK_SECS)
pub type Week = u64;

/// Unix time in seconds
pub type Moment = u64;

// ============================================================================
// Time Constants
// ============================================================================

/// Seconds per hour
pub const HOUR_SECS: u64 = 3600;

/// Seconds per day
pub const DAY_SECS: u64 = 24 * HOUR_SECS;

/// Seconds per reward epoch (7 days)
pub const WEEK_SECS: u64 = 7 * DAY_SECS;

// ============================================================================
// Fixed Point
// ============================================================================

/// Scale of every ratio handled by the strategy (1e18, same as `FixedU128`)
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// A ratio of exactly one.
pub const fn unit_ratio() -> FixedU128 {
    FixedU128::from_inner(SCALE)
}

/// `floor(amount * ratio)`. Truncates toward zero, `None` on overflow.
pub fn mul_floor(amount: u128, ratio: FixedU128) -> Option<u128> {
    multiply_by_rational_with_rounding(amount, ratio.into_inner(), SCALE, Rounding::Down)
}

/// `floor(amount * numerator / denominator)`, `None` on overflow or a zero denominator.
pub fn mul_div_floor(amount: u128, numerator: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    multiply_by_rational_with_rounding(amount, numerator, denominator, Rounding::Down)
}

// ============================================================================
// Epoch Arithmetic
// ============================================================================

/// Week containing `now`
pub fn week_of(now: Moment) -> Week {
    now / WEEK_SECS
}

/// Timestamp at which the week containing `now` ends
pub fn week_end(now: Moment) -> Moment {
    (week_of(now) + 1) * WEEK_SECS
}

/// Seconds left until the current weekly epoch rolls over. Never zero.
pub fn time_until_week_end(now: Moment) -> u64 {
    week_end(now) - now
}

// ============================================================================
// Swap Types
// ============================================================================

/// Bounds on the amount handed to a single conversion call.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, DecodeWithMemTracking, TypeInfo, MaxEncodedLen, Default)]
pub struct SwapThresholds<Balance> {
    /// Smallest amount worth converting
    pub min: Balance,
    /// Largest amount converted in one call
    pub max: Balance,
}

impl<Balance: PartialOrd + Copy> SwapThresholds<Balance> {
    pub fn new(min: Balance, max: Balance) -> Self {
        Self { min, max }
    }

    /// `min <= max`
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Whether `amount` lies in `[min, max]`
    pub fn contains(&self, amount: Balance) -> bool {
        self.min <= amount && amount <= self.max
    }
}

/// Conversion path chosen by the swap router for one call.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, DecodeWithMemTracking, TypeInfo, MaxEncodedLen)]
pub enum SwapPath {
    /// Mint the want asset 1:1 from the reward underlying
    Mint,
    /// Bilateral fill against the OTC desk at the oracle price
    Otc,
    /// One or two AMM hops with an oracle-derived minimum output
    Pool,
}

/// Record of one OTC fill. Only ever emitted in an event.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, DecodeWithMemTracking, TypeInfo, MaxEncodedLen)]
pub struct OtcQuote<AssetId, Balance> {
    pub sell_token: AssetId,
    pub buy_token: AssetId,
    pub sell_amount: Balance,
    /// `floor(sell_amount * price_used)`
    pub buy_amount: Balance,
    /// Want per reward underlying, 18 decimals
    pub price_used: FixedU128,
    /// Time of the fill (seconds)
    pub timestamp: Moment,
}

/// One oracle observation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, DecodeWithMemTracking, TypeInfo, MaxEncodedLen, Default)]
pub struct PriceSample {
    /// Want per reward underlying, 18 decimals
    pub price: FixedU128,
    /// When the feed last updated (seconds)
    pub updated_at: Moment,
}

impl PriceSample {
    /// A sample is fresh while its age does not exceed `max_age`.
    /// Samples stamped in the future count as age zero.
    pub fn is_fresh(&self, now: Moment, max_age: u64) -> bool {
        now.saturating_sub(self.updated_at) <= max_age
    }
}

// ============================================================================
// Staking Types
// ============================================================================

/// Cached view of the strategy's staked position.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, DecodeWithMemTracking, TypeInfo, MaxEncodedLen, Default)]
pub struct Position<Balance> {
    /// Liquid want held by the strategy
    pub want_balance: Balance,
    /// Want locked at the staking venue
    pub staked_balance: Balance,
    /// Boost in effect now, as a fraction of the venue maximum
    pub active_boost: FixedU128,
    /// Boost once current locks mature
    pub projected_boost: FixedU128,
}
