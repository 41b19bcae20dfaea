//! Price oracle adapter.
//!
//! Wraps `Config::PriceFeed` with the staleness window stored by the pallet
//! and the rounding rules of the OTC and pool paths. All products truncate
//! toward zero.

use crate::{Config, Error, MaxOracleAge, PriceFeed};
use core::marker::PhantomData;
use sp_runtime::{FixedPointNumber, FixedU128, PerThing, Permill};
use strategy_primitives::{mul_floor, PriceSample};

pub struct OracleAdapter<T>(PhantomData<T>);

impl<T: Config> OracleAdapter<T> {
    /// Latest sample, rejected when missing, zero or older than `MaxOracleAge`.
    pub fn fresh_price(now: u64) -> Result<PriceSample, Error<T>> {
        let sample = T::PriceFeed::latest().ok_or(Error::<T>::OracleUnavailable)?;
        if sample.price.into_inner() == 0 {
            return Err(Error::<T>::OracleUnavailable);
        }

        let max_age = MaxOracleAge::<T>::get();
        if !sample.is_fresh(now, max_age) {
            log::warn!(
                target: "reward-swapper",
                "⏰ Oracle sample from {} is stale at {} (max age {}s)",
                sample.updated_at,
                now,
                max_age
            );
            return Err(Error::<T>::StaleOracle);
        }
        Ok(sample)
    }

    /// `floor(amount * price)`
    pub fn expected_out(amount: T::Balance, price: FixedU128) -> Result<T::Balance, Error<T>> {
        mul_floor(amount.into(), price)
            .map(Into::into)
            .ok_or(Error::<T>::ArithmeticOverflow)
    }

    /// `expected` less the slippage tolerance, rounded so the minimum never exceeds
    /// `floor((1 - tolerance) * expected)`.
    pub fn min_out(expected: T::Balance, tolerance: Permill) -> T::Balance {
        let expected: u128 = expected.into();
        expected.saturating_sub(tolerance.mul_ceil(expected)).into()
    }
}
