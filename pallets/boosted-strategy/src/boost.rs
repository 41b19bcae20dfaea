//! Boost manager.
//!
//! Owns the strategy's position at the boosted staker. Stake and unstake are
//! the only ways the cached [`Position`] changes.

use crate::{BoostedStaker, Config, Error, Event, Pallet, StrategyPosition};
use frame_support::ensure;
use frame_support::traits::fungibles::Inspect;
use frame_support::traits::Get;
use sp_runtime::traits::{Saturating, Zero};
use sp_runtime::{DispatchError, DispatchResult, FixedPointNumber, FixedU128};
use strategy_primitives::{mul_div_floor, unit_ratio, Position, SCALE};

impl<T: Config> Pallet<T> {
    /// Liquid want held by the strategy
    pub fn want_balance() -> T::Balance {
        T::Assets::balance(T::WantAssetId::get(), &Self::account_id())
    }

    pub fn staked_balance() -> T::Balance {
        T::Staker::balance_of(&Self::account_id())
    }

    pub fn active_boost() -> FixedU128 {
        T::Staker::active_boost_of(&Self::account_id())
    }

    pub fn projected_boost() -> FixedU128 {
        T::Staker::projected_boost_of(&Self::account_id())
    }

    /// Re-read the venue into the cached position.
    pub(crate) fn refresh_position() {
        StrategyPosition::<T>::put(Position {
            want_balance: Self::want_balance(),
            staked_balance: Self::staked_balance(),
            active_boost: Self::active_boost(),
            projected_boost: Self::projected_boost(),
        });
    }

    /// Lock `amount` of liquid want at the staker.
    pub fn do_stake(amount: T::Balance) -> DispatchResult {
        ensure!(Self::want_balance() >= amount, Error::<T>::InsufficientBalance);
        if amount.is_zero() {
            return Ok(());
        }

        T::Staker::stake(&Self::account_id(), amount)?;
        Self::refresh_position();

        log::info!(target: "boosted-strategy", "🔒 Staked {}", amount.into());
        Self::deposit_event(Event::Staked { amount, max_weighted: false });
        Ok(())
    }

    /// Release exactly `amount` from the staker.
    pub fn do_unstake(amount: T::Balance) -> DispatchResult {
        ensure!(amount <= Self::staked_balance(), Error::<T>::InsufficientStaked);
        if amount.is_zero() {
            return Ok(());
        }

        T::Staker::unstake(&Self::account_id(), amount)?;
        Self::refresh_position();

        log::info!(target: "boosted-strategy", "🔓 Unstaked {}", amount.into());
        Self::deposit_event(Event::Unstaked { amount });
        Ok(())
    }

    /// Release `min(amount, staked)`, returning what was released.
    pub fn unstake_up_to(amount: T::Balance) -> Result<T::Balance, DispatchError> {
        let amount = amount.min(Self::staked_balance());
        Self::do_unstake(amount)?;
        Ok(amount)
    }

    pub fn unstake_all() -> Result<T::Balance, DispatchError> {
        let staked = Self::staked_balance();
        Self::unstake_up_to(staked)
    }

    /// Stake at maximum weight until the projected boost reaches `target`.
    ///
    /// With `S` staked and projected boost `p`, staking `x` at full weight
    /// moves the projection to `(S * p + x) / (S + x)`, so
    /// `x = S * (target - p) / (1 - target)`. The amount is capped at the
    /// liquid balance; a target of one or more stakes everything liquid.
    pub fn do_manual_stake_as_weighted(target: FixedU128) -> Result<T::Balance, DispatchError> {
        let strategy = Self::account_id();
        ensure!(
            T::Staker::is_approved_weighted_staker(&strategy),
            Error::<T>::NotApprovedStaker
        );

        let projected = Self::projected_boost();
        if projected >= target {
            return Ok(Zero::zero());
        }

        let liquid = Self::want_balance();
        ensure!(!liquid.is_zero(), Error::<T>::InsufficientBalance);

        let staked: u128 = Self::staked_balance().into();
        let amount = if target >= unit_ratio() || staked == 0 {
            liquid
        } else {
            let needed = mul_div_floor(
                staked,
                target.into_inner().saturating_sub(projected.into_inner()),
                SCALE.saturating_sub(target.into_inner()),
            )
            .ok_or(Error::<T>::ArithmeticOverflow)?;
            T::Balance::from(needed).min(liquid)
        };
        if amount.is_zero() {
            return Ok(amount);
        }

        T::Staker::stake_as_max_weighted(&strategy, amount)?;
        Self::refresh_position();

        log::info!(
            target: "boosted-strategy",
            "🚀 Staked {} at max weight, projected boost {:?} -> {:?}",
            amount.into(),
            projected,
            Self::projected_boost()
        );
        Self::deposit_event(Event::Staked { amount, max_weighted: true });
        Ok(amount)
    }

    /// Stake everything liquid beyond what the vault wants back.
    pub(crate) fn adjust_position(debt_outstanding: T::Balance) -> DispatchResult {
        let liquid = Self::want_balance();
        if liquid > debt_outstanding {
            Self::do_stake(liquid.saturating_sub(debt_outstanding))?;
        }
        Ok(())
    }
}
