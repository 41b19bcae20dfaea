//! Collaborators of the strategy.
//!
//! The vault, the boosted staker, the reward distributor and the reward vault
//! live outside this pallet and are reached only through these traits.
//! Every read goes to the collaborator; nothing is cached across calls.

use sp_runtime::{DispatchError, DispatchResult, FixedU128};
use strategy_primitives::Week;

/// Pooled vault lending want to this strategy.
pub trait StrategyVault<AccountId, Balance> {
    /// Account holding the vault's idle want
    fn account() -> AccountId;

    /// Idle want plus all outstanding strategy debt
    fn total_assets() -> Balance;

    /// Extra want the vault would lend `strategy` at the next report
    fn credit_available(strategy: &AccountId) -> Balance;

    /// Want the vault wants back from `strategy`
    fn debt_outstanding(strategy: &AccountId) -> Balance;

    /// Want currently lent to `strategy`
    fn strategy_debt(strategy: &AccountId) -> Balance;

    /// Settle a harvest. `strategy` must hold `gain + debt_payment` liquid want.
    /// Returns the debt still outstanding afterwards.
    fn report(
        strategy: &AccountId,
        gain: Balance,
        loss: Balance,
        debt_payment: Balance,
    ) -> Result<Balance, DispatchError>;

    /// Stop lending to `strategy` and ask for everything back.
    fn revoke_strategy(strategy: &AccountId) -> DispatchResult;

    /// Move `old`'s debt to `new`.
    fn migrate_strategy(old: &AccountId, new: &AccountId) -> DispatchResult;
}

/// Staking venue paying boosted rewards to long-standing stake.
pub trait BoostedStaker<AccountId, Balance> {
    /// Lock `amount` want from `who`; boost accrues over the following weeks.
    fn stake(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError>;

    /// Lock `amount` at maximum weight immediately. Approved stakers only.
    fn stake_as_max_weighted(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError>;

    /// Release `amount` back to `who`.
    fn unstake(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError>;

    fn balance_of(who: &AccountId) -> Balance;

    /// Boost in effect now, as a fraction of the maximum
    fn active_boost_of(who: &AccountId) -> FixedU128;

    /// Boost `who` will have once the current week rolls
    fn projected_boost_of(who: &AccountId) -> FixedU128;

    fn is_approved_weighted_staker(who: &AccountId) -> bool;
}

/// Weekly reward distributor. Rewards are paid in reward vault shares.
pub trait RewardDistributor<AccountId, Balance> {
    fn claim(who: &AccountId) -> Result<Balance, DispatchError>;

    fn claimable(who: &AccountId) -> Balance;

    fn current_week() -> Week;

    fn weekly_amount(week: Week) -> Balance;
}

/// Vault whose shares are the reward token.
pub trait RewardVault<AccountId, Balance> {
    /// Burn `shares` held by `who` and pay the underlying to `who`.
    fn redeem(who: &AccountId, shares: Balance) -> Result<Balance, DispatchError>;
}

/// Strategy surface used by the vault.
pub trait StrategyApi<AccountId, Balance> {
    /// Account holding the strategy's funds
    fn strategy_account() -> AccountId;

    /// Liquid want plus staked want
    fn estimated_total_assets() -> Balance;

    /// Free up to `amount` want and send it to the vault.
    /// Returns `(freed, loss)`.
    fn withdraw(amount: Balance) -> Result<(Balance, Balance), DispatchError>;
}
