//! # Boosted Strategy Pallet
//!
//! Deploys want lent by a pooled vault into a boosted staker, harvests the
//! weekly rewards and reports gains and losses back to the vault.
//!
//! ## Overview
//!
//! A keeper polls [`Pallet::harvest_trigger`] and dispatches `harvest` when it
//! returns true. A harvest:
//!
//! 1. claims the distributor rewards (vault shares) and redeems them
//! 2. converts the underlying into want through the reward swapper, in
//!    tranches that respect the swapper's `[min, max]` band
//! 3. unwinds the stake when emergency exit is set
//! 4. measures gain or loss against the vault's recorded debt and frees
//!    enough want to repay what the vault asks for
//! 5. reports to the vault and re-stakes whatever the vault left behind
//!
//! ## Key Invariants
//!
//! 1. **Atomic harvest**: any collaborator failure aborts the whole harvest
//! 2. **Sticky emergency exit**: once set it is never cleared
//! 3. **Monotonic reports**: `last_harvest` never moves backwards
//! 4. **Protected funds**: want and vault shares cannot be swept

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

/// Collaborator interfaces
pub mod traits;
pub use traits::{BoostedStaker, RewardDistributor, RewardVault, StrategyApi, StrategyVault};

/// Pure harvest/tend decision
pub mod trigger;
pub use trigger::{harvest_reason, should_harvest, should_tend, HarvestReason, TriggerSnapshot};

/// Stake management at the boosted staker
pub mod boost;

#[cfg(test)]
mod mock;


use frame_support::traits::fungibles::{Inspect, Mutate};
use frame_support::traits::tokens::Preservation;
use frame_support::traits::Get;
use sp_runtime::traits::Zero;
use sp_runtime::DispatchError;

pub use pallet_reward_swapper::RewardConverter;
pub use strategy_primitives::{time_until_week_end, Position};

#[frame_support::pallet]
pub mod pallet {
    use super::*;
    use frame_support::pallet_prelude::*;
    use frame_support::storage::with_storage_layer;
    use frame_support::PalletId;
    use frame_system::pallet_prelude::*;
    use sp_runtime::traits::{AccountIdConversion, Saturating};
    use sp_runtime::FixedU128;

    /// Pallet ID for the strategy account
    pub const PALLET_ID: PalletId = PalletId(*b"ybstrat0");

    // =========================================================================
    //                                  Types
    // =========================================================================

    /// Harvest scheduling state and policy knobs
    #[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
    pub struct HarvestState<Balance> {
        /// Time of the last completed harvest (seconds)
        pub last_harvest: u64,
        /// Idle vault credit that makes a harvest worthwhile
        pub credit_threshold: Balance,
        /// Claim window before the reward week rolls (seconds)
        pub threshold_time_until_week_end: u64,
        /// Longest gap between two harvests (seconds)
        pub max_report_delay: u64,
        /// Unwind everything and stop deploying
        pub emergency_exit: bool,
    }

    #[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen, Default)]
    pub enum HarvestPhase {
        #[default]
        Idle,
        /// Claiming, converting and freeing funds
        Harvesting,
        /// Settling with the vault
        Reporting,
    }

    // =========================================================================
    //                                  Config
    // =========================================================================

    #[pallet::config]
    pub trait Config: frame_system::Config + pallet_timestamp::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Balance type
        type Balance: Parameter
            + Member
            + From<u128>
            + Into<u128>
            + Copy
            + Default
            + MaxEncodedLen
            + Zero
            + Ord
            + Saturating;

        /// Asset ID type
        type AssetId: Parameter + Member + Copy + Default + MaxEncodedLen;

        /// Fungibles implementation for every asset the strategy holds
        type Assets: Mutate<Self::AccountId, AssetId = Self::AssetId, Balance = Self::Balance>
            + Inspect<Self::AccountId>;

        /// Asset lent by the vault and staked at the staker
        #[pallet::constant]
        type WantAssetId: Get<Self::AssetId>;

        /// Reward vault share paid by the distributor
        #[pallet::constant]
        type RewardAssetId: Get<Self::AssetId>;

        /// Asset obtained by redeeming reward shares
        #[pallet::constant]
        type RewardUnderlyingAssetId: Get<Self::AssetId>;

        /// Share token of the vault this strategy serves
        #[pallet::constant]
        type VaultShareAssetId: Get<Self::AssetId>;

        type Vault: StrategyVault<Self::AccountId, Self::Balance>;

        type Staker: BoostedStaker<Self::AccountId, Self::Balance>;

        type Distributor: RewardDistributor<Self::AccountId, Self::Balance>;

        type RewardVault: RewardVault<Self::AccountId, Self::Balance>;

        /// Converts the reward underlying into want
        type Swapper: RewardConverter<Self::AccountId, Self::Balance>;

        /// Governance; its success value receives swept funds
        type GovernanceOrigin: EnsureOrigin<Self::RuntimeOrigin, Success = Self::AccountId>;

        #[pallet::constant]
        type DefaultCreditThreshold: Get<Self::Balance>;

        #[pallet::constant]
        type DefaultThresholdTimeUntilWeekEnd: Get<u64>;

        /// Default staleness bound of the harvest trigger (seconds)
        #[pallet::constant]
        type DefaultMaxReportDelay: Get<u64>;

        /// Upper bound on swapper calls in one harvest
        #[pallet::constant]
        type MaxTranchesPerHarvest: Get<u32>;

        /// Weight information for extrinsics
        type WeightInfo: WeightInfo;
    }

    /// Weight functions for the strategy pallet
    pub trait WeightInfo {
        fn harvest() -> Weight;
        fn tend() -> Weight;
        fn set_parameter() -> Weight;
        fn set_emergency_exit() -> Weight;
        fn sweep() -> Weight;
        fn manual_stake_as_weighted() -> Weight;
        fn migrate() -> Weight;
    }

    /// Default weights
    impl WeightInfo for () {
        fn harvest() -> Weight {
            Weight::from_parts(500_000, 0)
        }
        fn tend() -> Weight {
            Weight::from_parts(100_000, 0)
        }
        fn set_parameter() -> Weight {
            Weight::from_parts(10_000, 0)
        }
        fn set_emergency_exit() -> Weight {
            Weight::from_parts(30_000, 0)
        }
        fn sweep() -> Weight {
            Weight::from_parts(20_000, 0)
        }
        fn manual_stake_as_weighted() -> Weight {
            Weight::from_parts(50_000, 0)
        }
        fn migrate() -> Weight {
            Weight::from_parts(200_000, 0)
        }
    }

    // =========================================================================
    //                                  Storage
    // =========================================================================

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    #[pallet::type_value]
    pub fn DefaultHarvestState<T: Config>() -> HarvestState<T::Balance> {
        HarvestState {
            last_harvest: 0,
            credit_threshold: T::DefaultCreditThreshold::get(),
            threshold_time_until_week_end: T::DefaultThresholdTimeUntilWeekEnd::get(),
            max_report_delay: T::DefaultMaxReportDelay::get(),
            emergency_exit: false,
        }
    }

    #[pallet::storage]
    #[pallet::getter(fn harvest_state)]
    pub type State<T: Config> =
        StorageValue<_, HarvestState<T::Balance>, ValueQuery, DefaultHarvestState<T>>;

    /// Where the current harvest is; `Idle` between extrinsics
    #[pallet::storage]
    #[pallet::getter(fn phase)]
    pub type Phase<T: Config> = StorageValue<_, HarvestPhase, ValueQuery>;

    /// Last observed position at the staker
    #[pallet::storage]
    #[pallet::getter(fn position)]
    pub type StrategyPosition<T: Config> = StorageValue<_, Position<T::Balance>, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn management)]
    pub type Management<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    #[pallet::storage]
    #[pallet::getter(fn keeper)]
    pub type Keeper<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    // =========================================================================
    //                              Genesis Config
    // =========================================================================

    #[pallet::genesis_config]
    #[derive(frame_support::DefaultNoBound)]
    pub struct GenesisConfig<T: Config> {
        pub management: Option<T::AccountId>,
        pub keeper: Option<T::AccountId>,
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            if let Some(ref who) = self.management {
                Management::<T>::put(who);
            }
            if let Some(ref who) = self.keeper {
                Keeper::<T>::put(who);
            }
        }
    }

    // =========================================================================
    //                                  Events
    // =========================================================================

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Harvest reported to the vault. [profit, loss, debt_payment, debt_outstanding]
        Harvested {
            profit: T::Balance,
            loss: T::Balance,
            debt_payment: T::Balance,
            debt_outstanding: T::Balance,
        },
        /// Position adjusted without claiming. [liquid, staked]
        Tended { liquid: T::Balance, staked: T::Balance },
        /// Distributor rewards claimed. [shares]
        RewardsClaimed { shares: T::Balance },
        /// Reward underlying converted into want. [amount_in, amount_out, tranches]
        RewardsConverted { amount_in: T::Balance, amount_out: T::Balance, tranches: u32 },
        /// Want locked at the staker. [amount, max_weighted]
        Staked { amount: T::Balance, max_weighted: bool },
        /// Want released from the staker. [amount]
        Unstaked { amount: T::Balance },
        /// Want sent to the vault on its request. [requested, freed, loss]
        WithdrawnToVault { requested: T::Balance, freed: T::Balance, loss: T::Balance },
        /// Emergency exit switched on
        EmergencyExitActivated,
        CreditThresholdUpdated { threshold: T::Balance },
        ThresholdTimeUntilWeekEndUpdated { seconds: u64 },
        MaxReportDelayUpdated { seconds: u64 },
        KeeperUpdated { keeper: T::AccountId },
        ManagementUpdated { management: T::AccountId },
        /// Unprotected asset sent to governance. [asset, amount, to]
        Swept { asset: T::AssetId, amount: T::Balance, to: T::AccountId },
        /// Funds and position handed to a new strategy account. [new_strategy, want]
        Migrated { new_strategy: T::AccountId, want: T::Balance },
    }

    // =========================================================================
    //                                  Errors
    // =========================================================================

    #[pallet::error]
    pub enum Error<T> {
        /// Not enough liquid want.
        InsufficientBalance,
        /// Unstake larger than the staked balance.
        InsufficientStaked,
        /// Strategy is not an approved weighted staker at the venue.
        NotApprovedStaker,
        /// Caller lacks the required role.
        Unauthorized,
        /// Want and vault shares cannot be swept.
        ProtectedAsset,
        /// A harvest or tend is already running.
        HarvestInProgress,
        /// Arithmetic overflow.
        ArithmeticOverflow,
        /// Strategy holds none of the asset.
        NothingToSweep,
    }

    // =========================================================================
    //                                Extrinsics
    // =========================================================================

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Claim, convert, settle with the vault and re-stake.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::harvest())]
        pub fn harvest(origin: OriginFor<T>) -> DispatchResult {
            Self::ensure_keeper(origin)?;
            Self::do_harvest()
        }

        /// Re-stake idle want (or unwind in emergency) without claiming.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::tend())]
        pub fn tend(origin: OriginFor<T>) -> DispatchResult {
            Self::ensure_keeper(origin)?;
            Self::do_tend()
        }

        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::set_parameter())]
        pub fn set_credit_threshold(origin: OriginFor<T>, threshold: T::Balance) -> DispatchResult {
            Self::ensure_management(origin)?;

            State::<T>::mutate(|s| s.credit_threshold = threshold);
            Self::deposit_event(Event::CreditThresholdUpdated { threshold });
            Ok(())
        }

        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::set_parameter())]
        pub fn set_threshold_time_until_week_end(origin: OriginFor<T>, seconds: u64) -> DispatchResult {
            Self::ensure_management(origin)?;

            State::<T>::mutate(|s| s.threshold_time_until_week_end = seconds);
            Self::deposit_event(Event::ThresholdTimeUntilWeekEndUpdated { seconds });
            Ok(())
        }

        #[pallet::call_index(4)]
        #[pallet::weight(T::WeightInfo::set_parameter())]
        pub fn set_max_report_delay(origin: OriginFor<T>, seconds: u64) -> DispatchResult {
            Self::ensure_management(origin)?;

            State::<T>::mutate(|s| s.max_report_delay = seconds);
            Self::deposit_event(Event::MaxReportDelayUpdated { seconds });
            Ok(())
        }

        #[pallet::call_index(5)]
        #[pallet::weight(T::WeightInfo::set_parameter())]
        pub fn set_keeper(origin: OriginFor<T>, keeper: T::AccountId) -> DispatchResult {
            Self::ensure_management(origin)?;

            Keeper::<T>::put(&keeper);
            Self::deposit_event(Event::KeeperUpdated { keeper });
            Ok(())
        }

        /// Governance only.
        #[pallet::call_index(6)]
        #[pallet::weight(T::WeightInfo::set_parameter())]
        pub fn set_management(origin: OriginFor<T>, management: T::AccountId) -> DispatchResult {
            Self::ensure_governance(origin)?;

            Management::<T>::put(&management);
            Self::deposit_event(Event::ManagementUpdated { management });
            Ok(())
        }

        /// Irreversibly switch to emergency exit and revoke the strategy at the vault.
        /// Calling it again is a no-op.
        #[pallet::call_index(7)]
        #[pallet::weight(T::WeightInfo::set_emergency_exit())]
        pub fn set_emergency_exit(origin: OriginFor<T>) -> DispatchResult {
            Self::ensure_management(origin)?;

            if State::<T>::get().emergency_exit {
                return Ok(());
            }
            State::<T>::mutate(|s| s.emergency_exit = true);
            T::Vault::revoke_strategy(&Self::account_id())?;

            log::warn!(target: "boosted-strategy", "🚨 Emergency exit activated");
            Self::deposit_event(Event::EmergencyExitActivated);
            Ok(())
        }

        /// Send the whole balance of an unprotected `asset` to governance.
        #[pallet::call_index(8)]
        #[pallet::weight(T::WeightInfo::sweep())]
        pub fn sweep(origin: OriginFor<T>, asset: T::AssetId) -> DispatchResult {
            let to = Self::ensure_governance(origin)?;
            ensure!(
                asset != T::WantAssetId::get() && asset != T::VaultShareAssetId::get(),
                Error::<T>::ProtectedAsset
            );

            let strategy = Self::account_id();
            let amount = T::Assets::balance(asset, &strategy);
            ensure!(!amount.is_zero(), Error::<T>::NothingToSweep);
            T::Assets::transfer(asset, &strategy, &to, amount, Preservation::Expendable)?;

            Self::deposit_event(Event::Swept { asset, amount, to });
            Ok(())
        }

        /// Stake liquid want at maximum weight until the projected boost reaches `target`.
        #[pallet::call_index(9)]
        #[pallet::weight(T::WeightInfo::manual_stake_as_weighted())]
        pub fn manual_stake_as_weighted(origin: OriginFor<T>, target: FixedU128) -> DispatchResult {
            Self::ensure_management(origin)?;
            Self::do_manual_stake_as_weighted(target)?;
            Ok(())
        }

        /// Hand every asset and the vault debt over to `new_strategy`.
        #[pallet::call_index(10)]
        #[pallet::weight(T::WeightInfo::migrate())]
        pub fn migrate(origin: OriginFor<T>, new_strategy: T::AccountId) -> DispatchResult {
            Self::ensure_governance(origin)?;
            Self::do_migrate(&new_strategy)
        }
    }

    // =========================================================================
    //                           Internal Functions
    // =========================================================================

    impl<T: Config> Pallet<T> {
        /// Account holding the strategy's funds
        pub fn account_id() -> T::AccountId {
            PALLET_ID.into_account_truncating()
        }

        /// Current on-chain time in seconds
        pub fn current_timestamp() -> u64 {
            let now_ms: u64 = pallet_timestamp::Pallet::<T>::now().try_into().unwrap_or(0);
            now_ms / 1000
        }

        fn ensure_governance(origin: OriginFor<T>) -> Result<T::AccountId, DispatchError> {
            T::GovernanceOrigin::ensure_origin(origin).map_err(|_| Error::<T>::Unauthorized.into())
        }

        fn ensure_management(origin: OriginFor<T>) -> DispatchResult {
            if T::GovernanceOrigin::try_origin(origin.clone()).is_ok() {
                return Ok(());
            }
            let who = ensure_signed(origin).map_err(|_| Error::<T>::Unauthorized)?;
            ensure!(Management::<T>::get().as_ref() == Some(&who), Error::<T>::Unauthorized);
            Ok(())
        }

        fn ensure_keeper(origin: OriginFor<T>) -> DispatchResult {
            if T::GovernanceOrigin::try_origin(origin.clone()).is_ok() {
                return Ok(());
            }
            let who = ensure_signed(origin).map_err(|_| Error::<T>::Unauthorized)?;
            let is_management = Management::<T>::get().as_ref() == Some(&who);
            let is_keeper = Keeper::<T>::get().as_ref() == Some(&who);
            ensure!(is_management || is_keeper, Error::<T>::Unauthorized);
            Ok(())
        }

        /// Liquid want plus staked want. Unconverted rewards are not counted.
        pub fn estimated_total_assets() -> T::Balance {
            Self::want_balance().saturating_add(Self::staked_balance())
        }

        // =====================================================================
        //                              Triggers
        // =====================================================================

        pub fn trigger_snapshot(now: u64) -> TriggerSnapshot<T::Balance> {
            let strategy = Self::account_id();
            let state = State::<T>::get();
            TriggerSnapshot {
                emergency_exit: state.emergency_exit,
                idle_credit: T::Vault::credit_available(&strategy),
                credit_threshold: state.credit_threshold,
                claimable: T::Distributor::claimable(&strategy),
                time_until_week_end: time_until_week_end(now),
                threshold_time_until_week_end: state.threshold_time_until_week_end,
                last_harvest: state.last_harvest,
                max_report_delay: state.max_report_delay,
            }
        }

        /// Whether a keeper should call `harvest` now. `_call_cost` is not used.
        pub fn harvest_trigger(_call_cost: T::Balance) -> bool {
            let now = Self::current_timestamp();
            let reason = harvest_reason(&Self::trigger_snapshot(now), now, true);
            log::debug!(target: "boosted-strategy", "⏱️ harvest trigger at {}: {:?}", now, reason);
            reason.is_some()
        }

        /// Whether a keeper should call `tend` now. Ignores staleness.
        pub fn tend_trigger(_call_cost: T::Balance) -> bool {
            let now = Self::current_timestamp();
            should_tend(&Self::trigger_snapshot(now), now)
        }

        // =====================================================================
        //                              Harvest
        // =====================================================================

        pub fn do_harvest() -> DispatchResult {
            ensure!(Phase::<T>::get() == HarvestPhase::Idle, Error::<T>::HarvestInProgress);

            with_storage_layer(|| -> DispatchResult {
                Phase::<T>::put(HarvestPhase::Harvesting);

                let strategy = Self::account_id();
                let now = Self::current_timestamp();
                let state = State::<T>::get();
                log::info!(
                    target: "boosted-strategy",
                    "🌾 Harvest at {} ({:?})",
                    now,
                    harvest_reason(&Self::trigger_snapshot(now), now, true)
                );

                let debt_outstanding = T::Vault::debt_outstanding(&strategy);

                Self::claim_and_convert(&strategy)?;

                if state.emergency_exit {
                    Self::unstake_all()?;
                }

                let (profit, loss, debt_payment) = Self::prepare_return(&strategy, debt_outstanding)?;

                Phase::<T>::put(HarvestPhase::Reporting);
                let debt_outstanding = T::Vault::report(&strategy, profit, loss, debt_payment)?;

                if !state.emergency_exit {
                    Self::adjust_position(debt_outstanding)?;
                }
                Self::refresh_position();

                State::<T>::mutate(|s| s.last_harvest = s.last_harvest.max(now));
                Phase::<T>::put(HarvestPhase::Idle);

                log::info!(
                    target: "boosted-strategy",
                    "✅ Harvested: profit {}, loss {}, debt payment {}, outstanding {}",
                    profit.into(),
                    loss.into(),
                    debt_payment.into(),
                    debt_outstanding.into()
                );
                Self::deposit_event(Event::Harvested { profit, loss, debt_payment, debt_outstanding });
                Ok(())
            })
        }

        pub fn do_tend() -> DispatchResult {
            ensure!(Phase::<T>::get() == HarvestPhase::Idle, Error::<T>::HarvestInProgress);

            with_storage_layer(|| -> DispatchResult {
                if State::<T>::get().emergency_exit {
                    Self::unstake_all()?;
                } else {
                    Self::adjust_position(T::Vault::debt_outstanding(&Self::account_id()))?;
                }
                Self::refresh_position();

                Self::deposit_event(Event::Tended {
                    liquid: Self::want_balance(),
                    staked: Self::staked_balance(),
                });
                Ok(())
            })
        }

        /// Claim rewards, redeem every reward share held and convert the underlying.
        fn claim_and_convert(strategy: &T::AccountId) -> DispatchResult {
            if !T::Distributor::claimable(strategy).is_zero() {
                let shares = T::Distributor::claim(strategy)?;
                Self::deposit_event(Event::RewardsClaimed { shares });
            }

            let shares = T::Assets::balance(T::RewardAssetId::get(), strategy);
            if !shares.is_zero() {
                T::RewardVault::redeem(strategy, shares)?;
            }

            let underlying = T::Assets::balance(T::RewardUnderlyingAssetId::get(), strategy);
            Self::convert_in_tranches(strategy, underlying)?;
            Ok(())
        }

        /// Feed `amount` to the swapper in tranches no larger than its `max`,
        /// stopping once the remainder drops below its `min`.
        /// Returns the want received.
        pub(crate) fn convert_in_tranches(
            strategy: &T::AccountId,
            amount: T::Balance,
        ) -> Result<T::Balance, DispatchError> {
            let band = T::Swapper::thresholds();
            let max_tranches = T::MaxTranchesPerHarvest::get();

            let mut remaining = amount;
            let mut received = T::Balance::zero();
            let mut tranches = 0u32;
            while !remaining.is_zero() && remaining >= band.min && tranches < max_tranches {
                let tranche = remaining.min(band.max);
                if tranche.is_zero() {
                    break;
                }
                received = received.saturating_add(T::Swapper::convert(strategy, tranche)?);
                remaining = remaining.saturating_sub(tranche);
                tranches += 1;
            }

            if !remaining.is_zero() {
                log::warn!(
                    target: "boosted-strategy",
                    "⚠️ {} reward underlying left for the next harvest",
                    remaining.into()
                );
            }
            if tranches > 0 {
                Self::deposit_event(Event::RewardsConverted {
                    amount_in: amount.saturating_sub(remaining),
                    amount_out: received,
                    tranches,
                });
            }
            Ok(received)
        }

        /// Gain or loss against the vault debt and the debt repayment,
        /// unstaking what is needed to cover both.
        fn prepare_return(
            strategy: &T::AccountId,
            debt_outstanding: T::Balance,
        ) -> Result<(T::Balance, T::Balance, T::Balance), DispatchError> {
            let debt = T::Vault::strategy_debt(strategy);
            let total = Self::estimated_total_assets();
            let (mut profit, loss) = if total > debt {
                (total.saturating_sub(debt), Zero::zero())
            } else {
                (Zero::zero(), debt.saturating_sub(total))
            };

            let to_free = profit.saturating_add(debt_outstanding);
            let liquid = Self::want_balance();
            if to_free > liquid {
                Self::unstake_up_to(to_free.saturating_sub(liquid))?;
            }

            let liquid = Self::want_balance();
            let debt_payment = if liquid < profit {
                profit = liquid;
                Zero::zero()
            } else {
                liquid.saturating_sub(profit).min(debt_outstanding)
            };
            Ok((profit, loss, debt_payment))
        }

        /// Free up to `amount` want for the vault. Returns `(freed, loss)`.
        pub fn do_withdraw(amount: T::Balance) -> Result<(T::Balance, T::Balance), DispatchError> {
            with_storage_layer(|| {
                let liquid = Self::want_balance();
                if liquid < amount {
                    Self::unstake_up_to(amount.saturating_sub(liquid))?;
                }

                let freed = Self::want_balance().min(amount);
                let loss = amount.saturating_sub(freed);
                if !freed.is_zero() {
                    T::Assets::transfer(
                        T::WantAssetId::get(),
                        &Self::account_id(),
                        &T::Vault::account(),
                        freed,
                        Preservation::Expendable,
                    )?;
                }
                Self::refresh_position();

                Self::deposit_event(Event::WithdrawnToVault { requested: amount, freed, loss });
                Ok((freed, loss))
            })
        }

        pub fn do_migrate(new_strategy: &T::AccountId) -> DispatchResult {
            ensure!(Phase::<T>::get() == HarvestPhase::Idle, Error::<T>::HarvestInProgress);

            with_storage_layer(|| -> DispatchResult {
                let strategy = Self::account_id();
                Self::unstake_all()?;

                let want = Self::want_balance();
                for asset in [
                    T::WantAssetId::get(),
                    T::RewardAssetId::get(),
                    T::RewardUnderlyingAssetId::get(),
                ] {
                    let amount = T::Assets::balance(asset, &strategy);
                    if !amount.is_zero() {
                        T::Assets::transfer(asset, &strategy, new_strategy, amount, Preservation::Expendable)?;
                    }
                }

                T::Vault::migrate_strategy(&strategy, new_strategy)?;
                Self::refresh_position();

                log::info!(target: "boosted-strategy", "📦 Migrated {} want to new strategy", want.into());
                Self::deposit_event(Event::Migrated { new_strategy: new_strategy.clone(), want });
                Ok(())
            })
        }
    }
}

// =============================================================================
//                        StrategyApi Implementation
// =============================================================================

impl<T: Config> StrategyApi<T::AccountId, T::Balance> for Pallet<T> {
    fn strategy_account() -> T::AccountId {
        Pallet::<T>::account_id()
    }

    fn estimated_total_assets() -> T::Balance {
        Pallet::<T>::estimated_total_assets()
    }

    fn withdraw(amount: T::Balance) -> Result<(T::Balance, T::Balance), DispatchError> {
        Pallet::<T>::do_withdraw(amount)
    }
}
