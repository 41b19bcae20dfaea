//! # Reward Swapper Pallet
//!
//! Converts the strategy's reward underlying (`TokenIn`) into the want asset
//! (`TokenOut`) along one of three paths.
//!
//! ## Overview
//!
//! Every conversion picks exactly one path before any funds move:
//!
//! 1. **Mint**: the want minter accepts deposits and the AMM route pays no
//!    better than 1:1. Output equals input.
//! 2. **OTC**: the desk (this pallet's account) holds enough want inventory
//!    and the caller is on the allow-list. Filled at the oracle price.
//! 3. **Pool**: one or two AMM hops, guarded by an oracle-derived minimum
//!    output.
//!
//! ## Key Invariants
//!
//! 1. **Allow-list**: only allowed counterparties may convert
//! 2. **Bounded size**: every amount lies in the configured `[min, max]` band
//! 3. **Fresh prices**: OTC fills and pool minimums only use a fresh oracle sample
//! 4. **All or nothing**: a failed conversion leaves no transfer behind

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

/// Pure path selection
pub mod path;
pub use path::{select_path, RouteContext};

/// Price oracle adapter (staleness checks and oracle math)
pub mod oracle;
pub use oracle::OracleAdapter;



use frame_support::traits::fungibles::{Inspect, Mutate};
use frame_support::traits::tokens::Preservation;
use frame_support::traits::Get;
use sp_runtime::traits::Zero;
use sp_runtime::DispatchError;

pub use strategy_primitives::{OtcQuote, PriceSample, SwapPath, SwapThresholds};

// =============================================================================
//                              Traits
// =============================================================================

/// Source of the want-per-underlying price.
pub trait PriceFeed {
    /// Latest observation, `None` if the feed has never reported.
    fn latest() -> Option<PriceSample>;
}

/// Constant-function AMM venue used for the pool path.
pub trait AmmPool<AccountId, AssetId, Balance> {
    /// Expected output of swapping `amount_in`, `None` if no pool exists.
    fn quote(asset_in: AssetId, asset_out: AssetId, amount_in: Balance) -> Option<Balance>;

    /// Swap `amount_in` held by `who`; the output lands in `who`'s account.
    /// Fails if the output would fall below `min_out`.
    fn swap(
        who: &AccountId,
        asset_in: AssetId,
        asset_out: AssetId,
        amount_in: Balance,
        min_out: Balance,
    ) -> Result<Balance, DispatchError>;
}

/// Issuer that mints the want asset 1:1 against the reward underlying.
pub trait WantMinter<AccountId, Balance> {
    /// Whether deposits are currently accepted.
    fn is_mint_open() -> bool;

    /// Take `amount` underlying from `who` and mint want back to `who`.
    fn mint(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError>;
}

/// Conversion API consumed by the strategy pallet.
pub trait RewardConverter<AccountId, Balance> {
    /// Current `[min, max]` band for a single conversion.
    fn thresholds() -> SwapThresholds<Balance>;

    /// Convert `amount` underlying held by `who` into want, returning the want received.
    fn convert(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError>;
}

#[frame_support::pallet]
pub mod pallet {
    use super::*;
    use alloc::vec::Vec;
    use frame_support::pallet_prelude::*;
    use frame_support::storage::with_storage_layer;
    use frame_support::PalletId;
    use frame_system::pallet_prelude::*;
    use sp_runtime::traits::{AccountIdConversion, Saturating};
    use sp_runtime::Permill;

    /// Pallet ID for the OTC desk account
    pub const PALLET_ID: PalletId = PalletId(*b"ybswapr0");

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

        /// Fungibles implementation moving the reward underlying and want
        type Assets: Mutate<Self::AccountId, AssetId = Self::AssetId, Balance = Self::Balance>
            + Inspect<Self::AccountId>;

        /// Reward underlying sold by the strategy
        #[pallet::constant]
        type TokenIn: Get<Self::AssetId>;

        /// Want asset bought by the strategy
        #[pallet::constant]
        type TokenOut: Get<Self::AssetId>;

        /// Hop asset between the two pools, `None` for a direct pool
        #[pallet::constant]
        type IntermediateAsset: Get<Option<Self::AssetId>>;

        /// AMM venue for the pool path
        type Pools: AmmPool<Self::AccountId, Self::AssetId, Self::Balance>;

        /// Want minter for the mint path
        type Minter: WantMinter<Self::AccountId, Self::Balance>;

        /// Want-per-underlying price feed
        type PriceFeed: PriceFeed;

        /// Origin allowed to appoint management and change any setting
        type GovernanceOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Oracle staleness window (seconds) until changed by management
        #[pallet::constant]
        type DefaultMaxOracleAge: Get<u64>;

        /// Pool path slippage tolerance until changed by management
        #[pallet::constant]
        type DefaultSlippageTolerance: Get<Permill>;

        /// Lower conversion threshold until changed by management
        #[pallet::constant]
        type DefaultMinSwap: Get<Self::Balance>;

        /// Upper conversion threshold until changed by management
        #[pallet::constant]
        type DefaultMaxSwap: Get<Self::Balance>;
    }

    // =========================================================================
    //                                  Storage
    // =========================================================================

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    #[pallet::type_value]
    pub fn DefaultThresholds<T: Config>() -> SwapThresholds<T::Balance> {
        SwapThresholds::new(T::DefaultMinSwap::get(), T::DefaultMaxSwap::get())
    }

    #[pallet::type_value]
    pub fn DefaultOracleAge<T: Config>() -> u64 {
        T::DefaultMaxOracleAge::get()
    }

    #[pallet::type_value]
    pub fn DefaultSlippage<T: Config>() -> Permill {
        T::DefaultSlippageTolerance::get()
    }

    #[pallet::type_value]
    pub fn DefaultMintEnabled() -> bool {
        true
    }

    /// Account allowed to change swapper settings besides governance
    #[pallet::storage]
    #[pallet::getter(fn management)]
    pub type Management<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    /// Whether the OTC path may be selected
    #[pallet::storage]
    #[pallet::getter(fn otc_enabled)]
    pub type OtcEnabled<T: Config> = StorageValue<_, bool, ValueQuery>;

    /// Whether the mint path may be selected
    #[pallet::storage]
    #[pallet::getter(fn mint_enabled)]
    pub type MintEnabled<T: Config> = StorageValue<_, bool, ValueQuery, DefaultMintEnabled>;

    /// Counterparties allowed to convert through the router
    #[pallet::storage]
    #[pallet::getter(fn is_allowed)]
    pub type AllowList<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, bool, ValueQuery>;

    /// Size band for one conversion call
    #[pallet::storage]
    #[pallet::getter(fn swap_thresholds)]
    pub type Thresholds<T: Config> =
        StorageValue<_, SwapThresholds<T::Balance>, ValueQuery, DefaultThresholds<T>>;

    /// Oldest acceptable oracle sample, in seconds
    #[pallet::storage]
    #[pallet::getter(fn max_oracle_age)]
    pub type MaxOracleAge<T: Config> = StorageValue<_, u64, ValueQuery, DefaultOracleAge<T>>;

    /// Accepted shortfall of the pool path against the oracle price
    #[pallet::storage]
    #[pallet::getter(fn slippage_tolerance)]
    pub type SlippageTolerance<T: Config> = StorageValue<_, Permill, ValueQuery, DefaultSlippage<T>>;

    /// Receiver of the underlying sold over OTC. The desk itself when unset.
    #[pallet::storage]
    #[pallet::getter(fn proceeds_recipient)]
    pub type ProceedsRecipient<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    // =========================================================================
    //                              Genesis Config
    // =========================================================================

    #[pallet::genesis_config]
    #[derive(frame_support::DefaultNoBound)]
    pub struct GenesisConfig<T: Config> {
        /// Initial management account
        pub management: Option<T::AccountId>,
        /// Counterparties allowed from genesis
        pub allowed_counterparties: Vec<T::AccountId>,
        /// Whether the OTC path starts enabled
        pub otc_enabled: bool,
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            if let Some(ref who) = self.management {
                Management::<T>::put(who);
            }
            for who in &self.allowed_counterparties {
                AllowList::<T>::insert(who, true);
            }
            OtcEnabled::<T>::put(self.otc_enabled);
        }
    }

    // =========================================================================
    //                                  Events
    // =========================================================================

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Want minted 1:1. [who, amount]
        Minted { who: T::AccountId, amount: T::Balance },
        /// Converted through the AMM route. [who, amount_in, amount_out, min_out]
        PoolSwapped {
            who: T::AccountId,
            amount_in: T::Balance,
            amount_out: T::Balance,
            min_out: T::Balance,
        },
        /// OTC fill against the desk. [who, quote]
        OtcFilled { who: T::AccountId, quote: OtcQuote<T::AssetId, T::Balance> },
        /// OTC path toggled. [enabled]
        OtcStatusChanged { enabled: bool },
        /// Mint path toggled. [enabled]
        MintStatusChanged { enabled: bool },
        /// Allow-list entry changed. [who, allowed]
        CounterpartyAllowed { who: T::AccountId, allowed: bool },
        /// Conversion band changed. [min, max]
        ThresholdsUpdated { min: T::Balance, max: T::Balance },
        /// Oracle staleness window changed. [max_age]
        MaxOracleAgeUpdated { max_age: u64 },
        /// Pool slippage tolerance changed. [tolerance]
        SlippageToleranceUpdated { tolerance: Permill },
        /// OTC proceeds recipient changed. [recipient]
        ProceedsRecipientUpdated { recipient: Option<T::AccountId> },
        /// Management account changed. [management]
        ManagementUpdated { management: T::AccountId },
        /// Desk inventory withdrawn. [asset, amount, dest]
        OtcInventoryWithdrawn { asset: T::AssetId, amount: T::Balance, dest: T::AccountId },
    }

    // =========================================================================
    //                                  Errors
    // =========================================================================

    #[pallet::error]
    pub enum Error<T> {
        /// Caller is not on the allow-list.
        NotAllowedCounterparty,
        /// Oracle sample is older than the staleness window.
        StaleOracle,
        /// Oracle has no usable price.
        OracleUnavailable,
        /// Route output below the oracle-derived minimum.
        SlippageExceeded,
        /// Amount outside the `[min, max]` band.
        ThresholdViolation,
        /// `min` greater than `max`.
        InvalidThresholds,
        /// Caller is neither governance nor management.
        Unauthorized,
        /// Desk does not hold enough of the requested asset.
        InsufficientOtcInventory,
        /// Arithmetic overflow.
        ArithmeticOverflow,
    }

    // =========================================================================
    //                                Extrinsics
    // =========================================================================

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Convert `amount` of the reward underlying held by the caller into want.
        #[pallet::call_index(0)]
        #[pallet::weight(Weight::from_parts(50_000, 0))]
        pub fn swap(origin: OriginFor<T>, amount: T::Balance) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::do_convert(&who, amount)?;
            Ok(())
        }

        /// Appoint the management account. Governance only.
        #[pallet::call_index(1)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_management(origin: OriginFor<T>, management: T::AccountId) -> DispatchResult {
            T::GovernanceOrigin::ensure_origin(origin).map_err(|_| Error::<T>::Unauthorized)?;

            Management::<T>::put(&management);
            Self::deposit_event(Event::ManagementUpdated { management });
            Ok(())
        }

        /// Enable or disable the OTC path. Past fills are unaffected.
        #[pallet::call_index(2)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn enable_otc(origin: OriginFor<T>, enabled: bool) -> DispatchResult {
            Self::ensure_management(origin)?;

            OtcEnabled::<T>::put(enabled);
            log::info!(target: "reward-swapper", "🤝 OTC path enabled: {}", enabled);
            Self::deposit_event(Event::OtcStatusChanged { enabled });
            Ok(())
        }

        /// Add or remove a counterparty from the allow-list.
        #[pallet::call_index(3)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_allowed_counterparty(
            origin: OriginFor<T>,
            who: T::AccountId,
            allowed: bool,
        ) -> DispatchResult {
            Self::ensure_management(origin)?;

            if allowed {
                AllowList::<T>::insert(&who, true);
            } else {
                AllowList::<T>::remove(&who);
            }
            Self::deposit_event(Event::CounterpartyAllowed { who, allowed });
            Ok(())
        }

        /// Set the `[min, max]` band for a single conversion.
        #[pallet::call_index(4)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_swap_thresholds(
            origin: OriginFor<T>,
            min: T::Balance,
            max: T::Balance,
        ) -> DispatchResult {
            Self::ensure_management(origin)?;

            let thresholds = SwapThresholds::new(min, max);
            ensure!(thresholds.is_valid(), Error::<T>::InvalidThresholds);
            Thresholds::<T>::put(thresholds);

            log::info!(
                target: "reward-swapper",
                "⚙️ Swap thresholds set to [{}, {}]",
                min.into(),
                max.into()
            );
            Self::deposit_event(Event::ThresholdsUpdated { min, max });
            Ok(())
        }

        /// Set the oracle staleness window in seconds.
        #[pallet::call_index(5)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_max_oracle_age(origin: OriginFor<T>, max_age: u64) -> DispatchResult {
            Self::ensure_management(origin)?;

            MaxOracleAge::<T>::put(max_age);
            Self::deposit_event(Event::MaxOracleAgeUpdated { max_age });
            Ok(())
        }

        /// Set the pool path slippage tolerance.
        #[pallet::call_index(6)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_slippage_tolerance(origin: OriginFor<T>, tolerance: Permill) -> DispatchResult {
            Self::ensure_management(origin)?;

            SlippageTolerance::<T>::put(tolerance);
            Self::deposit_event(Event::SlippageToleranceUpdated { tolerance });
            Ok(())
        }

        /// Allow or forbid the mint path regardless of the minter state.
        #[pallet::call_index(7)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_mint_enabled(origin: OriginFor<T>, enabled: bool) -> DispatchResult {
            Self::ensure_management(origin)?;

            MintEnabled::<T>::put(enabled);
            Self::deposit_event(Event::MintStatusChanged { enabled });
            Ok(())
        }

        /// Route OTC proceeds to `recipient`, or back to the desk with `None`.
        #[pallet::call_index(8)]
        #[pallet::weight(Weight::from_parts(10_000, 0))]
        pub fn set_proceeds_recipient(
            origin: OriginFor<T>,
            recipient: Option<T::AccountId>,
        ) -> DispatchResult {
            Self::ensure_management(origin)?;

            match recipient {
                Some(ref who) => ProceedsRecipient::<T>::put(who),
                None => ProceedsRecipient::<T>::kill(),
            }
            Self::deposit_event(Event::ProceedsRecipientUpdated { recipient });
            Ok(())
        }

        /// Move desk inventory (want or accumulated proceeds) to `dest`.
        #[pallet::call_index(9)]
        #[pallet::weight(Weight::from_parts(20_000, 0))]
        pub fn withdraw_otc_inventory(
            origin: OriginFor<T>,
            asset: T::AssetId,
            amount: T::Balance,
            dest: T::AccountId,
        ) -> DispatchResult {
            Self::ensure_management(origin)?;

            let desk = Self::account_id();
            ensure!(
                T::Assets::balance(asset, &desk) >= amount,
                Error::<T>::InsufficientOtcInventory
            );
            if !amount.is_zero() {
                T::Assets::transfer(asset, &desk, &dest, amount, Preservation::Expendable)?;
            }

            Self::deposit_event(Event::OtcInventoryWithdrawn { asset, amount, dest });
            Ok(())
        }
    }

    // =========================================================================
    //                           Internal Functions
    // =========================================================================

    impl<T: Config> Pallet<T> {
        /// OTC desk account holding want inventory
        pub fn account_id() -> T::AccountId {
            PALLET_ID.into_account_truncating()
        }

        /// Current on-chain time in seconds
        pub fn current_timestamp() -> u64 {
            let now_ms: u64 = pallet_timestamp::Pallet::<T>::now().try_into().unwrap_or(0);
            now_ms / 1000
        }

        /// Governance, or a signed call from the management account.
        fn ensure_management(origin: OriginFor<T>) -> DispatchResult {
            if T::GovernanceOrigin::try_origin(origin.clone()).is_ok() {
                return Ok(());
            }
            let who = ensure_signed(origin).map_err(|_| Error::<T>::Unauthorized)?;
            ensure!(Management::<T>::get().as_ref() == Some(&who), Error::<T>::Unauthorized);
            Ok(())
        }

        /// Expected output of the full AMM route for `amount`.
        pub fn quote_route(amount: T::Balance) -> Option<T::Balance> {
            let (token_in, token_out) = (T::TokenIn::get(), T::TokenOut::get());
            match T::IntermediateAsset::get() {
                Some(mid) => {
                    let hop = T::Pools::quote(token_in, mid, amount)?;
                    T::Pools::quote(mid, token_out, hop)
                }
                None => T::Pools::quote(token_in, token_out, amount),
            }
        }

        /// Snapshot every input the path selection depends on.
        pub fn route_context(who: &T::AccountId, amount: T::Balance) -> RouteContext<T::Balance> {
            let otc_buy_amount = T::PriceFeed::latest()
                .and_then(|sample| OracleAdapter::<T>::expected_out(amount, sample.price).ok());

            RouteContext {
                amount,
                mint_enabled: MintEnabled::<T>::get(),
                mint_open: T::Minter::is_mint_open(),
                pool_quote: Self::quote_route(amount),
                otc_enabled: OtcEnabled::<T>::get(),
                caller_allowed: AllowList::<T>::get(who),
                otc_buy_amount,
                otc_inventory: T::Assets::balance(T::TokenOut::get(), &Self::account_id()),
            }
        }

        /// Route `amount` of `TokenIn` held by `who` into `TokenOut`.
        ///
        /// Runs in its own storage layer so that a failure on any path
        /// leaves balances and storage untouched.
        pub fn do_convert(who: &T::AccountId, amount: T::Balance) -> Result<T::Balance, DispatchError> {
            ensure!(AllowList::<T>::get(who), Error::<T>::NotAllowedCounterparty);
            ensure!(
                Thresholds::<T>::get().contains(amount),
                Error::<T>::ThresholdViolation
            );
            if amount.is_zero() {
                return Ok(Zero::zero());
            }

            let path = select_path(&Self::route_context(who, amount));
            log::debug!(
                target: "reward-swapper",
                "🔀 Routing {} via {:?}",
                amount.into(),
                path
            );

            let now = Self::current_timestamp();
            with_storage_layer(|| match path {
                SwapPath::Mint => Self::execute_mint(who, amount),
                SwapPath::Otc => Self::execute_otc(who, amount, now),
                SwapPath::Pool => Self::execute_pool(who, amount, now),
            })
        }

        fn execute_mint(who: &T::AccountId, amount: T::Balance) -> Result<T::Balance, DispatchError> {
            let minted = T::Minter::mint(who, amount)?;
            ensure!(minted >= amount, Error::<T>::SlippageExceeded);

            log::info!(target: "reward-swapper", "🪙 Minted {} want 1:1", minted.into());
            Self::deposit_event(Event::Minted { who: who.clone(), amount: minted });
            Ok(minted)
        }

        fn execute_otc(
            who: &T::AccountId,
            amount: T::Balance,
            now: u64,
        ) -> Result<T::Balance, DispatchError> {
            let sample = OracleAdapter::<T>::fresh_price(now)?;
            let buy_amount = OracleAdapter::<T>::expected_out(amount, sample.price)?;

            let desk = Self::account_id();
            let (token_in, token_out) = (T::TokenIn::get(), T::TokenOut::get());
            ensure!(
                T::Assets::balance(token_out, &desk) >= buy_amount,
                Error::<T>::InsufficientOtcInventory
            );

            let recipient = ProceedsRecipient::<T>::get().unwrap_or_else(|| desk.clone());
            T::Assets::transfer(token_in, who, &recipient, amount, Preservation::Expendable)?;
            T::Assets::transfer(token_out, &desk, who, buy_amount, Preservation::Expendable)?;

            let quote = OtcQuote {
                sell_token: token_in,
                buy_token: token_out,
                sell_amount: amount,
                buy_amount,
                price_used: sample.price,
                timestamp: now,
            };

            log::info!(
                target: "reward-swapper",
                "🤝 OTC fill: {} in -> {} out at {:?}",
                amount.into(),
                buy_amount.into(),
                sample.price
            );
            Self::deposit_event(Event::OtcFilled { who: who.clone(), quote });
            Ok(buy_amount)
        }

        fn execute_pool(
            who: &T::AccountId,
            amount: T::Balance,
            now: u64,
        ) -> Result<T::Balance, DispatchError> {
            let sample = OracleAdapter::<T>::fresh_price(now)?;
            let expected = OracleAdapter::<T>::expected_out(amount, sample.price)?;
            let min_out = OracleAdapter::<T>::min_out(expected, SlippageTolerance::<T>::get());

            let quoted = Self::quote_route(amount).unwrap_or_else(Zero::zero);
            if quoted < min_out {
                log::warn!(
                    target: "reward-swapper",
                    "⚠️ Pool quote {} below minimum {}",
                    quoted.into(),
                    min_out.into()
                );
                return Err(Error::<T>::SlippageExceeded.into());
            }

            let (token_in, token_out) = (T::TokenIn::get(), T::TokenOut::get());
            let received = match T::IntermediateAsset::get() {
                Some(mid) => {
                    let hop = T::Pools::swap(who, token_in, mid, amount, Zero::zero())?;
                    T::Pools::swap(who, mid, token_out, hop, min_out)?
                }
                None => T::Pools::swap(who, token_in, token_out, amount, min_out)?,
            };
            ensure!(received >= min_out, Error::<T>::SlippageExceeded);

            log::info!(
                target: "reward-swapper",
                "🔁 Pool swap: {} in -> {} out (min {})",
                amount.into(),
                received.into(),
                min_out.into()
            );
            Self::deposit_event(Event::PoolSwapped {
                who: who.clone(),
                amount_in: amount,
                amount_out: received,
                min_out,
            });
            Ok(received)
        }
    }
}

// =============================================================================
//                      RewardConverter Implementation
// =============================================================================

impl<T: Config> RewardConverter<T::AccountId, T::Balance> for Pallet<T> {
    fn thresholds() -> SwapThresholds<T::Balance> {
        Thresholds::<T>::get()
    }

    fn convert(who: &T::AccountId, amount: T::Balance) -> Result<T::Balance, DispatchError> {
        Pallet::<T>::do_convert(who, amount)
    }
}
