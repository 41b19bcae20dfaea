//! Test runtime for the boosted strategy.
//!
//! The strategy runs against the real reward swapper and real `pallet_assets`
//! balances. The vault, staker, distributor and reward vault are mocks whose
//! state lives in unhashed storage, so a failed harvest rolls them back too.

use crate as pallet_boosted_strategy;
use crate::{BoostedStaker, RewardDistributor, RewardVault, StrategyApi, StrategyVault};
use frame_support::{
    derive_impl, ord_parameter_types, parameter_types,
    storage::unhashed,
    traits::{
        fungibles::{Create, Inspect, Mutate},
        tokens::Preservation,
        AsEnsureOriginWithArg, ConstU128, ConstU32, ConstU64,
    },
};
use frame_system::{EnsureRoot, EnsureSigned, EnsureSignedBy};
use pallet_reward_swapper::{AmmPool, PriceFeed, PriceSample, WantMinter};
use sp_runtime::{BuildStorage, DispatchError, DispatchResult, FixedPointNumber, FixedU128, Permill};
use strategy_primitives::{mul_floor, unit_ratio, week_of, Week, DAY_SECS, HOUR_SECS, WEEK_SECS};

type Block = frame_system::mocking::MockBlock<Test>;
pub type AccountId = u64;
pub type AssetId = u32;
pub type Balance = u128;

pub const UNIT: Balance = 1_000_000_000_000_000_000;

pub const GOVERNANCE: AccountId = 1;
pub const MANAGEMENT: AccountId = 2;
pub const KEEPER: AccountId = 3;
pub const EVE: AccountId = 4;
pub const NEW_STRATEGY: AccountId = 5;
pub const SWAP_MANAGEMENT: AccountId = 6;
pub const ASSET_ADMIN: AccountId = 10;
pub const POOL: AccountId = 100;
pub const MINTER: AccountId = 101;
pub const VAULT: AccountId = 200;
pub const STAKER: AccountId = 201;
pub const REWARD_VAULT: AccountId = 202;
pub const SLASHED: AccountId = 203;

pub const WANT: AssetId = 1;
pub const REWARD_SHARE: AssetId = 2;
pub const UNDERLYING: AssetId = 3;
pub const INTERMEDIATE: AssetId = 4;
pub const VAULT_SHARE: AssetId = 5;
pub const OTHER: AssetId = 9;

/// One day into a reward week (seconds)
pub const START: u64 = 2_811 * WEEK_SECS + DAY_SECS;
pub const CREDIT_THRESHOLD: Balance = 100 * UNIT;
pub const MAX_REPORT_DELAY: u64 = 23 * HOUR_SECS;
pub const MAX_TRANCHES: u32 = 3;
/// Weeks of plain stake needed for a full boost
pub const BOOST_WEEKS: u64 = 4;

frame_support::construct_runtime!(
    pub enum Test {
        System: frame_system,
        Timestamp: pallet_timestamp,
        Balances: pallet_balances,
        Assets: pallet_assets,
        RewardSwapper: pallet_reward_swapper,
        BoostedStrategy: pallet_boosted_strategy,
    }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
    type Block = Block;
    type AccountData = pallet_balances::AccountData<Balance>;
}

impl pallet_timestamp::Config for Test {
    type Moment = u64;
    type OnTimestampSet = ();
    type MinimumPeriod = ConstU64<1>;
    type WeightInfo = ();
}

impl pallet_balances::Config for Test {
    type MaxLocks = ConstU32<50>;
    type MaxReserves = ConstU32<50>;
    type ReserveIdentifier = [u8; 8];
    type Balance = Balance;
    type RuntimeEvent = RuntimeEvent;
    type DustRemoval = ();
    type ExistentialDeposit = ConstU128<1>;
    type AccountStore = System;
    type WeightInfo = ();
    type FreezeIdentifier = ();
    type MaxFreezes = ConstU32<0>;
    type RuntimeHoldReason = ();
    type RuntimeFreezeReason = ();
    type DoneSlashHandler = ();
}

impl pallet_assets::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Balance = Balance;
    type AssetId = AssetId;
    type AssetIdParameter = codec::Compact<AssetId>;
    type Currency = Balances;
    type CreateOrigin = AsEnsureOriginWithArg<EnsureSigned<AccountId>>;
    type ForceOrigin = EnsureRoot<AccountId>;
    type AssetDeposit = ConstU128<1>;
    type AssetAccountDeposit = ConstU128<1>;
    type MetadataDepositBase = ConstU128<1>;
    type MetadataDepositPerByte = ConstU128<1>;
    type ApprovalDeposit = ConstU128<1>;
    type StringLimit = ConstU32<50>;
    type Freezer = ();
    type Extra = ();
    type WeightInfo = ();
    type Holder = ();
    type CallbackHandle = ();
    type RemoveItemsLimit = ConstU32<1000>;
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper = ();
}

parameter_types! {
    pub const TokenIn: AssetId = UNDERLYING;
    pub const TokenOut: AssetId = WANT;
    pub const NoIntermediate: Option<AssetId> = None;
    pub const DefaultMaxOracleAge: u64 = HOUR_SECS;
    pub const DefaultSlippageTolerance: Permill = Permill::from_percent(1);
    pub const DefaultMinSwap: Balance = 10 * UNIT;
    pub const DefaultMaxSwap: Balance = 10_000 * UNIT;

    /// Underlying -> want rate of the AMM
    pub static PoolRate: FixedU128 = unit_ratio();
    pub static PoolHalted: bool = false;
    pub static MintOpen: bool = false;
    pub static OracleSample: Option<PriceSample> = None;
}

impl pallet_reward_swapper::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Balance = Balance;
    type AssetId = AssetId;
    type Assets = Assets;
    type TokenIn = TokenIn;
    type TokenOut = TokenOut;
    type IntermediateAsset = NoIntermediate;
    type Pools = MockPool;
    type Minter = MockMinter;
    type PriceFeed = MockOracle;
    type GovernanceOrigin = EnsureRoot<AccountId>;
    type DefaultMaxOracleAge = DefaultMaxOracleAge;
    type DefaultSlippageTolerance = DefaultSlippageTolerance;
    type DefaultMinSwap = DefaultMinSwap;
    type DefaultMaxSwap = DefaultMaxSwap;
}

ord_parameter_types! {
    pub const Governance: AccountId = GOVERNANCE;
}

parameter_types! {
    pub const WantAssetId: AssetId = WANT;
    pub const RewardAssetId: AssetId = REWARD_SHARE;
    pub const RewardUnderlyingAssetId: AssetId = UNDERLYING;
    pub const VaultShareAssetId: AssetId = VAULT_SHARE;
    pub const DefaultCreditThreshold: Balance = CREDIT_THRESHOLD;
    pub const DefaultThresholdTimeUntilWeekEnd: u64 = DAY_SECS;
    pub const DefaultMaxReportDelay: u64 = MAX_REPORT_DELAY;
    pub const MaxTranchesPerHarvest: u32 = MAX_TRANCHES;

    /// Share of vault assets lent to the strategy
    pub static DebtRatio: Permill = Permill::from_percent(100);
    pub static VaultShutdown: bool = false;
    pub static ApprovedStakers: Vec<AccountId> = Vec::new();
    /// Underlying paid per reward share
    pub static SharePrice: FixedU128 = unit_ratio();
}

impl pallet_boosted_strategy::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Balance = Balance;
    type AssetId = AssetId;
    type Assets = Assets;
    type WantAssetId = WantAssetId;
    type RewardAssetId = RewardAssetId;
    type RewardUnderlyingAssetId = RewardUnderlyingAssetId;
    type VaultShareAssetId = VaultShareAssetId;
    type Vault = MockVault;
    type Staker = MockStaker;
    type Distributor = MockDistributor;
    type RewardVault = MockRewardVault;
    type Swapper = RewardSwapper;
    type GovernanceOrigin = EnsureSignedBy<Governance, AccountId>;
    type DefaultCreditThreshold = DefaultCreditThreshold;
    type DefaultThresholdTimeUntilWeekEnd = DefaultThresholdTimeUntilWeekEnd;
    type DefaultMaxReportDelay = DefaultMaxReportDelay;
    type MaxTranchesPerHarvest = MaxTranchesPerHarvest;
    type WeightInfo = ();
}

fn transfer(asset: AssetId, from: AccountId, to: AccountId, amount: Balance) -> DispatchResult {
    if amount > 0 {
        <Assets as Mutate<AccountId>>::transfer(asset, &from, &to, amount, Preservation::Expendable)?;
    }
    Ok(())
}

// =============================================================================
//                              Mock Vault
// =============================================================================

const VAULT_DEBT: &[u8] = b":mock:vault:debt";
const VAULT_REVOKED: &[u8] = b":mock:vault:revoked";
const VAULT_STRATEGY: &[u8] = b":mock:vault:strategy";

/// Single-strategy lending vault. Idle want sits on [`VAULT`].
pub struct MockVault;

impl MockVault {
    pub fn debt() -> Balance {
        unhashed::get_or_default(VAULT_DEBT)
    }

    fn set_debt(debt: Balance) {
        unhashed::put(VAULT_DEBT, &debt);
    }

    pub fn revoked() -> bool {
        unhashed::get_or_default(VAULT_REVOKED)
    }

    /// Strategy the vault currently lends to
    pub fn strategy() -> AccountId {
        unhashed::get(VAULT_STRATEGY).unwrap_or_else(BoostedStrategy::account_id)
    }

    pub fn idle() -> Balance {
        balance(WANT, VAULT)
    }

    fn limit() -> Balance {
        DebtRatio::get() * Self::total_assets()
    }

    fn lending_stopped() -> bool {
        VaultShutdown::get() || Self::revoked()
    }

    /// Pull `amount` back from the strategy, as a depositor withdrawal would.
    pub fn withdraw_from_strategy(amount: Balance) -> Result<(Balance, Balance), DispatchError> {
        let (freed, loss) = <BoostedStrategy as StrategyApi<AccountId, Balance>>::withdraw(amount)?;
        Self::set_debt(Self::debt().saturating_sub(freed + loss));
        Ok((freed, loss))
    }
}

impl StrategyVault<AccountId, Balance> for MockVault {
    fn account() -> AccountId {
        VAULT
    }

    fn total_assets() -> Balance {
        Self::idle() + Self::debt()
    }

    fn credit_available(strategy: &AccountId) -> Balance {
        if *strategy != Self::strategy() || Self::lending_stopped() {
            return 0;
        }
        Self::limit().saturating_sub(Self::debt()).min(Self::idle())
    }

    fn debt_outstanding(strategy: &AccountId) -> Balance {
        if *strategy != Self::strategy() {
            return 0;
        }
        if Self::lending_stopped() {
            return Self::debt();
        }
        Self::debt().saturating_sub(Self::limit())
    }

    fn strategy_debt(strategy: &AccountId) -> Balance {
        if *strategy == Self::strategy() { Self::debt() } else { 0 }
    }

    fn report(
        strategy: &AccountId,
        gain: Balance,
        loss: Balance,
        debt_payment: Balance,
    ) -> Result<Balance, DispatchError> {
        if *strategy != Self::strategy() {
            return Err(DispatchError::Other("vault: unknown strategy"));
        }
        if balance(WANT, *strategy) < gain + debt_payment {
            return Err(DispatchError::Other("vault: report exceeds strategy balance"));
        }

        let debt = Self::debt().saturating_sub(loss);
        let total = Self::idle() + debt + gain;
        let limit = DebtRatio::get() * total;

        let outstanding = if Self::lending_stopped() { debt } else { debt.saturating_sub(limit) };
        let payment = debt_payment.min(outstanding);
        let debt_after = debt - payment;

        let credit = if Self::lending_stopped() {
            0
        } else {
            limit.saturating_sub(debt_after).min(Self::idle() + gain + payment)
        };

        let available = gain + payment;
        if credit > available {
            transfer(WANT, VAULT, *strategy, credit - available)?;
        } else {
            transfer(WANT, *strategy, VAULT, available - credit)?;
        }

        let debt = debt_after + credit;
        Self::set_debt(debt);

        Ok(if Self::lending_stopped() { debt } else { debt.saturating_sub(limit) })
    }

    fn revoke_strategy(strategy: &AccountId) -> DispatchResult {
        if *strategy != Self::strategy() {
            return Err(DispatchError::Other("vault: unknown strategy"));
        }
        unhashed::put(VAULT_REVOKED, &true);
        Ok(())
    }

    fn migrate_strategy(old: &AccountId, new: &AccountId) -> DispatchResult {
        if *old != Self::strategy() {
            return Err(DispatchError::Other("vault: unknown strategy"));
        }
        unhashed::put(VAULT_STRATEGY, new);
        Ok(())
    }
}

// =============================================================================
//                              Mock Staker
// =============================================================================

const STAKES: &[u8] = b":mock:staker:stakes";

/// `(who, amount, week staked, max weighted)`
type StakeEntry = (AccountId, Balance, Week, bool);

/// Boost of a plain stake grows linearly to one over [`BOOST_WEEKS`] weeks.
/// Max-weighted stake counts fully from the start. Funds sit on [`STAKER`].
pub struct MockStaker;

impl MockStaker {
    fn entries() -> Vec<StakeEntry> {
        unhashed::get_or_default(STAKES)
    }

    fn put_entries(entries: &[StakeEntry]) {
        unhashed::put(STAKES, &entries.to_vec());
    }

    fn add(who: &AccountId, amount: Balance, max_weighted: bool) -> Result<Balance, DispatchError> {
        transfer(WANT, *who, STAKER, amount)?;
        let mut entries = Self::entries();
        entries.push((*who, amount, current_week(), max_weighted));
        Self::put_entries(&entries);
        Ok(amount)
    }

    fn boost_at(who: &AccountId, week: Week) -> FixedU128 {
        let mut total = 0u128;
        let mut weighted = 0u128;
        for (owner, amount, staked_at, max_weighted) in Self::entries() {
            if owner != *who {
                continue;
            }
            let weeks = if max_weighted { BOOST_WEEKS } else { week.saturating_sub(staked_at).min(BOOST_WEEKS) };
            total += amount;
            weighted += amount * weeks as u128 / BOOST_WEEKS as u128;
        }
        if total == 0 {
            return FixedU128::from_inner(0);
        }
        FixedU128::saturating_from_rational(weighted, total)
    }

    /// Burn `amount` of `who`'s stake, newest entries first.
    pub fn slash(who: &AccountId, amount: Balance) {
        Self::remove(who, amount);
        transfer(WANT, STAKER, SLASHED, amount).unwrap();
    }

    fn remove(who: &AccountId, mut amount: Balance) {
        let mut entries = Self::entries();
        for entry in entries.iter_mut().rev() {
            if entry.0 != *who || amount == 0 {
                continue;
            }
            let take = entry.1.min(amount);
            entry.1 -= take;
            amount -= take;
        }
        entries.retain(|e| e.1 > 0);
        Self::put_entries(&entries);
    }
}

impl BoostedStaker<AccountId, Balance> for MockStaker {
    fn stake(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError> {
        Self::add(who, amount, false)
    }

    fn stake_as_max_weighted(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError> {
        if !Self::is_approved_weighted_staker(who) {
            return Err(DispatchError::Other("staker: not approved"));
        }
        Self::add(who, amount, true)
    }

    fn unstake(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError> {
        if Self::balance_of(who) < amount {
            return Err(DispatchError::Other("staker: insufficient stake"));
        }
        Self::remove(who, amount);
        transfer(WANT, STAKER, *who, amount)?;
        Ok(amount)
    }

    fn balance_of(who: &AccountId) -> Balance {
        Self::entries().iter().filter(|e| e.0 == *who).map(|e| e.1).sum()
    }

    fn active_boost_of(who: &AccountId) -> FixedU128 {
        Self::boost_at(who, current_week())
    }

    fn projected_boost_of(who: &AccountId) -> FixedU128 {
        Self::boost_at(who, current_week() + 1)
    }

    fn is_approved_weighted_staker(who: &AccountId) -> bool {
        ApprovedStakers::get().contains(who)
    }
}

// =============================================================================
//                          Mock Reward Distribution
// =============================================================================

const WEEKLY_REWARDS: &[u8] = b":mock:distributor:weekly";
const CLAIMED_THROUGH: &[u8] = b":mock:distributor:claimed";

/// Pays each finished week's rewards, in reward shares, to whoever has stake.
pub struct MockDistributor;

impl MockDistributor {
    fn weekly() -> Vec<(Week, Balance)> {
        unhashed::get_or_default(WEEKLY_REWARDS)
    }

    /// Fund `amount` of reward shares for `week`.
    pub fn deposit(week: Week, amount: Balance) {
        let mut weekly = Self::weekly();
        weekly.push((week, amount));
        unhashed::put(WEEKLY_REWARDS, &weekly);
    }

    /// First week not yet claimed
    fn claimed_through() -> Week {
        unhashed::get(CLAIMED_THROUGH).unwrap_or(week_of(START))
    }
}

impl RewardDistributor<AccountId, Balance> for MockDistributor {
    fn claim(who: &AccountId) -> Result<Balance, DispatchError> {
        let amount = Self::claimable(who);
        unhashed::put(CLAIMED_THROUGH, &current_week());
        if amount > 0 {
            <Assets as Mutate<AccountId>>::mint_into(REWARD_SHARE, who, amount)?;
        }
        Ok(amount)
    }

    fn claimable(who: &AccountId) -> Balance {
        if MockStaker::balance_of(who) == 0 {
            return 0;
        }
        let (from, to) = (Self::claimed_through(), current_week());
        Self::weekly()
            .into_iter()
            .filter(|(week, _)| *week >= from && *week < to)
            .map(|(_, amount)| amount)
            .sum()
    }

    fn current_week() -> Week {
        current_week()
    }

    fn weekly_amount(week: Week) -> Balance {
        Self::weekly().into_iter().filter(|(w, _)| *w == week).map(|(_, a)| a).sum()
    }
}

/// Redeems reward shares for underlying at [`SharePrice`].
pub struct MockRewardVault;

impl RewardVault<AccountId, Balance> for MockRewardVault {
    fn redeem(who: &AccountId, shares: Balance) -> Result<Balance, DispatchError> {
        let out = mul_floor(shares, SharePrice::get()).ok_or(DispatchError::Other("overflow"))?;
        transfer(REWARD_SHARE, *who, REWARD_VAULT, shares)?;
        if out > 0 {
            <Assets as Mutate<AccountId>>::mint_into(UNDERLYING, who, out)?;
        }
        Ok(out)
    }
}

// =============================================================================
//                          Mock Conversion Venues
// =============================================================================

/// Infinite-depth underlying -> want pool at [`PoolRate`].
pub struct MockPool;

impl AmmPool<AccountId, AssetId, Balance> for MockPool {
    fn quote(asset_in: AssetId, asset_out: AssetId, amount_in: Balance) -> Option<Balance> {
        if (asset_in, asset_out) != (UNDERLYING, WANT) {
            return None;
        }
        mul_floor(amount_in, PoolRate::get())
    }

    fn swap(
        who: &AccountId,
        asset_in: AssetId,
        asset_out: AssetId,
        amount_in: Balance,
        min_out: Balance,
    ) -> Result<Balance, DispatchError> {
        if PoolHalted::get() {
            return Err(DispatchError::Other("pool halted"));
        }
        let out = Self::quote(asset_in, asset_out, amount_in).ok_or(DispatchError::Other("no pool"))?;
        if out < min_out {
            return Err(DispatchError::Other("pool: output below minimum"));
        }
        transfer(asset_in, *who, POOL, amount_in)?;
        if out > 0 {
            <Assets as Mutate<AccountId>>::mint_into(asset_out, who, out)?;
        }
        Ok(out)
    }
}

pub struct MockMinter;

impl WantMinter<AccountId, Balance> for MockMinter {
    fn is_mint_open() -> bool {
        MintOpen::get()
    }

    fn mint(who: &AccountId, amount: Balance) -> Result<Balance, DispatchError> {
        transfer(UNDERLYING, *who, MINTER, amount)?;
        <Assets as Mutate<AccountId>>::mint_into(WANT, who, amount)?;
        Ok(amount)
    }
}

pub struct MockOracle;

impl PriceFeed for MockOracle {
    fn latest() -> Option<PriceSample> {
        OracleSample::get()
    }
}

// =============================================================================
//                              Helpers
// =============================================================================

pub fn now() -> u64 {
    BoostedStrategy::current_timestamp()
}

pub fn current_week() -> Week {
    week_of(now())
}

/// Move the clock and keep the oracle fresh.
pub fn set_now(secs: u64) {
    Timestamp::set_timestamp(secs * 1000);
    if let Some(sample) = OracleSample::get() {
        OracleSample::set(Some(PriceSample { updated_at: secs, ..sample }));
    }
}

pub fn advance(secs: u64) {
    set_now(now() + secs);
}

pub fn strategy() -> AccountId {
    BoostedStrategy::account_id()
}

pub fn fund(asset: AssetId, who: AccountId, amount: Balance) {
    <Assets as Mutate<AccountId>>::mint_into(asset, &who, amount).unwrap();
}

pub fn balance(asset: AssetId, who: AccountId) -> Balance {
    <Assets as Inspect<AccountId>>::balance(asset, &who)
}

/// Depositors add `amount` of idle want to the vault.
pub fn vault_deposit(amount: Balance) {
    fund(WANT, VAULT, amount);
}

pub fn events() -> Vec<RuntimeEvent> {
    System::events().into_iter().map(|r| r.event).collect()
}

pub fn strategy_events() -> Vec<pallet_boosted_strategy::Event<Test>> {
    events()
        .into_iter()
        .filter_map(|e| match e {
            RuntimeEvent::BoostedStrategy(inner) => Some(inner),
            _ => None,
        })
        .collect()
}

pub fn otc_fills() -> usize {
    events()
        .into_iter()
        .filter(|e| {
            matches!(e, RuntimeEvent::RewardSwapper(pallet_reward_swapper::Event::OtcFilled { .. }))
        })
        .count()
}

pub fn new_test_ext() -> sp_io::TestExternalities {
    let mut t = frame_system::GenesisConfig::<Test>::default().build_storage().unwrap();

    pallet_reward_swapper::GenesisConfig::<Test> {
        management: Some(SWAP_MANAGEMENT),
        allowed_counterparties: vec![BoostedStrategy::account_id()],
        otc_enabled: false,
    }
    .assimilate_storage(&mut t)
    .unwrap();

    pallet_boosted_strategy::GenesisConfig::<Test> {
        management: Some(MANAGEMENT),
        keeper: Some(KEEPER),
    }
    .assimilate_storage(&mut t)
    .unwrap();

    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| {
        System::set_block_number(1);

        PoolRate::set(unit_ratio());
        PoolHalted::set(false);
        MintOpen::set(false);
        DebtRatio::set(Permill::from_percent(100));
        VaultShutdown::set(false);
        ApprovedStakers::set(Vec::new());
        SharePrice::set(unit_ratio());
        OracleSample::set(Some(PriceSample { price: unit_ratio(), updated_at: START }));
        set_now(START);

        for id in [WANT, REWARD_SHARE, UNDERLYING, INTERMEDIATE, VAULT_SHARE, OTHER] {
            <Assets as Create<AccountId>>::create(id, ASSET_ADMIN, true, 1).unwrap();
        }
    });
    ext
}
