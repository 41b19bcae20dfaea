//! Harvest and tend triggers.
//!
//! The decision itself is a pure function over a [`TriggerSnapshot`]; the
//! pallet only gathers the snapshot from live collaborator reads.

use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_runtime::traits::Zero;

/// Why a harvest is due. Listed in evaluation order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, DecodeWithMemTracking, TypeInfo, MaxEncodedLen)]
pub enum HarvestReason {
    /// Emergency exit is set; funds must be unwound
    EmergencyExit,
    /// The vault offers at least `credit_threshold` of undeployed credit
    IdleCredit,
    /// The reward epoch is about to roll and rewards are waiting
    ClaimWindow,
    /// No harvest for longer than `max_report_delay`
    Stale,
}

/// Every input of the trigger, read just before evaluation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TriggerSnapshot<Balance> {
    pub emergency_exit: bool,
    /// Credit the vault would hand the strategy now
    pub idle_credit: Balance,
    pub credit_threshold: Balance,
    /// Reward claimable from the distributor now
    pub claimable: Balance,
    /// Seconds until the current reward week ends
    pub time_until_week_end: u64,
    pub threshold_time_until_week_end: u64,
    pub last_harvest: u64,
    pub max_report_delay: u64,
}

impl<Balance: Ord + Zero + Copy> TriggerSnapshot<Balance> {
    pub fn emergency(&self) -> bool {
        self.emergency_exit
    }

    pub fn idle_credit_due(&self) -> bool {
        !self.idle_credit.is_zero() && self.idle_credit >= self.credit_threshold
    }

    pub fn claim_window_open(&self) -> bool {
        self.time_until_week_end <= self.threshold_time_until_week_end && !self.claimable.is_zero()
    }

    pub fn stale(&self, now: u64) -> bool {
        now.saturating_sub(self.last_harvest) > self.max_report_delay
    }
}

/// First matching reason, `None` when nothing is due.
pub fn harvest_reason<Balance: Ord + Zero + Copy>(
    snapshot: &TriggerSnapshot<Balance>,
    now: u64,
    include_staleness: bool,
) -> Option<HarvestReason> {
    if snapshot.emergency() {
        Some(HarvestReason::EmergencyExit)
    } else if snapshot.idle_credit_due() {
        Some(HarvestReason::IdleCredit)
    } else if snapshot.claim_window_open() {
        Some(HarvestReason::ClaimWindow)
    } else if include_staleness && snapshot.stale(now) {
        Some(HarvestReason::Stale)
    } else {
        None
    }
}

pub fn should_harvest<Balance: Ord + Zero + Copy>(snapshot: &TriggerSnapshot<Balance>, now: u64) -> bool {
    harvest_reason(snapshot, now, true).is_some()
}

/// Same as [`should_harvest`] without the staleness condition.
pub fn should_tend<Balance: Ord + Zero + Copy>(snapshot: &TriggerSnapshot<Balance>, now: u64) -> bool {
    harvest_reason(snapshot, now, false).is_some()
}
