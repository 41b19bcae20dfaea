//! Conversion path selection.
//!
//! Selection is a pure function of a [`RouteContext`] snapshot taken before
//! any funds move, so exactly one path is attempted per conversion.

use sp_runtime::traits::Zero;
use strategy_primitives::SwapPath;

/// Inputs the router reads before choosing a path.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RouteContext<Balance> {
    /// Amount of reward underlying to convert
    pub amount: Balance,
    /// Mint path allowed by policy
    pub mint_enabled: bool,
    /// Minter currently accepting deposits
    pub mint_open: bool,
    /// Output of the full AMM route, `None` without liquidity
    pub pool_quote: Option<Balance>,
    /// OTC path allowed by policy
    pub otc_enabled: bool,
    /// Caller on the allow-list
    pub caller_allowed: bool,
    /// `floor(amount * price)`, `None` without a price
    pub otc_buy_amount: Option<Balance>,
    /// Want held by the OTC desk
    pub otc_inventory: Balance,
}

/// Minting wins unless the pool pays strictly more than 1:1.
pub fn mint_eligible<Balance: Ord + Copy>(ctx: &RouteContext<Balance>) -> bool {
    ctx.mint_enabled
        && ctx.mint_open
        && ctx.pool_quote.map_or(true, |quote| quote <= ctx.amount)
}

pub fn otc_eligible<Balance: Ord + Copy + Zero>(ctx: &RouteContext<Balance>) -> bool {
    if !(ctx.otc_enabled && ctx.caller_allowed) {
        return false;
    }
    match ctx.otc_buy_amount {
        Some(buy) => !buy.is_zero() && buy <= ctx.otc_inventory,
        None => false,
    }
}

/// Mint, then OTC, then the pool as the fallback.
pub fn select_path<Balance: Ord + Copy + Zero>(ctx: &RouteContext<Balance>) -> SwapPath {
    if mint_eligible(ctx) {
        SwapPath::Mint
    } else if otc_eligible(ctx) {
        SwapPath::Otc
    } else {
        SwapPath::Pool
    }
}
