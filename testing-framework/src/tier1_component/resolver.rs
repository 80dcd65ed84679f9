// Resolver for the simulated single-staking strategy.
//
// Want flows vault -> strategy -> staking pool. The staking pool pays a
// reward token that the strategy sells through the router on harvest.

use sett_common::{address::Address, amount::DEFAULT_DECIMALS};

use crate::deployment::Deployment;
use crate::error::{CheckResult, ConfigError};
use crate::invariants::{
    balance, check_increased_by, check_not_decreased, check_not_increased, check_unchanged,
    check_zero,
};
use crate::registry::TokenHandle;
use crate::resolver::{strategy_core, HookContext, Resolver};
use crate::snapshot::keys::*;

pub const EXTRA_REWARD: &str = "reward";
pub const EXTRA_STAKING: &str = "staking";
pub const EXTRA_ROUTER: &str = "router";

fn destinations(deployment: &Deployment) -> Vec<(String, Address)> {
    [EXTRA_STAKING, EXTRA_ROUTER]
        .into_iter()
        .filter_map(|name| {
            deployment
                .extras
                .get(name)
                .map(|address| (name.to_string(), *address))
        })
        .collect()
}

fn reward_token(deployment: &Deployment) -> Vec<(String, TokenHandle)> {
    deployment
        .extras
        .get(EXTRA_REWARD)
        .map(|address| {
            vec![(
                EXTRA_REWARD.to_string(),
                TokenHandle::new(*address, DEFAULT_DECIMALS),
            )]
        })
        .unwrap_or_default()
}

fn after_deposit(ctx: &HookContext<'_>) -> CheckResult {
    check_unchanged(
        "staking.deposit",
        ctx.before,
        ctx.after,
        balance(EXTRA_STAKING, TOKEN_WANT),
    )
}

fn after_withdraw(ctx: &HookContext<'_>) -> CheckResult {
    check_not_increased(
        "staking.withdraw",
        ctx.before,
        ctx.after,
        balance(EXTRA_STAKING, TOKEN_WANT),
    )
}

/// Everything the vault forwarded, plus whatever sat idle in the strategy,
/// ends up staked
fn after_earn(ctx: &HookContext<'_>) -> CheckResult {
    let (before, after) = (ctx.before, ctx.after);
    let from_vault = before
        .balance(ENTITY_SETT, TOKEN_WANT)?
        .saturating_sub(after.balance(ENTITY_SETT, TOKEN_WANT)?);
    let from_idle = before
        .balance(ENTITY_STRATEGY, TOKEN_WANT)?
        .saturating_sub(after.balance(ENTITY_STRATEGY, TOKEN_WANT)?);
    check_increased_by(
        "staking.earn",
        before,
        after,
        balance(EXTRA_STAKING, TOKEN_WANT),
        from_vault + from_idle,
    )
}

fn after_tend(ctx: &HookContext<'_>) -> CheckResult {
    strategy_core::confirm_tend(ctx)?;
    check_not_decreased(
        "staking.tend",
        ctx.before,
        ctx.after,
        balance(EXTRA_STAKING, TOKEN_WANT),
    )
}

/// Every reward token claimed is sold
fn after_harvest(ctx: &HookContext<'_>) -> CheckResult {
    strategy_core::confirm_harvest_fees(ctx)?;
    check_zero(
        "staking.harvestSold",
        ctx.before,
        ctx.after,
        balance(ENTITY_STRATEGY, EXTRA_REWARD),
    )
}

/// Resolver for a [`TestLedger`](super::TestLedger) deployment
pub fn staking_resolver(deployment: Deployment) -> Result<Resolver, ConfigError> {
    Resolver::builder("staking", deployment)
        .strategy_destinations(destinations)
        .extra_tokens(reward_token)
        .on_after_deposit(after_deposit)
        .on_after_withdraw(after_withdraw)
        .on_after_earn(after_earn)
        .on_after_tend(after_tend)
        .on_after_harvest(after_harvest)
        .build()
}
