//! Accounting laws every Sett strategy must satisfy, independent of where the
//! strategy deploys its funds. [`confirm`] runs before the integration hook
//! of each operation kind.

use log::{debug, warn};
use sett_common::{
    amount::{mul_div, Amount},
    EventLog, Receipt,
};

use crate::error::{CheckResult, InvariantViolation, Observation};
use crate::executor::OperationKind;
use crate::invariants::{
    balance, check_decreased_by, check_increase_at_most, check_increased_by, check_not_decreased,
    check_not_increased, check_strictly_increased, check_zero, scalar,
};
use crate::resolver::HookContext;
use crate::snapshot::keys::*;

/// Position of the authoritative event when a receipt carries several
/// Harvest events. A strategy that harvests a nested pool first relays the
/// pool's own Harvest event; the strategy's event is the second one.
pub const AUTHORITATIVE_HARVEST_INDEX: usize = 1;

/// Select the Harvest event the checks apply to: the only one if there is a
/// single event, the one at [`AUTHORITATIVE_HARVEST_INDEX`] otherwise.
pub fn authoritative_harvest_event<'a>(receipt: &'a Receipt, name: &str) -> Option<&'a EventLog> {
    let events: Vec<&EventLog> = receipt
        .events
        .iter()
        .filter(|event| event.name == name)
        .collect();
    match events.len() {
        0 => None,
        1 => Some(events[0]),
        _ => Some(events[AUTHORITATIVE_HARVEST_INDEX]),
    }
}

pub fn confirm(ctx: &HookContext<'_>) -> CheckResult {
    match ctx.kind {
        OperationKind::Deposit => confirm_deposit(ctx),
        OperationKind::Withdraw => confirm_withdraw(ctx),
        OperationKind::WithdrawAll => confirm_withdraw_all(ctx),
        OperationKind::Earn => confirm_earn(ctx),
        OperationKind::Harvest => confirm_harvest(ctx),
        // pending/staked law lives in the default tend hook
        OperationKind::Tend => Ok(()),
        OperationKind::Migrate => confirm_migrate(ctx),
    }
}

/// Depositor pays exactly `amount` of want into the vault and receives
/// shares pro rata to the vault balance before the deposit.
pub fn confirm_deposit(ctx: &HookContext<'_>) -> CheckResult {
    let actor = ctx.actor()?;
    let amount = ctx.amount()?;
    let (before, after) = (ctx.before, ctx.after);

    check_decreased_by(
        "deposit.depositorWant",
        before,
        after,
        balance(actor, TOKEN_WANT),
        amount,
    )?;
    check_increased_by(
        "deposit.settWant",
        before,
        after,
        balance(ENTITY_SETT, TOKEN_WANT),
        amount,
    )?;

    let supply = before.amount(SETT_TOTAL_SUPPLY)?;
    let pool = before.amount(SETT_BALANCE)?;
    let expected_shares = if supply.is_zero() {
        amount
    } else {
        mul_div(amount, supply, pool).ok_or_else(|| {
            InvariantViolation::new("deposit.shares", "share computation overflowed")
                .observe(Observation::new(SETT_TOTAL_SUPPLY, supply, supply))
                .observe(Observation::new(SETT_BALANCE, pool, pool))
        })?
    };

    check_increased_by(
        "deposit.shares",
        before,
        after,
        balance(actor, TOKEN_SETT),
        expected_shares,
    )
}

/// Burns exactly the withdrawn shares and pays out at most their pro rata
/// value (less any withdrawal fee).
pub fn confirm_withdraw(ctx: &HookContext<'_>) -> CheckResult {
    let actor = ctx.actor()?;
    let shares = ctx.amount()?;
    let (before, after) = (ctx.before, ctx.after);

    check_decreased_by(
        "withdraw.shares",
        before,
        after,
        balance(actor, TOKEN_SETT),
        shares,
    )?;
    check_decreased_by(
        "withdraw.totalSupply",
        before,
        after,
        scalar(SETT_TOTAL_SUPPLY),
        shares,
    )?;

    let supply = before.amount(SETT_TOTAL_SUPPLY)?;
    let pool = before.amount(SETT_BALANCE)?;
    let redeemable = mul_div(shares, pool, supply).unwrap_or_default();

    let want = balance(actor, TOKEN_WANT);
    check_increase_at_most("withdraw.depositorWant", before, after, want, redeemable)?;
    if !redeemable.is_zero() {
        check_strictly_increased("withdraw.depositorWant", before, after, want)?;
    }
    Ok(())
}

/// Depositor exits completely
pub fn confirm_withdraw_all(ctx: &HookContext<'_>) -> CheckResult {
    let actor = ctx.actor()?;
    check_zero(
        "withdrawAll.shares",
        ctx.before,
        ctx.after,
        balance(actor, TOKEN_SETT),
    )?;
    check_not_decreased(
        "withdrawAll.depositorWant",
        ctx.before,
        ctx.after,
        balance(actor, TOKEN_WANT),
    )
}

/// Idle want leaves the vault and ends up under strategy management
pub fn confirm_earn(ctx: &HookContext<'_>) -> CheckResult {
    check_not_increased(
        "earn.settWant",
        ctx.before,
        ctx.after,
        balance(ENTITY_SETT, TOKEN_WANT),
    )?;
    check_not_decreased(
        "earn.strategyBalance",
        ctx.before,
        ctx.after,
        scalar(STRATEGY_BALANCE_OF),
    )
}

pub fn confirm_harvest(ctx: &HookContext<'_>) -> CheckResult {
    check_not_decreased(
        "harvest.pricePerFullShare",
        ctx.before,
        ctx.after,
        scalar(&ctx.config.share_price_key),
    )
}

/// Harvest event and fee distribution checks.
///
/// The authoritative Harvest event must carry every configured field. When
/// the share price increased, each fee recipient with a non-zero rate (read
/// from the snapshot before the harvest) must have strictly gained want.
/// A zero rate or a flat share price means no assertion on that recipient.
pub fn confirm_harvest_fees(ctx: &HookContext<'_>) -> CheckResult {
    match ctx.harvest_event() {
        Some(event) => {
            for field in &ctx.config.harvest_required_fields {
                if !event.contains(field) {
                    return Err(InvariantViolation::new(
                        "harvest.event",
                        format!("{} event is missing field '{}'", event.name, field),
                    )
                    .into());
                }
            }
        }
        None => warn!(
            "No {} event in receipt of tx {}, skipping event checks",
            ctx.config.harvest_event, ctx.receipt.tx_index
        ),
    }

    let (before, after) = (ctx.before, ctx.after);
    let share_price = &ctx.config.share_price_key;
    let value_gained = after.amount(share_price)? > before.amount(share_price)?;
    if !value_gained {
        debug!("Share price did not increase, no fee assertions");
        return Ok(());
    }

    let recipients = [
        (
            "harvest.strategistFee",
            STRATEGY_PERFORMANCE_FEE_STRATEGIST,
            ENTITY_STRATEGIST,
        ),
        (
            "harvest.governanceFee",
            STRATEGY_PERFORMANCE_FEE_GOVERNANCE,
            ENTITY_GOVERNANCE_REWARDS,
        ),
    ];
    for (invariant, fee_key, recipient) in recipients {
        let fee: Amount = before.amount(fee_key)?;
        if fee.is_zero() {
            continue;
        }
        check_strictly_increased(invariant, before, after, balance(recipient, TOKEN_WANT))?;
    }
    Ok(())
}

/// Pending want is fully staked: pending drops to zero and the staked
/// position grows (strictly, if anything was pending).
pub fn confirm_tend(ctx: &HookContext<'_>) -> CheckResult {
    let (before, after) = (ctx.before, ctx.after);
    check_zero("tend.pending", before, after, scalar(STRATEGY_BALANCE_OF_WANT))?;

    let staked = scalar(STRATEGY_BALANCE_OF_POOL);
    if before.amount(STRATEGY_BALANCE_OF_WANT)?.is_zero() {
        check_not_decreased("tend.staked", before, after, staked)
    } else {
        check_strictly_increased("tend.staked", before, after, staked)
    }
}

/// Everything the strategy managed is returned to the vault
pub fn confirm_migrate(ctx: &HookContext<'_>) -> CheckResult {
    let (before, after) = (ctx.before, ctx.after);
    let sett_want = balance(ENTITY_SETT, TOKEN_WANT);
    if before.amount(STRATEGY_BALANCE_OF)?.is_zero() {
        check_not_decreased("migrate.settWant", before, after, sett_want)
    } else {
        check_strictly_increased("migrate.settWant", before, after, sett_want)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::deployment::Deployment;
    use crate::error::CheckError;
    use crate::executor::OperationParams;
    use crate::snapshot::{BalanceKey, Snapshot};
    use indexmap::IndexMap;
    use sett_common::address::address_from_index;
    use sett_common::contracts::{Controller, Erc20, Strategy, Vault};
    use sett_common::Value;

    fn snapshot(balances: &[(&str, &str, u64)], scalars: &[(&str, u64)]) -> Snapshot {
        Snapshot::from_parts(
            balances
                .iter()
                .map(|(entity, token, amount)| (BalanceKey::new(*entity, *token), Amount::from(*amount)))
                .collect(),
            scalars
                .iter()
                .map(|(key, value)| (key.to_string(), Value::from(*value)))
                .collect(),
        )
    }

    fn deployment() -> Deployment {
        Deployment {
            want: Erc20(address_from_index(100)),
            vault: Vault(address_from_index(101)),
            strategy: Strategy(address_from_index(103)),
            controller: Controller(address_from_index(102)),
            strategist: address_from_index(4),
            governance: address_from_index(1),
            keeper: address_from_index(5),
            governance_rewards: address_from_index(6),
            extras: IndexMap::new(),
        }
    }

    fn run_check(
        kind: OperationKind,
        before: &Snapshot,
        after: &Snapshot,
        receipt: &Receipt,
        check: fn(&HookContext<'_>) -> CheckResult,
    ) -> CheckResult {
        let deployment = deployment();
        let params = OperationParams::new(address_from_index(3));
        let config = HarnessConfig::default();
        let ctx = HookContext {
            kind,
            deployment: &deployment,
            params: &params,
            before,
            after,
            receipt,
            config: &config,
        };
        check(&ctx)
    }

    fn violated(result: CheckResult) -> &'static str {
        match result {
            Err(CheckError::Violation(violation)) => violation.invariant,
            other => panic!("expected an invariant violation, got {:?}", other),
        }
    }

    fn tend_state(pending: u64, staked: u64) -> Snapshot {
        snapshot(
            &[],
            &[(STRATEGY_BALANCE_OF_WANT, pending), (STRATEGY_BALANCE_OF_POOL, staked)],
        )
    }

    fn harvest_state(share_price: u64, strategist: u64, governance_rewards: u64) -> Snapshot {
        harvest_state_with_strategist_fee(1000, share_price, strategist, governance_rewards)
    }

    fn harvest_state_with_strategist_fee(
        strategist_fee: u64,
        share_price: u64,
        strategist: u64,
        governance_rewards: u64,
    ) -> Snapshot {
        snapshot(
            &[
                (ENTITY_STRATEGIST, TOKEN_WANT, strategist),
                (ENTITY_GOVERNANCE_REWARDS, TOKEN_WANT, governance_rewards),
            ],
            &[
                (SETT_PRICE_PER_FULL_SHARE, share_price),
                (STRATEGY_PERFORMANCE_FEE_STRATEGIST, strategist_fee),
                (STRATEGY_PERFORMANCE_FEE_GOVERNANCE, 1000),
            ],
        )
    }

    fn harvested() -> Receipt {
        receipt(vec![EventLog::new(address_from_index(103), "Harvest").with_field("harvested", 5u64)])
    }

    fn migrate_state(sett_want: u64, strategy_balance: u64) -> Snapshot {
        snapshot(
            &[(ENTITY_SETT, TOKEN_WANT, sett_want)],
            &[(STRATEGY_BALANCE_OF, strategy_balance)],
        )
    }

    fn receipt(events: Vec<EventLog>) -> Receipt {
        Receipt {
            tx_index: 7,
            block_number: 12,
            from: address_from_index(3),
            events,
        }
    }

    #[test]
    fn test_single_harvest_event_is_used() {
        let strategy = address_from_index(103);
        let r = receipt(vec![EventLog::new(strategy, "Harvest").with_field("harvested", 5u64)]);
        let event = authoritative_harvest_event(&r, "Harvest").unwrap();
        assert_eq!(event.emitter, strategy);
    }

    #[test]
    fn test_second_harvest_event_wins() {
        let pool = address_from_index(105);
        let strategy = address_from_index(103);
        let r = receipt(vec![
            EventLog::new(pool, "Harvest").with_field("reward", 1u64),
            EventLog::new(strategy, "Tend"),
            EventLog::new(strategy, "Harvest").with_field("harvested", 5u64),
            EventLog::new(pool, "Harvest").with_field("reward", 2u64),
        ]);
        let event = authoritative_harvest_event(&r, "Harvest").unwrap();
        assert_eq!(event.emitter, strategy);
        assert!(event.contains("harvested"));
    }

    #[test]
    fn test_no_harvest_event() {
        assert!(authoritative_harvest_event(&receipt(Vec::new()), "Harvest").is_none());
    }

    #[test]
    fn test_tend_leaving_pending_want_fails() {
        let result = run_check(
            OperationKind::Tend,
            &tend_state(10, 0),
            &tend_state(5, 5),
            &receipt(Vec::new()),
            confirm_tend,
        );
        assert_eq!(violated(result), "tend.pending");
    }

    #[test]
    fn test_tend_without_staking_fails() {
        let result = run_check(
            OperationKind::Tend,
            &tend_state(10, 100),
            &tend_state(0, 100),
            &receipt(Vec::new()),
            confirm_tend,
        );
        assert_eq!(violated(result), "tend.staked");
    }

    #[test]
    fn test_tend_with_nothing_pending_passes() {
        let result = run_check(
            OperationKind::Tend,
            &tend_state(0, 100),
            &tend_state(0, 100),
            &receipt(Vec::new()),
            confirm_tend,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_harvest_gain_with_unpaid_strategist_fails() {
        let result = run_check(
            OperationKind::Harvest,
            &harvest_state(1000, 0, 0),
            &harvest_state(1100, 0, 5),
            &harvested(),
            confirm_harvest_fees,
        );
        assert_eq!(violated(result), "harvest.strategistFee");
    }

    #[test]
    fn test_harvest_gain_with_unpaid_governance_rewards_fails() {
        let result = run_check(
            OperationKind::Harvest,
            &harvest_state(1000, 0, 0),
            &harvest_state(1100, 5, 0),
            &harvested(),
            confirm_harvest_fees,
        );
        assert_eq!(violated(result), "harvest.governanceFee");
    }

    #[test]
    fn test_flat_share_price_skips_fee_checks() {
        let result = run_check(
            OperationKind::Harvest,
            &harvest_state(1000, 0, 0),
            &harvest_state(1000, 0, 0),
            &harvested(),
            confirm_harvest_fees,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_fee_recipient_is_not_checked() {
        let result = run_check(
            OperationKind::Harvest,
            &harvest_state_with_strategist_fee(0, 1000, 0, 0),
            &harvest_state_with_strategist_fee(0, 1100, 0, 5),
            &harvested(),
            confirm_harvest_fees,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_authoritative_harvest_event_missing_field_fails() {
        let r = receipt(vec![
            EventLog::new(address_from_index(105), "Harvest").with_field("harvested", 5u64),
            EventLog::new(address_from_index(103), "Harvest").with_field("reward", 5u64),
        ]);
        let state = harvest_state(1000, 0, 0);
        let result = run_check(OperationKind::Harvest, &state, &state, &r, confirm_harvest_fees);
        assert_eq!(violated(result), "harvest.event");
    }

    #[test]
    fn test_only_authoritative_harvest_event_needs_fields() {
        let r = receipt(vec![
            EventLog::new(address_from_index(105), "Harvest").with_field("reward", 5u64),
            EventLog::new(address_from_index(103), "Harvest").with_field("harvested", 5u64),
        ]);
        let state = harvest_state(1000, 0, 0);
        let result = run_check(OperationKind::Harvest, &state, &state, &r, confirm_harvest_fees);
        assert!(result.is_ok());
    }

    #[test]
    fn test_migrate_must_return_funds_to_sett() {
        let result = run_check(
            OperationKind::Migrate,
            &migrate_state(10, 90),
            &migrate_state(10, 0),
            &receipt(Vec::new()),
            confirm_migrate,
        );
        assert_eq!(violated(result), "migrate.settWant");
    }

    #[test]
    fn test_migrate_of_empty_strategy_allows_flat_sett_want() {
        let result = run_check(
            OperationKind::Migrate,
            &migrate_state(10, 0),
            &migrate_state(10, 0),
            &receipt(Vec::new()),
            confirm_migrate,
        );
        assert!(result.is_ok());

        let result = run_check(
            OperationKind::Migrate,
            &migrate_state(10, 0),
            &migrate_state(9, 0),
            &receipt(Vec::new()),
            confirm_migrate,
        );
        assert_eq!(violated(result), "migrate.settWant");
    }
}
