//! Per-integration policy: which extra (entity, token) pairs to track and
//! which invariants to assert after each operation kind.
//!
//! A [`Resolver`] is a table of plain function pointers fixed at build time.
//! [`ResolverBuilder`] records every slot assignment and refuses to build if a
//! slot was assigned twice, so an integration cannot silently shadow one of
//! its own hooks. The deposit, withdraw and earn hooks have no meaningful
//! default: an integration must either supply them or explicitly opt out
//! with [`ResolverBuilder::unchecked`].

pub mod strategy_core;

use sett_common::{address::Address, amount::Amount, EventLog, Receipt};

use crate::config::HarnessConfig;
use crate::deployment::Deployment;
use crate::error::{CheckResult, ConfigError};
use crate::executor::{OperationKind, OperationParams};
use crate::registry::{EntityRegistry, TokenHandle};
use crate::snapshot::Snapshot;

/// Extra (entity, token) pairs to include in every snapshot
pub type TrackingHook = fn(&Deployment, &EntityRegistry) -> Vec<(String, String)>;
/// Extra tokens to register next to `want` and the vault shares
pub type TokensHook = fn(&Deployment) -> Vec<(String, TokenHandle)>;
/// Named addresses the strategy moves funds to (pools, routers, gauges)
pub type DestinationsHook = fn(&Deployment) -> Vec<(String, Address)>;
/// Post-operation assertion
pub type OperationHook = fn(&HookContext<'_>) -> CheckResult;

/// Identifies one hook slot of a resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum HookSlot {
    ExtraTracking,
    ExtraTokens,
    StrategyDestinations,
    AfterDeposit,
    AfterWithdraw,
    AfterWithdrawAll,
    AfterEarn,
    AfterTend,
    AfterHarvest,
    AfterMigrate,
}

impl HookSlot {
    pub fn for_operation(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Deposit => HookSlot::AfterDeposit,
            OperationKind::Withdraw => HookSlot::AfterWithdraw,
            OperationKind::WithdrawAll => HookSlot::AfterWithdrawAll,
            OperationKind::Earn => HookSlot::AfterEarn,
            OperationKind::Tend => HookSlot::AfterTend,
            OperationKind::Harvest => HookSlot::AfterHarvest,
            OperationKind::Migrate => HookSlot::AfterMigrate,
        }
    }

    /// Slots without a usable default
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            HookSlot::AfterDeposit | HookSlot::AfterWithdraw | HookSlot::AfterEarn
        )
    }
}

/// Everything a post-operation hook may inspect
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub kind: OperationKind,
    pub deployment: &'a Deployment,
    pub params: &'a OperationParams,
    pub before: &'a Snapshot,
    pub after: &'a Snapshot,
    pub receipt: &'a Receipt,
    pub config: &'a HarnessConfig,
}

impl<'a> HookContext<'a> {
    /// Entity name of the account that sent the operation
    pub fn actor(&self) -> Result<&'a str, ConfigError> {
        self.params
            .actor
            .as_deref()
            .ok_or(ConfigError::MissingParameter("actor"))
    }

    pub fn amount(&self) -> Result<Amount, ConfigError> {
        self.params
            .amount
            .ok_or(ConfigError::MissingParameter("amount"))
    }

    /// The authoritative Harvest event of the receipt, if any
    pub fn harvest_event(&self) -> Option<&'a EventLog> {
        strategy_core::authoritative_harvest_event(self.receipt, &self.config.harvest_event)
    }
}

fn no_tracking(_: &Deployment, _: &EntityRegistry) -> Vec<(String, String)> {
    Vec::new()
}

fn no_tokens(_: &Deployment) -> Vec<(String, TokenHandle)> {
    Vec::new()
}

fn no_destinations(_: &Deployment) -> Vec<(String, Address)> {
    Vec::new()
}

/// Accepts any outcome
pub fn permissive(_: &HookContext<'_>) -> CheckResult {
    Ok(())
}

/// Resolved hook table
#[derive(Clone, Copy)]
pub struct Hooks {
    pub extra_tracking: TrackingHook,
    pub extra_tokens: TokensHook,
    pub strategy_destinations: DestinationsHook,
    pub after_deposit: OperationHook,
    pub after_withdraw: OperationHook,
    pub after_withdraw_all: OperationHook,
    pub after_earn: OperationHook,
    pub after_tend: OperationHook,
    pub after_harvest: OperationHook,
    pub after_migrate: OperationHook,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    name: String,
    deployment: Deployment,
    hooks: Hooks,
}

impl Resolver {
    pub fn builder(name: impl Into<String>, deployment: Deployment) -> ResolverBuilder {
        ResolverBuilder::new(name, deployment)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn extra_tracking(&self, entities: &EntityRegistry) -> Vec<(String, String)> {
        (self.hooks.extra_tracking)(&self.deployment, entities)
    }

    pub fn extra_tokens(&self) -> Vec<(String, TokenHandle)> {
        (self.hooks.extra_tokens)(&self.deployment)
    }

    pub fn strategy_destinations(&self) -> Vec<(String, Address)> {
        (self.hooks.strategy_destinations)(&self.deployment)
    }

    pub fn hook_for(&self, kind: OperationKind) -> OperationHook {
        match kind {
            OperationKind::Deposit => self.hooks.after_deposit,
            OperationKind::Withdraw => self.hooks.after_withdraw,
            OperationKind::WithdrawAll => self.hooks.after_withdraw_all,
            OperationKind::Earn => self.hooks.after_earn,
            OperationKind::Tend => self.hooks.after_tend,
            OperationKind::Harvest => self.hooks.after_harvest,
            OperationKind::Migrate => self.hooks.after_migrate,
        }
    }

    /// Core laws for the operation kind, then the integration hook
    pub fn verify(&self, ctx: &HookContext<'_>) -> CheckResult {
        strategy_core::confirm(ctx)?;
        (self.hook_for(ctx.kind))(ctx)
    }
}

/// Collects hook assignments and validates them at [`ResolverBuilder::build`]
pub struct ResolverBuilder {
    name: String,
    deployment: Deployment,
    extra_tracking: Option<TrackingHook>,
    extra_tokens: Option<TokensHook>,
    strategy_destinations: Option<DestinationsHook>,
    after_deposit: Option<OperationHook>,
    after_withdraw: Option<OperationHook>,
    after_withdraw_all: Option<OperationHook>,
    after_earn: Option<OperationHook>,
    after_tend: Option<OperationHook>,
    after_harvest: Option<OperationHook>,
    after_migrate: Option<OperationHook>,
    duplicates: Vec<HookSlot>,
    misplaced: Vec<HookSlot>,
}

fn assign<T>(slot: HookSlot, field: &mut Option<T>, hook: T, duplicates: &mut Vec<HookSlot>) {
    if field.is_some() {
        duplicates.push(slot);
    }
    *field = Some(hook);
}

impl ResolverBuilder {
    pub fn new(name: impl Into<String>, deployment: Deployment) -> Self {
        Self {
            name: name.into(),
            deployment,
            extra_tracking: None,
            extra_tokens: None,
            strategy_destinations: None,
            after_deposit: None,
            after_withdraw: None,
            after_withdraw_all: None,
            after_earn: None,
            after_tend: None,
            after_harvest: None,
            after_migrate: None,
            duplicates: Vec::new(),
            misplaced: Vec::new(),
        }
    }

    pub fn extra_tracking(mut self, hook: TrackingHook) -> Self {
        assign(HookSlot::ExtraTracking, &mut self.extra_tracking, hook, &mut self.duplicates);
        self
    }

    pub fn extra_tokens(mut self, hook: TokensHook) -> Self {
        assign(HookSlot::ExtraTokens, &mut self.extra_tokens, hook, &mut self.duplicates);
        self
    }

    pub fn strategy_destinations(mut self, hook: DestinationsHook) -> Self {
        assign(
            HookSlot::StrategyDestinations,
            &mut self.strategy_destinations,
            hook,
            &mut self.duplicates,
        );
        self
    }

    /// Assign an operation hook to `slot`
    pub fn on(mut self, slot: HookSlot, hook: OperationHook) -> Self {
        let field = match slot {
            HookSlot::AfterDeposit => &mut self.after_deposit,
            HookSlot::AfterWithdraw => &mut self.after_withdraw,
            HookSlot::AfterWithdrawAll => &mut self.after_withdraw_all,
            HookSlot::AfterEarn => &mut self.after_earn,
            HookSlot::AfterTend => &mut self.after_tend,
            HookSlot::AfterHarvest => &mut self.after_harvest,
            HookSlot::AfterMigrate => &mut self.after_migrate,
            HookSlot::ExtraTracking | HookSlot::ExtraTokens | HookSlot::StrategyDestinations => {
                self.misplaced.push(slot);
                return self;
            }
        };
        assign(slot, field, hook, &mut self.duplicates);
        self
    }

    pub fn on_after_deposit(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterDeposit, hook)
    }

    pub fn on_after_withdraw(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterWithdraw, hook)
    }

    pub fn on_after_withdraw_all(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterWithdrawAll, hook)
    }

    pub fn on_after_earn(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterEarn, hook)
    }

    pub fn on_after_tend(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterTend, hook)
    }

    pub fn on_after_harvest(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterHarvest, hook)
    }

    pub fn on_after_migrate(self, hook: OperationHook) -> Self {
        self.on(HookSlot::AfterMigrate, hook)
    }

    /// Explicitly accept the permissive placeholder for a required slot.
    /// Counts as an assignment.
    pub fn unchecked(self, slot: HookSlot) -> Self {
        match slot {
            HookSlot::ExtraTracking => self.extra_tracking(no_tracking),
            HookSlot::ExtraTokens => self.extra_tokens(no_tokens),
            HookSlot::StrategyDestinations => self.strategy_destinations(no_destinations),
            operation => self.on(operation, permissive),
        }
    }

    /// Validate the assignments and produce the hook table.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateHook`] for the first slot assigned twice
    /// - [`ConfigError::MissingHook`] for the first required slot left empty
    /// - [`ConfigError::Wiring`] if an operation hook was given to a
    ///   tracking slot
    pub fn build(self) -> Result<Resolver, ConfigError> {
        if let Some(slot) = self.duplicates.first() {
            return Err(ConfigError::DuplicateHook(*slot));
        }
        if let Some(slot) = self.misplaced.first() {
            return Err(ConfigError::Wiring(format!("{} is not an operation hook slot", slot)));
        }

        let required = |slot: HookSlot, hook: Option<OperationHook>| {
            hook.ok_or(ConfigError::MissingHook(slot))
        };

        let hooks = Hooks {
            extra_tracking: self.extra_tracking.unwrap_or(no_tracking),
            extra_tokens: self.extra_tokens.unwrap_or(no_tokens),
            strategy_destinations: self.strategy_destinations.unwrap_or(no_destinations),
            after_deposit: required(HookSlot::AfterDeposit, self.after_deposit)?,
            after_withdraw: required(HookSlot::AfterWithdraw, self.after_withdraw)?,
            after_withdraw_all: self.after_withdraw_all.unwrap_or(permissive),
            after_earn: required(HookSlot::AfterEarn, self.after_earn)?,
            after_tend: self.after_tend.unwrap_or(strategy_core::confirm_tend),
            after_harvest: self.after_harvest.unwrap_or(strategy_core::confirm_harvest_fees),
            after_migrate: self.after_migrate.unwrap_or(permissive),
        };

        Ok(Resolver {
            name: self.name,
            deployment: self.deployment,
            hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sett_common::address::address_from_index;
    use sett_common::contracts::{Controller, Erc20, Strategy, Vault};
    use strum::IntoEnumIterator;

    fn deployment() -> Deployment {
        Deployment {
            want: Erc20(address_from_index(100)),
            vault: Vault(address_from_index(102)),
            strategy: Strategy(address_from_index(103)),
            controller: Controller(address_from_index(104)),
            strategist: address_from_index(2),
            governance: address_from_index(5),
            keeper: address_from_index(3),
            governance_rewards: address_from_index(7),
            extras: Default::default(),
        }
    }

    fn staking_pool(_: &Deployment) -> Vec<(String, Address)> {
        vec![("staking".to_string(), address_from_index(105))]
    }

    fn complete() -> ResolverBuilder {
        Resolver::builder("test", deployment())
            .unchecked(HookSlot::AfterDeposit)
            .unchecked(HookSlot::AfterWithdraw)
            .unchecked(HookSlot::AfterEarn)
    }

    #[test]
    fn test_missing_required_hook() {
        let err = Resolver::builder("test", deployment())
            .unchecked(HookSlot::AfterDeposit)
            .unchecked(HookSlot::AfterWithdraw)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingHook(HookSlot::AfterEarn));
    }

    #[test]
    fn test_duplicate_assignment_detected() {
        let err = complete()
            .strategy_destinations(staking_pool)
            .strategy_destinations(staking_pool)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateHook(HookSlot::StrategyDestinations));

        let err = complete().on_after_deposit(permissive).build().unwrap_err();
        assert_eq!(err, ConfigError::DuplicateHook(HookSlot::AfterDeposit));
    }

    #[test]
    fn test_defaults_are_applied() {
        let resolver = complete().strategy_destinations(staking_pool).build().unwrap();
        assert_eq!(resolver.strategy_destinations().len(), 1);
        assert!(resolver.extra_tokens().is_empty());
        assert!(resolver.extra_tracking(&crate::registry::entity_registry()).is_empty());
    }

    #[test]
    fn test_slot_names() {
        assert_eq!(HookSlot::AfterWithdrawAll.to_string(), "afterWithdrawAll");
        let required: Vec<HookSlot> = HookSlot::iter().filter(HookSlot::is_required).collect();
        assert_eq!(
            required,
            vec![HookSlot::AfterDeposit, HookSlot::AfterWithdraw, HookSlot::AfterEarn]
        );
    }
}
