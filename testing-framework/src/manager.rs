//! Scenario entry points.
//!
//! [`SnapshotManager`] owns the registries, the resolver and the executor for
//! one deployment. Each entry point builds the contract call, resolves the
//! signer to an entity name and runs it through the executor with the
//! resolver's checks.

use log::{debug, info};
use sett_common::{
    address::{self, Address},
    amount::Amount,
    contracts::StrategyQuery,
    ChainClient, Call, ChainError, Receipt,
};
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::deployment::Deployment;
use crate::error::{ConfigError, HarnessError, InvariantViolation, Observation};
use crate::executor::{OperationExecutor, OperationKind, OperationParams, OperationRecord};
use crate::registry::{
    entity_registry, token_registry, EntityRegistry, ScalarAccessors, TokenHandle, TokenRegistry,
};
use crate::report::{DiagnosticSink, ReportPrinter};
use crate::resolver::{strategy_core, HookContext, Resolver};
use crate::snapshot::keys::*;
use crate::snapshot::{read_batch, Snapshot, SnapshotEngine, SnapshotPlan};

pub struct SnapshotManager {
    client: Arc<dyn ChainClient>,
    resolver: Resolver,
    entities: EntityRegistry,
    tokens: TokenRegistry,
    scalars: ScalarAccessors,
    executor: OperationExecutor,
    config: HarnessConfig,
}

impl SnapshotManager {
    /// Build the registries for the resolver's deployment.
    ///
    /// Entities: the vault, strategy, controller, strategist and governance
    /// rewards recipient, then every strategy destination. Tokens: want and
    /// the vault shares, then every extra token of the resolver.
    pub fn new(
        client: Arc<dyn ChainClient>,
        resolver: Resolver,
        config: HarnessConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        let deployment = resolver.deployment().clone();

        let mut entities = entity_registry();
        entities.register(ENTITY_SETT, deployment.vault.address())?;
        entities.register(ENTITY_STRATEGY, deployment.strategy.address())?;
        entities.register(ENTITY_CONTROLLER, deployment.controller.address())?;
        entities.register(ENTITY_STRATEGIST, deployment.strategist)?;
        entities.register(ENTITY_GOVERNANCE_REWARDS, deployment.governance_rewards)?;
        for (name, destination) in resolver.strategy_destinations() {
            entities.register(name, destination)?;
        }

        let mut tokens = token_registry();
        tokens.register(
            TOKEN_WANT,
            TokenHandle::new(deployment.want.address(), config.decimals),
        )?;
        tokens.register(
            TOKEN_SETT,
            TokenHandle::new(deployment.vault.address(), config.decimals),
        )?;
        for (name, token) in resolver.extra_tokens() {
            tokens.register(name, token)?;
        }

        let scalars = default_scalars(&deployment)?;

        let printer = ReportPrinter::new(sink)
            .with_default_decimals(config.decimals)
            .with_token_decimals(
                tokens
                    .all()
                    .map(|(name, handle)| (name.to_string(), handle.decimals))
                    .collect::<Vec<_>>(),
            );
        let executor = OperationExecutor::new(
            SnapshotEngine::new(client.clone()),
            printer,
            config.clone(),
        );

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Resolver '{}' tracking {} entities x {} tokens, {} scalars",
                resolver.name(),
                entities.len(),
                tokens.len(),
                scalars.len()
            );
        }

        Ok(Self {
            client,
            resolver,
            entities,
            tokens,
            scalars,
            executor,
            config,
        })
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn deployment(&self) -> &Deployment {
        self.resolver.deployment()
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn printer(&self) -> &ReportPrinter {
        self.executor.printer()
    }

    /// Track an additional account (a depositor, a second user, ...)
    pub fn register_account(
        &mut self,
        name: impl Into<String>,
        account: Address,
    ) -> Result<(), ConfigError> {
        self.entities.register(name, account)
    }

    pub fn plan(&self) -> Result<SnapshotPlan, ConfigError> {
        let extra = self.resolver.extra_tracking(&self.entities);
        SnapshotPlan::build(&self.entities, &self.tokens, &self.scalars, &extra)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, HarnessError> {
        let plan = self.plan()?;
        self.executor.engine().take(&plan).await
    }

    /// Entity name of `account`, registering it on first use
    fn actor_for(&mut self, account: Address) -> Result<String, ConfigError> {
        if let Some(name) = self.entities.name_of(&account) {
            return Ok(name.to_string());
        }
        let name = format!("account:{}", address::to_hex(&account));
        debug!("Tracking unregistered signer as '{}'", name);
        self.entities.register(name.clone(), account)?;
        Ok(name)
    }

    async fn run(
        &mut self,
        kind: OperationKind,
        call: Call,
        from: Address,
        amount: Option<Amount>,
    ) -> Result<OperationRecord, HarnessError> {
        let actor = self.actor_for(from)?;
        let plan = self.plan()?;
        let mut params = OperationParams::new(from).with_actor(actor);
        if let Some(amount) = amount {
            params = params.with_amount(amount);
        }

        info!("{}: {}", kind, call);
        let client = self.client.clone();
        let resolver = &self.resolver;
        let config = &self.config;
        let deployment = resolver.deployment();

        self.executor
            .run(
                kind,
                &plan,
                params,
                move || async move { client.send(call, from).await },
                |before, after, receipt, params| {
                    resolver.verify(&HookContext {
                        kind,
                        deployment,
                        params,
                        before,
                        after,
                        receipt,
                        config,
                    })
                },
            )
            .await
    }

    pub async fn sett_deposit(
        &mut self,
        from: Address,
        amount: Amount,
    ) -> Result<OperationRecord, HarnessError> {
        let call = self.deployment().vault.deposit(amount);
        self.run(OperationKind::Deposit, call, from, Some(amount)).await
    }

    pub async fn sett_withdraw(
        &mut self,
        from: Address,
        shares: Amount,
    ) -> Result<OperationRecord, HarnessError> {
        let call = self.deployment().vault.withdraw(shares);
        self.run(OperationKind::Withdraw, call, from, Some(shares)).await
    }

    /// Redeem every share of `from`. The strategy-empty check assumes `from`
    /// is the only depositor.
    pub async fn sett_withdraw_all(&mut self, from: Address) -> Result<OperationRecord, HarnessError> {
        let call = self.deployment().vault.withdraw_all();
        self.run(OperationKind::WithdrawAll, call, from, None).await
    }

    pub async fn sett_earn(&mut self, from: Address) -> Result<OperationRecord, HarnessError> {
        let call = self.deployment().vault.earn();
        self.run(OperationKind::Earn, call, from, None).await
    }

    pub async fn sett_tend(&mut self, from: Address) -> Result<OperationRecord, HarnessError> {
        let call = self.deployment().strategy.tend();
        self.run(OperationKind::Tend, call, from, None).await
    }

    /// Harvest, then print the authoritative Harvest event
    pub async fn sett_harvest(&mut self, from: Address) -> Result<OperationRecord, HarnessError> {
        let call = self.deployment().strategy.harvest();
        let record = self.run(OperationKind::Harvest, call, from, None).await?;

        if let Some(receipt) = record.receipt() {
            self.print_harvest_state(receipt);
        }
        Ok(record)
    }

    fn print_harvest_state(&self, receipt: &Receipt) {
        let config = &self.config;
        if let Some(event) = strategy_core::authoritative_harvest_event(receipt, &config.harvest_event)
        {
            self.printer().print_event(
                "harvest() Harvest State",
                event,
                &config.harvest_required_fields,
            );
        }
    }

    /// Pull everything out of the strategy back into the vault through
    /// `controller.withdrawAll(want)`
    pub async fn migrate(&mut self, from: Address) -> Result<OperationRecord, HarnessError> {
        let deployment = self.deployment();
        let call = deployment.controller.withdraw_all(deployment.want.address());
        self.run(OperationKind::Migrate, call, from, None).await
    }

    /// Stuck-token recovery.
    ///
    /// Recovering any of the strategy's protected tokens must revert.
    /// Recovering an unprotected token must move the strategy's whole
    /// balance of it to the controller.
    pub async fn confirm_withdraw_other(
        &self,
        from: Address,
        unprotected: &[Address],
    ) -> Result<(), HarnessError> {
        let deployment = self.deployment();
        let strategy = deployment.strategy;
        let controller = deployment.controller;

        let protected = self
            .client
            .call(&strategy.query(StrategyQuery::ProtectedTokens))
            .await
            .map_err(|source| HarnessError::Read {
                what: "strategy protected tokens".to_string(),
                source,
            })?;
        for token in protected.as_addresses()? {
            let call = controller.in_case_strategy_token_get_stuck(strategy.address(), *token);
            match self.client.send(call, from).await {
                Err(ChainError::Reverted { reason }) => {
                    debug!("Recovery of protected {} reverted: {}", address::short(token), reason)
                }
                Err(e) => return Err(e.into()),
                Ok(_) => {
                    return Err(HarnessError::Check(InvariantViolation::new(
                        "withdrawOther.protected",
                        format!(
                            "protected token {} was withdrawn from the strategy",
                            address::to_hex(token)
                        ),
                    )))
                }
            }
        }

        for token in unprotected {
            let handle = TokenHandle::new(*token, self.config.decimals);
            let queries = [
                handle.balance_of(strategy.address()),
                handle.balance_of(controller.address()),
            ];
            let before = read_batch(self.client.as_ref(), &queries, "withdrawOther before").await?;
            let call = controller.in_case_strategy_token_get_stuck(strategy.address(), *token);
            self.client.send(call, from).await?;
            let after = read_batch(self.client.as_ref(), &queries, "withdrawOther after").await?;

            let (strategy_before, controller_before) = (before[0].as_amount()?, before[1].as_amount()?);
            let (strategy_after, controller_after) = (after[0].as_amount()?, after[1].as_amount()?);
            let received = controller_after.saturating_sub(controller_before);
            if !strategy_after.is_zero() || received != strategy_before {
                return Err(HarnessError::Check(
                    InvariantViolation::new(
                        "withdrawOther.unprotected",
                        format!(
                            "recovering {} must move the whole strategy balance to the controller",
                            address::to_hex(token)
                        ),
                    )
                    .observe(Observation::new("strategy", strategy_before, strategy_after))
                    .observe(Observation::new("controller", controller_before, controller_after)),
                ));
            }
        }
        Ok(())
    }
}
