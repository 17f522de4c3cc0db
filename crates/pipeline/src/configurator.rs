//! Exchange bootstrap: token registration, universal agents, pool setup and
//! the demonstration funding pass

use tracing::{info, warn};

use dexboot_core::{
    pow10, uint, Address, Arg, CoreError, ModuleName, PoolConfig, PoolPlan, Roles, SystemPlan, Token, TokenRef,
    MAX_UINT96,
};

use crate::sequencer::Sequencer;
use crate::steps::{Step, StepRunner};
use crate::{PipelineError, Result};

pub const REGISTER_TOKEN: &str = "registerToken(address)";
pub const REGISTER_UNIVERSAL_AGENT: &str = "registerUniversalAgent(address,bool)";
pub const SETUP_POOL: &str = "setupPool((address,address,string,uint32,address[],uint96[],uint8,string))";
pub const APPROVE: &str = "approve(address,uint256)";
pub const DEPOSIT: &str = "deposit(address,address,address,uint96,bytes)";

/// Amounts for the funding pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingParams {
    /// ERC20 allowance granted to the deposit contract
    pub allowance: u128,
    /// Deposit per ERC20 token
    pub token_deposit: u128,
    /// Native deposit, sent as transaction value
    pub native_deposit: u128,
    /// Gas for every approval and deposit
    pub gas: u64,
    /// Fail the run if any account could not be funded
    pub strict: bool,
}

impl Default for FundingParams {
    fn default() -> Self {
        Self {
            allowance: pow10(28),
            token_deposit: pow10(26),
            native_deposit: pow10(20),
            gas: 200_000,
            strict: false,
        }
    }
}

impl FundingParams {
    /// Deposit amounts are `uint96` on the exchange
    pub fn validate(&self) -> Result<()> {
        for (field, amount) in [("token_deposit", self.token_deposit), ("native_deposit", self.native_deposit)] {
            if amount > MAX_UINT96 {
                return Err(CoreError::InvalidPlan(format!(
                    "funding.{} {} exceeds uint96 max {}",
                    field, amount, MAX_UINT96
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// First failing step of one account
#[derive(Debug)]
pub struct FundingFailure {
    pub account: Address,
    pub step: String,
    pub error: PipelineError,
}

/// Outcome of the funding pass
#[derive(Debug, Default)]
pub struct FundingReport {
    /// Accounts whose whole sequence succeeded, in list order
    pub funded: Vec<Address>,
    pub failures: Vec<FundingFailure>,
}

impl FundingReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.funded.len() + self.failures.len()
    }
}

/// Reject an order in which a pool comes before one of its tokens, or a
/// token appears twice
pub fn check_registration_order(order: &[ModuleName], pools: &[PoolPlan]) -> Result<()> {
    let position = |name: &ModuleName| order.iter().position(|n| n == name);

    for (i, name) in order.iter().enumerate() {
        if order[..i].contains(name) {
            return Err(CoreError::InvalidPlan(format!("{} registered twice", name)).into());
        }
    }

    for pool in pools {
        let pool_pos = position(&pool.module)
            .ok_or_else(|| CoreError::InvalidPlan(format!("pool {} is not registered", pool.module)))?;
        for token in pool.tokens.iter().filter_map(TokenRef::module_name) {
            match position(token) {
                Some(pos) if pos < pool_pos => {}
                Some(_) => {
                    return Err(CoreError::InvalidPlan(format!(
                        "pool {} is registered before its token {}",
                        pool.module, token
                    ))
                    .into())
                }
                None => {
                    return Err(CoreError::InvalidPlan(format!(
                        "token {} of pool {} is not registered",
                        token, pool.module
                    ))
                    .into())
                }
            }
        }
    }
    Ok(())
}

pub struct Configurator {
    roles: Roles,
    tokens: Vec<ModuleName>,
    pools: Vec<PoolPlan>,
    funding: FundingParams,
}

impl Configurator {
    pub fn new(plan: &SystemPlan, funding: FundingParams) -> Self {
        Self {
            roles: plan.roles.clone(),
            tokens: plan.tokens.clone(),
            pools: plan.pools.clone(),
            funding,
        }
    }

    pub fn funding(&self) -> &FundingParams {
        &self.funding
    }

    /// `registerToken` for every base token, then every pool token
    pub fn token_registration_steps(&self) -> Result<Vec<Step>> {
        let order: Vec<ModuleName> = self
            .tokens
            .iter()
            .cloned()
            .chain(self.pools.iter().map(|p| p.module.clone()))
            .collect();
        check_registration_order(&order, &self.pools)?;

        Ok(order
            .into_iter()
            .map(|token| {
                Step::call(
                    format!("exchange.registerToken({})", token),
                    self.roles.exchange.clone(),
                    REGISTER_TOKEN,
                    vec![Arg::Module(token)],
                )
            })
            .collect())
    }

    /// Every pool becomes a universal agent
    pub fn universal_agent_steps(&self) -> Vec<Step> {
        self.pools
            .iter()
            .map(|pool| {
                Step::call(
                    format!("agentRegistry.registerUniversalAgent({})", pool.module),
                    self.roles.agent_registry.clone(),
                    REGISTER_UNIVERSAL_AGENT,
                    vec![Arg::Module(pool.module.clone()), Arg::Value(Token::Bool(true))],
                )
            })
            .collect()
    }

    /// Resolve a pool plan against deployed addresses
    pub fn pool_config(&self, pool: &PoolPlan, sequencer: &Sequencer) -> Result<PoolConfig> {
        let required_by = format!("{}.setupPool", pool.module);
        let tokens = pool
            .tokens
            .iter()
            .map(|token| match token {
                TokenRef::Native => Ok(Address::zero()),
                TokenRef::Module(name) => sequencer.require(name, &required_by),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PoolConfig {
            shared_config: sequencer.require(&self.roles.shared_config, &required_by)?,
            exchange: sequencer.require(&self.roles.exchange, &required_by)?,
            pool_name: pool.pool_name.clone(),
            account_id: pool.account_id,
            tokens,
            weights: pool.weights.to_vec(),
            fee_bips: pool.fee_bips,
            token_symbol: pool.token_symbol.clone(),
        })
    }

    /// One `setupPool` per pool, each record validated before it is built
    pub fn pool_setup_steps(&self, sequencer: &Sequencer) -> Result<Vec<Step>> {
        self.pools
            .iter()
            .map(|pool| {
                let config = self.pool_config(pool, sequencer)?;
                Ok(Step::call(
                    format!("{}.setupPool", pool.module),
                    pool.module.clone(),
                    SETUP_POOL,
                    vec![Arg::Value(config.to_token()?)],
                )
                .requires(self.roles.shared_config.clone())
                .requires(self.roles.exchange.clone()))
            })
            .collect()
    }

    /// Approvals, then ERC20 deposits, then the native deposit, all sent by
    /// `account` to itself
    pub fn funding_steps(&self, account: Address) -> Vec<Step> {
        let f = &self.funding;
        let mut steps = Vec::with_capacity(self.tokens.len() * 2 + 1);

        for token in &self.tokens {
            steps.push(
                Step::call(
                    format!("{}.approve", token),
                    token.clone(),
                    APPROVE,
                    vec![
                        Arg::Module(self.roles.deposit_contract.clone()),
                        Arg::Value(uint(f.allowance)),
                    ],
                )
                .from_account(account)
                .with_gas(f.gas),
            );
        }

        let deposit = |name: String, token: Arg, amount: u128| {
            Step::call(
                name,
                self.roles.exchange.clone(),
                DEPOSIT,
                vec![
                    Arg::Account(account),
                    Arg::Account(account),
                    token,
                    Arg::Value(uint(amount)),
                    Arg::Value(Token::Bytes(vec![])),
                ],
            )
            .from_account(account)
            .with_gas(f.gas)
        };

        for token in &self.tokens {
            steps.push(deposit(
                format!("exchange.deposit({})", token),
                Arg::Module(token.clone()),
                f.token_deposit,
            ));
        }
        steps.push(
            deposit(
                "exchange.deposit(native)".to_string(),
                Arg::Value(Token::Address(Address::zero())),
                f.native_deposit,
            )
            .with_value(f.native_deposit),
        );
        steps
    }

    /// Fund every account in order. A failure ends that account's sequence
    /// only and is recorded; later accounts still run.
    pub async fn fund_accounts(&self, runner: &StepRunner<'_>, accounts: &[Address]) -> FundingReport {
        let mut report = FundingReport::default();

        'accounts: for (i, account) in accounts.iter().enumerate() {
            info!("Funding account {} ({}/{})", account, i + 1, accounts.len());
            for step in self.funding_steps(*account) {
                if let Err(error) = runner.run_step(&step).await {
                    warn!("Funding {} stopped at {}: {}", account, step.name, error);
                    report.failures.push(FundingFailure {
                        account: *account,
                        step: step.name,
                        error,
                    });
                    continue 'accounts;
                }
            }
            report.funded.push(*account);
        }

        info!(
            "Funding pass done: {} funded, {} failed",
            report.funded.len(),
            report.failures.len()
        );
        report
    }
}
