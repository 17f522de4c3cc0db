//! End-to-end run: deployment, then (when enabled) bootstrap and
//! verification-key registration

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use dexboot_chain::{ArtifactRegistry, Chain, ChainError};
use dexboot_core::{Address, DeployedInstance, SystemPlan, H256};
use dexboot_verifier::{load_circuit_keys, CircuitKey, VkSource};

use crate::configurator::{Configurator, FundingParams, FundingReport};
use crate::initializer::Initializer;
use crate::linker::Linker;
use crate::registrar::VkRegistrar;
use crate::sequencer::Sequencer;
use crate::steps::{resolve_args, Step, StepRunner};
use crate::{PipelineError, Result};

/// Environment variable that selects the bootstrap phases
pub const TEST_ENV_VAR: &str = "TEST_ENV";

/// Which phases run after deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapMode {
    DeployOnly,
    DeployAndBootstrap,
}

impl BootstrapMode {
    /// `docker` enables bootstrap; anything else, or nothing, deploys only
    pub fn from_env_flag(value: Option<&str>) -> Self {
        match value {
            Some("docker") => BootstrapMode::DeployAndBootstrap,
            _ => BootstrapMode::DeployOnly,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_flag(std::env::var(TEST_ENV_VAR).ok().as_deref())
    }

    pub fn bootstraps(&self) -> bool {
        matches!(self, BootstrapMode::DeployAndBootstrap)
    }
}

impl fmt::Display for BootstrapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapMode::DeployOnly => write!(f, "deploy-only"),
            BootstrapMode::DeployAndBootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for BootstrapMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deploy-only" | "deploy" => Ok(BootstrapMode::DeployOnly),
            "bootstrap" | "docker" => Ok(BootstrapMode::DeployAndBootstrap),
            other => Err(format!("unknown mode '{}' (expected deploy-only or bootstrap)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub plan: SystemPlan,
    pub genesis_root: H256,
    pub funding: FundingParams,
    pub vk_sources: Vec<VkSource>,
    /// Administrative account; defaults to the chain's first account
    pub admin: Option<Address>,
    /// Network used to look up existing modules; defaults to the chain's
    pub network_id: Option<String>,
}

impl PipelineConfig {
    pub fn new(plan: SystemPlan, genesis_root: H256) -> Self {
        Self {
            plan,
            genesis_root,
            funding: FundingParams::default(),
            vk_sources: Vec::new(),
            admin: None,
            network_id: None,
        }
    }

    pub fn with_funding(mut self, funding: FundingParams) -> Self {
        self.funding = funding;
        self
    }

    pub fn with_vk_sources(mut self, sources: Vec<VkSource>) -> Self {
        self.vk_sources = sources;
        self
    }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub mode: BootstrapMode,
    pub admin: Address,
    /// Every instance of the run, adopted or deployed, in plan order
    pub deployed: Vec<DeployedInstance>,
    pub steps_run: usize,
    /// `None` in deploy-only runs
    pub funding: Option<FundingReport>,
    pub circuits_registered: usize,
}

pub struct Pipeline<'a> {
    chain: &'a dyn Chain,
    artifacts: &'a ArtifactRegistry,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(chain: &'a dyn Chain, artifacts: &'a ArtifactRegistry, config: PipelineConfig) -> Self {
        Self { chain, artifacts, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn admin(&self) -> Result<(Address, Vec<Address>)> {
        let accounts = self.chain.accounts().await?;
        let admin = match self.config.admin {
            Some(admin) => admin,
            None => *accounts.first().ok_or(ChainError::NoAccounts)?,
        };
        Ok((admin, accounts))
    }

    /// Run every phase `mode` enables, in order
    pub async fn run(&self, mode: BootstrapMode) -> Result<PipelineReport> {
        let plan = &self.config.plan;
        plan.validate()?;
        if mode.bootstraps() {
            self.config.funding.validate()?;
        }

        let (admin, accounts) = self.admin().await?;
        info!("Starting {} run as {} ({} modules)", mode, admin, plan.modules.len());

        // keys are validated before anything reaches the chain
        let keys = if mode.bootstraps() {
            load_circuit_keys(&self.config.vk_sources)?
        } else {
            Vec::new()
        };

        let sequencer = self.deploy(admin).await?;
        if !mode.bootstraps() {
            info!("Deploy-only run complete: {} modules", sequencer.instances().len());
            return Ok(PipelineReport {
                mode,
                admin,
                deployed: sequencer.instances().to_vec(),
                steps_run: 0,
                funding: None,
                circuits_registered: 0,
            });
        }

        let (steps_run, funding, circuits_registered) =
            self.bootstrap(&sequencer, admin, &accounts, &keys).await?;

        Ok(PipelineReport {
            mode,
            admin,
            deployed: sequencer.instances().to_vec(),
            steps_run,
            funding: Some(funding),
            circuits_registered,
        })
    }

    /// Adopt existing modules and deploy the rest, linking libraries first
    pub async fn deploy(&self, admin: Address) -> Result<Sequencer> {
        let plan = &self.config.plan;
        let mut sequencer = Sequencer::new();
        let mut linker = Linker::new();
        let mut network_id = self.config.network_id.clone();

        for module in &plan.modules {
            if module.is_existing() {
                let network = match &network_id {
                    Some(id) => id.clone(),
                    None => {
                        let id = self.chain.network_id().await?;
                        network_id = Some(id.clone());
                        id
                    }
                };
                let address = self
                    .artifacts
                    .deployed_address(&module.name, &network)
                    .map_err(|source| PipelineError::Artifact {
                        module: module.name.clone(),
                        source,
                    })?;
                sequencer.adopt(&module.name, address)?;
                continue;
            }

            linker.link(&module.libraries, &module.name, &sequencer)?;
            let args = resolve_args(&module.constructor_args, &sequencer, admin, module.name.as_str())?;
            sequencer
                .deploy(self.chain, self.artifacts, &linker, module, args, module.gas_limit, admin)
                .await?;
        }

        Ok(sequencer)
    }

    async fn bootstrap(
        &self,
        sequencer: &Sequencer,
        admin: Address,
        accounts: &[Address],
        keys: &[CircuitKey],
    ) -> Result<(usize, FundingReport, usize)> {
        let plan = &self.config.plan;
        let runner = StepRunner::new(self.chain, sequencer, admin);
        let initializer = Initializer::new(plan.roles.clone(), self.config.genesis_root);
        let configurator = Configurator::new(plan, self.config.funding.clone());

        let phases: [(&str, Vec<Step>); 4] = [
            ("wiring", initializer.wiring()),
            ("token registration", configurator.token_registration_steps()?),
            ("universal agents", configurator.universal_agent_steps()),
            ("ownership", initializer.ownership()),
        ];

        let mut steps_run = 0;
        for (phase, steps) in &phases {
            info!("Phase: {} ({} steps)", phase, steps.len());
            steps_run += runner.run_all(steps).await?;
        }

        // pool records need the deployed addresses
        let pool_steps = configurator.pool_setup_steps(sequencer)?;
        info!("Phase: pool setup ({} steps)", pool_steps.len());
        steps_run += runner.run_all(&pool_steps).await?;

        let funding = configurator.fund_accounts(&runner, accounts).await;
        if !funding.is_complete() {
            if configurator.funding().strict {
                return Err(PipelineError::FundingIncomplete {
                    failed: funding.failures.len(),
                    total: funding.total(),
                });
            }
            warn!(
                "{} of {} accounts were not funded",
                funding.failures.len(),
                funding.total()
            );
        }

        let registered = VkRegistrar::new(plan.roles.block_verifier.clone())
            .register(&runner, keys)
            .await?;
        steps_run += registered;

        info!("Bootstrap complete: {} steps, {} circuits", steps_run, registered);
        Ok((steps_run, funding, registered))
    }
}
