//! dexboot CLI
//!
//! Deploys and bootstraps the exchange system against a mock ledger or a
//! development node.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use dexboot_chain::{ArtifactRegistry, Chain, ChainClient, ChainConfig, ChainMode, TxOptions, TxRequest};
use dexboot_core::SystemPlan;
use dexboot_pipeline::{BootstrapMode, FundingParams, Pipeline, PipelineConfig, PipelineReport, TEST_ENV_VAR};
use dexboot_settings::{default_settings_path, FundingSettings, Settings};
use dexboot_verifier::{flatten, VerificationKey};

/// dexboot - exchange deployment and bootstrap
#[derive(Parser)]
#[command(name = "dexboot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, default_value_os_t = default_settings_path())]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the exchange system, then bootstrap it when enabled
    Deploy {
        /// deploy-only or bootstrap; overrides TEST_ENV
        #[arg(short, long)]
        mode: Option<BootstrapMode>,

        /// Execution environment; `docker` enables bootstrap
        #[arg(long, env = TEST_ENV_VAR, hide_env_values = true)]
        test_env: Option<String>,

        /// Deploy every module, including those from earlier migrations
        #[arg(long)]
        fresh: bool,

        /// Use this node instead of the configured chain
        #[arg(long)]
        rpc_url: Option<String>,
    },

    /// Send a zero-value transaction from the first account to itself
    SendTx {
        /// Use this node instead of the configured chain
        #[arg(long)]
        rpc_url: Option<String>,
    },

    /// Print the flattened form of a verification key document
    FlattenVk {
        /// Key document (JSON)
        path: PathBuf,
    },

    /// Write the default settings file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dexboot_logging::init_logging(cli.verbose);

    match cli.command {
        Commands::Deploy {
            mode,
            test_env,
            fresh,
            rpc_url,
        } => {
            let mode = mode.unwrap_or_else(|| BootstrapMode::from_env_flag(test_env.as_deref()));
            deploy(&cli.config, mode, fresh, rpc_url).await?;
        }
        Commands::SendTx { rpc_url } => {
            let settings = load_settings(&cli.config)?;
            let chain = ChainClient::new(chain_config(&settings, rpc_url));
            match send_tx(&chain).await {
                Ok(block) => println!("blockNumber: {}", block),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::FlattenVk { path } => {
            flatten_vk(&path)?;
        }
        Commands::InitConfig { force } => {
            init_config(&cli.config, force)?;
        }
    }

    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load_from(path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn chain_config(settings: &Settings, rpc_url: Option<String>) -> ChainConfig {
    match rpc_url {
        Some(url) => ChainConfig {
            mode: ChainMode::Live,
            rpc_url: url,
            ..settings.chain.to_chain_config()
        },
        None => settings.chain.to_chain_config(),
    }
}

fn funding_params(funding: &FundingSettings) -> FundingParams {
    FundingParams {
        allowance: funding.allowance,
        token_deposit: funding.token_deposit,
        native_deposit: funding.native_deposit,
        gas: funding.gas,
        strict: funding.strict,
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Settings::default()
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

async fn deploy(config_path: &Path, mode: BootstrapMode, fresh: bool, rpc_url: Option<String>) -> Result<()> {
    let settings = load_settings(config_path)?;
    let chain = ChainClient::new(chain_config(&settings, rpc_url));

    // an empty in-memory ledger has no earlier migrations to adopt
    let fresh = fresh || settings.deploy.fresh || chain.is_mock();
    let plan = if fresh { SystemPlan::standard().fresh() } else { SystemPlan::standard() };

    let artifacts = if chain.is_mock() {
        ArtifactRegistry::synthetic(&plan)
    } else {
        let dir = &settings.deploy.artifacts_dir;
        ArtifactRegistry::load_dir(dir).with_context(|| format!("Failed to load artifacts from {}", dir.display()))?
    };

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let config = PipelineConfig {
        plan,
        genesis_root: settings.deploy.genesis_root()?,
        funding: funding_params(&settings.funding),
        vk_sources: settings.vk_sources(base),
        admin: settings.deploy.admin,
        network_id: settings.deploy.network_id.clone(),
    };

    info!(
        "Deploying ({}, {} chain, {} plan)",
        mode,
        if chain.is_mock() { "mock" } else { "live" },
        if fresh { "fresh" } else { "incremental" }
    );
    let report = Pipeline::new(&chain, &artifacts, config)
        .run(mode)
        .await
        .context("Pipeline failed")?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("dexboot {} run", report.mode);
    println!("==================");
    println!("Admin: {:?}", report.admin);
    for instance in &report.deployed {
        let origin = if instance.tx_hash.is_some() { "deployed" } else { "existing" };
        println!("  {:<28} {:?} ({})", instance.name.as_str(), instance.address, origin);
    }
    if report.mode.bootstraps() {
        println!("Steps run: {}", report.steps_run);
        if let Some(funding) = &report.funding {
            println!("Accounts funded: {}/{}", funding.funded.len(), funding.total());
            for failure in &funding.failures {
                println!("  {:?} stopped at {}: {}", failure.account, failure.step, failure.error);
            }
        }
        println!("Circuits registered: {}", report.circuits_registered);
    }
}

async fn send_tx(chain: &dyn Chain) -> Result<u64> {
    let accounts = chain.accounts().await.context("Failed to list accounts")?;
    let from = *accounts.first().context("Node exposes no accounts")?;

    let receipt = chain
        .send_transaction(TxRequest {
            to: Some(from),
            data: Vec::new(),
            options: TxOptions::sender(from)
                .with_value(0)
                .with_gas(100_000)
                .with_gas_price(0),
        })
        .await
        .context("Transaction failed")?;
    info!("Transaction {} mined in block {}", receipt.tx_hash_hex(), receipt.block_number);

    chain.block_number().await.context("Failed to read block number")
}

fn flatten_vk(path: &Path) -> Result<()> {
    let vk = VerificationKey::from_file(path)?;
    let key = flatten(&vk);
    info!("{} elements, {} public inputs", key.len(), vk.public_inputs());
    let decimal: Vec<String> = key.as_slice().iter().map(|element| element.to_string()).collect();
    println!("{}", serde_json::to_string_pretty(&decimal)?);
    Ok(())
}
