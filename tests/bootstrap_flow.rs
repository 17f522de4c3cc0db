//! Full bootstrap runs against the mock ledger
//!
//! 1. Verification keys: one registration per circuit, disjoint arrays
//! 2. Deployment order: libraries before the exchange, exchange before its owner
//! 3. Wiring and ownership end state
//! 4. Funding: per-account isolation

use std::collections::HashSet;
use std::path::PathBuf;

use dexboot_chain::{ArtifactRegistry, Chain, ChainClient, ChainConfig};
use dexboot_core::{
    parse_bytes32, uint, Address, ModuleName, SystemPlan, Token, U256, EMPTY_MERKLE_ROOT, EXCHANGE_LIBRARIES,
};
use dexboot_pipeline::registrar::REGISTER_CIRCUIT;
use dexboot_pipeline::{BootstrapMode, Pipeline, PipelineConfig, PipelineReport};
use dexboot_verifier::{CircuitId, VkSource, VERIFIER_KEY_LEN};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn pipeline_config() -> PipelineConfig {
    let root = parse_bytes32(EMPTY_MERKLE_ROOT).unwrap();
    PipelineConfig::new(SystemPlan::standard().fresh(), root).with_vk_sources(vec![
        VkSource::new(CircuitId::new(0, 16, 0), fixture("all_16_vk.json")),
        VkSource::new(CircuitId::new(0, 64, 0), fixture("all_64_vk.json")),
    ])
}

fn mock_chain(accounts: usize) -> ChainClient {
    let mut config = ChainConfig::mock();
    config.mock_accounts = accounts;
    ChainClient::new(config)
}

async fn run(chain: &ChainClient, config: PipelineConfig) -> PipelineReport {
    let artifacts = ArtifactRegistry::synthetic(&config.plan);
    Pipeline::new(chain, &artifacts, config)
        .run(BootstrapMode::DeployAndBootstrap)
        .await
        .unwrap()
}

fn address_of(report: &PipelineReport, name: &str) -> Address {
    report
        .deployed
        .iter()
        .find(|i| i.name == ModuleName::new(name))
        .map(|i| i.address)
        .unwrap_or_else(|| panic!("{} not deployed", name))
}

// ============================================================================
// 1. Verification keys
// ============================================================================

#[tokio::test]
async fn test_each_circuit_registered_once_with_disjoint_keys() {
    let chain = mock_chain(2);
    let report = run(&chain, pipeline_config()).await;
    assert_eq!(report.circuits_registered, 2);

    let calls = chain.mock_calls_to(REGISTER_CIRCUIT);
    assert_eq!(calls.len(), 2);

    let sizes: Vec<Token> = calls.iter().map(|c| c.args[1].clone()).collect();
    assert_eq!(sizes, vec![uint(16), uint(64)]);

    let verifier = address_of(&report, "BlockVerifier");
    let small = chain.mock_circuit(verifier, (0, 16, 0)).unwrap();
    let large = chain.mock_circuit(verifier, (0, 64, 0)).unwrap();
    assert_eq!(small.len(), VERIFIER_KEY_LEN);
    assert_eq!(large.len(), VERIFIER_KEY_LEN);

    let small_set: HashSet<&U256> = small.iter().collect();
    assert!(large.iter().all(|w| !small_set.contains(w)), "keys share elements");
}

#[tokio::test]
async fn test_keys_registered_last() {
    let chain = mock_chain(2);
    run(&chain, pipeline_config()).await;

    let calls = chain.mock_calls();
    let first_registration = calls
        .iter()
        .position(|c| c.signature == REGISTER_CIRCUIT)
        .unwrap();
    assert_eq!(first_registration, calls.len() - 2);
}

// ============================================================================
// 2. Deployment order
// ============================================================================

#[tokio::test]
async fn test_deployment_follows_plan_order() {
    let chain = mock_chain(1);
    let report = run(&chain, pipeline_config()).await;

    let order: Vec<&str> = report.deployed.iter().map(|i| i.name.as_str()).collect();
    let position = |name: &str| order.iter().position(|n| *n == name).unwrap();

    for library in EXCHANGE_LIBRARIES {
        assert!(position(library) < position("ExchangeV3"));
    }
    assert!(position("ExchangeV3") < position("LoopringIOExchangeOwner"));

    let unique: HashSet<&str> = order.iter().copied().collect();
    assert_eq!(unique.len(), order.len(), "a module was deployed twice");
    assert!(report.deployed.iter().all(|i| i.tx_hash.is_some()));
}

// ============================================================================
// 3. Wiring and ownership
// ============================================================================

#[tokio::test]
async fn test_exchange_wired_and_handed_over() {
    let chain = mock_chain(1);
    let report = run(&chain, pipeline_config()).await;

    let exchange = address_of(&report, "ExchangeV3");
    let owner = address_of(&report, "LoopringIOExchangeOwner");
    assert_eq!(chain.mock_owner(exchange), Some(owner));
    assert!(chain.mock_submit_blocks_open(owner));

    let registered = chain.mock_registered_tokens(exchange);
    let mut expected = vec![Address::zero()];
    expected.extend(
        ["USDT", "INDA", "LoopringAmmPool", "LoopringAmmPoolCopy", "LoopringAmmPoolCopy2"]
            .iter()
            .map(|name| address_of(&report, name)),
    );
    assert_eq!(registered, expected);

    let registry = address_of(&report, "AgentRegistry");
    for pool in ["LoopringAmmPool", "LoopringAmmPoolCopy", "LoopringAmmPoolCopy2"] {
        assert!(chain.mock_is_universal_agent(registry, address_of(&report, pool)));
    }
    assert_eq!(chain.mock_calls_to(dexboot_pipeline::configurator::SETUP_POOL).len(), 3);
}

// ============================================================================
// 4. Funding
// ============================================================================

#[tokio::test]
async fn test_every_account_funded() {
    let chain = mock_chain(4);
    let accounts = chain.accounts().await.unwrap();
    let report = run(&chain, pipeline_config()).await;

    let funding = report.funding.as_ref().unwrap();
    assert!(funding.is_complete());
    assert_eq!(funding.funded, accounts);

    let exchange = address_of(&report, "ExchangeV3");
    // two tokens plus the native asset per account
    assert_eq!(chain.mock_deposits(exchange).len(), accounts.len() * 3);
}

#[tokio::test]
async fn test_funding_failure_confined_to_account() {
    let chain = mock_chain(3);
    let accounts = chain.accounts().await.unwrap();
    chain.mock_fail_calls(Some(accounts[1]), "approve(address,uint256)", "account frozen");

    let report = run(&chain, pipeline_config()).await;
    let funding = report.funding.as_ref().unwrap();

    assert_eq!(funding.funded, vec![accounts[0], accounts[2]]);
    assert_eq!(funding.failures.len(), 1);
    assert_eq!(funding.failures[0].account, accounts[1]);
    assert_eq!(funding.failures[0].step, "USDT.approve");
    assert!(funding.failures[0].error.is_submission_failure());

    // registration still follows the funding pass
    assert_eq!(report.circuits_registered, 2);
    let exchange = address_of(&report, "ExchangeV3");
    assert!(chain.mock_deposits(exchange).iter().all(|d| d.from != accounts[1]));
}
