//! Chain client with mock and live backends

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{TransactionRequest, U64};
use tracing::{debug, info, warn};

use dexboot_core::{Address, U256};

use crate::abi;
use crate::mock::{MockCall, MockDeposit, MockState, MockTransaction};
use crate::{CallRequest, Chain, ChainError, DeployRequest, Receipt, Result, TxOptions, TxRequest};

/// Chain mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// In-memory ledger, no node required
    Mock,
    /// JSON-RPC against a running node
    Live,
}

/// Chain client configuration
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub mode: ChainMode,
    /// Node endpoint (only used in Live mode)
    pub rpc_url: String,
    /// Per-block gas ceiling enforced by the mock ledger
    pub block_gas_limit: u64,
    /// Number of unlocked accounts the mock ledger exposes
    pub mock_accounts: usize,
    /// Network id reported by the mock ledger
    pub mock_network_id: String,
    /// Delay between receipt polls
    pub receipt_poll_interval_ms: u64,
    /// Receipt polls before a transaction counts as not mined
    pub receipt_poll_attempts: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            mode: ChainMode::Mock,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            block_gas_limit: 6_721_975,
            mock_accounts: 10,
            mock_network_id: "5777".to_string(),
            receipt_poll_interval_ms: 500,
            receipt_poll_attempts: 120,
        }
    }
}

impl ChainConfig {
    /// Create a mock configuration for development
    pub fn mock() -> Self {
        Self {
            mode: ChainMode::Mock,
            ..Default::default()
        }
    }

    /// Create a live configuration for a node at `rpc_url`
    pub fn live(rpc_url: impl Into<String>) -> Self {
        Self {
            mode: ChainMode::Live,
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Live configuration for a development node on the default port
    pub fn local() -> Self {
        Self::live("http://127.0.0.1:8545")
    }
}

/// Client for the target chain.
///
/// In mock mode every operation runs against an in-memory ledger that keeps
/// enough contract state to reject out-of-order calls.
pub struct ChainClient {
    config: ChainConfig,
    /// Node provider (only used in Live mode)
    provider: Option<Provider<Http>>,
    /// Mock ledger (only used in Mock mode)
    mock_state: Arc<RwLock<MockState>>,
}

impl ChainClient {
    pub fn new(config: ChainConfig) -> Self {
        let provider = match config.mode {
            ChainMode::Live => match Provider::<Http>::try_from(config.rpc_url.as_str()) {
                Ok(provider) => Some(provider.interval(Duration::from_millis(config.receipt_poll_interval_ms))),
                Err(e) => {
                    warn!("Invalid RPC url {}: {}", config.rpc_url, e);
                    None
                }
            },
            ChainMode::Mock => None,
        };
        let mock_state = Arc::new(RwLock::new(MockState::new(config.mock_accounts)));

        Self { config, provider, mock_state }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Check if running in mock mode
    pub fn is_mock(&self) -> bool {
        self.config.mode == ChainMode::Mock
    }

    fn provider(&self) -> Result<&Provider<Http>> {
        self.provider
            .as_ref()
            .ok_or_else(|| ChainError::Rpc(format!("no provider for {}", self.config.rpc_url)))
    }

    /// Explicit sender, or the node's first account
    async fn sender(&self, options: &TxOptions) -> Result<Address> {
        if let Some(from) = options.from {
            return Ok(from);
        }
        self.accounts().await?.first().copied().ok_or(ChainError::NoAccounts)
    }

    /// Submit and poll for the receipt. A reverted receipt is an error.
    async fn submit_live(&self, tx: TxRequest) -> Result<Receipt> {
        let provider = self.provider()?;
        let from = self.sender(&tx.options).await?;

        let mut request = TransactionRequest::new().from(from).data(tx.data);
        if let Some(to) = tx.to {
            request = request.to(to);
        }
        if let Some(gas) = tx.options.gas {
            request = request.gas(gas);
        }
        if let Some(gas_price) = tx.options.gas_price {
            request = request.gas_price(gas_price);
        }
        if let Some(value) = tx.options.value {
            request = request.value(value);
        }

        let hash = provider.send_transaction(request, None).await?.tx_hash();
        debug!("Submitted {:#x}", hash);

        let interval = Duration::from_millis(self.config.receipt_poll_interval_ms);
        for _ in 0..self.config.receipt_poll_attempts {
            if let Some(receipt) = provider.get_transaction_receipt(hash).await? {
                if receipt.status == Some(U64::zero()) {
                    return Err(ChainError::Reverted(format!("{:#x} (status 0x0)", hash)));
                }
                let block_number = receipt.block_number.ok_or_else(|| {
                    ChainError::InvalidResponse(format!("{:#x}: receipt has no block number", hash))
                })?;
                return Ok(Receipt {
                    tx_hash: hash,
                    block_number: block_number.as_u64(),
                    gas_used: receipt.gas_used.unwrap_or_else(U256::zero).low_u64(),
                    contract_address: receipt.contract_address,
                });
            }
            tokio::time::sleep(interval).await;
        }

        Err(ChainError::NotMined(format!("{:#x}", hash), self.config.receipt_poll_attempts))
    }

    // ==================== Mock inspection ====================

    /// Make every matching call revert with `reason`. `from = None` matches
    /// any sender.
    pub fn mock_fail_calls(&self, from: Option<Address>, signature: &str, reason: &str) {
        let mut state = self.mock_state.write().expect("chain lock poisoned");
        state.fail_calls(from, signature, reason);
    }

    /// Successful calls so far, in order
    pub fn mock_calls(&self) -> Vec<MockCall> {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.calls().to_vec()
    }

    /// Successful calls with the given signature
    pub fn mock_calls_to(&self, signature: &str) -> Vec<MockCall> {
        self.mock_calls()
            .into_iter()
            .filter(|c| c.signature == signature)
            .collect()
    }

    /// Plain transactions (no method call) so far, in order
    pub fn mock_transactions(&self) -> Vec<MockTransaction> {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.transactions().to_vec()
    }

    pub fn mock_owner(&self, contract: Address) -> Option<Address> {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.owner_of(contract)
    }

    pub fn mock_registered_tokens(&self, exchange: Address) -> Vec<Address> {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.registered_tokens(exchange)
    }

    pub fn mock_deposits(&self, exchange: Address) -> Vec<MockDeposit> {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.deposits(exchange)
    }

    pub fn mock_circuit(&self, verifier: Address, key: (u8, u16, u8)) -> Option<Vec<U256>> {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.circuit(verifier, key)
    }

    pub fn mock_is_universal_agent(&self, registry: Address, agent: Address) -> bool {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.is_universal_agent(registry, agent)
    }

    pub fn mock_submit_blocks_open(&self, owner_contract: Address) -> bool {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.submit_blocks_open(owner_contract)
    }

    pub fn mock_balance(&self, account: Address) -> u128 {
        let state = self.mock_state.read().expect("chain lock poisoned");
        state.balance(account)
    }
}

#[async_trait]
impl Chain for ChainClient {
    async fn accounts(&self) -> Result<Vec<Address>> {
        if self.is_mock() {
            let state = self.mock_state.read().expect("chain lock poisoned");
            return Ok(state.accounts.clone());
        }
        Ok(self.provider()?.get_accounts().await?)
    }

    async fn block_number(&self) -> Result<u64> {
        if self.is_mock() {
            let state = self.mock_state.read().expect("chain lock poisoned");
            return Ok(state.block_number());
        }
        Ok(self.provider()?.get_block_number().await?.as_u64())
    }

    async fn network_id(&self) -> Result<String> {
        if self.is_mock() {
            return Ok(self.config.mock_network_id.clone());
        }
        Ok(self.provider()?.get_net_version().await?)
    }

    async fn deploy(&self, request: DeployRequest) -> Result<Receipt> {
        if self.is_mock() {
            let from = self.sender(&request.options).await?;
            let mut state = self.mock_state.write().expect("chain lock poisoned");
            return state.deploy(
                from,
                &request.contract,
                request.bytecode.len(),
                request.constructor_args,
                request.options.gas,
                self.config.block_gas_limit,
            );
        }

        info!("Deploying {} ({} bytes)", request.contract, request.bytecode.len());
        let mut data = request.bytecode;
        data.extend(abi::encode(&request.constructor_args));
        let receipt = self
            .submit_live(TxRequest { to: None, data, options: request.options })
            .await?;
        if receipt.contract_address.is_none() {
            return Err(ChainError::InvalidResponse(format!(
                "{}: creation receipt has no contract address",
                request.contract
            )));
        }
        Ok(receipt)
    }

    async fn call(&self, request: CallRequest) -> Result<Receipt> {
        if self.is_mock() {
            let from = self.sender(&request.options).await?;
            let mut state = self.mock_state.write().expect("chain lock poisoned");
            let receipt = state.call(
                from,
                request.to,
                &request.signature,
                &request.args,
                request.options.value_or_zero(),
                request.options.gas,
                self.config.block_gas_limit,
            )?;
            info!("[MOCK] {} -> {}.{}", from, request.to, request.signature);
            return Ok(receipt);
        }

        debug!("Calling {} on {}", request.signature, request.to);
        let data = abi::encode_call(&request.signature, &request.args);
        self.submit_live(TxRequest { to: Some(request.to), data, options: request.options })
            .await
    }

    async fn send_transaction(&self, request: TxRequest) -> Result<Receipt> {
        if self.is_mock() {
            let from = self.sender(&request.options).await?;
            let mut state = self.mock_state.write().expect("chain lock poisoned");
            let receipt = state.transfer(from, request.to, &request.options, self.config.block_gas_limit)?;
            info!("[MOCK] Transaction from {} mined in block {}", from, receipt.block_number);
            return Ok(receipt);
        }
        self.submit_live(request).await
    }
}
