//! In-memory ledger for mock mode.
//!
//! Emulates the slice of contract behavior the bootstrap relies on, so that a
//! mis-ordered pipeline fails in mock mode the same way it would on a node:
//! owner-gated admin calls, one-time initializers, two-step ownership
//! transfer, token registration, ERC20 allowances and deposits, and the
//! verifier's fixed key width.

use std::collections::{HashMap, HashSet};

use tracing::info;

use dexboot_core::{Address, Token, TokenExt, TxHash, U256, REGISTER_CIRCUIT, VERIFIER_KEY_LEN};
use ethers::utils::{get_contract_address, keccak256};

use crate::abi::selector;
use crate::{ChainError, Receipt, Result, TxOptions};

/// Default gas for transactions that do not set one
pub(crate) const DEFAULT_TX_GAS: u64 = 6_721_975;

/// Intrinsic cost of a plain transaction
pub(crate) const BASE_TX_GAS: u64 = 21_000;

const CREATE_GAS: u64 = 32_000;
const CODE_BYTE_GAS: u64 = 200;

/// Native balance of each mock account: 1000 ether
const ACCOUNT_BALANCE: u128 = 1_000 * 10u128.pow(18);

/// Zero-argument methods reachable through `transact(bytes)`
const FORWARDABLE: &[&str] = &["claimOwnership()", "acceptOwnership()"];

/// A successful contract call, recorded in submission order
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub from: Address,
    pub to: Address,
    /// Contract name at `to`
    pub contract: String,
    pub signature: String,
    pub args: Vec<Token>,
    pub value: u128,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    from: Option<Address>,
    signature: String,
    reason: String,
}

impl InjectedFailure {
    fn matches(&self, from: Address, signature: &str) -> bool {
        self.signature == signature && self.from.map_or(true, |f| f == from)
    }
}

/// A plain transaction with no method call, recorded in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTransaction {
    pub from: Address,
    pub to: Option<Address>,
    pub value: u128,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
}

/// Deposit accepted by an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDeposit {
    pub from: Address,
    pub to: Address,
    pub token: Address,
    pub amount: u128,
}

/// State of one emulated contract
#[derive(Debug, Clone, Default)]
struct MockContract {
    name: String,
    owner: Address,
    pending_owner: Option<Address>,
    constructor_args: Vec<Token>,
    initialized: bool,
    /// Address-valued settings: `protocol`, `agentRegistry`, `depositContract`,
    /// `exchange`
    links: HashMap<&'static str, Address>,
    registered_tokens: Vec<Address>,
    universal_agents: HashSet<Address>,
    /// (owner, spender) -> amount
    allowances: HashMap<(Address, Address), u128>,
    pool: Option<Token>,
    circuits: HashMap<(u8, u16, u8), Vec<U256>>,
    submit_blocks_open: bool,
    deposits: Vec<MockDeposit>,
}

impl MockContract {
    fn only_owner(&self, from: Address) -> std::result::Result<(), String> {
        if from != self.owner {
            return Err("UNAUTHORIZED".to_string());
        }
        Ok(())
    }

    fn only_initialized(&self) -> std::result::Result<(), String> {
        if !self.initialized {
            return Err("NOT_INITIALIZED".to_string());
        }
        Ok(())
    }

    /// Calls that touch only this contract's own state
    fn apply(&mut self, from: Address, signature: &str, args: &[Token]) -> std::result::Result<(), String> {
        match signature {
            // exchange
            "initialize(address,address,bytes32)" => {
                if self.initialized {
                    return Err("INITIALIZED".to_string());
                }
                self.links.insert("protocol", arg_address(args, 0)?);
                self.owner = arg_address(args, 1)?;
                // token id 0 is the native asset
                self.registered_tokens = vec![Address::zero()];
                self.initialized = true;
            }
            // deposit contract
            "initialize(address)" => {
                if self.initialized {
                    return Err("INITIALIZED".to_string());
                }
                self.links.insert("exchange", arg_address(args, 0)?);
                self.initialized = true;
            }
            "setAgentRegistry(address)" => {
                self.only_owner(from)?;
                self.only_initialized()?;
                self.links.insert("agentRegistry", arg_address(args, 0)?);
            }
            "setDepositContract(address)" => {
                self.only_owner(from)?;
                self.only_initialized()?;
                self.links.insert("depositContract", arg_address(args, 0)?);
            }
            "registerToken(address)" => {
                self.only_owner(from)?;
                self.only_initialized()?;
                let token = arg_address(args, 0)?;
                if self.registered_tokens.contains(&token) {
                    return Err("TOKEN_ALREADY_EXIST".to_string());
                }
                self.registered_tokens.push(token);
            }
            "transferOwnership(address)" => {
                self.only_owner(from)?;
                let new_owner = arg_address(args, 0)?;
                if new_owner.is_zero() || new_owner == self.owner {
                    return Err("INVALID_ADDRESS".to_string());
                }
                self.pending_owner = Some(new_owner);
            }
            "claimOwnership()" | "acceptOwnership()" => {
                if self.pending_owner != Some(from) {
                    return Err("UNAUTHORIZED".to_string());
                }
                self.owner = from;
                self.pending_owner = None;
            }
            "openAccessToSubmitBlocks(bool)" => {
                self.only_owner(from)?;
                self.submit_blocks_open = arg_bool(args, 0)?;
            }
            "registerUniversalAgent(address,bool)" => {
                self.only_owner(from)?;
                let agent = arg_address(args, 0)?;
                if arg_bool(args, 1)? {
                    self.universal_agents.insert(agent);
                } else {
                    self.universal_agents.remove(&agent);
                }
            }
            "setupPool((address,address,string,uint32,address[],uint96[],uint8,string))" => {
                if self.pool.is_some() {
                    return Err("ALREADY_INITIALIZED".to_string());
                }
                let config = args.first().ok_or("missing pool config")?;
                self.pool = Some(config.clone());
            }
            REGISTER_CIRCUIT => {
                self.only_owner(from)?;
                let key = (
                    arg_u128(args, 0)? as u8,
                    arg_u128(args, 1)? as u16,
                    arg_u128(args, 2)? as u8,
                );
                let vk = args
                    .get(3)
                    .and_then(Token::as_list)
                    .ok_or("missing verification key")?;
                if vk.len() != VERIFIER_KEY_LEN {
                    return Err(format!(
                        "INVALID_VK_LENGTH: expected {}, got {}",
                        VERIFIER_KEY_LEN,
                        vk.len()
                    ));
                }
                if self.circuits.contains_key(&key) {
                    return Err("ALREADY_REGISTERED".to_string());
                }
                let words = vk.iter().filter_map(Token::as_uint).collect();
                self.circuits.insert(key, words);
            }
            // ERC20
            "approve(address,uint256)" => {
                let spender = arg_address(args, 0)?;
                self.allowances.insert((from, spender), arg_u128(args, 1)?);
            }
            other => return Err(format!("unknown method {} on {}", other, self.name)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) accounts: Vec<Address>,
    balances: HashMap<Address, u128>,
    contracts: HashMap<Address, MockContract>,
    block_number: u64,
    nonce: u64,
    tx_counter: u64,
    failures: Vec<InjectedFailure>,
    calls: Vec<MockCall>,
    transactions: Vec<MockTransaction>,
}

impl MockState {
    pub(crate) fn new(account_count: usize) -> Self {
        let accounts: Vec<Address> = (0..account_count)
            .map(|i| derive_address(format!("dexboot-mock-account-{}", i).as_bytes()))
            .collect();
        let balances = accounts.iter().map(|a| (*a, ACCOUNT_BALANCE)).collect();
        Self {
            accounts,
            balances,
            ..Default::default()
        }
    }

    pub(crate) fn block_number(&self) -> u64 {
        self.block_number
    }

    pub(crate) fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    pub(crate) fn transactions(&self) -> &[MockTransaction] {
        &self.transactions
    }

    pub(crate) fn fail_calls(&mut self, from: Option<Address>, signature: &str, reason: &str) {
        self.failures.push(InjectedFailure {
            from,
            signature: signature.to_string(),
            reason: reason.to_string(),
        });
    }

    pub(crate) fn owner_of(&self, contract: Address) -> Option<Address> {
        self.contracts.get(&contract).map(|c| c.owner)
    }

    pub(crate) fn registered_tokens(&self, exchange: Address) -> Vec<Address> {
        self.contracts
            .get(&exchange)
            .map(|c| c.registered_tokens.clone())
            .unwrap_or_default()
    }

    pub(crate) fn deposits(&self, exchange: Address) -> Vec<MockDeposit> {
        self.contracts
            .get(&exchange)
            .map(|c| c.deposits.clone())
            .unwrap_or_default()
    }

    pub(crate) fn circuit(&self, verifier: Address, key: (u8, u16, u8)) -> Option<Vec<U256>> {
        self.contracts.get(&verifier)?.circuits.get(&key).cloned()
    }

    pub(crate) fn is_universal_agent(&self, registry: Address, agent: Address) -> bool {
        self.contracts
            .get(&registry)
            .map(|c| c.universal_agents.contains(&agent))
            .unwrap_or(false)
    }

    pub(crate) fn submit_blocks_open(&self, contract: Address) -> bool {
        self.contracts
            .get(&contract)
            .map(|c| c.submit_blocks_open)
            .unwrap_or(false)
    }

    pub(crate) fn balance(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn next_receipt(&mut self, gas_used: u64, contract_address: Option<Address>) -> Receipt {
        self.tx_counter += 1;
        self.block_number += 1;
        let tx_hash = TxHash::from(keccak256(format!("dexboot-mock-tx-{}", self.tx_counter)));
        Receipt {
            tx_hash,
            block_number: self.block_number,
            gas_used,
            contract_address,
        }
    }

    fn check_gas(gas: u64, required: u64, block_limit: u64) -> Result<()> {
        if gas > block_limit {
            return Err(ChainError::ExceedsBlockGasLimit { limit: gas, block_limit });
        }
        if gas < required {
            return Err(ChainError::OutOfGas { limit: gas, required });
        }
        Ok(())
    }

    pub(crate) fn deploy(
        &mut self,
        from: Address,
        name: &str,
        code_len: usize,
        constructor_args: Vec<Token>,
        gas: Option<u64>,
        block_limit: u64,
    ) -> Result<Receipt> {
        let gas = gas.unwrap_or(DEFAULT_TX_GAS.min(block_limit));
        let required = BASE_TX_GAS + CREATE_GAS + CODE_BYTE_GAS * code_len as u64;
        Self::check_gas(gas, required, block_limit)?;

        let address = get_contract_address(from, self.nonce);
        self.nonce += 1;

        self.contracts.insert(
            address,
            MockContract {
                name: name.to_string(),
                owner: from,
                constructor_args,
                ..Default::default()
            },
        );
        info!("[MOCK] Deployed {} at {:?}", name, address);
        Ok(self.next_receipt(required, Some(address)))
    }

    /// Plain value transfer or call with raw data
    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Option<Address>,
        options: &TxOptions,
        block_limit: u64,
    ) -> Result<Receipt> {
        let value = options.value_or_zero();
        Self::check_gas(options.gas.unwrap_or(BASE_TX_GAS), BASE_TX_GAS, block_limit)?;
        self.debit(from, value).map_err(ChainError::Reverted)?;
        if let Some(to) = to {
            *self.balances.entry(to).or_insert(0) += value;
        }
        self.transactions.push(MockTransaction {
            from,
            to,
            value,
            gas: options.gas,
            gas_price: options.gas_price,
        });
        Ok(self.next_receipt(BASE_TX_GAS, None))
    }

    pub(crate) fn call(
        &mut self,
        from: Address,
        to: Address,
        signature: &str,
        args: &[Token],
        value: u128,
        gas: Option<u64>,
        block_limit: u64,
    ) -> Result<Receipt> {
        let gas = gas.unwrap_or(DEFAULT_TX_GAS.min(block_limit));
        Self::check_gas(gas, BASE_TX_GAS, block_limit)?;
        if !self.contracts.contains_key(&to) {
            return Err(ChainError::UnknownContract(to));
        }
        if self.balance(from) < value {
            return Err(ChainError::Reverted("insufficient funds".to_string()));
        }

        self.execute(from, to, signature, args, value)
            .map_err(ChainError::Reverted)?;
        self.debit(from, value).map_err(ChainError::Reverted)?;
        Ok(self.next_receipt(BASE_TX_GAS, None))
    }

    fn debit(&mut self, from: Address, value: u128) -> std::result::Result<(), String> {
        if value == 0 {
            return Ok(());
        }
        let balance = self.balances.entry(from).or_insert(0);
        if *balance < value {
            return Err("insufficient funds".to_string());
        }
        *balance -= value;
        Ok(())
    }

    fn execute(
        &mut self,
        from: Address,
        to: Address,
        signature: &str,
        args: &[Token],
        value: u128,
    ) -> std::result::Result<(), String> {
        if let Some(failure) = self.failures.iter().find(|f| f.matches(from, signature)) {
            return Err(failure.reason.clone());
        }

        match signature {
            "transact(bytes)" => self.forward(from, to, args)?,
            "deposit(address,address,address,uint96,bytes)" => self.deposit(from, to, args, value)?,
            "setDepositContract(address)" => {
                let deposit_contract = arg_address(args, 0)?;
                let ready = self
                    .contracts
                    .get(&deposit_contract)
                    .map(|c| c.initialized && c.links.get("exchange") == Some(&to))
                    .unwrap_or(false);
                if !ready {
                    return Err("DEPOSIT_CONTRACT_NOT_INITIALIZED".to_string());
                }
                self.contract_mut(to)?.apply(from, signature, args)?;
            }
            "setupPool((address,address,string,uint32,address[],uint96[],uint8,string))" => {
                self.check_pool_config(to, args)?;
                self.contract_mut(to)?.apply(from, signature, args)?;
            }
            _ => self.contract_mut(to)?.apply(from, signature, args)?,
        }

        let contract = self
            .contracts
            .get(&to)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        self.calls.push(MockCall {
            from,
            to,
            contract,
            signature: signature.to_string(),
            args: args.to_vec(),
            value,
        });
        Ok(())
    }

    fn contract_mut(&mut self, address: Address) -> std::result::Result<&mut MockContract, String> {
        self.contracts
            .get_mut(&address)
            .ok_or_else(|| format!("no contract at {}", address))
    }

    /// `transact(bytes)` on an owner contract: forward to the contract it
    /// manages, with the owner contract as sender
    fn forward(&mut self, from: Address, owner_contract: Address, args: &[Token]) -> std::result::Result<(), String> {
        let (owner, target) = {
            let contract = self
                .contracts
                .get(&owner_contract)
                .ok_or_else(|| format!("no contract at {}", owner_contract))?;
            let target = contract
                .constructor_args
                .first()
                .and_then(Token::as_address)
                .ok_or("owner contract has no target")?;
            (contract.owner, target)
        };
        if from != owner {
            return Err("UNAUTHORIZED".to_string());
        }

        let data = args.first().and_then(Token::as_bytes).ok_or("missing call data")?;
        if data.len() != 4 {
            return Err("unsupported forwarded call".to_string());
        }
        let signature = FORWARDABLE
            .iter()
            .find(|sig| selector(sig)[..] == data[..])
            .ok_or("unsupported forwarded call")?;
        self.execute(owner_contract, target, signature, &[], 0)
    }

    fn check_pool_config(&self, pool: Address, args: &[Token]) -> std::result::Result<(), String> {
        let fields = args
            .first()
            .and_then(Token::as_list)
            .filter(|f| f.len() == 8)
            .ok_or("INVALID_DATA")?;
        let exchange = fields[1].as_address().ok_or("INVALID_DATA")?;
        let tokens = fields[4].as_list().ok_or("INVALID_DATA")?;
        let weights = fields[5].as_list().ok_or("INVALID_DATA")?;
        if tokens.len() != 2 || weights.len() != tokens.len() {
            return Err("INVALID_DATA".to_string());
        }
        if weights.iter().any(|w| w.as_u128().unwrap_or(0) == 0) {
            return Err("INVALID_DATA".to_string());
        }
        let registered = self
            .contracts
            .get(&exchange)
            .map(|c| c.registered_tokens.contains(&pool))
            .unwrap_or(false);
        if !registered {
            return Err("POOL_TOKEN_NOT_REGISTERED".to_string());
        }
        Ok(())
    }

    fn deposit(&mut self, sender: Address, exchange: Address, args: &[Token], value: u128) -> std::result::Result<(), String> {
        let from = arg_address(args, 0)?;
        let to = arg_address(args, 1)?;
        let token = arg_address(args, 2)?;
        let amount = arg_u128(args, 3)?;

        let deposit_contract = {
            let contract = self
                .contracts
                .get(&exchange)
                .ok_or_else(|| format!("no contract at {}", exchange))?;
            contract.only_initialized()?;
            if !contract.registered_tokens.contains(&token) {
                return Err("TOKEN_NOT_FOUND".to_string());
            }
            *contract
                .links
                .get("depositContract")
                .ok_or("DEPOSIT_CONTRACT_NOT_SET")?
        };
        if sender != from {
            return Err("UNAUTHORIZED".to_string());
        }

        if token.is_zero() {
            if value != amount {
                return Err("INVALID_ETH_DEPOSIT".to_string());
            }
        } else {
            if value != 0 {
                return Err("INVALID_TOKEN_DEPOSIT".to_string());
            }
            let erc20 = self
                .contracts
                .get_mut(&token)
                .ok_or_else(|| format!("no contract at {}", token))?;
            let allowance = erc20.allowances.entry((from, deposit_contract)).or_insert(0);
            if *allowance < amount {
                return Err("TRANSFER_FAILURE".to_string());
            }
            *allowance -= amount;
        }

        self.contract_mut(exchange)?.deposits.push(MockDeposit { from, to, token, amount });
        Ok(())
    }
}

/// Last 20 bytes of keccak256(seed)
pub(crate) fn derive_address(seed: &[u8]) -> Address {
    Address::from_slice(&keccak256(seed)[12..])
}

fn arg_address(args: &[Token], index: usize) -> std::result::Result<Address, String> {
    args.get(index)
        .and_then(Token::as_address)
        .ok_or_else(|| format!("argument {} is not an address", index))
}

fn arg_bool(args: &[Token], index: usize) -> std::result::Result<bool, String> {
    args.get(index)
        .and_then(Token::as_bool)
        .ok_or_else(|| format!("argument {} is not a bool", index))
}

fn arg_u128(args: &[Token], index: usize) -> std::result::Result<u128, String> {
    args.get(index)
        .and_then(Token::as_u128)
        .ok_or_else(|| format!("argument {} is not an integer", index))
}
