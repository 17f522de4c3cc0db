//! Request and receipt types shared by the mock and live backends

use dexboot_core::{Address, Token, TxHash};

/// Per-transaction overrides. `None` leaves the choice to the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub from: Option<Address>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub value: Option<u128>,
}

impl TxOptions {
    pub fn sender(sender: Address) -> Self {
        Self { from: Some(sender), ..Default::default() }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = Some(value);
        self
    }

    pub fn value_or_zero(&self) -> u128 {
        self.value.unwrap_or(0)
    }
}

/// Contract creation
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Contract name, for logs and the mock ledger
    pub contract: String,
    /// Linked creation code
    pub bytecode: Vec<u8>,
    pub constructor_args: Vec<Token>,
    pub options: TxOptions,
}

/// Method invocation by canonical signature, e.g. `registerToken(address)`
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub to: Address,
    pub signature: String,
    pub args: Vec<Token>,
    pub options: TxOptions,
}

impl CallRequest {
    pub fn new(to: Address, signature: impl Into<String>, args: Vec<Token>) -> Self {
        Self {
            to,
            signature: signature.into(),
            args,
            options: TxOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }
}

/// Raw transaction
#[derive(Debug, Clone, Default)]
pub struct TxRequest {
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub options: TxOptions,
}

/// Mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Set for contract creations
    pub contract_address: Option<Address>,
}

impl Receipt {
    pub fn tx_hash_hex(&self) -> String {
        format!("{:#x}", self.tx_hash)
    }
}
