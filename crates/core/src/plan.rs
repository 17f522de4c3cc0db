//! Static description of the exchange system: which modules exist, how they
//! link, and which module plays which role during bootstrap.

use std::collections::HashSet;

use crate::{Arg, CoreError, ModuleDescriptor, ModuleName, ModuleOrigin, Result};

/// Gas budget for each large deployment. Stays under the 6.72M ceiling of
/// the development chain.
pub const DEPLOY_GAS: u64 = 6_700_000;

/// Root of the empty accounts Merkle tree
pub const EMPTY_MERKLE_ROOT: &str =
    "0x1efe4f31c90f89eb9b139426a95e5e87f6e0c9e8dab9ddf295e3f9d651f54698";

/// Width of the block verifier's key argument for circuits with one
/// public input. [`REGISTER_CIRCUIT`] spells the same width.
pub const VERIFIER_KEY_LEN: usize = 18;

/// Block verifier method taking a flattened key of [`VERIFIER_KEY_LEN`]
/// elements
pub const REGISTER_CIRCUIT: &str = "registerCircuit(uint8,uint16,uint8,uint256[18])";

/// Exchange libraries, in the order the exchange links them
pub const EXCHANGE_LIBRARIES: [&str; 7] = [
    "ExchangeBalances",
    "ExchangeAdmins",
    "ExchangeBlocks",
    "ExchangeTokens",
    "ExchangeGenesis",
    "ExchangeDeposits",
    "ExchangeWithdrawals",
];

/// A token in a pool: either the chain's native asset or a deployed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef {
    Native,
    Module(ModuleName),
}

impl TokenRef {
    pub fn module(name: impl Into<ModuleName>) -> Self {
        TokenRef::Module(name.into())
    }

    pub fn module_name(&self) -> Option<&ModuleName> {
        match self {
            TokenRef::Native => None,
            TokenRef::Module(name) => Some(name),
        }
    }
}

/// One pool to set up. The pool module doubles as the pool token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPlan {
    pub module: ModuleName,
    pub pool_name: String,
    pub account_id: u32,
    pub tokens: [TokenRef; 2],
    pub weights: [u128; 2],
    pub fee_bips: u8,
    pub token_symbol: String,
}

/// Modules with a fixed role in initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roles {
    pub exchange: ModuleName,
    pub deposit_contract: ModuleName,
    pub owner_contract: ModuleName,
    pub agent_registry: ModuleName,
    /// Parent protocol contract passed to `exchange.initialize`
    pub protocol: ModuleName,
    pub shared_config: ModuleName,
    pub block_verifier: ModuleName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemPlan {
    /// All modules in deployment order
    pub modules: Vec<ModuleDescriptor>,
    pub roles: Roles,
    /// Base ERC20 tokens, registered before any pool token
    pub tokens: Vec<ModuleName>,
    pub pools: Vec<PoolPlan>,
}

impl SystemPlan {
    /// The exchange system as laid out by the migration: libraries and
    /// peripheral contracts come from earlier migrations, the exchange, its
    /// deposit contract and its owner contract are deployed here.
    pub fn standard() -> Self {
        let mut modules: Vec<ModuleDescriptor> = EXCHANGE_LIBRARIES
            .iter()
            .map(|name| ModuleDescriptor::existing(*name))
            .collect();

        for name in [
            "LoopringV3",
            "AgentRegistry",
            "LoopringAmmSharedConfig",
            "USDT",
            "INDA",
            "LoopringAmmPool",
            "LoopringAmmPoolCopy",
            "LoopringAmmPoolCopy2",
            "BlockVerifier",
        ] {
            modules.push(ModuleDescriptor::existing(name));
        }

        modules.push(ModuleDescriptor::deploy("ExchangeV3", DEPLOY_GAS).with_libraries(EXCHANGE_LIBRARIES));
        modules.push(ModuleDescriptor::deploy("DefaultDepositContract", DEPLOY_GAS));
        modules.push(
            ModuleDescriptor::deploy("LoopringIOExchangeOwner", DEPLOY_GAS)
                .with_constructor_args(vec![Arg::module("ExchangeV3")]),
        );

        let pool = |module: &str, name: &str, account_id: u32, tokens: [TokenRef; 2], symbol: &str| PoolPlan {
            module: module.into(),
            pool_name: name.to_string(),
            account_id,
            tokens,
            weights: [10_000, 10_000],
            fee_bips: 30,
            token_symbol: symbol.to_string(),
        };

        Self {
            modules,
            roles: Roles {
                exchange: "ExchangeV3".into(),
                deposit_contract: "DefaultDepositContract".into(),
                owner_contract: "LoopringIOExchangeOwner".into(),
                agent_registry: "AgentRegistry".into(),
                protocol: "LoopringV3".into(),
                shared_config: "LoopringAmmSharedConfig".into(),
                block_verifier: "BlockVerifier".into(),
            },
            tokens: vec!["USDT".into(), "INDA".into()],
            pools: vec![
                pool(
                    "LoopringAmmPool",
                    "USDT-ETH-Pool-3",
                    1,
                    [TokenRef::module("USDT"), TokenRef::Native],
                    "LP-USDTETH",
                ),
                pool(
                    "LoopringAmmPoolCopy",
                    "INDA-ETH-Pool-3",
                    2,
                    [TokenRef::module("INDA"), TokenRef::Native],
                    "LP-INDAETH",
                ),
                pool(
                    "LoopringAmmPoolCopy2",
                    "INDA-USDT-Pool-3",
                    3,
                    [TokenRef::module("INDA"), TokenRef::module("USDT")],
                    "LP-INDAUSDT",
                ),
            ],
        }
    }

    /// Same plan for an empty chain: every pre-existing module is deployed
    /// by this run instead, in plan order.
    pub fn fresh(mut self) -> Self {
        for module in &mut self.modules {
            if module.origin == ModuleOrigin::Existing {
                module.origin = ModuleOrigin::Deploy;
                module.gas_limit = DEPLOY_GAS;
            }
        }
        self
    }

    pub fn module(&self, name: &ModuleName) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| &m.name == name)
    }

    /// Tokens to register on the exchange: base tokens, then pool tokens.
    pub fn registration_order(&self) -> Vec<ModuleName> {
        self.tokens
            .iter()
            .cloned()
            .chain(self.pools.iter().map(|p| p.module.clone()))
            .collect()
    }

    /// Structural checks: unique names, known roles and tokens, and every
    /// library or constructor reference declared before its dependent.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&ModuleName> = HashSet::new();
        for module in &self.modules {
            for lib in &module.libraries {
                if !seen.contains(lib) {
                    return Err(CoreError::InvalidPlan(format!(
                        "{} links {} which is not declared before it",
                        module.name, lib
                    )));
                }
            }
            for arg in &module.constructor_args {
                for referenced in arg.referenced_modules() {
                    if !seen.contains(referenced) {
                        return Err(CoreError::InvalidPlan(format!(
                            "{} constructor references {} which is not declared before it",
                            module.name, referenced
                        )));
                    }
                }
            }
            if !seen.insert(&module.name) {
                return Err(CoreError::InvalidPlan(format!("duplicate module {}", module.name)));
            }
        }

        let roles = [
            &self.roles.exchange,
            &self.roles.deposit_contract,
            &self.roles.owner_contract,
            &self.roles.agent_registry,
            &self.roles.protocol,
            &self.roles.shared_config,
            &self.roles.block_verifier,
        ];
        let referenced = roles
            .into_iter()
            .chain(self.tokens.iter())
            .chain(self.pools.iter().map(|p| &p.module))
            .chain(self.pools.iter().flat_map(|p| p.tokens.iter().filter_map(TokenRef::module_name)));
        for name in referenced {
            if !seen.contains(name) {
                return Err(CoreError::InvalidPlan(format!("unknown module {}", name)));
            }
        }
        Ok(())
    }
}
