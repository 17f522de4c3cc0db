//! Post-deployment wiring of the exchange, its deposit contract and its
//! owner contract

use dexboot_core::{bytes32, Arg, Roles, Token, H256};

use crate::steps::Step;

pub const EXCHANGE_INITIALIZE: &str = "initialize(address,address,bytes32)";
pub const SET_AGENT_REGISTRY: &str = "setAgentRegistry(address)";
pub const DEPOSIT_INITIALIZE: &str = "initialize(address)";
pub const SET_DEPOSIT_CONTRACT: &str = "setDepositContract(address)";
pub const TRANSFER_OWNERSHIP: &str = "transferOwnership(address)";
pub const CLAIM_OWNERSHIP: &str = "claimOwnership()";
pub const TRANSACT: &str = "transact(bytes)";
pub const OPEN_ACCESS_TO_SUBMIT_BLOCKS: &str = "openAccessToSubmitBlocks(bool)";

/// Fixed initialization sequence.
///
/// `wiring` must run before any token registration; `ownership` hands the
/// exchange to its owner contract and must run after every owner-gated
/// registration the admin still has to make.
#[derive(Debug, Clone)]
pub struct Initializer {
    roles: Roles,
    genesis_root: H256,
}

impl Initializer {
    pub fn new(roles: Roles, genesis_root: H256) -> Self {
        Self { roles, genesis_root }
    }

    pub fn wiring(&self) -> Vec<Step> {
        let r = &self.roles;
        vec![
            Step::call(
                "exchange.initialize",
                r.exchange.clone(),
                EXCHANGE_INITIALIZE,
                vec![
                    Arg::Module(r.protocol.clone()),
                    Arg::Admin,
                    Arg::Value(bytes32(self.genesis_root)),
                ],
            ),
            Step::call(
                "exchange.setAgentRegistry",
                r.exchange.clone(),
                SET_AGENT_REGISTRY,
                vec![Arg::Module(r.agent_registry.clone())],
            ),
            Step::call(
                "depositContract.initialize",
                r.deposit_contract.clone(),
                DEPOSIT_INITIALIZE,
                vec![Arg::Module(r.exchange.clone())],
            ),
            Step::call(
                "exchange.setDepositContract",
                r.exchange.clone(),
                SET_DEPOSIT_CONTRACT,
                vec![Arg::Module(r.deposit_contract.clone())],
            ),
        ]
    }

    pub fn ownership(&self) -> Vec<Step> {
        let r = &self.roles;
        vec![
            Step::call(
                "exchange.transferOwnership",
                r.exchange.clone(),
                TRANSFER_OWNERSHIP,
                vec![Arg::Module(r.owner_contract.clone())],
            ),
            Step::call(
                "ownerContract.transact(claimOwnership)",
                r.owner_contract.clone(),
                TRANSACT,
                vec![Arg::EncodedCall {
                    signature: CLAIM_OWNERSHIP.to_string(),
                    args: vec![],
                }],
            )
            .requires(r.exchange.clone()),
            Step::call(
                "ownerContract.openAccessToSubmitBlocks",
                r.owner_contract.clone(),
                OPEN_ACCESS_TO_SUBMIT_BLOCKS,
                vec![Arg::Value(Token::Bool(true))],
            ),
        ]
    }

    /// Both groups back to back
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = self.wiring();
        steps.extend(self.ownership());
        steps
    }
}
