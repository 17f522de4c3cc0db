//! Named contract calls and the runner that executes them in order

use tracing::info;

use dexboot_chain::{abi, CallRequest, Chain, Receipt, TxOptions};
use dexboot_core::{Address, Arg, ModuleName, Token};

use crate::sequencer::Sequencer;
use crate::{PipelineError, Result};

/// A state-changing call on a deployed module
#[derive(Debug, Clone, PartialEq)]
pub struct CallAction {
    pub target: ModuleName,
    pub signature: String,
    pub args: Vec<Arg>,
    /// `Arg::Admin` or `Arg::Account`
    pub sender: Arg,
    pub gas: Option<u64>,
    pub value: Option<u128>,
}

/// One named step. `depends_on` lists every module that must be deployed
/// before the step may run.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub depends_on: Vec<ModuleName>,
    pub action: CallAction,
}

impl Step {
    /// Admin call on `target`. Dependencies are the target plus every module
    /// referenced by the arguments.
    pub fn call(
        name: impl Into<String>,
        target: impl Into<ModuleName>,
        signature: impl Into<String>,
        args: Vec<Arg>,
    ) -> Self {
        let target = target.into();
        let mut depends_on = vec![target.clone()];
        for referenced in args.iter().flat_map(Arg::referenced_modules) {
            if !depends_on.contains(referenced) {
                depends_on.push(referenced.clone());
            }
        }

        Self {
            name: name.into(),
            depends_on,
            action: CallAction {
                target,
                signature: signature.into(),
                args,
                sender: Arg::Admin,
                gas: None,
                value: None,
            },
        }
    }

    pub fn from_account(mut self, account: Address) -> Self {
        self.action.sender = Arg::Account(account);
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.action.gas = Some(gas);
        self
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.action.value = Some(value);
        self
    }

    pub fn requires(mut self, module: impl Into<ModuleName>) -> Self {
        let module = module.into();
        if !self.depends_on.contains(&module) {
            self.depends_on.push(module);
        }
        self
    }
}

/// Resolve a symbolic argument against the deployed instances
pub fn resolve_arg(arg: &Arg, sequencer: &Sequencer, admin: Address, required_by: &str) -> Result<Token> {
    let token = match arg {
        Arg::Module(name) => Token::Address(sequencer.require(name, required_by)?),
        Arg::Admin => Token::Address(admin),
        Arg::Account(account) => Token::Address(*account),
        Arg::Value(token) => token.clone(),
        Arg::Array(items) => Token::Array(resolve_args(items, sequencer, admin, required_by)?),
        Arg::Tuple(items) => Token::Tuple(resolve_args(items, sequencer, admin, required_by)?),
        Arg::EncodedCall { signature, args } => {
            let inner = resolve_args(args, sequencer, admin, required_by)?;
            Token::Bytes(abi::encode_call(signature, &inner))
        }
    };
    Ok(token)
}

pub fn resolve_args(args: &[Arg], sequencer: &Sequencer, admin: Address, required_by: &str) -> Result<Vec<Token>> {
    args.iter()
        .map(|arg| resolve_arg(arg, sequencer, admin, required_by))
        .collect()
}

/// Executes steps one at a time, waiting for each receipt
pub struct StepRunner<'a> {
    chain: &'a dyn Chain,
    sequencer: &'a Sequencer,
    admin: Address,
}

impl<'a> StepRunner<'a> {
    pub fn new(chain: &'a dyn Chain, sequencer: &'a Sequencer, admin: Address) -> Self {
        Self { chain, sequencer, admin }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn sequencer(&self) -> &Sequencer {
        self.sequencer
    }

    /// Run a single step
    pub async fn run_step(&self, step: &Step) -> Result<Receipt> {
        for module in &step.depends_on {
            self.sequencer.require(module, &step.name)?;
        }

        let action = &step.action;
        let to = self.sequencer.require(&action.target, &step.name)?;
        let args = resolve_args(&action.args, self.sequencer, self.admin, &step.name)?;
        let from = match resolve_arg(&action.sender, self.sequencer, self.admin, &step.name)? {
            Token::Address(address) => address,
            _ => self.admin,
        };

        let mut options = TxOptions::sender(from);
        options.gas = action.gas;
        options.value = action.value;

        self.chain
            .call(CallRequest::new(to, action.signature.clone(), args).with_options(options))
            .await
            .map_err(|source| PipelineError::SubmissionFailure {
                step: step.name.clone(),
                target: action.target.to_string(),
                source,
            })
    }

    /// Run steps in order. The first failure aborts the rest and is reported
    /// with its 1-based index.
    pub async fn run_all(&self, steps: &[Step]) -> Result<usize> {
        for (i, step) in steps.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, steps.len(), step.name);
            self.run_step(step)
                .await
                .map_err(|source| PipelineError::StepFailed {
                    index: i + 1,
                    step: step.name.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(steps.len())
    }
}
