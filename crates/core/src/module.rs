//! Module descriptors and deployed instances

use crate::{Address, ModuleName, Token, TxHash};

/// Where a module's address comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Deployed by this run
    Deploy,
    /// Deployed by an earlier migration; resolved from the artifact registry
    Existing,
}

/// Symbolic call or constructor argument, resolved against deployed
/// instances at the moment the step runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Address of a deployed module
    Module(ModuleName),
    /// The administrative account of this run
    Admin,
    Account(Address),
    Value(Token),
    /// Dynamic array of resolved elements
    Array(Vec<Arg>),
    Tuple(Vec<Arg>),
    /// ABI-encoded calldata (selector + arguments) as `bytes`
    EncodedCall { signature: String, args: Vec<Arg> },
}

impl Arg {
    pub fn module(name: impl Into<ModuleName>) -> Self {
        Arg::Module(name.into())
    }

    /// Module names this argument refers to, in order of appearance
    pub fn referenced_modules(&self) -> Vec<&ModuleName> {
        let mut out = Vec::new();
        self.collect_modules(&mut out);
        out
    }

    fn collect_modules<'a>(&'a self, out: &mut Vec<&'a ModuleName>) {
        match self {
            Arg::Module(name) => out.push(name),
            Arg::Array(items) | Arg::Tuple(items) => {
                for item in items {
                    item.collect_modules(out);
                }
            }
            Arg::EncodedCall { args, .. } => {
                for arg in args {
                    arg.collect_modules(out);
                }
            }
            Arg::Admin | Arg::Account(_) | Arg::Value(_) => {}
        }
    }
}

impl From<Token> for Arg {
    fn from(value: Token) -> Self {
        Arg::Value(value)
    }
}

/// Static description of one deployable module.
///
/// `libraries` is ordered: libraries are linked in exactly this order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub name: ModuleName,
    pub libraries: Vec<ModuleName>,
    pub gas_limit: u64,
    pub origin: ModuleOrigin,
    pub constructor_args: Vec<Arg>,
}

impl ModuleDescriptor {
    /// A module deployed by this run, with no libraries and no constructor args
    pub fn deploy(name: impl Into<ModuleName>, gas_limit: u64) -> Self {
        Self {
            name: name.into(),
            libraries: Vec::new(),
            gas_limit,
            origin: ModuleOrigin::Deploy,
            constructor_args: Vec::new(),
        }
    }

    /// A module deployed by an earlier migration
    pub fn existing(name: impl Into<ModuleName>) -> Self {
        Self {
            name: name.into(),
            libraries: Vec::new(),
            gas_limit: 0,
            origin: ModuleOrigin::Existing,
            constructor_args: Vec::new(),
        }
    }

    pub fn with_libraries<I, N>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ModuleName>,
    {
        self.libraries = libraries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constructor_args(mut self, args: Vec<Arg>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn is_existing(&self) -> bool {
        self.origin == ModuleOrigin::Existing
    }
}

/// A module with an on-chain address, produced once per module per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedInstance {
    pub name: ModuleName,
    pub address: Address,
    /// Deployment transaction; `None` for adopted (pre-existing) instances
    pub tx_hash: Option<TxHash>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_modules_nested() {
        let arg = Arg::Tuple(vec![
            Arg::module("SharedConfig"),
            Arg::Admin,
            Arg::Array(vec![Arg::module("USDT"), Arg::Value(Token::Address(Address::zero()))]),
            Arg::EncodedCall {
                signature: "claimOwnership()".to_string(),
                args: vec![Arg::module("Exchange")],
            },
        ]);

        let names: Vec<&str> = arg.referenced_modules().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["SharedConfig", "USDT", "Exchange"]);
    }

    #[test]
    fn test_descriptor_builders() {
        let desc = ModuleDescriptor::deploy("ExchangeV3", 6_700_000)
            .with_libraries(["LibA", "LibB"]);
        assert_eq!(desc.libraries, vec![ModuleName::from("LibA"), ModuleName::from("LibB")]);
        assert!(!desc.is_existing());

        let existing = ModuleDescriptor::existing("LoopringV3");
        assert!(existing.is_existing());
        assert_eq!(existing.gas_limit, 0);
    }
}
