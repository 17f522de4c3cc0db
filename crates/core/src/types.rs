use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

pub use ethers::types::{Address, H256, U256};

/// Transaction hash
pub type TxHash = H256;

/// Parse a 256-bit unsigned integer written as `0x`-prefixed hex or as a
/// decimal string.
pub fn parse_u256(s: &str) -> Result<U256> {
    let invalid = |reason: String| CoreError::InvalidWord(format!("{:?}: {}", s, reason));

    match s.strip_prefix("0x") {
        Some("") => Err(invalid("empty hex".to_string())),
        Some(digits) => U256::from_str_radix(digits, 16).map_err(|e| invalid(format!("{:?}", e))),
        None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            U256::from_dec_str(s).map_err(|e| invalid(format!("{:?}", e)))
        }
        None => Err(invalid("not a decimal or 0x-prefixed integer".to_string())),
    }
}

/// Parse a `0x`-prefixed 32-byte value such as a state root
pub fn parse_bytes32(s: &str) -> Result<H256> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::InvalidWord(format!("missing 0x prefix: {}", s)))?;
    if digits.len() != 64 {
        return Err(CoreError::InvalidWord(format!("expected 64 hex digits: {}", s)));
    }
    digits
        .parse::<H256>()
        .map_err(|e| CoreError::InvalidWord(format!("{}: {}", s, e)))
}

/// Name of a deployable module. Identity of a module within one run.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ModuleName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// 10^exp as u128. Panics above 10^38.
pub const fn pow10(exp: u32) -> u128 {
    10u128.pow(exp)
}
