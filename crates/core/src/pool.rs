//! AMM pool configuration passed to `setupPool`

use serde::{Deserialize, Serialize};

use crate::{uint, Address, CoreError, Result, Token};

/// Number of tokens (and weights) in every pool
pub const POOL_TOKEN_COUNT: usize = 2;

/// Fee denominator: fees are in basis points (1/10000)
pub const BIPS_BASE: u32 = 10_000;

/// Largest value of a `uint96` field
pub const MAX_UINT96: u128 = (1u128 << 96) - 1;

/// Fully resolved pool configuration.
///
/// Mirrors the on-chain struct
/// `(address,address,string,uint32,address[],uint96[],uint8,string)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub shared_config: Address,
    pub exchange: Address,
    pub pool_name: String,
    #[serde(rename = "accountID")]
    pub account_id: u32,
    pub tokens: Vec<Address>,
    pub weights: Vec<u128>,
    pub fee_bips: u8,
    pub token_symbol: String,
}

impl PoolConfig {
    /// Solidity type of the `setupPool` argument
    pub const ABI_TYPE: &'static str = "(address,address,string,uint32,address[],uint96[],uint8,string)";

    /// Check the shape the pool contract expects.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.len() != POOL_TOKEN_COUNT {
            return Err(CoreError::InvalidPoolConfig(format!(
                "{}: expected {} tokens, got {}",
                self.pool_name,
                POOL_TOKEN_COUNT,
                self.tokens.len()
            )));
        }
        if self.weights.len() != self.tokens.len() {
            return Err(CoreError::InvalidPoolConfig(format!(
                "{}: {} weights for {} tokens",
                self.pool_name,
                self.weights.len(),
                self.tokens.len()
            )));
        }
        if let Some(w) = self.weights.iter().find(|w| **w == 0 || **w > MAX_UINT96) {
            return Err(CoreError::InvalidPoolConfig(format!(
                "{}: weight {} out of range",
                self.pool_name, w
            )));
        }
        // fee_bips upper bound is protocol policy, enforced by the pool contract
        if self.tokens[0] == self.tokens[1] {
            return Err(CoreError::InvalidPoolConfig(format!(
                "{}: both tokens are {}",
                self.pool_name, self.tokens[0]
            )));
        }
        Ok(())
    }

    /// Encode as a tuple token. Validates first.
    pub fn to_token(&self) -> Result<Token> {
        self.validate()?;
        Ok(Token::Tuple(vec![
            Token::Address(self.shared_config),
            Token::Address(self.exchange),
            Token::String(self.pool_name.clone()),
            uint(self.account_id as u128),
            Token::Array(self.tokens.iter().copied().map(Token::Address).collect()),
            Token::Array(self.weights.iter().copied().map(uint).collect()),
            uint(self.fee_bips as u128),
            Token::String(self.token_symbol.clone()),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenExt;

    fn sample() -> PoolConfig {
        PoolConfig {
            shared_config: Address::from([1; 20]),
            exchange: Address::from([2; 20]),
            pool_name: "USDT-ETH-Pool-3".to_string(),
            account_id: 1,
            tokens: vec![Address::from([3; 20]), Address::zero()],
            weights: vec![10_000, 10_000],
            fee_bips: 30,
            token_symbol: "LP-USDTETH".to_string(),
        }
    }

    #[test]
    fn test_valid_pool() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_three_tokens_rejected() {
        let mut pool = sample();
        pool.tokens.push(Address::from([4; 20]));
        pool.weights.push(10_000);
        assert!(matches!(pool.validate(), Err(CoreError::InvalidPoolConfig(_))));
    }

    #[test]
    fn test_weight_count_mismatch_rejected() {
        let mut pool = sample();
        pool.weights.pop();
        assert!(pool.validate().is_err());
        assert!(pool.to_token().is_err());
    }

    #[test]
    fn test_zero_weight_rejected() {
        let mut pool = sample();
        pool.weights[1] = 0;
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_identical_tokens_rejected() {
        let mut pool = sample();
        pool.tokens[1] = pool.tokens[0];
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_to_token_layout() {
        let token = sample().to_token().unwrap();
        let fields = token.as_list().unwrap();
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[2], Token::String("USDT-ETH-Pool-3".to_string()));
        assert_eq!(fields[4].as_list().unwrap().len(), 2);
        assert_eq!(fields[6].as_u128(), Some(30));
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("sharedConfig").is_some());
        assert!(json.get("accountID").is_some());
        assert!(json.get("feeBips").is_some());
        assert!(json.get("tokenSymbol").is_some());
    }
}
