//! ABI-level values passed to constructors and contract calls

pub use ethers::abi::Token;

use crate::{Address, H256, U256};

/// `uint` token from a native integer
pub fn uint(value: u128) -> Token {
    Token::Uint(U256::from(value))
}

/// `bytes32` token
pub fn bytes32(value: H256) -> Token {
    Token::FixedBytes(value.as_bytes().to_vec())
}

/// Borrowing accessors over [`Token`], for code that inspects call
/// arguments without consuming them.
pub trait TokenExt {
    fn as_address(&self) -> Option<Address>;

    /// `uint` or `int` value
    fn as_uint(&self) -> Option<U256>;

    /// `None` for non-integers and for values above `u128::MAX`
    fn as_u128(&self) -> Option<u128>;

    fn as_bool(&self) -> Option<bool>;

    fn as_bytes(&self) -> Option<&[u8]>;

    /// Elements of an array, fixed array or tuple
    fn as_list(&self) -> Option<&[Token]>;
}

impl TokenExt for Token {
    fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(*a),
            _ => None,
        }
    }

    fn as_uint(&self) -> Option<U256> {
        match self {
            Token::Uint(v) | Token::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn as_u128(&self) -> Option<u128> {
        self.as_uint().filter(|v| v.bits() <= 128).map(|v| v.as_u128())
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Token::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Token::Bytes(b) | Token::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[Token]> {
        match self {
            Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_u128_rejects_wide_values() {
        assert_eq!(uint(7).as_u128(), Some(7));
        assert_eq!(Token::Uint(U256::MAX).as_u128(), None);
        assert_eq!(Token::Bool(true).as_u128(), None);
    }

    #[test]
    fn test_bytes32_is_fixed_width() {
        let token = bytes32(H256::repeat_byte(1));
        assert_eq!(token.as_bytes().map(<[u8]>::len), Some(32));
    }
}
