//! Call data and constructor arguments for canonical Solidity signatures.
//! Encoding is `ethers::abi`; this module only joins selectors to it.

pub use ethers::abi::encode;
pub use ethers::utils::keccak256;

use dexboot_core::Token;

/// First 4 bytes of keccak256 of the canonical signature, e.g.
/// `registerToken(address)`.
pub fn selector(signature: &str) -> [u8; 4] {
    ethers::utils::id(signature)
}

/// Selector followed by the encoded arguments
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(args));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexboot_core::{uint, Address};

    #[test]
    fn test_selector_known_values() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
    }

    #[test]
    fn test_encode_static_args() {
        let addr = Address::repeat_byte(0x11);
        let data = encode_call("approve(address,uint256)", &[Token::Address(addr), uint(5)]);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(hex::encode(&data[4..36]), format!("{}{}", "00".repeat(12), "11".repeat(20)));
        assert_eq!(data[67], 5);
    }

    #[test]
    fn test_verification_key_array_is_inline() {
        let items: Vec<Token> = (1..=18).map(|v| uint(v as u128)).collect();
        let data = encode(&[uint(0), Token::FixedArray(items)]);
        assert_eq!(data.len(), 19 * 32);
        assert_eq!(data[63], 1);
        assert_eq!(data[19 * 32 - 1], 18);
    }

    #[test]
    fn test_empty_deposit_payload_is_offset_and_length() {
        let data = encode(&[Token::Bytes(vec![])]);
        assert_eq!(data.len(), 64);
        assert_eq!(data[31], 0x20);
        assert!(data[32..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_pool_tuple_is_dynamic() {
        let tuple = Token::Tuple(vec![uint(1), Token::String("x".to_string())]);
        let data = encode(&[tuple]);
        // offset, then tuple: 1, offset 0x40, len 1, "x"
        assert_eq!(data[31], 0x20);
        assert_eq!(data[63], 1);
        assert_eq!(data[95], 0x40);
        assert_eq!(data[127], 1);
        assert_eq!(data[128], b'x');
        assert_eq!(data.len(), 5 * 32);
    }

    #[test]
    fn test_zero_arg_call_is_selector_only() {
        assert_eq!(encode_call("claimOwnership()", &[]).len(), 4);
    }
}
