use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid 256-bit word: {0}")]
    InvalidWord(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidPoolConfig(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_word() {
        let err = CoreError::InvalidWord("0x".to_string());
        assert_eq!(err.to_string(), "Invalid 256-bit word: 0x");
    }

    #[test]
    fn test_error_display_pool_config() {
        let err = CoreError::InvalidPoolConfig("expected 2 tokens, got 3".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid pool configuration: expected 2 tokens, got 3"
        );
    }
}
