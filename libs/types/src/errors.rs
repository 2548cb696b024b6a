//! Error types for feed values
//!
//! Error taxonomy using thiserror

use thiserror::Error;

/// Errors raised while constructing numeric feed values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Negative volume: {0}")]
    NegativeVolume(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_error_display() {
        let err = NumericError::InvalidPrice("abc".to_string());
        assert_eq!(err.to_string(), "Invalid price: abc");

        let err = NumericError::NegativeVolume("-1".to_string());
        assert_eq!(err.to_string(), "Negative volume: -1");
    }
}
