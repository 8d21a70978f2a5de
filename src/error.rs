//! Error types for the strided-interval domain.
//!
//! Almost every operation in this crate is total: unrepresentable results
//! degrade to TOP or BOTTOM rather than failing. The errors below cover the
//! remaining cases, all of which are misuses of the API surface itself
//! (widths the representation cannot hold, inverted bit ranges, widening
//! non-reduced operands).

use thiserror::Error;

/// Primary error type for strided-interval operations.
#[derive(Debug, Error)]
pub enum SiError {
    /// Bit width outside the representable range.
    #[error("Invalid bit width: {bits} (must be between 1 and 64)")]
    InvalidWidth { bits: u32 },

    /// An extension or concatenation would exceed the 64-bit ceiling.
    #[error("Result width {bits} exceeds the 64-bit representation limit")]
    WidthOverflow { bits: u32 },

    /// A low-cast targeted a width wider than the source.
    #[error("Cannot cast a {from}-bit interval down to {to} bits")]
    InvalidCast { from: u32, to: u32 },

    /// Bit-range extraction with inverted or out-of-range indices.
    #[error("Invalid extraction [{high}:{low}] from a {bits}-bit interval")]
    InvalidExtract { high: u32, low: u32, bits: u32 },

    /// Widening produced a zero stride from non-singleton operands.
    #[error("Widening operands are not reduced")]
    OperandsNotReduced,
}

/// Result type alias for strided-interval operations.
pub type Result<T> = std::result::Result<T, SiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SiError::InvalidWidth { bits: 65 };
        assert!(err.to_string().contains("65"));

        let err = SiError::InvalidExtract {
            high: 3,
            low: 8,
            bits: 16,
        };
        let msg = err.to_string();
        assert!(msg.contains("[3:8]"));
        assert!(msg.contains("16-bit"));
    }
}
