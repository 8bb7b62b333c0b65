//! Decoder-specific error types

/// Result type for script decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Script decoding failures. Never retried: the same script always fails the
/// same way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed script {script_hex}: {reason}")]
    MalformedScript { script_hex: String, reason: String },
}
