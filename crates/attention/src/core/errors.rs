//! Error types emitted by attention implementations.

/// Attention-specific error category.
#[derive(Debug)]
pub enum AttentionError {
    /// The configuration violates a structural invariant.
    InvalidConfig { reason: String },
    /// The supplied tensor shapes do not align with the documented contract.
    InvalidShape { context: String },
    /// The sequence is longer than the precomputed causal mask.
    SequenceTooLong { seq_len: usize, max_len: usize },
    /// The kernel does not support the requested data type.
    UnsupportedDType { requested: String },
    /// A tensor backend failure propagated to the caller.
    Backend { source: candle_core::Error },
}

impl std::fmt::Display for AttentionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttentionError::InvalidConfig { reason } => {
                write!(f, "invalid attention config: {reason}")
            }
            AttentionError::InvalidShape { context } => {
                write!(f, "invalid tensor shape: {context}")
            }
            AttentionError::SequenceTooLong { seq_len, max_len } => {
                write!(f, "sequence length {seq_len} exceeds max_len {max_len}")
            }
            AttentionError::UnsupportedDType { requested } => {
                write!(f, "unsupported dtype {requested}")
            }
            AttentionError::Backend { source } => {
                write!(f, "attention backend error: {source}")
            }
        }
    }
}

impl std::error::Error for AttentionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttentionError::Backend { source } => Some(source),
            _ => None,
        }
    }
}

impl From<candle_core::Error> for AttentionError {
    fn from(err: candle_core::Error) -> Self {
        AttentionError::Backend { source: err }
    }
}
