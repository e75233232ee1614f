//! Core traits and types shared across attention implementations.
//!
//! Kernels operate on tensors with layout `[batch, n_heads, seq_len, head_dim]`
//! and return the context tensor in the same layout together with the
//! normalised attention weights `[batch, n_heads, q_len, k_len]`.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::AttentionConfig;
pub use errors::AttentionError;

/// Result of a single attention kernel invocation.
#[derive(Debug, Clone)]
pub struct AttentionOutput {
    /// Weighted sum of values, `[batch, n_heads, q_len, head_dim]`.
    pub context: Tensor,
    /// Softmax-normalised scores, `[batch, n_heads, q_len, k_len]`.
    pub weights: Tensor,
}

/// Unified interface for attention kernels.
///
/// * `q`, `k`, and `v` share the layout `[batch, n_heads, seq_len, head_dim]`.
/// * `bias`, when present, is added to the scaled scores and must broadcast to
///   `[batch, n_heads, q_len, k_len]`.
/// * `mask`, when present, is a `u8` tensor broadcastable to the same shape;
///   zero entries are excluded from the softmax.
pub trait Attention {
    /// Compute scaled dot-product attention with optional bias and mask.
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        bias: Option<&Tensor>,
        mask: Option<&Tensor>,
    ) -> Result<AttentionOutput, AttentionError>;
}
