//! Configuration for ALiBi multi-head attention.
//!
//! The [`AttentionConfig`] struct captures the geometry (model width, heads),
//! the masking policy (causal, optional look-back window, precomputed length)
//! and the train-only dropout probability.

use super::AttentionError;

/// Configuration driving attention behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionConfig {
    /// Embedding width; must be divisible by `num_heads`.
    pub d_model: usize,
    /// Number of independent attention heads.
    pub num_heads: usize,
    /// Longest sequence covered by the precomputed causal mask.
    pub max_len: usize,
    /// Whether a position may only attend to itself and earlier positions.
    pub causal: bool,
    /// Look-back span for causal attention; `None` means unrestricted.
    pub window: Option<usize>,
    /// Probability for dropout applied to the attention output during training.
    pub dropout_p: f32,
}

impl AttentionConfig {
    /// Causal attention without a window and without dropout.
    pub fn new(d_model: usize, num_heads: usize, max_len: usize) -> Self {
        Self {
            d_model,
            num_heads,
            max_len,
            causal: true,
            window: None,
            dropout_p: 0.0,
        }
    }

    /// Width of a single head.
    pub fn head_dim(&self) -> usize {
        self.d_model / self.num_heads.max(1)
    }

    /// Validate structural invariants before any buffer is allocated.
    pub fn validate(&self) -> Result<(), AttentionError> {
        let invalid = |reason: String| Err(AttentionError::InvalidConfig { reason });

        if self.d_model == 0 {
            return invalid("d_model must be greater than zero".into());
        }
        if self.num_heads == 0 {
            return invalid("num_heads must be greater than zero".into());
        }
        if self.d_model % self.num_heads != 0 {
            return invalid(format!(
                "d_model ({}) must be divisible by num_heads ({})",
                self.d_model, self.num_heads
            ));
        }
        if self.max_len == 0 {
            return invalid("max_len must be greater than zero".into());
        }
        match self.window {
            Some(_) if !self.causal => {
                return invalid("window requires causal attention".into());
            }
            Some(0) => return invalid("window must be greater than zero".into()),
            _ => {}
        }
        if !(0.0..1.0).contains(&self.dropout_p) {
            return invalid(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout_p
            ));
        }
        Ok(())
    }
}
