//! Multi-head self-attention with ALiBi positional biases.
//!
//! Inputs are hidden states `[batch, seq_len, d_model]`. A single fused
//! projection produces key, query and value (in that order along the last
//! axis), which are split into `num_heads` heads of width `d_model / num_heads`.
//! Raw scores are divided by `sqrt(d_model)` (the full model width, not the
//! head width), the ALiBi bias is added, the causal/window mask is applied,
//! and the softmax-weighted values are merged back to `[batch, seq_len, d_model]`
//! before output dropout.

use alibi_layers::{checks, Dropout, Linear, LinearConfig};
use candle_core::{Device, Module, Tensor};
use candle_nn::VarBuilder;

use crate::core::{Attention, AttentionConfig, AttentionError};
use crate::masks::{build_causal_window_mask, slice_mask};
use crate::position::alibi::{alibi_bias, alibi_slopes, bias_as, slope_values};
use crate::reference::ExactAttention;

/// ALiBi multi-head self-attention layer.
#[derive(Debug)]
pub struct AlibiMultiHeadAttention {
    config: AttentionConfig,
    kqv: Linear,
    slopes: Tensor,
    mask: Option<Tensor>,
    kernel: ExactAttention,
    dropout: Dropout,
}

impl AlibiMultiHeadAttention {
    /// Builds the layer around an existing fused `kqv` projection (`d_model -> 3 * d_model`).
    ///
    /// The slope vector and, for causal attention, the `[1, 1, max_len, max_len]`
    /// mask are computed once here on `device`.
    pub fn new(
        config: AttentionConfig,
        kqv: Linear,
        device: &Device,
        seed: u64,
    ) -> Result<Self, AttentionError> {
        config.validate()?;
        let proj = kqv.config();
        if proj.input_dim != config.d_model || proj.output_dim != 3 * config.d_model {
            return Err(AttentionError::InvalidConfig {
                reason: format!(
                    "kqv projection must map {} -> {}, got {} -> {}",
                    config.d_model,
                    3 * config.d_model,
                    proj.input_dim,
                    proj.output_dim
                ),
            });
        }

        let slopes = alibi_slopes(config.num_heads, device)?;
        let mask = if config.causal {
            Some(build_causal_window_mask(device, config.max_len, config.window)?)
        } else {
            None
        };
        let dropout = Dropout::new(config.dropout_p, seed)?;

        log::debug!(
            "alibi attention heads={} head_dim={} causal={} window={:?} max_len={} slopes={:?}",
            config.num_heads,
            config.head_dim(),
            config.causal,
            config.window,
            config.max_len,
            slope_values(config.num_heads)
        );

        Ok(Self {
            kernel: ExactAttention::with_scale((config.d_model as f64).sqrt()),
            config,
            kqv,
            slopes,
            mask,
            dropout,
        })
    }

    /// Fetches (or creates) the bias-free `kqv` projection through `vb`.
    pub fn load(
        config: AttentionConfig,
        vb: VarBuilder,
        seed: u64,
    ) -> Result<Self, AttentionError> {
        config.validate()?;
        let kqv = Linear::load(
            LinearConfig::without_bias(config.d_model, 3 * config.d_model),
            vb.pp("kqv"),
        )?;
        Self::new(config, kqv, vb.device(), seed)
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    /// Fused key/query/value projection.
    pub fn kqv(&self) -> &Linear {
        &self.kqv
    }

    /// Per-head slopes shaped `[num_heads, 1, 1]`.
    pub fn slopes(&self) -> &Tensor {
        &self.slopes
    }

    /// Precomputed `[1, 1, max_len, max_len]` mask, present only for causal attention.
    pub fn mask(&self) -> Option<&Tensor> {
        self.mask.as_ref()
    }

    /// Enables or disables output dropout.
    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }

    fn validate_input(&self, hidden: &Tensor) -> Result<(usize, usize), AttentionError> {
        checks::expect_batch_seq_hidden("attention.input", hidden, self.config.d_model).map_err(
            |err| AttentionError::InvalidShape {
                context: err.to_string(),
            },
        )?;
        let (batch, seq_len, _) = hidden.dims3()?;
        if batch == 0 || seq_len == 0 {
            return Err(AttentionError::InvalidShape {
                context: format!("batch and seq_len must be non-zero, got [{batch}, {seq_len}, _]"),
            });
        }
        if self.config.causal && seq_len > self.config.max_len {
            return Err(AttentionError::SequenceTooLong {
                seq_len,
                max_len: self.config.max_len,
            });
        }
        if hidden.dtype() != self.kqv.weight().dtype() {
            return Err(AttentionError::UnsupportedDType {
                requested: format!(
                    "input dtype {:?} differs from parameters {:?}",
                    hidden.dtype(),
                    self.kqv.weight().dtype()
                ),
            });
        }
        Ok((batch, seq_len))
    }

    fn split_heads(
        &self,
        tensor: &Tensor,
        batch: usize,
        seq_len: usize,
    ) -> candle_core::Result<Tensor> {
        tensor
            .reshape((batch, seq_len, self.config.num_heads, self.config.head_dim()))?
            .transpose(1, 2)
    }

    /// Forward pass returning the output and the attention weights
    /// `[batch, num_heads, seq_len, seq_len]`.
    pub fn forward_with_weights(
        &self,
        hidden: &Tensor,
    ) -> Result<(Tensor, Tensor), AttentionError> {
        let (batch, seq_len) = self.validate_input(hidden)?;
        let d_model = self.config.d_model;

        let kqv = self.kqv.forward(hidden)?;
        let key = self.split_heads(&kqv.narrow(2, 0, d_model)?, batch, seq_len)?;
        let query = self.split_heads(&kqv.narrow(2, d_model, d_model)?, batch, seq_len)?;
        let value = self.split_heads(&kqv.narrow(2, 2 * d_model, d_model)?, batch, seq_len)?;

        let bias = bias_as(alibi_bias(&self.slopes, seq_len)?, hidden.dtype())?;
        let mask = match &self.mask {
            Some(mask) => Some(slice_mask(mask, seq_len)?),
            None => None,
        };

        let attended = self
            .kernel
            .attend(&query, &key, &value, Some(&bias), mask.as_ref())?;
        let merged = attended
            .context
            .transpose(1, 2)?
            .reshape((batch, seq_len, d_model))?;
        let output = self.dropout.forward(&merged)?;
        Ok((output, attended.weights))
    }

    /// Forward pass: `[batch, seq_len, d_model] -> [batch, seq_len, d_model]`.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor, AttentionError> {
        self.forward_with_weights(hidden).map(|(output, _)| output)
    }
}
