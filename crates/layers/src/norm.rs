//! Layer normalisation over the hidden axis.
//!
//! Inputs follow the `(batch, seq, hidden)` convention. Statistics are computed
//! along the last axis and the learnable scale/shift are broadcast across the
//! leading dimensions, so the output keeps the original layout.

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{Init, VarBuilder};

use crate::checks;

/// Configuration for [`LayerNorm`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormConfig {
    /// Size of the hidden dimension being normalised.
    pub hidden_size: usize,
    /// Numeric stabiliser added to the variance.
    pub epsilon: f64,
}

impl NormConfig {
    pub fn new(hidden_size: usize, epsilon: f64) -> Self {
        Self {
            hidden_size,
            epsilon,
        }
    }
}

/// Standard LayerNorm with learnable affine parameters.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    config: NormConfig,
    weight: Tensor,
    bias: Tensor,
}

impl LayerNorm {
    /// Constructs a LayerNorm from explicit scale and shift tensors.
    pub fn new(weight: Tensor, bias: Tensor, config: NormConfig) -> Result<Self> {
        checks::expect_shape("norm.weight", &weight, &[config.hidden_size])?;
        checks::expect_shape("norm.bias", &bias, &[config.hidden_size])?;
        checks::expect_same_dtype("norm.bias", &bias, "norm.weight", &weight)?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Fetches (or creates) `weight` (ones) and `bias` (zeros) through `vb`.
    pub fn load(config: NormConfig, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(config.hidden_size, "weight", Init::Const(1.0))?;
        let bias = vb.get_with_hints(config.hidden_size, "bias", Init::Const(0.0))?;
        Self::new(weight, bias, config)
    }

    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}

impl Module for LayerNorm {
    fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("norm.input", hidden, self.config.hidden_size)?;
        checks::expect_same_dtype("norm.input", hidden, "norm.weight", &self.weight)?;

        let hidden_size = self.config.hidden_size as f64;
        let mean = (hidden.sum_keepdim(D::Minus1)? / hidden_size)?;
        let centered = hidden.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden_size)?;
        let denom = (variance + self.config.epsilon)?.sqrt()?;

        centered
            .broadcast_div(&denom)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}
