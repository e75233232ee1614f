//! Position-wise feed-forward blocks built on top of projections and activations.
//!
//! MLPs operate on hidden states shaped `(batch, seq, hidden)` and return the
//! same layout. The first projection expands the hidden dimension to
//! `config.intermediate_size`, the activation is applied, and the second
//! projection contracts back to the model hidden size before dropout. No
//! information crosses sequence positions.

use candle_core::{Module, Result, Tensor};
use candle_nn::VarBuilder;

use crate::{
    activations::ActivationKind,
    checks,
    dropout::Dropout,
    linear::{Linear, LinearConfig},
};

/// Configuration shared by transformer feed-forward networks.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardConfig {
    /// Model hidden size.
    pub hidden_size: usize,
    /// Width of the activation space.
    pub intermediate_size: usize,
    /// Activation applied between projections.
    pub activation: ActivationKind,
    /// Dropout probability applied to the block output while training.
    pub dropout_p: f32,
}

impl FeedForwardConfig {
    /// Creates a GELU MLP whose intermediate width is `hidden_size * expansion_factor`.
    pub fn with_expansion_factor(hidden_size: usize, expansion_factor: usize) -> Self {
        Self {
            hidden_size,
            intermediate_size: hidden_size * expansion_factor,
            activation: ActivationKind::Gelu,
            dropout_p: 0.0,
        }
    }
}

/// Two-layer feed-forward network: `dropout(fc2(act(fc1(x))))`.
#[derive(Debug, Clone)]
pub struct FeedForward {
    config: FeedForwardConfig,
    fc1: Linear,
    fc2: Linear,
    dropout: Dropout,
}

impl FeedForward {
    /// Assembles a feed-forward block from existing projections.
    pub fn new(config: FeedForwardConfig, fc1: Linear, fc2: Linear, seed: u64) -> Result<Self> {
        let expected_fc1 = (config.hidden_size, config.intermediate_size);
        let expected_fc2 = (config.intermediate_size, config.hidden_size);
        let actual_fc1 = (fc1.config().input_dim, fc1.config().output_dim);
        let actual_fc2 = (fc2.config().input_dim, fc2.config().output_dim);
        if actual_fc1 != expected_fc1 || actual_fc2 != expected_fc2 {
            candle_core::bail!(
                "feed-forward projections must map {:?} then {:?}, got {:?} then {:?}",
                expected_fc1,
                expected_fc2,
                actual_fc1,
                actual_fc2
            );
        }
        let dropout = Dropout::new(config.dropout_p, seed)?;
        Ok(Self {
            config,
            fc1,
            fc2,
            dropout,
        })
    }

    /// Fetches (or creates) `fc1` and `fc2` through `vb`.
    pub fn load(config: FeedForwardConfig, vb: VarBuilder, seed: u64) -> Result<Self> {
        let fc1 = Linear::load(
            LinearConfig::new(config.hidden_size, config.intermediate_size),
            vb.pp("fc1"),
        )?;
        let fc2 = Linear::load(
            LinearConfig::new(config.intermediate_size, config.hidden_size),
            vb.pp("fc2"),
        )?;
        Self::new(config, fc1, fc2, seed)
    }

    pub fn config(&self) -> &FeedForwardConfig {
        &self.config
    }

    /// Enables or disables output dropout.
    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }

    /// Performs the forward pass through the MLP.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("mlp.input", hidden, self.config.hidden_size)?;
        let expanded = self.fc1.forward(hidden)?;
        let activated = self.config.activation.forward(&expanded)?;
        let contracted = self.fc2.forward(&activated)?;
        self.dropout.forward(&contracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, D};
    use candle_nn::VarMap;

    fn build(config: FeedForwardConfig) -> Result<(VarMap, FeedForward)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let ffn = FeedForward::load(config, vb.pp("ffn"), 7)?;
        Ok((varmap, ffn))
    }

    #[test]
    fn expansion_factor_sets_intermediate_width() -> Result<()> {
        let config = FeedForwardConfig::with_expansion_factor(8, 4);
        assert_eq!(config.intermediate_size, 32);
        let (varmap, ffn) = build(config)?;
        assert_eq!(varmap.all_vars().len(), 4);

        let input = Tensor::randn(0f32, 1.0, (2, 3, 8), &Device::Cpu)?;
        let output = ffn.forward(&input)?;
        assert_eq!(output.dims(), &[2, 3, 8]);
        Ok(())
    }

    #[test]
    fn positions_are_transformed_independently() -> Result<()> {
        let (_varmap, ffn) = build(FeedForwardConfig::with_expansion_factor(4, 2))?;
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (1, 3, 4), &device)?;
        let full = ffn.forward(&input)?;

        let last = input.narrow(1, 2, 1)?;
        let single = ffn.forward(&last)?;
        let diff = full
            .narrow(1, 2, 1)?
            .sub(&single)?
            .abs()?
            .max_keepdim(D::Minus1)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        assert!(diff.iter().all(|d| *d < 1e-6));
        Ok(())
    }

    #[test]
    fn matches_manual_composition_in_eval_mode() -> Result<()> {
        let mut config = FeedForwardConfig::with_expansion_factor(4, 3);
        config.dropout_p = 0.5;
        let (_varmap, ffn) = build(config)?;
        ffn.set_training(false);

        let input = Tensor::randn(0f32, 1.0, (2, 2, 4), &Device::Cpu)?;
        let expected = ffn.fc2.forward(&ffn.fc1.forward(&input)?.gelu_erf()?)?;
        let output = ffn.forward(&input)?;
        let diff = output.sub(&expected)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_projections() -> Result<()> {
        let device = Device::Cpu;
        let config = FeedForwardConfig::with_expansion_factor(4, 2);
        let fc1 = Linear::new(
            LinearConfig::new(4, 6),
            Tensor::zeros((6, 4), DType::F32, &device)?,
            Some(Tensor::zeros(6, DType::F32, &device)?),
        )?;
        let fc2 = Linear::new(
            LinearConfig::new(6, 4),
            Tensor::zeros((4, 6), DType::F32, &device)?,
            Some(Tensor::zeros(4, DType::F32, &device)?),
        )?;
        assert!(FeedForward::new(config, fc1, fc2, 0).is_err());
        Ok(())
    }
}
