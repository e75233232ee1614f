use candle_core::Tensor;
use candle_nn::VarBuilder;

use crate::{block::AlibiTransformerLayer, config::AlibiConfig, ModelError};

/// Stack of `num_layers` ALiBi transformer layers sharing one configuration.
#[derive(Debug)]
pub struct AlibiTransformer {
    config: AlibiConfig,
    layers: Vec<AlibiTransformerLayer>,
}

impl AlibiTransformer {
    /// Builds every layer under `vb.pp("layers.{i}")`.
    pub fn load(config: AlibiConfig, vb: VarBuilder) -> Result<Self, ModelError> {
        config.validate()?;

        let mut layers = Vec::with_capacity(config.num_layers);
        for index in 0..config.num_layers {
            layers.push(AlibiTransformerLayer::load(
                &config,
                vb.pp(format!("layers.{index}")),
                index,
            )?);
        }
        log::debug!("built alibi transformer with {} layers", layers.len());

        Ok(Self { config, layers })
    }

    pub fn config(&self) -> &AlibiConfig {
        &self.config
    }

    pub fn layers(&self) -> &[AlibiTransformerLayer] {
        &self.layers
    }

    pub fn set_training(&self, training: bool) {
        for layer in &self.layers {
            layer.set_training(training);
        }
    }

    /// Applies the layers in order to `[batch, seq_len, d_model]` hidden states.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor, ModelError> {
        let mut hidden = hidden.clone();
        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }
        Ok(hidden)
    }
}
