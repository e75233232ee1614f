use alibi_attention::{AlibiMultiHeadAttention, AttentionError};
use alibi_layers::{checks, FeedForward, LayerNorm};
use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

use crate::{config::AlibiConfig, ModelError};

/// Pre-norm transformer layer: `x + attn(norm(x))` followed by `x + ffn(norm(x))`.
#[derive(Debug)]
pub struct AlibiTransformerLayer {
    d_model: usize,
    attn_norm: LayerNorm,
    ffn_norm: LayerNorm,
    attn: AlibiMultiHeadAttention,
    ffn: FeedForward,
}

impl AlibiTransformerLayer {
    /// Fetches (or creates) the layer parameters under `vb`.
    ///
    /// `index` only seeds the dropout streams so that stacked layers draw
    /// different masks.
    pub fn load(config: &AlibiConfig, vb: VarBuilder, index: usize) -> Result<Self, ModelError> {
        config.validate()?;
        let base_seed = (index as u64).saturating_mul(2);

        let attn_norm = LayerNorm::load(config.norm_config(), vb.pp("attn_norm"))?;
        let ffn_norm = LayerNorm::load(config.norm_config(), vb.pp("ffn_norm"))?;
        let attn =
            AlibiMultiHeadAttention::load(config.attention_config(), vb.pp("attn"), base_seed)?;
        let ffn = FeedForward::load(config.feed_forward_config(), vb.pp("ffn"), base_seed + 1)?;

        log::debug!(
            "built alibi layer {index}: d_model={} heads={} d_hidden={} window={:?}",
            config.d_model,
            config.num_heads,
            config.d_hidden(),
            config.window
        );

        Ok(Self {
            d_model: config.d_model,
            attn_norm,
            ffn_norm,
            attn,
            ffn,
        })
    }

    pub fn attention(&self) -> &AlibiMultiHeadAttention {
        &self.attn
    }

    pub fn feed_forward(&self) -> &FeedForward {
        &self.ffn
    }

    /// Switches every dropout in the layer between training and evaluation.
    pub fn set_training(&self, training: bool) {
        self.attn.set_training(training);
        self.ffn.set_training(training);
    }

    /// Runs the layer on `[batch, seq_len, d_model]` hidden states.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor, ModelError> {
        checks::expect_batch_seq_hidden("alibi_layer.input", hidden, self.d_model).map_err(
            |err| AttentionError::InvalidShape {
                context: err.to_string(),
            },
        )?;

        let normed = self.attn_norm.forward(hidden)?;
        let attended = self.attn.forward(&normed)?;
        let hidden = hidden.add(&attended)?;

        let normed = self.ffn_norm.forward(&hidden)?;
        let transformed = self.ffn.forward(&normed)?;
        Ok(hidden.add(&transformed)?)
    }
}
