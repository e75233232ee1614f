use std::{fs, path::Path};

use alibi_attention::AttentionConfig;
use alibi_layers::{ActivationKind, FeedForwardConfig, NormConfig};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Hyperparameters shared by every ALiBi transformer layer.
///
/// Missing fields fall back to [`AlibiConfig::default`] when deserialising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlibiConfig {
    /// Number of stacked layers.
    pub num_layers: usize,
    /// Embedding width; must be divisible by `num_heads`.
    pub d_model: usize,
    pub num_heads: usize,
    /// Longest sequence covered by the precomputed causal mask.
    pub max_len: usize,
    /// Dropout probability for the attention and feed-forward outputs.
    pub dropout: f32,
    pub causal: bool,
    /// Feed-forward hidden width multiplier.
    pub expansion_factor: usize,
    /// Non-linearity between the feed-forward projections.
    pub activation: ActivationKind,
    /// Layer norm stabiliser.
    pub lnorm_eps: f64,
    /// Number of past tokens a position may look back on (requires `causal`).
    pub window: Option<usize>,
}

impl Default for AlibiConfig {
    fn default() -> Self {
        Self {
            num_layers: 6,
            d_model: 256,
            num_heads: 8,
            max_len: 256,
            dropout: 0.1,
            causal: true,
            expansion_factor: 1,
            activation: ActivationKind::Gelu,
            lnorm_eps: 1e-6,
            window: None,
        }
    }
}

impl AlibiConfig {
    /// Reads a TOML (`.toml` or no extension) or JSON (`.json`) file and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            Some("toml") | None => Self::from_toml_str(&contents)?,
            Some(other) => {
                return Err(ModelError::UnsupportedFormat(format!(
                    "unsupported configuration extension '{other}'"
                )));
            }
        };
        log::debug!("loaded alibi config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ModelError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ModelError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants, reporting every violation at once.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut errors = Vec::new();

        if self.num_layers == 0 {
            errors.push("num_layers must be greater than zero".to_string());
        }
        if self.d_model == 0 {
            errors.push("d_model must be greater than zero".to_string());
        }
        if self.num_heads == 0 {
            errors.push("num_heads must be greater than zero".to_string());
        } else if self.d_model % self.num_heads != 0 {
            errors.push(format!(
                "d_model ({}) must be divisible by num_heads ({})",
                self.d_model, self.num_heads
            ));
        }
        if self.max_len == 0 {
            errors.push("max_len must be greater than zero".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            errors.push(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if self.expansion_factor == 0 {
            errors.push("expansion_factor must be greater than zero".to_string());
        }
        if !(self.lnorm_eps.is_finite() && self.lnorm_eps > 0.0) {
            errors.push(format!(
                "lnorm_eps must be a positive finite number, got {}",
                self.lnorm_eps
            ));
        }
        match self.window {
            Some(0) => errors.push("window must be greater than zero".to_string()),
            Some(_) if !self.causal => errors.push("window requires causal attention".to_string()),
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModelError::Config(errors.join("; ")))
        }
    }

    /// Width of one attention head.
    pub fn d_head(&self) -> usize {
        self.d_model / self.num_heads.max(1)
    }

    /// Width of the feed-forward hidden layer.
    pub fn d_hidden(&self) -> usize {
        self.d_model * self.expansion_factor
    }

    pub fn attention_config(&self) -> AttentionConfig {
        AttentionConfig {
            d_model: self.d_model,
            num_heads: self.num_heads,
            max_len: self.max_len,
            causal: self.causal,
            window: self.window,
            dropout_p: self.dropout,
        }
    }

    pub fn feed_forward_config(&self) -> FeedForwardConfig {
        FeedForwardConfig {
            activation: self.activation,
            dropout_p: self.dropout,
            ..FeedForwardConfig::with_expansion_factor(self.d_model, self.expansion_factor)
        }
    }

    pub fn norm_config(&self) -> NormConfig {
        NormConfig::new(self.d_model, self.lnorm_eps)
    }
}
