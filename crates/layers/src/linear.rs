//! Linear and affine projection helpers.
//!
//! Linear layers expect inputs shaped `(batch, seq, in_dim)` or `(rows, in_dim)`
//! and return tensors with the trailing dimension replaced by `out_dim`. Weights
//! follow the `(out_dim, in_dim)` convention so checkpoints exported from other
//! frameworks load without transposition. Fused projections (such as the
//! key/query/value projection of an attention layer) are plain linears with a
//! wider output that the caller splits along the last axis.

use candle_core::{Error, Module, Result, Tensor};
use candle_nn::{Init, VarBuilder};

use crate::checks;

/// Configuration shared by dense projection layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Output feature dimension.
    pub output_dim: usize,
    /// Whether a learnable bias vector should be applied.
    pub bias: bool,
}

impl LinearConfig {
    /// Creates a configuration for a projection with a bias term.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: true,
        }
    }

    /// Same as [`LinearConfig::new`] but without a bias term.
    pub fn without_bias(input_dim: usize, output_dim: usize) -> Self {
        Self {
            bias: false,
            ..Self::new(input_dim, output_dim)
        }
    }

    /// Uniform bound `1 / sqrt(fan_in)` used for default initialisation.
    fn init_bound(&self) -> f64 {
        1.0 / (self.input_dim.max(1) as f64).sqrt()
    }
}

/// Dense affine projection with optional bias.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    /// Constructs a linear layer from pre-existing parameters.
    pub fn new(config: LinearConfig, weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        Self::validate_weight(&config, &weight)?;
        Self::validate_bias(&config, &weight, bias.as_ref())?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Fetches (or creates) `weight` and `bias` through `vb`.
    ///
    /// Fresh parameters are drawn from `U(-1/sqrt(in_dim), 1/sqrt(in_dim))`.
    pub fn load(config: LinearConfig, vb: VarBuilder) -> Result<Self> {
        let bound = config.init_bound();
        let init = Init::Uniform {
            lo: -bound,
            up: bound,
        };
        let weight = vb.get_with_hints((config.output_dim, config.input_dim), "weight", init)?;
        let bias = if config.bias {
            Some(vb.get_with_hints(config.output_dim, "bias", init)?)
        } else {
            None
        };
        Self::new(config, weight, bias)
    }

    /// Returns the static configuration.
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Weight tensor shaped `(output_dim, input_dim)`.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Bias tensor if present.
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    fn validate_weight(config: &LinearConfig, weight: &Tensor) -> Result<()> {
        checks::expect_rank("linear.weight", weight, 2)?;
        checks::expect_shape(
            "linear.weight",
            weight,
            &[config.output_dim, config.input_dim],
        )
    }

    fn validate_bias(config: &LinearConfig, weight: &Tensor, bias: Option<&Tensor>) -> Result<()> {
        match (config.bias, bias) {
            (true, Some(tensor)) => {
                checks::expect_shape("linear.bias", tensor, &[config.output_dim])?;
                checks::expect_same_dtype("linear.bias", tensor, "linear.weight", weight)
            }
            (false, Some(_)) => Err(Error::Msg("bias provided but config disables bias".into())),
            (true, None) => Err(Error::Msg("config expects bias but none supplied".into())),
            (false, None) => Ok(()),
        }
    }

    fn validate_input(&self, hidden: &Tensor) -> Result<()> {
        checks::expect_same_dtype("linear.input", hidden, "linear.weight", &self.weight)?;
        match hidden.dims() {
            [_, _, hidden_dim] | [_, hidden_dim] if *hidden_dim == self.config.input_dim => Ok(()),
            [_, _, hidden_dim] | [_, hidden_dim] => Err(Error::Msg(format!(
                "linear.input: expected last dim {} but received {}",
                self.config.input_dim, hidden_dim
            ))),
            dims => Err(Error::Msg(format!(
                "linear expects input shaped [B, T, H_in] or [T, H_in], got {dims:?}"
            ))),
        }
    }
}

impl Module for Linear {
    fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        self.validate_input(hidden)?;

        let weight_t = self.weight.t()?;
        let mut output = match *hidden.dims() {
            [batch, seq, _] => hidden
                .reshape((batch * seq, self.config.input_dim))?
                .matmul(&weight_t)?
                .reshape((batch, seq, self.config.output_dim))?,
            _ => hidden.matmul(&weight_t)?,
        };

        if let Some(bias) = &self.bias {
            output = output.broadcast_add(bias)?;
        }
        Ok(output)
    }
}
