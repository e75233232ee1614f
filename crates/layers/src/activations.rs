//! Activation catalogue for transformer feed-forward stacks.
//!
//! Activations are elementwise, so any input layout is accepted and preserved.
//!
//! # Built-in formulas
//!
//! * **GELU** uses the exact erf form `0.5 * x * (1 + erf(x / sqrt(2)))`.
//! * **GELU (tanh)** uses the tanh approximation popularised by GPT-2.
//! * **SiLU / Swish** computes `x * sigmoid(x)`.
//! * **ReLU** clamps negatives to zero.

use candle_core::{Result, Tensor};
use serde::{Deserialize, Serialize};

/// Identifies which non-linearity a feed-forward block applies.
///
/// Serialised in snake case: `gelu`, `gelu_tanh`, `silu`, `relu`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    /// Exact GELU.
    #[default]
    Gelu,
    /// GELU with the tanh approximation.
    GeluTanh,
    /// Standard SiLU (a.k.a. swish) activation.
    Silu,
    /// Rectified linear unit.
    Relu,
}

impl ActivationKind {
    /// Applies the activation to `input`.
    pub fn forward(self, input: &Tensor) -> Result<Tensor> {
        match self {
            ActivationKind::Gelu => input.gelu_erf(),
            ActivationKind::GeluTanh => input.gelu(),
            ActivationKind::Silu => input.silu(),
            ActivationKind::Relu => input.relu(),
        }
    }
}
