//! Building blocks for transformer layers.
//!
//! Projections, normalisation, activations, dropout and the position-wise
//! feed-forward block, assembled from Candle primitives. Parameters are
//! created through [`candle_nn::VarBuilder`] so they can be trained with a
//! `VarMap` or loaded from a checkpoint under stable names.

pub mod activations;
pub mod checks;
pub mod dropout;
pub mod linear;
pub mod mlp;
pub mod norm;

pub use activations::ActivationKind;
pub use dropout::Dropout;
pub use linear::{Linear, LinearConfig};
pub use mlp::{FeedForward, FeedForwardConfig};
pub use norm::{LayerNorm, NormConfig};
