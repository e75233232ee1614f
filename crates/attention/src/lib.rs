//! ALiBi self-attention primitives for the transformer project.
//!
//! The crate computes multi-head self-attention over hidden states shaped
//! `[batch, seq_len, d_model]` using Attention with Linear Biases: instead of
//! positional embeddings, every head adds a distance-proportional penalty
//! `m[h] * (j - i)` to its attention scores.
//!
//! * [`position`] builds the relative position matrix, per-head slopes and the
//!   resulting bias tensor.
//! * [`masks`] precomputes causal (optionally windowed) masks.
//! * [`reference`] hosts the exact scaled dot-product kernel behind the
//!   [`Attention`] trait.
//! * [`AlibiMultiHeadAttention`] ties projection, bias, mask, kernel and
//!   output dropout together.
//!
//! Dropout is a train-only concern; call `set_training(false)` for
//! deterministic evaluation.

pub mod core;
pub mod masks;
pub mod multihead;
pub mod position;
pub mod reference;

pub use crate::core::{Attention, AttentionConfig, AttentionError, AttentionOutput};
pub use multihead::AlibiMultiHeadAttention;
