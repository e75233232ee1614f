//! Distance-based positional biases.

pub mod alibi;

pub use alibi::{alibi_bias, alibi_slopes, relative_positions, slope_values};
