//! Mask utilities shared by attention implementations.
//!
//! Masks produced here are `u8` tensors where `1` marks a permitted
//! query/key pair and `0` a blocked one. Kernels turn blocked entries into
//! `-inf` scores right before the softmax, so a blocked key always ends up
//! with zero weight.

pub mod causal;

use candle_core::DType;

/// Dtype shared by all boolean masks.
pub const MASK_DTYPE: DType = DType::U8;

pub use causal::{build_causal_window_mask, slice_mask};
