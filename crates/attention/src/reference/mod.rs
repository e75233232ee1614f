//! Portable, exact implementations of scaled dot-product attention.
//!
//! These paths favour clarity over absolute performance and serve as the
//! baseline for validating optimized kernels.

pub mod exact;

pub use exact::ExactAttention;
