//! Transformer layers with ALiBi (attention with linear biases) self-attention.

pub mod block;
pub mod config;
pub mod error;
pub mod model;

pub use block::AlibiTransformerLayer;
pub use config::AlibiConfig;
pub use error::ModelError;
pub use model::AlibiTransformer;
