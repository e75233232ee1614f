use alibi_attention::AttentionError;
use thiserror::Error;

/// Errors raised while building or running ALiBi transformer layers.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Attention(#[from] AttentionError),
    #[error(transparent)]
    Candle(#[from] candle_core::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
