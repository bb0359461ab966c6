pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    CuratorConfig, EmbeddingConfig, GeneralConfig, RankingConfig, RetryConfig, ScoringConfig,
};
pub use error::{CuratorError, Result};
pub use types::*;
