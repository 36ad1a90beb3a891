//! Configuration structs with sensible defaults and RON persistence.

mod config;
mod error;

pub use config::{BodyConfig, BodyKindConfig, EngineConfig, PoolConfig};
pub use error::ConfigError;
