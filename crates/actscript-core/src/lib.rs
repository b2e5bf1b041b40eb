pub mod config;
pub mod error;

pub use config::{ActscriptConfig, EngineConfig, KeyConfig, QueueMode, TargetConfig};
pub use error::{ActscriptError, Result};
