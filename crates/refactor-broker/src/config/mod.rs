//! Configuration management for the broker

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    AnalysisConfig, BackupConfig, BrokerConfig, FindConfig, HealthConfig, ResolverConfig,
};
