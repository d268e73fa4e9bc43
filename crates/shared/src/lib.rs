//! Shared errors and configuration for Gazeta.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types
//! - Configuration management (server, storage backend, cache, ingestion, deployment)

pub mod config;
pub mod error;

pub use config::{
    AppConfig, CacheConfig, DeploymentConfig, IngestConfig, ServerConfig, StorageConfig,
    StorageProvider,
};
pub use error::{AppError, AppResult};
