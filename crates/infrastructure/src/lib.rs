//! Construction Manager Infrastructure - Adapters and configuration
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod config;
pub mod persistence;

pub use adapters::ReqwestHttpClient;
pub use config::{ClientConfig, ConfigError};
pub use persistence::{JsonFileStorage, MemoryStorage};
