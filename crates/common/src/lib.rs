//! Shared types, config, and error definitions for the exporter.

pub mod bucket;
pub mod config;
pub mod error;
pub mod types;

pub use bucket::bucket_of;
pub use config::ExporterConfig;
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
