//! # runlet-core
//!
//! Shared building blocks for the Runlet execution service: configuration
//! loaded from the environment, the wire types exchanged with clients, and
//! small filesystem/byte-size utilities used by the cache layer.

pub mod bytes;
pub mod config;
pub mod fs_size;
pub mod types;

pub use config::ServiceConfig;
pub use types::{
    ConsoleEntry, ConsoleLevel, ExecuteOptions, ExecuteRequest, ExecutionResult,
};
