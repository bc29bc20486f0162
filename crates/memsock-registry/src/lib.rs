//! Named memsock channels under one directory.
//!
//! A [`ChannelRegistry`] maps names to open [`memsock_channel::Channel`]s,
//! stores their backing files as `<base_dir>/<name>.memsock`, and enforces
//! an admission limit with an optional least-recently-used eviction policy.

pub mod config;
pub mod error;
pub mod registry;

pub use config::{EvictionPolicy, RegistryConfig, DEFAULT_MAX_CHANNELS, FILE_EXTENSION};
pub use error::{RegistryError, Result};
pub use registry::{validate_name, ChannelRegistry};
