use std::path::PathBuf;

/// Errors that can occur while managing named channels.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Channel-level error.
    #[error("channel error: {0}")]
    Channel(#[from] memsock_channel::ChannelError),

    /// The name cannot be used as a backing file stem.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A channel with this name is already held by the registry.
    #[error("channel {0:?} is already registered")]
    AlreadyRegistered(String),

    /// The registry is at capacity and its policy rejects new channels.
    #[error("registry is full ({max} channels)")]
    Full { max: usize },

    /// No channel with this name is held by the registry.
    #[error("channel {0:?} is not registered")]
    NotFound(String),

    /// The base directory could not be created.
    #[error("failed to prepare registry directory {path}: {source}")]
    BaseDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
