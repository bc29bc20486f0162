use std::path::PathBuf;

use memsock_channel::ChannelConfig;

/// Default number of channels a registry holds at once.
pub const DEFAULT_MAX_CHANNELS: usize = 64;

/// Extension of backing files created under the base directory.
pub const FILE_EXTENSION: &str = "memsock";

/// What to do when a new channel arrives at a full registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Refuse the new channel with `RegistryError::Full`.
    #[default]
    Reject,
    /// Close the least recently used channel to make room.
    LeastRecentlyUsed,
}

/// Controls where channels live and how many are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Directory holding `<name>.memsock` backing files.
    pub base_dir: PathBuf,
    /// Maximum number of open channels. Default: 64.
    pub max_channels: usize,
    /// Capacities used by `create`/`open` when none are given.
    pub default_capacities: ChannelConfig,
    /// Admission behavior at `max_channels`.
    pub eviction: EvictionPolicy,
    /// Delete backing files this registry created when their channel is
    /// removed or evicted.
    pub remove_on_evict: bool,
}

impl RegistryConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("memsock"),
            max_channels: DEFAULT_MAX_CHANNELS,
            default_capacities: ChannelConfig::default(),
            eviction: EvictionPolicy::Reject,
            remove_on_evict: true,
        }
    }
}
