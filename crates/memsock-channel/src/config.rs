/// Default capacity of each ring: 64 KiB.
pub const DEFAULT_CAPACITY: u32 = 64 * 1024;

/// Default permission mode for created channel files.
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Construction parameters shared by both peers of a channel.
///
/// Both sides must agree on the capacities; the joining side uses them to
/// validate the size of the file it maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Capacity of the server→client ring in bytes. Default: 64 KiB.
    pub server_to_client_capacity: u32,
    /// Capacity of the client→server ring in bytes. Default: 64 KiB.
    pub client_to_server_capacity: u32,
    /// Permission mode applied to files created by `Channel::create`.
    pub file_mode: u32,
}

impl ChannelConfig {
    /// Config with explicit capacities and the default file mode.
    pub fn with_capacities(server_to_client: u32, client_to_server: u32) -> Self {
        Self {
            server_to_client_capacity: server_to_client,
            client_to_server_capacity: client_to_server,
            ..Self::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            server_to_client_capacity: DEFAULT_CAPACITY,
            client_to_server_capacity: DEFAULT_CAPACITY,
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}
