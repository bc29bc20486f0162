use std::fmt;
use std::io;

use memsock_channel::ChannelError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CHANNEL_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::TimedOut => TIMEOUT,
        _ => CHANNEL_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        ChannelError::Create { source, .. }
        | ChannelError::Flush { source, .. }
        | ChannelError::Unmap { source, .. } => match source.kind() {
            io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
            io::ErrorKind::NotFound => FAILURE,
            _ => CHANNEL_ERROR,
        },
        ChannelError::SizeMismatch { .. } => DATA_INVALID,
        ChannelError::InvalidCapacity { .. } | ChannelError::RegionTooLarge { .. } => USAGE,
        ChannelError::Timeout { .. } => TIMEOUT,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsock_channel::Direction;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn channel_errors_map_to_stable_codes() {
        let denied = ChannelError::Create {
            path: PathBuf::from("/x"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(channel_error("open", denied).code, PERMISSION_DENIED);

        let capacity = ChannelError::InvalidCapacity {
            direction: Direction::ServerToClient,
            capacity: 0,
            max: memsock_channel::MAX_CAPACITY,
        };
        assert_eq!(channel_error("create", capacity).code, USAGE);

        let timeout = ChannelError::Timeout {
            elapsed: Duration::from_secs(1),
            transferred: 0,
            requested: 4,
        };
        let err = channel_error("send", timeout);
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("send: timed out"));
    }
}
