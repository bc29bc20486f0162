use std::path::PathBuf;
use std::time::Duration;

use crate::layout::Direction;

/// Errors that can occur while creating, opening, or shutting down a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The backing file could not be opened, sized, or mapped.
    #[error("failed to create channel at {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An existing backing file is not exactly the size of the requested
    /// layout, so the peers disagree on capacities.
    #[error("channel file {path} is {len} bytes, layout requires exactly {required}")]
    SizeMismatch {
        path: PathBuf,
        len: u64,
        required: u64,
    },

    /// A ring capacity is zero or does not fit below the head lap bit.
    #[error("invalid {direction} capacity {capacity} (must be 1..={max})")]
    InvalidCapacity {
        direction: Direction,
        capacity: u32,
        max: u32,
    },

    /// The combined region does not fit in the address space.
    #[error("channel region of {total} bytes exceeds the addressable size")]
    RegionTooLarge { total: u64 },

    /// Flushing the mapping to its backing file failed.
    #[error("failed to flush channel {path}: {source}")]
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Unmapping the region failed during close.
    #[error("failed to unmap channel {path}: {source}")]
    Unmap {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A blocking helper ran out of time before the transfer completed.
    #[error("timed out after {elapsed:?} ({transferred} of {requested} bytes transferred)")]
    Timeout {
        elapsed: Duration,
        transferred: usize,
        requested: usize,
    },
}

impl ChannelError {
    /// True for failures to produce a usable mapping (create or open).
    pub fn is_creation_error(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::SizeMismatch { .. })
    }

    /// True for rejected capacity parameters.
    pub fn is_capacity_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCapacity { .. } | Self::RegionTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
