//! Same-host IPC over memory-mapped ring buffers.
//!
//! # Crate Structure
//!
//! - [`channel`]: the mapped file, its control block and the lock-free
//!   write/read algorithm
//! - [`codec`]: one-byte tag routed object codecs (behind `codec` feature)
//! - [`registry`]: named channels with admission and eviction (behind
//!   `registry` feature)

/// Re-export channel types.
pub mod channel {
    pub use memsock_channel::*;
}

/// Re-export codec types (requires `codec` feature).
#[cfg(feature = "codec")]
pub mod codec {
    pub use memsock_codec::*;
}

/// Re-export registry types (requires `registry` feature).
#[cfg(feature = "registry")]
pub mod registry {
    pub use memsock_registry::*;
}

pub use memsock_channel::{Channel, ChannelConfig, ChannelError, Direction, Role};
