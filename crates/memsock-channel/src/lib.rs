//! Bidirectional ring-buffer channel over a memory-mapped file.
//!
//! Two processes on the same host map one file. The file holds a 20-byte
//! control block followed by two fixed-size rings, one per direction. Each
//! head has exactly one writer, so no locks or read-modify-write atomics are
//! needed: the writer copies bytes and then publishes its head, the reader
//! observes the head and then copies the bytes out.
//!
//! ```no_run
//! use memsock_channel::{Channel, ChannelConfig, Role};
//!
//! # fn main() -> memsock_channel::Result<()> {
//! let config = ChannelConfig::default();
//! let mut server = Channel::create("/tmp/demo.memsock", config, Role::Server)?;
//! let mut client = Channel::open("/tmp/demo.memsock", config, Role::Client)?;
//!
//! assert_eq!(server.write(b"hello"), 5);
//! let mut buf = [0u8; 16];
//! assert_eq!(client.read(&mut buf), 5);
//! # Ok(())
//! # }
//! ```

#[cfg(not(unix))]
compile_error!("memsock-channel maps files with POSIX mmap and supports unix targets only");

pub mod channel;
pub mod config;
pub mod control;
pub mod error;
pub mod layout;
mod mapping;
pub mod poll;
pub mod ring;

pub use channel::{Channel, ChannelReader, ChannelWriter, Inspection};
pub use config::{ChannelConfig, DEFAULT_CAPACITY, DEFAULT_FILE_MODE};
pub use control::{ControlSnapshot, DirectionStatus, Head};
pub use error::{ChannelError, Result};
pub use layout::{Direction, Layout, Role, CONTROL_BLOCK_SIZE, MAX_CAPACITY};
pub use poll::{read_exact, read_some, write_all, Backoff, ByteSink, ByteSource};
