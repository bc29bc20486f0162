//! Tag-routed object codecs.
//!
//! A [`CodecRegistry`] maps a one-byte tag to a [`TypeCodec`] for one Rust
//! type. Encoded values are `tag ‖ codec output`, so a receiver holding the
//! same registrations can decode a value without knowing its type up front.
//! Codecs work on buffers only; moving the buffer through a channel is the
//! caller's job.

pub mod builtin;
pub mod codec;
pub mod error;
pub mod registry;

pub use builtin::{BytesCodec, JsonCodec, StringCodec};
pub use codec::{ensure, put_length_prefixed, take_length_prefixed, TypeCodec, LENGTH_PREFIX_SIZE};
pub use error::{CodecError, Result};
pub use registry::{CodecRegistry, Decoded};
