use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Encoder/decoder for one concrete type.
///
/// `encode` appends to `dst`; `decode` consumes exactly the bytes it
/// produced from the front of `src`, leaving anything that follows.
pub trait TypeCodec<T>: Send + Sync {
    fn encode(&self, value: &T, dst: &mut BytesMut) -> Result<()>;
    fn decode(&self, src: &mut Bytes) -> Result<T>;
}

/// Length prefix used by the built-in codecs: u32 little-endian.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Append `body` preceded by its u32 LE length.
pub fn put_length_prefixed(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(body.len()).map_err(|_| CodecError::TooLarge { size: body.len() })?;
    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32_le(len);
    dst.put_slice(body);
    Ok(())
}

/// Split a u32 LE length-prefixed body off the front of `src`.
///
/// On error `src` is left untouched.
pub fn take_length_prefixed(src: &mut Bytes) -> Result<Bytes> {
    ensure(src, LENGTH_PREFIX_SIZE)?;
    let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
    ensure(src, LENGTH_PREFIX_SIZE + len)?;
    src.advance(LENGTH_PREFIX_SIZE);
    Ok(src.split_to(len))
}

/// Fail with [`CodecError::Truncated`] unless `src` holds `needed` bytes.
pub fn ensure(src: &Bytes, needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}
