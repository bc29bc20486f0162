use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{put_length_prefixed, take_length_prefixed, TypeCodec};
use crate::error::Result;

/// Raw bytes, u32 LE length prefixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl TypeCodec<Bytes> for BytesCodec {
    fn encode(&self, value: &Bytes, dst: &mut BytesMut) -> Result<()> {
        put_length_prefixed(value, dst)
    }

    fn decode(&self, src: &mut Bytes) -> Result<Bytes> {
        take_length_prefixed(src)
    }
}

impl TypeCodec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>, dst: &mut BytesMut) -> Result<()> {
        put_length_prefixed(value, dst)
    }

    fn decode(&self, src: &mut Bytes) -> Result<Vec<u8>> {
        Ok(take_length_prefixed(src)?.to_vec())
    }
}

/// UTF-8 text, u32 LE length prefixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl TypeCodec<String> for StringCodec {
    fn encode(&self, value: &String, dst: &mut BytesMut) -> Result<()> {
        put_length_prefixed(value.as_bytes(), dst)
    }

    fn decode(&self, src: &mut Bytes) -> Result<String> {
        let body = take_length_prefixed(src)?;
        Ok(String::from_utf8(body.to_vec())?)
    }
}

/// Any serde type as JSON text, u32 LE length prefixed.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> TypeCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T, dst: &mut BytesMut) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        put_length_prefixed(&body, dst)
    }

    fn decode(&self, src: &mut Bytes) -> Result<T> {
        let mut rest = src.clone();
        let body = take_length_prefixed(&mut rest)?;
        let value = serde_json::from_slice(&body)?;
        *src = rest;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quote {
        symbol: String,
        bid: u64,
        ask: u64,
    }

    #[test]
    fn string_codec_rejects_invalid_utf8() {
        let mut src = Bytes::from_static(&[2, 0, 0, 0, 0xc3, 0x28]);
        let err = StringCodec.decode(&mut src).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
    }

    #[test]
    fn string_codec_handles_multibyte_text() {
        let mut dst = BytesMut::new();
        StringCodec.encode(&"héllo".to_string(), &mut dst).unwrap();
        assert_eq!(&dst[..4], &[6, 0, 0, 0]);
        let mut src = dst.freeze();
        assert_eq!(StringCodec.decode(&mut src).unwrap(), "héllo");
        assert!(src.is_empty());
    }

    #[test]
    fn json_codec_encodes_struct_as_text() {
        let codec = JsonCodec::<Quote>::new();
        let quote = Quote {
            symbol: "ABC".into(),
            bid: 99,
            ask: 101,
        };
        let mut dst = BytesMut::new();
        codec.encode(&quote, &mut dst).unwrap();
        assert_eq!(&dst[4..], br#"{"symbol":"ABC","bid":99,"ask":101}"#);

        let mut src = dst.freeze();
        assert_eq!(codec.decode(&mut src).unwrap(), quote);
    }

    #[test]
    fn json_codec_leaves_input_on_parse_error() {
        let mut dst = BytesMut::new();
        put_length_prefixed(b"{not json", &mut dst).unwrap();
        let mut src = dst.freeze();
        let before = src.len();
        let err = JsonCodec::<Quote>::new().decode(&mut src).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
        assert_eq!(src.len(), before);
    }

    #[test]
    fn bytes_codec_supports_vec_and_bytes() {
        let mut dst = BytesMut::new();
        TypeCodec::<Vec<u8>>::encode(&BytesCodec, &vec![1, 2, 3], &mut dst).unwrap();
        let mut src = dst.freeze();
        let decoded: Bytes = BytesCodec.decode(&mut src).unwrap();
        assert_eq!(&decoded[..], &[1, 2, 3]);
    }
}
