use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::codec::TypeCodec;
use crate::error::{CodecError, Result};

/// Object-safe view of a registered codec.
trait ErasedCodec: Send + Sync {
    fn encode_any(&self, value: &dyn Any, dst: &mut BytesMut) -> Result<()>;
    fn decode_any(&self, src: &mut Bytes) -> Result<Box<dyn Any + Send>>;
    fn type_name(&self) -> &'static str;
}

struct Entry<T, C> {
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> ErasedCodec for Entry<T, C>
where
    T: Any + Send,
    C: TypeCodec<T>,
{
    fn encode_any(&self, value: &dyn Any, dst: &mut BytesMut) -> Result<()> {
        let value = value
            .downcast_ref::<T>()
            .ok_or(CodecError::UnregisteredType(std::any::type_name::<T>()))?;
        self.codec.encode(value, dst)
    }

    fn decode_any(&self, src: &mut Bytes) -> Result<Box<dyn Any + Send>> {
        Ok(Box::new(self.codec.decode(src)?))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A decoded value whose concrete type is known only through its tag.
pub struct Decoded {
    tag: u8,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl Decoded {
    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Take the value as `T`.
    pub fn downcast<T: Any>(self) -> Result<T> {
        let Decoded {
            tag,
            type_name,
            value,
        } = self;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| CodecError::TypeMismatch {
                tag,
                expected: std::any::type_name::<T>(),
                actual: type_name,
            })
    }
}

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoded")
            .field("tag", &self.tag)
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Routes values to codecs by a one-byte tag.
///
/// Encoding writes the tag of the value's type followed by the codec's
/// output. Decoding reads the tag and hands the rest to the matching codec.
/// Both ends must register the same tag for the same type.
#[derive(Default)]
pub struct CodecRegistry {
    by_tag: HashMap<u8, Box<dyn ErasedCodec>>,
    by_type: HashMap<TypeId, u8>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tag` to `codec` for values of type `T`.
    pub fn register<T, C>(&mut self, tag: u8, codec: C) -> Result<()>
    where
        T: Any + Send,
        C: TypeCodec<T> + 'static,
    {
        if self.by_tag.contains_key(&tag) {
            return Err(CodecError::DuplicateTag(tag));
        }
        if let Some(existing) = self.by_type.get(&TypeId::of::<T>()) {
            return Err(CodecError::DuplicateType {
                type_name: std::any::type_name::<T>(),
                tag: *existing,
            });
        }

        self.by_tag.insert(
            tag,
            Box::new(Entry {
                codec,
                _marker: PhantomData::<fn() -> T>,
            }),
        );
        self.by_type.insert(TypeId::of::<T>(), tag);
        debug!(tag, type_name = std::any::type_name::<T>(), "codec registered");
        Ok(())
    }

    /// Append the tag for `T` and the encoded value to `dst`.
    ///
    /// On error `dst` is restored to its previous length.
    pub fn encode<T: Any>(&self, value: &T, dst: &mut BytesMut) -> Result<()> {
        let tag = self
            .tag_of::<T>()
            .ok_or(CodecError::UnregisteredType(std::any::type_name::<T>()))?;
        let codec = self
            .by_tag
            .get(&tag)
            .ok_or(CodecError::UnknownTag(tag))?;

        let mark = dst.len();
        dst.put_u8(tag);
        if let Err(err) = codec.encode_any(value, dst) {
            dst.truncate(mark);
            return Err(err);
        }
        Ok(())
    }

    /// Read one tagged value from the front of `src`.
    ///
    /// On any error `src` is left untouched.
    pub fn decode(&self, src: &mut Bytes) -> Result<Decoded> {
        let tag = *src.first().ok_or(CodecError::Truncated {
            needed: 1,
            available: 0,
        })?;
        let codec = self.by_tag.get(&tag).ok_or(CodecError::UnknownTag(tag))?;
        let mut rest = src.clone();
        rest.advance(1);
        let value = codec.decode_any(&mut rest)?;
        *src = rest;
        Ok(Decoded {
            tag,
            type_name: codec.type_name(),
            value,
        })
    }

    /// Decode one value and require it to be a `T`.
    pub fn decode_as<T: Any>(&self, src: &mut Bytes) -> Result<T> {
        self.decode(src)?.downcast::<T>()
    }

    pub fn tag_of<T: Any>(&self) -> Option<u8> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn has_tag(&self, tag: u8) -> bool {
        self.by_tag.contains_key(&tag)
    }

    /// Registered tags in ascending order.
    pub fn tags(&self) -> Vec<u8> {
        let mut tags: Vec<u8> = self.by_tag.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for tag in self.tags() {
            if let Some(codec) = self.by_tag.get(&tag) {
                map.entry(&tag, &codec.type_name());
            }
        }
        map.finish()
    }
}
