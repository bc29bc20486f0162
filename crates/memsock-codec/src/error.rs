/// Errors that can occur while registering, encoding, or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The tag is already bound to another codec.
    #[error("tag {0} is already registered")]
    DuplicateTag(u8),

    /// The type already has a codec under another tag.
    #[error("type {type_name} is already registered under tag {tag}")]
    DuplicateType { type_name: &'static str, tag: u8 },

    /// No codec is registered for the value's type.
    #[error("no codec registered for type {0}")]
    UnregisteredType(&'static str),

    /// The leading tag byte does not match any registered codec.
    #[error("unknown type tag {0}")]
    UnknownTag(u8),

    /// The input ended before a complete value was read.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// A decoded value was requested as a different type.
    #[error("tag {tag} decodes to {actual}, not {expected}")]
    TypeMismatch {
        tag: u8,
        expected: &'static str,
        actual: &'static str,
    },

    /// A length-prefixed body exceeds the 32-bit length field.
    #[error("value of {size} bytes exceeds the u32 length prefix")]
    TooLarge { size: usize },

    /// A string body is not valid UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// JSON serialization or parsing failed.
    #[error("JSON codec failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
