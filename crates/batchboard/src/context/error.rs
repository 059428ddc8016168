use thiserror::Error;

/// The blob as a whole could not be read. No entries are produced.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unexpected end of stream at byte {0}")]
    UnexpectedEof(usize),

    #[error("bad stream header {magic:#06x} version {version}")]
    BadHeader { magic: u16, version: u16 },

    #[error("unknown type code {tag:#04x} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("type code {tag:#04x} not allowed here (byte {offset})")]
    UnexpectedTag { tag: u8, offset: usize },

    #[error("dangling back-reference {0:#x}")]
    BadHandle(i32),

    #[error("bad field type code {0:#04x}")]
    BadFieldType(u8),

    #[error("negative length {0}")]
    NegativeLength(i64),

    #[error("declared length {declared} exceeds the {remaining} bytes left")]
    LengthOverrun { declared: u64, remaining: usize },

    #[error("malformed modified UTF-8")]
    BadUtf8,

    #[error("stream carries a serialized exception")]
    Exception,

    #[error("externalizable class {0} written without block framing")]
    UnframedExternalizable(String),

    #[error("class hierarchy of {0} loops back on itself")]
    ClassCycle(String),

    #[error("object graph nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("stream is empty")]
    Empty,

    #[error("top-level object is {0}, not a map")]
    NotAMap(String),

    #[error("top-level map is unreadable: {0}")]
    Root(#[from] RenderError),
}

/// One value could not be rendered. Only that entry degrades.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("object graph contains a cycle")]
    Cycle,

    #[error("opaque externalizable payload of {0}")]
    Opaque(String),

    #[error("unsupported java.time serial type {0}")]
    UnsupportedTime(u8),

    #[error("invalid {0} value")]
    InvalidTime(&'static str),

    #[error("truncated payload in {0}")]
    Truncated(String),

    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("value expands past the limit of {0}")]
    TooLarge(usize),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
