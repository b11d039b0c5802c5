use thiserror::Error;

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, BinXmlError>;
pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// A structural decode failure.
///
/// `path` is the dotted chain of context labels that were active on the cursor when the fault
/// happened (e.g. `document.fragment.template.values.value_3`), `offset` is relative to the start
/// of the top-level input buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path} (offset {offset}): {kind}")]
pub struct DeserializationError {
    pub path: String,
    pub offset: u64,
    pub kind: DeserializationErrorKind,
}

impl DeserializationError {
    pub fn kind(&self) -> &DeserializationErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeserializationErrorKind {
    #[error("buffer too small for {what} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    #[error("expected one of {{{}}}, got 0x{found:02x}", HexList(.expected))]
    UnexpectedTag { expected: Vec<u8>, found: u8 },

    #[error("name hash mismatch for `{name}` (stored 0x{stored:04x}, computed 0x{computed:04x})")]
    NameHashMismatch {
        name: String,
        stored: u16,
        computed: u16,
    },

    #[error("unread trailing bytes of size {size}")]
    UnreadTrailingBytes { size: usize },

    #[error("{what}: misaligned array (size_bytes={size}, elem_bytes={elem})")]
    MisalignedArray {
        what: &'static str,
        size: usize,
        elem: usize,
    },

    #[error("declared length {declared} of {what} is smaller than its {header} byte header")]
    LengthUnderflow {
        what: &'static str,
        declared: u32,
        header: u32,
    },

    #[error("invalid UTF-16 data in {what}")]
    InvalidUtf16 { what: &'static str },

    #[error("failed to decode ansi string (used encoding scheme {encoding}): {message}")]
    AnsiDecode {
        encoding: &'static str,
        message: String,
    },

    #[error("invalid date/time value in {what}")]
    InvalidDateTime { what: &'static str },

    #[error("nesting is deeper than the limit of {limit} levels")]
    MaxDepthExceeded { limit: usize },

    #[error("value table declares {count} slots, more than 16-bit slot ids can address")]
    TooManyValues { count: u32 },

    #[error("nested BinXML value failed to decode: {0}")]
    NestedDocument(Box<DeserializationError>),
}

struct HexList<'a>(&'a [u8]);

impl fmt::Display for HexList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "0x{:02x}", b)?;
        }
        Ok(())
    }
}

/// Errors raised while rendering an already decoded document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A value type the renderer has no textual form for.
    #[error("value type 0x{code:02x} ({name}) cannot be rendered")]
    UnsupportedValueType { code: u8, name: &'static str },

    #[error("substitution references slot {index}, but the template only has {len} values")]
    SubstitutionOutOfRange { index: u16, len: usize },

    #[error("substitution of slot {index} appears outside of any template")]
    SubstitutionOutsideTemplate { index: u16 },

    #[error("document nesting is deeper than the limit of {limit} levels")]
    MaxDepthExceeded { limit: usize },

    #[error("failed to format output: {0}")]
    Fmt(#[from] fmt::Error),
}

#[derive(Debug, Error)]
pub enum BinXmlError {
    #[error("Failed to decode BinXML: {0}")]
    Deserialization(#[from] DeserializationError),

    #[error("Failed to render BinXML: {0}")]
    Render(#[from] RenderError),

    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),

    #[error("Building a JSON document failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl BinXmlError {
    /// The dotted context path of a decode failure, if this is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            BinXmlError::Deserialization(e) => Some(&e.path),
            _ => None,
        }
    }
}
