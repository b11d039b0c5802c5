use crate::err::{DeserializationErrorKind, DeserializationResult as Result};
use crate::utils::ByteCursor;

use log::trace;
use serde::Serialize;
use std::fmt;

const NAME_HASH_MULTIPLIER: u32 = 65599;

/// An element, attribute, entity or PI-target name, together with its stored 16-bit hash.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct BinXmlName {
    pub hash: u16,
    pub text: String,
}

impl BinXmlName {
    /// Build a name from text, computing its hash.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        BinXmlName {
            hash: name_hash(&text),
            text,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Reads a name: `u16` hash, `u16` character count, the characters and a NUL terminator.
    ///
    /// The hash is recomputed from the decoded text and must match the stored one.
    pub(crate) fn from_binxml_stream(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.offset();
        let stored = cursor.u16_named("name_hash")?;
        let text = cursor.len_prefixed_utf16_string(true, "name")?;
        trace!("Offset `0x{:08x}`: name `{}`", start, text);

        let computed = name_hash(&text);
        if computed != stored {
            return Err(cursor.fail_at(
                start,
                DeserializationErrorKind::NameHashMismatch {
                    name: text,
                    stored,
                    computed,
                },
            ));
        }

        Ok(BinXmlName { hash: stored, text })
    }
}

impl fmt::Display for BinXmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `h = h * 65599 + unit` over the UTF-16 code units of `name`, folded to the low 16 bits.
pub fn name_hash(name: &str) -> u16 {
    let hash = name
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(NAME_HASH_MULTIPLIER).wrapping_add(u32::from(unit)));
    (hash & 0xFFFF) as u16
}
