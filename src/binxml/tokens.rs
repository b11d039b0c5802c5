use crate::binxml::name::BinXmlName;
use crate::binxml::value_variant::ValueTypeCode;
use crate::err::{DeserializationErrorKind, DeserializationResult as Result};
use crate::model::{ProcessingInstruction, Substitution};
use crate::utils::ByteCursor;

use log::trace;
use std::fmt;

/// Set on a tag byte when another item of the same kind follows (or, for element tags, when the
/// element carries attributes).
pub(crate) const MORE_FOLLOWS: u8 = 0x40;

/// Structural token codes, with the continuation bit masked off.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum BinXmlRawToken {
    EndOfStream = 0x00,
    OpenStartElement = 0x01,
    CloseStartElement = 0x02,
    CloseEmptyElement = 0x03,
    EndElement = 0x04,
    Value = 0x05,
    Attribute = 0x06,
    CDataSection = 0x07,
    CharReference = 0x08,
    EntityReference = 0x09,
    ProcessingInstructionTarget = 0x0a,
    ProcessingInstructionData = 0x0b,
    TemplateInstance = 0x0c,
    NormalSubstitution = 0x0d,
    OptionalSubstitution = 0x0e,
    FragmentHeader = 0x0f,
}

impl BinXmlRawToken {
    pub fn from_code(code: u8) -> Option<BinXmlRawToken> {
        match code {
            0x00 => Some(BinXmlRawToken::EndOfStream),
            // <Event>
            0x01 => Some(BinXmlRawToken::OpenStartElement),
            // Indicates end of start element
            0x02 => Some(BinXmlRawToken::CloseStartElement),
            0x03 => Some(BinXmlRawToken::CloseEmptyElement),
            // </Event>
            0x04 => Some(BinXmlRawToken::EndElement),
            0x05 => Some(BinXmlRawToken::Value),
            0x06 => Some(BinXmlRawToken::Attribute),
            0x07 => Some(BinXmlRawToken::CDataSection),
            0x08 => Some(BinXmlRawToken::CharReference),
            0x09 => Some(BinXmlRawToken::EntityReference),
            0x0a => Some(BinXmlRawToken::ProcessingInstructionTarget),
            0x0b => Some(BinXmlRawToken::ProcessingInstructionData),
            0x0c => Some(BinXmlRawToken::TemplateInstance),
            0x0d => Some(BinXmlRawToken::NormalSubstitution),
            0x0e => Some(BinXmlRawToken::OptionalSubstitution),
            0x0f => Some(BinXmlRawToken::FragmentHeader),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Tags that may start a content node (inside an element body or an attribute value).
pub(crate) const CONTENT_TOKENS: &[BinXmlRawToken] = &[
    BinXmlRawToken::OpenStartElement,
    BinXmlRawToken::Value,
    BinXmlRawToken::CDataSection,
    BinXmlRawToken::CharReference,
    BinXmlRawToken::EntityReference,
    BinXmlRawToken::ProcessingInstructionTarget,
    BinXmlRawToken::NormalSubstitution,
    BinXmlRawToken::OptionalSubstitution,
];

/// Tags that may appear where an element body continues.
pub(crate) const ELEMENT_BODY_TOKENS: &[BinXmlRawToken] = &[
    BinXmlRawToken::EndElement,
    BinXmlRawToken::OpenStartElement,
    BinXmlRawToken::Value,
    BinXmlRawToken::CDataSection,
    BinXmlRawToken::CharReference,
    BinXmlRawToken::EntityReference,
    BinXmlRawToken::ProcessingInstructionTarget,
    BinXmlRawToken::NormalSubstitution,
    BinXmlRawToken::OptionalSubstitution,
];

/// A raw tag byte as read from the stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Tag(pub u8);

impl Tag {
    /// The structural code, without the continuation bit.
    #[inline]
    pub fn code(self) -> u8 {
        self.0 & !MORE_FOLLOWS
    }

    #[inline]
    pub fn more_follows(self) -> bool {
        self.0 & MORE_FOLLOWS != 0
    }

    pub fn token(self) -> Option<BinXmlRawToken> {
        BinXmlRawToken::from_code(self.code())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Read one tag byte and check that it denotes one of `expected`.
pub(crate) fn read_tag(cursor: &mut ByteCursor<'_>, expected: &[BinXmlRawToken]) -> Result<Tag> {
    let offset = cursor.offset();
    let tag = Tag(cursor.u8_named("tag")?);

    match tag.token() {
        Some(token) if expected.contains(&token) => {
            trace!("Offset `0x{:08x}`: {:?} ({})", offset, token, tag);
            Ok(tag)
        }
        _ => Err(cursor.fail_at(
            offset,
            DeserializationErrorKind::UnexpectedTag {
                expected: expected.iter().map(|t| t.code()).collect(),
                found: tag.0,
            },
        )),
    }
}

/// Value text: one pad byte, then a size-prefixed UTF-16 string.
pub(crate) fn read_value_text(cursor: &mut ByteCursor<'_>) -> Result<String> {
    let pad = cursor.u8_named("value_text_pad")?;
    if pad != 0x01 {
        trace!("Unexpected value text pad byte 0x{:02x}", pad);
    }
    cursor.len_prefixed_utf16_string(false, "value_text")
}

pub(crate) fn read_cdata(cursor: &mut ByteCursor<'_>) -> Result<String> {
    cursor.len_prefixed_utf16_string(false, "cdata")
}

pub(crate) fn read_char_ref(cursor: &mut ByteCursor<'_>) -> Result<u16> {
    cursor.u16_named("char_ref")
}

pub(crate) fn read_entity_ref(cursor: &mut ByteCursor<'_>) -> Result<BinXmlName> {
    BinXmlName::from_binxml_stream(cursor)
}

/// Slot id and declared value type of a (normal or optional) substitution.
pub(crate) fn read_substitution(cursor: &mut ByteCursor<'_>) -> Result<Substitution> {
    let id = cursor.u16_named("substitution_id")?;
    let value_type = ValueTypeCode::from_u8(cursor.u8_named("substitution_value_type")?);
    trace!("Substitution of slot {} ({:?})", id, value_type);

    Ok(Substitution { id, value_type })
}

/// A processing instruction, after its target tag: name, data tag, size-prefixed data.
pub(crate) fn read_processing_instruction(
    cursor: &mut ByteCursor<'_>,
) -> Result<ProcessingInstruction> {
    let target = cursor.scoped("target", BinXmlName::from_binxml_stream)?;
    read_tag(cursor, &[BinXmlRawToken::ProcessingInstructionData])?;
    let data = cursor.len_prefixed_utf16_string(false, "pi_data")?;

    Ok(ProcessingInstruction { target, data })
}
