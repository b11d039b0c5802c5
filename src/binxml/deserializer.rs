use crate::binxml::name::BinXmlName;
use crate::binxml::tokens::{
    BinXmlRawToken, CONTENT_TOKENS, ELEMENT_BODY_TOKENS, Tag, read_cdata, read_char_ref,
    read_entity_ref, read_processing_instruction, read_substitution, read_tag, read_value_text,
};
use crate::binxml::value_variant::{Value, ValueTypeCode};
use crate::err::{DeserializationErrorKind, DeserializationResult as Result};
use crate::guid::Guid;
use crate::model::{
    Attribute, Content, Document, Element, ElementBody, Fragment, FragmentBody, Template,
    TemplateValues,
};
use crate::settings::ParserSettings;
use crate::utils::{ByteCursor, hexdump_around};

use log::{debug, trace};
use std::cell::Cell;

/// Bytes shown on each side of a failing offset in the debug hexdump.
const HEXDUMP_RADIUS: usize = 32;

/// Elements, templates and nested BinXML values may be nested at most this deep.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Decode a complete BinXML document. The input must be consumed exactly.
pub(crate) fn decode_document(data: &[u8], settings: &ParserSettings) -> Result<Document> {
    decode_document_at_depth(data, settings, 0)
}

/// Same as [`decode_document`], for a document embedded `depth` levels deep in another one.
pub(crate) fn decode_document_at_depth(
    data: &[u8],
    settings: &ParserSettings,
    depth: usize,
) -> Result<Document> {
    let mut cursor = ByteCursor::new(data);
    let deserializer = BinXmlDeserializer::with_depth(settings, depth);

    let res = cursor.scoped("document", |c| {
        let document = deserializer.read_document(c)?;
        match c.remaining() {
            0 => Ok(document),
            size => Err(c.fail(DeserializationErrorKind::UnreadTrailingBytes { size })),
        }
    });

    if let Err(e) = &res {
        debug!(
            "Failed to decode BinXML: {}\n{}",
            e,
            hexdump_around(data, e.offset as usize, HEXDUMP_RADIUS)
        );
    }

    res
}

/// Recursive-descent decoder over the tag stream.
pub(crate) struct BinXmlDeserializer<'s> {
    settings: &'s ParserSettings,
    depth: Cell<usize>,
}

impl<'s> BinXmlDeserializer<'s> {
    pub(crate) fn with_depth(settings: &'s ParserSettings, depth: usize) -> Self {
        BinXmlDeserializer {
            settings,
            depth: Cell::new(depth),
        }
    }

    /// Runs `f` one nesting level deeper, faulting instead once the limit is reached.
    fn descend<'a, T>(
        &self,
        cursor: &mut ByteCursor<'a>,
        f: impl FnOnce(&mut ByteCursor<'a>) -> Result<T>,
    ) -> Result<T> {
        let depth = self.depth.get() + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(cursor.fail(DeserializationErrorKind::MaxDepthExceeded {
                limit: MAX_NESTING_DEPTH,
            }));
        }

        self.depth.set(depth);
        let res = f(cursor);
        self.depth.set(depth - 1);
        res
    }

    /// `[PI] fragment-header Fragment (EOF | PI EOF)`
    pub(crate) fn read_document(&self, cursor: &mut ByteCursor<'_>) -> Result<Document> {
        let tag = read_tag(
            cursor,
            &[
                BinXmlRawToken::ProcessingInstructionTarget,
                BinXmlRawToken::FragmentHeader,
            ],
        )?;

        let prolog = if tag.token() == Some(BinXmlRawToken::ProcessingInstructionTarget) {
            let pi = cursor.scoped("prolog", read_processing_instruction)?;
            read_tag(cursor, &[BinXmlRawToken::FragmentHeader])?;
            Some(pi)
        } else {
            None
        };

        let fragment = cursor.scoped("fragment", |c| self.read_fragment(c))?;

        let tag = read_tag(
            cursor,
            &[
                BinXmlRawToken::EndOfStream,
                BinXmlRawToken::ProcessingInstructionTarget,
            ],
        )?;

        let misc = if tag.token() == Some(BinXmlRawToken::ProcessingInstructionTarget) {
            let pi = cursor.scoped("misc", read_processing_instruction)?;
            read_tag(cursor, &[BinXmlRawToken::EndOfStream])?;
            Some(pi)
        } else {
            None
        };

        Ok(Document {
            prolog,
            fragment,
            misc,
        })
    }

    /// A fragment, after its header tag.
    fn read_fragment(&self, cursor: &mut ByteCursor<'_>) -> Result<Fragment> {
        let major_version = cursor.u8_named("fragment_major_version")?;
        let minor_version = cursor.u8_named("fragment_minor_version")?;
        let flags = cursor.u8_named("fragment_flags")?;
        trace!(
            "Fragment version {}.{} (flags 0x{:02x})",
            major_version, minor_version, flags
        );

        let tag = read_tag(
            cursor,
            &[
                BinXmlRawToken::TemplateInstance,
                BinXmlRawToken::OpenStartElement,
            ],
        )?;

        let body = match tag.token() {
            Some(BinXmlRawToken::TemplateInstance) => FragmentBody::Template(
                cursor.scoped("template", |c| self.descend(c, |c| self.read_template(c)))?,
            ),
            _ => FragmentBody::Element(cursor.scoped("element", |c| {
                self.descend(c, |c| self.read_element(c, tag.more_follows()))
            })?),
        };

        Ok(Fragment {
            major_version,
            minor_version,
            flags,
            body,
        })
    }

    /// The template body is captured first, the value table that follows it is decoded, and
    /// only then is the captured body parsed as an isolated `fragment-header Fragment EOF`.
    fn read_template(&self, cursor: &mut ByteCursor<'_>) -> Result<Template> {
        let pad = cursor.u8_named("template_pad")?;
        if pad != 0x01 {
            trace!("Unexpected template pad byte 0x{:02x}", pad);
        }

        let guid = Guid::from_bytes(&cursor.array::<16>("template_guid")?);
        let data_size = cursor.u32_named("template_data_size")?;

        let body_offset = cursor.offset();
        let body = cursor.take_bytes(data_size as usize, "template_body")?;

        let values = cursor.scoped("values", |c| self.read_template_values(c))?;
        debug!(
            "Template {} with a body of {} bytes and {} values",
            guid,
            data_size,
            values.len()
        );

        let fragment = cursor.scoped("body", |c| {
            c.decode_region(body, body_offset, |sub| {
                read_tag(sub, &[BinXmlRawToken::FragmentHeader])?;
                let fragment = sub.scoped("fragment", |s| self.read_fragment(s))?;
                read_tag(sub, &[BinXmlRawToken::EndOfStream])?;
                Ok(fragment)
            })
        })?;

        Ok(Template {
            guid,
            data_size,
            fragment: Box::new(fragment),
            values,
        })
    }

    /// All slot headers first, then the bodies of the slots with a non-zero length.
    fn read_template_values(&self, cursor: &mut ByteCursor<'_>) -> Result<TemplateValues> {
        let count = cursor.u32_named("value_count")?;

        // Slot ids are 16 bits wide.
        if count > u32::from(u16::MAX) + 1 {
            return Err(cursor.fail(DeserializationErrorKind::TooManyValues { count }));
        }

        // Each header takes 4 bytes, don't trust `count` for the allocation.
        let mut headers = Vec::with_capacity((count as usize).min(cursor.remaining() / 4));
        for i in 0..count {
            let header = cursor.scoped(format!("value_{}", i), |c| {
                let length = c.u16_named("value_length")?;
                let value_type = ValueTypeCode::from_u8(c.u8_named("value_type")?);
                let _ = c.u8_named("value_pad")?;
                Ok((length, value_type))
            })?;
            headers.push(header);
        }

        let mut values = Vec::with_capacity(headers.len());
        for (id, (length, value_type)) in (0..=u16::MAX).zip(headers) {
            if length == 0 {
                values.push(Value::empty(id, value_type));
                continue;
            }

            let value = cursor.scoped(format!("value_{}", id), |c| {
                let offset = c.offset();
                let span = c.take_bytes(usize::from(length), "value_data")?;
                c.decode_region(span, offset, |sub| {
                    Value::from_cursor(sub, id, value_type, self.settings, self.depth.get())
                })
            })?;
            values.push(value);
        }

        Ok(TemplateValues(values))
    }

    /// An element, after its open-start tag. `has_attributes` is the tag's continuation bit.
    fn read_element(&self, cursor: &mut ByteCursor<'_>, has_attributes: bool) -> Result<Element> {
        let start = cursor.offset();
        let dependency = cursor.i16_named("dependency_id")?;
        let dependency_id = if dependency < 0 {
            None
        } else {
            Some(dependency as u16)
        };

        cursor.read_with_length(false, "element_data_size", |c| {
            let name = c.scoped("name", BinXmlName::from_binxml_stream)?;
            trace!("Offset `0x{:08x}`: element <{}>", start, name);

            let attributes = if has_attributes {
                c.read_with_length(false, "attribute_list_size", |c| {
                    self.read_attribute_list(c)
                })?
            } else {
                Vec::new()
            };

            let tag = read_tag(
                c,
                &[
                    BinXmlRawToken::CloseStartElement,
                    BinXmlRawToken::CloseEmptyElement,
                ],
            )?;

            let body = match tag.token() {
                Some(BinXmlRawToken::CloseEmptyElement) => ElementBody::Empty,
                _ => ElementBody::Content(self.read_element_body(c)?),
            };

            Ok(Element {
                dependency_id,
                name,
                attributes,
                body,
            })
        })
    }

    fn read_attribute_list(&self, cursor: &mut ByteCursor<'_>) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        loop {
            let tag = read_tag(cursor, &[BinXmlRawToken::Attribute])?;
            let attribute =
                cursor.scoped(format!("attr_{}", attributes.len()), |c| self.read_attribute(c))?;
            attributes.push(attribute);

            if !tag.more_follows() {
                break;
            }
        }
        Ok(attributes)
    }

    fn read_attribute(&self, cursor: &mut ByteCursor<'_>) -> Result<Attribute> {
        let name = cursor.scoped("name", BinXmlName::from_binxml_stream)?;

        let mut value = Vec::new();
        loop {
            let tag = read_tag(cursor, CONTENT_TOKENS)?;
            value.push(self.read_content(cursor, tag)?);

            if !tag.more_follows() {
                break;
            }
        }

        Ok(Attribute { name, value })
    }

    fn read_element_body(&self, cursor: &mut ByteCursor<'_>) -> Result<Vec<Content>> {
        let mut content = Vec::new();
        loop {
            let tag = read_tag(cursor, ELEMENT_BODY_TOKENS)?;
            if tag.token() == Some(BinXmlRawToken::EndElement) {
                break;
            }
            content.push(self.read_content(cursor, tag)?);
        }
        Ok(content)
    }

    fn read_content(&self, cursor: &mut ByteCursor<'_>, tag: Tag) -> Result<Content> {
        match tag.token() {
            Some(BinXmlRawToken::OpenStartElement) => cursor
                .scoped("element", |c| {
                    self.descend(c, |c| self.read_element(c, tag.more_follows()))
                })
                .map(Content::Element),
            Some(BinXmlRawToken::Value) => cursor.scoped("text", read_value_text).map(Content::Text),
            Some(BinXmlRawToken::CDataSection) => {
                cursor.scoped("cdata", read_cdata).map(Content::CData)
            }
            Some(BinXmlRawToken::CharReference) => {
                cursor.scoped("char_ref", read_char_ref).map(Content::CharRef)
            }
            Some(BinXmlRawToken::EntityReference) => cursor
                .scoped("entity_ref", read_entity_ref)
                .map(Content::EntityRef),
            Some(BinXmlRawToken::ProcessingInstructionTarget) => cursor
                .scoped("pi", read_processing_instruction)
                .map(Content::ProcessingInstruction),
            Some(BinXmlRawToken::NormalSubstitution) => cursor
                .scoped("substitution", read_substitution)
                .map(Content::Substitution),
            Some(BinXmlRawToken::OptionalSubstitution) => cursor
                .scoped("optional_substitution", read_substitution)
                .map(Content::OptionalSubstitution),
            _ => Err(cursor.fail(DeserializationErrorKind::UnexpectedTag {
                expected: CONTENT_TOKENS.iter().map(|t| t.code()).collect(),
                found: tag.0,
            })),
        }
    }
}
