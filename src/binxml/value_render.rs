//! Value-to-text rendering for decoded value items.
//!
//! Numbers, GUIDs, timestamps, SIDs and pre-formatted hex are written straight into the output
//! without intermediate `String`s; nested BinXML documents are rendered recursively.

use crate::binxml::value_variant::ValueData;
use crate::binxml::xml_render::XmlRenderer;
use crate::err::RenderResult as Result;
use crate::settings::ParserSettings;
use crate::utils::{EscapeContext, format_timestamp, write_xml_escaped};

use std::fmt::Write;
use zmij::Buffer as ZmijBuffer;

/// Stateful value formatter (owns a reusable float buffer).
pub(crate) struct ValueRenderer<'s> {
    settings: &'s ParserSettings,
    float_buf: ZmijBuffer,
}

impl<'s> ValueRenderer<'s> {
    pub(crate) fn new(settings: &'s ParserSettings) -> Self {
        ValueRenderer {
            settings,
            float_buf: ZmijBuffer::new(),
        }
    }

    /// Write `items` joined with `,`. Nested documents are rendered `depth` levels deep.
    pub(crate) fn write_items<W: Write>(
        &mut self,
        writer: &mut W,
        items: &[ValueData],
        ctx: EscapeContext,
        depth: usize,
    ) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                writer.write_char(',')?;
            }
            self.write_item(writer, item, ctx, depth)?;
        }
        Ok(())
    }

    fn write_item<W: Write>(
        &mut self,
        writer: &mut W,
        item: &ValueData,
        ctx: EscapeContext,
        depth: usize,
    ) -> Result<()> {
        match item {
            ValueData::String(s) | ValueData::AnsiString(s) => self.write_str(writer, s, ctx)?,
            ValueData::Int8(v) => write!(writer, "{}", v)?,
            ValueData::UInt8(v) => write!(writer, "{}", v)?,
            ValueData::Int16(v) => write!(writer, "{}", v)?,
            ValueData::UInt16(v) => write!(writer, "{}", v)?,
            ValueData::Int32(v) => write!(writer, "{}", v)?,
            ValueData::UInt32(v) => write!(writer, "{}", v)?,
            ValueData::Int64(v) => write!(writer, "{}", v)?,
            ValueData::UInt64(v) => write!(writer, "{}", v)?,
            ValueData::Real32(v) => self.write_float(writer, *v)?,
            ValueData::Real64(v) => self.write_float(writer, *v)?,
            ValueData::Bool(v) => writer.write_str(if *v { "true" } else { "false" })?,
            ValueData::Binary(s)
            | ValueData::SizeT(s)
            | ValueData::HexInt32(s)
            | ValueData::HexInt64(s) => writer.write_str(s)?,
            ValueData::Guid(guid) => write!(writer, "{{{}}}", guid)?,
            ValueData::FileTime(ts) | ValueData::SysTime(ts) => {
                writer.write_str(&format_timestamp(ts))?
            }
            ValueData::Sid(sid) => write!(writer, "{}", sid)?,
            ValueData::BinXml(document) => {
                XmlRenderer::with_depth(self.settings, depth).render_document(document, writer)?
            }
        }
        Ok(())
    }

    fn write_float<W: Write, F: zmij::Float>(&mut self, writer: &mut W, value: F) -> Result<()> {
        let s = self.float_buf.format(value);
        writer.write_str(s)?;
        Ok(())
    }

    /// Text and string values, escaped unless the settings turn escaping off.
    pub(crate) fn write_str<W: Write>(&self, writer: &mut W, s: &str, ctx: EscapeContext) -> Result<()> {
        if self.settings.should_escape_text() {
            write_xml_escaped(writer, s, ctx)?;
        } else {
            writer.write_str(s)?;
        }
        Ok(())
    }
}
