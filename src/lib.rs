#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! A decoder and XML renderer for BinXML, the binary XML encoding that the MS-EVEN6 remote
//! event log protocol uses to carry event data.
//!
//! ```no_run
//! let bytes: &[u8] = &[/* BinXML payload extracted from a result set */];
//! let document = even6_binxml::decode(bytes)?;
//! let xml = even6_binxml::render(&document, true)?;
//! # Ok::<(), even6_binxml::err::BinXmlError>(())
//! ```

pub use binxml::deserializer::MAX_NESTING_DEPTH;
pub use binxml::name::BinXmlName;
pub use binxml::value_variant::{BinXmlValueType, Value, ValueData, ValueTypeCode};
pub use binxml_parser::BinXmlParser;
pub use guid::Guid;
pub use model::{
    Attribute, Content, Document, Element, ElementBody, Fragment, FragmentBody,
    ProcessingInstruction, Substitution, Template, TemplateValues,
};
pub use ntsid::Sid;
pub use settings::ParserSettings;

pub mod binxml;
pub mod err;
pub mod model;

mod binxml_parser;
mod guid;
mod ntsid;
mod settings;
mod utils;

#[cfg(test)]
mod tests;

use crate::binxml::deserializer::decode_document;
use crate::binxml::xml_render::XmlRenderer;
use crate::err::Result;

/// Decode a BinXML buffer into a [`Document`] tree.
///
/// The buffer must hold exactly one document; trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<Document> {
    decode_with_settings(data, &ParserSettings::default())
}

pub fn decode_with_settings(data: &[u8], settings: &ParserSettings) -> Result<Document> {
    Ok(decode_document(data, settings)?)
}

/// Render a decoded document as XML text.
///
/// With `escape_text`, text and string values are XML-escaped.
pub fn render(document: &Document, escape_text: bool) -> Result<String> {
    render_with_settings(document, &ParserSettings::default().escape_text(escape_text))
}

pub fn render_with_settings(document: &Document, settings: &ParserSettings) -> Result<String> {
    let mut out = String::new();
    XmlRenderer::new(settings).render_document(document, &mut out)?;
    Ok(out)
}

/// Decode and render in one step.
pub fn render_bytes(data: &[u8], escape_text: bool) -> Result<String> {
    render_bytes_with_settings(data, &ParserSettings::default().escape_text(escape_text))
}

pub fn render_bytes_with_settings(data: &[u8], settings: &ParserSettings) -> Result<String> {
    let document = decode_with_settings(data, settings)?;
    render_with_settings(&document, settings)
}

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
