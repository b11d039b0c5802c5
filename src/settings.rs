use encoding::EncodingRef;
use encoding::all::WINDOWS_1252;

use std::fmt;

/// Options shared by decoding and rendering.
#[derive(Clone)]
pub struct ParserSettings {
    /// Controls the number of threads used by [`crate::BinXmlParser`] for batch work.
    num_threads: usize,
    /// XML-escape text and string values when rendering.
    escape_text: bool,
    /// Codec used to decode ANSI strings (`0x02` values).
    ansi_codec: EncodingRef,
}

impl fmt::Debug for ParserSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParserSettings")
            .field("num_threads", &self.num_threads)
            .field("escape_text", &self.escape_text)
            .field("ansi_codec", &self.ansi_codec.name())
            .finish()
    }
}

impl PartialEq for ParserSettings {
    fn eq(&self, other: &Self) -> bool {
        self.ansi_codec.name() == other.ansi_codec.name()
            && self.num_threads == other.num_threads
            && self.escape_text == other.escape_text
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            num_threads: 0,
            escape_text: true,
            ansi_codec: WINDOWS_1252,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// Sets the number of worker threads, `0` means "let rayon decide" (usually one per core).
    ///
    /// Without the `multithreading` feature this is ignored and work runs sequentially.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = if cfg!(feature = "multithreading") {
            num_threads
        } else {
            1
        };

        self
    }

    /// Whether text and string values are XML-escaped in the rendered output.
    pub fn escape_text(mut self, escape_text: bool) -> Self {
        self.escape_text = escape_text;

        self
    }

    /// Sets the codec used for ANSI string values.
    pub fn ansi_codec(mut self, ansi_codec: EncodingRef) -> Self {
        self.ansi_codec = ansi_codec;

        self
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn should_escape_text(&self) -> bool {
        self.escape_text
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding::all::ISO_8859_7;

    #[test]
    fn test_defaults() {
        let settings = ParserSettings::default();
        assert!(settings.should_escape_text());
        assert_eq!(settings.get_ansi_codec().name(), "windows-1252");
        assert_eq!(settings.get_num_threads(), 0);
    }

    #[test]
    fn test_builder() {
        let settings = ParserSettings::new()
            .escape_text(false)
            .ansi_codec(ISO_8859_7);

        assert!(!settings.should_escape_text());
        assert_eq!(settings.get_ansi_codec().name(), "iso-8859-7");
        assert_ne!(settings, ParserSettings::default());
    }
}
