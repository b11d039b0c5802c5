use std::fmt::{self, Write};

/// Where a piece of text lands in the XML output, which decides the escaping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EscapeContext {
    /// Element content: `&`, `<` and `>`.
    Text,
    /// Attribute values: additionally `'` and `"`.
    Attribute,
}

/// Write `s` into `out`, XML-escaping it for `ctx`.
pub(crate) fn write_xml_escaped<W: Write>(out: &mut W, s: &str, ctx: EscapeContext) -> fmt::Result {
    let mut last = 0;
    for (idx, ch) in s.char_indices() {
        let replacement = match ch {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '\'' if ctx == EscapeContext::Attribute => "&apos;",
            '"' if ctx == EscapeContext::Attribute => "&quot;",
            _ => continue,
        };
        out.write_str(&s[last..idx])?;
        out.write_str(replacement)?;
        last = idx + ch.len_utf8();
    }
    out.write_str(&s[last..])
}
