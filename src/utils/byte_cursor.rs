use crate::err::{DeserializationError, DeserializationErrorKind, DeserializationResult};
use crate::utils::bytes;
use crate::utils::utf16::decode_utf16le_bytes_z;

use log::trace;
use std::borrow::Cow;

/// A lightweight cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`, with two additions needed by BinXML:
/// - a **sticky fault**: the first failure is stored, and every later read returns it again
///   without touching the buffer.
/// - a **context stack** of labels (`document`, `fragment`, `attr_2`, ...) that is joined with `.`
///   into the `path` of every error raised through this cursor.
///
/// All reads are little-endian and advance the cursor on success.
#[derive(Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Absolute offset of `buf[0]` within the top-level input.
    base: u64,
    fault: Option<DeserializationError>,
    context: Vec<Cow<'static, str>>,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self::with_base(buf, 0, Vec::new())
    }

    fn with_base(buf: &'a [u8], base: u64, context: Vec<Cow<'static, str>>) -> Self {
        ByteCursor {
            buf,
            pos: 0,
            base,
            fault: None,
            context,
        }
    }

    #[inline]
    pub(crate) fn buf(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Position relative to the start of the top-level input.
    #[inline]
    pub(crate) fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// The dotted context path, e.g. `document.fragment.element`.
    pub(crate) fn path(&self) -> String {
        self.context.join(".")
    }

    /// Record a fault at the current position (unless one is already stored) and return the
    /// stored fault.
    pub(crate) fn fail(&mut self, kind: DeserializationErrorKind) -> DeserializationError {
        let offset = self.offset();
        self.fail_at(offset, kind)
    }

    pub(crate) fn fail_at(&mut self, offset: u64, kind: DeserializationErrorKind) -> DeserializationError {
        if let Some(existing) = &self.fault {
            return existing.clone();
        }
        let err = DeserializationError {
            path: self.path(),
            offset,
            kind,
        };
        self.fault = Some(err.clone());
        err
    }

    fn record(&mut self, err: DeserializationError) -> DeserializationError {
        match &self.fault {
            Some(existing) => existing.clone(),
            None => {
                self.fault = Some(err.clone());
                err
            }
        }
    }

    #[inline]
    fn check(&self) -> DeserializationResult<()> {
        match &self.fault {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Run `f` with `label` pushed onto the context stack.
    pub(crate) fn scoped<T>(
        &mut self,
        label: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&mut Self) -> DeserializationResult<T>,
    ) -> DeserializationResult<T> {
        self.context.push(label.into());
        let res = f(self);
        self.context.pop();
        res.map_err(|e| self.record(e))
    }

    fn truncated(&mut self, what: &'static str, need: usize) -> DeserializationError {
        let have = self.remaining();
        self.fail(DeserializationErrorKind::Truncated { what, need, have })
    }

    #[inline]
    pub(crate) fn take_bytes(&mut self, len: usize, what: &'static str) -> DeserializationResult<&'a [u8]> {
        self.check()?;
        match bytes::slice(self.buf, self.pos, len) {
            Some(out) => {
                self.pos += len;
                Ok(out)
            }
            None => Err(self.truncated(what, len)),
        }
    }

    #[inline]
    pub(crate) fn array<const N: usize>(&mut self, what: &'static str) -> DeserializationResult<[u8; N]> {
        self.check()?;
        match bytes::read_array::<N>(self.buf, self.pos) {
            Some(v) => {
                self.pos += N;
                Ok(v)
            }
            None => Err(self.truncated(what, N)),
        }
    }

    #[inline]
    pub(crate) fn u8_named(&mut self, what: &'static str) -> DeserializationResult<u8> {
        self.check()?;
        match bytes::read_u8(self.buf, self.pos) {
            Some(v) => {
                self.pos += 1;
                Ok(v)
            }
            None => Err(self.truncated(what, 1)),
        }
    }

    #[inline]
    pub(crate) fn u16_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        self.check()?;
        match bytes::read_u16_le(self.buf, self.pos) {
            Some(v) => {
                self.pos += 2;
                Ok(v)
            }
            None => Err(self.truncated(what, 2)),
        }
    }

    #[inline]
    pub(crate) fn i16_named(&mut self, what: &'static str) -> DeserializationResult<i16> {
        self.u16_named(what).map(|v| v as i16)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        self.check()?;
        match bytes::read_u32_le(self.buf, self.pos) {
            Some(v) => {
                self.pos += 4;
                Ok(v)
            }
            None => Err(self.truncated(what, 4)),
        }
    }

    /// Read `char_count` UTF-16 code units (little-endian), decoding until NUL if present.
    ///
    /// With `consume_nul`, one additional code unit (the terminator) is read and discarded.
    pub(crate) fn utf16_by_char_count(
        &mut self,
        char_count: usize,
        consume_nul: bool,
        what: &'static str,
    ) -> DeserializationResult<String> {
        let start = self.offset();
        let byte_len = match char_count.checked_mul(2) {
            Some(n) => n,
            None => return Err(self.truncated(what, usize::MAX)),
        };
        let raw = self.take_bytes(byte_len, what)?;
        let s = decode_utf16le_bytes_z(raw)
            .map_err(|_| self.fail_at(start, DeserializationErrorKind::InvalidUtf16 { what }))?;

        if consume_nul {
            let _ = self.u16_named(what)?;
        }
        Ok(s)
    }

    /// Read a `u16` length prefix (number of UTF-16 code units), then that many code units.
    /// The NUL-terminated variant additionally consumes the terminator implied by the size.
    pub(crate) fn len_prefixed_utf16_string(
        &mut self,
        is_null_terminated: bool,
        what: &'static str,
    ) -> DeserializationResult<String> {
        let char_count = usize::from(self.u16_named(what)?);
        self.utf16_by_char_count(char_count, is_null_terminated, what)
    }

    /// Read a `u32` length followed by exactly that many bytes, and decode them with `f` on an
    /// isolated sub-cursor.
    ///
    /// With `subtract_header`, the declared length includes the 4 bytes of the length field
    /// itself. The sub-decode must consume the region exactly; any remainder faults with
    /// `UnreadTrailingBytes`.
    pub(crate) fn read_with_length<T>(
        &mut self,
        subtract_header: bool,
        what: &'static str,
        f: impl FnOnce(&mut ByteCursor<'a>) -> DeserializationResult<T>,
    ) -> DeserializationResult<T> {
        let declared = self.u32_named(what)?;
        let len = if subtract_header {
            match declared.checked_sub(4) {
                Some(n) => n,
                None => {
                    return Err(self.fail(DeserializationErrorKind::LengthUnderflow {
                        what,
                        declared,
                        header: 4,
                    }));
                }
            }
        } else {
            declared
        };

        let region_offset = self.offset();
        let region = self.take_bytes(len as usize, what)?;
        trace!(
            "Offset `0x{:08x}`: {} region of {} bytes",
            region_offset, what, len
        );
        self.decode_region(region, region_offset, f)
    }

    /// Decode a previously captured `region` (which started at absolute `region_offset`) on an
    /// isolated sub-cursor that inherits this cursor's context.
    pub(crate) fn decode_region<T>(
        &mut self,
        region: &'a [u8],
        region_offset: u64,
        f: impl FnOnce(&mut ByteCursor<'a>) -> DeserializationResult<T>,
    ) -> DeserializationResult<T> {
        self.check()?;
        let mut sub = ByteCursor::with_base(region, region_offset, self.context.clone());
        let res = f(&mut sub).and_then(|v| {
            sub.check()?;
            match sub.remaining() {
                0 => Ok(v),
                size => Err(sub.fail(DeserializationErrorKind::UnreadTrailingBytes { size })),
            }
        });
        res.map_err(|e| self.record(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_first_fault_is_sticky() {
        let buf = [0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&buf);

        let first = cursor
            .scoped("header", |c| c.u32_named("magic"))
            .unwrap_err();
        assert_eq!(first.path, "header");

        // Reads that would succeed still report the stored fault.
        let second = cursor.u8_named("byte").unwrap_err();
        assert_eq!(first, second);
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn test_context_path_is_dotted() {
        let buf = [0x00];
        let mut cursor = ByteCursor::new(&buf);

        let err = cursor
            .scoped("document", |c| {
                c.scoped("fragment", |c| c.scoped(format!("attr_{}", 2), |c| c.u16_named("x")))
            })
            .unwrap_err();

        assert_eq!(err.path, "document.fragment.attr_2");
        assert!(cursor.context.is_empty());
    }

    #[test]
    fn test_read_with_length_requires_exact_consumption() {
        let buf = [0x03, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC];
        let mut cursor = ByteCursor::new(&buf);

        let err = cursor
            .read_with_length(false, "region", |sub| sub.u16_named("value"))
            .unwrap_err();

        assert_eq!(
            err.kind,
            DeserializationErrorKind::UnreadTrailingBytes { size: 1 }
        );
        assert_eq!(err.offset, 6);
        assert!(err.to_string().contains("unread trailing bytes of size 1"));
        // The fault propagated to the parent cursor.
        assert_eq!(cursor.fault.as_ref(), Some(&err));
    }

    #[test]
    fn test_read_with_length_subtracting_header() {
        let buf = [0x06, 0x00, 0x00, 0x00, 0x34, 0x12, 0xFF];
        let mut cursor = ByteCursor::new(&buf);

        let v = cursor
            .read_with_length(true, "region", |sub| sub.u16_named("value"))
            .unwrap();

        assert_eq!(v, 0x1234);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_read_with_length_header_underflow() {
        let buf = [0x02, 0x00, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&buf);

        let err = cursor
            .read_with_length(true, "region", |_| Ok(()))
            .unwrap_err();

        assert!(matches!(
            err.kind,
            DeserializationErrorKind::LengthUnderflow { declared: 2, .. }
        ));
    }

    #[test]
    fn test_len_prefixed_utf16_string_variants() {
        let mut buf = vec![0x03, 0x00];
        buf.extend(utf16("abc"));
        buf.extend([0x00, 0x00]);
        buf.extend([0x02, 0x00]);
        buf.extend(utf16("hi"));

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.len_prefixed_utf16_string(true, "name").unwrap(), "abc");
        assert_eq!(cursor.len_prefixed_utf16_string(false, "text").unwrap(), "hi");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_invalid_utf16_is_reported() {
        // Lone high surrogate.
        let buf = [0x01, 0x00, 0x00, 0xD8];
        let mut cursor = ByteCursor::new(&buf);

        let err = cursor.len_prefixed_utf16_string(false, "text").unwrap_err();
        assert_eq!(err.kind, DeserializationErrorKind::InvalidUtf16 { what: "text" });
        assert_eq!(err.offset, 2);
    }
}
