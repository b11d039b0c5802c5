use std::fmt::Write;

/// Format `data` as a canonical hex dump (`hexdump -C` style), 16 bytes per line.
///
/// `offset` is the address printed for the first byte.
pub(crate) fn hexdump(data: &[u8], offset: u64) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);

    for (line_no, line) in data.chunks(16).enumerate() {
        let address = offset + (line_no as u64) * 16;
        let _ = write!(out, "{:08x}:", address);

        for b in line {
            let _ = write!(out, " {:02x}", b);
        }
        for _ in line.len()..16 {
            out.push_str("   ");
        }

        out.push_str("  |");
        for &c in line {
            // Replace control and non-ascii bytes with dots.
            if c.is_ascii_graphic() || c == b' ' {
                out.push(c as char);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }

    out
}

/// Hex dump of the window of `radius` bytes around `pos` in `buf`, with absolute addresses.
pub(crate) fn hexdump_around(buf: &[u8], pos: usize, radius: usize) -> String {
    let start = pos.saturating_sub(radius).min(buf.len());
    let end = pos.saturating_add(radius).min(buf.len());
    hexdump(&buf[start..end], start as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hexdump_line_layout() {
        let dump = hexdump(b"AB\x00", 0x10);
        assert_eq!(
            dump,
            "00000010: 41 42 00                                         |AB.|\n"
        );
    }

    #[test]
    fn test_hexdump_around_clamps() {
        let buf: Vec<u8> = (0u8..40).collect();
        let dump = hexdump_around(&buf, 2, 8);
        assert!(dump.starts_with("00000000: 00 01"));
        assert_eq!(dump.lines().count(), 1);
    }
}
