//! Byte-slice utilities for bounds-oriented parsing.
//!
//! These are zero-cost helpers that return `Option<T>`; the cursor maps `None` to a
//! `Truncated` fault carrying its own context path.
//!
//! All numeric reads are **little-endian** (BinXML is LE on the wire).

use byteorder::{ByteOrder, LittleEndian};

/// Borrow `len` bytes at `offset`.
///
/// Returns `None` if the range is out of bounds (or overflows).
pub(crate) fn slice(buf: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    buf.get(offset..end)
}

/// Read `N` raw bytes at `offset`.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    slice(buf, offset, N)?.try_into().ok()
}

/// Read a single byte at `offset`.
pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    slice(buf, offset, 2).map(LittleEndian::read_u16)
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    slice(buf, offset, 4).map(LittleEndian::read_u32)
}
