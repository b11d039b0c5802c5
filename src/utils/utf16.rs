#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Utf16LeDecodeError {
    OddLength,
    InvalidData,
}

/// Collect little-endian UTF-16 code units from raw bytes.
pub(crate) fn utf16le_units(bytes: &[u8]) -> Result<Vec<u16>, Utf16LeDecodeError> {
    if !bytes.len().is_multiple_of(2) {
        return Err(Utf16LeDecodeError::OddLength);
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Decode a UTF-16LE byte slice until the first NUL (0x0000), if present.
pub(crate) fn decode_utf16le_bytes_z(bytes: &[u8]) -> Result<String, Utf16LeDecodeError> {
    decode_utf16_units_z(&utf16le_units(bytes)?)
}

/// Decode UTF-16 code units until the first NUL (0x0000), if present.
pub(crate) fn decode_utf16_units_z(units: &[u16]) -> Result<String, Utf16LeDecodeError> {
    let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    let slice = &units[..end];

    // Fast path: pure ASCII needs no surrogate handling.
    if slice.iter().all(|&c| c <= 0x7F) {
        return Ok(slice.iter().map(|&c| c as u8 as char).collect());
    }

    String::from_utf16(slice).map_err(|_| Utf16LeDecodeError::InvalidData)
}

/// Split UTF-16 code units on NUL terminators, as used by string arrays.
///
/// A trailing terminator does not produce an extra empty item.
pub(crate) fn split_utf16_units_on_nul(units: &[u16]) -> Result<Vec<String>, Utf16LeDecodeError> {
    if units.is_empty() {
        return Ok(Vec::new());
    }

    let mut items: Vec<&[u16]> = units.split(|&c| c == 0).collect();
    if units.last() == Some(&0) {
        items.pop();
    }

    items
        .into_iter()
        .map(|item| String::from_utf16(item).map_err(|_| Utf16LeDecodeError::InvalidData))
        .collect()
}
