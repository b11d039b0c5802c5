mod byte_cursor;
pub(crate) mod bytes;
mod escape;
mod hexdump;
pub(crate) mod utf16;
mod windows;

pub(crate) use self::byte_cursor::ByteCursor;
pub(crate) use self::escape::{EscapeContext, write_xml_escaped};
pub(crate) use self::hexdump::hexdump_around;
pub(crate) use self::windows::{filetime_to_timestamp, format_timestamp, systime_from_bytes};
