use jiff::{Timestamp, civil::DateTime, tz::Offset};

const WINDOWS_TO_UNIX_SECS: i64 = 11_644_473_600;
const TICKS_PER_SEC: u64 = 10_000_000;

/// Convert a FILETIME (100ns ticks since 1601-01-01 UTC) into a timestamp.
#[inline]
pub(crate) fn filetime_to_timestamp(filetime: u64) -> Option<Timestamp> {
    let secs = (filetime / TICKS_PER_SEC) as i64 - WINDOWS_TO_UNIX_SECS;
    let nanos = ((filetime % TICKS_PER_SEC) * 100) as i32;
    Timestamp::new(secs, nanos).ok()
}

/// Convert a 16-byte SYSTEMTIME into a UTC timestamp.
///
/// An all-zero SYSTEMTIME maps to the FILETIME epoch.
pub(crate) fn systime_from_bytes(bytes: &[u8; 16]) -> Option<Timestamp> {
    let field = |i: usize| u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);

    let year = field(0);
    let month = field(1);
    let _day_of_week = field(2);
    let day = field(3);
    let hour = field(4);
    let minute = field(5);
    let second = field(6);
    let milliseconds = field(7);

    if bytes.iter().all(|&b| b == 0) {
        return filetime_to_timestamp(0);
    }

    let dt = DateTime::new(
        i16::try_from(year).ok()?,
        i8::try_from(month).ok()?,
        i8::try_from(day).ok()?,
        i8::try_from(hour).ok()?,
        i8::try_from(minute).ok()?,
        i8::try_from(second).ok()?,
        i32::from(milliseconds).checked_mul(1_000_000)?,
    )
    .ok()?;
    Offset::UTC.to_timestamp(dt).ok()
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.fffffffZ`, keeping the full 100ns precision of
/// Windows time values.
pub(crate) fn format_timestamp(ts: &Timestamp) -> String {
    let dt = Offset::UTC.to_datetime(*ts);
    let mut out = String::with_capacity(28);
    push_digits(&mut out, dt.year() as u32, 4);
    out.push('-');
    push_digits(&mut out, dt.month() as u32, 2);
    out.push('-');
    push_digits(&mut out, dt.day() as u32, 2);
    out.push('T');
    push_digits(&mut out, dt.hour() as u32, 2);
    out.push(':');
    push_digits(&mut out, dt.minute() as u32, 2);
    out.push(':');
    push_digits(&mut out, dt.second() as u32, 2);
    out.push('.');
    push_digits(&mut out, (dt.subsec_nanosecond() / 100) as u32, 7);
    out.push('Z');
    out
}

fn push_digits(out: &mut String, value: u32, width: u32) {
    for exp in (0..width).rev() {
        let digit = (value / 10u32.pow(exp)) % 10;
        out.push(char::from(b'0' + digit as u8));
    }
}
