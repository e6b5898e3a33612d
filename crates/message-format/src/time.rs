//! Fixed-width timestamp writer
//!
//! Runs once per rendered message, so it writes digits directly instead of
//! going through a format string.

use chrono::Timelike;

/// Length of `[HH:mm:ss.fff]`
pub const TIMESTAMP_LEN: usize = 14;

/// Append `[HH:mm:ss.fff]` (24-hour, zero padded) to `out`
pub fn write_timestamp(out: &mut String, time: &impl Timelike) {
    // Leap seconds report nanoseconds past 1e9
    let millis = (time.nanosecond() / 1_000_000).min(999);

    out.push('[');
    push_two_digits(out, time.hour());
    out.push(':');
    push_two_digits(out, time.minute());
    out.push(':');
    push_two_digits(out, time.second());
    out.push('.');
    out.push(digit(millis / 100));
    out.push(digit(millis / 10 % 10));
    out.push(digit(millis % 10));
    out.push(']');
}

/// Render a timestamp on its own
pub fn format_timestamp(time: &impl Timelike) -> String {
    let mut out = String::with_capacity(TIMESTAMP_LEN);
    write_timestamp(&mut out, time);
    out
}

fn push_two_digits(out: &mut String, value: u32) {
    out.push(digit(value / 10 % 10));
    out.push(digit(value % 10));
}

fn digit(value: u32) -> char {
    char::from(b'0' + (value % 10) as u8)
}
