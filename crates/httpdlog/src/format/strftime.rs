//! Strftime — the strftime subset used by `%{…}t` directives.
//!
//! Two halves that must stay in lockstep: `regex_fragment` emits the
//! pattern a formatted value matches, and `parse_value` walks the same
//! format to recover an epoch-microseconds instant. Unknown specifiers
//! match `\S+` and are ignored by the value parser.

use chrono::{NaiveDate, NaiveTime};

const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_FULL: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Append the regex pattern for one strftime format string. The caller
/// wraps the whole fragment in a single capture group.
pub fn regex_fragment(format: &str) -> String {
    let bytes = format.as_bytes();
    let mut out = String::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            push_literal(&mut out, bytes[i] as char);
            i += 1;
            continue;
        }
        if i + 1 >= bytes.len() {
            push_literal(&mut out, '%');
            break;
        }
        let (spec, dash) = if bytes[i + 1] == b'-' && i + 2 < bytes.len() {
            (bytes[i + 2] as char, true)
        } else {
            (bytes[i + 1] as char, false)
        };
        i += if dash { 3 } else { 2 };

        match spec {
            'Y' => out.push_str(r"\d{4}"),
            'y' => out.push_str(r"\d{2}"),
            'm' | 'd' | 'H' | 'I' | 'M' | 'S' => {
                if dash {
                    out.push_str(r"\d{1,2}")
                } else {
                    out.push_str(r"\d{2}")
                }
            }
            'e' => out.push_str(r"\s?\d{1,2}"),
            'b' | 'h' | 'a' => out.push_str(r"[A-Za-z]{3}"),
            'B' | 'A' => out.push_str(r"[A-Za-z]+"),
            'f' => out.push_str(r"\d+"),
            'z' => out.push_str(r"[+-]\d{4}"),
            'T' => out.push_str(r"\d{2}:\d{2}:\d{2}"),
            'R' => out.push_str(r"\d{2}:\d{2}"),
            'j' => out.push_str(r"\d{3}"),
            'p' => out.push_str(r"[AP]M"),
            'P' => out.push_str(r"[ap]m"),
            'n' | 't' => out.push_str(r"\s"),
            '%' => out.push('%'),
            // %Z and anything unknown: a non-space token.
            _ => out.push_str(r"\S+"),
        }
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if matches!(
        c,
        '.' | '*' | '+' | '?' | '^' | '$' | '(' | ')' | '{' | '}' | '[' | ']' | '|' | '\\'
    ) {
        out.push('\\');
    }
    out.push(c);
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn fixed_digits(&mut self, n: usize) -> Option<i64> {
        if self.pos + n > self.bytes.len() {
            return None;
        }
        let mut value = 0i64;
        for _ in 0..n {
            let b = self.bytes[self.pos];
            if !b.is_ascii_digit() {
                return None;
            }
            value = value * 10 + (b - b'0') as i64;
            self.pos += 1;
        }
        Some(value)
    }

    /// Greedy 1..=max digits.
    fn digits_up_to(&mut self, max: usize) -> Option<i64> {
        let mut value = 0i64;
        let mut taken = 0;
        while taken < max {
            match self.peek() {
                Some(b) if b.is_ascii_digit() => {
                    value = value * 10 + (b - b'0') as i64;
                    self.pos += 1;
                    taken += 1;
                }
                _ => break,
            }
        }
        if taken == 0 {
            None
        } else {
            Some(value)
        }
    }

    fn expect(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_token(&mut self) {
        while matches!(self.peek(), Some(b) if !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn month_name(&mut self) -> Option<u32> {
        // Full names first so "May" does not stop a longer match short;
        // abbreviations are all exactly three characters.
        for (idx, name) in MONTH_FULL.iter().enumerate() {
            if self.starts_with_ignore_case(name) {
                self.pos += name.len();
                return Some(idx as u32 + 1);
            }
        }
        for (idx, name) in MONTH_ABBREV.iter().enumerate() {
            if self.starts_with_ignore_case(name) {
                self.pos += name.len();
                return Some(idx as u32 + 1);
            }
        }
        None
    }

    fn starts_with_ignore_case(&self, name: &str) -> bool {
        let rest = &self.bytes[self.pos..];
        rest.len() >= name.len() && rest[..name.len()].eq_ignore_ascii_case(name.as_bytes())
    }
}

/// Parse a formatted value back into epoch microseconds (UTC).
///
/// A `%z` offset in the format is applied here, so the returned instant is
/// already UTC-adjusted. Returns `None` when the value does not follow the
/// format or no complete calendar date was recovered.
pub fn parse_value(value: &str, format: &str) -> Option<i64> {
    let fmt = format.as_bytes();
    let mut cur = Cursor {
        bytes: value.as_bytes(),
        pos: 0,
    };

    let mut year = 0i64;
    let mut month = 0u32;
    let mut day = 0u32;
    let mut hour = 0i64;
    let mut minute = 0i64;
    let mut second = 0i64;
    let mut micros = 0i64;
    let mut tz_offset_secs: Option<i64> = None;
    let mut meridiem: Option<bool> = None; // Some(true) = PM

    let mut f = 0;
    while f < fmt.len() {
        if fmt[f] != b'%' {
            if !cur.expect(fmt[f]) {
                return None;
            }
            f += 1;
            continue;
        }
        if f + 1 >= fmt.len() {
            return None;
        }
        let (spec, dash) = if fmt[f + 1] == b'-' && f + 2 < fmt.len() {
            (fmt[f + 2], true)
        } else {
            (fmt[f + 1], false)
        };
        f += if dash { 3 } else { 2 };

        match spec {
            b'Y' => year = cur.fixed_digits(4)?,
            b'y' => {
                let y = cur.fixed_digits(2)?;
                year = if y >= 70 { 1900 + y } else { 2000 + y };
            }
            b'm' => {
                month = if dash {
                    cur.digits_up_to(2)?
                } else {
                    cur.fixed_digits(2)?
                } as u32
            }
            b'd' => {
                day = if dash {
                    cur.digits_up_to(2)?
                } else {
                    cur.fixed_digits(2)?
                } as u32
            }
            b'e' => {
                if cur.peek() == Some(b' ') {
                    cur.pos += 1;
                }
                day = cur.digits_up_to(2)? as u32;
            }
            b'b' | b'h' | b'B' => month = cur.month_name()?,
            b'H' | b'I' => {
                hour = if dash {
                    cur.digits_up_to(2)?
                } else {
                    cur.fixed_digits(2)?
                }
            }
            b'M' => minute = cur.fixed_digits(2)?,
            b'S' => second = cur.fixed_digits(2)?,
            b'f' => {
                let start = cur.pos;
                let raw = cur.digits_up_to(9)?;
                let len = cur.pos - start;
                micros = if len <= 6 {
                    raw * 10i64.pow(6 - len as u32)
                } else {
                    raw / 10i64.pow(len as u32 - 6)
                };
            }
            b'z' => {
                let sign = match cur.peek() {
                    Some(b'-') => -1,
                    Some(b'+') => 1,
                    _ => return None,
                };
                cur.pos += 1;
                let hours = cur.fixed_digits(2)?;
                let minutes = cur.fixed_digits(2)?;
                tz_offset_secs = Some(sign * (hours * 3600 + minutes * 60));
            }
            b'Z' => cur.skip_token(),
            b'T' => {
                hour = cur.fixed_digits(2)?;
                if !cur.expect(b':') {
                    return None;
                }
                minute = cur.fixed_digits(2)?;
                if !cur.expect(b':') {
                    return None;
                }
                second = cur.fixed_digits(2)?;
            }
            b'R' => {
                hour = cur.fixed_digits(2)?;
                if !cur.expect(b':') {
                    return None;
                }
                minute = cur.fixed_digits(2)?;
            }
            // Day-of-year is matched but not folded back into the date.
            b'j' => {
                cur.fixed_digits(3)?;
            }
            b'a' | b'A' => {
                while matches!(cur.peek(), Some(b) if b.is_ascii_alphabetic()) {
                    cur.pos += 1;
                }
            }
            b'p' | b'P' => {
                let rest = &cur.bytes[cur.pos..];
                if rest.len() < 2 {
                    return None;
                }
                match &rest[..2].to_ascii_uppercase()[..] {
                    b"AM" => meridiem = Some(false),
                    b"PM" => meridiem = Some(true),
                    _ => return None,
                }
                cur.pos += 2;
            }
            b'n' | b't' => {
                if !matches!(cur.peek(), Some(b) if b.is_ascii_whitespace()) {
                    return None;
                }
                cur.pos += 1;
            }
            b'%' => {
                if !cur.expect(b'%') {
                    return None;
                }
            }
            _ => cur.skip_token(),
        }
    }

    if year == 0 || month == 0 || day == 0 {
        return None;
    }

    match meridiem {
        Some(true) if hour < 12 => hour += 12,
        Some(false) if hour == 12 => hour = 0,
        _ => {}
    }

    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
    let time = NaiveTime::from_hms_micro_opt(hour as u32, minute as u32, second as u32, 0)?;
    let mut epoch_us = date.and_time(time).and_utc().timestamp_micros() + micros;
    if let Some(tz) = tz_offset_secs {
        epoch_us -= tz * 1_000_000;
    }
    Some(epoch_us)
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn utc(s: &str) -> i64 {
        s.parse::<DateTime<Utc>>().unwrap().timestamp_micros()
    }

    #[test]
    fn test_fragment_date() {
        assert_eq!(regex_fragment("%Y-%m-%d"), r"\d{4}-\d{2}-\d{2}");
    }

    #[test]
    fn test_fragment_escapes_literals() {
        assert_eq!(regex_fragment("%H.%M"), r"\d{2}\.\d{2}");
    }

    #[test]
    fn test_fragment_unknown_specifier() {
        assert_eq!(regex_fragment("%Q"), r"\S+");
    }

    #[test]
    fn test_parse_iso_date_time() {
        let us = parse_value("2024-03-05 07:08:09", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(us, utc("2024-03-05T07:08:09Z"));
    }

    #[test]
    fn test_parse_with_offset_adjusts_to_utc() {
        let us = parse_value("10/Oct/2000 13:55:36 -0700", "%d/%b/%Y %H:%M:%S %z").unwrap();
        assert_eq!(us, utc("2000-10-10T20:55:36Z"));
    }

    #[test]
    fn test_parse_two_digit_year_window() {
        let a = parse_value("99-01-02", "%y-%m-%d").unwrap();
        assert_eq!(a, utc("1999-01-02T00:00:00Z"));
        let b = parse_value("03-01-02", "%y-%m-%d").unwrap();
        assert_eq!(b, utc("2003-01-02T00:00:00Z"));
    }

    #[test]
    fn test_parse_combined_time_specifier() {
        let us = parse_value("2024-06-01 12:34:56", "%Y-%m-%d %T").unwrap();
        assert_eq!(us, utc("2024-06-01T12:34:56Z"));
    }

    #[test]
    fn test_parse_meridiem() {
        let pm = parse_value("2024-06-01 01:30 PM", "%Y-%m-%d %I:%M %p").unwrap();
        assert_eq!(pm, utc("2024-06-01T13:30:00Z"));
        let am = parse_value("2024-06-01 12:05 AM", "%Y-%m-%d %I:%M %p").unwrap();
        assert_eq!(am, utc("2024-06-01T00:05:00Z"));
    }

    #[test]
    fn test_parse_fraction_scaled_to_micros() {
        let us = parse_value("2024-06-01 00:00:00.123", "%Y-%m-%d %H:%M:%S.%f").unwrap();
        assert_eq!(us, utc("2024-06-01T00:00:00Z") + 123_000);
    }

    #[test]
    fn test_parse_requires_complete_date() {
        assert!(parse_value("13:55:36", "%H:%M:%S").is_none());
        assert!(parse_value("+0200", "%z").is_none());
    }

    #[test]
    fn test_parse_rejects_mismatched_literal() {
        assert!(parse_value("2024/06/01", "%Y-%m-%d").is_none());
    }
}
