use std::time::{Duration, SystemTime};

/// Formats a `SystemTime` as an RFC 1123 / RFC 7231 HTTP date
/// (`Last-Modified`, `Date`). Delegates to `httpdate`, which already emits
/// exactly this format.
pub fn format(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Parses an `If-Modified-Since` value, accepting exactly the three formats
/// HTTP/1.1 servers are required to: RFC 1123, RFC 850, and asctime. Always
/// interprets the result as UTC with no timezone adjustment — the source
/// implementation added the platform's local offset to the parsed value,
/// which is wrong for a timestamp already expressed in GMT, and is not
/// reproduced here (SPEC_FULL.md §9).
pub fn parse(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    if let Ok(time) = httpdate::parse_http_date(value) {
        return Some(time);
    }
    parse_rfc850(value).or_else(|| parse_asctime(value))
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_index(name: &str) -> Option<u64> {
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u64)
}

/// RFC 850: `Sunday, 06-Nov-94 08:49:37 GMT`.
fn parse_rfc850(value: &str) -> Option<SystemTime> {
    let rest = value.split_once(',')?.1.trim();
    let mut parts = rest.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let tz = parts.next()?;
    if !tz.eq_ignore_ascii_case("GMT") {
        return None;
    }

    let mut date_parts = date.split('-');
    let day: u64 = date_parts.next()?.parse().ok()?;
    let month = month_index(date_parts.next()?)?;
    let year_2d: u64 = date_parts.next()?.parse().ok()?;
    // RFC 850 two-digit years: the spec's "future" rollover rule is not
    // relevant here since our only consumer is conditional-GET comparison
    // against file mtimes, all of which are far more recent than 2000;
    // treat 00-68 as 2000-2068 and 69-99 as 1969-1999 per the common
    // convention (RFC 2616 §19.3).
    let year = if year_2d <= 68 { 2000 + year_2d } else { 1900 + year_2d };

    let mut time_parts = time.split(':');
    let hour: u64 = time_parts.next()?.parse().ok()?;
    let minute: u64 = time_parts.next()?.parse().ok()?;
    let second: u64 = time_parts.next()?.parse().ok()?;

    build_utc(year, month, day, hour, minute, second)
}

/// asctime: `Sun Nov  6 08:49:37 1994`.
fn parse_asctime(value: &str) -> Option<SystemTime> {
    let mut parts = value.split_whitespace();
    let _weekday = parts.next()?;
    let month = month_index(parts.next()?)?;
    let day: u64 = parts.next()?.parse().ok()?;
    let time = parts.next()?;
    let year: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let mut time_parts = time.split(':');
    let hour: u64 = time_parts.next()?.parse().ok()?;
    let minute: u64 = time_parts.next()?.parse().ok()?;
    let second: u64 = time_parts.next()?.parse().ok()?;

    build_utc(year, month, day, hour, minute, second)
}

/// Days-from-civil algorithm (Howard Hinnant's `days_from_civil`), used to
/// build a `SystemTime` from calendar fields without pulling in a date
/// crate the pack doesn't otherwise use.
fn build_utc(year: u64, month0: u64, day: u64, hour: u64, minute: u64, second: u64) -> Option<SystemTime> {
    if month0 > 11 || day == 0 || day > 31 || hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    let y = year as i64 - i64::from(month0 < 2);
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64; // [0, 399]
    let month1 = month0 as i64 + 1;
    let doy = (153 * (if month1 > 2 { month1 - 3 } else { month1 + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    let days_since_epoch = era * 146097 + doe - 719468;

    let total_seconds = days_since_epoch * 86400 + hour as i64 * 3600 + minute as i64 * 60 + second as i64;
    if total_seconds < 0 {
        return None;
    }
    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(total_seconds as u64))
}
