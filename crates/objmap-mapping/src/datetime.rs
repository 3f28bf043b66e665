//! Date, time and duration parsing
//!
//! Accepted formats use the familiar custom pattern letters (`yyyy`, `MM`,
//! `dd`, `HH`, `mm`, `ss`, `fff`, `tt`) and are translated to chrono format
//! strings before parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Patterns tried by the general fallback parser
const GENERAL_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y",
];

/// Translate a custom date pattern into a chrono format string
#[must_use]
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        match c {
            'y' => out.push_str(if run == 2 { "%y" } else { "%Y" }),
            'M' => out.push_str(match run {
                1 | 2 => "%m",
                3 => "%b",
                _ => "%B",
            }),
            'd' => out.push_str(match run {
                1 | 2 => "%d",
                3 => "%a",
                _ => "%A",
            }),
            'H' => out.push_str("%H"),
            'h' => out.push_str("%I"),
            'm' => out.push_str("%M"),
            's' => out.push_str("%S"),
            'f' | 'F' => out.push_str(match run {
                1..=3 => "%3f",
                4..=6 => "%6f",
                _ => "%9f",
            }),
            't' => out.push_str("%p"),
            'z' => out.push_str("%:z"),
            '\'' | '"' => {
                // Quoted literal runs until the matching quote
                let mut j = i + 1;
                while j < chars.len() && chars[j] != c {
                    push_literal(&mut out, chars[j]);
                    j += 1;
                }
                i = j + 1;
                continue;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    push_literal(&mut out, *next);
                }
                i += 2;
                continue;
            }
            other => {
                for _ in 0..run {
                    push_literal(&mut out, other);
                }
            }
        }
        i += run;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Parse `text` exactly against one custom pattern
#[must_use]
pub fn parse_with_pattern(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    let format = translate_pattern(pattern);
    NaiveDateTime::parse_from_str(text, &format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, &format)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Culture-invariant parsing of common ISO and US layouts
#[must_use]
pub fn parse_general(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    text.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
        .or_else(|| DateTime::parse_from_rfc2822(text).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            text.parse::<NaiveDate>()
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .or_else(|| {
            GENERAL_FORMATS
                .iter()
                .find_map(|format| parse_with_chrono(text, format))
        })
}

fn parse_with_chrono(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    })
}

/// Try each pattern in order, then fall back to general parsing
pub fn parse_datetime<'a>(
    text: &str,
    patterns: impl IntoIterator<Item = &'a str>,
) -> Option<NaiveDateTime> {
    patterns
        .into_iter()
        .find_map(|pattern| parse_with_pattern(text, pattern))
        .or_else(|| parse_general(text))
}

/// Parse `[-][d.]hh:mm[:ss[.fffffff]]` or a whole number of days
#[must_use]
pub fn parse_duration(text: &str) -> Option<TimeDelta> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let delta = if body.contains(':') {
        parse_clock_duration(body)?
    } else {
        TimeDelta::try_days(parse_digits(body)?)?
    };

    Some(if negative { -delta } else { delta })
}

fn parse_clock_duration(body: &str) -> Option<TimeDelta> {
    let mut parts = body.split(':');
    let head = parts.next()?;
    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (parse_digits(days)?, parse_digits(hours)?),
        None => (0, parse_digits(head)?),
    };
    let minutes = parse_digits(parts.next()?)?;
    let (seconds, nanos) = match parts.next() {
        Some(seconds) => match seconds.split_once('.') {
            Some((whole, fraction)) => (parse_digits(whole)?, parse_fraction(fraction)?),
            None => (parse_digits(seconds)?, 0),
        },
        None => (0, 0),
    };
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    TimeDelta::try_days(days)?
        .checked_add(&TimeDelta::try_hours(hours)?)?
        .checked_add(&TimeDelta::try_minutes(minutes)?)?
        .checked_add(&TimeDelta::try_seconds(seconds)?)?
        .checked_add(&TimeDelta::nanoseconds(nanos))
}

fn parse_digits(text: &str) -> Option<i64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Fraction digits after the decimal point, as nanoseconds
fn parse_fraction(text: &str) -> Option<i64> {
    if text.is_empty() || text.len() > 9 {
        return None;
    }
    let padded = format!("{text:0<9}");
    parse_digits(&padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(translate_pattern("MM/dd/yyyy HH:mm:ss"), "%m/%d/%Y %H:%M:%S");
        assert_eq!(translate_pattern("yyyy-MM-ddTHH:mm:ss.fff"), "%Y-%m-%dT%H:%M:%S.%3f");
        assert_eq!(translate_pattern("dd 'de' MMMM"), "%d de %B");
        assert_eq!(translate_pattern("hh:mm tt"), "%I:%M %p");
        assert_eq!(translate_pattern("100%"), "100%%");
    }

    #[test]
    fn test_second_pattern_matches() {
        let parsed = parse_datetime("08/16/2025", ["yyyy-MM-dd", "MM/dd/yyyy"]);
        assert_eq!(parsed, Some(ymd(2025, 8, 16)));
    }

    #[test]
    fn test_exact_pattern_match_rejects_trailing_text() {
        assert_eq!(parse_with_pattern("2025-08-16 extra", "yyyy-MM-dd"), None);
        assert_eq!(parse_with_pattern("2025-08-16", "yyyy-MM-dd"), Some(ymd(2025, 8, 16)));
    }

    #[test]
    fn test_general_fallback() {
        assert_eq!(parse_datetime("2025-08-16", std::iter::empty()), Some(ymd(2025, 8, 16)));
        assert_eq!(
            parse_general("2025-08-16T10:30:00Z"),
            Some(ymd(2025, 8, 16) + TimeDelta::minutes(630))
        );
        assert_eq!(
            parse_general("2025-08-16 10:30"),
            Some(ymd(2025, 8, 16) + TimeDelta::minutes(630))
        );
        assert_eq!(parse_general("not a date"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("01:30"), Some(TimeDelta::minutes(90)));
        assert_eq!(
            parse_duration("1.02:00:05"),
            Some(TimeDelta::hours(26) + TimeDelta::seconds(5))
        );
        assert_eq!(
            parse_duration("-00:00:01.5"),
            Some(-TimeDelta::milliseconds(1500))
        );
        assert_eq!(parse_duration("3"), Some(TimeDelta::days(3)));
        assert_eq!(parse_duration("25:00"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }
}
