use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Standalone tokens that split a `remind` argument into time (left) and text (right).
const SEPARATOR_TOKENS: &[&str] = &["-", "|", ":", "—", "<", ">"];
/// Leading filler words stripped before the time portion is parsed.
const LEADING_WORDS: &[&str] = &["in", "at", "on", "for"];
/// Wall-clock time used when a date is given without one.
const DEFAULT_HOUR: u32 = 9;

const MAX_TIME_TOKENS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("could not understand that time")]
    Unparsable,
    #[error("that time is in the past")]
    InPast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReminder {
    pub due: DateTime<Utc>,
    pub text: String,
}

/// Splits a full `remind` argument into a due instant and the reminder text.
///
/// Resolution order is fixed: an explicit separator token, then the word `to`,
/// then the longest token prefix that parses as a time. The first rule that
/// produces a valid split wins.
pub fn parse_reminder_input(
    input: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<ParsedReminder, ParseError> {
    let mut tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(ParseError::Unparsable);
    }

    if LEADING_WORDS.contains(&tokens[0].to_lowercase().as_str()) {
        tokens.remove(0);
        if tokens.len() < 2 {
            return Err(ParseError::Unparsable);
        }
    }

    if let Some(pos) = tokens.iter().position(|t| SEPARATOR_TOKENS.contains(t)) {
        if pos > 0 && pos + 1 < tokens.len() {
            let due = parse_when(&tokens[..pos].join(" "), tz, now)?;
            return Ok(ParsedReminder {
                due,
                text: tokens[pos + 1..].join(" "),
            });
        }
        return Err(ParseError::Unparsable);
    }

    let mut saw_past = false;

    if let Some(pos) = tokens.iter().position(|t| t.eq_ignore_ascii_case("to")) {
        if pos > 0 && pos + 1 < tokens.len() {
            match parse_when(&tokens[..pos].join(" "), tz, now) {
                Ok(due) => {
                    return Ok(ParsedReminder {
                        due,
                        text: tokens[pos + 1..].join(" "),
                    });
                }
                Err(ParseError::InPast) => saw_past = true,
                Err(ParseError::Unparsable) => {}
            }
        }
    }

    let max_time_tokens = (tokens.len() - 1).min(MAX_TIME_TOKENS);
    for k in (1..=max_time_tokens).rev() {
        match parse_when(&tokens[..k].join(" "), tz, now) {
            Ok(due) => {
                return Ok(ParsedReminder {
                    due,
                    text: tokens[k..].join(" "),
                });
            }
            Err(ParseError::InPast) => saw_past = true,
            Err(ParseError::Unparsable) => {}
        }
    }

    if saw_past {
        Err(ParseError::InPast)
    } else {
        Err(ParseError::Unparsable)
    }
}

/// Parses a free-form time expression into a UTC instant strictly after `now`.
///
/// Naive dates and clock times are interpreted in `tz` and converted to UTC.
pub fn parse_when(text: &str, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseError> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(ParseError::Unparsable);
    }
    let body = lowered.strip_prefix("in ").unwrap_or(&lowered);

    if let Some(due) = parse_relative(body, now) {
        return in_future(due, now);
    }
    if let Some(due) = parse_absolute(body, tz, now) {
        return in_future(due, now);
    }
    Err(ParseError::Unparsable)
}

fn in_future(due: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseError> {
    if due <= now {
        Err(ParseError::InPast)
    } else {
        Ok(due)
    }
}

/// Duration phrases: `5 minutes`, `30m`, `2h30m`, `1d 2h`, `3 days and 4 hours`.
fn parse_relative(body: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalized = normalize_duration(body)?;
    let dur = humantime::parse_duration(&normalized).ok()?;
    let delta = Duration::from_std(dur).ok()?;
    now.checked_add_signed(delta)
}

/// Joins `5 minutes` into `5minutes` so the humantime grammar accepts it.
/// Returns None when any chunk does not start with a digit, so date phrases
/// never reach the duration parser.
fn normalize_duration(text: &str) -> Option<String> {
    let mut out: Vec<String> = Vec::new();
    let mut tokens = text.split_whitespace().peekable();
    while let Some(tok) = tokens.next() {
        if tok.eq_ignore_ascii_case("and") {
            continue;
        }
        if tok.chars().all(|c| c.is_ascii_digit()) {
            match tokens.peek() {
                Some(next) if next.chars().all(|c| c.is_ascii_alphabetic()) => {
                    let unit = tokens.next().unwrap();
                    out.push(format!("{tok}{unit}"));
                }
                _ => return None,
            }
        } else if tok.chars().next()?.is_ascii_digit() {
            out.push(tok.to_string());
        } else {
            return None;
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out.join(" "))
    }
}

fn parse_absolute(body: &str, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let now_local = now.with_timezone(&tz).naive_local();
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let (first, rest) = tokens.split_first()?;

    match *first {
        "today" | "tomorrow" => {
            let offset = if *first == "tomorrow" { 1 } else { 0 };
            let time = match rest {
                [] => NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?,
                [clock] => parse_clock(clock)?,
                _ => return None,
            };
            let date = now_local.date().checked_add_signed(Duration::days(offset))?;
            return resolve_local(tz, date.and_time(time));
        }
        _ => {}
    }

    // Bare clock time: next occurrence of that wall-clock time.
    if tokens.len() == 1 {
        if let Some(time) = parse_clock(tokens[0]) {
            let mut candidate = now_local.date().and_time(time);
            if candidate <= now_local {
                candidate = candidate.checked_add_signed(Duration::days(1))?;
            }
            return resolve_local(tz, candidate);
        }
    }

    // Date forms, optionally followed by a single clock token.
    let (date_tokens, time) = match tokens.split_last() {
        Some((last, head)) if !head.is_empty() => match parse_clock(last) {
            Some(t) => (head, Some(t)),
            None => (&tokens[..], None),
        },
        _ => (&tokens[..], None),
    };
    let time = time.unwrap_or(NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?);

    let (month, day, year) = parse_date_tokens(date_tokens)?;
    let naive = match year {
        Some(y) => chrono::NaiveDate::from_ymd_opt(y, month, day)?.and_time(time),
        None => {
            let mut candidate =
                chrono::NaiveDate::from_ymd_opt(now_local.year(), month, day)?.and_time(time);
            if candidate <= now_local {
                candidate =
                    chrono::NaiveDate::from_ymd_opt(now_local.year() + 1, month, day)?
                        .and_time(time);
            }
            candidate
        }
    };
    resolve_local(tz, naive)
}

/// Accepts `April 17`, `17 of April`, `April 17 2026`, `17/04`, `17/04/2026`
/// and `2026-04-17`. Returns `(month, day, explicit_year)`.
fn parse_date_tokens(tokens: &[&str]) -> Option<(u32, u32, Option<i32>)> {
    let tokens: Vec<&str> = tokens
        .iter()
        .filter(|t| !t.eq_ignore_ascii_case("of"))
        .copied()
        .collect();

    match tokens.as_slice() {
        [single] => {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(single, "%Y-%m-%d") {
                return Some((date.month(), date.day(), Some(date.year())));
            }
            let parts: Vec<&str> = single.split('/').collect();
            match parts.as_slice() {
                [d, m] => Some((parse_number(m, 1, 12)?, parse_day(d)?, None)),
                [d, m, y] => Some((
                    parse_number(m, 1, 12)?,
                    parse_day(d)?,
                    Some(y.parse().ok()?),
                )),
                _ => None,
            }
        }
        [a, b] => month_day_pair(a, b).map(|(m, d)| (m, d, None)),
        [a, b, y] => {
            let (m, d) = month_day_pair(a, b)?;
            let year: i32 = y.parse().ok()?;
            (1970..=9999).contains(&year).then_some((m, d, Some(year)))
        }
        _ => None,
    }
}

fn month_day_pair(a: &str, b: &str) -> Option<(u32, u32)> {
    if let (Some(m), Some(d)) = (month_from_name(a), parse_day(b)) {
        return Some((m, d));
    }
    if let (Some(d), Some(m)) = (parse_day(a), month_from_name(b)) {
        return Some((m, d));
    }
    None
}

fn month_from_name(token: &str) -> Option<u32> {
    const MONTHS: [(&str, u32); 12] = [
        ("january", 1),
        ("february", 2),
        ("march", 3),
        ("april", 4),
        ("may", 5),
        ("june", 6),
        ("july", 7),
        ("august", 8),
        ("september", 9),
        ("october", 10),
        ("november", 11),
        ("december", 12),
    ];
    let t = token.trim_end_matches('.');
    if t.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(name, _)| name.starts_with(t))
        .map(|(_, m)| *m)
}

/// Day-of-month, tolerating ordinal suffixes (`17th`, `1st`).
fn parse_day(token: &str) -> Option<u32> {
    let t = token
        .trim_end_matches("st")
        .trim_end_matches("nd")
        .trim_end_matches("rd")
        .trim_end_matches("th");
    parse_number(t, 1, 31)
}

fn parse_number(token: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = token.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// `3pm`, `3:30pm`, `09:30`, `15:04:05`.
fn parse_clock(token: &str) -> Option<NaiveTime> {
    let upper = token.to_uppercase();
    for fmt in ["%I:%M%p", "%I%p"] {
        if let Ok(t) = NaiveTime::parse_from_str(&upper, fmt) {
            return Some(t);
        }
    }
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(token, fmt) {
            return Some(t);
        }
    }
    None
}

/// Resolves a naive local datetime in `tz`. Ambiguous times (DST fall-back)
/// take the earlier offset; nonexistent times (DST spring-forward) shift
/// forward one hour.
pub fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(early, _) => Some(early.with_timezone(&Utc)),
        LocalResult::None => {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_relative_duration_with_text() {
        // Creation at 10:00 in La Paz (UTC-4) is 14:00Z.
        let now = at("2025-04-01T14:00:00Z");
        let tz: Tz = "America/La_Paz".parse().unwrap();

        let parsed = parse_reminder_input("in 2 hours take pills", tz, now).unwrap();
        assert_eq!(parsed.due, at("2025-04-01T16:00:00Z"));
        assert_eq!(parsed.text, "take pills");
    }

    #[test]
    fn test_duration_forms() {
        let now = at("2025-04-01T14:00:00Z");
        let tz = chrono_tz::UTC;

        assert_eq!(
            parse_when("5 minutes", tz, now).unwrap(),
            now + Duration::minutes(5)
        );
        assert_eq!(parse_when("30m", tz, now).unwrap(), now + Duration::minutes(30));
        assert_eq!(
            parse_when("2h30m", tz, now).unwrap(),
            now + Duration::minutes(150)
        );
        assert_eq!(
            parse_when("in 1d 2h", tz, now).unwrap(),
            now + Duration::hours(26)
        );
        assert_eq!(
            parse_when("3 days and 4 hours", tz, now).unwrap(),
            now + Duration::hours(76)
        );
    }

    #[test]
    fn test_year_rollover() {
        // Today is 2025-12-15; "January 3" must land in 2026.
        let now = at("2025-12-15T12:00:00Z");
        let tz = chrono_tz::UTC;

        let parsed = parse_reminder_input("January 3 renew insurance", tz, now).unwrap();
        assert_eq!(parsed.text, "renew insurance");
        let due = parsed.due.with_timezone(&tz);
        assert_eq!(due.year(), 2026);
        assert_eq!(due.month(), 1);
        assert_eq!(due.day(), 3);
    }

    #[test]
    fn test_absolute_forms() {
        let now = at("2025-04-01T12:00:00Z");
        let tz = chrono_tz::UTC;

        let a = parse_when("April 17", tz, now).unwrap();
        let b = parse_when("17 of April", tz, now).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, at("2025-04-17T09:00:00Z"));

        let c = parse_when("April 17 2026", tz, now).unwrap();
        assert_eq!(c, at("2026-04-17T09:00:00Z"));

        let d = parse_when("May 1 09:30", tz, now).unwrap();
        assert_eq!(d, at("2025-05-01T09:30:00Z"));

        let e = parse_when("2026-04-17 18:00", tz, now).unwrap();
        assert_eq!(e, at("2026-04-17T18:00:00Z"));
    }

    #[test]
    fn test_tomorrow_and_clock() {
        let now = at("2025-04-01T12:00:00Z");
        let tz = chrono_tz::UTC;

        assert_eq!(
            parse_when("tomorrow 3pm", tz, now).unwrap(),
            at("2025-04-02T15:00:00Z")
        );
        assert_eq!(
            parse_when("tomorrow", tz, now).unwrap(),
            at("2025-04-02T09:00:00Z")
        );
        // 09:30 already passed today, rolls to the next day.
        assert_eq!(
            parse_when("09:30", tz, now).unwrap(),
            at("2025-04-02T09:30:00Z")
        );
        // 15:00 is still ahead today.
        assert_eq!(
            parse_when("3pm", tz, now).unwrap(),
            at("2025-04-01T15:00:00Z")
        );
    }

    #[test]
    fn test_timezone_localization() {
        // "tomorrow 3pm" for a New York user is 19:00Z (EDT, UTC-4).
        let now = at("2025-06-01T12:00:00Z");
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            parse_when("tomorrow 3pm", tz, now).unwrap(),
            at("2025-06-02T19:00:00Z")
        );
    }

    #[test]
    fn test_separators() {
        let now = at("2025-04-01T12:00:00Z");
        let tz = chrono_tz::UTC;

        let a = parse_reminder_input("5 minutes | drink water", tz, now).unwrap();
        assert_eq!(a.text, "drink water");
        assert_eq!(a.due, now + Duration::minutes(5));

        let b = parse_reminder_input("tomorrow 3pm - standup", tz, now).unwrap();
        assert_eq!(b.text, "standup");
        assert_eq!(b.due, at("2025-04-02T15:00:00Z"));

        let c = parse_reminder_input("at 9pm to stretch", tz, now).unwrap();
        assert_eq!(c.text, "stretch");
        assert_eq!(c.due, at("2025-04-01T21:00:00Z"));

        // "to" inside the reminder text does not confuse the splitter.
        let d = parse_reminder_input("in 2 hours go to gym", tz, now).unwrap();
        assert_eq!(d.text, "go to gym");
        assert_eq!(d.due, now + Duration::hours(2));
    }

    #[test]
    fn test_past_rejection() {
        let now = at("2025-04-01T12:00:00Z");
        let tz = chrono_tz::UTC;

        assert_eq!(
            parse_when("April 17 2020", tz, now),
            Err(ParseError::InPast)
        );
        assert_eq!(parse_when("in 0 minutes", tz, now), Err(ParseError::InPast));
        assert_eq!(
            parse_reminder_input("April 17 2020 meeting", tz, now),
            Err(ParseError::InPast)
        );
    }

    #[test]
    fn test_round_trip_across_timezones() {
        // "in 1 hour" is timezone-independent: always now + 1h.
        let now = at("2025-04-01T12:00:00Z");
        for name in ["UTC", "America/La_Paz", "Asia/Kolkata", "Australia/Sydney"] {
            let tz: Tz = name.parse().unwrap();
            let due = parse_when("in 1 hour", tz, now).unwrap();
            assert_eq!(due, now + Duration::hours(1), "tz {name}");
        }
    }

    #[test]
    fn test_parser_totality() {
        // The parser classifies every input; it never panics.
        let now = at("2025-04-01T12:00:00Z");
        let tz = chrono_tz::UTC;
        let corpus = [
            "in 5 minutes",
            "in 2 hours",
            "30m",
            "2h30m",
            "3 days",
            "1d 2h",
            "tomorrow",
            "today 11pm",
            "tomorrow 3pm",
            "April 17",
            "17 of April",
            "April 17 2026",
            "May 1 09:30",
            "17/04",
            "17/04/2026",
            "2026-04-17",
            "9pm",
            "09:30",
            "15:04",
            "January 3",
            "3rd of June",
            "in 0 minutes",
            "April 17 2020",
            "yesterday",
            "half past nine",
            "soon",
            "",
            "    ",
            "!!!",
            "in in in",
            "99:99",
            "February 30",
            "13/13",
            "0 of April",
            "tomorrow 99pm",
            "next tuesday",
            "2 fortnights",
            "-5 minutes",
            "1000000000000000 days",
            "today",
            "march",
            "12",
            "of",
            "to",
            "— — —",
            "april 31st",
            "June 31",
            "31 of June",
            "5min",
            "in 1 hour",
        ];
        for input in corpus {
            match parse_when(input, tz, now) {
                Ok(due) => assert!(due > now, "parsed {input:?} must be in the future"),
                Err(ParseError::Unparsable) | Err(ParseError::InPast) => {}
            }
        }
    }

    #[test]
    fn test_requires_text() {
        let now = at("2025-04-01T12:00:00Z");
        let tz = chrono_tz::UTC;
        assert_eq!(
            parse_reminder_input("in 2 hours", tz, now),
            Err(ParseError::Unparsable)
        );
        assert_eq!(
            parse_reminder_input("", tz, now),
            Err(ParseError::Unparsable)
        );
    }
}
