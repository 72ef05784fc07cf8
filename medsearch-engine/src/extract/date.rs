//! Best-effort publication-date scanning.
//!
//! Recognised forms, anywhere in free text:
//!
//! | Form | Example |
//! |------|---------|
//! | ISO | `2023-03-15` |
//! | slash, month first | `03/15/2023` (day first when the month is > 12) |
//! | dotted, day first | `15.03.2023` |
//! | day month year | `15 March 2023`, `15th Mar. 2023` |
//! | month day, year | `March 15, 2023` |
//! | month year | `Mar 2023` (first of the month) |
//! | bibliographic | `2023 Mar 15`, `2023 Mar` |
//!
//! When several dates appear, the earliest occurrence in the text wins.

use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::{Captures, Regex};

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

type Builder = fn(&Captures<'_>) -> Option<NaiveDate>;

static PATTERNS: LazyLock<Vec<(Regex, Builder)>> = LazyLock::new(|| {
    let specs: [(String, Builder); 7] = [
        (r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b".into(), |c| {
            ymd(num(c, 1)?, num(c, 2)?, num(c, 3)?)
        }),
        (r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b".into(), |c| {
            let (first, second, year) = (num(c, 1)?, num(c, 2)?, num(c, 3)?);
            ymd(year, first, second).or_else(|| ymd(year, second, first))
        }),
        (r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b".into(), |c| {
            ymd(num(c, 3)?, num(c, 2)?, num(c, 1)?)
        }),
        (
            format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+{MONTH}\.?,?\s+(\d{{4}})\b"),
            |c| ymd(num(c, 3)?, month(c, 2)?, num(c, 1)?),
        ),
        (
            format!(r"(?i)\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"),
            |c| ymd(num(c, 3)?, month(c, 1)?, num(c, 2)?),
        ),
        (format!(r"(?i)\b{MONTH}\.?,?\s+(\d{{4}})\b"), |c| {
            ymd(num(c, 2)?, month(c, 1)?, 1)
        }),
        (
            format!(r"(?i)\b(\d{{4}})\s+{MONTH}\.?(?:\s+(\d{{1,2}}))?\b"),
            |c| ymd(num(c, 1)?, month(c, 2)?, num(c, 3).unwrap_or(1)),
        ),
    ];
    specs
        .into_iter()
        .filter_map(|(pattern, build)| Regex::new(&pattern).ok().map(|re| (re, build)))
        .collect()
});

static PUBDATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^\s*(\d{{4}})(?:\s+{MONTH}(?:\s+(\d{{1,2}}))?)?")).ok()
});

fn num(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn month(caps: &Captures<'_>, group: usize) -> Option<u32> {
    month_number(caps.get(group)?.as_str())
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Month number for an English month name or three-letter abbreviation.
pub fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let index = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == prefix)?;
    u32::try_from(index + 1).ok()
}

/// The earliest recognisable date in `text`.
pub fn scan_date(text: &str) -> Option<NaiveDate> {
    PATTERNS
        .iter()
        .flat_map(|(re, build)| {
            re.captures_iter(text)
                .filter_map(move |caps| {
                    let start = caps.get(0)?.start();
                    build(&caps).map(|date| (start, date))
                })
                .take(1)
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, date)| date)
}

/// Parse a compact `YYYYMMDD` stamp.
pub fn parse_compact(stamp: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(stamp.trim(), "%Y%m%d").ok()
}

/// Parse a bibliographic date such as `2023 Jan 15`, `2023 Jan`, or `2023`.
/// Missing parts default to the first.
pub fn parse_pubdate(text: &str) -> Option<NaiveDate> {
    let caps = PUBDATE.as_ref()?.captures(text)?;
    let year = num(&caps, 1)?;
    let month = caps.get(2).and_then(|m| month_number(m.as_str())).unwrap_or(1);
    let day = num(&caps, 3).unwrap_or(1);
    ymd(year, month, day).or_else(|| ymd(year, month, 1))
}

/// Today's local date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Today's local date as `YYYY-MM-DD`.
pub fn today_iso() -> String {
    iso(today())
}

/// Render a date as `YYYY-MM-DD`.
pub fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
