//! Event calendar and release-date input.
//!
//! The calendar file holds one event per line, `Name: YYYY.MM.DD` or
//! `Name: YYYY.MM.DD-YYYY.MM.DD`. Blank lines and lines starting with `#` are
//! skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use time::{Date, Month};
use tracing::info;

use crate::LibraryError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventCalendar {
    /// Last day of each event.
    date_by_event: BTreeMap<String, Date>,
    /// Every day of every event, in file order per day.
    events_by_date: BTreeMap<Date, Vec<String>>,
}

impl EventCalendar {
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let contents = fs::read_to_string(path)?;
        let calendar = Self::parse(&contents)?;
        info!(
            "Loaded {} events with {} total dates",
            calendar.date_by_event.len(),
            calendar.events_by_date.len()
        );
        Ok(calendar)
    }

    pub fn parse(contents: &str) -> Result<Self, LibraryError> {
        let mut calendar = Self::default();
        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, dates) = line
                .split_once(": ")
                .ok_or_else(|| event_error(line_no, "expected `Name: YYYY.MM.DD`"))?;
            let (first, last) = match dates.trim().split_once('-') {
                Some((start, end)) => (
                    parse_dotted(start).ok_or_else(|| event_error(line_no, "bad start date"))?,
                    parse_dotted(end).ok_or_else(|| event_error(line_no, "bad end date"))?,
                ),
                None => {
                    let day = parse_dotted(dates)
                        .ok_or_else(|| event_error(line_no, "bad date"))?;
                    (day, day)
                }
            };
            if last < first {
                return Err(event_error(line_no, "event ends before it starts"));
            }
            calendar.insert(name.to_string(), first, last);
        }
        Ok(calendar)
    }

    fn insert(&mut self, name: String, first: Date, last: Date) {
        let mut day = first;
        loop {
            self.events_by_date.entry(day).or_default().push(name.clone());
            if day >= last {
                break;
            }
            match day.next_day() {
                Some(next) => day = next,
                None => break,
            }
        }
        self.date_by_event.insert(name, last);
    }

    pub fn len(&self) -> usize {
        self.date_by_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.date_by_event.is_empty()
    }

    pub fn date_of(&self, event: &str) -> Option<Date> {
        self.date_by_event.get(event).copied()
    }

    pub fn events_on(&self, date: Date) -> &[String] {
        self.events_by_date
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn event_error(line: usize, reason: &'static str) -> LibraryError {
    LibraryError::Events { line, reason }
}

fn parse_dotted(value: &str) -> Option<Date> {
    parse_date(value.trim(), '.')
}

fn parse_date(value: &str, sep: char) -> Option<Date> {
    let mut parts = value.split(sep);
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// `YYYY-M-D` with one or two digit month and day.
pub fn parse_release_date(value: &str) -> Option<Date> {
    let mut parts = value.split('-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    let digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };
    if parts.next().is_some() || !digits(year, 4, 4) || !digits(month, 1, 2) || !digits(day, 1, 2)
    {
        return None;
    }
    parse_date(value, '-')
}

fn is_year(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseDate {
    Day(Date),
    Year(i32),
}

impl fmt::Display for ReleaseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseDate::Day(date) => write!(
                f,
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            ),
            ReleaseDate::Year(year) => write!(f, "{:04}", year),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseChoice {
    pub date: Option<ReleaseDate>,
    pub event: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseInputError {
    UnknownEvent(String),
    NoEventAt(usize),
}

impl fmt::Display for ReleaseInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseInputError::UnknownEvent(name) => write!(f, "could not find event {:?}", name),
            ReleaseInputError::NoEventAt(idx) => write!(f, "no event number {}", idx),
        }
    }
}

impl std::error::Error for ReleaseInputError {}

/// Events falling on the day the tags already claim.
pub fn suggested_events<'a>(previous: Option<&str>, calendar: &'a EventCalendar) -> &'a [String] {
    match previous.and_then(parse_release_date) {
        Some(date) => calendar.events_on(date),
        None => &[],
    }
}

/// Interprets one answer to the release-date question.
///
/// `-` clears the date, an empty answer keeps `previous`. A single digit picks
/// the nth event held on the `previous` date.
pub fn parse_release_input(
    input: &str,
    previous: Option<&str>,
    calendar: &EventCalendar,
) -> Result<ReleaseChoice, ReleaseInputError> {
    let input = input.trim();
    let input = match input {
        "-" => return Ok(ReleaseChoice::default()),
        "" => match previous {
            Some(previous) if !previous.is_empty() => previous,
            _ => return Ok(ReleaseChoice::default()),
        },
        other => other,
    };

    if input.len() == 1 && input.bytes().all(|b| b.is_ascii_digit()) {
        let idx = usize::from(input.as_bytes()[0] - b'0');
        let date = previous.and_then(parse_release_date);
        let event = suggested_events(previous, calendar)
            .get(idx)
            .ok_or(ReleaseInputError::NoEventAt(idx))?;
        return Ok(ReleaseChoice {
            date: date.map(ReleaseDate::Day),
            event: Some(event.clone()),
        });
    }
    if let Some(date) = parse_release_date(input) {
        return Ok(ReleaseChoice {
            date: Some(ReleaseDate::Day(date)),
            event: None,
        });
    }
    if is_year(input) {
        let year = input
            .parse()
            .map_err(|_| ReleaseInputError::UnknownEvent(input.to_string()))?;
        return Ok(ReleaseChoice {
            date: Some(ReleaseDate::Year(year)),
            event: None,
        });
    }
    match calendar.date_of(input) {
        Some(date) => Ok(ReleaseChoice {
            date: Some(ReleaseDate::Day(date)),
            event: Some(input.to_string()),
        }),
        None => Err(ReleaseInputError::UnknownEvent(input.to_string())),
    }
}
