//! APRS timestamps.
//!
//! A timestamp on the wire is only a partial clock reading: day/hour/minute,
//! hour/minute/second or month/day/hour/minute. Decoding places the reading on the
//! calendar relative to a reference instant (normally "now") while allowing for a few
//! minutes of clock drift between sender and receiver.

use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone,
    Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AprsError, FormatError, Result};

/// How far into the future a decoded reading may lie before it is moved back a day/year
const CLOCK_DRIFT_TOLERANCE_MINUTES: i64 = 5;

/// Candidate years tried when resolving a month/day/hour/minute reading
const MDHM_YEAR_ATTEMPTS: u32 = 4;

/// Furthest ahead of the hint a DHM reading may be rolled into the next month
const DHM_FORWARD_WINDOW_HOURS: i64 = 48;

/// Longest backward walk needed to find a day-of-month (two months covers every case)
const MAX_DAY_WALK: u32 = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `DDHHMMz`
    DayHourMinuteZulu,
    /// `DDHHMM/`
    DayHourMinuteLocal,
    /// `HHMMSSh`, always UTC
    HourMinuteSecond,
    /// `MMDDHHMM`, UTC
    MonthDayHourMinute,
    /// Built from a known instant rather than decoded from text
    Undecoded,
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimestampFormat::DayHourMinuteZulu => "DHM zulu",
            TimestampFormat::DayHourMinuteLocal => "DHM local",
            TimestampFormat::HourMinuteSecond => "HMS",
            TimestampFormat::MonthDayHourMinute => "MDHM",
            TimestampFormat::Undecoded => "undecoded",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    instant: DateTime<FixedOffset>,
    format: TimestampFormat,
}

impl Timestamp {
    /// Wrap an already known instant. The result has format [`TimestampFormat::Undecoded`].
    pub fn from_instant<Tz: TimeZone>(instant: DateTime<Tz>) -> Self {
        Self {
            instant: instant.fixed_offset(),
            format: TimestampFormat::Undecoded,
        }
    }

    /// Decode against the current time.
    pub fn decode(text: &str) -> Result<Self> {
        Self::decode_at(text, Utc::now())
    }

    /// Decode against `now`. Local-time readings use the system time zone.
    pub fn decode_at(text: &str, now: DateTime<Utc>) -> Result<Self> {
        Self::decode_in(text, now.with_timezone(&Local).fixed_offset())
    }

    /// Decode against `hint`. Zulu, HMS and MDHM readings are resolved against the hint in
    /// UTC; local readings are resolved in the hint's own offset.
    pub fn decode_in(text: &str, hint: DateTime<FixedOffset>) -> Result<Self> {
        let invalid = || AprsError::from(FormatError::Timestamp(text.to_string()));

        if !text.is_ascii() {
            return Err(invalid());
        }

        let bytes = text.as_bytes();
        let last = *bytes.last().ok_or_else(invalid)?;

        match (bytes.len(), last) {
            (7, b'z') => {
                let utc_hint = hint.with_timezone(&Utc).fixed_offset();
                let instant = decode_day_hour_minute(text, &utc_hint).ok_or_else(invalid)?;
                Ok(Self {
                    instant,
                    format: TimestampFormat::DayHourMinuteZulu,
                })
            }
            (7, b'/') => {
                let instant = decode_day_hour_minute(text, &hint).ok_or_else(invalid)?;
                Ok(Self {
                    instant,
                    format: TimestampFormat::DayHourMinuteLocal,
                })
            }
            (7, b'h') => {
                let instant =
                    decode_hour_minute_second(text, hint.with_timezone(&Utc)).ok_or_else(invalid)?;
                Ok(Self {
                    instant,
                    format: TimestampFormat::HourMinuteSecond,
                })
            }
            (8, c) if c.is_ascii_digit() => {
                let instant = decode_month_day_hour_minute(text, hint.with_timezone(&Utc))?;
                Ok(Self {
                    instant,
                    format: TimestampFormat::MonthDayHourMinute,
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Replace this timestamp with a fresh decode of `text`.
    /// On error the timestamp is left untouched.
    pub fn redecode(&mut self, text: &str, hint: DateTime<FixedOffset>) -> Result<()> {
        *self = Self::decode_in(text, hint)?;
        Ok(())
    }

    pub fn instant(&self) -> DateTime<FixedOffset> {
        self.instant
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.instant.with_timezone(&Utc)
    }

    pub fn format(&self) -> TimestampFormat {
        self.format
    }

    /// Encode in the format this timestamp was decoded from.
    pub fn encode(&self) -> Result<String> {
        self.encode_as(self.format)
    }

    /// Render the stored instant in the 7/8-character wire form for `format`.
    pub fn encode_as(&self, format: TimestampFormat) -> Result<String> {
        let utc = self.to_utc();
        match format {
            TimestampFormat::DayHourMinuteZulu => Ok(format!(
                "{:02}{:02}{:02}z",
                utc.day(),
                utc.hour(),
                utc.minute()
            )),
            TimestampFormat::DayHourMinuteLocal => {
                let local = if self.format == TimestampFormat::DayHourMinuteLocal {
                    self.instant
                } else {
                    self.instant.with_timezone(&Local).fixed_offset()
                };
                Ok(format!(
                    "{:02}{:02}{:02}/",
                    local.day(),
                    local.hour(),
                    local.minute()
                ))
            }
            TimestampFormat::HourMinuteSecond => Ok(format!(
                "{:02}{:02}{:02}h",
                utc.hour(),
                utc.minute(),
                utc.second()
            )),
            TimestampFormat::MonthDayHourMinute => Ok(format!(
                "{:02}{:02}{:02}{:02}",
                utc.month(),
                utc.day(),
                utc.hour(),
                utc.minute()
            )),
            TimestampFormat::Undecoded => Err(AprsError::Unsupported(format)),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instant.to_rfc3339())
    }
}

fn two_digits(text: &str, at: usize) -> Option<u32> {
    let digits = text.get(at..at + 2)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn drift_tolerance() -> TimeDelta {
    TimeDelta::minutes(CLOCK_DRIFT_TOLERANCE_MINUTES)
}

/// `DDHHMM?`: the month and year come from the hint.
///
/// A day later in the month than the hint's day is walked back to the most recent month
/// that has it. A day on or before the hint's day stays in the hint's month, unless the
/// same day of the following month lies within two days ahead of the hint.
fn decode_day_hour_minute(text: &str, hint: &DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let day = two_digits(text, 0)?;
    let hour = two_digits(text, 2)?;
    let minute = two_digits(text, 4)?;
    if !(1..=31).contains(&day) || hour > 23 || minute > 59 {
        return None;
    }

    let offset = hint.offset();
    let hint_date = hint.date_naive();
    let at = |date: NaiveDate| -> Option<DateTime<FixedOffset>> {
        let naive = date.and_hms_opt(hour, minute, 0)?;
        offset.from_local_datetime(&naive).single()
    };

    let mut walked = hint_date;
    let mut steps = 0;
    while walked.day() != day {
        walked = walked.pred_opt()?;
        steps += 1;
        if steps > MAX_DAY_WALK {
            return None;
        }
    }
    let past = at(walked)?;

    if day > hint_date.day() {
        return Some(past);
    }

    let next_month = if hint_date.month() == 12 {
        NaiveDate::from_ymd_opt(hint_date.year() + 1, 1, day)
    } else {
        NaiveDate::from_ymd_opt(hint_date.year(), hint_date.month() + 1, day)
    };

    match next_month.and_then(at) {
        Some(future) if future - *hint <= TimeDelta::hours(DHM_FORWARD_WINDOW_HOURS) => {
            Some(future)
        }
        _ => Some(past),
    }
}

/// `HHMMSSh`: the hint's UTC date, or the day before when the reading would otherwise be
/// more than the drift tolerance ahead of the hint.
fn decode_hour_minute_second(text: &str, hint: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    let hour = two_digits(text, 0)?;
    let minute = two_digits(text, 2)?;
    let second = two_digits(text, 4)?;

    let naive = hint.date_naive().and_hms_opt(hour, minute, second)?;
    let mut candidate = Utc.from_utc_datetime(&naive);
    if candidate - hint > drift_tolerance() {
        candidate -= TimeDelta::days(1);
    }

    Some(candidate.fixed_offset())
}

/// `MMDDHHMM`: try the hint's year and up to three years before it, taking the first that
/// forms a real date no further ahead of the hint than the drift tolerance.
fn decode_month_day_hour_minute(text: &str, hint: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
    let invalid = || AprsError::from(FormatError::Timestamp(text.to_string()));

    let month = two_digits(text, 0).ok_or_else(invalid)?;
    let day = two_digits(text, 2).ok_or_else(invalid)?;
    let hour = two_digits(text, 4).ok_or_else(invalid)?;
    let minute = two_digits(text, 6).ok_or_else(invalid)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 {
        return Err(invalid());
    }

    for attempt in 0..MDHM_YEAR_ATTEMPTS {
        let year = hint.year() - attempt as i32;
        let Some(naive) = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
        else {
            continue;
        };

        let candidate = Utc.from_utc_datetime(&naive);
        if candidate - hint <= drift_tolerance() {
            return Ok(candidate.fixed_offset());
        }
    }

    Err(AprsError::Range {
        input: text.to_string(),
        attempts: MDHM_YEAR_ATTEMPTS,
    })
}

/// Parse an RFC 3339 instant, used by the offline decoder to pin the reference time.
pub fn parse_reference_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}
