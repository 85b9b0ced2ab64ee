//! Fixed-width time bucketing of syslog timestamps.
//!
//! Syslog headers carry no year, so the caller supplies one. Seconds only
//! matter up to the step boundary; a caller may pass them already truncated.

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::config::LogTimezone;
use crate::error::TimeParseError;
use crate::types::LogStamp;

const MONTHS: [&str; 12] = [
  "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Align an epoch time down to the start of its bucket.
pub fn align(t: i64, step: i64) -> i64 {
  t - t.rem_euclid(step)
}

/// Current year in the host timezone.
pub fn current_year() -> i32 {
  Local::now().year()
}

/// Month number (1..=12) for a three-letter abbreviation, any case.
pub fn month_number(abbr: &str) -> Result<u32, TimeParseError> {
  let lower = abbr.to_ascii_lowercase();
  MONTHS
    .iter()
    .position(|m| *m == lower)
    .map(|i| i as u32 + 1)
    .ok_or_else(|| TimeParseError::Month(abbr.to_string()))
}

/// A wall-clock instant with an explicit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
  pub year: i32,
  pub month: u32,
  pub day: u32,
  pub hour: u32,
  pub minute: u32,
  pub second: u32,
}

impl CalendarTime {
  /// Combine an externally supplied year with the textual header fields.
  pub fn from_stamp(year: i32, stamp: &LogStamp) -> Result<Self, TimeParseError> {
    Ok(Self {
      year,
      month: month_number(&stamp.month)?,
      day: number("day", &stamp.day)?,
      hour: number("hour", &stamp.hour)?,
      minute: number("minute", &stamp.minute)?,
      second: number("second", &stamp.second)?,
    })
  }

  /// Wall-clock time with seconds coarsened to the minute.
  ///
  /// A leap second (`:60`) belongs to the minute it closes; larger values are invalid.
  fn naive(&self) -> Result<NaiveDateTime, TimeParseError> {
    let invalid = TimeParseError::Calendar {
      year: self.year,
      month: self.month,
      day: self.day,
      hour: self.hour,
      minute: self.minute,
      second: self.second,
    };
    if self.second > 60 {
      return Err(invalid);
    }
    NaiveDate::from_ymd_opt(self.year, self.month, self.day)
      .and_then(|d| d.and_hms_opt(self.hour, self.minute, self.second.min(59)))
      .ok_or(invalid)
  }

  /// Epoch seconds for this wall-clock time in an arbitrary timezone.
  pub fn epoch_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<i64, TimeParseError> {
    resolve(tz.from_local_datetime(&self.naive()?))
  }

  /// Epoch seconds for this wall-clock time in `tz`.
  pub fn epoch(&self, tz: LogTimezone) -> Result<i64, TimeParseError> {
    match tz {
      LogTimezone::Utc => self.epoch_in(&Utc),
      LogTimezone::Local => self.epoch_in(&Local),
    }
  }
}

/// Pick the earlier instant of an ambiguous local time; a skipped one is an error.
fn resolve<Tz: TimeZone>(local: LocalResult<DateTime<Tz>>) -> Result<i64, TimeParseError> {
  local
    .earliest()
    .map(|dt| dt.timestamp())
    .ok_or(TimeParseError::Nonexistent)
}

fn number(field: &'static str, value: &str) -> Result<u32, TimeParseError> {
  value.parse().map_err(|_| TimeParseError::Field {
    field,
    value: value.to_string(),
  })
}

/// Start of the bucket containing `time`.
pub fn bucket_start(time: &CalendarTime, step: i64, tz: LogTimezone) -> Result<i64, TimeParseError> {
  Ok(align(time.epoch(tz)?, step))
}

/// Start of the bucket for a log header stamped in `year`.
pub fn stamp_bucket(
  year: i32,
  stamp: &LogStamp,
  step: i64,
  tz: LogTimezone,
) -> Result<i64, TimeParseError> {
  bucket_start(&CalendarTime::from_stamp(year, stamp)?, step, tz)
}
