//! Engine configuration with sane defaults.

use crate::error::EngineError;

/// Bucket width used when none is configured (one minute).
pub const DEFAULT_STEP: i64 = 60;

/// How the engine reads the wall-clock fields of a log header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTimezone {
  #[default]
  Utc,
  /// The host's local timezone, as syslog writes it.
  Local,
}

/// What to do with an event whose header time cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
  /// Drop the line after logging a warning.
  #[default]
  SkipLine,
  /// Count the event in the epoch-0 bucket.
  ZeroBucket,
}

/// Which series a drain writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
  #[default]
  All,
  Domain(String),
}

impl Target {
  /// `"all"` (any case) selects every series; anything else names one domain.
  pub fn parse(s: &str) -> Self {
    if s.eq_ignore_ascii_case("all") {
      Self::All
    } else {
      Self::Domain(s.to_ascii_lowercase())
    }
  }

  pub fn includes(&self, domain: &str) -> bool {
    match self {
      Self::All => true,
      Self::Domain(d) => d == domain,
    }
  }
}

/// Tunables for one ingest run.
#[derive(Debug, Clone)]
pub struct Config {
  /// Bucket width in seconds.
  pub step: i64,
  /// Year stamped onto log headers (syslog omits it). `None` = current local year.
  pub year: Option<i32>,
  pub timezone: LogTimezone,
  pub bad_timestamp: TimestampPolicy,
  pub target: Target,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      step: DEFAULT_STEP,
      year: None,
      timezone: LogTimezone::default(),
      bad_timestamp: TimestampPolicy::default(),
      target: Target::default(),
    }
  }
}

impl Config {
  pub fn validate(&self) -> Result<(), EngineError> {
    if self.step <= 0 {
      return Err(EngineError::validation("step", "must be positive"));
    }
    Ok(())
  }
}
