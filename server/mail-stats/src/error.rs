//! Structured error types for the mail stats engine.

use thiserror::Error;

use crate::engine::Phase;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("engine is {actual:?}, operation requires {expected:?}")]
  Phase { expected: Phase, actual: Phase },

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }
}

/// A log header whose date/time fields do not form a calendar instant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
  #[error("unknown month abbreviation {0:?}")]
  Month(String),

  #[error("{field}: {value:?} is not a number")]
  Field { field: &'static str, value: String },

  #[error("{year}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02} is not a valid date/time")]
  Calendar {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
  },

  #[error("local time does not exist in the host timezone")]
  Nonexistent,
}

/// Storage failures raised by a series sink.
#[derive(Debug, Error)]
pub enum SinkError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("step must be positive, got {0}")]
  InvalidStep(i64),

  #[error("invalid series name {0:?}")]
  InvalidSeriesName(String),

  #[error("series {0:?} does not exist")]
  MissingSeries(String),

  #[error("bucket {bucket} is not after last written bucket {last}")]
  NotMonotonic { bucket: i64, last: i64 },

  #[error("bucket {bucket} precedes series start {start}")]
  BeforeStart { bucket: i64, start: i64 },

  #[error("bucket {bucket} is not aligned to step {step}")]
  Misaligned { bucket: i64, step: i64 },

  #[error("series {series:?} has step {found}, expected {expected}")]
  StepMismatch {
    series: String,
    found: i64,
    expected: i64,
  },

  #[error("corrupt series {series:?}: {reason}")]
  Corrupt { series: String, reason: String },
}
