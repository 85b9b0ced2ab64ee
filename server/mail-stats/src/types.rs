//! Core types for the mail stats engine (parsed events, counters, run reports).

use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// Reserved series name that aggregates every recognized domain.
pub const GLOBAL_DOMAIN: &str = "global";

// ---------------------------------------------------------------------------
// Parsed log lines
// ---------------------------------------------------------------------------

/// Date/time fields of a syslog header, kept as text until bucketing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStamp {
  pub month: String,
  pub day: String,
  pub hour: String,
  pub minute: String,
  pub second: String,
}

/// One recognized MTA event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
  /// `<qid>: from=<addr>`: a queued message and its envelope sender.
  TransactionStart { txn_id: String, from: String },
  /// `<qid>: to=<addr>, ..., status=<token>`: one recipient's delivery result.
  TransactionOutcome {
    txn_id: String,
    to: String,
    status: String,
  },
  /// `NOQUEUE: reject: ... from=<addr> to=<addr>`: refused before queueing.
  ImmediateReject { from: String, to: String },
}

/// A log line that passed header parsing and matched one event pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
  pub stamp: LogStamp,
  pub host: String,
  pub process: String,
  pub pid: u32,
  pub event: RawEvent,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventClass {
  Sent,
  Received,
  Bounced,
  Rejected,
}

impl EventClass {
  /// Map a delivery `status=` token to the class credited to the recipient domain.
  ///
  /// A successful delivery is a reception from the recipient's point of view.
  pub fn from_status(status: &str) -> Option<Self> {
    match status {
      "sent" => Some(Self::Received),
      "bounced" => Some(Self::Bounced),
      "reject" | "rejected" => Some(Self::Rejected),
      _ => None,
    }
  }
}

/// Per-bucket counts for the four event classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
  pub sent: u64,
  #[serde(rename = "recv")]
  pub received: u64,
  pub bounced: u64,
  #[serde(rename = "reject")]
  pub rejected: u64,
}

impl Counts {
  pub const ZERO: Counts = Counts {
    sent: 0,
    received: 0,
    bounced: 0,
    rejected: 0,
  };

  pub fn bump(&mut self, class: EventClass) {
    match class {
      EventClass::Sent => self.sent += 1,
      EventClass::Received => self.received += 1,
      EventClass::Bounced => self.bounced += 1,
      EventClass::Rejected => self.rejected += 1,
    }
  }

  pub fn get(&self, class: EventClass) -> u64 {
    match class {
      EventClass::Sent => self.sent,
      EventClass::Received => self.received,
      EventClass::Bounced => self.bounced,
      EventClass::Rejected => self.rejected,
    }
  }

  pub fn is_zero(&self) -> bool {
    *self == Self::ZERO
  }
}

impl std::ops::AddAssign for Counts {
  fn add_assign(&mut self, rhs: Self) {
    self.sent += rhs.sent;
    self.received += rhs.received;
    self.bounced += rhs.bounced;
    self.rejected += rhs.rejected;
  }
}

// ---------------------------------------------------------------------------
// Range queries
// ---------------------------------------------------------------------------

/// Function used to fold several stored rows into one query sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consolidation {
  Average,
  Max,
}

/// One consolidated point returned by a range query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
  pub time: i64,
  pub sent: f64,
  pub received: f64,
  pub bounced: f64,
  pub rejected: f64,
}

// ---------------------------------------------------------------------------
// Run reports
// ---------------------------------------------------------------------------

/// Line-level tallies for one ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
  pub lines: u64,
  pub unmatched: u64,
  pub starts: u64,
  pub outcomes: u64,
  pub rejects: u64,
  /// Outcomes whose queue id was never seen ("inconsistent mail").
  pub correlation_misses: u64,
  pub bad_timestamps: u64,
  /// Event sides dropped because the address had no recognized domain.
  pub unknown_domains: u64,
  pub unknown_status: u64,
}

/// What a successful drain of one series did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
  pub appended: u64,
  pub gap_filled: u64,
  pub already_recorded: u64,
}

/// Drain result for one domain.
#[derive(Debug)]
pub struct DomainDrain {
  pub domain: String,
  pub result: Result<DrainOutcome, SinkError>,
}

#[derive(Debug, Default)]
pub struct DrainReport {
  pub domains: Vec<DomainDrain>,
}

impl DrainReport {
  pub fn failures(&self) -> impl Iterator<Item = (&str, &SinkError)> {
    self
      .domains
      .iter()
      .filter_map(|d| d.result.as_ref().err().map(|e| (d.domain.as_str(), e)))
  }

  pub fn get(&self, domain: &str) -> Option<&DomainDrain> {
    self.domains.iter().find(|d| d.domain == domain)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_mapping_is_closed() {
    assert_eq!(EventClass::from_status("sent"), Some(EventClass::Received));
    assert_eq!(EventClass::from_status("bounced"), Some(EventClass::Bounced));
    assert_eq!(EventClass::from_status("reject"), Some(EventClass::Rejected));
    assert_eq!(EventClass::from_status("rejected"), Some(EventClass::Rejected));
    assert_eq!(EventClass::from_status("deferred"), None);
  }

  #[test]
  fn counts_serialize_with_channel_names() {
    let mut c = Counts::ZERO;
    c.bump(EventClass::Received);
    assert_eq!(c.get(EventClass::Received), 1);
    let json = serde_json::to_string(&c).unwrap();
    assert_eq!(json, r#"{"sent":0,"recv":1,"bounced":0,"reject":0}"#);
  }
}
