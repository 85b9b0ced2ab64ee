//! Turn raw syslog lines from the MTA into typed events.
//!
//! A line is `<Mon> <day> <H>:<M>:<S> <host> <process>[/<sub>][<pid>]: <payload>`.
//! The payload is tried against three patterns, in order: queue "from",
//! queue "to ... status=", and `NOQUEUE: reject:`. Anything else is skipped.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{LogStamp, ParsedLine, RawEvent};

static HEADER_REGEX: OnceLock<Regex> = OnceLock::new();
static START_REGEX: OnceLock<Regex> = OnceLock::new();
static OUTCOME_REGEX: OnceLock<Regex> = OnceLock::new();
static REJECT_REGEX: OnceLock<Regex> = OnceLock::new();

fn header_regex() -> &'static Regex {
  HEADER_REGEX.get_or_init(|| {
    Regex::new(r"^(\w+)\s+(\d+)\s+(\d+):(\d+):(\d+)\s+(\S+)\s+(\w+)(?:/[\w.-]+)*\[(\d+)\]:\s+(.*)$")
      .expect("Invalid header regex pattern")
  })
}

fn start_regex() -> &'static Regex {
  START_REGEX.get_or_init(|| {
    Regex::new(r"^([0-9A-Za-z]+): from=<([^>]*)>").expect("Invalid transaction-start regex pattern")
  })
}

fn outcome_regex() -> &'static Regex {
  OUTCOME_REGEX.get_or_init(|| {
    Regex::new(r"^([0-9A-Za-z]+): to=<([^>]*)>.*?status=([^\s,]+)")
      .expect("Invalid transaction-outcome regex pattern")
  })
}

fn reject_regex() -> &'static Regex {
  REJECT_REGEX.get_or_init(|| {
    Regex::new(r"NOQUEUE: reject: .*from=<([^>]*)> to=<([^>]*)>").expect("Invalid reject regex pattern")
  })
}

/// Parse a full log line. Returns `None` when the header or payload is not recognized.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
  let caps = header_regex().captures(line.trim_end_matches(['\r', '\n']))?;
  let pid = caps[8].parse::<u32>().ok()?;
  let event = match_payload(&caps[9])?;

  Some(ParsedLine {
    stamp: LogStamp {
      month: caps[1].to_string(),
      day: caps[2].to_string(),
      hour: caps[3].to_string(),
      minute: caps[4].to_string(),
      second: caps[5].to_string(),
    },
    host: caps[6].to_string(),
    process: caps[7].to_string(),
    pid,
    event,
  })
}

/// Event carried by a log line, if any.
pub fn extract(line: &str) -> Option<RawEvent> {
  parse_line(line).map(|p| p.event)
}

/// Match the free-text part of a line against the three event patterns.
pub fn match_payload(payload: &str) -> Option<RawEvent> {
  if let Some(c) = start_regex().captures(payload) {
    return Some(RawEvent::TransactionStart {
      txn_id: c[1].to_string(),
      from: c[2].to_string(),
    });
  }

  if let Some(c) = outcome_regex().captures(payload) {
    return Some(RawEvent::TransactionOutcome {
      txn_id: c[1].to_string(),
      to: c[2].to_string(),
      status: c[3].to_string(),
    });
  }

  reject_regex().captures(payload).map(|c| RawEvent::ImmediateReject {
    from: c[1].to_string(),
    to: c[2].to_string(),
  })
}

/// Domain part of an address, split on the first `@` and lowercased.
///
/// Addresses without `@`, or with an empty local part or domain, have no domain.
pub fn address_domain(address: &str) -> Option<String> {
  let (local, domain) = address.split_once('@')?;
  if local.is_empty() || domain.is_empty() {
    return None;
  }
  Some(domain.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transaction_start_line() {
    let line = "Jan  5 10:00:01 mx1 postfix/qmgr[123]: ABCDEF0123: from=<a@dom1.com>, size=1024, nrcpt=1 (queue active)";
    let parsed = parse_line(line).unwrap();
    assert_eq!(parsed.stamp.month, "Jan");
    assert_eq!(parsed.stamp.day, "5");
    assert_eq!(parsed.stamp.second, "01");
    assert_eq!(parsed.host, "mx1");
    assert_eq!(parsed.process, "postfix");
    assert_eq!(parsed.pid, 123);
    assert_eq!(
      parsed.event,
      RawEvent::TransactionStart {
        txn_id: "ABCDEF0123".into(),
        from: "a@dom1.com".into(),
      }
    );
  }

  #[test]
  fn transaction_outcome_line() {
    let line = "Jan 5 10:00:30 host postfix/smtp[123]: ABCDEF0123: to=<b@dom2.com>, relay=mx.dom2.com[10.0.0.1]:25, delay=0.5, dsn=2.0.0, status=sent (250 2.0.0 Ok)";
    assert_eq!(
      extract(line),
      Some(RawEvent::TransactionOutcome {
        txn_id: "ABCDEF0123".into(),
        to: "b@dom2.com".into(),
        status: "sent".into(),
      })
    );
  }

  #[test]
  fn immediate_reject_line() {
    let line = "Feb 11 08:15:00 mx1.example.org postfix/smtpd[4242]: NOQUEUE: reject: RCPT from unknown[192.0.2.7]: 554 5.7.1 Relay access denied; from=<x@out.com> to=<y@dom1.com> proto=ESMTP helo=<spam>";
    assert_eq!(
      extract(line),
      Some(RawEvent::ImmediateReject {
        from: "x@out.com".into(),
        to: "y@dom1.com".into(),
      })
    );
  }

  #[test]
  fn outcome_without_status_is_ignored() {
    let line = "Jan 5 10:00:30 host postfix/smtp[123]: ABCDEF0123: to=<b@dom2.com>, orig_to=<c@dom2.com>";
    assert_eq!(extract(line), None);
  }

  #[test]
  fn unrelated_payloads_are_ignored() {
    assert_eq!(extract("Jan 5 10:00:30 host postfix/cleanup[9]: ABCDEF0123: message-id=<x@y>"), None);
    assert_eq!(extract("Jan 5 10:00:30 host postfix/qmgr[9]: ABCDEF0123: removed"), None);
  }

  #[test]
  fn malformed_header_is_ignored() {
    assert_eq!(extract("not a syslog line: ABCDEF0123: from=<a@b.c>"), None);
    assert_eq!(extract("Jan 5 10:00 host postfix/smtp[1]: ABCDEF0123: from=<a@b.c>"), None);
    // Missing pid.
    assert_eq!(extract("Jan 5 10:00:00 host postfix/smtp: ABCDEF0123: from=<a@b.c>"), None);
  }

  #[test]
  fn header_accepts_impossible_dates() {
    // Calendar validation belongs to bucketing, not extraction.
    let parsed = parse_line("Foo 31 25:61:99 host postfix/smtp[1]: Q1: from=<a@b.c>").unwrap();
    assert_eq!(parsed.stamp.month, "Foo");
  }

  #[test]
  fn null_sender_is_captured_empty() {
    let ev = extract("Jan 5 10:00:01 host postfix/qmgr[1]: Q1: from=<>, size=10, nrcpt=1").unwrap();
    assert_eq!(
      ev,
      RawEvent::TransactionStart {
        txn_id: "Q1".into(),
        from: String::new(),
      }
    );
  }

  #[test]
  fn address_domain_basics() {
    assert_eq!(address_domain("a@Dom1.COM"), Some("dom1.com".into()));
    assert_eq!(address_domain("a@b@c.com"), Some("b@c.com".into()));
    assert_eq!(address_domain("postmaster"), None);
    assert_eq!(address_domain("@dom.com"), None);
    assert_eq!(address_domain("a@"), None);
    assert_eq!(address_domain(""), None);
  }
}
