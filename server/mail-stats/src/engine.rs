//! Core engine: reads the log once, correlates deliveries, then replays counters into a sink.

use std::io::BufRead;

use tracing::{debug, error, info, warn};

use crate::aggregate::{BucketCounts, CounterAggregator};
use crate::bucket::{current_year, stamp_bucket};
use crate::config::{Config, TimestampPolicy};
use crate::directory::DomainDirectory;
use crate::error::{EngineError, SinkError};
use crate::extract::{self, address_domain};
use crate::sink::SeriesSink;
use crate::transactions::TransactionTable;
use crate::types::*;

/// Lifecycle of one run. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Reading,
  Draining,
  Done,
}

/// The ingest engine. Holds the correlation table and counters for one log pass.
pub struct IngestEngine {
  config: Config,
  year: i32,
  domains: DomainDirectory,
  transactions: TransactionTable,
  counters: CounterAggregator,
  stats: IngestStats,
  phase: Phase,
}

impl IngestEngine {
  pub fn new(config: Config, domains: DomainDirectory) -> Result<Self, EngineError> {
    let counters = CounterAggregator::new(domains.iter());
    Self::with_counters(config, domains, counters)
  }

  /// Build around a caller-supplied aggregator.
  pub fn with_counters(
    config: Config,
    domains: DomainDirectory,
    counters: CounterAggregator,
  ) -> Result<Self, EngineError> {
    config.validate()?;
    let year = config.year.unwrap_or_else(current_year);
    Ok(Self {
      config,
      year,
      domains,
      transactions: TransactionTable::new(),
      counters,
      stats: IngestStats::default(),
      phase: Phase::Reading,
    })
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn stats(&self) -> &IngestStats {
    &self.stats
  }

  pub fn counters(&self) -> &CounterAggregator {
    &self.counters
  }

  pub fn transactions(&self) -> &TransactionTable {
    &self.transactions
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  fn expect_phase(&self, expected: Phase) -> Result<(), EngineError> {
    if self.phase == expected {
      Ok(())
    } else {
      Err(EngineError::Phase {
        expected,
        actual: self.phase,
      })
    }
  }

  /// Process one log line. Unrecognized or inconsistent lines are counted, never errors.
  pub fn feed_line(&mut self, line: &str) -> Result<(), EngineError> {
    self.expect_phase(Phase::Reading)?;
    self.stats.lines += 1;

    let parsed = match extract::parse_line(line) {
      Some(p) => p,
      None => {
        self.stats.unmatched += 1;
        return Ok(());
      }
    };

    match parsed.event {
      RawEvent::TransactionStart { txn_id, from } => {
        self.stats.starts += 1;
        self.transactions.record(&txn_id, &from);
      }
      RawEvent::TransactionOutcome { txn_id, to, status } => {
        self.stats.outcomes += 1;
        let from = match self.transactions.lookup(&txn_id) {
          Some(f) => f.to_string(),
          None => {
            self.stats.correlation_misses += 1;
            warn!(txn = %txn_id, "inconsistent mail, skipping");
            return Ok(());
          }
        };
        let bucket = match self.bucket_for(&parsed.stamp) {
          Some(b) => b,
          None => return Ok(()),
        };

        self.credit(address_domain(&from), bucket, EventClass::Sent);
        match EventClass::from_status(&status) {
          Some(class) => self.credit(address_domain(&to), bucket, class),
          None => {
            self.stats.unknown_status += 1;
            debug!(txn = %txn_id, status = %status, "status not counted");
          }
        }
      }
      RawEvent::ImmediateReject { to, .. } => {
        self.stats.rejects += 1;
        if let Some(bucket) = self.bucket_for(&parsed.stamp) {
          self.credit(address_domain(&to), bucket, EventClass::Rejected);
        }
      }
    }
    Ok(())
  }

  /// Feed every line of `reader`, then return the pass statistics.
  ///
  /// Invalid UTF-8 is replaced rather than treated as a read error.
  pub fn ingest<R: BufRead>(&mut self, mut reader: R) -> Result<IngestStats, EngineError> {
    self.expect_phase(Phase::Reading)?;
    let mut buf = Vec::new();
    loop {
      buf.clear();
      if reader.read_until(b'\n', &mut buf)? == 0 {
        break;
      }
      let line = String::from_utf8_lossy(&buf);
      self.feed_line(&line)?;
    }

    info!(
      lines = self.stats.lines,
      starts = self.stats.starts,
      outcomes = self.stats.outcomes,
      rejects = self.stats.rejects,
      inconsistent = self.stats.correlation_misses,
      bad_timestamps = self.stats.bad_timestamps,
      pending = self.transactions.len(),
      "log consumed"
    );
    Ok(self.stats)
  }

  /// Replay every selected series into `sink`, then finish the run.
  ///
  /// A sink failure stops that domain only; it is recorded in the report and
  /// the remaining domains are still drained.
  pub fn drain<S: SeriesSink + ?Sized>(&mut self, sink: &mut S) -> Result<DrainReport, EngineError> {
    self.expect_phase(Phase::Reading)?;
    self.phase = Phase::Draining;

    let step = self.config.step;
    let mut report = DrainReport::default();
    for (domain, buckets) in self.counters.snapshot() {
      if !self.config.target.includes(domain) {
        continue;
      }
      let result = drain_series(sink, domain, buckets, step);
      match &result {
        Ok(o) => info!(
          domain,
          appended = o.appended,
          gap_filled = o.gap_filled,
          already_recorded = o.already_recorded,
          "series drained"
        ),
        Err(e) => error!(domain, error = %e, "series drain failed"),
      }
      report.domains.push(DomainDrain {
        domain: domain.to_string(),
        result,
      });
    }

    self.transactions.clear();
    self.phase = Phase::Done;
    Ok(report)
  }

  fn bucket_for(&mut self, stamp: &LogStamp) -> Option<i64> {
    match stamp_bucket(self.year, stamp, self.config.step, self.config.timezone) {
      Ok(b) => Some(b),
      Err(e) => {
        self.stats.bad_timestamps += 1;
        warn!(error = %e, month = %stamp.month, day = %stamp.day, "unrecognized time format");
        match self.config.bad_timestamp {
          TimestampPolicy::SkipLine => None,
          TimestampPolicy::ZeroBucket => Some(0),
        }
      }
    }
  }

  fn credit(&mut self, domain: Option<String>, bucket: i64, class: EventClass) {
    match domain {
      Some(d) if self.domains.contains(&d) => self.counters.increment(&d, bucket, class),
      _ => self.stats.unknown_domains += 1,
    }
  }
}

/// Append one series' buckets after the sink's last written bucket, zero-filling gaps.
///
/// Buckets at or before the last written one are skipped as already recorded,
/// so re-draining the same counters is a no-op.
pub fn drain_series<S: SeriesSink + ?Sized>(
  sink: &mut S,
  domain: &str,
  buckets: &BucketCounts,
  step: i64,
) -> Result<DrainOutcome, SinkError> {
  let mut outcome = DrainOutcome::default();
  let first = match buckets.keys().next() {
    Some(b) => *b,
    None => {
      debug!(domain, "no events");
      return Ok(outcome);
    }
  };

  sink.ensure_series(domain, first)?;
  let mut last = sink.last_written_bucket(domain)?;

  for (&bucket, counts) in buckets {
    if let Some(l) = last {
      if bucket <= l {
        debug!(domain, bucket, "events already recorded");
        outcome.already_recorded += 1;
        continue;
      }
      let mut gap = l + step;
      while gap < bucket {
        debug!(domain, bucket = gap, "gap fill");
        sink.append(domain, gap, &Counts::ZERO)?;
        outcome.gap_filled += 1;
        gap += step;
      }
    }
    debug!(domain, bucket, ?counts, "update");
    sink.append(domain, bucket, counts)?;
    outcome.appended += 1;
    last = Some(bucket);
  }

  Ok(outcome)
}
