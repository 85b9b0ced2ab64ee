//! The contract between the engine and a time-series store.
//!
//! A sink holds one series per domain. Each series starts at a declared
//! bucket and accepts rows only in strictly increasing, step-aligned order.

use std::collections::BTreeMap;

use crate::bucket::align;
use crate::error::SinkError;
use crate::types::{Consolidation, Counts, Sample};

/// One stored row: bucket start and its counts.
pub type Row = (i64, Counts);

/// Lazily produced rows of one series.
pub type Rows<'a> = Box<dyn Iterator<Item = Result<Row, SinkError>> + 'a>;

/// Append side of a series store.
pub trait SeriesSink {
  /// Create the series if it does not exist, declaring `first_bucket` as its start.
  fn ensure_series(&mut self, domain: &str, first_bucket: i64) -> Result<(), SinkError>;

  /// Latest bucket written to the series; `None` if it is missing or empty.
  fn last_written_bucket(&mut self, domain: &str) -> Result<Option<i64>, SinkError>;

  /// Write one row. Fails unless `bucket` is after the last written bucket.
  fn append(&mut self, domain: &str, bucket: i64, counts: &Counts) -> Result<(), SinkError>;
}

/// Read side of a series store, used by graphing rather than ingestion.
pub trait SeriesQuery {
  /// Stored rows with `start <= t < end`, ascending.
  fn rows(&self, domain: &str, start: i64, end: i64) -> Result<Rows<'_>, SinkError>;

  /// Rows in `[start, end)` folded into `resolution`-wide windows with `cf`.
  fn query_range(
    &self,
    domain: &str,
    cf: Consolidation,
    start: i64,
    end: i64,
    resolution: i64,
  ) -> Result<Consolidate<Rows<'_>>, SinkError> {
    Ok(Consolidate::new(self.rows(domain, start, end)?, cf, resolution))
  }
}

/// Validate a row against a series' start, step and last written bucket.
pub fn check_append(
  start: i64,
  step: i64,
  last: Option<i64>,
  bucket: i64,
) -> Result<(), SinkError> {
  if align(bucket, step) != bucket {
    return Err(SinkError::Misaligned { bucket, step });
  }
  if bucket < start {
    return Err(SinkError::BeforeStart { bucket, start });
  }
  match last {
    Some(last) if bucket <= last => Err(SinkError::NotMonotonic { bucket, last }),
    _ => Ok(()),
  }
}

// ---------------------------------------------------------------------------
// Consolidation
// ---------------------------------------------------------------------------

/// Iterator adaptor grouping ascending rows into aligned windows.
pub struct Consolidate<I> {
  rows: I,
  cf: Consolidation,
  resolution: i64,
  carry: Option<Row>,
}

impl<I> Consolidate<I>
where
  I: Iterator<Item = Result<Row, SinkError>>,
{
  pub fn new(rows: I, cf: Consolidation, resolution: i64) -> Self {
    Self {
      rows,
      cf,
      resolution: resolution.max(1),
      carry: None,
    }
  }

  fn finish(&self, window: i64, sum: [u64; 4], max: [u64; 4], n: u64) -> Sample {
    let v = match self.cf {
      Consolidation::Average => sum.map(|s| s as f64 / n as f64),
      Consolidation::Max => max.map(|m| m as f64),
    };
    Sample {
      time: window,
      sent: v[0],
      received: v[1],
      bounced: v[2],
      rejected: v[3],
    }
  }
}

fn channels(c: &Counts) -> [u64; 4] {
  [c.sent, c.received, c.bounced, c.rejected]
}

impl<I> Iterator for Consolidate<I>
where
  I: Iterator<Item = Result<Row, SinkError>>,
{
  type Item = Result<Sample, SinkError>;

  fn next(&mut self) -> Option<Self::Item> {
    let (t, first) = match self.carry.take() {
      Some(row) => row,
      None => match self.rows.next()? {
        Ok(row) => row,
        Err(e) => return Some(Err(e)),
      },
    };

    let window = align(t, self.resolution);
    let mut sum = channels(&first);
    let mut max = sum;
    let mut n = 1u64;

    loop {
      match self.rows.next() {
        None => break,
        Some(Err(e)) => return Some(Err(e)),
        Some(Ok((t, c))) if align(t, self.resolution) == window => {
          for (i, v) in channels(&c).into_iter().enumerate() {
            sum[i] += v;
            max[i] = max[i].max(v);
          }
          n += 1;
        }
        Some(Ok(row)) => {
          self.carry = Some(row);
          break;
        }
      }
    }

    Some(Ok(self.finish(window, sum, max, n)))
  }
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemorySeries {
  start: i64,
  rows: Vec<Row>,
}

/// A sink that keeps every series in memory.
#[derive(Debug, Clone)]
pub struct MemorySink {
  step: i64,
  series: BTreeMap<String, MemorySeries>,
}

impl MemorySink {
  pub fn new(step: i64) -> Result<Self, SinkError> {
    if step <= 0 {
      return Err(SinkError::InvalidStep(step));
    }
    Ok(Self {
      step,
      series: BTreeMap::new(),
    })
  }

  /// Rows written to a series so far (empty if it does not exist).
  pub fn rows_of(&self, domain: &str) -> &[Row] {
    self.series.get(domain).map(|s| s.rows.as_slice()).unwrap_or(&[])
  }

  pub fn start_of(&self, domain: &str) -> Option<i64> {
    self.series.get(domain).map(|s| s.start)
  }

  pub fn has_series(&self, domain: &str) -> bool {
    self.series.contains_key(domain)
  }
}

impl SeriesSink for MemorySink {
  fn ensure_series(&mut self, domain: &str, first_bucket: i64) -> Result<(), SinkError> {
    if align(first_bucket, self.step) != first_bucket {
      return Err(SinkError::Misaligned {
        bucket: first_bucket,
        step: self.step,
      });
    }
    self
      .series
      .entry(domain.to_string())
      .or_insert_with(|| MemorySeries {
        start: first_bucket,
        rows: Vec::new(),
      });
    Ok(())
  }

  fn last_written_bucket(&mut self, domain: &str) -> Result<Option<i64>, SinkError> {
    Ok(self.series.get(domain).and_then(|s| s.rows.last()).map(|(t, _)| *t))
  }

  fn append(&mut self, domain: &str, bucket: i64, counts: &Counts) -> Result<(), SinkError> {
    let step = self.step;
    let series = self
      .series
      .get_mut(domain)
      .ok_or_else(|| SinkError::MissingSeries(domain.to_string()))?;
    check_append(series.start, step, series.rows.last().map(|(t, _)| *t), bucket)?;
    series.rows.push((bucket, *counts));
    Ok(())
  }
}

impl SeriesQuery for MemorySink {
  fn rows(&self, domain: &str, start: i64, end: i64) -> Result<Rows<'_>, SinkError> {
    let series = self
      .series
      .get(domain)
      .ok_or_else(|| SinkError::MissingSeries(domain.to_string()))?;
    Ok(Box::new(
      series
        .rows
        .iter()
        .filter(move |(t, _)| *t >= start && *t < end)
        .map(|row| Ok::<Row, SinkError>(*row)),
    ))
  }
}
