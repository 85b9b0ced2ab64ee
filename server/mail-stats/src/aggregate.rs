//! Per-domain, per-bucket counters with a mirrored "global" series.

use std::collections::BTreeMap;

use crate::types::{Counts, EventClass, GLOBAL_DOMAIN};

/// Buckets of one series, ascending by bucket start.
pub type BucketCounts = BTreeMap<i64, Counts>;

/// In-memory accumulator for one run.
///
/// Every increment lands twice: once under its domain and once under
/// [`GLOBAL_DOMAIN`], in the same bucket and class.
#[derive(Debug, Default, Clone)]
pub struct CounterAggregator {
  domains: BTreeMap<String, BucketCounts>,
  global: BucketCounts,
}

impl CounterAggregator {
  /// Seed an empty series for every known domain so a snapshot lists them all.
  pub fn new<I, S>(domains: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      domains: domains
        .into_iter()
        .map(|d| (d.into(), BucketCounts::new()))
        .collect(),
      global: BucketCounts::new(),
    }
  }

  pub fn increment(&mut self, domain: &str, bucket: i64, class: EventClass) {
    self
      .domains
      .entry(domain.to_string())
      .or_default()
      .entry(bucket)
      .or_default()
      .bump(class);
    self.global.entry(bucket).or_default().bump(class);
  }

  /// Counts for one (domain, bucket); zero when never touched.
  pub fn get(&self, domain: &str, bucket: i64) -> Counts {
    self
      .series(domain)
      .and_then(|s| s.get(&bucket).copied())
      .unwrap_or(Counts::ZERO)
  }

  pub fn series(&self, domain: &str) -> Option<&BucketCounts> {
    if domain == GLOBAL_DOMAIN {
      Some(&self.global)
    } else {
      self.domains.get(domain)
    }
  }

  /// Every series, domains in name order then "global", each sorted by bucket.
  ///
  /// Read-only; calling it again yields the same sequence.
  pub fn snapshot(&self) -> impl Iterator<Item = (&str, &BucketCounts)> + '_ {
    self
      .domains
      .iter()
      .map(|(d, b)| (d.as_str(), b))
      .chain(std::iter::once((GLOBAL_DOMAIN, &self.global)))
  }
}
