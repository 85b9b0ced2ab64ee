//! Integration tests for the mail stats engine.

use chrono::{TimeZone, Utc};
use mail_stats::config::Config;
use mail_stats::sink::Row;
use mail_stats::types::Consolidation;
use mail_stats::{
  Counts, DomainDirectory, FileSeriesStore, IngestEngine, MemorySink, SeriesQuery, SeriesSink, GLOBAL_DOMAIN,
};
use tempfile::TempDir;

const LOG: &str = "\
Jan  5 10:00:01 mx1 postfix/smtpd[2001]: ABCDEF0123: client=unknown[192.0.2.10]
Jan  5 10:00:01 mx1 postfix/qmgr[1500]: ABCDEF0123: from=<alice@dom1.com>, size=2048, nrcpt=2 (queue active)
Jan  5 10:00:30 mx1 postfix/smtp[2002]: ABCDEF0123: to=<bob@dom2.com>, relay=mx.dom2.com[198.51.100.2]:25, delay=0.4, dsn=2.0.0, status=sent (250 2.0.0 Ok)
Jan  5 10:00:31 mx1 postfix/smtp[2002]: ABCDEF0123: to=<carol@elsewhere.net>, relay=none, delay=1, dsn=5.1.1, status=bounced (user unknown)
Jan  5 10:00:31 mx1 postfix/qmgr[1500]: ABCDEF0123: removed
Jan  5 10:01:12 mx1 postfix/smtp[2003]: ZZZZZZ9999: to=<dave@dom2.com>, relay=local, status=sent (delivered)
Jan  5 10:03:40 mx1 postfix/smtpd[2004]: NOQUEUE: reject: RCPT from spam[203.0.113.9]: 554 5.7.1 Relay access denied; from=<x@out.com> to=<y@dom1.com> proto=ESMTP helo=<spam>
this line is not syslog at all
";

fn minute(m: u32) -> i64 {
  Utc.with_ymd_and_hms(2025, 1, 5, 10, m, 0).unwrap().timestamp()
}

fn engine() -> IngestEngine {
  let config = Config {
    year: Some(2025),
    ..Config::default()
  };
  IngestEngine::new(config, DomainDirectory::new(["dom1.com", "dom2.com"]).unwrap()).unwrap()
}

fn rows(store: &FileSeriesStore, domain: &str) -> Vec<Row> {
  store
    .rows(domain, i64::MIN, i64::MAX)
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap()
}

#[test]
fn full_log_into_file_store() {
  let dir = TempDir::new().unwrap();
  let mut e = engine();
  let stats = e.ingest(LOG.as_bytes()).unwrap();

  assert_eq!(stats.lines, 8);
  assert_eq!(stats.starts, 1);
  assert_eq!(stats.outcomes, 3);
  assert_eq!(stats.rejects, 1);
  assert_eq!(stats.correlation_misses, 1);

  let mut store = FileSeriesStore::new(dir.path(), 60).unwrap();
  let report = e.drain(&mut store).unwrap();
  assert_eq!(report.failures().count(), 0);

  // dom1.com: two sends at 10:00, gap at 10:01 and 10:02, reject at 10:03.
  let dom1 = rows(&store, "dom1.com");
  let times: Vec<i64> = dom1.iter().map(|(t, _)| *t).collect();
  assert_eq!(times, vec![minute(0), minute(1), minute(2), minute(3)]);
  assert_eq!(dom1[0].1.sent, 2);
  assert!(dom1[1].1.is_zero() && dom1[2].1.is_zero());
  assert_eq!(dom1[3].1.rejected, 1);

  // dom2.com: one reception at 10:00; the unseen queue id at 10:01 is dropped.
  let dom2 = rows(&store, "dom2.com");
  assert_eq!(dom2.len(), 1);
  assert_eq!(dom2[0], (minute(0), Counts { received: 1, ..Counts::ZERO }));

  // global: bounce to an unknown domain is not counted anywhere.
  let global = rows(&store, GLOBAL_DOMAIN);
  assert_eq!(global[0].1, Counts { sent: 2, received: 1, ..Counts::ZERO });
  assert_eq!(global.last().unwrap().1.rejected, 1);
  assert_eq!(global.iter().map(|(_, c)| c.bounced).sum::<u64>(), 0);
}

#[test]
fn rerun_over_same_log_is_a_noop() {
  let dir = TempDir::new().unwrap();

  let mut first = engine();
  first.ingest(LOG.as_bytes()).unwrap();
  first.drain(&mut FileSeriesStore::new(dir.path(), 60).unwrap()).unwrap();
  let before = std::fs::read_to_string(dir.path().join("global.series")).unwrap();

  let mut second = engine();
  second.ingest(LOG.as_bytes()).unwrap();
  let report = second.drain(&mut FileSeriesStore::new(dir.path(), 60).unwrap()).unwrap();
  let after = std::fs::read_to_string(dir.path().join("global.series")).unwrap();

  assert_eq!(before, after);
  let global = report.get(GLOBAL_DOMAIN).unwrap().result.as_ref().unwrap();
  assert_eq!(global.appended, 0);
  assert_eq!(global.already_recorded, 2);
}

#[test]
fn later_log_extends_series_with_gap_fill() {
  let mut sink = MemorySink::new(60).unwrap();

  let mut first = engine();
  first.ingest(LOG.as_bytes()).unwrap();
  first.drain(&mut sink).unwrap();

  let later = "Jan  5 10:06:00 mx1 postfix/qmgr[1500]: QQQQQQ1111: from=<eve@dom2.com>\n\
               Jan  5 10:06:02 mx1 postfix/smtp[2010]: QQQQQQ1111: to=<frank@dom1.com>, status=sent (ok)\n";
  let mut second = engine();
  second.ingest(later.as_bytes()).unwrap();
  let report = second.drain(&mut sink).unwrap();

  let dom2 = sink.rows_of("dom2.com");
  let times: Vec<i64> = dom2.iter().map(|(t, _)| *t).collect();
  assert_eq!(times, (0..=6).map(minute).collect::<Vec<_>>());
  assert_eq!(dom2[6].1.sent, 1);

  let outcome = report.get("dom2.com").unwrap().result.as_ref().unwrap();
  assert_eq!(outcome.gap_filled, 5);
  assert_eq!(outcome.appended, 1);
}

#[test]
fn drained_series_are_strictly_increasing() {
  let mut sink = MemorySink::new(60).unwrap();
  let mut e = engine();
  e.ingest(LOG.as_bytes()).unwrap();
  e.drain(&mut sink).unwrap();

  for domain in ["dom1.com", "dom2.com", GLOBAL_DOMAIN] {
    let rows = sink.rows_of(domain);
    assert!(rows.windows(2).all(|w| w[1].0 == w[0].0 + 60), "{} not contiguous", domain);
  }
}

#[test]
fn query_range_reads_back_consolidated_samples() {
  let dir = TempDir::new().unwrap();
  let mut e = engine();
  e.ingest(LOG.as_bytes()).unwrap();
  let mut store = FileSeriesStore::new(dir.path(), 60).unwrap();
  e.drain(&mut store).unwrap();

  let samples: Vec<_> = store
    .query_range("dom1.com", Consolidation::Max, minute(0), minute(4), 120)
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(samples.len(), 2);
  assert!((samples[0].sent - 2.0).abs() < f64::EPSILON);
  assert!((samples[1].rejected - 1.0).abs() < f64::EPSILON);
}

#[test]
fn existing_series_blocks_earlier_buckets() {
  let mut sink = MemorySink::new(60).unwrap();
  sink.ensure_series("dom1.com", minute(5)).unwrap();
  sink.append("dom1.com", minute(5), &Counts::ZERO).unwrap();

  let mut e = engine();
  e.ingest(LOG.as_bytes()).unwrap();
  let report = e.drain(&mut sink).unwrap();

  let dom1 = report.get("dom1.com").unwrap().result.as_ref().unwrap();
  assert_eq!(dom1.already_recorded, 2);
  assert_eq!(sink.rows_of("dom1.com").len(), 1);
}
