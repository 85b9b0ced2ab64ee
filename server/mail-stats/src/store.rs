//! File-backed series store: one JSON-lines file per domain under a working directory.
//!
//! Layout of `<root>/<domain>.series`:
//! - line 1: header `{"start": <epoch>, "step": <secs>, "channels": [...]}`
//! - then one row per bucket: `{"t": <epoch>, "sent": n, "recv": n, "bounced": n, "reject": n}`

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bucket::align;
use crate::error::SinkError;
use crate::sink::{check_append, Row, Rows, SeriesQuery, SeriesSink};
use crate::types::Counts;

const CHANNELS: [&str; 4] = ["sent", "recv", "bounced", "reject"];

#[derive(Debug, Serialize, Deserialize)]
struct Header {
  start: i64,
  step: i64,
  channels: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRow {
  t: i64,
  #[serde(flatten)]
  counts: Counts,
}

#[derive(Debug, Clone, Copy)]
struct SeriesState {
  start: i64,
  last: Option<i64>,
}

/// Series files rooted at one directory, all sharing a step.
#[derive(Debug)]
pub struct FileSeriesStore {
  root: PathBuf,
  step: i64,
  /// Start and last written bucket per series, filled on first access.
  known: HashMap<String, SeriesState>,
  /// Append handle of the series written last; a drain appends one domain at a time.
  open: Option<(String, File)>,
}

impl FileSeriesStore {
  pub fn new(root: impl Into<PathBuf>, step: i64) -> Result<Self, SinkError> {
    if step <= 0 {
      return Err(SinkError::InvalidStep(step));
    }
    Ok(Self {
      root: root.into(),
      step,
      known: HashMap::new(),
      open: None,
    })
  }

  /// File holding a domain's series.
  pub fn series_path(&self, domain: &str) -> Result<PathBuf, SinkError> {
    let bad = domain.is_empty()
      || domain.starts_with('.')
      || domain.contains(['/', '\\', '\0']);
    if bad {
      return Err(SinkError::InvalidSeriesName(domain.to_string()));
    }
    Ok(self.root.join(format!("{}.series", domain)))
  }

  fn state(&mut self, domain: &str) -> Result<Option<SeriesState>, SinkError> {
    if let Some(s) = self.known.get(domain) {
      return Ok(Some(*s));
    }
    let path = self.series_path(domain)?;
    let file = match File::open(&path) {
      Ok(f) => f,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let state = self.scan(domain, BufReader::new(file))?;
    self.known.insert(domain.to_string(), state);
    Ok(Some(state))
  }

  fn writer(&mut self, domain: &str) -> Result<&mut File, SinkError> {
    let stale = !matches!(&self.open, Some((d, _)) if d == domain);
    if stale {
      let path = self.series_path(domain)?;
      let file = OpenOptions::new().append(true).open(&path)?;
      self.open = Some((domain.to_string(), file));
    }
    self
      .open
      .as_mut()
      .map(|(_, f)| f)
      .ok_or_else(|| SinkError::MissingSeries(domain.to_string()))
  }

  /// Read the header and the last row of an existing series file.
  fn scan<R: BufRead>(&self, domain: &str, reader: R) -> Result<SeriesState, SinkError> {
    let mut lines = reader.lines();
    let header_line = lines.next().transpose()?.ok_or_else(|| SinkError::Corrupt {
      series: domain.to_string(),
      reason: "missing header".into(),
    })?;
    let header: Header = serde_json::from_str(&header_line)?;
    if header.step != self.step {
      return Err(SinkError::StepMismatch {
        series: domain.to_string(),
        found: header.step,
        expected: self.step,
      });
    }

    let mut last = None;
    for line in lines {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let row: StoredRow = serde_json::from_str(&line)?;
      last = Some(row.t);
    }

    Ok(SeriesState {
      start: header.start,
      last,
    })
  }
}

impl SeriesSink for FileSeriesStore {
  fn ensure_series(&mut self, domain: &str, first_bucket: i64) -> Result<(), SinkError> {
    if self.state(domain)?.is_some() {
      return Ok(());
    }
    if align(first_bucket, self.step) != first_bucket {
      return Err(SinkError::Misaligned {
        bucket: first_bucket,
        step: self.step,
      });
    }

    fs::create_dir_all(&self.root)?;
    let path = self.series_path(domain)?;
    let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let header = Header {
      start: first_bucket,
      step: self.step,
      channels: CHANNELS.iter().map(|c| c.to_string()).collect(),
    };
    serde_json::to_writer(&mut file, &header)?;
    writeln!(file)?;
    file.flush()?;

    info!(domain, start = first_bucket, path = %path.display(), "create new series");
    self.known.insert(
      domain.to_string(),
      SeriesState {
        start: first_bucket,
        last: None,
      },
    );
    Ok(())
  }

  fn last_written_bucket(&mut self, domain: &str) -> Result<Option<i64>, SinkError> {
    Ok(self.state(domain)?.and_then(|s| s.last))
  }

  fn append(&mut self, domain: &str, bucket: i64, counts: &Counts) -> Result<(), SinkError> {
    let state = self
      .state(domain)?
      .ok_or_else(|| SinkError::MissingSeries(domain.to_string()))?;
    check_append(state.start, self.step, state.last, bucket)?;

    let mut line = serde_json::to_vec(&StoredRow {
      t: bucket,
      counts: *counts,
    })?;
    line.push(b'\n');
    self.writer(domain)?.write_all(&line)?;

    debug!(domain, bucket, ?counts, "append");
    self.known.insert(
      domain.to_string(),
      SeriesState {
        start: state.start,
        last: Some(bucket),
      },
    );
    Ok(())
  }
}

impl SeriesQuery for FileSeriesStore {
  fn rows(&self, domain: &str, start: i64, end: i64) -> Result<Rows<'_>, SinkError> {
    let path = self.series_path(domain)?;
    let file = match File::open(&path) {
      Ok(f) => f,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(SinkError::MissingSeries(domain.to_string()))
      }
      Err(e) => return Err(e.into()),
    };

    let rows = BufReader::new(file)
      .lines()
      .skip(1)
      .filter_map(|line| match line {
        Ok(l) if l.trim().is_empty() => None,
        Ok(l) => Some(
          serde_json::from_str::<StoredRow>(&l)
            .map(|r| (r.t, r.counts))
            .map_err(SinkError::from),
        ),
        Err(e) => Some(Err(SinkError::from(e))),
      })
      .filter(move |r: &Result<Row, SinkError>| match r {
        Ok((t, _)) => *t >= start && *t < end,
        Err(_) => true,
      });
    Ok(Box::new(rows))
  }
}
