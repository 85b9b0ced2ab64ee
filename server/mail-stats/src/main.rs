//! Binary entrypoint: parse one mail log, update the per-domain series under a working directory.
//!
//! Exit codes: 0 on success, 1 on bad configuration or if the log or domain list cannot be read,
//! 2 if any domain's series could not be written.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};

use mail_stats::config::{Config, LogTimezone, Target, TimestampPolicy, DEFAULT_STEP};
use mail_stats::{logging, DomainDirectory, EngineError, FileSeriesStore, IngestEngine};

#[derive(Parser)]
#[command(name = "mail-stats")]
#[command(version, about = "Per-domain mail traffic counters from a postfix log", long_about = None)]
struct Cli {
  /// Postfix log in syslog format
  #[arg(short = 'l', long, env = "MAILLOG_FILE", default_value = "/var/log/maillog", value_name = "FILE")]
  log_file: PathBuf,

  /// Directory holding one series file per domain
  #[arg(short = 'w', long, env = "MAILSTATS_ROOTDIR", default_value = "/tmp", value_name = "DIR")]
  workdir: PathBuf,

  /// File listing recognized domains, one per line
  #[arg(long, value_name = "FILE")]
  domains: Option<PathBuf>,

  /// Recognized domain (repeatable)
  #[arg(long = "domain", value_name = "NAME")]
  domain: Vec<String>,

  /// Year of the log entries (defaults to the current year)
  #[arg(short, long)]
  year: Option<i32>,

  /// Bucket width in seconds
  #[arg(long, default_value_t = DEFAULT_STEP, value_parser = clap::value_parser!(i64).range(1..))]
  step: i64,

  /// Read header times in the host timezone instead of UTC
  #[arg(long)]
  local_time: bool,

  /// Count events with unparseable times at epoch 0 instead of dropping them.
  /// Use only against an empty work directory: the first drain pads each
  /// series with one row per step from 1970 up to the log's own times.
  #[arg(long)]
  zero_bad_timestamps: bool,

  /// Domain whose series is updated, or "all"
  #[arg(short, long, default_value = "all")]
  target: String,

  /// Log every series update
  #[arg(short, long)]
  verbose: bool,

  /// Log everything
  #[arg(short, long)]
  debug: bool,
}

fn load_domains(cli: &Cli) -> Result<DomainDirectory, EngineError> {
  let mut names: Vec<String> = match &cli.domains {
    Some(path) => DomainDirectory::load(path)?.iter().map(str::to_string).collect(),
    None => Vec::new(),
  };
  names.extend(cli.domain.iter().cloned());
  DomainDirectory::new(names)
}

fn main() {
  let cli = Cli::parse();

  if let Err(e) = logging::init_tracing(logging::level_for(cli.verbose, cli.debug)) {
    eprintln!("mail-stats: {}", e);
  }

  let domains = match load_domains(&cli) {
    Ok(d) => d,
    Err(e) => {
      error!(error = %e, "cannot load domain list");
      std::process::exit(1);
    }
  };
  if domains.is_empty() {
    warn!("no recognized domains; only empty series will be reported");
  }

  let file = match File::open(&cli.log_file) {
    Ok(f) => f,
    Err(e) => {
      error!(path = %cli.log_file.display(), error = %e, "cannot open log file");
      std::process::exit(1);
    }
  };

  let config = Config {
    step: cli.step,
    year: cli.year,
    timezone: if cli.local_time { LogTimezone::Local } else { LogTimezone::Utc },
    bad_timestamp: if cli.zero_bad_timestamps {
      TimestampPolicy::ZeroBucket
    } else {
      TimestampPolicy::SkipLine
    },
    target: Target::parse(&cli.target),
  };

  let mut engine = match IngestEngine::new(config, domains) {
    Ok(e) => e,
    Err(e) => {
      error!(error = %e, "invalid configuration");
      std::process::exit(1);
    }
  };
  info!(path = %cli.log_file.display(), year = engine.year(), "parsing log");
  if let Err(e) = engine.ingest(BufReader::new(file)) {
    error!(error = %e, "log read failed");
    std::process::exit(1);
  }

  let mut store = match FileSeriesStore::new(&cli.workdir, cli.step) {
    Ok(s) => s,
    Err(e) => {
      error!(error = %e, "invalid series store");
      std::process::exit(1);
    }
  };
  let report = match engine.drain(&mut store) {
    Ok(r) => r,
    Err(e) => {
      error!(error = %e, "drain failed");
      std::process::exit(2);
    }
  };

  let mut failed = false;
  for (domain, e) in report.failures() {
    error!(domain, error = %e, "series not updated");
    failed = true;
  }
  if failed {
    std::process::exit(2);
  }
}
