//! Mail Stats Engine: per-domain delivery counters from an MTA log.
//!
//! Parses postfix syslog lines, correlates queue "from" records with their
//! per-recipient outcomes, counts sent/received/bounced/rejected per
//! recognized domain (plus "global") in fixed time buckets, and replays the
//! buckets in time order into a series store.
//!
//! Single pass, single thread; all run state lives in one `IngestEngine`.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod extract;
pub mod logging;
pub mod sink;
pub mod store;
pub mod transactions;
pub mod types;

pub use aggregate::CounterAggregator;
pub use config::Config;
pub use directory::DomainDirectory;
pub use engine::{IngestEngine, Phase};
pub use error::{EngineError, SinkError, TimeParseError};
pub use sink::{MemorySink, SeriesQuery, SeriesSink};
pub use store::FileSeriesStore;
pub use types::{Counts, DrainReport, EventClass, IngestStats, RawEvent, GLOBAL_DOMAIN};
