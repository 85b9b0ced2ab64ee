//! Tracing setup for the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::EngineError;

/// Pick the default filter level from the `--verbose` / `--debug` flags.
pub fn level_for(verbose: bool, debug: bool) -> &'static str {
  if debug {
    "trace"
  } else if verbose {
    "debug"
  } else {
    "info"
  }
}

/// Install a stderr formatter. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str) -> Result<(), EngineError> {
  let env_filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(format!("mail_stats={}", level)));

  let formatting_layer = fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false);

  Registry::default()
    .with(env_filter)
    .with(formatting_layer)
    .try_init()
    .map_err(|e| EngineError::validation("logging", &format!("failed to initialize tracing: {}", e)))
}
