//! Tracing subscriber installation for the binary and the HTTP server.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{GraphError, Result};

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, or `default`
/// when the variable is unset or unparsable. Later calls are no-ops.
pub fn install_tracing_subscriber(default: &str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Validates a filter directive such as `info` or `gamegraph=debug`.
pub fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|err| GraphError::InvalidArgument(format!("invalid log filter: {err}")))
}
