use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber built by [`subscriber`].
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    subscriber(verbose, log_file)?
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(())
}

/// Build the subscriber without installing it.
///
/// Logs go to stderr so that `--json` output on stdout stays parseable.
/// `RUST_LOG` wins over `verbose`; otherwise the level is `info`, or `debug`
/// when verbose. With `log_file`, the same records are also appended there
/// without colours.
pub fn subscriber(
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<impl tracing::Subscriber + Send + Sync + 'static> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    let file_layer = match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(filter_layer)
        .with(stderr_layer)
        .with(file_layer))
}
