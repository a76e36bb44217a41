//! Tracing subscriber setup shared by both binaries

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `verbose`. Logs go to stderr unless `log_file` is
/// given. The returned guard must be held until exit so buffered file output
/// is flushed.
pub fn init(verbose: bool, log_file: Option<&Path>, json: bool) -> anyhow::Result<WorkerGuard> {
    let default_directive = if verbose {
        "go_provision=debug"
    } else {
        "go_provision=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(writer).with_target(true))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(false)
                    .with_ansi(log_file.is_none()),
            )
            .try_init()?;
    }

    Ok(guard)
}
