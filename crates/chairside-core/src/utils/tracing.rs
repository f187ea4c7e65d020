use std::io;
use std::path::PathBuf;

use chrono::Local;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Directory that holds `chairside` log files.
pub fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("chairside").join("logs"))
}

/// Initialize tracing with a timestamp-named log file, filtered by `RUST_LOG`.
/// Falls back to stderr when no data directory can be determined.
pub fn init_tracing() -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_dir) = log_dir() {
        std::fs::create_dir_all(&log_dir)?;

        let file_name = format!("{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let file_appender = rolling::never(&log_dir, &file_name);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "chairside::utils::tracing",
            path = %log_dir.join(&file_name).display(),
            "Tracing initialized with file output"
        );
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "chairside::utils::tracing",
            "Tracing initialized with stderr output"
        );
    }

    Ok(())
}
