use std::{fs, path::Path};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, fmt::writer::MakeWriterExt, EnvFilter};

use crate::{errors::Error, Result};

const LOG_FILE_PREFIX: &str = "bot";
const LOG_FILES_KEPT: usize = 7;

/// Initialize logging/tracing for the bot.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to our crates and
/// everything else stays at `warn`. With a `log_dir`, output is also written to
/// `bot.<date>.log` there, rotated daily with a week of history. Keep the
/// returned guard alive for as long as file output should be flushed.
pub fn init(
    service_name: &str,
    default_level: &str,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let level = default_level.trim().to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,dorm={level},dorm_core={level},dorm_telegram={level},{service_name}={level}"
        ))
    });

    let Some(dir) = log_dir else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(true)
            .try_init()
            .map_err(|e| Error::Config(format!("logging init failed: {e}")))?;
        return Ok(None);
    };

    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(LOG_FILES_KEPT)
        .build(dir)
        .map_err(|e| Error::Config(format!("log directory {}: {e}", dir.display())))?;
    let (file, guard) = tracing_appender::non_blocking(appender);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(MakeWriterExt::and(file, std::io::stdout))
        .try_init()
        .map_err(|e| Error::Config(format!("logging init failed: {e}")))?;

    Ok(Some(guard))
}
