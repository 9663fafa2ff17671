//! Usage: Process-wide tracing setup (stderr, optional daily-rolling file, `log` bridge).

use crate::infra::settings::LoggingSettings;
use crate::shared::error::{WalletError, WalletResult};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` wins over `settings.filter`.
///
/// Returns the file writer guard when a log directory is configured; keep it alive for the
/// lifetime of the process or buffered lines are lost. A second call does nothing.
pub fn init(settings: &LoggingSettings) -> WalletResult<Option<WorkerGuard>> {
    if INITIALIZED.set(()).is_err() {
        return Ok(None);
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|e| WalletError::Config(format!("invalid log filter {:?}: {e}", settings.filter)))?;

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match settings.directory.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                WalletError::Config(format!("failed to create log dir {}: {e}", dir.display()))
            })?;
            let appender = tracing_appender::rolling::daily(dir, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| WalletError::Config(format!("tracing subscriber already set: {e}")))?;

    if let Err(err) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", err);
    }

    tracing::info!(
        filter = %settings.filter,
        file_logging = settings.directory.is_some(),
        "logging initialized"
    );
    Ok(guard)
}
