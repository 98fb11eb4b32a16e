//! Tracing setup.
//!
//! The library only emits `tracing` events; embedding applications call
//! [`init`] once to install a global subscriber built from
//! [`LoggingConfig`]. Events are written through a non-blocking appender to
//! stderr or to the configured file.

use std::fs::OpenOptions;
use std::io;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

static TRACE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, by an
/// earlier call or by the application. An unparsable level falls back to
/// `info`.
pub fn init(config: &LoggingConfig) -> io::Result<bool> {
    if TRACE_GUARD.get().is_some() {
        return Ok(false);
    }

    let (non_blocking, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(io::stderr()),
    };

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let base = move || {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_thread_names(true)
            .with_thread_ids(true)
            .with_writer(non_blocking)
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match config.format {
        LogFormat::Json => Box::new(base().json().finish()),
        LogFormat::Text => Box::new(base().compact().finish()),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return Ok(false);
    }
    let _ = TRACE_GUARD.set(guard);
    tracing::debug!(level = %config.level, format = ?config.format, "logging initialised");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "not a level [".to_string(),
            format: LogFormat::Json,
            file: Some(dir.path().join("spindle.log")),
        };
        let first = init(&config).unwrap();
        assert!(!init(&config).unwrap());
        if first {
            assert!(dir.path().join("spindle.log").exists());
        }
    }
}
