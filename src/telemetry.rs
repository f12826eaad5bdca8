//! Process-wide tracing setup. Call [`init`] once from the binary.

use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// `RUST_LOG` when set, otherwise the configured directive.
pub fn filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Installs the global `tracing` subscriber described by `config`.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter(config));

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| TelemetryError::Install(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_to_log_file() {
        let path = std::env::temp_dir().join(format!(
            "tops_harvester_telemetry_{}.log",
            std::process::id()
        ));
        let config = TelemetryConfig {
            filter: "info".to_string(),
            log_file: Some(path.clone()),
        };

        init(&config).unwrap();
        tracing::warn!("telemetry smoke test");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("telemetry smoke test"));

        std::fs::remove_file(path).ok();
    }
}
