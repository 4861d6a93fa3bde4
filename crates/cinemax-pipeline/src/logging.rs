//! Tracing setup for the `cinemax-transform` binary.
//!
//! Variables:
//!   LOG_FORMAT  - "json" or "text" (default: "text")
//!   LOG_FILE    - log to this file, rotated daily, instead of stderr
//!   LOG_ANSI    - "true"/"1" or anything else to force ANSI colors on or off
//!   RUST_LOG    - env filter (default: [`DEFAULT_FILTER`])

use std::path::PathBuf;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinemax_core::config::{optional_var, string_var};
use cinemax_core::EnvSource;

pub const DEFAULT_FILTER: &str = "cinemax_transform=info,cinemax_pipeline=info,cinemax_db=info,\
     cinemax_inference=info,cinemax_core=info";

const DEFAULT_LOG_FILE: &str = "cinemax-transform.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging options read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// `None` leaves color detection to the formatter.
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let format = match string_var(env, "LOG_FORMAT", "text").as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            format,
            file: optional_var(env, "LOG_FILE").map(PathBuf::from),
            ansi: optional_var(env, "LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }

    /// Directory and file name for the rolling appender.
    ///
    /// A bare file name lands in the working directory.
    pub fn file_target(&self) -> Option<(PathBuf, String)> {
        let path = self.file.as_ref()?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(DEFAULT_LOG_FILE)
            .to_string();
        Some((dir, name))
    }

    /// Install the global subscriber.
    ///
    /// Console output goes to stderr so stdout carries only the run summary.
    /// Keep the returned guard alive for the life of the process; dropping it
    /// flushes the file writer.
    pub fn init(&self) -> Option<WorkerGuard> {
        let guard = match self.file_target() {
            Some((dir, name)) => {
                let appender = tracing_appender::rolling::daily(dir, name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // Files get no ANSI codes unless asked for.
                self.install(writer, Some(self.ansi.unwrap_or(false)));
                Some(guard)
            }
            None => {
                self.install(std::io::stderr, self.ansi);
                None
            }
        };

        info!(
            log_format = ?self.format,
            log_file = self
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(stderr)".to_string()),
            "Logging initialized"
        );
        guard
    }

    fn install<W>(&self, writer: W, ansi: Option<bool>)
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer().with_writer(writer);
                if let Some(ansi) = ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_to_text_on_stderr() {
        let env: HashMap<&str, &str> = HashMap::new();
        let settings = LogSettings::from_env(&env);
        assert_eq!(settings.format, LogFormat::Text);
        assert_eq!(settings.file, None);
        assert_eq!(settings.ansi, None);
        assert_eq!(settings.file_target(), None);
    }

    #[test]
    fn test_reads_format_and_ansi() {
        let env = HashMap::from([("LOG_FORMAT", "json"), ("LOG_ANSI", "1")]);
        let settings = LogSettings::from_env(&env);
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.ansi, Some(true));

        let env = HashMap::from([("LOG_FORMAT", "yaml"), ("LOG_ANSI", "no")]);
        let settings = LogSettings::from_env(&env);
        assert_eq!(settings.format, LogFormat::Text);
        assert_eq!(settings.ansi, Some(false));
    }

    #[test]
    fn test_file_target_splits_directory() {
        let env = HashMap::from([("LOG_FILE", "/var/log/cinemax/run.log")]);
        let (dir, name) = LogSettings::from_env(&env).file_target().unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/cinemax"));
        assert_eq!(name, "run.log");
    }

    #[test]
    fn test_bare_file_name_uses_working_directory() {
        let env = HashMap::from([("LOG_FILE", "run.log")]);
        let (dir, name) = LogSettings::from_env(&env).file_target().unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "run.log");
    }
}
