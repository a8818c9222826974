//! Structured logging initialisation.
//!
//! [`LogFormat::Human`] writes readable lines for development and
//! [`LogFormat::Json`] writes newline-delimited JSON for log pipelines.
//! `RUST_LOG` overrides the caller-supplied level when set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "human",
            Self::Json => "json",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("unknown log format: {0} (expected human or json)")]
    UnknownFormat(String),

    #[error("global subscriber already installed")]
    AlreadyInstalled,
}

/// Install the global tracing subscriber.
///
/// Fails if a subscriber has already been installed in this process.
pub fn init_logging(format: LogFormat, level: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Human => registry
            .with(tfmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tfmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
    };
    installed.map_err(|_| LoggingError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn deserializes_from_config() {
        #[derive(Deserialize)]
        struct Section {
            log_format: LogFormat,
        }
        let s: Section = toml::from_str(r#"log_format = "json""#).unwrap();
        assert_eq!(s.log_format, LogFormat::Json);
    }

    #[test]
    fn second_install_is_an_error() {
        let _ = init_logging(LogFormat::Human, "warn");
        assert!(matches!(
            init_logging(LogFormat::Json, "warn"),
            Err(LoggingError::AlreadyInstalled)
        ));
    }
}
