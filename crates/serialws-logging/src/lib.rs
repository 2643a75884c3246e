//! # serialws-logging
//!
//! Installs the global `tracing` subscriber: an [`EnvFilter`] built from the
//! configured level (`RUST_LOG` wins when set) and a fmt layer in pretty or
//! JSON form.

#![deny(unsafe_code)]

use serialws_settings::{LogFormat, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Subscriber initialisation failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Build the filter: `RUST_LOG` if set and valid, otherwise `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(level)
}

fn parse_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        directive: level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = build_filter(&settings.level)?;

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
