// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogFormat};

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn env_filter_or_level(default_level: tracing::Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}

fn make_console_layer(level: tracing::Level, format: LogFormat) -> DynLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_filter(env_filter_or_level(level))
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_filter(env_filter_or_level(level))
            .boxed(),
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init_logging(log_config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let layers: Vec<DynLayer> = vec![make_console_layer(log_config.level.into(), log_config.format)];
    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}
