// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::Level;

use mediagraph_engine::GraphConfig;

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Console log format.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// How the demo graph is driven.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// As fast as possible, no audio device.
    #[default]
    Offline,
    /// Paced by the wall clock, played through the null audio backend.
    Realtime,
}

/// One sine source feeding the demo mixer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ToneConfig {
    pub frequency_hz: f32,
    pub amplitude: f32,
}

/// The demo graph: tone sources summed by a mixer, optionally fed back
/// through a delay.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    pub mode: RunMode,
    /// Graph time to run for.
    pub duration_ms: u64,
    /// Audio each source holds before it finishes.
    pub tone_length_ms: u64,
    pub tones: Vec<ToneConfig>,
    /// Adds a delay stream from the mixer's output back into its input.
    pub feedback_delay_ms: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            duration_ms: 1_000,
            tone_length_ms: 500,
            tones: vec![
                ToneConfig { frequency_hz: 440.0, amplitude: 0.25 },
                ToneConfig { frequency_hz: 660.0, amplitude: 0.125 },
            ],
            feedback_delay_ms: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub log: LogConfig,
    pub graph: GraphConfig,
    pub demo: DemoConfig,
}

pub struct ConfigLoadResult {
    pub config: RunnerConfig,
    pub file_missing: Option<String>,
}

/// Loads the runner configuration from defaults, a TOML file, and `MG_`
/// environment variables (`MG_GRAPH__SAMPLE_RATE=44100`).
///
/// # Errors
///
/// Returns an error if the file or an environment variable does not parse.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(RunnerConfig::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: RunnerConfig = figment.merge(Env::prefixed("MG_").split("__")).extract().map_err(Box::new)?;
    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration as a TOML string.
///
/// # Errors
///
/// Returns an error if TOML serialization fails.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&RunnerConfig::default())
}
