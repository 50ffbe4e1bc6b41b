// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Configuration for the media stream graph.

use serde::{Deserialize, Serialize};

use mediagraph_core::time::{milliseconds_to_media_time, TRACK_RATE_MAX};
use mediagraph_core::{GraphError, GraphTime, Result, TrackRate};

use crate::constants::{
    AUDIO_TARGET_MS, DEFAULT_SAMPLE_RATE, DEFAULT_SPECULATIVE_UNDERRUN,
    DEFAULT_SPECULATIVE_UNDERRUN_MARGIN_MS, DEFAULT_SUBSCRIBER_CAPACITY, MAX_WAIT_MS,
    MEDIA_GRAPH_TARGET_PERIOD_MS, MEMORY_REPORT_TIMEOUT_MS, MINIMUM_FORGET_MS, VIDEO_TARGET_MS,
};

/// Configuration for one graph instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Sample rate of the graph's audio output (default: 48000)
    pub sample_rate: TrackRate,
    /// Length of one scheduler iteration in ms (default: 10)
    pub target_period_ms: i64,
    /// Audio computed ahead of the current time in ms (default: 30)
    pub audio_target_ms: i64,
    /// Video computed ahead of the current time in ms (default: 30)
    pub video_target_ms: i64,
    /// Longest single timed wait in ms (default: 60000)
    pub max_wait_ms: u64,
    /// How long memory reports wait for the scheduler in ms (default: 1000)
    pub memory_report_timeout_ms: u64,
    /// Minimum stream time released per forget pass in ms (default: 50)
    pub min_forget_ms: i64,
    /// Keep streams blocked that were blocked just before a decision point
    /// and would run out of data inside the window (default: true)
    pub speculative_underrun: bool,
    /// Extra window for the speculative underrun rule in ms (default: 0)
    pub speculative_underrun_margin_ms: i64,
    /// Capacity of each state subscriber channel (default: 128)
    pub subscriber_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            target_period_ms: MEDIA_GRAPH_TARGET_PERIOD_MS,
            audio_target_ms: AUDIO_TARGET_MS,
            video_target_ms: VIDEO_TARGET_MS,
            max_wait_ms: MAX_WAIT_MS,
            memory_report_timeout_ms: MEMORY_REPORT_TIMEOUT_MS,
            min_forget_ms: MINIMUM_FORGET_MS,
            speculative_underrun: DEFAULT_SPECULATIVE_UNDERRUN,
            speculative_underrun_margin_ms: DEFAULT_SPECULATIVE_UNDERRUN_MARGIN_MS,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl GraphConfig {
    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Configuration` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate <= 0 || self.sample_rate > TRACK_RATE_MAX {
            return Err(GraphError::Configuration(format!(
                "sample_rate must be in (0, {TRACK_RATE_MAX}], got {}",
                self.sample_rate
            )));
        }
        if self.target_period_ms <= 0 {
            return Err(GraphError::Configuration(format!(
                "target_period_ms must be positive, got {}",
                self.target_period_ms
            )));
        }
        if self.audio_target_ms < 0 || self.video_target_ms < 0 {
            return Err(GraphError::Configuration(
                "audio_target_ms and video_target_ms must not be negative".to_string(),
            ));
        }
        if self.min_forget_ms < 0 || self.speculative_underrun_margin_ms < 0 {
            return Err(GraphError::Configuration(
                "min_forget_ms and speculative_underrun_margin_ms must not be negative".to_string(),
            ));
        }
        if self.subscriber_capacity == 0 {
            return Err(GraphError::Configuration(
                "subscriber_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) const fn target_period(&self) -> GraphTime {
        milliseconds_to_media_time(self.target_period_ms)
    }

    pub(crate) const fn audio_target(&self) -> GraphTime {
        milliseconds_to_media_time(self.audio_target_ms)
    }

    pub(crate) const fn video_target(&self) -> GraphTime {
        milliseconds_to_media_time(self.video_target_ms)
    }

    pub(crate) const fn min_forget(&self) -> GraphTime {
        milliseconds_to_media_time(self.min_forget_ms)
    }

    pub(crate) const fn speculative_underrun_margin(&self) -> GraphTime {
        milliseconds_to_media_time(self.speculative_underrun_margin_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GraphConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.audio_target_ms, 30);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = GraphConfig { sample_rate: 0, ..GraphConfig::default() };
        assert!(matches!(config.validate(), Err(GraphError::Configuration(_))));

        let config = GraphConfig { target_period_ms: 0, ..GraphConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: GraphConfig = serde_json::from_str(r#"{"sample_rate": 44100}"#).unwrap();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.target_period_ms, MEDIA_GRAPH_TARGET_PERIOD_MS);
    }
}
