// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Scheduling constants for the media stream graph.
//!
//! This module provides the canonical default values for all timing-related
//! configuration. [`GraphConfig`](crate::GraphConfig) and the runner's config
//! reference these constants so defaults stay consistent.
//!
//! # Latency Guidelines
//!
//! The scheduler wakes roughly every [`MEDIA_GRAPH_TARGET_PERIOD_MS`] and keeps
//! [`AUDIO_TARGET_MS`] of audio computed ahead of the current time:
//!
//! - **Shorter targets** = lower output latency, more underrun risk
//! - **Longer targets** = smoother playback under load, more latency

use mediagraph_core::TrackRate;

// === Iteration Timing ===

/// Duration of one scheduler iteration, in milliseconds.
///
/// Realtime graphs sleep until this much wall-clock time has passed since the
/// iteration started. Offline graphs advance graph time by exactly this amount
/// per iteration.
pub const MEDIA_GRAPH_TARGET_PERIOD_MS: i64 = 10;

/// Extra slack the scheduler allows for a late wake-up, in milliseconds.
pub const SCHEDULE_SAFETY_MARGIN_MS: i64 = 10;

/// How far ahead of the current time audio is computed, in milliseconds.
///
/// Two periods of lookahead plus the safety margin: one iteration can be
/// missed entirely without the device running dry.
pub const AUDIO_TARGET_MS: i64 = 2 * MEDIA_GRAPH_TARGET_PERIOD_MS + SCHEDULE_SAFETY_MARGIN_MS;

/// How far ahead of the current time video is computed, in milliseconds.
pub const VIDEO_TARGET_MS: i64 = 2 * MEDIA_GRAPH_TARGET_PERIOD_MS + SCHEDULE_SAFETY_MARGIN_MS;

/// Upper bound on a single timed wait, in milliseconds.
pub const MAX_WAIT_MS: u64 = 60_000;

// === Audio ===

/// Sample rate used when the configuration does not specify one.
pub const DEFAULT_SAMPLE_RATE: TrackRate = 48_000;

/// Channel count of every audio output the scheduler opens.
pub const AUDIO_OUTPUT_CHANNELS: u16 = 2;

// === Memory ===

/// Buffered data is only released once at least this much stream time can go,
/// in milliseconds.
pub const MINIMUM_FORGET_MS: i64 = 50;

/// How long a memory report request waits for the scheduler thread, in milliseconds.
pub const MEMORY_REPORT_TIMEOUT_MS: u64 = 1_000;

/// How long `shutdown` waits for the scheduler thread to stop, in milliseconds.
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

// === Underrun Prediction ===

/// Whether a stream that was blocked just before a decision point is kept
/// blocked when its buffered data ends inside the decision window.
///
/// Avoids toggling a starved stream on and off every few milliseconds.
pub const DEFAULT_SPECULATIVE_UNDERRUN: bool = true;

/// Extra window added to the decision horizon for the speculative underrun
/// rule, in milliseconds.
pub const DEFAULT_SPECULATIVE_UNDERRUN_MARGIN_MS: i64 = 0;

// === Subscribers ===

/// Capacity of each stream-state subscriber channel.
///
/// Updates to a full subscriber are dropped, not queued.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 128;

/// Name of the scheduler thread.
pub const GRAPH_THREAD_NAME: &str = "MediaStreamGrph";
