// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the media stream graph.
//!
//! Contract violations inside the scheduler (time moving backwards, asking for
//! stream time beyond the computed horizon) are programming errors and are
//! checked with `debug_assert!`. The variants here cover the failures a caller
//! can actually observe and react to.

use thiserror::Error;

use crate::types::{PortId, StreamId};

/// Main error type for media graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Zero or out-of-range sample rate
    /// - Target period of zero milliseconds
    /// - Unreadable runner configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The graph has been shut down or is in the middle of shutting down.
    ///
    /// Examples:
    /// - Requesting a memory report after forced shutdown
    /// - Starting non-realtime processing on a destroyed graph
    #[error("Graph shut down: {0}")]
    Shutdown(String),

    /// The referenced stream does not exist (or was already destroyed).
    #[error("Unknown stream: {0}")]
    UnknownStream(StreamId),

    /// The referenced input port does not exist (or was already destroyed).
    #[error("Unknown input port: {0}")]
    UnknownPort(PortId),

    /// The audio output backend could not open or drive a device.
    ///
    /// Examples:
    /// - No output device available
    /// - Device rejected the requested channel count
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// A cross-thread request did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O error (spawning the scheduler thread, reading configuration).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `GraphError`.
pub type Result<T> = std::result::Result<T, GraphError>;

impl From<GraphError> for String {
    fn from(err: GraphError) -> Self {
        err.to_string()
    }
}
