// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! MediaGraph Core - time algebra, stream buffers and contracts for the media stream graph.
//!
//! ## Core Modules
//!
//! - [`time`]: Graph time, stream time and track ticks, and conversions between them
//! - [`time_varying`]: Values scheduled to change at future times
//! - [`segment`]: Audio and video segments (chunks of samples or frames)
//! - [`buffer`]: Tracks and the per-stream buffer
//! - [`types`]: Stream, port and track identifiers, port flags
//! - [`listener`]: Scheduler-thread and control-thread listener contracts
//! - [`output`]: Audio/video output and mixer callback contracts
//! - [`state`]: Lifecycle states and stream state updates
//! - [`error`]: Error types and handling

pub mod buffer;
pub mod error;
pub mod listener;
pub mod output;
pub mod segment;
pub mod state;
pub mod time;
pub mod time_varying;
pub mod types;

// Convenience re-exports for commonly used types

pub use error::{GraphError, Result};

pub use buffer::{StreamBuffer, Track};
pub use segment::{AudioSegment, MediaSegment, ResampleCursor, VideoFrame, VideoImage, VideoSegment};
pub use time::{GraphClock, GraphTime, StreamTime, TrackRate, TrackTicks, TrailingBlocked};
pub use time_varying::TimeVarying;
pub use types::{MediaType, PortFlags, PortId, StreamId, TrackChanges, TrackId};

pub use listener::{Blocking, Consumption, MainThreadListener, StreamEvent, StreamListener};
pub use output::{AudioOutputBackend, AudioOutputSink, MixerCallback, NullAudioBackend, VideoSink};
pub use state::{LifecycleState, StreamStateUpdate};
