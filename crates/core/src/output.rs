// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Output device contracts.
//!
//! The scheduler never talks to hardware directly. Audio goes through an
//! [`AudioOutputBackend`] that opens one [`AudioOutputSink`] per played track,
//! video frames go to [`VideoSink`]s, and the mixed output of every played
//! stream can be observed through a [`MixerCallback`].

use std::time::Instant;

use crate::error::Result;
use crate::segment::VideoFrame;
use crate::time::TrackRate;
use crate::types::{StreamId, TrackId};

/// Parameters for opening an audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOutputRequest {
    pub stream: StreamId,
    pub track: TrackId,
    pub channels: u16,
    pub rate: TrackRate,
}

pub trait AudioOutputBackend: Send + Sync {
    /// Opens a sink for one audio track.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened. The scheduler logs it
    /// and keeps running without that output.
    fn open(&self, request: &AudioOutputRequest) -> Result<Box<dyn AudioOutputSink>>;
}

pub trait AudioOutputSink: Send {
    /// Queues `frames` interleaved frames for playback.
    fn write(&mut self, interleaved: &[f32], frames: usize);

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn shutdown(&mut self) {}
}

/// Backend whose sinks discard everything. Used for offline graphs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioBackend;

struct NullSink;

impl AudioOutputSink for NullSink {
    fn write(&mut self, _interleaved: &[f32], _frames: usize) {}
}

impl AudioOutputBackend for NullAudioBackend {
    fn open(&self, _request: &AudioOutputRequest) -> Result<Box<dyn AudioOutputSink>> {
        Ok(Box::new(NullSink))
    }
}

/// Receives the frame that should be on screen at `target`.
pub trait VideoSink: Send + Sync {
    fn set_current_frame(&self, frame: &VideoFrame, target: Instant);
}

/// Observes the sum of all audio played during one iteration.
pub trait MixerCallback: Send + Sync {
    fn mixer_callback(&self, mixed: &[f32], channels: u16, frames: usize, rate: TrackRate);
}
