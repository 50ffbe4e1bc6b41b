// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Scheduler-side state of a stream.
//!
//! A [`MediaStream`] is owned by the [`GraphEngine`](crate::graph::GraphEngine)
//! and only touched on the scheduler thread. Control-thread handles refer to it
//! by [`StreamId`] and reach it through control messages.

use std::sync::Arc;

use smallvec::SmallVec;

use mediagraph_core::listener::same_listener;
use mediagraph_core::output::AudioOutputSink;
use mediagraph_core::segment::MediaSegment;
use mediagraph_core::time::StreamTimeline;
use mediagraph_core::{
    Blocking, GraphTime, PortId, StreamBuffer, StreamId, StreamListener, TimeVarying, TrackId,
    TrackTicks, VideoFrame, VideoSink,
};

use crate::processed::ProcessedStream;
use crate::source::SourceStream;

/// Caller-chosen key identifying one audio output request on a stream.
pub type AudioOutputKey = u64;

/// An audio output request: play this stream's audio at `volume`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AudioOutput {
    pub(crate) key: AudioOutputKey,
    pub(crate) volume: f32,
}

/// An opened output device for one audio track of a stream.
pub(crate) struct AudioOutputStream {
    pub(crate) track: TrackId,
    pub(crate) playback_start_time: GraphTime,
    pub(crate) last_tick_written: TrackTicks,
    /// `None` when the backend failed to open; the stream plays on without it.
    pub(crate) sink: Option<Box<dyn AudioOutputSink>>,
}

pub(crate) enum StreamKind {
    Source(SourceStream),
    Processed(ProcessedStream),
}

pub(crate) struct MediaStream {
    pub(crate) id: StreamId,
    pub(crate) buffer: StreamBuffer,
    /// Graph time corresponding to stream time zero, after all blocking
    /// before the current time.
    pub(crate) buffer_start_time: GraphTime,
    pub(crate) blocked: TimeVarying<bool>,
    pub(crate) explicit_blocker_count: TimeVarying<u32>,
    pub(crate) graph_update_indices: TimeVarying<u64>,
    pub(crate) listeners: Vec<Arc<dyn StreamListener>>,
    /// Ports for which this stream is the source.
    pub(crate) consumers: SmallVec<[PortId; 4]>,
    pub(crate) audio_outputs: Vec<AudioOutput>,
    pub(crate) audio_output_streams: Vec<AudioOutputStream>,
    pub(crate) video_outputs: Vec<Arc<dyn VideoSink>>,
    pub(crate) last_played_video_frame: Option<VideoFrame>,
    pub(crate) disabled_tracks: Vec<TrackId>,
    pub(crate) finished: bool,
    pub(crate) notified_finished: bool,
    pub(crate) notified_blocked: bool,
    pub(crate) has_current_data: bool,
    pub(crate) notified_has_current_data: bool,
    pub(crate) is_consumed: bool,
    pub(crate) in_blocking_set: bool,
    pub(crate) block_in_this_phase: bool,
    pub(crate) kind: StreamKind,
}

impl MediaStream {
    pub(crate) fn new(id: StreamId, kind: StreamKind) -> Self {
        Self {
            id,
            buffer: StreamBuffer::new(),
            buffer_start_time: 0,
            blocked: TimeVarying::new(false),
            explicit_blocker_count: TimeVarying::new(0),
            graph_update_indices: TimeVarying::new(0),
            listeners: Vec::new(),
            consumers: SmallVec::new(),
            audio_outputs: Vec::new(),
            audio_output_streams: Vec::new(),
            video_outputs: Vec::new(),
            last_played_video_frame: None,
            disabled_tracks: Vec::new(),
            finished: false,
            notified_finished: false,
            notified_blocked: false,
            has_current_data: false,
            notified_has_current_data: false,
            is_consumed: false,
            in_blocking_set: false,
            block_in_this_phase: false,
            kind,
        }
    }

    pub(crate) fn timeline(&self) -> StreamTimeline<'_> {
        StreamTimeline { buffer_start_time: self.buffer_start_time, blocked: &self.blocked }
    }

    pub(crate) const fn as_source(&self) -> Option<&SourceStream> {
        match &self.kind {
            StreamKind::Source(s) => Some(s),
            StreamKind::Processed(_) => None,
        }
    }

    pub(crate) const fn as_processed(&self) -> Option<&ProcessedStream> {
        match &self.kind {
            StreamKind::Processed(p) => Some(p),
            StreamKind::Source(_) => None,
        }
    }

    pub(crate) fn as_processed_mut(&mut self) -> Option<&mut ProcessedStream> {
        match &mut self.kind {
            StreamKind::Processed(p) => Some(p),
            StreamKind::Source(_) => None,
        }
    }

    pub(crate) const fn is_source(&self) -> bool {
        matches!(self.kind, StreamKind::Source(_))
    }

    /// Streams that are played somewhere are consumed regardless of downstream ports.
    pub(crate) fn is_intrinsically_consumed(&self) -> bool {
        !self.audio_outputs.is_empty() || !self.video_outputs.is_empty()
    }

    pub(crate) fn add_listener(&mut self, listener: Arc<dyn StreamListener>) {
        // Late listeners still learn about a blocked stream and current data.
        if self.notified_blocked {
            listener.notify_blocking_changed(Blocking::Blocked);
        }
        if self.notified_has_current_data {
            listener.notify_has_current_data();
        }
        self.listeners.push(listener);
    }

    pub(crate) fn remove_listener(&mut self, listener: &Arc<dyn StreamListener>) {
        self.listeners.retain(|l| !same_listener(l, listener));
    }

    pub(crate) fn change_explicit_blocker_count(&mut self, time: GraphTime, delta: i32) {
        let count = *self.explicit_blocker_count.get_at(time);
        let next = count.saturating_add_signed(delta);
        self.explicit_blocker_count.set_at_and_after(time, next);
    }

    /// Folds the blocking between the previous and the new current time into
    /// `buffer_start_time` and releases data that can no longer be played.
    pub(crate) fn advance_time_varying_values_to_current_time(
        &mut self,
        current_time: GraphTime,
        blocked_time: GraphTime,
        min_forget: GraphTime,
    ) {
        self.buffer_start_time += blocked_time;
        self.graph_update_indices.advance_current_time(current_time);
        self.explicit_blocker_count.advance_current_time(current_time);
        self.buffer.forget_up_to(current_time - self.buffer_start_time, min_forget);
    }

    pub(crate) fn apply_track_disabling(&self, track: TrackId, segment: &mut MediaSegment) {
        if self.disabled_tracks.contains(&track) {
            segment.replace_with_disabled();
        }
    }

    pub(crate) fn set_track_enabled(&mut self, track: TrackId, enabled: bool) {
        if enabled {
            self.disabled_tracks.retain(|t| *t != track);
        } else if !self.disabled_tracks.contains(&track) {
            self.disabled_tracks.push(track);
        }
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.buffer.byte_size()
            + self.listeners.capacity() * std::mem::size_of::<Arc<dyn StreamListener>>()
            + self.audio_output_streams.capacity() * std::mem::size_of::<AudioOutputStream>()
    }
}
