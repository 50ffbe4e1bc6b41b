// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Control messages: graph mutations queued by the owning thread.
//!
//! Each message either runs on the scheduler thread as part of an iteration
//! ([`ControlMessage::run`]) or, once the scheduler has stopped, runs on the
//! owning thread ([`ControlMessage::run_during_shutdown`]) against the parked
//! engine, if there still is one.

use std::sync::Arc;

use mediagraph_core::{
    MixerCallback, PortId, StreamEvent, StreamId, StreamListener, TrackId, VideoSink,
};
use mediagraph_core::listener::same_listener;

use crate::graph::GraphEngine;
use crate::port::MediaInputPort;
use crate::source::SourceInput;
use crate::stream::{AudioOutput, AudioOutputKey, MediaStream, StreamKind};

/// Messages queued during one control-thread task, applied together.
pub(crate) struct MessageBlock {
    pub(crate) graph_update_index: u64,
    pub(crate) messages: Vec<ControlMessage>,
}

pub(crate) enum ControlMessage {
    CreateStream(Box<MediaStream>),
    DestroyStream {
        stream: StreamId,
        source: Option<Arc<SourceInput>>,
    },
    CreateInputPort(MediaInputPort),
    DestroyInputPort(PortId),
    AddListener {
        stream: StreamId,
        listener: Arc<dyn StreamListener>,
    },
    RemoveListener {
        stream: StreamId,
        listener: Arc<dyn StreamListener>,
    },
    ChangeExplicitBlockerCount {
        stream: StreamId,
        delta: i32,
    },
    AddAudioOutput {
        stream: StreamId,
        key: AudioOutputKey,
    },
    SetAudioOutputVolume {
        stream: StreamId,
        key: AudioOutputKey,
        volume: f32,
    },
    RemoveAudioOutput {
        stream: StreamId,
        key: AudioOutputKey,
    },
    AddVideoOutput {
        stream: StreamId,
        sink: Arc<dyn VideoSink>,
    },
    RemoveVideoOutput {
        stream: StreamId,
        sink: Arc<dyn VideoSink>,
    },
    SetTrackEnabled {
        stream: StreamId,
        track: TrackId,
        enabled: bool,
    },
    SetAutofinish {
        stream: StreamId,
        autofinish: bool,
    },
    SetNeedsMixing {
        source: Arc<SourceInput>,
        needs_mixing: bool,
    },
    Finish(StreamId),
    AddMixerCallback(Arc<dyn MixerCallback>),
    RemoveMixerCallback(Arc<dyn MixerCallback>),
}

impl ControlMessage {
    /// The stream this message targets, if any.
    pub(crate) fn stream(&self) -> Option<StreamId> {
        match self {
            Self::CreateStream(stream) => Some(stream.id),
            Self::DestroyStream { stream, .. }
            | Self::AddListener { stream, .. }
            | Self::RemoveListener { stream, .. }
            | Self::ChangeExplicitBlockerCount { stream, .. }
            | Self::AddAudioOutput { stream, .. }
            | Self::SetAudioOutputVolume { stream, .. }
            | Self::RemoveAudioOutput { stream, .. }
            | Self::AddVideoOutput { stream, .. }
            | Self::RemoveVideoOutput { stream, .. }
            | Self::SetTrackEnabled { stream, .. }
            | Self::SetAutofinish { stream, .. }
            | Self::Finish(stream) => Some(*stream),
            Self::CreateInputPort(port) => Some(port.dest),
            Self::SetNeedsMixing { source, .. } => Some(source.id),
            Self::DestroyInputPort(_) | Self::AddMixerCallback(_) | Self::RemoveMixerCallback(_) => None,
        }
    }

    /// Applies the message on the scheduler thread.
    #[allow(clippy::cognitive_complexity)]
    pub(crate) fn run(self, engine: &mut GraphEngine) {
        match self {
            Self::CreateStream(stream) => engine.add_stream(*stream),
            Self::DestroyStream { stream, .. } => engine.remove_stream(stream),
            Self::CreateInputPort(port) => engine.connect_port(port),
            Self::DestroyInputPort(port) => engine.disconnect_port(port),
            Self::AddListener { stream, listener } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.add_listener(listener);
                } else {
                    listener.notify_event(StreamEvent::Removed);
                }
            },
            Self::RemoveListener { stream, listener } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.remove_listener(&listener);
                    listener.notify_event(StreamEvent::Removed);
                }
            },
            Self::ChangeExplicitBlockerCount { stream, delta } => {
                let at = engine.state_computed_time;
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.change_explicit_blocker_count(at, delta);
                }
            },
            Self::AddAudioOutput { stream, key } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.audio_outputs.push(AudioOutput { key, volume: 1.0 });
                    // Playing a stream makes it consumed.
                    engine.stream_order_dirty = true;
                }
            },
            Self::SetAudioOutputVolume { stream, key, volume } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    for output in s.audio_outputs.iter_mut().filter(|o| o.key == key) {
                        output.volume = volume;
                    }
                }
            },
            Self::RemoveAudioOutput { stream, key } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    if let Some(index) = s.audio_outputs.iter().position(|o| o.key == key) {
                        s.audio_outputs.remove(index);
                    }
                    engine.stream_order_dirty = true;
                }
            },
            Self::AddVideoOutput { stream, sink } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.video_outputs.push(sink);
                    engine.stream_order_dirty = true;
                }
            },
            Self::RemoveVideoOutput { stream, sink } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.video_outputs.retain(|v| !same_listener(v, &sink));
                    engine.stream_order_dirty = true;
                }
            },
            Self::SetTrackEnabled { stream, track, enabled } => {
                if let Some(s) = engine.streams.get_mut(&stream) {
                    s.set_track_enabled(track, enabled);
                }
            },
            Self::SetAutofinish { stream, autofinish } => {
                if let Some(p) = engine.streams.get_mut(&stream).and_then(MediaStream::as_processed_mut) {
                    p.autofinish = autofinish;
                }
            },
            Self::SetNeedsMixing { source, needs_mixing } => {
                source.set_needs_mixing(needs_mixing);
                engine.stream_order_dirty = true;
            },
            Self::Finish(stream) => engine.finish_stream(stream),
            Self::AddMixerCallback(callback) => engine.mixer_callbacks.push(callback),
            Self::RemoveMixerCallback(callback) => {
                engine.mixer_callbacks.retain(|c| !same_listener(c, &callback));
            },
        }
    }

    /// Fallback once the scheduler has stopped. Teardown still happens against
    /// the parked engine; everything else only releases what it holds.
    pub(crate) fn run_during_shutdown(self, engine: Option<&mut GraphEngine>) {
        match self {
            Self::DestroyStream { stream, source } => match engine {
                Some(engine) => engine.remove_stream(stream),
                None => {
                    if let Some(source) = source {
                        source.mark_destroyed();
                    }
                },
            },
            Self::DestroyInputPort(port) => {
                if let Some(engine) = engine {
                    engine.disconnect_port(port);
                }
            },
            Self::CreateStream(stream) => {
                if let StreamKind::Source(source) = &stream.kind {
                    source.input.mark_destroyed();
                }
            },
            Self::AddListener { listener, .. } | Self::RemoveListener { listener, .. } => {
                listener.notify_event(StreamEvent::Removed);
            },
            _ => {},
        }
    }
}
