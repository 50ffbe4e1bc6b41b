// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use mediagraph_core::listener::QueuedTrackChange;
use mediagraph_core::segment::{AudioSegment, MediaSegment};
use mediagraph_core::{
    Blocking, GraphTime, NullAudioBackend, PortFlags, PortId, StreamEvent, StreamId, StreamListener, TrackId, TrackTicks,
};

use crate::config::GraphConfig;
use crate::driver::{IterationWaker, NoopWaker};
use crate::graph::GraphEngine;
use crate::messages::{ControlMessage, MessageBlock};
use crate::port::MediaInputPort;
use crate::processed::{ProcessedStream, ProcessorSpec};
use crate::source::{SourceInput, SourceStream};
use crate::stream::{MediaStream, StreamKind};

/// An offline engine plus id allocation.
pub(super) struct TestGraph {
    pub(super) engine: GraphEngine,
    next_stream: u64,
    next_port: u64,
    next_batch: u64,
}

impl TestGraph {
    pub(super) fn offline() -> Self {
        let waker: Weak<dyn IterationWaker> = Weak::<NoopWaker>::new();
        Self {
            engine: GraphEngine::new(GraphConfig::default(), false, Arc::new(NullAudioBackend), waker),
            next_stream: 1,
            next_port: 1,
            next_batch: 1,
        }
    }

    fn allocate_stream(&mut self) -> StreamId {
        let id = StreamId::new(self.next_stream);
        self.next_stream += 1;
        id
    }

    pub(super) fn add_source(&mut self) -> (StreamId, Arc<SourceInput>) {
        let id = self.allocate_stream();
        let input = Arc::new(SourceInput::new(id, self.engine.sample_rate, Weak::<NoopWaker>::new()));
        self.engine.add_stream(MediaStream::new(id, StreamKind::Source(SourceStream::new(Arc::clone(&input)))));
        (id, input)
    }

    /// A source with one mono track holding `frames` frames of `value`, and no
    /// further tracks to come.
    pub(super) fn add_tone_source(&mut self, track: TrackId, frames: usize, value: f32) -> (StreamId, Arc<SourceInput>) {
        let (id, input) = self.add_source();
        input.add_track(track, self.engine.sample_rate, 0, tone(frames, value));
        input.advance_known_tracks_time(mediagraph_core::time::STREAM_TIME_MAX);
        (id, input)
    }

    pub(super) fn add_processed(&mut self, spec: ProcessorSpec) -> StreamId {
        let id = self.allocate_stream();
        let rate = self.engine.sample_rate;
        self.engine.add_stream(MediaStream::new(id, StreamKind::Processed(ProcessedStream::new(spec, rate))));
        id
    }

    pub(super) fn connect(&mut self, source: StreamId, dest: StreamId, flags: PortFlags) -> PortId {
        let id = PortId::new(self.next_port);
        self.next_port += 1;
        self.engine.connect_port(MediaInputPort { id, source, dest, flags });
        id
    }

    pub(super) fn iterate(&mut self) {
        self.engine.iterate(Vec::new(), Instant::now());
    }

    /// Iterates with `messages` applied as one batch.
    pub(super) fn iterate_with(&mut self, messages: Vec<ControlMessage>) -> u64 {
        let graph_update_index = self.next_batch;
        self.next_batch += 1;
        self.engine.iterate(vec![MessageBlock { graph_update_index, messages }], Instant::now());
        graph_update_index
    }

    pub(super) fn stream(&self, id: StreamId) -> &MediaStream {
        let Some(stream) = self.engine.streams.get(&id) else {
            panic!("no stream {id}");
        };
        stream
    }

    pub(super) fn position(&self, id: StreamId) -> usize {
        let Some(index) = self.engine.stream_order.iter().position(|s| *s == id) else {
            panic!("{id} is not ordered");
        };
        index
    }

    /// The first `frames` frames of a mono audio track.
    pub(super) fn samples(&self, id: StreamId, track: TrackId, frames: TrackTicks) -> Vec<f32> {
        let Some(track) = self.stream(id).buffer.find_track(track) else {
            panic!("{id} has no track {track}");
        };
        let Some(audio) = track.segment().as_audio() else {
            panic!("track {} is not audio", track.id());
        };
        let mut out = Vec::new();
        audio.slice(0, frames).write_interleaved(1, &mut out);
        out
    }

    pub(super) fn listen(&mut self, id: StreamId) -> Arc<RecordingListener> {
        let listener = Arc::new(RecordingListener::default());
        if let Some(stream) = self.engine.streams.get_mut(&id) {
            stream.add_listener(listener.clone());
        }
        listener
    }
}

pub(super) fn tone(frames: usize, value: f32) -> MediaSegment {
    let mut segment = AudioSegment::new();
    segment.append_interleaved(vec![value; frames], 1);
    segment.into()
}

/// Mono audio whose frame `i` holds the value `i`.
#[allow(clippy::cast_precision_loss)]
pub(super) fn ramp(frames: usize) -> MediaSegment {
    let mut segment = AudioSegment::new();
    segment.append_interleaved((0..frames).map(|i| i as f32).collect(), 1);
    segment.into()
}

/// Records the scheduler-thread callbacks a stream receives.
#[derive(Default)]
pub(super) struct RecordingListener {
    pub(super) events: Mutex<Vec<StreamEvent>>,
    pub(super) blocking: Mutex<Vec<Blocking>>,
    pub(super) ended_tracks: Mutex<Vec<TrackId>>,
    pub(super) created_tracks: Mutex<Vec<TrackId>>,
    pub(super) outputs: Mutex<Vec<GraphTime>>,
}

impl RecordingListener {
    pub(super) fn count(&self, event: StreamEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }
}

impl StreamListener for RecordingListener {
    fn notify_blocking_changed(&self, blocking: Blocking) {
        self.blocking.lock().push(blocking);
    }

    fn notify_output(&self, current_time: GraphTime) {
        self.outputs.lock().push(current_time);
    }

    fn notify_event(&self, event: StreamEvent) {
        self.events.lock().push(event);
    }

    fn notify_queued_track_changes(&self, change: &QueuedTrackChange<'_>) {
        if change.changes.created {
            self.created_tracks.lock().push(change.track);
        }
        if change.changes.ended {
            self.ended_tracks.lock().push(change.track);
        }
    }
}
