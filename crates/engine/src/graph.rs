// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The scheduler-thread half of the graph.
//!
//! [`GraphEngine`] owns every stream and port and runs one iteration of the
//! scheduling loop at a time: advance the clock, apply control messages,
//! reorder, pull source input, decide blocking, produce data and play it.
//! It knows nothing about threads; [`crate::driver`] drives it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime};

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge};
use serde::Serialize;

use mediagraph_core::listener::QueuedTrackChange;
use mediagraph_core::segment::{AudioSegment, MediaSegment};
use mediagraph_core::time::{
    round_up_to_next_audio_block, seconds_to_media_time, GRAPH_TIME_MAX, STREAM_TIME_MAX,
};
use mediagraph_core::{
    AudioOutputBackend, Consumption, GraphClock, GraphTime, MixerCallback, PortId, StreamEvent,
    StreamId, StreamListener, StreamStateUpdate, StreamTime, TrackRate,
    TrailingBlocked,
};

use crate::config::GraphConfig;
use crate::driver::IterationWaker;
use crate::messages::MessageBlock;
use crate::mixer::AudioMixer;
use crate::port::MediaInputPort;
use crate::processed::AUDIO_NODE_TRACK;
use crate::stream::{MediaStream, StreamKind};

/// Memory held by one stream, as reported by
/// [`MediaStreamGraph::collect_memory_report`](crate::MediaStreamGraph::collect_memory_report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamMemoryUsage {
    pub stream: StreamId,
    pub kind: &'static str,
    pub bytes: usize,
}

struct GraphMetrics {
    iterations: Counter<u64>,
    streams_active: Gauge<u64>,
    underruns: Counter<u64>,
    control_messages: Counter<u64>,
}

impl GraphMetrics {
    fn new() -> Self {
        let meter = global::meter("mediagraph_engine");
        Self {
            iterations: meter
                .u64_counter("graph.iterations")
                .with_description("Scheduler iterations run")
                .build(),
            streams_active: meter
                .u64_gauge("graph.streams.active")
                .with_description("Number of streams in the graph")
                .build(),
            underruns: meter
                .u64_counter("graph.underruns")
                .with_description("Global and per-stream underruns")
                .build(),
            control_messages: meter
                .u64_counter("graph.control_messages")
                .with_description("Control messages applied on the scheduler thread")
                .build(),
        }
    }
}

pub struct GraphEngine {
    pub(crate) config: GraphConfig,
    pub(crate) realtime: bool,
    pub(crate) sample_rate: TrackRate,
    pub(crate) streams: HashMap<StreamId, MediaStream>,
    pub(crate) ports: HashMap<PortId, MediaInputPort>,
    /// Processing order. Sources first, cycle-breaking delay nodes last.
    pub(crate) stream_order: Vec<StreamId>,
    pub(crate) first_cycle_breaker: usize,
    pub(crate) stream_order_dirty: bool,
    pub(crate) current_time: GraphTime,
    pub(crate) state_computed_time: GraphTime,
    /// Offline graphs stop once the current time reaches this.
    pub(crate) end_time: GraphTime,
    pub(crate) current_time_stamp: Instant,
    pub(crate) processing_graph_update_index: u64,
    pub(crate) need_another_iteration: bool,
    pub(crate) audio_backend: Arc<dyn AudioOutputBackend>,
    pub(crate) mixer: Option<AudioMixer>,
    pub(crate) mixer_callbacks: Vec<Arc<dyn MixerCallback>>,
    pub(crate) waker: Weak<dyn IterationWaker>,
    pub(crate) outputs_paused: bool,
    last_main_thread_update: Instant,
    metrics: GraphMetrics,
}

impl GraphEngine {
    pub(crate) fn new(
        config: GraphConfig,
        realtime: bool,
        audio_backend: Arc<dyn AudioOutputBackend>,
        waker: Weak<dyn IterationWaker>,
    ) -> Self {
        let now = Instant::now();
        Self {
            sample_rate: config.sample_rate,
            config,
            realtime,
            streams: HashMap::new(),
            ports: HashMap::new(),
            stream_order: Vec::new(),
            first_cycle_breaker: 0,
            stream_order_dirty: false,
            current_time: 0,
            state_computed_time: 0,
            end_time: GRAPH_TIME_MAX,
            current_time_stamp: now,
            processing_graph_update_index: 0,
            need_another_iteration: false,
            audio_backend,
            mixer: None,
            mixer_callbacks: Vec::new(),
            waker,
            outputs_paused: false,
            last_main_thread_update: now,
            metrics: GraphMetrics::new(),
        }
    }

    pub(crate) const fn clock(&self) -> GraphClock {
        GraphClock::new(self.current_time, self.state_computed_time)
    }

    pub(crate) fn count_underrun(&self) {
        self.metrics.underruns.add(1, &[]);
    }

    pub(crate) fn ensure_next_iteration(&mut self) {
        self.need_another_iteration = true;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.ports.is_empty()
    }

    pub(crate) fn all_finished_streams_notified(&self) -> bool {
        self.streams.values().all(|s| !s.finished || s.notified_finished)
    }

    pub(crate) fn graph_time_to_stream_time(&self, id: StreamId, time: GraphTime) -> StreamTime {
        self.streams
            .get(&id)
            .map_or(0, |s| self.clock().graph_time_to_stream_time(s.timeline(), time))
    }

    pub(crate) fn stream_time_to_graph_time(
        &self,
        id: StreamId,
        time: StreamTime,
        trailing: TrailingBlocked,
    ) -> GraphTime {
        self.streams.get(&id).map_or(GRAPH_TIME_MAX, |s| {
            self.clock().stream_time_to_graph_time(s.timeline(), time, trailing)
        })
    }

    // === Stream and port bookkeeping ===

    pub(crate) fn add_stream(&mut self, mut stream: MediaStream) {
        stream.buffer_start_time = self.current_time;
        if stream.as_processed().is_some_and(|p| p.processor.is_audio_node()) {
            stream.buffer.add_track(
                AUDIO_NODE_TRACK,
                self.sample_rate,
                0,
                MediaSegment::Audio(AudioSegment::new()),
            );
            stream.buffer.advance_known_tracks_time(STREAM_TIME_MAX);
            stream.has_current_data = true;
        }
        tracing::debug!(stream = %stream.id, time = self.current_time, "Adding stream to graph");
        self.stream_order.push(stream.id);
        self.streams.insert(stream.id, stream);
        self.stream_order_dirty = true;
    }

    pub(crate) fn remove_stream(&mut self, id: StreamId) {
        let Some(stream) = self.streams.get(&id) else {
            tracing::debug!(stream = %id, "Destroying unknown stream");
            return;
        };
        let mut ports: Vec<PortId> = stream.consumers.to_vec();
        if let Some(processed) = stream.as_processed() {
            ports.extend(processed.inputs.iter().copied());
        }
        for port in ports {
            self.disconnect_port(port);
        }

        let Some(mut stream) = self.streams.remove(&id) else {
            return;
        };
        for output in &mut stream.audio_output_streams {
            if let Some(sink) = output.sink.as_mut() {
                sink.shutdown();
            }
        }
        stream.audio_output_streams.clear();
        for listener in stream.listeners.drain(..).rev() {
            listener.notify_event(StreamEvent::Removed);
        }
        if let StreamKind::Source(source) = &stream.kind {
            source.input.mark_destroyed();
        }
        self.stream_order.retain(|s| *s != id);
        self.stream_order_dirty = true;
        tracing::debug!(stream = %id, "Removed stream from graph");
    }

    pub(crate) fn connect_port(&mut self, port: MediaInputPort) {
        if !self.streams.contains_key(&port.source) || !self.streams.contains_key(&port.dest) {
            tracing::warn!(
                port = %port.id,
                source = %port.source,
                dest = %port.dest,
                "Ignoring port between streams that no longer exist"
            );
            return;
        }
        let Some(dest) = self.streams.get_mut(&port.dest).and_then(MediaStream::as_processed_mut) else {
            tracing::warn!(port = %port.id, dest = %port.dest, "Port destination is not a processed stream");
            return;
        };
        dest.inputs.push(port.id);
        if let Some(source) = self.streams.get_mut(&port.source) {
            source.consumers.push(port.id);
        }
        self.ports.insert(port.id, port);
        self.stream_order_dirty = true;
    }

    pub(crate) fn disconnect_port(&mut self, id: PortId) {
        let Some(port) = self.ports.remove(&id) else {
            return;
        };
        if let Some(source) = self.streams.get_mut(&port.source) {
            source.consumers.retain(|p| *p != id);
        }
        if let Some(dest) = self.streams.get_mut(&port.dest).and_then(MediaStream::as_processed_mut) {
            dest.inputs.retain(|p| *p != id);
        }
        self.stream_order_dirty = true;
    }

    /// Destroys every remaining stream. Only called once no scheduler thread
    /// owns the engine.
    pub(crate) fn destroy_all_streams(&mut self) {
        let ids: Vec<StreamId> = self.streams.keys().copied().collect();
        for id in ids {
            self.remove_stream(id);
        }
        self.ports.clear();
        self.stream_order.clear();
    }

    /// Marks a stream finished. It is fully finished (and listeners are told)
    /// once all of its buffered data has been played.
    pub(crate) fn finish_stream(&mut self, id: StreamId) {
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        if stream.finished {
            return;
        }
        tracing::debug!(stream = %id, "Stream finished");
        stream.finished = true;
        if !stream.is_source() {
            for track in stream.buffer.tracks_mut() {
                track.set_ended();
            }
        }
        stream.buffer.advance_known_tracks_time(STREAM_TIME_MAX);
        self.ensure_next_iteration();
        self.stream_order_dirty = true;
    }

    // === The iteration ===

    /// Runs one scheduler iteration with the message batches collected since
    /// the previous one.
    pub(crate) fn iterate(&mut self, batches: Vec<MessageBlock>, now: Instant) {
        self.metrics.iterations.add(1, &[]);
        self.update_current_time(now);
        let end_blocking_decisions = round_up_to_next_audio_block(
            self.sample_rate,
            self.current_time + self.config.audio_target(),
        )
        .max(self.state_computed_time);
        let prev_computed_time = self.state_computed_time;
        self.update_graph(batches, end_blocking_decisions);
        self.process(prev_computed_time, self.state_computed_time);
        self.metrics.streams_active.record(self.streams.len() as u64, &[]);
    }

    /// Advances the current time and delivers blocking, output and finish
    /// notifications for the elapsed interval.
    #[allow(clippy::cognitive_complexity)]
    pub(crate) fn update_current_time(&mut self, now: Instant) {
        let prev_current_time = self.current_time;
        let mut next_current_time = if self.realtime {
            let elapsed = now.saturating_duration_since(self.current_time_stamp);
            self.current_time_stamp = now;
            self.current_time + seconds_to_media_time(elapsed.as_secs_f64())
        } else {
            self.current_time + self.config.target_period()
        };

        if self.state_computed_time < next_current_time {
            if self.state_computed_time > 0 {
                tracing::warn!(
                    current_time = self.current_time,
                    state_computed_time = self.state_computed_time,
                    "Media graph global underrun detected"
                );
                self.metrics.underruns.add(1, &[]);
            }
            next_current_time = self.state_computed_time;
        }

        if prev_current_time >= next_current_time {
            debug_assert_eq!(prev_current_time, next_current_time, "time can't go backwards");
            tracing::trace!(time = prev_current_time, "Time did not advance");
            return;
        }

        let elapsed = next_current_time - prev_current_time;
        let min_forget = self.config.min_forget();
        let mut has_output = Vec::new();
        let mut ready_to_finish = Vec::new();

        for id in &self.stream_order {
            let Some(stream) = self.streams.get_mut(id) else {
                continue;
            };
            let mut blocked_time = 0;
            let mut t = prev_current_time;
            // Includes next_current_time so blocking is reported before a
            // finish that lands exactly on it.
            while t <= next_current_time {
                let (blocked, end) = stream.blocked.get_at_with_end(t);
                let blocked = *blocked;
                if blocked {
                    blocked_time += end.min(next_current_time) - t;
                }
                if blocked != stream.notified_blocked {
                    let blocking = if blocked {
                        mediagraph_core::Blocking::Blocked
                    } else {
                        mediagraph_core::Blocking::Unblocked
                    };
                    for listener in &stream.listeners {
                        listener.notify_blocking_changed(blocking);
                    }
                    stream.notified_blocked = blocked;
                }
                t = end;
            }

            stream.advance_time_varying_values_to_current_time(next_current_time, blocked_time, min_forget);
            stream.blocked.advance_current_time(next_current_time);

            if blocked_time < elapsed {
                has_output.push(*id);
            }
            if stream.finished && !stream.notified_finished {
                ready_to_finish.push(*id);
            }
        }

        self.current_time = next_current_time;

        for id in has_output {
            if let Some(stream) = self.streams.get(&id) {
                for listener in &stream.listeners {
                    listener.notify_output(next_current_time);
                }
            }
        }

        let clock = self.clock();
        let mut order_dirty = false;
        for id in ready_to_finish {
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            let end = clock.stream_time_to_graph_time(
                stream.timeline(),
                stream.buffer.get_all_tracks_end(),
                TrailingBlocked::Exclude,
            );
            if self.current_time >= end {
                stream.notified_finished = true;
                stream.last_played_video_frame = None;
                order_dirty = true;
                tracing::debug!(stream = %id, time = self.current_time, "Stream fully played");
                for listener in &stream.listeners {
                    listener.notify_event(StreamEvent::Finished);
                }
            }
        }
        if order_dirty {
            self.stream_order_dirty = true;
        }
    }

    pub(crate) fn apply_message_batches(&mut self, batches: Vec<MessageBlock>) {
        for batch in batches {
            self.processing_graph_update_index = batch.graph_update_index;
            for message in batch.messages {
                self.metrics.control_messages.add(1, &[]);
                if let Some(id) = message.stream() {
                    let at = self.state_computed_time;
                    let index = self.processing_graph_update_index;
                    if let Some(stream) = self.streams.get_mut(&id) {
                        stream.graph_update_indices.set_at_and_after(at, index);
                    }
                }
                message.run(self);
            }
        }
    }

    /// Applies control messages, reorders if needed, pulls source input and
    /// decides blocking up to `end_blocking_decisions`.
    pub(crate) fn update_graph(&mut self, batches: Vec<MessageBlock>, end_blocking_decisions: GraphTime) {
        self.apply_message_batches(batches);

        if self.stream_order_dirty {
            self.update_stream_order();
        }

        let mut ensure_next_iteration = false;
        let sources: Vec<StreamId> =
            self.stream_order.iter().copied().filter(|id| self.streams.get(id).is_some_and(MediaStream::is_source)).collect();
        for id in sources {
            self.update_consumption_state(id);
            self.extract_pending_input(id, end_blocking_decisions, &mut ensure_next_iteration);
        }

        if ensure_next_iteration || end_blocking_decisions == self.state_computed_time {
            self.ensure_next_iteration();
        }

        self.recompute_blocking(end_blocking_decisions);
    }

    fn update_consumption_state(&mut self, id: StreamId) {
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        let state = if stream.is_consumed { Consumption::Consumed } else { Consumption::NotConsumed };
        let StreamKind::Source(source) = &mut stream.kind else {
            return;
        };
        if source.last_consumption == Some(state) {
            return;
        }
        source.last_consumption = Some(state);
        for listener in &stream.listeners {
            listener.notify_consumption_changed(state);
        }
    }

    /// Moves data queued by the producer into the stream buffer.
    #[allow(clippy::cognitive_complexity)]
    fn extract_pending_input(
        &mut self,
        id: StreamId,
        desired_up_to_time: GraphTime,
        ensure_next_iteration: &mut bool,
    ) {
        let clock = self.clock();
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        let StreamKind::Source(source) = &stream.kind else {
            return;
        };
        let input = Arc::clone(&source.input);

        let pull_enabled = input.pending.lock().pull_enabled;
        if pull_enabled && !stream.finished && !stream.listeners.is_empty() {
            // Stream time needed if the stream is not blocked between the
            // computed horizon and the desired time.
            let t = clock.graph_time_to_stream_time(stream.timeline(), self.state_computed_time)
                + (desired_up_to_time - self.state_computed_time);
            if t > stream.buffer.get_end() {
                *ensure_next_iteration = true;
                // Producer lock is not held here; listeners may append.
                for listener in &stream.listeners {
                    listener.notify_pull(t);
                }
            }
        }

        let finished = {
            let mut pending = input.pending.lock();
            let finished = pending.update_finished;
            let mut index = pending.update_tracks.len();
            while index > 0 {
                index -= 1;
                let data = &mut pending.update_tracks[index];
                stream.apply_track_disabling(data.id, &mut data.data);
                let offset = if data.commands.created {
                    data.start
                } else {
                    stream.buffer.find_track(data.id).map_or(0, |t| t.end())
                };
                let change = QueuedTrackChange {
                    track: data.id,
                    rate: data.output_rate,
                    offset,
                    changes: data.commands,
                    segment: &data.data,
                };
                for listener in &stream.listeners {
                    listener.notify_queued_track_changes(&change);
                }
                if data.commands.created {
                    let empty = data.data.create_empty_clone();
                    let segment = std::mem::replace(&mut data.data, empty);
                    tracing::debug!(
                        stream = %id,
                        track = data.id,
                        rate = data.output_rate,
                        start = data.start,
                        "Adding track to source stream"
                    );
                    stream.buffer.add_track(data.id, data.output_rate, data.start, segment);
                    data.commands.created = false;
                } else if data.data.duration() > 0 {
                    if let Some(track) = stream.buffer.find_track_mut(data.id) {
                        track.segment_mut().append_from(&mut data.data);
                    }
                }
                if data.commands.ended {
                    if let Some(track) = stream.buffer.find_track_mut(data.id) {
                        track.set_ended();
                    }
                    pending.update_tracks.remove(index);
                }
            }
            if !stream.finished {
                let known = pending.update_known_tracks_time.max(stream.buffer.tracks_known_time());
                stream.buffer.advance_known_tracks_time(known);
            }
            finished
        };

        if stream.buffer.get_end() > 0 {
            stream.has_current_data = true;
        }
        if finished {
            self.finish_stream(id);
        }
    }

    /// Produces data for `[from, to)` and plays it.
    #[allow(clippy::cognitive_complexity)]
    pub(crate) fn process(&mut self, from: GraphTime, to: GraphTime) {
        let mut all_blocked_forever = true;
        let mut done_all_producing = false;
        let order = self.stream_order.clone();

        for (i, id) in order.iter().enumerate() {
            if !done_all_producing {
                let processor_kind = self.streams.get(id).and_then(|s| s.as_processed()).map(|p| p.processor.is_audio_node());
                match processor_kind {
                    Some(true) => {
                        self.produce_data_for_streams_block_by_block(i, from, to);
                        done_all_producing = true;
                    },
                    Some(false) => {
                        if from < to {
                            self.process_input(*id, from, to, true);
                        }
                    },
                    None => {},
                }
            }

            self.notify_has_current_data(*id);
            if self.realtime {
                self.create_or_destroy_audio_streams(from, *id);
                self.play_audio(*id, from, to);
                self.play_video(*id);
            }
            if self.streams.get(id).is_some_and(MediaStream::is_source) {
                self.update_buffer_sufficiency_state(*id);
            }
            if let Some(stream) = self.streams.get(id) {
                let (blocked, end) = stream.blocked.get_at_with_end(to);
                if !*blocked || end < GRAPH_TIME_MAX {
                    all_blocked_forever = false;
                }
            }
        }

        if let Some(mixer) = self.mixer.as_mut() {
            mixer.finish_mixing(&self.mixer_callbacks);
        }

        if !all_blocked_forever {
            self.ensure_next_iteration();
        }
    }

    fn produce_data_for_streams_block_by_block(&mut self, start_index: usize, from: GraphTime, to: GraphTime) {
        let order = self.stream_order.clone();
        let breakers: Vec<StreamId> = order.get(self.first_cycle_breaker..).map(<[StreamId]>::to_vec).unwrap_or_default();
        let mut t = from;
        while t < to {
            let next = round_up_to_next_audio_block(self.sample_rate, t).min(to);
            for id in &breakers {
                self.produce_output_before_input(*id, t, next);
            }
            for id in order.iter().skip(start_index) {
                if self.streams.get(id).is_some_and(|s| s.as_processed().is_some()) {
                    self.process_input(*id, t, next, next == to);
                }
            }
            t = next;
        }
    }

    /// Runs a processed stream over `[from, to)`.
    pub(crate) fn process_input(&mut self, id: StreamId, from: GraphTime, to: GraphTime, allow_finish: bool) {
        let Some(is_audio_node) = self.streams.get(&id).and_then(|s| s.as_processed()).map(|p| p.processor.is_audio_node())
        else {
            return;
        };
        if is_audio_node {
            self.process_audio_node_block(id, from, to, allow_finish);
        } else {
            self.process_track_union(id, from, to, allow_finish);
        }
    }

    fn notify_has_current_data(&mut self, id: StreamId) {
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        if !stream.notified_has_current_data && stream.has_current_data {
            for listener in &stream.listeners {
                listener.notify_has_current_data();
            }
            stream.notified_has_current_data = true;
        }
    }

    /// Stream time a source should have buffered up to for its producer to be
    /// considered ahead.
    fn desired_buffer_end(&self, stream: &MediaStream) -> StreamTime {
        let current = self.current_time - stream.buffer_start_time;
        current + 2 * self.config.audio_target().max(self.config.video_target())
    }

    fn update_buffer_sufficiency_state(&mut self, id: StreamId) {
        let Some(stream) = self.streams.get(&id) else {
            return;
        };
        let StreamKind::Source(source) = &stream.kind else {
            return;
        };
        let desired_end = self.desired_buffer_end(stream);
        let mut callbacks = Vec::new();
        {
            let mut pending = source.input.pending.lock();
            for data in &mut pending.update_tracks {
                if data.commands.created || data.commands.ended {
                    continue;
                }
                let Some(track) = stream.buffer.find_track(data.id) else {
                    continue;
                };
                data.have_enough = track.end_time_round_down() >= desired_end;
                if !data.have_enough {
                    callbacks.append(&mut data.dispatch_when_not_enough);
                }
            }
        }
        for callback in callbacks {
            callback();
        }
    }

    // === Publishing state ===

    fn should_update_main_thread(&mut self, now: Instant) -> bool {
        if self.realtime {
            return true;
        }
        let period = u64::try_from(self.config.target_period_ms).unwrap_or(0);
        if now.saturating_duration_since(self.last_main_thread_update).as_millis() > u128::from(period) {
            self.last_main_thread_update = now;
            return true;
        }
        false
    }

    /// Snapshot of every stream's state for the control thread, or `None`
    /// when an offline graph is throttling updates.
    pub(crate) fn prepare_updates(&mut self, final_update: bool, now: Instant) -> Option<Vec<StreamStateUpdate>> {
        if !final_update && !self.should_update_main_thread(now) {
            return None;
        }
        let clock = self.clock();
        let timestamp = SystemTime::now();
        Some(
            self.stream_order
                .iter()
                .filter_map(|id| self.streams.get(id))
                .map(|stream| StreamStateUpdate {
                    stream: stream.id,
                    graph_update_index: *stream.graph_update_indices.get_at(self.current_time),
                    current_time: clock.graph_time_to_stream_time(stream.timeline(), self.current_time),
                    finished: stream.notified_finished,
                    timestamp,
                })
                .collect(),
        )
    }

    pub(crate) fn memory_report(&self) -> Vec<StreamMemoryUsage> {
        self.stream_order
            .iter()
            .filter_map(|id| self.streams.get(id))
            .map(|stream| StreamMemoryUsage {
                stream: stream.id,
                kind: match &stream.kind {
                    StreamKind::Source(_) => "source",
                    StreamKind::Processed(p) => match p.processor {
                        crate::processed::Processor::TrackUnion(_) => "track_union",
                        crate::processed::Processor::Mixer(_) => "mixer",
                        crate::processed::Processor::Delay(_) => "delay",
                    },
                },
                bytes: stream.memory_usage(),
            })
            .collect()
    }

    /// Listener fan-out helper for processed streams that queued data on a track.
    pub(crate) fn notify_queued(listeners: &[Arc<dyn StreamListener>], change: &QueuedTrackChange<'_>) {
        for listener in listeners {
            listener.notify_queued_track_changes(change);
        }
    }
}
