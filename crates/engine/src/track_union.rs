// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Interval-based processing of track-union streams.
//!
//! Every track of every input gets its own output track. Data is copied one
//! input interval at a time: while the input is blocked the output receives
//! silence, and consecutive unblocked intervals continue reading the input
//! where the previous one stopped so no samples are skipped or repeated.

use std::sync::Arc;

use mediagraph_core::listener::QueuedTrackChange;
use mediagraph_core::time::{time_to_ticks_round_down, time_to_ticks_round_up, StreamTimeline, TRACK_TICKS_MAX};
use mediagraph_core::{
    GraphClock, GraphTime, StreamBuffer, StreamId, StreamListener, Track, TrackChanges, TrackId,
};

use crate::graph::GraphEngine;
use crate::port::{next_input_interval, MediaInputPort};
use crate::processed::{Processor, TrackMapEntry, TrackUnion};
use crate::stream::{MediaStream, StreamKind};

/// The pieces of the destination stream a copy writes to.
struct Output<'a> {
    clock: GraphClock,
    timeline: StreamTimeline<'a>,
    buffer: &'a mut StreamBuffer,
    listeners: &'a [Arc<dyn StreamListener>],
    disabled_tracks: &'a [TrackId],
    muted: bool,
}

impl GraphEngine {
    pub(crate) fn process_track_union(&mut self, id: StreamId, from: GraphTime, to: GraphTime, allow_finish: bool) {
        // Taken out of the map so its inputs can be read while it is written.
        let Some(mut stream) = self.streams.remove(&id) else {
            return;
        };
        let finish = self.run_track_union(&mut stream, from, to, allow_finish);
        self.streams.insert(id, stream);
        if finish {
            self.finish_stream(id);
        }
    }

    /// Returns true when the stream should finish.
    #[allow(clippy::cognitive_complexity)]
    fn run_track_union(&self, stream: &mut MediaStream, from: GraphTime, to: GraphTime, allow_finish: bool) -> bool {
        if stream.finished {
            return false;
        }
        let MediaStream {
            buffer,
            kind,
            listeners,
            disabled_tracks,
            blocked,
            buffer_start_time,
            has_current_data,
            ..
        } = stream;
        let StreamKind::Processed(processed) = kind else {
            return false;
        };
        let muted = processed.in_muted_cycle();
        let autofinish = processed.autofinish;
        let Processor::TrackUnion(union) = &mut processed.processor else {
            return false;
        };
        let mut out = Output {
            clock: self.clock(),
            timeline: StreamTimeline { buffer_start_time: *buffer_start_time, blocked },
            buffer,
            listeners,
            disabled_tracks,
            muted,
        };

        let mut mapped_finished = vec![true; union.track_map.len()];
        let mut mapped_matched = vec![false; union.track_map.len()];
        let mut all_finished = true;
        let mut all_have_current_data = true;

        for port_id in &processed.inputs {
            let Some(port) = self.ports.get(port_id) else {
                continue;
            };
            let Some(source) = self.streams.get(&port.source) else {
                // Reading from itself: only possible in a muted cycle.
                all_finished = false;
                continue;
            };
            if !source.finished {
                all_finished = false;
            }
            if !source.has_current_data {
                all_have_current_data = false;
            }

            for input_track in source.buffer.tracks() {
                let existing = union
                    .track_map
                    .iter()
                    .position(|m| m.port == port.id && m.input_track == input_track.id());
                match existing {
                    Some(index) => {
                        let output_open = out
                            .buffer
                            .find_track(union.track_map[index].output_track)
                            .is_some_and(|t| !t.is_ended());
                        let finished = !output_open
                            || copy_track_data(&mut out, port, source, input_track, &mut union.track_map[index], from, to);
                        mapped_finished[index] = finished;
                        mapped_matched[index] = true;
                    },
                    None => {
                        let index = add_track(&mut out, union, port, input_track, from);
                        let finished =
                            copy_track_data(&mut out, port, source, input_track, &mut union.track_map[index], from, to);
                        mapped_finished.push(finished);
                        mapped_matched.push(true);
                    },
                }
            }
        }

        for index in (0..union.track_map.len()).rev() {
            if mapped_finished[index] {
                end_track(&mut out, &union.track_map[index]);
            } else {
                all_finished = false;
            }
            if !mapped_matched[index] {
                union.track_map.remove(index);
            }
        }

        if all_have_current_data {
            *has_current_data = true;
        }
        if all_finished && autofinish && allow_finish {
            return true;
        }
        let known = out.clock.graph_time_to_stream_time(out.timeline, to);
        out.buffer.advance_known_tracks_time(known.max(out.buffer.tracks_known_time()));
        false
    }
}

/// Creates the output track for a newly seen input track and returns its map index.
fn add_track(
    out: &mut Output<'_>,
    union: &mut TrackUnion,
    port: &MediaInputPort,
    input_track: &Track,
    from: GraphTime,
) -> usize {
    // Keep the input's id unless it's taken.
    let mut max_track_id = union
        .track_map
        .iter()
        .map(|m| m.output_track)
        .fold(union.max_track_id, TrackId::max);
    let mut id = input_track.id();
    while out.buffer.find_track(id).is_some() {
        max_track_id += 1;
        id = max_track_id;
    }
    union.max_track_id = union.max_track_id.max(id);

    let rate = input_track.rate();
    // Round up so the track starts no earlier than the true time.
    let output_start = time_to_ticks_round_up(rate, out.clock.graph_time_to_stream_time(out.timeline, from));

    let mut segment = input_track.segment().create_empty_clone();
    let change = QueuedTrackChange {
        track: id,
        rate,
        offset: output_start,
        changes: TrackChanges::CREATED,
        segment: &segment,
    };
    GraphEngine::notify_queued(out.listeners, &change);
    segment.append_null_data(output_start);
    out.buffer.add_track(id, rate, output_start, segment);
    tracing::debug!(
        input_port = %port.id,
        input_track = input_track.id(),
        output_track = id,
        start = output_start,
        "Adding track to track union"
    );

    union.track_map.push(TrackMapEntry {
        port: port.id,
        input_track: input_track.id(),
        output_track: id,
        end_of_consumed_input_ticks: 0,
        end_of_last_input_interval_in_input_stream: -1,
        end_of_last_input_interval_in_output_stream: -1,
        segment: input_track.segment().create_empty_clone(),
    });
    union.track_map.len() - 1
}

fn end_track(out: &mut Output<'_>, entry: &TrackMapEntry) {
    let Some(track) = out.buffer.find_track_mut(entry.output_track) else {
        return;
    };
    if track.is_ended() {
        return;
    }
    let empty = track.segment().create_empty_clone();
    let change = QueuedTrackChange {
        track: track.id(),
        rate: track.rate(),
        offset: track.segment().duration(),
        changes: TrackChanges::ENDED,
        segment: &empty,
    };
    GraphEngine::notify_queued(out.listeners, &change);
    track.set_ended();
}

/// Copies `[from, to)` of `input_track` into the mapped output track.
/// Returns true once the input track has been copied to its end.
#[allow(clippy::too_many_arguments)]
fn copy_track_data(
    out: &mut Output<'_>,
    port: &MediaInputPort,
    source: &MediaStream,
    input_track: &Track,
    entry: &mut TrackMapEntry,
    from: GraphTime,
    to: GraphTime,
) -> bool {
    let clock = out.clock;
    let horizon = clock.state_computed_time;
    let mut finished = false;
    let mut t = from;

    while t < to {
        let mut interval = next_input_interval(&source.blocked, out.timeline.blocked, horizon, t);
        interval.end = interval.end.min(to);
        if interval.start >= interval.end {
            break;
        }
        t = interval.end;

        let Some(output_track) = out.buffer.find_track_mut(entry.output_track) else {
            return true;
        };
        let rate = output_track.rate();
        let output_start = clock.graph_time_to_stream_time(out.timeline, interval.start);
        let output_end = clock.graph_time_to_stream_time(out.timeline, interval.end);
        let start_ticks = output_track.end();
        let end_ticks = time_to_ticks_round_up(rate, output_end);
        let ticks = (end_ticks - start_ticks).max(0);
        let input_start = clock.graph_time_to_stream_time(source.timeline(), interval.start);

        if interval.input_is_blocked || out.muted {
            entry.segment.append_null_data(ticks);
            if input_track.is_ended() && input_track.end_time_round_down() <= input_start {
                finished = true;
            }
        } else {
            let input_end = clock.graph_time_to_stream_time(source.timeline(), interval.end);
            let mut input_end_point = TRACK_TICKS_MAX;
            if input_track.is_ended() && input_track.end_time_round_down() <= input_end {
                input_end_point = input_track.end();
                finished = true;
            }

            if entry.end_of_last_input_interval_in_input_stream != input_start
                || entry.end_of_last_input_interval_in_output_stream != output_start
            {
                // Start of a new run of intervals where neither stream is blocked.
                entry.end_of_consumed_input_ticks = time_to_ticks_round_down(rate, input_start);
            }
            let input_start_ticks = entry.end_of_consumed_input_ticks;
            let input_end_ticks = input_start_ticks + ticks;
            entry.end_of_consumed_input_ticks = input_end_ticks;
            entry.end_of_last_input_interval_in_input_stream = input_end;
            entry.end_of_last_input_interval_in_output_stream = output_end;

            let slice_start = input_start_ticks.min(input_end_point);
            let slice_end = input_end_ticks.min(input_end_point);
            if slice_start < 0 {
                entry.segment.append_null_data(-slice_start);
                entry.segment.append_slice(input_track.segment(), 0, slice_end.max(0));
            } else {
                entry.segment.append_slice(input_track.segment(), slice_start, slice_end);
            }
        }

        if out.disabled_tracks.contains(&entry.output_track) {
            entry.segment.replace_with_disabled();
        }
        let change = QueuedTrackChange {
            track: entry.output_track,
            rate,
            offset: start_ticks,
            changes: TrackChanges::NONE,
            segment: &entry.segment,
        };
        GraphEngine::notify_queued(out.listeners, &change);
        output_track.segment_mut().append_from(&mut entry.segment);
    }
    tracing::trace!(port = %port.id, track = entry.output_track, finished, "Copied track data");
    finished
}
