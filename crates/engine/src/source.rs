// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Source streams: data pushed in by producer threads.
//!
//! Producers never touch the scheduler's copy of a stream. They queue track
//! commands and data in [`SourceInput`] under its mutex, and the scheduler
//! moves that pending input into the stream buffer at the start of each
//! iteration.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use mediagraph_core::segment::{MediaSegment, ResampleCursor};
use mediagraph_core::time::rate_convert_ticks_round_down;
use mediagraph_core::{
    Consumption, StreamId, StreamTime, TrackChanges, TrackId, TrackRate, TrackTicks,
};

use crate::driver::IterationWaker;

/// Callback run once when a track's buffered data drops below the desired level.
pub type NotEnoughBufferedCallback = Box<dyn FnOnce() + Send>;

pub(crate) struct TrackData {
    pub(crate) id: TrackId,
    pub(crate) input_rate: TrackRate,
    pub(crate) output_rate: TrackRate,
    /// Start tick, at `output_rate`.
    pub(crate) start: TrackTicks,
    pub(crate) commands: TrackChanges,
    /// Data queued since the last extraction, at `output_rate`.
    pub(crate) data: MediaSegment,
    /// Audio converted so far, kept so appends continue the same conversion.
    pub(crate) resampler: ResampleCursor,
    pub(crate) have_enough: bool,
    pub(crate) dispatch_when_not_enough: Vec<NotEnoughBufferedCallback>,
}

#[derive(Default)]
pub(crate) struct PendingInput {
    pub(crate) update_tracks: Vec<TrackData>,
    pub(crate) update_known_tracks_time: StreamTime,
    pub(crate) pull_enabled: bool,
    pub(crate) update_finished: bool,
    pub(crate) destroyed: bool,
    pub(crate) needs_mixing: bool,
}

impl PendingInput {
    fn find_track_mut(&mut self, id: TrackId) -> Option<&mut TrackData> {
        self.update_tracks.iter_mut().find(|t| t.id == id)
    }

    const fn accepts_input(&self) -> bool {
        !self.update_finished && !self.destroyed
    }
}

/// Producer-side state of a source stream, shared between producer threads and
/// the scheduler.
pub(crate) struct SourceInput {
    pub(crate) id: StreamId,
    graph_rate: TrackRate,
    waker: Weak<dyn IterationWaker>,
    pub(crate) pending: Mutex<PendingInput>,
}

impl SourceInput {
    pub(crate) fn new(id: StreamId, graph_rate: TrackRate, waker: Weak<dyn IterationWaker>) -> Self {
        Self { id, graph_rate, waker, pending: Mutex::new(PendingInput::default()) }
    }

    fn wake_graph(&self) {
        if let Some(waker) = self.waker.upgrade() {
            waker.ensure_next_iteration();
        }
    }

    /// Queues a new track. Audio is converted to the graph rate; `segment`
    /// holds data starting at `start` (in `rate` ticks).
    pub(crate) fn add_track(&self, id: TrackId, rate: TrackRate, start: TrackTicks, segment: MediaSegment) {
        {
            let mut pending = self.pending.lock();
            if !pending.accepts_input() {
                tracing::debug!(stream = %self.id, track = id, "Ignoring track added to finished stream");
                return;
            }
            let output_rate = match segment {
                MediaSegment::Audio(_) => self.graph_rate,
                MediaSegment::Video(_) => rate,
            };
            let mut resampler = ResampleCursor::default();
            let mut data = resample_to(segment, rate, output_rate, &mut resampler);
            let start = rate_convert_ticks_round_down(output_rate, rate, start);
            data.insert_null_data_at_start(start);
            pending.update_tracks.push(TrackData {
                id,
                input_rate: rate,
                output_rate,
                start,
                commands: TrackChanges::CREATED,
                data,
                resampler,
                have_enough: false,
                dispatch_when_not_enough: Vec::new(),
            });
        }
        self.wake_graph();
    }

    /// Appends data to a queued or live track. Returns false when the stream
    /// is finished or the track is unknown or already ended.
    pub(crate) fn append_to_track(&self, id: TrackId, segment: MediaSegment) -> bool {
        let appended = {
            let mut pending = self.pending.lock();
            if !pending.accepts_input() {
                false
            } else if let Some(track) = pending.find_track_mut(id) {
                let mut data = resample_to(segment, track.input_rate, track.output_rate, &mut track.resampler);
                track.data.append_from(&mut data);
                true
            } else {
                tracing::debug!(stream = %self.id, track = id, "Append to unknown or ended track");
                false
            }
        };
        if appended {
            self.wake_graph();
        }
        appended
    }

    /// Marks a track as ended. Ending a track that has already ended is a no-op.
    pub(crate) fn end_track(&self, id: TrackId) {
        {
            let mut pending = self.pending.lock();
            if pending.destroyed {
                return;
            }
            let Some(track) = pending.find_track_mut(id) else {
                return;
            };
            track.commands.ended = true;
        }
        self.wake_graph();
    }

    pub(crate) fn advance_known_tracks_time(&self, time: StreamTime) {
        {
            let mut pending = self.pending.lock();
            if !pending.accepts_input() {
                return;
            }
            debug_assert!(
                time >= pending.update_known_tracks_time,
                "known tracks time can't go backwards"
            );
            pending.update_known_tracks_time = pending.update_known_tracks_time.max(time);
        }
        self.wake_graph();
    }

    pub(crate) fn finish(&self) {
        {
            let mut pending = self.pending.lock();
            pending.update_finished = true;
        }
        self.wake_graph();
    }

    pub(crate) fn end_all_tracks_and_finish(&self) {
        {
            let mut pending = self.pending.lock();
            for track in &mut pending.update_tracks {
                track.commands.ended = true;
            }
            pending.update_finished = true;
        }
        self.wake_graph();
    }

    pub(crate) fn set_pull_enabled(&self, enabled: bool) {
        {
            let mut pending = self.pending.lock();
            pending.pull_enabled = enabled;
        }
        self.wake_graph();
    }

    pub(crate) fn set_needs_mixing(&self, needs_mixing: bool) {
        self.pending.lock().needs_mixing = needs_mixing;
        self.wake_graph();
    }

    pub(crate) fn needs_mixing(&self) -> bool {
        self.pending.lock().needs_mixing
    }

    pub(crate) fn have_enough_buffered(&self, id: TrackId) -> bool {
        let pending = self.pending.lock();
        pending.update_tracks.iter().find(|t| t.id == id).is_some_and(|t| t.have_enough)
    }

    /// Runs `callback` as soon as `id` does not have enough data buffered:
    /// immediately if that is already the case, otherwise from the scheduler
    /// thread once the buffered amount drops.
    pub(crate) fn dispatch_when_not_enough_buffered(&self, id: TrackId, callback: NotEnoughBufferedCallback) {
        let callback = {
            let mut pending = self.pending.lock();
            match pending.find_track_mut(id) {
                Some(track) if track.have_enough => {
                    track.dispatch_when_not_enough.push(callback);
                    return;
                },
                _ => callback,
            }
        };
        callback();
    }

    pub(crate) fn mark_destroyed(&self) {
        let mut pending = self.pending.lock();
        pending.destroyed = true;
        pending.update_tracks.clear();
    }
}

fn resample_to(
    segment: MediaSegment,
    in_rate: TrackRate,
    out_rate: TrackRate,
    cursor: &mut ResampleCursor,
) -> MediaSegment {
    match segment {
        MediaSegment::Audio(audio) if in_rate != out_rate => audio.resample_from(in_rate, out_rate, cursor).into(),
        other => other,
    }
}

/// Scheduler-side extras of a source stream.
pub(crate) struct SourceStream {
    pub(crate) input: Arc<SourceInput>,
    /// Last consumption state reported to listeners.
    pub(crate) last_consumption: Option<Consumption>,
}

impl SourceStream {
    pub(crate) const fn new(input: Arc<SourceInput>) -> Self {
        Self { input, last_consumption: None }
    }
}
