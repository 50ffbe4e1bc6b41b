// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Realtime playback: audio tracks to output sinks, video frames to video sinks.

use std::time::Duration;

use mediagraph_core::output::AudioOutputRequest;
use mediagraph_core::segment::AudioSegment;
use mediagraph_core::time::{media_time_to_seconds, ticks_to_time_round_down, time_to_ticks_round_down};
use mediagraph_core::{GraphTime, MediaType, StreamId, TrailingBlocked};

use crate::constants::AUDIO_OUTPUT_CHANNELS;
use crate::graph::GraphEngine;
use crate::stream::AudioOutputStream;

impl GraphEngine {
    /// Opens an output for every audio track of a played stream and closes
    /// outputs whose track is gone.
    pub(crate) fn create_or_destroy_audio_streams(&mut self, playback_start: GraphTime, id: StreamId) {
        let rate = self.sample_rate;
        let backend = std::sync::Arc::clone(&self.audio_backend);
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };

        let mut found = vec![false; stream.audio_output_streams.len()];
        if !stream.audio_outputs.is_empty() {
            let tracks: Vec<_> = stream.buffer.tracks_of_type(MediaType::Audio).map(|t| t.id()).collect();
            for track in tracks {
                if let Some(index) = stream.audio_output_streams.iter().position(|o| o.track == track) {
                    found[index] = true;
                    continue;
                }
                let request = AudioOutputRequest { stream: id, track, channels: AUDIO_OUTPUT_CHANNELS, rate };
                let sink = match backend.open(&request) {
                    Ok(sink) => Some(sink),
                    Err(e) => {
                        tracing::error!(stream = %id, track, error = %e, "Failed to open audio output");
                        None
                    },
                };
                tracing::debug!(stream = %id, track, "Created audio output stream");
                stream.audio_output_streams.push(AudioOutputStream {
                    track,
                    playback_start_time: playback_start,
                    last_tick_written: 0,
                    sink,
                });
            }
        }

        for index in (0..found.len()).rev() {
            if !found[index] {
                let mut output = stream.audio_output_streams.remove(index);
                if let Some(sink) = output.sink.as_mut() {
                    sink.shutdown();
                }
                tracing::debug!(stream = %id, track = output.track, "Destroyed audio output stream");
            }
        }
    }

    /// Writes `[from, to)` of every played audio track to its output,
    /// with silence where the stream is blocked. Returns the frames written
    /// per output.
    #[allow(clippy::cognitive_complexity)]
    pub(crate) fn play_audio(&mut self, id: StreamId, from: GraphTime, to: GraphTime) -> i64 {
        let rate = self.sample_rate;
        // Depends only on the graph interval so every output advances by the
        // same amount each iteration.
        let ticks_needed_total = time_to_ticks_round_down(rate, to) - time_to_ticks_round_down(rate, from);
        let clock = self.clock();
        let Some(stream) = self.streams.get_mut(&id) else {
            return 0;
        };
        if stream.audio_output_streams.is_empty() {
            return 0;
        }
        // Copies of the same stream are correlated, so volumes add.
        let volume: f32 = stream.audio_outputs.iter().map(|o| o.volume).sum();
        let from_stream_time = clock.graph_time_to_stream_time(stream.timeline(), from);
        let mut interleaved = Vec::new();

        for output in &mut stream.audio_output_streams {
            let Some(track) = stream.buffer.find_track(output.track) else {
                continue;
            };
            let Some(audio) = track.segment().as_audio() else {
                continue;
            };
            let mut offset = track.time_to_ticks_round_down(from_stream_time);
            // Rounding can leave us one tick ahead of what was written.
            if output.last_tick_written != 0 && offset - output.last_tick_written == 1 {
                offset = output.last_tick_written;
            }

            let mut rendered = AudioSegment::new();
            let mut ticks_needed = ticks_needed_total;
            let mut t = from;
            while ticks_needed > 0 && t < to {
                let (blocked, end) = stream.blocked.get_at_with_end(t);
                let end = end.min(to);
                let to_write = if end >= to {
                    ticks_needed
                } else {
                    (time_to_ticks_round_down(rate, end) - time_to_ticks_round_down(rate, t)).min(ticks_needed)
                };
                ticks_needed -= to_write;

                if *blocked {
                    rendered.append_null_data(to_write);
                } else {
                    let end_needed = offset + to_write;
                    let available = audio.duration();
                    if end_needed <= available {
                        let mut slice = audio.slice(offset, end_needed);
                        slice.apply_volume(volume);
                        rendered.append_from(&mut slice);
                        offset = end_needed;
                    } else {
                        if !track.is_ended() {
                            tracing::trace!(stream = %id, track = output.track, "Audio output ran past buffered data");
                        }
                        let mut remaining = to_write;
                        if offset < available {
                            let mut slice = audio.slice(offset, available);
                            slice.apply_volume(volume);
                            rendered.append_from(&mut slice);
                            remaining -= available - offset;
                            offset = available;
                        }
                        rendered.append_null_data(remaining);
                    }
                }
                t = end;
            }
            output.last_tick_written = offset;

            interleaved.clear();
            rendered.write_interleaved(AUDIO_OUTPUT_CHANNELS, &mut interleaved);
            let frames = usize::try_from(rendered.duration()).unwrap_or(0);
            if let Some(sink) = output.sink.as_mut() {
                sink.write(&interleaved, frames);
            }
            if let Some(mixer) = self.mixer.as_mut() {
                mixer.mix(&interleaved, frames);
            }
        }
        ticks_needed_total
    }

    /// Sends the frame due slightly after the current time to the stream's
    /// video sinks, if it changed.
    pub(crate) fn play_video(&mut self, id: StreamId) {
        let clock = self.clock();
        let target_period = self.config.target_period();
        let current_time_stamp = self.current_time_stamp;
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        if stream.video_outputs.is_empty() {
            return;
        }

        // Show the next frame a little early rather than the current one too long.
        let frame_position = (clock.current_time + target_period).min(clock.state_computed_time);
        let frame_buffer_time = clock.graph_time_to_stream_time(stream.timeline(), frame_position);

        let mut chosen = None;
        for track in stream.buffer.tracks_of_type(MediaType::Video) {
            let Some(segment) = track.segment().as_video() else {
                continue;
            };
            if let Some((frame, start)) = segment.frame_at(track.time_to_ticks_round_down(frame_buffer_time)) {
                if frame.image().is_some() {
                    chosen = Some((frame.clone(), ticks_to_time_round_down(track.rate(), start)));
                }
            }
        }
        let Some((frame, start_time)) = chosen else {
            return;
        };
        if stream.last_played_video_frame.as_ref() == Some(&frame) {
            return;
        }

        let start = clock.stream_time_to_graph_time(stream.timeline(), start_time, TrailingBlocked::Include);
        let offset = media_time_to_seconds(start - clock.current_time);
        let target = if offset >= 0.0 {
            current_time_stamp.checked_add(Duration::from_secs_f64(offset))
        } else {
            current_time_stamp.checked_sub(Duration::from_secs_f64(-offset))
        }
        .unwrap_or(current_time_stamp);

        tracing::trace!(stream = %id, start, "Playing video frame");
        for sink in &stream.video_outputs {
            sink.set_current_frame(&frame, target);
        }
        if !stream.notified_finished {
            stream.last_played_video_frame = Some(frame);
        }
    }

    /// Pauses every audio output while the scheduler sleeps.
    pub(crate) fn pause_audio_outputs(&mut self) {
        if self.outputs_paused {
            return;
        }
        self.outputs_paused = true;
        for stream in self.streams.values_mut() {
            for sink in stream.audio_output_streams.iter_mut().filter_map(|o| o.sink.as_mut()) {
                sink.pause();
            }
        }
    }

    pub(crate) fn resume_audio_outputs(&mut self) {
        if !self.outputs_paused {
            return;
        }
        self.outputs_paused = false;
        for stream in self.streams.values_mut() {
            for sink in stream.audio_output_streams.iter_mut().filter_map(|o| o.sink.as_mut()) {
                sink.resume();
            }
        }
    }
}
