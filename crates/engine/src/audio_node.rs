// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Block-based processing of audio-node streams (mixers and delays).
//!
//! Audio nodes produce one audio block at a time into their single output
//! track. Their input is the sum of every audio track of every unblocked input
//! stream. A delay node in a cycle produces its block before any stream in the
//! cycle runs, and consumes its input afterwards.

use mediagraph_core::listener::QueuedTrackChange;
use mediagraph_core::segment::{AudioSegment, MediaSegment};
use mediagraph_core::time::time_to_ticks_round_up;
use mediagraph_core::{GraphTime, MediaType, StreamId, TrackChanges};

use crate::graph::GraphEngine;
use crate::processed::{Processor, AUDIO_NODE_TRACK};
use crate::stream::StreamKind;

/// Frames an audio node must produce for one block.
struct BlockFrames {
    /// Silence needed first to catch the track up with the block start.
    padding: i64,
    frames: usize,
}

impl GraphEngine {
    fn audio_node_block_frames(&self, id: StreamId, from: GraphTime, to: GraphTime) -> Option<BlockFrames> {
        let stream = self.streams.get(&id)?;
        if stream.finished {
            return None;
        }
        let track = stream.buffer.find_track(AUDIO_NODE_TRACK)?;
        let rate = track.rate();
        let start = time_to_ticks_round_up(rate, self.graph_time_to_stream_time(id, from));
        let end = time_to_ticks_round_up(rate, self.graph_time_to_stream_time(id, to));
        let track_end = track.end();
        Some(BlockFrames {
            padding: (start - track_end).max(0),
            frames: usize::try_from(end - start.max(track_end)).unwrap_or(0),
        })
    }

    /// Sums `frames` frames of every input's audio starting at graph time
    /// `from`, as interleaved `channels`-channel samples.
    fn read_input_block(&self, id: StreamId, from: GraphTime, frames: usize, channels: u16) -> Vec<f32> {
        let mut mix = vec![0.0; frames * usize::from(channels)];
        let Some(processed) = self.streams.get(&id).and_then(|s| s.as_processed()) else {
            return mix;
        };
        if frames == 0 || processed.in_muted_cycle() {
            return mix;
        }
        let clock = self.clock();
        let frame_count = i64::try_from(frames).unwrap_or(i64::MAX);
        let mut scratch = Vec::new();

        for port in processed.inputs.iter().filter_map(|p| self.ports.get(p)) {
            let Some(source) = self.streams.get(&port.source) else {
                continue;
            };
            if *source.blocked.get_at(from) {
                continue;
            }
            let input_start = clock.graph_time_to_stream_time(source.timeline(), from);
            for track in source.buffer.tracks_of_type(MediaType::Audio) {
                if track.rate() != self.sample_rate {
                    tracing::trace!(stream = %source.id, track = track.id(), "Skipping audio track at foreign rate");
                    continue;
                }
                let Some(segment) = track.segment().as_audio() else {
                    continue;
                };
                let start = time_to_ticks_round_up(track.rate(), input_start);
                scratch.clear();
                segment.slice(start, start + frame_count).write_interleaved(channels, &mut scratch);
                for (out, sample) in mix.iter_mut().zip(&scratch) {
                    *out += sample;
                }
            }
        }
        mix
    }

    fn append_node_output(&mut self, id: StreamId, padding: i64, samples: Vec<f32>, channels: u16) {
        let rate = self.sample_rate;
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        let mut chunk = AudioSegment::new();
        chunk.append_null_data(padding);
        chunk.append_interleaved(samples, channels);
        let mut chunk = MediaSegment::Audio(chunk);
        stream.apply_track_disabling(AUDIO_NODE_TRACK, &mut chunk);

        let Some(track) = stream.buffer.find_track_mut(AUDIO_NODE_TRACK) else {
            return;
        };
        let change = QueuedTrackChange {
            track: AUDIO_NODE_TRACK,
            rate,
            offset: track.end(),
            changes: TrackChanges::NONE,
            segment: &chunk,
        };
        Self::notify_queued(&stream.listeners, &change);
        track.segment_mut().append_from(&mut chunk);
    }

    /// Runs a cycle-breaking delay node's output for `[from, to)` ahead of
    /// every other stream in the block.
    pub(crate) fn produce_output_before_input(&mut self, id: StreamId, from: GraphTime, to: GraphTime) {
        let Some(BlockFrames { padding, frames }) = self.audio_node_block_frames(id, from, to) else {
            return;
        };
        let Some(processed) = self.streams.get_mut(&id).and_then(|s| s.as_processed_mut()) else {
            return;
        };
        let Processor::Delay(delay) = &mut processed.processor else {
            return;
        };
        let channels = delay.channels;
        let output = delay.read(frames);
        delay.produced_frames = Some(frames);
        self.append_node_output(id, padding, output, channels);
    }

    pub(crate) fn process_audio_node_block(&mut self, id: StreamId, from: GraphTime, to: GraphTime, allow_finish: bool) {
        let produced_early = self
            .streams
            .get_mut(&id)
            .and_then(|s| s.as_processed_mut())
            .and_then(|p| match &mut p.processor {
                Processor::Delay(delay) => delay.produced_frames.take(),
                _ => None,
            });

        let block = match produced_early {
            Some(frames) => Some(BlockFrames { padding: 0, frames }),
            None => self.audio_node_block_frames(id, from, to),
        };
        if let Some(BlockFrames { padding, frames }) = block {
            let channels = self
                .streams
                .get(&id)
                .and_then(|s| s.as_processed())
                .map_or(1, |p| p.processor.channels());
            let input = self.read_input_block(id, from, frames, channels);

            let output = match self.streams.get_mut(&id).and_then(|s| s.as_processed_mut()).map(|p| &mut p.processor) {
                Some(Processor::Mixer(_)) => Some(input),
                Some(Processor::Delay(delay)) => {
                    delay.write(&input);
                    if produced_early.is_some() {
                        None
                    } else {
                        Some(delay.read(frames))
                    }
                },
                _ => None,
            };
            if let Some(output) = output {
                self.append_node_output(id, padding, output, channels);
            }
        }

        if allow_finish && self.audio_node_should_finish(id) {
            self.finish_stream(id);
        }
    }

    /// Autofinishing nodes finish once all of their inputs have.
    fn audio_node_should_finish(&self, id: StreamId) -> bool {
        let Some(stream) = self.streams.get(&id) else {
            return false;
        };
        let StreamKind::Processed(processed) = &stream.kind else {
            return false;
        };
        if stream.finished || !processed.autofinish {
            return false;
        }
        processed
            .inputs
            .iter()
            .filter_map(|p| self.ports.get(p))
            .all(|port| self.streams.get(&port.source).is_none_or(|s| s.finished))
    }
}
