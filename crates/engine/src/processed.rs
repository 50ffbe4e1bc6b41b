// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Processed streams: streams whose data is computed from their input ports.
//!
//! Two processing models exist:
//!
//! - **Interval-based** ([`ProcessorSpec::TrackUnion`]): processed once per
//!   iteration over the whole `[from, to)` range.
//! - **Block-based audio nodes** ([`ProcessorSpec::Mixer`], [`ProcessorSpec::Delay`]):
//!   processed one audio block at a time. A delay node can produce its output
//!   before reading its input, which is what lets it break a cycle.

use std::collections::VecDeque;
use std::time::Duration;

use mediagraph_core::segment::MediaSegment;
use mediagraph_core::time::TrackTicks;
use mediagraph_core::{PortId, StreamTime, TrackId, TrackRate};

use crate::ordering::IN_MUTED_CYCLE;

/// Output track id of block-based audio nodes.
pub const AUDIO_NODE_TRACK: TrackId = 1;

/// What a processed stream computes from its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessorSpec {
    /// Copies every track of every input into its own output track.
    TrackUnion,
    /// Sums the audio of all inputs into a single track.
    Mixer { channels: u16 },
    /// Delays the summed audio of all inputs. The only processor that can
    /// break a cycle.
    Delay { delay: Duration, channels: u16 },
}

#[derive(Debug)]
pub(crate) struct TrackMapEntry {
    pub(crate) port: PortId,
    pub(crate) input_track: TrackId,
    pub(crate) output_track: TrackId,
    /// Last input tick consumed in the current run of unblocked intervals.
    pub(crate) end_of_consumed_input_ticks: TrackTicks,
    pub(crate) end_of_last_input_interval_in_input_stream: StreamTime,
    pub(crate) end_of_last_input_interval_in_output_stream: StreamTime,
    /// Scratch segment reused for each copied interval.
    pub(crate) segment: MediaSegment,
}

#[derive(Debug, Default)]
pub(crate) struct TrackUnion {
    pub(crate) track_map: Vec<TrackMapEntry>,
    pub(crate) max_track_id: TrackId,
}

#[derive(Debug)]
pub(crate) struct MixerNode {
    pub(crate) channels: u16,
}

#[derive(Debug)]
pub(crate) struct DelayNode {
    pub(crate) channels: u16,
    pub(crate) delay_ticks: TrackTicks,
    /// Interleaved delay line.
    pub(crate) line: VecDeque<f32>,
    /// Frames of the current block already produced ahead of its input.
    pub(crate) produced_frames: Option<usize>,
}

impl DelayNode {
    pub(crate) fn new(delay: Duration, channels: u16, rate: TrackRate) -> Self {
        let rate = u64::try_from(rate).unwrap_or(0);
        let delay_ticks = TrackTicks::try_from(
            delay.as_nanos().saturating_mul(u128::from(rate)) / 1_000_000_000,
        )
        .unwrap_or(TrackTicks::MAX);
        let channels = channels.max(1);
        let prefill = usize::try_from(delay_ticks).unwrap_or(0) * usize::from(channels);
        Self {
            channels,
            delay_ticks,
            line: std::iter::repeat_n(0.0, prefill).collect(),
            produced_frames: None,
        }
    }

    /// Pops `frames` frames of delayed output, padding with silence if the
    /// line runs short.
    pub(crate) fn read(&mut self, frames: usize) -> Vec<f32> {
        let wanted = frames * usize::from(self.channels);
        let available = wanted.min(self.line.len());
        let mut out: Vec<f32> = self.line.drain(..available).collect();
        out.resize(wanted, 0.0);
        out
    }

    pub(crate) fn write(&mut self, interleaved: &[f32]) {
        self.line.extend(interleaved.iter().copied());
    }
}

#[derive(Debug)]
pub(crate) enum Processor {
    TrackUnion(TrackUnion),
    Mixer(MixerNode),
    Delay(DelayNode),
}

impl Processor {
    pub(crate) fn new(spec: ProcessorSpec, rate: TrackRate) -> Self {
        match spec {
            ProcessorSpec::TrackUnion => Self::TrackUnion(TrackUnion::default()),
            ProcessorSpec::Mixer { channels } => Self::Mixer(MixerNode { channels: channels.max(1) }),
            ProcessorSpec::Delay { delay, channels } => Self::Delay(DelayNode::new(delay, channels, rate)),
        }
    }

    /// Block-based processors; everything after the first one in the stream
    /// order is processed block by block.
    pub(crate) const fn is_audio_node(&self) -> bool {
        matches!(self, Self::Mixer(_) | Self::Delay(_))
    }

    pub(crate) const fn is_cycle_breaker(&self) -> bool {
        matches!(self, Self::Delay(_))
    }

    pub(crate) const fn channels(&self) -> u16 {
        match self {
            Self::TrackUnion(_) => 0,
            Self::Mixer(m) => m.channels,
            Self::Delay(d) => d.channels,
        }
    }
}

pub(crate) struct ProcessedStream {
    pub(crate) inputs: Vec<PortId>,
    pub(crate) cycle_marker: u32,
    pub(crate) autofinish: bool,
    pub(crate) processor: Processor,
}

impl ProcessedStream {
    pub(crate) fn new(spec: ProcessorSpec, rate: TrackRate) -> Self {
        Self { inputs: Vec::new(), cycle_marker: 0, autofinish: false, processor: Processor::new(spec, rate) }
    }

    /// Part of a cycle with no delay node; produces silence.
    pub(crate) const fn in_muted_cycle(&self) -> bool {
        self.cycle_marker == IN_MUTED_CYCLE
    }
}
