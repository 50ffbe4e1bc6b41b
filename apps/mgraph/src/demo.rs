// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Builds and runs the demo graph: sine sources summed by a mixer stream,
//! with an optional delay feeding the mix back into itself.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use mediagraph_core::time::{media_time_to_milliseconds, STREAM_TIME_MAX};
use mediagraph_core::{AudioSegment, MediaSegment, MixerCallback, NullAudioBackend, PortFlags, StreamId, TrackRate};
use mediagraph_engine::{
    GraphConfig, MediaStreamGraph, ProcessedStreamHandle, SourceStreamHandle, StreamHandle, StreamMemoryUsage,
};

use crate::config::{DemoConfig, RunMode, ToneConfig};

const TONE_TRACK: u32 = 1;
const MIX_OUTPUT_KEY: u64 = 1;
/// Slack on top of the requested duration before an offline run is abandoned.
const OFFLINE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
pub struct StreamSummary {
    pub stream: StreamId,
    pub role: &'static str,
    pub current_time_ms: i64,
    pub finished: bool,
}

#[derive(Debug, Serialize)]
pub struct DemoSummary {
    pub mode: RunMode,
    pub duration_ms: u64,
    pub streams: Vec<StreamSummary>,
    /// Loudest mixed sample, realtime runs only.
    pub peak: Option<f32>,
    pub memory: Vec<StreamMemoryUsage>,
}

/// Tracks the loudest sample handed to the mixer callback.
#[derive(Default)]
struct PeakMeter {
    bits: AtomicU32,
}

impl PeakMeter {
    fn peak(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl MixerCallback for PeakMeter {
    fn mixer_callback(&self, mixed: &[f32], _channels: u16, _frames: usize, _rate: TrackRate) {
        let loudest = mixed.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        if loudest > self.peak() {
            self.bits.store(loudest.to_bits(), Ordering::Relaxed);
        }
    }
}

struct DemoGraph {
    sources: Vec<SourceStreamHandle>,
    mixer: ProcessedStreamHandle,
    delay: Option<ProcessedStreamHandle>,
}

impl DemoGraph {
    fn streams(&self) -> impl Iterator<Item = (&'static str, &StreamHandle)> {
        self.sources
            .iter()
            .map(|s| ("tone", s.as_stream()))
            .chain(std::iter::once(("mixer", self.mixer.as_stream())))
            .chain(self.delay.iter().map(|d| ("delay", d.as_stream())))
    }

    fn summarize(&self) -> Vec<StreamSummary> {
        self.streams()
            .map(|(role, stream)| StreamSummary {
                stream: stream.id(),
                role,
                current_time_ms: media_time_to_milliseconds(stream.current_time()),
                finished: stream.is_finished(),
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn sine(tone: &ToneConfig, rate: TrackRate, frames: usize) -> MediaSegment {
    let step = std::f64::consts::TAU * f64::from(tone.frequency_hz) / f64::from(rate);
    let samples = (0..frames).map(|i| tone.amplitude * (step * i as f64).sin() as f32).collect();
    let mut segment = AudioSegment::new();
    segment.append_interleaved(samples, 1);
    segment.into()
}

fn build(graph: &MediaStreamGraph, demo: &DemoConfig, meter: &Arc<PeakMeter>) -> anyhow::Result<DemoGraph> {
    let rate = graph.sample_rate();
    let frames = usize::try_from(demo.tone_length_ms * u64::try_from(rate)? / 1_000)?;

    let mixer = graph.create_mixer_stream(1);
    mixer.set_autofinish(true);
    mixer.add_audio_output(MIX_OUTPUT_KEY);

    let mut sources = Vec::with_capacity(demo.tones.len());
    for tone in &demo.tones {
        let source = graph.create_source_stream();
        source.add_track(TONE_TRACK, rate, 0, sine(tone, rate, frames));
        source.advance_known_tracks_time(STREAM_TIME_MAX);
        source.end_all_tracks_and_finish();
        mixer.allocate_input_port(&source, PortFlags::NONE).context("connecting tone source")?;
        debug!(stream = %source.id(), frequency_hz = tone.frequency_hz, "Added tone source");
        sources.push(source);
    }

    let delay = match demo.feedback_delay_ms {
        Some(ms) => {
            let delay = graph.create_delay_stream(Duration::from_millis(ms), 1);
            delay.allocate_input_port(&mixer, PortFlags::NONE).context("connecting delay input")?;
            mixer.allocate_input_port(&delay, PortFlags::NONE).context("connecting feedback")?;
            Some(delay)
        },
        None => None,
    };

    if graph.is_realtime() {
        if let Some(first) = sources.first() {
            first.set_needs_mixing(true);
        }
        graph.add_mixer_callback(Arc::clone(meter) as Arc<dyn MixerCallback>);
    }

    Ok(DemoGraph { sources, mixer, delay })
}

/// Builds the demo graph for `graph_config`, runs it for the configured
/// duration and reports where every stream ended up.
///
/// # Errors
///
/// Returns an error if the graph cannot be created or does not shut down in time.
pub fn run(graph_config: &GraphConfig, demo: &DemoConfig) -> anyhow::Result<DemoSummary> {
    let graph = match demo.mode {
        RunMode::Offline => MediaStreamGraph::create_non_realtime(graph_config.clone())?,
        RunMode::Realtime => MediaStreamGraph::new_realtime(graph_config.clone(), Arc::new(NullAudioBackend))?,
    };
    let meter = Arc::new(PeakMeter::default());
    let demo_graph = graph.batch(|g| build(g, demo, &meter))??;
    let duration = Duration::from_millis(demo.duration_ms);
    info!(mode = ?demo.mode, duration_ms = demo.duration_ms, tones = demo.tones.len(), "Running demo graph");

    let memory = match demo.mode {
        RunMode::Offline => {
            graph.start_non_realtime_processing(duration)?;
            graph.wait_for_shutdown(duration + OFFLINE_GRACE).context("offline run did not finish")?;
            Vec::new()
        },
        RunMode::Realtime => {
            let deadline = Instant::now() + duration;
            while Instant::now() < deadline {
                graph.wait_for_stable_state_event(Duration::from_millis(10))?;
            }
            let memory = graph.collect_memory_report().context("collecting memory report")?;
            graph.shutdown().context("shutting down realtime graph")?;
            memory
        },
    };

    let summary = DemoSummary {
        mode: demo.mode,
        duration_ms: demo.duration_ms,
        streams: demo_graph.summarize(),
        peak: graph.is_realtime().then(|| meter.peak()),
        memory,
    };
    info!(streams = summary.streams.len(), "Demo graph finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::expect_used)]
    fn test_offline_demo_finishes_every_tone() {
        let demo = DemoConfig { duration_ms: 300, tone_length_ms: 100, ..DemoConfig::default() };
        let summary = run(&GraphConfig::default(), &demo).expect("offline demo runs");

        assert_eq!(summary.streams.len(), 3);
        assert!(summary.peak.is_none());
        for stream in summary.streams.iter().filter(|s| s.role == "tone") {
            assert!(stream.finished, "{} did not finish", stream.stream);
        }
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_feedback_demo_runs_with_a_cycle() {
        let demo = DemoConfig {
            duration_ms: 200,
            tone_length_ms: 100,
            feedback_delay_ms: Some(20),
            ..DemoConfig::default()
        };
        let summary = run(&GraphConfig::default(), &demo).expect("feedback demo runs");

        assert_eq!(summary.streams.len(), 4);
        assert!(summary.streams.iter().any(|s| s.role == "delay"));
    }

    #[test]
    fn test_sine_respects_amplitude() {
        let tone = ToneConfig { frequency_hz: 1_000.0, amplitude: 0.5 };
        let segment = sine(&tone, 48_000, 480);
        let Some(audio) = segment.as_audio() else {
            panic!("sine produces audio");
        };
        let mut samples = Vec::new();
        audio.write_interleaved(1, &mut samples);
        assert_eq!(samples.len(), 480);
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
        assert!(samples.iter().any(|s| s.abs() > 0.45));
    }
}
