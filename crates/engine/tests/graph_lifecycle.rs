// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end tests driving real scheduler threads through the public handle API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediagraph_core::time::STREAM_TIME_MAX;
use mediagraph_core::{
    AudioSegment, GraphError, LifecycleState, MainThreadListener, MediaSegment, MixerCallback,
    NullAudioBackend, PortFlags, StreamStateUpdate, TrackRate,
};
use mediagraph_engine::{GraphConfig, MediaStreamGraph, SourceStreamHandle};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

fn tone(frames: usize, value: f32) -> MediaSegment {
    let mut segment = AudioSegment::new();
    segment.append_interleaved(vec![value; frames], 1);
    segment.into()
}

/// A source holding `frames` mono frames and no further tracks to come.
fn tone_source(graph: &MediaStreamGraph, frames: usize) -> SourceStreamHandle {
    let source = graph.create_source_stream();
    source.add_track(1, graph.sample_rate(), 0, tone(frames, 0.25));
    source.advance_known_tracks_time(STREAM_TIME_MAX);
    source
}

/// Runs stable states until `done` holds or two seconds pass.
fn pump_until(graph: &MediaStreamGraph, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        if let Err(e) = graph.wait_for_stable_state_event(Duration::from_millis(20)) {
            panic!("stable state failed: {e}");
        }
    }
    done()
}

#[derive(Default)]
struct RecordingMainThreadListener {
    updates: parking_lot::Mutex<Vec<StreamStateUpdate>>,
}

impl MainThreadListener for RecordingMainThreadListener {
    fn notify_main_thread_state_changed(&self, update: &StreamStateUpdate) {
        self.updates.lock().push(update.clone());
    }
}

#[test]
#[allow(clippy::expect_used)]
fn test_offline_graph_runs_to_completion() {
    init_tracing();
    let graph = MediaStreamGraph::create_non_realtime(GraphConfig::default()).expect("default config is valid");
    assert!(!graph.is_realtime());

    // 100ms of audio through a track union, over a 200ms run.
    let source = tone_source(&graph, 4_800);
    source.end_all_tracks_and_finish();
    let union = graph.create_track_union_stream();
    union.set_autofinish(true);
    union.allocate_input_port(&source, PortFlags::NONE).expect("same graph");

    let listener = Arc::new(RecordingMainThreadListener::default());
    source.add_main_thread_listener(listener.clone());
    let mut updates = graph.subscribe_state();

    graph.start_non_realtime_processing(Duration::from_millis(200)).expect("offline graph starts");
    graph.wait_for_shutdown(Duration::from_secs(5)).expect("offline graph finishes");

    assert_eq!(graph.lifecycle_state(), LifecycleState::Destroyed);
    assert!(source.is_finished());
    assert!(union.is_finished());
    assert!(source.current_time() > 0);

    let seen = listener.updates.lock();
    assert!(seen.iter().all(|u| u.stream == source.id()));
    assert!(seen.last().is_some_and(|u| u.finished));

    let mut finished_union = false;
    while let Ok(update) = updates.try_recv() {
        finished_union |= update.stream == union.id() && update.finished;
    }
    assert!(finished_union);
}

#[test]
#[allow(clippy::expect_used)]
fn test_realtime_graph_advances_and_shuts_down() {
    init_tracing();
    let graph = MediaStreamGraph::new_realtime(GraphConfig::default(), Arc::new(NullAudioBackend))
        .expect("default config is valid");
    assert_eq!(graph.lifecycle_state(), LifecycleState::ThreadNotStarted);

    // Nothing queued, nothing to run.
    graph.run_in_stable_state().expect("stable state");
    assert_eq!(graph.lifecycle_state(), LifecycleState::ThreadNotStarted);

    let source = tone_source(&graph, 48_000);
    source.add_audio_output(1);
    graph.run_in_stable_state().expect("stable state");
    assert_eq!(graph.lifecycle_state(), LifecycleState::Running);

    assert!(pump_until(&graph, || source.current_time() > 0));

    graph.shutdown().expect("graph shuts down");
    assert_eq!(graph.lifecycle_state(), LifecycleState::Destroyed);
    assert!(matches!(graph.collect_memory_report(), Err(GraphError::Shutdown(_))));
}

#[test]
#[allow(clippy::expect_used)]
fn test_forced_shutdown_before_start_releases_producers() {
    init_tracing();
    let graph = MediaStreamGraph::create_non_realtime(GraphConfig::default()).expect("default config is valid");
    let source = tone_source(&graph, 480);

    graph.force_shutdown();
    graph.wait_for_shutdown(Duration::from_secs(5)).expect("forced shutdown completes");

    assert_eq!(graph.lifecycle_state(), LifecycleState::Destroyed);
    assert!(!source.append_to_track(1, tone(480, 0.5)));
    assert!(matches!(
        graph.start_non_realtime_processing(Duration::from_millis(100)),
        Err(GraphError::Shutdown(_))
    ));

    // Streams created after teardown are released immediately.
    let late = graph.create_source_stream();
    assert!(!late.append_to_track(1, tone(480, 0.5)));
}

#[test]
#[allow(clippy::expect_used)]
fn test_realtime_graph_destroys_itself_once_empty() {
    init_tracing();
    let graph = MediaStreamGraph::new_realtime(GraphConfig::default(), Arc::new(NullAudioBackend))
        .expect("default config is valid");
    let source = tone_source(&graph, 4_800);
    graph.run_in_stable_state().expect("stable state");
    assert!(pump_until(&graph, || source.current_time() > 0));

    source.destroy();
    graph.run_in_stable_state().expect("stable state");

    assert!(pump_until(&graph, || graph.lifecycle_state() == LifecycleState::Destroyed));
}

#[test]
#[allow(clippy::expect_used)]
fn test_memory_report_covers_buffered_streams() {
    init_tracing();
    let graph = MediaStreamGraph::new_realtime(GraphConfig::default(), Arc::new(NullAudioBackend))
        .expect("default config is valid");

    // Not started: the parked engine has no streams yet.
    let report = graph.collect_memory_report().expect("parked engine reports");
    assert!(report.is_empty());

    let source = tone_source(&graph, 48_000);
    graph.run_in_stable_state().expect("stable state");
    assert!(pump_until(&graph, || source.current_time() > 0));

    let report = graph.collect_memory_report().expect("scheduler answers");
    let Some(usage) = report.iter().find(|u| u.stream == source.id()) else {
        panic!("no usage for {}", source.id());
    };
    assert_eq!(usage.kind, "source");
    assert!(usage.bytes > 0);

    graph.shutdown().expect("graph shuts down");
}

#[derive(Default)]
struct FrameCounter {
    frames: AtomicUsize,
}

impl MixerCallback for FrameCounter {
    fn mixer_callback(&self, _mixed: &[f32], channels: u16, frames: usize, _rate: TrackRate) {
        assert_eq!(channels, 2);
        self.frames.fetch_add(frames, Ordering::SeqCst);
    }
}

#[test]
#[allow(clippy::expect_used)]
fn test_mixer_callback_receives_played_audio() {
    init_tracing();
    let graph = MediaStreamGraph::new_realtime(GraphConfig::default(), Arc::new(NullAudioBackend))
        .expect("default config is valid");
    let counter = Arc::new(FrameCounter::default());

    let source = graph
        .batch(|graph| {
            let source = tone_source(graph, 48_000);
            source.add_audio_output(1);
            source.set_needs_mixing(true);
            graph.add_mixer_callback(counter.clone());
            source
        })
        .expect("batch runs");

    // Audio is mixed ahead of the current time, so the callback fires before
    // the mirrored time first moves.
    assert!(pump_until(&graph, || counter.frames.load(Ordering::SeqCst) > 0 && source.current_time() > 0));

    graph.shutdown().expect("graph shuts down");
}

#[test]
#[allow(clippy::expect_used)]
fn test_batches_become_current_in_order() {
    init_tracing();
    let graph = MediaStreamGraph::new_realtime(GraphConfig::default(), Arc::new(NullAudioBackend))
        .expect("default config is valid");
    let source = graph.batch(|graph| tone_source(graph, 96_000)).expect("first batch");
    assert_eq!(source.graph_update_index(), 0);

    graph.batch(|_| source.set_track_enabled(1, false)).expect("second batch");

    assert!(pump_until(&graph, || source.graph_update_index() == 2));
    graph.shutdown().expect("graph shuts down");
}

#[test]
fn test_ports_cannot_cross_graphs() {
    init_tracing();
    let Ok(first) = MediaStreamGraph::create_non_realtime(GraphConfig::default()) else {
        panic!("default config is valid");
    };
    let Ok(second) = MediaStreamGraph::create_non_realtime(GraphConfig::default()) else {
        panic!("default config is valid");
    };
    let source = first.create_source_stream();
    let mixer = second.create_mixer_stream(1);

    assert!(matches!(
        mixer.allocate_input_port(&source, PortFlags::NONE),
        Err(GraphError::UnknownStream(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = GraphConfig { sample_rate: 0, ..GraphConfig::default() };
    assert!(matches!(
        MediaStreamGraph::create_non_realtime(config),
        Err(GraphError::Configuration(_))
    ));
}
