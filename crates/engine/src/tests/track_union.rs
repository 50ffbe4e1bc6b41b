// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use mediagraph_core::time::time_to_ticks_round_down;
use mediagraph_core::{PortFlags, StreamEvent};

use super::support::TestGraph;
use crate::processed::{Processor, ProcessorSpec};

fn computed_ticks(graph: &TestGraph) -> i64 {
    time_to_ticks_round_down(48_000, graph.engine.state_computed_time)
}

#[test]
fn test_union_copies_input_track() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(5, 48_000, 0.5);
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    let listener = graph.listen(union);

    graph.iterate();

    let frames = computed_ticks(&graph);
    assert!(frames > 0);
    let Some(track) = graph.stream(union).buffer.find_track(5) else {
        panic!("union should keep the input track id");
    };
    assert!(track.end() >= frames);
    assert!(graph.samples(union, 5, frames).iter().all(|s| (*s - 0.5).abs() < f32::EPSILON));
    assert_eq!(*listener.created_tracks.lock(), vec![5]);
    assert!(graph.stream(union).has_current_data);
}

#[test]
fn test_union_renames_clashing_tracks() {
    let mut graph = TestGraph::offline();
    let (first, _a) = graph.add_tone_source(1, 48_000, 0.25);
    let (second, _b) = graph.add_tone_source(1, 48_000, 0.75);
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(first, union, PortFlags::NONE);
    graph.connect(second, union, PortFlags::NONE);

    graph.iterate();

    let stream = graph.stream(union);
    assert_eq!(stream.buffer.track_count(), 2);
    let Some(processed) = stream.as_processed() else {
        panic!("expected processed stream");
    };
    let Processor::TrackUnion(union_state) = &processed.processor else {
        panic!("expected a track union");
    };
    let outputs: Vec<_> = union_state.track_map.iter().map(|m| m.output_track).collect();
    assert_eq!(outputs.len(), 2);
    assert_ne!(outputs[0], outputs[1]);
}

#[test]
fn test_blocked_input_copies_silence() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 48_000, 0.5);
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    if let Some(stream) = graph.engine.streams.get_mut(&source) {
        stream.change_explicit_blocker_count(0, 1);
    }

    graph.iterate();

    assert!(*graph.stream(source).blocked.get_at(0));
    assert!(!*graph.stream(union).blocked.get_at(0));
    let frames = computed_ticks(&graph);
    assert!(graph.samples(union, 1, frames).iter().all(|s| *s == 0.0));
}

#[test]
fn test_disabled_track_copies_silence() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 48_000, 0.5);
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    if let Some(stream) = graph.engine.streams.get_mut(&union) {
        stream.set_track_enabled(1, false);
    }

    graph.iterate();

    let frames = computed_ticks(&graph);
    let Some(track) = graph.stream(union).buffer.find_track(1) else {
        panic!("missing output track");
    };
    assert!(track.end() >= frames);
    assert!(graph.samples(union, 1, frames).iter().all(|s| *s == 0.0));
}

#[test]
fn test_autofinish_union_finishes_after_inputs() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_tone_source(1, 100, 0.5);
    input.end_all_tracks_and_finish();
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    if let Some(processed) = graph.engine.streams.get_mut(&union).and_then(|s| s.as_processed_mut()) {
        processed.autofinish = true;
    }
    let source_listener = graph.listen(source);
    let union_listener = graph.listen(union);

    for _ in 0..10 {
        graph.iterate();
    }

    assert!(graph.stream(source).finished);
    assert!(graph.stream(union).finished);
    assert!(graph.stream(union).notified_finished);
    assert_eq!(source_listener.count(StreamEvent::Finished), 1);
    assert_eq!(union_listener.count(StreamEvent::Finished), 1);
    assert!(graph.engine.all_finished_streams_notified());
}

#[test]
fn test_output_track_ends_once() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_tone_source(1, 100, 0.5);
    input.end_track(1);
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    let listener = graph.listen(union);

    for _ in 0..5 {
        graph.iterate();
    }

    assert_eq!(*listener.ended_tracks.lock(), vec![1]);
    let Some(track) = graph.stream(union).buffer.find_track(1) else {
        panic!("missing output track");
    };
    assert!(track.is_ended());
    // Without autofinish the union outlives its input.
    assert!(!graph.stream(union).finished);
}
